use std::io::{self, Write};

use anyhow::Result;
use tracing::info;

use crate::cli::CollectionsArgs;
use crate::store::RunStore;
use crate::util::write_json_stdout;

pub fn run(args: CollectionsArgs) -> Result<()> {
    let store = RunStore::new(&args.collections_dir)?;
    info!(root = %store.root().display(), "listing collections");

    let collections = store.list_collections()?;
    info!(
        collections = collections.len(),
        runs = collections.values().map(Vec::len).sum::<usize>(),
        "found collections"
    );

    if args.json {
        return write_json_stdout(&collections, true);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    for (collection, run_files) in &collections {
        writeln!(output, "{collection}\t{} runs", run_files.len())?;
        for run_file in run_files {
            writeln!(output, "\t{run_file}")?;
        }
    }
    output.flush()?;
    Ok(())
}
