pub mod chunks;
pub mod collections;
pub mod derive;

use anyhow::{Result, bail};
use tracing::info;

use crate::cli::RunSourceArgs;
use crate::store::{LoadedRun, RunStore, load_path};

fn load_source(source: &RunSourceArgs) -> Result<LoadedRun> {
    let loaded = match (&source.input, &source.collection, &source.run) {
        (Some(path), _, _) => load_path(path)?,
        (None, Some(collection), Some(run_file)) => {
            RunStore::new(&source.collections_dir)?.load_run(collection, run_file)?
        }
        _ => bail!("either --input or both --collection and --run are required"),
    };

    info!(source = %loaded.source, sha256 = %loaded.sha256, "loaded run");
    Ok(loaded)
}
