use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::analytics::{DerivationSummary, derive_value};
use crate::cli::DeriveArgs;
use crate::util::{now_utc_string, write_json_file, write_json_stdout};

#[derive(Debug, Serialize)]
struct DerivationManifest {
    manifest_version: u32,
    generated_at: String,
    source: String,
    source_sha256: String,
    output_path: Option<String>,
    counts: DerivationSummary,
}

pub fn run(args: DeriveArgs) -> Result<()> {
    let loaded = super::load_source(&args.source)?;
    let (derived, summary) = derive_value(loaded.value)
        .with_context(|| format!("failed to derive metrics for {}", loaded.source))?;

    let pretty = !args.compact;
    match &args.output {
        Some(path) => {
            write_json_file(path, &derived, pretty)?;
            info!(path = %path.display(), "wrote derived run");
        }
        None => write_json_stdout(&derived, pretty)?,
    }

    if let Some(manifest_path) = &args.manifest_path {
        let manifest = DerivationManifest {
            manifest_version: 1,
            generated_at: now_utc_string(),
            source: loaded.source,
            source_sha256: loaded.sha256,
            output_path: args.output.as_deref().map(|path| path.display().to_string()),
            counts: summary,
        };
        write_manifest(manifest_path, &manifest)?;
    }

    Ok(())
}

fn write_manifest(path: &Path, manifest: &DerivationManifest) -> Result<()> {
    write_json_file(path, manifest, true)?;
    info!(
        path = %path.display(),
        unique_chunks = manifest.counts.total_unique_chunks,
        "wrote derivation manifest"
    );
    Ok(())
}
