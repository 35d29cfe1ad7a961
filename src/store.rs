use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde_json::Value;

use crate::util::sha256_bytes;

/// A run file read from disk, with the fingerprint of its raw bytes.
#[derive(Debug)]
pub struct LoadedRun {
    pub source: String,
    pub sha256: String,
    pub value: Value,
}

/// Read-only view over `<root>/<collection>/<run_file>.json`.
pub struct RunStore {
    root: PathBuf,
    name_pattern: Regex,
}

impl RunStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let name_pattern = Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._ -]*$")
            .context("failed to compile store name regex")?;
        Ok(Self {
            root: root.into(),
            name_pattern,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn list_collections(&self) -> Result<BTreeMap<String, Vec<String>>> {
        if !self.root.is_dir() {
            bail!("collections directory not found: {}", self.root.display());
        }

        let mut collections = BTreeMap::new();
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("failed to read {}", self.root.display()))?;

        for entry in entries {
            let entry =
                entry.with_context(|| format!("failed to read entry in {}", self.root.display()))?;
            let path = entry.path();

            if !entry
                .file_type()
                .with_context(|| format!("failed to inspect file type: {}", path.display()))?
                .is_dir()
            {
                continue;
            }

            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            collections.insert(name.to_string(), discover_run_files(&path)?);
        }

        Ok(collections)
    }

    pub fn run_path(&self, collection: &str, run_file: &str) -> Result<PathBuf> {
        self.ensure_safe_name("collection", collection)?;
        self.ensure_safe_name("run file", run_file)?;
        Ok(self.root.join(collection).join(run_file))
    }

    pub fn load_run(&self, collection: &str, run_file: &str) -> Result<LoadedRun> {
        let path = self.run_path(collection, run_file)?;
        if !path.is_file() {
            bail!("run file not found: {collection}/{run_file}");
        }
        read_run(&path, format!("{collection}/{run_file}"))
    }

    fn ensure_safe_name(&self, kind: &str, name: &str) -> Result<()> {
        if !self.name_pattern.is_match(name) {
            bail!("invalid {kind} name: {name:?}");
        }
        Ok(())
    }
}

pub fn load_path(path: &Path) -> Result<LoadedRun> {
    if !path.is_file() {
        bail!("run file not found: {}", path.display());
    }
    read_run(path, path.display().to_string())
}

fn read_run(path: &Path, source: String) -> Result<LoadedRun> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_slice::<Value>(&raw)
        .with_context(|| format!("invalid JSON in run file {source}"))?;

    Ok(LoadedRun {
        sha256: sha256_bytes(&raw),
        source,
        value,
    })
}

fn discover_run_files(collection_dir: &Path) -> Result<Vec<String>> {
    let mut run_files = Vec::new();

    let entries = fs::read_dir(collection_dir)
        .with_context(|| format!("failed to read {}", collection_dir.display()))?;

    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to read entry in {}", collection_dir.display()))?;
        let path = entry.path();

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if !is_json || !path.is_file() {
            continue;
        }

        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            run_files.push(name.to_string());
        }
    }

    run_files.sort();
    Ok(run_files)
}

#[cfg(test)]
mod tests;
