use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::domain::SourceKind;
use crate::error::ConfigError;

/// On-disk shape of one scraper export.
#[derive(Debug, Deserialize)]
struct BatchFile {
    source: String,
    #[serde(default)]
    records: Vec<Value>,
}

/// Raw records of one scraper export, tagged with their source.
#[derive(Debug, Clone)]
pub struct RawBatch {
    /// File path or caller-provided label, used in logs
    pub label: String,
    pub source: SourceKind,
    pub records: Vec<Value>,
}

impl RawBatch {
    pub fn new(label: impl Into<String>, source: SourceKind, records: Vec<Value>) -> Self {
        Self {
            label: label.into(),
            source,
            records,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoadedBatches {
    pub batches: Vec<RawBatch>,
    /// Files that could not be read or parsed
    pub skipped: Vec<PathBuf>,
}

/// Load batch files in the given order. Unreadable files are skipped with a
/// warning; an unknown source tag fails the whole load.
pub fn load_batches(paths: &[PathBuf]) -> Result<LoadedBatches, ConfigError> {
    let mut loaded = LoadedBatches::default();
    for path in paths {
        match read_batch_file(path) {
            Ok(file) => {
                let source: SourceKind = file.source.parse()?;
                info!("Loaded {} {} records from {:?}", file.records.len(), source, path);
                loaded.batches.push(RawBatch::new(
                    path.display().to_string(),
                    source,
                    file.records,
                ));
            }
            Err(e) => {
                warn!("Skipping batch {:?}: {}", path, e);
                loaded.skipped.push(path.clone());
            }
        }
    }
    Ok(loaded)
}

fn read_batch_file(path: &Path) -> anyhow::Result<BatchFile> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
