use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Learned mapping from industry tag ids to industry names.
///
/// Lifecycle: loaded once at the start of a run, extended while records are
/// normalized, written back once with [`IndustryCache::flush`].
#[derive(Debug, Default)]
pub struct IndustryCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl IndustryCache {
    /// A cache that is never persisted.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache backing file. A missing file starts an empty cache; an
    /// unreadable one is logged and replaced on the next flush.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Industry cache {:?} is corrupt, starting empty: {}", path, e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("Industry cache {:?} could not be read, starting empty: {}", path, e);
                BTreeMap::new()
            }
        };
        info!("Loaded {} industry mappings from {:?}", entries.len(), path);
        Self {
            path: Some(path),
            entries,
            dirty: false,
        }
    }

    /// Apollo-style industry tag ids are 24 hex characters.
    pub fn is_industry_id(value: &str) -> bool {
        value.len() == 24 && value.chars().all(|c| c.is_ascii_hexdigit())
    }

    pub fn resolve(&self, id: &str) -> Option<&str> {
        self.entries.get(&id.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn learn(&mut self, id: &str, name: &str) {
        let id = id.to_ascii_lowercase();
        if Self::is_industry_id(name) || name.trim().is_empty() {
            return;
        }
        if self.entries.get(&id).map(String::as_str) != Some(name) {
            debug!("Learned industry mapping {} -> {}", id, name);
            self.entries.insert(id, name.to_string());
            self.dirty = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the cache back if it learned anything. Returns whether a write happened.
    pub fn flush(&mut self) -> Result<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        if !self.dirty {
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.entries)?)?;
        self.dirty = false;
        info!("Flushed {} industry mappings to {:?}", self.entries.len(), path);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TAG: &str = "5567cd4773696439b10b0000";

    #[test]
    fn test_learn_resolve_and_flush_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("industries.json");

        let mut cache = IndustryCache::load(&path);
        assert!(cache.is_empty());
        cache.learn(TAG, "information technology & services");
        assert_eq!(cache.resolve(TAG), Some("information technology & services"));
        assert!(cache.flush().unwrap());
        assert!(!cache.flush().unwrap(), "second flush has nothing to write");

        let reloaded = IndustryCache::load(&path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.resolve(&TAG.to_uppercase()), Some("information technology & services"));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("industries.json");
        fs::write(&path, "{not json").unwrap();
        assert!(IndustryCache::load(&path).is_empty());
    }

    #[test]
    fn test_ids_are_never_learned_as_names() {
        let mut cache = IndustryCache::in_memory();
        cache.learn(TAG, TAG);
        assert!(cache.is_empty());
        assert!(IndustryCache::is_industry_id(TAG));
        assert!(!IndustryCache::is_industry_id("retail"));
    }
}
