use crate::error::LoadError;
use crate::types::Dataset;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// What we know about a workbook file without reading it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStamp {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl SourceStamp {
    pub fn of(path: &Path) -> Result<Self, LoadError> {
        let meta = fs::metadata(path).map_err(|e| LoadError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

struct Entry {
    stamp: SourceStamp,
    dataset: Arc<Dataset>,
}

/// Loaded workbooks keyed by canonical path.
///
/// A hit requires the file stamp to be unchanged; otherwise the loader runs
/// again and the entry is replaced. Callers keep their `Arc` snapshot even
/// after a reload.
#[derive(Default)]
pub struct WorkbookCache {
    entries: HashMap<PathBuf, Entry>,
    loads: usize,
}

impl WorkbookCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load<F>(&mut self, path: &Path, load: F) -> Result<Arc<Dataset>, LoadError>
    where
        F: FnOnce(&Path) -> Result<Dataset, LoadError>,
    {
        let key = fs::canonicalize(path).map_err(|e| LoadError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let stamp = SourceStamp::of(&key)?;

        if let Some(entry) = self.entries.get(&key) {
            if entry.stamp == stamp {
                debug!(path = %key.display(), "workbook cache hit");
                return Ok(Arc::clone(&entry.dataset));
            }
            debug!(path = %key.display(), "workbook changed, reloading");
        }

        let dataset = Arc::new(load(&key)?);
        self.loads += 1;
        self.entries.insert(
            key,
            Entry {
                stamp,
                dataset: Arc::clone(&dataset),
            },
        );
        Ok(dataset)
    }

    pub fn invalidate(&mut self, path: &Path) {
        if let Ok(key) = fs::canonicalize(path) {
            self.entries.remove(&key);
        }
    }

    /// Number of times the loader actually ran.
    pub fn loads(&self) -> usize {
        self.loads
    }
}
