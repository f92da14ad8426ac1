//! Snapshot persistence behind a `load()/save()` capability.
//!
//! The unified snapshot is the only process-wide state; it is handled as a
//! whole document (load, mutate in memory, write back). The trait exists so
//! tests and embedders can substitute an in-memory store for the filesystem.

use crate::error::{Error, Result};
use crate::metrics::UnifiedSnapshot;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

pub trait SnapshotStore {
    /// Load the persisted snapshot, `None` when nothing usable exists yet.
    fn load(&self) -> Result<Option<UnifiedSnapshot>>;

    /// Persist the whole snapshot, replacing any previous document.
    fn save(&self, snapshot: &UnifiedSnapshot) -> Result<()>;
}

/// Whole-document JSON file store. Saves go through a sibling temp file and
/// a rename so readers never observe a half-written snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<UnifiedSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&text) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                // A corrupt snapshot means starting fresh, not failing the run.
                warn!(path = %self.path.display(), %err, "unreadable snapshot, starting fresh");
                Ok(None)
            }
        }
    }

    fn save(&self, snapshot: &UnifiedSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut text = serde_json::to_string_pretty(snapshot)?;
        text.push('\n');

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path).map_err(|err| {
            Error::store(format!(
                "could not replace {}: {err}",
                self.path.display()
            ))
        })
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Option<UnifiedSnapshot>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<UnifiedSnapshot>> {
        Ok(self.inner.lock().expect("store poisoned").clone())
    }

    fn save(&self, snapshot: &UnifiedSnapshot) -> Result<()> {
        *self.inner.lock().expect("store poisoned") = Some(snapshot.clone());
        Ok(())
    }
}
