#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::VectorDocument;

/// Bump when the persisted document shape changes. Old snapshots are
/// discarded on mismatch, not migrated; the index is rebuilt from the
/// corpus instead.
pub const SNAPSHOT_VERSION: u32 = 2;

const SNAPSHOT_FILE: &str = "vector-snapshot.json";
const VERSION_FILE: &str = "vector-snapshot.version";

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    documents: Vec<VectorDocument>,
    timestamp: DateTime<Utc>,
    version: u32,
}

/// Key-value persistence for the vector collection: one JSON document
/// under the snapshot key and a separate version marker. Writes are
/// last-write-wins; there is no transactional coupling between the
/// two keys.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    #[inline]
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Load the persisted collection. Returns `None` when no snapshot
    /// exists or when either version marker disagrees with
    /// [`SNAPSHOT_VERSION`].
    #[inline]
    pub fn load(&self) -> Result<Option<Vec<VectorDocument>>, SnapshotError> {
        let snapshot_path = self.dir.join(SNAPSHOT_FILE);
        let version_path = self.dir.join(VERSION_FILE);

        if !snapshot_path.exists() {
            return Ok(None);
        }

        let marker = fs::read_to_string(&version_path).unwrap_or_default();
        if marker.trim().parse::<u32>() != Ok(SNAPSHOT_VERSION) {
            warn!(
                "Discarding persisted snapshot: version marker {:?} does not match {}",
                marker.trim(),
                SNAPSHOT_VERSION
            );
            return Ok(None);
        }

        let content = fs::read_to_string(&snapshot_path)?;
        let snapshot: Snapshot = match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!("Discarding unreadable snapshot: {}", error);
                return Ok(None);
            }
        };

        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                "Discarding persisted snapshot: embedded version {} does not match {}",
                snapshot.version, SNAPSHOT_VERSION
            );
            return Ok(None);
        }

        debug!(
            "Loaded snapshot with {} documents from {}",
            snapshot.documents.len(),
            snapshot_path.display()
        );
        Ok(Some(snapshot.documents))
    }

    /// Persist the collection, replacing whatever was stored before.
    #[inline]
    pub fn save(&self, documents: &[VectorDocument]) -> Result<(), SnapshotError> {
        fs::create_dir_all(&self.dir)?;

        let snapshot = Snapshot {
            documents: documents.to_vec(),
            timestamp: Utc::now(),
            version: SNAPSHOT_VERSION,
        };

        let snapshot_path = self.dir.join(SNAPSHOT_FILE);
        let tmp_path = self.dir.join(format!("{}.tmp", SNAPSHOT_FILE));

        // Write-then-rename so a crash mid-write never leaves a torn
        // snapshot behind.
        fs::write(&tmp_path, serde_json::to_vec(&snapshot)?)?;
        fs::rename(&tmp_path, &snapshot_path)?;
        fs::write(self.dir.join(VERSION_FILE), SNAPSHOT_VERSION.to_string())?;

        debug!(
            "Persisted {} documents to {}",
            documents.len(),
            snapshot_path.display()
        );
        Ok(())
    }

    /// Remove all persisted state.
    #[inline]
    pub fn erase(&self) -> Result<(), SnapshotError> {
        for file in [SNAPSHOT_FILE, VERSION_FILE] {
            let path = self.dir.join(file);
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Timestamp of the persisted snapshot, if one is readable.
    #[inline]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let content = fs::read_to_string(self.dir.join(SNAPSHOT_FILE)).ok()?;
        let snapshot: Snapshot = serde_json::from_str(&content).ok()?;
        Some(snapshot.timestamp)
    }
}
