//! Best-effort resume state.
//!
//! Every finished trial overwrites the single checkpoint record with its own
//! pair. Trials finish out of order, so after a run the record holds whichever
//! pair was saved last, which is only approximately the progress frontier.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::source::TrialPair;

/// Default checkpoint location, relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = "state.json";

/// The most recently attempted pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    #[serde(default, alias = "last_user")]
    pub last_identity: String,
    #[serde(default, alias = "last_pass")]
    pub last_secret: String,
}

impl Checkpoint {
    /// True when no pair has been recorded.
    pub fn is_empty(&self) -> bool {
        self.last_identity.is_empty() && self.last_secret.is_empty()
    }
}

impl From<&TrialPair> for Checkpoint {
    fn from(pair: &TrialPair) -> Self {
        Self {
            last_identity: pair.identity.clone(),
            last_secret: pair.secret.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Cannot write checkpoint {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot read checkpoint {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed checkpoint {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Durable single-record store.
pub trait CheckpointStore: Send + Sync {
    /// Overwrites the record with `pair`.
    fn save(&self, pair: &TrialPair) -> Result<(), CheckpointError>;

    /// Returns the last saved record, or an empty one if nothing was saved.
    fn load(&self) -> Result<Checkpoint, CheckpointError>;
}

/// Checkpoint kept as a small JSON file.
#[derive(Debug)]
pub struct JsonCheckpointStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_STATE_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_err(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl Default for JsonCheckpointStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_FILE)
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn save(&self, pair: &TrialPair) -> Result<(), CheckpointError> {
        let record = Checkpoint::from(pair);
        let json = serde_json::to_string_pretty(&record).map_err(|e| CheckpointError::Malformed {
            path: self.path.clone(),
            source: e,
        })?;

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let tmp = self.temp_path();
        fs::write(&tmp, json).map_err(|e| self.write_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.write_err(e))?;
        Ok(())
    }

    fn load(&self) -> Result<Checkpoint, CheckpointError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No checkpoint at {}", self.path.display());
                return Ok(Checkpoint::default());
            }
            Err(e) => {
                return Err(CheckpointError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };
        let checkpoint: Checkpoint =
            serde_json::from_str(&content).map_err(|e| CheckpointError::Malformed {
                path: self.path.clone(),
                source: e,
            })?;
        debug!(
            "Loaded checkpoint - last identity: {:?}, last secret: {:?}",
            checkpoint.last_identity, checkpoint.last_secret
        );
        Ok(checkpoint)
    }
}

/// In-process checkpoint, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    record: Mutex<Checkpoint>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing record.
    pub fn with(checkpoint: Checkpoint) -> Self {
        Self {
            record: Mutex::new(checkpoint),
        }
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&self, pair: &TrialPair) -> Result<(), CheckpointError> {
        let mut record = self
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *record = Checkpoint::from(pair);
        Ok(())
    }

    fn load(&self) -> Result<Checkpoint, CheckpointError> {
        Ok(self
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = JsonCheckpointStore::new(dir.path().join("state.json"));
        let checkpoint = store.load().unwrap();
        assert!(checkpoint.is_empty());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempdir().unwrap();
        let store = JsonCheckpointStore::new(dir.path().join("state.json"));
        store.save(&TrialPair::new("alice", "one")).unwrap();
        store.save(&TrialPair::new("bob", "")).unwrap();

        let checkpoint = store.load().unwrap();
        assert_eq!(checkpoint.last_identity, "bob");
        assert_eq!(checkpoint.last_secret, "");
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[test]
    fn test_record_field_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonCheckpointStore::new(&path);
        store.save(&TrialPair::new("alice", "pw")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["lastIdentity"], "alice");
        assert_eq!(raw["lastSecret"], "pw");
    }

    #[test]
    fn test_reads_legacy_field_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"last_user": "carol", "last_pass": "x"}"#).unwrap();

        let checkpoint = JsonCheckpointStore::new(&path).load().unwrap();
        assert_eq!(checkpoint.last_identity, "carol");
        assert_eq!(checkpoint.last_secret, "x");
    }

    #[test]
    fn test_malformed_record_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();

        let err = JsonCheckpointStore::new(&path).load().unwrap_err();
        assert!(matches!(err, CheckpointError::Malformed { .. }));
    }

    #[test]
    fn test_unwritable_location_is_error() {
        let store = JsonCheckpointStore::new("/nonexistent/cred_trial/state.json");
        let err = store.save(&TrialPair::new("a", "b")).unwrap_err();
        assert!(matches!(err, CheckpointError::Write { .. }));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCheckpointStore::new();
        assert!(store.load().unwrap().is_empty());
        store.save(&TrialPair::new("u", "p")).unwrap();
        assert_eq!(
            store.load().unwrap(),
            Checkpoint {
                last_identity: "u".into(),
                last_secret: "p".into(),
            }
        );
    }
}
