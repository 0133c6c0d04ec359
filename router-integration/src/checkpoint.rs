//! Checkpoint persistence for the file observer.
//!
//! Each watched source tracks how far it has read (byte offset for
//! append-only logs, line count for truncate-and-rewrite CSVs) so a restart
//! resumes instead of replaying the whole file. Ported from
//! `dump_checkpoints` / `load_checkpoints`, which serialize a flat
//! `{source: offset}` map to indented JSON.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::IntegrationError;

/// A source name to byte/line offset map, persisted as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoints(pub HashMap<String, u64>);

impl Checkpoints {
    pub fn get(&self, source: &str) -> u64 {
        self.0.get(source).copied().unwrap_or(0)
    }

    pub fn set(&mut self, source: impl Into<String>, offset: u64) {
        self.0.insert(source.into(), offset);
    }
}

/// Loads checkpoints from `path`. A missing file is treated as an empty map
/// (first run), matching the original's `except FileNotFoundError: return {}`.
pub fn load_checkpoints(path: impl AsRef<Path>) -> Result<Checkpoints, IntegrationError> {
    let path = path.as_ref();
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Checkpoints::default()),
        Err(source) => {
            return Err(IntegrationError::CheckpointRead {
                path: path.display().to_string(),
                source,
            });
        }
    };

    serde_json::from_str(&raw).map_err(|source| IntegrationError::CheckpointSerde {
        path: path.display().to_string(),
        source,
    })
}

/// Writes `checkpoints` to `path` as indented JSON, matching
/// `json.dump(..., indent=4)`.
pub fn store_checkpoints(path: impl AsRef<Path>, checkpoints: &Checkpoints) -> Result<(), IntegrationError> {
    let path = path.as_ref();
    let raw = serde_json::to_string_pretty(checkpoints).map_err(|source| IntegrationError::CheckpointSerde {
        path: path.display().to_string(),
        source,
    })?;

    std::fs::write(path, raw).map_err(|source| IntegrationError::CheckpointWrite {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.json");

        let mut checkpoints = Checkpoints::default();
        checkpoints.set("xq_signals", 42);
        checkpoints.set("order_callbacks.orders", 7);

        store_checkpoints(&path, &checkpoints).unwrap();
        let loaded = load_checkpoints(&path).unwrap();

        assert_eq!(loaded, checkpoints);
    }

    #[test]
    fn missing_file_yields_empty_checkpoints() {
        let loaded = load_checkpoints("/nonexistent/path/checkpoints.json").unwrap();
        assert_eq!(loaded, Checkpoints::default());
    }
}
