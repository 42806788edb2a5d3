//! Serializable ladder state: the record shapes exposed to storage.
//!
//! The engine itself stays in memory; this module is the boundary the
//! excluded persistence layer consumes. Snapshots are plain JSON so
//! they stay inspectable.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ladder::{Match, Player};

/// A consistent, serializable copy of the ladder state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderSnapshot {
    /// Level capacities, index 0 = level 1.
    pub capacities: Vec<u32>,
    /// Every player record, sorted by identifier.
    pub players: Vec<Player>,
    /// Every match record, sorted by id.
    pub matches: Vec<Match>,
}

impl LadderSnapshot {
    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> io::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid snapshot.
    pub fn from_json(json: &str) -> io::Result<Self> {
        serde_json::from_str(json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Save the snapshot to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file operations fail.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_json()?)
    }

    /// Load a snapshot from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if file operations or deserialization fail.
    pub fn load(path: &Path) -> io::Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}
