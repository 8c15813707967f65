//! JSON files on disk.
//!
//! ```text
//! <root>/player.json
//! <root>/rooms/<room id>.json     {"state": { ... }}
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use planpoker_protocol::{RoomId, State};
use serde::{Deserialize, Serialize};

use crate::{PlayerIdentity, Storage, StorageError};

const PLAYER_FILE: &str = "player.json";
const ROOMS_DIR: &str = "rooms";

#[derive(Serialize)]
struct RoomRecordRef<'a> {
    state: &'a State,
}

#[derive(Deserialize)]
struct RoomRecord {
    state: State,
}

/// A [`Storage`] backed by JSON files under a root directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Uses `root` as the data directory. Directories are created lazily
    /// on the first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn player_path(&self) -> PathBuf {
        self.root.join(PLAYER_FILE)
    }

    fn room_path(&self, room_id: &RoomId) -> PathBuf {
        self.root
            .join(ROOMS_DIR)
            .join(format!("{}.json", room_id.as_str()))
    }

    /// Reads a file, mapping "not found" to `None`.
    fn read(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(io_error(path, source)),
        }
    }

    fn write(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }
        fs::write(path, bytes).map_err(|source| io_error(path, source))
    }
}

impl Storage for FileStorage {
    fn load_state(&self, room_id: &RoomId) -> Result<Option<State>, StorageError> {
        let path = self.room_path(room_id);
        let Some(bytes) = Self::read(&path)? else {
            return Ok(None);
        };
        let record: RoomRecord = serde_json::from_slice(&bytes)
            .map_err(|source| serialization_error(&path, source))?;
        Ok(Some(record.state))
    }

    fn save_state(&self, room_id: &RoomId, state: &State) -> Result<(), StorageError> {
        let path = self.room_path(room_id);
        let bytes = serde_json::to_vec_pretty(&RoomRecordRef { state })
            .map_err(|source| serialization_error(&path, source))?;
        Self::write(&path, &bytes)?;
        tracing::trace!(path = %path.display(), "room state saved");
        Ok(())
    }

    /// A corrupt player file is treated as missing so that a fresh
    /// identity can be generated.
    fn load_player(&self) -> Result<Option<PlayerIdentity>, StorageError> {
        let path = self.player_path();
        let Some(bytes) = Self::read(&path)? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(identity) => Ok(Some(identity)),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "player file is corrupt, starting with a new identity"
                );
                Ok(None)
            }
        }
    }

    fn save_player(&self, identity: &PlayerIdentity) -> Result<(), StorageError> {
        let path = self.player_path();
        let bytes = serde_json::to_vec_pretty(identity)
            .map_err(|source| serialization_error(&path, source))?;
        Self::write(&path, &bytes)
    }
}

fn io_error(path: &Path, source: io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn serialization_error(path: &Path, source: serde_json::Error) -> StorageError {
    StorageError::Serialization {
        path: path.display().to_string(),
        source,
    }
}
