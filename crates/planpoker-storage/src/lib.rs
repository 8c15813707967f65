//! Local persistence for planpoker.
//!
//! Two things survive a restart:
//!
//! 1. **Player identity**: the generated [`PlayerId`] and display name,
//!    so peers recognize a returning player.
//! 2. **Room state**: the last known [`State`] of every room, keyed by
//!    [`RoomId`], so a dealer can resume a session.
//!
//! The session only sees the [`Storage`] trait. [`MemoryStorage`] keeps
//! everything in a map (tests, ephemeral runs); [`FileStorage`] writes
//! JSON files under a directory.

mod error;
mod file;
mod memory;

pub use error::StorageError;
pub use file::FileStorage;
pub use memory::MemoryStorage;

use planpoker_protocol::{PlayerId, RoomId, State};
use serde::{Deserialize, Serialize};

/// Who the local player is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub id: PlayerId,
    pub name: String,
}

/// Load/save contract consumed by the session.
///
/// Calls are synchronous: records are small and the room actor is the
/// only writer for its room.
pub trait Storage: Send + Sync + 'static {
    /// Returns the stored state of a room, or `None` if nothing was saved.
    fn load_state(&self, room_id: &RoomId) -> Result<Option<State>, StorageError>;

    /// Saves the state of a room, replacing any previous record.
    fn save_state(&self, room_id: &RoomId, state: &State) -> Result<(), StorageError>;

    /// Returns the stored player identity, or `None` on first start.
    fn load_player(&self) -> Result<Option<PlayerIdentity>, StorageError>;

    /// Saves the player identity.
    fn save_player(&self, identity: &PlayerIdentity) -> Result<(), StorageError>;
}
