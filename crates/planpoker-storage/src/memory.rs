use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use planpoker_protocol::{RoomId, State};

use crate::{PlayerIdentity, Storage, StorageError};

#[derive(Debug, Default)]
struct Records {
    player: Option<PlayerIdentity>,
    rooms: HashMap<RoomId, State>,
}

/// A [`Storage`] that keeps records in memory only.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<Records>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage that already knows the local player.
    pub fn with_player(identity: PlayerIdentity) -> Self {
        let storage = Self::default();
        storage.lock().player = Some(identity);
        storage
    }

    /// Number of rooms with a saved state.
    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn load_state(&self, room_id: &RoomId) -> Result<Option<State>, StorageError> {
        Ok(self.lock().rooms.get(room_id).cloned())
    }

    fn save_state(&self, room_id: &RoomId, state: &State) -> Result<(), StorageError> {
        self.lock().rooms.insert(room_id.clone(), state.clone());
        Ok(())
    }

    fn load_player(&self) -> Result<Option<PlayerIdentity>, StorageError> {
        Ok(self.lock().player.clone())
    }

    fn save_player(&self, identity: &PlayerIdentity) -> Result<(), StorageError> {
        self.lock().player = Some(identity.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use planpoker_protocol::{Deck, PlayerId, Room};

    use super::*;

    #[test]
    fn test_empty_storage_has_nothing() {
        let storage = MemoryStorage::new();
        let room_id = Room::new(vec![1; 16]).to_room_id();
        assert!(storage.load_state(&room_id).unwrap().is_none());
        assert!(storage.load_player().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load_state() {
        let storage = MemoryStorage::new();
        let room_id = Room::new(vec![2; 16]).to_room_id();
        let state = State::new(Deck::new(["1", "2"]).unwrap());

        storage.save_state(&room_id, &state).unwrap();

        assert_eq!(storage.load_state(&room_id).unwrap(), Some(state));
        assert_eq!(storage.room_count(), 1);
    }

    #[test]
    fn test_with_player() {
        let identity = PlayerIdentity {
            id: PlayerId::new("p-1"),
            name: "alice".into(),
        };
        let storage = MemoryStorage::with_player(identity.clone());
        assert_eq!(storage.load_player().unwrap(), Some(identity));
    }
}
