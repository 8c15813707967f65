//! `Game` builder and entry points.
//!
//! A [`Game`] ties the layers together: it knows who the local player is
//! (bootstrapped from storage), and starts room sessions over the
//! configured transport.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use planpoker_game::{GameConfig, RoomSession, SessionContext};
use planpoker_protocol::{Player, PlayerId};
use planpoker_storage::{PlayerIdentity, Storage};
use planpoker_transport::Transport;
use tokio_util::sync::CancellationToken;

use crate::PlanPokerError;

/// Builder for a [`Game`].
///
/// # Example
///
/// ```rust,ignore
/// use planpoker::prelude::*;
///
/// let game = Game::builder()
///     .transport(MemoryTransport::new())
///     .storage(FileStorage::new("~/.planpoker"))
///     .build()?;
/// let room = game.create_room().await?;
/// println!("share this: {}", room.room_id());
/// ```
pub struct GameBuilder<T, S> {
    transport: Option<T>,
    storage: Option<S>,
    config: GameConfig,
    cancel: CancellationToken,
    player_name: Option<String>,
}

impl<T: Transport, S: Storage> GameBuilder<T, S> {
    pub fn new() -> Self {
        Self {
            transport: None,
            storage: None,
            config: GameConfig::default(),
            cancel: CancellationToken::new(),
            player_name: None,
        }
    }

    pub fn transport(mut self, transport: T) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn storage(mut self, storage: S) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn config(mut self, config: GameConfig) -> Self {
        self.config = config;
        self
    }

    /// Ties every session to an outer lifetime. Cancelling the token ends
    /// all of them.
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Overrides (and persists) the local display name.
    pub fn player_name(mut self, name: impl Into<String>) -> Self {
        self.player_name = Some(name.into());
        self
    }

    /// Loads or creates the local identity and returns the game.
    ///
    /// # Errors
    /// - [`PlanPokerError::MissingComponent`] without transport or storage.
    /// - [`PlanPokerError::Storage`] if a new identity can't be saved.
    pub fn build(self) -> Result<Game<T, S>, PlanPokerError> {
        let transport = self
            .transport
            .ok_or(PlanPokerError::MissingComponent("transport"))?;
        let storage = self
            .storage
            .ok_or(PlanPokerError::MissingComponent("storage"))?;

        let identity = bootstrap_identity(&storage, self.player_name)?;
        tracing::info!(player_id = %identity.id, name = %identity.name, "player identity ready");

        Ok(Game {
            ctx: SessionContext {
                transport: Arc::new(transport),
                storage: Arc::new(storage),
                config: self.config,
                cancel: self.cancel,
            },
            identity,
        })
    }
}

impl<T: Transport, S: Storage> Default for GameBuilder<T, S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Loads the stored identity, generating one on first start.
fn bootstrap_identity<S: Storage>(
    storage: &S,
    name_override: Option<String>,
) -> Result<PlayerIdentity, PlanPokerError> {
    let stored = match storage.load_player() {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(error = %e, "stored player identity unreadable, creating a new one");
            None
        }
    };
    let fresh = stored.is_none();
    let mut identity = stored.unwrap_or_else(|| PlayerIdentity {
        id: PlayerId::new(uuid::Uuid::new_v4().to_string()),
        name: default_player_name(),
    });

    let renamed = match name_override {
        Some(name) if !name.trim().is_empty() && name.trim() != identity.name => {
            identity.name = name.trim().to_string();
            true
        }
        _ => false,
    };
    if fresh || renamed {
        storage.save_player(&identity)?;
    }
    Ok(identity)
}

fn default_player_name() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    format!("player-{secs}")
}

/// Entry point: the local player plus the collaborators sessions use.
pub struct Game<T, S> {
    ctx: SessionContext<T, S>,
    identity: PlayerIdentity,
}

impl<T: Transport, S: Storage> Game<T, S> {
    pub fn builder() -> GameBuilder<T, S> {
        GameBuilder::new()
    }

    /// The local player, with the latest persisted name.
    pub fn player(&self) -> Player {
        let name = match self.ctx.storage.load_player() {
            Ok(Some(stored)) if stored.id == self.identity.id => stored.name,
            _ => self.identity.name.clone(),
        };
        Player::new(self.identity.id.clone(), name)
    }

    pub fn config(&self) -> &GameConfig {
        &self.ctx.config
    }

    /// Creates a room and becomes its dealer.
    pub async fn create_room(&self) -> Result<RoomSession, PlanPokerError> {
        Ok(RoomSession::create(&self.ctx, self.player()).await?)
    }

    /// Joins a room by its shared id.
    pub async fn join_room(&self, room_id: &str) -> Result<RoomSession, PlanPokerError> {
        Ok(RoomSession::join(&self.ctx, self.player(), room_id).await?)
    }

    /// Ends every session started by this game.
    pub fn shutdown(&self) {
        if !self.ctx.cancel.is_cancelled() {
            tracing::info!("game shutting down");
            self.ctx.cancel.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.ctx.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use planpoker_storage::MemoryStorage;

    use super::*;

    #[test]
    fn test_first_start_generates_and_saves_identity() {
        let storage = MemoryStorage::new();
        let identity = bootstrap_identity(&storage, None).unwrap();

        assert!(uuid::Uuid::parse_str(identity.id.as_str()).is_ok());
        assert!(identity.name.starts_with("player-"));
        assert_eq!(storage.load_player().unwrap(), Some(identity));
    }

    #[test]
    fn test_stored_identity_is_reused() {
        let stored = PlayerIdentity {
            id: PlayerId::new("p-1"),
            name: "alice".into(),
        };
        let storage = MemoryStorage::with_player(stored.clone());
        assert_eq!(bootstrap_identity(&storage, None).unwrap(), stored);
    }

    #[test]
    fn test_name_override_is_persisted() {
        let storage = MemoryStorage::with_player(PlayerIdentity {
            id: PlayerId::new("p-1"),
            name: "alice".into(),
        });
        let identity = bootstrap_identity(&storage, Some(" Alice ".into())).unwrap();
        assert_eq!(identity.id, PlayerId::new("p-1"));
        assert_eq!(identity.name, "Alice");
        assert_eq!(storage.load_player().unwrap().unwrap().name, "Alice");
    }
}
