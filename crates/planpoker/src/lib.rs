//! # planpoker
//!
//! Planning poker over a decentralized, encrypted pub/sub room.
//!
//! One participant creates a room and becomes the **dealer**: it owns the
//! session state and broadcasts it. Everybody else joins with the room id
//! and votes. Votes stay hidden until the dealer reveals them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use planpoker::prelude::*;
//!
//! # async fn run() -> Result<(), PlanPokerError> {
//! let transport = MemoryTransport::new();
//! let game = Game::builder()
//!     .transport(transport)
//!     .storage(MemoryStorage::new())
//!     .build()?;
//!
//! let room = game.create_room().await?;
//! room.deal("login page").await?;
//! room.submit_vote("5").await?;
//! room.reveal().await?;
//! room.finish("5").await?;
//! room.leave().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod game;
pub mod logging;

pub use error::PlanPokerError;
pub use game::{Game, GameBuilder};

pub use planpoker_game as session;
pub use planpoker_protocol as protocol;
pub use planpoker_storage as storage;
pub use planpoker_transport as transport;

/// Everything needed to run a game.
pub mod prelude {
    pub use crate::{Game, GameBuilder, PlanPokerError};
    pub use planpoker_game::{decks, GameConfig, GameError, RoomSession, StateReceiver};
    pub use planpoker_protocol::{
        Deck, Player, PlayerId, RoomId, State, VoteItem, VoteItemId, VoteState, VoteValue,
    };
    pub use planpoker_storage::{FileStorage, MemoryStorage, Storage};
    pub use planpoker_transport::{MemoryTransport, Transport};
}
