//! Planning poker session logic.
//!
//! # Key types
//!
//! - [`GameCore`]: the session state machine, synchronous and I/O free
//! - [`Effects`]: what the room actor must do after a core call
//! - [`RoomSession`]: handle to a running room actor
//! - [`SessionContext`]: transport, storage, config and lifetime shared
//!   by sessions
//! - [`GameConfig`]: intervals, buffer sizes, default deck
//! - [`projection`]: the hidden view broadcast during voting
//! - [`decks`]: named decks and deck parsing
//!
//! ```text
//! local op ──→ RoomSession ──command──→ RoomActor ──→ GameCore
//! transport ──bytes──→ RoomActor ──decode──→ GameCore
//!                          │
//!                          ├──→ subscribers (view)
//!                          ├──→ storage (state)
//!                          └──→ transport (projected state, presence, vote)
//! ```

mod config;
pub mod decks;
mod error;
mod fanout;
mod machine;
pub mod projection;
mod session;

pub use config::GameConfig;
pub use error::GameError;
pub use fanout::StateReceiver;
pub use machine::{Effects, GameCore};
pub use session::{generate_room, RoomSession, SessionContext};
