//! Unified error type for planpoker.

use planpoker_game::GameError;
use planpoker_protocol::ProtocolError;
use planpoker_storage::StorageError;
use planpoker_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` conversions let `?` lift sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum PlanPokerError {
    /// A session operation failed (role, vote state, closed session, ...).
    #[error(transparent)]
    Game(#[from] GameError),

    /// A room id or message couldn't be handled.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The transport couldn't subscribe or publish.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Local data couldn't be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The builder is missing a required component.
    #[error("missing {0}: set it on the builder")]
    MissingComponent(&'static str),

    /// The log subscriber couldn't be installed.
    #[error("logging setup failed: {0}")]
    Logging(String),
}
