//! Error types for the game layer.

use planpoker_protocol::{ProtocolError, VoteState, VoteValue};
use planpoker_storage::StorageError;
use planpoker_transport::TransportError;

/// Errors returned by session operations.
///
/// Only local calls produce a `GameError`. Peer protocol violations never
/// show up here: a bad message from the room is logged and dropped, and
/// the session carries on.
///
/// The lower layers' errors convert with `#[from]`, so inside the game
/// crate `?` works on protocol, transport and storage results alike.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// A dealer-only operation was called by a player.
    ///
    /// Deal, add item, select item, reveal, finish and set deck belong to
    /// the dealer. The state is left untouched.
    #[error("only the dealer can do this")]
    NotDealer,

    /// The operation isn't allowed in the current vote state.
    ///
    /// Carries the operation name and the state it was attempted in, e.g.
    /// "can't reveal while vote state is idle".
    #[error("can't {operation} while vote state is {state}")]
    InvalidStateTransition {
        operation: &'static str,
        state: VoteState,
    },

    /// A vote was submitted while nothing is being voted on, or after
    /// the votes were revealed.
    #[error("no active voting")]
    NoActiveVoting,

    /// The value isn't a card of the current deck.
    #[error("value '{0}' is not in the deck")]
    ValueNotInDeck(VoteValue),

    /// No vote item matches the given id or position.
    #[error("vote item {0} not found")]
    ItemNotFound(String),

    /// The vote item already has a result.
    #[error("vote item {0} is already finished")]
    ItemAlreadyFinished(String),

    /// The player hasn't received any state from the dealer yet.
    ///
    /// Right after joining, a player knows neither the deck nor the
    /// current item. The first state heartbeat from the dealer fixes that.
    #[error("no state received from the dealer yet")]
    NoState,

    /// A deck name is unknown or the cards are invalid.
    #[error("invalid deck: {0}")]
    InvalidDeck(String),

    /// The room key couldn't be generated.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The room session was left or shut down.
    ///
    /// Every handle operation returns this once the actor stopped,
    /// whether through `leave()`, the game's cancellation token, or the
    /// transport closing the room subscription.
    #[error("room session is closed")]
    SessionClosed,
}
