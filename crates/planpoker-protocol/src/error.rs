//! Error types for the protocol layer.
//!
//! Each planpoker crate has its own error enum. A `ProtocolError` always
//! means the problem is in the bytes or strings peers exchange (a message
//! that doesn't decode, a room id that doesn't parse, a deck that isn't a
//! deck) and never in the network or the game rules.

/// Errors that can occur in the protocol layer.
///
/// `#[derive(thiserror::Error)]` generates the `std::error::Error` impl;
/// each `#[error("...")]` attribute is the message shown when the error
/// is printed or logged.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    ///
    /// With the types in this crate this only happens for values JSON
    /// can't represent. The inner `serde_json::Error` is kept so the log
    /// line says what went wrong.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, a missing `updatedAt`, wrong field
    /// types, or a `type` tag this build doesn't know. The session logs
    /// and drops such messages.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but violates protocol rules.
    ///
    /// Returned by [`Envelope::validate`](crate::Envelope::validate), for
    /// example for a presence message without a player id or a vote that
    /// doesn't name the item it is for.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The room identifier string can't be parsed.
    ///
    /// The reason names the part that failed: the number of parts, the
    /// version or length field, the base64 key, or a key whose decoded
    /// length doesn't match the declared one.
    #[error("malformed room id: {0}")]
    MalformedRoomId(String),

    /// The room identifier is well formed but uses a protocol version
    /// this build doesn't speak. Only [`ROOM_VERSION`](crate::ROOM_VERSION)
    /// is accepted.
    #[error("unsupported room version {0}")]
    UnsupportedVersion(u8),

    /// A deck is empty, contains an empty card, or contains the same card
    /// twice.
    ///
    /// The game layer reports this to callers as its own `InvalidDeck`.
    #[error("invalid deck: {0}")]
    InvalidDeck(String),
}
