//! Codec trait and implementations for turning envelopes into bytes.
//!
//! A codec (coder/decoder) converts between Rust values and the raw bytes
//! the transport layer carries. The room session never calls `serde_json`
//! itself; it holds something that implements [`Codec`] and asks it to
//! encode outbound envelopes and decode inbound ones.
//!
//! [`JsonCodec`] is the codec every peer speaks today: each message is a
//! flat, field-tagged JSON object (see [`Envelope`](crate::Envelope)).
//! It sits behind the default `json` feature so a build that only needs
//! the data model can leave `serde_json` out.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes values to bytes and decodes them back.
///
/// ## Trait bounds
///
/// - `Send + Sync`: the codec lives in the room actor, which Tokio may
///   move between worker threads, and heartbeat tasks encode through it
///   concurrently.
/// - `'static`: the codec owns everything it needs, so it can be stored
///   in a task that runs for the whole session.
///
/// ## Generic methods
///
/// `encode` and `decode` are generic over the value type, so one codec
/// handles envelopes, states and anything else serde understands:
/// - `encode<T: Serialize>`: `T` can be turned into bytes.
/// - `decode<T: DeserializeOwned>`: `T` can be built from bytes without
///   borrowing from them, so the receive buffer can be dropped right
///   after decoding.
///
/// Generic methods make the trait unusable as `dyn Codec`; sessions pick
/// their codec statically.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails (the value
    /// contains something this format can't represent).
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// truncated, or don't match the expected type. Peers send whatever
    /// they like, so callers treat this as a dropped message, never as a
    /// fatal error.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use planpoker_protocol::{Codec, Envelope, JsonCodec, Player, PlayerId};
///
/// let codec = JsonCodec;
/// let envelope = Envelope::player_online(5000, Player::new(PlayerId::new("p-1"), "alice"));
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Envelope, Payload, PlayerId, VoteItemId, VoteValue};

    #[test]
    fn test_json_codec_decodes_vote() {
        let codec = JsonCodec;
        let env = Envelope::player_vote(
            10,
            PlayerId::new("p"),
            VoteItemId::new("i"),
            VoteValue::new("3"),
        );
        let bytes = codec.encode(&env).unwrap();
        let decoded: Envelope = codec.decode(&bytes).unwrap();
        assert!(matches!(decoded.payload, Payload::PlayerVote { .. }));
    }

    #[test]
    fn test_json_codec_garbage_is_decode_error() {
        let result: Result<Envelope, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
