//! Message envelopes exchanged inside a room.
//!
//! Every message is a flat JSON object: a `type` tag, the sender's
//! millisecond timestamp and the fields of its payload.
//!
//! ```json
//! { "type": "__player_vote", "updatedAt": 1700000000000,
//!   "playerId": "…", "issue": "…", "vote": "5" }
//! ```
//!
//! The payload is a closed enum, decoded once and matched exhaustively by
//! the session. An unknown `type` tag fails to decode.

use serde::{Deserialize, Serialize};

use crate::{Player, PlayerId, ProtocolError, State, VoteItemId, VoteValue};

/// Tag names on the wire.
pub mod tags {
    pub const STATE: &str = "__state";
    pub const PLAYER_ONLINE: &str = "__player_online";
    pub const PLAYER_VOTE: &str = "__player_vote";
}

/// The typed content of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Payload {
    /// Dealer → all: the full (projected) session state.
    #[serde(rename = "__state")]
    State { state: State },

    /// Any → all: presence heartbeat, also carries display-name changes.
    #[serde(rename = "__player_online")]
    PlayerOnline { player: Player },

    /// Player → dealer: a vote for a specific item.
    #[serde(rename = "__player_vote", rename_all = "camelCase")]
    PlayerVote {
        player_id: PlayerId,
        issue: VoteItemId,
        vote: VoteValue,
    },
}

impl Payload {
    /// The wire tag of this payload, handy for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::State { .. } => tags::STATE,
            Self::PlayerOnline { .. } => tags::PLAYER_ONLINE,
            Self::PlayerVote { .. } => tags::PLAYER_VOTE,
        }
    }
}

/// A timestamped message.
///
/// The timestamp was originally written as `updatedAt`; `timestamp` is
/// accepted on input as well so peers can move to the new name. Output
/// keeps `updatedAt` until every peer reads both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Milliseconds since the Unix epoch, set by the sender.
    #[serde(rename = "updatedAt", alias = "timestamp")]
    pub timestamp: i64,

    #[serde(flatten)]
    pub payload: Payload,
}

impl Envelope {
    pub fn new(timestamp: i64, payload: Payload) -> Self {
        Self { timestamp, payload }
    }

    pub fn state(timestamp: i64, state: State) -> Self {
        Self::new(timestamp, Payload::State { state })
    }

    pub fn player_online(timestamp: i64, player: Player) -> Self {
        Self::new(timestamp, Payload::PlayerOnline { player })
    }

    pub fn player_vote(
        timestamp: i64,
        player_id: PlayerId,
        issue: VoteItemId,
        vote: VoteValue,
    ) -> Self {
        Self::new(
            timestamp,
            Payload::PlayerVote {
                player_id,
                issue,
                vote,
            },
        )
    }

    /// Checks the rules serde can't express.
    ///
    /// A message that decodes may still be unusable: a presence without a
    /// player id would register a nameless ghost at the dealer, and a vote
    /// without a player or item id can never be matched to anything.
    /// Timestamps must be non-negative milliseconds.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] describing the first
    /// violation found.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.timestamp < 0 {
            return Err(ProtocolError::InvalidMessage(format!(
                "negative timestamp {}",
                self.timestamp
            )));
        }
        match &self.payload {
            Payload::State { .. } => Ok(()),
            Payload::PlayerOnline { player } if player.id.as_str().is_empty() => Err(
                ProtocolError::InvalidMessage("presence without player id".into()),
            ),
            Payload::PlayerOnline { .. } => Ok(()),
            Payload::PlayerVote {
                player_id, issue, ..
            } => {
                if player_id.as_str().is_empty() {
                    Err(ProtocolError::InvalidMessage("vote without player id".into()))
                } else if issue.as_str().is_empty() {
                    Err(ProtocolError::InvalidMessage("vote without item id".into()))
                } else {
                    Ok(())
                }
            }
        }
    }
}
