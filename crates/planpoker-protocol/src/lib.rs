//! Wire protocol for planpoker.
//!
//! This crate defines what peers in a room agree on:
//!
//! - **Room identity** ([`Room`], [`RoomId`]): the shared secret that
//!   defines the channel, and its shareable string form.
//! - **Data model** ([`State`], [`VoteItem`], [`Player`], [`Deck`], …):
//!   the session snapshot the dealer owns and broadcasts.
//! - **Envelopes** ([`Envelope`], [`Payload`]): timestamped messages.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes become bytes.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Game (state machine)
//! ```

mod codec;
mod error;
mod message;
mod room;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use message::{tags, Envelope, Payload};
pub use room::{parse_room_id, Room, RoomId, ROOM_VERSION, SYMMETRIC_KEY_LENGTH};
pub use types::{
    Deck, Player, PlayerId, State, VoteItem, VoteItemId, VoteState, VoteValue,
};
