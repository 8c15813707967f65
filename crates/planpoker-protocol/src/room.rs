//! Room identity: the shared secret that defines an encrypted channel.
//!
//! A [`Room`] is a protocol version plus a symmetric key. Its [`RoomId`]
//! is a short, copy-pasteable string that anyone can use to join:
//!
//! ```text
//! 1.16.q83vEjRWeJCrze8SNFZ4kA
//! │ │  └─ key bytes, base64url without padding
//! │ └──── key length in bytes
//! └────── protocol version
//! ```

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// The only room protocol version this build speaks.
pub const ROOM_VERSION: u8 = 1;

/// Length of a freshly generated symmetric key.
pub const SYMMETRIC_KEY_LENGTH: usize = 16;

const SEPARATOR: char = '.';

/// A room: protocol version and symmetric key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Room {
    version: u8,
    symmetric_key: Vec<u8>,
}

impl Room {
    /// Wraps an existing key with the current protocol version.
    pub fn new(symmetric_key: Vec<u8>) -> Self {
        Self {
            version: ROOM_VERSION,
            symmetric_key,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn symmetric_key(&self) -> &[u8] {
        &self.symmetric_key
    }

    /// Encodes the room into its shareable identifier.
    pub fn to_room_id(&self) -> RoomId {
        RoomId(format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.version,
            self.symmetric_key.len(),
            URL_SAFE_NO_PAD.encode(&self.symmetric_key)
        ))
    }
}

// The key is a secret: never print it in logs.
impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("version", &self.version)
            .field("key_len", &self.symmetric_key.len())
            .finish()
    }
}

/// The canonical string encoding of a [`Room`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the identifier back into a [`Room`].
    pub fn to_room(&self) -> Result<Room, ProtocolError> {
        parse_room_id(&self.0)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomId {
    type Err = ProtocolError;

    /// Validates the string and returns it in canonical form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse_room_id(s)?.to_room_id())
    }
}

/// Parses a room identifier string.
///
/// # Errors
/// - [`ProtocolError::MalformedRoomId`] on a wrong number of parts, a
///   non-numeric version or length, invalid base64, an empty key, or a
///   length that doesn't match the decoded key.
/// - [`ProtocolError::UnsupportedVersion`] if the version isn't
///   [`ROOM_VERSION`].
pub fn parse_room_id(input: &str) -> Result<Room, ProtocolError> {
    let parts: Vec<&str> = input.trim().split(SEPARATOR).collect();
    let [version, length, key] = parts.as_slice() else {
        return Err(ProtocolError::MalformedRoomId(format!(
            "expected 3 parts separated by '{SEPARATOR}', got {}",
            parts.len()
        )));
    };

    let version: u8 = version.parse().map_err(|_| {
        ProtocolError::MalformedRoomId(format!("invalid version '{version}'"))
    })?;
    if version != ROOM_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let length: usize = length.parse().map_err(|_| {
        ProtocolError::MalformedRoomId(format!("invalid key length '{length}'"))
    })?;

    let symmetric_key = URL_SAFE_NO_PAD.decode(key).map_err(|e| {
        ProtocolError::MalformedRoomId(format!("invalid key encoding: {e}"))
    })?;
    if symmetric_key.is_empty() {
        return Err(ProtocolError::MalformedRoomId("empty key".into()));
    }
    if symmetric_key.len() != length {
        return Err(ProtocolError::MalformedRoomId(format!(
            "key length mismatch: declared {length}, decoded {}",
            symmetric_key.len()
        )));
    }

    Ok(Room {
        version,
        symmetric_key,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn room() -> Room {
        Room::new((0u8..16).collect())
    }

    #[test]
    fn test_room_id_round_trip() {
        let original = room();
        let parsed = parse_room_id(original.to_room_id().as_str()).unwrap();
        assert_eq!(parsed, original);
        assert_eq!(parsed.version(), ROOM_VERSION);
        assert_eq!(parsed.symmetric_key(), original.symmetric_key());
    }

    proptest! {
        #[test]
        fn test_room_id_round_trips_for_any_key(key in prop::collection::vec(any::<u8>(), 1..64)) {
            let room = Room::new(key);
            let id = room.to_room_id();

            let parsed = parse_room_id(id.as_str()).unwrap();
            prop_assert_eq!(&parsed, &room);

            let prefix = format!("{ROOM_VERSION}.{}.", room.symmetric_key().len());
            prop_assert!(id.as_str().starts_with(&prefix));
            prop_assert_eq!(id.as_str().parse::<RoomId>().unwrap(), id);
        }

        #[test]
        fn test_parse_never_panics(input in ".{0,40}") {
            let _ = parse_room_id(&input);
        }
    }

    #[test]
    fn test_room_id_format() {
        let id = room().to_room_id();
        assert!(id.as_str().starts_with("1.16."));
        assert_eq!(id.as_str().split('.').count(), 3);
    }

    #[test]
    fn test_room_id_from_str_is_canonical() {
        let id = room().to_room_id();
        let padded = format!("  {id} ");
        let parsed: RoomId = padded.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_wrong_part_count() {
        let err = parse_room_id("1.16").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedRoomId(_)));
        let err = parse_room_id("1.16.abc.def").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedRoomId(_)));
    }

    #[test]
    fn test_parse_unsupported_version() {
        let id = room().to_room_id().as_str().replacen('1', "2", 1);
        let err = parse_room_id(&id).unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedVersion(2)));
    }

    #[test]
    fn test_parse_invalid_base64() {
        let err = parse_room_id("1.16.!!!!").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedRoomId(_)));
    }

    #[test]
    fn test_parse_length_mismatch() {
        let key = URL_SAFE_NO_PAD.encode([1u8, 2, 3]);
        let err = parse_room_id(&format!("1.16.{key}")).unwrap_err();
        assert!(err.to_string().contains("length mismatch"));
    }

    #[test]
    fn test_parse_empty_key() {
        let err = parse_room_id("1.0.").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedRoomId(_)));
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let debug = format!("{:?}", Room::new(vec![0xAB; 16]));
        assert!(!debug.contains("171"));
        assert!(debug.contains("key_len"));
    }
}
