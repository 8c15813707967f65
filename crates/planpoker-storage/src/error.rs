//! Error types for the storage layer.
//!
//! Storage is best-effort from the session's point of view: a failed save
//! is logged and the game goes on. The variants still carry the file path
//! so that the log line says which record is affected.

/// Errors that can occur while loading or saving local data.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing a file failed.
    ///
    /// `#[source]` keeps the `io::Error` reachable through
    /// `Error::source()`, so a caller printing the whole chain sees both
    /// the path and the OS reason (permission denied, disk full, ...).
    #[error("storage i/o failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A stored record couldn't be encoded or decoded.
    ///
    /// For room state this is reported to the caller. A corrupt player
    /// identity file is treated as missing instead, so a damaged file
    /// never locks a player out.
    #[error("storage record for {path} is invalid: {source}")]
    Serialization {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
