//! Error types for the transport layer.
//!
//! Transport failures are the only errors a room session can't do much
//! about: the session logs failed publishes and keeps going, and only a
//! failed subscribe (joining or creating a room) reaches the caller.

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Subscribing to a room's messages failed.
    ///
    /// The string carries the underlying network error as text, since
    /// every transport has its own error type.
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    /// Publishing a message to a room failed.
    ///
    /// Publishes are fire-and-forget for session operations, so this
    /// variant usually ends up in a `warn!` line rather than in a caller's
    /// `Result`.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// The transport is not connected to any peers.
    ///
    /// [`MemoryTransport::set_online`](crate::MemoryTransport::set_online)
    /// produces this to simulate losing the network.
    #[error("transport offline")]
    Offline,

    /// The transport was shut down and accepts no more work.
    #[error("transport shut down")]
    Shutdown,
}
