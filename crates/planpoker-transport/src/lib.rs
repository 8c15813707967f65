//! Transport abstraction layer for planpoker.
//!
//! A session never talks to the network directly. It consumes a narrow
//! pub/sub contract: subscribe to a room's message stream, publish bytes
//! to a room. Delivery, encryption with the room key and peer discovery
//! are the transport's business.
//!
//! # Feature Flags
//!
//! - `memory` (default): [`MemoryTransport`], an in-process bus

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::TransportError;
#[cfg(feature = "memory")]
pub use memory::MemoryTransport;

use std::fmt;
use std::future::Future;

use planpoker_protocol::Room;
use tokio::sync::mpsc;

/// Publishes and receives raw messages on a room's channel.
///
/// Both methods return `Send` futures because the session publishes from
/// spawned tasks.
pub trait Transport: Send + Sync + 'static {
    /// Starts receiving every message published to `room`, including the
    /// subscriber's own.
    fn subscribe(
        &self,
        room: &Room,
    ) -> impl Future<Output = Result<Subscription, TransportError>> + Send;

    /// Publishes `payload` to everyone subscribed to `room`.
    fn publish(
        &self,
        room: &Room,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// A live stream of raw messages for one room.
///
/// Dropping the subscription unsubscribes.
pub struct Subscription {
    messages: mpsc::UnboundedReceiver<Vec<u8>>,
    on_unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(messages: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            messages,
            on_unsubscribe: None,
        }
    }

    /// Registers a hook that runs exactly once when the subscription ends.
    pub fn with_unsubscribe(
        mut self,
        hook: impl FnOnce() + Send + 'static,
    ) -> Self {
        self.on_unsubscribe = Some(Box::new(hook));
        self
    }

    /// Receives the next message. `None` once the transport closed the
    /// stream.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.messages.recv().await
    }

    /// Ends the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.messages.close();
        if let Some(hook) = self.on_unsubscribe.take() {
            hook();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("has_unsubscribe_hook", &self.on_unsubscribe.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_subscription_receives_in_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sub = Subscription::new(rx);
        tx.send(b"one".to_vec()).unwrap();
        tx.send(b"two".to_vec()).unwrap();

        assert_eq!(sub.recv().await.unwrap(), b"one");
        assert_eq!(sub.recv().await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_subscription_ends_when_sender_dropped() {
        let (tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let mut sub = Subscription::new(rx);
        drop(tx);
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn test_unsubscribe_hook_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let counter = Arc::clone(&calls);
        let sub = Subscription::new(rx).with_unsubscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sub.unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_closes_channel() {
        let (tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
        Subscription::new(rx).unsubscribe();
        assert!(tx.is_closed());
    }
}
