//! In-process pub/sub bus.
//!
//! Every clone of a [`MemoryTransport`] shares the same bus, so a dealer
//! and several players in one process (or one test) can talk to each
//! other. Messages are not encrypted; rooms are told apart by their
//! [`RoomId`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use planpoker_protocol::{Room, RoomId};
use tokio::sync::mpsc;

use crate::{Subscription, Transport, TransportError};

type Subscribers = HashMap<RoomId, Vec<(u64, mpsc::UnboundedSender<Vec<u8>>)>>;

#[derive(Default)]
struct Bus {
    subscribers: Mutex<Subscribers>,
    next_subscriber: AtomicU64,
    offline: AtomicBool,
    published: AtomicU64,
}

impl Bus {
    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        // A poisoned lock only means another holder panicked mid-update;
        // the map itself is still usable.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A [`Transport`] that delivers messages between tasks of one process.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    bus: Arc<Bus>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates losing (or regaining) connectivity. While offline,
    /// subscribe and publish fail with [`TransportError::Offline`].
    pub fn set_online(&self, online: bool) {
        self.bus.offline.store(!online, Ordering::SeqCst);
        tracing::debug!(online, "memory transport connectivity changed");
    }

    /// Number of live subscriptions for a room.
    pub fn subscriber_count(&self, room: &Room) -> usize {
        self.bus
            .lock()
            .get(&room.to_room_id())
            .map_or(0, |subs| subs.iter().filter(|(_, tx)| !tx.is_closed()).count())
    }

    /// Total number of messages successfully published on this bus.
    pub fn published_count(&self) -> u64 {
        self.bus.published.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), TransportError> {
        if self.bus.offline.load(Ordering::SeqCst) {
            Err(TransportError::Offline)
        } else {
            Ok(())
        }
    }
}

impl Transport for MemoryTransport {
    async fn subscribe(&self, room: &Room) -> Result<Subscription, TransportError> {
        self.check_online()?;

        let room_id = room.to_room_id();
        let id = self.bus.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.bus
            .lock()
            .entry(room_id.clone())
            .or_default()
            .push((id, tx));
        tracing::debug!(subscriber = id, "memory transport subscribed");

        let bus = Arc::clone(&self.bus);
        Ok(Subscription::new(rx).with_unsubscribe(move || {
            let mut subscribers = bus.lock();
            if let Some(subs) = subscribers.get_mut(&room_id) {
                subs.retain(|(sub_id, _)| *sub_id != id);
                if subs.is_empty() {
                    subscribers.remove(&room_id);
                }
            }
        }))
    }

    async fn publish(&self, room: &Room, payload: Vec<u8>) -> Result<(), TransportError> {
        self.check_online()?;

        let room_id = room.to_room_id();
        let mut subscribers = self.bus.lock();
        if let Some(subs) = subscribers.get_mut(&room_id) {
            // Prune receivers that went away without unsubscribing.
            subs.retain(|(_, tx)| tx.send(payload.clone()).is_ok());
        }
        drop(subscribers);

        self.bus.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
