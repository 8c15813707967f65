//! Local subscriber fan-out.
//!
//! Every local observer gets its own bounded channel of state views.
//! Sending waits for room in each channel, so a subscriber that stops
//! reading holds back the others; the wait is abandoned as soon as the
//! session is cancelled.

use planpoker_protocol::State;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Receiving end handed to a local observer.
pub type StateReceiver = mpsc::Receiver<State>;

#[derive(Debug)]
pub(crate) struct Subscribers {
    buffer: usize,
    senders: Vec<mpsc::Sender<State>>,
    closed: bool,
}

impl Subscribers {
    pub(crate) fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            senders: Vec::new(),
            closed: false,
        }
    }

    /// Registers a new observer. After [`close`](Self::close) the
    /// returned receiver is already closed.
    pub(crate) fn subscribe(&mut self) -> StateReceiver {
        let (tx, rx) = mpsc::channel(self.buffer);
        if !self.closed {
            self.senders.push(tx);
        }
        rx
    }

    /// Delivers `view` to every observer, dropping the ones that went away.
    ///
    /// Returns `false` if cancellation interrupted the delivery.
    pub(crate) async fn notify(&mut self, view: &State, cancel: &CancellationToken) -> bool {
        if self.closed {
            return false;
        }
        let mut alive = Vec::with_capacity(self.senders.len());
        for tx in self.senders.drain(..) {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                sent = tx.send(view.clone()) => {
                    if sent.is_ok() {
                        alive.push(tx);
                    } else {
                        tracing::debug!("state subscriber went away");
                    }
                }
            }
        }
        self.senders = alive;
        true
    }

    /// Closes every observer channel. Later calls do nothing.
    pub(crate) fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.senders.clear();
            tracing::debug!("state subscribers closed");
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}
