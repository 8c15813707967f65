//! Fixed-period heartbeat scheduler for planpoker.
//!
//! Every participant re-announces its presence on a fixed period and the
//! dealer re-broadcasts the session state on a longer one. Both loops are
//! driven by a [`Heartbeat`] sitting inside a `tokio::select!`:
//!
//! ```ignore
//! let mut heartbeat = Heartbeat::new(HeartbeatConfig::every(period));
//! loop {
//!     tokio::select! {
//!         _ = cancel.cancelled() => break,
//!         _ = heartbeat.wait_for_beat() => publish_presence().await,
//!     }
//! }
//! ```
//!
//! # What the beats are for
//!
//! The room is a lossy broadcast channel with no history: a peer that
//! joins late, or misses a message, only catches up when something is
//! sent again. Presence beats let the dealer admit newcomers and let
//! everybody track who is still around; state beats hand the current
//! snapshot to players who missed the last change.
//!
//! # Disabled mode
//!
//! A zero period disables the heartbeat: [`Heartbeat::wait_for_beat`]
//! pends forever and the other `select!` branches keep running. Tests use
//! this to silence one of the two loops.
//!
//! # Falling behind
//!
//! A beat fires at its scheduled instant. If the caller was busy for a
//! full period or more, the missed beats are counted and dropped, never
//! replayed in a burst: re-sending the same presence five times in a row
//! carries no more information than sending it once.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration of a single heartbeat.
///
/// Build it with [`HeartbeatConfig::every`] and the chained setters:
///
/// ```
/// use std::time::Duration;
/// use planpoker_heartbeat::HeartbeatConfig;
///
/// let config = HeartbeatConfig::every(Duration::from_secs(10))
///     .with_jitter(Duration::from_millis(250));
/// assert!(config.fire_immediately);
/// assert!(!config.is_disabled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time between two beats. `Duration::ZERO` disables the heartbeat.
    pub period: Duration,
    /// Fire the first beat right away instead of after one period.
    pub fire_immediately: bool,
    /// Upper bound of a random delay added to the first beat, so that
    /// peers joining at the same instant don't broadcast in lockstep.
    pub initial_jitter: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            period: Duration::ZERO,
            fire_immediately: true,
            initial_jitter: Duration::ZERO,
        }
    }
}

impl HeartbeatConfig {
    /// A heartbeat with the given period that fires immediately, no jitter.
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// Sets the first-beat jitter bound.
    pub fn with_jitter(mut self, initial_jitter: Duration) -> Self {
        self.initial_jitter = initial_jitter;
        self
    }

    /// Waits one full period before the first beat.
    pub fn delayed(mut self) -> Self {
        self.fire_immediately = false;
        self
    }

    pub fn is_disabled(&self) -> bool {
        self.period.is_zero()
    }
}

// ---------------------------------------------------------------------------
// Beat info
// ---------------------------------------------------------------------------

/// Returned by [`Heartbeat::wait_for_beat`] each time a beat fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeatInfo {
    /// Monotonically increasing beat number, starting at 1.
    pub beat: u64,
    /// Beats that were due while the caller was busy and have been
    /// dropped. Missed beats are never replayed.
    pub skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Drives one periodic broadcast.
///
/// A `Heartbeat` only keeps time; it doesn't publish anything itself. The
/// owning task awaits [`wait_for_beat`](Self::wait_for_beat) in a
/// `select!` next to its cancellation branch and does the actual send
/// when a beat fires. Schedules use Tokio's clock, so tests with
/// `start_paused = true` run them without real waiting.
#[derive(Debug)]
pub struct Heartbeat {
    period: Duration,
    next_beat: Option<Instant>,
    beat_count: u64,
    total_skipped: u64,
}

impl Heartbeat {
    pub fn new(config: HeartbeatConfig) -> Self {
        if config.is_disabled() {
            debug!("heartbeat created disabled");
            return Self {
                period: config.period,
                next_beat: None,
                beat_count: 0,
                total_skipped: 0,
            };
        }

        let jitter = if config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max_ms = config.initial_jitter.as_millis().max(1) as u64;
            Duration::from_millis(rand::rng().random_range(0..max_ms))
        };
        let first_delay = if config.fire_immediately {
            Duration::ZERO
        } else {
            config.period
        };

        debug!(
            period_ms = config.period.as_millis() as u64,
            jitter_ms = jitter.as_millis() as u64,
            fire_immediately = config.fire_immediately,
            "heartbeat created"
        );

        Self {
            period: config.period,
            next_beat: Some(Instant::now() + first_delay + jitter),
            beat_count: 0,
            total_skipped: 0,
        }
    }

    /// Waits until the next beat is due.
    ///
    /// When the caller fell behind by one period or more, the missed
    /// beats are counted in [`BeatInfo::skipped`] and the schedule
    /// restarts from now.
    pub async fn wait_for_beat(&mut self) -> BeatInfo {
        let Some(next) = self.next_beat else {
            return std::future::pending().await;
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.beat_count += 1;

        let late_by = now.saturating_duration_since(next);
        let skipped = (late_by.as_nanos() / self.period.as_nanos()) as u64;
        self.next_beat = Some(if skipped > 0 {
            warn!(
                beat = self.beat_count,
                skipped,
                late_ms = late_by.as_millis() as u64,
                "heartbeat fell behind, skipping ahead"
            );
            now + self.period
        } else {
            next + self.period
        });
        self.total_skipped += skipped;

        trace!(beat = self.beat_count, "heartbeat fired");

        BeatInfo {
            beat: self.beat_count,
            skipped,
        }
    }

    /// Number of beats fired so far.
    pub fn beat_count(&self) -> u64 {
        self.beat_count
    }

    /// Total number of beats dropped because the caller fell behind.
    pub fn total_skipped(&self) -> u64 {
        self.total_skipped
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_disabled(&self) -> bool {
        self.next_beat.is_none()
    }
}
