//! Session configuration.

use std::time::Duration;

use planpoker_heartbeat::HeartbeatConfig;
use serde::{Deserialize, Serialize};

/// Settings for every room session started by a game.
///
/// Passed explicitly at construction; nothing is read from globals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// How often every participant announces its presence.
    pub presence_interval: Duration,

    /// How often the dealer re-broadcasts the full state.
    pub state_interval: Duration,

    /// Capacity of each local subscriber's notification channel.
    pub subscriber_buffer: usize,

    /// Capacity of the room actor's command channel.
    pub command_buffer: usize,

    /// Upper bound of the random delay before the first state re-broadcast.
    pub heartbeat_jitter: Duration,

    /// Name of the deck a new room starts with.
    pub default_deck: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            presence_interval: Duration::from_secs(5),
            state_interval: Duration::from_secs(10),
            subscriber_buffer: 10,
            command_buffer: 64,
            heartbeat_jitter: Duration::from_millis(250),
            default_deck: crate::decks::FIBONACCI.to_string(),
        }
    }
}

impl GameConfig {
    /// Presence heartbeat: fires on room entry, then every interval.
    pub fn presence_heartbeat(&self) -> HeartbeatConfig {
        HeartbeatConfig::every(self.presence_interval)
    }

    /// State heartbeat: fires shortly after room entry (jittered), then
    /// every interval.
    pub fn state_heartbeat(&self) -> HeartbeatConfig {
        HeartbeatConfig::every(self.state_interval).with_jitter(self.heartbeat_jitter)
    }
}
