//! Core data model for planning poker sessions.
//!
//! Every type here travels on the wire inside a state snapshot, so the
//! serde attributes are part of the public protocol: field names are
//! camelCase and must not be renamed without keeping an alias.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player.
///
/// Opaque string, generated from a UUID when a player first starts the
/// application. `#[serde(transparent)]` keeps it a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unique identifier for a vote item (an issue being estimated).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteItemId(pub String);

impl VoteItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoteItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A participant of the session.
///
/// `order` is the join position assigned by the dealer on first sighting.
/// It only exists for stable display ordering and is never reassigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub is_dealer: bool,
    #[serde(default)]
    pub order: usize,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_dealer: false,
            order: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Votes and decks
// ---------------------------------------------------------------------------

/// A single card value, e.g. `"5"` or `"XL"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteValue(pub String);

impl VoteValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VoteValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// An ordered sequence of distinct card values.
///
/// Order matters: it's the scale the votes are placed on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deck(Vec<VoteValue>);

impl Deck {
    /// Builds a deck from card values, rejecting empty input and duplicates.
    pub fn new<I, V>(cards: I) -> Result<Self, ProtocolError>
    where
        I: IntoIterator<Item = V>,
        V: Into<VoteValue>,
    {
        let mut deck = Vec::new();
        for card in cards {
            let card = card.into();
            if card.as_str().is_empty() {
                return Err(ProtocolError::InvalidDeck("empty card".into()));
            }
            if deck.contains(&card) {
                return Err(ProtocolError::InvalidDeck(format!(
                    "duplicate card: '{card}'"
                )));
            }
            deck.push(card);
        }
        if deck.is_empty() {
            return Err(ProtocolError::InvalidDeck("deck can't be empty".into()));
        }
        Ok(Self(deck))
    }

    pub fn contains(&self, value: &VoteValue) -> bool {
        self.0.contains(value)
    }

    /// Position of a value on the deck's scale.
    pub fn position(&self, value: &VoteValue) -> Option<usize> {
        self.0.iter().position(|v| v == value)
    }

    pub fn cards(&self) -> &[VoteValue] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cards: Vec<&str> = self.0.iter().map(VoteValue::as_str).collect();
        write!(f, "[{}]", cards.join(", "))
    }
}

// ---------------------------------------------------------------------------
// VoteItem
// ---------------------------------------------------------------------------

/// One estimable unit of work.
///
/// `votes` maps each player to their vote. A `None` value is a presence
/// marker: the player has voted but the value is hidden. `result` is set
/// once, when the dealer finishes the item, and never changes after that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteItem {
    pub id: VoteItemId,
    #[serde(alias = "titleOrUrl")]
    pub text: String,
    #[serde(default)]
    pub votes: HashMap<PlayerId, Option<VoteValue>>,
    #[serde(default)]
    pub revealed: bool,
    #[serde(default)]
    pub result: Option<VoteValue>,
    #[serde(default)]
    pub order: usize,
}

impl VoteItem {
    pub fn new(id: VoteItemId, text: impl Into<String>, order: usize) -> Self {
        Self {
            id,
            text: text.into(),
            votes: HashMap::new(),
            revealed: false,
            result: None,
            order,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }
}

// ---------------------------------------------------------------------------
// VoteState
// ---------------------------------------------------------------------------

/// Where the current vote item is in its lifecycle.
///
/// ```text
/// Idle ──deal──→ Voting ──reveal──→ Revealed ──finish──→ Finished ──deal──→ Voting
/// ```
///
/// Never stored: always derived from the state by [`State::vote_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteState {
    Idle,
    Voting,
    Revealed,
    Finished,
}

impl VoteState {
    /// Returns `true` if a new item can be dealt or the deck changed.
    pub fn accepts_deal(&self) -> bool {
        matches!(self, Self::Idle | Self::Finished)
    }
}

impl fmt::Display for VoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Voting => write!(f, "voting"),
            Self::Revealed => write!(f, "revealed"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The authoritative session snapshot owned by the dealer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    #[serde(default)]
    pub players: HashMap<PlayerId, Player>,
    #[serde(default)]
    pub deck: Deck,
    #[serde(default)]
    pub current_item_id: Option<VoteItemId>,
    #[serde(default)]
    pub vote_list: HashMap<VoteItemId, VoteItem>,
    /// Milliseconds since the Unix epoch of the last dealer mutation.
    #[serde(default)]
    pub timestamp: i64,
}

impl State {
    /// Creates an idle state with no players and no items.
    pub fn new(deck: Deck) -> Self {
        Self {
            deck,
            ..Self::default()
        }
    }

    /// Derives the vote state from the current item.
    ///
    /// - no current item → `Idle`
    /// - current item not revealed → `Voting`
    /// - revealed without result → `Revealed`
    /// - result set → `Finished`
    ///
    /// A dangling `current_item_id` is treated as `Idle`.
    pub fn vote_state(&self) -> VoteState {
        let Some(item) = self.current_item() else {
            return VoteState::Idle;
        };
        match (item.revealed, item.result.is_some()) {
            (false, _) => VoteState::Voting,
            (true, false) => VoteState::Revealed,
            (true, true) => VoteState::Finished,
        }
    }

    pub fn current_item(&self) -> Option<&VoteItem> {
        self.current_item_id
            .as_ref()
            .and_then(|id| self.vote_list.get(id))
    }

    pub fn current_item_mut(&mut self) -> Option<&mut VoteItem> {
        let id = self.current_item_id.as_ref()?;
        self.vote_list.get_mut(id)
    }

    /// The order value the next vote item gets.
    pub fn next_item_order(&self) -> usize {
        self.vote_list
            .values()
            .map(|item| item.order + 1)
            .max()
            .unwrap_or(0)
    }

    /// The order value the next newly seen player gets.
    pub fn next_player_order(&self) -> usize {
        self.players
            .values()
            .map(|p| p.order + 1)
            .max()
            .unwrap_or(0)
    }

    /// Vote items sorted by their display order.
    pub fn items_in_order(&self) -> Vec<&VoteItem> {
        let mut items: Vec<&VoteItem> = self.vote_list.values().collect();
        items.sort_by_key(|item| item.order);
        items
    }

    /// Players sorted by their join order.
    pub fn players_in_order(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by_key(|p| p.order);
        players
    }

    /// The player flagged as dealer, if any.
    pub fn dealer(&self) -> Option<&Player> {
        self.players.values().find(|p| p.is_dealer)
    }
}

// =========================================================================
// Tests
// =========================================================================
