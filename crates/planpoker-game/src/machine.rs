//! The session state machine.
//!
//! [`GameCore`] owns the local copy of the session [`State`] and applies
//! every local operation and inbound peer message to it. It does no I/O:
//! each call returns [`Effects`] telling the room actor what to persist,
//! who to notify and what to publish.
//!
//! Two roles share the same type:
//!
//! - **Dealer**: owns the authoritative state, mutates it and
//!   broadcasts the projected view.
//! - **Player**: holds the last snapshot received from the dealer and
//!   only ever replaces it wholesale with a newer one.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use planpoker_protocol::{
    Deck, Envelope, Payload, Player, PlayerId, State, VoteItem, VoteItemId, VoteState, VoteValue,
};
use tracing::{debug, info, trace, warn};

use crate::projection::{project, with_own_vote};
use crate::GameError;

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// What the room actor must do after a call into [`GameCore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Effects {
    /// The local state changed: persist it.
    pub state_changed: bool,
    /// Local subscribers need a fresh view.
    pub notify: bool,
    /// Publish the projected state to the room.
    pub broadcast_state: bool,
    /// Publish this message to the room.
    pub publish: Option<Payload>,
}

impl Effects {
    pub fn none() -> Self {
        Self::default()
    }

    /// A dealer mutation: persist, notify and broadcast.
    fn dealer_mutation() -> Self {
        Self {
            state_changed: true,
            notify: true,
            broadcast_state: true,
            publish: None,
        }
    }

    /// A snapshot from the dealer replaced the local state.
    fn state_replaced() -> Self {
        Self {
            state_changed: true,
            notify: true,
            ..Self::default()
        }
    }

    fn notify_only() -> Self {
        Self {
            notify: true,
            ..Self::default()
        }
    }

    fn with_publish(mut self, payload: Payload) -> Self {
        self.publish = Some(payload);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ---------------------------------------------------------------------------
// GameCore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Dealer,
    Player,
}

/// The local vote of this participant, tied to the item it was cast on.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OwnVote {
    item_id: VoteItemId,
    value: VoteValue,
}

/// Session state plus the rules to change it.
#[derive(Debug, Clone)]
pub struct GameCore {
    role: Role,
    player: Player,
    state: State,
    /// Timestamp of the last snapshot applied by a player.
    last_applied: i64,
    /// Set once a player got its first snapshot.
    has_state: bool,
    own_vote: Option<OwnVote>,
    last_seen: HashMap<PlayerId, i64>,
    /// Per player: the item and sender timestamp of the last applied vote.
    vote_stamps: HashMap<PlayerId, (VoteItemId, i64)>,
}

impl GameCore {
    /// A dealer with a fresh idle state.
    ///
    /// The dealer isn't listed in `players` until its own presence is
    /// applied, which the room session does on start.
    pub fn new_dealer(mut player: Player, deck: Deck) -> Self {
        player.is_dealer = true;
        let mut state = State::new(deck);
        state.timestamp = now_millis();
        Self {
            role: Role::Dealer,
            player,
            state,
            last_applied: 0,
            has_state: true,
            own_vote: None,
            last_seen: HashMap::new(),
            vote_stamps: HashMap::new(),
        }
    }

    /// A player waiting for its first snapshot.
    pub fn new_player(mut player: Player) -> Self {
        player.is_dealer = false;
        Self {
            role: Role::Player,
            player,
            state: State::default(),
            last_applied: 0,
            has_state: false,
            own_vote: None,
            last_seen: HashMap::new(),
            vote_stamps: HashMap::new(),
        }
    }

    /// A dealer continuing from a stored state.
    pub fn resume_dealer(mut player: Player, state: State) -> Self {
        player.is_dealer = true;
        let mut core = Self {
            role: Role::Dealer,
            last_applied: state.timestamp,
            player,
            state,
            has_state: true,
            own_vote: None,
            last_seen: HashMap::new(),
            vote_stamps: HashMap::new(),
        };
        if let Some(own) = core.state.players.get_mut(&core.player.id) {
            own.is_dealer = true;
            own.name = core.player.name.clone();
            core.player.order = own.order;
        }
        core
    }

    // -- accessors --------------------------------------------------------

    /// The local state: authoritative for a dealer, the last received
    /// snapshot for a player.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// The view broadcast to peers.
    pub fn projected_state(&self) -> State {
        project(&self.state)
    }

    /// The view shown to local observers: projected, with the own vote
    /// put back.
    pub fn view(&self) -> State {
        with_own_vote(self.projected_state(), &self.player.id, self.my_vote())
    }

    pub fn is_dealer(&self) -> bool {
        self.role == Role::Dealer
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    /// The local vote on the current item, if any.
    pub fn my_vote(&self) -> Option<&VoteValue> {
        let own = self.own_vote.as_ref()?;
        (self.state.current_item_id.as_ref() == Some(&own.item_id)).then_some(&own.value)
    }

    /// When a presence message from this player was last received, in
    /// local milliseconds since the Unix epoch.
    pub fn last_seen(&self, player_id: &PlayerId) -> Option<i64> {
        self.last_seen.get(player_id).copied()
    }

    /// Timestamp of the last snapshot accepted from the dealer.
    pub fn last_applied(&self) -> i64 {
        self.last_applied
    }

    // -- dealer operations ------------------------------------------------

    /// Starts voting on a new item.
    pub fn deal(&mut self, text: &str) -> Result<(VoteItemId, Effects), GameError> {
        self.require_dealer()?;
        self.require_deal_allowed("deal")?;

        let id = self.insert_item(text);
        self.state.current_item_id = Some(id.clone());
        self.touch();
        info!(item_id = %id, text, "dealt new vote item");
        Ok((id, Effects::dealer_mutation()))
    }

    /// Appends an item to the list without starting a vote on it.
    pub fn add_item(&mut self, text: &str) -> Result<(VoteItemId, Effects), GameError> {
        self.require_dealer()?;

        let id = self.insert_item(text);
        self.touch();
        debug!(item_id = %id, text, "vote item added");
        Ok((id, Effects::dealer_mutation()))
    }

    /// Starts voting on the item at display position `index`.
    pub fn select_item(&mut self, index: usize) -> Result<(VoteItemId, Effects), GameError> {
        self.require_dealer()?;
        self.require_deal_allowed("select item")?;

        let item = self
            .state
            .items_in_order()
            .get(index)
            .map(|item| (item.id.clone(), item.is_finished()));
        let (id, finished) = item.ok_or_else(|| GameError::ItemNotFound(format!("#{index}")))?;
        if finished {
            return Err(GameError::ItemAlreadyFinished(id.to_string()));
        }

        if let Some(item) = self.state.vote_list.get_mut(&id) {
            item.revealed = false;
            item.votes.clear();
        }
        self.state.current_item_id = Some(id.clone());
        self.touch();
        info!(item_id = %id, index, "selected vote item");
        Ok((id, Effects::dealer_mutation()))
    }

    /// Shows the votes of the current item.
    pub fn reveal(&mut self) -> Result<Effects, GameError> {
        self.require_dealer()?;
        let state = self.state.vote_state();
        if state != VoteState::Voting {
            return Err(GameError::InvalidStateTransition {
                operation: "reveal",
                state,
            });
        }

        if let Some(item) = self.state.current_item_mut() {
            item.revealed = true;
        }
        self.touch();
        info!(item_id = ?self.state.current_item_id, "votes revealed");
        Ok(Effects::dealer_mutation())
    }

    /// Sets the final result of the current item.
    pub fn finish(&mut self, value: VoteValue) -> Result<Effects, GameError> {
        self.require_dealer()?;
        let state = self.state.vote_state();
        if state != VoteState::Revealed {
            return Err(GameError::InvalidStateTransition {
                operation: "finish",
                state,
            });
        }
        if !self.state.deck.contains(&value) {
            return Err(GameError::ValueNotInDeck(value));
        }

        if let Some(item) = self.state.current_item_mut() {
            item.result = Some(value.clone());
        }
        self.touch();
        info!(item_id = ?self.state.current_item_id, result = %value, "vote item finished");
        Ok(Effects::dealer_mutation())
    }

    /// Replaces the deck.
    pub fn set_deck(&mut self, deck: Deck) -> Result<Effects, GameError> {
        self.require_dealer()?;
        self.require_deal_allowed("change deck")?;

        info!(deck = %deck, "deck changed");
        self.state.deck = deck;
        self.touch();
        Ok(Effects::dealer_mutation())
    }

    // -- any participant --------------------------------------------------

    /// Casts the local vote on the current item.
    ///
    /// A dealer records it directly; a player publishes it to the dealer.
    pub fn submit_vote(&mut self, value: VoteValue) -> Result<Effects, GameError> {
        if !self.has_state {
            return Err(GameError::NoState);
        }
        if self.state.vote_state() != VoteState::Voting {
            return Err(GameError::NoActiveVoting);
        }
        if !self.state.deck.contains(&value) {
            return Err(GameError::ValueNotInDeck(value));
        }
        let Some(item_id) = self.state.current_item_id.clone() else {
            return Err(GameError::NoActiveVoting);
        };

        self.own_vote = Some(OwnVote {
            item_id: item_id.clone(),
            value: value.clone(),
        });
        debug!(item_id = %item_id, vote = %value, "vote submitted");

        if self.is_dealer() {
            if let Some(item) = self.state.current_item_mut() {
                item.votes.insert(self.player.id.clone(), Some(value));
            }
            self.touch();
            return Ok(Effects::dealer_mutation());
        }

        Ok(Effects::notify_only().with_publish(Payload::PlayerVote {
            player_id: self.player.id.clone(),
            issue: item_id,
            vote: value,
        }))
    }

    /// Changes the local display name and announces it.
    pub fn rename(&mut self, name: &str) -> Effects {
        let name = name.trim();
        info!(old = %self.player.name, new = name, "player renamed");
        self.player.name = name.to_string();

        let mut effects = Effects::notify_only();
        if self.is_dealer() {
            if let Some(own) = self.state.players.get_mut(&self.player.id) {
                own.name = self.player.name.clone();
                self.touch();
                effects = Effects::dealer_mutation();
            }
        }
        effects.with_publish(Payload::PlayerOnline {
            player: self.player.clone(),
        })
    }

    // -- inbound peer messages --------------------------------------------

    /// Applies a decoded message from the room.
    ///
    /// Messages failing [`Envelope::validate`] are logged and dropped.
    pub fn apply_envelope(&mut self, envelope: Envelope) -> Effects {
        if let Err(e) = envelope.validate() {
            warn!(kind = envelope.payload.kind(), error = %e, "invalid room message dropped");
            return Effects::none();
        }
        trace!(kind = envelope.payload.kind(), timestamp = envelope.timestamp, "applying message");
        match envelope.payload {
            Payload::State { state } => self.apply_peer_state(state, envelope.timestamp),
            Payload::PlayerOnline { player } => self.apply_peer_presence(player),
            Payload::PlayerVote {
                player_id,
                issue,
                vote,
            } => self.apply_peer_vote(player_id, issue, vote, envelope.timestamp),
        }
    }

    /// Replaces a player's state with a dealer snapshot.
    ///
    /// Dealers ignore snapshots. Snapshots older than the last applied
    /// one are dropped. A snapshot equal to the held state (the dealer's
    /// periodic re-broadcast) only advances the timestamp: nothing is
    /// saved and nobody is notified.
    pub fn apply_peer_state(&mut self, state: State, timestamp: i64) -> Effects {
        if self.is_dealer() {
            trace!("dealer ignores inbound state");
            return Effects::none();
        }
        if timestamp < self.last_applied {
            warn!(
                timestamp,
                last_applied = self.last_applied,
                "stale state snapshot dropped"
            );
            return Effects::none();
        }

        if self.has_state && state == self.state {
            trace!(timestamp, "unchanged state snapshot");
            self.last_applied = timestamp;
            return Effects::none();
        }

        debug!(timestamp, vote_state = %state.vote_state(), "state snapshot applied");
        self.state = state;
        self.last_applied = timestamp;
        self.has_state = true;
        if let Some(me) = self.state.players.get(&self.player.id) {
            self.player.order = me.order;
        }
        Effects::state_replaced()
    }

    /// Records a presence message. A dealer also admits new players and
    /// picks up name changes.
    pub fn apply_peer_presence(&mut self, mut player: Player) -> Effects {
        self.last_seen.insert(player.id.clone(), now_millis());
        if !self.is_dealer() {
            return Effects::none();
        }

        let is_self = player.id == self.player.id;
        player.is_dealer = is_self;

        if let Some(known) = self.state.players.get_mut(&player.id) {
            if known.name == player.name {
                return Effects::none();
            }
            debug!(player_id = %player.id, name = %player.name, "player name updated");
            known.name = player.name;
            self.touch();
            return Effects::dealer_mutation();
        }

        player.order = self.state.next_player_order();
        if is_self {
            self.player.order = player.order;
        }
        info!(player_id = %player.id, name = %player.name, order = player.order, "player joined");
        self.state.players.insert(player.id.clone(), player);
        self.touch();
        Effects::dealer_mutation()
    }

    /// Stores a peer's vote on the current item. Only the dealer applies
    /// votes; anything not matching the current voting is dropped.
    ///
    /// `timestamp` is the sender's envelope timestamp. A vote older than
    /// the last one applied for the same player and item was overtaken on
    /// the way and is dropped, so a changed vote can't be reverted by a
    /// late delivery of the earlier one.
    pub fn apply_peer_vote(
        &mut self,
        player_id: PlayerId,
        item_id: VoteItemId,
        value: VoteValue,
        timestamp: i64,
    ) -> Effects {
        if !self.is_dealer() {
            trace!(%player_id, "player ignores inbound vote");
            return Effects::none();
        }

        let vote_state = self.state.vote_state();
        if vote_state != VoteState::Voting {
            warn!(%player_id, %item_id, %vote_state, "vote dropped: no active voting");
            return Effects::none();
        }
        if self.state.current_item_id.as_ref() != Some(&item_id) {
            warn!(%player_id, %item_id, "vote dropped: item is not current");
            return Effects::none();
        }
        if !self.state.deck.contains(&value) {
            warn!(%player_id, %item_id, vote = %value, "vote dropped: value not in deck");
            return Effects::none();
        }

        if let Some((last_item, last_ts)) = self.vote_stamps.get(&player_id) {
            if *last_item == item_id && timestamp < *last_ts {
                warn!(%player_id, %item_id, timestamp, last = *last_ts, "vote dropped: superseded");
                return Effects::none();
            }
        }

        if let Some(item) = self.state.current_item_mut() {
            item.votes.insert(player_id.clone(), Some(value));
        }
        self.vote_stamps
            .insert(player_id.clone(), (item_id.clone(), timestamp));
        self.touch();
        debug!(%player_id, %item_id, "peer vote applied");
        Effects::dealer_mutation()
    }

    // -- helpers ----------------------------------------------------------

    fn require_dealer(&self) -> Result<(), GameError> {
        if self.is_dealer() {
            Ok(())
        } else {
            Err(GameError::NotDealer)
        }
    }

    fn require_deal_allowed(&self, operation: &'static str) -> Result<(), GameError> {
        let state = self.state.vote_state();
        if state.accepts_deal() {
            Ok(())
        } else {
            Err(GameError::InvalidStateTransition { operation, state })
        }
    }

    fn insert_item(&mut self, text: &str) -> VoteItemId {
        let id = VoteItemId::new(uuid::Uuid::new_v4().to_string());
        let item = VoteItem::new(id.clone(), text.trim(), self.state.next_item_order());
        self.state.vote_list.insert(id.clone(), item);
        id
    }

    /// Stamps a dealer mutation. Timestamps strictly increase so players
    /// can order snapshots even within one millisecond.
    fn touch(&mut self) {
        self.state.timestamp = now_millis().max(self.state.timestamp + 1);
    }
}
