//! Room actor: one Tokio task per joined room.
//!
//! The actor owns the [`GameCore`] and is the only place it's mutated.
//! Local operations arrive as commands through an mpsc channel (with a
//! oneshot reply), peer messages through the transport subscription.
//! Both are applied strictly one at a time.
//!
//! Next to the actor run the heartbeat tasks (presence for everybody,
//! state re-broadcast for the dealer) and one publisher task. The actor
//! and the heartbeats never touch the transport directly: they queue
//! envelopes on an unbounded channel and the publisher sends them one by
//! one, in queue order. Operations stay fire-and-forget for the caller,
//! yet two messages of one session can't overtake each other on the way
//! out (a changed vote always reaches the room after the vote it
//! replaces).
//!
//! All tasks share one [`CancellationToken`], a child of the game's
//! token, and are tracked by one [`TaskTracker`] so leaving can wait for
//! all of them.

use std::sync::Arc;

use planpoker_heartbeat::{Heartbeat, HeartbeatConfig};
use planpoker_protocol::{
    parse_room_id, Codec, Deck, Envelope, JsonCodec, Player, PlayerId, Room, RoomId, State,
    VoteItemId, VoteValue, SYMMETRIC_KEY_LENGTH,
};
use planpoker_storage::{PlayerIdentity, Storage};
use planpoker_transport::{Subscription, Transport};
use rand::rngs::OsRng;
use rand::TryRngCore;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn, Instrument};

use crate::fanout::{StateReceiver, Subscribers};
use crate::machine::now_millis;
use crate::{decks, Effects, GameConfig, GameCore, GameError};

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Collaborators and settings shared by every room session of a game.
pub struct SessionContext<T, S> {
    pub transport: Arc<T>,
    pub storage: Arc<S>,
    pub config: GameConfig,
    /// Outer lifetime: cancelling it ends every session started with
    /// this context.
    pub cancel: CancellationToken,
}

impl<T, S> Clone for SessionContext<T, S> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            storage: Arc::clone(&self.storage),
            config: self.config.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Commands and snapshots
// ---------------------------------------------------------------------------

type Reply<R> = oneshot::Sender<Result<R, GameError>>;

/// Queue of envelopes waiting for the publisher task.
type Outbound = mpsc::UnboundedSender<Envelope>;

enum Command {
    Deal { text: String, reply: Reply<VoteItemId> },
    AddItem { text: String, reply: Reply<VoteItemId> },
    SelectItem { index: usize, reply: Reply<VoteItemId> },
    SubmitVote { value: VoteValue, reply: Reply<()> },
    Reveal { reply: Reply<()> },
    Finish { value: VoteValue, reply: Reply<()> },
    SetDeck { deck: Deck, reply: Reply<()> },
    Rename { name: String, reply: Reply<()> },
    Subscribe { reply: oneshot::Sender<StateReceiver> },
    LastSeen { player_id: PlayerId, reply: oneshot::Sender<Option<i64>> },
}

/// Read-only copy of the actor's data, published after every change.
#[derive(Debug, Clone)]
struct Snapshot {
    view: State,
    projected: State,
    player: Player,
    my_vote: Option<VoteValue>,
}

impl Snapshot {
    fn of(core: &GameCore) -> Self {
        Self {
            view: core.view(),
            projected: core.projected_state(),
            player: core.player().clone(),
            my_vote: core.my_vote().cloned(),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomSession
// ---------------------------------------------------------------------------

/// Handle to a running room session.
///
/// Cheap to clone. Every operation is forwarded to the room actor and
/// fails with [`GameError::SessionClosed`] once the room was left.
#[derive(Clone)]
pub struct RoomSession {
    inner: Arc<Inner>,
}

struct Inner {
    room: Room,
    room_id: RoomId,
    is_dealer: bool,
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<Snapshot>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl RoomSession {
    /// Creates a new room with a fresh key and becomes its dealer.
    pub async fn create<T: Transport, S: Storage>(
        ctx: &SessionContext<T, S>,
        player: Player,
    ) -> Result<Self, GameError> {
        let deck = decks::get(&ctx.config.default_deck).ok_or_else(|| {
            GameError::InvalidDeck(format!("unknown deck '{}'", ctx.config.default_deck))
        })?;
        let room = generate_room()?;
        let subscription = ctx.transport.subscribe(&room).await?;

        let core = GameCore::new_dealer(player, deck);
        info!(room_id = %room.to_room_id(), player_id = %core.player().id, "room created");
        Ok(Self::spawn(ctx, room, core, subscription))
    }

    /// Joins an existing room.
    ///
    /// If the stored state of this room names the local player as dealer,
    /// the session resumes as dealer with that state. Otherwise it joins
    /// as a player with an empty state and waits for the dealer.
    pub async fn join<T: Transport, S: Storage>(
        ctx: &SessionContext<T, S>,
        player: Player,
        room_id: &str,
    ) -> Result<Self, GameError> {
        let room = parse_room_id(room_id)?;
        let room_id = room.to_room_id();

        let core = match ctx.storage.load_state(&room_id) {
            Ok(Some(state)) if state.dealer().is_some_and(|d| d.id == player.id) => {
                info!(%room_id, player_id = %player.id, "resuming room as dealer");
                GameCore::resume_dealer(player, state)
            }
            Ok(_) => GameCore::new_player(player),
            Err(e) => {
                warn!(%room_id, error = %e, "stored room state unreadable, joining as player");
                GameCore::new_player(player)
            }
        };

        let subscription = ctx.transport.subscribe(&room).await?;
        info!(%room_id, player_id = %core.player().id, dealer = core.is_dealer(), "room joined");
        Ok(Self::spawn(ctx, room, core, subscription))
    }

    fn spawn<T: Transport, S: Storage>(
        ctx: &SessionContext<T, S>,
        room: Room,
        core: GameCore,
        subscription: Subscription,
    ) -> Self {
        let room_id = room.to_room_id();
        let cancel = ctx.cancel.child_token();
        let tracker = TaskTracker::new();
        let (command_tx, command_rx) = mpsc::channel(ctx.config.command_buffer.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::of(&core));
        let is_dealer = core.is_dealer();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let span = tracing::info_span!("room", %room_id, player_id = %core.player().id);

        tracker.spawn(
            run_publisher(
                Arc::clone(&ctx.transport),
                room.clone(),
                outbound_rx,
                cancel.clone(),
            )
            .instrument(span.clone()),
        );

        let actor = RoomActor {
            core,
            storage: Arc::clone(&ctx.storage),
            room_id: room_id.clone(),
            codec: JsonCodec,
            subscribers: Subscribers::new(ctx.config.subscriber_buffer),
            snapshot: snapshot_tx,
            commands: command_rx,
            outbound: outbound_tx.clone(),
            cancel: cancel.clone(),
        };
        tracker.spawn(actor.run(subscription).instrument(span.clone()));

        tracker.spawn(
            presence_heartbeat(
                outbound_tx.clone(),
                snapshot_rx.clone(),
                ctx.config.presence_heartbeat(),
                cancel.clone(),
            )
            .instrument(span.clone()),
        );
        if is_dealer {
            tracker.spawn(
                state_heartbeat(
                    outbound_tx,
                    snapshot_rx.clone(),
                    ctx.config.state_heartbeat(),
                    cancel.clone(),
                )
                .instrument(span),
            );
        }
        tracker.close();

        Self {
            inner: Arc::new(Inner {
                room,
                room_id,
                is_dealer,
                commands: command_tx,
                snapshot: snapshot_rx,
                cancel,
                tracker,
            }),
        }
    }

    // -- operations -------------------------------------------------------

    /// Dealer: starts voting on a new item.
    pub async fn deal(&self, text: impl Into<String>) -> Result<VoteItemId, GameError> {
        let text = text.into();
        self.request(|reply| Command::Deal { text, reply }).await?
    }

    /// Dealer: adds an item to the list without voting on it yet.
    pub async fn add_item(&self, text: impl Into<String>) -> Result<VoteItemId, GameError> {
        let text = text.into();
        self.request(|reply| Command::AddItem { text, reply }).await?
    }

    /// Dealer: starts voting on the item at display position `index`.
    pub async fn select_item(&self, index: usize) -> Result<VoteItemId, GameError> {
        self.request(|reply| Command::SelectItem { index, reply })
            .await?
    }

    pub async fn submit_vote(&self, value: impl Into<VoteValue>) -> Result<(), GameError> {
        let value = value.into();
        self.request(|reply| Command::SubmitVote { value, reply })
            .await?
    }

    /// Dealer: reveals the votes of the current item.
    pub async fn reveal(&self) -> Result<(), GameError> {
        self.request(|reply| Command::Reveal { reply }).await?
    }

    /// Dealer: sets the result of the current item.
    pub async fn finish(&self, value: impl Into<VoteValue>) -> Result<(), GameError> {
        let value = value.into();
        self.request(|reply| Command::Finish { value, reply }).await?
    }

    /// Dealer: replaces the deck.
    pub async fn set_deck(&self, deck: Deck) -> Result<(), GameError> {
        self.request(|reply| Command::SetDeck { deck, reply }).await?
    }

    /// Changes the local display name, announces and persists it.
    pub async fn rename(&self, name: impl Into<String>) -> Result<(), GameError> {
        let name = name.into();
        self.request(|reply| Command::Rename { name, reply }).await?
    }

    /// Registers a local observer of state views.
    ///
    /// The stream ends when the session ends.
    pub async fn subscribe(&self) -> Result<StateReceiver, GameError> {
        self.request(|reply| Command::Subscribe { reply }).await
    }

    /// When a presence message from `player_id` was last received.
    pub async fn last_seen(&self, player_id: &PlayerId) -> Result<Option<i64>, GameError> {
        let player_id = player_id.clone();
        self.request(|reply| Command::LastSeen { player_id, reply })
            .await
    }

    /// Leaves the room: stops every task of this session and closes all
    /// subscriber streams. Safe to call more than once.
    pub async fn leave(&self) {
        if !self.inner.cancel.is_cancelled() {
            info!(room_id = %self.inner.room_id, "leaving room");
            self.inner.cancel.cancel();
        }
        self.inner.tracker.wait().await;
    }

    // -- accessors --------------------------------------------------------

    /// The latest local view: projected, with the own vote visible.
    pub fn current_state(&self) -> State {
        self.inner.snapshot.borrow().view.clone()
    }

    pub fn room(&self) -> &Room {
        &self.inner.room
    }

    pub fn room_id(&self) -> &RoomId {
        &self.inner.room_id
    }

    pub fn is_dealer(&self) -> bool {
        self.inner.is_dealer
    }

    pub fn player(&self) -> Player {
        self.inner.snapshot.borrow().player.clone()
    }

    /// The local vote on the current item.
    pub fn my_vote(&self) -> Option<VoteValue> {
        self.inner.snapshot.borrow().my_vote.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, GameError> {
        if self.is_closed() {
            return Err(GameError::SessionClosed);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner
            .commands
            .send(command(reply_tx))
            .await
            .map_err(|_| GameError::SessionClosed)?;
        reply_rx.await.map_err(|_| GameError::SessionClosed)
    }
}

impl std::fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSession")
            .field("room_id", &self.inner.room_id)
            .field("is_dealer", &self.inner.is_dealer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Generates a room with a fresh random key from the OS generator.
pub fn generate_room() -> Result<Room, GameError> {
    let mut key = vec![0u8; SYMMETRIC_KEY_LENGTH];
    OsRng
        .try_fill_bytes(&mut key)
        .map_err(|e| GameError::KeyGeneration(e.to_string()))?;
    Ok(Room::new(key))
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct RoomActor<S> {
    core: GameCore,
    room_id: RoomId,
    storage: Arc<S>,
    codec: JsonCodec,
    subscribers: Subscribers,
    snapshot: watch::Sender<Snapshot>,
    commands: mpsc::Receiver<Command>,
    outbound: Outbound,
    cancel: CancellationToken,
}

impl<S: Storage> RoomActor<S> {
    async fn run(mut self, mut subscription: Subscription) {
        debug!(dealer = self.core.is_dealer(), "room actor started");

        if self.core.is_dealer() {
            let me = self.core.player().clone();
            let effects = self.core.apply_peer_presence(me);
            self.apply(effects).await;
        }

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("all session handles dropped");
                        break;
                    };
                    self.handle_command(command).await;
                }
                message = subscription.recv() => {
                    let Some(bytes) = message else {
                        warn!("room subscription closed by transport");
                        break;
                    };
                    self.handle_message(&bytes).await;
                }
            }
        }

        subscription.unsubscribe();
        self.subscribers.close();
        self.cancel.cancel();
        info!(room_id = %self.room_id, "room session stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Deal { text, reply } => {
                let result = self.core.deal(&text);
                self.finish_with(result, reply).await;
            }
            Command::AddItem { text, reply } => {
                let result = self.core.add_item(&text);
                self.finish_with(result, reply).await;
            }
            Command::SelectItem { index, reply } => {
                let result = self.core.select_item(index);
                self.finish_with(result, reply).await;
            }
            Command::SubmitVote { value, reply } => {
                let result = self.core.submit_vote(value).map(|e| ((), e));
                self.finish_with(result, reply).await;
            }
            Command::Reveal { reply } => {
                let result = self.core.reveal().map(|e| ((), e));
                self.finish_with(result, reply).await;
            }
            Command::Finish { value, reply } => {
                let result = self.core.finish(value).map(|e| ((), e));
                self.finish_with(result, reply).await;
            }
            Command::SetDeck { deck, reply } => {
                let result = self.core.set_deck(deck).map(|e| ((), e));
                self.finish_with(result, reply).await;
            }
            Command::Rename { name, reply } => {
                let effects = self.core.rename(&name);
                self.save_identity();
                self.finish_with(Ok(((), effects)), reply).await;
            }
            Command::Subscribe { reply } => {
                let _ = reply.send(self.subscribers.subscribe());
            }
            Command::LastSeen { player_id, reply } => {
                let _ = reply.send(self.core.last_seen(&player_id));
            }
        }
    }

    /// Carries out the effects of a successful operation, then replies.
    async fn finish_with<R>(&mut self, result: Result<(R, Effects), GameError>, reply: Reply<R>) {
        let result = match result {
            Ok((value, effects)) => {
                self.apply(effects).await;
                Ok(value)
            }
            Err(e) => {
                debug!(error = %e, "operation rejected");
                Err(e)
            }
        };
        let _ = reply.send(result);
    }

    async fn handle_message(&mut self, bytes: &[u8]) {
        let envelope: Envelope = match self.codec.decode(bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, len = bytes.len(), "undecodable room message dropped");
                return;
            }
        };
        let effects = self.core.apply_envelope(envelope);
        self.apply(effects).await;
    }

    async fn apply(&mut self, effects: Effects) {
        if effects.is_empty() {
            return;
        }
        if effects.state_changed {
            self.save_state();
        }
        self.snapshot.send_replace(Snapshot::of(&self.core));

        if effects.notify {
            let view = self.core.view();
            self.subscribers.notify(&view, &self.cancel).await;
        }
        if effects.broadcast_state {
            let projected = self.core.projected_state();
            self.publish(Envelope::state(projected.timestamp, projected));
        }
        if let Some(payload) = effects.publish {
            self.publish(Envelope::new(now_millis(), payload));
        }
    }

    /// Queues an envelope for the publisher task.
    fn publish(&self, envelope: Envelope) {
        let kind = envelope.payload.kind();
        if self.outbound.send(envelope).is_err() {
            debug!(kind, "publisher stopped, message not sent");
        }
    }

    fn save_state(&self) {
        if let Err(e) = self.storage.save_state(&self.room_id, self.core.state()) {
            warn!(error = %e, "failed to save room state");
        }
    }

    fn save_identity(&self) {
        let player = self.core.player();
        let identity = PlayerIdentity {
            id: player.id.clone(),
            name: player.name.clone(),
        };
        if let Err(e) = self.storage.save_player(&identity) {
            warn!(error = %e, "failed to save player identity");
        }
    }
}

// ---------------------------------------------------------------------------
// Heartbeats
// ---------------------------------------------------------------------------

/// Announces the local player on every beat.
async fn presence_heartbeat(
    outbound: Outbound,
    snapshot: watch::Receiver<Snapshot>,
    config: HeartbeatConfig,
    cancel: CancellationToken,
) {
    let mut heartbeat = Heartbeat::new(config);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            beat = heartbeat.wait_for_beat() => {
                let player = snapshot.borrow().player.clone();
                trace!(beat = beat.beat, "presence heartbeat");
                if outbound.send(Envelope::player_online(now_millis(), player)).is_err() {
                    break;
                }
            }
        }
    }
    debug!("presence heartbeat stopped");
}

/// Re-broadcasts the projected state on every beat (dealer only).
async fn state_heartbeat(
    outbound: Outbound,
    snapshot: watch::Receiver<Snapshot>,
    config: HeartbeatConfig,
    cancel: CancellationToken,
) {
    let mut heartbeat = Heartbeat::new(config);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            beat = heartbeat.wait_for_beat() => {
                let state = snapshot.borrow().projected.clone();
                trace!(beat = beat.beat, "state heartbeat");
                if outbound.send(Envelope::state(state.timestamp, state)).is_err() {
                    break;
                }
            }
        }
    }
    debug!("state heartbeat stopped");
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Sends queued envelopes to the room, one at a time and in queue order.
///
/// A publish that is still in flight when the session is cancelled is
/// abandoned; failures are logged and the next envelope is sent.
async fn run_publisher<T: Transport>(
    transport: Arc<T>,
    room: Room,
    mut outbound: mpsc::UnboundedReceiver<Envelope>,
    cancel: CancellationToken,
) {
    let codec = JsonCodec;
    loop {
        let envelope = tokio::select! {
            _ = cancel.cancelled() => break,
            envelope = outbound.recv() => match envelope {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let kind = envelope.payload.kind();
        let bytes = match codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(kind, error = %e, "failed to encode message, not published");
                continue;
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            result = transport.publish(&room, bytes) => match result {
                Ok(()) => trace!(kind, "message published"),
                Err(e) => warn!(kind, error = %e, "publish failed"),
            },
        }
    }
    debug!("publisher stopped");
}
