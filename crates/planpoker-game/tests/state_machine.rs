//! Integration tests for the session state machine, without any I/O.

use planpoker_game::{projection, Effects, GameCore, GameError};
use planpoker_protocol::{
    Deck, Envelope, Payload, Player, PlayerId, State, VoteItemId, VoteState, VoteValue,
};

// =========================================================================
// Helpers
// =========================================================================

fn pid(id: &str) -> PlayerId {
    PlayerId::new(id)
}

fn deck() -> Deck {
    Deck::new(["1", "2", "3"]).unwrap()
}

fn dealer() -> GameCore {
    GameCore::new_dealer(Player::new(pid("dealer"), "dana"), deck())
}

fn player(id: &str) -> GameCore {
    GameCore::new_player(Player::new(pid(id), id))
}

/// A dealer driven into the given vote state.
fn dealer_in(state: VoteState) -> GameCore {
    let mut core = dealer();
    if state == VoteState::Idle {
        return core;
    }
    core.deal("task A").unwrap();
    if state == VoteState::Voting {
        return core;
    }
    core.reveal().unwrap();
    if state == VoteState::Revealed {
        return core;
    }
    core.finish("2".into()).unwrap();
    core
}

/// A player holding the dealer's projected state.
fn player_seeing(dealer: &GameCore) -> GameCore {
    let mut core = player("bob");
    let snapshot = dealer.projected_state();
    let ts = snapshot.timestamp;
    core.apply_peer_state(snapshot, ts);
    core
}

fn current_item_id(core: &GameCore) -> VoteItemId {
    core.state().current_item_id.clone().unwrap()
}

const ALL_STATES: [VoteState; 4] = [
    VoteState::Idle,
    VoteState::Voting,
    VoteState::Revealed,
    VoteState::Finished,
];

// =========================================================================
// Role gating
// =========================================================================

#[test]
fn test_dealer_operations_fail_for_players_without_mutation() {
    for vote_state in ALL_STATES {
        let dealer = dealer_in(vote_state);
        let mut core = player_seeing(&dealer);
        let before = core.state().clone();

        assert!(matches!(core.deal("x"), Err(GameError::NotDealer)));
        assert!(matches!(core.add_item("x"), Err(GameError::NotDealer)));
        assert!(matches!(core.select_item(0), Err(GameError::NotDealer)));
        assert!(matches!(core.reveal(), Err(GameError::NotDealer)));
        assert!(matches!(core.finish("1".into()), Err(GameError::NotDealer)));
        assert!(matches!(core.set_deck(deck()), Err(GameError::NotDealer)));

        let effects = core.apply_peer_vote(pid("carol"), VoteItemId::new("any"), "1".into(), 0);
        assert!(effects.is_empty());
        let effects = core.apply_peer_presence(Player::new(pid("carol"), "carol"));
        assert!(effects.is_empty());

        assert_eq!(core.state(), &before, "state mutated in {vote_state}");
    }
}

// =========================================================================
// State machine coverage
// =========================================================================

#[test]
fn test_from_idle_only_deal_moves_forward() {
    let mut core = dealer_in(VoteState::Idle);
    assert!(matches!(
        core.reveal(),
        Err(GameError::InvalidStateTransition { operation: "reveal", state: VoteState::Idle })
    ));
    assert!(matches!(
        core.finish("1".into()),
        Err(GameError::InvalidStateTransition { .. })
    ));
    assert!(core.apply_peer_vote(pid("bob"), VoteItemId::new("x"), "1".into(), 0).is_empty());

    core.deal("task A").unwrap();
    assert_eq!(core.state().vote_state(), VoteState::Voting);
}

#[test]
fn test_from_voting_only_reveal_and_votes() {
    let mut core = dealer_in(VoteState::Voting);
    assert!(matches!(core.deal("x"), Err(GameError::InvalidStateTransition { .. })));
    assert!(matches!(core.select_item(0), Err(GameError::InvalidStateTransition { .. })));
    assert!(matches!(core.finish("1".into()), Err(GameError::InvalidStateTransition { .. })));
    assert!(matches!(core.set_deck(deck()), Err(GameError::InvalidStateTransition { .. })));

    let item = current_item_id(&core);
    let effects = core.apply_peer_vote(pid("bob"), item, "3".into(), 0);
    assert!(effects.broadcast_state);

    core.reveal().unwrap();
    assert_eq!(core.state().vote_state(), VoteState::Revealed);
}

#[test]
fn test_from_revealed_only_finish() {
    let mut core = dealer_in(VoteState::Revealed);
    assert!(matches!(core.deal("x"), Err(GameError::InvalidStateTransition { .. })));
    assert!(matches!(core.reveal(), Err(GameError::InvalidStateTransition { .. })));
    assert!(matches!(core.set_deck(deck()), Err(GameError::InvalidStateTransition { .. })));

    let item = current_item_id(&core);
    assert!(core.apply_peer_vote(pid("bob"), item, "1".into(), 0).is_empty());

    core.finish("3".into()).unwrap();
    assert_eq!(core.state().vote_state(), VoteState::Finished);
}

#[test]
fn test_from_finished_deal_and_set_deck() {
    let mut core = dealer_in(VoteState::Finished);
    assert!(matches!(core.reveal(), Err(GameError::InvalidStateTransition { .. })));
    assert!(matches!(core.finish("1".into()), Err(GameError::InvalidStateTransition { .. })));

    core.set_deck(Deck::new(["S", "M", "L"]).unwrap()).unwrap();
    core.deal("task B").unwrap();
    assert_eq!(core.state().vote_state(), VoteState::Voting);
    assert_eq!(core.state().vote_list.len(), 2);
}

#[test]
fn test_result_is_immutable_once_finished() {
    let mut core = dealer_in(VoteState::Finished);
    let item = current_item_id(&core);
    assert!(core.finish("3".into()).is_err());
    assert_eq!(core.state().vote_list[&item].result, Some("2".into()));
}

// =========================================================================
// Scenarios
// =========================================================================

#[test]
fn test_deal_vote_reveal_finish() {
    let mut dealer = dealer();
    let mut bob = player("bob");

    dealer.apply_peer_presence(Player::new(pid("bob"), "bob"));
    let (item, effects) = dealer.deal("task A").unwrap();
    assert!(effects.broadcast_state && effects.state_changed && effects.notify);
    assert_eq!(dealer.state().vote_state(), VoteState::Voting);
    assert_eq!(dealer.state().current_item().unwrap().text, "task A");

    // Bob gets the snapshot and votes.
    let snapshot = dealer.projected_state();
    bob.apply_envelope(Envelope::state(snapshot.timestamp, snapshot));
    let effects = bob.submit_vote("2".into()).unwrap();
    let Some(Payload::PlayerVote { player_id, issue, vote }) = effects.publish else {
        panic!("expected a vote message");
    };
    assert_eq!((player_id.as_str(), &issue, vote.as_str()), ("bob", &item, "2"));

    // The dealer applies it; the broadcast view only shows presence.
    dealer.apply_envelope(Envelope::player_vote(0, pid("bob"), issue, vote));
    let hidden = dealer.projected_state();
    assert_eq!(hidden.current_item().unwrap().votes[&pid("bob")], None);
    assert_eq!(
        dealer.state().current_item().unwrap().votes[&pid("bob")],
        Some("2".into())
    );

    dealer.reveal().unwrap();
    let shown = dealer.projected_state();
    assert_eq!(shown.current_item().unwrap().votes[&pid("bob")], Some("2".into()));

    dealer.finish("2".into()).unwrap();
    assert_eq!(dealer.state().current_item().unwrap().result, Some("2".into()));
    assert_eq!(dealer.state().vote_state(), VoteState::Finished);
}

#[test]
fn test_vote_not_in_deck_is_rejected() {
    let mut dealer = dealer_in(VoteState::Voting);
    let err = dealer.submit_vote("99".into()).unwrap_err();
    assert!(matches!(err, GameError::ValueNotInDeck(ref v) if v.as_str() == "99"));

    let item = current_item_id(&dealer);
    assert!(dealer.apply_peer_vote(pid("bob"), item, "99".into(), 0).is_empty());
    assert!(dealer.state().current_item().unwrap().votes.is_empty());

    let mut bob = player_seeing(&dealer);
    assert!(matches!(bob.submit_vote("99".into()), Err(GameError::ValueNotInDeck(_))));
}

#[test]
fn test_vote_for_non_current_item_is_dropped() {
    let mut dealer = dealer_in(VoteState::Voting);
    let before = dealer.state().clone();

    let effects = dealer.apply_peer_vote(pid("bob"), VoteItemId::new("stale-item"), "1".into(), 0);

    assert!(effects.is_empty());
    assert_eq!(dealer.state(), &before);
}

#[test]
fn test_players_get_orders_in_join_sequence() {
    let mut dealer = dealer();
    dealer.apply_peer_presence(Player::new(pid("alice"), "alice"));
    dealer.apply_peer_presence(Player::new(pid("bob"), "bob"));
    // Presence heartbeats of known players change nothing.
    assert!(dealer.apply_peer_presence(Player::new(pid("alice"), "alice")).is_empty());

    let orders = |state: &State| (state.players[&pid("alice")].order, state.players[&pid("bob")].order);
    assert_eq!(orders(dealer.state()), (0, 1));

    // Preserved across later broadcasts.
    dealer.deal("task").unwrap();
    let bob = player_seeing(&dealer);
    assert_eq!(orders(bob.state()), (0, 1));
    assert_eq!(bob.player().order, 1);
}

#[test]
fn test_dealer_registers_itself_first() {
    let mut dealer = dealer();
    let me = dealer.player().clone();
    dealer.apply_peer_presence(me);
    dealer.apply_peer_presence(Player::new(pid("bob"), "bob"));

    let state = dealer.state();
    assert!(state.players[&pid("dealer")].is_dealer);
    assert_eq!(state.players[&pid("dealer")].order, 0);
    assert_eq!(state.players[&pid("bob")].order, 1);
    assert_eq!(state.dealer().unwrap().id, pid("dealer"));
}

// =========================================================================
// Peer messages
// =========================================================================

#[test]
fn test_stale_snapshot_is_ignored() {
    let mut bob = player("bob");
    let mut newer = State::new(deck());
    newer.timestamp = 200;
    let mut older = State::new(Deck::new(["XS"]).unwrap());
    older.timestamp = 100;

    assert!(bob.apply_peer_state(newer.clone(), 200).state_changed);
    assert!(bob.apply_peer_state(older, 100).is_empty());
    assert_eq!(bob.state(), &newer);
    assert_eq!(bob.last_applied(), 200);

    // The same snapshot again (state heartbeat) advances the timestamp
    // without saving or notifying.
    let effects = bob.apply_peer_state(newer.clone(), 250);
    assert!(effects.is_empty());
    assert_eq!(bob.last_applied(), 250);
    assert_eq!(bob.state(), &newer);
}

#[test]
fn test_unchanged_heartbeat_snapshot_is_quiet() {
    let mut dealer = dealer_in(VoteState::Voting);
    let mut bob = player_seeing(&dealer);

    let repeat = dealer.projected_state();
    let ts = repeat.timestamp;
    assert!(bob.apply_envelope(Envelope::state(ts, repeat)).is_empty());

    dealer.reveal().unwrap();
    let changed = dealer.projected_state();
    let ts = changed.timestamp;
    let effects = bob.apply_envelope(Envelope::state(ts, changed));
    assert!(effects.state_changed && effects.notify);
}

#[test]
fn test_overtaken_vote_does_not_replace_newer_one() {
    let mut dealer = dealer_in(VoteState::Voting);
    let item = current_item_id(&dealer);

    assert!(!dealer.apply_peer_vote(pid("bob"), item.clone(), "2".into(), 200).is_empty());
    // The earlier vote arrives late.
    assert!(dealer.apply_peer_vote(pid("bob"), item.clone(), "1".into(), 100).is_empty());
    let votes = &dealer.state().current_item().unwrap().votes;
    assert_eq!(votes[&pid("bob")], Some("2".into()));

    // Same millisecond counts as newer.
    assert!(!dealer.apply_peer_vote(pid("bob"), item.clone(), "3".into(), 200).is_empty());
    // Another player's older timestamp is unrelated.
    assert!(!dealer.apply_peer_vote(pid("carol"), item, "1".into(), 50).is_empty());
}

#[test]
fn test_invalid_envelope_is_dropped() {
    let mut dealer = dealer();
    let ghost = Envelope::player_online(1, Player::new(pid(""), "ghost"));
    assert!(dealer.apply_envelope(ghost).is_empty());
    assert!(dealer.state().players.is_empty());
    assert_eq!(dealer.last_seen(&pid("")), None);
}

#[test]
fn test_dealer_ignores_inbound_state() {
    let mut dealer = dealer_in(VoteState::Voting);
    let before = dealer.state().clone();
    let foreign = State::new(Deck::new(["XS"]).unwrap());

    assert!(dealer.apply_peer_state(foreign, i64::MAX).is_empty());
    assert_eq!(dealer.state(), &before);
}

#[test]
fn test_peer_cannot_claim_dealer() {
    let mut dealer = dealer();
    let mut impostor = Player::new(pid("eve"), "eve");
    impostor.is_dealer = true;

    dealer.apply_peer_presence(impostor);
    assert!(!dealer.state().players[&pid("eve")].is_dealer);
}

#[test]
fn test_rename_reaches_the_dealer_state() {
    let mut dealer = dealer();
    dealer.apply_peer_presence(Player::new(pid("bob"), "bob"));

    let mut bob = player("bob");
    let effects = bob.rename("Robert");
    let Some(Payload::PlayerOnline { player }) = effects.publish else {
        panic!("rename must announce presence");
    };
    assert_eq!(player.name, "Robert");

    let effects = dealer.apply_peer_presence(player);
    assert!(effects.broadcast_state);
    let stored = &dealer.state().players[&pid("bob")];
    assert_eq!((stored.name.as_str(), stored.order), ("Robert", 0));
}

#[test]
fn test_dealer_rename_updates_own_entry() {
    let mut dealer = dealer();
    let me = dealer.player().clone();
    dealer.apply_peer_presence(me);

    let effects = dealer.rename("Dealer Dana");
    assert!(effects.broadcast_state);
    assert!(matches!(effects.publish, Some(Payload::PlayerOnline { .. })));
    assert_eq!(dealer.state().players[&pid("dealer")].name, "Dealer Dana");
}

#[test]
fn test_presence_updates_last_seen_for_everyone() {
    let mut bob = player("bob");
    assert_eq!(bob.last_seen(&pid("alice")), None);
    bob.apply_peer_presence(Player::new(pid("alice"), "alice"));
    assert!(bob.last_seen(&pid("alice")).is_some());
}

// =========================================================================
// Local vote
// =========================================================================

#[test]
fn test_player_without_state_cannot_vote() {
    let mut bob = player("bob");
    assert!(matches!(bob.submit_vote("1".into()), Err(GameError::NoState)));
}

#[test]
fn test_player_with_idle_state_cannot_vote() {
    let dealer = dealer();
    let mut bob = player_seeing(&dealer);
    assert!(matches!(bob.submit_vote("1".into()), Err(GameError::NoActiveVoting)));
}

#[test]
fn test_own_vote_is_visible_only_locally() {
    let dealer = dealer_in(VoteState::Voting);
    let mut bob = player_seeing(&dealer);

    let effects = bob.submit_vote("3".into()).unwrap();
    assert!(effects.notify);
    assert!(!effects.state_changed);

    assert_eq!(bob.my_vote(), Some(&VoteValue::from("3")));
    let view = bob.view();
    assert_eq!(view.current_item().unwrap().votes[&pid("bob")], Some("3".into()));
    // The authoritative copy held by the player is untouched.
    assert!(bob.state().current_item().unwrap().votes.is_empty());
    assert_eq!(
        projection::with_own_vote(bob.projected_state(), &pid("bob"), bob.my_vote()),
        view
    );
}

#[test]
fn test_dealer_vote_is_recorded_and_hidden() {
    let mut dealer = dealer_in(VoteState::Voting);
    let effects = dealer.submit_vote("1".into()).unwrap();
    assert_eq!(
        effects,
        Effects {
            state_changed: true,
            notify: true,
            broadcast_state: true,
            publish: None,
        }
    );

    assert_eq!(
        dealer.projected_state().current_item().unwrap().votes[&pid("dealer")],
        None
    );
    assert_eq!(
        dealer.view().current_item().unwrap().votes[&pid("dealer")],
        Some("1".into())
    );
}

#[test]
fn test_own_vote_does_not_leak_into_next_item() {
    let mut dealer = dealer_in(VoteState::Voting);
    dealer.submit_vote("1".into()).unwrap();
    dealer.reveal().unwrap();
    dealer.finish("1".into()).unwrap();
    dealer.deal("task B").unwrap();

    assert_eq!(dealer.my_vote(), None);
    assert!(dealer.view().current_item().unwrap().votes.is_empty());
}
