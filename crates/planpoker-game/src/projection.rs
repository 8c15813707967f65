//! The hidden view of a session state.
//!
//! While an item is being voted on, peers may see who has voted but not
//! what. [`project`] builds that view from the authoritative state; it
//! never touches its input.

use planpoker_protocol::{PlayerId, State, VoteState, VoteValue};

/// Returns the externally visible view of `state`.
///
/// During `Voting`, every vote on the current item becomes a presence
/// marker (`None`). Other items and every other state pass through.
pub fn project(state: &State) -> State {
    let mut view = state.clone();
    if state.vote_state() == VoteState::Voting {
        if let Some(item) = view.current_item_mut() {
            item.votes.values_mut().for_each(|vote| *vote = None);
        }
    }
    view
}

/// Puts the local player's own vote back into a hidden view.
///
/// Only applies while voting on the current item; a player always knows
/// its own card even though peers don't.
pub fn with_own_vote(mut view: State, player_id: &PlayerId, vote: Option<&VoteValue>) -> State {
    let Some(vote) = vote else {
        return view;
    };
    if view.vote_state() != VoteState::Voting {
        return view;
    }
    if let Some(item) = view.current_item_mut() {
        item.votes.insert(player_id.clone(), Some(vote.clone()));
    }
    view
}
