use std::time::Duration;

use planpoker::logging;
use planpoker::prelude::*;

// ---------------------------------------------------------------------------
// Table setup
// ---------------------------------------------------------------------------

type LocalGame = Game<MemoryTransport, MemoryStorage>;

fn seat(transport: &MemoryTransport, name: &str) -> Result<LocalGame, PlanPokerError> {
    Game::builder()
        .transport(transport.clone())
        .storage(MemoryStorage::new())
        .player_name(name)
        .build()
}

/// Waits until the session view satisfies `pred`.
async fn wait_for(
    session: &RoomSession,
    pred: impl Fn(&State) -> bool,
) -> Result<State, Box<dyn std::error::Error>> {
    let state = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let state = session.current_state();
            if pred(&state) {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await?;
    Ok(state)
}

fn print_votes(state: &State) {
    let Some(item) = state.current_item() else {
        return;
    };
    for player in state.players_in_order() {
        let vote = match item.votes.get(&player.id) {
            Some(Some(value)) => value.to_string(),
            Some(None) => "(hidden)".into(),
            None => "-".into(),
        };
        println!("  {:<8} {vote}", player.name);
    }
}

// ---------------------------------------------------------------------------
// One round of planning poker
// ---------------------------------------------------------------------------

async fn play_round(
    dealer: &RoomSession,
    players: &[(RoomSession, &str)],
    topic: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let item = dealer.deal(topic).await?;
    println!("\ndealer deals: {topic}");

    for (session, vote) in players {
        wait_for(session, |s| s.current_item_id.as_ref() == Some(&item)).await?;
        session.submit_vote(*vote).await?;
    }

    let voters = players.len();
    let state = wait_for(dealer, |s| {
        s.current_item()
            .is_some_and(|i| i.votes.len() >= voters)
    })
    .await?;
    println!("votes before reveal:");
    print_votes(&state);

    dealer.reveal().await?;
    let state = dealer.current_state();
    println!("votes after reveal:");
    print_votes(&state);

    // The dealer settles on the highest card played.
    let deck = &state.deck;
    let result = state
        .current_item()
        .into_iter()
        .flat_map(|i| i.votes.values().flatten())
        .max_by_key(|v| deck.position(v))
        .cloned()
        .ok_or("no votes")?;
    dealer.finish(result.clone()).await?;
    println!("result: {result}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init("warn,planpoker=info");

    let transport = MemoryTransport::new();
    let dealer_game = seat(&transport, "dana")?;
    let alice_game = seat(&transport, "alice")?;
    let bob_game = seat(&transport, "bob")?;

    let dealer = dealer_game.create_room().await?;
    println!("room created, share this id: {}", dealer.room_id());

    let alice = alice_game.join_room(dealer.room_id().as_str()).await?;
    let bob = bob_game.join_room(dealer.room_id().as_str()).await?;
    let state = wait_for(&dealer, |s| s.players.len() == 3).await?;
    tracing::info!(players = state.players.len(), "table is full");

    dealer.set_deck(decks::parse(&["1", "2", "3", "5", "8"])?).await?;

    let players = [(alice, "3"), (bob, "5")];
    play_round(&dealer, &players, "login page").await?;
    play_round(&dealer, &players, "password reset").await?;

    for (session, _) in &players {
        session.leave().await;
    }
    dealer.leave().await;
    Ok(())
}
