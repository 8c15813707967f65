//! Named decks and deck parsing.

use planpoker_protocol::{Deck, ProtocolError};

use crate::GameError;

pub const FIBONACCI: &str = "fibonacci";
pub const TSHIRT: &str = "tshirt";

const FIBONACCI_CARDS: [&str; 10] = ["1", "2", "3", "5", "8", "13", "21", "34", "55", "89"];
const TSHIRT_CARDS: [&str; 6] = ["XS", "S", "M", "L", "XL", "XXL"];

/// Names accepted by [`get`].
pub fn available() -> &'static [&'static str] {
    &[FIBONACCI, TSHIRT]
}

/// Returns a named deck. Names are case-insensitive.
pub fn get(name: &str) -> Option<Deck> {
    let cards: &[&str] = match name.trim().to_lowercase().as_str() {
        FIBONACCI => &FIBONACCI_CARDS,
        TSHIRT => &TSHIRT_CARDS,
        _ => return None,
    };
    Deck::new(cards.iter().copied()).ok()
}

/// Builds a deck from command arguments.
///
/// A single argument is a deck name; several arguments are the cards
/// themselves, in order.
pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Deck, GameError> {
    match args {
        [] => Err(GameError::InvalidDeck("deck can't be empty".into())),
        [name] => get(name.as_ref()).ok_or_else(|| {
            GameError::InvalidDeck(format!(
                "unknown deck '{}', available: {}",
                name.as_ref(),
                available().join(", ")
            ))
        }),
        cards => Deck::new(cards.iter().map(|c| c.as_ref().trim())).map_err(|e| match e {
            ProtocolError::InvalidDeck(reason) => GameError::InvalidDeck(reason),
            other => GameError::Protocol(other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use planpoker_protocol::VoteValue;

    use super::*;

    #[test]
    fn test_named_decks() {
        let fib = get("fibonacci").unwrap();
        assert_eq!(fib.len(), 10);
        assert_eq!(fib.cards()[4], VoteValue::from("8"));

        let tshirt = get("TShirt").unwrap();
        assert_eq!(tshirt.to_string(), "[XS, S, M, L, XL, XXL]");

        assert!(get("nope").is_none());
    }

    #[test]
    fn test_parse_single_argument_is_a_name() {
        let deck = parse(&["Fibonacci"]).unwrap();
        assert_eq!(deck, get(FIBONACCI).unwrap());

        let err = parse(&["5"]).unwrap_err();
        assert!(matches!(err, GameError::InvalidDeck(_)));
    }

    #[test]
    fn test_parse_several_arguments_are_cards() {
        let deck = parse(&["1", "2", "3"]).unwrap();
        assert_eq!(deck.to_string(), "[1, 2, 3]");
    }

    #[test]
    fn test_parse_rejects_duplicates_and_empty() {
        let err = parse(&["1", "2", "1"]).unwrap_err();
        assert!(matches!(err, GameError::InvalidDeck(ref r) if r.contains("duplicate")));

        let empty: [&str; 0] = [];
        assert!(matches!(parse(&empty), Err(GameError::InvalidDeck(_))));
    }
}
