//! Fixed rule constants shared by the engine, the solver and the AI.

/// Fewest seats a match can have
pub const MIN_PLAYERS: u8 = 3;

/// Most seats a match can have
pub const MAX_PLAYERS: u8 = 7;

/// Number of ages in a match
pub const AGE_COUNT: u8 = 3;

/// Cards dealt to each player at the start of an age
pub const HAND_SIZE: usize = 7;

/// Rounds played per age (the last card of each hand is discarded)
pub const ROUNDS_PER_AGE: u32 = 6;

/// Coins every player starts with
pub const STARTING_COINS: u32 = 3;

/// Coins credited for selling a card
pub const SELL_CARD_COINS: u32 = 3;

/// Price of one unit bought from a neighbor
pub const DEFAULT_TRADE_COST: u32 = 2;

/// Price of one unit bought under a trade discount
pub const DISCOUNTED_TRADE_COST: u32 = 1;

/// Token value for a lost military conflict
pub const MILITARY_DEFEAT_TOKEN: i32 = -1;

/// Bonus for each complete set of the three science symbols
pub const SCIENCE_SET_BONUS: u32 = 7;

/// Coins per treasury victory point
pub const COINS_PER_TREASURY_VP: u32 = 3;

/// Priority given to effects that do not declare one
pub const DEFAULT_EFFECT_PRIORITY: u8 = 50;

/// Victory token value for a won conflict, or `None` outside ages 1-3
pub fn military_victory_token(age: u8) -> Option<i32> {
    match age {
        1 => Some(1),
        2 => Some(3),
        3 => Some(5),
        _ => None,
    }
}

/// Direction hands travel during an age
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassDirection {
    Left,
    Right,
}

impl PassDirection {
    /// Ages 1 and 3 pass left, age 2 passes right
    pub fn for_age(age: u8) -> Self {
        if age == 2 {
            PassDirection::Right
        } else {
            PassDirection::Left
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_victory_tokens_per_age() {
        assert_eq!(military_victory_token(1), Some(1));
        assert_eq!(military_victory_token(2), Some(3));
        assert_eq!(military_victory_token(3), Some(5));
        assert_eq!(military_victory_token(0), None);
        assert_eq!(military_victory_token(4), None);
    }

    #[test]
    fn test_pass_direction() {
        assert_eq!(PassDirection::for_age(1), PassDirection::Left);
        assert_eq!(PassDirection::for_age(2), PassDirection::Right);
        assert_eq!(PassDirection::for_age(3), PassDirection::Left);
    }
}
