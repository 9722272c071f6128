//! Player actions and the structured results of engine operations.

use crate::cards::{CardInstance, WonderSide};
use crate::player::{PlayerId, ScienceSymbols};
use crate::solver::Payment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// What a player does with the card they picked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    /// Build the card into the player's city
    Build,
    /// Discard the card for coins
    Sell,
    /// Use the card to build the next wonder stage
    Wonder,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Build => "BUILD",
            ActionKind::Sell => "SELL",
            ActionKind::Wonder => "WONDER",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid action type: {0}")]
pub struct ParseActionKindError(pub String);

impl FromStr for ActionKind {
    type Err = ParseActionKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUILD" => Ok(ActionKind::Build),
            "SELL" => Ok(ActionKind::Sell),
            "WONDER" => Ok(ActionKind::Wonder),
            other => Err(ParseActionKindError(other.to_string())),
        }
    }
}

/// One player's choice for a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub player_id: PlayerId,
    /// The dealt card instance being played
    pub card: CardInstance,
    pub kind: ActionKind,
    /// How the player intends to pay; solved by the engine when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
    /// Stage index for WONDER
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wonder_stage: Option<u8>,
}

impl Action {
    pub fn build(player_id: impl Into<PlayerId>, card: CardInstance) -> Self {
        Self::new(player_id, card, ActionKind::Build)
    }

    pub fn sell(player_id: impl Into<PlayerId>, card: CardInstance) -> Self {
        Self::new(player_id, card, ActionKind::Sell)
    }

    pub fn wonder(player_id: impl Into<PlayerId>, card: CardInstance, stage: u8) -> Self {
        Self {
            wonder_stage: Some(stage),
            ..Self::new(player_id, card, ActionKind::Wonder)
        }
    }

    fn new(player_id: impl Into<PlayerId>, card: CardInstance, kind: ActionKind) -> Self {
        Self {
            player_id: player_id.into(),
            card,
            kind,
            payment: None,
            wonder_stage: None,
        }
    }

    /// Attach a declared payment
    pub fn with_payment(mut self, payment: Payment) -> Self {
        self.payment = Some(payment);
        self
    }
}

/// Wonder dealt to a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WonderAssignment {
    pub id: String,
    pub side: WonderSide,
}

/// Fields of one player that changed during a round. Values are the new
/// totals; `None` means unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerUpdate {
    pub player_id: PlayerId,
    /// How the player's action was actually resolved (an action that
    /// cannot be honored is resolved as SELL); `None` for a player who only
    /// received trade income
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_as: Option<ActionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coins: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub military_power: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_card: Option<CardInstance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wonder_stages_built: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub science: Option<ScienceSymbols>,
}

impl PlayerUpdate {
    pub fn new(player_id: impl Into<PlayerId>) -> Self {
        Self {
            player_id: player_id.into(),
            resolved_as: None,
            coins: None,
            military_power: None,
            built_card: None,
            wonder_stages_built: None,
            science: None,
        }
    }
}

/// Outcome of a resolved round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResult {
    pub actions: Vec<Action>,
    pub player_updates: Vec<PlayerUpdate>,
}

/// Tokens a player banked in one age's conflicts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilitaryResult {
    pub player_id: PlayerId,
    pub tokens: Vec<i32>,
}

/// Final score breakdown of one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScore {
    pub player_id: PlayerId,
    pub military: i32,
    pub treasury: u32,
    pub wonder: u32,
    pub civilian: u32,
    pub science: u32,
    pub commerce: u32,
    pub guild: u32,
    pub total: i32,
}
