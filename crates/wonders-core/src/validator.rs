//! Structural checks on submitted actions.
//!
//! Violations are collected, not raised: a [`ValidationResult`] lists every
//! rule an action breaks so the host can relay them to the player.

use crate::actions::{Action, ActionKind};
use crate::cards::{CardId, CardInstance};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A rule an action breaks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionViolation {
    #[error("Card {0} is not in your hand")]
    NotInHand(CardInstance),

    #[error("Card {0} is already built")]
    AlreadyBuilt(CardId),

    #[error("wonder stage index is required for WONDER action")]
    MissingWonderStage,

    #[error("Insufficient coins: need {need}, have {have}")]
    InsufficientCoins { need: u32, have: u32 },

    #[error("Player not found")]
    PlayerNotFound,

    #[error("Card {0} not found")]
    UnknownCard(CardId),

    #[error("Player has no wonder assigned")]
    NoWonderAssigned,

    #[error("Wonder stage {requested} is not the next buildable stage")]
    WonderStageUnavailable { requested: u8 },
}

/// Outcome of a validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn from_violations(violations: &[ActionViolation]) -> Self {
        Self {
            valid: violations.is_empty(),
            errors: violations.iter().map(ToString::to_string).collect(),
        }
    }
}

pub struct ActionValidator;

impl ActionValidator {
    /// Check an action against the acting player's hand, treasury and city
    pub fn validate(
        action: &Action,
        hand: &[CardInstance],
        coins: u32,
        built: &[CardInstance],
    ) -> ValidationResult {
        ValidationResult::from_violations(&Self::violations(action, hand, coins, built))
    }

    pub fn violations(
        action: &Action,
        hand: &[CardInstance],
        coins: u32,
        built: &[CardInstance],
    ) -> Vec<ActionViolation> {
        let mut violations = Vec::new();

        if !hand.contains(&action.card) {
            violations.push(ActionViolation::NotInHand(action.card.clone()));
        }

        match action.kind {
            ActionKind::Build => {
                if built.iter().any(|b| b.card == action.card.card) {
                    violations.push(ActionViolation::AlreadyBuilt(action.card.card.clone()));
                }
            }
            ActionKind::Wonder => {
                if action.wonder_stage.is_none() {
                    violations.push(ActionViolation::MissingWonderStage);
                }
            }
            ActionKind::Sell => {}
        }

        if action.kind != ActionKind::Sell {
            if let Some(payment) = &action.payment {
                if payment.coins_spent > coins {
                    violations.push(ActionViolation::InsufficientCoins {
                        need: payment.coins_spent,
                        have: coins,
                    });
                }
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Payment;

    fn hand() -> Vec<CardInstance> {
        vec![
            CardInstance::new("LUMBER_YARD", 1),
            CardInstance::new("BATHS", 1),
            CardInstance::new("ALTAR", 2),
        ]
    }

    #[test]
    fn test_sell_in_hand_is_valid() {
        let built = vec![CardInstance::new("BATHS", 2)];
        let result = ActionValidator::validate(
            &Action::sell("p1", CardInstance::new("BATHS", 1)),
            &hand(),
            0,
            &built,
        );
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_build_already_built_type() {
        let built = vec![CardInstance::new("BATHS", 2)];
        let result = ActionValidator::validate(
            &Action::build("p1", CardInstance::new("BATHS", 1)),
            &hand(),
            3,
            &built,
        );
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["Card BATHS is already built"]);
    }

    #[test]
    fn test_errors_accumulate() {
        let built = vec![CardInstance::new("TAVERN", 1)];
        let action = Action::build("p1", CardInstance::new("TAVERN", 3)).with_payment(Payment {
            coins_spent: 5,
            ..Payment::default()
        });
        let violations = ActionValidator::violations(&action, &hand(), 2, &built);
        assert_eq!(
            violations,
            vec![
                ActionViolation::NotInHand(CardInstance::new("TAVERN", 3)),
                ActionViolation::AlreadyBuilt("TAVERN".to_string()),
                ActionViolation::InsufficientCoins { need: 5, have: 2 },
            ]
        );
        let result = ActionValidator::validate(&action, &hand(), 2, &built);
        assert_eq!(result.errors[0], "Card TAVERN#3 is not in your hand");
        assert_eq!(result.errors[2], "Insufficient coins: need 5, have 2");
    }

    #[test]
    fn test_wonder_requires_stage() {
        let mut action = Action::wonder("p1", CardInstance::new("ALTAR", 2), 0);
        assert!(ActionValidator::validate(&action, &hand(), 0, &[]).valid);

        action.wonder_stage = None;
        let violations = ActionValidator::violations(&action, &hand(), 0, &[]);
        assert_eq!(violations, vec![ActionViolation::MissingWonderStage]);
    }

    #[test]
    fn test_sell_ignores_payment() {
        let action = Action::sell("p1", CardInstance::new("ALTAR", 2)).with_payment(Payment {
            coins_spent: 99,
            ..Payment::default()
        });
        assert!(ActionValidator::validate(&action, &hand(), 0, &[]).valid);
    }
}
