//! Effect ordering, classification and scoring formulas.
//!
//! Effects resolve in ascending priority so that counters read by later
//! formulas are already up to date. Formulas are kept as strings in the rule
//! data and parsed once, at load time:
//!
//! - `COUNT(cards.YELLOW) * 2` counts the owner's cards
//! - `COUNT_ALL(cards.BROWN) * 1` counts the owner's and both neighbors' cards
//! - `COUNT_NEIGHBORS(cards.BLUE) * 1` counts both neighbors' cards only
//!
//! Besides `cards.COLOR[+COLOR...]` a formula can count `wonder.stages` and
//! `military.defeats`.

use crate::cards::{Color, Effect, EffectKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// When an effect takes hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectClass {
    /// Applied once, when built
    Immediate,
    /// Holds for the rest of the game (production, discounts)
    Persistent,
    /// Fires on a condition the host resolves
    Triggered,
    /// Counted at final scoring
    EndGame,
}

/// Whose cards a formula counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Own,
    Neighbors,
    OwnAndNeighbors,
}

/// What a formula counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// Built cards of any of these colors
    Cards(Vec<Color>),
    /// Built wonder stages
    WonderStages,
    /// Military defeat tokens
    DefeatTokens,
}

/// `count(scope, subject) × multiplier`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Formula {
    pub scope: Scope,
    pub subject: Subject,
    pub multiplier: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("formula `{0}` is not of the form FUNC(subject) * k")]
    Shape(String),

    #[error("unknown count function `{0}`")]
    Function(String),

    #[error("unknown formula subject `{0}`")]
    Subject(String),

    #[error("invalid multiplier `{0}`")]
    Multiplier(String),
}

impl Formula {
    pub fn new(scope: Scope, subject: Subject, multiplier: u32) -> Self {
        Self {
            scope,
            subject,
            multiplier,
        }
    }
}

impl FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (call, multiplier) = s
            .split_once('*')
            .ok_or_else(|| FormulaError::Shape(s.to_string()))?;
        let multiplier = multiplier.trim();
        let multiplier = multiplier
            .parse::<u32>()
            .map_err(|_| FormulaError::Multiplier(multiplier.to_string()))?;

        let call = call.trim();
        let (function, rest) = call
            .split_once('(')
            .ok_or_else(|| FormulaError::Shape(s.to_string()))?;
        let argument = rest
            .strip_suffix(')')
            .ok_or_else(|| FormulaError::Shape(s.to_string()))?
            .trim();

        let scope = match function.trim() {
            "COUNT" => Scope::Own,
            "COUNT_NEIGHBORS" => Scope::Neighbors,
            "COUNT_ALL" => Scope::OwnAndNeighbors,
            other => return Err(FormulaError::Function(other.to_string())),
        };

        let subject = match argument {
            "wonder.stages" => Subject::WonderStages,
            "military.defeats" => Subject::DefeatTokens,
            _ => {
                let colors = argument
                    .strip_prefix("cards.")
                    .ok_or_else(|| FormulaError::Subject(argument.to_string()))?;
                let colors = colors
                    .split('+')
                    .map(|c| c.trim().parse::<Color>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| FormulaError::Subject(argument.to_string()))?;
                Subject::Cards(colors)
            }
        };

        Ok(Formula::new(scope, subject, multiplier))
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let function = match self.scope {
            Scope::Own => "COUNT",
            Scope::Neighbors => "COUNT_NEIGHBORS",
            Scope::OwnAndNeighbors => "COUNT_ALL",
        };
        let subject = match &self.subject {
            Subject::Cards(colors) => {
                let names: Vec<String> = colors.iter().map(|c| c.to_string()).collect();
                format!("cards.{}", names.join("+"))
            }
            Subject::WonderStages => "wonder.stages".to_string(),
            Subject::DefeatTokens => "military.defeats".to_string(),
        };
        write!(f, "{}({}) * {}", function, subject, self.multiplier)
    }
}

impl TryFrom<String> for Formula {
    type Error = FormulaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Formula> for String {
    fn from(formula: Formula) -> Self {
        formula.to_string()
    }
}

/// The publicly visible part of a player that formulas can count
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tableau {
    /// Color of every built card
    pub colors: Vec<Color>,
    pub wonder_stages: u32,
    pub defeats: u32,
}

impl Tableau {
    fn count(&self, subject: &Subject) -> u32 {
        match subject {
            Subject::Cards(colors) => {
                self.colors.iter().filter(|c| colors.contains(c)).count() as u32
            }
            Subject::WonderStages => self.wonder_stages,
            Subject::DefeatTokens => self.defeats,
        }
    }
}

/// A player's tableau together with both neighbors'
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub own: &'a Tableau,
    pub left: &'a Tableau,
    pub right: &'a Tableau,
}

/// Stateless effect helpers
pub struct EffectResolver;

impl EffectResolver {
    /// Effects in resolution order (stable for equal priorities)
    pub fn sort_by_priority(effects: &[Effect]) -> Vec<&Effect> {
        let mut sorted: Vec<&Effect> = effects.iter().collect();
        sorted.sort_by_key(|e| e.priority);
        sorted
    }

    pub fn classify(effect: &Effect) -> EffectClass {
        match effect.kind {
            EffectKind::GainCoins { .. }
            | EffectKind::GainCoinsFormula { .. }
            | EffectKind::GainMilitary { .. }
            | EffectKind::GainScience { .. } => EffectClass::Immediate,
            EffectKind::ProduceResource { .. }
            | EffectKind::ProduceChoice { .. }
            | EffectKind::TradeDiscount { .. } => EffectClass::Persistent,
            EffectKind::Special { .. } => EffectClass::Triggered,
            EffectKind::GainVp { .. }
            | EffectKind::GainVpFormula { .. }
            | EffectKind::GainScienceWild => EffectClass::EndGame,
        }
    }

    /// Effects applied when built, in resolution order
    pub fn immediate_effects(effects: &[Effect]) -> Vec<&Effect> {
        Self::sort_by_priority(effects)
            .into_iter()
            .filter(|e| Self::classify(e) == EffectClass::Immediate)
            .collect()
    }

    /// Effects counted at final scoring, in resolution order
    pub fn end_game_effects(effects: &[Effect]) -> Vec<&Effect> {
        Self::sort_by_priority(effects)
            .into_iter()
            .filter(|e| Self::classify(e) == EffectClass::EndGame)
            .collect()
    }

    pub fn evaluate(formula: &Formula, ctx: &ScoringContext<'_>) -> u32 {
        let count = match formula.scope {
            Scope::Own => ctx.own.count(&formula.subject),
            Scope::Neighbors => {
                ctx.left.count(&formula.subject) + ctx.right.count(&formula.subject)
            }
            Scope::OwnAndNeighbors => {
                ctx.own.count(&formula.subject)
                    + ctx.left.count(&formula.subject)
                    + ctx.right.count(&formula.subject)
            }
        };
        count * formula.multiplier
    }

    /// Evaluate a formula given as text; anything unrecognized is worth 0
    pub fn evaluate_str(formula: &str, ctx: &ScoringContext<'_>) -> u32 {
        formula
            .parse::<Formula>()
            .map(|f| Self::evaluate(&f, ctx))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{Resource, ScienceSymbol};

    fn tableau(colors: &[Color]) -> Tableau {
        Tableau {
            colors: colors.to_vec(),
            ..Tableau::default()
        }
    }

    #[test]
    fn test_sort_by_priority() {
        let effects = vec![
            Effect::with_priority(EffectKind::GainVp { value: 1 }, 90),
            Effect::with_priority(EffectKind::GainCoins { value: 2 }, 10),
            Effect::with_priority(EffectKind::GainMilitary { value: 3 }, 50),
        ];
        let sorted: Vec<u8> = EffectResolver::sort_by_priority(&effects)
            .iter()
            .map(|e| e.priority)
            .collect();
        assert_eq!(sorted, vec![10, 50, 90]);
    }

    #[test]
    fn test_classification() {
        let immediate = Effect::new(EffectKind::GainScience {
            symbol: ScienceSymbol::Gear,
        });
        let persistent = Effect::new(EffectKind::ProduceResource {
            resource: Resource::Wood,
            amount: 1,
        });
        let end_game = Effect::new(EffectKind::GainVp { value: 3 });
        assert_eq!(EffectResolver::classify(&immediate), EffectClass::Immediate);
        assert_eq!(EffectResolver::classify(&persistent), EffectClass::Persistent);
        assert_eq!(EffectResolver::classify(&end_game), EffectClass::EndGame);

        let effects = vec![end_game, persistent, immediate];
        assert_eq!(EffectResolver::immediate_effects(&effects).len(), 1);
        assert_eq!(EffectResolver::end_game_effects(&effects).len(), 1);
    }

    #[test]
    fn test_parse_and_display() {
        let formula: Formula = "COUNT(cards.YELLOW) * 2".parse().unwrap();
        assert_eq!(
            formula,
            Formula::new(Scope::Own, Subject::Cards(vec![Color::Yellow]), 2)
        );
        assert_eq!(formula.to_string(), "COUNT(cards.YELLOW) * 2");

        let formula: Formula = "COUNT_NEIGHBORS(cards.BROWN+GREY)*1".parse().unwrap();
        assert_eq!(formula.scope, Scope::Neighbors);
        assert_eq!(formula.subject, Subject::Cards(vec![Color::Brown, Color::Grey]));

        let formula: Formula = "COUNT_ALL(wonder.stages) * 1".parse().unwrap();
        assert_eq!(formula.subject, Subject::WonderStages);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "COUNT(cards.YELLOW)".parse::<Formula>(),
            Err(FormulaError::Shape(_))
        ));
        assert!(matches!(
            "SUM(cards.YELLOW) * 2".parse::<Formula>(),
            Err(FormulaError::Function(_))
        ));
        assert!(matches!(
            "COUNT(cards.PINK) * 2".parse::<Formula>(),
            Err(FormulaError::Subject(_))
        ));
        assert!(matches!(
            "COUNT(cards.BLUE) * x".parse::<Formula>(),
            Err(FormulaError::Multiplier(_))
        ));
    }

    #[test]
    fn test_evaluate_own_and_all() {
        let own = tableau(&[Color::Yellow, Color::Yellow, Color::Brown]);
        let left = tableau(&[Color::Yellow, Color::Brown]);
        let right = tableau(&[Color::Brown, Color::Brown]);
        let ctx = ScoringContext {
            own: &own,
            left: &left,
            right: &right,
        };

        assert_eq!(EffectResolver::evaluate_str("COUNT(cards.YELLOW) * 2", &ctx), 4);
        assert_eq!(EffectResolver::evaluate_str("COUNT_ALL(cards.BROWN) * 1", &ctx), 4);
        assert_eq!(
            EffectResolver::evaluate_str("COUNT_NEIGHBORS(cards.YELLOW) * 3", &ctx),
            3
        );
        assert_eq!(EffectResolver::evaluate_str("nonsense", &ctx), 0);
    }

    #[test]
    fn test_evaluate_stages_and_defeats() {
        let own = Tableau {
            wonder_stages: 2,
            defeats: 1,
            ..Tableau::default()
        };
        let left = Tableau {
            wonder_stages: 1,
            defeats: 2,
            ..Tableau::default()
        };
        let right = Tableau {
            wonder_stages: 3,
            defeats: 0,
            ..Tableau::default()
        };
        let ctx = ScoringContext {
            own: &own,
            left: &left,
            right: &right,
        };
        assert_eq!(EffectResolver::evaluate_str("COUNT_ALL(wonder.stages) * 1", &ctx), 6);
        assert_eq!(
            EffectResolver::evaluate_str("COUNT_NEIGHBORS(military.defeats) * 1", &ctx),
            2
        );
    }

    #[test]
    fn test_formula_serde() {
        let formula: Formula = serde_json::from_str("\"COUNT(cards.GREY) * 2\"").unwrap();
        assert_eq!(formula.multiplier, 2);
        assert!(serde_json::from_str::<Formula>("\"COUNT(cards) * 2\"").is_err());
    }
}
