//! Rule sets and the hooks expansions plug into.
//!
//! Only the base game is implemented. Each expansion gets a hook that the
//! engine calls around every turn and at the end of each age; the shipped
//! hooks pass everything through unchanged.

use crate::actions::{Action, TurnResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A rule set a card or hook belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleSet {
    #[default]
    Base,
    Leaders,
    Cities,
    Armada,
    Edifice,
}

impl RuleSet {
    /// Parse rule-set ids, always including `Base`. Unknown ids are returned
    /// separately so the caller can report them.
    pub fn parse_active<S: AsRef<str>>(ids: &[S]) -> (Vec<RuleSet>, Vec<String>) {
        let mut active = vec![RuleSet::Base];
        let mut unknown = Vec::new();
        for id in ids {
            match id.as_ref().parse::<RuleSet>() {
                Ok(rule_set) if !active.contains(&rule_set) => active.push(rule_set),
                Ok(_) => {}
                Err(_) => unknown.push(id.as_ref().to_string()),
            }
        }
        (active, unknown)
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleSet::Base => "BASE",
            RuleSet::Leaders => "LEADERS",
            RuleSet::Cities => "CITIES",
            RuleSet::Armada => "ARMADA",
            RuleSet::Edifice => "EDIFICE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown rule set `{0}`")]
pub struct ParseRuleSetError(pub String);

impl FromStr for RuleSet {
    type Err = ParseRuleSetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BASE" => Ok(RuleSet::Base),
            "LEADERS" => Ok(RuleSet::Leaders),
            "CITIES" => Ok(RuleSet::Cities),
            "ARMADA" => Ok(RuleSet::Armada),
            "EDIFICE" => Ok(RuleSet::Edifice),
            _ => Err(ParseRuleSetError(s.to_string())),
        }
    }
}

/// Extension points an expansion uses to alter turn resolution
pub trait RuleSetHook: Send + Sync {
    fn rule_set(&self) -> RuleSet;

    /// Adjust the submitted batch before it is resolved
    fn pre_turn(&self, actions: Vec<Action>) -> Vec<Action> {
        actions
    }

    /// Adjust the result after the batch is resolved
    fn post_turn(&self, _result: &mut TurnResult) {}

    /// Called once military conflicts of an age are settled
    fn on_age_end(&self, _age: u8) {}
}

/// Pass-through hook for an expansion whose rules are not implemented
#[derive(Debug, Clone, Copy)]
pub struct StubHook(RuleSet);

impl RuleSetHook for StubHook {
    fn rule_set(&self) -> RuleSet {
        self.0
    }
}

/// Hooks for every active expansion, in activation order
pub fn hooks_for(rule_sets: &[RuleSet]) -> Vec<Box<dyn RuleSetHook>> {
    rule_sets
        .iter()
        .filter(|rs| **rs != RuleSet::Base)
        .map(|rs| Box::new(StubHook(*rs)) as Box<dyn RuleSetHook>)
        .collect()
}
