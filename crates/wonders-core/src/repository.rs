//! Read-only access to static rule data.
//!
//! The engine, solver and AI never reach for global tables; they are handed
//! a [`RuleRepository`] at construction. [`StaticRepository`] is the stock
//! implementation, loaded from JSON and shipping the base game.

use crate::cards::{CardInstance, CardType, Color, Wonder, WonderSide, WonderStage};
use crate::expansion::RuleSet;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use thiserror::Error;

const BASE_CARDS: &str = include_str!("../data/cards.json");
const BASE_WONDERS: &str = include_str!("../data/wonders.json");

/// Errors raised while loading rule data
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("malformed {what} data: {source}")]
    Malformed {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate {what} id `{id}`")]
    DuplicateId { what: &'static str, id: String },
}

/// Lookup of static card and wonder definitions. Unknown ids yield empty
/// results, never errors.
pub trait RuleRepository: Send + Sync {
    /// A card type by id
    fn card(&self, id: &str) -> Option<&CardType>;

    /// Every non-guild card instance of an age for this seat count and
    /// these rule sets, in a stable order
    fn cards_for_age(&self, age: u8, player_count: u8, rule_sets: &[RuleSet]) -> Vec<CardInstance>;

    /// One instance of every guild available under these rule sets
    fn guilds(&self, rule_sets: &[RuleSet]) -> Vec<CardInstance>;

    /// A wonder board by id
    fn wonder(&self, id: &str) -> Option<&Wonder>;

    /// Ids of every wonder board, in a stable order
    fn wonder_ids(&self) -> Vec<String>;

    /// Stage list of one side of a wonder
    fn wonder_stages(&self, id: &str, side: WonderSide) -> &[WonderStage] {
        self.wonder(id).map(|w| w.stages(side)).unwrap_or(&[])
    }
}

/// In-memory repository built from JSON
#[derive(Debug, Clone)]
pub struct StaticRepository {
    cards: Vec<CardType>,
    card_index: HashMap<String, usize>,
    wonders: Vec<Wonder>,
    wonder_index: HashMap<String, usize>,
}

impl StaticRepository {
    /// The base game: three ages of cards, ten guilds and seven wonders
    pub fn base() -> Result<Self, RepositoryError> {
        Self::from_json(BASE_CARDS, BASE_WONDERS)
    }

    pub fn from_json(cards_json: &str, wonders_json: &str) -> Result<Self, RepositoryError> {
        let cards: Vec<CardType> = parse("card", cards_json)?;
        let wonders: Vec<Wonder> = parse("wonder", wonders_json)?;
        Self::new(cards, wonders)
    }

    pub fn new(cards: Vec<CardType>, wonders: Vec<Wonder>) -> Result<Self, RepositoryError> {
        let card_index = index("card", cards.iter().map(|c| c.id.as_str()))?;
        let wonder_index = index("wonder", wonders.iter().map(|w| w.id.as_str()))?;
        Ok(Self {
            cards,
            card_index,
            wonders,
            wonder_index,
        })
    }
}

fn parse<T: DeserializeOwned>(what: &'static str, json: &str) -> Result<T, RepositoryError> {
    serde_json::from_str(json).map_err(|source| RepositoryError::Malformed { what, source })
}

fn index<'a>(
    what: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<HashMap<String, usize>, RepositoryError> {
    let mut map = HashMap::new();
    for (position, id) in ids.enumerate() {
        if map.insert(id.to_string(), position).is_some() {
            return Err(RepositoryError::DuplicateId {
                what,
                id: id.to_string(),
            });
        }
    }
    Ok(map)
}

impl RuleRepository for StaticRepository {
    fn card(&self, id: &str) -> Option<&CardType> {
        self.card_index.get(id).map(|&i| &self.cards[i])
    }

    fn cards_for_age(&self, age: u8, player_count: u8, rule_sets: &[RuleSet]) -> Vec<CardInstance> {
        self.cards
            .iter()
            .filter(|c| c.age == age && c.color != Color::Purple)
            .filter(|c| rule_sets.contains(&c.expansion))
            .flat_map(|c| {
                (1..=c.copies_for(player_count))
                    .map(move |copy| CardInstance::new(c.id.clone(), copy as u8))
            })
            .collect()
    }

    fn guilds(&self, rule_sets: &[RuleSet]) -> Vec<CardInstance> {
        self.cards
            .iter()
            .filter(|c| c.color == Color::Purple && rule_sets.contains(&c.expansion))
            .map(|c| CardInstance::new(c.id.clone(), 1))
            .collect()
    }

    fn wonder(&self, id: &str) -> Option<&Wonder> {
        self.wonder_index.get(id).map(|&i| &self.wonders[i])
    }

    fn wonder_ids(&self) -> Vec<String> {
        self.wonders.iter().map(|w| w.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{EffectKind, Resource};
    use crate::rules::HAND_SIZE;
    use std::collections::HashSet;

    #[test]
    fn test_base_data_loads() {
        let repo = StaticRepository::base().unwrap();
        assert_eq!(repo.wonder_ids().len(), 7);
        assert_eq!(repo.guilds(&[RuleSet::Base]).len(), 10);
    }

    #[test]
    fn test_pool_size_matches_seats() {
        let repo = StaticRepository::base().unwrap();
        for players in 3u8..=7 {
            let seats = usize::from(players);
            for age in 1..=2 {
                let pool = repo.cards_for_age(age, players, &[RuleSet::Base]);
                assert_eq!(pool.len(), HAND_SIZE * seats, "age {} players {}", age, players);
            }
            // age 3 is completed by players + 2 guilds
            let pool = repo.cards_for_age(3, players, &[RuleSet::Base]);
            assert_eq!(pool.len() + seats + 2, HAND_SIZE * seats);
        }
    }

    #[test]
    fn test_pool_instances_are_distinct() {
        let repo = StaticRepository::base().unwrap();
        let pool = repo.cards_for_age(1, 7, &[RuleSet::Base]);
        let unique: HashSet<_> = pool.iter().collect();
        assert_eq!(unique.len(), pool.len());
        assert!(pool.contains(&CardInstance::new("LUMBER_YARD", 2)));
    }

    #[test]
    fn test_unknown_ids_are_empty() {
        let repo = StaticRepository::base().unwrap();
        assert!(repo.card("NOPE").is_none());
        assert!(repo.wonder("NOPE").is_none());
        assert!(repo.wonder_stages("NOPE", WonderSide::Day).is_empty());
        assert!(repo.cards_for_age(9, 3, &[RuleSet::Base]).is_empty());
    }

    #[test]
    fn test_inactive_rule_set_filters_cards() {
        let repo = StaticRepository::base().unwrap();
        assert!(repo.cards_for_age(1, 3, &[RuleSet::Cities]).is_empty());
    }

    #[test]
    fn test_wonder_stage_lookup() {
        let repo = StaticRepository::base().unwrap();
        assert_eq!(repo.wonder_stages("GIZA", WonderSide::Day).len(), 3);
        assert_eq!(repo.wonder_stages("GIZA", WonderSide::Night).len(), 4);
        assert_eq!(repo.wonder_stages("RHODES", WonderSide::Night).len(), 2);
        assert_eq!(repo.wonder("RHODES").map(|w| w.resource), Some(Resource::Ore));
    }

    #[test]
    fn test_formulas_parse_at_load() {
        let repo = StaticRepository::base().unwrap();
        let vineyard = repo.card("VINEYARD").unwrap();
        assert!(matches!(
            vineyard.effects[0].kind,
            EffectKind::GainCoinsFormula { .. }
        ));
    }

    #[test]
    fn test_malformed_json() {
        let err = StaticRepository::from_json("[{]", "[]").unwrap_err();
        assert!(matches!(err, RepositoryError::Malformed { what: "card", .. }));

        let bad_formula = r#"[{"id":"X","name":"X","age":1,"color":"YELLOW",
            "effects":[{"action":"GAIN_VP_FORMULA","formula":"COUNT(cards) * 2"}]}]"#;
        assert!(StaticRepository::from_json(bad_formula, "[]").is_err());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let cards = r#"[{"id":"X","name":"X","age":1,"color":"BLUE"},
                        {"id":"X","name":"Y","age":1,"color":"BLUE"}]"#;
        let err = StaticRepository::from_json(cards, "[]").unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateId { what: "card", .. }));
    }
}
