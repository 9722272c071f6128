//! Player state and derived views.
//!
//! This module contains:
//! - PlayerState with coins, military, science, built cards and wonder progress
//! - ScienceSymbols and the science scoring rule
//! - Production and TradeDiscounts derived from built cards and wonder stages

use crate::cards::{
    CardInstance, DiscountScope, EffectKind, Resource, ScienceSymbol, SpecialAbility,
    WonderSide,
};
use crate::effects::Tableau;
use crate::repository::RuleRepository;
use crate::rules::{
    COINS_PER_TREASURY_VP, DEFAULT_TRADE_COST, DISCOUNTED_TRADE_COST, MILITARY_DEFEAT_TOKEN,
    SCIENCE_SET_BONUS, STARTING_COINS,
};
use serde::{Deserialize, Serialize};

/// Player identifier, as handed out by the session host
pub type PlayerId = String;

/// Science symbol counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScienceSymbols {
    pub compass: u32,
    pub gear: u32,
    pub tablet: u32,
}

impl ScienceSymbols {
    pub fn new(compass: u32, gear: u32, tablet: u32) -> Self {
        Self {
            compass,
            gear,
            tablet,
        }
    }

    pub fn get(&self, symbol: ScienceSymbol) -> u32 {
        match symbol {
            ScienceSymbol::Compass => self.compass,
            ScienceSymbol::Gear => self.gear,
            ScienceSymbol::Tablet => self.tablet,
        }
    }

    pub fn add(&mut self, symbol: ScienceSymbol, amount: u32) {
        match symbol {
            ScienceSymbol::Compass => self.compass += amount,
            ScienceSymbol::Gear => self.gear += amount,
            ScienceSymbol::Tablet => self.tablet += amount,
        }
    }

    /// Copy with one more of `symbol`
    pub fn with_added(&self, symbol: ScienceSymbol) -> Self {
        let mut next = *self;
        next.add(symbol, 1);
        next
    }

    /// Number of complete sets
    pub fn sets(&self) -> u32 {
        self.compass.min(self.gear).min(self.tablet)
    }

    /// Sum of squares plus the set bonus for every complete set
    pub fn score(&self) -> u32 {
        self.compass * self.compass
            + self.gear * self.gear
            + self.tablet * self.tablet
            + self.sets() * SCIENCE_SET_BONUS
    }

    /// Best score reachable by assigning `wild` extra symbols freely
    pub fn best_score_with_wild(&self, wild: u32) -> u32 {
        if wild == 0 {
            return self.score();
        }
        ScienceSymbol::ALL
            .iter()
            .map(|&symbol| self.with_added(symbol).best_score_with_wild(wild - 1))
            .max()
            .unwrap_or_else(|| self.score())
    }
}

/// Wonder board assigned to a player and how far it is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WonderProgress {
    pub id: String,
    pub side: WonderSide,
    pub stages_built: u8,
}

/// A single player's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub coins: u32,
    /// Shields from built cards and wonder stages
    pub military: u32,
    pub science: ScienceSymbols,
    /// Science symbols of the owner's choice, assigned at scoring
    pub science_wild: u32,
    /// Built card instances, in build order
    pub built: Vec<CardInstance>,
    pub wonder: Option<WonderProgress>,
    /// Current hand, empty between ages
    pub hand: Vec<CardInstance>,
    /// Banked conflict tokens, signed
    pub military_tokens: Vec<i32>,
    /// Abilities granted by wonder stages, resolved by the host
    pub abilities: Vec<SpecialAbility>,
}

impl PlayerState {
    /// Create a player with the starting treasury
    pub fn new(id: impl Into<PlayerId>) -> Self {
        Self {
            id: id.into(),
            coins: STARTING_COINS,
            military: 0,
            science: ScienceSymbols::default(),
            science_wild: 0,
            built: Vec::new(),
            wonder: None,
            hand: Vec::new(),
            military_tokens: Vec::new(),
            abilities: Vec::new(),
        }
    }

    /// Whether any copy of this card type is already built
    pub fn has_built_type(&self, card: &str) -> bool {
        self.built.iter().any(|b| b.card == card)
    }

    pub fn has_in_hand(&self, instance: &CardInstance) -> bool {
        self.hand.contains(instance)
    }

    pub fn wonder_stages_built(&self) -> u8 {
        self.wonder.as_ref().map_or(0, |w| w.stages_built)
    }

    /// Sum of banked military tokens
    pub fn military_score(&self) -> i32 {
        self.military_tokens.iter().sum()
    }

    pub fn defeats(&self) -> u32 {
        self.military_tokens
            .iter()
            .filter(|&&t| t == MILITARY_DEFEAT_TOKEN)
            .count() as u32
    }

    pub fn treasury_score(&self) -> u32 {
        self.coins / COINS_PER_TREASURY_VP
    }

    /// Effects of every built card and built wonder stage
    fn owned_effects<'a>(
        &'a self,
        repo: &'a dyn RuleRepository,
    ) -> impl Iterator<Item = &'a EffectKind> + 'a {
        let card_effects = self
            .built
            .iter()
            .filter_map(move |b| repo.card(&b.card))
            .flat_map(|c| c.effects.iter());

        let stage_effects = self
            .wonder
            .iter()
            .flat_map(move |w| {
                repo.wonder_stages(&w.id, w.side)
                    .iter()
                    .take(usize::from(w.stages_built))
            })
            .flat_map(|s| s.effects.iter());

        card_effects.chain(stage_effects).map(|e| &e.kind)
    }

    /// Everything this player produces each turn
    pub fn production(&self, repo: &dyn RuleRepository) -> Production {
        let mut production = Production::default();
        if let Some(resource) = self
            .wonder
            .as_ref()
            .and_then(|w| repo.wonder(&w.id))
            .map(|w| w.resource)
        {
            production.fixed.push(resource);
        }
        for effect in self.owned_effects(repo) {
            production.add_effect(effect);
        }
        production
    }

    pub fn trade_discounts(&self, repo: &dyn RuleRepository) -> TradeDiscounts {
        let mut discounts = TradeDiscounts::default();
        for effect in self.owned_effects(repo) {
            if let EffectKind::TradeDiscount { scope } = effect {
                discounts.apply(*scope);
            }
        }
        discounts
    }

    /// Public view used by scoring formulas
    pub fn tableau(&self, repo: &dyn RuleRepository) -> Tableau {
        Tableau {
            colors: self
                .built
                .iter()
                .filter_map(|b| repo.card(&b.card))
                .map(|c| c.color)
                .collect(),
            wonder_stages: u32::from(self.wonder_stages_built()),
            defeats: self.defeats(),
        }
    }
}

/// Resource production available to a player for one payment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    /// One entry per unit of fixed production
    pub fixed: Vec<Resource>,
    /// One entry per choice source; each yields one of its resources
    pub choices: Vec<Vec<Resource>>,
}

impl Production {
    pub fn add_effect(&mut self, effect: &EffectKind) {
        match effect {
            EffectKind::ProduceResource { resource, amount } => {
                self.fixed
                    .extend(std::iter::repeat(*resource).take(*amount as usize));
            }
            EffectKind::ProduceChoice { choices } => {
                self.choices.push(choices.clone());
            }
            _ => {}
        }
    }

    /// Fixed units of `resource`
    pub fn fixed_units(&self, resource: Resource) -> u32 {
        self.fixed.iter().filter(|&&r| r == resource).count() as u32
    }
}

/// Trading prices a player enjoys with each neighbor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeDiscounts {
    pub left_raw: bool,
    pub right_raw: bool,
    pub manufactured: bool,
}

impl TradeDiscounts {
    pub fn apply(&mut self, scope: DiscountScope) {
        match scope {
            DiscountScope::RawLeft => self.left_raw = true,
            DiscountScope::RawRight => self.right_raw = true,
            DiscountScope::RawBoth => {
                self.left_raw = true;
                self.right_raw = true;
            }
            DiscountScope::Manufactured => self.manufactured = true,
        }
    }

    /// Price of one unit of `resource` bought from the left neighbor
    pub fn left_price(&self, resource: Resource) -> u32 {
        Self::price(resource, self.left_raw, self.manufactured)
    }

    /// Price of one unit of `resource` bought from the right neighbor
    pub fn right_price(&self, resource: Resource) -> u32 {
        Self::price(resource, self.right_raw, self.manufactured)
    }

    fn price(resource: Resource, raw_discount: bool, manufactured_discount: bool) -> u32 {
        let discounted = if resource.is_raw() {
            raw_discount
        } else {
            manufactured_discount
        };
        if discounted {
            DISCOUNTED_TRADE_COST
        } else {
            DEFAULT_TRADE_COST
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_player_defaults() {
        let player = PlayerState::new("p1");
        assert_eq!(player.coins, 3);
        assert_eq!(player.military, 0);
        assert_eq!(player.science, ScienceSymbols::default());
        assert!(player.built.is_empty());
        assert!(player.wonder.is_none());
    }

    #[test]
    fn test_science_score_sets() {
        // two complete sets earn the 7-point bonus twice: 12 + 14
        assert_eq!(ScienceSymbols::new(2, 2, 2).score(), 4 + 4 + 4 + 2 * 7);
        assert_eq!(ScienceSymbols::new(1, 1, 1).score(), 10);
        assert_eq!(ScienceSymbols::new(3, 0, 0).score(), 9);
        assert_eq!(ScienceSymbols::default().score(), 0);
    }

    #[test]
    fn test_science_wild_picks_best() {
        // 1,1,0 + wild: tablet completes a set (1+1+1+7=10) vs compass (4+1=5)
        assert_eq!(ScienceSymbols::new(1, 1, 0).best_score_with_wild(1), 10);
        // 3,0,0 + wild: another compass gives 16
        assert_eq!(ScienceSymbols::new(3, 0, 0).best_score_with_wild(1), 16);
    }

    #[test]
    fn test_military_tokens() {
        let mut player = PlayerState::new("p1");
        player.military_tokens = vec![1, -1, 3, -1];
        assert_eq!(player.military_score(), 2);
        assert_eq!(player.defeats(), 2);
    }

    #[test]
    fn test_treasury() {
        let mut player = PlayerState::new("p1");
        player.coins = 11;
        assert_eq!(player.treasury_score(), 3);
    }

    #[test]
    fn test_production_from_effects() {
        let mut production = Production::default();
        production.add_effect(&EffectKind::ProduceResource {
            resource: Resource::Wood,
            amount: 2,
        });
        production.add_effect(&EffectKind::ProduceChoice {
            choices: vec![Resource::Stone, Resource::Clay],
        });
        production.add_effect(&EffectKind::GainCoins { value: 3 });

        assert_eq!(production.fixed_units(Resource::Wood), 2);
        assert_eq!(production.choices.len(), 1);
    }

    #[test]
    fn test_trade_prices() {
        let mut discounts = TradeDiscounts::default();
        assert_eq!(discounts.left_price(Resource::Wood), 2);
        assert_eq!(discounts.right_price(Resource::Glass), 2);

        discounts.apply(DiscountScope::RawRight);
        assert_eq!(discounts.left_price(Resource::Wood), 2);
        assert_eq!(discounts.right_price(Resource::Wood), 1);
        assert_eq!(discounts.right_price(Resource::Glass), 2);

        discounts.apply(DiscountScope::Manufactured);
        assert_eq!(discounts.left_price(Resource::Loom), 1);
    }
}
