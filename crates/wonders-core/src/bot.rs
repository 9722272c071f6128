//! AI players.
//!
//! This module provides the strategies an AI seat can be driven by:
//! - Random: any card from the hand, built when affordable, sold otherwise
//! - Heuristic: scores the hand by color, military gap, science sets and
//!   chains, builds the best affordable card, falls back to a wonder stage
//!   and finally sells its weakest card
//!
//! Every decision is deterministic for a given seed.

use crate::actions::Action;
use crate::cards::{CardInstance, Color};
use crate::player::{PlayerId, Production, ScienceSymbols, TradeDiscounts};
use crate::random::SeededRandom;
use crate::repository::RuleRepository;
use crate::solver::{Market, Payment, ResourceSolver};
use serde::{Deserialize, Serialize};

/// Score of a card whose type the player already built
const ALREADY_BUILT_SCORE: f64 = -100.0;

/// Bonus for a card the player can chain into for free
const CHAIN_BONUS: f64 = 4.0;

/// Upper bound of the tie-breaking jitter
const JITTER: f64 = 0.5;

/// How an AI seat picks its card
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AiStrategy {
    Random,
    #[default]
    Heuristic,
}

/// Public knowledge available to a player choosing an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    pub player_id: PlayerId,
    pub age: u8,
    pub hand: Vec<CardInstance>,
    pub built: Vec<CardInstance>,
    pub coins: u32,
    pub military: u32,
    pub left_military: u32,
    pub right_military: u32,
    pub science: ScienceSymbols,
    pub wonder_stages_built: u8,
    pub wonder_stages_total: u8,
    pub production: Production,
    pub left_production: Production,
    pub right_production: Production,
    pub discounts: TradeDiscounts,
}

impl DecisionContext {
    fn market(&self) -> Market<'_> {
        Market {
            coins: self.coins,
            own: &self.production,
            left: &self.left_production,
            right: &self.right_production,
            discounts: self.discounts,
        }
    }

    fn has_built_type(&self, instance: &CardInstance) -> bool {
        self.built.iter().any(|b| b.card == instance.card)
    }
}

/// An AI decision maker
pub struct AiPlayer {
    pub strategy: AiStrategy,
    rng: SeededRandom,
}

impl AiPlayer {
    pub fn new(seed: &str) -> Self {
        Self::with_strategy(seed, AiStrategy::default())
    }

    pub fn with_strategy(seed: &str, strategy: AiStrategy) -> Self {
        Self {
            strategy,
            rng: SeededRandom::new(seed),
        }
    }

    /// Seed for one decision, derived from the match seed
    pub fn seed_for(root: &str, player: &str, age: u8, round: u32) -> String {
        format!("{}-ai-{}-{}-{}", root, player, age, round)
    }

    /// Choose one action for the hand in `ctx`. `None` only for an empty hand.
    pub fn choose_action(
        &mut self,
        repo: &dyn RuleRepository,
        ctx: &DecisionContext,
    ) -> Option<Action> {
        if ctx.hand.is_empty() {
            return None;
        }

        match self.strategy {
            AiStrategy::Random => self.choose_random(repo, ctx),
            AiStrategy::Heuristic => self.choose_heuristic(repo, ctx),
        }
    }

    /// Random: pick any card, build it when possible
    fn choose_random(
        &mut self,
        repo: &dyn RuleRepository,
        ctx: &DecisionContext,
    ) -> Option<Action> {
        let card = self.rng.pick(&ctx.hand)?.clone();
        if !ctx.has_built_type(&card) {
            if let Some(payment) = build_payment(repo, ctx, &card) {
                return Some(Action::build(ctx.player_id.clone(), card).with_payment(payment));
            }
        }
        Some(Action::sell(ctx.player_id.clone(), card))
    }

    /// Heuristic: best affordable build, else wonder, else sell
    fn choose_heuristic(
        &mut self,
        repo: &dyn RuleRepository,
        ctx: &DecisionContext,
    ) -> Option<Action> {
        let mut scored: Vec<(CardInstance, f64)> = ctx
            .hand
            .iter()
            .map(|card| (card.clone(), self.score_card(repo, ctx, card)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (card, _) in &scored {
            if ctx.has_built_type(card) {
                continue;
            }
            if let Some(payment) = build_payment(repo, ctx, card) {
                let action = Action::build(ctx.player_id.clone(), card.clone());
                return Some(action.with_payment(payment));
            }
        }

        let (worst, _) = scored.last()?;
        if ctx.wonder_stages_built < ctx.wonder_stages_total {
            return Some(Action::wonder(
                ctx.player_id.clone(),
                worst.clone(),
                ctx.wonder_stages_built,
            ));
        }
        Some(Action::sell(ctx.player_id.clone(), worst.clone()))
    }

    /// Desirability of one hand card; higher is better
    pub fn score_card(
        &mut self,
        repo: &dyn RuleRepository,
        ctx: &DecisionContext,
        instance: &CardInstance,
    ) -> f64 {
        let Some(card) = repo.card(&instance.card) else {
            return 0.0;
        };
        if ctx.has_built_type(instance) {
            return ALREADY_BUILT_SCORE;
        }

        let age = f64::from(ctx.age);
        let mut score = match card.color {
            Color::Brown | Color::Grey => {
                let base = match ctx.age {
                    1 => 8.0,
                    2 => 4.0,
                    _ => 1.0,
                };
                let owned = ctx
                    .built
                    .iter()
                    .filter_map(|b| repo.card(&b.card))
                    .filter(|c| c.produces_resources())
                    .count();
                if owned < 3 {
                    base + 3.0
                } else {
                    base
                }
            }
            Color::Blue => f64::from(card.declared_vp().unwrap_or(3)) * 1.5,
            Color::Red => {
                let strongest = ctx.left_military.max(ctx.right_military);
                let gap = i64::from(strongest) - i64::from(ctx.military);
                let base = if gap > 0 { 10.0 + gap as f64 * 2.0 } else { 4.0 };
                base + age * 1.5
            }
            Color::Green => match card.science_symbol() {
                Some(symbol) => {
                    f64::from(ctx.science.with_added(symbol).score() - ctx.science.score())
                }
                None => 5.0 + f64::from(ctx.science.sets()) * 2.0,
            },
            Color::Yellow => {
                if ctx.age == 1 {
                    9.0
                } else {
                    6.0
                }
            }
            Color::Purple => 8.0,
            Color::Black => 5.0,
        };

        if card.chained_from(ctx.built.iter()) {
            score += CHAIN_BONUS;
        }

        score + self.rng.next_float() * JITTER
    }
}

/// Payment for building `instance`, free through a chain, `None` when
/// unaffordable or unknown
fn build_payment(
    repo: &dyn RuleRepository,
    ctx: &DecisionContext,
    instance: &CardInstance,
) -> Option<Payment> {
    let card = repo.card(&instance.card)?;
    if card.chained_from(ctx.built.iter()) {
        return Some(Payment::free());
    }
    ResourceSolver::find_payment(&card.cost, &ctx.market())
}
