//! Core match engine.
//!
//! This module contains the `GameEngine` that drives one match:
//! - seat setup, wonder assignment and dealing
//! - simultaneous resolution of a round of actions
//! - military conflicts at the end of each age
//! - final scoring
//!
//! The engine is synchronous and performs no I/O. Calls made out of order
//! degrade to empty results and are logged as warnings.

use crate::actions::{
    Action, ActionKind, FinalScore, MilitaryResult, PlayerUpdate, TurnResult, WonderAssignment,
};
use crate::bot::{AiPlayer, AiStrategy, DecisionContext};
use crate::cards::{CardInstance, Color, Cost, Effect, EffectKind, WonderSide};
use crate::effects::{EffectResolver, Formula, ScoringContext, Tableau};
use crate::expansion::{hooks_for, RuleSet, RuleSetHook};
use crate::player::{PlayerId, PlayerState, Production, WonderProgress};
use crate::random::SeededRandom;
use crate::repository::RuleRepository;
use crate::rules::{
    military_victory_token, PassDirection, AGE_COUNT, HAND_SIZE, MAX_PLAYERS, MILITARY_DEFEAT_TOKEN,
    MIN_PLAYERS, SELL_CARD_COINS,
};
use crate::solver::{Market, Payment, ResourceSolver};
use crate::validator::{ActionValidator, ActionViolation, ValidationResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised when constructing an engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("player count must be between 3 and 7, got {0}")]
    PlayerCount(u8),
}

/// Match configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root seed every random decision derives from
    pub seed: String,
    pub player_count: u8,
    /// Active rule sets; `Base` is always implied
    #[serde(default)]
    pub rule_sets: Vec<RuleSet>,
}

impl EngineConfig {
    pub fn new(seed: impl Into<String>, player_count: u8) -> Self {
        Self {
            seed: seed.into(),
            player_count,
            rule_sets: vec![RuleSet::Base],
        }
    }

    /// Activate rule sets by id; unknown ids are logged and ignored
    pub fn with_rule_set_ids<S: AsRef<str>>(mut self, ids: &[S]) -> Self {
        let (active, unknown) = RuleSet::parse_active(ids);
        for id in unknown {
            warn!(rule_set = %id, "ignoring unknown rule set");
        }
        self.rule_sets = active;
        self
    }
}

/// How an action will be carried out, decided against the pre-round state
#[derive(Debug, Clone)]
enum Placement {
    Build(Payment),
    Wonder(Payment),
    Sell,
}

impl Placement {
    fn kind(&self) -> ActionKind {
        match self {
            Placement::Build(_) => ActionKind::Build,
            Placement::Wonder(_) => ActionKind::Wonder,
            Placement::Sell => ActionKind::Sell,
        }
    }
}

#[derive(Debug, Clone)]
struct PlannedAction {
    seat: usize,
    card: CardInstance,
    placement: Placement,
}

/// The rule engine for one match
pub struct GameEngine {
    config: EngineConfig,
    repo: Arc<dyn RuleRepository>,
    rng: SeededRandom,
    hooks: Vec<Box<dyn RuleSetHook>>,
    players: Vec<PlayerState>,
    discard: Vec<CardInstance>,
    /// Age of the last deal, 0 before the first
    age: u8,
    /// Rounds resolved in the current age
    round: u32,
}

impl GameEngine {
    /// Create an engine for `config.player_count` seats
    pub fn new(
        mut config: EngineConfig,
        repo: Arc<dyn RuleRepository>,
    ) -> Result<Self, EngineError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&config.player_count) {
            return Err(EngineError::PlayerCount(config.player_count));
        }
        if !config.rule_sets.contains(&RuleSet::Base) {
            config.rule_sets.insert(0, RuleSet::Base);
        }

        Ok(Self {
            rng: SeededRandom::new(&config.seed),
            hooks: hooks_for(&config.rule_sets),
            config,
            repo,
            players: Vec::new(),
            discard: Vec::new(),
            age: 0,
            round: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    pub fn player(&self, id: &str) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Current hand of a player, empty when unknown
    pub fn hand(&self, id: &str) -> &[CardInstance] {
        self.player(id).map(|p| p.hand.as_slice()).unwrap_or(&[])
    }

    /// Sold cards and the leftovers of finished ages
    pub fn discard_pile(&self) -> &[CardInstance] {
        &self.discard
    }

    pub fn current_age(&self) -> u8 {
        self.age
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Whether every hand of the current age has been played out
    pub fn age_complete(&self) -> bool {
        self.age > 0 && self.players.iter().all(|p| p.hand.is_empty())
    }

    // ==================== Setup ====================

    /// Seat the players in order with their starting state
    pub fn initialize<S: AsRef<str>>(&mut self, player_ids: &[S]) {
        if player_ids.len() != usize::from(self.config.player_count) {
            warn!(
                expected = self.config.player_count,
                got = player_ids.len(),
                "player list does not match configured player count"
            );
        }
        self.players = player_ids
            .iter()
            .map(|id| PlayerState::new(id.as_ref()))
            .collect();
        self.discard.clear();
        self.age = 0;
        self.round = 0;
        debug!(players = self.players.len(), seed = %self.config.seed, "match initialized");
    }

    /// Give every player a wonder board and a side, in player order
    pub fn assign_wonders(&mut self) -> Vec<WonderAssignment> {
        let ids = self.repo.wonder_ids();
        if ids.is_empty() || self.players.is_empty() {
            warn!("cannot assign wonders before players are seated");
            return Vec::new();
        }

        let shuffled = self.rng.shuffle(&ids);
        let mut assignments = Vec::with_capacity(self.players.len());
        for (i, player) in self.players.iter_mut().enumerate() {
            let id = shuffled[i % shuffled.len()].clone();
            let side = if self.rng.next_bool() {
                WonderSide::Day
            } else {
                WonderSide::Night
            };
            player.wonder = Some(WonderProgress {
                id: id.clone(),
                side,
                stages_built: 0,
            });
            assignments.push(WonderAssignment { id, side });
        }
        assignments
    }

    /// Deal the hands of an age. Age 3 mixes `players + 2` random guilds
    /// into the pool.
    pub fn deal_cards(&mut self, age: u8) -> HashMap<PlayerId, Vec<CardInstance>> {
        if !(1..=AGE_COUNT).contains(&age) || self.players.is_empty() {
            warn!(age, "cannot deal outside ages 1-3 or before players are seated");
            return HashMap::new();
        }

        let rule_sets = &self.config.rule_sets;
        let mut pool = self
            .repo
            .cards_for_age(age, self.config.player_count, rule_sets);
        if age == AGE_COUNT {
            let guilds = self.rng.shuffle(&self.repo.guilds(rule_sets));
            pool.extend(
                guilds
                    .into_iter()
                    .take(usize::from(self.config.player_count) + 2),
            );
        }

        let shuffled = self.rng.shuffle(&pool);
        let mut hands = HashMap::with_capacity(self.players.len());
        for (i, player) in self.players.iter_mut().enumerate() {
            player.hand = shuffled
                .iter()
                .skip(i * HAND_SIZE)
                .take(HAND_SIZE)
                .cloned()
                .collect();
            hands.insert(player.id.clone(), player.hand.clone());
        }

        self.age = age;
        self.round = 0;
        debug!(age, pool = pool.len(), "cards dealt");
        hands
    }

    // ==================== Validation ====================

    /// Check an action against the engine's view of the acting player.
    /// Every violated rule is reported.
    pub fn validate_action(&self, player_id: &str, action: &Action) -> ValidationResult {
        let mut violations = Vec::new();

        let player = self.player(player_id);
        if player.is_none() {
            violations.push(ActionViolation::PlayerNotFound);
        }
        if self.repo.card(&action.card.card).is_none() {
            violations.push(ActionViolation::UnknownCard(action.card.card.clone()));
        }

        if let Some(player) = player {
            if action.kind == ActionKind::Wonder {
                match &player.wonder {
                    None => violations.push(ActionViolation::NoWonderAssigned),
                    Some(progress) => {
                        let total = self.repo.wonder_stages(&progress.id, progress.side).len();
                        let next = progress.stages_built;
                        if let Some(requested) = action.wonder_stage {
                            if requested != next || usize::from(next) >= total {
                                violations
                                    .push(ActionViolation::WonderStageUnavailable { requested });
                            }
                        }
                    }
                }
            }

            for violation in
                ActionValidator::violations(action, &player.hand, player.coins, &player.built)
            {
                if !violations.contains(&violation) {
                    violations.push(violation);
                }
            }
        }

        ValidationResult::from_violations(&violations)
    }

    // ==================== Turn Resolution ====================

    /// Resolve one round. All actions are decided against the state before
    /// the round, so submission order carries no priority.
    pub fn resolve_turn(&mut self, actions: Vec<Action>) -> TurnResult {
        let actions = self
            .hooks
            .iter()
            .fold(actions, |batch, hook| hook.pre_turn(batch));

        let before = self.players.clone();
        let productions: Vec<Production> = before
            .iter()
            .map(|p| p.production(self.repo.as_ref()))
            .collect();

        let mut seen = HashSet::new();
        let mut plans = Vec::new();
        for action in &actions {
            let Some(seat) = self.seat_of(&action.player_id) else {
                warn!(player = %action.player_id, "ignoring action from unknown player");
                continue;
            };
            if !seen.insert(seat) {
                warn!(player = %action.player_id, "ignoring second action in the same round");
                continue;
            }
            if !before[seat].has_in_hand(&action.card) {
                warn!(player = %action.player_id, card = %action.card, "ignoring card not in hand");
                continue;
            }
            let placement = self.plan(seat, action, &before, &productions);
            plans.push(PlannedAction {
                seat,
                card: action.card.clone(),
                placement,
            });
        }

        let count = self.players.len();
        let mut income = vec![0u32; count];
        let mut deferred: Vec<(usize, Formula)> = Vec::new();

        for plan in &plans {
            let repo = self.repo.as_ref();
            let player = &mut self.players[plan.seat];
            if let Some(position) = player.hand.iter().position(|c| *c == plan.card) {
                player.hand.remove(position);
            }

            match &plan.placement {
                Placement::Sell => {
                    player.coins += SELL_CARD_COINS;
                    self.discard.push(plan.card.clone());
                }
                Placement::Build(payment) => {
                    pay(player, payment);
                    income[left_of(plan.seat, count)] += payment.left_total();
                    income[right_of(plan.seat, count)] += payment.right_total();
                    player.built.push(plan.card.clone());
                    if let Some(card) = repo.card(&plan.card.card) {
                        place_effects(player, plan.seat, &card.effects, &mut deferred);
                    }
                }
                Placement::Wonder(payment) => {
                    pay(player, payment);
                    income[left_of(plan.seat, count)] += payment.left_total();
                    income[right_of(plan.seat, count)] += payment.right_total();
                    let stage = player.wonder.as_mut().and_then(|progress| {
                        let index = usize::from(progress.stages_built);
                        progress.stages_built += 1;
                        repo.wonder_stages(&progress.id, progress.side).get(index)
                    });
                    if let Some(stage) = stage {
                        place_effects(player, plan.seat, &stage.effects, &mut deferred);
                    }
                }
            }
        }

        if !deferred.is_empty() {
            let tableaux = self.tableaux();
            for (seat, formula) in deferred {
                let ctx = scoring_context(&tableaux, seat);
                self.players[seat].coins += EffectResolver::evaluate(&formula, &ctx);
            }
        }

        for (seat, coins) in income.into_iter().enumerate() {
            self.players[seat].coins += coins;
        }

        let player_updates = self.collect_updates(&before, &plans);
        self.round += 1;
        self.pass_hands();

        let mut result = TurnResult {
            actions,
            player_updates,
        };
        for hook in &self.hooks {
            hook.post_turn(&mut result);
        }

        debug!(
            age = self.age,
            round = self.round,
            resolved = plans.len(),
            "round resolved"
        );
        result
    }

    /// Decide how an action is carried out. Anything that cannot be honored
    /// becomes a sale.
    fn plan(
        &self,
        seat: usize,
        action: &Action,
        before: &[PlayerState],
        productions: &[Production],
    ) -> Placement {
        let player = &before[seat];
        let count = before.len();
        let market = Market {
            coins: player.coins,
            own: &productions[seat],
            left: &productions[left_of(seat, count)],
            right: &productions[right_of(seat, count)],
            discounts: player.trade_discounts(self.repo.as_ref()),
        };

        let placement = match action.kind {
            ActionKind::Sell => Some(Placement::Sell),
            ActionKind::Build => self.repo.card(&action.card.card).and_then(|card| {
                if player.has_built_type(&card.id) {
                    None
                } else if card.chained_from(player.built.iter()) {
                    Some(Placement::Build(Payment::free()))
                } else {
                    settle(&card.cost, action.payment.as_ref(), &market).map(Placement::Build)
                }
            }),
            ActionKind::Wonder => player.wonder.as_ref().and_then(|progress| {
                let stages = self.repo.wonder_stages(&progress.id, progress.side);
                let next = progress.stages_built;
                if action.wonder_stage.is_some_and(|s| s != next) {
                    return None;
                }
                let stage = stages.get(usize::from(next))?;
                settle(&stage.cost, action.payment.as_ref(), &market).map(Placement::Wonder)
            }),
        };

        placement.unwrap_or_else(|| {
            debug!(
                player = %action.player_id,
                kind = %action.kind,
                card = %action.card,
                "action resolved as sale"
            );
            Placement::Sell
        })
    }

    fn collect_updates(
        &self,
        before: &[PlayerState],
        plans: &[PlannedAction],
    ) -> Vec<PlayerUpdate> {
        let mut updates = Vec::new();
        for (seat, (old, new)) in before.iter().zip(&self.players).enumerate() {
            let plan = plans.iter().find(|p| p.seat == seat);
            if plan.is_none() && old.coins == new.coins {
                continue;
            }

            let mut update = PlayerUpdate::new(new.id.clone());
            update.resolved_as = plan.map(|p| p.placement.kind());
            if old.coins != new.coins {
                update.coins = Some(new.coins);
            }
            if old.military != new.military {
                update.military_power = Some(new.military);
            }
            if old.science != new.science {
                update.science = Some(new.science);
            }
            if let Some(plan) = plan {
                match plan.placement {
                    Placement::Build(_) => update.built_card = Some(plan.card.clone()),
                    Placement::Wonder(_) => {
                        update.wonder_stages_built = Some(new.wonder_stages_built())
                    }
                    Placement::Sell => {}
                }
            }
            updates.push(update);
        }
        updates
    }

    /// Rotate hands for the age's direction, or discard the last cards
    fn pass_hands(&mut self) {
        if self.players.iter().all(|p| p.hand.len() <= 1) {
            for player in &mut self.players {
                self.discard.append(&mut player.hand);
            }
            return;
        }

        let count = self.players.len();
        let mut hands: Vec<Vec<CardInstance>> = self
            .players
            .iter_mut()
            .map(|p| std::mem::take(&mut p.hand))
            .collect();
        for seat in 0..count {
            let from = match PassDirection::for_age(self.age) {
                PassDirection::Left => right_of(seat, count),
                PassDirection::Right => left_of(seat, count),
            };
            self.players[seat].hand = std::mem::take(&mut hands[from]);
        }
    }

    // ==================== Military ====================

    /// Compare every player with both neighbors and bank the tokens
    pub fn resolve_military_conflicts(&mut self, age: u8) -> Vec<MilitaryResult> {
        let Some(victory) = military_victory_token(age) else {
            warn!(age, "no military conflicts outside ages 1-3");
            return Vec::new();
        };

        let count = self.players.len();
        let powers: Vec<u32> = self.players.iter().map(|p| p.military).collect();
        let mut results = Vec::with_capacity(count);

        for seat in 0..count {
            let own = powers[seat];
            let mut tokens = Vec::new();
            for neighbor in [left_of(seat, count), right_of(seat, count)] {
                let other = powers[neighbor];
                if own > other {
                    tokens.push(victory);
                } else if own < other {
                    tokens.push(MILITARY_DEFEAT_TOKEN);
                }
            }

            let player = &mut self.players[seat];
            player.military_tokens.extend_from_slice(&tokens);
            results.push(MilitaryResult {
                player_id: player.id.clone(),
                tokens,
            });
        }

        for hook in &self.hooks {
            hook.on_age_end(age);
        }
        debug!(age, "military conflicts resolved");
        results
    }

    // ==================== Scoring ====================

    /// Score breakdown for every player, highest total first. Ties keep
    /// seat order.
    pub fn calculate_final_scores(&self) -> Vec<FinalScore> {
        let repo = self.repo.as_ref();
        let tableaux = self.tableaux();

        let mut scores: Vec<FinalScore> = self
            .players
            .iter()
            .enumerate()
            .map(|(seat, player)| {
                let ctx = scoring_context(&tableaux, seat);

                let mut civilian = 0;
                let mut commerce = 0;
                let mut guild = 0;
                for card in player.built.iter().filter_map(|b| repo.card(&b.card)) {
                    let vp = effect_vp(&card.effects, &ctx);
                    match card.color {
                        Color::Blue | Color::Black => civilian += vp,
                        Color::Yellow => commerce += vp,
                        Color::Purple => guild += vp,
                        _ => {}
                    }
                }

                let wonder = player
                    .wonder
                    .as_ref()
                    .map(|progress| {
                        repo.wonder_stages(&progress.id, progress.side)
                            .iter()
                            .take(usize::from(progress.stages_built))
                            .map(|stage| effect_vp(&stage.effects, &ctx))
                            .sum()
                    })
                    .unwrap_or(0);

                let military = player.military_score();
                let treasury = player.treasury_score();
                let science = player.science.best_score_with_wild(player.science_wild);
                let points = treasury + wonder + civilian + science + commerce + guild;

                FinalScore {
                    player_id: player.id.clone(),
                    military,
                    treasury,
                    wonder,
                    civilian,
                    science,
                    commerce,
                    guild,
                    total: military + points as i32,
                }
            })
            .collect();

        scores.sort_by(|a, b| b.total.cmp(&a.total));
        debug!(players = scores.len(), "final scores calculated");
        scores
    }

    // ==================== AI ====================

    /// What a player knows when choosing an action
    pub fn decision_context(&self, player_id: &str) -> Option<DecisionContext> {
        let seat = self.seat_of(player_id)?;
        let repo = self.repo.as_ref();
        let count = self.players.len();
        let player = &self.players[seat];
        let left = &self.players[left_of(seat, count)];
        let right = &self.players[right_of(seat, count)];

        let wonder_stages_total = player
            .wonder
            .as_ref()
            .map_or(0, |w| repo.wonder_stages(&w.id, w.side).len() as u8);

        Some(DecisionContext {
            player_id: player.id.clone(),
            age: self.age,
            hand: player.hand.clone(),
            built: player.built.clone(),
            coins: player.coins,
            military: player.military,
            left_military: left.military,
            right_military: right.military,
            science: player.science,
            wonder_stages_built: player.wonder_stages_built(),
            wonder_stages_total,
            production: player.production(repo),
            left_production: left.production(repo),
            right_production: right.production(repo),
            discounts: player.trade_discounts(repo),
        })
    }

    /// The AI's choice for a player this round, seeded from the match seed,
    /// the player, the age and the round
    pub fn ai_action(&self, player_id: &str, strategy: AiStrategy) -> Option<Action> {
        let ctx = self.decision_context(player_id)?;
        let seed = AiPlayer::seed_for(&self.config.seed, player_id, self.age, self.round);
        AiPlayer::with_strategy(&seed, strategy).choose_action(self.repo.as_ref(), &ctx)
    }

    // ==================== Helper Methods ====================

    fn seat_of(&self, player_id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.id == player_id)
    }

    fn tableaux(&self) -> Vec<Tableau> {
        self.players
            .iter()
            .map(|p| p.tableau(self.repo.as_ref()))
            .collect()
    }
}

fn left_of(seat: usize, count: usize) -> usize {
    (seat + count - 1) % count
}

fn right_of(seat: usize, count: usize) -> usize {
    (seat + 1) % count
}

fn scoring_context(tableaux: &[Tableau], seat: usize) -> ScoringContext<'_> {
    let count = tableaux.len();
    ScoringContext {
        own: &tableaux[seat],
        left: &tableaux[left_of(seat, count)],
        right: &tableaux[right_of(seat, count)],
    }
}

/// A declared payment if it holds up, otherwise the solver's
fn settle(cost: &Cost, declared: Option<&Payment>, market: &Market<'_>) -> Option<Payment> {
    match declared {
        Some(payment) if ResourceSolver::accepts(cost, payment, market) => Some(payment.clone()),
        _ => ResourceSolver::find_payment(cost, market),
    }
}

fn pay(player: &mut PlayerState, payment: &Payment) {
    player.coins = player.coins.saturating_sub(payment.coins_spent);
}

/// Apply the effects of a placed card or stage in priority order. Coin
/// formulas wait until every placement of the round is done.
fn place_effects(
    player: &mut PlayerState,
    seat: usize,
    effects: &[Effect],
    deferred: &mut Vec<(usize, Formula)>,
) {
    for effect in EffectResolver::sort_by_priority(effects) {
        match &effect.kind {
            EffectKind::GainCoins { value } => player.coins += value,
            EffectKind::GainCoinsFormula { formula } => deferred.push((seat, formula.clone())),
            EffectKind::GainMilitary { value } => player.military += value,
            EffectKind::GainScience { symbol } => player.science.add(*symbol, 1),
            EffectKind::GainScienceWild => player.science_wild += 1,
            EffectKind::Special { ability } => player.abilities.push(*ability),
            EffectKind::ProduceResource { .. }
            | EffectKind::ProduceChoice { .. }
            | EffectKind::TradeDiscount { .. }
            | EffectKind::GainVp { .. }
            | EffectKind::GainVpFormula { .. } => {}
        }
    }
}

/// Victory points of a card's or stage's end-game effects
fn effect_vp(effects: &[Effect], ctx: &ScoringContext<'_>) -> u32 {
    EffectResolver::end_game_effects(effects)
        .into_iter()
        .map(|effect| match &effect.kind {
            EffectKind::GainVp { value } => *value,
            EffectKind::GainVpFormula { formula } => EffectResolver::evaluate(formula, ctx),
            _ => 0,
        })
        .sum()
}
