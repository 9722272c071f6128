//! Wonders - a deterministic rule engine for a three-age card-drafting
//! civilization game
//!
//! This crate provides the core game logic, including:
//! - Seeded randomness so a match replays identically from its seed
//! - Static card and wonder data behind an injected repository
//! - Resource payment solving with neighbor trading
//! - Action validation, effect resolution and final scoring
//! - A heuristic AI that can stand in for any seat
//!
//! # Architecture
//!
//! The engine is synchronous, single-threaded and performs no I/O. A host
//! (see the `wonders-server` crate) owns transport, the round barrier and
//! seat substitution, and drives one [`GameEngine`] per match:
//!
//! `initialize -> assign_wonders -> { deal_cards -> 6 x resolve_turn ->
//! resolve_military_conflicts } x 3 -> calculate_final_scores`
//!
//! # Modules
//!
//! - [`random`]: Seed-derived random stream
//! - [`cards`]: Card types, card instances, effects and wonders
//! - [`repository`]: Read-only rule data
//! - [`player`]: Player state, production and trading prices
//! - [`solver`]: Payment solving
//! - [`validator`]: Structural action checks
//! - [`effects`]: Effect ordering and scoring formulas
//! - [`bot`]: AI players
//! - [`game`]: The match engine

pub mod actions;
pub mod bot;
pub mod cards;
pub mod effects;
pub mod expansion;
pub mod game;
pub mod player;
pub mod random;
pub mod repository;
pub mod rules;
pub mod solver;
pub mod validator;

// Re-export commonly used types
pub use actions::{
    Action, ActionKind, FinalScore, MilitaryResult, PlayerUpdate, TurnResult, WonderAssignment,
};
pub use bot::{AiPlayer, AiStrategy, DecisionContext};
pub use cards::{
    CardId, CardInstance, CardType, Color, Cost, Effect, EffectKind, Resource, Wonder, WonderSide,
};
pub use effects::{EffectResolver, Formula};
pub use expansion::{RuleSet, RuleSetHook};
pub use game::{EngineConfig, EngineError, GameEngine};
pub use player::{PlayerId, PlayerState, ScienceSymbols};
pub use random::SeededRandom;
pub use repository::{RepositoryError, RuleRepository, StaticRepository};
pub use solver::{Market, Payment, Purchase, ResourceSolver};
pub use validator::{ActionValidator, ActionViolation, ValidationResult};
