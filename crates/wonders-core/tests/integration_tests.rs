//! Integration tests for the Wonders engine.
//!
//! These tests drive complete matches from seating through final scoring.

use pretty_assertions::assert_eq;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use wonders_core::rules::ROUNDS_PER_AGE;
use wonders_core::*;

const PLAYERS: [&str; 3] = ["alice", "bob", "carol"];

fn new_engine(seed: &str, players: &[&str]) -> GameEngine {
    let repo: Arc<dyn RuleRepository> = Arc::new(StaticRepository::base().unwrap());
    let config = EngineConfig::new(seed, players.len() as u8);
    let mut engine = GameEngine::new(config, repo).unwrap();
    engine.initialize(players);
    engine
}

/// Every player sells the first card of their hand
fn all_sell(engine: &GameEngine) -> Vec<Action> {
    engine
        .players()
        .iter()
        .map(|p| Action::sell(p.id.clone(), p.hand[0].clone()))
        .collect()
}

/// Every player plays what the heuristic AI picks
fn all_ai(engine: &GameEngine) -> Vec<Action> {
    engine
        .players()
        .iter()
        .filter_map(|p| engine.ai_action(&p.id, AiStrategy::Heuristic))
        .collect()
}

/// Play a whole match, choosing actions with `choose`
fn play_match<F>(engine: &mut GameEngine, choose: F) -> Vec<FinalScore>
where
    F: Fn(&GameEngine) -> Vec<Action>,
{
    engine.assign_wonders();
    for age in 1..=3 {
        engine.deal_cards(age);
        for _ in 0..ROUNDS_PER_AGE {
            let actions = choose(&*engine);
            engine.resolve_turn(actions);
        }
        assert!(engine.age_complete(), "age {} should be played out", age);
        engine.resolve_military_conflicts(age);
    }
    engine.calculate_final_scores()
}

#[test]
fn test_setup_is_deterministic() {
    let mut first = new_engine("determinism", &PLAYERS);
    let mut second = new_engine("determinism", &PLAYERS);

    assert_eq!(first.assign_wonders(), second.assign_wonders());
    for age in 1..=3 {
        assert_eq!(first.deal_cards(age), second.deal_cards(age));
    }
}

#[test]
fn test_different_seeds_deal_differently() {
    let mut first = new_engine("seed-a", &PLAYERS);
    let mut second = new_engine("seed-b", &PLAYERS);
    assert_ne!(first.deal_cards(1), second.deal_cards(1));
}

#[test]
fn test_hand_integrity_every_seat_count() {
    let names = ["p1", "p2", "p3", "p4", "p5", "p6", "p7"];
    for count in 3..=7 {
        let mut engine = new_engine("integrity", &names[..count]);
        for age in 1..=3 {
            let hands = engine.deal_cards(age);
            let dealt: Vec<&CardInstance> = hands.values().flatten().collect();
            let unique: HashSet<&CardInstance> = dealt.iter().copied().collect();

            assert_eq!(dealt.len(), 7 * count, "age {} with {} players", age, count);
            assert_eq!(unique.len(), dealt.len());
        }
    }
}

#[test]
fn test_age_three_contains_guilds() {
    let mut engine = new_engine("guilds", &PLAYERS);
    let repo = StaticRepository::base().unwrap();
    let hands = engine.deal_cards(3);

    let guilds = hands
        .values()
        .flatten()
        .filter(|c| repo.card(&c.card).map(|t| t.color) == Some(Color::Purple))
        .count();
    assert_eq!(guilds, PLAYERS.len() + 2);
}

#[test]
fn test_sell_round_adds_bonus() {
    let mut engine = new_engine("sell", &PLAYERS);
    engine.assign_wonders();
    engine.deal_cards(1);

    let result = engine.resolve_turn(all_sell(&engine));
    let coins: HashMap<&str, Option<u32>> = result
        .player_updates
        .iter()
        .map(|u| (u.player_id.as_str(), u.coins))
        .collect();
    for id in PLAYERS {
        assert_eq!(coins[id], Some(6));
        assert_eq!(engine.player(id).unwrap().coins, 6);
    }
}

#[test]
fn test_all_sell_match() {
    let mut engine = new_engine("all-sell", &PLAYERS);
    let scores = play_match(&mut engine, all_sell);

    assert_eq!(scores.len(), 3);
    for score in &scores {
        // 3 + 18 rounds x 3 coins
        assert_eq!(score.treasury, 19);
        assert_eq!(score.civilian, 0);
        assert_eq!(score.science, 0);
        assert_eq!(score.wonder, 0);
        assert_eq!(score.commerce, 0);
        assert_eq!(score.guild, 0);
        assert_eq!(score.military, 0);
        assert!(score.total >= 0);
    }
    assert_eq!(engine.discard_pile().len(), 3 * 3 * 7);
}

#[test]
fn test_ai_match_is_legal_and_reproducible() {
    let mut first = new_engine("ai-match", &PLAYERS);
    let mut second = new_engine("ai-match", &PLAYERS);

    let mut checked = 0;
    first.assign_wonders();
    for age in 1..=3 {
        first.deal_cards(age);
        for _ in 0..ROUNDS_PER_AGE {
            let actions = all_ai(&first);
            assert_eq!(actions.len(), 3);
            for action in &actions {
                assert!(first.hand(&action.player_id).contains(&action.card));
                let check = first.validate_action(&action.player_id, action);
                assert!(check.valid, "{:?}: {:?}", action, check.errors);
                checked += 1;
            }
            first.resolve_turn(actions);
        }
        first.resolve_military_conflicts(age);
    }
    assert_eq!(checked, 54);

    let scores = first.calculate_final_scores();
    assert_eq!(scores, play_match(&mut second, all_ai));
    assert!(scores.windows(2).all(|w| w[0].total >= w[1].total));
}

#[test]
fn test_ai_builds_something() {
    let mut engine = new_engine("builder", &PLAYERS);
    play_match(&mut engine, all_ai);
    let built: usize = engine.players().iter().map(|p| p.built.len()).sum();
    assert!(built > 0);
}

#[test]
fn test_built_types_stay_unique() {
    let mut engine = new_engine("unique", &["a", "b", "c", "d", "e"]);
    play_match(&mut engine, all_ai);
    for player in engine.players() {
        let types: HashSet<&str> = player.built.iter().map(|c| c.card.as_str()).collect();
        assert_eq!(types.len(), player.built.len());
    }
}

#[test]
fn test_military_is_symmetric() {
    let mut engine = new_engine("war", &PLAYERS);
    play_match(&mut engine, all_ai);

    let players = engine.players();
    let victories: i32 = players
        .iter()
        .flat_map(|p| p.military_tokens.iter())
        .filter(|t| **t > 0)
        .count() as i32;
    let defeats: i32 = players.iter().map(|p| p.defeats() as i32).sum();
    assert_eq!(victories, defeats);
}

#[test]
fn test_validator_rules() {
    let mut engine = new_engine("rules", &PLAYERS);
    engine.assign_wonders();
    let hands = engine.deal_cards(1);

    for id in PLAYERS {
        for card in &hands[id] {
            let check = engine.validate_action(id, &Action::sell(id, card.clone()));
            assert!(check.valid);
        }
    }

    let hand = &hands["alice"];
    let built = vec![hand[0].clone()];
    let action = Action::build("alice", hand[0].clone());
    let check = ActionValidator::validate(&action, hand, 3, &built);
    assert!(!check.valid);
    assert!(check.errors[0].contains("already built"));
}

#[test]
fn test_rule_sets_do_not_change_base_game() {
    let repo: Arc<dyn RuleRepository> = Arc::new(StaticRepository::base().unwrap());
    let config = EngineConfig::new("expansions", 3).with_rule_set_ids(&["LEADERS", "CITIES"]);
    let mut with_hooks = GameEngine::new(config, repo).unwrap();
    with_hooks.initialize(&PLAYERS);
    let mut plain = new_engine("expansions", &PLAYERS);

    assert_eq!(play_match(&mut with_hooks, all_ai), play_match(&mut plain, all_ai));
}
