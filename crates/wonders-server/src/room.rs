//! Game room management.
//!
//! A room seats players in the lobby and, once started, owns one
//! `GameEngine`. Every round is a barrier: it resolves exactly once, when
//! each seat holds one action. AI seats answer as soon as the barrier is
//! checked, so only human seats can hold a round open.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;
use wonders_core::rules::{AGE_COUNT, MAX_PLAYERS, MIN_PLAYERS};
use wonders_core::{
    Action, ActionKind, AiStrategy, CardInstance, EngineConfig, EngineError, FinalScore,
    GameEngine, MilitaryResult, Payment, RuleRepository, TurnResult, WonderAssignment,
};

use crate::protocol::{PlayerInfo, RoomInfo, RoomStatus};

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Already in a room")]
    AlreadyInRoom,

    #[error("Room is full")]
    RoomFull,

    #[error("Player not in room")]
    PlayerNotInRoom,

    #[error("Not the host")]
    NotHost,

    #[error("Game already started")]
    GameAlreadyStarted,

    #[error("Not enough players")]
    NotEnoughPlayers,

    #[error("Game not started")]
    GameNotStarted,

    #[error("Game is over")]
    GameOver,

    #[error("Already submitted an action this round")]
    AlreadySubmitted,

    #[error("Seat is played by the AI")]
    SeatIsAi,

    #[error("Player is already connected")]
    AlreadyConnected,

    #[error("Invalid action: {}", .0.join("; "))]
    InvalidAction(Vec<String>),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Who decides for a seat.
#[derive(Debug, Clone, PartialEq)]
pub enum Seat {
    /// A connected (or recently dropped) person and their submission for
    /// the open round
    Human {
        pending: Option<Action>,
        connected: bool,
    },
    /// The engine's AI plays the seat
    Ai { strategy: AiStrategy },
}

impl Seat {
    pub fn human() -> Self {
        Seat::Human {
            pending: None,
            connected: true,
        }
    }

    pub fn ai() -> Self {
        Seat::Ai {
            strategy: AiStrategy::Heuristic,
        }
    }

    /// Whether the seat lets the round barrier close
    pub fn is_ready(&self) -> bool {
        match self {
            Seat::Human { pending, .. } => pending.is_some(),
            Seat::Ai { .. } => true,
        }
    }

    pub fn is_ai(&self) -> bool {
        matches!(self, Seat::Ai { .. })
    }

    pub fn is_connected(&self) -> bool {
        match self {
            Seat::Human { connected, .. } => *connected,
            Seat::Ai { .. } => true,
        }
    }
}

/// Something that happened while the room advanced the match.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    RoundResolved {
        age: u8,
        round: u32,
        result: TurnResult,
    },
    MilitaryResolved {
        age: u8,
        results: Vec<MilitaryResult>,
    },
    AgeStarted {
        age: u8,
    },
    Finished {
        scores: Vec<FinalScore>,
    },
}

/// A player in a game room.
#[derive(Debug, Clone)]
pub struct RoomPlayer {
    pub id: Uuid,
    pub name: String,
    pub seat: Seat,
}

impl RoomPlayer {
    pub fn new(id: Uuid, name: String) -> Self {
        Self {
            id,
            name,
            seat: Seat::human(),
        }
    }

    pub fn new_ai(id: Uuid, name: String) -> Self {
        Self {
            id,
            name,
            seat: Seat::ai(),
        }
    }

    pub fn to_info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id,
            name: self.name.clone(),
            is_ai: self.seat.is_ai(),
            connected: self.seat.is_connected(),
            submitted: matches!(
                self.seat,
                Seat::Human {
                    pending: Some(_),
                    ..
                }
            ),
        }
    }
}

/// A game room that can hold multiple players.
pub struct GameRoom {
    pub id: Uuid,
    pub name: String,
    pub max_players: u8,
    pub host_id: Uuid,
    pub fill_with_ai: bool,
    pub seed: String,
    pub status: RoomStatus,
    pub players: HashMap<Uuid, RoomPlayer>,
    /// Seat order, which is also the engine's player order
    pub player_order: Vec<Uuid>,
    /// The match (once started)
    pub game: Option<GameEngine>,
    /// Submissions made by players whose seat was taken over before the
    /// round closed
    carried: HashMap<Uuid, Action>,
}

impl GameRoom {
    pub fn new(
        id: Uuid,
        host_id: Uuid,
        host_name: String,
        max_players: u8,
        fill_with_ai: bool,
        seed: Option<String>,
    ) -> Self {
        let mut players = HashMap::new();
        players.insert(host_id, RoomPlayer::new(host_id, host_name.clone()));

        Self {
            id,
            name: format!("{}'s Game", host_name),
            max_players: max_players.clamp(MIN_PLAYERS, MAX_PLAYERS),
            host_id,
            fill_with_ai,
            seed: seed.unwrap_or_else(|| id.to_string()),
            status: RoomStatus::Waiting,
            players,
            player_order: vec![host_id],
            game: None,
            carried: HashMap::new(),
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players as usize
    }

    /// Seats still played by people, in seat order
    pub fn human_ids(&self) -> Vec<Uuid> {
        self.player_order
            .iter()
            .filter(|id| self.players.get(*id).is_some_and(|p| !p.seat.is_ai()))
            .copied()
            .collect()
    }

    pub fn add_player(&mut self, player_id: Uuid, name: String) -> Result<(), RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::GameAlreadyStarted);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }

        self.players.insert(player_id, RoomPlayer::new(player_id, name));
        self.player_order.push(player_id);
        Ok(())
    }

    /// Remove a player from the lobby or a finished room. Returns whether no
    /// human is left.
    pub fn remove_player(&mut self, player_id: Uuid) -> Result<bool, RoomError> {
        if self.status == RoomStatus::InGame {
            return Err(RoomError::GameAlreadyStarted);
        }
        if !self.players.contains_key(&player_id) {
            return Err(RoomError::PlayerNotInRoom);
        }

        self.players.remove(&player_id);
        self.player_order.retain(|&id| id != player_id);

        let humans = self.human_ids();
        if player_id == self.host_id {
            if let Some(&next) = humans.first() {
                self.host_id = next;
            }
        }

        Ok(humans.is_empty())
    }

    pub fn set_player_connected(&mut self, player_id: Uuid, connected: bool) {
        if let Some(RoomPlayer {
            seat: Seat::Human { connected: c, .. },
            ..
        }) = self.players.get_mut(&player_id)
        {
            *c = connected;
        }
    }

    pub fn is_disconnected(&self, player_id: Uuid) -> bool {
        self.players
            .get(&player_id)
            .is_some_and(|p| !p.seat.is_connected())
    }

    /// Give a dropped player their seat back
    pub fn reconnect(&mut self, player_id: Uuid) -> Result<(), RoomError> {
        let player = self
            .players
            .get_mut(&player_id)
            .ok_or(RoomError::PlayerNotInRoom)?;
        match &mut player.seat {
            Seat::Ai { .. } => Err(RoomError::SeatIsAi),
            Seat::Human { connected: true, .. } => Err(RoomError::AlreadyConnected),
            Seat::Human { connected, .. } => {
                *connected = true;
                Ok(())
            }
        }
    }

    /// Seat AI players if allowed, set up the match and deal age 1.
    pub fn start_game(
        &mut self,
        requester_id: Uuid,
        repo: Arc<dyn RuleRepository>,
    ) -> Result<Vec<WonderAssignment>, RoomError> {
        if requester_id != self.host_id {
            return Err(RoomError::NotHost);
        }
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::GameAlreadyStarted);
        }
        let seats = if self.fill_with_ai {
            usize::from(self.max_players)
        } else {
            self.players.len()
        };
        if seats < usize::from(MIN_PLAYERS) {
            return Err(RoomError::NotEnoughPlayers);
        }

        let mut engine = GameEngine::new(EngineConfig::new(self.seed.clone(), seats as u8), repo)?;

        let mut bots = 0;
        while self.players.len() < seats {
            bots += 1;
            let id = Uuid::new_v4();
            self.players
                .insert(id, RoomPlayer::new_ai(id, format!("AI {}", bots)));
            self.player_order.push(id);
        }

        let ids: Vec<String> = self.player_order.iter().map(Uuid::to_string).collect();
        engine.initialize(&ids);
        let wonders = engine.assign_wonders();
        engine.deal_cards(1);

        self.game = Some(engine);
        self.status = RoomStatus::InGame;
        info!(room = %self.id, seats, bots, "game started");

        Ok(wonders)
    }

    /// Lock in a human seat's card for the open round. Resolves the round
    /// (and any that follow without a human decision) when this was the
    /// last missing submission.
    pub fn submit(
        &mut self,
        player_id: Uuid,
        card: CardInstance,
        kind: ActionKind,
        wonder_stage: Option<u8>,
        payment: Option<Payment>,
    ) -> Result<Vec<RoomEvent>, RoomError> {
        let game = match self.status {
            RoomStatus::Waiting => return Err(RoomError::GameNotStarted),
            RoomStatus::Finished => return Err(RoomError::GameOver),
            RoomStatus::InGame => self.game.as_ref().ok_or(RoomError::GameNotStarted)?,
        };

        let player = self
            .players
            .get_mut(&player_id)
            .ok_or(RoomError::PlayerNotInRoom)?;
        let pending = match &mut player.seat {
            Seat::Ai { .. } => return Err(RoomError::SeatIsAi),
            Seat::Human {
                pending: Some(_), ..
            } => return Err(RoomError::AlreadySubmitted),
            Seat::Human { pending, .. } => pending,
        };

        let action = Action {
            player_id: player_id.to_string(),
            card,
            kind,
            payment,
            wonder_stage,
        };
        let check = game.validate_action(&action.player_id, &action);
        if !check.valid {
            return Err(RoomError::InvalidAction(check.errors));
        }
        *pending = Some(action);

        Ok(self.advance())
    }

    /// Hand a seat to the AI. A submission already made this round still
    /// counts.
    pub fn take_over(&mut self, player_id: Uuid) -> Result<Vec<RoomEvent>, RoomError> {
        if self.status != RoomStatus::InGame {
            return Err(RoomError::GameNotStarted);
        }
        let player = self
            .players
            .get_mut(&player_id)
            .ok_or(RoomError::PlayerNotInRoom)?;

        if let Seat::Human { pending, .. } = std::mem::replace(&mut player.seat, Seat::ai()) {
            if let Some(action) = pending {
                self.carried.insert(player_id, action);
            }
            info!(room = %self.id, player = %player_id, "seat taken over by AI");
        }
        if player_id == self.host_id {
            if let Some(&next) = self.human_ids().first() {
                self.host_id = next;
            }
        }

        Ok(self.advance())
    }

    /// Resolve rounds for as long as every seat is ready.
    fn advance(&mut self) -> Vec<RoomEvent> {
        let mut events = Vec::new();

        while self.status == RoomStatus::InGame && self.barrier_ready() {
            let Some(game) = self.game.as_mut() else {
                break;
            };

            let mut actions = Vec::with_capacity(self.player_order.len());
            for id in &self.player_order {
                let Some(player) = self.players.get_mut(id) else {
                    continue;
                };
                let action = match &mut player.seat {
                    Seat::Human { pending, .. } => pending.take(),
                    Seat::Ai { strategy } => self
                        .carried
                        .remove(id)
                        .or_else(|| game.ai_action(&id.to_string(), *strategy)),
                };
                actions.extend(action);
            }

            let result = game.resolve_turn(actions);
            let age = game.current_age();
            let round = game.round();
            info!(room = %self.id, age, round, "round resolved");
            events.push(RoomEvent::RoundResolved { age, round, result });

            if !game.age_complete() {
                continue;
            }

            let results = game.resolve_military_conflicts(age);
            events.push(RoomEvent::MilitaryResolved { age, results });

            if age >= AGE_COUNT {
                let scores = game.calculate_final_scores();
                self.status = RoomStatus::Finished;
                info!(room = %self.id, "game finished");
                events.push(RoomEvent::Finished { scores });
            } else {
                game.deal_cards(age + 1);
                events.push(RoomEvent::AgeStarted { age: age + 1 });
            }
        }

        events
    }

    /// Every seat holds exactly one action for the open round
    fn barrier_ready(&self) -> bool {
        self.game.is_some() && self.players.values().all(|p| p.seat.is_ready())
    }

    /// The age, round and hand a seat is currently choosing from
    pub fn hand_for(&self, player_id: Uuid) -> Option<(u8, u32, Vec<CardInstance>)> {
        let game = self.game.as_ref()?;
        let player = game.player(&player_id.to_string())?;
        Some((game.current_age(), game.round(), player.hand.clone()))
    }

    pub fn to_info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id,
            name: self.name.clone(),
            players: self
                .player_order
                .iter()
                .filter_map(|id| self.players.get(id).map(|p| p.to_info()))
                .collect(),
            max_players: self.max_players,
            host_id: self.host_id,
            fill_with_ai: self.fill_with_ai,
            status: self.status,
        }
    }
}
