//! WebSocket protocol messages for Wonders multiplayer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wonders_core::{
    ActionKind, CardInstance, FinalScore, MilitaryResult, Payment, TurnResult, WonderAssignment,
};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Create a new game room
    CreateRoom {
        player_name: String,
        max_players: u8,
        /// Fill empty seats with AI players when the game starts
        #[serde(default)]
        fill_with_ai: bool,
        /// Match seed; the room id is used when absent
        #[serde(default)]
        seed: Option<String>,
    },

    /// Join an existing room
    JoinRoom { room_id: Uuid, player_name: String },

    /// Leave current room
    LeaveRoom,

    /// Start the game (host only)
    StartGame,

    /// Pick a card from the hand for the current round
    SelectCard {
        card: CardInstance,
        kind: ActionKind,
        #[serde(default)]
        wonder_stage: Option<u8>,
        #[serde(default)]
        payment: Option<Payment>,
    },

    /// Take back a seat after a dropped connection
    Reconnect { room_id: Uuid, player_id: Uuid },

    /// Request room list
    ListRooms,

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with assigned player ID
    Welcome { player_id: Uuid },

    /// Room created successfully
    RoomCreated { room_id: Uuid },

    /// Joined room successfully
    JoinedRoom { room: RoomInfo },

    /// Left room successfully
    LeftRoom,

    /// Room state updated (player joined, left, dropped or replaced)
    RoomUpdated { room: RoomInfo },

    /// Game started, with every seat's wonder in seat order
    GameStarted { wonders: Vec<WonderAssignment> },

    /// The receiving player's current hand
    Hand {
        age: u8,
        round: u32,
        cards: Vec<CardInstance>,
    },

    /// Outcome of a card selection
    ActionResult { success: bool, errors: Vec<String> },

    /// A round was resolved for every seat at once
    RoundResolved {
        age: u8,
        round: u32,
        result: TurnResult,
    },

    /// Conflicts at the end of an age
    MilitaryResolved {
        age: u8,
        results: Vec<MilitaryResult>,
    },

    /// A new age has been dealt
    AgeStarted { age: u8 },

    /// A disconnected seat is now played by the AI
    SeatTakenOver { player_id: Uuid },

    /// List of available rooms
    RoomList { rooms: Vec<RoomInfo> },

    /// Error occurred
    Error { message: String },

    /// Pong response
    Pong,

    /// Game finished, scores ranked best first
    GameOver { scores: Vec<FinalScore> },
}

/// Room information for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: Uuid,
    pub name: String,
    pub players: Vec<PlayerInfo>,
    pub max_players: u8,
    pub host_id: Uuid,
    pub fill_with_ai: bool,
    pub status: RoomStatus,
}

/// Player information in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: Uuid,
    pub name: String,
    pub is_ai: bool,
    pub connected: bool,
    /// Whether the seat has locked in a card this round
    pub submitted: bool,
}

/// Room status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Waiting,
    InGame,
    Finished,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_format() {
        let text = r#"{"type":"SelectCard","payload":{"card":"LUMBER_YARD#1","kind":"SELL"}}"#;
        let msg: ClientMessage = serde_json::from_str(text).unwrap();
        match msg {
            ClientMessage::SelectCard {
                card,
                kind,
                wonder_stage,
                payment,
            } => {
                assert_eq!(card.to_string(), "LUMBER_YARD#1");
                assert_eq!(kind, ActionKind::Sell);
                assert_eq!(wonder_stage, None);
                assert!(payment.is_none());
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_create_room_defaults() {
        let text = r#"{"type":"CreateRoom","payload":{"player_name":"Ada","max_players":4}}"#;
        let msg: ClientMessage = serde_json::from_str(text).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::CreateRoom {
                fill_with_ai: false,
                seed: None,
                ..
            }
        ));
    }

    #[test]
    fn test_unit_variants_are_tagged() {
        let text = serde_json::to_string(&ServerMessage::Pong).unwrap();
        assert_eq!(text, r#"{"type":"Pong"}"#);
    }
}
