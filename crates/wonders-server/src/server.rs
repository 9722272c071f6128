//! WebSocket server and connection handling.

use crate::config::ServerConfig;
use crate::protocol::{ClientMessage, RoomInfo, RoomStatus, ServerMessage};
use crate::room::{GameRoom, RoomError, RoomEvent};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;
use wonders_core::RuleRepository;

/// Server state shared across all connections.
pub struct ServerState {
    /// All active rooms
    pub rooms: DashMap<Uuid, GameRoom>,
    /// Mapping from player ID to their room ID
    pub player_rooms: DashMap<Uuid, Uuid>,
    /// Mapping from player ID to their message sender
    pub player_senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
    /// Running reconnect timers; a timer only acts if its token is current
    pub grace_timers: DashMap<Uuid, Uuid>,
    /// Card and wonder data shared by every match
    pub repo: Arc<dyn RuleRepository>,
    pub config: ServerConfig,
}

impl ServerState {
    pub fn new(config: ServerConfig, repo: Arc<dyn RuleRepository>) -> Self {
        Self {
            rooms: DashMap::new(),
            player_rooms: DashMap::new(),
            player_senders: DashMap::new(),
            grace_timers: DashMap::new(),
            repo,
            config,
        }
    }

    /// Send a message to a specific player.
    pub fn send_to_player(&self, player_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.player_senders.get(&player_id) {
            let _ = sender.send(msg);
        }
    }

    pub fn send_error(&self, player_id: Uuid, message: impl ToString) {
        self.send_to_player(
            player_id,
            ServerMessage::Error {
                message: message.to_string(),
            },
        );
    }

    /// Broadcast a message to all human players in a room.
    pub fn broadcast_to_room(&self, room_id: Uuid, msg: ServerMessage) {
        let humans = match self.rooms.get(&room_id) {
            Some(room) => room.human_ids(),
            None => return,
        };
        for player_id in humans {
            self.send_to_player(player_id, msg.clone());
        }
    }

    /// Broadcast a message to all human players in a room except one.
    pub fn broadcast_to_room_except(&self, room_id: Uuid, except: Uuid, msg: ServerMessage) {
        let humans = match self.rooms.get(&room_id) {
            Some(room) => room.human_ids(),
            None => return,
        };
        for player_id in humans.into_iter().filter(|id| *id != except) {
            self.send_to_player(player_id, msg.clone());
        }
    }

    /// Broadcast the current room info.
    pub fn broadcast_room_info(&self, room_id: Uuid) {
        let info = match self.rooms.get(&room_id) {
            Some(room) => room.to_info(),
            None => return,
        };
        self.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: info });
    }

    /// Send every human seat the hand it is choosing from.
    pub fn send_hands(&self, room_id: Uuid) {
        let hands: Vec<_> = match self.rooms.get(&room_id) {
            Some(room) if room.status == RoomStatus::InGame => room
                .human_ids()
                .into_iter()
                .filter_map(|id| room.hand_for(id).map(|hand| (id, hand)))
                .collect(),
            _ => return,
        };
        for (player_id, (age, round, cards)) in hands {
            self.send_to_player(player_id, ServerMessage::Hand { age, round, cards });
        }
    }

    /// Broadcast what the room did and deal out the next hands.
    pub fn publish(&self, room_id: Uuid, events: Vec<RoomEvent>) {
        if events.is_empty() {
            return;
        }
        for event in events {
            let msg = match event {
                RoomEvent::RoundResolved { age, round, result } => {
                    ServerMessage::RoundResolved { age, round, result }
                }
                RoomEvent::MilitaryResolved { age, results } => {
                    ServerMessage::MilitaryResolved { age, results }
                }
                RoomEvent::AgeStarted { age } => ServerMessage::AgeStarted { age },
                RoomEvent::Finished { scores } => ServerMessage::GameOver { scores },
            };
            self.broadcast_to_room(room_id, msg);
        }
        self.send_hands(room_id);
    }

    pub fn room_of(&self, player_id: Uuid) -> Option<Uuid> {
        self.player_rooms.get(&player_id).map(|r| *r)
    }

    /// Get list of waiting rooms.
    pub fn get_waiting_rooms(&self) -> Vec<RoomInfo> {
        self.rooms
            .iter()
            .filter(|r| r.status == RoomStatus::Waiting)
            .map(|r| r.to_info())
            .collect()
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Wonders server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Assign a player ID; a reconnect swaps it for the old one
    let mut player_id = Uuid::new_v4();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.player_senders.insert(player_id, tx);

    let welcome = ServerMessage::Welcome { player_id };
    let msg_text = serde_json::to_string(&welcome)?;
    ws_sender.send(Message::Text(msg_text)).await?;

    // Forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Reconnect {
                    room_id,
                    player_id: previous,
                }) => match reconnect(player_id, previous, room_id, &state) {
                    Ok(()) => player_id = previous,
                    Err(e) => state.send_error(player_id, e),
                },
                Ok(client_msg) => handle_message(player_id, client_msg, &state),
                Err(e) => {
                    warn!("Invalid message from {}: {}", player_id, e);
                    state.send_error(player_id, format!("Invalid message: {}", e));
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", player_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.send_to_player(player_id, ServerMessage::Pong);
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", player_id, e);
                break;
            }
            _ => {}
        }
    }

    // Drop the sender first so a quick reconnect keeps its new one
    state.player_senders.remove(&player_id);
    handle_disconnect(player_id, &state);
    send_task.abort();

    info!("Connection closed for {}", player_id);
    Ok(())
}

/// Handle a client message.
fn handle_message(player_id: Uuid, msg: ClientMessage, state: &Arc<ServerState>) {
    match msg {
        ClientMessage::CreateRoom {
            player_name,
            max_players,
            fill_with_ai,
            seed,
        } => {
            let room_id = Uuid::new_v4();
            let room = GameRoom::new(
                room_id,
                player_id,
                player_name,
                max_players,
                fill_with_ai,
                seed,
            );
            let room_info = room.to_info();

            state.rooms.insert(room_id, room);
            state.player_rooms.insert(player_id, room_id);
            info!(room = %room_id, host = %player_id, "room created");

            state.send_to_player(player_id, ServerMessage::RoomCreated { room_id });
            state.send_to_player(player_id, ServerMessage::JoinedRoom { room: room_info });
        }

        ClientMessage::JoinRoom {
            room_id,
            player_name,
        } => {
            let joined = match state.rooms.get_mut(&room_id) {
                Some(mut room) => room
                    .add_player(player_id, player_name)
                    .map(|()| room.to_info()),
                None => Err(RoomError::RoomNotFound),
            };
            match joined {
                Ok(room_info) => {
                    state.player_rooms.insert(player_id, room_id);
                    state.send_to_player(
                        player_id,
                        ServerMessage::JoinedRoom {
                            room: room_info.clone(),
                        },
                    );
                    state.broadcast_to_room_except(
                        room_id,
                        player_id,
                        ServerMessage::RoomUpdated { room: room_info },
                    );
                }
                Err(e) => state.send_error(player_id, e),
            }
        }

        ClientMessage::LeaveRoom => {
            if let Some((_, room_id)) = state.player_rooms.remove(&player_id) {
                leave_room(player_id, room_id, state);
                state.send_to_player(player_id, ServerMessage::LeftRoom);
            }
        }

        ClientMessage::StartGame => {
            let Some(room_id) = state.room_of(player_id) else {
                state.send_error(player_id, RoomError::PlayerNotInRoom);
                return;
            };
            let started = match state.rooms.get_mut(&room_id) {
                Some(mut room) => room
                    .start_game(player_id, Arc::clone(&state.repo))
                    .map(|wonders| (wonders, room.to_info())),
                None => Err(RoomError::RoomNotFound),
            };
            match started {
                Ok((wonders, room_info)) => {
                    state.broadcast_to_room(
                        room_id,
                        ServerMessage::RoomUpdated { room: room_info },
                    );
                    state.broadcast_to_room(room_id, ServerMessage::GameStarted { wonders });
                    state.send_hands(room_id);
                }
                Err(e) => state.send_error(player_id, e),
            }
        }

        ClientMessage::SelectCard {
            card,
            kind,
            wonder_stage,
            payment,
        } => {
            let Some(room_id) = state.room_of(player_id) else {
                state.send_error(player_id, RoomError::PlayerNotInRoom);
                return;
            };
            let submitted = match state.rooms.get_mut(&room_id) {
                Some(mut room) => room.submit(player_id, card, kind, wonder_stage, payment),
                None => Err(RoomError::RoomNotFound),
            };
            match submitted {
                Ok(events) => {
                    state.send_to_player(
                        player_id,
                        ServerMessage::ActionResult {
                            success: true,
                            errors: Vec::new(),
                        },
                    );
                    state.broadcast_room_info(room_id);
                    state.publish(room_id, events);
                }
                Err(RoomError::InvalidAction(errors)) => {
                    state.send_to_player(
                        player_id,
                        ServerMessage::ActionResult {
                            success: false,
                            errors,
                        },
                    );
                }
                Err(e) => {
                    state.send_to_player(
                        player_id,
                        ServerMessage::ActionResult {
                            success: false,
                            errors: vec![e.to_string()],
                        },
                    );
                }
            }
        }

        // Rebinds the connection, so it is handled by the connection loop
        ClientMessage::Reconnect { .. } => {
            state.send_error(player_id, "Reconnect must be sent on a fresh connection");
        }

        ClientMessage::ListRooms => {
            let rooms = state.get_waiting_rooms();
            state.send_to_player(player_id, ServerMessage::RoomList { rooms });
        }

        ClientMessage::Ping => {
            state.send_to_player(player_id, ServerMessage::Pong);
        }
    }
}

/// Take a room seat out of a player's hands: removed in the lobby, given to
/// the AI mid-game.
fn leave_room(player_id: Uuid, room_id: Uuid, state: &Arc<ServerState>) {
    state.grace_timers.remove(&player_id);

    let in_game = match state.rooms.get(&room_id) {
        Some(room) => room.status == RoomStatus::InGame,
        None => return,
    };

    if in_game {
        take_over_seat(player_id, room_id, state);
        return;
    }

    let is_empty = match state.rooms.get_mut(&room_id) {
        Some(mut room) => room.remove_player(player_id).unwrap_or(false),
        None => return,
    };
    if is_empty {
        state.rooms.remove(&room_id);
        info!(room = %room_id, "room closed");
    } else {
        state.broadcast_room_info(room_id);
    }
}

/// Hand a seat to the AI and publish whatever rounds that unblocked.
fn take_over_seat(player_id: Uuid, room_id: Uuid, state: &Arc<ServerState>) {
    let taken = match state.rooms.get_mut(&room_id) {
        Some(mut room) => room.take_over(player_id),
        None => return,
    };
    match taken {
        Ok(events) => {
            state.broadcast_to_room(room_id, ServerMessage::SeatTakenOver { player_id });
            state.broadcast_room_info(room_id);
            state.publish(room_id, events);
        }
        Err(e) => warn!(room = %room_id, player = %player_id, "takeover failed: {}", e),
    }

    // Nobody left to watch a finished all-AI match
    state.rooms.remove_if(&room_id, |_, room| {
        room.status == RoomStatus::Finished && room.human_ids().is_empty()
    });
}

/// Rebind a fresh connection to a seat that dropped.
fn reconnect(
    current: Uuid,
    previous: Uuid,
    room_id: Uuid,
    state: &Arc<ServerState>,
) -> Result<(), RoomError> {
    if state.player_rooms.contains_key(&current) {
        return Err(RoomError::AlreadyInRoom);
    }
    let room_info = match state.rooms.get_mut(&room_id) {
        Some(mut room) => {
            room.reconnect(previous)?;
            room.to_info()
        }
        None => return Err(RoomError::RoomNotFound),
    };

    state.grace_timers.remove(&previous);
    if let Some((_, sender)) = state.player_senders.remove(&current) {
        state.player_senders.insert(previous, sender);
    }
    state.player_rooms.insert(previous, room_id);
    info!(room = %room_id, player = %previous, "player reconnected");

    state.send_to_player(previous, ServerMessage::Welcome { player_id: previous });
    state.send_to_player(previous, ServerMessage::JoinedRoom { room: room_info.clone() });
    state.broadcast_to_room_except(
        room_id,
        previous,
        ServerMessage::RoomUpdated { room: room_info },
    );
    if let Some((age, round, cards)) = state
        .rooms
        .get(&room_id)
        .and_then(|room| room.hand_for(previous))
    {
        state.send_to_player(previous, ServerMessage::Hand { age, round, cards });
    }
    Ok(())
}

/// Handle player disconnect.
fn handle_disconnect(player_id: Uuid, state: &Arc<ServerState>) {
    let Some((_, room_id)) = state.player_rooms.remove(&player_id) else {
        return;
    };

    let holds_seat = state.rooms.get(&room_id).is_some_and(|room| {
        room.status == RoomStatus::InGame && room.human_ids().contains(&player_id)
    });
    if !holds_seat {
        leave_room(player_id, room_id, state);
        return;
    }

    // Mark player as disconnected and keep the seat open for a while
    if let Some(mut room) = state.rooms.get_mut(&room_id) {
        room.set_player_connected(player_id, false);
    }
    state.broadcast_room_info(room_id);
    start_grace_timer(player_id, room_id, state);
}

/// Give the seat to the AI unless the player comes back in time.
fn start_grace_timer(player_id: Uuid, room_id: Uuid, state: &Arc<ServerState>) {
    let token = Uuid::new_v4();
    state.grace_timers.insert(player_id, token);

    let grace = state.config.reconnect_grace;
    let state = Arc::clone(state);
    info!(room = %room_id, player = %player_id, ?grace, "waiting for reconnect");

    tokio::spawn(async move {
        tokio::time::sleep(grace).await;

        if state
            .grace_timers
            .remove_if(&player_id, |_, current| *current == token)
            .is_none()
        {
            return;
        }
        let expired = state.rooms.get(&room_id).is_some_and(|room| {
            room.status == RoomStatus::InGame && room.is_disconnected(player_id)
        });
        if expired {
            info!(room = %room_id, player = %player_id, "reconnect window expired");
            take_over_seat(player_id, room_id, &state);
        }
    });
}
