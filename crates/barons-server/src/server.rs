//! WebSocket server and connection handling.

use crate::protocol::{ClientMessage, RoomInfo, RoomStatus, ServerMessage};
use crate::room::{MatchRoom, RoomError};
use barons_core::{Catalog, DraftTicket, GameEvent, PlayerId};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Server state shared across all connections.
pub struct ServerState {
    /// All active rooms
    pub rooms: DashMap<Uuid, MatchRoom>,
    /// Mapping from player ID to their room ID
    pub player_rooms: DashMap<Uuid, Uuid>,
    /// Mapping from player ID to their message sender
    pub player_senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
    catalog: Arc<Catalog>,
    pick_timeout: Duration,
    shuffle: bool,
}

impl ServerState {
    pub fn new(catalog: Arc<Catalog>, pick_timeout: Duration, shuffle: bool) -> Self {
        Self {
            rooms: DashMap::new(),
            player_rooms: DashMap::new(),
            player_senders: DashMap::new(),
            catalog,
            pick_timeout,
            shuffle,
        }
    }

    /// Send a message to a specific player.
    pub fn send_to_player(&self, player_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.player_senders.get(&player_id) {
            let _ = sender.send(msg);
        }
    }

    /// Broadcast a message to all connected players in a room.
    pub fn broadcast_to_room(&self, room_id: Uuid, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(&room_id) {
            for player in room.players.values().filter(|p| p.connected) {
                self.send_to_player(player.id, msg.clone());
            }
        }
    }

    /// Broadcast a message to all connected players in a room except one.
    pub fn broadcast_to_room_except(&self, room_id: Uuid, except: Uuid, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(&room_id) {
            for player in room.players.values().filter(|p| p.connected) {
                if player.id != except {
                    self.send_to_player(player.id, msg.clone());
                }
            }
        }
    }

    /// Get list of waiting rooms.
    pub fn get_waiting_rooms(&self) -> Vec<RoomInfo> {
        self.rooms
            .iter()
            .filter(|r| r.status == RoomStatus::Waiting)
            .map(|r| r.to_info())
            .collect()
    }

    pub fn room_of(&self, player_id: Uuid) -> Option<Uuid> {
        self.player_rooms.get(&player_id).map(|r| *r)
    }

    pub fn apply_move(self: &Arc<Self>, player_id: Uuid, action: serde_json::Value) {
        self.run_transition(player_id, |room| room.apply_move(player_id, action));
    }

    pub fn start_whim_draft(self: &Arc<Self>, player_id: Uuid) {
        self.run_transition(player_id, |room| room.start_whim_draft(player_id));
    }

    pub fn submit_whim_choice(self: &Arc<Self>, player_id: Uuid, chosen_index: usize) {
        self.run_transition(player_id, |room| {
            room.submit_whim_choice(player_id, chosen_index)
        });
    }

    /// Run one engine transition for the player's room. Success is published
    /// to the room; a rejection goes to the requester only.
    fn run_transition<F>(self: &Arc<Self>, player_id: Uuid, transition: F)
    where
        F: FnOnce(&mut MatchRoom) -> Result<Vec<GameEvent>, RoomError>,
    {
        let Some(room_id) = self.room_of(player_id) else {
            self.send_to_player(
                player_id,
                ServerMessage::Error {
                    message: RoomError::PlayerNotInRoom.to_string(),
                },
            );
            return;
        };

        // Room lock is released at the end of this statement
        let result = match self.rooms.get_mut(&room_id) {
            Some(mut room) => transition(room.value_mut()),
            None => return,
        };

        match result {
            Ok(events) => {
                self.send_to_player(
                    player_id,
                    ServerMessage::MoveResult {
                        success: true,
                        events: events.clone(),
                        error: None,
                    },
                );
                self.publish(room_id, &events);
            }
            Err(e) => {
                debug!(%player_id, error = %e, "request rejected");
                self.send_to_player(
                    player_id,
                    ServerMessage::MoveResult {
                        success: false,
                        events: vec![],
                        error: Some(e.to_string()),
                    },
                );
            }
        }
    }

    /// Push the room's state after an accepted transition: snapshot and turn
    /// marker to everyone, freshly dealt options to their owners only, and a
    /// pick timer while a draft waits on someone. Turns and picks of seats
    /// nobody is connected to are played out first.
    fn publish(self: &Arc<Self>, room_id: Uuid, events: &[GameEvent]) {
        let (snapshot, current, dealt, timer) = {
            let Some(mut room) = self.rooms.get_mut(&room_id) else {
                return;
            };
            let skipped = room.skip_absent_seats();
            let dealt = if events
                .iter()
                .chain(&skipped)
                .any(|e| matches!(e, GameEvent::DraftPickDealt { .. }))
            {
                room.dealt_options()
            } else {
                Vec::new()
            };
            (room.snapshot(), room.current_player(), dealt, room.arm_pick_timer())
        };

        if let Some(snapshot) = snapshot {
            self.broadcast_to_room(room_id, ServerMessage::Snapshot { snapshot });
        }
        if let Some(player) = current {
            self.broadcast_to_room(room_id, ServerMessage::TurnChanged { player });
        }
        for (player_id, pick_number, options) in dealt {
            self.send_to_player(player_id, ServerMessage::DraftOptions { pick_number, options });
        }
        if let Some((epoch, ticket)) = timer {
            self.spawn_pick_timer(room_id, epoch, ticket);
        }
    }

    fn spawn_pick_timer(self: &Arc<Self>, room_id: Uuid, epoch: u64, ticket: DraftTicket) {
        let state = Arc::clone(self);
        let timeout = self.pick_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            let events = state
                .rooms
                .get_mut(&room_id)
                .and_then(|mut room| room.expire_pick(epoch, ticket));
            if let Some(events) = events {
                info!(room = %room_id, round = ticket.round, pick = ticket.pick_number, "draft pick timed out");
                state.publish(room_id, &events);
            }
        });
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Water Barons server listening on {}", addr);

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

    let player_id = Uuid::new_v4();

    // Outgoing messages go through a channel so any task can reach this socket
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.player_senders.insert(player_id, tx);

    let welcome = ServerMessage::Welcome { player_id };
    ws_sender
        .send(Message::Text(serde_json::to_string(&welcome)?))
        .await?;

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
                Ok(client_msg) => handle_message(player_id, client_msg, &state),
                Err(e) => {
                    warn!("Invalid message from {}: {}", player_id, e);
                    state.send_to_player(
                        player_id,
                        ServerMessage::Error {
                            message: format!("Invalid message: {}", e),
                        },
                    );
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

    handle_disconnect(player_id, &state);
    state.player_senders.remove(&player_id);
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
        } => {
            let room_id = Uuid::new_v4();
            let room = MatchRoom::new(
                room_id,
                player_id,
                player_name,
                max_players,
                Arc::clone(&state.catalog),
                state.shuffle,
            );
            let room_info = room.to_info();

            state.rooms.insert(room_id, room);
            state.player_rooms.insert(player_id, room_id);

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
                    .map(|()| room.to_info())
                    .map_err(|e| e.to_string()),
                None => Err("Room not found".to_string()),
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
                Err(message) => {
                    state.send_to_player(player_id, ServerMessage::Error { message });
                }
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
                return;
            };

            let started = match state.rooms.get_mut(&room_id) {
                Some(mut room) => room.start_game(player_id).map(|()| {
                    let seats: Vec<(Uuid, PlayerId)> = room
                        .players
                        .values()
                        .filter_map(|p| Some((p.id, p.seat?)))
                        .collect();
                    (room.snapshot(), seats, room.current_player(), room.to_info())
                }),
                None => return,
            };

            match started {
                Ok((snapshot, seats, current, room_info)) => {
                    info!(room = %room_id, players = seats.len(), "match started");
                    state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
                    if let Some(snapshot) = snapshot {
                        for (id, seat) in seats {
                            state.send_to_player(
                                id,
                                ServerMessage::GameStarted {
                                    snapshot: snapshot.clone(),
                                    seat,
                                },
                            );
                        }
                    }
                    if let Some(player) = current {
                        state.broadcast_to_room(room_id, ServerMessage::TurnChanged { player });
                    }
                }
                Err(e) => {
                    state.send_to_player(
                        player_id,
                        ServerMessage::Error {
                            message: e.to_string(),
                        },
                    );
                }
            }
        }

        ClientMessage::ApplyMove { action } => state.apply_move(player_id, action),

        ClientMessage::StartWhimDraft => state.start_whim_draft(player_id),

        ClientMessage::SubmitWhimChoice { chosen_index } => {
            state.submit_whim_choice(player_id, chosen_index)
        }

        ClientMessage::Chat { message } => {
            if let Some(room_id) = state.room_of(player_id) {
                let player_name = state
                    .rooms
                    .get(&room_id)
                    .and_then(|r| r.players.get(&player_id).map(|p| p.name.clone()))
                    .unwrap_or_else(|| "Unknown".to_string());

                state.broadcast_to_room(
                    room_id,
                    ServerMessage::ChatMessage {
                        player_name,
                        message,
                    },
                );
            }
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

/// Take a player out of a room, dropping the room once nobody connected is
/// left. Mid-match the seat stays and the rest of the room plays on.
fn leave_room(player_id: Uuid, room_id: Uuid, state: &Arc<ServerState>) {
    let outcome = match state.rooms.get_mut(&room_id) {
        Some(mut room) => match room.leave(player_id) {
            Ok(true) => None,
            Ok(false) => Some((room.to_info(), room.status == RoomStatus::InGame)),
            Err(_) => return,
        },
        None => return,
    };

    match outcome {
        Some((room_info, in_game)) => {
            state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
            if in_game {
                // The leaver may hold the turn or the current draft slot
                state.publish(room_id, &[]);
            }
        }
        None => {
            info!(room = %room_id, "last player left; closing room");
            state.rooms.remove(&room_id);
        }
    }
}

/// Handle player disconnect.
fn handle_disconnect(player_id: Uuid, state: &Arc<ServerState>) {
    if let Some((_, room_id)) = state.player_rooms.remove(&player_id) {
        leave_room(player_id, room_id, state);
    }
}
