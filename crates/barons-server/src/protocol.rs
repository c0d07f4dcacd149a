//! WebSocket protocol messages for Water Barons multiplayer.

use barons_core::{CardInstance, GameEvent, GameSnapshot, PlayerId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Create a new match room
    CreateRoom { player_name: String, max_players: u8 },

    /// Join an existing room
    JoinRoom { room_id: Uuid, player_name: String },

    /// Leave current room
    LeaveRoom,

    /// Start the match (host only)
    StartGame,

    /// Submit a move; the payload is a `Move` in JSON form
    ApplyMove { action: serde_json::Value },

    /// Start a whim draft outside the automatic schedule
    StartWhimDraft,

    /// Lock in a choice for the current draft pick
    SubmitWhimChoice { chosen_index: usize },

    /// Send chat message
    Chat { message: String },

    /// Request room list
    ListRooms,

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with assigned connection ID
    Welcome { player_id: Uuid },

    /// Room created successfully
    RoomCreated { room_id: Uuid },

    /// Joined room successfully
    JoinedRoom { room: RoomInfo },

    /// Left room successfully
    LeftRoom,

    /// Room state updated (player joined/left)
    RoomUpdated { room: RoomInfo },

    /// Match started; `seat` is the receiver's player index
    GameStarted { snapshot: GameSnapshot, seat: PlayerId },

    /// Public state after an accepted transition
    Snapshot { snapshot: GameSnapshot },

    /// Outcome of the receiver's own request
    MoveResult {
        success: bool,
        events: Vec<GameEvent>,
        error: Option<String>,
    },

    /// Current player changed
    TurnChanged { player: PlayerId },

    /// Private whim options dealt to the receiver
    DraftOptions { pick_number: u32, options: Vec<CardInstance> },

    /// Chat message received
    ChatMessage { player_name: String, message: String },

    /// List of available rooms
    RoomList { rooms: Vec<RoomInfo> },

    /// Error occurred
    Error { message: String },

    /// Pong response
    Pong,
}

/// Room information for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: Uuid,
    pub name: String,
    pub players: Vec<PlayerInfo>,
    pub max_players: u8,
    pub host_id: Uuid,
    pub status: RoomStatus,
}

/// Player information in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: Uuid,
    pub name: String,
    pub seat: Option<PlayerId>,
    pub connected: bool,
}

/// Room status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Waiting,
    InGame,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_envelope() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"SubmitWhimChoice","payload":{"chosen_index":2}}"#)
                .unwrap();
        assert!(matches!(msg, ClientMessage::SubmitWhimChoice { chosen_index: 2 }));

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"ApplyMove","payload":{"action":{"BuildFacility":"Glacial Tap"}}}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::ApplyMove { .. }));
    }

    #[test]
    fn test_server_message_envelope() {
        let json = serde_json::to_value(ServerMessage::TurnChanged { player: 1 }).unwrap();
        assert_eq!(json["type"], "TurnChanged");
        assert_eq!(json["payload"]["player"], 1);
    }
}
