//! Match room management.

use barons_core::{
    CardInstance, Catalog, ConfigError, DraftTicket, GameError, GameEvent, GameSnapshot, GameState,
    Move, PlayerId,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::protocol::{PlayerInfo, RoomInfo, RoomStatus};

const MAX_SEATS: u8 = 6;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,

    #[error("Player not in room")]
    PlayerNotInRoom,

    #[error("Not the host")]
    NotHost,

    #[error("Game already started")]
    GameAlreadyStarted,

    #[error("Game not started")]
    GameNotStarted,

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error(transparent)]
    Game(#[from] GameError),

    #[error("Setup failed: {0}")]
    Setup(#[from] ConfigError),
}

/// A connection seated in a room.
#[derive(Debug, Clone)]
pub struct RoomPlayer {
    pub id: Uuid,
    pub name: String,
    pub connected: bool,
    /// Seat in the match, assigned when it starts
    pub seat: Option<PlayerId>,
}

impl RoomPlayer {
    pub fn new(id: Uuid, name: String) -> Self {
        Self {
            id,
            name,
            connected: true,
            seat: None,
        }
    }

    pub fn to_info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id,
            name: self.name.clone(),
            seat: self.seat,
            connected: self.connected,
        }
    }
}

/// One match and the connections playing it.
pub struct MatchRoom {
    pub id: Uuid,
    pub name: String,
    pub max_players: u8,
    pub host_id: Uuid,
    pub status: RoomStatus,
    pub players: HashMap<Uuid, RoomPlayer>,
    /// Join order, which becomes seat order
    pub player_order: Vec<Uuid>,
    /// The match state (once started)
    pub game: Option<GameState>,
    catalog: Arc<Catalog>,
    shuffle: bool,
    /// Bumped whenever a pick timer is armed so older timers go stale
    timer_epoch: u64,
}

impl MatchRoom {
    pub fn new(
        id: Uuid,
        host_id: Uuid,
        host_name: String,
        max_players: u8,
        catalog: Arc<Catalog>,
        shuffle: bool,
    ) -> Self {
        let mut players = HashMap::new();
        players.insert(host_id, RoomPlayer::new(host_id, host_name.clone()));

        Self {
            id,
            name: format!("{}'s Match", host_name),
            max_players: max_players.clamp(1, MAX_SEATS),
            host_id,
            status: RoomStatus::Waiting,
            players,
            player_order: vec![host_id],
            game: None,
            catalog,
            shuffle,
            timer_epoch: 0,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players as usize
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

    /// Remove a player; returns true if the room is now empty
    pub fn remove_player(&mut self, player_id: Uuid) -> Result<bool, RoomError> {
        if self.players.remove(&player_id).is_none() {
            return Err(RoomError::PlayerNotInRoom);
        }
        self.player_order.retain(|&id| id != player_id);

        // If host left, assign new host
        if player_id == self.host_id {
            if let Some(&next) = self.player_order.first() {
                self.host_id = next;
            }
        }

        Ok(self.players.is_empty())
    }

    /// A connection leaves the room. Before the match starts its place is
    /// freed. Once it has started the seat stays in the match and is played
    /// by [`MatchRoom::skip_absent_seats`]. Returns true when nobody connected
    /// is left.
    pub fn leave(&mut self, player_id: Uuid) -> Result<bool, RoomError> {
        if self.status == RoomStatus::Waiting {
            return self.remove_player(player_id);
        }

        let player = self
            .players
            .get_mut(&player_id)
            .ok_or(RoomError::PlayerNotInRoom)?;
        player.connected = false;

        if player_id == self.host_id {
            let next = self
                .player_order
                .iter()
                .find(|id| self.players.get(*id).is_some_and(|p| p.connected));
            if let Some(&next) = next {
                self.host_id = next;
            }
        }

        Ok(!self.players.values().any(|p| p.connected))
    }

    /// Play out turns and draft picks that belong to seats with no connected
    /// player: an absent drafter gets the automatic pick and an absent
    /// current player ends their turn. Stops at the first connected seat.
    pub fn skip_absent_seats(&mut self) -> Vec<GameEvent> {
        let present: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.connected)
            .filter_map(|p| p.seat)
            .collect();
        let mut events = Vec::new();
        let Some(game) = self.game.as_mut() else {
            return events;
        };
        if present.is_empty() {
            return events;
        }

        while !game.is_over() {
            let step = match game.draft_state.as_ref().map(|d| d.current_drafter()) {
                Some(Some(seat)) if !present.contains(&seat) => {
                    debug!(room = %self.id, seat, "auto-picking for absent seat");
                    game.auto_pick()
                }
                Some(_) => break,
                None if !present.contains(&game.current_player) => {
                    let seat = game.current_player;
                    debug!(room = %self.id, seat, "skipping absent seat");
                    game.end_turn(seat)
                }
                None => break,
            };
            match step {
                Ok(e) => events.extend(e),
                Err(e) => {
                    warn!(room = %self.id, error = %e, "could not skip absent seat");
                    break;
                }
            }
        }

        events
    }

    pub fn start_game(&mut self, requester_id: Uuid) -> Result<(), RoomError> {
        if requester_id != self.host_id {
            return Err(RoomError::NotHost);
        }
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::GameAlreadyStarted);
        }

        let mut game = GameState::setup(self.player_order.len() as u8, &self.catalog)?;
        if self.shuffle {
            game.shuffle_decks(&mut rand::thread_rng());
        }

        for (seat, player_id) in self.player_order.iter().enumerate() {
            if let Some(player) = self.players.get_mut(player_id) {
                player.seat = Some(seat as PlayerId);
            }
        }

        debug!(room = %self.id, players = self.player_order.len(), "match started");
        self.game = Some(game);
        self.status = RoomStatus::InGame;
        Ok(())
    }

    pub fn apply_move(
        &mut self,
        player_id: Uuid,
        action: serde_json::Value,
    ) -> Result<Vec<GameEvent>, RoomError> {
        let seat = self.seat_of(player_id)?;
        let action: Move =
            serde_json::from_value(action).map_err(|e| RoomError::InvalidMove(e.to_string()))?;

        let game = self.game.as_mut().ok_or(RoomError::GameNotStarted)?;
        Ok(game.apply_move(seat, action)?)
    }

    /// Start a whim draft with the ruleset's option count. Any seated player
    /// may call it.
    pub fn start_whim_draft(&mut self, player_id: Uuid) -> Result<Vec<GameEvent>, RoomError> {
        self.seat_of(player_id)?;
        let game = self.game.as_mut().ok_or(RoomError::GameNotStarted)?;
        let options = game.rules.whim_options_per_player;
        Ok(game.start_draft(options)?)
    }

    pub fn submit_whim_choice(
        &mut self,
        player_id: Uuid,
        chosen_index: usize,
    ) -> Result<Vec<GameEvent>, RoomError> {
        let seat = self.seat_of(player_id)?;
        let game = self.game.as_mut().ok_or(RoomError::GameNotStarted)?;
        Ok(game.submit_choice(seat, chosen_index)?)
    }

    /// Arm a pick timer for the outstanding draft slot, if any
    pub fn arm_pick_timer(&mut self) -> Option<(u64, DraftTicket)> {
        let ticket = self.game.as_ref()?.draft_ticket()?;
        self.timer_epoch += 1;
        Some((self.timer_epoch, ticket))
    }

    /// Auto-pick for a timed-out drafter. Returns `None` when the timer is
    /// stale: a newer timer was armed or the slot was already filled.
    pub fn expire_pick(&mut self, epoch: u64, ticket: DraftTicket) -> Option<Vec<GameEvent>> {
        if epoch != self.timer_epoch {
            return None;
        }
        let game = self.game.as_mut()?;
        if game.draft_ticket() != Some(ticket) {
            return None;
        }
        game.auto_pick().ok()
    }

    pub fn seat_of(&self, player_id: Uuid) -> Result<PlayerId, RoomError> {
        self.players
            .get(&player_id)
            .ok_or(RoomError::PlayerNotInRoom)?
            .seat
            .ok_or(RoomError::GameNotStarted)
    }

    pub fn snapshot(&self) -> Option<GameSnapshot> {
        self.game.as_ref().map(GameState::snapshot)
    }

    pub fn current_player(&self) -> Option<PlayerId> {
        self.game.as_ref().map(|g| g.current_player)
    }

    /// Private option sets for the current pick, keyed by connection
    pub fn dealt_options(&self) -> Vec<(Uuid, u32, Vec<CardInstance>)> {
        let Some(draft) = self.game.as_ref().and_then(|g| g.draft_state.as_ref()) else {
            return Vec::new();
        };

        self.player_order
            .iter()
            .filter_map(|id| {
                let seat = self.players.get(id)?.seat?;
                let options = draft.options_for(seat)?;
                Some((*id, draft.pick_number, options.to_vec()))
            })
            .collect()
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
            status: self.status,
        }
    }
}
