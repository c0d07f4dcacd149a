//! Read-only view of a match for broadcasting.
//!
//! The snapshot carries everything viewers render (round, current player,
//! dashboards, tracks, log) and hides what they must not see: deck contents
//! and the private draft option sets.

use crate::game::GameState;
use crate::player::{PlayerId, PlayerState};
use crate::scoring::GameOutcome;
use crate::tracks::{DemandSegment, ImpactTrack};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckSizes {
    pub facilities: usize,
    pub distributions: usize,
    pub whims: usize,
    pub upgrades: usize,
}

/// Public part of a running whim draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftView {
    pub pick_number: u32,
    pub total_picks: u32,
    pub drafter_queue: Vec<PlayerId>,
    pub current_drafter: Option<PlayerId>,
    pub submitted: Vec<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub round: u32,
    pub current_player: PlayerId,
    pub players: Vec<PlayerState>,
    pub impact_tracks: Vec<ImpactTrack>,
    pub demand_segments: Vec<DemandSegment>,
    pub threshold_effect_descriptions: BTreeMap<String, String>,
    /// Threshold effect keys currently in force
    pub active_threshold_effects: BTreeSet<String>,
    pub log: Vec<String>,
    pub decks: DeckSizes,
    pub whim_discard: usize,
    pub draft: Option<DraftView>,
    /// Final standings once the match has ended
    pub outcome: Option<GameOutcome>,
}

impl GameState {
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            round: self.round,
            current_player: self.current_player,
            players: self.players.clone(),
            impact_tracks: self.impact_tracks.clone(),
            demand_segments: self.demand_segments.clone(),
            threshold_effect_descriptions: self.threshold_effect_descriptions.clone(),
            active_threshold_effects: self.active_threshold_effects.clone(),
            log: self.log.clone(),
            decks: DeckSizes {
                facilities: self.decks.facilities.len(),
                distributions: self.decks.distributions.len(),
                whims: self.decks.whims.len(),
                upgrades: self.decks.upgrades.len(),
            },
            whim_discard: self.whim_discard.len(),
            draft: self.draft_state.as_ref().map(|d| DraftView {
                pick_number: d.pick_number,
                total_picks: d.total_picks,
                drafter_queue: d.drafter_queue.clone(),
                current_drafter: d.current_drafter(),
                submitted: d.submitted(),
            }),
            outcome: self.outcome.clone(),
        }
    }
}
