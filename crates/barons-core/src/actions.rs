//! Moves that players can request.
//!
//! This module defines every move a player can make on their turn and the
//! events that result from moves and draft submissions.

use crate::cards::TrackId;
use crate::player::{FuturesPosition, PlayerId};
use crate::scoring::EndReason;
use serde::{Deserialize, Serialize};

/// All moves a player can make during normal play
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Move {
    /// Take the first facility with this name from the deck into your area
    BuildFacility(String),
    /// Take the first distribution route with this name
    BuildDistribution(String),
    /// Take the first upgrade with this name
    AcquireUpgrade(String),
    /// Run an owned facility: water goes to your supply, impact to storage
    ProduceWater(String),
    /// Sell water to a demand segment through one of your routes
    SellWater {
        segment: String,
        route: String,
        quantity: u32,
    },
    /// Bet on an impact track moving
    BuyFuturesToken {
        track: TrackId,
        position: FuturesPosition,
    },
    /// End your turn without doing anything else
    EndTurn,
}

/// Events that occur as a result of moves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    FacilityBuilt {
        player: PlayerId,
        name: String,
        cost_paid: u32,
    },

    RouteBuilt {
        player: PlayerId,
        name: String,
        cost_paid: u32,
    },

    UpgradeAcquired {
        player: PlayerId,
        name: String,
        cost_paid: u32,
    },

    FuturesTokenBought {
        player: PlayerId,
        track: TrackId,
        position: FuturesPosition,
    },

    WaterProduced {
        player: PlayerId,
        facility: String,
        quantity: u32,
    },

    WaterSold {
        player: PlayerId,
        segment: String,
        quantity: u32,
        revenue: u32,
    },

    /// A whim's pre-round effect or post-round fallout took hold
    WhimEffectResolved { whim: String, effect: String },

    /// Stored impact moved onto a global track at round end
    ImpactConsolidated {
        player: PlayerId,
        track: TrackId,
        amount: u32,
    },

    FuturesMatured {
        player: PlayerId,
        track: TrackId,
        position: FuturesPosition,
        payout: u32,
    },

    FuturesSpoiled {
        player: PlayerId,
        track: TrackId,
        position: FuturesPosition,
    },

    ThresholdActivated { track: TrackId, effect: String },

    ThresholdCleared { track: TrackId, effect: String },

    /// Unsold water was discarded at round end
    WaterEvaporated { player: PlayerId, quantity: u32 },

    /// The match is over; see `GameState::outcome` for the scores
    GameEnded { reason: EndReason, winner: PlayerId },

    /// Turn ended
    TurnEnded {
        player: PlayerId,
        next_player: PlayerId,
    },

    /// Turn order wrapped back to the first seat
    RoundStarted { round: u32 },

    /// Options were dealt for a pick of the whim draft
    DraftPickDealt {
        pick_number: u32,
        drafter_queue: Vec<PlayerId>,
    },

    /// A drafter locked in a choice (which one stays private until resolution)
    ChoiceSubmitted { player: PlayerId, pick_number: u32 },

    /// A drafter ran out of time and was given their first option
    PickAutoResolved { player: PlayerId },

    /// A drafted whim landed in a player's area
    WhimDrafted { player: PlayerId, name: String },

    /// The draft finished and normal play resumes
    DraftResolved { picks: u32 },

    /// A scheduled draft could not be dealt
    DraftSkipped { needed: usize, available: usize },
}
