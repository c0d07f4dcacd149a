//! Core game state and move engine.
//!
//! This module contains the `GameState` aggregate and the validated
//! transitions for normal play: building, producing and selling water, and
//! trading futures. Every move is validate-then-apply: all checks
//! run before the first mutation, so a rejected move leaves the state exactly
//! as it was and writes nothing to the log.

use crate::actions::{GameEvent, Move};
use crate::cards::{CardInstance, DeckKind, Decks, TrackId};
use crate::catalog::{Catalog, ConfigError, Rules};
use crate::draft::DraftState;
use crate::player::{FuturesPosition, FuturesToken, PlayerId, PlayerState};
use crate::round_end::{self, PendingFallout};
use crate::scoring::GameOutcome;
use crate::tracks::{DemandSegment, ImpactTrack};
use crate::turn;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

/// Reasons a move or draft submission is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Unknown player {0}")]
    UnknownPlayer(PlayerId),

    #[error("Not your turn")]
    NotYourTurn,

    #[error("No '{0}' card left in the deck")]
    CardNotFound(String),

    #[error("Cannot afford this: costs {cost}, you have {available}")]
    InsufficientFunds { cost: u32, available: u32 },

    #[error("Invalid choice {index}: {options} options were dealt")]
    InvalidChoice { index: usize, options: usize },

    #[error("Not enough whim cards: need {needed}, {available} left")]
    InsufficientCards { needed: usize, available: usize },

    #[error("A whim draft is in progress")]
    DraftInProgress,

    #[error("No whim draft is in progress")]
    NoDraftInProgress,

    #[error("Each drafter must be dealt at least one option")]
    InvalidDraftSize,

    #[error("Unknown impact track '{0}'")]
    UnknownTrack(TrackId),

    #[error("Already holding the maximum of {0} futures tokens")]
    FuturesLimitReached(usize),

    #[error("You do not own a facility named '{0}'")]
    FacilityNotOwned(String),

    #[error("You do not own a route named '{0}'")]
    RouteNotOwned(String),

    #[error("Unknown demand segment '{0}'")]
    UnknownSegment(String),

    #[error("Cannot sell {requested} water: {available} in supply")]
    NotEnoughWater { requested: u32, available: u32 },

    #[error("Segment wants {remaining} more water, not {requested}")]
    DemandExceeded { requested: u32, remaining: u32 },

    #[error("Sell at least one unit of water")]
    NothingToSell,

    #[error("The match is over")]
    GameOver,
}

/// The complete state of one match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Round number (starts at 1)
    pub round: u32,
    /// Seat whose turn it is
    pub current_player: PlayerId,
    pub players: Vec<PlayerState>,
    pub decks: Decks,
    /// Dealt whims that were not chosen. Never returned to the whim deck.
    pub whim_discard: Vec<CardInstance>,
    pub demand_segments: Vec<DemandSegment>,
    pub impact_tracks: Vec<ImpactTrack>,
    pub threshold_effect_descriptions: BTreeMap<String, String>,
    /// Shared, player-facing record of accepted transitions
    pub log: Vec<String>,
    /// Present only while a whim draft is running
    pub draft_state: Option<DraftState>,
    pub rules: Rules,
    /// Track levels when the current round began
    pub round_start_levels: BTreeMap<TrackId, u32>,
    /// Whims drafted this round, resolved at round end
    pub pending_fallout: Vec<PendingFallout>,
    /// Buyers per segment this round
    pub sales_this_round: BTreeMap<String, BTreeSet<PlayerId>>,
    pub active_threshold_effects: BTreeSet<String>,
    /// Set once the match has ended
    pub outcome: Option<GameOutcome>,
}

impl GameState {
    /// Set up a match with `num_players` seats and unshuffled decks
    pub fn setup(num_players: u8, catalog: &Catalog) -> Result<Self, ConfigError> {
        if num_players < 1 {
            return Err(ConfigError::NoPlayers);
        }

        let rules = catalog.rules.clone();
        let players = (0..num_players)
            .map(|id| PlayerState::new(id, rules.starting_cred_coin))
            .collect();

        let metadata = &catalog.metadata;

        let mut state = Self {
            round: 1,
            current_player: 0,
            players,
            decks: Decks {
                facilities: catalog.facility_deck(),
                distributions: catalog.distribution_deck(),
                whims: catalog.whim_deck(),
                upgrades: catalog.upgrade_deck(),
            },
            whim_discard: Vec::new(),
            demand_segments: metadata
                .demand_segments
                .iter()
                .map(DemandSegment::from_def)
                .collect(),
            impact_tracks: metadata
                .impact_tracks
                .iter()
                .map(ImpactTrack::from_def)
                .collect(),
            threshold_effect_descriptions: metadata.threshold_effect_descriptions.clone(),
            log: Vec::new(),
            draft_state: None,
            rules,
            round_start_levels: BTreeMap::new(),
            pending_fallout: Vec::new(),
            sales_this_round: BTreeMap::new(),
            active_threshold_effects: BTreeSet::new(),
            outcome: None,
        };
        state.round_start_levels = round_end::track_levels(&state);
        Ok(state)
    }

    /// Shuffle every deck. A separate step so setup stays deterministic.
    pub fn shuffle_decks<R: Rng>(&mut self, rng: &mut R) {
        self.decks.shuffle_all(rng);
    }

    /// Get the number of players
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Get a player by ID
    pub fn get_player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.get(id as usize)
    }

    fn get_player_mut(&mut self, id: PlayerId) -> Result<&mut PlayerState, GameError> {
        self.players
            .get_mut(id as usize)
            .ok_or(GameError::UnknownPlayer(id))
    }

    pub fn is_drafting(&self) -> bool {
        self.draft_state.is_some()
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// Apply a move for `player`, then let the turn controller decide whether
    /// the turn is over.
    pub fn apply_move(&mut self, player: PlayerId, action: Move) -> Result<Vec<GameEvent>, GameError> {
        let mut events = match action {
            Move::EndTurn => return self.end_turn(player),
            Move::BuildFacility(name) => self.build_facility(player, &name)?,
            Move::BuildDistribution(name) => self.build_distribution(player, &name)?,
            Move::AcquireUpgrade(name) => self.acquire_upgrade(player, &name)?,
            Move::ProduceWater(facility) => self.produce_water(player, &facility)?,
            Move::SellWater {
                segment,
                route,
                quantity,
            } => self.sell_water(player, &segment, &route, quantity)?,
            Move::BuyFuturesToken { track, position } => {
                self.buy_futures_token(player, &track, position)?
            }
        };

        if turn::end_turn_if(self) {
            events.extend(turn::advance_turn(self));
        }

        Ok(events)
    }

    /// Draw the first facility named `name` into the player's area
    pub fn build_facility(&mut self, player: PlayerId, name: &str) -> Result<Vec<GameEvent>, GameError> {
        let cost_paid = self.take_from_deck(player, DeckKind::Facilities, name)?;
        self.log.push(format!("{} built {}", player, name));

        Ok(vec![GameEvent::FacilityBuilt {
            player,
            name: name.to_string(),
            cost_paid,
        }])
    }

    /// Draw the first distribution route named `name` into the player's area
    pub fn build_distribution(
        &mut self,
        player: PlayerId,
        name: &str,
    ) -> Result<Vec<GameEvent>, GameError> {
        let cost_paid = self.take_from_deck(player, DeckKind::Distributions, name)?;
        self.log.push(format!("{} built route {}", player, name));

        Ok(vec![GameEvent::RouteBuilt {
            player,
            name: name.to_string(),
            cost_paid,
        }])
    }

    /// Draw the first upgrade named `name` into the player's area
    pub fn acquire_upgrade(&mut self, player: PlayerId, name: &str) -> Result<Vec<GameEvent>, GameError> {
        let cost_paid = self.take_from_deck(player, DeckKind::Upgrades, name)?;
        self.log.push(format!("{} acquired {}", player, name));

        Ok(vec![GameEvent::UpgradeAcquired {
            player,
            name: name.to_string(),
            cost_paid,
        }])
    }

    pub fn buy_futures_token(
        &mut self,
        player: PlayerId,
        track: &str,
        position: FuturesPosition,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.validate_actor(player)?;

        if !self.impact_tracks.iter().any(|t| t.id == track) {
            return Err(GameError::UnknownTrack(track.to_string()));
        }

        let limit = self.rules.max_futures_tokens;
        let cost = self.rules.futures_token_cost;
        let p = self.get_player_mut(player)?;
        if p.futures_tokens.len() >= limit {
            return Err(GameError::FuturesLimitReached(limit));
        }
        if !p.try_pay(cost) {
            return Err(GameError::InsufficientFunds {
                cost,
                available: p.cred_coin,
            });
        }

        p.futures_tokens.push(FuturesToken {
            track: track.to_string(),
            position,
            purchase_price: cost,
        });
        self.log.push(format!(
            "{} bought a {} futures token on {}",
            player, position, track
        ));

        Ok(vec![GameEvent::FuturesTokenBought {
            player,
            track: track.to_string(),
            position,
        }])
    }

    /// Run an owned facility. Its output joins the player's water supply and
    /// its positive impact profile goes to impact storage.
    pub fn produce_water(&mut self, player: PlayerId, facility: &str) -> Result<Vec<GameEvent>, GameError> {
        self.validate_actor(player)?;

        let p = self.get_player_mut(player)?;
        let (quantity, impact) = match p.facility(facility) {
            Some(f) => (f.base_output, f.impact_profile.clone()),
            None => return Err(GameError::FacilityNotOwned(facility.to_string())),
        };

        p.water += quantity;
        for (track, amount) in &impact {
            p.store_impact(track, *amount);
        }
        self.log.push(format!("{} produced {} water at {}", player, quantity, facility));

        Ok(vec![GameEvent::WaterProduced {
            player,
            facility: facility.to_string(),
            quantity,
        }])
    }

    /// Sell `quantity` water to a segment at its current price. The route's
    /// impact modifier adds `amount` per full `per_cubes` sold.
    pub fn sell_water(
        &mut self,
        player: PlayerId,
        segment: &str,
        route: &str,
        quantity: u32,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.validate_actor(player)?;

        if quantity == 0 {
            return Err(GameError::NothingToSell);
        }
        let index = self
            .demand_segments
            .iter()
            .position(|s| s.name == segment)
            .ok_or_else(|| GameError::UnknownSegment(segment.to_string()))?;
        let (remaining, price) = {
            let s = &self.demand_segments[index];
            (s.current_demand, s.current_price)
        };

        let p = self.get_player_mut(player)?;
        let modifier = match p.route(route) {
            Some(r) => r.impact_modifier.clone(),
            None => return Err(GameError::RouteNotOwned(route.to_string())),
        };
        if quantity > p.water {
            return Err(GameError::NotEnoughWater {
                requested: quantity,
                available: p.water,
            });
        }
        if quantity > remaining {
            return Err(GameError::DemandExceeded {
                requested: quantity,
                remaining,
            });
        }

        let revenue = quantity.saturating_mul(price);
        p.water -= quantity;
        p.cred_coin = p.cred_coin.saturating_add(revenue);
        if let Some(m) = modifier.filter(|m| m.per_cubes > 0) {
            p.store_impact(&m.track, (quantity / m.per_cubes) as i32 * m.amount);
        }

        self.demand_segments[index].current_demand -= quantity;
        self.sales_this_round
            .entry(segment.to_string())
            .or_default()
            .insert(player);
        self.log.push(format!(
            "{} sold {} water to {} for {}",
            player, quantity, segment, revenue
        ));

        Ok(vec![GameEvent::WaterSold {
            player,
            segment: segment.to_string(),
            quantity,
            revenue,
        }])
    }

    /// End the acting player's turn
    pub fn end_turn(&mut self, player: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        self.validate_actor(player)?;
        Ok(turn::advance_turn(self))
    }

    // ==================== Helper Methods ====================

    /// Common checks for any normal-play move
    fn validate_actor(&self, player: PlayerId) -> Result<(), GameError> {
        if self.get_player(player).is_none() {
            return Err(GameError::UnknownPlayer(player));
        }
        if self.is_over() {
            return Err(GameError::GameOver);
        }
        if self.is_drafting() {
            return Err(GameError::DraftInProgress);
        }
        if player != self.current_player {
            return Err(GameError::NotYourTurn);
        }
        Ok(())
    }

    /// Move the first card named `name` from a deck into the player's area,
    /// charging its cost when costs are enforced. Returns the amount paid.
    fn take_from_deck(&mut self, player: PlayerId, kind: DeckKind, name: &str) -> Result<u32, GameError> {
        self.validate_actor(player)?;

        let card_cost = self
            .decks
            .get(kind)
            .cards()
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| GameError::CardNotFound(name.to_string()))?
            .cost();
        let cost = if self.rules.enforce_costs {
            card_cost.unwrap_or(0)
        } else {
            0
        };

        let p = self.get_player_mut(player)?;
        if !p.try_pay(cost) {
            return Err(GameError::InsufficientFunds {
                cost,
                available: p.cred_coin,
            });
        }

        // Validated above, so the card is still there
        if let Some(card) = self.decks.get_mut(kind).take_named(name) {
            debug!(player, card = card.name(), ?kind, "card taken from deck");
            self.players[player as usize].receive(card);
        }

        Ok(cost)
    }
}
