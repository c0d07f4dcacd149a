//! Player state and resource management.
//!
//! This module contains:
//! - `PlayerState` with CredCoin, reputation and the player's card areas
//! - Water produced this round and impact waiting to be consolidated
//! - Futures tokens bought on the impact tracks

use crate::cards::{CardInstance, DistributionCard, FacilityCard, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Seat index of a player, `0..num_players`
pub type PlayerId = u8;

/// Direction of a futures bet on an impact track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuturesPosition {
    /// Pays out if the track rises
    Long,
    /// Pays out if the track falls
    Short,
}

impl std::fmt::Display for FuturesPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FuturesPosition::Long => write!(f, "long"),
            FuturesPosition::Short => write!(f, "short"),
        }
    }
}

/// A futures token held by a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuturesToken {
    pub track: TrackId,
    pub position: FuturesPosition,
    pub purchase_price: u32,
}

/// A player's dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub cred_coin: u32,
    pub reputation: i32,
    pub facilities: Vec<CardInstance>,
    pub distribution: Vec<CardInstance>,
    pub upgrades: Vec<CardInstance>,
    /// Water cubes produced this round; unsold cubes evaporate at round end
    pub water: u32,
    /// Impact waiting to be pushed onto the global tracks
    pub impact_storage: BTreeMap<TrackId, i32>,
    /// Impact consolidated over the whole match, the final-scoring tie-breaker
    pub impact_contributed: BTreeMap<TrackId, u32>,
    pub futures_tokens: Vec<FuturesToken>,
    /// Drafted whims
    pub event_options: Vec<CardInstance>,
}

impl PlayerState {
    pub fn new(id: PlayerId, cred_coin: u32) -> Self {
        Self {
            id,
            cred_coin,
            reputation: 0,
            facilities: Vec::new(),
            distribution: Vec::new(),
            upgrades: Vec::new(),
            water: 0,
            impact_storage: BTreeMap::new(),
            impact_contributed: BTreeMap::new(),
            futures_tokens: Vec::new(),
            event_options: Vec::new(),
        }
    }

    pub fn can_afford(&self, cost: u32) -> bool {
        self.cred_coin >= cost
    }

    /// Try to pay, returning false if insufficient
    pub fn try_pay(&mut self, cost: u32) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        self.cred_coin -= cost;
        true
    }

    /// Place a card into the area matching its type
    pub fn receive(&mut self, card: CardInstance) {
        match card {
            CardInstance::Facility(_) => self.facilities.push(card),
            CardInstance::Distribution(_) => self.distribution.push(card),
            CardInstance::Upgrade(_) => self.upgrades.push(card),
            CardInstance::Whim(_) => self.event_options.push(card),
        }
    }

    /// First owned facility with this name
    pub fn facility(&self, name: &str) -> Option<&FacilityCard> {
        self.facilities.iter().find_map(|c| match c {
            CardInstance::Facility(f) if f.name == name => Some(f),
            _ => None,
        })
    }

    /// First owned distribution route with this name
    pub fn route(&self, name: &str) -> Option<&DistributionCard> {
        self.distribution.iter().find_map(|c| match c {
            CardInstance::Distribution(d) if d.name == name => Some(d),
            _ => None,
        })
    }

    /// Add positive impact to storage; zero and negative amounts are ignored
    pub fn store_impact(&mut self, track: &str, amount: i32) {
        if amount > 0 {
            *self.impact_storage.entry(track.to_string()).or_insert(0) += amount;
        }
    }

    /// Number of differently named routes built
    pub fn distinct_routes(&self) -> usize {
        self.distribution
            .iter()
            .map(|c| c.name())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn total_impact_contributed(&self) -> u32 {
        self.impact_contributed.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{FacilityCard, WhimCard};

    fn facility(name: &str) -> CardInstance {
        CardInstance::Facility(FacilityCard {
            name: name.to_string(),
            cost: 3,
            base_output: 1,
            impact_profile: BTreeMap::new(),
            tags: vec![],
            description: String::new(),
        })
    }

    #[test]
    fn test_new_player_dashboard() {
        let player = PlayerState::new(1, 5);
        assert_eq!(player.cred_coin, 5);
        assert_eq!(player.reputation, 0);
        assert_eq!(player.water, 0);
        assert!(player.impact_storage.is_empty());
    }

    #[test]
    fn test_try_pay() {
        let mut player = PlayerState::new(0, 5);
        assert!(player.try_pay(3));
        assert_eq!(player.cred_coin, 2);
        assert!(!player.try_pay(3));
        assert_eq!(player.cred_coin, 2);
    }

    #[test]
    fn test_receive_routes_by_type() {
        let mut player = PlayerState::new(0, 5);
        player.receive(facility("Fog Net Array"));
        player.receive(CardInstance::Whim(WhimCard {
            name: "Doomscroll Detox".into(),
            description: String::new(),
            trigger_condition: "CO2e >= 6".into(),
            pre_round_effect: String::new(),
            post_round_fallout: String::new(),
        }));

        assert_eq!(player.facility("Fog Net Array").map(|f| f.cost), Some(3));
        assert!(player.route("Fog Net Array").is_none());
        assert_eq!(player.event_options.len(), 1);
    }

    #[test]
    fn test_store_impact_ignores_non_positive() {
        let mut player = PlayerState::new(0, 5);
        player.store_impact("PINK", 2);
        player.store_impact("PINK", 1);
        player.store_impact("GREY", 0);
        player.store_impact("BLUE", -3);

        assert_eq!(player.impact_storage, BTreeMap::from([("PINK".to_string(), 3)]));
    }
}
