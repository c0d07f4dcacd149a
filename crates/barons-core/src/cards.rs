//! Card instances and decks.
//!
//! A card instance is an independent copy stamped from a catalog template.
//! Every card family (facilities, distributions, upgrades, whims) shares the
//! same [`CardInstance`] union so decks, player areas and draft option sets
//! can hold any of them while still serializing each variant with exactly
//! its own fields.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of an impact track (e.g. `PINK` for microplastics)
pub type TrackId = String;

/// A water source that can be built into a player's area
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityCard {
    pub name: String,
    pub cost: u32,
    pub base_output: u32,
    /// Impact added per flow, keyed by track
    pub impact_profile: BTreeMap<TrackId, i32>,
    pub tags: Vec<String>,
    pub description: String,
}

/// Per-sale impact caused by a distribution route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactModifier {
    pub track: TrackId,
    pub amount: i32,
    /// Number of cubes sold per `amount` of impact
    pub per_cubes: u32,
}

/// A distribution route that carries water to customers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionCard {
    pub name: String,
    pub cost: u32,
    pub description: String,
    pub special_effect: Option<String>,
    pub impact_modifier: Option<ImpactModifier>,
}

/// What an upgrade attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpgradeKind {
    FacilityUpgrade,
    RouteUpgrade,
    FacilityTag,
    RAndD,
}

/// An upgrade or mitigation technology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeCard {
    pub name: String,
    pub cost: u32,
    pub description: String,
    pub effect: String,
    pub kind: UpgradeKind,
}

/// A crowd whim. Whims are drafted, never bought, so they carry no cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhimCard {
    pub name: String,
    pub description: String,
    pub trigger_condition: String,
    pub pre_round_effect: String,
    pub post_round_fallout: String,
}

/// A single card in circulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardInstance {
    Facility(FacilityCard),
    Distribution(DistributionCard),
    Upgrade(UpgradeCard),
    Whim(WhimCard),
}

impl CardInstance {
    pub fn name(&self) -> &str {
        match self {
            CardInstance::Facility(c) => &c.name,
            CardInstance::Distribution(c) => &c.name,
            CardInstance::Upgrade(c) => &c.name,
            CardInstance::Whim(c) => &c.name,
        }
    }

    /// Purchase cost, `None` for cards that cannot be bought
    pub fn cost(&self) -> Option<u32> {
        match self {
            CardInstance::Facility(c) => Some(c.cost),
            CardInstance::Distribution(c) => Some(c.cost),
            CardInstance::Upgrade(c) => Some(c.cost),
            CardInstance::Whim(_) => None,
        }
    }
}

/// An ordered, drawable pile of cards. The front of the deck is the top.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deck {
    cards: Vec<CardInstance>,
}

impl Deck {
    pub fn from_cards(cards: Vec<CardInstance>) -> Self {
        Self { cards }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[CardInstance] {
        &self.cards
    }

    /// Index of the first card with this name, scanning from the top
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.cards.iter().position(|c| c.name() == name)
    }

    /// Remove the card at `index`, preserving the order of the rest
    pub fn take(&mut self, index: usize) -> Option<CardInstance> {
        (index < self.cards.len()).then(|| self.cards.remove(index))
    }

    /// Remove the first card with this name
    pub fn take_named(&mut self, name: &str) -> Option<CardInstance> {
        let index = self.position_of(name)?;
        self.take(index)
    }

    /// Draw up to `count` cards from the top
    pub fn draw(&mut self, count: usize) -> Vec<CardInstance> {
        let count = count.min(self.cards.len());
        self.cards.drain(..count).collect()
    }

    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
    }
}

/// Which deck a card family is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeckKind {
    Facilities,
    Distributions,
    Whims,
    Upgrades,
}

/// The four decks of a match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decks {
    pub facilities: Deck,
    pub distributions: Deck,
    pub whims: Deck,
    pub upgrades: Deck,
}

impl Decks {
    pub fn get(&self, kind: DeckKind) -> &Deck {
        match kind {
            DeckKind::Facilities => &self.facilities,
            DeckKind::Distributions => &self.distributions,
            DeckKind::Whims => &self.whims,
            DeckKind::Upgrades => &self.upgrades,
        }
    }

    pub fn get_mut(&mut self, kind: DeckKind) -> &mut Deck {
        match kind {
            DeckKind::Facilities => &mut self.facilities,
            DeckKind::Distributions => &mut self.distributions,
            DeckKind::Whims => &mut self.whims,
            DeckKind::Upgrades => &mut self.upgrades,
        }
    }

    /// Shuffle every deck. Never done implicitly at setup.
    pub fn shuffle_all<R: Rng>(&mut self, rng: &mut R) {
        self.facilities.shuffle(rng);
        self.distributions.shuffle(rng);
        self.whims.shuffle(rng);
        self.upgrades.shuffle(rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn whim(name: &str) -> CardInstance {
        CardInstance::Whim(WhimCard {
            name: name.to_string(),
            description: String::new(),
            trigger_condition: "μP < 5".to_string(),
            pre_round_effect: "AllSegments:current_demand:+1".to_string(),
            post_round_fallout: "GlobalImpact:PINK:+2".to_string(),
        })
    }

    #[test]
    fn test_take_named_first_match_wins() {
        let mut deck = Deck::from_cards(vec![whim("A"), whim("B"), whim("A")]);

        assert_eq!(deck.position_of("A"), Some(0));
        let taken = deck.take_named("A").unwrap();
        assert_eq!(taken.name(), "A");

        let names: Vec<&str> = deck.cards().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert!(deck.take_named("Z").is_none());
    }

    #[test]
    fn test_draw_from_top() {
        let mut deck = Deck::from_cards(vec![whim("A"), whim("B"), whim("C")]);
        let drawn = deck.draw(2);

        assert_eq!(drawn.len(), 2);
        assert_eq!(drawn[0].name(), "A");
        assert_eq!(deck.len(), 1);
        assert_eq!(deck.draw(5).len(), 1);
        assert!(deck.is_empty());
    }

    #[test]
    fn test_shuffle_keeps_cards() {
        let mut deck = Deck::from_cards((0..20).map(|i| whim(&format!("W{i}"))).collect());
        let mut rng = StdRng::seed_from_u64(7);
        deck.shuffle(&mut rng);

        assert_eq!(deck.len(), 20);
        assert!(deck.position_of("W3").is_some());
    }

    #[test]
    fn test_whim_serializes_its_own_fields() {
        let json = serde_json::to_value(whim("Glitterwave Fashion")).unwrap();

        assert_eq!(json["type"], "WHIM");
        assert_eq!(json["trigger_condition"], "μP < 5");
        assert_eq!(json["post_round_fallout"], "GlobalImpact:PINK:+2");
        assert!(json.get("cost").is_none());
    }

    #[test]
    fn test_upgrade_kind_names() {
        let json = serde_json::to_value(UpgradeKind::RAndD).unwrap();
        assert_eq!(json, "R_AND_D");
    }
}
