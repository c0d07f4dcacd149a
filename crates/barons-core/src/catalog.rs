//! Card catalog and match configuration.
//!
//! The catalog is loaded once from two TOML documents and is never mutated
//! afterwards:
//! - the content document: `[[facilities]]`, `[[distributions]]`, `[[whims]]`,
//!   `[[upgrades]]` template lists plus an optional `[rules]` table
//! - the metadata document: demand segments, impact tracks and threshold
//!   effect descriptions
//!
//! Templates reject unknown fields, so a typo in the data fails at load time
//! rather than surfacing mid-game.

use crate::cards::{
    CardInstance, Deck, DistributionCard, FacilityCard, ImpactModifier, TrackId, UpgradeCard,
    UpgradeKind, WhimCard,
};
use crate::effects::WhimEffect;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading catalog data or setting up a match
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {message}")]
    Io { path: String, message: String },

    #[error("Malformed catalog document: {0}")]
    Parse(String),

    #[error("Card '{card}' has copies = {copies}, expected 0 to {MAX_COPIES}")]
    InvalidCopies { card: String, copies: i64 },

    #[error("Whim '{card}' has an invalid effect '{effect}': {reason}")]
    InvalidEffect {
        card: String,
        effect: String,
        reason: String,
    },

    #[error("Impact track '{0}' is defined twice")]
    DuplicateTrack(TrackId),

    #[error("A match needs at least one player")]
    NoPlayers,
}

/// Upper bound on `copies` for a single template
pub const MAX_COPIES: i64 = 1000;

/// A declarative definition that deck entries are stamped from
pub trait CardTemplate {
    fn name(&self) -> &str;

    /// Raw `copies` value, `None` when absent
    fn copies(&self) -> Option<i64>;

    /// Build one independent instance of this template
    fn stamp(&self) -> CardInstance;

    /// How many instances go into a deck (absent means one, capped at
    /// [`MAX_COPIES`])
    fn copy_count(&self) -> usize {
        self.copies()
            .map(|c| usize::try_from(c.clamp(0, MAX_COPIES)).unwrap_or(0))
            .unwrap_or(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FacilityTemplate {
    pub name: String,
    pub cost: u32,
    #[serde(default)]
    pub copies: Option<i64>,
    #[serde(default)]
    pub base_output: u32,
    #[serde(default)]
    pub impact_profile: BTreeMap<TrackId, i32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl CardTemplate for FacilityTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn copies(&self) -> Option<i64> {
        self.copies
    }

    fn stamp(&self) -> CardInstance {
        CardInstance::Facility(FacilityCard {
            name: self.name.clone(),
            cost: self.cost,
            base_output: self.base_output,
            impact_profile: self.impact_profile.clone(),
            tags: self.tags.clone(),
            description: self.description.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistributionTemplate {
    pub name: String,
    pub cost: u32,
    #[serde(default)]
    pub copies: Option<i64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub special_effect: Option<String>,
    #[serde(default)]
    pub impact_modifier: Option<ImpactModifier>,
}

impl CardTemplate for DistributionTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn copies(&self) -> Option<i64> {
        self.copies
    }

    fn stamp(&self) -> CardInstance {
        CardInstance::Distribution(DistributionCard {
            name: self.name.clone(),
            cost: self.cost,
            description: self.description.clone(),
            special_effect: self.special_effect.clone(),
            impact_modifier: self.impact_modifier.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpgradeTemplate {
    pub name: String,
    pub cost: u32,
    pub kind: UpgradeKind,
    #[serde(default)]
    pub copies: Option<i64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub effect: String,
}

impl CardTemplate for UpgradeTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn copies(&self) -> Option<i64> {
        self.copies
    }

    fn stamp(&self) -> CardInstance {
        CardInstance::Upgrade(UpgradeCard {
            name: self.name.clone(),
            cost: self.cost,
            description: self.description.clone(),
            effect: self.effect.clone(),
            kind: self.kind,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhimTemplate {
    pub name: String,
    pub trigger_condition: String,
    pub pre_round_effect: String,
    pub post_round_fallout: String,
    #[serde(default)]
    pub copies: Option<i64>,
    #[serde(default)]
    pub description: String,
}

impl CardTemplate for WhimTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn copies(&self) -> Option<i64> {
        self.copies
    }

    fn stamp(&self) -> CardInstance {
        CardInstance::Whim(WhimCard {
            name: self.name.clone(),
            description: self.description.clone(),
            trigger_condition: self.trigger_condition.clone(),
            pre_round_effect: self.pre_round_effect.clone(),
            post_round_fallout: self.post_round_fallout.clone(),
        })
    }
}

/// Expand templates into an unshuffled deck, `copies` instances each, in
/// template order.
pub fn expand_deck<T: CardTemplate>(templates: &[T]) -> Deck {
    let cards = templates
        .iter()
        .flat_map(|t| std::iter::repeat_with(|| t.stamp()).take(t.copy_count()))
        .collect();
    Deck::from_cards(cards)
}

/// Ruleset knobs, read from the optional `[rules]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Rules {
    pub starting_cred_coin: u32,
    /// Charge card cost on build and reject when the player cannot pay
    pub enforce_costs: bool,
    /// Start a whim draft every N rounds; 0 disables automatic drafts
    pub draft_every_rounds: u32,
    pub whim_options_per_player: usize,
    /// Picks per draft; later picks reverse the queue
    pub draft_picks: u32,
    pub max_futures_tokens: usize,
    pub futures_token_cost: u32,
    /// Track movement within one round that matures a futures token
    pub futures_maturity_steps: u32,
    pub futures_payout: u32,
    /// End the match after this round; 0 plays until the planet is uninhabitable
    pub max_rounds: u32,
    /// Maxed-out tracks that make the planet uninhabitable
    pub uninhabitable_tracks: usize,
    /// Distinct routes needed for the diversity bonus at final scoring
    pub diversity_routes: usize,
    pub diversity_bonus: u32,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            starting_cred_coin: 5,
            enforce_costs: true,
            draft_every_rounds: 1,
            whim_options_per_player: 3,
            draft_picks: 1,
            max_futures_tokens: 3,
            futures_token_cost: 2,
            futures_maturity_steps: 2,
            futures_payout: 5,
            max_rounds: 0,
            uninhabitable_tracks: 3,
            diversity_routes: 3,
            diversity_bonus: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DemandSegmentDef {
    pub name: String,
    pub base_demand: u32,
    pub base_price: u32,
    #[serde(default)]
    pub values_description: String,
}

fn default_max_level() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdDef {
    pub level: u32,
    /// Key into `threshold_effect_descriptions`
    pub effect: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImpactTrackDef {
    pub id: TrackId,
    pub name: String,
    #[serde(default)]
    pub flavor_text: String,
    #[serde(default = "default_max_level")]
    pub max_level: u32,
    #[serde(default)]
    pub thresholds: Vec<ThresholdDef>,
}

/// Match metadata: demand segments and impact tracks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Metadata {
    #[serde(default)]
    pub demand_segments: Vec<DemandSegmentDef>,
    #[serde(default)]
    pub impact_tracks: Vec<ImpactTrackDef>,
    #[serde(default)]
    pub threshold_effect_descriptions: BTreeMap<String, String>,
}

impl Metadata {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let metadata: Metadata =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut seen = HashSet::new();
        for track in &metadata.impact_tracks {
            if !seen.insert(track.id.as_str()) {
                return Err(ConfigError::DuplicateTrack(track.id.clone()));
            }
        }

        Ok(metadata)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ContentDocument {
    #[serde(default)]
    facilities: Vec<FacilityTemplate>,
    #[serde(default)]
    distributions: Vec<DistributionTemplate>,
    #[serde(default)]
    whims: Vec<WhimTemplate>,
    #[serde(default)]
    upgrades: Vec<UpgradeTemplate>,
    #[serde(default)]
    rules: Rules,
}

/// Immutable card catalog shared by every match in the process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub facilities: Vec<FacilityTemplate>,
    pub distributions: Vec<DistributionTemplate>,
    pub whims: Vec<WhimTemplate>,
    pub upgrades: Vec<UpgradeTemplate>,
    pub rules: Rules,
    pub metadata: Metadata,
}

impl Catalog {
    /// Parse a content document. Metadata starts empty; see [`Catalog::with_metadata`].
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let doc: ContentDocument =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let catalog = Self {
            facilities: doc.facilities,
            distributions: doc.distributions,
            whims: doc.whims,
            upgrades: doc.upgrades,
            rules: doc.rules,
            metadata: Metadata::default(),
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_rules(mut self, rules: Rules) -> Self {
        self.rules = rules;
        self
    }

    /// Load both documents from disk
    pub fn load(
        content_path: impl AsRef<Path>,
        metadata_path: impl AsRef<Path>,
    ) -> Result<Self, ConfigError> {
        let content = read_document(content_path.as_ref())?;
        let metadata = read_document(metadata_path.as_ref())?;
        Ok(Self::from_toml(&content)?.with_metadata(Metadata::from_toml(&metadata)?))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_copies(&self.facilities)?;
        check_copies(&self.distributions)?;
        check_copies(&self.whims)?;
        check_copies(&self.upgrades)?;
        check_effects(&self.whims)
    }

    pub fn facility_deck(&self) -> Deck {
        expand_deck(&self.facilities)
    }

    pub fn distribution_deck(&self) -> Deck {
        expand_deck(&self.distributions)
    }

    pub fn whim_deck(&self) -> Deck {
        expand_deck(&self.whims)
    }

    pub fn upgrade_deck(&self) -> Deck {
        expand_deck(&self.upgrades)
    }
}

/// Parse a content document into a catalog
pub fn load_catalog(text: &str) -> Result<Catalog, ConfigError> {
    Catalog::from_toml(text)
}

fn check_copies<T: CardTemplate>(templates: &[T]) -> Result<(), ConfigError> {
    for template in templates {
        if let Some(copies) = template.copies() {
            if !(0..=MAX_COPIES).contains(&copies) {
                return Err(ConfigError::InvalidCopies {
                    card: template.name().to_string(),
                    copies,
                });
            }
        }
    }
    Ok(())
}

fn check_effects(whims: &[WhimTemplate]) -> Result<(), ConfigError> {
    for whim in whims {
        for effect in [&whim.pre_round_effect, &whim.post_round_fallout] {
            effect
                .parse::<WhimEffect>()
                .map_err(|e| ConfigError::InvalidEffect {
                    card: whim.name.clone(),
                    effect: effect.clone(),
                    reason: e.to_string(),
                })?;
        }
    }
    Ok(())
}

fn read_document(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT: &str = r#"
[[facilities]]
name = "Glacial Tap"
cost = 5
copies = 2
base_output = 3
impact_profile = { GREY = 1, PINK = 1 }
tags = ["ARCTIC"]

[[facilities]]
name = "Fog Net Array"
cost = 3

[[whims]]
name = "Heatwave Hysteria"
trigger_condition = "CO2e >= 7"
pre_round_effect = "AllSegments:current_demand:+1"
post_round_fallout = "GlobalImpact:GREY:+1"
copies = 0

[[upgrades]]
name = "Microplastic Filter"
cost = 4
kind = "FACILITY_UPGRADE"
copies = 3
"#;

    #[test]
    fn test_load_catalog_sections() {
        let catalog = load_catalog(CONTENT).unwrap();

        assert_eq!(catalog.facilities.len(), 2);
        assert!(catalog.distributions.is_empty());
        assert_eq!(catalog.whims.len(), 1);
        assert_eq!(catalog.upgrades[0].kind, UpgradeKind::FacilityUpgrade);
        assert_eq!(catalog.rules, Rules::default());
    }

    #[test]
    fn test_expand_deck_honours_copies() {
        let catalog = load_catalog(CONTENT).unwrap();

        let facilities = catalog.facility_deck();
        let names: Vec<&str> = facilities.cards().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Glacial Tap", "Glacial Tap", "Fog Net Array"]);

        // copies = 0 contributes nothing
        assert!(catalog.whim_deck().is_empty());
        assert_eq!(catalog.upgrade_deck().len(), 3);
    }

    #[test]
    fn test_deck_length_is_sum_of_copies() {
        let catalog = load_catalog(CONTENT).unwrap();
        let expected: usize = catalog.facilities.iter().map(|t| t.copy_count()).sum();
        assert_eq!(catalog.facility_deck().len(), expected);
    }

    #[test]
    fn test_negative_copies_rejected() {
        let text = r#"
[[facilities]]
name = "Aquifer Well"
cost = 4
copies = -1
"#;
        assert_eq!(
            load_catalog(text),
            Err(ConfigError::InvalidCopies {
                card: "Aquifer Well".into(),
                copies: -1
            })
        );
    }

    #[test]
    fn test_excessive_copies_rejected() {
        let text = r#"
[[whims]]
name = "Glitterwave Fashion"
trigger_condition = "μP < 5"
pre_round_effect = "DemandSegment:Connoisseurs:current_demand:+2"
post_round_fallout = "GlobalImpact:PINK:+2"
copies = 10000000000
"#;
        assert_eq!(
            load_catalog(text),
            Err(ConfigError::InvalidCopies {
                card: "Glitterwave Fashion".into(),
                copies: 10_000_000_000
            })
        );

        let at_limit = text.replace("10000000000", "1000");
        assert_eq!(load_catalog(&at_limit).unwrap().whim_deck().len(), 1000);
    }

    #[test]
    fn test_malformed_whim_effect_rejected() {
        let text = r#"
[[whims]]
name = "Doomscroll Detox"
trigger_condition = "CO2e >= 6"
pre_round_effect = "DemandSegment:Frugalists:current_price:+1"
post_round_fallout = "GlobalImpact:GREY"
"#;
        assert!(matches!(
            load_catalog(text),
            Err(ConfigError::InvalidEffect { card, .. }) if card == "Doomscroll Detox"
        ));
    }

    #[test]
    fn test_fractional_copies_rejected() {
        let text = r#"
[[facilities]]
name = "Aquifer Well"
cost = 4
copies = 1.5
"#;
        assert!(matches!(load_catalog(text), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_field_rejected() {
        let text = r#"
[[whims]]
name = "Doomscroll Detox"
trigger_condition = "CO2e >= 6"
"#;
        assert!(matches!(load_catalog(text), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let text = r#"
[[distributions]]
name = "Drone Drops"
cost = 3
speed = "fast"
"#;
        assert!(matches!(load_catalog(text), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_rules_table_overrides_defaults() {
        let text = r#"
[rules]
enforce_costs = false
draft_every_rounds = 0
"#;
        let catalog = load_catalog(text).unwrap();
        assert!(!catalog.rules.enforce_costs);
        assert_eq!(catalog.rules.draft_every_rounds, 0);
        assert_eq!(catalog.rules.starting_cred_coin, 5);
    }

    #[test]
    fn test_metadata_parsing() {
        let text = r#"
[[demand_segments]]
name = "Frugalists"
base_demand = 4
base_price = 1

[[impact_tracks]]
id = "PINK"
name = "Microplastics"
thresholds = [{ level = 8, effect = "PINK_Level_8_Effect" }]

[threshold_effect_descriptions]
DEP_Level_5_Effect = "Wells output -1."
"#;
        let metadata = Metadata::from_toml(text).unwrap();
        assert_eq!(metadata.demand_segments[0].base_demand, 4);
        assert_eq!(metadata.impact_tracks[0].max_level, 10);
        assert_eq!(metadata.impact_tracks[0].thresholds[0].level, 8);
        assert_eq!(metadata.threshold_effect_descriptions.len(), 1);
    }

    #[test]
    fn test_duplicate_track_rejected() {
        let text = r#"
[[impact_tracks]]
id = "PINK"
name = "Microplastics"

[[impact_tracks]]
id = "PINK"
name = "Glitter"
"#;
        assert_eq!(
            Metadata::from_toml(text),
            Err(ConfigError::DuplicateTrack("PINK".into()))
        );
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = Catalog::load("/nonexistent/content.toml", "/nonexistent/meta.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
