//! Whim card effects.
//!
//! Whim cards describe their pre-round effect and post-round fallout as short
//! colon-separated strings. They are parsed once at catalog load, so a
//! malformed effect never reaches a running match.
//!
//! Recognized forms:
//! - `DemandSegment:<segment>:current_demand|current_price:<delta>`
//! - `AllSegments:current_demand|current_price:<delta>`
//! - `GlobalImpact:<track>:<delta>`
//! - `PlayerEffect:EcoEliteBuyers|AllPlayers|Drafter:GainReputation|GainCredCoin:<delta>`

use crate::actions::GameEvent;
use crate::cards::TrackId;
use crate::game::GameState;
use crate::player::PlayerId;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Segment name whose buyers `EcoEliteBuyers` refers to
pub const ECO_ELITES: &str = "Eco-Elites";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectParseError {
    #[error("unknown effect kind '{0}'")]
    UnknownKind(String),

    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("unknown player target '{0}'")]
    UnknownTarget(String),

    #[error("'{0}' is not a whole number")]
    BadAmount(String),
}

/// Demand segment value a whim can shift
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentAttribute {
    CurrentDemand,
    CurrentPrice,
}

impl fmt::Display for SegmentAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentAttribute::CurrentDemand => write!(f, "current_demand"),
            SegmentAttribute::CurrentPrice => write!(f, "current_price"),
        }
    }
}

/// Who a player effect applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerTarget {
    /// Players who sold to the Eco-Elites segment this round
    EcoEliteBuyers,
    AllPlayers,
    /// The player who drafted the whim
    Drafter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAttribute {
    Reputation,
    CredCoin,
}

/// A parsed whim effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhimEffect {
    Segment {
        segment: String,
        attribute: SegmentAttribute,
        delta: i32,
    },
    AllSegments {
        attribute: SegmentAttribute,
        delta: i32,
    },
    GlobalImpact {
        track: TrackId,
        delta: i32,
    },
    Player {
        target: PlayerTarget,
        attribute: PlayerAttribute,
        delta: i32,
    },
}

fn amount(text: &str) -> Result<i32, EffectParseError> {
    text.trim()
        .parse()
        .map_err(|_| EffectParseError::BadAmount(text.to_string()))
}

fn segment_attribute(text: &str) -> Result<SegmentAttribute, EffectParseError> {
    match text {
        "current_demand" => Ok(SegmentAttribute::CurrentDemand),
        "current_price" => Ok(SegmentAttribute::CurrentPrice),
        other => Err(EffectParseError::UnknownAttribute(other.to_string())),
    }
}

fn expect_fields(parts: &[&str], expected: usize) -> Result<(), EffectParseError> {
    if parts.len() != expected {
        return Err(EffectParseError::FieldCount {
            expected,
            found: parts.len(),
        });
    }
    Ok(())
}

impl FromStr for WhimEffect {
    type Err = EffectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();

        match parts[0] {
            "DemandSegment" => {
                expect_fields(&parts, 4)?;
                Ok(WhimEffect::Segment {
                    segment: parts[1].to_string(),
                    attribute: segment_attribute(parts[2])?,
                    delta: amount(parts[3])?,
                })
            }
            "AllSegments" => {
                expect_fields(&parts, 3)?;
                Ok(WhimEffect::AllSegments {
                    attribute: segment_attribute(parts[1])?,
                    delta: amount(parts[2])?,
                })
            }
            "GlobalImpact" => {
                expect_fields(&parts, 3)?;
                Ok(WhimEffect::GlobalImpact {
                    track: parts[1].to_uppercase(),
                    delta: amount(parts[2])?,
                })
            }
            "PlayerEffect" => {
                expect_fields(&parts, 4)?;
                let target = match parts[1] {
                    "EcoEliteBuyers" => PlayerTarget::EcoEliteBuyers,
                    "AllPlayers" => PlayerTarget::AllPlayers,
                    "Drafter" => PlayerTarget::Drafter,
                    other => return Err(EffectParseError::UnknownTarget(other.to_string())),
                };
                let attribute = match parts[2] {
                    "GainReputation" => PlayerAttribute::Reputation,
                    "GainCredCoin" => PlayerAttribute::CredCoin,
                    other => return Err(EffectParseError::UnknownAttribute(other.to_string())),
                };
                Ok(WhimEffect::Player {
                    target,
                    attribute,
                    delta: amount(parts[3])?,
                })
            }
            other => Err(EffectParseError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for WhimEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhimEffect::Segment {
                segment,
                attribute,
                delta,
            } => write!(f, "{} {} {:+}", segment, attribute, delta),
            WhimEffect::AllSegments { attribute, delta } => {
                write!(f, "all segments {} {:+}", attribute, delta)
            }
            WhimEffect::GlobalImpact { track, delta } => write!(f, "{} track {:+}", track, delta),
            WhimEffect::Player {
                target,
                attribute,
                delta,
            } => {
                let attribute = match attribute {
                    PlayerAttribute::Reputation => "reputation",
                    PlayerAttribute::CredCoin => "CredCoin",
                };
                write!(f, "{:?} {} {:+}", target, attribute, delta)
            }
        }
    }
}

impl GameState {
    /// Parse and apply one effect line of `whim`, drafted by `drafter`.
    /// Targets missing from this match (an unknown segment or track) are
    /// skipped.
    pub(crate) fn resolve_whim_effect(
        &mut self,
        whim: &str,
        drafter: PlayerId,
        text: &str,
    ) -> Option<GameEvent> {
        let effect: WhimEffect = match text.parse() {
            Ok(effect) => effect,
            Err(e) => {
                warn!(whim, effect = text, error = %e, "unresolvable whim effect");
                return None;
            }
        };

        let applied = match &effect {
            WhimEffect::Segment {
                segment,
                attribute,
                delta,
            } => match self.demand_segments.iter_mut().find(|s| &s.name == segment) {
                Some(s) => {
                    s.adjust(*attribute, *delta);
                    true
                }
                None => false,
            },
            WhimEffect::AllSegments { attribute, delta } => {
                for s in &mut self.demand_segments {
                    s.adjust(*attribute, *delta);
                }
                !self.demand_segments.is_empty()
            }
            WhimEffect::GlobalImpact { track, delta } => {
                match self.impact_tracks.iter_mut().find(|t| &t.id == track) {
                    Some(t) => {
                        t.shift(*delta);
                        true
                    }
                    None => false,
                }
            }
            WhimEffect::Player {
                target,
                attribute,
                delta,
            } => {
                let targets: Vec<PlayerId> = match target {
                    PlayerTarget::EcoEliteBuyers => self
                        .sales_this_round
                        .get(ECO_ELITES)
                        .map(|buyers| buyers.iter().copied().collect())
                        .unwrap_or_default(),
                    PlayerTarget::AllPlayers => self.players.iter().map(|p| p.id).collect(),
                    PlayerTarget::Drafter => vec![drafter],
                };
                for id in &targets {
                    if let Some(p) = self.players.get_mut(*id as usize) {
                        match attribute {
                            PlayerAttribute::Reputation => p.reputation += delta,
                            PlayerAttribute::CredCoin => {
                                p.cred_coin = p.cred_coin.saturating_add_signed(*delta)
                            }
                        }
                    }
                }
                !targets.is_empty()
            }
        };

        if !applied {
            debug!(whim, effect = text, "whim effect has no target in this match");
            return None;
        }

        self.log.push(format!("{}: {}", whim, effect));
        Some(GameEvent::WhimEffectResolved {
            whim: whim.to_string(),
            effect: effect.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_segment_effects() {
        assert_eq!(
            "DemandSegment:Connoisseurs:current_demand:+2".parse(),
            Ok(WhimEffect::Segment {
                segment: "Connoisseurs".into(),
                attribute: SegmentAttribute::CurrentDemand,
                delta: 2
            })
        );
        assert_eq!(
            "AllSegments:current_price:-1".parse(),
            Ok(WhimEffect::AllSegments {
                attribute: SegmentAttribute::CurrentPrice,
                delta: -1
            })
        );
    }

    #[test]
    fn test_parse_impact_and_player_effects() {
        assert_eq!(
            "GlobalImpact:grey:-1".parse(),
            Ok(WhimEffect::GlobalImpact {
                track: "GREY".into(),
                delta: -1
            })
        );
        assert_eq!(
            "PlayerEffect:EcoEliteBuyers:GainReputation:1".parse(),
            Ok(WhimEffect::Player {
                target: PlayerTarget::EcoEliteBuyers,
                attribute: PlayerAttribute::Reputation,
                delta: 1
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "Weather:Rain".parse::<WhimEffect>(),
            Err(EffectParseError::UnknownKind("Weather".into()))
        );
        assert_eq!(
            "GlobalImpact:PINK".parse::<WhimEffect>(),
            Err(EffectParseError::FieldCount {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(
            "DemandSegment:Frugalists:mood:+1".parse::<WhimEffect>(),
            Err(EffectParseError::UnknownAttribute("mood".into()))
        );
        assert_eq!(
            "GlobalImpact:PINK:lots".parse::<WhimEffect>(),
            Err(EffectParseError::BadAmount("lots".into()))
        );
        assert_eq!(
            "PlayerEffect:Everyone:GainReputation:1".parse::<WhimEffect>(),
            Err(EffectParseError::UnknownTarget("Everyone".into()))
        );
    }
}
