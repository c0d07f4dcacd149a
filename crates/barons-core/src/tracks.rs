//! Shared match gauges: impact tracks and customer demand segments.

use crate::cards::TrackId;
use crate::catalog::{DemandSegmentDef, ImpactTrackDef};
use crate::effects::SegmentAttribute;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A global impact gauge (microplastics, carbon, depletion, toxicity)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactTrack {
    pub id: TrackId,
    pub name: String,
    pub flavor_text: String,
    pub level: u32,
    pub max_level: u32,
    /// Threshold effect keys, active while `level` is at or above the key's level
    pub thresholds: BTreeMap<u32, String>,
}

impl ImpactTrack {
    pub fn from_def(def: &ImpactTrackDef) -> Self {
        Self {
            id: def.id.clone(),
            name: def.name.clone(),
            flavor_text: def.flavor_text.clone(),
            level: 0,
            max_level: def.max_level,
            thresholds: def
                .thresholds
                .iter()
                .map(|t| (t.level, t.effect.clone()))
                .collect(),
        }
    }

    /// Move the level by `delta`, clamped to `0..=max_level`
    pub fn shift(&mut self, delta: i32) {
        self.level = self.level.saturating_add_signed(delta).min(self.max_level);
    }

    pub fn is_maxed(&self) -> bool {
        self.level >= self.max_level
    }

    /// Threshold effect keys reached at the current level
    pub fn reached_thresholds(&self) -> impl Iterator<Item = &str> {
        self.thresholds
            .range(..=self.level)
            .map(|(_, effect)| effect.as_str())
    }
}

/// A customer segment with its current demand and price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandSegment {
    pub name: String,
    pub current_demand: u32,
    pub current_price: u32,
    pub base_demand: u32,
    pub base_price: u32,
    pub values_description: String,
}

impl DemandSegment {
    pub fn from_def(def: &DemandSegmentDef) -> Self {
        Self {
            name: def.name.clone(),
            current_demand: def.base_demand,
            current_price: def.base_price,
            base_demand: def.base_demand,
            base_price: def.base_price,
            values_description: def.values_description.clone(),
        }
    }

    /// Shift demand or price by `delta`, never below zero
    pub fn adjust(&mut self, attribute: SegmentAttribute, delta: i32) {
        let value = match attribute {
            SegmentAttribute::CurrentDemand => &mut self.current_demand,
            SegmentAttribute::CurrentPrice => &mut self.current_price,
        };
        *value = value.saturating_add_signed(delta);
    }

    /// Back to base values at the end of a round
    pub fn reset(&mut self) {
        self.current_demand = self.base_demand;
        self.current_price = self.base_price;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ThresholdDef;

    fn track() -> ImpactTrack {
        ImpactTrack::from_def(&ImpactTrackDef {
            id: "GREY".into(),
            name: "Carbon".into(),
            flavor_text: String::new(),
            max_level: 10,
            thresholds: vec![ThresholdDef {
                level: 6,
                effect: "CO2_Level_6_Effect".into(),
            }],
        })
    }

    #[test]
    fn test_shift_clamps() {
        let mut track = track();
        track.shift(4);
        assert_eq!(track.level, 4);
        track.shift(-9);
        assert_eq!(track.level, 0);
        track.shift(25);
        assert_eq!(track.level, 10);
        assert!(track.is_maxed());
    }

    #[test]
    fn test_reached_thresholds() {
        let mut track = track();
        track.shift(5);
        assert_eq!(track.reached_thresholds().count(), 0);
        track.shift(1);
        assert_eq!(track.reached_thresholds().collect::<Vec<_>>(), vec!["CO2_Level_6_Effect"]);
    }

    #[test]
    fn test_segment_adjust_and_reset() {
        let mut segment = DemandSegment::from_def(&DemandSegmentDef {
            name: "Frugalists".into(),
            base_demand: 4,
            base_price: 1,
            values_description: String::new(),
        });

        segment.adjust(SegmentAttribute::CurrentPrice, 2);
        segment.adjust(SegmentAttribute::CurrentDemand, -6);
        assert_eq!((segment.current_demand, segment.current_price), (0, 3));

        segment.reset();
        assert_eq!((segment.current_demand, segment.current_price), (4, 1));
    }
}
