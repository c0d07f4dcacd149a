//! Round-end cleanup.
//!
//! Runs once when turn order wraps back to the first seat, before the next
//! round begins:
//!
//! 1. post-round fallout of the whims drafted this round
//! 2. stored impact moves onto the global tracks
//! 3. futures tokens mature or spoil on this round's track movement
//! 4. threshold effects switch on and off
//! 5. unsold water evaporates and demand segments return to base
//! 6. the match ends if the planet is uninhabitable or the round limit is hit

use crate::actions::GameEvent;
use crate::game::GameState;
use crate::player::{FuturesPosition, PlayerId};
use crate::scoring::GameOutcome;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// A drafted whim whose post-round fallout is still to come
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFallout {
    pub drafter: PlayerId,
    pub whim: String,
    pub effect: String,
}

pub(crate) fn end_round(state: &mut GameState) -> Vec<GameEvent> {
    debug!(round = state.round, "round-end cleanup");
    let mut events = Vec::new();

    for fallout in std::mem::take(&mut state.pending_fallout) {
        events.extend(state.resolve_whim_effect(&fallout.whim, fallout.drafter, &fallout.effect));
    }

    events.extend(consolidate_impacts(state));
    events.extend(resolve_futures(state));
    events.extend(update_thresholds(state));
    events.extend(evaporate_water(state));

    for segment in &mut state.demand_segments {
        segment.reset();
    }
    state.sales_this_round.clear();

    if let Some(reason) = state.end_condition() {
        let standings = state.final_standings();
        let outcome = GameOutcome { reason, standings };
        if let Some(winner) = outcome.winner() {
            info!(round = state.round, ?reason, winner, "match over");
            state.log.push(format!("Game over after round {}", state.round));
            for s in &outcome.standings {
                state.log.push(format!("{} scored {}", s.player, s.total));
            }
            events.push(GameEvent::GameEnded { reason, winner });
        }
        state.outcome = Some(outcome);
    }

    events
}

/// Snapshot track levels at the start of a round, the baseline for futures
pub(crate) fn track_levels(state: &GameState) -> BTreeMap<String, u32> {
    state
        .impact_tracks
        .iter()
        .map(|t| (t.id.clone(), t.level))
        .collect()
}

fn consolidate_impacts(state: &mut GameState) -> Vec<GameEvent> {
    let mut events = Vec::new();

    for p in 0..state.players.len() {
        let storage = std::mem::take(&mut state.players[p].impact_storage);
        let player = state.players[p].id;

        for (track, amount) in storage {
            let Ok(amount) = u32::try_from(amount) else {
                continue;
            };
            if amount == 0 {
                continue;
            }
            // Impact on a track this match does not have is dropped
            let Some(t) = state.impact_tracks.iter_mut().find(|t| t.id == track) else {
                continue;
            };
            t.shift(amount as i32);
            *state.players[p]
                .impact_contributed
                .entry(track.clone())
                .or_insert(0) += amount;

            state.log.push(format!("{} added {} to {}", player, amount, track));
            events.push(GameEvent::ImpactConsolidated {
                player,
                track,
                amount,
            });
        }
    }

    events
}

fn resolve_futures(state: &mut GameState) -> Vec<GameEvent> {
    let steps = state.rules.futures_maturity_steps as i64;
    let payout = state.rules.futures_payout;
    let change: BTreeMap<String, i64> = state
        .impact_tracks
        .iter()
        .map(|t| {
            let start = state.round_start_levels.get(&t.id).copied().unwrap_or(t.level);
            (t.id.clone(), t.level as i64 - start as i64)
        })
        .collect();

    let mut events = Vec::new();
    for p in &mut state.players {
        let mut kept = Vec::new();
        for token in std::mem::take(&mut p.futures_tokens) {
            let moved = change.get(&token.track).copied().unwrap_or(0);
            let (matured, spoiled) = match token.position {
                FuturesPosition::Long => (moved >= steps, moved < 0),
                FuturesPosition::Short => (-moved >= steps, moved > 0),
            };

            if matured {
                p.cred_coin += payout;
                state.log.push(format!(
                    "{}'s {} {} future matured for {}",
                    p.id, token.position, token.track, payout
                ));
                events.push(GameEvent::FuturesMatured {
                    player: p.id,
                    track: token.track,
                    position: token.position,
                    payout,
                });
            } else if spoiled {
                state.log.push(format!(
                    "{}'s {} {} future spoiled",
                    p.id, token.position, token.track
                ));
                events.push(GameEvent::FuturesSpoiled {
                    player: p.id,
                    track: token.track,
                    position: token.position,
                });
            } else {
                kept.push(token);
            }
        }
        p.futures_tokens = kept;
    }

    events
}

fn update_thresholds(state: &mut GameState) -> Vec<GameEvent> {
    let mut events = Vec::new();

    for track in &state.impact_tracks {
        let reached: BTreeSet<&str> = track.reached_thresholds().collect();
        for effect in track.thresholds.values() {
            let active = state.active_threshold_effects.contains(effect);
            let describe = state
                .threshold_effect_descriptions
                .get(effect)
                .unwrap_or(effect);

            if reached.contains(effect.as_str()) && !active {
                state.active_threshold_effects.insert(effect.clone());
                state.log.push(format!("{} threshold reached: {}", track.id, describe));
                events.push(GameEvent::ThresholdActivated {
                    track: track.id.clone(),
                    effect: effect.clone(),
                });
            } else if !reached.contains(effect.as_str()) && active {
                state.active_threshold_effects.remove(effect);
                state.log.push(format!("{} threshold cleared: {}", track.id, describe));
                events.push(GameEvent::ThresholdCleared {
                    track: track.id.clone(),
                    effect: effect.clone(),
                });
            }
        }
    }

    events
}

fn evaporate_water(state: &mut GameState) -> Vec<GameEvent> {
    let mut events = Vec::new();
    for p in &mut state.players {
        let quantity = std::mem::take(&mut p.water);
        if quantity > 0 {
            state.log.push(format!("{}'s {} unsold water evaporated", p.id, quantity));
            events.push(GameEvent::WaterEvaporated {
                player: p.id,
                quantity,
            });
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use crate::actions::{GameEvent, Move};
    use crate::catalog::{load_catalog, Catalog, Metadata, Rules};
    use crate::game::{GameError, GameState};
    use crate::player::FuturesPosition;
    use crate::scoring::EndReason;
    use pretty_assertions::assert_eq;

    fn catalog() -> Catalog {
        let metadata = Metadata::from_toml(
            r#"
[[demand_segments]]
name = "Eco-Elites"
base_demand = 2
base_price = 3

[[impact_tracks]]
id = "GREY"
name = "Carbon Intensity"
max_level = 4
thresholds = [{ level = 3, effect = "CO2_Level_3_Effect" }]

[[impact_tracks]]
id = "PINK"
name = "Microplastics"
max_level = 4

[threshold_effect_descriptions]
CO2_Level_3_Effect = "Energy-heavy actions cost more."
"#,
        )
        .unwrap();

        load_catalog(
            r#"
[[facilities]]
name = "Desalination Plant"
cost = 0
base_output = 5
impact_profile = { GREY = 2, PINK = 0 }
copies = 4

[[distributions]]
name = "Plastic Bottles"
cost = 0
impact_modifier = { track = "PINK", amount = 1, per_cubes = 2 }
copies = 2

[[whims]]
name = "Sustainable Sipping"
trigger_condition = "DEP < 4"
pre_round_effect = "DemandSegment:Eco-Elites:current_price:+1"
post_round_fallout = "PlayerEffect:EcoEliteBuyers:GainReputation:1"
copies = 4

[rules]
draft_every_rounds = 0
uninhabitable_tracks = 2
"#,
        )
        .unwrap()
        .with_metadata(metadata)
    }

    #[test]
    fn test_production_consolidates_onto_tracks() {
        let mut game = GameState::setup(1, &catalog()).unwrap();
        game.apply_move(0, Move::BuildFacility("Desalination Plant".into()))
            .unwrap();

        let events = game
            .apply_move(0, Move::ProduceWater("Desalination Plant".into()))
            .unwrap();

        // Storage was emptied onto the GREY track when round 2 ended
        assert_eq!(game.round, 3);
        assert!(game.players[0].impact_storage.is_empty());
        assert_eq!(game.impact_tracks[0].level, 2);
        assert_eq!(game.players[0].impact_contributed["GREY"], 2);
        assert_eq!(game.players[0].water, 0);
        assert!(events.contains(&GameEvent::ImpactConsolidated {
            player: 0,
            track: "GREY".into(),
            amount: 2
        }));
        assert!(events.contains(&GameEvent::WaterEvaporated {
            player: 0,
            quantity: 5
        }));
    }

    #[test]
    fn test_futures_mature_and_spoil() {
        let mut game = GameState::setup(2, &catalog()).unwrap();
        game.apply_move(0, Move::BuyFuturesToken {
            track: "GREY".into(),
            position: FuturesPosition::Long,
        })
        .unwrap();
        game.apply_move(1, Move::BuyFuturesToken {
            track: "GREY".into(),
            position: FuturesPosition::Short,
        })
        .unwrap();
        // Round 1 moved nothing, both tokens are still open
        assert_eq!(game.players[0].futures_tokens.len(), 1);
        assert_eq!(game.players[1].futures_tokens.len(), 1);

        game.players[0].store_impact("GREY", 2);
        game.end_turn(0).unwrap();
        game.end_turn(1).unwrap();

        assert_eq!(game.players[0].cred_coin, 3 + 5);
        assert_eq!(game.players[1].cred_coin, 3);
        assert!(game.players.iter().all(|p| p.futures_tokens.is_empty()));
        assert!(game.log.contains(&"0's long GREY future matured for 5".to_string()));
        assert!(game.log.contains(&"1's short GREY future spoiled".to_string()));
    }

    #[test]
    fn test_threshold_switches_on_and_off() {
        let mut game = GameState::setup(1, &catalog()).unwrap();
        game.players[0].store_impact("GREY", 3);
        game.end_turn(0).unwrap();

        assert!(game.active_threshold_effects.contains("CO2_Level_3_Effect"));
        assert!(game
            .log
            .contains(&"GREY threshold reached: Energy-heavy actions cost more.".to_string()));

        game.impact_tracks[0].shift(-1);
        let events = game.end_turn(0).unwrap();
        assert!(game.active_threshold_effects.is_empty());
        assert!(events.contains(&GameEvent::ThresholdCleared {
            track: "GREY".into(),
            effect: "CO2_Level_3_Effect".into()
        }));
    }

    #[test]
    fn test_whim_effects_and_demand_reset() {
        let mut game = GameState::setup(1, &catalog()).unwrap();
        game.apply_move(0, Move::BuildFacility("Desalination Plant".into()))
            .unwrap();
        game.apply_move(0, Move::BuildDistribution("Plastic Bottles".into()))
            .unwrap();

        game.start_draft(1).unwrap();
        game.submit_choice(0, 0).unwrap();
        // Pre-round effect raised the Eco-Elites price
        assert_eq!(game.demand_segments[0].current_price, 4);
        assert_eq!(game.pending_fallout.len(), 1);

        game.apply_move(0, Move::ProduceWater("Desalination Plant".into()))
            .unwrap();
        assert_eq!(game.round, 4);
        // Price is back to base and the fallout found no Eco-Elites buyer
        assert_eq!(game.demand_segments[0].current_price, 3);
        assert!(game.pending_fallout.is_empty());
        assert_eq!(game.players[0].reputation, 0);
        assert!(game
            .log
            .contains(&"Sustainable Sipping: Eco-Elites current_price +1".to_string()));
    }

    #[test]
    fn test_fallout_rewards_eco_elite_buyers() {
        let catalog = catalog().with_rules(Rules {
            draft_every_rounds: 0,
            ..Rules::default()
        });
        let mut game = GameState::setup(2, &catalog).unwrap();
        game.apply_move(0, Move::BuildDistribution("Plastic Bottles".into()))
            .unwrap();
        game.apply_move(1, Move::EndTurn).unwrap();

        game.start_draft(1).unwrap();
        game.submit_choice(0, 0).unwrap();
        game.submit_choice(1, 0).unwrap();
        assert_eq!(game.demand_segments[0].current_price, 5);

        game.players[0].water = 3;
        let events = game
            .apply_move(
                0,
                Move::SellWater {
                    segment: "Eco-Elites".into(),
                    route: "Plastic Bottles".into(),
                    quantity: 2,
                },
            )
            .unwrap();
        assert!(events.contains(&GameEvent::WaterSold {
            player: 0,
            segment: "Eco-Elites".into(),
            quantity: 2,
            revenue: 10
        }));
        assert_eq!(game.players[0].impact_storage["PINK"], 1);

        game.apply_move(1, Move::EndTurn).unwrap();

        // Both drafted whims reward the single Eco-Elites buyer
        assert_eq!(game.players[0].reputation, 2);
        assert_eq!(game.players[1].reputation, 0);
        assert_eq!(game.impact_tracks[1].level, 1);
        assert_eq!(game.players[0].water, 0);
    }

    #[test]
    fn test_uninhabitable_planet_ends_match() {
        let mut game = GameState::setup(2, &catalog()).unwrap();
        game.impact_tracks[0].shift(4);
        game.players[1].store_impact("PINK", 9);
        game.players[1].cred_coin = 8;

        game.end_turn(0).unwrap();
        let events = game.end_turn(1).unwrap();

        assert!(events.contains(&GameEvent::GameEnded {
            reason: EndReason::Uninhabitable,
            winner: 1
        }));
        let outcome = game.outcome.as_ref().unwrap();
        assert_eq!(outcome.winner(), Some(1));
        // No new round once the match is over
        assert_eq!(game.round, 1);
        assert_eq!(game.end_turn(0), Err(GameError::GameOver));
        assert_eq!(game.start_draft(1), Err(GameError::GameOver));
    }
}
