//! End of match and final scoring.
//!
//! Score is CredCoin plus reputation plus a diversity bonus for building
//! enough differently named routes. Ties go to the player who pushed less
//! impact onto the tracks over the match, then to the lower seat.

use crate::game::GameState;
use crate::player::PlayerId;
use serde::{Deserialize, Serialize};

/// Why the match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Enough impact tracks reached their maximum
    Uninhabitable,
    /// The configured last round was played
    RoundLimit,
}

/// One player's final score breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScore {
    pub player: PlayerId,
    pub cred_coin: u32,
    pub reputation: i32,
    pub diversity_bonus: u32,
    pub total: i64,
    /// Tie-breaker: lower is better
    pub impact_contributed: u32,
}

/// Result of a finished match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOutcome {
    pub reason: EndReason,
    /// Best first
    pub standings: Vec<FinalScore>,
}

impl GameOutcome {
    pub fn winner(&self) -> Option<PlayerId> {
        self.standings.first().map(|s| s.player)
    }
}

impl GameState {
    /// Why the match should end now, checked after round-end cleanup
    pub(crate) fn end_condition(&self) -> Option<EndReason> {
        let maxed = self.impact_tracks.iter().filter(|t| t.is_maxed()).count();
        if self.rules.uninhabitable_tracks > 0 && maxed >= self.rules.uninhabitable_tracks {
            return Some(EndReason::Uninhabitable);
        }
        if self.rules.max_rounds > 0 && self.round >= self.rules.max_rounds {
            return Some(EndReason::RoundLimit);
        }
        None
    }

    /// Score every player and rank them
    pub fn final_standings(&self) -> Vec<FinalScore> {
        let mut standings: Vec<FinalScore> = self
            .players
            .iter()
            .map(|p| {
                let diversity_bonus = if p.distinct_routes() >= self.rules.diversity_routes {
                    self.rules.diversity_bonus
                } else {
                    0
                };
                FinalScore {
                    player: p.id,
                    cred_coin: p.cred_coin,
                    reputation: p.reputation,
                    diversity_bonus,
                    total: p.cred_coin as i64 + p.reputation as i64 + diversity_bonus as i64,
                    impact_contributed: p.total_impact_contributed(),
                }
            })
            .collect();

        standings.sort_by(|a, b| {
            b.total
                .cmp(&a.total)
                .then(a.impact_contributed.cmp(&b.impact_contributed))
                .then(a.player.cmp(&b.player))
        });
        standings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{CardInstance, DistributionCard};
    use crate::catalog::{load_catalog, Rules};
    use pretty_assertions::assert_eq;

    fn route(name: &str) -> CardInstance {
        CardInstance::Distribution(DistributionCard {
            name: name.to_string(),
            cost: 1,
            description: String::new(),
            special_effect: None,
            impact_modifier: None,
        })
    }

    #[test]
    fn test_standings_and_tie_break() {
        let mut game = GameState::setup(3, &load_catalog("").unwrap()).unwrap();
        game.players[0].cred_coin = 9;
        game.players[0].impact_contributed.insert("GREY".into(), 4);
        game.players[1].cred_coin = 7;
        game.players[1].reputation = 2;
        game.players[1].impact_contributed.insert("PINK".into(), 1);
        game.players[2].cred_coin = 3;
        for name in ["Plastic Bottles", "Drone Drops", "Tap Water Pipeline", "Drone Drops"] {
            game.players[2].receive(route(name));
        }

        let standings = game.final_standings();

        // Seat 1 ties seat 0 on 9 but spilled less impact
        assert_eq!(
            standings.iter().map(|s| (s.player, s.total)).collect::<Vec<_>>(),
            vec![(1, 9), (0, 9), (2, 6)]
        );
        assert_eq!(standings[2].diversity_bonus, 3);
    }

    #[test]
    fn test_end_conditions() {
        let catalog = load_catalog("").unwrap().with_rules(Rules {
            max_rounds: 4,
            ..Rules::default()
        });
        let mut game = GameState::setup(1, &catalog).unwrap();

        assert_eq!(game.end_condition(), None);
        game.round = 4;
        assert_eq!(game.end_condition(), Some(EndReason::RoundLimit));
    }
}
