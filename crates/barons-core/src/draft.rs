//! Whim draft between rounds.
//!
//! Each drafter is dealt a private option set from the whim deck, then the
//! drafters submit one choice each, strictly in queue order. When the last
//! drafter of a pick has submitted, the pick resolves: chosen cards go to
//! their owners, unchosen cards go to the whim discard pile, and either the
//! next pick is dealt (queue reversed) or the draft ends. A drafted whim's
//! pre-round effect applies as it lands; its fallout waits for round end.
//!
//! Stages: idle (`draft_state == None`), dealing and resolving (inside a
//! single call, never observable), awaiting choices (`draft_state == Some`).
//!
//! The engine never waits. A caller that wants liveness arms a timer per
//! [`DraftTicket`] and calls [`GameState::auto_pick`] when it fires.

use crate::actions::GameEvent;
use crate::cards::CardInstance;
use crate::game::{GameError, GameState};
use crate::player::PlayerId;
use crate::round_end::PendingFallout;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Bookkeeping for a running whim draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftState {
    /// 1-based pick within this draft
    pub pick_number: u32,
    pub total_picks: u32,
    pub options_per_player: usize,
    pub drafter_queue: Vec<PlayerId>,
    /// Index into `drafter_queue` of the player expected to submit next
    pub position: usize,
    /// Private option sets, never broadcast
    pub options_by_player: BTreeMap<PlayerId, Vec<CardInstance>>,
    /// `Some(index)` once submitted; `None` for a pass
    pub pending_choices: BTreeMap<PlayerId, Option<usize>>,
}

/// Identifies one outstanding submission slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftTicket {
    pub round: u32,
    pub pick_number: u32,
    pub position: usize,
}

impl DraftState {
    pub fn current_drafter(&self) -> Option<PlayerId> {
        self.drafter_queue.get(self.position).copied()
    }

    pub fn options_for(&self, player: PlayerId) -> Option<&[CardInstance]> {
        self.options_by_player.get(&player).map(Vec::as_slice)
    }

    /// Drafters who already submitted for the current pick, in queue order
    pub fn submitted(&self) -> Vec<PlayerId> {
        self.drafter_queue[..self.position.min(self.drafter_queue.len())].to_vec()
    }
}

impl GameState {
    /// Start a whim draft, dealing `options_per_player` whims to each player.
    ///
    /// Rejects without touching the deck if it cannot cover every pick of
    /// the draft.
    pub fn start_draft(&mut self, options_per_player: usize) -> Result<Vec<GameEvent>, GameError> {
        if self.is_over() {
            return Err(GameError::GameOver);
        }
        if self.is_drafting() {
            return Err(GameError::DraftInProgress);
        }
        if options_per_player == 0 {
            return Err(GameError::InvalidDraftSize);
        }

        let total_picks = self.rules.draft_picks.max(1);
        let needed = self
            .player_count()
            .checked_mul(options_per_player)
            .and_then(|n| n.checked_mul(total_picks as usize))
            .ok_or(GameError::InvalidDraftSize)?;
        let available = self.decks.whims.len();
        if available < needed {
            return Err(GameError::InsufficientCards { needed, available });
        }

        let queue: Vec<PlayerId> = self.players.iter().map(|p| p.id).collect();
        debug!(round = self.round, options_per_player, total_picks, "whim draft started");
        Ok(vec![self.deal_pick(1, total_picks, options_per_player, queue)])
    }

    /// Submit `player`'s choice for the current pick
    pub fn submit_choice(
        &mut self,
        player: PlayerId,
        chosen_index: usize,
    ) -> Result<Vec<GameEvent>, GameError> {
        let draft = self.draft_state.as_ref().ok_or(GameError::NoDraftInProgress)?;
        if self.get_player(player).is_none() {
            return Err(GameError::UnknownPlayer(player));
        }
        if draft.current_drafter() != Some(player) {
            return Err(GameError::NotYourTurn);
        }
        let options = draft.options_for(player).map_or(0, |o| o.len());
        if chosen_index >= options {
            return Err(GameError::InvalidChoice {
                index: chosen_index,
                options,
            });
        }

        Ok(self.record_choice(player, Some(chosen_index)))
    }

    /// Resolve the current drafter's slot with their first option (or a
    /// pass when nothing was dealt to them).
    pub fn auto_pick(&mut self) -> Result<Vec<GameEvent>, GameError> {
        let draft = self.draft_state.as_ref().ok_or(GameError::NoDraftInProgress)?;
        let Some(player) = draft.current_drafter() else {
            return Err(GameError::NoDraftInProgress);
        };
        let choice = draft
            .options_for(player)
            .filter(|options| !options.is_empty())
            .map(|_| 0);

        warn!(player, round = self.round, "draft pick timed out");
        self.log.push(format!("{} timed out; auto-picked", player));

        let mut events = vec![GameEvent::PickAutoResolved { player }];
        events.extend(self.record_choice(player, choice));
        Ok(events)
    }

    /// Ticket for the outstanding submission, if a draft is running
    pub fn draft_ticket(&self) -> Option<DraftTicket> {
        self.draft_state.as_ref().map(|d| DraftTicket {
            round: self.round,
            pick_number: d.pick_number,
            position: d.position,
        })
    }

    /// Options dealt to `player` for the current pick
    pub fn draft_options(&self, player: PlayerId) -> Option<&[CardInstance]> {
        self.draft_state.as_ref()?.options_for(player)
    }

    /// Start the draft scheduled by the turn controller. A deck too small to
    /// cover it skips the draft instead of failing the turn.
    pub(crate) fn start_scheduled_draft(&mut self) -> Vec<GameEvent> {
        match self.start_draft(self.rules.whim_options_per_player) {
            Ok(events) => events,
            Err(GameError::InsufficientCards { needed, available }) => {
                debug!(needed, available, "whim draft skipped");
                self.log.push(format!(
                    "Whim draft skipped: need {} cards, {} left",
                    needed, available
                ));
                vec![GameEvent::DraftSkipped { needed, available }]
            }
            Err(e) => {
                warn!(error = %e, "scheduled whim draft not started");
                Vec::new()
            }
        }
    }

    // ==================== Helper Methods ====================

    /// Deal one pick to every drafter in `queue`. The caller has checked that
    /// the whim deck covers it.
    fn deal_pick(
        &mut self,
        pick_number: u32,
        total_picks: u32,
        options_per_player: usize,
        queue: Vec<PlayerId>,
    ) -> GameEvent {
        let mut options_by_player = BTreeMap::new();
        let mut pending_choices = BTreeMap::new();
        for &player in &queue {
            options_by_player.insert(player, self.decks.whims.draw(options_per_player));
            pending_choices.insert(player, None);
        }

        self.draft_state = Some(DraftState {
            pick_number,
            total_picks,
            options_per_player,
            drafter_queue: queue.clone(),
            position: 0,
            options_by_player,
            pending_choices,
        });

        GameEvent::DraftPickDealt {
            pick_number,
            drafter_queue: queue,
        }
    }

    /// Record a validated choice and advance the queue, resolving the pick
    /// once every drafter has submitted.
    fn record_choice(&mut self, player: PlayerId, choice: Option<usize>) -> Vec<GameEvent> {
        let mut events = Vec::new();

        let pick_complete = match self.draft_state.as_mut() {
            Some(draft) => {
                draft.pending_choices.insert(player, choice);
                draft.position += 1;
                events.push(GameEvent::ChoiceSubmitted {
                    player,
                    pick_number: draft.pick_number,
                });
                draft.position >= draft.drafter_queue.len()
            }
            None => return events,
        };

        if pick_complete {
            events.extend(self.resolve_pick());
        }
        events
    }

    fn resolve_pick(&mut self) -> Vec<GameEvent> {
        let Some(mut draft) = self.draft_state.take() else {
            return Vec::new();
        };
        let mut events = Vec::new();

        for &player in &draft.drafter_queue {
            let mut options = draft.options_by_player.remove(&player).unwrap_or_default();
            let choice = draft.pending_choices.get(&player).copied().flatten();

            if let Some(index) = choice.filter(|&i| i < options.len()) {
                let card = options.remove(index);
                let name = card.name().to_string();
                let effects = match &card {
                    CardInstance::Whim(w) => {
                        Some((w.pre_round_effect.clone(), w.post_round_fallout.clone()))
                    }
                    _ => None,
                };
                if let Some(p) = self.players.get_mut(player as usize) {
                    p.receive(card);
                }
                self.log.push(format!("{} drafted {}", player, name));
                events.push(GameEvent::WhimDrafted {
                    player,
                    name: name.clone(),
                });

                if let Some((pre_round, fallout)) = effects {
                    events.extend(self.resolve_whim_effect(&name, player, &pre_round));
                    self.pending_fallout.push(PendingFallout {
                        drafter: player,
                        whim: name,
                        effect: fallout,
                    });
                }
            }

            self.whim_discard.extend(options);
        }

        debug!(pick = draft.pick_number, total = draft.total_picks, "draft pick resolved");

        if draft.pick_number < draft.total_picks {
            // Snake order for the next pick
            let mut queue = draft.drafter_queue;
            queue.reverse();
            events.push(self.deal_pick(
                draft.pick_number + 1,
                draft.total_picks,
                draft.options_per_player,
                queue,
            ));
        } else {
            events.push(GameEvent::DraftResolved {
                picks: draft.total_picks,
            });
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{load_catalog, Catalog, Rules};
    use pretty_assertions::assert_eq;

    fn catalog(whim_copies: u32) -> Catalog {
        load_catalog(&format!(
            r#"
[[whims]]
name = "Glitterwave Fashion"
trigger_condition = "μP < 5"
pre_round_effect = "DemandSegment:Connoisseurs:current_demand:+2"
post_round_fallout = "GlobalImpact:PINK:+2"
copies = {whim_copies}

[rules]
draft_every_rounds = 0
"#
        ))
        .unwrap()
    }

    #[test]
    fn test_start_draft_deals_private_sets() {
        let mut game = GameState::setup(2, &catalog(6)).unwrap();

        game.start_draft(3).unwrap();

        assert!(game.decks.whims.is_empty());
        assert_eq!(game.draft_options(0).map(|o| o.len()), Some(3));
        assert_eq!(game.draft_options(1).map(|o| o.len()), Some(3));
        let draft = game.draft_state.as_ref().unwrap();
        assert_eq!(draft.current_drafter(), Some(0));
        assert_eq!(draft.pick_number, 1);
    }

    #[test]
    fn test_start_draft_insufficient_cards() {
        let mut game = GameState::setup(2, &catalog(5)).unwrap();
        let before = game.clone();

        assert_eq!(
            game.start_draft(3),
            Err(GameError::InsufficientCards {
                needed: 6,
                available: 5
            })
        );
        assert_eq!(game, before);
    }

    #[test]
    fn test_start_draft_twice_rejected() {
        let mut game = GameState::setup(1, &catalog(6)).unwrap();
        game.start_draft(2).unwrap();
        assert_eq!(game.start_draft(2), Err(GameError::DraftInProgress));
    }

    #[test]
    fn test_empty_option_sets_rejected() {
        let mut game = GameState::setup(1, &catalog(6)).unwrap();
        assert_eq!(game.start_draft(0), Err(GameError::InvalidDraftSize));
    }

    #[test]
    fn test_oversized_draft_rejected() {
        let mut game = GameState::setup(2, &catalog(6)).unwrap();
        let before = game.clone();

        assert_eq!(game.start_draft(usize::MAX), Err(GameError::InvalidDraftSize));
        assert_eq!(game.start_draft(usize::MAX / 2 + 1), Err(GameError::InvalidDraftSize));
        assert_eq!(game, before);
    }

    #[test]
    fn test_submit_out_of_order_rejected() {
        let mut game = GameState::setup(2, &catalog(6)).unwrap();
        game.start_draft(3).unwrap();
        let before = game.clone();

        assert_eq!(game.submit_choice(1, 0), Err(GameError::NotYourTurn));
        assert_eq!(game.submit_choice(1, 99), Err(GameError::NotYourTurn));
        assert_eq!(game, before);
    }

    #[test]
    fn test_submit_invalid_index() {
        let mut game = GameState::setup(2, &catalog(6)).unwrap();
        game.start_draft(3).unwrap();
        let before = game.clone();

        assert_eq!(
            game.submit_choice(0, 3),
            Err(GameError::InvalidChoice {
                index: 3,
                options: 3
            })
        );
        assert_eq!(game, before);
    }

    #[test]
    fn test_submit_without_draft() {
        let mut game = GameState::setup(2, &catalog(6)).unwrap();
        assert_eq!(game.submit_choice(0, 0), Err(GameError::NoDraftInProgress));
        assert_eq!(game.auto_pick(), Err(GameError::NoDraftInProgress));
    }

    #[test]
    fn test_full_draft_resolves() {
        let mut game = GameState::setup(2, &catalog(6)).unwrap();
        game.start_draft(3).unwrap();

        game.submit_choice(0, 1).unwrap();
        // Nothing moves until the pick resolves
        assert!(game.players[0].event_options.is_empty());
        assert_eq!(game.draft_state.as_ref().unwrap().submitted(), vec![0]);

        let events = game.submit_choice(1, 2).unwrap();

        assert!(game.draft_state.is_none());
        assert_eq!(game.players[0].event_options.len(), 1);
        assert_eq!(game.players[1].event_options.len(), 1);
        assert_eq!(game.whim_discard.len(), 4);
        assert_eq!(
            game.log,
            vec![
                "0 drafted Glitterwave Fashion".to_string(),
                "1 drafted Glitterwave Fashion".to_string(),
            ]
        );
        assert!(events.contains(&GameEvent::DraftResolved { picks: 1 }));
    }

    #[test]
    fn test_snake_order_for_second_pick() {
        let catalog = catalog(8).with_rules(Rules {
            draft_picks: 2,
            draft_every_rounds: 0,
            ..Rules::default()
        });
        let mut game = GameState::setup(2, &catalog).unwrap();

        game.start_draft(2).unwrap();
        assert_eq!(game.decks.whims.len(), 4);

        game.submit_choice(0, 0).unwrap();
        game.submit_choice(1, 0).unwrap();

        let draft = game.draft_state.as_ref().unwrap();
        assert_eq!(draft.pick_number, 2);
        assert_eq!(draft.drafter_queue, vec![1, 0]);
        assert_eq!(draft.current_drafter(), Some(1));
        assert!(game.decks.whims.is_empty());

        game.submit_choice(1, 1).unwrap();
        game.submit_choice(0, 1).unwrap();

        assert!(game.draft_state.is_none());
        assert_eq!(game.players[0].event_options.len(), 2);
        assert_eq!(game.players[1].event_options.len(), 2);
    }

    #[test]
    fn test_auto_pick_takes_first_option() {
        let mut game = GameState::setup(2, &catalog(6)).unwrap();
        game.start_draft(3).unwrap();
        let ticket = game.draft_ticket().unwrap();

        let events = game.auto_pick().unwrap();

        assert!(events.contains(&GameEvent::PickAutoResolved { player: 0 }));
        assert_ne!(game.draft_ticket(), Some(ticket));
        assert_eq!(game.draft_state.as_ref().unwrap().pending_choices[&0], Some(0));
        assert_eq!(game.log, vec!["0 timed out; auto-picked".to_string()]);
    }

    #[test]
    fn test_moves_blocked_during_draft() {
        let mut game = GameState::setup(2, &catalog(6)).unwrap();
        game.start_draft(3).unwrap();

        assert_eq!(game.end_turn(0), Err(GameError::DraftInProgress));
    }
}
