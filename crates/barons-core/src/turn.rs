//! Turn and round progression.

use crate::actions::GameEvent;
use crate::catalog::Rules;
use crate::game::GameState;
use crate::player::PlayerId;
use crate::round_end;
use tracing::{debug, info};

/// Whether the acting player's turn is over after a move.
///
/// The base ruleset allows one move per turn, so this always holds. Richer
/// multi-action turns would decide here.
pub fn end_turn_if(_state: &GameState) -> bool {
    true
}

/// Whether a whim draft is scheduled at the start of `round`
pub fn draft_due(rules: &Rules, round: u32) -> bool {
    rules.draft_every_rounds > 0 && round.saturating_sub(1) % rules.draft_every_rounds == 0
}

/// Pass the turn to the next seat. When play wraps back to seat 0 the round
/// is cleaned up, and unless that ended the match a new round starts (with a
/// whim draft when one is due).
pub(crate) fn advance_turn(state: &mut GameState) -> Vec<GameEvent> {
    let player = state.current_player;
    let next_player = ((player as usize + 1) % state.player_count()) as PlayerId;
    state.current_player = next_player;
    debug!(player, next_player, "turn ended");

    let mut events = vec![GameEvent::TurnEnded {
        player,
        next_player,
    }];

    if next_player == 0 {
        events.extend(round_end::end_round(state));
        if state.is_over() {
            return events;
        }

        state.round += 1;
        state.round_start_levels = round_end::track_levels(state);
        info!(round = state.round, "round started");
        state.log.push(format!("Round {} begins", state.round));
        events.push(GameEvent::RoundStarted { round: state.round });

        if draft_due(&state.rules, state.round) {
            events.extend(state.start_scheduled_draft());
        }
    }

    events
}
