//! Pairwise, group-relative ELO.
//!
//! Every participant of a period is compared head-to-head with every other
//! participant. Scores are golf-style: the lower effective score wins the
//! pairing. All functions here are pure.

use std::collections::HashSet;

use crate::{
    database::db_structs::{AbsentPlayer, PlayerGame, RatingUpdate},
    error::ProcessorError,
    model::{
        constants::{
            ABSENT_RATING_FLOOR, DAILY_WINNER_BONUS, ELO_SCALE, ESTABLISHING_GAMES, EXPECTED_SCORE_MAX,
            EXPECTED_SCORE_MIN, FAIL_PENALTY, K_FACTOR_ESTABLISHED, K_FACTOR_ESTABLISHING, K_FACTOR_PROVISIONAL,
            MIN_PLAYERS_FOR_RATING, PROVISIONAL_GAMES
        },
        structures::score::Score
    }
};

/// Sensitivity multiplier for a player with `games_played` rated games
pub fn k_factor(games_played: i32) -> i32 {
    if games_played <= PROVISIONAL_GAMES {
        return K_FACTOR_PROVISIONAL;
    }
    if games_played <= ESTABLISHING_GAMES {
        return K_FACTOR_ESTABLISHING;
    }

    K_FACTOR_ESTABLISHED
}

/// Logistic expectation of `rating` beating `opponent_rating`, clamped to
/// `[EXPECTED_SCORE_MIN, EXPECTED_SCORE_MAX]`
pub fn expected_outcome(rating: i32, opponent_rating: i32) -> f64 {
    let exponent = (opponent_rating - rating) as f64 / ELO_SCALE;
    let raw = 1.0 / (1.0 + 10f64.powf(exponent));

    raw.clamp(EXPECTED_SCORE_MIN, EXPECTED_SCORE_MAX)
}

/// 1.0 for a win, 0.5 for a tie, 0.0 for a loss
pub fn actual_outcome(score: Score, opponent_score: Score) -> f64 {
    let (own, other) = (score.effective(), opponent_score.effective());

    match own.cmp(&other) {
        std::cmp::Ordering::Less => 1.0,
        std::cmp::Ordering::Equal => 0.5,
        std::cmp::Ordering::Greater => 0.0
    }
}

/// Rounds half-way values towards positive infinity, so `-2.5` becomes `-2`
pub fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

/// Mean effective score of a period's participants. 0.0 when empty.
pub fn average_effective_score(participants: &[PlayerGame]) -> f64 {
    if participants.is_empty() {
        return 0.0;
    }

    participants.iter().map(|p| p.score.effective() as f64).sum::<f64>() / participants.len() as f64
}

/// Rating changes for everyone who played a period.
///
/// A sole participant has nobody to be compared against and only receives
/// the winner bonus (less the fail penalty). With two or more, each player's
/// change is `round(K * (avg_actual - avg_expected))`, forced to at least one
/// point in the direction of a clear over- or under-performance, then
/// adjusted by the fail penalty and the winner bonus. All players sharing the
/// best raw score receive the bonus.
pub fn compute_group_deltas(participants: &[PlayerGame]) -> Result<Vec<RatingUpdate>, ProcessorError> {
    validate_participants(participants)?;

    let Some(best_score) = participants.iter().map(|p| p.score).min() else {
        return Ok(Vec::new());
    };

    if let [solo] = participants {
        let mut change = DAILY_WINNER_BONUS;
        if solo.score.is_fail() {
            change -= FAIL_PENALTY;
        }

        return Ok(vec![RatingUpdate::new(solo.player_id, solo.rating, change)]);
    }

    let n_opponents = (participants.len() - 1) as f64;
    let mut updates = Vec::with_capacity(participants.len());

    for player in participants {
        let (total_expected, total_actual) = participants
            .iter()
            .filter(|o| o.player_id != player.player_id)
            .fold((0.0, 0.0), |(expected, actual), opponent| {
                (
                    expected + expected_outcome(player.rating, opponent.rating),
                    actual + actual_outcome(player.score, opponent.score)
                )
            });

        let avg_expected = total_expected / n_opponents;
        let avg_actual = total_actual / n_opponents;

        let mut change = round_half_up(k_factor(player.games_played) as f64 * (avg_actual - avg_expected));

        // A clear win or loss always moves the rating
        if avg_actual > avg_expected && change < 1 {
            change = 1;
        }
        if avg_actual < avg_expected && change > -1 {
            change = -1;
        }

        if player.score.is_fail() {
            change -= FAIL_PENALTY;
        }
        if player.score == best_score {
            change += DAILY_WINNER_BONUS;
        }

        updates.push(RatingUpdate::new(player.player_id, player.rating, change));
    }

    Ok(updates)
}

/// Penalties for recently active players who skipped the period. Each absentee
/// is treated as having lost to every participant; the per-pairing changes are
/// summed, not averaged, so the penalty grows with the size of the field.
///
/// The new rating is `max(ABSENT_RATING_FLOOR, old + change)`, so an absentee
/// who already sits below the floor is lifted onto it. Returns nothing when
/// fewer than [`MIN_PLAYERS_FOR_RATING`] players took part.
pub fn compute_absentee_deltas(
    participants: &[PlayerGame],
    absentees: &[AbsentPlayer]
) -> Result<Vec<RatingUpdate>, ProcessorError> {
    validate_participants(participants)?;

    if participants.len() < MIN_PLAYERS_FOR_RATING {
        return Ok(Vec::new());
    }

    let mut updates = Vec::with_capacity(absentees.len());
    for absent in absentees {
        if absent.rating < 0 {
            return Err(ProcessorError::InvalidRating {
                player_id: absent.player_id,
                rating: absent.rating
            });
        }

        let k = k_factor(absent.games_played) as f64;
        let total: f64 = participants
            .iter()
            .map(|p| k * (0.0 - expected_outcome(absent.rating, p.rating)))
            .sum();

        let change = round_half_up(total).min(-1);
        let new_rating = (absent.rating + change).max(ABSENT_RATING_FLOOR);

        updates.push(RatingUpdate {
            player_id: absent.player_id,
            old_rating: absent.rating,
            new_rating,
            change: new_rating - absent.rating
        });
    }

    Ok(updates)
}

fn validate_participants(participants: &[PlayerGame]) -> Result<(), ProcessorError> {
    let mut seen = HashSet::with_capacity(participants.len());

    for p in participants {
        if p.rating < 0 {
            return Err(ProcessorError::InvalidRating {
                player_id: p.player_id,
                rating: p.rating
            });
        }
        if !seen.insert(p.player_id) {
            return Err(ProcessorError::DuplicateParticipant { player_id: p.player_id });
        }
    }

    Ok(())
}
