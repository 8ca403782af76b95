//! Live processing of a single period.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    database::{
        db_structs::{AbsentPlayer, PlayerGame, RatedGroup, RatingHistoryEntry, RatingUpdate},
        RatingStore
    },
    error::ProcessorError,
    model::{
        constants::MIN_PLAYERS_FOR_RATING,
        elo::{average_effective_score, compute_absentee_deltas, compute_group_deltas},
        structures::{rating_adjustment_type::RatingAdjustmentType, score::Score}
    }
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodOutcome {
    /// False when the period was already rated or had too few participants
    pub calculated: bool,
    pub participants: usize,
    pub absentees: usize
}

impl PeriodOutcome {
    fn skipped(participants: usize) -> PeriodOutcome {
        PeriodOutcome {
            calculated: false,
            participants,
            absentees: 0
        }
    }
}

/// Rates the participants of a period. Shared by live processing and replay.
pub fn rate_participants(
    population_id: i32,
    period_id: i32,
    participants: &[PlayerGame]
) -> Result<RatedGroup, ProcessorError> {
    let updates = compute_group_deltas(participants)?;
    let average_score = average_effective_score(participants);

    let history = updates
        .iter()
        .zip(participants)
        .map(|(update, game)| {
            history_entry(
                population_id,
                period_id,
                update,
                Some(game.score),
                average_score,
                participants.len(),
                RatingAdjustmentType::Participation
            )
        })
        .collect();

    Ok(RatedGroup { updates, history })
}

/// Penalises the absentees of a period. `participants` must carry the
/// ratings from before the period was applied.
pub fn rate_absentees(
    population_id: i32,
    period_id: i32,
    participants: &[PlayerGame],
    absentees: &[AbsentPlayer]
) -> Result<RatedGroup, ProcessorError> {
    let updates = compute_absentee_deltas(participants, absentees)?;
    let average_score = average_effective_score(participants);

    let history = updates
        .iter()
        .map(|update| {
            history_entry(
                population_id,
                period_id,
                update,
                None,
                average_score,
                participants.len(),
                RatingAdjustmentType::Absence
            )
        })
        .collect();

    Ok(RatedGroup { updates, history })
}

fn history_entry(
    population_id: i32,
    period_id: i32,
    update: &RatingUpdate,
    score: Option<Score>,
    average_score: f64,
    participants: usize,
    adjustment_type: RatingAdjustmentType
) -> RatingHistoryEntry {
    RatingHistoryEntry {
        population_id,
        player_id: update.player_id,
        period_id,
        old_rating: update.old_rating,
        new_rating: update.new_rating,
        change: update.change,
        score,
        average_score,
        participants: participants as i32,
        adjustment_type
    }
}

/// Rates one period of one population.
///
/// A period that already has history is skipped, which makes this safe to
/// call repeatedly. Periods with fewer than two participants are skipped
/// without writing anything. `as_of` is the instant the period is considered
/// played at; it drives the activity window for absentees.
///
/// Absentees are read before anything is written. A player with a result in
/// this period is never an absentee, so the participant writes cannot change
/// who is absent. Both sides are then persisted in one atomic write.
pub async fn process_period<S: RatingStore>(
    store: &S,
    population_id: i32,
    period_id: i32,
    as_of: DateTime<Utc>
) -> Result<PeriodOutcome, ProcessorError> {
    if store.has_history(population_id, period_id).await? {
        debug!(population_id, period_id, "Period already rated, skipping");
        return Ok(PeriodOutcome::skipped(0));
    }

    let participants = store.fetch_participants(population_id, period_id).await?;
    if participants.len() < MIN_PLAYERS_FOR_RATING {
        debug!(
            population_id,
            period_id,
            participants = participants.len(),
            "Not enough participants to rate period"
        );
        return Ok(PeriodOutcome::skipped(participants.len()));
    }

    let absentees = store
        .fetch_active_absentees(population_id, period_id, as_of)
        .await?;

    let rated = rate_participants(population_id, period_id, &participants)?;
    let penalised = rate_absentees(population_id, period_id, &participants, &absentees)?;
    store.persist_period(population_id, &rated, &penalised, as_of).await?;

    info!(
        population_id,
        period_id,
        participants = participants.len(),
        absentees = absentees.len(),
        "Rated period"
    );

    Ok(PeriodOutcome {
        calculated: true,
        participants: participants.len(),
        absentees: absentees.len()
    })
}
