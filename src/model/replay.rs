//! Full recalculation of a population from its stored results.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use tracing::{debug, info, info_span, Instrument, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::{
    database::{db_structs::GameResult, RatingStore},
    error::ProcessorError,
    model::{
        constants::MIN_PLAYERS_FOR_RATING,
        processor::{rate_absentees, rate_participants},
        rating_tracker::RatingTracker,
        structures::{period_calendar::PeriodCalendar, rating_adjustment_type::RatingAdjustmentType}
    },
    utils::progress_utils::attach_progress_bar
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub population_id: i32,
    /// Periods that had enough participants to be rated
    pub periods_processed: usize,
    pub players_affected: BTreeSet<i32>
}

/// Rebuilds every rating in a population from scratch.
///
/// The period list is checked first; an out-of-order list fails before
/// anything is touched. Ratings are then reset to their defaults and the
/// ledger is cleared, and each period is rated in ascending order with `as_of` set to the start of the
/// period. Results are read once; the running state lives in a
/// [`RatingTracker`]. The persisted outcome matches calling
/// [`crate::model::processor::process_period`] for each period in order with
/// the same `as_of` values.
///
/// Decay is not part of a replay.
pub async fn replay_population<S: RatingStore>(
    store: &S,
    population_id: i32,
    calendar: &PeriodCalendar
) -> Result<ReplaySummary, ProcessorError> {
    let periods = store.list_periods_chronological(population_id).await?;
    validate_order(&periods)?;

    store.reset_population_ratings(population_id).await?;
    store.clear_history(population_id).await?;

    let by_period = group_by_period(store.fetch_results(population_id).await?);

    let span = info_span!("replay", population_id);
    attach_progress_bar(&span, periods.len() as u64, format!("Replaying population {population_id}"));

    let summary = replay_periods(store, population_id, calendar, &periods, &by_period)
        .instrument(span)
        .await?;

    info!(
        population_id,
        periods = summary.periods_processed,
        players = summary.players_affected.len(),
        "Replay complete"
    );

    Ok(summary)
}

async fn replay_periods<S: RatingStore>(
    store: &S,
    population_id: i32,
    calendar: &PeriodCalendar,
    periods: &[i32],
    by_period: &BTreeMap<i32, Vec<GameResult>>
) -> Result<ReplaySummary, ProcessorError> {
    let mut tracker = RatingTracker::new();
    let mut summary = ReplaySummary {
        population_id,
        ..Default::default()
    };

    for &period_id in periods {
        Span::current().pb_inc(1);

        let Some(roster) = by_period.get(&period_id) else {
            continue;
        };
        if roster.len() < MIN_PLAYERS_FOR_RATING {
            debug!(population_id, period_id, "Not enough participants to rate period");
            continue;
        }

        let as_of = calendar.start_of(period_id)?;
        let participants: Vec<_> = roster.iter().map(|r| tracker.player_game(r)).collect();
        let roster_ids: HashSet<i32> = roster.iter().map(|r| r.player_id).collect();
        let absentees = tracker.active_absentees(&roster_ids, as_of);

        let rated = rate_participants(population_id, period_id, &participants)?;
        let penalised = rate_absentees(population_id, period_id, &participants, &absentees)?;
        store.persist_period(population_id, &rated, &penalised, as_of).await?;

        tracker.insert_or_update(&rated.updates, RatingAdjustmentType::Participation, as_of);
        tracker.insert_or_update(&penalised.updates, RatingAdjustmentType::Absence, as_of);

        summary.periods_processed += 1;
        summary.players_affected.extend(roster_ids);
    }

    Ok(summary)
}

fn validate_order(periods: &[i32]) -> Result<(), ProcessorError> {
    for pair in periods.windows(2) {
        if pair[1] <= pair[0] {
            return Err(ProcessorError::PeriodsOutOfOrder {
                previous: pair[0],
                next: pair[1]
            });
        }
    }

    Ok(())
}

/// Results grouped by period, each group ordered by player id
fn group_by_period(results: Vec<GameResult>) -> BTreeMap<i32, Vec<GameResult>> {
    let mut grouped: BTreeMap<i32, Vec<GameResult>> = BTreeMap::new();
    for result in results {
        grouped.entry(result.period_id).or_default().push(result);
    }

    for roster in grouped.values_mut() {
        roster.sort_by_key(|r| r.player_id);
    }

    grouped
}
