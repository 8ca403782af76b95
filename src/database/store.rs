//! The persistence port consumed by the period processor, the replay engine
//! and the leaderboard.
//!
//! Implementations are expected to make each write method atomic. A rated
//! period goes through [`RatingStore::persist_period`] so that its ratings and
//! ledger rows land together or not at all. The engine never retries: any
//! error is handed back to the caller as-is.

use super::db_structs::{
    AbsentPlayer, GameResult, PlayerGame, PlayerRatingState, RatedGroup, RatingHistoryEntry, RatingUpdate
};
use crate::{
    error::ProcessorError,
    model::structures::{period_filter::PeriodFilter, rating_adjustment_type::RatingAdjustmentType}
};
use chrono::{DateTime, Utc};
use std::future::Future;

pub trait RatingStore: Send + Sync {
    /// Every population with at least one player, ascending
    fn list_populations(&self) -> impl Future<Output = Result<Vec<i32>, ProcessorError>> + Send;

    /// Participants of a period with their current rating state, ordered by player id
    fn fetch_participants(
        &self,
        population_id: i32,
        period_id: i32
    ) -> impl Future<Output = Result<Vec<PlayerGame>, ProcessorError>> + Send;

    /// Players whose last activity lies within the activity window ending at
    /// `as_of` and who have no result for `period_id`, ordered by player id
    fn fetch_active_absentees(
        &self,
        population_id: i32,
        period_id: i32,
        as_of: DateTime<Utc>
    ) -> impl Future<Output = Result<Vec<AbsentPlayer>, ProcessorError>> + Send;

    /// Players last active strictly before `inactive_since`
    fn fetch_inactive_players(
        &self,
        population_id: i32,
        inactive_since: DateTime<Utc>
    ) -> impl Future<Output = Result<Vec<PlayerRatingState>, ProcessorError>> + Send;

    /// Current rating state of every player in the population, ordered by player id
    fn fetch_players(
        &self,
        population_id: i32
    ) -> impl Future<Output = Result<Vec<PlayerRatingState>, ProcessorError>> + Send;

    /// Every result in the population, ordered by period then player id
    fn fetch_results(
        &self,
        population_id: i32
    ) -> impl Future<Output = Result<Vec<GameResult>, ProcessorError>> + Send;

    fn has_history(
        &self,
        population_id: i32,
        period_id: i32
    ) -> impl Future<Output = Result<bool, ProcessorError>> + Send;

    /// Writes new ratings. `Participation` updates also count a rated game and
    /// mark the player active at `as_of`; other kinds only touch the rating.
    fn persist_rating_updates(
        &self,
        population_id: i32,
        updates: &[RatingUpdate],
        adjustment_type: RatingAdjustmentType,
        as_of: DateTime<Utc>
    ) -> impl Future<Output = Result<(), ProcessorError>> + Send;

    fn persist_history_entries(
        &self,
        entries: &[RatingHistoryEntry]
    ) -> impl Future<Output = Result<(), ProcessorError>> + Send;

    /// Writes everything one period produces as a single unit: participant
    /// ratings (counted as `Participation` at `as_of`), absentee ratings
    /// (`Absence`) and both sets of ledger rows. On error nothing is written.
    fn persist_period(
        &self,
        population_id: i32,
        participants: &RatedGroup,
        absentees: &RatedGroup,
        as_of: DateTime<Utc>
    ) -> impl Future<Output = Result<(), ProcessorError>> + Send;

    /// Ledger rows for one player, ordered by period
    fn history_for_player(
        &self,
        population_id: i32,
        player_id: i32
    ) -> impl Future<Output = Result<Vec<RatingHistoryEntry>, ProcessorError>> + Send;

    /// Ledger rows written for one period, ordered by player id
    fn history_for_period(
        &self,
        population_id: i32,
        period_id: i32
    ) -> impl Future<Output = Result<Vec<RatingHistoryEntry>, ProcessorError>> + Send;

    /// Ledger rows whose period passes `filter`, ordered by period then player id
    fn history_in(
        &self,
        population_id: i32,
        filter: PeriodFilter
    ) -> impl Future<Output = Result<Vec<RatingHistoryEntry>, ProcessorError>> + Send;

    /// Sets every player back to the default rating, zero rated games and no
    /// last activity
    fn reset_population_ratings(&self, population_id: i32) -> impl Future<Output = Result<(), ProcessorError>> + Send;

    fn clear_history(&self, population_id: i32) -> impl Future<Output = Result<(), ProcessorError>> + Send;

    /// Distinct period ids with at least one result, ascending
    fn list_periods_chronological(
        &self,
        population_id: i32
    ) -> impl Future<Output = Result<Vec<i32>, ProcessorError>> + Send;

    /// Ingestion hook. Creates the player's rating state on their first
    /// result. A second result for the same (player, period) is rejected.
    fn record_result(
        &self,
        population_id: i32,
        result: GameResult
    ) -> impl Future<Output = Result<(), ProcessorError>> + Send;
}
