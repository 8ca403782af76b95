use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Failure reported by a non-postgres store. Propagated unchanged.
    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Invalid score {0}, expected a value between 1 and 7")]
    InvalidScore(i32),

    #[error("Invalid rating {rating} for player {player_id}")]
    InvalidRating { player_id: i32, rating: i32 },

    #[error("Player {player_id} appears more than once in the same period")]
    DuplicateParticipant { player_id: i32 },

    #[error("Player {player_id} already has a result for period {period_id}")]
    DuplicateResult { player_id: i32, period_id: i32 },

    #[error("Failed to serialize output: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Periods out of order: {previous} was followed by {next}")]
    PeriodsOutOfOrder { previous: i32, next: i32 },

    #[error("Period {0} has no representable start time")]
    PeriodOutOfRange(i32),

    #[error("Timestamp {0} falls outside the representable period range")]
    TimestampOutOfRange(DateTime<Utc>)
}
