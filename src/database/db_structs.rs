use crate::model::structures::{rating_adjustment_type::RatingAdjustmentType, score::Score};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A player's current rating snapshot within one population
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRatingState {
    pub player_id: i32,
    pub rating: i32,
    pub rated_games_played: i32,
    pub last_active_at: Option<DateTime<Utc>>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    pub player_id: i32,
    pub period_id: i32,
    pub score: Score
}

/// A participant of one period, as handed to the calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerGame {
    pub player_id: i32,
    pub rating: i32,
    pub score: Score,
    pub games_played: i32
}

/// A recently active player who skipped the period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsentPlayer {
    pub player_id: i32,
    pub rating: i32,
    pub games_played: i32
}

/// Invariant: `new_rating == old_rating + change`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingUpdate {
    pub player_id: i32,
    pub old_rating: i32,
    pub new_rating: i32,
    pub change: i32
}

impl RatingUpdate {
    pub fn new(player_id: i32, old_rating: i32, change: i32) -> RatingUpdate {
        RatingUpdate {
            player_id,
            old_rating,
            new_rating: old_rating + change,
            change
        }
    }
}

/// Append-only ledger row. One per (player, period).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingHistoryEntry {
    pub population_id: i32,
    pub player_id: i32,
    pub period_id: i32,
    pub old_rating: i32,
    pub new_rating: i32,
    pub change: i32,
    /// `None` for absentees
    pub score: Option<Score>,
    /// Mean effective score of the period's participants
    pub average_score: f64,
    pub participants: i32,
    pub adjustment_type: RatingAdjustmentType
}

/// Updates and ledger rows produced for one side of a period
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatedGroup {
    pub updates: Vec<RatingUpdate>,
    pub history: Vec<RatingHistoryEntry>
}

impl RatedGroup {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.history.is_empty()
    }
}
