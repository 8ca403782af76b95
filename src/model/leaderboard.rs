//! Per-player statistics and leaderboard ordering.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::Serialize;

use crate::{
    database::{
        db_structs::{GameResult, PlayerRatingState},
        RatingStore
    },
    error::ProcessorError,
    model::{
        constants::{FAIL_EFFECTIVE_SCORE, PROVISIONAL_GAMES},
        structures::{period_filter::PeriodFilter, score::Score}
    }
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub games_played: i32,
    /// Results that were not a fail
    pub wins: i32,
    /// Percentage of games won, 0 to 100
    pub win_rate: f64,
    /// Mean effective score over played games, fails counted at their
    /// effective value
    pub average_score: f64,
    pub best_score: Score,
    pub worst_score: Score,
    pub current_streak: i32,
    pub max_streak: i32,
    /// Counts for one to six guesses, then fails
    pub distribution: [i32; 7]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub player_id: i32,
    pub rating: i32,
    pub rated_games_played: i32,
    pub provisional: bool,
    pub summary: PlayerSummary
}

/// Current and longest run of non-fail results, in period order. Only a
/// fail resets the run; skipped periods do not.
pub fn calculate_streaks(results: &[GameResult]) -> (i32, i32) {
    let mut ordered: Vec<&GameResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.period_id);

    let mut streak = 0;
    let mut max = 0;
    for result in ordered {
        if result.score.is_fail() {
            streak = 0;
        } else {
            streak += 1;
            max = max.max(streak);
        }
    }

    (streak, max)
}

/// Statistics over a player's results. `None` when there are no results.
pub fn summarize(results: &[GameResult]) -> Option<PlayerSummary> {
    let best_score = results.iter().map(|r| r.score).min()?;
    let worst_score = results.iter().map(|r| r.score).max()?;

    let games_played = results.len() as i32;
    let wins = results.iter().filter(|r| !r.score.is_fail()).count() as i32;
    let total: i32 = results.iter().map(|r| r.score.effective()).sum();

    let mut distribution = [0; 7];
    for result in results {
        distribution[result.score.distribution_index()] += 1;
    }

    let (current_streak, max_streak) = calculate_streaks(results);

    Some(PlayerSummary {
        games_played,
        wins,
        win_rate: wins as f64 / games_played as f64 * 100.0,
        average_score: total as f64 / games_played as f64,
        best_score,
        worst_score,
        current_streak,
        max_streak,
        distribution
    })
}

/// Average effective score counting every period from the player's first
/// result up to `latest_period` in which they did not play as a fail.
pub fn average_with_misses(results: &[GameResult], latest_period: i32) -> Option<f64> {
    let first_period = results.iter().map(|r| r.period_id).min()?;
    let span = (latest_period - first_period + 1).max(results.len() as i32);

    let played: i32 = results.iter().map(|r| r.score.effective()).sum();
    let missed = span - results.len() as i32;

    Some((played + missed * FAIL_EFFECTIVE_SCORE) as f64 / span as f64)
}

/// Orders entries by rating (descending), then average score (ascending),
/// then player id, and assigns standard competition ranks on rating.
pub fn rank_entries(mut entries: Vec<LeaderboardEntry>) -> Vec<LeaderboardEntry> {
    entries.sort_by(|a, b| {
        b.rating
            .cmp(&a.rating)
            .then_with(|| a.summary.average_score.total_cmp(&b.summary.average_score))
            .then_with(|| a.player_id.cmp(&b.player_id))
    });

    let mut previous_rating = None;
    let mut rank = 0;
    for (i, entry) in entries.iter_mut().enumerate() {
        if previous_rating != Some(entry.rating) {
            rank = i + 1;
            previous_rating = Some(entry.rating);
        }
        entry.rank = rank;
    }

    entries
}

fn entry(state: &PlayerRatingState, summary: PlayerSummary) -> LeaderboardEntry {
    LeaderboardEntry {
        rank: 0,
        player_id: state.player_id,
        rating: state.rating,
        rated_games_played: state.rated_games_played,
        provisional: state.rated_games_played <= PROVISIONAL_GAMES,
        summary
    }
}

/// The leaderboard of a population. Statistics only cover results inside
/// `filter`; players without any such result are left out. Ratings are
/// always the current ones.
pub async fn rank_population<S: RatingStore>(
    store: &S,
    population_id: i32,
    filter: PeriodFilter
) -> Result<Vec<LeaderboardEntry>, ProcessorError> {
    let players = store.fetch_players(population_id).await?;
    let results = store.fetch_results(population_id).await?;

    let by_player = results
        .into_iter()
        .filter(|r| filter.contains(r.period_id))
        .into_group_map_by(|r| r.player_id);

    let entries = players
        .iter()
        .filter_map(|state| {
            let results = by_player.get(&state.player_id)?;
            summarize(results).map(|summary| entry(state, summary))
        })
        .collect();

    Ok(rank_entries(entries))
}

/// Score distribution of a whole population inside `filter`, keyed by score
pub async fn population_distribution<S: RatingStore>(
    store: &S,
    population_id: i32,
    filter: PeriodFilter
) -> Result<BTreeMap<Score, i32>, ProcessorError> {
    let mut counts = BTreeMap::new();
    for result in store.fetch_results(population_id).await? {
        if filter.contains(result.period_id) {
            *counts.entry(result.score).or_insert(0) += 1;
        }
    }

    Ok(counts)
}
