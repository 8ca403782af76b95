use crate::{
    database::db_structs::{AbsentPlayer, GameResult, PlayerGame, PlayerRatingState, RatingHistoryEntry},
    model::structures::{rating_adjustment_type::RatingAdjustmentType, score::Score}
};
use chrono::{DateTime, Utc};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strum::IntoEnumIterator;

pub fn generate_result(player_id: i32, period_id: i32, score: Score) -> GameResult {
    GameResult {
        player_id,
        period_id,
        score
    }
}

pub fn generate_player_game(player_id: i32, rating: i32, score: Score, games_played: i32) -> PlayerGame {
    PlayerGame {
        player_id,
        rating,
        score,
        games_played
    }
}

pub fn generate_absent_player(player_id: i32, rating: i32, games_played: i32) -> AbsentPlayer {
    AbsentPlayer {
        player_id,
        rating,
        games_played
    }
}

pub fn generate_rating_state(
    player_id: i32,
    rating: i32,
    rated_games_played: i32,
    last_active_at: Option<DateTime<Utc>>
) -> PlayerRatingState {
    PlayerRatingState {
        player_id,
        rating,
        rated_games_played,
        last_active_at
    }
}

pub fn generate_history_entry(population_id: i32, player_id: i32, period_id: i32, change: i32) -> RatingHistoryEntry {
    RatingHistoryEntry {
        population_id,
        player_id,
        period_id,
        old_rating: 1500,
        new_rating: 1500 + change,
        change,
        score: Some(Score::Four),
        average_score: 4.0,
        participants: 2,
        adjustment_type: RatingAdjustmentType::Participation
    }
}

/// A reproducible history of `n_periods` consecutive periods starting at
/// period 1. Each period draws a random subset of `player_ids` (possibly
/// empty) with random scores, so some periods end up with fewer than two
/// players and some players go quiet long enough to stop being absentees.
pub fn generate_random_history(seed: u64, player_ids: &[i32], n_periods: i32) -> Vec<GameResult> {
    // Initialize seeded RNG for reproducible results
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let scores: Vec<Score> = Score::iter().collect();

    let mut results = Vec::new();
    for period_id in 1..=n_periods {
        let mut roster = player_ids.to_vec();
        roster.shuffle(&mut rng);
        let n_players = rng.random_range(0..=roster.len());

        for player_id in roster.into_iter().take(n_players) {
            let score = scores[rng.random_range(0..scores.len())];
            results.push(generate_result(player_id, period_id, score));
        }
    }

    results
}
