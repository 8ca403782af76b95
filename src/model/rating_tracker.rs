use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::{
    database::db_structs::{AbsentPlayer, GameResult, PlayerGame, PlayerRatingState, RatingUpdate},
    model::{constants::DEFAULT_RATING, decay::is_active, structures::rating_adjustment_type::RatingAdjustmentType}
};

/// Running rating state of a single population during a replay.
///
/// Mirrors what the store would hold after each period so a replay only
/// needs to read the population once. Players are kept ordered by id.
#[derive(Debug, Default)]
pub struct RatingTracker {
    players: IndexMap<i32, PlayerRatingState>
}

impl RatingTracker {
    pub fn new() -> RatingTracker {
        RatingTracker::default()
    }

    /// The calculator's view of a result. Unseen players start at the default
    /// rating with no rated games.
    pub fn player_game(&self, result: &GameResult) -> PlayerGame {
        match self.players.get(&result.player_id) {
            Some(state) => PlayerGame {
                player_id: result.player_id,
                rating: state.rating,
                score: result.score,
                games_played: state.rated_games_played
            },
            None => PlayerGame {
                player_id: result.player_id,
                rating: DEFAULT_RATING,
                score: result.score,
                games_played: 0
            }
        }
    }

    /// Tracked players active at `as_of` who are not in `roster`, ordered by id
    pub fn active_absentees(&self, roster: &HashSet<i32>, as_of: DateTime<Utc>) -> Vec<AbsentPlayer> {
        self.players
            .values()
            .filter(|s| !roster.contains(&s.player_id) && is_active(s.last_active_at, as_of))
            .map(|s| AbsentPlayer {
                player_id: s.player_id,
                rating: s.rating,
                games_played: s.rated_games_played
            })
            .collect()
    }

    /// Applies a batch of updates the same way the store does: participation
    /// counts a game and marks the player active, anything else only moves
    /// the rating.
    pub fn insert_or_update(
        &mut self,
        updates: &[RatingUpdate],
        adjustment_type: RatingAdjustmentType,
        as_of: DateTime<Utc>
    ) {
        let mut inserted = false;

        for update in updates {
            let state = self.players.entry(update.player_id).or_insert_with(|| {
                inserted = true;
                PlayerRatingState {
                    player_id: update.player_id,
                    rating: DEFAULT_RATING,
                    rated_games_played: 0,
                    last_active_at: None
                }
            });

            state.rating = update.new_rating;
            if adjustment_type == RatingAdjustmentType::Participation {
                state.rated_games_played += 1;
                state.last_active_at = Some(as_of);
            }
        }

        if inserted {
            self.players.sort_keys();
        }
    }
}
