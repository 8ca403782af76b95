use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::{
    database::{
        db_structs::{PlayerRatingState, RatingUpdate},
        RatingStore
    },
    error::ProcessorError,
    model::{
        constants::{ACTIVE_THRESHOLD_DAYS, DECAY_AMOUNT, DECAY_FLOOR, DECAY_THRESHOLD_DAYS},
        structures::rating_adjustment_type::RatingAdjustmentType
    }
};

/// Returns true if the player was last active within
/// [`ACTIVE_THRESHOLD_DAYS`] of `as_of`, inclusive.
///
/// Activity recorded after `as_of` does not count. This keeps the predicate
/// stable when a past period is processed again.
pub fn is_active(last_active_at: Option<DateTime<Utc>>, as_of: DateTime<Utc>) -> bool {
    match last_active_at {
        Some(t) => t <= as_of && as_of - t <= Duration::days(ACTIVE_THRESHOLD_DAYS),
        None => false
    }
}

/// Players last active before this instant are eligible for decay
pub fn inactive_since(as_of: DateTime<Utc>) -> DateTime<Utc> {
    as_of - Duration::days(DECAY_THRESHOLD_DAYS)
}

/// A single decay step. Ratings at or below the floor are left alone.
pub fn decay_rating(rating: i32, amount: i32, floor: i32) -> i32 {
    if rating <= floor {
        return rating;
    }

    (rating - amount).max(floor)
}

/// One decay cycle over a set of inactive players. Players who would not
/// move are omitted.
pub fn compute_decay(inactive: &[PlayerRatingState], amount: i32, floor: i32) -> Vec<RatingUpdate> {
    inactive
        .iter()
        .filter_map(|p| {
            let new_rating = decay_rating(p.rating, amount, floor);
            if new_rating == p.rating {
                return None;
            }

            Some(RatingUpdate {
                player_id: p.player_id,
                old_rating: p.rating,
                new_rating,
                change: new_rating - p.rating
            })
        })
        .collect()
}

/// Runs one decay cycle for a population. Decay does not write to the rating
/// history, and it is never part of a replay.
pub async fn apply_decay<S: RatingStore>(
    store: &S,
    population_id: i32,
    as_of: DateTime<Utc>
) -> Result<Vec<RatingUpdate>, ProcessorError> {
    let inactive = store
        .fetch_inactive_players(population_id, inactive_since(as_of))
        .await?;
    let updates = compute_decay(&inactive, DECAY_AMOUNT, DECAY_FLOOR);

    if updates.is_empty() {
        debug!(population_id, "No players eligible for decay");
        return Ok(updates);
    }

    store
        .persist_rating_updates(population_id, &updates, RatingAdjustmentType::Decay, as_of)
        .await?;

    info!(population_id, players = updates.len(), "Applied decay");

    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::{apply_decay, compute_decay, decay_rating, inactive_since, is_active};
    use crate::{
        database::{db_structs::RatingUpdate, memory::MemoryStore, RatingStore},
        model::{
            constants::{DECAY_AMOUNT, DECAY_FLOOR, DEFAULT_RATING},
            structures::{rating_adjustment_type::RatingAdjustmentType, score::Score}
        },
        utils::test_utils::{generate_rating_state, generate_result}
    };
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_is_active_window() {
        let as_of = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();

        assert!(is_active(Some(as_of), as_of));
        assert!(is_active(Some(as_of - Duration::days(7)), as_of));
        assert!(!is_active(Some(as_of - Duration::days(7) - Duration::seconds(1)), as_of));
        assert!(!is_active(None, as_of));
    }

    #[test]
    fn test_future_activity_is_not_active() {
        let as_of = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();

        assert!(!is_active(Some(as_of + Duration::days(1)), as_of));
    }

    #[test]
    fn test_inactive_since() {
        let as_of = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();

        assert_eq!(inactive_since(as_of), Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_decay_rating() {
        assert_eq!(decay_rating(1500, 10, 1200), 1490);
        assert_eq!(decay_rating(1205, 10, 1200), 1200);
        assert_eq!(decay_rating(1200, 10, 1200), 1200);
        // Never raised to the floor
        assert_eq!(decay_rating(1100, 10, 1200), 1100);
    }

    #[test]
    fn test_compute_decay_skips_players_at_floor() {
        let players = vec![
            generate_rating_state(1, 1500, 20, None),
            generate_rating_state(2, 1200, 20, None),
            generate_rating_state(3, 1150, 20, None),
            generate_rating_state(4, 1204, 20, None),
        ];

        let updates = compute_decay(&players, DECAY_AMOUNT, DECAY_FLOOR);

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].player_id, 1);
        assert_eq!(updates[0].new_rating, 1490);
        assert_eq!(updates[0].change, -10);
        assert_eq!(updates[1].player_id, 4);
        assert_eq!(updates[1].new_rating, 1200);
        assert_eq!(updates[1].change, -4);
    }

    #[tokio::test]
    async fn test_apply_decay_only_touches_inactive_players() {
        let store = MemoryStore::new();
        let as_of = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();

        store.record_result(1, generate_result(1, 900, Score::Three)).await.unwrap();
        store.record_result(1, generate_result(2, 900, Score::Four)).await.unwrap();

        let stale = RatingUpdate::new(1, DEFAULT_RATING, 0);
        let fresh = RatingUpdate::new(2, DEFAULT_RATING, 0);
        store
            .persist_rating_updates(1, &[stale], RatingAdjustmentType::Participation, as_of - Duration::days(30))
            .await
            .unwrap();
        store
            .persist_rating_updates(1, &[fresh], RatingAdjustmentType::Participation, as_of - Duration::days(1))
            .await
            .unwrap();

        let updates = apply_decay(&store, 1, as_of).await.unwrap();

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].player_id, 1);

        let players = store.fetch_players(1).await.unwrap();
        assert_eq!(players[0].rating, DEFAULT_RATING - DECAY_AMOUNT);
        assert_eq!(players[0].rated_games_played, 1);
        assert_eq!(players[1].rating, DEFAULT_RATING);

        // No ledger rows for decay
        assert!(store.history(1).is_empty());
    }
}
