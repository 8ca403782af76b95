use elo_processor::{
    database::{db_structs::GameResult, memory::MemoryStore, RatingStore},
    error::ProcessorError,
    model::{
        constants::{ABSENT_RATING_FLOOR, DEFAULT_RATING},
        decay::apply_decay,
        leaderboard::rank_population,
        processor::process_period,
        replay::replay_population,
        structures::{period_calendar::PeriodCalendar, period_filter::PeriodFilter, score::Score}
    },
    utils::test_utils::{generate_random_history, generate_result}
};

use crate::common::init_test_env;

async fn seeded_store(results: &[GameResult]) -> MemoryStore {
    let store = MemoryStore::new();
    for result in results {
        store.record_result(1, *result).await.unwrap();
    }

    store
}

/// Runs `process_period` over every stored period in order, the way the
/// daily job would have.
async fn process_sequentially(store: &MemoryStore, calendar: &PeriodCalendar) {
    for period_id in store.list_periods_chronological(1).await.unwrap() {
        process_period(store, 1, period_id, calendar.start_of(period_id).unwrap()).await.unwrap();
    }
}

#[tokio::test]
async fn test_replay_matches_sequential_processing() {
    init_test_env();
    let calendar = PeriodCalendar::default();

    for seed in [1, 7, 42, 1337] {
        let history = generate_random_history(seed, &[1, 2, 3, 4, 5, 6], 60);

        let live = seeded_store(&history).await;
        process_sequentially(&live, &calendar).await;

        let replayed = seeded_store(&history).await;
        replay_population(&replayed, 1, &calendar).await.unwrap();

        assert_eq!(
            live.fetch_players(1).await.unwrap(),
            replayed.fetch_players(1).await.unwrap(),
            "ratings diverged for seed {seed}"
        );
        assert_eq!(live.history(1), replayed.history(1), "history diverged for seed {seed}");
    }
}

#[tokio::test]
async fn test_replay_discards_previous_state() {
    init_test_env();
    let calendar = PeriodCalendar::default();
    let store = seeded_store(&[
        generate_result(1, 1, Score::Two),
        generate_result(2, 1, Score::Five),
        generate_result(1, 2, Score::Three),
        generate_result(2, 2, Score::Three),
        generate_result(3, 2, Score::Fail),
    ])
    .await;
    replay_population(&store, 1, &calendar).await.unwrap();
    let expected_players = store.fetch_players(1).await.unwrap();
    let expected_history = store.history(1);

    // Decay is outside the ledger and is wiped by the next replay
    apply_decay(&store, 1, calendar.start_of(200).unwrap()).await.unwrap();
    assert_ne!(store.fetch_players(1).await.unwrap(), expected_players);

    replay_population(&store, 1, &calendar).await.unwrap();

    assert_eq!(store.fetch_players(1).await.unwrap(), expected_players);
    assert_eq!(store.history(1), expected_history);
}

#[tokio::test]
async fn test_history_invariants() {
    init_test_env();
    let calendar = PeriodCalendar::default();
    let history = generate_random_history(5, &[1, 2, 3, 4, 5, 6, 7, 8], 90);

    let store = seeded_store(&history).await;
    replay_population(&store, 1, &calendar).await.unwrap();

    let ledger = store.history(1);
    assert!(!ledger.is_empty());

    for entry in &ledger {
        assert_eq!(entry.new_rating, entry.old_rating + entry.change);
        assert!(entry.participants >= 2);
        assert!(entry.new_rating >= 0);

        if entry.score.is_none() {
            assert!(entry.new_rating >= ABSENT_RATING_FLOOR);
            assert!(entry.change <= 0 || entry.old_rating < ABSENT_RATING_FLOOR);
        }
    }

    // One row per (player, period)
    let mut keys: Vec<(i32, i32)> = ledger.iter().map(|e| (e.player_id, e.period_id)).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), ledger.len());

    // Each player's ledger chains from the default rating to their current rating
    for player in store.fetch_players(1).await.unwrap() {
        let entries = store.history_for_player(1, player.player_id).await.unwrap();
        let mut rating = DEFAULT_RATING;
        for entry in &entries {
            assert_eq!(entry.old_rating, rating);
            rating = entry.new_rating;
        }
        assert_eq!(rating, player.rating);
    }
}

#[tokio::test]
async fn test_out_of_order_processing_is_not_rejected_live() {
    init_test_env();
    let calendar = PeriodCalendar::default();
    let store = seeded_store(&[
        generate_result(1, 1, Score::Two),
        generate_result(2, 1, Score::Three),
        generate_result(1, 2, Score::Four),
        generate_result(2, 2, Score::One),
    ])
    .await;

    // Live processing trusts its caller; only replay enforces ordering
    assert!(process_period(&store, 1, 2, calendar.start_of(2).unwrap()).await.unwrap().calculated);
    assert!(process_period(&store, 1, 1, calendar.start_of(1).unwrap()).await.unwrap().calculated);
    assert_eq!(store.history(1).len(), 4);
}

#[tokio::test]
async fn test_leaderboard_after_replay() {
    init_test_env();
    let calendar = PeriodCalendar::default();
    let store = seeded_store(&[
        generate_result(1, 1, Score::Two),
        generate_result(2, 1, Score::Four),
        generate_result(3, 1, Score::Six),
        generate_result(1, 2, Score::Three),
        generate_result(2, 2, Score::Five),
        generate_result(3, 2, Score::Fail),
    ])
    .await;

    replay_population(&store, 1, &calendar).await.unwrap();
    let leaderboard = rank_population(&store, 1, PeriodFilter::AllTime).await.unwrap();

    assert_eq!(leaderboard.iter().map(|e| e.player_id).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(leaderboard.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(leaderboard.iter().all(|e| e.rated_games_played == 2 && e.provisional));
    assert_eq!(leaderboard[2].summary.wins, 1);
    assert_eq!(leaderboard[2].summary.current_streak, 0);
}

#[tokio::test]
async fn test_failed_write_leaves_period_unrated() {
    init_test_env();
    let calendar = PeriodCalendar::default();
    let store = seeded_store(&[generate_result(1, 1, Score::Two), generate_result(2, 1, Score::Three)]).await;

    store.set_fail_writes(true);
    assert!(matches!(
        process_period(&store, 1, 1, calendar.start_of(1).unwrap()).await,
        Err(ProcessorError::Storage(_))
    ));

    store.set_fail_writes(false);
    assert!(process_period(&store, 1, 1, calendar.start_of(1).unwrap()).await.unwrap().calculated);
}

#[tokio::test]
async fn test_retry_after_failed_write_matches_replay() {
    init_test_env();
    let calendar = PeriodCalendar::default();
    let history = generate_random_history(11, &[1, 2, 3, 4, 5, 6], 40);

    let live = seeded_store(&history).await;
    for period_id in live.list_periods_chronological(1).await.unwrap() {
        let as_of = calendar.start_of(period_id).unwrap();

        // Every third ratable period fails once on its write and is retried
        let ratable = live.fetch_participants(1, period_id).await.unwrap().len() >= 2;
        if ratable && period_id % 3 == 0 {
            live.fail_next_write();
            assert!(process_period(&live, 1, period_id, as_of).await.is_err());
            assert!(live.history_for_period(1, period_id).await.unwrap().is_empty());
        }

        process_period(&live, 1, period_id, as_of).await.unwrap();
    }

    let replayed = seeded_store(&history).await;
    replay_population(&replayed, 1, &calendar).await.unwrap();

    assert_eq!(live.fetch_players(1).await.unwrap(), replayed.fetch_players(1).await.unwrap());
    assert_eq!(
        live.history_in(1, PeriodFilter::AllTime).await.unwrap(),
        replayed.history_in(1, PeriodFilter::AllTime).await.unwrap()
    );
}

#[tokio::test]
async fn test_history_windows_partition_the_ledger() {
    init_test_env();
    let calendar = PeriodCalendar::default();
    let history = generate_random_history(3, &[1, 2, 3, 4, 5], 30);

    let store = seeded_store(&history).await;
    replay_population(&store, 1, &calendar).await.unwrap();

    let all = store.history_in(1, PeriodFilter::AllTime).await.unwrap();
    let early = store.history_in(1, PeriodFilter::Between(1, 15)).await.unwrap();
    let late = store.history_in(1, PeriodFilter::Since(16)).await.unwrap();

    assert_eq!(early.len() + late.len(), all.len());
    assert!(early.iter().all(|e| e.period_id <= 15));
    assert!(late.iter().all(|e| e.period_id >= 16));

    let mut by_period = 0;
    for period_id in store.list_periods_chronological(1).await.unwrap() {
        let rows = store.history_for_period(1, period_id).await.unwrap();
        assert!(rows.iter().all(|e| e.period_id == period_id));
        assert!(rows.windows(2).all(|w| w[0].player_id < w[1].player_id));
        by_period += rows.len();
    }
    assert_eq!(by_period, all.len());
}
