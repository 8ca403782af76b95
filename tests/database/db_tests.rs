use elo_processor::{
    database::{
        db_structs::{RatedGroup, RatingUpdate},
        memory::MemoryStore,
        RatingStore
    },
    error::ProcessorError,
    model::{
        constants::DEFAULT_RATING,
        decay::apply_decay,
        leaderboard::rank_population,
        processor::process_period,
        replay::replay_population,
        structures::{
            period_calendar::PeriodCalendar, period_filter::PeriodFilter,
            rating_adjustment_type::RatingAdjustmentType, score::Score
        }
    },
    utils::test_utils::{generate_history_entry, generate_result}
};
use serial_test::serial;

use super::test_helpers::TestDatabase;
use crate::common::init_test_env;

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_record_result_creates_player() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    test_db.seed_test_data().await.expect("Failed to seed test data");
    let client = test_db.get_client().await.expect("Failed to connect");

    let players = client.fetch_players(1).await.unwrap();

    assert_eq!(players.len(), 3);
    assert!(players.iter().all(|p| p.rating == DEFAULT_RATING));
    assert!(players.iter().all(|p| p.rated_games_played == 0 && p.last_active_at.is_none()));
    assert_eq!(client.list_populations().await.unwrap(), vec![1]);
    assert_eq!(client.list_periods_chronological(1).await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_duplicate_result_rejected() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    test_db.seed_test_data().await.expect("Failed to seed test data");
    let client = test_db.get_client().await.expect("Failed to connect");

    let result = client.record_result(1, generate_result(1, 1, Score::Six)).await;

    assert!(matches!(
        result,
        Err(ProcessorError::DuplicateResult {
            player_id: 1,
            period_id: 1
        })
    ));
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_process_period_writes_history() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    test_db.seed_test_data().await.expect("Failed to seed test data");
    let client = test_db.get_client().await.expect("Failed to connect");
    let calendar = PeriodCalendar::default();

    let first = process_period(&client, 1, 1, calendar.start_of(1).unwrap()).await.unwrap();
    let second = process_period(&client, 1, 1, calendar.start_of(1).unwrap()).await.unwrap();

    assert!(first.calculated);
    assert!(!second.calculated);

    let history = client.history_for_player(1, 3).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].score, Some(Score::Fail));
    assert_eq!(history[0].participants, 3);
    assert_eq!(history[0].adjustment_type, RatingAdjustmentType::Participation);

    // Player 3 skips day 2 while still active
    let outcome = process_period(&client, 1, 2, calendar.start_of(2).unwrap()).await.unwrap();
    assert_eq!(outcome.absentees, 1);

    let history = client.history_for_player(1, 3).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].score, None);
    assert_eq!(history[1].adjustment_type, RatingAdjustmentType::Absence);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_postgres_matches_memory_store() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    test_db.seed_test_data().await.expect("Failed to seed test data");
    let client = test_db.get_client().await.expect("Failed to connect");
    let calendar = PeriodCalendar::default();

    let memory = MemoryStore::new();
    for result in client.fetch_results(1).await.unwrap() {
        memory.record_result(1, result).await.unwrap();
    }

    replay_population(&client, 1, &calendar).await.unwrap();
    replay_population(&memory, 1, &calendar).await.unwrap();

    assert_eq!(client.fetch_players(1).await.unwrap(), memory.fetch_players(1).await.unwrap());

    for player_id in 1..=3 {
        assert_eq!(
            client.history_for_player(1, player_id).await.unwrap(),
            memory.history_for_player(1, player_id).await.unwrap()
        );
    }

    for period_id in 1..=3 {
        assert_eq!(
            client.history_for_period(1, period_id).await.unwrap(),
            memory.history_for_period(1, period_id).await.unwrap()
        );
    }

    for filter in [PeriodFilter::AllTime, PeriodFilter::Since(2), PeriodFilter::Between(1, 1)] {
        assert_eq!(
            client.history_in(1, filter).await.unwrap(),
            memory.history_in(1, filter).await.unwrap()
        );
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_persist_period_rolls_back_on_conflict() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    test_db.seed_test_data().await.expect("Failed to seed test data");
    let client = test_db.get_client().await.expect("Failed to connect");
    let calendar = PeriodCalendar::default();
    let as_of = calendar.start_of(1).unwrap();

    client
        .persist_history_entries(&[generate_history_entry(1, 3, 1, -8)])
        .await
        .unwrap();

    let participants = RatedGroup {
        updates: vec![RatingUpdate::new(1, DEFAULT_RATING, 50), RatingUpdate::new(2, DEFAULT_RATING, -40)],
        history: vec![generate_history_entry(1, 1, 1, 50), generate_history_entry(1, 2, 1, -40)]
    };
    // Collides with the row written above
    let absentees = RatedGroup {
        updates: vec![RatingUpdate::new(3, DEFAULT_RATING, -8)],
        history: vec![generate_history_entry(1, 3, 1, -8)]
    };

    let result = client.persist_period(1, &participants, &absentees, as_of).await;
    assert!(matches!(result, Err(ProcessorError::Database(_))));

    for player in client.fetch_players(1).await.unwrap() {
        assert_eq!(player.rating, DEFAULT_RATING);
        assert_eq!(player.rated_games_played, 0);
        assert_eq!(player.last_active_at, None);
    }
    assert_eq!(client.history_for_period(1, 1).await.unwrap().len(), 1);

    // The client is still usable after the rollback
    let participants_only = RatedGroup {
        updates: participants.updates.clone(),
        history: vec![generate_history_entry(1, 1, 2, 50), generate_history_entry(1, 2, 2, -40)]
    };
    client
        .persist_period(1, &participants_only, &RatedGroup::default(), as_of)
        .await
        .unwrap();
    assert_eq!(client.history_in(1, PeriodFilter::Since(2)).await.unwrap().len(), 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_decay_and_leaderboard() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    test_db.seed_test_data().await.expect("Failed to seed test data");
    let client = test_db.get_client().await.expect("Failed to connect");
    let calendar = PeriodCalendar::default();

    replay_population(&client, 1, &calendar).await.unwrap();
    let before = client.fetch_players(1).await.unwrap();

    let decayed = apply_decay(&client, 1, calendar.start_of(30).unwrap()).await.unwrap();
    let after = client.fetch_players(1).await.unwrap();

    assert!(!decayed.is_empty());
    for update in &decayed {
        let old = before.iter().find(|p| p.player_id == update.player_id).unwrap();
        let new = after.iter().find(|p| p.player_id == update.player_id).unwrap();
        assert_eq!(new.rating, old.rating + update.change);
        assert_eq!(new.last_active_at, old.last_active_at);
    }

    let leaderboard = rank_population(&client, 1, PeriodFilter::AllTime).await.unwrap();
    assert_eq!(leaderboard.len(), 3);
    assert_eq!(leaderboard[0].rank, 1);
    assert!(leaderboard.windows(2).all(|w| w[0].rating >= w[1].rating));
}
