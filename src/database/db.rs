use super::{
    db_structs::{
        AbsentPlayer, GameResult, PlayerGame, PlayerRatingState, RatedGroup, RatingHistoryEntry, RatingUpdate
    },
    store::RatingStore
};
use crate::{
    error::ProcessorError,
    model::{
        constants::{ACTIVE_THRESHOLD_DAYS, DEFAULT_RATING},
        structures::{period_filter::PeriodFilter, rating_adjustment_type::RatingAdjustmentType, score::Score}
    }
};
use chrono::{DateTime, Duration, Utc};
use postgres_types::ToSql;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::{Client, Error, GenericClient, NoTls, Row};
use tracing::{debug, error, info};

const SCHEMA: &str = include_str!("schema.sql");

const HISTORY_SELECT: &str = "SELECT population_id, player_id, period_id, old_rating, new_rating, change, score, \
                                     average_score, participants, adjustment_type \
                              FROM rating_history";

/// PostgreSQL-backed [`RatingStore`]. Single writes are one statement each;
/// [`RatingStore::persist_period`] runs inside a transaction. The client sits
/// behind a mutex because opening a transaction needs exclusive access.
#[derive(Clone)]
pub struct DbClient {
    client: Arc<Mutex<Client>>
}

impl DbClient {
    // Connect to the database and return a DbClient instance
    pub async fn connect(connection_str: &str) -> Result<Self, Error> {
        let (client, connection) = tokio_postgres::connect(connection_str, NoTls).await?;

        // Spawn the connection object to run in the background
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("connection error: {}", e);
            }
        });

        Ok(DbClient {
            client: Arc::new(Mutex::new(client))
        })
    }

    /// Creates the tables if they do not exist yet
    pub async fn migrate(&self) -> Result<(), ProcessorError> {
        self.client.lock().await.batch_execute(SCHEMA).await?;
        info!("Schema applied");

        Ok(())
    }

    async fn query_history(
        &self,
        filter: &str,
        params: &[&(dyn ToSql + Sync)]
    ) -> Result<Vec<RatingHistoryEntry>, ProcessorError> {
        let rows = self
            .client
            .lock()
            .await
            .query(&format!("{HISTORY_SELECT} {filter}"), params)
            .await?;

        rows.iter().map(Self::history_from_row).collect()
    }

    fn player_state_from_row(row: &Row) -> Result<PlayerRatingState, ProcessorError> {
        Ok(PlayerRatingState {
            player_id: row.try_get("player_id")?,
            rating: row.try_get("rating")?,
            rated_games_played: row.try_get("rated_games_played")?,
            last_active_at: row.try_get("last_active_at")?
        })
    }

    fn result_from_row(row: &Row) -> Result<GameResult, ProcessorError> {
        Ok(GameResult {
            player_id: row.try_get("player_id")?,
            period_id: row.try_get("period_id")?,
            score: Score::try_from(row.try_get::<_, i32>("score")?)?
        })
    }

    fn history_from_row(row: &Row) -> Result<RatingHistoryEntry, ProcessorError> {
        let score = row
            .try_get::<_, Option<i32>>("score")?
            .map(Score::try_from)
            .transpose()?;
        let adjustment_type: i32 = row.try_get("adjustment_type")?;

        Ok(RatingHistoryEntry {
            population_id: row.try_get("population_id")?,
            player_id: row.try_get("player_id")?,
            period_id: row.try_get("period_id")?,
            old_rating: row.try_get("old_rating")?,
            new_rating: row.try_get("new_rating")?,
            change: row.try_get("change")?,
            score,
            average_score: row.try_get("average_score")?,
            participants: row.try_get("participants")?,
            adjustment_type: RatingAdjustmentType::try_from(adjustment_type)
                .map_err(|_| ProcessorError::Storage(format!("unknown adjustment type {adjustment_type}")))?
        })
    }
}

impl RatingStore for DbClient {
    async fn list_populations(&self) -> Result<Vec<i32>, ProcessorError> {
        let rows = self
            .client
            .lock()
            .await
            .query("SELECT DISTINCT population_id FROM players ORDER BY population_id", &[])
            .await?;

        let ids = rows.iter().map(|r| r.try_get(0)).collect::<Result<Vec<i32>, Error>>()?;

        Ok(ids)
    }

    async fn fetch_participants(&self, population_id: i32, period_id: i32) -> Result<Vec<PlayerGame>, ProcessorError> {
        let rows = self
            .client
            .lock()
            .await
            .query(
                "SELECT r.player_id, r.score, \
                        COALESCE(p.rating, $3) AS rating, \
                        COALESCE(p.rated_games_played, 0) AS rated_games_played \
                 FROM game_results r \
                 LEFT JOIN players p ON p.population_id = r.population_id AND p.player_id = r.player_id \
                 WHERE r.population_id = $1 AND r.period_id = $2 \
                 ORDER BY r.player_id",
                &[&population_id, &period_id, &DEFAULT_RATING]
            )
            .await?;

        rows.iter()
            .map(|row| {
                Ok(PlayerGame {
                    player_id: row.try_get("player_id")?,
                    rating: row.try_get("rating")?,
                    score: Score::try_from(row.try_get::<_, i32>("score")?)?,
                    games_played: row.try_get("rated_games_played")?
                })
            })
            .collect()
    }

    async fn fetch_active_absentees(
        &self,
        population_id: i32,
        period_id: i32,
        as_of: DateTime<Utc>
    ) -> Result<Vec<AbsentPlayer>, ProcessorError> {
        let window_start = as_of - Duration::days(ACTIVE_THRESHOLD_DAYS);
        let rows = self
            .client
            .lock()
            .await
            .query(
                "SELECT p.player_id, p.rating, p.rated_games_played \
                 FROM players p \
                 WHERE p.population_id = $1 \
                   AND p.last_active_at IS NOT NULL \
                   AND p.last_active_at <= $3 AND p.last_active_at >= $4 \
                   AND NOT EXISTS ( \
                       SELECT 1 FROM game_results r \
                       WHERE r.population_id = p.population_id AND r.player_id = p.player_id AND r.period_id = $2) \
                 ORDER BY p.player_id",
                &[&population_id, &period_id, &as_of, &window_start]
            )
            .await?;

        rows.iter()
            .map(|row| {
                Ok(AbsentPlayer {
                    player_id: row.try_get("player_id")?,
                    rating: row.try_get("rating")?,
                    games_played: row.try_get("rated_games_played")?
                })
            })
            .collect()
    }

    async fn fetch_inactive_players(
        &self,
        population_id: i32,
        inactive_since: DateTime<Utc>
    ) -> Result<Vec<PlayerRatingState>, ProcessorError> {
        let rows = self
            .client
            .lock()
            .await
            .query(
                "SELECT player_id, rating, rated_games_played, last_active_at FROM players \
                 WHERE population_id = $1 AND last_active_at < $2 \
                 ORDER BY player_id",
                &[&population_id, &inactive_since]
            )
            .await?;

        rows.iter().map(Self::player_state_from_row).collect()
    }

    async fn fetch_players(&self, population_id: i32) -> Result<Vec<PlayerRatingState>, ProcessorError> {
        let rows = self
            .client
            .lock()
            .await
            .query(
                "SELECT player_id, rating, rated_games_played, last_active_at FROM players \
                 WHERE population_id = $1 ORDER BY player_id",
                &[&population_id]
            )
            .await?;

        rows.iter().map(Self::player_state_from_row).collect()
    }

    async fn fetch_results(&self, population_id: i32) -> Result<Vec<GameResult>, ProcessorError> {
        let rows = self
            .client
            .lock()
            .await
            .query(
                "SELECT player_id, period_id, score FROM game_results \
                 WHERE population_id = $1 ORDER BY period_id, player_id",
                &[&population_id]
            )
            .await?;

        rows.iter().map(Self::result_from_row).collect()
    }

    async fn has_history(&self, population_id: i32, period_id: i32) -> Result<bool, ProcessorError> {
        let row = self
            .client
            .lock()
            .await
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM rating_history WHERE population_id = $1 AND period_id = $2)",
                &[&population_id, &period_id]
            )
            .await?;

        Ok(row.try_get(0)?)
    }

    async fn persist_rating_updates(
        &self,
        population_id: i32,
        updates: &[RatingUpdate],
        adjustment_type: RatingAdjustmentType,
        as_of: DateTime<Utc>
    ) -> Result<(), ProcessorError> {
        let client = self.client.lock().await;
        write_rating_updates(&*client, population_id, updates, adjustment_type, as_of).await
    }

    async fn persist_history_entries(&self, entries: &[RatingHistoryEntry]) -> Result<(), ProcessorError> {
        let client = self.client.lock().await;
        write_history_entries(&*client, entries).await
    }

    async fn persist_period(
        &self,
        population_id: i32,
        participants: &RatedGroup,
        absentees: &RatedGroup,
        as_of: DateTime<Utc>
    ) -> Result<(), ProcessorError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;

        write_rating_updates(
            &transaction,
            population_id,
            &participants.updates,
            RatingAdjustmentType::Participation,
            as_of
        )
        .await?;
        write_history_entries(&transaction, &participants.history).await?;

        if !absentees.is_empty() {
            write_rating_updates(&transaction, population_id, &absentees.updates, RatingAdjustmentType::Absence, as_of)
                .await?;
            write_history_entries(&transaction, &absentees.history).await?;
        }

        // Dropping an uncommitted transaction rolls it back
        transaction.commit().await?;
        debug!(
            population_id,
            participants = participants.updates.len(),
            absentees = absentees.updates.len(),
            "Committed period"
        );

        Ok(())
    }

    async fn history_for_player(
        &self,
        population_id: i32,
        player_id: i32
    ) -> Result<Vec<RatingHistoryEntry>, ProcessorError> {
        self.query_history(
            "WHERE population_id = $1 AND player_id = $2 ORDER BY period_id, id",
            &[&population_id, &player_id]
        )
        .await
    }

    async fn history_for_period(
        &self,
        population_id: i32,
        period_id: i32
    ) -> Result<Vec<RatingHistoryEntry>, ProcessorError> {
        self.query_history(
            "WHERE population_id = $1 AND period_id = $2 ORDER BY player_id",
            &[&population_id, &period_id]
        )
        .await
    }

    async fn history_in(
        &self,
        population_id: i32,
        filter: PeriodFilter
    ) -> Result<Vec<RatingHistoryEntry>, ProcessorError> {
        let (from, to) = filter.bounds();
        self.query_history(
            "WHERE population_id = $1 \
               AND ($2::int4 IS NULL OR period_id >= $2) \
               AND ($3::int4 IS NULL OR period_id <= $3) \
             ORDER BY period_id, player_id",
            &[&population_id, &from, &to]
        )
        .await
    }

    async fn reset_population_ratings(&self, population_id: i32) -> Result<(), ProcessorError> {
        let n = self
            .client
            .lock()
            .await
            .execute(
                "UPDATE players SET rating = $2, rated_games_played = 0, last_active_at = NULL \
                 WHERE population_id = $1",
                &[&population_id, &DEFAULT_RATING]
            )
            .await?;

        info!(population_id, players = n, "Reset population ratings");
        Ok(())
    }

    async fn clear_history(&self, population_id: i32) -> Result<(), ProcessorError> {
        let n = self
            .client
            .lock()
            .await
            .execute("DELETE FROM rating_history WHERE population_id = $1", &[&population_id])
            .await?;

        info!(population_id, rows = n, "Cleared rating history");
        Ok(())
    }

    async fn list_periods_chronological(&self, population_id: i32) -> Result<Vec<i32>, ProcessorError> {
        let rows = self
            .client
            .lock()
            .await
            .query(
                "SELECT DISTINCT period_id FROM game_results WHERE population_id = $1 ORDER BY period_id",
                &[&population_id]
            )
            .await?;

        let ids = rows.iter().map(|r| r.try_get(0)).collect::<Result<Vec<i32>, Error>>()?;

        Ok(ids)
    }

    async fn record_result(&self, population_id: i32, result: GameResult) -> Result<(), ProcessorError> {
        let score = result.score as i32;
        let row = self
            .client
            .lock()
            .await
            .query_one(
                "WITH inserted AS ( \
                     INSERT INTO game_results (population_id, player_id, period_id, score) \
                     VALUES ($1, $2, $3, $4) \
                     ON CONFLICT DO NOTHING \
                     RETURNING player_id), \
                 created AS ( \
                     INSERT INTO players (population_id, player_id, rating) \
                     SELECT $1, player_id, $5 FROM inserted \
                     ON CONFLICT DO NOTHING) \
                 SELECT COUNT(*) FROM inserted",
                &[&population_id, &result.player_id, &result.period_id, &score, &DEFAULT_RATING]
            )
            .await?;

        let inserted: i64 = row.try_get(0)?;
        if inserted == 0 {
            return Err(ProcessorError::DuplicateResult {
                player_id: result.player_id,
                period_id: result.period_id
            });
        }

        Ok(())
    }
}

async fn write_rating_updates<C: GenericClient + Sync>(
    client: &C,
    population_id: i32,
    updates: &[RatingUpdate],
    adjustment_type: RatingAdjustmentType,
    as_of: DateTime<Utc>
) -> Result<(), ProcessorError> {
    if updates.is_empty() {
        return Ok(());
    }

    let participation = adjustment_type == RatingAdjustmentType::Participation;
    let player_ids: Vec<i32> = updates.iter().map(|u| u.player_id).collect();
    let ratings: Vec<i32> = updates.iter().map(|u| u.new_rating).collect();

    let values: &[&(dyn ToSql + Sync)] = &[&population_id, &player_ids, &ratings, &participation, &as_of];
    client
        .execute(
            "INSERT INTO players (population_id, player_id, rating, rated_games_played, last_active_at) \
             SELECT $1, u.player_id, u.rating, \
                    CASE WHEN $4::bool THEN 1 ELSE 0 END, \
                    CASE WHEN $4::bool THEN $5::timestamptz END \
             FROM UNNEST($2::int4[], $3::int4[]) AS u(player_id, rating) \
             ON CONFLICT (population_id, player_id) DO UPDATE SET \
                 rating = EXCLUDED.rating, \
                 rated_games_played = players.rated_games_played + CASE WHEN $4::bool THEN 1 ELSE 0 END, \
                 last_active_at = CASE WHEN $4::bool THEN $5::timestamptz ELSE players.last_active_at END",
            values
        )
        .await?;

    Ok(())
}

async fn write_history_entries<C: GenericClient + Sync>(
    client: &C,
    entries: &[RatingHistoryEntry]
) -> Result<(), ProcessorError> {
    if entries.is_empty() {
        return Ok(());
    }

    let population_ids: Vec<i32> = entries.iter().map(|e| e.population_id).collect();
    let player_ids: Vec<i32> = entries.iter().map(|e| e.player_id).collect();
    let period_ids: Vec<i32> = entries.iter().map(|e| e.period_id).collect();
    let old_ratings: Vec<i32> = entries.iter().map(|e| e.old_rating).collect();
    let new_ratings: Vec<i32> = entries.iter().map(|e| e.new_rating).collect();
    let changes: Vec<i32> = entries.iter().map(|e| e.change).collect();
    let scores: Vec<Option<i32>> = entries.iter().map(|e| e.score.map(|s| s as i32)).collect();
    let averages: Vec<f64> = entries.iter().map(|e| e.average_score).collect();
    let participants: Vec<i32> = entries.iter().map(|e| e.participants).collect();
    let adjustment_types: Vec<i32> = entries.iter().map(|e| e.adjustment_type as i32).collect();

    let values: &[&(dyn ToSql + Sync)] = &[
        &population_ids,
        &player_ids,
        &period_ids,
        &old_ratings,
        &new_ratings,
        &changes,
        &scores,
        &averages,
        &participants,
        &adjustment_types
    ];
    client
        .execute(
            "INSERT INTO rating_history (population_id, player_id, period_id, old_rating, new_rating, \
             change, score, average_score, participants, adjustment_type) \
             SELECT * FROM UNNEST($1::int4[], $2::int4[], $3::int4[], $4::int4[], $5::int4[], \
                                  $6::int4[], $7::int4[], $8::float8[], $9::int4[], $10::int4[])",
            values
        )
        .await?;

    Ok(())
}
