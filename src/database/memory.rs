//! In-process [`RatingStore`]. Backs embedders without a database and the test suite.

use super::{
    db_structs::{
        AbsentPlayer, GameResult, PlayerGame, PlayerRatingState, RatedGroup, RatingHistoryEntry, RatingUpdate
    },
    store::RatingStore
};
use crate::{
    error::ProcessorError,
    model::{
        constants::DEFAULT_RATING,
        decay::is_active,
        structures::{period_filter::PeriodFilter, rating_adjustment_type::RatingAdjustmentType, score::Score}
    }
};
use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Mutex, MutexGuard}
};

#[derive(Debug, Default, Clone)]
struct Population {
    players: BTreeMap<i32, PlayerRatingState>,
    // (period_id, player_id) keeps results in chronological order
    results: BTreeMap<(i32, i32), Score>,
    history: Vec<RatingHistoryEntry>
}

impl Population {
    fn apply_updates(&mut self, updates: &[RatingUpdate], adjustment_type: RatingAdjustmentType, as_of: DateTime<Utc>) {
        for update in updates {
            let state = self
                .players
                .entry(update.player_id)
                .or_insert_with(|| MemoryStore::default_state(update.player_id));

            state.rating = update.new_rating;
            if adjustment_type == RatingAdjustmentType::Participation {
                state.rated_games_played += 1;
                state.last_active_at = Some(as_of);
            }
        }
    }

    /// Mirrors the (player, period) unique constraint of the postgres schema
    fn check_history<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a RatingHistoryEntry>
    ) -> Result<(), ProcessorError> {
        let mut taken: HashSet<(i32, i32)> = self.history.iter().map(|h| (h.player_id, h.period_id)).collect();

        for entry in entries {
            if !taken.insert((entry.player_id, entry.period_id)) {
                return Err(ProcessorError::Storage(format!(
                    "history entry for player {} in period {} already exists",
                    entry.player_id, entry.period_id
                )));
            }
        }

        Ok(())
    }

    fn history_where(&self, predicate: impl Fn(&RatingHistoryEntry) -> bool) -> Vec<RatingHistoryEntry> {
        let mut entries: Vec<RatingHistoryEntry> = self.history.iter().filter(|h| predicate(h)).cloned().collect();
        entries.sort_by_key(|h| (h.period_id, h.player_id));

        entries
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    populations: Mutex<HashMap<i32, Population>>,
    fail_writes: Mutex<bool>,
    fail_next_write: Mutex<bool>
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Makes every subsequent write fail with [`ProcessorError::Storage`]
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    /// Makes only the next write fail with [`ProcessorError::Storage`]
    pub fn fail_next_write(&self) {
        *self.fail_next_write.lock().unwrap_or_else(|e| e.into_inner()) = true;
    }

    /// Full ledger of a population in insertion order
    pub fn history(&self, population_id: i32) -> Vec<RatingHistoryEntry> {
        self.lock()
            .get(&population_id)
            .map(|p| p.history.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i32, Population>> {
        self.populations.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self) -> Result<(), ProcessorError> {
        if *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(ProcessorError::Storage("writes are disabled".to_string()));
        }

        let mut fail_next = self.fail_next_write.lock().unwrap_or_else(|e| e.into_inner());
        if std::mem::take(&mut *fail_next) {
            return Err(ProcessorError::Storage("write failed".to_string()));
        }

        Ok(())
    }

    fn default_state(player_id: i32) -> PlayerRatingState {
        PlayerRatingState {
            player_id,
            rating: DEFAULT_RATING,
            rated_games_played: 0,
            last_active_at: None
        }
    }
}

impl RatingStore for MemoryStore {
    async fn list_populations(&self) -> Result<Vec<i32>, ProcessorError> {
        let mut ids: Vec<i32> = self
            .lock()
            .iter()
            .filter(|(_, p)| !p.players.is_empty())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();

        Ok(ids)
    }

    async fn fetch_participants(&self, population_id: i32, period_id: i32) -> Result<Vec<PlayerGame>, ProcessorError> {
        let populations = self.lock();
        let Some(population) = populations.get(&population_id) else {
            return Ok(Vec::new());
        };

        Ok(population
            .results
            .range((period_id, i32::MIN)..=(period_id, i32::MAX))
            .map(|(&(_, player_id), &score)| {
                let state = population
                    .players
                    .get(&player_id)
                    .cloned()
                    .unwrap_or_else(|| Self::default_state(player_id));

                PlayerGame {
                    player_id,
                    rating: state.rating,
                    score,
                    games_played: state.rated_games_played
                }
            })
            .collect())
    }

    async fn fetch_active_absentees(
        &self,
        population_id: i32,
        period_id: i32,
        as_of: DateTime<Utc>
    ) -> Result<Vec<AbsentPlayer>, ProcessorError> {
        let populations = self.lock();
        let Some(population) = populations.get(&population_id) else {
            return Ok(Vec::new());
        };

        Ok(population
            .players
            .values()
            .filter(|p| is_active(p.last_active_at, as_of))
            .filter(|p| !population.results.contains_key(&(period_id, p.player_id)))
            .map(|p| AbsentPlayer {
                player_id: p.player_id,
                rating: p.rating,
                games_played: p.rated_games_played
            })
            .collect())
    }

    async fn fetch_inactive_players(
        &self,
        population_id: i32,
        inactive_since: DateTime<Utc>
    ) -> Result<Vec<PlayerRatingState>, ProcessorError> {
        Ok(self
            .lock()
            .get(&population_id)
            .map(|p| {
                p.players
                    .values()
                    .filter(|s| s.last_active_at.is_some_and(|t| t < inactive_since))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_players(&self, population_id: i32) -> Result<Vec<PlayerRatingState>, ProcessorError> {
        Ok(self
            .lock()
            .get(&population_id)
            .map(|p| p.players.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn fetch_results(&self, population_id: i32) -> Result<Vec<GameResult>, ProcessorError> {
        Ok(self
            .lock()
            .get(&population_id)
            .map(|p| {
                p.results
                    .iter()
                    .map(|(&(period_id, player_id), &score)| GameResult {
                        player_id,
                        period_id,
                        score
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn has_history(&self, population_id: i32, period_id: i32) -> Result<bool, ProcessorError> {
        Ok(self
            .lock()
            .get(&population_id)
            .is_some_and(|p| p.history.iter().any(|h| h.period_id == period_id)))
    }

    async fn persist_rating_updates(
        &self,
        population_id: i32,
        updates: &[RatingUpdate],
        adjustment_type: RatingAdjustmentType,
        as_of: DateTime<Utc>
    ) -> Result<(), ProcessorError> {
        self.check_writable()?;

        self.lock()
            .entry(population_id)
            .or_default()
            .apply_updates(updates, adjustment_type, as_of);

        Ok(())
    }

    async fn persist_history_entries(&self, entries: &[RatingHistoryEntry]) -> Result<(), ProcessorError> {
        self.check_writable()?;

        let mut populations = self.lock();
        let mut by_population: BTreeMap<i32, Vec<&RatingHistoryEntry>> = BTreeMap::new();
        for entry in entries {
            by_population.entry(entry.population_id).or_default().push(entry);
        }

        for (population_id, batch) in &by_population {
            populations
                .entry(*population_id)
                .or_default()
                .check_history(batch.iter().copied())?;
        }
        for (population_id, batch) in by_population {
            let population = populations.entry(population_id).or_default();
            population.history.extend(batch.into_iter().cloned());
        }

        Ok(())
    }

    async fn persist_period(
        &self,
        population_id: i32,
        participants: &RatedGroup,
        absentees: &RatedGroup,
        as_of: DateTime<Utc>
    ) -> Result<(), ProcessorError> {
        self.check_writable()?;

        let mut populations = self.lock();
        let population = populations.entry(population_id).or_default();

        population.check_history(participants.history.iter().chain(&absentees.history))?;

        population.apply_updates(&participants.updates, RatingAdjustmentType::Participation, as_of);
        population.apply_updates(&absentees.updates, RatingAdjustmentType::Absence, as_of);
        population
            .history
            .extend(participants.history.iter().chain(&absentees.history).cloned());

        Ok(())
    }

    async fn history_for_player(
        &self,
        population_id: i32,
        player_id: i32
    ) -> Result<Vec<RatingHistoryEntry>, ProcessorError> {
        Ok(self
            .lock()
            .get(&population_id)
            .map(|p| p.history_where(|h| h.player_id == player_id))
            .unwrap_or_default())
    }

    async fn history_for_period(
        &self,
        population_id: i32,
        period_id: i32
    ) -> Result<Vec<RatingHistoryEntry>, ProcessorError> {
        Ok(self
            .lock()
            .get(&population_id)
            .map(|p| p.history_where(|h| h.period_id == period_id))
            .unwrap_or_default())
    }

    async fn history_in(
        &self,
        population_id: i32,
        filter: PeriodFilter
    ) -> Result<Vec<RatingHistoryEntry>, ProcessorError> {
        Ok(self
            .lock()
            .get(&population_id)
            .map(|p| p.history_where(|h| filter.contains(h.period_id)))
            .unwrap_or_default())
    }

    async fn reset_population_ratings(&self, population_id: i32) -> Result<(), ProcessorError> {
        self.check_writable()?;

        if let Some(population) = self.lock().get_mut(&population_id) {
            for state in population.players.values_mut() {
                *state = Self::default_state(state.player_id);
            }
        }

        Ok(())
    }

    async fn clear_history(&self, population_id: i32) -> Result<(), ProcessorError> {
        self.check_writable()?;

        if let Some(population) = self.lock().get_mut(&population_id) {
            population.history.clear();
        }

        Ok(())
    }

    async fn list_periods_chronological(&self, population_id: i32) -> Result<Vec<i32>, ProcessorError> {
        let mut periods: Vec<i32> = self
            .lock()
            .get(&population_id)
            .map(|p| p.results.keys().map(|(period_id, _)| *period_id).collect())
            .unwrap_or_default();
        periods.dedup();

        Ok(periods)
    }

    async fn record_result(&self, population_id: i32, result: GameResult) -> Result<(), ProcessorError> {
        self.check_writable()?;

        let mut populations = self.lock();
        let population = populations.entry(population_id).or_default();
        let key = (result.period_id, result.player_id);

        if population.results.contains_key(&key) {
            return Err(ProcessorError::DuplicateResult {
                player_id: result.player_id,
                period_id: result.period_id
            });
        }

        population.results.insert(key, result.score);
        population
            .players
            .entry(result.player_id)
            .or_insert_with(|| Self::default_state(result.player_id));

        Ok(())
    }
}
