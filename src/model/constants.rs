// Rating model constants
pub const DEFAULT_RATING: i32 = 1500;

// K-factor tiers. Newer players move faster.
pub const K_FACTOR_PROVISIONAL: i32 = 80;
pub const K_FACTOR_ESTABLISHING: i32 = 64;
pub const K_FACTOR_ESTABLISHED: i32 = 48;
// Inclusive upper bounds (games played) of the first two tiers
pub const PROVISIONAL_GAMES: i32 = 10;
pub const ESTABLISHING_GAMES: i32 = 30;

pub const MIN_PLAYERS_FOR_RATING: usize = 2;

// A fail (X) is compared and averaged as this value
pub const FAIL_EFFECTIVE_SCORE: i32 = 9;
pub const FAIL_PENALTY: i32 = 3;
pub const DAILY_WINNER_BONUS: i32 = 10;

// Pairwise expected outcome clamp
pub const EXPECTED_SCORE_MIN: f64 = 0.1;
pub const EXPECTED_SCORE_MAX: f64 = 0.9;
pub const ELO_SCALE: f64 = 400.0;

// Absentee penalties
pub const ACTIVE_THRESHOLD_DAYS: i64 = 7;
pub const ABSENT_RATING_FLOOR: i32 = 1000;

// Inactivity decay
pub const DECAY_THRESHOLD_DAYS: i64 = 7;
pub const DECAY_AMOUNT: i32 = 10;
pub const DECAY_FLOOR: i32 = 1200;
