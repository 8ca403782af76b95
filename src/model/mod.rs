pub mod constants;
pub mod decay;
pub mod elo;
pub mod leaderboard;
pub mod processor;
pub mod rating_tracker;
pub mod replay;
pub mod structures;
