pub mod db;
pub mod db_structs;
pub mod memory;
pub mod store;

pub use store::RatingStore;
