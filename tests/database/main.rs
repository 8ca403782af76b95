//! PostgreSQL store tests. These start a container and are ignored unless
//! run with `--ignored` on a machine with Docker.

#[path = "../common/mod.rs"]
mod common;

mod db_tests;
mod test_helpers;
