//! End-to-end engine behaviour against the in-memory store.

#[path = "../common/mod.rs"]
mod common;

mod replay_tests;
