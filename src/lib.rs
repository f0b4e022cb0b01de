//! ARENA — pari-mutuel battle wagering engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod rules;
pub mod storage;
pub mod types;
