//! LP-SCOUT: batched DART financial scan for potential LP candidates
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod cache;
pub mod config;
pub mod dart;
pub mod engine;
pub mod export;
pub mod storage;
pub mod types;
