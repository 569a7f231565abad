//! MarketPulse — multi-source financial metrics poller.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod adapters;
pub mod config;
pub mod engine;
pub mod format;
pub mod keys;
pub mod net;
pub mod storage;
pub mod types;
