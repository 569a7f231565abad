//! Cycle orchestration and scheduling.
//!
//! `cycle` runs one fetch-normalize-persist pass over all four domains;
//! `scheduler` decides when cycles run and exposes the explicit
//! entrypoints an external host drives.

pub mod cycle;
pub mod scheduler;
