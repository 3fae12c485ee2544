//! tierwise-core: Adaptive evaluation engine.
//!
//! This crate turns a student's solving history for a topic into four
//! normalized sub-scores, a weighted total, and a level-transition decision.
//! Everything here is a pure computation over attempts and configuration;
//! storage is reached only through the traits in [`traits`].

pub mod attempts;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod model;
pub mod motivation;
pub mod parser;
pub mod penalty;
pub mod report;
pub mod results;
pub mod scoring;
pub mod statistics;
pub mod traits;
pub mod transition;
