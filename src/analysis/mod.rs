//! Deterministic aggregation and post-processing of agent outputs.

pub mod advanced;
pub mod aggregator;
pub mod benchmarks;
pub mod sanity;
