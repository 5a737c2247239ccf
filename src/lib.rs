//! inspection-dispatch core
//!
//! Assigns inspection routes to field inspectors and orders the stops of
//! each route. Storage, zone lookup and distances come in through the
//! traits in [`traits`].

pub mod assignment;
pub mod config;
pub mod error;
pub mod haversine;
pub mod models;
pub mod optimizer;
pub mod osrm;
pub mod planner;
pub mod schedule;
pub mod scoring;
pub mod sequencer;
pub mod traits;
pub mod workload;
