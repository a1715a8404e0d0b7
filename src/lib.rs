//! kpiboard library
//!
//! Resolves healthcare KPI indicators from the Sotkanet statistics API with a
//! one hour cache and simulated fallback values, and serves them over HTTP.

pub mod cache;
pub mod cli;
pub mod data;
pub mod logging;
pub mod resolver;
pub mod server;
pub mod sync;
