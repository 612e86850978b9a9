//! Tastream: live technical-analysis indicators over streaming candle data.
//!
//! Clients request an indicator by name, symbol, timeframe and option bag.
//! The service deduplicates identical requests by fingerprint, keeps exactly
//! one live feed subscription per (symbol, interval) pair in use, routes
//! incoming candles to every interested indicator, and recomputes on each
//! relevant tick. The numeric indicator math and the venue wire protocol
//! live behind the [`engine::ComputeEngine`] and [`services::feed::Feed`]
//! seams.

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

pub use error::{ServiceError, ServiceResult};
