//! Environment-driven configuration.

use std::env;

/// Current deployment environment, from `ENVIRONMENT` (default "sandbox").
pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

/// When a live tick triggers an indicator recompute.
///
/// `EveryTick` recomputes on partial updates too; `ClosedOnly` limits
/// recomputation to ticks that close the candle (`is_final`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputePolicy {
    EveryTick,
    ClosedOnly,
}

impl RecomputePolicy {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "every-tick" => Some(Self::EveryTick),
            "closed-only" => Some(Self::ClosedOnly),
            _ => None,
        }
    }
}

/// Configuration for the indicator service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Number of historical candles requested on backfill.
    pub history_limit: usize,
    pub recompute: RecomputePolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            history_limit: 250,
            recompute: RecomputePolicy::EveryTick,
        }
    }
}

impl ServiceConfig {
    /// Build from `HISTORY_LIMIT` and `RECOMPUTE_POLICY`, falling back to
    /// defaults for unset or unparseable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let history_limit = env::var("HISTORY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.history_limit);
        let recompute = env::var("RECOMPUTE_POLICY")
            .ok()
            .and_then(|v| RecomputePolicy::parse(&v))
            .unwrap_or(defaults.recompute);
        Self {
            history_limit,
            recompute,
        }
    }
}

/// HTTP port for the API server, from `PORT` (default 3000).
pub fn http_port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000)
}
