//! In-memory collection of ACTIVE streaming indicators.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::error::ServiceError;
use crate::indicators::{Fingerprint, Indicator};

/// Summary of one ACTIVE indicator, as exposed to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveIndicator {
    pub fingerprint: Fingerprint,
    pub name: String,
    pub symbol: String,
    pub interval: String,
    pub topic: String,
}

/// Fingerprint-keyed registry enforcing at most one instance per identity.
#[derive(Default)]
pub(crate) struct Registry {
    indicators: HashMap<Fingerprint, Arc<Indicator>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, fingerprint: Fingerprint) -> bool {
        self.indicators.contains_key(&fingerprint)
    }

    pub fn get(&self, fingerprint: Fingerprint) -> Option<Arc<Indicator>> {
        self.indicators.get(&fingerprint).cloned()
    }

    /// Register an indicator; fails if its fingerprint is already ACTIVE.
    pub fn insert(&mut self, indicator: Arc<Indicator>) -> Result<(), ServiceError> {
        let fingerprint = indicator.fingerprint();
        if self.contains(fingerprint) {
            return Err(ServiceError::DuplicateIndicator(fingerprint));
        }
        self.indicators.insert(fingerprint, indicator);
        Ok(())
    }

    pub fn remove(&mut self, fingerprint: Fingerprint) -> Option<Arc<Indicator>> {
        self.indicators.remove(&fingerprint)
    }

    /// All indicators subscribed to `topic` — one topic can fan out to
    /// several indicators differing only in name or options.
    pub fn matching(&self, topic: &str) -> Vec<Arc<Indicator>> {
        self.indicators
            .values()
            .filter(|indicator| indicator.subscribe_topic() == topic)
            .cloned()
            .collect()
    }

    /// The set of feed topics the remaining indicators still require.
    pub fn required_topics(&self) -> HashSet<String> {
        self.indicators
            .values()
            .map(|indicator| indicator.subscribe_topic())
            .collect()
    }

    pub fn summaries(&self) -> Vec<ActiveIndicator> {
        self.indicators
            .values()
            .map(|indicator| ActiveIndicator {
                fingerprint: indicator.fingerprint(),
                name: indicator.name().to_string(),
                symbol: indicator.symbol().to_string(),
                interval: indicator.interval().to_string(),
                topic: indicator.subscribe_topic(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }
}
