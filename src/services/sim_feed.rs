//! In-memory feed implementation for tests, demos and local runs.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::models::Candle;
use crate::services::feed::{Feed, FeedError, TopicTick};

/// Deterministic stand-in for a venue data feed.
///
/// History is served from presets loaded with [`SimFeed::set_history`], or
/// synthesized as a sine-wave series when no preset exists. Live ticks are
/// injected manually with [`SimFeed::push`]. No wire protocol is involved.
pub struct SimFeed {
    sinks: RwLock<HashMap<String, mpsc::UnboundedSender<TopicTick>>>,
    history: RwLock<HashMap<String, Vec<Candle>>>,
    history_len: usize,
    fail_history: AtomicBool,
}

impl SimFeed {
    pub fn new() -> Self {
        Self::with_history_len(250)
    }

    pub fn with_history_len(history_len: usize) -> Self {
        Self {
            sinks: RwLock::new(HashMap::new()),
            history: RwLock::new(HashMap::new()),
            history_len,
            fail_history: AtomicBool::new(false),
        }
    }

    /// Preset the historical series served for a symbol and interval.
    pub async fn set_history(&self, symbol: &str, interval: &str, candles: Vec<Candle>) {
        self.history
            .write()
            .await
            .insert(history_key(symbol, interval), candles);
    }

    /// Make subsequent `fetch_history` calls fail (upstream-error testing).
    pub fn fail_history(&self, fail: bool) {
        self.fail_history.store(fail, Ordering::SeqCst);
    }

    /// Deliver a live tick to the topic's subscriber, if any. Returns
    /// whether a subscriber received it.
    pub async fn push(&self, topic: &str, candle: Candle) -> bool {
        let sinks = self.sinks.read().await;
        match sinks.get(topic) {
            Some(sink) => sink
                .send(TopicTick {
                    topic: topic.to_string(),
                    candle,
                })
                .is_ok(),
            None => false,
        }
    }
}

impl Default for SimFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Feed for SimFeed {
    async fn fetch_history(
        &self,
        symbol: &str,
        interval: &str,
        until: Option<i64>,
    ) -> Result<Vec<Candle>, FeedError> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err("history backfill unavailable".into());
        }

        if let Some(preset) = self.history.read().await.get(&history_key(symbol, interval)) {
            return Ok(preset.clone());
        }

        let step = interval_to_ms(interval);
        Ok(synth_series(self.history_len, step, until))
    }

    async fn subscribe(
        &self,
        topic: &str,
        sink: mpsc::UnboundedSender<TopicTick>,
    ) -> Result<(), FeedError> {
        let mut sinks = self.sinks.write().await;
        if !sinks.contains_key(topic) {
            debug!(topic = %topic, "sim feed: topic subscribed");
            sinks.insert(topic.to_string(), sink);
        }
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), FeedError> {
        let mut sinks = self.sinks.write().await;
        if sinks.remove(topic).is_some() {
            debug!(topic = %topic, "sim feed: topic unsubscribed");
        }
        Ok(())
    }

    async fn active_topics(&self) -> HashSet<String> {
        self.sinks.read().await.keys().cloned().collect()
    }
}

fn history_key(symbol: &str, interval: &str) -> String {
    format!("{}_{}", symbol.to_lowercase(), interval)
}

/// Interval step in milliseconds ("30s", "1m", "4h", "1d", "1w").
/// Unparseable intervals fall back to one minute.
pub fn interval_to_ms(interval: &str) -> i64 {
    let (digits, unit) = interval.split_at(interval.len().saturating_sub(1));
    let scale = match unit {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 604_800_000,
        _ => return 60_000,
    };
    digits
        .parse::<i64>()
        .map(|n| n.max(1) * scale)
        .unwrap_or(60_000)
}

/// Deterministic sine-wave candle series, oldest first, all candles final.
/// The last candle opens at `until` rounded down to the step, when given.
pub fn synth_series(len: usize, step_ms: i64, until: Option<i64>) -> Vec<Candle> {
    let last_open = until
        .map(|t| (t / step_ms) * step_ms)
        .unwrap_or(len as i64 * step_ms);
    let first_open = last_open - (len as i64 - 1) * step_ms;

    let mut candles = Vec::with_capacity(len);
    let mut prev_close: f64 = 100.0;
    for i in 0..len {
        let close = 100.0 + 5.0 * ((i as f64) * 0.35).sin();
        let high = prev_close.max(close) + 0.5;
        let low = prev_close.min(close) - 0.5;
        let base_volume = 10.0 + 2.0 * ((i as f64) * 0.2).cos();
        candles.push(Candle {
            open_time: first_open + i as i64 * step_ms,
            open: prev_close,
            high,
            low,
            close,
            base_volume,
            quote_volume: base_volume * close,
            trade_count: 40,
            taker_buy_base_volume: base_volume / 2.0,
            taker_buy_quote_volume: base_volume * close / 2.0,
            is_final: true,
        });
        prev_close = close;
    }
    candles
}
