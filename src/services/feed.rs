//! Live data-feed collaborator seam.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::Candle;

/// Feed-side failure, wrapped as `ServiceError::Upstream` by the core.
pub type FeedError = Box<dyn std::error::Error + Send + Sync>;

/// One live candle update, tagged with the topic it arrived on.
#[derive(Debug, Clone)]
pub struct TopicTick {
    pub topic: String,
    pub candle: Candle,
}

/// Market-data provider contract consumed by the indicator service.
///
/// Ticks are delivered over an [`mpsc`] sink rather than a raw callback so
/// that routing and tests stay decoupled from the provider. The provider's
/// own view of its live topics (`active_topics`) is authoritative: the
/// service reconciles against it instead of keeping a private copy.
#[async_trait]
pub trait Feed: Send + Sync {
    /// Historical candles for a symbol and interval, oldest first,
    /// optionally bounded by an end time (epoch milliseconds).
    async fn fetch_history(
        &self,
        symbol: &str,
        interval: &str,
        until: Option<i64>,
    ) -> Result<Vec<Candle>, FeedError>;

    /// Open a live subscription delivering ticks for `topic` into `sink`.
    /// Subscribing an already-live topic is a provider-side no-op.
    async fn subscribe(
        &self,
        topic: &str,
        sink: mpsc::UnboundedSender<TopicTick>,
    ) -> Result<(), FeedError>;

    /// Tear down the live subscription for `topic`.
    async fn unsubscribe(&self, topic: &str) -> Result<(), FeedError>;

    /// Topics currently live on the provider.
    async fn active_topics(&self) -> HashSet<String>;
}
