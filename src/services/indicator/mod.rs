//! Indicator service facade: request validation, dedup, lifecycle, routing.

mod registry;
mod subscriptions;

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ServiceConfig;
use crate::engine::{ComputeEngine, NumericResult};
use crate::error::{ServiceError, ServiceResult};
use crate::indicators::{taxonomy, Fingerprint, Indicator, IndicatorOptions, UpdateCallback};
use crate::metrics::Metrics;
use crate::models::Candle;
use crate::services::feed::{Feed, TopicTick};

pub use registry::ActiveIndicator;
use registry::Registry;
use subscriptions::SubscriptionManager;

/// What a request produced: a single computation, or a live registration.
#[derive(Debug)]
pub enum RequestOutcome {
    /// One-shot mode: the result of a single computation. The indicator was
    /// never registered or subscribed.
    Computed(NumericResult),
    /// Streaming mode: the fingerprint handle of the registered indicator.
    Streaming(Fingerprint),
}

/// Public entry point over the registry, the subscription manager, and the
/// feed/engine collaborators.
///
/// Registry mutations are serialized behind one `RwLock`: `stop` holds the
/// write lock across its unregister-then-reconcile sequence, so a tick
/// dequeued afterwards can no longer reach the stopped indicator. The
/// duplicate check in `request` is re-run under the write lock at insertion;
/// beyond that, concurrent same-fingerprint requests keep the documented
/// at-most-one-registered guarantee, not full atomicity.
pub struct IndicatorService {
    feed: Arc<dyn Feed>,
    engine: Arc<dyn ComputeEngine>,
    config: ServiceConfig,
    metrics: Option<Arc<Metrics>>,
    registry: Arc<RwLock<Registry>>,
    subscriptions: SubscriptionManager,
    tick_tx: mpsc::UnboundedSender<TopicTick>,
    router: JoinHandle<()>,
}

impl IndicatorService {
    pub fn new(feed: Arc<dyn Feed>, engine: Arc<dyn ComputeEngine>, config: ServiceConfig) -> Self {
        Self::build(feed, engine, config, None)
    }

    pub fn with_metrics(
        feed: Arc<dyn Feed>,
        engine: Arc<dyn ComputeEngine>,
        config: ServiceConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self::build(feed, engine, config, Some(metrics))
    }

    fn build(
        feed: Arc<dyn Feed>,
        engine: Arc<dyn ComputeEngine>,
        config: ServiceConfig,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(RwLock::new(Registry::new()));
        let router = spawn_router(Arc::clone(&registry), tick_rx, metrics.clone());

        Self {
            subscriptions: SubscriptionManager::new(Arc::clone(&feed)),
            feed,
            engine,
            config,
            metrics,
            registry,
            tick_tx,
            router,
        }
    }

    /// Request an indicator.
    ///
    /// Without a callback this is one-shot: the series is seeded, one
    /// computation runs, and nothing is registered or subscribed. With a
    /// callback the indicator is registered under its fingerprint, the feed
    /// topic is subscribed if not already live, and the fingerprint handle
    /// is returned.
    ///
    /// Seeding uses the supplied klines when non-empty, otherwise fetches
    /// history from the feed. Any failure up to that point leaves no state
    /// behind: no registration, no subscription.
    pub async fn request(
        &self,
        symbol: &str,
        interval: &str,
        name: &str,
        options: IndicatorOptions,
        klines: Option<Vec<Candle>>,
        callback: Option<UpdateCallback>,
    ) -> ServiceResult<RequestOutcome> {
        require(symbol, "symbol")?;
        require(interval, "interval")?;
        require(name, "name")?;
        if taxonomy::shape(name).is_none() {
            return Err(ServiceError::Configuration(format!(
                "unknown indicator `{}`",
                name.to_lowercase()
            )));
        }

        let indicator = Indicator::new(
            name,
            symbol,
            interval,
            options,
            Arc::clone(&self.engine),
            self.config.recompute,
            self.metrics.clone(),
        );
        let fingerprint = indicator.fingerprint();

        if self.registry.read().await.contains(fingerprint) {
            return Err(ServiceError::DuplicateIndicator(fingerprint));
        }

        match klines {
            Some(rows) if !rows.is_empty() => indicator.load_history(rows).await,
            _ => {
                let mut rows = self
                    .feed
                    .fetch_history(indicator.symbol(), indicator.interval(), None)
                    .await
                    .map_err(ServiceError::upstream)?;
                if rows.len() > self.config.history_limit {
                    rows = rows.split_off(rows.len() - self.config.history_limit);
                }
                indicator.load_history(rows).await;
            }
        }

        let Some(callback) = callback else {
            let result = indicator.compute().await?;
            debug!(fingerprint, name = %indicator.name(), "one-shot indicator computed");
            return Ok(RequestOutcome::Computed(result));
        };

        indicator.set_callback(callback).await;
        let indicator = Arc::new(indicator);
        let topic = indicator.subscribe_topic();

        self.registry
            .write()
            .await
            .insert(Arc::clone(&indicator))?;

        if let Err(e) = self.subscriptions.ensure(&topic, &self.tick_tx).await {
            // keep registration all-or-nothing
            self.registry.write().await.remove(fingerprint);
            return Err(e);
        }

        self.update_gauges().await;
        info!(
            fingerprint,
            name = %indicator.name(),
            topic = %topic,
            "streaming indicator registered"
        );
        Ok(RequestOutcome::Streaming(fingerprint))
    }

    /// Stop a streaming indicator: clear its callback, unregister it, and
    /// unsubscribe every feed topic no remaining indicator requires.
    pub async fn stop(&self, fingerprint: Fingerprint) -> ServiceResult<()> {
        let mut registry = self.registry.write().await;
        let indicator = registry
            .remove(fingerprint)
            .ok_or(ServiceError::NotFound(fingerprint))?;
        indicator.stop().await;

        let required = registry.required_topics();
        self.subscriptions.reconcile(&required).await?;
        drop(registry);

        self.update_gauges().await;
        info!(fingerprint, "streaming indicator stopped");
        Ok(())
    }

    /// Series arrays of an ACTIVE indicator for a field selector.
    pub async fn values(
        &self,
        fingerprint: Fingerprint,
        selector: &str,
    ) -> ServiceResult<Vec<Vec<f64>>> {
        let indicator = self
            .registry
            .read()
            .await
            .get(fingerprint)
            .ok_or(ServiceError::NotFound(fingerprint))?;
        indicator.values(selector).await
    }

    /// Summaries of all ACTIVE indicators.
    pub async fn active(&self) -> Vec<ActiveIndicator> {
        self.registry.read().await.summaries()
    }

    /// Raw historical candles, passed through from the feed.
    pub async fn history(
        &self,
        symbol: &str,
        interval: &str,
        until: Option<i64>,
    ) -> ServiceResult<Vec<Candle>> {
        require(symbol, "symbol")?;
        require(interval, "interval")?;
        self.feed
            .fetch_history(symbol, interval, until)
            .await
            .map_err(ServiceError::upstream)
    }

    async fn update_gauges(&self) {
        if let Some(metrics) = &self.metrics {
            metrics
                .indicators_active
                .set(self.registry.read().await.len() as i64);
            metrics
                .subscriptions_active
                .set(self.subscriptions.active_count().await as i64);
        }
    }
}

impl Drop for IndicatorService {
    fn drop(&mut self) {
        self.router.abort();
    }
}

/// Route each live tick to every ACTIVE indicator on its topic.
fn spawn_router(
    registry: Arc<RwLock<Registry>>,
    mut tick_rx: mpsc::UnboundedReceiver<TopicTick>,
    metrics: Option<Arc<Metrics>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(tick) = tick_rx.recv().await {
            if let Some(metrics) = &metrics {
                metrics.feed_ticks_total.inc();
            }
            let targets = registry.read().await.matching(&tick.topic);
            for indicator in targets {
                indicator.ingest(tick.candle.clone()).await;
            }
        }
    })
}

fn require(value: &str, field: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!(
            "{} is not defined",
            field
        )));
    }
    Ok(())
}
