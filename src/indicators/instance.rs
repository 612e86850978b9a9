//! A single live or one-shot indicator instance.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::error;

use crate::config::RecomputePolicy;
use crate::engine::{ComputeEngine, NumericResult};
use crate::error::{ServiceError, ServiceResult};
use crate::indicators::fingerprint::{fingerprint, Fingerprint};
use crate::indicators::series::SeriesStore;
use crate::indicators::taxonomy::{self, IndicatorOptions};
use crate::metrics::Metrics;
use crate::models::Candle;

/// Invoked with each fresh computation result of a streaming indicator.
pub type UpdateCallback = Box<dyn Fn(NumericResult) + Send + Sync>;

/// One indicator instance: owns its candle series and option set, carries a
/// stable fingerprint, and recomputes through the engine collaborator.
///
/// Streaming instances live in the registry with a callback set; one-shot
/// instances are computed once and dropped without ever being registered.
pub struct Indicator {
    name: String,
    symbol: String,
    interval: String,
    options: IndicatorOptions,
    fingerprint: Fingerprint,
    policy: RecomputePolicy,
    engine: Arc<dyn ComputeEngine>,
    metrics: Option<Arc<Metrics>>,
    series: RwLock<SeriesStore>,
    callback: RwLock<Option<UpdateCallback>>,
}

impl Indicator {
    pub fn new(
        name: &str,
        symbol: &str,
        interval: &str,
        options: IndicatorOptions,
        engine: Arc<dyn ComputeEngine>,
        policy: RecomputePolicy,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let fingerprint = fingerprint(symbol, interval, name, &options);
        Self {
            name: name.to_lowercase(),
            symbol: symbol.to_lowercase(),
            interval: interval.to_string(),
            options,
            fingerprint,
            policy,
            engine,
            metrics,
            series: RwLock::new(SeriesStore::new()),
            callback: RwLock::new(None),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    /// Live-feed subscription key for this indicator's candle stream.
    pub fn subscribe_topic(&self) -> String {
        format!("{}@kline_{}", self.symbol, self.interval)
    }

    pub async fn set_callback(&self, callback: UpdateCallback) {
        *self.callback.write().await = Some(callback);
    }

    pub async fn has_callback(&self) -> bool {
        self.callback.read().await.is_some()
    }

    /// Bulk-load historical backfill into the series.
    pub async fn load_history(&self, candles: Vec<Candle>) {
        self.series.write().await.extend(candles);
    }

    /// Series arrays for a field selector (see [`SeriesStore::values`]).
    pub async fn values(&self, selector: &str) -> ServiceResult<Vec<Vec<f64>>> {
        self.series.read().await.values(selector)
    }

    /// Recompute over the full current series. No caching: the series is
    /// bounded by the requested history, so every call resolves the
    /// taxonomy afresh and delegates to the engine.
    pub async fn compute(&self) -> ServiceResult<NumericResult> {
        let shape = taxonomy::shape(&self.name).ok_or_else(|| {
            ServiceError::Configuration(format!("unknown indicator `{}`", self.name))
        })?;

        let (inputs, params) = {
            let series = self.series.read().await;
            let inputs = taxonomy::resolve_inputs(&self.name, &shape, &self.options, &series)?;
            let params = taxonomy::resolve_params(&self.name, &shape, &self.options)?;
            (inputs, params)
        };

        let result = self
            .engine
            .run(&self.name, inputs, params)
            .await
            .map_err(ServiceError::upstream);

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(_) => metrics.computes_total.inc(),
                Err(_) => metrics.compute_failures_total.inc(),
            }
        }
        result
    }

    /// Store a live candle, overwriting any candle with the same open time,
    /// then trigger a recompute if a callback is registered and the policy
    /// admits this tick.
    ///
    /// The recompute is fire-and-forget: the feed path never waits on it,
    /// and a failure is logged without disturbing sibling indicators. A
    /// `stop` racing an in-flight recompute may still see one final
    /// callback delivery.
    pub async fn ingest(self: Arc<Self>, candle: Candle) {
        let admits = match self.policy {
            RecomputePolicy::EveryTick => true,
            RecomputePolicy::ClosedOnly => candle.is_final,
        };

        self.series.write().await.put(candle);

        if !admits || !self.has_callback().await {
            return;
        }

        let indicator = Arc::clone(&self);
        tokio::spawn(async move {
            match indicator.compute().await {
                Ok(result) => {
                    if let Some(callback) = indicator.callback.read().await.as_ref() {
                        callback(result);
                    }
                }
                Err(e) => {
                    error!(
                        fingerprint = indicator.fingerprint,
                        name = %indicator.name,
                        error = %e,
                        "ingest-triggered recompute failed"
                    );
                }
            }
        });
    }

    /// Clear the callback, marking the indicator streaming-inactive. The
    /// series is kept; removal from the registry is the caller's job.
    pub async fn stop(&self) {
        *self.callback.write().await = None;
    }
}
