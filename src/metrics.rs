//! Prometheus metrics for the indicator service and its HTTP surface.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    pub indicators_active: IntGauge,
    pub subscriptions_active: IntGauge,
    pub feed_ticks_total: IntCounter,
    pub computes_total: IntCounter,
    pub compute_failures_total: IntCounter,
    pub http_requests_total: IntCounter,
    pub http_requests_in_flight: IntGauge,
    pub http_request_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let indicators_active = IntGauge::new(
            "tastream_indicators_active",
            "Streaming indicators currently registered",
        )?;
        let subscriptions_active = IntGauge::new(
            "tastream_subscriptions_active",
            "Live feed topics currently subscribed",
        )?;
        let feed_ticks_total = IntCounter::new(
            "tastream_feed_ticks_total",
            "Live candle ticks received from the feed",
        )?;
        let computes_total = IntCounter::new(
            "tastream_computes_total",
            "Successful indicator computations",
        )?;
        let compute_failures_total = IntCounter::new(
            "tastream_compute_failures_total",
            "Failed indicator computations",
        )?;
        let http_requests_total =
            IntCounter::new("tastream_http_requests_total", "HTTP requests served")?;
        let http_requests_in_flight = IntGauge::new(
            "tastream_http_requests_in_flight",
            "HTTP requests currently in flight",
        )?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "tastream_http_request_duration_seconds",
            "HTTP request latency in seconds",
        ))?;

        registry.register(Box::new(indicators_active.clone()))?;
        registry.register(Box::new(subscriptions_active.clone()))?;
        registry.register(Box::new(feed_ticks_total.clone()))?;
        registry.register(Box::new(computes_total.clone()))?;
        registry.register(Box::new(compute_failures_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            indicators_active,
            subscriptions_active,
            feed_ticks_total,
            computes_total,
            compute_failures_total,
            http_requests_total,
            http_requests_in_flight,
            http_request_duration_seconds,
        })
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
