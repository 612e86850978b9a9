//! Unit tests for the indicator entity

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Duration};
use tokio_test::assert_ok;

use tastream::config::RecomputePolicy;
use tastream::engine::{ComputeEngine, EngineError, NumericResult};
use tastream::indicators::{Indicator, IndicatorOptions, UpdateCallback};
use tastream::models::Candle;

/// Engine double that records the call it received and echoes its inputs.
struct StubEngine {
    seen: Mutex<Option<(String, Vec<Vec<f64>>, Vec<f64>)>>,
}

impl StubEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ComputeEngine for StubEngine {
    async fn run(
        &self,
        name: &str,
        inputs: Vec<Vec<f64>>,
        params: Vec<f64>,
    ) -> Result<NumericResult, EngineError> {
        *self.seen.lock().await = Some((name.to_string(), inputs.clone(), params));
        Ok(inputs)
    }
}

fn candle(open_time: i64, close: f64, is_final: bool) -> Candle {
    Candle {
        open_time,
        open: close - 0.5,
        high: close + 1.0,
        low: close - 1.0,
        close,
        base_volume: 10.0,
        quote_volume: close * 10.0,
        trade_count: 3,
        taker_buy_base_volume: 5.0,
        taker_buy_quote_volume: close * 5.0,
        is_final,
    }
}

fn rsi_options() -> IndicatorOptions {
    let mut options = IndicatorOptions::new();
    options.insert("source".to_string(), json!("close"));
    options.insert("period".to_string(), json!(14));
    options
}

fn rsi_indicator(engine: Arc<StubEngine>, policy: RecomputePolicy) -> Indicator {
    Indicator::new("RSI", "BTCUSDT", "1m", rsi_options(), engine, policy, None)
}

fn channel_callback() -> (UpdateCallback, mpsc::UnboundedReceiver<NumericResult>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: UpdateCallback = Box::new(move |result| {
        let _ = tx.send(result);
    });
    (callback, rx)
}

#[tokio::test]
async fn compute_resolves_taxonomy_against_the_series() {
    let engine = StubEngine::new();
    let indicator = rsi_indicator(engine.clone(), RecomputePolicy::EveryTick);
    indicator
        .load_history(vec![candle(0, 100.0, true), candle(60_000, 101.0, true)])
        .await;

    let result = assert_ok!(indicator.compute().await);
    assert_eq!(result, vec![vec![100.0, 101.0]]);

    let seen = engine.seen.lock().await;
    let (name, inputs, params) = seen.as_ref().expect("engine should have been invoked");
    assert_eq!(name, "rsi");
    assert_eq!(inputs, &vec![vec![100.0, 101.0]]);
    assert_eq!(params, &vec![14.0]);
}

#[tokio::test]
async fn entity_fields_are_normalized() {
    let indicator = rsi_indicator(StubEngine::new(), RecomputePolicy::EveryTick);
    assert_eq!(indicator.name(), "rsi");
    assert_eq!(indicator.symbol(), "btcusdt");
    assert_eq!(indicator.subscribe_topic(), "btcusdt@kline_1m");
}

#[tokio::test]
async fn ingest_overwrites_and_fires_the_callback() {
    let indicator = Arc::new(rsi_indicator(StubEngine::new(), RecomputePolicy::EveryTick));
    let (callback, mut rx) = channel_callback();
    indicator.set_callback(callback).await;

    Arc::clone(&indicator).ingest(candle(0, 100.0, false)).await;
    let first = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("callback should fire")
        .expect("channel open");
    assert_eq!(first, vec![vec![100.0]]);

    // Same open time: the stored candle is replaced, not duplicated.
    Arc::clone(&indicator).ingest(candle(0, 105.0, false)).await;
    let second = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("callback should fire")
        .expect("channel open");
    assert_eq!(second, vec![vec![105.0]]);

    assert_eq!(indicator.values("close").await.unwrap(), vec![vec![105.0]]);
}

#[tokio::test]
async fn closed_only_policy_skips_partial_ticks() {
    let indicator = Arc::new(rsi_indicator(StubEngine::new(), RecomputePolicy::ClosedOnly));
    let (callback, mut rx) = channel_callback();
    indicator.set_callback(callback).await;

    Arc::clone(&indicator).ingest(candle(0, 100.0, false)).await;
    assert!(
        timeout(Duration::from_millis(100), rx.recv()).await.is_err(),
        "partial tick must not trigger a recompute"
    );
    // The partial tick is still stored.
    assert_eq!(indicator.values("close").await.unwrap(), vec![vec![100.0]]);

    Arc::clone(&indicator).ingest(candle(0, 101.0, true)).await;
    let result = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("closing tick should trigger a recompute")
        .expect("channel open");
    assert_eq!(result, vec![vec![101.0]]);
}

#[tokio::test]
async fn stop_clears_the_callback_but_keeps_the_series() {
    let indicator = Arc::new(rsi_indicator(StubEngine::new(), RecomputePolicy::EveryTick));
    let (callback, mut rx) = channel_callback();
    indicator.set_callback(callback).await;
    assert!(indicator.has_callback().await);

    indicator.stop().await;
    assert!(!indicator.has_callback().await);

    Arc::clone(&indicator).ingest(candle(0, 100.0, true)).await;
    // Dropping the callback closed the channel; nothing was delivered first.
    let delivery = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("channel should be closed");
    assert!(delivery.is_none(), "stopped indicator must not deliver updates");
    assert_eq!(indicator.values("close").await.unwrap(), vec![vec![100.0]]);
}
