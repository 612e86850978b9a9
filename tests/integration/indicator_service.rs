//! Integration tests for the indicator service lifecycle:
//! dedup, subscription minimality, routing, and error handling.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use tastream::config::{RecomputePolicy, ServiceConfig};
use tastream::engine::NumericResult;
use tastream::error::ServiceError;
use tastream::indicators::IndicatorOptions;
use tastream::services::{Feed, IndicatorService, RequestOutcome, SimFeed};

use crate::test_utils::*;

async fn add_stream(
    service: &IndicatorService,
    symbol: &str,
    name: &str,
) -> (i32, mpsc::UnboundedReceiver<NumericResult>) {
    let (callback, rx) = channel_callback();
    let outcome = service
        .request(
            symbol,
            "1m",
            name,
            source_options("close", 14),
            Some(backfill(30)),
            Some(callback),
        )
        .await
        .expect("streaming request should succeed");
    match outcome {
        RequestOutcome::Streaming(fingerprint) => (fingerprint, rx),
        RequestOutcome::Computed(_) => panic!("expected a streaming registration"),
    }
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<NumericResult>) -> NumericResult {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("callback should fire")
        .expect("channel open")
}

#[tokio::test]
async fn one_shot_resolves_without_registering() {
    let feed = Arc::new(SimFeed::new());
    // Supplied klines must make the history fetch unnecessary.
    feed.fail_history(true);
    let engine = RecordingEngine::new();
    let service = service_with(feed.clone(), engine.clone());

    let mut options = IndicatorOptions::new();
    options.insert("source".to_string(), json!("close"));
    options.insert("period".to_string(), json!(20));
    options.insert("stdDev".to_string(), json!(2));

    let outcome = service
        .request("ETHUSDT", "5m", "bbands", options, Some(backfill(25)), None)
        .await
        .expect("one-shot request should succeed");

    let closes: Vec<f64> = (0..25).map(|i| 100.0 + i as f64).collect();
    match outcome {
        RequestOutcome::Computed(result) => assert_eq!(result, vec![closes]),
        RequestOutcome::Streaming(_) => panic!("one-shot must not register"),
    }
    assert_eq!(engine.call_count(), 1);
    assert!(feed.active_topics().await.is_empty());
    assert!(service.active().await.is_empty());
}

#[tokio::test]
async fn duplicate_streaming_request_fails() {
    let feed = Arc::new(SimFeed::new());
    let service = service_with(feed, RecordingEngine::new());

    let (fingerprint, _rx) = add_stream(&service, "BTCUSDT", "rsi").await;

    let (callback, _rx2) = channel_callback();
    let result = service
        .request(
            "BTCUSDT",
            "1m",
            "rsi",
            source_options("close", 14),
            Some(backfill(30)),
            Some(callback),
        )
        .await;
    match result {
        Err(ServiceError::DuplicateIndicator(dup)) => assert_eq!(dup, fingerprint),
        other => panic!("expected DuplicateIndicator, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn shared_topic_is_subscribed_once() {
    let feed = Arc::new(SimFeed::new());
    let service = service_with(feed.clone(), RecordingEngine::new());

    let _rsi = add_stream(&service, "BTCUSDT", "rsi").await;
    let _sma = add_stream(&service, "BTCUSDT", "sma").await;
    let _ema = add_stream(&service, "BTCUSDT", "ema").await;

    let topics = feed.active_topics().await;
    assert_eq!(topics.len(), 1);
    assert!(topics.contains("btcusdt@kline_1m"));
}

#[tokio::test]
async fn reconcile_keeps_shared_topics_until_the_last_user_stops() {
    let feed = Arc::new(SimFeed::new());
    let service = service_with(feed.clone(), RecordingEngine::new());

    let (rsi, _rx1) = add_stream(&service, "BTCUSDT", "rsi").await;
    let (sma, _rx2) = add_stream(&service, "BTCUSDT", "sma").await;
    let (eth, _rx3) = add_stream(&service, "ETHUSDT", "rsi").await;
    assert_eq!(feed.active_topics().await.len(), 2);

    service.stop(rsi).await.unwrap();
    let topics = feed.active_topics().await;
    assert!(topics.contains("btcusdt@kline_1m"), "shared topic must survive");
    assert_eq!(topics.len(), 2);

    service.stop(sma).await.unwrap();
    let topics = feed.active_topics().await;
    assert!(!topics.contains("btcusdt@kline_1m"));
    assert!(topics.contains("ethusdt@kline_1m"));

    service.stop(eth).await.unwrap();
    assert!(feed.active_topics().await.is_empty());
}

#[tokio::test]
async fn one_topic_fans_out_and_failures_stay_isolated() {
    let feed = Arc::new(SimFeed::new());
    // The engine rejects `sma`; its sibling on the same topic must be fine.
    let service = service_with(feed.clone(), RecordingEngine::failing_for("sma"));

    let (_rsi, mut rsi_rx) = add_stream(&service, "BTCUSDT", "rsi").await;
    let (_sma, mut sma_rx) = add_stream(&service, "BTCUSDT", "sma").await;

    assert!(feed.push("btcusdt@kline_1m", candle(1_800_000, 130.0, true)).await);

    let result = recv(&mut rsi_rx).await;
    assert_eq!(result[0].last(), Some(&130.0));
    assert!(
        timeout(Duration::from_millis(200), sma_rx.recv()).await.is_err(),
        "failed compute must not invoke the callback"
    );
}

#[tokio::test]
async fn repeated_open_time_keeps_one_candle_with_latest_values() {
    let feed = Arc::new(SimFeed::new());
    let service = service_with(feed.clone(), RecordingEngine::new());

    let (fingerprint, mut rx) = add_stream(&service, "BTCUSDT", "rsi").await;
    let baseline = service.values(fingerprint, "close").await.unwrap()[0].len();

    feed.push("btcusdt@kline_1m", candle(1_800_000, 130.0, false)).await;
    recv(&mut rx).await;
    feed.push("btcusdt@kline_1m", candle(1_800_000, 131.5, false)).await;
    recv(&mut rx).await;

    let closes = &service.values(fingerprint, "close").await.unwrap()[0];
    assert_eq!(closes.len(), baseline + 1);
    assert_eq!(closes.last(), Some(&131.5));
}

#[tokio::test]
async fn failed_backfill_registers_nothing() {
    let feed = Arc::new(SimFeed::new());
    feed.fail_history(true);
    let service = service_with(feed.clone(), RecordingEngine::new());

    let (callback, _rx) = channel_callback();
    let result = service
        .request(
            "BTCUSDT",
            "1m",
            "rsi",
            source_options("close", 14),
            None,
            Some(callback),
        )
        .await;
    assert!(matches!(result, Err(ServiceError::Upstream(_))));
    assert!(service.active().await.is_empty());
    assert!(feed.active_topics().await.is_empty());
}

#[tokio::test]
async fn validation_and_configuration_errors_are_synchronous() {
    let feed = Arc::new(SimFeed::new());
    let service = service_with(feed.clone(), RecordingEngine::new());

    let result = service
        .request("  ", "1m", "rsi", source_options("close", 14), None, None)
        .await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));

    let result = service
        .request("BTCUSDT", "", "rsi", source_options("close", 14), None, None)
        .await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));

    let result = service
        .request("BTCUSDT", "1m", "hl2", IndicatorOptions::new(), None, None)
        .await;
    assert!(matches!(result, Err(ServiceError::Configuration(_))));

    assert!(feed.active_topics().await.is_empty());
}

#[tokio::test]
async fn stop_and_values_on_unknown_fingerprints_fail() {
    let feed = Arc::new(SimFeed::new());
    let service = service_with(feed, RecordingEngine::new());

    assert!(matches!(
        service.stop(12345).await,
        Err(ServiceError::NotFound(12345))
    ));
    assert!(matches!(
        service.values(12345, "close").await,
        Err(ServiceError::NotFound(12345))
    ));
}

#[tokio::test]
async fn rsi_streaming_scenario() {
    let feed = Arc::new(SimFeed::new());
    let engine = RecordingEngine::new();
    let service = service_with(feed.clone(), engine.clone());

    let (fingerprint, mut rx) = add_stream(&service, "BTCUSDT", "rsi").await;

    for i in 0..20 {
        let open_time = 1_800_000 + i * 60_000;
        assert!(
            feed.push("btcusdt@kline_1m", candle(open_time, 130.0 + i as f64, true))
                .await
        );
        let result = recv(&mut rx).await;
        assert_eq!(result[0].last(), Some(&(130.0 + i as f64)));
        assert_eq!(result[0].len(), 30 + 1 + i as usize);
    }
    assert_eq!(engine.call_count(), 20);

    service.stop(fingerprint).await.unwrap();
    assert!(feed.active_topics().await.is_empty());
    assert!(matches!(
        service.values(fingerprint, "close").await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn closed_only_policy_recomputes_on_closing_ticks_only() {
    let feed = Arc::new(SimFeed::new());
    let config = ServiceConfig {
        recompute: RecomputePolicy::ClosedOnly,
        ..ServiceConfig::default()
    };
    let service = IndicatorService::new(feed.clone(), RecordingEngine::new(), config);

    let (callback, mut rx) = channel_callback();
    let outcome = service
        .request(
            "BTCUSDT",
            "1m",
            "rsi",
            source_options("close", 14),
            Some(backfill(30)),
            Some(callback),
        )
        .await
        .unwrap();
    let fingerprint = match outcome {
        RequestOutcome::Streaming(fingerprint) => fingerprint,
        RequestOutcome::Computed(_) => panic!("expected streaming"),
    };

    feed.push("btcusdt@kline_1m", candle(1_800_000, 130.0, false)).await;
    assert!(
        timeout(Duration::from_millis(200), rx.recv()).await.is_err(),
        "partial tick must not recompute under closed-only policy"
    );

    feed.push("btcusdt@kline_1m", candle(1_800_000, 131.0, true)).await;
    let result = recv(&mut rx).await;
    assert_eq!(result[0].last(), Some(&131.0));

    service.stop(fingerprint).await.unwrap();
}
