//! Stream a live RSI over the simulated feed.
//!
//! Registers one streaming indicator, injects twenty live ticks, and prints
//! the freshest RSI value after each recomputation.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tastream::config::ServiceConfig;
use tastream::engine::TaComputeEngine;
use tastream::indicators::{IndicatorOptions, UpdateCallback};
use tastream::services::sim_feed::synth_series;
use tastream::services::{Feed, IndicatorService, RequestOutcome, SimFeed};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let feed = Arc::new(SimFeed::with_history_len(120));
    let engine = Arc::new(TaComputeEngine::new());
    let service = IndicatorService::new(feed.clone(), engine, ServiceConfig::default());

    // History passthrough, bounded one minute back.
    let until = (Utc::now() - Duration::minutes(1)).timestamp_millis();
    let history = service.history("BTCUSDT", "1m", Some(until)).await?;
    if let Some(last) = history.last() {
        println!(
            "fetched {} historical candles, last close {:.2} at {}",
            history.len(),
            last.close,
            last.open_time_utc()
                .map(|t| t.to_rfc3339())
                .unwrap_or_default()
        );
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let callback: UpdateCallback = Box::new(move |result| {
        let _ = tx.send(result);
    });

    let mut options = IndicatorOptions::new();
    options.insert("source".to_string(), json!("close"));
    options.insert("period".to_string(), json!(14));

    let outcome = service
        .request("BTCUSDT", "1m", "rsi", options, None, Some(callback))
        .await?;
    let fingerprint = match outcome {
        RequestOutcome::Streaming(fingerprint) => fingerprint,
        RequestOutcome::Computed(_) => return Err("expected a streaming registration".into()),
    };
    println!("streaming rsi registered with fingerprint {}", fingerprint);

    // Inject live ticks continuing past the backfilled series.
    let topic = "btcusdt@kline_1m";
    let ticks = synth_series(140, 60_000, None).split_off(120);
    for candle in ticks {
        feed.push(topic, candle).await;
        if let Some(result) = rx.recv().await {
            let latest = result
                .first()
                .and_then(|line| line.last())
                .copied()
                .unwrap_or(f64::NAN);
            println!("rsi -> {:.2}", latest);
        }
    }

    service.stop(fingerprint).await?;
    println!("stopped; active topics: {:?}", feed.active_topics().await);

    Ok(())
}
