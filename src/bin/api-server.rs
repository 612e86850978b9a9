//! Tastream API Server
//!
//! Serves the indicator service over HTTP against the simulated feed and
//! the ta-backed compute engine.

use dotenvy::dotenv;
use std::sync::Arc;
use tastream::config::{self, ServiceConfig};
use tastream::core::http;
use tastream::engine::TaComputeEngine;
use tastream::logging;
use tastream::metrics::Metrics;
use tastream::services::{IndicatorService, SimFeed};
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let environment = config::get_environment();
    let service_config = ServiceConfig::from_env();
    let port = config::http_port();

    info!("Starting Tastream API Server");
    info!(environment = %environment, "Environment");
    info!(
        history_limit = service_config.history_limit,
        recompute = ?service_config.recompute,
        "Service configuration"
    );

    let metrics = Arc::new(Metrics::new()?);
    let feed = Arc::new(SimFeed::with_history_len(service_config.history_limit));
    let engine = Arc::new(TaComputeEngine::new());
    let service = Arc::new(IndicatorService::with_metrics(
        feed,
        engine,
        service_config,
        metrics.clone(),
    ));

    tokio::select! {
        result = http::start_server(service, metrics, port) => {
            result?;
        }
        _ = signal::ctrl_c() => {
            info!("Shutting down API server");
        }
    }

    Ok(())
}
