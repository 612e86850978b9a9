//! Compute-engine collaborator seam.
//!
//! The numeric indicator math lives outside this crate: the core hands the
//! engine resolved input arrays and positional parameters and takes back
//! whatever output lines the engine produces.

pub mod ta_engine;

use async_trait::async_trait;

pub use ta_engine::TaComputeEngine;

/// One array per output line (e.g. macd/signal/histogram for `macd`).
pub type NumericResult = Vec<Vec<f64>>;

/// Engine-specific failure: malformed parameters, unsupported indicator.
pub type EngineError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait ComputeEngine: Send + Sync {
    /// Run the named indicator over the given inputs and parameters.
    async fn run(
        &self,
        name: &str,
        inputs: Vec<Vec<f64>>,
        params: Vec<f64>,
    ) -> Result<NumericResult, EngineError>;
}
