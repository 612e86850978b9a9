//! Compute engine backed by the `ta` crate.
//!
//! Covers the source-driven subset of the taxonomy; everything else fails
//! with an engine-specific error so callers can surface it as an upstream
//! failure. Output arrays drop the warm-up prefix of each indicator.

use async_trait::async_trait;

use ta::indicators::{
    BollingerBands, ExponentialMovingAverage, Maximum, Minimum,
    MovingAverageConvergenceDivergence, RateOfChange, RelativeStrengthIndex,
    SimpleMovingAverage, StandardDeviation,
};
use ta::Next;

use super::{ComputeEngine, EngineError, NumericResult};

#[derive(Debug, Default)]
pub struct TaComputeEngine;

impl TaComputeEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ComputeEngine for TaComputeEngine {
    async fn run(
        &self,
        name: &str,
        inputs: Vec<Vec<f64>>,
        params: Vec<f64>,
    ) -> Result<NumericResult, EngineError> {
        match name.to_lowercase().as_str() {
            "sma" => {
                let (input, period) = source_and_period(name, &inputs, &params)?;
                let mut sma = SimpleMovingAverage::new(period)
                    .map_err(|_| invalid_params(name, &params))?;
                Ok(vec![stream(input, period.saturating_sub(1), |v| {
                    sma.next(v)
                })])
            }
            "ema" => {
                let (input, period) = source_and_period(name, &inputs, &params)?;
                let mut ema = ExponentialMovingAverage::new(period)
                    .map_err(|_| invalid_params(name, &params))?;
                Ok(vec![stream(input, 0, |v| ema.next(v))])
            }
            "rsi" => {
                let (input, period) = source_and_period(name, &inputs, &params)?;
                let mut rsi = RelativeStrengthIndex::new(period)
                    .map_err(|_| invalid_params(name, &params))?;
                Ok(vec![stream(input, period, |v| rsi.next(v))])
            }
            "roc" => {
                let (input, period) = source_and_period(name, &inputs, &params)?;
                let mut roc =
                    RateOfChange::new(period).map_err(|_| invalid_params(name, &params))?;
                Ok(vec![stream(input, period, |v| roc.next(v))])
            }
            "stddev" => {
                let (input, period) = source_and_period(name, &inputs, &params)?;
                let mut stddev = StandardDeviation::new(period)
                    .map_err(|_| invalid_params(name, &params))?;
                Ok(vec![stream(input, period.saturating_sub(1), |v| {
                    stddev.next(v)
                })])
            }
            "min" => {
                let (input, period) = source_and_period(name, &inputs, &params)?;
                let mut min = Minimum::new(period).map_err(|_| invalid_params(name, &params))?;
                Ok(vec![stream(input, period.saturating_sub(1), |v| {
                    min.next(v)
                })])
            }
            "max" => {
                let (input, period) = source_and_period(name, &inputs, &params)?;
                let mut max = Maximum::new(period).map_err(|_| invalid_params(name, &params))?;
                Ok(vec![stream(input, period.saturating_sub(1), |v| {
                    max.next(v)
                })])
            }
            "macd" => {
                let input = single_input(name, &inputs)?;
                let short = period_param(name, &params, 0)?;
                let long = period_param(name, &params, 1)?;
                let signal = period_param(name, &params, 2)?;
                let mut macd = MovingAverageConvergenceDivergence::new(short, long, signal)
                    .map_err(|_| invalid_params(name, &params))?;

                let skip = long.saturating_sub(1);
                let mut lines = vec![Vec::new(), Vec::new(), Vec::new()];
                for (i, &value) in input.iter().enumerate() {
                    let out = macd.next(value);
                    if i >= skip {
                        lines[0].push(out.macd);
                        lines[1].push(out.signal);
                        lines[2].push(out.histogram);
                    }
                }
                Ok(lines)
            }
            "bbands" => {
                let input = single_input(name, &inputs)?;
                let period = period_param(name, &params, 0)?;
                let std_dev = *params
                    .get(1)
                    .filter(|sd| **sd > 0.0)
                    .ok_or_else(|| invalid_params(name, &params))?;
                let mut bbands = BollingerBands::new(period, std_dev)
                    .map_err(|_| invalid_params(name, &params))?;

                let skip = period.saturating_sub(1);
                let mut lines = vec![Vec::new(), Vec::new(), Vec::new()];
                for (i, &value) in input.iter().enumerate() {
                    let out = bbands.next(value);
                    if i >= skip {
                        lines[0].push(out.lower);
                        lines[1].push(out.average);
                        lines[2].push(out.upper);
                    }
                }
                Ok(lines)
            }
            other => Err(format!("indicator `{}` is not supported by the ta engine", other).into()),
        }
    }
}

/// Feed every value through the indicator, keeping outputs past the warm-up.
fn stream(input: &[f64], skip: usize, mut next: impl FnMut(f64) -> f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(input.len().saturating_sub(skip));
    for (i, &value) in input.iter().enumerate() {
        let computed = next(value);
        if i >= skip {
            out.push(computed);
        }
    }
    out
}

fn single_input<'a>(name: &str, inputs: &'a [Vec<f64>]) -> Result<&'a [f64], EngineError> {
    match inputs {
        [input] => Ok(input),
        _ => Err(format!(
            "indicator `{}` expects exactly one input series, got {}",
            name,
            inputs.len()
        )
        .into()),
    }
}

fn source_and_period<'a>(
    name: &str,
    inputs: &'a [Vec<f64>],
    params: &[f64],
) -> Result<(&'a [f64], usize), EngineError> {
    Ok((single_input(name, inputs)?, period_param(name, params, 0)?))
}

fn period_param(name: &str, params: &[f64], index: usize) -> Result<usize, EngineError> {
    params
        .get(index)
        .filter(|p| **p >= 1.0 && p.fract() == 0.0)
        .map(|p| *p as usize)
        .ok_or_else(|| invalid_params(name, params))
}

fn invalid_params(name: &str, params: &[f64]) -> EngineError {
    format!("invalid parameters {:?} for indicator `{}`", params, name).into()
}
