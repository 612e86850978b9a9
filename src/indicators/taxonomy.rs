//! Closed indicator taxonomy: name → required input shape and parameters.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::ServiceError;
use crate::indicators::series::SeriesStore;

/// Request option bag. `BTreeMap` keeps serialization canonical (sorted
/// keys), which the fingerprint relies on.
pub type IndicatorOptions = BTreeMap<String, Value>;

/// How an indicator's input series are assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSpec {
    /// A fixed compound selector: `HL`, `HLC`, `HLCV`, `HLV`, `CV`, `OHLC`.
    Selector(&'static str),
    /// `[volume]`.
    VolumeOnly,
    /// `[open, close]`.
    OpenClose,
    /// One series named by the `source` option.
    Source,
    /// Two series named by the `source1` and `source2` options.
    DualSource,
}

/// Input shape plus the option keys that become positional parameters.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorShape {
    pub inputs: InputSpec,
    pub params: &'static [&'static str],
}

const fn shape_of(inputs: InputSpec, params: &'static [&'static str]) -> IndicatorShape {
    IndicatorShape { inputs, params }
}

/// Look up an indicator name (case-insensitive) in the closed taxonomy.
/// Unknown names resolve to `None`; callers reject them as a configuration
/// error rather than passing them downstream.
pub fn shape(name: &str) -> Option<IndicatorShape> {
    use InputSpec::*;

    let name = name.to_lowercase();
    let shape = match name.as_str() {
        "adosc" | "kvo" => shape_of(Selector("HLCV"), &["shortPeriod", "longPeriod"]),
        "apo" | "ppo" => shape_of(Source, &["shortPeriod", "longPeriod"]),
        "bbands" => shape_of(Source, &["period", "stdDev"]),
        "vidya" => shape_of(Source, &["shortPeriod", "longPeriod", "alpha"]),
        "macd" => shape_of(Source, &["shortPeriod", "longPeriod", "signalPeriod"]),
        "mfi" => shape_of(Selector("HLCV"), &["period"]),
        "nvi" | "obv" | "pvi" => shape_of(Selector("CV"), &[]),
        "vwma" => shape_of(Selector("CV"), &["period"]),
        "psar" => shape_of(
            Selector("HL"),
            &["accelerationFactorStep", "accelerationFactorMaximum"],
        ),
        "qstick" => shape_of(OpenClose, &["period"]),
        "stoch" => shape_of(Selector("HLC"), &["kPeriod", "kSlowingPeriod", "dPeriod"]),
        "ultosc" => shape_of(Selector("HLC"), &["shortPeriod", "mediumPeriod", "longPeriod"]),
        "vosc" => shape_of(VolumeOnly, &["shortPeriod", "longPeriod"]),

        "ao" | "medprice" => shape_of(Selector("HL"), &[]),
        "aroon" | "aroonosc" | "mass" | "cvi" | "dm" | "fisher" => {
            shape_of(Selector("HL"), &["period"])
        }
        "emv" | "marketfi" => shape_of(Selector("HLV"), &[]),

        "tr" | "typprice" | "wad" | "wcprice" => shape_of(Selector("HLC"), &[]),
        "ad" => shape_of(Selector("HLCV"), &[]),
        "adx" | "adxr" | "atr" | "cci" | "di" | "dx" | "natr" | "willr" => {
            shape_of(Selector("HLC"), &["period"])
        }

        "avgprice" => shape_of(Selector("OHLC"), &[]),

        "abs" | "acos" | "asin" | "atan" | "ceil" | "cos" | "cosh" | "floor" | "exp" | "ln"
        | "log10" | "round" | "sin" | "sinh" | "sqrt" | "tan" | "tanh" | "todeg" | "torad"
        | "trunc" => shape_of(Source, &[]),

        "decay" | "dema" | "dpo" | "cmo" | "edecay" | "ema" | "fosc" | "hma" | "kama" | "lag"
        | "linreg" | "linregintercept" | "linregslope" | "max" | "md" | "min" | "mom" | "msw"
        | "roc" | "rocr" | "rsi" | "sma" | "stddev" | "stderr" | "stochrsi" | "sum" | "tema"
        | "trima" | "trix" | "tsf" | "var" | "vhf" | "volatility" | "wilders" | "wma"
        | "zlema" => shape_of(Source, &["period"]),

        "add" | "crossany" | "crossover" | "div" | "mul" | "sub" => shape_of(DualSource, &[]),

        _ => return None,
    };
    Some(shape)
}

/// Assemble the input arrays the shape requires from the series store.
pub fn resolve_inputs(
    name: &str,
    shape: &IndicatorShape,
    options: &IndicatorOptions,
    series: &SeriesStore,
) -> Result<Vec<Vec<f64>>, ServiceError> {
    match shape.inputs {
        InputSpec::Selector(selector) => series.values(selector),
        InputSpec::VolumeOnly => Ok(vec![series.field("volume")?]),
        InputSpec::OpenClose => Ok(vec![series.field("open")?, series.field("close")?]),
        InputSpec::Source => {
            let source = source_option(name, options, "source")?;
            Ok(vec![series.field(&source)?])
        }
        InputSpec::DualSource => {
            let first = source_option(name, options, "source1")?;
            let second = source_option(name, options, "source2")?;
            Ok(vec![series.field(&first)?, series.field(&second)?])
        }
    }
}

/// Pull the shape's parameter keys out of the option bag, in order.
pub fn resolve_params(
    name: &str,
    shape: &IndicatorShape,
    options: &IndicatorOptions,
) -> Result<Vec<f64>, ServiceError> {
    shape
        .params
        .iter()
        .map(|key| {
            options
                .get(*key)
                .and_then(Value::as_f64)
                .ok_or_else(|| {
                    ServiceError::Configuration(format!(
                        "indicator `{}` requires numeric option `{}`",
                        name, key
                    ))
                })
        })
        .collect()
}

fn source_option(
    name: &str,
    options: &IndicatorOptions,
    key: &str,
) -> Result<String, ServiceError> {
    options
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ServiceError::Configuration(format!(
                "indicator `{}` requires option `{}` naming a series field",
                name, key
            ))
        })
}
