//! Candle record and venue kline-row parsing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServiceError;

/// One OHLCV interval bar, keyed by its open time (epoch milliseconds).
///
/// A live tick may repeatedly update the same `open_time` until the interval
/// closes; `is_final` flips to true once it has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub base_volume: f64,
    pub quote_volume: f64,
    pub trade_count: u64,
    pub taker_buy_base_volume: f64,
    pub taker_buy_quote_volume: f64,
    #[serde(default)]
    pub is_final: bool,
}

impl Candle {
    /// Parse one historical kline row in the venue's REST layout:
    /// `[openTime, open, high, low, close, baseVolume, closeTime,
    /// quoteVolume, tradeCount, takerBuyBaseVolume, takerBuyQuoteVolume, ..]`
    /// with string-encoded decimals. Historical rows are closed candles.
    pub fn from_rest_row(row: &Value) -> Result<Self, ServiceError> {
        let fields = row
            .as_array()
            .filter(|fields| fields.len() >= 11)
            .ok_or_else(|| ServiceError::Validation("malformed kline row".to_string()))?;

        Ok(Self {
            open_time: fields[0]
                .as_i64()
                .ok_or_else(|| bad_field("openTime"))?,
            open: decimal_field(&fields[1], "open")?,
            high: decimal_field(&fields[2], "high")?,
            low: decimal_field(&fields[3], "low")?,
            close: decimal_field(&fields[4], "close")?,
            base_volume: decimal_field(&fields[5], "volume")?,
            // fields[6] is the close time, unused
            quote_volume: decimal_field(&fields[7], "quoteAssetVolume")?,
            trade_count: fields[8].as_u64().unwrap_or(0),
            taker_buy_base_volume: decimal_field(&fields[9], "takerBuyBaseAssetVolume")?,
            taker_buy_quote_volume: decimal_field(&fields[10], "takerBuyQuoteAssetVolume")?,
            is_final: true,
        })
    }

    /// Open time as a UTC timestamp.
    pub fn open_time_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.open_time)
    }
}

/// Venue rows carry decimals as strings; JSON numbers are also accepted.
fn decimal_field(value: &Value, name: &str) -> Result<f64, ServiceError> {
    match value {
        Value::String(text) => text.parse().map_err(|_| bad_field(name)),
        Value::Number(number) => number.as_f64().ok_or_else(|| bad_field(name)),
        _ => Err(bad_field(name)),
    }
}

fn bad_field(name: &str) -> ServiceError {
    ServiceError::Validation(format!("kline row has invalid `{}` field", name))
}

/// Close prices of a kline slice, in order.
pub fn close_prices(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|candle| candle.close).collect()
}
