//! Per-indicator rolling candle store.

use std::collections::BTreeMap;

use crate::error::ServiceError;
use crate::models::Candle;

/// Candles keyed by open time, exclusively owned by one indicator.
///
/// Keys iterate in ascending `open_time` order, so historical backfill and
/// live appends both read back chronologically. A live tick that repeats an
/// existing `open_time` overwrites the stored candle in place; the store
/// never holds two candles for one open time.
#[derive(Debug, Default)]
pub struct SeriesStore {
    candles: BTreeMap<i64, Candle>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite by `open_time`.
    pub fn put(&mut self, candle: Candle) {
        self.candles.insert(candle.open_time, candle);
    }

    /// Bulk-load historical backfill.
    pub fn extend(&mut self, candles: impl IntoIterator<Item = Candle>) {
        for candle in candles {
            self.put(candle);
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// One numeric array for a single field.
    ///
    /// `volume` is quote-asset volume: indicator math runs on the
    /// quote-denominated turnover, not the base-asset amount.
    pub fn field(&self, name: &str) -> Result<Vec<f64>, ServiceError> {
        let pick: fn(&Candle) -> f64 = match name {
            "open" => |c| c.open,
            "high" => |c| c.high,
            "low" => |c| c.low,
            "close" => |c| c.close,
            "volume" => |c| c.quote_volume,
            _ => {
                return Err(ServiceError::Configuration(format!(
                    "unknown field selector `{}`",
                    name
                )))
            }
        };
        Ok(self.candles.values().map(pick).collect())
    }

    /// One array per requested field for a recognized selector: a single
    /// field name, or one of the compound selectors `HL`, `HLC`, `HLCV`,
    /// `HLV`, `CV`, `OHLC`.
    pub fn values(&self, selector: &str) -> Result<Vec<Vec<f64>>, ServiceError> {
        let fields: &[&str] = match selector {
            "open" | "high" | "low" | "close" | "volume" => return Ok(vec![self.field(selector)?]),
            "HL" => &["high", "low"],
            "HLC" => &["high", "low", "close"],
            "HLCV" => &["high", "low", "close", "volume"],
            "HLV" => &["high", "low", "volume"],
            "CV" => &["close", "volume"],
            "OHLC" => &["open", "high", "low", "close"],
            _ => {
                return Err(ServiceError::Configuration(format!(
                    "unknown field selector `{}`",
                    selector
                )))
            }
        };
        fields.iter().map(|field| self.field(field)).collect()
    }
}
