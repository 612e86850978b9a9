pub mod candle;

pub use candle::{close_prices, Candle};
