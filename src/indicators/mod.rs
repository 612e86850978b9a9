pub mod fingerprint;
pub mod instance;
pub mod series;
pub mod taxonomy;

pub use fingerprint::{fingerprint, Fingerprint};
pub use instance::{Indicator, UpdateCallback};
pub use series::SeriesStore;
pub use taxonomy::{IndicatorOptions, InputSpec};
