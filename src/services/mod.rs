pub mod feed;
pub mod indicator;
pub mod sim_feed;

pub use feed::{Feed, TopicTick};
pub use indicator::{ActiveIndicator, IndicatorService, RequestOutcome};
pub use sim_feed::SimFeed;
