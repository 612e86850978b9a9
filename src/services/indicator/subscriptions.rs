//! Maps active indicators to the minimal set of live feed subscriptions.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::error::{ServiceError, ServiceResult};
use crate::services::feed::{Feed, TopicTick};

/// Subscribe-on-demand, unsubscribe-when-unused, against the feed's own
/// authoritative topic set.
pub(crate) struct SubscriptionManager {
    feed: Arc<dyn Feed>,
}

impl SubscriptionManager {
    pub fn new(feed: Arc<dyn Feed>) -> Self {
        Self { feed }
    }

    /// Subscribe `topic` unless the feed already carries it.
    pub async fn ensure(
        &self,
        topic: &str,
        sink: &mpsc::UnboundedSender<TopicTick>,
    ) -> ServiceResult<()> {
        if self.feed.active_topics().await.contains(topic) {
            return Ok(());
        }
        self.feed
            .subscribe(topic, sink.clone())
            .await
            .map_err(ServiceError::upstream)?;
        info!(topic = %topic, "subscribed to live feed topic");
        Ok(())
    }

    /// Unsubscribe every live topic no remaining indicator requires. A full
    /// recompute-and-diff, so shared topics survive partial removals.
    pub async fn reconcile(&self, required: &HashSet<String>) -> ServiceResult<()> {
        for topic in self.feed.active_topics().await {
            if !required.contains(&topic) {
                self.feed
                    .unsubscribe(&topic)
                    .await
                    .map_err(ServiceError::upstream)?;
                info!(topic = %topic, "unsubscribed unused feed topic");
            }
        }
        Ok(())
    }

    pub async fn active_count(&self) -> usize {
        self.feed.active_topics().await.len()
    }
}
