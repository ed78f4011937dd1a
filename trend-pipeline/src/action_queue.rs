use database::TrendStore;
use tracing::{info, warn};
use trend_core::{
    AcceptedTrend, CoreError, NewSearchAction, NewTrend, SearchAction, SearchActionStatus, Trend,
    AGGREGATED_SOURCE,
};

pub const DEFAULT_PRODUCT_SUFFIX: &str = "Chat Widget";

/// A stored trend together with the search actions queued for it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedTrend {
    pub trend: Trend,
    pub actions: Vec<SearchAction>,
}

/// Turns accepted trends into a Trend row plus one PENDING search action.
pub struct ActionQueueWriter<S> {
    store: S,
    product_suffix: String,
}

impl<S: TrendStore> ActionQueueWriter<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            product_suffix: DEFAULT_PRODUCT_SUFFIX.to_string(),
        }
    }

    pub fn with_product_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.product_suffix = suffix.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn search_phrase(&self, trend_name: &str) -> String {
        format!("{} {}", trend_name, self.product_suffix)
    }

    /// Write the trend, then its search action.
    ///
    /// A failed trend insert writes nothing else. A failed action insert leaves
    /// the trend row in place.
    pub async fn enqueue(&self, accepted: &AcceptedTrend) -> Result<QueuedTrend, CoreError> {
        let new_trend = NewTrend {
            summary: format!("{}: {}", accepted.trend_name, accepted.summary),
            source_platform: AGGREGATED_SOURCE.to_string(),
        };
        let trend = self.store.insert_trend(&new_trend).await?;

        let action = NewSearchAction {
            trend_id: trend.id,
            search_phrase: self.search_phrase(&accepted.trend_name),
            status: SearchActionStatus::Pending,
        };
        let actions = match self.store.insert_search_actions(&[action]).await {
            Ok(actions) => actions,
            Err(error) => {
                warn!("Trend {} stored without its search action", trend.id);
                return Err(error);
            }
        };

        info!(
            "Queued '{}' for trend {} ({})",
            self.search_phrase(&accepted.trend_name),
            trend.id,
            accepted.trend_name
        );

        Ok(QueuedTrend { trend, actions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    fn accepted(name: &str) -> AcceptedTrend {
        AcceptedTrend {
            trend_name: name.to_string(),
            summary: "Dark city glow with chrome accents.".to_string(),
            relevance_score: 81,
            aesthetic_keywords: "neon glow, chrome".to_string(),
        }
    }

    #[tokio::test]
    async fn test_enqueue_writes_trend_and_pending_action() {
        let writer = ActionQueueWriter::new(MemoryStore::default());

        let queued = writer.enqueue(&accepted("Neon Glow")).await.unwrap();

        assert_eq!(queued.trend.summary, "Neon Glow: Dark city glow with chrome accents.");
        assert_eq!(queued.trend.source_platform, AGGREGATED_SOURCE);
        assert_eq!(queued.actions.len(), 1);
        assert_eq!(queued.actions[0].search_phrase, "Neon Glow Chat Widget");
        assert_eq!(queued.actions[0].status, SearchActionStatus::Pending);
        assert_eq!(queued.actions[0].trend_id, queued.trend.id);
    }

    #[tokio::test]
    async fn test_custom_suffix() {
        let writer =
            ActionQueueWriter::new(MemoryStore::default()).with_product_suffix("Stream Overlay");
        assert_eq!(writer.search_phrase("Cozy Pixel Farm"), "Cozy Pixel Farm Stream Overlay");
    }

    #[tokio::test]
    async fn test_trend_failure_skips_action_insert() {
        let store = MemoryStore {
            fail_trend_insert: true,
            ..MemoryStore::default()
        };
        let writer = ActionQueueWriter::new(store);

        let err = writer.enqueue(&accepted("Neon Glow")).await.unwrap_err();

        assert!(matches!(err, CoreError::Database(_)));
        assert_eq!(writer.store().action_attempts.get(), 0);
        assert!(writer.store().trends.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_action_failure_leaves_trend_orphaned() {
        let store = MemoryStore {
            fail_action_insert: true,
            ..MemoryStore::default()
        };
        let writer = ActionQueueWriter::new(store);

        let err = writer.enqueue(&accepted("Neon Glow")).await.unwrap_err();

        assert!(matches!(err, CoreError::Database(_)));
        assert_eq!(writer.store().trends.borrow().len(), 1);
        assert!(writer.store().actions.borrow().is_empty());
    }
}
