//! One analysis run: cluster stored posts, judge each cluster, and queue a
//! search action for every cluster that passes the gate.

pub mod action_queue;
pub mod pipeline;
pub mod sanitize;
pub mod validator;

#[cfg(test)]
mod testing;

pub use action_queue::{ActionQueueWriter, QueuedTrend, DEFAULT_PRODUCT_SUFFIX};
pub use pipeline::{RunReport, TrendPipeline, DEFAULT_POST_LIMIT};
pub use sanitize::sanitize_trend_name;
pub use validator::{build_context, select_posts, GroupOutcome, TrendValidator};
