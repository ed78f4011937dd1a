//! Collects posts from public Reddit listings into the `social_inputs` table.

pub mod api;
pub mod collector;
pub mod filter;
pub mod retry;

pub use api::{ListingVariant, RedditApiClient, RedditPostData};
pub use collector::{map_post, CollectReport, ListingSource, MergedPosts, RedditCollector};
pub use filter::PostFilter;
pub use retry::{RetryConfig, RetryExecutor};
