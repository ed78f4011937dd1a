use crate::api::{ListingVariant, RedditApiClient, RedditPostData};
use crate::filter::PostFilter;
use crate::retry::{RetryConfig, RetryExecutor};
use chrono::DateTime;
use database::TrendStore;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use trend_core::{
    CoreError, ErrorExt, ErrorRecovery, RedditApiError, RedditConfig, SocialInput, SourcePlatform,
};

/// Stored `content` keeps at most this many characters of the selftext.
pub const CONTENT_CHAR_LIMIT: usize = 2000;

const DIRECT_MEDIA_HINTS: [&str; 4] = ["image", "link", "hosted:video", "rich:video"];

/// Where listing pages come from.
pub trait ListingSource {
    async fn fetch_listing(
        &self,
        subreddit: &str,
        variant: ListingVariant,
    ) -> Result<Vec<RedditPostData>, CoreError>;
}

impl ListingSource for RedditApiClient {
    async fn fetch_listing(
        &self,
        subreddit: &str,
        variant: ListingVariant,
    ) -> Result<Vec<RedditPostData>, CoreError> {
        RedditApiClient::fetch_listing(self, subreddit, variant).await
    }
}

/// Posts keyed by external id. A later insert replaces the earlier record
/// but keeps its position.
#[derive(Debug, Default)]
pub struct MergedPosts {
    order: Vec<String>,
    by_id: HashMap<String, SocialInput>,
}

impl MergedPosts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, input: SocialInput) {
        if !self.by_id.contains_key(&input.external_id) {
            self.order.push(input.external_id.clone());
        }
        self.by_id.insert(input.external_id.clone(), input);
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, external_id: &str) -> Option<&SocialInput> {
        self.by_id.get(external_id)
    }

    pub fn into_vec(mut self) -> Vec<SocialInput> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.remove(id))
            .collect()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CollectReport {
    pub subreddits: usize,
    pub posts_kept: usize,
    pub rows_upserted: u64,
    pub skipped_listings: usize,
    pub store_failures: usize,
}

impl fmt::Display for CollectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} subreddits, {} posts kept, {} rows upserted, {} listings skipped, {} store failures",
            self.subreddits,
            self.posts_kept,
            self.rows_upserted,
            self.skipped_listings,
            self.store_failures
        )
    }
}

/// Fetches every configured subreddit, filters and maps its posts, and
/// upserts them subreddit by subreddit.
pub struct RedditCollector<C, S> {
    source: C,
    store: S,
    filter: PostFilter,
    subreddits: Vec<String>,
    retry: RetryExecutor,
    pause: Duration,
}

impl<C, S> RedditCollector<C, S>
where
    C: ListingSource,
    S: TrendStore,
{
    pub fn new(source: C, store: S, config: &RedditConfig) -> Self {
        Self {
            source,
            store,
            filter: PostFilter::new(config.visual_subreddits.iter().cloned()),
            subreddits: config.subreddits.clone(),
            retry: RetryExecutor::default(),
            pause: Duration::from_secs(config.pause_between_subreddits_secs),
        }
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn source(&self) -> &C {
        &self.source
    }

    pub async fn collect_all(&self) -> Result<CollectReport, CoreError> {
        let mut report = CollectReport::default();

        for (index, subreddit) in self.subreddits.iter().enumerate() {
            if index > 0 && !self.pause.is_zero() {
                sleep(self.pause).await;
            }
            report.subreddits += 1;

            let (merged, skipped) = self.collect_subreddit(subreddit).await;
            report.skipped_listings += skipped;
            if merged.is_empty() {
                info!("No relevant posts in r/{}", subreddit);
                continue;
            }

            let posts = merged.into_vec();
            report.posts_kept += posts.len();

            match self.store.upsert_social_inputs(&posts).await {
                Ok(rows) => {
                    info!("Saved {} posts from r/{}", posts.len(), subreddit);
                    report.rows_upserted += rows;
                }
                Err(error) => {
                    if ErrorRecovery::determine_strategy(&error).is_fatal() {
                        error.log_error();
                        return Err(error);
                    }
                    warn!(
                        "Store error for r/{}: {}",
                        subreddit,
                        error.user_friendly_message()
                    );
                    report.store_failures += 1;
                }
            }
        }

        info!("Collection finished: {}", report);
        Ok(report)
    }

    /// Fetch both listings of one subreddit and merge what passes the filter.
    /// Returns the merge and how many listings had to be skipped.
    pub async fn collect_subreddit(&self, subreddit: &str) -> (MergedPosts, usize) {
        let mut merged = MergedPosts::new();
        let mut skipped = 0;

        for variant in ListingVariant::ALL {
            let operation = format!("r/{}/{}", subreddit, variant);
            let posts = match self
                .retry
                .execute(&operation, || self.source.fetch_listing(subreddit, variant))
                .await
            {
                Ok(posts) => posts,
                Err(error) => {
                    warn!("Skipping {}: {}", operation, error);
                    skipped += 1;
                    continue;
                }
            };

            for post in &posts {
                let full_text = format!("{} {}", post.title, post.selftext);
                if !self.filter.should_keep(subreddit, &full_text) {
                    continue;
                }
                match map_post(subreddit, variant, post) {
                    Ok(input) => merged.insert(input),
                    Err(error) => warn!("Dropping post from {}: {}", operation, error),
                }
            }
        }

        (merged, skipped)
    }
}

/// Turn one listing post into a `social_inputs` row.
pub fn map_post(
    subreddit: &str,
    variant: ListingVariant,
    post: &RedditPostData,
) -> Result<SocialInput, CoreError> {
    if post.id.is_empty() {
        return Err(invalid_post("post without id"));
    }
    let posted_at = post
        .created_utc
        .is_finite()
        .then(|| DateTime::from_timestamp(post.created_utc as i64, 0))
        .flatten()
        .ok_or_else(|| invalid_post(format!("bad created_utc on {}", post.id)))?;

    let media_url = best_media_url(post);
    let media_type = media_type(post, media_url.as_deref());
    let thumbnail = post
        .preview_source_url()
        .map(unescape_amp)
        .filter(|u| !u.is_empty())
        .or_else(|| post.thumbnail.clone());

    Ok(SocialInput {
        source_platform: SourcePlatform::Reddit,
        external_id: post.id.clone(),
        title: post.title.clone(),
        content: post.selftext.chars().take(CONTENT_CHAR_LIMIT).collect(),
        url: format!("https://reddit.com{}", post.permalink),
        author_name: format!("r/{}", subreddit),
        posted_at,
        engagement_score: (post.score + post.num_comments).max(0) as f64,
        metadata: json!({
            "subreddit": subreddit,
            "fetch_variant": variant.as_str(),
            "upvotes": post.score,
            "comments": post.num_comments,
            "upvote_ratio": post.upvote_ratio,
            "is_self": post.is_self,
            "post_hint": post.post_hint,
            "is_gallery": post.is_gallery(),
            "media_url": media_url,
            "media_type": media_type,
            "thumbnail": thumbnail,
            "url_overridden_by_dest": post.url_overridden_by_dest,
        }),
    })
}

/// Gallery item, then preview image, then the link target.
pub fn best_media_url(post: &RedditPostData) -> Option<String> {
    if post.is_gallery() {
        let gallery_url = post
            .media_metadata
            .iter()
            .flat_map(|items| items.values())
            .find_map(|item| item.s.as_ref()?.u.as_deref().filter(|u| !u.is_empty()));
        if let Some(url) = gallery_url {
            return Some(unescape_amp(url));
        }
    }

    if let Some(url) = post.preview_source_url().filter(|u| !u.is_empty()) {
        return Some(unescape_amp(url));
    }

    [&post.url_overridden_by_dest, &post.url]
        .into_iter()
        .flatten()
        .find(|u| !u.is_empty())
        .cloned()
}

fn media_type(post: &RedditPostData, media_url: Option<&str>) -> String {
    if post.is_gallery() {
        return "gallery".to_string();
    }
    match post.post_hint.as_deref() {
        Some(hint) if DIRECT_MEDIA_HINTS.contains(&hint) => hint.to_string(),
        _ if media_url.is_some() => "media".to_string(),
        _ => "text".to_string(),
    }
}

fn unescape_amp(url: &str) -> String {
    url.replace("&amp;", "&")
}

fn invalid_post(details: impl Into<String>) -> CoreError {
    RedditApiError::InvalidResponse {
        details: details.into(),
    }
    .into()
}
