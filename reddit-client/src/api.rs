use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, warn};
use trend_core::{CoreError, RedditApiError, RedditConfig};

const REDDIT_PUBLIC_BASE: &str = "https://www.reddit.com";
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// The two public listings read for every subreddit, in fetch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingVariant {
    /// Top posts of the past week
    Top,
    New,
}

impl ListingVariant {
    pub const ALL: [ListingVariant; 2] = [ListingVariant::Top, ListingVariant::New];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListingVariant::Top => "top",
            ListingVariant::New => "new",
        }
    }

    fn query(&self, limit: u32) -> Vec<(&'static str, String)> {
        match self {
            ListingVariant::Top => vec![("t", "week".to_string()), ("limit", limit.to_string())],
            ListingVariant::New => vec![("limit", limit.to_string())],
        }
    }
}

impl fmt::Display for ListingVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListing<T> {
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingData<T> {
    #[serde(default = "Vec::new")]
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingChild<T> {
    pub data: T,
}

/// The fields of a listing post the collector reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    pub selftext: String,
    pub permalink: String,
    pub created_utc: f64,
    pub score: i64,
    pub num_comments: i64,
    pub upvote_ratio: f64,
    pub is_self: bool,
    pub post_hint: Option<String>,
    pub is_gallery: Option<bool>,
    pub media_metadata: Option<BTreeMap<String, GalleryMedia>>,
    pub preview: Option<RedditPreview>,
    pub url_overridden_by_dest: Option<String>,
    pub url: Option<String>,
    pub thumbnail: Option<String>,
}

impl RedditPostData {
    pub fn is_gallery(&self) -> bool {
        self.is_gallery.unwrap_or(false)
    }

    /// Source URL of the first preview image.
    pub fn preview_source_url(&self) -> Option<&str> {
        self.preview
            .as_ref()?
            .images
            .first()?
            .source
            .as_ref()?
            .url
            .as_deref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GalleryMedia {
    /// Largest rendition of the item.
    pub s: Option<MediaSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaSource {
    pub u: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedditPreview {
    pub images: Vec<PreviewImage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PreviewImage {
    pub source: Option<PreviewSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PreviewSource {
    pub url: Option<String>,
}

/// Unauthenticated client for the public `.json` listings.
#[derive(Debug, Clone)]
pub struct RedditApiClient {
    http_client: Client,
    base_url: String,
    listing_limit: u32,
}

impl RedditApiClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: REDDIT_PUBLIC_BASE.to_string(),
            listing_limit: 100,
        })
    }

    pub fn from_config(config: &RedditConfig) -> Result<Self, CoreError> {
        Ok(
            Self::new(&config.user_agent, Duration::from_secs(config.request_timeout_secs))?
                .with_listing_limit(config.listing_limit),
        )
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_listing_limit(mut self, limit: u32) -> Self {
        self.listing_limit = limit;
        self
    }

    pub fn listing_url(&self, subreddit: &str, variant: ListingVariant) -> String {
        format!("{}/r/{}/{}.json", self.base_url, subreddit, variant.as_str())
    }

    /// One request for one listing. Retrying is the caller's business.
    pub async fn fetch_listing(
        &self,
        subreddit: &str,
        variant: ListingVariant,
    ) -> Result<Vec<RedditPostData>, CoreError> {
        let url = self.listing_url(subreddit, variant);
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .query(&variant.query(self.listing_limit))
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            error!("Listing request failed with status {} for {}", status, url);
            return Err(status_error(status, retry_after, subreddit).into());
        }

        let listing: RedditListing<RedditPostData> =
            response.json().await.map_err(|e| -> CoreError {
                if e.is_timeout() {
                    RedditApiError::RequestTimeout.into()
                } else {
                    warn!("Undecodable listing from {}: {}", url, e);
                    RedditApiError::InvalidResponse {
                        details: e.to_string(),
                    }
                    .into()
                }
            })?;

        Ok(listing
            .data
            .children
            .into_iter()
            .map(|child| child.data)
            .collect())
    }
}

fn send_error(error: reqwest::Error) -> CoreError {
    if error.is_timeout() {
        RedditApiError::RequestTimeout.into()
    } else {
        CoreError::Network(error)
    }
}

fn status_error(status: StatusCode, retry_after: Option<u64>, subreddit: &str) -> RedditApiError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => RedditApiError::RateLimitExceeded {
            retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        StatusCode::FORBIDDEN => RedditApiError::Forbidden {
            resource: format!("r/{}", subreddit),
        },
        StatusCode::NOT_FOUND => RedditApiError::SubredditNotFound {
            subreddit: subreddit.to_string(),
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => RedditApiError::RequestTimeout,
        s if s.is_server_error() => RedditApiError::ServerError {
            status_code: s.as_u16(),
        },
        s => RedditApiError::InvalidResponse {
            details: format!("HTTP {}", s),
        },
    }
}
