use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Label reserved by the grouping algorithm for posts outside every group.
pub const NOISE_LABEL: i32 = -1;

/// Source platform recorded on every social input and trend row.
pub const AGGREGATED_SOURCE: &str = "aggregated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePlatform {
    Reddit,
    Youtube,
}

impl SourcePlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcePlatform::Reddit => "reddit",
            SourcePlatform::Youtube => "youtube",
        }
    }
}

impl fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourcePlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reddit" => Ok(SourcePlatform::Reddit),
            "youtube" => Ok(SourcePlatform::Youtube),
            other => Err(format!("unknown source platform '{other}'")),
        }
    }
}

/// A canonical post handed to the clustering engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub engagement: f64,
    pub source: SourcePlatform,
}

/// A post as placed inside a cluster, after centroid election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPost {
    pub post: Post,
    pub is_centroid: bool,
}

impl RankedPost {
    pub fn id(&self) -> i64 {
        self.post.id
    }

    pub fn text(&self) -> &str {
        &self.post.text
    }

    pub fn engagement(&self) -> f64 {
        self.post.engagement
    }
}

/// Cluster label to its engagement-ordered members.
pub type ClusterMap = BTreeMap<i32, Vec<RankedPost>>;

/// Raw collected post, as written to the `social_inputs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialInput {
    pub source_platform: SourcePlatform,
    pub external_id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub author_name: String,
    pub posted_at: DateTime<Utc>,
    pub engagement_score: f64,
    pub metadata: serde_json::Value,
}

/// Row read back from the store for analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPost {
    pub id: i64,
    pub source_platform: SourcePlatform,
    pub title: String,
    pub content: String,
    pub engagement_score: f64,
}

impl From<StoredPost> for Post {
    fn from(row: StoredPost) -> Self {
        Self {
            id: row.id,
            text: format!("{} {}", row.title, row.content),
            engagement: row.engagement_score,
            source: row.source_platform,
        }
    }
}

/// Structured verdict returned by the trend judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendJudgment {
    pub valid: bool,
    pub relevance_score: i64,
    pub trend_name: String,
    pub summary: String,
    pub aesthetic_keywords: String,
}

/// A cluster that passed the decision gate, with its sanitized name.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedTrend {
    pub trend_name: String,
    pub summary: String,
    pub relevance_score: i64,
    pub aesthetic_keywords: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTrend {
    pub summary: String,
    pub source_platform: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trend {
    pub id: i64,
    pub summary: String,
    pub source_platform: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchActionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SearchActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchActionStatus::Pending => "PENDING",
            SearchActionStatus::Processing => "PROCESSING",
            SearchActionStatus::Completed => "COMPLETED",
            SearchActionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SearchActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(SearchActionStatus::Pending),
            "PROCESSING" => Ok(SearchActionStatus::Processing),
            "COMPLETED" => Ok(SearchActionStatus::Completed),
            "FAILED" => Ok(SearchActionStatus::Failed),
            other => Err(format!("unknown search action status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSearchAction {
    pub trend_id: i64,
    pub search_phrase: String,
    pub status: SearchActionStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchAction {
    pub id: i64,
    pub trend_id: i64,
    pub search_phrase: String,
    pub status: SearchActionStatus,
    pub created_at: DateTime<Utc>,
}
