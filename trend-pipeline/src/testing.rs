//! Hand-written doubles for the pipeline's injected collaborators.

use database::TrendStore;
use embedding_engine::EmbeddingProvider;
use llm_interface::LlmProvider;
use std::cell::{Cell, RefCell};
use trend_core::{
    CoreError, DatabaseError, EmbeddingError, LlmError, NewSearchAction, NewTrend, Post,
    RankedPost, SearchAction, SocialInput, SourcePlatform, StoredPost, Trend, TrendJudgment,
};

pub fn ranked(id: i64, text: &str, engagement: f64, is_centroid: bool) -> RankedPost {
    RankedPost {
        post: post(id, text, engagement),
        is_centroid,
    }
}

pub fn post(id: i64, text: &str, engagement: f64) -> Post {
    Post {
        id,
        text: text.to_string(),
        engagement,
        source: SourcePlatform::Reddit,
    }
}

pub fn judgment(valid: bool, relevance_score: i64, trend_name: &str) -> TrendJudgment {
    TrendJudgment {
        valid,
        relevance_score,
        trend_name: trend_name.to_string(),
        summary: "A cohesive look".to_string(),
        aesthetic_keywords: "soft glow, rounded corners".to_string(),
    }
}

#[derive(Clone)]
pub enum Reply {
    Judgment(TrendJudgment),
    Fail,
}

/// Answers by the first scripted needle found in the context.
pub struct ScriptedJudge {
    script: Vec<(String, Reply)>,
    fallback: Reply,
    contexts: RefCell<Vec<String>>,
}

impl ScriptedJudge {
    pub fn always(judgment: TrendJudgment) -> Self {
        Self {
            script: Vec::new(),
            fallback: Reply::Judgment(judgment),
            contexts: RefCell::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            script: Vec::new(),
            fallback: Reply::Fail,
            contexts: RefCell::new(Vec::new()),
        }
    }

    pub fn when(mut self, needle: &str, reply: Reply) -> Self {
        self.script.push((needle.to_string(), reply));
        self
    }

    pub fn contexts(&self) -> Vec<String> {
        self.contexts.borrow().clone()
    }
}

impl LlmProvider for ScriptedJudge {
    async fn assess_trend(&self, context: &str) -> Result<TrendJudgment, CoreError> {
        self.contexts.borrow_mut().push(context.to_string());

        let reply = self
            .script
            .iter()
            .find(|(needle, _)| context.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            Reply::Judgment(judgment) => Ok(judgment),
            Reply::Fail => Err(LlmError::ServiceUnavailable {
                provider: "scripted".to_string(),
            }
            .into()),
        }
    }
}

/// Embeds by keyword: texts mentioning a known word land near that word's point.
pub struct KeywordEmbedder {
    anchors: Vec<(&'static str, [f32; 2])>,
    fail: bool,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            anchors: vec![("pastel", [0.0, 0.0]), ("neon", [10.0, 10.0])],
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        if self.fail {
            return Err(EmbeddingError::InferenceFailed {
                reason: "model unavailable".to_string(),
            }
            .into());
        }

        Ok(texts
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let jitter = 0.01 * (index % 7) as f32;
                match self.anchors.iter().find(|(word, _)| text.contains(word)) {
                    Some((_, [x, y])) => vec![x + jitter, y + jitter * 0.5],
                    // Unmatched texts are spread far apart from everything.
                    None => vec![-50.0 - 20.0 * index as f32, 40.0 * index as f32],
                }
            })
            .collect())
    }
}

/// In-memory store with switchable failures.
#[derive(Default)]
pub struct MemoryStore {
    pub posts: Vec<StoredPost>,
    pub trends: RefCell<Vec<Trend>>,
    pub actions: RefCell<Vec<SearchAction>>,
    pub upserted: RefCell<Vec<SocialInput>>,
    pub fail_fetch: bool,
    pub fail_trend_insert: bool,
    pub fail_action_insert: bool,
    pub action_attempts: Cell<usize>,
}

impl MemoryStore {
    pub fn with_posts(posts: Vec<StoredPost>) -> Self {
        Self {
            posts,
            ..Self::default()
        }
    }
}

fn write_failure(table: &str) -> CoreError {
    DatabaseError::QueryFailed {
        query: format!("INSERT INTO {table}"),
    }
    .into()
}

impl TrendStore for MemoryStore {
    async fn fetch_top_posts(&self, limit: u32) -> Result<Vec<StoredPost>, CoreError> {
        if self.fail_fetch {
            return Err(DatabaseError::ConnectionFailed {
                reason: "store offline".to_string(),
            }
            .into());
        }
        let mut posts = self.posts.clone();
        posts.sort_by(|a, b| {
            b.engagement_score
                .total_cmp(&a.engagement_score)
                .then(a.id.cmp(&b.id))
        });
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn upsert_social_inputs(&self, inputs: &[SocialInput]) -> Result<u64, CoreError> {
        self.upserted.borrow_mut().extend_from_slice(inputs);
        Ok(inputs.len() as u64)
    }

    async fn insert_trend(&self, trend: &NewTrend) -> Result<Trend, CoreError> {
        if self.fail_trend_insert {
            return Err(write_failure("trends"));
        }
        let mut trends = self.trends.borrow_mut();
        let stored = Trend {
            id: trends.len() as i64 + 1,
            summary: trend.summary.clone(),
            source_platform: trend.source_platform.clone(),
            created_at: chrono::Utc::now(),
        };
        trends.push(stored.clone());
        Ok(stored)
    }

    async fn insert_search_actions(
        &self,
        actions: &[NewSearchAction],
    ) -> Result<Vec<SearchAction>, CoreError> {
        self.action_attempts.set(self.action_attempts.get() + 1);
        if self.fail_action_insert {
            return Err(write_failure("search_actions"));
        }
        let mut stored = self.actions.borrow_mut();
        let inserted: Vec<SearchAction> = actions
            .iter()
            .enumerate()
            .map(|(offset, action)| SearchAction {
                id: (stored.len() + offset) as i64 + 1,
                trend_id: action.trend_id,
                search_phrase: action.search_phrase.clone(),
                status: action.status,
                created_at: chrono::Utc::now(),
            })
            .collect();
        stored.extend(inserted.iter().cloned());
        Ok(inserted)
    }
}
