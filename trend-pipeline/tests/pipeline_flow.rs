use chrono::Utc;
use cluster_engine::ClusterEngine;
use database::{Database, TrendStore};
use embedding_engine::EmbeddingProvider;
use llm_interface::LlmProvider;
use std::env;
use trend_core::{
    CoreError, SearchActionStatus, SocialInput, SourcePlatform, TrendJudgment, AGGREGATED_SOURCE,
};
use trend_pipeline::{ActionQueueWriter, TrendPipeline, TrendValidator};

/// Puts every "neon" text near one point and everything else far away.
struct NeonEmbedder;

impl EmbeddingProvider for NeonEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        Ok(texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                if text.contains("neon") {
                    vec![1.0 + 0.01 * i as f32, 1.0]
                } else {
                    vec![100.0 * (i as f32 + 1.0), -100.0]
                }
            })
            .collect())
    }
}

struct NeonJudge;

impl LlmProvider for NeonJudge {
    async fn assess_trend(&self, context: &str) -> Result<TrendJudgment, CoreError> {
        assert!(context.starts_with("POST A (Definition):\n"));
        Ok(TrendJudgment {
            valid: true,
            relevance_score: 82,
            trend_name: "Neon Overlay Glow".to_string(),
            summary: "Magenta and cyan glow over dark chrome.".to_string(),
            aesthetic_keywords: "neon glow, chrome, night city".to_string(),
        })
    }
}

async fn setup_test_db() -> Database {
    let db_path = env::temp_dir().join(format!("test_trend_pipeline_{}.db", uuid::Uuid::new_v4()));
    let mut db = Database::new(format!("sqlite://{}", db_path.display()));
    db.connect().await.expect("Failed to connect to test database");
    db.run_migrations().await.expect("Failed to run migrations");
    db
}

fn reddit_post(id: &str, title: &str, engagement: f64) -> SocialInput {
    SocialInput {
        source_platform: SourcePlatform::Reddit,
        external_id: id.to_string(),
        title: title.to_string(),
        content: String::new(),
        url: format!("https://reddit.com/r/Outrun/comments/{id}"),
        author_name: "r/Outrun".to_string(),
        posted_at: Utc::now(),
        engagement_score: engagement,
        metadata: serde_json::json!({ "subreddit": "Outrun" }),
    }
}

#[tokio::test]
async fn test_stored_posts_become_a_pending_search_action() {
    let db = setup_test_db().await;
    db.upsert_social_inputs(&[
        reddit_post("a", "neon skyline wallpaper", 120.0),
        reddit_post("b", "neon sign desk lamp", 64.0),
        reddit_post("c", "neon grid synthwave art", 300.0),
        reddit_post("d", "neon chrome car render", 45.0),
        reddit_post("e", "how do I fix dropped frames", 12.0),
    ])
    .await
    .unwrap();

    let pipeline = TrendPipeline::new(
        ClusterEngine::new(NeonEmbedder),
        TrendValidator::new(NeonJudge),
        ActionQueueWriter::new(&db),
    );

    let report = pipeline.run().await.unwrap();

    assert_eq!(report.posts_considered, 5);
    assert_eq!(report.queued.len(), 1);

    let trends = db.list_trends().await.unwrap();
    assert_eq!(trends.len(), 1);
    assert_eq!(trends[0].source_platform, AGGREGATED_SOURCE);
    assert!(trends[0].summary.starts_with("Neon Glow: "));

    let pending = db
        .list_search_actions(Some(SearchActionStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].search_phrase, "Neon Glow Chat Widget");
    assert_eq!(pending[0].trend_id, trends[0].id);
}

#[tokio::test]
async fn test_empty_store_queues_nothing() {
    let db = setup_test_db().await;

    let pipeline = TrendPipeline::new(
        ClusterEngine::new(NeonEmbedder),
        TrendValidator::new(NeonJudge),
        ActionQueueWriter::new(&db),
    );

    let report = pipeline.run().await.unwrap();

    assert_eq!(report.posts_considered, 0);
    assert!(db.list_search_actions(None).await.unwrap().is_empty());
}
