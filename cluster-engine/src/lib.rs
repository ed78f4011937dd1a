//! Groups posts by meaning and ranks each group.
//!
//! [`ClusterEngine::cluster_posts`] embeds the posts, runs HDBSCAN* over the
//! vectors, elects one centroid post per group and orders every group by
//! engagement.

pub mod hdbscan;
mod ranking;

pub use hdbscan::{hdbscan, HdbscanParams};
pub use ranking::{elect_centroid, rank_clusters, sort_by_engagement};

use embedding_engine::vector::check_embeddings;
use embedding_engine::EmbeddingProvider;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};
use trend_core::{ClusterMap, ClusteringConfig, CoreError, Post};

/// Below this many posts there is not enough data to group.
pub const DEFAULT_MIN_POSTS: usize = 5;

pub struct ClusterEngine<E> {
    embedder: E,
    params: HdbscanParams,
    min_posts: usize,
}

impl<E: EmbeddingProvider> ClusterEngine<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            params: HdbscanParams::default(),
            min_posts: DEFAULT_MIN_POSTS,
        }
    }

    pub fn from_config(embedder: E, config: &ClusteringConfig) -> Result<Self, CoreError> {
        let params = HdbscanParams::new(config.min_cluster_size, config.min_samples);
        params.validate()?;
        Ok(Self {
            embedder,
            params,
            min_posts: config.min_posts,
        })
    }

    pub fn with_params(mut self, params: HdbscanParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_min_posts(mut self, min_posts: usize) -> Self {
        self.min_posts = min_posts;
        self
    }

    pub fn params(&self) -> &HdbscanParams {
        &self.params
    }

    /// Group `posts` into engagement-ordered clusters keyed by label.
    ///
    /// Too few posts is not an error: the result is simply empty. Malformed
    /// posts and any embedding failure are.
    pub async fn cluster_posts(&self, posts: &[Post]) -> Result<ClusterMap, CoreError> {
        if posts.len() < self.min_posts {
            info!(
                "Only {} posts available, need {} to cluster",
                posts.len(),
                self.min_posts
            );
            return Ok(BTreeMap::new());
        }

        validate_posts(posts)?;

        let texts: Vec<String> = posts.iter().map(|p| p.text.clone()).collect();
        debug!("Embedding {} posts", texts.len());
        let embeddings = self.embedder.embed(&texts).await?;
        let dim = check_embeddings(&embeddings, posts.len())?;
        debug!("Got {} embeddings of dimension {}", embeddings.len(), dim);

        let labels = hdbscan(&embeddings, &self.params)?;
        let clusters = rank_clusters(posts, &embeddings, &labels);

        let clustered: usize = clusters.values().map(Vec::len).sum();
        info!(
            "Clustered {} posts into {} groups ({} noise)",
            posts.len(),
            clusters.len(),
            posts.len() - clustered
        );

        Ok(clusters)
    }
}

fn validate_posts(posts: &[Post]) -> Result<(), CoreError> {
    let mut seen = HashSet::with_capacity(posts.len());

    for post in posts {
        if !seen.insert(post.id) {
            return Err(CoreError::invalid_input(format!(
                "duplicate post id {}",
                post.id
            )));
        }
        if post.text.trim().is_empty() {
            return Err(CoreError::invalid_input(format!(
                "post {} has no text",
                post.id
            )));
        }
        if !post.engagement.is_finite() || post.engagement < 0.0 {
            return Err(CoreError::invalid_input(format!(
                "post {} has invalid engagement {}",
                post.id, post.engagement
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use trend_core::{EmbeddingError, RankedPost, SourcePlatform};

    /// Returns canned vectors and counts how often it was asked.
    struct FixedEmbedder {
        vectors: Vec<Vec<f32>>,
        calls: Cell<usize>,
    }

    impl FixedEmbedder {
        fn new(vectors: Vec<Vec<f32>>) -> Self {
            Self {
                vectors,
                calls: Cell::new(0),
            }
        }
    }

    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.vectors.clone())
        }
    }

    struct FailingEmbedder;

    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
            Err(EmbeddingError::InferenceFailed {
                reason: "model crashed".to_string(),
            }
            .into())
        }
    }

    fn post(id: i64, text: &str, engagement: f64) -> Post {
        Post {
            id,
            text: text.to_string(),
            engagement,
            source: SourcePlatform::Reddit,
        }
    }

    fn pastel_posts() -> (Vec<Post>, Vec<Vec<f32>>) {
        let posts = vec![
            post(1, "soft pastel pink stream layout", 50.0),
            post(2, "pastel lavender overlay with clouds", 80.0),
            post(3, "cute pastel aesthetic for my channel", 20.0),
            post(4, "mint and peach pastel chat box", 10.0),
            post(5, "obs keeps crashing when I add a browser source", 5.0),
        ];
        let vectors = vec![
            vec![0.2, 0.0],
            vec![0.0, 0.0],
            vec![0.06, 0.06],
            vec![0.0, 0.2],
            vec![5.0, 5.0],
        ];
        (posts, vectors)
    }

    #[tokio::test]
    async fn test_too_few_posts_is_empty_without_embedding() {
        let embedder = FixedEmbedder::new(vec![vec![0.0]; 4]);
        let engine = ClusterEngine::new(embedder);
        let posts: Vec<Post> = (1..=4).map(|id| post(id, "text", 1.0)).collect();

        let clusters = engine.cluster_posts(&posts).await.unwrap();

        assert!(clusters.is_empty());
        assert_eq!(engine.embedder.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_empty_input_is_empty() {
        let engine = ClusterEngine::new(FailingEmbedder);
        assert!(engine.cluster_posts(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pastel_group_with_off_topic_outlier() {
        let (posts, vectors) = pastel_posts();
        let engine = ClusterEngine::new(FixedEmbedder::new(vectors));

        let clusters = engine.cluster_posts(&posts).await.unwrap();

        assert_eq!(clusters.len(), 1);
        let group = clusters.values().next().unwrap();
        let engagements: Vec<f64> = group.iter().map(RankedPost::engagement).collect();
        assert_eq!(engagements, vec![80.0, 50.0, 20.0, 10.0]);

        let centroids: Vec<i64> = group
            .iter()
            .filter(|p| p.is_centroid)
            .map(RankedPost::id)
            .collect();
        assert_eq!(centroids, vec![3]);
        assert!(group.iter().all(|p| p.id() != 5));
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let (posts, _) = pastel_posts();
        let engine = ClusterEngine::new(FailingEmbedder);

        let err = engine.cluster_posts(&posts).await.unwrap_err();

        assert!(matches!(
            err,
            CoreError::Embedding(EmbeddingError::InferenceFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_wrong_vector_count_is_fatal() {
        let (posts, mut vectors) = pastel_posts();
        vectors.pop();
        let engine = ClusterEngine::new(FixedEmbedder::new(vectors));

        let err = engine.cluster_posts(&posts).await.unwrap_err();

        assert!(matches!(
            err,
            CoreError::Embedding(EmbeddingError::CountMismatch {
                expected: 5,
                actual: 4
            })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected() {
        let (mut posts, vectors) = pastel_posts();
        posts[4].id = 1;
        let engine = ClusterEngine::new(FixedEmbedder::new(vectors));

        let err = engine.cluster_posts(&posts).await.unwrap_err();

        assert!(matches!(err, CoreError::InvalidInput { .. }));
        assert_eq!(engine.embedder.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_blank_text_and_bad_engagement_rejected() {
        let (mut posts, vectors) = pastel_posts();
        posts[2].text = "   ".to_string();
        let engine = ClusterEngine::new(FixedEmbedder::new(vectors.clone()));
        assert!(matches!(
            engine.cluster_posts(&posts).await,
            Err(CoreError::InvalidInput { .. })
        ));

        let (mut posts, _) = pastel_posts();
        posts[0].engagement = f64::NAN;
        let engine = ClusterEngine::new(FixedEmbedder::new(vectors.clone()));
        assert!(matches!(
            engine.cluster_posts(&posts).await,
            Err(CoreError::InvalidInput { .. })
        ));

        let (mut posts, _) = pastel_posts();
        posts[0].engagement = -3.0;
        let engine = ClusterEngine::new(FixedEmbedder::new(vectors));
        assert!(matches!(
            engine.cluster_posts(&posts).await,
            Err(CoreError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_groups_never_contain_noise_and_stay_sorted() {
        let posts: Vec<Post> = (1..=7)
            .map(|id| post(id, "some post", ((id * 37) % 11) as f64))
            .collect();
        let vectors = vec![
            vec![0.0, 0.0],
            vec![10.0, 10.0],
            vec![0.1, 0.0],
            vec![-40.0, 25.0],
            vec![10.11, 10.0],
            vec![0.0, 0.12],
            vec![10.0, 10.1],
        ];
        let engine = ClusterEngine::new(FixedEmbedder::new(vectors));

        let clusters = engine.cluster_posts(&posts).await.unwrap();

        assert_eq!(clusters.len(), 2);
        for group in clusters.values() {
            assert!(group.iter().all(|p| p.id() != 4));
            assert!(group
                .windows(2)
                .all(|pair| pair[0].engagement() >= pair[1].engagement()));
            assert_eq!(group.iter().filter(|p| p.is_centroid).count(), 1);
        }
    }

    #[test]
    fn test_from_config_rejects_bad_params() {
        let config = ClusteringConfig {
            min_posts: 5,
            min_cluster_size: 3,
            min_samples: 0,
        };
        assert!(matches!(
            ClusterEngine::from_config(FailingEmbedder, &config),
            Err(CoreError::Clustering(_))
        ));
    }
}
