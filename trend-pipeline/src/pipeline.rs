use crate::action_queue::{ActionQueueWriter, QueuedTrend};
use crate::validator::{GroupOutcome, TrendValidator};
use cluster_engine::ClusterEngine;
use database::TrendStore;
use embedding_engine::EmbeddingProvider;
use llm_interface::LlmProvider;
use std::fmt;
use tracing::{info, warn};
use trend_core::{CoreError, ErrorExt, ErrorRecovery, ErrorReporter, Post};

pub const DEFAULT_POST_LIMIT: u32 = 500;

/// Tally of one analysis run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub posts_considered: usize,
    pub clusters_found: usize,
    pub queued: Vec<QueuedTrend>,
    pub rejected: usize,
    pub failed: usize,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} posts, {} clusters: {} queued, {} rejected, {} failed",
            self.posts_considered,
            self.clusters_found,
            self.queued.len(),
            self.rejected,
            self.failed
        )
    }
}

/// Read top posts, cluster them, judge every cluster and queue the winners.
pub struct TrendPipeline<E, L, S> {
    engine: ClusterEngine<E>,
    validator: TrendValidator<L>,
    writer: ActionQueueWriter<S>,
    post_limit: u32,
    reporter: ErrorReporter,
}

impl<E, L, S> TrendPipeline<E, L, S>
where
    E: EmbeddingProvider,
    L: LlmProvider,
    S: TrendStore,
{
    pub fn new(
        engine: ClusterEngine<E>,
        validator: TrendValidator<L>,
        writer: ActionQueueWriter<S>,
    ) -> Self {
        Self {
            engine,
            validator,
            writer,
            post_limit: DEFAULT_POST_LIMIT,
            reporter: ErrorReporter::new(),
        }
    }

    pub fn with_post_limit(mut self, limit: u32) -> Self {
        self.post_limit = limit;
        self
    }

    pub fn writer(&self) -> &ActionQueueWriter<S> {
        &self.writer
    }

    pub async fn run(&self) -> Result<RunReport, CoreError> {
        let stored = self
            .writer
            .store()
            .fetch_top_posts(self.post_limit)
            .await
            .map_err(|e| {
                e.log_error();
                e
            })?;
        info!("Loaded {} posts for analysis", stored.len());

        let posts: Vec<Post> = stored.into_iter().map(Post::from).collect();
        self.analyze(&posts).await
    }

    /// Cluster `posts` and push each cluster through the gate and the writer.
    ///
    /// Fatal errors abort the run. Anything else only costs the current cluster.
    pub async fn analyze(&self, posts: &[Post]) -> Result<RunReport, CoreError> {
        let mut report = RunReport {
            posts_considered: posts.len(),
            ..RunReport::default()
        };

        let clusters = self.engine.cluster_posts(posts).await.map_err(|e| {
            self.reporter.report_error(&e);
            e
        })?;
        report.clusters_found = clusters.len();

        for (label, group) in &clusters {
            match self.validator.validate(group).await {
                GroupOutcome::Accepted(trend) => match self.writer.enqueue(&trend).await {
                    Ok(queued) => report.queued.push(queued),
                    Err(error) => self.skip_or_abort(*label, error, &mut report)?,
                },
                GroupOutcome::Rejected(reason) => {
                    info!("Cluster {} rejected: {}", label, reason);
                    report.rejected += 1;
                }
                GroupOutcome::Failed(error) => self.skip_or_abort(*label, error, &mut report)?,
            }
        }

        info!("Analysis finished: {}", report);
        Ok(report)
    }

    fn skip_or_abort(
        &self,
        label: i32,
        error: CoreError,
        report: &mut RunReport,
    ) -> Result<(), CoreError> {
        if ErrorRecovery::determine_strategy(&error).is_fatal() {
            self.reporter.report_error(&error);
            return Err(error);
        }

        warn!("Skipping cluster {}: {}", label, error.user_friendly_message());
        self.reporter.report_warning(&error);
        report.failed += 1;
        Ok(())
    }
}
