use crate::sanitize::sanitize_trend_name;
use llm_interface::{LlmProvider, RelevanceBand};
use tracing::debug;
use trend_core::{AcceptedTrend, CoreError, LlmError, RankedPost, TrendJudgment};

/// Each post contributes at most this many characters to the judge's context.
pub const CONTEXT_CHAR_LIMIT: usize = 600;
pub const DEFAULT_MIN_RELEVANCE_SCORE: i64 = 50;

/// What happened to one cluster at the decision gate.
#[derive(Debug)]
pub enum GroupOutcome {
    Accepted(AcceptedTrend),
    Rejected(String),
    /// The judge could not give a usable verdict. Counts as a reject.
    Failed(CoreError),
}

impl GroupOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GroupOutcome::Accepted(_))
    }
}

pub struct TrendValidator<L> {
    judge: L,
    min_relevance_score: i64,
}

impl<L: LlmProvider> TrendValidator<L> {
    pub fn new(judge: L) -> Self {
        Self {
            judge,
            min_relevance_score: DEFAULT_MIN_RELEVANCE_SCORE,
        }
    }

    pub fn with_min_relevance_score(mut self, score: i64) -> Self {
        self.min_relevance_score = score;
        self
    }

    pub fn judge(&self) -> &L {
        &self.judge
    }

    /// Ask the judge about one engagement-ordered cluster and apply the gate.
    pub async fn validate(&self, group: &[RankedPost]) -> GroupOutcome {
        let Some((definition, proof)) = select_posts(group) else {
            return GroupOutcome::Rejected("empty cluster".to_string());
        };

        debug!(
            "Judging cluster of {} (definition {}, proof {})",
            group.len(),
            definition.id(),
            proof.id()
        );

        let context = build_context(definition, proof);
        match self.judge.assess_trend(&context).await {
            Ok(judgment) => self.gate(judgment),
            Err(error) => GroupOutcome::Failed(error),
        }
    }

    /// Accept only a valid judgment scoring at least the threshold.
    pub fn gate(&self, judgment: TrendJudgment) -> GroupOutcome {
        let Some(band) = RelevanceBand::from_score(judgment.relevance_score) else {
            return GroupOutcome::Failed(malformed(format!(
                "relevance_score {} outside 0-100",
                judgment.relevance_score
            )));
        };

        if !judgment.valid {
            return GroupOutcome::Rejected(format!(
                "judge found no cohesive aesthetic ({:?}, score {})",
                band, judgment.relevance_score
            ));
        }

        if judgment.relevance_score < self.min_relevance_score {
            return GroupOutcome::Rejected(format!(
                "relevance score {} below {} ({:?})",
                judgment.relevance_score, self.min_relevance_score, band
            ));
        }

        let trend_name = sanitize_trend_name(&judgment.trend_name);
        if trend_name.is_empty() {
            return GroupOutcome::Failed(malformed("accepted judgment has no trend name"));
        }

        GroupOutcome::Accepted(AcceptedTrend {
            trend_name,
            summary: judgment.summary,
            relevance_score: judgment.relevance_score,
            aesthetic_keywords: judgment.aesthetic_keywords,
        })
    }
}

/// Pick the "definition" and "proof" posts the judge sees.
///
/// The definition is the centroid post (or the first post if none is flagged).
/// The proof is the top-engagement post, or the runner-up when that is the
/// definition itself.
pub fn select_posts(group: &[RankedPost]) -> Option<(&RankedPost, &RankedPost)> {
    let first = group.first()?;
    let definition = group.iter().find(|p| p.is_centroid).unwrap_or(first);

    let mut by_engagement: Vec<&RankedPost> = group.iter().collect();
    by_engagement.sort_by(|a, b| b.engagement().total_cmp(&a.engagement()));

    let proof = match by_engagement.as_slice() {
        [top, second, ..] if top.id() == definition.id() => *second,
        [top, ..] => *top,
        [] => return None,
    };

    Some((definition, proof))
}

pub fn build_context(definition: &RankedPost, proof: &RankedPost) -> String {
    format!(
        "POST A (Definition):\n{}\n\nPOST B (Proof):\n{}",
        truncate_chars(definition.text(), CONTEXT_CHAR_LIMIT),
        truncate_chars(proof.text(), CONTEXT_CHAR_LIMIT)
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn malformed(details: impl Into<String>) -> CoreError {
    LlmError::InvalidResponseFormat {
        provider: "judge".to_string(),
        details: details.into(),
    }
    .into()
}
