//! The trend judge: decides whether a cluster shows a coherent visual aesthetic.

mod openai;
mod prompt;
pub mod schema;

pub use openai::OpenAiProvider;
pub use prompt::TREND_SCOUT_PROMPT;
pub use schema::{StructuredOutput, TrendAnalysis};

use trend_core::{CoreError, TrendJudgment};

pub trait LlmProvider {
    /// Judge one cluster from its two-post context.
    async fn assess_trend(&self, context: &str) -> Result<TrendJudgment, CoreError>;
}

/// How strongly a judgment's score says the cluster is a visual aesthetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RelevanceBand {
    /// 0-20
    NoVisualSignal,
    /// 21-49: visuals present without cohesion
    Mixed,
    /// 50-74
    Broad,
    /// 75-100
    Strong,
}

impl RelevanceBand {
    /// `None` for scores outside 0-100.
    pub fn from_score(score: i64) -> Option<Self> {
        match score {
            0..=20 => Some(RelevanceBand::NoVisualSignal),
            21..=49 => Some(RelevanceBand::Mixed),
            50..=74 => Some(RelevanceBand::Broad),
            75..=100 => Some(RelevanceBand::Strong),
            _ => None,
        }
    }

    pub fn is_cohesive(&self) -> bool {
        matches!(self, RelevanceBand::Broad | RelevanceBand::Strong)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_edges() {
        assert_eq!(RelevanceBand::from_score(0), Some(RelevanceBand::NoVisualSignal));
        assert_eq!(RelevanceBand::from_score(20), Some(RelevanceBand::NoVisualSignal));
        assert_eq!(RelevanceBand::from_score(21), Some(RelevanceBand::Mixed));
        assert_eq!(RelevanceBand::from_score(49), Some(RelevanceBand::Mixed));
        assert_eq!(RelevanceBand::from_score(50), Some(RelevanceBand::Broad));
        assert_eq!(RelevanceBand::from_score(74), Some(RelevanceBand::Broad));
        assert_eq!(RelevanceBand::from_score(75), Some(RelevanceBand::Strong));
        assert_eq!(RelevanceBand::from_score(100), Some(RelevanceBand::Strong));
    }

    #[test]
    fn test_out_of_range_has_no_band() {
        assert_eq!(RelevanceBand::from_score(-1), None);
        assert_eq!(RelevanceBand::from_score(101), None);
    }

    #[test]
    fn test_cohesion_starts_at_broad() {
        assert!(!RelevanceBand::Mixed.is_cohesive());
        assert!(RelevanceBand::Broad.is_cohesive());
        assert!(RelevanceBand::Strong > RelevanceBand::Broad);
    }
}
