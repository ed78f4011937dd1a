//! Maps errors onto the run's failure taxonomy.
//!
//! A batch run distinguishes three kinds of failure: fatal ones that abort the
//! whole run, per-item ones that only drop the current group, and transient
//! network failures that the collector retries.

use crate::{CoreError, DatabaseError};

/// Recovery strategy for handling errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Retry the operation with exponential backoff
    RetryWithBackoff,
    /// Drop the current item and continue with its siblings
    Skip,
    /// Abort the run and surface the error to the caller
    Fail,
}

impl RecoveryStrategy {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecoveryStrategy::Fail)
    }
}

pub struct ErrorRecovery;

impl ErrorRecovery {
    /// Determine the appropriate recovery strategy for a given error
    pub fn determine_strategy(error: &CoreError) -> RecoveryStrategy {
        match error {
            // Upstream collection talks to flaky public endpoints
            CoreError::Network(_) | CoreError::RedditApi(_) | CoreError::Timeout { .. } => {
                RecoveryStrategy::RetryWithBackoff
            }

            // Without vectors there is nothing to group
            CoreError::Embedding(_) | CoreError::Clustering(_) => RecoveryStrategy::Fail,

            // Malformed core input must never be silently dropped
            CoreError::InvalidInput { .. } => RecoveryStrategy::Fail,

            CoreError::Config(_) => RecoveryStrategy::Fail,

            // Judge failures only cost the group being judged
            CoreError::Llm(_) | CoreError::Serialization(_) => RecoveryStrategy::Skip,

            CoreError::Database(db_error) => match db_error {
                DatabaseError::ConnectionFailed { .. } | DatabaseError::MigrationFailed { .. } => {
                    RecoveryStrategy::Fail
                }
                _ => RecoveryStrategy::Skip,
            },

            CoreError::Io(_) | CoreError::Internal { .. } => RecoveryStrategy::Fail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfigError, EmbeddingError, LlmError, RedditApiError};

    #[test]
    fn test_embedding_failure_is_fatal() {
        let error = CoreError::Embedding(EmbeddingError::InferenceFailed {
            reason: "out of memory".to_string(),
        });
        assert!(ErrorRecovery::determine_strategy(&error).is_fatal());
    }

    #[test]
    fn test_invalid_input_is_fatal() {
        let error = CoreError::invalid_input("duplicate post id 4");
        assert_eq!(
            ErrorRecovery::determine_strategy(&error),
            RecoveryStrategy::Fail
        );
    }

    #[test]
    fn test_judge_and_write_failures_skip_the_group() {
        let judge_error = CoreError::Llm(LlmError::RequestTimeout {
            provider: "openai".to_string(),
        });
        assert_eq!(
            ErrorRecovery::determine_strategy(&judge_error),
            RecoveryStrategy::Skip
        );

        let write_error = CoreError::Database(DatabaseError::ConstraintViolation {
            constraint: "search_actions.trend_id".to_string(),
        });
        assert_eq!(
            ErrorRecovery::determine_strategy(&write_error),
            RecoveryStrategy::Skip
        );
    }

    #[test]
    fn test_collection_errors_retry() {
        let error = CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 });
        assert_eq!(
            ErrorRecovery::determine_strategy(&error),
            RecoveryStrategy::RetryWithBackoff
        );
        assert!(!RecoveryStrategy::RetryWithBackoff.is_fatal());
    }

    #[test]
    fn test_config_errors_fail() {
        let error = CoreError::Config(ConfigError::MissingEnvironmentVariable {
            var_name: "OPENAI_API_KEY".to_string(),
        });
        assert!(ErrorRecovery::determine_strategy(&error).is_fatal());
    }
}
