use crate::error::*;
use tracing::{error, info, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> &'static str;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::RedditApi(e) => error!("Reddit API error details: {:?}", e),
            CoreError::Database(e) => error!("Database error details: {:?}", e),
            CoreError::Llm(e) => error!("LLM error details: {:?}", e),
            CoreError::Embedding(e) => error!("Embedding error details: {:?}", e),
            CoreError::Clustering(e) => error!("Clustering error details: {:?}", e),
            CoreError::Config(e) => error!("Configuration error details: {:?}", e),
            _ => {}
        }
        self
    }

    /// Transient collection failures: rate limits, 5xx, timeouts and dropped connections.
    fn is_retryable(&self) -> bool {
        match self {
            CoreError::RedditApi(e) => matches!(
                e,
                RedditApiError::RateLimitExceeded { .. }
                    | RedditApiError::RequestTimeout
                    | RedditApiError::ServerError { status_code: 500.. }
            ),
            CoreError::Network(e) => e.is_timeout() || e.is_connect(),
            CoreError::Timeout { .. } => true,
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => reddit_message(e),
            CoreError::Database(e) => database_message(e),
            CoreError::Llm(e) => llm_message(e),
            CoreError::Embedding(e) => embedding_message(e),
            CoreError::Config(e) => config_message(e),
            CoreError::Clustering(_) => {
                "Grouping posts failed. Check the clustering parameters.".to_string()
            }
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::InvalidInput { message } => format!("Invalid input: {}", message),
            CoreError::Timeout { .. } => {
                "The operation took too long to complete. Please try again.".to_string()
            }
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            CoreError::RedditApi(_) => "REDDIT_API",
            CoreError::Database(_) => "DATABASE",
            CoreError::Llm(_) => "LLM",
            CoreError::Embedding(_) => "EMBEDDING",
            CoreError::Clustering(_) => "CLUSTERING",
            CoreError::Config(_) => "CONFIG",
            CoreError::Io(_) => "IO",
            CoreError::Serialization(_) => "SERIALIZATION",
            CoreError::Network(_) => "NETWORK",
            CoreError::InvalidInput { .. } => "INVALID_INPUT",
            CoreError::Timeout { .. } => "TIMEOUT",
            CoreError::Internal { .. } => "INTERNAL",
        }
    }
}

fn reddit_message(error: &RedditApiError) -> String {
    match error {
        RedditApiError::RateLimitExceeded { retry_after } => format!(
            "Reddit is rate limiting us. Wait {} seconds before collecting again.",
            retry_after
        ),
        RedditApiError::Forbidden { resource } => {
            format!("Access denied to {}. The community may be private.", resource)
        }
        RedditApiError::SubredditNotFound { subreddit } => {
            format!("Subreddit '{}' not found or is private.", subreddit)
        }
        _ => "Reddit listing could not be read. Please try again later.".to_string(),
    }
}

fn database_message(error: &DatabaseError) -> String {
    match error {
        DatabaseError::ConnectionFailed { .. } => {
            "Database connection failed. Please try again.".to_string()
        }
        DatabaseError::DatabaseLocked => {
            "Database is temporarily busy. Another run may be in progress.".to_string()
        }
        DatabaseError::CorruptRow { table, .. } => {
            format!("A row in '{}' could not be read.", table)
        }
        _ => "Database error occurred. Please try again.".to_string(),
    }
}

fn llm_message(error: &LlmError) -> String {
    match error {
        LlmError::InvalidApiKey { provider } => {
            format!("Invalid API key for {}. Please update your credentials.", provider)
        }
        LlmError::RateLimitExceeded { provider, .. } => {
            format!("Rate limit exceeded for {}.", provider)
        }
        LlmError::ModelNotAvailable { model } => format!("Model '{}' is not available.", model),
        LlmError::InvalidResponseFormat { .. } => {
            "The judge returned an answer that could not be read.".to_string()
        }
        _ => "The judge could not assess this group.".to_string(),
    }
}

fn embedding_message(error: &EmbeddingError) -> String {
    match error {
        EmbeddingError::ModelNotFound { model_name } => format!(
            "Embedding model '{}' not found. Please download it first.",
            model_name
        ),
        EmbeddingError::CountMismatch { .. } | EmbeddingError::DimensionMismatch { .. } => {
            "The embedding model returned vectors of an unexpected shape.".to_string()
        }
        _ => "Embedding the posts failed.".to_string(),
    }
}

fn config_message(error: &ConfigError) -> String {
    match error {
        ConfigError::FileNotFound { path } => format!("Configuration file '{}' not found.", path),
        ConfigError::MissingField { field } => {
            format!("Required configuration field '{}' is missing.", field)
        }
        ConfigError::InvalidValue { field, .. } => {
            format!("Invalid value for configuration field '{}'.", field)
        }
        ConfigError::MissingEnvironmentVariable { var_name } => format!(
            "Environment variable '{}' is required but not set.",
            var_name
        ),
        ConfigError::Parse(_) => "Configuration file could not be parsed.".to_string(),
    }
}

/// Logs run failures with their code and a readable message.
#[derive(Debug, Default)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report_error(&self, error: &CoreError) {
        error.log_error();
        info!("Error code: {}", error.error_code());
        info!("User message: {}", error.user_friendly_message());
    }

    pub fn report_warning(&self, error: &CoreError) {
        warn!("[{}] {}", error.error_code(), error);
    }
}
