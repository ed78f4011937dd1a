use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const DATABASE_URL_VAR: &str = "TREND_HUNTER_DATABASE_URL";

/// Top-level configuration. Every section has defaults, so an empty TOML file
/// (or no file at all) is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub clustering: ClusteringConfig,
    pub judge: JudgeConfig,
    pub pipeline: PipelineConfig,
    pub reddit: RedditConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://trend_hunter.db".to_string(),
            max_connections: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Directory holding `config.json`, `tokenizer.json` and `model.safetensors`.
    pub model_dir: PathBuf,
    pub batch_size: usize,
    pub max_tokens: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models/all-MiniLM-L6-v2"),
            batch_size: 32,
            max_tokens: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Below this many posts the engine reports no clusters.
    pub min_posts: usize,
    pub min_cluster_size: usize,
    pub min_samples: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_posts: 5,
            min_cluster_size: 3,
            min_samples: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    pub api_base: String,
    pub model: String,
    pub timeout_secs: u64,
    pub min_relevance_score: i64,
    /// Read from `OPENAI_API_KEY`, never from the file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
            min_relevance_score: 50,
            api_key: None,
        }
    }
}

impl JudgeConfig {
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                var_name: OPENAI_API_KEY_VAR.to_string(),
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// How many top-engagement posts one run reads from the store.
    pub post_limit: u32,
    pub product_suffix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            post_limit: 500,
            product_suffix: "Chat Widget".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub user_agent: String,
    pub subreddits: Vec<String>,
    /// Communities whose posts are kept without a keyword match.
    pub visual_subreddits: Vec<String>,
    pub listing_limit: u32,
    pub request_timeout_secs: u64,
    pub pause_between_subreddits_secs: u64,
}

impl Default for RedditConfig {
    fn default() -> Self {
        let to_strings = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            user_agent: "rust:trend-hunter:v0.1.0".to_string(),
            subreddits: to_strings(&[
                "Twitch",
                "OBS",
                "streaming",
                "NewTubers",
                "VirtualYoutubers",
                "vtubers",
                "LivestreamFail",
                "GirlGamers",
                "Twitch_Startup",
                "streamup",
                "desksetup",
                "macsetups",
                "unixporn",
                "Rainmeter",
                "CozyGamers",
                "PixelArt",
                "Cyberpunk",
                "Outrun",
                "gamerooms",
                "StreamOverlaysArt",
            ]),
            visual_subreddits: to_strings(&[
                "unixporn",
                "Rainmeter",
                "desksetup",
                "macsetups",
                "gamerooms",
                "battlestations",
                "gamingsetups",
                "PixelArt",
                "Outrun",
                "Cyberpunk",
            ]),
            listing_limit: 100,
            request_timeout_secs: 15,
            pause_between_subreddits_secs: 2,
        }
    }
}

impl AppConfig {
    /// Parse configuration from TOML text without touching the environment.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })?;
                info!("Loaded configuration from {}", path.display());
                toml::from_str(&text)?
            }
            None => {
                debug!("No configuration file given, using defaults");
                AppConfig::default()
            }
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(DATABASE_URL_VAR).filter(|v| !v.trim().is_empty()) {
            self.database.url = url;
        }
        if let Some(key) = lookup(OPENAI_API_KEY_VAR).filter(|v| !v.trim().is_empty()) {
            self.judge.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "database.url".to_string(),
            });
        }
        if self.embedding.batch_size == 0 {
            return Err(invalid("embedding.batch_size", self.embedding.batch_size));
        }
        if self.clustering.min_cluster_size < 2 {
            return Err(invalid(
                "clustering.min_cluster_size",
                self.clustering.min_cluster_size,
            ));
        }
        if self.clustering.min_samples < 1
            || self.clustering.min_samples > self.clustering.min_cluster_size
        {
            return Err(invalid(
                "clustering.min_samples",
                self.clustering.min_samples,
            ));
        }
        if !(0..=100).contains(&self.judge.min_relevance_score) {
            return Err(invalid(
                "judge.min_relevance_score",
                self.judge.min_relevance_score,
            ));
        }
        if self.pipeline.post_limit == 0 {
            return Err(invalid("pipeline.post_limit", self.pipeline.post_limit));
        }
        if self.pipeline.product_suffix.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "pipeline.product_suffix".to_string(),
            });
        }
        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}
