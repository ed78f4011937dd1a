use crate::prompt::TREND_SCOUT_PROMPT;
use crate::schema::{StructuredOutput, TrendAnalysis};
use crate::{LlmProvider, RelevanceBand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use trend_core::{CoreError, JudgeConfig, LlmError, TrendJudgment};

const PROVIDER: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

pub struct OpenAiProvider {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &JudgeConfig) -> Result<Self, CoreError> {
        let api_key = config.require_api_key()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_key: api_key.to_string(),
            model: config.model.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn headers(&self) -> Result<HeaderMap, CoreError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|_| {
            LlmError::InvalidApiKey {
                provider: PROVIDER.to_string(),
            }
        })?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn request(&self, context: &str) -> StructuredRequest {
        StructuredRequest {
            model: self.model.clone(),
            messages: vec![
                WireMessage::system(TREND_SCOUT_PROMPT),
                WireMessage::user(context),
            ],
            temperature: Some(0.0),
            response_format: ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: JsonSchemaFormat {
                    name: TrendAnalysis::type_name(),
                    strict: true,
                    schema: TrendAnalysis::openai_schema(),
                },
            },
        }
    }
}

impl LlmProvider for OpenAiProvider {
    async fn assess_trend(&self, context: &str) -> Result<TrendJudgment, CoreError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, "Requesting trend judgment");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&self.request(context))
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            warn!("Judge request failed with {}: {}", status, body);
            return Err(status_error(status, retry_after, &body, &self.model).into());
        }

        let chat: ChatResponse = response.json().await.map_err(invalid_format)?;
        let message = chat
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| invalid_format("response has no choices"))?;

        if let Some(refusal) = message.refusal {
            return Err(LlmError::ContentFiltered { reason: refusal }.into());
        }

        let content = message
            .content
            .ok_or_else(|| invalid_format("response has no content"))?;

        Ok(parse_judgment(&content)?)
    }
}

/// Decode the model's JSON content and check the score range.
pub(crate) fn parse_judgment(content: &str) -> Result<TrendJudgment, LlmError> {
    let analysis: TrendAnalysis = serde_json::from_str(content).map_err(invalid_format)?;

    if RelevanceBand::from_score(analysis.relevance_score).is_none() {
        return Err(invalid_format(format!(
            "relevance_score {} outside 0-100",
            analysis.relevance_score
        )));
    }

    Ok(analysis.into())
}

fn invalid_format(details: impl ToString) -> LlmError {
    LlmError::InvalidResponseFormat {
        provider: PROVIDER.to_string(),
        details: details.to_string(),
    }
}

fn send_error(error: reqwest::Error) -> CoreError {
    if error.is_timeout() {
        LlmError::RequestTimeout {
            provider: PROVIDER.to_string(),
        }
        .into()
    } else {
        CoreError::Network(error)
    }
}

fn status_error(status: StatusCode, retry_after: Option<u64>, body: &str, model: &str) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::InvalidApiKey {
            provider: PROVIDER.to_string(),
        },
        StatusCode::NOT_FOUND => LlmError::ModelNotAvailable {
            model: model.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded {
            provider: PROVIDER.to_string(),
            retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => LlmError::RequestTimeout {
            provider: PROVIDER.to_string(),
        },
        s if s.is_server_error() => LlmError::ServiceUnavailable {
            provider: PROVIDER.to_string(),
        },
        s => invalid_format(format!("HTTP {}: {}", s, body)),
    }
}

#[derive(Debug, Serialize)]
struct StructuredRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

impl WireMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: String,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}
