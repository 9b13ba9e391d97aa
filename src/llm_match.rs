//! LLM-based industry affiliation classification.
//!
//! Second classification layer for articles the keyword pass could not
//! resolve. Articles are sent in small batches to an OpenAI-compatible chat
//! completions endpoint (Groq by default) and the reply is parsed back into
//! [`ClassifiedArticle`]s. Any failing batch is logged and skipped.

use crate::classify::FallbackClassifier;
use crate::error::{PapersError, Result};
use crate::models::{ArticleRecord, ClassifiedArticle};
use crate::prompts::industry_affiliation::{build_user_prompt, SYSTEM_PROMPT};
use crate::throttle::Throttle;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default chat completions endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default model name
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Articles per LLM request
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Pause between batches, keeps us under 30 requests per minute
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_secs(3);

/// Environment variable holding the API credential
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Completion budget per batch
const MAX_TOKENS: u32 = 4000;

/// LLM configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub batch_size: usize,
    pub request_interval: Duration,
    pub timeout: Duration,
}

impl LlmConfig {
    /// Defaults with the given credential
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            request_interval: DEFAULT_BATCH_INTERVAL,
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// Read the credential from `GROQ_API_KEY`; `LLM_BASE_URL` and
    /// `LLM_MODEL` override the endpoint and model.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                PapersError::Config(format!("{} environment variable not set", API_KEY_ENV))
            })?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("LLM_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.base_url = base_url;
            }
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        Ok(config)
    }
}

/// Token usage tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// OpenAI-compatible API response structures
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

/// Chat-completion classifier
pub struct LlmClassifier {
    client: reqwest::Client,
    config: LlmConfig,
    throttle: Throttle,
}

impl LlmClassifier {
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(PapersError::Config("LLM API key is empty".to_string()));
        }
        if config.batch_size == 0 {
            return Err(PapersError::Config("LLM batch size must be positive".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PapersError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            throttle: Throttle::new(config.request_interval),
            config,
        })
    }

    /// Construct from environment configuration, see [`LlmConfig::from_env`]
    pub fn from_env() -> Result<Self> {
        Self::new(LlmConfig::from_env()?)
    }

    /// Classify articles batch by batch, in order.
    ///
    /// Articles without an industry author are simply absent from the
    /// result. Failed batches contribute nothing.
    pub async fn classify_articles(&self, articles: &[ArticleRecord]) -> Vec<ClassifiedArticle> {
        if articles.is_empty() {
            return Vec::new();
        }

        let batch_count = articles.len().div_ceil(self.config.batch_size);
        info!(
            count = articles.len(),
            batches = batch_count,
            model = %self.config.model,
            "Starting LLM classification"
        );

        let mut matched = Vec::new();
        let mut usage = TokenUsage::default();

        for (idx, batch) in articles.chunks(self.config.batch_size).enumerate() {
            match self.classify_batch(batch, idx).await {
                Ok((articles, batch_usage)) => {
                    debug!(batch = idx + 1, matched = articles.len(), "Batch classified");
                    usage.add(&batch_usage);
                    matched.extend(articles);
                }
                Err(e) => {
                    warn!(
                        batch = idx + 1,
                        size = batch.len(),
                        error = %e,
                        "LLM batch failed, skipping"
                    );
                }
            }
        }

        info!(
            matched = matched.len(),
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "LLM classification complete"
        );
        matched
    }

    /// Classify one batch via the chat completions API
    async fn classify_batch(
        &self,
        batch: &[ArticleRecord],
        idx: usize,
    ) -> Result<(Vec<ClassifiedArticle>, TokenUsage)> {
        let papers_json = serde_json::to_string(batch)?;
        let user_prompt = build_user_prompt(&papers_json);

        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": 0,
            "max_tokens": MAX_TOKENS
        });

        let api_url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        self.throttle.wait().await;
        debug!(batch = idx + 1, size = batch.len(), "Sending LLM request");

        let response = self
            .client
            .post(&api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PapersError::Api {
                code: status.as_u16(),
                message: format!("LLM API error: {} - {}", status, error_text),
            });
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| PapersError::Parse(format!("Failed to parse LLM response: {}", e)))?;

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let known_ids: HashSet<&str> = batch.iter().map(|a| a.id.as_str()).collect();
        let articles = parse_llm_response(&content)?
            .into_iter()
            .filter(|a| {
                let known = known_ids.contains(a.id.as_str());
                if !known {
                    debug!(id = %a.id, "Dropping article not present in the batch");
                }
                known
            })
            .collect();

        Ok((articles, usage))
    }
}

#[async_trait]
impl FallbackClassifier for LlmClassifier {
    async fn classify(&self, articles: &[ArticleRecord]) -> Result<Vec<ClassifiedArticle>> {
        Ok(self.classify_articles(articles).await)
    }
}

/// Parse the model's reply into classified articles.
///
/// One extraction attempt: the span from the first `[` to the last `]`.
/// Articles that come back without authors are dropped.
pub fn parse_llm_response(content: &str) -> Result<Vec<ClassifiedArticle>> {
    let json_str = extract_json_array(content).ok_or_else(|| {
        let preview: String = content.chars().take(200).collect();
        PapersError::Parse(format!("No JSON array in LLM output: {}", preview))
    })?;

    let articles: Vec<ClassifiedArticle> = serde_json::from_str(json_str)
        .map_err(|e| PapersError::Parse(format!("Malformed LLM JSON: {}", e)))?;

    Ok(articles
        .into_iter()
        .filter(|a| {
            if a.authors.is_empty() {
                debug!(id = %a.id, "Dropping article with no industry authors");
            }
            !a.authors.is_empty()
        })
        .collect())
}

/// Outermost bracketed span of the text
fn extract_json_array(content: &str) -> Option<&str> {
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    (end > start).then(|| &content[start..=end])
}
