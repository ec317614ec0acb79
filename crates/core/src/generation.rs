use crate::error::{ConfigError, GenerationError, NO_CLEAR_ANSWER_MESSAGE, TEMPORARY_ISSUE_MESSAGE};
use crate::models::{GenerationSettings, QueryOptions};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://router.huggingface.co/v1";
pub const DEFAULT_MODEL: &str = "meta-llama/Meta-Llama-3.1-8B-Instruct";

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stop: Vec<String>,
    /// Returned by [`RetryingClient::complete`] when the model answers with blank text.
    pub empty_answer: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, settings: GenerationSettings) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            stop: Vec::new(),
            empty_answer: NO_CLEAR_ANSWER_MESSAGE.to_string(),
        }
    }

    pub fn with_stop(mut self, stop: &[String]) -> Self {
        self.stop = stop.to_vec();
        self
    }

    pub fn with_empty_answer(mut self, message: impl Into<String>) -> Self {
        self.empty_answer = message.into();
        self
    }
}

/// One call to a generative model. Implementations do not retry; [`RetryingClient`] does.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn attempt(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[async_trait]
impl<G> Generator for Arc<G>
where
    G: Generator + ?Sized,
{
    async fn attempt(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        (**self).attempt(request).await
    }
}

/// Delay before retry `n` (zero-based) is `offset + base_delay * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub offset: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            offset: Duration::ZERO,
        }
    }
}

impl From<&QueryOptions> for BackoffPolicy {
    fn from(value: &QueryOptions) -> Self {
        Self {
            max_attempts: value.retry_max_attempts,
            base_delay: Duration::from_millis(value.retry_base_delay_ms),
            offset: Duration::from_millis(value.retry_offset_ms),
        }
    }
}

impl BackoffPolicy {
    pub fn no_delay(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            offset: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.offset.saturating_add(self.base_delay.saturating_mul(factor))
    }
}

/// Wraps a [`Generator`] with bounded retries and exponential backoff.
pub struct RetryingClient<G> {
    generator: G,
    backoff: BackoffPolicy,
    attempt_timeout: Option<Duration>,
}

impl<G: Generator> RetryingClient<G> {
    pub fn new(generator: G, backoff: BackoffPolicy) -> Self {
        Self {
            generator,
            backoff,
            attempt_timeout: None,
        }
    }

    /// Caps each attempt; an attempt that runs longer fails with [`GenerationError::Timeout`].
    pub fn with_attempt_timeout(mut self, limit: Option<Duration>) -> Self {
        self.attempt_timeout = limit;
        self
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    async fn attempt_once(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        match self.attempt_timeout {
            Some(limit) => timeout(limit, self.generator.attempt(request))
                .await
                .unwrap_or(Err(GenerationError::Timeout(limit))),
            None => self.generator.attempt(request).await,
        }
    }

    /// Returns the trimmed model output, [`GenerationError::EmptyAnswer`] for blank
    /// output, or [`GenerationError::Exhausted`] once every attempt has failed.
    pub async fn try_complete(
        &self,
        request: &GenerationRequest,
    ) -> Result<String, GenerationError> {
        let attempts = self.backoff.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            match self.attempt_once(request).await {
                Ok(text) => {
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        return Err(GenerationError::EmptyAnswer);
                    }
                    debug!(attempt = attempt + 1, chars = trimmed.len(), "generation succeeded");
                    return Ok(trimmed.to_string());
                }
                Err(error) if !error.is_retryable() => return Err(error),
                Err(error) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        %error,
                        "generation attempt failed"
                    );
                    last_error = error.to_string();
                    if attempt + 1 < attempts {
                        sleep(self.backoff.delay_for(attempt)).await;
                    }
                }
            }
        }

        Err(GenerationError::Exhausted {
            attempts,
            last: last_error,
        })
    }

    /// Like [`try_complete`](Self::try_complete), but always yields text fit for the user.
    pub async fn complete(&self, request: &GenerationRequest) -> String {
        match self.try_complete(request).await {
            Ok(answer) => answer,
            Err(GenerationError::EmptyAnswer) => request.empty_answer.clone(),
            Err(error) => {
                error!(%error, "generation failed");
                TEMPORARY_ISSUE_MESSAGE.to_string()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "no_stop_sequences")]
    stop: &'a [String],
}

fn no_stop_sequences(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for OpenAI-compatible inference endpoints.
pub struct HttpGenerator {
    url: Url,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, ConfigError> {
        let url = completions_url(&config.endpoint)?;
        if config.model.trim().is_empty() {
            return Err(ConfigError::InvalidArgument("model name is empty".to_string()));
        }

        let client = Client::builder().timeout(config.request_timeout).build()?;
        let api_key = config
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(Self {
            url,
            model: config.model,
            api_key,
            client,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn request_body<'a>(&'a self, request: &'a GenerationRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stop: &request.stop,
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn attempt(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut call = self
            .client
            .post(self.url.clone())
            .header("content-type", "application/json")
            .json(&self.request_body(request));

        if let Some(api_key) = &self.api_key {
            call = call.bearer_auth(api_key);
        }

        let response = call.send().await?;
        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(GenerationError::Backend {
                backend: self.url.to_string(),
                details: format!("{status}: {details}"),
            });
        }

        let payload: ChatResponse = response.json().await?;
        first_choice_text(payload)
    }
}

fn completions_url(endpoint: &str) -> Result<Url, ConfigError> {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.ends_with("/chat/completions") {
        return Ok(Url::parse(trimmed)?);
    }
    Ok(Url::parse(&format!("{trimmed}/chat/completions"))?)
}

fn first_choice_text(payload: ChatResponse) -> Result<String, GenerationError> {
    payload
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| GenerationError::MalformedResponse("response had no choices".to_string()))
}
