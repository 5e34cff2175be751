//! Language-model clients behind a single [`ChatModel`] seam.
//!
//! Two implementations exist:
//!
//! * [`OpenAiChat`] — posts to `{base_url}/chat/completions` with a bearer
//!   key taken from the configuration. Works with OpenAI and any compatible
//!   server (vLLM, LiteLLM, Ollama's `/v1`).
//! * [`ProviderChat`] — wraps an `edgequake-llm` provider so Anthropic,
//!   Gemini and the rest can be selected by name.
//!
//! Both send exactly one user message and return the raw reply text. Neither
//! retries: a failed call fails the request.

use crate::config::{LlmBackend, ProcessorConfig};
use crate::error::DocIntelError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LlmError, ProviderFactory};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const PROVIDER: &str = "LLM provider";

/// Sends one prompt, returns the model's reply text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, for logs.
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, DocIntelError>;
}

/// Build the client selected by `config.llm_backend`.
pub fn chat_model_from_config(
    config: &ProcessorConfig,
) -> Result<Arc<dyn ChatModel>, DocIntelError> {
    match &config.llm_backend {
        LlmBackend::OpenAiCompatible => {
            info!(url = %config.llm_base_url, model = %config.model, "Using OpenAI-compatible backend");
            Ok(Arc::new(OpenAiChat::from_config(config)?))
        }
        LlmBackend::Provider(name) => {
            info!(provider = %name, model = %config.model, "Using edgequake-llm provider");
            Ok(Arc::new(ProviderChat::from_config(name, config)?))
        }
    }
}

// ── OpenAI-compatible ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for OpenAI and compatible servers.
pub struct OpenAiChat {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout_secs: u64,
}

impl OpenAiChat {
    pub fn from_config(config: &ProcessorConfig) -> Result<Self, DocIntelError> {
        if config.llm_api_key.trim().is_empty() {
            return Err(DocIntelError::ProviderNotConfigured {
                provider: "openai".into(),
                hint: "set OPENAI_API_KEY".into(),
            });
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.llm_timeout_secs))
            .build()
            .map_err(|e| DocIntelError::ProviderNotConfigured {
                provider: "openai".into(),
                hint: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: format!("{}/chat/completions", config.llm_base_url.trim_end_matches('/')),
            api_key: config.llm_api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.llm_timeout_secs,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, DocIntelError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![WireMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DocIntelError::from_reqwest(PROVIDER, self.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| DocIntelError::from_reqwest(PROVIDER, self.timeout_secs, e))?;

        let content = first_content(chat)?;
        debug!(chars = content.len(), "Model reply received");
        Ok(content)
    }
}

fn first_content(chat: ChatResponse) -> Result<String, DocIntelError> {
    chat.choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or_else(|| DocIntelError::LlmApi {
            message: "response contained no choices".into(),
        })
}

fn status_error(status: StatusCode, body: String) -> DocIntelError {
    let detail = format!("HTTP {status}: {}", body.trim());
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        DocIntelError::Auth {
            provider: PROVIDER.to_string(),
            detail,
        }
    } else {
        DocIntelError::LlmApi { message: detail }
    }
}

// ── edgequake-llm providers ──────────────────────────────────────────────

/// Any `edgequake-llm` provider, with a local timeout around each call.
pub struct ProviderChat {
    provider: Arc<dyn LLMProvider>,
    model: String,
    temperature: f32,
    max_tokens: Option<usize>,
    timeout: Duration,
}

impl ProviderChat {
    /// The factory reads the provider's own API key variable.
    pub fn from_config(name: &str, config: &ProcessorConfig) -> Result<Self, DocIntelError> {
        let provider = ProviderFactory::create_llm_provider(name, &config.model).map_err(|e| {
            DocIntelError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: e.to_string(),
            }
        })?;
        Ok(Self::new(provider, config))
    }

    pub fn new(provider: Arc<dyn LLMProvider>, config: &ProcessorConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens.map(|n| n as usize),
            timeout: Duration::from_secs(config.llm_timeout_secs),
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: self.max_tokens,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ChatModel for ProviderChat {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, DocIntelError> {
        let messages = vec![ChatMessage::user(prompt)];
        let options = self.options();

        match tokio::time::timeout(self.timeout, self.provider.chat(&messages, Some(&options)))
            .await
        {
            Ok(Ok(response)) => {
                debug!(
                    "{} input tokens, {} output tokens",
                    response.prompt_tokens, response.completion_tokens
                );
                Ok(response.content)
            }
            Ok(Err(e)) => Err(provider_error(e, self.timeout.as_secs())),
            Err(_) => Err(DocIntelError::Timeout {
                provider: PROVIDER.to_string(),
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

/// Sort provider failures into the same buckets the OpenAI client uses.
fn provider_error(err: LlmError, timeout_secs: u64) -> DocIntelError {
    match err {
        LlmError::AuthError(detail) => DocIntelError::Auth {
            provider: PROVIDER.to_string(),
            detail,
        },
        LlmError::NetworkError(detail) => DocIntelError::Transport {
            provider: PROVIDER.to_string(),
            detail,
        },
        LlmError::Timeout => DocIntelError::Timeout {
            provider: PROVIDER.to_string(),
            secs: timeout_secs,
        },
        other => DocIntelError::LlmApi {
            message: other.to_string(),
        },
    }
}
