//! Configuration for the OCR → LLM extraction pipeline.
//!
//! Everything the two providers need (endpoints, credentials, sampling and
//! timeouts) lives in one [`ProcessorConfig`], built once at start-up via
//! [`ProcessorConfigBuilder`] or [`ProcessorConfig::from_env`] and then shared
//! read-only. There is no process-wide mutable state: tests construct a config
//! with fake keys and point the endpoints at local fakes.

use crate::error::DocIntelError;
use std::fmt;

/// OCR.space parse endpoint.
pub const DEFAULT_OCR_ENDPOINT: &str = "https://api.ocr.space/parse/image";

/// OpenAI API base URL; `/chat/completions` is appended.
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Configuration shared by the text extractor and the structured extractor.
///
/// # Example
/// ```rust
/// use docintel::ProcessorConfig;
///
/// let config = ProcessorConfig::builder()
///     .ocr_api_key("K000000")
///     .llm_api_key("sk-test")
///     .model("gpt-4o-mini")
///     .build()
///     .unwrap();
/// assert_eq!(config.ocr_language, "eng");
/// ```
#[derive(Clone)]
pub struct ProcessorConfig {
    /// OCR provider API key. Required.
    pub ocr_api_key: String,

    /// OCR provider URL. Default: [`DEFAULT_OCR_ENDPOINT`].
    pub ocr_endpoint: String,

    /// OCR language code sent as `language`. Default: `eng`.
    pub ocr_language: String,

    /// Timeout for the OCR call in seconds. Default: 60.
    pub ocr_timeout_secs: u64,

    /// Which client talks to the language model. Default: OpenAI-compatible.
    pub llm_backend: LlmBackend,

    /// Bearer key for the OpenAI-compatible backend. Required for that backend.
    pub llm_api_key: String,

    /// Base URL of the OpenAI-compatible API. Default: [`DEFAULT_LLM_BASE_URL`].
    pub llm_base_url: String,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Sampling temperature. Default: 0.0, the lowest the providers accept,
    /// so repeated calls on identical text agree as far as the provider allows.
    pub temperature: f32,

    /// Cap on generated tokens; `None` leaves it to the provider.
    pub max_tokens: Option<u32>,

    /// Timeout for the model call in seconds. Default: 60.
    pub llm_timeout_secs: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            ocr_api_key: String::new(),
            ocr_endpoint: DEFAULT_OCR_ENDPOINT.to_string(),
            ocr_language: "eng".to_string(),
            ocr_timeout_secs: 60,
            llm_backend: LlmBackend::default(),
            llm_api_key: String::new(),
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: None,
            llm_timeout_secs: 60,
        }
    }
}

/// Keys are never printed.
impl fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("ocr_api_key", &redact(&self.ocr_api_key))
            .field("ocr_endpoint", &self.ocr_endpoint)
            .field("ocr_language", &self.ocr_language)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("llm_backend", &self.llm_backend)
            .field("llm_api_key", &redact(&self.llm_api_key))
            .field("llm_base_url", &self.llm_base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl ProcessorConfig {
    /// Create a new builder for `ProcessorConfig`.
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load the configuration from the process environment.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `OCR_API_KEY` | `ocr_api_key` (required) |
    /// | `OPENAI_API_KEY` | `llm_api_key` (required for the default backend) |
    /// | `OCR_ENDPOINT` | `ocr_endpoint` |
    /// | `OCR_LANGUAGE` | `ocr_language` |
    /// | `LLM_BASE_URL` | `llm_base_url` |
    /// | `LLM_MODEL` | `model` |
    /// | `LLM_PROVIDER` | `llm_backend` (see [`LlmBackend::from_name`]) |
    pub fn from_env() -> Result<Self, DocIntelError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DocIntelError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut builder = Self::builder();
        if let Some(v) = get("OCR_API_KEY") {
            builder = builder.ocr_api_key(v);
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            builder = builder.llm_api_key(v);
        }
        if let Some(v) = get("OCR_ENDPOINT") {
            builder = builder.ocr_endpoint(v);
        }
        if let Some(v) = get("OCR_LANGUAGE") {
            builder = builder.ocr_language(v);
        }
        if let Some(v) = get("LLM_BASE_URL") {
            builder = builder.llm_base_url(v);
        }
        if let Some(v) = get("LLM_MODEL") {
            builder = builder.model(v);
        }
        if let Some(v) = get("LLM_PROVIDER") {
            builder = builder.llm_backend(LlmBackend::from_name(&v));
        }
        builder.build()
    }
}

/// Builder for [`ProcessorConfig`].
#[derive(Debug)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    pub fn ocr_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.ocr_api_key = key.into();
        self
    }

    pub fn ocr_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.ocr_endpoint = url.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn llm_backend(mut self, backend: LlmBackend) -> Self {
        self.config.llm_backend = backend;
        self
    }

    pub fn llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.llm_api_key = key.into();
        self
    }

    pub fn llm_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.llm_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: Option<u32>) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn llm_timeout_secs(mut self, secs: u64) -> Self {
        self.config.llm_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessorConfig, DocIntelError> {
        let c = &self.config;
        if c.ocr_api_key.trim().is_empty() {
            return Err(DocIntelError::InvalidConfig(
                "OCR API key is required (set OCR_API_KEY)".into(),
            ));
        }
        if c.llm_backend == LlmBackend::OpenAiCompatible && c.llm_api_key.trim().is_empty() {
            return Err(DocIntelError::InvalidConfig(
                "LLM API key is required for the OpenAI-compatible backend (set OPENAI_API_KEY)"
                    .into(),
            ));
        }
        if c.ocr_timeout_secs == 0 || c.llm_timeout_secs == 0 {
            return Err(DocIntelError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(DocIntelError::InvalidConfig("Model must not be empty".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Client used for the structured-extraction call.
///
/// The OpenAI-compatible backend speaks the chat-completions wire format
/// directly and uses the key from [`ProcessorConfig::llm_api_key`]. Any other
/// provider name is handed to the `edgequake-llm` provider factory, which
/// reads that provider's own key variable (`ANTHROPIC_API_KEY`, …).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LlmBackend {
    /// OpenAI or any server exposing `/chat/completions` (default).
    #[default]
    OpenAiCompatible,
    /// Named `edgequake-llm` provider: `anthropic`, `gemini`, `ollama`, ….
    Provider(String),
}

impl LlmBackend {
    /// `openai` (or empty) selects the built-in client; any other name is
    /// passed to the provider factory.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "" | "openai" | "openai-compatible" => LlmBackend::OpenAiCompatible,
            other => LlmBackend::Provider(other.to_string()),
        }
    }
}
