//! Error types for the docintel library.
//!
//! Two failure modes exist:
//!
//! * [`DocIntelError`] — **Fatal**: the request cannot complete (OCR provider
//!   flagged the image, network failure, bad credentials). Returned as
//!   `Err(DocIntelError)` from the pipeline and surfaced to HTTP callers as a
//!   `500` with the error message as `detail`.
//!
//! * A model reply that is not valid JSON is **not** fatal. It is detected as
//!   [`DocIntelError::StructuredParse`] inside the structured extractor and
//!   immediately downgraded to [`crate::output::ExtractedData::Degraded`]; it
//!   never leaves the pipeline as an `Err`.
//!
//! Messages are single-line because they travel verbatim in the HTTP
//! `detail` field.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docintel library.
#[derive(Debug, Error)]
pub enum DocIntelError {
    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR provider reported `IsErroredOnProcessing` (or returned no
    /// parsed result). No partial text is carried.
    ///
    /// `provider_message` holds whatever the provider said, for logging only;
    /// the display string is fixed.
    #[error("OCR processing failed")]
    OcrProcessing { provider_message: Option<String> },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The model reply could not be parsed into a JSON object.
    ///
    /// Recovered locally by the structured extractor.
    #[error("Could not parse AI response: {detail}")]
    StructuredParse { detail: String },

    /// The model provider returned a non-auth error or an unusable reply.
    #[error("LLM API error: {message}")]
    LlmApi { message: String },

    // ── Provider transport ────────────────────────────────────────────────
    /// Connection failure, non-2xx status or undecodable body from a provider.
    #[error("{provider} request failed: {detail}")]
    Transport { provider: String, detail: String },

    /// An outbound provider call exceeded its configured timeout.
    #[error("{provider} request timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    /// The provider rejected the credentials (HTTP 401/403).
    #[error("Authentication error from {provider}: {detail}")]
    Auth { provider: String, detail: String },

    /// The configured provider cannot be constructed (missing key, unknown name).
    #[error("Provider '{provider}' is not configured: {hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Upload / filesystem ───────────────────────────────────────────────
    /// The multipart payload is malformed or lacks a `file` part.
    #[error("Invalid upload: {0}")]
    Upload(String),

    /// The upload exceeded the server's body limit.
    #[error("Upload too large: limit is {limit} bytes")]
    UploadTooLarge { limit: usize },

    /// The upload could not be written to the staging directory.
    ///
    /// `dir` is kept for logs; the message leaves server paths out.
    #[error("Failed to stage upload: {}", .source.kind())]
    Staging {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input file was not found at the given path.
    #[error("File not found: '{}'", .path.display())]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{}'", .path.display())]
    PermissionDenied { path: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DocIntelError {
    /// Map a reqwest failure onto the taxonomy, preserving timeouts.
    pub(crate) fn from_reqwest(provider: &str, timeout_secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DocIntelError::Timeout {
                provider: provider.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocIntelError::Transport {
                provider: provider.to_string(),
                detail: err.to_string(),
            }
        }
    }
}
