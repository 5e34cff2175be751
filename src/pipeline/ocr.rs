//! Text extraction through an OCR web service.
//!
//! [`OcrSpaceClient`] speaks the OCR.space wire format: one multipart POST
//! carrying `apikey`, `language`, `isOverlayRequired=false` and the file, and
//! a JSON reply with `IsErroredOnProcessing` and `ParsedResults[].ParsedText`.
//! The first parsed result is the document text. An error flag from the
//! provider is fatal for the request and carries no partial text.
//!
//! The pipeline only sees the [`TextExtractor`] trait so tests can swap in
//! a fake without a network.

use crate::config::ProcessorConfig;
use crate::error::DocIntelError;
use crate::pipeline::input::UploadedDocument;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const PROVIDER: &str = "OCR provider";

/// Turns an uploaded image into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, document: &UploadedDocument) -> Result<String, DocIntelError>;
}

/// Client for the OCR.space `parse/image` endpoint.
pub struct OcrSpaceClient {
    client: Client,
    endpoint: String,
    api_key: String,
    language: String,
    timeout_secs: u64,
}

impl OcrSpaceClient {
    pub fn from_config(config: &ProcessorConfig) -> Result<Self, DocIntelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.ocr_timeout_secs))
            .build()
            .map_err(|e| DocIntelError::ProviderNotConfigured {
                provider: PROVIDER.to_string(),
                hint: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: config.ocr_endpoint.clone(),
            api_key: config.ocr_api_key.clone(),
            language: config.ocr_language.clone(),
            timeout_secs: config.ocr_timeout_secs,
        })
    }

    fn build_form(&self, document: &UploadedDocument) -> Result<Form, DocIntelError> {
        let body = reqwest::Body::from(document.bytes().clone());
        let part = Part::stream_with_length(body, document.len() as u64)
            .file_name(document.file_name().to_string())
            .mime_str(guess_mime(document.file_name()))
            .map_err(|e| DocIntelError::Transport {
                provider: PROVIDER.to_string(),
                detail: e.to_string(),
            })?;

        Ok(Form::new()
            .text("apikey", self.api_key.clone())
            .text("language", self.language.clone())
            .text("isOverlayRequired", "false")
            .part("file", part))
    }
}

#[async_trait]
impl TextExtractor for OcrSpaceClient {
    async fn extract_text(&self, document: &UploadedDocument) -> Result<String, DocIntelError> {
        debug!(
            file = %document.file_name(),
            bytes = document.len(),
            "Sending document to OCR provider"
        );

        let form = self.build_form(document)?;
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DocIntelError::from_reqwest(PROVIDER, self.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let reply: OcrSpaceResponse = response
            .json()
            .await
            .map_err(|e| DocIntelError::from_reqwest(PROVIDER, self.timeout_secs, e))?;

        let text = reply.into_text()?;
        debug!(chars = text.len(), "OCR text received");
        Ok(text)
    }
}

fn status_error(status: StatusCode, body: String) -> DocIntelError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        DocIntelError::Auth {
            provider: PROVIDER.to_string(),
            detail: format!("HTTP {status}: {}", body.trim()),
        }
    } else {
        DocIntelError::Transport {
            provider: PROVIDER.to_string(),
            detail: format!("HTTP {status}: {}", body.trim()),
        }
    }
}

/// OCR.space reply; only the fields the pipeline reads.
#[derive(Debug, Deserialize)]
pub struct OcrSpaceResponse {
    #[serde(rename = "IsErroredOnProcessing", default)]
    pub is_errored_on_processing: bool,
    #[serde(rename = "ParsedResults", default)]
    pub parsed_results: Option<Vec<ParsedResult>>,
    /// A string or a list of strings depending on the failure.
    #[serde(rename = "ErrorMessage", default)]
    pub error_message: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ParsedResult {
    #[serde(rename = "ParsedText", default)]
    pub parsed_text: String,
}

impl OcrSpaceResponse {
    /// The first parsed text, or `OcrProcessing` if the provider flagged an error
    /// or returned nothing.
    pub fn into_text(self) -> Result<String, DocIntelError> {
        let provider_message = self.error_message.as_ref().and_then(flatten_message);

        if self.is_errored_on_processing {
            warn!(
                provider_message = provider_message.as_deref().unwrap_or(""),
                "OCR provider reported a processing error"
            );
            return Err(DocIntelError::OcrProcessing { provider_message });
        }

        match self.parsed_results.and_then(|r| r.into_iter().next()) {
            Some(first) => Ok(first.parsed_text),
            None => {
                warn!("OCR provider returned no parsed results");
                Err(DocIntelError::OcrProcessing { provider_message })
            }
        }
    }
}

fn flatten_message(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}

/// MIME type from the file extension; the provider sniffs content anyway.
pub fn guess_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> OcrSpaceResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn first_parsed_text_wins() {
        let r = parse(
            r#"{"IsErroredOnProcessing":false,
                "ParsedResults":[{"ParsedText":"page one"},{"ParsedText":"page two"}]}"#,
        );
        assert_eq!(r.into_text().unwrap(), "page one");
    }

    #[test]
    fn error_flag_is_ocr_processing_error() {
        let r = parse(
            r#"{"IsErroredOnProcessing":true,"ParsedResults":null,
                "ErrorMessage":["File failed validation","E216"]}"#,
        );
        match r.into_text().unwrap_err() {
            DocIntelError::OcrProcessing { provider_message } => {
                assert_eq!(
                    provider_message.as_deref(),
                    Some("File failed validation; E216")
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn error_flag_wins_over_results() {
        let r = parse(
            r#"{"IsErroredOnProcessing":true,"ParsedResults":[{"ParsedText":"partial"}]}"#,
        );
        let err = r.into_text().unwrap_err();
        assert_eq!(err.to_string(), "OCR processing failed");
    }

    #[test]
    fn empty_results_is_ocr_processing_error() {
        let r = parse(r#"{"IsErroredOnProcessing":false,"ParsedResults":[]}"#);
        assert!(matches!(
            r.into_text(),
            Err(DocIntelError::OcrProcessing { .. })
        ));
    }

    #[test]
    fn empty_text_is_allowed() {
        let r = parse(r#"{"IsErroredOnProcessing":false,"ParsedResults":[{"ParsedText":""}]}"#);
        assert_eq!(r.into_text().unwrap(), "");
    }

    #[test]
    fn string_error_message() {
        assert_eq!(
            flatten_message(&Value::String("Timed out".into())).as_deref(),
            Some("Timed out")
        );
        assert_eq!(flatten_message(&Value::Null), None);
    }

    #[test]
    fn auth_statuses_map_to_auth_error() {
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "bad key".into()),
            DocIntelError::Auth { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, String::new()),
            DocIntelError::Transport { .. }
        ));
    }

    #[test]
    fn mime_guessing() {
        assert_eq!(guess_mime("a.PNG"), "image/png");
        assert_eq!(guess_mime("scan.jpeg"), "image/jpeg");
        assert_eq!(guess_mime("doc.pdf"), "application/pdf");
        assert_eq!(guess_mime("noext"), "application/octet-stream");
    }
}
