//! Document processing entry points.
//!
//! [`DocumentProcessor`] runs the two provider calls in strict order:
//!
//! ```text
//! RECEIVED ──ocr──▶ TEXT_EXTRACTED ──llm──▶ ANALYZED ──▶ DONE
//!     │                   │
//!     └───────────────────┴──▶ FAILED (error returned, nothing else runs)
//! ```
//!
//! There is no partial success and no retry. A failed OCR call means the
//! model is never asked. The only failure absorbed along the way is an
//! unparseable model reply, which the structured extractor turns into the
//! degraded record.

use crate::config::ProcessorConfig;
use crate::error::DocIntelError;
use crate::output::{ProcessingResult, ProcessingStatus};
use crate::pipeline::extract::StructuredExtractor;
use crate::pipeline::input::UploadedDocument;
use crate::pipeline::llm::{chat_model_from_config, ChatModel};
use crate::pipeline::ocr::{OcrSpaceClient, TextExtractor};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Where a document is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    TextExtracted,
    Analyzed,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Received => "RECEIVED",
            Stage::TextExtracted => "TEXT_EXTRACTED",
            Stage::Analyzed => "ANALYZED",
            Stage::Done => "DONE",
            Stage::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// OCR client + structured extractor. Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct DocumentProcessor {
    ocr: Arc<dyn TextExtractor>,
    extractor: StructuredExtractor,
}

impl DocumentProcessor {
    pub fn new(ocr: Arc<dyn TextExtractor>, model: Arc<dyn ChatModel>) -> Self {
        Self {
            ocr,
            extractor: StructuredExtractor::new(model),
        }
    }

    /// Build both provider clients from the configuration.
    pub fn from_config(config: &ProcessorConfig) -> Result<Self, DocIntelError> {
        let ocr = Arc::new(OcrSpaceClient::from_config(config)?);
        let model = chat_model_from_config(config)?;
        Ok(Self::new(ocr, model))
    }

    /// Run one document through OCR and structured extraction.
    ///
    /// # Errors
    /// Any OCR failure, and any model failure other than an unparseable reply.
    pub async fn process(
        &self,
        document: &UploadedDocument,
    ) -> Result<ProcessingResult, DocIntelError> {
        let span = info_span!("process", file = %document.file_name());
        self.run(document).instrument(span).await
    }

    /// Read a local file and process it.
    pub async fn process_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<ProcessingResult, DocIntelError> {
        let document = UploadedDocument::read(path).await?;
        self.process(&document).await
    }

    async fn run(&self, document: &UploadedDocument) -> Result<ProcessingResult, DocIntelError> {
        let start = Instant::now();
        info!(stage = %Stage::Received, bytes = document.len(), "Extracting text from document");

        // ── Step 1: OCR ──────────────────────────────────────────────────
        let raw_text = self
            .ocr
            .extract_text(document)
            .await
            .inspect_err(|e| warn!(stage = %Stage::Failed, error = %e, "Text extraction failed"))?;
        info!(stage = %Stage::TextExtracted, chars = raw_text.len(), "Analyzing document with AI");

        // ── Step 2: Structured extraction ────────────────────────────────
        let extracted_data = self
            .extractor
            .analyze(&raw_text)
            .await
            .inspect_err(|e| warn!(stage = %Stage::Failed, error = %e, "Structured extraction failed"))?;
        debug!(stage = %Stage::Analyzed, degraded = extracted_data.is_degraded());

        // ── Step 3: Assemble ─────────────────────────────────────────────
        let result = ProcessingResult {
            file_name: document.file_name().to_string(),
            raw_text,
            extracted_data,
            processing_status: ProcessingStatus::Success,
        };

        info!(
            stage = %Stage::Done,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Document processed"
        );
        Ok(result)
    }
}
