//! Structured-field extraction from OCR text.
//!
//! Sends [`crate::prompts::extraction_prompt`] to the configured
//! [`ChatModel`] and turns the reply into [`ExtractedData`]. A reply that is
//! not a JSON object is the one failure recovered here: it becomes the
//! degraded record carrying the input text. Transport and auth errors from the
//! model propagate unchanged.

use crate::error::DocIntelError;
use crate::output::{DegradedRecord, ExtractedData, StructuredRecord};
use crate::pipeline::llm::ChatModel;
use crate::pipeline::postprocess::clean_reply;
use crate::prompts::extraction_prompt;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct StructuredExtractor {
    model: Arc<dyn ChatModel>,
}

impl StructuredExtractor {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &str {
        self.model.model()
    }

    /// Ask the model for the nine fields of `text`.
    pub async fn analyze(&self, text: &str) -> Result<ExtractedData, DocIntelError> {
        let prompt = extraction_prompt(text);
        debug!(model = %self.model.model(), prompt_chars = prompt.len(), "Requesting structured extraction");

        let reply = self.model.complete(&prompt).await?;
        Ok(parse_reply(&reply, text))
    }
}

/// Interpret a model reply; never fails.
pub fn parse_reply(reply: &str, text: &str) -> ExtractedData {
    match StructuredRecord::from_reply(clean_reply(reply)) {
        Ok(record) => {
            let (filled, total) = record.coverage();
            debug!(filled, total, document_type = ?record.document_type(), "Parsed model reply");
            ExtractedData::Structured(record)
        }
        Err(e) => {
            warn!(error = %e, reply_chars = reply.len(), "Model reply was not a JSON object; using degraded record");
            ExtractedData::Degraded(DegradedRecord::new(text))
        }
    }
}
