//! # docintel
//!
//! Pull structured fields out of document images: OCR the upload, hand the
//! text to a language model with a fixed extraction instruction, and return
//! both as one JSON result.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image bytes
//!  │
//!  ├─ 1. Stage    write the upload into uploads/ (removed afterwards)
//!  ├─ 2. OCR      multipart POST to OCR.space → plain text
//!  ├─ 3. LLM      one chat call, temperature 0 → reply text
//!  ├─ 4. Parse    JSON object → StructuredRecord, otherwise degraded record
//!  └─ 5. Output   ProcessingResult { file_name, raw_text, extracted_data, … }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docintel::{DocumentProcessor, ProcessorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads OCR_API_KEY and OPENAI_API_KEY
//!     let config = ProcessorConfig::from_env()?;
//!     let processor = DocumentProcessor::from_config(&config)?;
//!     let result = processor.process_file("receipt.jpg").await?;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Serving over HTTP
//!
//! [`server::router`] builds the axum application; the `docintel serve`
//! binary (feature `cli`, on by default) wires it to a listener.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{LlmBackend, ProcessorConfig, ProcessorConfigBuilder};
pub use error::DocIntelError;
pub use output::{
    DegradedRecord, ExtractedData, ProcessingResult, ProcessingStatus, StructuredRecord,
};
pub use pipeline::extract::StructuredExtractor;
pub use pipeline::input::UploadedDocument;
pub use pipeline::llm::{ChatModel, OpenAiChat, ProviderChat};
pub use pipeline::ocr::{OcrSpaceClient, TextExtractor};
pub use process::DocumentProcessor;
pub use server::{router, ServerConfig};
