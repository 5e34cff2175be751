//! Pipeline stages for document processing.
//!
//! Each submodule implements one step; [`crate::process`] wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ ocr ──▶ llm ──▶ postprocess ──▶ extract
//! (bytes)  (text)  (reply)   (unfence)      (record)
//! ```
//!
//! 1. [`input`]   — uploaded bytes + filename, staged in the upload directory
//! 2. [`ocr`]     — multipart call to the OCR provider; the first network hop
//! 3. [`llm`]     — one chat call to the language model; the second hop
//! 4. [`postprocess`] — strip an outer code fence from the reply
//! 5. [`extract`] — build the prompt, parse the reply, fall back to the
//!    degraded record when it is not JSON

pub mod extract;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod postprocess;
