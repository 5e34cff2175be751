//! Instruction template for structured-field extraction.
//!
//! The template is the contract with the model: it names every key of
//! [`crate::output::StructuredRecord`] and asks for bare JSON with `null` for
//! anything not found. Keeping it here lets tests inspect it without a model.

use crate::output::KNOWN_FIELDS;

const PREAMBLE: &str = "You are a document analysis expert. Extract key information from this document text.";

const SCHEMA: &str = r#"{
    "document_type": "invoice/receipt/contract/other",
    "company_name": "company name if found",
    "date": "any date found",
    "total_amount": "any monetary amount",
    "items": ["list of products/services mentioned"],
    "addresses": ["any addresses found"],
    "phone_numbers": ["any phone numbers found"],
    "emails": ["any email addresses found"],
    "confidence_score": "how confident you are (0-100)"
}"#;

const CLOSING: &str = "If a field is not found, use null. Return only valid JSON.";

/// Build the single user message sent to the model for `text`.
pub fn extraction_prompt(text: &str) -> String {
    debug_assert!(KNOWN_FIELDS.iter().all(|f| SCHEMA.contains(f)));
    format!(
        "{PREAMBLE}\n\nDocument text:\n{text}\n\n\
         Please extract and return ONLY a JSON object with these fields:\n{SCHEMA}\n\n{CLOSING}"
    )
}
