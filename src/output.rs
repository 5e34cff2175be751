//! Result types returned by the pipeline.
//!
//! [`ProcessingResult`] is the only value handed back to callers. Its
//! `extracted_data` is an [`ExtractedData`], which is always a JSON object:
//! either the model's record (normalised so the nine known keys are present)
//! or the fixed degraded record used when the reply was not JSON.

use crate::error::DocIntelError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys the instruction asks the model to return.
pub const KNOWN_FIELDS: [&str; 9] = [
    "document_type",
    "company_name",
    "date",
    "total_amount",
    "items",
    "addresses",
    "phone_numbers",
    "emails",
    "confidence_score",
];

/// `document_type` of the degraded record.
pub const DEGRADED_DOCUMENT_TYPE: &str = "unknown";

/// `error` of the degraded record.
pub const DEGRADED_ERROR: &str = "Could not parse AI response";

/// The model's JSON object, with every key in [`KNOWN_FIELDS`] guaranteed
/// present (`null` when the model omitted it).
///
/// Values are not validated: whatever the model put under a key, including
/// keys outside the schema and out-of-enumeration `document_type` values,
/// is passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StructuredRecord(Map<String, Value>);

impl StructuredRecord {
    /// Wrap a JSON object, filling missing known keys with `null`.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        for field in KNOWN_FIELDS {
            map.entry(field).or_insert(Value::Null);
        }
        Self(map)
    }

    /// Parse a model reply. Anything but a JSON object is an error.
    pub fn from_reply(reply: &str) -> Result<Self, DocIntelError> {
        let value: Value =
            serde_json::from_str(reply).map_err(|e| DocIntelError::StructuredParse {
                detail: e.to_string(),
            })?;
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(DocIntelError::StructuredParse {
                detail: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of `key`, `None` for null or non-string values.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn document_type(&self) -> Option<&str> {
        self.get_str("document_type")
    }

    pub fn company_name(&self) -> Option<&str> {
        self.get_str("company_name")
    }

    pub fn total_amount(&self) -> Option<&str> {
        self.get_str("total_amount")
    }

    /// Count of known fields carrying a non-null value.
    pub fn coverage(&self) -> (usize, usize) {
        let filled = KNOWN_FIELDS
            .iter()
            .filter(|f| !matches!(self.0.get(**f), None | Some(Value::Null)))
            .count();
        (filled, KNOWN_FIELDS.len())
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Fallback record substituted when the model reply is not a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradedRecord {
    pub document_type: String,
    pub raw_text: String,
    pub error: String,
}

impl DegradedRecord {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            document_type: DEGRADED_DOCUMENT_TYPE.to_string(),
            raw_text: raw_text.into(),
            error: DEGRADED_ERROR.to_string(),
        }
    }
}

/// Output of the structured extractor. Both branches serialise to an object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExtractedData {
    Structured(StructuredRecord),
    Degraded(DegradedRecord),
}

impl ExtractedData {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ExtractedData::Degraded(_))
    }

    pub fn as_structured(&self) -> Option<&StructuredRecord> {
        match self {
            ExtractedData::Structured(r) => Some(r),
            ExtractedData::Degraded(_) => None,
        }
    }
}

/// Final status reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Success,
    Failed,
}

/// Combined result of one document run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingResult {
    pub file_name: String,
    pub raw_text: String,
    pub extracted_data: ExtractedData,
    pub processing_status: ProcessingStatus,
}
