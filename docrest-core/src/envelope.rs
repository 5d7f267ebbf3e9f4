//! The uniform response envelope.
//!
//! Every operation resolves to `Result<Envelope, Failure>` ([`Outcome`]). Both sides are
//! complete responses: a transport writes `Ok` and `Err` alike with the envelope's `code`
//! as status. The error side additionally keeps the original [`EngineError`] so the
//! binding can log it.
//!
//! Serialized form:
//!
//! ```json
//! { "error": null, "success": true, "message": "...", "code": 200, "data": [...] }
//! ```
//!
//! Tabular results also carry `recordsTotal`, `recordsFiltered` and `total`.

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{EngineError, ErrorKind};

/// The result of an operation.
pub type Outcome = Result<Envelope, Failure>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub error: Option<EnvelopeError>,
    pub success: bool,
    pub message: String,
    pub code: u16,
    pub data: Bson,
    #[serde(flatten)]
    pub counts: Option<RecordCounts>,
}

/// Paging metadata of tabular results.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecordCounts {
    pub records_total: u64,
    pub records_filtered: u64,
    pub total: u64,
}

/// The `error` member of an envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum EnvelopeError {
    /// The operation failed.
    Failure { kind: ErrorKind, message: String },
    /// Per-item validation failures of a partially successful bulk create.
    Items(Vec<ItemFailure>),
}

/// One rejected candidate of a bulk create.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ItemFailure {
    /// The candidate's index (list input) or key (map input).
    pub key: String,
    pub messages: Vec<String>,
}

impl Envelope {
    pub fn success(code: u16, message: impl Into<String>, data: impl Into<Bson>) -> Self {
        Envelope {
            error: None,
            success: true,
            message: message.into(),
            code,
            data: data.into(),
            counts: None,
        }
    }

    /// A tabular success. All three counts carry `count`.
    pub fn tabular(code: u16, message: impl Into<String>, data: impl Into<Bson>, count: u64) -> Self {
        Envelope {
            counts: Some(RecordCounts {
                records_total: count,
                records_filtered: count,
                total: count,
            }),
            ..Envelope::success(code, message, data)
        }
    }

    pub fn with_error(mut self, error: EnvelopeError) -> Self {
        self.error = Some(error);
        self
    }

    /// Number of documents in `data` when it is an array, otherwise `1` for a document
    /// and `0` for anything else.
    pub fn len(&self) -> usize {
        match &self.data {
            Bson::Array(items) => items.len(),
            Bson::Document(_) => 1,
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A failed operation: the status code chosen for it and the error itself.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct Failure {
    pub code: u16,
    pub error: EngineError,
}

impl Failure {
    pub fn new(code: u16, error: EngineError) -> Self {
        Failure { code, error }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    /// The failure envelope: `success: false`, the error kind and message, empty `data`.
    pub fn envelope(&self) -> Envelope {
        let message = self.error.to_string();

        Envelope {
            error: Some(EnvelopeError::Failure { kind: self.kind(), message: message.clone() }),
            success: false,
            message,
            code: self.code,
            data: Bson::Document(Document::new()),
            counts: None,
        }
    }

    pub fn into_envelope(self) -> Envelope {
        self.envelope()
    }
}
