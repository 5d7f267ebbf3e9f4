//! Error types and result types for the query engine and its store backends.
//!
//! Two layers of errors exist:
//!
//! - [`DocumentStoreError`] is raised by [`StoreBackend`](crate::backend::StoreBackend)
//!   implementations and describes what went wrong talking to the document store.
//! - [`EngineError`] is raised by the operation handlers and request compilers. Every
//!   engine error maps to exactly one [`ErrorKind`], which decides the status code of
//!   the failure envelope.

use bson::error::Error as BsonError;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The document or registration violates structural constraints.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The backend cannot execute the requested pipeline stage or operator.
    #[error("Unsupported: {0}")]
    Unsupported(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

/// The normalized class of a failed operation.
///
/// The kind selects which configured status code the failure envelope carries.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The candidate document failed schema rules.
    Validation,
    /// A single-document lookup matched nothing.
    NotFound,
    /// Any other failure: malformed input, hook failure, store failure.
    Execution,
}

/// Errors raised while compiling requests or running operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The candidate document violated one or more rules; the messages are kept in rule order.
    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),
    /// The target document does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The request could not be executed.
    #[error("{0}")]
    Execution(String),
    /// The store backend failed.
    #[error(transparent)]
    Store(#[from] DocumentStoreError),
}

impl EngineError {
    /// Shorthand for an [`EngineError::Execution`] with a formatted message.
    pub fn execution(message: impl Into<String>) -> Self {
        EngineError::Execution(message.into())
    }

    /// Returns the normalized kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Store(DocumentStoreError::DocumentNotFound(..)) => ErrorKind::NotFound,
            EngineError::Execution(_) | EngineError::Store(_) => ErrorKind::Execution,
        }
    }
}

impl From<BsonError> for EngineError {
    fn from(err: BsonError) -> Self {
        EngineError::Store(err.into())
    }
}

/// A specialized `Result` type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
