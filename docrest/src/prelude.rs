//! Convenient re-exports of commonly used types from docrest.
//!
//! ```ignore
//! use docrest::prelude::*;
//! ```

pub use docrest_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    descriptor::{FilterSpec, FilterValue, QueryDescriptor, Request, TableQuery},
    envelope::{Envelope, EnvelopeError, Failure, ItemFailure, Outcome, RecordCounts},
    error::{DocumentStoreError, DocumentStoreResult, EngineError, EngineResult, ErrorKind},
    hooks::{Hook, Hooks},
    options::{Call, CallOptions, StatusCodes},
    page::PaginationParams,
    pipeline::{AggregateOptions, Pipeline, Stage},
    populate::PopulateSpec,
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    resource::{Relation, Resource, ResourceConfig},
    store::{DocumentStore, DynDocumentStore},
    validate::{FieldRule, FieldRules, Validation, ValidationMode, Validator},
};
