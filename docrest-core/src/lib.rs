//! Declarative REST query translation over document stores.
//!
//! This crate is the core of the docrest project and provides:
//!
//! - **Request descriptors** ([`descriptor`]) - Parsing of `where`/`like`/`whereObject`, `select`, `sort`, `paginate`, `populate` and tabular grid parameters
//! - **Filter compiler** ([`filter`]) - Precedence-aware compilation of the filter maps into one expression
//! - **Pipeline model and compiler** ([`pipeline`], [`plan`]) - Typed aggregation stages and the tabular/raw aggregation plans
//! - **Population and projection** ([`populate`]) - Relation resolution and `_id`-membership joins
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different storage backends
//! - **Resources and operations** ([`resource`], [`operations`]) - The eleven operation handlers
//! - **Envelopes and errors** ([`envelope`], [`error`]) - The uniform response shape and the error taxonomy
//! - **Hooks, validation and options** ([`hooks`], [`validate`], [`options`]) - Per-call extension points and configuration
//!
//! # Example
//!
//! ```ignore
//! use docrest_core::{
//!     descriptor::Request, options::Call, resource::ResourceConfig, store::DocumentStore,
//! };
//! use serde_json::json;
//!
//! let store = DocumentStore::new(backend);
//! let products = store.resource(ResourceConfig::new("products"))?;
//!
//! let request = Request::from_json(None, &json!({ "where": { "active": "true" } }), None)?;
//! let envelope = products.get_many(request, &Call::new()).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrest_core;

pub mod backend;
pub mod descriptor;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod hooks;
pub mod operations;
pub mod options;
pub mod page;
pub mod pipeline;
pub mod plan;
pub mod populate;
pub mod query;
pub mod resource;
pub mod store;
pub mod validate;
