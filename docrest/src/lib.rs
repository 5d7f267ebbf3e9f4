//! Main docrest crate: declarative REST query translation over document stores.
//!
//! This crate is the primary entry point for users of the docrest framework. It re-exports
//! the core types from the sub-crates and provides access to the storage backends, an
//! HTTP binding and a tracing helper.
//!
//! # Features
//!
//! - **One implementation of list/filter/sort/paginate/populate/project** shared by every resource
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//! - **Uniform envelopes** - Every operation resolves to `{error, success, message, code, data}`
//! - **HTTP binding** - `axum` responses for operation outcomes (feature `axum`, on by default)
//!
//! # Quick Start
//!
//! ```ignore
//! use docrest::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     docrest::telemetry::setup_tracing();
//!
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let products = store.resource(
//!         ResourceConfig::new("products")
//!             .relation(Relation::new("owner", "users"))
//!             .searchable(["name"]),
//!     )?;
//!
//!     let call = Call::new().with_options(CallOptions {
//!         updated_at_field: Some("updatedAt".into()),
//!         ..CallOptions::default()
//!     });
//!
//!     products
//!         .create_one(Request::new().with_body(bson::doc! { "name": "Desk", "active": true }), &call)
//!         .await?;
//!
//!     let request = Request::from_json(None, &json!({ "where": { "active": "true" }, "populate": 1 }), None)?;
//!     let envelope = products.get_many(request, &call).await?;
//!     println!("{}", serde_json::to_string_pretty(&envelope)?);
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! A typed `DocumentStore` converts into a [`DynDocumentStore`](store::DynDocumentStore) with
//! `into_dyn`, for backends selected at runtime.
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;
pub mod telemetry;

#[cfg(feature = "axum")]
pub mod http;

pub use docrest_core::{
    backend, descriptor, envelope, error, filter, hooks, operations, options, page, pipeline, plan, populate,
    query, resource, store, validate,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docrest_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docrest_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
