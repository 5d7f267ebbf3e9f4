//! Storage backend abstraction for the query engine.
//!
//! # Overview
//!
//! The [`StoreBackend`] trait is everything the engine needs from a document store:
//! filtered finds, single and bulk creation, save-in-place, delete, and pipeline
//! aggregation. Implementations are required to be thread-safe (`Send + Sync`); the engine
//! keeps no state of its own and calls the backend concurrently from many requests.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docrest_core::{backend::StoreBackend, query::{Filter, Query}};
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! let created = backend.insert(vec![doc! { "name": "Alice" }], "users").await?;
//! let found = backend
//!     .find(Query::builder().filter(Filter::eq("name", "Alice")).build(), "users")
//!     .await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use std::{any::Any, fmt::Debug};

use crate::{
    error::DocumentStoreResult,
    pipeline::{AggregateOptions, Pipeline},
    query::{Filter, Query},
};

/// Abstract interface for document storage backends.
///
/// Documents are BSON documents identified by an `_id` holding an [`ObjectId`].
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Lookups that match nothing are not errors: they return `None` or an empty vector.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the documents matching `query`, honoring its projection, sort and window.
    ///
    /// # Arguments
    ///
    /// * `query` - The [`Query`] object specifying filter, select, sort, limit and offset
    /// * `collection` - The name of the collection to query
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>>;

    /// Returns the first document matching `query`, if any.
    async fn find_one(&self, mut query: Query, collection: &str) -> DocumentStoreResult<Option<Document>> {
        query.limit = Some(1);

        Ok(self
            .find(query, collection)
            .await?
            .into_iter()
            .next())
    }

    /// Returns the document with the given identifier, if any.
    async fn find_by_id(&self, id: ObjectId, collection: &str) -> DocumentStoreResult<Option<Document>> {
        self.find_one(
            Query::builder()
                .filter(Filter::eq("_id", id))
                .build(),
            collection,
        )
        .await
    }

    /// Inserts new documents and returns them as stored.
    ///
    /// Documents without an `_id` are assigned a fresh [`ObjectId`]. A document whose
    /// `_id` already exists in the collection fails the whole call.
    ///
    /// # Arguments
    ///
    /// * `documents` - The documents to insert, in order
    /// * `collection` - The name of the collection to insert into. Created automatically if it doesn't exist.
    async fn insert(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<Vec<Document>>;

    /// Replaces the stored document that has the same `_id` and returns the saved form.
    ///
    /// Fails with [`DocumentNotFound`](crate::error::DocumentStoreError::DocumentNotFound)
    /// if no such document exists.
    async fn save(&self, document: Document, collection: &str) -> DocumentStoreResult<Document>;

    /// Deletes the document with the given identifier and returns its prior state.
    async fn delete_by_id(&self, id: ObjectId, collection: &str) -> DocumentStoreResult<Option<Document>>;

    /// Runs an aggregation pipeline and returns its output documents.
    ///
    /// # Arguments
    ///
    /// * `pipeline` - The stages to run, in order. Never empty when called by the engine.
    /// * `options` - Execution options such as allowing disk use
    /// * `collection` - The name of the collection to aggregate
    async fn aggregate(
        &self,
        pipeline: Pipeline,
        options: AggregateOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with persistent storage or
    /// external connections should override this.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Assigns a fresh identifier to a document that has none and returns its identifier.
///
/// Returns `None` when the document carries an `_id` that is not an [`ObjectId`].
pub fn ensure_id(document: &mut Document) -> Option<ObjectId> {
    if !document.contains_key("_id") {
        let id = ObjectId::new();
        document.insert("_id", id);
        return Some(id);
    }

    document.get_object_id("_id").ok()
}

#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>>;
    async fn find_one(&self, query: Query, collection: &str) -> DocumentStoreResult<Option<Document>>;
    async fn find_by_id(&self, id: ObjectId, collection: &str) -> DocumentStoreResult<Option<Document>>;
    async fn insert(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<Vec<Document>>;
    async fn save(&self, document: Document, collection: &str) -> DocumentStoreResult<Document>;
    async fn delete_by_id(&self, id: ObjectId, collection: &str) -> DocumentStoreResult<Option<Document>>;
    async fn aggregate(
        &self,
        pipeline: Pipeline,
        options: AggregateOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        StoreBackend::find(self, query, collection).await
    }

    async fn find_one(&self, query: Query, collection: &str) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::find_one(self, query, collection).await
    }

    async fn find_by_id(&self, id: ObjectId, collection: &str) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::find_by_id(self, id, collection).await
    }

    async fn insert(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        StoreBackend::insert(self, documents, collection).await
    }

    async fn save(&self, document: Document, collection: &str) -> DocumentStoreResult<Document> {
        StoreBackend::save(self, document, collection).await
    }

    async fn delete_by_id(&self, id: ObjectId, collection: &str) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::delete_by_id(self, id, collection).await
    }

    async fn aggregate(
        &self,
        pipeline: Pipeline,
        options: AggregateOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        StoreBackend::aggregate(self, pipeline, options, collection).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[async_trait]
impl StoreBackend for Box<dyn DynStoreBackend> {
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        DynStoreBackend::find(&**self, query, collection).await
    }

    async fn find_one(&self, query: Query, collection: &str) -> DocumentStoreResult<Option<Document>> {
        DynStoreBackend::find_one(&**self, query, collection).await
    }

    async fn find_by_id(&self, id: ObjectId, collection: &str) -> DocumentStoreResult<Option<Document>> {
        DynStoreBackend::find_by_id(&**self, id, collection).await
    }

    async fn insert(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        DynStoreBackend::insert(&**self, documents, collection).await
    }

    async fn save(&self, document: Document, collection: &str) -> DocumentStoreResult<Document> {
        DynStoreBackend::save(&**self, document, collection).await
    }

    async fn delete_by_id(&self, id: ObjectId, collection: &str) -> DocumentStoreResult<Option<Document>> {
        DynStoreBackend::delete_by_id(&**self, id, collection).await
    }

    async fn aggregate(
        &self,
        pipeline: Pipeline,
        options: AggregateOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        DynStoreBackend::aggregate(&**self, pipeline, options, collection).await
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        DynStoreBackend::shutdown_boxed(self).await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
