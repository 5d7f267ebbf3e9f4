//! In-memory storage implementation for document stores.
//!
//! Collections are vectors of BSON documents kept in insertion order behind an
//! async-aware read-write lock.

use std::sync::Arc;

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use mea::rwlock::RwLock;

use docrest_core::{
    backend::{StoreBackend, StoreBackendBuilder, ensure_id},
    error::{DocumentStoreError, DocumentStoreResult},
    pipeline::{AggregateOptions, Pipeline, Stage},
    populate::project_document,
    query::Query,
};

use crate::evaluator::{DocumentEvaluator, sort_documents};

type StoreMap = std::collections::HashMap<String, Vec<Document>>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state; clones share
/// the same underlying data.
///
/// Queries scan every document of a collection (no indexing). Aggregation supports the
/// typed stages only; [`Stage::Raw`] is rejected with
/// [`DocumentStoreError::Unsupported`].
///
/// # Example
///
/// ```ignore
/// use docrest_memory::InMemoryStore;
/// use docrest_core::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let created = store.insert(vec![doc! { "name": "Alice" }], "users").await?;
/// assert!(created[0].get_object_id("_id").is_ok());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Number of documents currently stored in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }
}

fn position_of(documents: &[Document], id: &Bson) -> Option<usize> {
    documents
        .iter()
        .position(|document| document.get("_id") == Some(id))
}

fn run_stage(documents: Vec<Document>, stage: &Stage) -> DocumentStoreResult<Vec<Document>> {
    Ok(match stage {
        Stage::Match(expr) => DocumentEvaluator::filter_documents(&documents, expr)?,
        Stage::Sort(sort) => {
            let mut documents = documents;
            sort_documents(&mut documents, sort);
            documents
        }
        Stage::Skip(n) => documents
            .into_iter()
            .skip(*n as usize)
            .collect(),
        Stage::Limit(n) => documents
            .into_iter()
            .take(*n as usize)
            .collect(),
        Stage::Project(fields) => documents
            .iter()
            .map(|document| project_document(document, fields))
            .collect(),
        Stage::Raw(raw) => {
            return Err(DocumentStoreError::Unsupported(format!(
                "raw pipeline stage {raw} in the in-memory store"
            )));
        }
    })
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let documents = match store.get(collection) {
            Some(documents) => documents,
            None => return Ok(vec![]),
        };

        let mut found = match &query.filter {
            Some(filter) => DocumentEvaluator::filter_documents(documents, filter)?,
            None => documents.clone(),
        };

        sort_documents(&mut found, &query.sort);

        Ok(found
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|document| match &query.select {
                Some(fields) => project_document(&document, fields),
                None => document,
            })
            .collect())
    }

    async fn insert(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let mut store = self.store.write().await;
        let existing = store
            .entry(collection.to_string())
            .or_default();

        let mut pending: Vec<Document> = Vec::with_capacity(documents.len());

        for mut document in documents {
            ensure_id(&mut document);

            let id = document
                .get("_id")
                .cloned()
                .unwrap_or(Bson::Null);
            if position_of(existing, &id).is_some() || position_of(&pending, &id).is_some() {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "duplicate _id {id} in collection {collection}"
                )));
            }

            pending.push(document);
        }

        existing.extend(pending.iter().cloned());

        Ok(pending)
    }

    async fn save(&self, document: Document, collection: &str) -> DocumentStoreResult<Document> {
        let mut store = self.store.write().await;

        let id = document
            .get("_id")
            .cloned()
            .ok_or_else(|| DocumentStoreError::InvalidDocument("cannot save a document without _id".to_string()))?;

        let slot = store
            .get_mut(collection)
            .and_then(|documents| {
                let index = position_of(documents, &id)?;
                documents.get_mut(index)
            })
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string(), collection.to_string()))?;

        *slot = document.clone();

        Ok(document)
    }

    async fn delete_by_id(&self, id: ObjectId, collection: &str) -> DocumentStoreResult<Option<Document>> {
        let mut store = self.store.write().await;

        Ok(store.get_mut(collection).and_then(|documents| {
            let index = position_of(documents, &Bson::ObjectId(id))?;
            Some(documents.remove(index))
        }))
    }

    async fn aggregate(
        &self,
        pipeline: Pipeline,
        _options: AggregateOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut documents = self
            .store
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default();

        for stage in pipeline.stages() {
            documents = run_stage(documents, stage)?;
        }

        Ok(documents)
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docrest_memory::InMemoryStore;
/// use docrest_core::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    seed: Vec<(String, Vec<Document>)>,
}

impl InMemoryStoreBuilder {
    /// Preloads a collection. Documents without `_id` are assigned one.
    pub fn collection(mut self, name: impl Into<String>, documents: Vec<Document>) -> Self {
        self.seed.push((name.into(), documents));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let store = InMemoryStore::new();

        for (name, documents) in self.seed {
            store.insert(documents, &name).await?;
        }

        Ok(store)
    }
}
