#![allow(dead_code)]

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use bson::{Document, doc, oid::ObjectId};

use docrest_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::DocumentStoreResult,
    pipeline::{AggregateOptions, Pipeline},
    query::{Filter, Query},
    resource::{Relation, ResourceConfig},
    validate::{FieldRule, FieldRules},
};
use docrest_memory::InMemoryStore;

pub const ALICE: &str = "64b000000000000000000001";
pub const BOB: &str = "64b000000000000000000002";

/// Wraps the in-memory store and counts every backend call.
#[derive(Debug, Default)]
pub struct CountingStore {
    pub inner: InMemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self { inner, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreBackend for CountingStore {
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        self.tick();
        self.inner.find(query, collection).await
    }

    async fn insert(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        self.tick();
        self.inner.insert(documents, collection).await
    }

    async fn save(&self, document: Document, collection: &str) -> DocumentStoreResult<Document> {
        self.tick();
        self.inner.save(document, collection).await
    }

    async fn delete_by_id(&self, id: ObjectId, collection: &str) -> DocumentStoreResult<Option<Document>> {
        self.tick();
        self.inner.delete_by_id(id, collection).await
    }

    async fn aggregate(
        &self,
        pipeline: Pipeline,
        options: AggregateOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        self.tick();
        self.inner.aggregate(pipeline, options, collection).await
    }
}

/// Wraps the in-memory store and records the options of every aggregation.
#[derive(Debug, Default)]
pub struct RecordingStore {
    pub inner: InMemoryStore,
    aggregations: Mutex<Vec<AggregateOptions>>,
}

impl RecordingStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self { inner, aggregations: Mutex::default() }
    }

    pub fn aggregations(&self) -> Vec<AggregateOptions> {
        self.aggregations.lock().unwrap().clone()
    }
}

#[async_trait]
impl StoreBackend for RecordingStore {
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        self.inner.find(query, collection).await
    }

    async fn insert(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        self.inner.insert(documents, collection).await
    }

    async fn save(&self, document: Document, collection: &str) -> DocumentStoreResult<Document> {
        self.inner.save(document, collection).await
    }

    async fn delete_by_id(&self, id: ObjectId, collection: &str) -> DocumentStoreResult<Option<Document>> {
        self.inner.delete_by_id(id, collection).await
    }

    async fn aggregate(
        &self,
        pipeline: Pipeline,
        options: AggregateOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        self.aggregations.lock().unwrap().push(options);
        self.inner.aggregate(pipeline, options, collection).await
    }
}

pub fn oid(hex: &str) -> ObjectId {
    ObjectId::parse_str(hex).unwrap()
}

pub fn products_config() -> ResourceConfig {
    ResourceConfig::new("products")
        .relation(Relation::new("owner", "users"))
        .relation(Relation::new("category", "categories"))
        .searchable(["name", "qty"])
}

pub fn product_rules() -> FieldRules {
    FieldRules::new([
        ("name".to_string(), FieldRule { min_length: Some(2), ..FieldRule::required() }),
        ("qty".to_string(), FieldRule { minimum: Some(0.0), ..FieldRule::default() }),
    ])
    .unwrap()
}

/// Users, categories and four products, two of them active.
pub async fn seeded() -> InMemoryStore {
    InMemoryStore::builder()
        .collection(
            "users",
            vec![
                doc! { "_id": oid(ALICE), "name": "Alice" },
                doc! { "_id": oid(BOB), "name": "Bob" },
            ],
        )
        .collection(
            "categories",
            vec![doc! { "_id": oid("64c000000000000000000001"), "title": "Furniture" }],
        )
        .collection(
            "products",
            vec![
                doc! { "name": "Desk", "qty": 3, "active": true, "owner": oid(ALICE), "category": oid("64c000000000000000000001") },
                doc! { "name": "Lamp", "qty": 10, "active": false, "owner": oid(BOB) },
                doc! { "name": "Desk mat", "qty": 7, "active": true, "owner": oid("64b0000000000000000000ff") },
                doc! { "name": "Chair", "qty": 0, "active": "true" },
            ],
        )
        .build()
        .await
        .unwrap()
}

pub async fn id_of(store: &InMemoryStore, name: &str) -> ObjectId {
    store
        .find_one(Query::builder().filter(Filter::eq("name", name)).build(), "products")
        .await
        .unwrap()
        .unwrap()
        .get_object_id("_id")
        .unwrap()
}
