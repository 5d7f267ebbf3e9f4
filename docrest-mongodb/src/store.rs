use async_trait::async_trait;
use bson::{Document, doc, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    options::ClientOptions,
};

use docrest_core::{
    backend::{StoreBackend, StoreBackendBuilder, ensure_id},
    error::{DocumentStoreError, DocumentStoreResult},
    pipeline::{AggregateOptions, Pipeline},
    query::Query,
};

use crate::query::{MongoQueryTranslator, projection_document, sort_document, translate_pipeline};

fn backend_error(e: mongodb::error::Error) -> DocumentStoreError {
    DocumentStoreError::Backend(e.to_string())
}

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    async fn close(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let filter = MongoQueryTranslator::translate(query.filter.as_ref())?;
        tracing::trace!(collection, %filter, "find");

        let coll = self.get_collection(collection);
        let mut find = coll.find(filter);

        if let Some(fields) = &query.select {
            find = find.projection(projection_document(fields));
        }
        if !query.sort.is_empty() {
            find = find.sort(sort_document(&query.sort));
        }
        if let Some(skip) = query.offset {
            find = find.skip(skip as u64);
        }
        if let Some(limit) = query.limit {
            find = find.limit(limit as i64);
        }

        find.await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn insert(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let documents: Vec<Document> = documents
            .into_iter()
            .map(|mut document| {
                ensure_id(&mut document);
                document
            })
            .collect();

        self.get_collection(collection)
            .insert_many(&documents)
            .await
            .map_err(backend_error)?;

        Ok(documents)
    }

    async fn save(&self, document: Document, collection: &str) -> DocumentStoreResult<Document> {
        let id = document
            .get("_id")
            .cloned()
            .ok_or_else(|| DocumentStoreError::InvalidDocument("cannot save a document without _id".to_string()))?;

        let result = self
            .get_collection(collection)
            .replace_one(doc! { "_id": id.clone() }, &document)
            .await
            .map_err(backend_error)?;

        if result.matched_count == 0 {
            return Err(DocumentStoreError::DocumentNotFound(id.to_string(), collection.to_string()));
        }

        Ok(document)
    }

    async fn delete_by_id(&self, id: ObjectId, collection: &str) -> DocumentStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one_and_delete(doc! { "_id": id })
            .await
            .map_err(backend_error)
    }

    async fn aggregate(
        &self,
        pipeline: Pipeline,
        options: AggregateOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        let stages = translate_pipeline(&pipeline)?;
        tracing::trace!(collection, stages = stages.len(), allow_disk_use = options.allow_disk_use, "aggregate");

        self.get_collection(collection)
            .aggregate(stages)
            .allow_disk_use(options.allow_disk_use)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.close().await
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            )
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
