//! The operation handlers.
//!
//! Every handler takes the inbound [`Request`] and the resource module's [`Call`] and
//! resolves to an [`Outcome`]. Handlers share one shape:
//!
//! 1. run the pre hooks,
//! 2. validate the candidate (writes only),
//! 3. execute against the backend,
//! 4. populate and project (find path),
//! 5. run the post hooks,
//! 6. build the envelope.
//!
//! Any error on the way becomes a [`Failure`](crate::envelope::Failure) carrying the
//! status code configured for its [`ErrorKind`](crate::error::ErrorKind).

use std::future::Future;

use bson::{Bson, Document, oid::ObjectId};

use crate::{
    backend::StoreBackend,
    descriptor::{QueryDescriptor, Request},
    envelope::{Envelope, EnvelopeError, ItemFailure, Outcome},
    error::{EngineError, EngineResult},
    filter::{compile_filter, equality_seed, parse_identifier},
    options::Call,
    plan::{SearchSettings, compile_aggregate, compile_tabular},
    populate::{populate_documents, project_document, resolve_population},
    query::{Expr, Filter, Query},
    resource::Resource,
    validate::ValidationMode,
};

impl<'a, B: StoreBackend> Resource<'a, B> {
    /// Validates and stores one candidate document.
    pub async fn create_one(&self, request: Request, call: &Call) -> Outcome {
        self.run("create_one", call, async {
            let request = self.pre(request, call).await?;
            let candidate = body_document(&request.body)?;

            self.validate(&candidate, ValidationMode::Create)?;

            let created = self
                .backend
                .insert(vec![candidate], self.name())
                .await?;
            let mut created = self.shape(created, &request.query).await?;

            let data = created
                .pop()
                .map(Bson::Document)
                .unwrap_or(Bson::Null);

            self.respond(call, "Record created", data).await
        })
        .await
    }

    /// Validates every candidate independently and stores the ones that pass.
    ///
    /// The body is either a list of candidates or a map of keyed candidates. Rejected
    /// candidates are reported in the envelope's `error` member, keyed by list index or
    /// map key; the call still succeeds.
    pub async fn create_many(&self, request: Request, call: &Call) -> Outcome {
        self.run("create_many", call, async {
            let request = self.pre(request, call).await?;

            let candidates: Vec<(String, Bson)> = match request.body {
                Bson::Array(ref items) => items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| (index.to_string(), item.clone()))
                    .collect(),
                Bson::Document(ref map) => map
                    .iter()
                    .map(|(key, item)| (key.clone(), item.clone()))
                    .collect(),
                _ => return Err(EngineError::execution("request body must be a list or map of documents")),
            };

            let mut accepted = Vec::new();
            let mut rejected = Vec::new();

            for (key, candidate) in candidates {
                let Bson::Document(candidate) = candidate else {
                    rejected.push(ItemFailure {
                        key,
                        messages: vec!["candidate must be a document".to_string()],
                    });
                    continue;
                };

                match self.verdict(&candidate, ValidationMode::Create) {
                    Ok(()) => accepted.push(candidate),
                    Err(messages) => rejected.push(ItemFailure { key, messages }),
                }
            }

            tracing::debug!(
                resource = %self.name(),
                accepted = accepted.len(),
                rejected = rejected.len(),
                "validated bulk candidates"
            );

            let created = if accepted.is_empty() {
                Vec::new()
            } else {
                self.backend
                    .insert(accepted, self.name())
                    .await?
            };
            let created = self.shape(created, &request.query).await?;

            let envelope = self
                .respond(call, "Records created", documents(created))
                .await?;

            Ok(if rejected.is_empty() {
                envelope
            } else {
                envelope.with_error(EnvelopeError::Items(rejected))
            })
        })
        .await
    }

    /// Lists the documents matching the query descriptor. An empty list is a success.
    pub async fn get_many(&self, request: Request, call: &Call) -> Outcome {
        self.run("get_many", call, async {
            let request = self.pre(request, call).await?;
            let descriptor = &request.query;

            let mut query = Query::builder()
                .select(descriptor.select.clone())
                .sorts(descriptor.sort.iter().cloned());
            if let Some(filter) = compile_filter(&descriptor.filter) {
                query = query.filter(filter);
            }
            if let Some(paginate) = &descriptor.paginate {
                query = query
                    .offset(paginate.offset() as usize)
                    .limit(paginate.limit as usize);
            }

            let found = self
                .backend
                .find(query.build(), self.name())
                .await?;
            let found = self.shape(found, descriptor).await?;

            self.respond(call, "Records fetched", documents(found))
                .await
        })
        .await
    }

    /// Fetches the document whose identifier is the request's `id`.
    pub async fn get_one_by_id(&self, request: Request, call: &Call) -> Outcome {
        self.run("get_one_by_id", call, async {
            let request = self.pre(request, call).await?;
            let id = request_id(&request)?;

            let found = self
                .find_first(Filter::eq("_id", id), &request.query)
                .await?
                .ok_or_else(|| self.missing(&id.to_hex()))?;

            self.respond(call, "Record fetched", Bson::Document(found))
                .await
        })
        .await
    }

    /// Fetches the first document matching the query descriptor's filter.
    pub async fn get_one_where(&self, request: Request, call: &Call) -> Outcome {
        self.run("get_one_where", call, async {
            let request = self.pre(request, call).await?;
            let filter = compile_filter(&request.query.filter).unwrap_or_else(Filter::all);

            let found = self
                .find_first(filter, &request.query)
                .await?
                .ok_or_else(|| self.missing("matching the filter"))?;

            self.respond(call, "Record fetched", Bson::Document(found))
                .await
        })
        .await
    }

    /// Applies the request body as a patch to the document with the request's `id`.
    pub async fn update_by_id(&self, request: Request, call: &Call) -> Outcome {
        self.run("update_by_id", call, async {
            let request = self.pre(request, call).await?;
            let id = request_id(&request)?;
            let patch = body_document(&request.body)?;

            self.validate(&patch, ValidationMode::Update)?;

            let existing = self
                .backend
                .find_by_id(id, self.name())
                .await?
                .ok_or_else(|| self.missing(&id.to_hex()))?;

            let updated = self
                .patch(existing, &patch, &request.query, call)
                .await?;

            self.respond(call, "Record updated", updated)
                .await
        })
        .await
    }

    /// Applies the request body as a patch to the first document matching the filter.
    ///
    /// The patch is validated before the lookup.
    pub async fn find_update(&self, request: Request, call: &Call) -> Outcome {
        self.run("find_update", call, async {
            let request = self.pre(request, call).await?;
            let filter = compile_filter(&request.query.filter).unwrap_or_else(Filter::all);
            let patch = body_document(&request.body)?;

            self.validate(&patch, ValidationMode::Update)?;

            let existing = self
                .backend
                .find_one(Query::builder().filter(filter).build(), self.name())
                .await?
                .ok_or_else(|| self.missing("matching the filter"))?;

            let updated = self
                .patch(existing, &patch, &request.query, call)
                .await?;

            self.respond(call, "Record updated", updated)
                .await
        })
        .await
    }

    /// Patches the first document matching the filter, or creates one if none matches.
    ///
    /// A created document starts from the filter's equality clauses with the patch
    /// written over them and must pass create validation. The lookup and the write are
    /// not atomic: concurrent calls with the same filter may each create a document.
    pub async fn find_update_or_create(&self, request: Request, call: &Call) -> Outcome {
        self.run("find_update_or_create", call, async {
            let request = self.pre(request, call).await?;
            let filter = compile_filter(&request.query.filter).unwrap_or_else(Filter::all);
            let patch = body_document(&request.body)?;

            let existing = self
                .backend
                .find_one(Query::builder().filter(filter).build(), self.name())
                .await?;

            match existing {
                Some(existing) => {
                    self.validate(&patch, ValidationMode::Update)?;

                    let updated = self
                        .patch(existing, &patch, &request.query, call)
                        .await?;

                    self.respond(call, "Record updated", updated)
                        .await
                }
                None => {
                    let mut candidate = equality_seed(&request.query.filter);
                    for (key, value) in patch {
                        candidate.insert(key, value);
                    }

                    self.validate(&candidate, ValidationMode::Create)?;

                    let created = self
                        .backend
                        .insert(vec![candidate], self.name())
                        .await?;
                    let mut created = self.shape(created, &request.query).await?;

                    let data = created
                        .pop()
                        .map(Bson::Document)
                        .unwrap_or(Bson::Null);

                    self.respond(call, "Record created", data).await
                }
            }
        })
        .await
    }

    /// Deletes the document with the request's `id` and returns its prior state.
    pub async fn delete_by_id(&self, request: Request, call: &Call) -> Outcome {
        self.run("delete_by_id", call, async {
            let request = self.pre(request, call).await?;
            let id = request_id(&request)?;

            let deleted = self
                .backend
                .delete_by_id(id, self.name())
                .await?
                .ok_or_else(|| self.missing(&id.to_hex()))?;

            self.respond(call, "Record deleted", Bson::Document(deleted))
                .await
        })
        .await
    }

    /// Runs the grid-oriented aggregation and reports the unpaginated match count.
    pub async fn tabular_aggregate(&self, request: Request, call: &Call) -> Outcome {
        self.run("tabular_aggregate", call, async {
            let mut request = request;
            let mut pipeline = call.pipeline.clone();
            call.hooks
                .run_pre(&mut request, &mut pipeline)
                .await?;

            let plan = compile_tabular(
                pipeline,
                &request,
                SearchSettings {
                    searchable: &self.config.searchable,
                    per_column_search: call.options.per_column_search,
                },
            );

            tracing::debug!(resource = %self.name(), stages = ?plan.paged.stages(), "compiled tabular pipeline");

            let options = call.options.aggregate_options();
            let count = self
                .backend
                .aggregate(plan.filtered, options, self.name())
                .await?
                .len() as u64;
            let page = self
                .backend
                .aggregate(plan.paged, options, self.name())
                .await?;

            let mut data = documents(page);
            call.hooks.run_post(&mut data).await?;

            Ok(Envelope::tabular(call.options.codes.success, "Records fetched", data, count))
        })
        .await
    }

    /// Compiles the query descriptor onto the call's initial stages and runs it once.
    pub async fn raw_aggregate(&self, request: Request, call: &Call) -> Outcome {
        self.run("raw_aggregate", call, async {
            let mut request = request;
            let mut pipeline = call.pipeline.clone();
            call.hooks
                .run_pre(&mut request, &mut pipeline)
                .await?;

            let mut pipeline = compile_aggregate(pipeline, &request.query);
            call.hooks.run_mid(&mut pipeline).await?;
            pipeline.ensure_non_empty();

            tracing::debug!(resource = %self.name(), stages = ?pipeline.stages(), "compiled aggregate pipeline");

            let results = self
                .backend
                .aggregate(pipeline, call.options.aggregate_options(), self.name())
                .await?;

            self.respond(call, "Records fetched", documents(results))
                .await
        })
        .await
    }

    async fn run<F>(&self, operation: &'static str, call: &Call, work: F) -> Outcome
    where
        F: Future<Output = EngineResult<Envelope>>,
    {
        match work.await {
            Ok(envelope) => {
                tracing::debug!(
                    resource = %self.name(),
                    operation,
                    code = envelope.code,
                    documents = envelope.len(),
                    "operation succeeded"
                );
                Ok(envelope)
            }
            Err(error) => {
                let failure = call.fail(error);
                tracing::debug!(
                    resource = %self.name(),
                    operation,
                    code = failure.code,
                    error = %failure,
                    "operation failed"
                );
                Err(failure)
            }
        }
    }

    /// Runs the pre hooks of a find-path operation. The pipeline they see is a copy of
    /// the call's initial stages and is not executed.
    async fn pre(&self, mut request: Request, call: &Call) -> EngineResult<Request> {
        if !call.hooks.is_empty() {
            let mut scratch = call.pipeline.clone();
            call.hooks
                .run_pre(&mut request, &mut scratch)
                .await?;
        }
        Ok(request)
    }

    async fn respond(&self, call: &Call, message: &str, mut data: Bson) -> EngineResult<Envelope> {
        call.hooks.run_post(&mut data).await?;
        Ok(call.succeed(message, data))
    }

    fn verdict(&self, candidate: &Document, mode: ValidationMode) -> Result<(), Vec<String>> {
        match &self.validator {
            Some(validator) => {
                let verdict = validator.validate(candidate, mode);
                if verdict.success { Ok(()) } else { Err(verdict.messages) }
            }
            None => Ok(()),
        }
    }

    fn validate(&self, candidate: &Document, mode: ValidationMode) -> EngineResult<()> {
        self.verdict(candidate, mode)
            .map_err(EngineError::Validation)
    }

    fn missing(&self, what: &str) -> EngineError {
        EngineError::NotFound(format!("{} {what} not found", self.name()))
    }

    async fn find_first(&self, filter: Expr, descriptor: &QueryDescriptor) -> EngineResult<Option<Document>> {
        let found = self
            .backend
            .find_one(
                Query::builder()
                    .filter(filter)
                    .select(descriptor.select.clone())
                    .sorts(descriptor.sort.iter().cloned())
                    .build(),
                self.name(),
            )
            .await?;

        Ok(match found {
            Some(document) => self.shape(vec![document], descriptor).await?.pop(),
            None => None,
        })
    }

    /// Writes every patch field onto the loaded document and saves it. The updated-at
    /// field is stamped when configured.
    async fn patch(
        &self,
        mut document: Document,
        patch: &Document,
        descriptor: &QueryDescriptor,
        call: &Call,
    ) -> EngineResult<Bson> {
        for (key, value) in patch {
            if key != "_id" {
                document.insert(key.clone(), value.clone());
            }
        }

        if let Some(field) = &call.options.updated_at_field {
            document.insert(field.clone(), bson::DateTime::from_chrono(chrono::Utc::now()));
        }

        let saved = self.backend.save(document, self.name()).await?;
        let mut saved = self.shape(vec![saved], descriptor).await?;

        Ok(saved
            .pop()
            .map(Bson::Document)
            .unwrap_or(Bson::Null))
    }

    /// Populates the requested relations and applies the projection.
    async fn shape(&self, mut found: Vec<Document>, descriptor: &QueryDescriptor) -> EngineResult<Vec<Document>> {
        let relations = resolve_population(&descriptor.populate, self.relations());
        if !relations.is_empty() {
            populate_documents(self.backend, &mut found, &relations).await?;
        }

        if let Some(fields) = &descriptor.select {
            for document in found.iter_mut() {
                *document = project_document(document, fields);
            }
        }

        Ok(found)
    }
}

fn documents(documents: Vec<Document>) -> Bson {
    Bson::Array(documents.into_iter().map(Bson::Document).collect())
}

fn body_document(body: &Bson) -> EngineResult<Document> {
    match body {
        Bson::Document(document) => Ok(document.clone()),
        _ => Err(EngineError::execution("request body must be a document")),
    }
}

fn request_id(request: &Request) -> EngineResult<ObjectId> {
    let raw = request
        .id
        .as_deref()
        .ok_or_else(|| EngineError::execution("request carries no identifier"))?;

    parse_identifier("id", raw)
}
