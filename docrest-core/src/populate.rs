//! Population and projection constructors.
//!
//! - [`PopulateSpec`] + [`resolve_population`] decide which registered relations to join.
//! - [`resolve_projection`] turns a `select` value into a field list.
//! - [`populate_documents`] performs the join against any [`StoreBackend`] with one
//!   `_id`-membership find per relation.

use std::collections::HashMap;

use bson::{Bson, Document, oid::ObjectId};
use serde_json::Value;

use crate::{
    backend::StoreBackend,
    error::DocumentStoreResult,
    query::{Filter, Query},
    resource::Relation,
};

/// Which relations a request asks to populate.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PopulateSpec {
    /// Populate nothing.
    #[default]
    None,
    /// Populate every registered relation.
    All,
    /// Populate the named relations that are also registered.
    Only(Vec<String>),
}

impl PopulateSpec {
    /// Interprets the loosely-typed `populate` request value.
    ///
    /// `true`, `1`, `"1"` and `"true"` select every relation; an object selects the keys
    /// whose values are truthy in the same sense; an array selects the listed names.
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::Object(map) => PopulateSpec::Only(
                map.iter()
                    .filter(|(_, flag)| is_truthy(flag))
                    .map(|(key, _)| key.clone())
                    .collect(),
            ),
            Value::Array(items) => PopulateSpec::Only(
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
            ),
            other if is_truthy(other) => PopulateSpec::All,
            _ => PopulateSpec::None,
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => matches!(s.trim(), "1" | "true"),
        _ => false,
    }
}

/// Resolves a populate request against the registered relations.
///
/// The result keeps registration order. Names that are not registered are ignored.
pub fn resolve_population<'r>(spec: &PopulateSpec, relations: &'r [Relation]) -> Vec<&'r Relation> {
    match spec {
        PopulateSpec::None => Vec::new(),
        PopulateSpec::All => relations.iter().collect(),
        PopulateSpec::Only(names) => relations
            .iter()
            .filter(|relation| names.iter().any(|name| name == &relation.field))
            .collect(),
    }
}

/// Resolves a `select` value into a field list.
///
/// A string is a space-separated list, an array lists fields, and an object contributes
/// its keys (values are ignored). Anything empty means "all fields" and yields `None`.
pub fn resolve_projection(value: &Value) -> Option<Vec<String>> {
    let fields: Vec<String> = match value {
        Value::String(s) => s.split_whitespace().map(str::to_string).collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .flat_map(str::split_whitespace)
            .map(str::to_string)
            .collect(),
        Value::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    };

    if fields.is_empty() { None } else { Some(fields) }
}

/// Resolves a dotted path (`address.city`) inside a document.
pub fn lookup_path<'d>(document: &'d Document, path: &str) -> Option<&'d Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Keeps `_id` and the fields named by `fields`. A dotted field keeps only that nested
/// path, not its siblings.
pub fn project_document(document: &Document, fields: &[String]) -> Document {
    let mut projected = Document::new();

    if let Some(id) = document.get("_id") {
        projected.insert("_id", id.clone());
    }

    for field in fields {
        if let Some(value) = lookup_path(document, field) {
            insert_path(&mut projected, field, value.clone());
        }
    }

    projected
}

fn insert_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }
            if let Ok(nested) = document.get_document_mut(head) {
                insert_path(nested, rest, value);
            }
        }
    }
}

/// Replaces relation identifiers with the referenced documents.
///
/// A scalar identifier with no matching target becomes `null`; missing entries of an
/// identifier array are dropped.
pub async fn populate_documents<B: StoreBackend>(
    backend: &B,
    documents: &mut [Document],
    relations: &[&Relation],
) -> DocumentStoreResult<()> {
    for relation in relations {
        let ids: Vec<ObjectId> = documents
            .iter()
            .filter_map(|document| document.get(&relation.field))
            .flat_map(referenced_ids)
            .collect();

        if ids.is_empty() {
            continue;
        }

        let targets: HashMap<ObjectId, Document> = backend
            .find(
                Query::builder()
                    .filter(Filter::any_of("_id", ids))
                    .build(),
                &relation.target,
            )
            .await?
            .into_iter()
            .filter_map(|target| target.get_object_id("_id").ok().map(|id| (id, target)))
            .collect();

        for document in documents.iter_mut() {
            let replacement = match document.get(&relation.field) {
                Some(Bson::Array(items)) => Bson::Array(
                    items
                        .iter()
                        .filter_map(as_object_id)
                        .filter_map(|id| targets.get(&id).cloned().map(Bson::Document))
                        .collect(),
                ),
                Some(value) => match as_object_id(value) {
                    Some(id) => targets
                        .get(&id)
                        .cloned()
                        .map(Bson::Document)
                        .unwrap_or(Bson::Null),
                    None => continue,
                },
                None => continue,
            };

            document.insert(relation.field.clone(), replacement);
        }
    }

    Ok(())
}

fn referenced_ids(value: &Bson) -> Vec<ObjectId> {
    match value {
        Bson::Array(items) => items.iter().filter_map(as_object_id).collect(),
        other => as_object_id(other).into_iter().collect(),
    }
}

fn as_object_id(value: &Bson) -> Option<ObjectId> {
    match value {
        Bson::ObjectId(id) => Some(*id),
        Bson::String(s) => ObjectId::parse_str(s).ok(),
        _ => None,
    }
}
