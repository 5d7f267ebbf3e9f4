//! Expression evaluation and ordering for in-memory documents.
//!
//! Field paths may be dotted (`address.city`) and descend into nested documents. A
//! comparison against a field holding an array matches when any element matches, the
//! way document stores treat array fields.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docrest_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    populate::lookup_path,
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to `f64`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Number(f64),
    String(&'a str),
    Map(HashMap<&'a str, Comparable<'a>>),
    Array(Vec<Comparable<'a>>),
    ObjectId(ObjectId),
    Bool(bool),
    DateTime(DateTime),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Null,
        }
    }
}

impl Comparable<'_> {
    /// Cross-type sort rank, following the usual document-store ordering.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
        }
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other)
            .unwrap_or_else(|| self.rank().cmp(&other.rank()))
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        expr: &Expr,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).evaluate(expr)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }
}

fn contains_ignoring_case(haystack: &Bson, needle: &str) -> bool {
    match haystack {
        Bson::String(s) => s.to_lowercase().contains(needle),
        Bson::Array(items) => items
            .iter()
            .any(|item| contains_ignoring_case(item, needle)),
        _ => false,
    }
}

fn equals(field_value: &Bson, value: &Bson) -> bool {
    let expected = Comparable::from(value);

    match field_value {
        Bson::Array(items) if !matches!(value, Bson::Array(_)) => items
            .iter()
            .any(|item| Comparable::from(item) == expected),
        other => Comparable::from(other) == expected,
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = lookup_path(self.document, field);

        match op {
            FieldOp::Eq => Ok(match field_value {
                Some(field_value) => equals(field_value, value),
                None => matches!(value, Bson::Null),
            }),
            FieldOp::Contains => match value {
                Bson::String(needle) => Ok(field_value
                    .is_some_and(|haystack| contains_ignoring_case(haystack, &needle.to_lowercase()))),
                other => Err(DocumentStoreError::InvalidDocument(format!(
                    "substring match on `{field}` needs a string, got {other}"
                ))),
            },
            FieldOp::AnyOf => match value {
                Bson::Array(candidates) => Ok(field_value.is_some_and(|field_value| {
                    candidates
                        .iter()
                        .any(|candidate| equals(field_value, candidate))
                })),
                other => Err(DocumentStoreError::InvalidDocument(format!(
                    "membership test on `{field}` needs an array, got {other}"
                ))),
            },
        }
    }
}

/// Orders documents by the sort keys, in key order. Missing fields sort as null.
pub(crate) fn sort_documents(documents: &mut [Document], sort: &[Sort]) {
    if sort.is_empty() {
        return;
    }

    documents.sort_by(|a, b| {
        for key in sort {
            let left = lookup_path(a, &key.field)
                .map(Comparable::from)
                .unwrap_or(Comparable::Null);
            let right = lookup_path(b, &key.field)
                .map(Comparable::from)
                .unwrap_or(Comparable::Null);

            let ordering = match key.direction {
                SortDirection::Asc => left.total_cmp(&right),
                SortDirection::Desc => right.total_cmp(&left),
            };

            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docrest_core::query::Filter;

    fn matches(document: &Document, expr: Expr) -> bool {
        DocumentEvaluator::new(document).evaluate(&expr).unwrap()
    }

    #[test]
    fn contains_is_case_insensitive_and_literal() {
        let document = doc! { "name": "Alice Smith", "tags": ["Red", "blue"] };

        assert!(matches(&document, Filter::contains("name", "alice")));
        assert!(matches(&document, Filter::contains("tags", "RED")));
        assert!(!matches(&document, Filter::contains("name", "a.ice")));
        assert!(!matches(&document, Filter::contains("missing", "a")));
    }

    #[test]
    fn numbers_compare_across_widths() {
        let document = doc! { "qty": 4_i32, "price": 2.5 };

        assert!(matches(&document, Filter::eq("qty", 4_i64)));
        assert!(matches(&document, Filter::eq("price", 2.5)));
        assert!(!matches(&document, Filter::eq("qty", "4")));
    }

    #[test]
    fn dotted_paths_and_array_membership() {
        let owner = ObjectId::new();
        let document = doc! { "address": { "city": "Lagos" }, "owners": [owner] };

        assert!(matches(&document, Filter::eq("address.city", "Lagos")));
        assert!(matches(&document, Filter::eq("owners", owner)));
        assert!(matches(&document, Filter::any_of("owners", [ObjectId::new(), owner])));
        assert!(matches(&document, Filter::all()));
        assert!(!matches(&document, Filter::or([])));
    }

    #[test]
    fn sorts_by_several_keys() {
        let mut documents = vec![
            doc! { "group": "b", "rank": 1 },
            doc! { "group": "a", "rank": 1 },
            doc! { "group": "a", "rank": 2 },
            doc! { "rank": 9 },
        ];

        sort_documents(
            &mut documents,
            &[Sort::new("group", SortDirection::Asc), Sort::new("rank", SortDirection::Desc)],
        );

        let order: Vec<_> = documents
            .iter()
            .map(|d| (d.get_str("group").unwrap_or("-"), d.get("rank").cloned().unwrap()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("-", Bson::Int32(9)),
                ("a", Bson::Int32(2)),
                ("a", Bson::Int32(1)),
                ("b", Bson::Int32(1)),
            ]
        );
    }
}
