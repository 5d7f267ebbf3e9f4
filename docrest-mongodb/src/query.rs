//! Translation of filter expressions and pipeline stages into MongoDB syntax.

use bson::{Bson, Document, doc};

use docrest_core::{
    error::DocumentStoreError,
    pipeline::{Pipeline, Stage},
    query::{Expr, FieldOp, QueryVisitor, Sort},
};

/// Translates filter expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates an optional filter; no filter matches everything.
    pub fn translate(filter: Option<&Expr>) -> Result<Document, DocumentStoreError> {
        match filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        // `$or` rejects an empty list; an empty disjunction matches nothing.
        if exprs.is_empty() {
            return Ok(doc! { "$expr": false });
        }

        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Contains => match value {
                    Bson::String(s) => doc! { "$regex": regex::escape(s), "$options": "i" },
                    _ => return Err(DocumentStoreError::Backend("Contains operator requires a string value".to_string())),
                },
                FieldOp::AnyOf => match value {
                    Bson::Array(_) => doc! { "$in": value },
                    _ => return Err(DocumentStoreError::Backend("AnyOf operator requires an array value".to_string())),
                },
            }
        })
    }
}

/// Builds a `$sort` specification.
pub(crate) fn sort_document(sort: &[Sort]) -> Document {
    sort.iter()
        .map(|key| (key.field.clone(), Bson::Int32(key.direction.as_i32())))
        .collect()
}

/// Builds a find projection that keeps the listed fields.
pub(crate) fn projection_document(fields: &[String]) -> Document {
    fields
        .iter()
        .map(|field| (field.clone(), Bson::Int32(1)))
        .collect()
}

/// Translates a pipeline into MongoDB aggregation stages.
pub(crate) fn translate_pipeline(pipeline: &Pipeline) -> Result<Vec<Document>, DocumentStoreError> {
    pipeline
        .stages()
        .iter()
        .map(|stage| {
            Ok(match stage {
                Stage::Match(expr) => doc! { "$match": MongoQueryTranslator.visit_expr(expr)? },
                Stage::Sort(sort) => doc! { "$sort": sort_document(sort) },
                Stage::Skip(n) => doc! { "$skip": *n as i64 },
                Stage::Limit(n) => doc! { "$limit": *n as i64 },
                Stage::Project(fields) => doc! {
                    "$project": fields
                        .iter()
                        .map(|field| (field.clone(), Bson::String(format!("${field}"))))
                        .collect::<Document>(),
                },
                Stage::Raw(raw) => raw.clone(),
            })
        })
        .collect()
}
