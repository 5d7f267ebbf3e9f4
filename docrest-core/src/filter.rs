//! Compiles the `where` / `like` / `whereObject` maps of a request into one filter.
//!
//! Clauses are written into a single keyed map in the order `like`, `where`,
//! `whereObject`. A key that appears in more than one map keeps only the clause written
//! last, so `whereObject` wins over `where`, which wins over `like`.

use bson::{Document, oid::ObjectId};

use crate::{
    descriptor::FilterSpec,
    error::{EngineError, EngineResult},
    query::{Expr, Filter},
};

/// Compiles a filter spec into an AND of its clauses, or `None` when the spec is empty.
pub fn compile_filter(spec: &FilterSpec) -> Option<Expr> {
    let mut clauses: Vec<(String, Expr)> = Vec::new();

    for (key, text) in &spec.like {
        write_clause(&mut clauses, key, Filter::contains(key.clone(), text.trim()));
    }
    for (key, value) in &spec.exact {
        write_clause(&mut clauses, key, Filter::eq(key.clone(), value.to_bson()));
    }
    for (key, value) in &spec.references {
        write_clause(&mut clauses, key, Filter::eq(key.clone(), value.to_bson()));
    }

    if clauses.is_empty() {
        return None;
    }

    Some(Filter::and(clauses.into_iter().map(|(_, clause)| clause)))
}

/// The equality part of a filter spec as a document, used to seed documents created by
/// find-update-or-create. `like` clauses contribute nothing.
pub fn equality_seed(spec: &FilterSpec) -> Document {
    spec.exact
        .iter()
        .chain(&spec.references)
        .map(|(key, value)| (key.clone(), value.to_bson()))
        .collect()
}

/// Parses a document identifier, naming the offending field on failure.
pub fn parse_identifier(key: &str, raw: &str) -> EngineResult<ObjectId> {
    ObjectId::parse_str(raw)
        .map_err(|_| EngineError::execution(format!("invalid identifier for `{key}`: {raw}")))
}

fn write_clause(clauses: &mut Vec<(String, Expr)>, key: &str, clause: Expr) {
    match clauses.iter_mut().find(|(existing, _)| existing == key) {
        Some((_, slot)) => *slot = clause,
        None => clauses.push((key.to_string(), clause)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{descriptor::FilterValue, query::FieldOp};
    use bson::Bson;

    const OID: &str = "507f1f77bcf86cd799439011";

    fn oid() -> ObjectId {
        ObjectId::parse_str(OID).unwrap()
    }

    fn clauses(expr: Option<Expr>) -> Vec<Expr> {
        match expr {
            Some(Expr::And(list)) => list,
            other => panic!("expected a conjunction, got {other:?}"),
        }
    }

    #[test]
    fn empty_spec_compiles_to_nothing() {
        assert_eq!(compile_filter(&FilterSpec::default()), None);
    }

    #[test]
    fn like_is_trimmed_substring() {
        let spec = FilterSpec {
            like: vec![("name".into(), "  Ali ".into())],
            ..FilterSpec::default()
        };

        assert_eq!(clauses(compile_filter(&spec)), vec![Filter::contains("name", "Ali")]);
    }

    #[test]
    fn boolean_strings_compile_to_booleans() {
        let spec = FilterSpec {
            exact: vec![("status".into(), FilterValue::coerce("true"))],
            ..FilterSpec::default()
        };

        assert_eq!(clauses(compile_filter(&spec)), vec![Filter::eq("status", true)]);
    }

    #[test]
    fn where_object_beats_where_beats_like() {
        let spec = FilterSpec {
            like: vec![("owner".into(), "bob".into()), ("name".into(), "lamp".into())],
            exact: vec![("owner".into(), FilterValue::coerce("bob")), ("name".into(), FilterValue::coerce("desk"))],
            references: vec![("owner".into(), FilterValue::Identifier(oid()))],
        };

        let compiled = clauses(compile_filter(&spec));

        assert_eq!(
            compiled,
            vec![
                Filter::eq("owner", oid()),
                Filter::eq("name", "desk"),
            ]
        );
    }

    #[test]
    fn identifier_values_are_native_identifiers() {
        let spec = FilterSpec {
            references: vec![("owner".into(), FilterValue::Identifier(oid()))],
            ..FilterSpec::default()
        };

        match &clauses(compile_filter(&spec))[0] {
            Expr::Field { op: FieldOp::Eq, value: Bson::ObjectId(id), .. } => assert_eq!(id.to_hex(), OID),
            other => panic!("unexpected clause {other:?}"),
        }
    }

    #[test]
    fn seed_collects_equalities_only() {
        let spec = FilterSpec {
            like: vec![("name".into(), "lamp".into())],
            exact: vec![("sku".into(), FilterValue::coerce("A-1"))],
            references: vec![("owner".into(), FilterValue::Identifier(oid()))],
        };

        let seed = equality_seed(&spec);
        assert_eq!(seed.get_str("sku").unwrap(), "A-1");
        assert!(seed.get_object_id("owner").is_ok());
        assert!(!seed.contains_key("name"));
    }
}
