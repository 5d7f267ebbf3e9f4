//! Filter expressions and find queries understood by every store backend.
//!
//! The engine never builds backend-native filters directly. It builds an [`Expr`] tree,
//! and each backend walks that tree with a [`QueryVisitor`] to produce its own form
//! (a BSON filter document for MongoDB, a predicate for the in-memory store).
//!
//! The vocabulary is deliberately small:
//!
//! - `eq` - exact equality (strings, numbers, booleans, identifiers)
//! - `contains` - case-insensitive substring match on the string form of a field
//! - `any_of` - membership of the field value in a list (used to fetch populated relations)
//! - `and` / `or` - conjunction and disjunction of the above
//!
//! # Example
//!
//! ```ignore
//! use docrest_core::query::{Filter, Query, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::and([Filter::eq("status", true), Filter::contains("name", "ali")]))
//!     .sort("createdAt", SortDirection::Desc)
//!     .limit(10)
//!     .build();
//! ```

use bson::Bson;

use crate::error::DocumentStoreError;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// Interprets a loosely-typed direction value.
    ///
    /// Negative numbers and the strings `desc`, `descending` and `-1` (in any case) are
    /// descending. Everything else is ascending.
    pub fn parse(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) if n.as_f64().is_some_and(|n| n < 0.0) => SortDirection::Desc,
            serde_json::Value::String(s) => Self::parse_str(s),
            _ => SortDirection::Asc,
        }
    }

    /// String form of [`SortDirection::parse`].
    pub fn parse_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "desc" | "descending" | "-1" => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    /// The numeric form used by document stores (`1` or `-1`).
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Sort { field: field.into(), direction }
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// Case-insensitive substring match. The value is literal text, not a pattern.
    Contains,
    /// The field equals one of the values in an array.
    AnyOf,
}

/// A filter expression for querying documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions. An empty list matches every document.
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Field comparison expression.
    Field {
        /// The field name to compare. Dotted paths address nested fields.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Returns `true` if this expression matches every document.
    pub fn is_match_all(&self) -> bool {
        matches!(self, Expr::And(list) if list.is_empty())
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }
}

/// A find query: filter, projection, sort and window.
///
/// Use [`QueryBuilder`] for ergonomic construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Optional filter expression to match documents.
    pub filter: Option<Expr>,
    /// Fields to return. `None` returns whole documents; `_id` is always kept.
    pub select: Option<Vec<String>>,
    /// Sort keys, applied in order.
    pub sort: Vec<Sort>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of documents to skip (for pagination).
    pub offset: Option<usize>,
}

impl Query {
    /// Creates a new empty query that returns every document.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Helper struct for constructing filter expressions.
pub struct Filter;

impl Filter {
    /// Matches every document.
    pub fn all() -> Expr {
        Expr::And(Vec::new())
    }

    /// Matches documents where the field equals the specified value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents whose field contains `text`, ignoring case.
    pub fn contains(field: impl Into<String>, text: impl Into<String>) -> Expr {
        Expr::field(field.into(), FieldOp::Contains, Bson::String(text.into()))
    }

    /// Matches documents whose field equals any of `values`.
    pub fn any_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::AnyOf,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Combines multiple expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Combines multiple expressions such that any can match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter expression for this query.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Restricts the returned fields. An empty list is the same as no restriction.
    pub fn select(mut self, fields: Option<Vec<String>>) -> Self {
        self.query.select = fields.filter(|fields| !fields.is_empty());
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the number of documents to skip (for pagination).
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Appends a sort key.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort::new(field, direction));
        self
    }

    /// Appends several sort keys, keeping their order.
    pub fn sorts(mut self, sorts: impl IntoIterator<Item = Sort>) -> Self {
        self.query.sort.extend(sorts);
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}
