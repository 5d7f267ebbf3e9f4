//! Request-side parameters: the query descriptor, the tabular descriptor and the
//! inbound [`Request`] every operation receives.
//!
//! Transport layers hand over loosely-typed JSON (or flat `key[sub]=value` pairs from a
//! query string). Everything is parsed here, once, into closed types. Filter values in
//! particular are narrowed to [`FilterValue`]; any other shape is rejected with an
//! [`EngineError::Execution`] before a store is touched.

use bson::{Bson, oid::ObjectId, ser::serialize_to_bson};
use serde_json::{Map, Value};

use crate::{
    error::{EngineError, EngineResult},
    filter::parse_identifier,
    page::PaginationParams,
    populate::{PopulateSpec, resolve_projection},
    query::{Sort, SortDirection},
};

/// A single filter value after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Identifier(ObjectId),
}

impl FilterValue {
    /// Coerces a raw transport string.
    ///
    /// `"true"` and `"false"` become booleans, anything that parses to a finite number
    /// becomes a number, everything else stays a string.
    pub fn coerce(raw: &str) -> Self {
        match raw {
            "true" => return FilterValue::Boolean(true),
            "false" => return FilterValue::Boolean(false),
            _ => {}
        }

        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(number) if !trimmed.is_empty() && number.is_finite() => FilterValue::Number(number),
            _ => FilterValue::String(raw.to_string()),
        }
    }

    /// Narrows a JSON value to a filter value. Arrays, objects and nulls are rejected.
    pub fn from_json(key: &str, value: &Value) -> EngineResult<Self> {
        match value {
            Value::String(s) => Ok(Self::coerce(s)),
            Value::Bool(b) => Ok(FilterValue::Boolean(*b)),
            Value::Number(n) => n
                .as_f64()
                .map(FilterValue::Number)
                .ok_or_else(|| EngineError::execution(format!("unsupported number for `{key}`"))),
            _ => Err(EngineError::execution(format!(
                "unsupported filter value for `{key}`: expected a string, number or boolean"
            ))),
        }
    }

    pub fn to_bson(&self) -> Bson {
        match self {
            FilterValue::String(s) => Bson::String(s.clone()),
            FilterValue::Boolean(b) => Bson::Boolean(*b),
            FilterValue::Identifier(id) => Bson::ObjectId(*id),
            FilterValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                    Bson::Int64(*n as i64)
                } else {
                    Bson::Double(*n)
                }
            }
        }
    }
}

/// The three filter maps of a query descriptor, in the order they were received.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    /// `where`: exact-match clauses.
    pub exact: Vec<(String, FilterValue)>,
    /// `like`: case-insensitive substring clauses.
    pub like: Vec<(String, String)>,
    /// `whereObject`: identifier-equality clauses, always [`FilterValue::Identifier`].
    pub references: Vec<(String, FilterValue)>,
}

impl FilterSpec {
    /// Reads `where`, `like` and `whereObject` from an object.
    pub fn from_json(value: &Value) -> EngineResult<Self> {
        let exact = entries(value.get("where"), "where")?
            .into_iter()
            .map(|(key, value)| FilterValue::from_json(&key, &value).map(|value| (key, value)))
            .collect::<EngineResult<Vec<_>>>()?;

        let like = entries(value.get("like"), "like")?
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => Ok((key, s)),
                Value::Number(n) => Ok((key, n.to_string())),
                Value::Bool(b) => Ok((key, b.to_string())),
                _ => Err(EngineError::execution(format!("unsupported like value for `{key}`"))),
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let references = entries(value.get("whereObject"), "whereObject")?
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => {
                    parse_identifier(&key, &s).map(|id| (key, FilterValue::Identifier(id)))
                }
                _ => Err(EngineError::execution(format!("invalid identifier for `{key}`"))),
            })
            .collect::<EngineResult<Vec<_>>>()?;

        Ok(FilterSpec { exact, like, references })
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.like.is_empty() && self.references.is_empty()
    }
}

/// The recognized request-side parameters of read operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDescriptor {
    pub filter: FilterSpec,
    /// Fields to return; `None` returns every field.
    pub select: Option<Vec<String>>,
    pub sort: Vec<Sort>,
    pub paginate: Option<PaginationParams>,
    pub populate: PopulateSpec,
}

impl QueryDescriptor {
    /// Parses a nested JSON descriptor such as
    /// `{"where": {"status": "true"}, "paginate": {"page": 1, "limit": 10}}`.
    ///
    /// Unknown keys are ignored.
    pub fn from_json(value: &Value) -> EngineResult<Self> {
        if !(value.is_object() || value.is_null()) {
            return Err(EngineError::execution("query must be an object"));
        }

        let sort = entries(value.get("sort"), "sort")?
            .into_iter()
            .map(|(field, direction)| Sort::new(field, SortDirection::parse(&direction)))
            .collect();

        Ok(QueryDescriptor {
            filter: FilterSpec::from_json(value)?,
            select: value.get("select").and_then(resolve_projection),
            sort,
            paginate: pagination(value.get("paginate"))?,
            populate: value
                .get("populate")
                .map(PopulateSpec::parse)
                .unwrap_or_default(),
        })
    }

    /// Parses flat transport pairs such as `where[status]=true` or `paginate[page]=2`.
    ///
    /// `key[]=value` pairs accumulate into an array and `a[b][c]` addresses the dotted
    /// field `b.c` inside `a`.
    pub fn from_pairs<I, K, V>(pairs: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut root = Map::new();

        for (key, value) in pairs {
            let value = Value::String(value.into());

            match key.as_ref().split_once('[') {
                None => {
                    root.insert(key.as_ref().to_string(), value);
                }
                Some((head, rest)) => {
                    let inner = rest
                        .strip_suffix(']')
                        .unwrap_or(rest)
                        .replace("][", ".");

                    if inner.is_empty() {
                        let slot = root
                            .entry(head.to_string())
                            .or_insert_with(|| Value::Array(Vec::new()));
                        if !slot.is_array() {
                            *slot = Value::Array(vec![slot.take()]);
                        }
                        if let Value::Array(items) = slot {
                            items.push(value);
                        }
                    } else {
                        let slot = root
                            .entry(head.to_string())
                            .or_insert_with(|| Value::Object(Map::new()));
                        if !slot.is_object() {
                            *slot = Value::Object(Map::new());
                        }
                        if let Value::Object(map) = slot {
                            map.insert(inner, value);
                        }
                    }
                }
            }
        }

        Self::from_json(&Value::Object(root))
    }
}

/// One column of a tabular request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Column {
    /// The field the column displays.
    pub data: String,
    /// The column's own search text; empty when the column is not searched.
    pub search: String,
}

/// One entry of a tabular request's ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnOrder {
    /// Index into the column list.
    pub column: usize,
    /// `"desc"` (any case) sorts descending, anything else ascending.
    pub dir: String,
}

impl ColumnOrder {
    pub fn direction(&self) -> SortDirection {
        if self.dir.trim().eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }
}

/// The grid-oriented part of a tabular request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableQuery {
    pub columns: Vec<Column>,
    pub order: Vec<ColumnOrder>,
    /// Global free-text search.
    pub search: Option<String>,
    pub start: u64,
    pub length: u64,
}

impl TableQuery {
    /// Reads `columns`, `order`, `search.value`, `start` and `length` from a request body.
    pub fn from_json(body: &Value) -> Self {
        let columns = body
            .get("columns")
            .and_then(Value::as_array)
            .map(|columns| {
                columns
                    .iter()
                    .map(|column| Column {
                        data: column
                            .get("data")
                            .and_then(scalar_text)
                            .unwrap_or_default(),
                        search: column
                            .get("search")
                            .and_then(|search| search.get("value"))
                            .and_then(scalar_text)
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let order = body
            .get("order")
            .and_then(Value::as_array)
            .map(|order| {
                order
                    .iter()
                    .filter_map(|entry| {
                        Some(ColumnOrder {
                            column: entry.get("column").and_then(as_u64)? as usize,
                            dir: entry
                                .get("dir")
                                .and_then(scalar_text)
                                .unwrap_or_else(|| "asc".to_string()),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let search = match body.get("search") {
            Some(Value::Object(search)) => search.get("value").and_then(scalar_text),
            Some(other) => scalar_text(other),
            None => None,
        };

        TableQuery {
            columns,
            order,
            search: search.filter(|text| !text.trim().is_empty()),
            start: body.get("start").and_then(as_u64).unwrap_or(0),
            length: body.get("length").and_then(as_u64).unwrap_or(0),
        }
    }
}

/// The inbound request handed to every operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    /// Path identifier for by-id operations.
    pub id: Option<String>,
    pub query: QueryDescriptor,
    /// Grid parameters; only read by the tabular aggregate.
    pub table: TableQuery,
    /// Candidate document, patch, or list/map of candidates for writes.
    pub body: Bson,
}

impl Request {
    pub fn new() -> Self {
        Request::default()
    }

    /// Builds a request from the pieces a transport extracts.
    pub fn from_json(id: Option<String>, query: &Value, body: Option<&Value>) -> EngineResult<Self> {
        Ok(Request {
            id,
            query: QueryDescriptor::from_json(query)?,
            table: TableQuery::default(),
            body: match body {
                Some(body) => json_to_bson(body)?,
                None => Bson::Null,
            },
        })
    }

    /// Builds a tabular request, reading filter maps and grid parameters from the body.
    pub fn tabular(body: &Value) -> EngineResult<Self> {
        Ok(Request {
            id: None,
            query: QueryDescriptor {
                filter: FilterSpec::from_json(body)?,
                ..QueryDescriptor::default()
            },
            table: TableQuery::from_json(body),
            body: json_to_bson(body)?,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_query(mut self, query: QueryDescriptor) -> Self {
        self.query = query;
        self
    }

    pub fn with_table(mut self, table: TableQuery) -> Self {
        self.table = table;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bson>) -> Self {
        self.body = body.into();
        self
    }
}

pub(crate) fn json_to_bson(value: &Value) -> EngineResult<Bson> {
    Ok(serialize_to_bson(value)?)
}

fn entries(value: Option<&Value>, name: &str) -> EngineResult<Vec<(String, Value)>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(map)) => Ok(map
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()),
        // Query strings sometimes carry the map JSON-encoded.
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Vec::new()),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
            _ => Err(EngineError::execution(format!("`{name}` must be an object"))),
        },
        Some(_) => Err(EngineError::execution(format!("`{name}` must be an object"))),
    }
}

fn pagination(value: Option<&Value>) -> EngineResult<Option<PaginationParams>> {
    let fields = entries(value, "paginate")?;
    let field = |name: &str| {
        fields
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| as_u64(value))
    };

    Ok(match field("limit") {
        Some(limit) if limit > 0 => Some(PaginationParams::new(field("page").unwrap_or(1), limit)),
        _ => None,
    })
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
