//! HTTP binding for `axum`.
//!
//! Operation outcomes become responses through [`Reply`]: the envelope's `code` is the
//! status and the envelope is the JSON body, for successes and failures alike. Failures
//! are logged here, once.
//!
//! ```ignore
//! use axum::{extract::{Path, Query, State}, routing::get, Router};
//! use docrest::{http::{Reply, parse_request}, prelude::*};
//!
//! async fn get_product(
//!     State(app): State<AppState>,
//!     Path(id): Path<String>,
//!     Query(pairs): Query<Vec<(String, String)>>,
//! ) -> Reply {
//!     let call = Call::new();
//!     match parse_request(Some(id), pairs, None) {
//!         Ok(request) => app.products().get_one_by_id(request, &call).await.into(),
//!         Err(error) => Reply::rejected(error, &call),
//!     }
//! }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bson::Bson;
use serde_json::{Map, Value};

use docrest_core::{
    descriptor::{QueryDescriptor, Request},
    envelope::{Envelope, Outcome},
    error::{EngineError, EngineResult, ErrorKind},
    options::Call,
};

/// An operation outcome ready to be written as an HTTP response.
#[derive(Debug)]
pub struct Reply(pub Outcome);

impl Reply {
    /// A reply for an error raised before the operation ran, such as a malformed query.
    pub fn rejected(error: EngineError, call: &Call) -> Self {
        Reply(Err(call.fail(error)))
    }
}

impl From<Outcome> for Reply {
    fn from(outcome: Outcome) -> Self {
        Reply(outcome)
    }
}

/// Builds a [`Request`] from a path identifier, raw query-string pairs and a JSON body.
pub fn parse_request(id: Option<String>, pairs: Vec<(String, String)>, body: Option<&Value>) -> EngineResult<Request> {
    let query = QueryDescriptor::from_pairs(pairs)?;
    let request = Request::from_json(id, &Value::Null, body)?;

    Ok(request.with_query(query))
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let envelope = match self.0 {
            Ok(envelope) => envelope,
            Err(failure) => {
                match failure.kind() {
                    ErrorKind::Execution => tracing::error!(code = failure.code, error = %failure.error, "operation failed"),
                    _ => tracing::warn!(code = failure.code, error = %failure.error, "operation rejected"),
                }
                failure.into_envelope()
            }
        };

        let status = StatusCode::from_u16(envelope.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match envelope_json(envelope) {
            Ok(body) => (status, Json(body)).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize envelope");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

fn envelope_json(mut envelope: Envelope) -> Result<Value, serde_json::Error> {
    let data = std::mem::replace(&mut envelope.data, Bson::Null);
    let mut body = serde_json::to_value(&envelope)?;

    if let Value::Object(map) = &mut body {
        map.insert("data".to_string(), plain_json(data));
    }

    Ok(body)
}

/// Converts BSON into plain JSON: identifiers become hex strings and dates RFC 3339
/// strings.
fn plain_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(date) => date
            .try_to_rfc3339_string()
            .map(Value::String)
            .unwrap_or_else(|_| Value::from(date.timestamp_millis())),
        Bson::Document(document) => Value::Object(
            document
                .into_iter()
                .map(|(key, value)| (key, plain_json(value)))
                .collect::<Map<_, _>>(),
        ),
        Bson::Array(items) => Value::Array(items.into_iter().map(plain_json).collect()),
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(n) => Value::from(n),
        Bson::Int64(n) => Value::from(n),
        Bson::Double(n) => serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s),
        other => Value::String(other.to_string()),
    }
}
