//! Per-call configuration supplied by the resource module.

use serde::{Deserialize, Serialize};

use crate::{
    envelope::{Envelope, Failure},
    error::{EngineError, ErrorKind},
    hooks::Hooks,
    pipeline::{AggregateOptions, Pipeline},
};

/// Status codes written for each outcome class.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct StatusCodes {
    pub success: u16,
    pub validation: u16,
    pub not_found: u16,
    pub error: u16,
}

impl Default for StatusCodes {
    fn default() -> Self {
        StatusCodes {
            success: 200,
            validation: 435,
            not_found: 404,
            error: 500,
        }
    }
}

impl StatusCodes {
    pub fn for_kind(&self, kind: ErrorKind) -> u16 {
        match kind {
            ErrorKind::Validation => self.validation,
            ErrorKind::NotFound => self.not_found,
            ErrorKind::Execution => self.error,
        }
    }
}

/// Options of one call.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct CallOptions {
    pub codes: StatusCodes,
    /// Apply each column's own search text in tabular aggregates.
    pub per_column_search: bool,
    /// Let the store spill large aggregations to disk.
    pub allow_disk_use: bool,
    /// Field stamped with the current time whenever a patch is applied.
    pub updated_at_field: Option<String>,
}

impl CallOptions {
    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions { allow_disk_use: self.allow_disk_use }
    }
}

/// Everything a resource module supplies with a call: options, hooks and the initial
/// pipeline stages of aggregation operations.
#[derive(Debug, Clone, Default)]
pub struct Call {
    pub options: CallOptions,
    pub hooks: Hooks,
    pub pipeline: Pipeline,
}

impl Call {
    pub fn new() -> Self {
        Call::default()
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub(crate) fn succeed(&self, message: &str, data: bson::Bson) -> Envelope {
        Envelope::success(self.options.codes.success, message, data)
    }

    /// Wraps an error with the status code configured for its kind.
    pub fn fail(&self, error: EngineError) -> Failure {
        Failure::new(self.options.codes.for_kind(error.kind()), error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_fill_missing_fields() {
        let options: CallOptions = serde_json::from_value(json!({
            "codes": { "validation": 422 },
            "updatedAtField": "updatedAt",
        }))
        .unwrap();

        assert_eq!(options.codes.validation, 422);
        assert_eq!(options.codes.not_found, 404);
        assert_eq!(options.codes.error, 500);
        assert!(!options.allow_disk_use);
        assert_eq!(options.updated_at_field.as_deref(), Some("updatedAt"));
    }

    #[test]
    fn kinds_map_to_codes() {
        let codes = StatusCodes::default();

        assert_eq!(codes.for_kind(ErrorKind::Validation), 435);
        assert_eq!(codes.for_kind(ErrorKind::NotFound), 404);
        assert_eq!(codes.for_kind(ErrorKind::Execution), 500);
    }
}
