//! The validation boundary used by write operations.
//!
//! The engine asks a [`Validator`] whether a candidate document is acceptable, telling it
//! whether the candidate is about to be created or is a patch for an existing document.
//! Schema format and rule vocabulary belong to the validator. [`FieldRules`] is a small
//! rule-based implementation; any `Fn(&Document, ValidationMode) -> Validation` closure
//! is a validator too.

use bson::{Bson, Document};
use regex::Regex;
use serde::Deserialize;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Whether the candidate is a new document or a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Create,
    Update,
}

/// The verdict of a validator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    pub success: bool,
    /// Rule violations, in rule order. Empty on success.
    pub messages: Vec<String>,
}

impl Validation {
    pub fn ok() -> Self {
        Validation { success: true, messages: Vec::new() }
    }

    pub fn failed(messages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Validation {
            success: false,
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }
}

pub trait Validator: Send + Sync {
    fn validate(&self, candidate: &Document, mode: ValidationMode) -> Validation;
}

impl<F> Validator for F
where
    F: Fn(&Document, ValidationMode) -> Validation + Send + Sync,
{
    fn validate(&self, candidate: &Document, mode: ValidationMode) -> Validation {
        self(candidate, mode)
    }
}

/// Constraints on one field. All constraints are optional.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldRule {
    /// Must be present and non-null when creating.
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    /// Strings must match this regular expression.
    pub pattern: Option<String>,
    /// The value must equal one of these.
    pub allowed: Option<Vec<Bson>>,
}

impl FieldRule {
    pub fn required() -> Self {
        FieldRule { required: true, ..FieldRule::default() }
    }
}

/// A rule-per-field validator.
///
/// In [`ValidationMode::Create`] every rule runs and required fields must be present. In
/// [`ValidationMode::Update`] only fields present in the patch are checked.
#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    rules: Vec<(String, FieldRule, Option<Regex>)>,
}

impl FieldRules {
    /// Compiles the rules. Fails if a pattern is not a valid regular expression.
    pub fn new(rules: impl IntoIterator<Item = (String, FieldRule)>) -> DocumentStoreResult<Self> {
        let rules = rules
            .into_iter()
            .map(|(field, rule)| {
                let pattern = rule
                    .pattern
                    .as_deref()
                    .map(Regex::new)
                    .transpose()
                    .map_err(|e| DocumentStoreError::InvalidDocument(format!("pattern for {field}: {e}")))?;
                Ok((field, rule, pattern))
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        Ok(FieldRules { rules })
    }

    fn check(field: &str, value: &Bson, rule: &FieldRule, pattern: Option<&Regex>, messages: &mut Vec<String>) {
        if let Bson::String(s) = value {
            let length = s.chars().count();

            if let Some(min) = rule.min_length.filter(|min| length < *min) {
                messages.push(format!("{field} must be at least {min} characters"));
            }
            if let Some(max) = rule.max_length.filter(|max| length > *max) {
                messages.push(format!("{field} must be at most {max} characters"));
            }
            if pattern.is_some_and(|pattern| !pattern.is_match(s)) {
                messages.push(format!("{field} does not match required pattern"));
            }
        }

        if let Some(n) = as_f64(value) {
            if let Some(min) = rule.minimum.filter(|min| n < *min) {
                messages.push(format!("{field} must be at least {min}"));
            }
            if let Some(max) = rule.maximum.filter(|max| n > *max) {
                messages.push(format!("{field} must be at most {max}"));
            }
        }

        if let Some(allowed) = &rule.allowed {
            if !allowed.iter().any(|candidate| loosely_equal(candidate, value)) {
                messages.push(format!("{field} is not an allowed value"));
            }
        }
    }
}

impl Validator for FieldRules {
    fn validate(&self, candidate: &Document, mode: ValidationMode) -> Validation {
        let mut messages = Vec::new();

        for (field, rule, pattern) in &self.rules {
            match candidate.get(field) {
                None | Some(Bson::Null) => {
                    if rule.required && mode == ValidationMode::Create {
                        messages.push(format!("{field} is required"));
                    }
                }
                Some(value) => Self::check(field, value, rule, pattern.as_ref(), &mut messages),
            }
        }

        if messages.is_empty() { Validation::ok() } else { Validation::failed(messages) }
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn loosely_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}
