//! Resource handles.
//!
//! A [`Resource`] binds one collection's static registration ([`ResourceConfig`]) and
//! optional [`Validator`] to a backend. The operations in [`crate::operations`] are methods
//! on it.
//!
//! # Example
//!
//! ```ignore
//! use docrest_core::{resource::{Relation, ResourceConfig}, store::DocumentStore};
//!
//! let store = DocumentStore::new(backend);
//! let products = store.resource(
//!     ResourceConfig::new("products")
//!         .relation(Relation::new("owner", "users"))
//!         .searchable(["name", "sku"]),
//! )?;
//! ```

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    backend::StoreBackend,
    error::{DocumentStoreError, DocumentStoreResult},
    validate::Validator,
};

/// One entry of the population map: a relation field and the collection it references.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub field: String,
    pub target: String,
}

impl Relation {
    pub fn new(field: impl Into<String>, target: impl Into<String>) -> Self {
        Relation {
            field: field.into(),
            target: target.into(),
        }
    }
}

/// Static per-resource registration.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ResourceConfig {
    /// The collection name.
    pub name: String,
    /// The population map, in iteration order.
    pub relations: Vec<Relation>,
    /// Fields compared by the tabular global search.
    pub searchable: Vec<String>,
}

impl ResourceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        ResourceConfig {
            name: name.into(),
            ..ResourceConfig::default()
        }
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn searchable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Rejects empty names, empty or duplicate relation fields and empty search fields.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        let invalid = |message: String| Err(DocumentStoreError::InvalidDocument(message));

        if self.name.trim().is_empty() {
            return invalid("resource name must not be empty".to_string());
        }

        for (index, relation) in self.relations.iter().enumerate() {
            if relation.field.trim().is_empty() || relation.target.trim().is_empty() {
                return invalid(format!("{}: relation {index} has an empty field or target", self.name));
            }
            if self.relations[..index]
                .iter()
                .any(|other| other.field == relation.field)
            {
                return invalid(format!("{}: relation `{}` is registered twice", self.name, relation.field));
            }
        }

        if self
            .searchable
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return invalid(format!("{}: searchable fields must not be empty", self.name));
        }

        Ok(())
    }
}

/// A handle to one resource, borrowed from a [`DocumentStore`](crate::store::DocumentStore).
pub struct Resource<'a, B: StoreBackend> {
    pub(crate) config: ResourceConfig,
    pub(crate) backend: &'a B,
    pub(crate) validator: Option<Arc<dyn Validator>>,
}

impl<'a, B: StoreBackend> Resource<'a, B> {
    pub(crate) fn new(config: ResourceConfig, backend: &'a B) -> Self {
        Self {
            config,
            backend,
            validator: None,
        }
    }

    /// Attaches the validator consulted by write operations. Without one every candidate
    /// is accepted.
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Returns the collection name of this resource.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn relations(&self) -> &[Relation] {
        &self.config.relations
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }
}

impl<B: StoreBackend> fmt::Debug for Resource<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("config", &self.config)
            .field("backend", &self.backend)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_registration() {
        let config: ResourceConfig = serde_json::from_value(json!({
            "name": "products",
            "relations": [{ "field": "owner", "target": "users" }],
        }))
        .unwrap();

        assert_eq!(config.relations, vec![Relation::new("owner", "users")]);
        assert!(config.searchable.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_registrations() {
        assert!(ResourceConfig::new(" ").validate().is_err());

        let duplicated = ResourceConfig::new("products")
            .relation(Relation::new("owner", "users"))
            .relation(Relation::new("owner", "accounts"));
        assert!(duplicated.validate().is_err());

        let blank_target = ResourceConfig::new("products").relation(Relation::new("owner", ""));
        assert!(blank_target.validate().is_err());

        let blank_search = ResourceConfig::new("products").searchable([""]);
        assert!(blank_search.validate().is_err());
    }
}
