//! Main document store interface.
//!
//! - [`DocumentStore`] - Store bound to a specific backend implementation
//! - [`DynDocumentStore`] - Store over a boxed backend for runtime backend selection
//!
//! # Example
//!
//! ```ignore
//! use docrest_core::{resource::ResourceConfig, store::DocumentStore};
//!
//! let store = DocumentStore::new(backend);
//! let users = store.resource(ResourceConfig::new("users"))?;
//! ```

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    error::DocumentStoreResult,
    resource::{Resource, ResourceConfig},
};

/// A document store bound to a specific backend implementation.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

/// A document store whose backend is chosen at runtime.
pub type DynDocumentStore = DocumentStore<Box<dyn DynStoreBackend>>;

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Registers a resource and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDocument`](crate::error::DocumentStoreError::InvalidDocument) if the
    /// registration is malformed (see [`ResourceConfig::validate`]).
    pub fn resource(&self, config: ResourceConfig) -> DocumentStoreResult<Resource<'_, B>> {
        config.validate()?;

        tracing::debug!(
            resource = %config.name,
            relations = config.relations.len(),
            searchable = config.searchable.len(),
            "registered resource"
        );

        Ok(Resource::new(config, &self.backend))
    }

    /// Shuts down the store and releases backend resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown operation fails.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await?;

        Ok(())
    }
}

impl<B: StoreBackend + 'static> DocumentStore<B> {
    /// Erases the backend type.
    pub fn into_dyn(self) -> DynDocumentStore {
        DocumentStore::new(Box::new(self.backend))
    }
}

impl DynDocumentStore {
    /// Returns the backend as `B` if that is its concrete type.
    pub fn downcast_backend<B: StoreBackend + 'static>(&self) -> Option<&B> {
        DynStoreBackend::as_any(&*self.backend).downcast_ref::<B>()
    }
}
