//! Request hooks: an ordered list of named stages a resource module attaches to a call.
//!
//! Every hook may act at three points:
//!
//! - `pre` sees the inbound [`Request`] and, on aggregation paths, the initial pipeline
//!   before anything is compiled.
//! - `mid` sees the compiled raw-aggregate pipeline right before it is executed.
//! - `post` sees the result payload before it is placed into the envelope.
//!
//! Hooks run in registration order and are awaited one after another. The first hook
//! that returns an error aborts the operation with that error.
//!
//! # Example
//!
//! ```ignore
//! use docrest_core::{hooks::Hooks, pipeline::Stage, query::Filter};
//!
//! let hooks = Hooks::new()
//!     .pre_fn("tenant-scope", |_request, pipeline| {
//!         pipeline.push(Stage::Match(Filter::eq("tenant", "acme")));
//!         Ok(())
//!     })
//!     .post_fn("strip-secrets", |result| {
//!         if let Some(doc) = result.as_document_mut() {
//!             doc.remove("password");
//!         }
//!         Ok(())
//!     });
//! ```

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use bson::Bson;

use crate::{descriptor::Request, error::EngineResult, pipeline::Pipeline};

/// A named request hook. Every method defaults to a no-op.
#[async_trait]
pub trait Hook: Send + Sync {
    /// A name used in logs.
    fn name(&self) -> &str;

    async fn pre(&self, _request: &mut Request, _pipeline: &mut Pipeline) -> EngineResult<()> {
        Ok(())
    }

    async fn mid(&self, _pipeline: &mut Pipeline) -> EngineResult<()> {
        Ok(())
    }

    async fn post(&self, _result: &mut Bson) -> EngineResult<()> {
        Ok(())
    }
}

/// The ordered hook list of one call.
#[derive(Clone, Default)]
pub struct Hooks {
    stages: Vec<Arc<dyn Hook>>,
}

impl Hooks {
    pub fn new() -> Self {
        Hooks::default()
    }

    /// Appends a hook.
    pub fn with(mut self, hook: impl Hook + 'static) -> Self {
        self.stages.push(Arc::new(hook));
        self
    }

    /// Appends a synchronous pre hook.
    pub fn pre_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Request, &mut Pipeline) -> EngineResult<()> + Send + Sync + 'static,
    {
        self.with(FnHook { name: name.into(), point: HookPoint::Pre(Box::new(f)) })
    }

    /// Appends a synchronous mid hook.
    pub fn mid_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Pipeline) -> EngineResult<()> + Send + Sync + 'static,
    {
        self.with(FnHook { name: name.into(), point: HookPoint::Mid(Box::new(f)) })
    }

    /// Appends a synchronous post hook.
    pub fn post_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Bson) -> EngineResult<()> + Send + Sync + 'static,
    {
        self.with(FnHook { name: name.into(), point: HookPoint::Post(Box::new(f)) })
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|hook| hook.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub(crate) async fn run_pre(&self, request: &mut Request, pipeline: &mut Pipeline) -> EngineResult<()> {
        for hook in &self.stages {
            tracing::trace!(hook = hook.name(), "pre hook");
            hook.pre(request, pipeline).await?;
        }
        Ok(())
    }

    pub(crate) async fn run_mid(&self, pipeline: &mut Pipeline) -> EngineResult<()> {
        for hook in &self.stages {
            tracing::trace!(hook = hook.name(), "mid hook");
            hook.mid(pipeline).await?;
        }
        Ok(())
    }

    pub(crate) async fn run_post(&self, result: &mut Bson) -> EngineResult<()> {
        for hook in &self.stages {
            tracing::trace!(hook = hook.name(), "post hook");
            hook.post(result).await?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("stages", &self.names())
            .finish()
    }
}

type PreFn = dyn Fn(&mut Request, &mut Pipeline) -> EngineResult<()> + Send + Sync;
type MidFn = dyn Fn(&mut Pipeline) -> EngineResult<()> + Send + Sync;
type PostFn = dyn Fn(&mut Bson) -> EngineResult<()> + Send + Sync;

enum HookPoint {
    Pre(Box<PreFn>),
    Mid(Box<MidFn>),
    Post(Box<PostFn>),
}

struct FnHook {
    name: String,
    point: HookPoint,
}

#[async_trait]
impl Hook for FnHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn pre(&self, request: &mut Request, pipeline: &mut Pipeline) -> EngineResult<()> {
        match &self.point {
            HookPoint::Pre(f) => f(request, pipeline),
            _ => Ok(()),
        }
    }

    async fn mid(&self, pipeline: &mut Pipeline) -> EngineResult<()> {
        match &self.point {
            HookPoint::Mid(f) => f(pipeline),
            _ => Ok(()),
        }
    }

    async fn post(&self, result: &mut Bson) -> EngineResult<()> {
        match &self.point {
            HookPoint::Post(f) => f(result),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::EngineError, pipeline::Stage};

    #[tokio::test]
    async fn hooks_run_in_registration_order() {
        let hooks = Hooks::new()
            .post_fn("first", |result| {
                *result = Bson::String("a".into());
                Ok(())
            })
            .post_fn("second", |result| {
                if let Bson::String(s) = result {
                    s.push('b');
                }
                Ok(())
            });

        let mut result = Bson::Null;
        hooks.run_post(&mut result).await.unwrap();

        assert_eq!(result, Bson::String("ab".into()));
        assert_eq!(hooks.names(), ["first", "second"]);
    }

    #[tokio::test]
    async fn first_error_stops_the_chain() {
        let hooks = Hooks::new()
            .mid_fn("deny", |_pipeline| Err(EngineError::execution("denied")))
            .mid_fn("never", |pipeline| {
                pipeline.push(Stage::Limit(1));
                Ok(())
            });

        let mut pipeline = Pipeline::new();
        let err = hooks.run_mid(&mut pipeline).await.unwrap_err();

        assert_eq!(err.to_string(), "denied");
        assert!(pipeline.stages().is_empty());
    }

    #[tokio::test]
    async fn closures_only_act_at_their_own_point() {
        let hooks = Hooks::new().pre_fn("scope", |_request, pipeline| {
            pipeline.push(Stage::match_all());
            Ok(())
        });

        let mut pipeline = Pipeline::new();
        hooks.run_mid(&mut pipeline).await.unwrap();
        assert!(pipeline.stages().is_empty());

        hooks.run_pre(&mut Request::new(), &mut pipeline).await.unwrap();
        assert_eq!(pipeline.stages().len(), 1);
    }
}
