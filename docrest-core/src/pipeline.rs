//! Aggregation pipelines as an ordered list of typed stages.
//!
//! A [`Pipeline`] is submitted to the store as one unit through
//! [`StoreBackend::aggregate`](crate::backend::StoreBackend::aggregate). The engine only
//! emits the typed stages (`Match`, `Sort`, `Skip`, `Limit`, `Project`); resource modules
//! may add their own store-native stages with [`Stage::Raw`].
//!
//! A pipeline is never submitted empty: [`Pipeline::ensure_non_empty`] substitutes a single
//! match-all stage.

use bson::Document;
use serde::{Deserialize, Serialize};

use crate::query::{Expr, Filter, Sort};

/// One stage of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keep the documents matching the expression.
    Match(Expr),
    /// Order documents by the given keys, first key most significant.
    Sort(Vec<Sort>),
    /// Drop the first `n` documents.
    Skip(u64),
    /// Keep at most `n` documents.
    Limit(u64),
    /// Keep only the listed fields (plus `_id`).
    Project(Vec<String>),
    /// A store-native stage, passed through untouched.
    Raw(Document),
}

impl Stage {
    /// A stage that matches every document.
    pub fn match_all() -> Self {
        Stage::Match(Filter::all())
    }
}

/// Options forwarded to the store with an aggregation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Allow the store to spill large aggregations to disk.
    pub allow_disk_use: bool,
}

/// An ordered sequence of aggregation stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Pipeline::default()
    }

    /// Creates a pipeline from existing stages, keeping their order.
    pub fn from_stages(stages: impl IntoIterator<Item = Stage>) -> Self {
        Pipeline { stages: stages.into_iter().collect() }
    }

    /// Appends a stage.
    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    /// Appends a stage, builder style.
    pub fn with(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stages_mut(&mut self) -> &mut Vec<Stage> {
        &mut self.stages
    }

    pub fn into_stages(self) -> Vec<Stage> {
        self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Substitutes a single match-all stage if the pipeline has no stages.
    pub fn ensure_non_empty(&mut self) {
        if self.stages.is_empty() {
            self.stages.push(Stage::match_all());
        }
    }
}

impl Extend<Stage> for Pipeline {
    fn extend<T: IntoIterator<Item = Stage>>(&mut self, iter: T) {
        self.stages.extend(iter);
    }
}

impl IntoIterator for Pipeline {
    type Item = Stage;
    type IntoIter = std::vec::IntoIter<Stage>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.into_iter()
    }
}
