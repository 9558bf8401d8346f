//! Stage pipelines.
//!
//! A pipeline is an ordered, immutable list of named stage handlers built with
//! `StagePipeline::new_stage_list(..).then(..).build()`. Pipelines hold no
//! per-instance state and clone cheaply, so one definition can be shared by
//! every concurrent instance of a procedure type.

use std::fmt;
use std::sync::Arc;

use super::aggregator::ResponseSet;
use super::context::StageContext;
use super::error::{EngineError, Result, StageResult};

/// One unit of stage logic.
///
/// Receives the previous stage's responses in issuance order. May queue calls
/// and may declare one outcome through the context. Must not block.
pub trait StageHandler<S>: Send + Sync {
    fn handle(&self, ctx: &mut StageContext<'_, S>, responses: &ResponseSet) -> StageResult;
}

impl<S, F> StageHandler<S> for F
where
    F: Fn(&mut StageContext<'_, S>, &ResponseSet) -> StageResult + Send + Sync,
{
    fn handle(&self, ctx: &mut StageContext<'_, S>, responses: &ResponseSet) -> StageResult {
        self(ctx, responses)
    }
}

struct Stage<S> {
    name: String,
    handler: Box<dyn StageHandler<S>>,
}

/// Ordered, non-empty, immutable list of stage handlers.
pub struct StagePipeline<S> {
    stages: Arc<[Stage<S>]>,
}

impl<S> Clone for StagePipeline<S> {
    fn clone(&self) -> Self {
        Self {
            stages: Arc::clone(&self.stages),
        }
    }
}

impl<S: 'static> StagePipeline<S> {
    /// Start a stage list seeded with the entry stage.
    pub fn new_stage_list<H>(name: impl Into<String>, entry: H) -> StageListBuilder<S>
    where
        H: StageHandler<S> + 'static,
    {
        StageListBuilder::new().then(name, entry)
    }

    /// Start an empty stage list.
    pub fn builder() -> StageListBuilder<S> {
        StageListBuilder::new()
    }
}

impl<S> StagePipeline<S> {
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false for a built pipeline; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Name of the stage at `index`.
    pub fn stage_name(&self, index: usize) -> Option<&str> {
        self.stages.get(index).map(|s| s.name.as_str())
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name.as_str())
    }

    pub(crate) fn handler(&self, index: usize) -> Option<&dyn StageHandler<S>> {
        self.stages.get(index).map(|s| s.handler.as_ref())
    }
}

impl<S> fmt::Debug for StagePipeline<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}

/// Single-use builder for a `StagePipeline`.
///
/// `then` and `build` take the builder by value, so a builder cannot be
/// extended or built again once `build` has run.
pub struct StageListBuilder<S> {
    stages: Vec<Stage<S>>,
}

impl<S: 'static> StageListBuilder<S> {
    fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage.
    pub fn then<H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: StageHandler<S> + 'static,
    {
        self.stages.push(Stage {
            name: name.into(),
            handler: Box::new(handler),
        });
        self
    }

    /// Freeze the stage list.
    pub fn build(self) -> Result<StagePipeline<S>> {
        if self.stages.is_empty() {
            return Err(EngineError::InvalidPipeline(
                "pipeline must contain at least one stage".to_string(),
            ));
        }
        Ok(StagePipeline {
            stages: self.stages.into(),
        })
    }
}
