//! Compound procedure catalog.
//!
//! A compound procedure type supplies its stage pipeline once, at
//! registration, plus an `init` that builds fresh per-instance state. The
//! catalog erases the state type so the engine can hold every procedure in a
//! single map and hand out `ActiveInstance` coordinators.

mod partitioning;

pub use partitioning::{Partitioning, ProcedureConfig};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::info;

use crate::orchestration::context::{InstanceContext, StageLimits};
use crate::orchestration::coordinator::{ActiveInstance, Coordinator};
use crate::orchestration::error::{EngineError, Result, StageError};
use crate::orchestration::pipeline::StagePipeline;
use crate::types::Value;

/// A compound procedure type.
pub trait CompoundProcedure: Send + Sync + 'static {
    /// Fields carried across the stages of one instance.
    type State: Send + 'static;

    /// Build the state for a new instance from the coerced client arguments.
    fn init(&self, params: &[Value]) -> std::result::Result<Self::State, StageError>;

    /// The stage list. Called once; the pipeline is shared by all instances.
    fn stages(&self) -> Result<StagePipeline<Self::State>>;
}

trait ProcedureFactory: Send + Sync {
    fn instantiate(
        &self,
        name: &str,
        params: Vec<Value>,
        limits: StageLimits,
    ) -> std::result::Result<Box<dyn ActiveInstance>, StageError>;

    fn stage_count(&self) -> usize;
}

struct Registered<P: CompoundProcedure> {
    procedure: P,
    pipeline: StagePipeline<P::State>,
}

impl<P: CompoundProcedure> ProcedureFactory for Registered<P> {
    fn instantiate(
        &self,
        name: &str,
        params: Vec<Value>,
        limits: StageLimits,
    ) -> std::result::Result<Box<dyn ActiveInstance>, StageError> {
        let state = self.procedure.init(&params)?;
        let context = InstanceContext::new(name, params, state);
        Ok(Box::new(Coordinator::new(
            self.pipeline.clone(),
            context,
            limits,
        )))
    }

    fn stage_count(&self) -> usize {
        self.pipeline.len()
    }
}

struct CatalogEntry {
    config: ProcedureConfig,
    factory: Box<dyn ProcedureFactory>,
}

/// Registered compound procedures, by name.
#[derive(Default)]
pub struct ProcedureCatalog {
    procedures: HashMap<String, CatalogEntry>,
    compound_names: Arc<HashSet<String>>,
}

impl ProcedureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compound procedure under `name`.
    ///
    /// Compound procedures are not bound to a partition, so `config` must be
    /// multi-partition. The pipeline is built here.
    pub fn register<P: CompoundProcedure>(
        &mut self,
        name: impl Into<String>,
        config: ProcedureConfig,
        procedure: P,
    ) -> Result<()> {
        let name = name.into();
        if self.procedures.contains_key(&name) {
            return Err(EngineError::InvalidConfig {
                procedure: name,
                message: "already registered".to_string(),
            });
        }
        config.validate(&name)?;
        if config.is_single_partition() {
            return Err(EngineError::InvalidConfig {
                procedure: name,
                message: "compound procedures must be multi-partition".to_string(),
            });
        }

        let pipeline = procedure.stages()?;
        info!(
            procedure = %name,
            stages = ?pipeline,
            parameters = config.parameters.len(),
            "Registered compound procedure"
        );

        Arc::make_mut(&mut self.compound_names).insert(name.clone());
        self.procedures.insert(
            name,
            CatalogEntry {
                config,
                factory: Box::new(Registered {
                    procedure,
                    pipeline,
                }),
            },
        );
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    pub fn config(&self, name: &str) -> Option<&ProcedureConfig> {
        self.procedures.get(name).map(|e| &e.config)
    }

    pub fn stage_count(&self, name: &str) -> Option<usize> {
        self.procedures.get(name).map(|e| e.factory.stage_count())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.procedures.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    /// Names stages may not call.
    pub fn compound_names(&self) -> Arc<HashSet<String>> {
        Arc::clone(&self.compound_names)
    }

    /// Look up `name` and coerce `args` to its declared parameter types.
    pub fn coerce_arguments(&self, name: &str, args: Vec<Value>) -> Result<Vec<Value>> {
        let entry = self
            .procedures
            .get(name)
            .ok_or_else(|| EngineError::ProcedureNotFound(name.to_string()))?;
        entry.config.coerce_arguments(name, args)
    }

    /// Create a coordinator for a new instance of `name`.
    pub(crate) fn instantiate(
        &self,
        name: &str,
        params: Vec<Value>,
        limits: StageLimits,
    ) -> std::result::Result<Box<dyn ActiveInstance>, StageError> {
        let entry = self
            .procedures
            .get(name)
            .ok_or_else(|| EngineError::ProcedureNotFound(name.to_string()))?;
        entry.factory.instantiate(name, params, limits)
    }
}
