//! Staged execution of compound procedures.
//!
//! A compound procedure is an ordered pipeline of stages. Each stage may queue
//! sub-procedure calls; the responses to those calls are the input of the next
//! stage. The final stage (or any earlier one) declares the outcome.
//!
//! The pieces, bottom-up:
//! - `call` / `aggregator`: call descriptors and per-stage response collection
//! - `pipeline`: immutable, shareable stage lists
//! - `context`: per-instance state and the stage-facing API
//! - `coordinator`: the per-instance state machine
//! - `registry`: live instances, keyed by id, for response routing
//! - `outcome`: terminal outcomes and their client rendering

pub mod aggregator;
pub mod call;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod outcome;
pub mod pipeline;
pub mod registry;

pub use aggregator::{ResponseAggregator, ResponseSet};
pub use call::CallDescriptor;
pub use context::{InstanceContext, InstanceId, StageContext, StageLimits};
pub use coordinator::{ActiveInstance, Coordinator, CoordinatorState, Step};
pub use error::{EngineError, Result, StageError, StageResult};
pub use outcome::{AppStatus, ClientResponse, ClientStatus, Outcome, Termination, TerminationCause};
pub use pipeline::{StageHandler, StageListBuilder, StagePipeline};
pub use registry::{InstanceEntry, InstanceRegistry};
