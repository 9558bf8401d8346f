//! Per-instance state and the stage-facing context.
//!
//! `InstanceContext` is owned by exactly one coordinator. Stages never see it
//! directly: for the duration of one stage call they get a `StageContext`,
//! which lends out the procedure-defined state and collects queued calls and
//! terminal declarations.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error};
use uuid::Uuid;

use crate::types::{Table, Value};

use super::aggregator::ResponseAggregator;
use super::call::CallDescriptor;
use super::error::{EngineError, Result};
use super::outcome::{AppStatus, Outcome};

/// Unique id of one compound procedure invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Queue-time rules applied to every stage call.
#[derive(Debug, Clone)]
pub struct StageLimits {
    /// Maximum calls one stage invocation may queue.
    pub max_calls_per_stage: usize,
    /// Names of compound procedures; stages may not call these.
    pub compound_procedures: Arc<HashSet<String>>,
}

impl Default for StageLimits {
    fn default() -> Self {
        Self {
            max_calls_per_stage: crate::config::DEFAULT_MAX_CALLS_PER_STAGE,
            compound_procedures: Arc::new(HashSet::new()),
        }
    }
}

/// Mutable state of one instance.
pub struct InstanceContext<S> {
    instance_id: InstanceId,
    procedure: String,
    params: Vec<Value>,
    current_stage: usize,
    pub(crate) aggregator: ResponseAggregator,
    terminal_outcome: Option<Outcome>,
    app_status: AppStatus,
    state: S,
}

impl<S> InstanceContext<S> {
    pub fn new(procedure: impl Into<String>, params: Vec<Value>, state: S) -> Self {
        Self {
            instance_id: InstanceId::new(),
            procedure: procedure.into(),
            params,
            current_stage: 0,
            aggregator: ResponseAggregator::new(),
            terminal_outcome: None,
            app_status: AppStatus::default(),
            state,
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn current_stage(&self) -> usize {
        self.current_stage
    }

    /// Calls of the in-flight stage still waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.aggregator.pending()
    }

    pub fn terminal_outcome(&self) -> Option<&Outcome> {
        self.terminal_outcome.as_ref()
    }

    pub fn app_status(&self) -> &AppStatus {
        &self.app_status
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Move to the next stage. Stage indexes only ever grow by one.
    pub(crate) fn advance_stage(&mut self) -> usize {
        self.current_stage += 1;
        self.current_stage
    }

    /// Record the terminal outcome. The first declaration wins.
    pub(crate) fn declare(&mut self, outcome: Outcome) -> Result<()> {
        if self.terminal_outcome.is_some() {
            return Err(EngineError::DoubleTermination);
        }
        self.terminal_outcome = Some(outcome);
        Ok(())
    }

    /// Drop a declared outcome so an internal termination can replace it.
    pub(crate) fn retract_outcome(&mut self) -> Option<Outcome> {
        self.terminal_outcome.take()
    }

    pub(crate) fn take_app_status(&mut self) -> AppStatus {
        std::mem::take(&mut self.app_status)
    }
}

/// What one stage call produced.
#[derive(Debug)]
pub(crate) struct StageReport {
    pub queued: Vec<CallDescriptor>,
    pub declared: bool,
    pub violation: Option<EngineError>,
}

/// Interface handed to a stage body for the duration of one call.
pub struct StageContext<'a, S> {
    instance: &'a mut InstanceContext<S>,
    limits: &'a StageLimits,
    queued: Vec<CallDescriptor>,
    declared: bool,
    violation: Option<EngineError>,
}

impl<'a, S> StageContext<'a, S> {
    pub(crate) fn new(instance: &'a mut InstanceContext<S>, limits: &'a StageLimits) -> Self {
        Self {
            instance,
            limits,
            queued: Vec::new(),
            declared: false,
            violation: None,
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance.instance_id
    }

    pub fn procedure(&self) -> &str {
        &self.instance.procedure
    }

    pub fn stage_index(&self) -> usize {
        self.instance.current_stage
    }

    /// Client arguments, already coerced to the declared parameter types.
    pub fn params(&self) -> &[Value] {
        &self.instance.params
    }

    /// Procedure-defined state carried across stages.
    pub fn state(&self) -> &S {
        &self.instance.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.instance.state
    }

    /// Number of calls queued so far in this stage call.
    pub fn queued_calls(&self) -> usize {
        self.queued.len()
    }

    /// Queue a sub-procedure call. Its response is delivered to the next stage
    /// at the position matching the order of `queue_call` invocations.
    pub fn queue_call(&mut self, procedure: impl Into<String>, args: Vec<Value>) -> Result<()> {
        let procedure = procedure.into();

        if self.limits.compound_procedures.contains(&procedure) {
            return Err(self.violate(EngineError::NestedCompoundCall(procedure)));
        }
        if self.queued.len() >= self.limits.max_calls_per_stage {
            return Err(self.violate(EngineError::TooManyCalls {
                limit: self.limits.max_calls_per_stage,
            }));
        }

        let call = CallDescriptor::new(procedure, args);
        debug!(
            instance_id = %self.instance.instance_id,
            stage = self.instance.current_stage,
            position = self.queued.len(),
            %call,
            "Queued procedure call"
        );
        self.queued.push(call);
        Ok(())
    }

    /// Declare successful completion with `result` as the client-visible table.
    pub fn complete(&mut self, result: Table) -> Result<()> {
        self.terminate(Outcome::Complete(result))
    }

    /// Declare a user abort; `message` reaches the client verbatim.
    pub fn abort(&mut self, message: impl Into<String>) -> Result<()> {
        self.terminate(Outcome::Abort(message.into()))
    }

    /// Application status code returned alongside the final response.
    pub fn set_app_status_code(&mut self, code: u8) {
        self.instance.app_status.code = Some(code);
    }

    /// Application status string returned alongside the final response.
    pub fn set_app_status_string(&mut self, message: impl Into<String>) {
        self.instance.app_status.message = Some(message.into());
    }

    fn terminate(&mut self, outcome: Outcome) -> Result<()> {
        match self.instance.declare(outcome) {
            Ok(()) => {
                self.declared = true;
                Ok(())
            }
            Err(e) => {
                error!(
                    instance_id = %self.instance.instance_id,
                    stage = self.instance.current_stage,
                    "Outcome declared twice, keeping the first"
                );
                Err(e)
            }
        }
    }

    fn violate(&mut self, err: EngineError) -> EngineError {
        if self.violation.is_none() {
            self.violation = Some(err.clone());
        }
        err
    }

    pub(crate) fn into_report(self) -> StageReport {
        StageReport {
            queued: self.queued,
            declared: self.declared,
            violation: self.violation,
        }
    }
}
