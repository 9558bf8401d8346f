//! Per-instance stage state machine.
//!
//! `Coordinator` owns one instance's pipeline reference and context. It is
//! purely synchronous: `start` and `on_response` run stage handlers to
//! completion and return a `Step` telling the caller what to do next
//! (dispatch calls, wait, or deliver a termination). The engine drives it
//! from whichever task delivers a response, so the barrier between stages is
//! a continuation rather than a blocked thread.
//!
//! State flow: `Running(k)` → `AwaitingResponses(k, n)` → `Running(k+1)` → …
//! → `Terminated(outcome)`.

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, info, warn};

use crate::types::Response;
use crate::utils::panic::panic_message;

use super::aggregator::ResponseSet;
use super::call::CallDescriptor;
use super::context::{InstanceContext, InstanceId, StageContext, StageLimits};
use super::error::{EngineError, StageError};
use super::outcome::{Outcome, Termination};
use super::pipeline::StagePipeline;

/// Coordinator state.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorState {
    Running(usize),
    AwaitingResponses { stage: usize, expected: usize },
    Terminated(Outcome),
}

/// What the driver must do after a coordinator transition.
#[derive(Debug)]
pub enum Step {
    /// Dispatch `calls`; the response of `calls[i]` is delivered with position `i`.
    Dispatch {
        stage: usize,
        calls: Vec<CallDescriptor>,
    },
    /// Responses are still outstanding.
    Wait,
    /// The instance terminated; deliver this to the client boundary.
    Finished(Termination),
    /// The event did not apply (already terminated or already started).
    Ignored,
}

/// State machine for one compound procedure instance.
pub struct Coordinator<S> {
    pipeline: StagePipeline<S>,
    context: InstanceContext<S>,
    limits: StageLimits,
    state: CoordinatorState,
    started: bool,
}

impl<S> Coordinator<S> {
    pub fn new(pipeline: StagePipeline<S>, context: InstanceContext<S>, limits: StageLimits) -> Self {
        Self {
            pipeline,
            context,
            limits,
            state: CoordinatorState::Running(0),
            started: false,
        }
    }

    pub fn state(&self) -> &CoordinatorState {
        &self.state
    }

    pub fn context(&self) -> &InstanceContext<S> {
        &self.context
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state, CoordinatorState::Terminated(_))
    }

    /// Run the entry stage with an empty response set.
    pub fn start(&mut self) -> Step {
        if self.started {
            warn!(instance_id = %self.context.instance_id(), "Instance already started");
            return Step::Ignored;
        }
        if self.is_terminated() {
            debug!(instance_id = %self.context.instance_id(), "Instance expired before it started");
            return Step::Ignored;
        }
        self.started = true;
        self.run_stage(ResponseSet::empty())
    }

    /// Record the response of call `position` issued by `stage`.
    ///
    /// Runs the next stage once the last outstanding response arrives.
    pub fn on_response(&mut self, stage: usize, position: usize, response: Response) -> Step {
        if self.is_terminated() {
            debug!(
                instance_id = %self.context.instance_id(),
                stage,
                position,
                "Response arrived after termination, ignoring"
            );
            return Step::Ignored;
        }

        if let Err(e) = self.context.aggregator.deliver(stage, position, response) {
            error!(
                instance_id = %self.context.instance_id(),
                error = %e,
                "Response delivery failed"
            );
            return self.finish(Termination::internal(e));
        }

        if !self.context.aggregator.is_complete() {
            return Step::Wait;
        }

        let responses = match self.context.aggregator.drain() {
            Ok(responses) => responses,
            Err(e) => return self.finish(Termination::internal(e)),
        };

        let next = self.context.advance_stage();
        if next >= self.pipeline.len() {
            return self.finish(Termination::internal(EngineError::PipelineExhausted {
                stages: self.pipeline.len(),
            }));
        }
        self.state = CoordinatorState::Running(next);
        self.run_stage(responses)
    }

    /// Terminate because the procedure timeout expired.
    ///
    /// Returns `None` if the instance already terminated.
    pub fn expire(&mut self, millis: u64) -> Option<Termination> {
        if self.is_terminated() {
            return None;
        }
        warn!(
            procedure = %self.context.procedure(),
            instance_id = %self.context.instance_id(),
            stage = self.context.current_stage(),
            pending = self.context.pending_calls(),
            "Compound procedure timed out"
        );
        match self.finish(Termination::timed_out(millis)) {
            Step::Finished(termination) => Some(termination),
            _ => None,
        }
    }

    #[tracing::instrument(
        name = "compound.stage",
        skip_all,
        fields(procedure = %self.context.procedure(), instance_id = %self.context.instance_id(), stage = self.context.current_stage())
    )]
    fn run_stage(&mut self, responses: ResponseSet) -> Step {
        let stage = self.context.current_stage();
        let Some(handler) = self.pipeline.handler(stage) else {
            return self.finish(Termination::internal(EngineError::PipelineExhausted {
                stages: self.pipeline.len(),
            }));
        };

        debug!(
            stage_name = self.pipeline.stage_name(stage).unwrap_or_default(),
            inputs = responses.len(),
            "Running stage"
        );

        let mut ctx = StageContext::new(&mut self.context, &self.limits);
        let result = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&mut ctx, &responses)));
        let report = ctx.into_report();

        // A queue-time violation overrides any outcome the stage declared.
        if let Some(violation) = report.violation {
            if report.declared {
                warn!(error = %violation, "Discarding outcome declared after a call violation");
                self.context.retract_outcome();
            }
            return self.finish(Termination::internal(violation));
        }

        if report.declared {
            if !report.queued.is_empty() {
                warn!(
                    discarded = report.queued.len(),
                    "Outcome declared with calls still queued, discarding them"
                );
            }
            if let Err(e) = &result {
                error!(error = %panic_message(e.as_ref()), "Stage panicked after declaring an outcome");
            } else if let Ok(Err(e)) = &result {
                warn!(error = %e, "Stage returned an error after declaring an outcome");
            }
            let outcome = self
                .context
                .terminal_outcome()
                .cloned()
                .unwrap_or_else(|| Outcome::Abort("internal error: outcome lost".to_string()));
            return self.finish(Termination::declared(outcome));
        }

        let termination = match result {
            Err(payload) => Some(Termination::internal(EngineError::StagePanicked {
                stage,
                message: panic_message(payload.as_ref()),
            })),
            Ok(Err(StageError::Abort(message))) => Some(Termination::stage_abort(message)),
            Ok(Err(StageError::Failed(message))) => {
                Some(Termination::internal(EngineError::StageFailed { stage, message }))
            }
            Ok(Err(StageError::Engine(e))) => Some(Termination::internal(e)),
            Ok(Ok(())) => None,
        };
        if let Some(termination) = termination {
            return self.finish(termination);
        }

        if report.queued.is_empty() {
            return self.finish(Termination::internal(EngineError::StalledPipeline { stage }));
        }

        let expected = report.queued.len();
        if let Err(e) = self.context.aggregator.expect(stage, expected) {
            return self.finish(Termination::internal(e));
        }
        self.state = CoordinatorState::AwaitingResponses { stage, expected };
        debug!(calls = expected, "Stage queued calls");

        Step::Dispatch {
            stage,
            calls: report.queued,
        }
    }

    fn finish(&mut self, termination: Termination) -> Step {
        // Internal terminations have no declared outcome yet; a declared one is kept.
        let _ = self.context.declare(termination.outcome.clone());
        self.context.aggregator.close();
        self.state = CoordinatorState::Terminated(termination.outcome.clone());

        let termination = termination.with_app_status(self.context.take_app_status());
        match &termination.outcome {
            Outcome::Complete(_) => info!(
                procedure = %self.context.procedure(),
                instance_id = %self.context.instance_id(),
                stage = self.context.current_stage(),
                "Compound procedure completed"
            ),
            Outcome::Abort(message) => info!(
                procedure = %self.context.procedure(),
                instance_id = %self.context.instance_id(),
                stage = self.context.current_stage(),
                %message,
                "Compound procedure aborted"
            ),
        }
        Step::Finished(termination)
    }
}

/// Type-erased view of a coordinator, stored in the instance registry.
pub trait ActiveInstance: Send {
    fn instance_id(&self) -> InstanceId;
    fn procedure(&self) -> &str;
    fn is_terminated(&self) -> bool;
    fn start(&mut self) -> Step;
    fn on_response(&mut self, stage: usize, position: usize, response: Response) -> Step;
    fn expire(&mut self, millis: u64) -> Option<Termination>;
}

impl<S: Send> ActiveInstance for Coordinator<S> {
    fn instance_id(&self) -> InstanceId {
        self.context.instance_id()
    }

    fn procedure(&self) -> &str {
        self.context.procedure()
    }

    fn is_terminated(&self) -> bool {
        Coordinator::is_terminated(self)
    }

    fn start(&mut self) -> Step {
        Coordinator::start(self)
    }

    fn on_response(&mut self, stage: usize, position: usize, response: Response) -> Step {
        Coordinator::on_response(self, stage, position, response)
    }

    fn expire(&mut self, millis: u64) -> Option<Termination> {
        Coordinator::expire(self, millis)
    }
}
