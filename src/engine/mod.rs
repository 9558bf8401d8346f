//! Client boundary for compound procedures.
//!
//! `CompoundEngine::call` validates the procedure name and arguments, creates
//! an instance, and returns exactly one `ClientResponse` once the instance
//! terminates. The optional procedure deadline is armed on its own task, so it
//! fires even when the caller has gone away.
//!
//! Execution is continuation-driven. Every dispatched call runs in its own
//! task; the task that delivers the last response of a stage resumes the
//! instance through the registry and dispatches the next stage's calls. No
//! task ever blocks waiting for a barrier.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use crate::catalog::ProcedureCatalog;
use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::orchestration::call::CallDescriptor;
use crate::orchestration::context::{InstanceId, StageLimits};
use crate::orchestration::coordinator::Step;
use crate::orchestration::error::{EngineError, StageError};
use crate::orchestration::outcome::{ClientResponse, Termination};
use crate::orchestration::registry::{InstanceEntry, InstanceRegistry};
use crate::types::{Response, Value};
use crate::utils::panic::panic_message;

/// Runs compound procedures against a dispatcher.
///
/// Cheap to clone; clones share the catalog, dispatcher and live instances.
#[derive(Clone)]
pub struct CompoundEngine {
    shared: Arc<Shared>,
}

struct Shared {
    catalog: ProcedureCatalog,
    dispatcher: Arc<dyn Dispatcher>,
    registry: InstanceRegistry,
    limits: StageLimits,
    procedure_timeout: Option<Duration>,
}

impl CompoundEngine {
    pub fn new(catalog: ProcedureCatalog, dispatcher: Arc<dyn Dispatcher>, config: &EngineConfig) -> Self {
        let limits = StageLimits {
            max_calls_per_stage: config.max_calls_per_stage,
            compound_procedures: catalog.compound_names(),
        };
        Self {
            shared: Arc::new(Shared {
                catalog,
                dispatcher,
                registry: InstanceRegistry::new(),
                limits,
                procedure_timeout: config.procedure_timeout(),
            }),
        }
    }

    pub fn catalog(&self) -> &ProcedureCatalog {
        &self.shared.catalog
    }

    /// Number of instances that have not terminated yet.
    pub async fn live_instances(&self) -> usize {
        self.shared.registry.len().await
    }

    /// Invoke compound procedure `name` and wait for its single response.
    #[tracing::instrument(name = "compound.call", skip_all, fields(procedure = %name))]
    pub async fn call(&self, name: &str, args: Vec<Value>) -> ClientResponse {
        let shared = &self.shared;

        let params = match shared.catalog.coerce_arguments(name, args) {
            Ok(params) => params,
            Err(e @ EngineError::ProcedureNotFound(_)) => {
                warn!(error = %e, "Unknown compound procedure");
                return ClientResponse::unexpected_failure(&e);
            }
            Err(e) => {
                warn!(error = %e, "Compound procedure arguments rejected");
                return ClientResponse::graceful_failure(&e);
            }
        };

        let instance = match shared.catalog.instantiate(name, params, shared.limits.clone()) {
            Ok(instance) => instance,
            Err(e) => {
                error!(error = %e, "Compound procedure failed to initialize");
                return match e {
                    StageError::Engine(inner) => ClientResponse::unexpected_failure(&inner),
                    other => ClientResponse::unexpected_failure(&other),
                };
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let entry = shared
            .registry
            .insert(InstanceEntry::new(instance, reply_tx))
            .await;
        let id = entry.id();
        debug!(instance_id = %id, "Starting compound procedure");

        // Detached so the instance runs to completion even if the caller goes away.
        let driver = Arc::clone(shared);
        tokio::spawn(async move {
            let step = entry.lock().await.start();
            driver.advance(entry, step).await;
        });
        if let Some(limit) = shared.procedure_timeout {
            tokio::spawn(Arc::clone(shared).expire_after(id, limit));
        }

        render(reply_rx.await)
    }
}

fn render(result: Result<Termination, oneshot::error::RecvError>) -> ClientResponse {
    match result {
        Ok(termination) => termination.into(),
        Err(_) => {
            error!("Compound procedure instance dropped without an outcome");
            ClientResponse::unexpected_failure(&"instance dropped without an outcome")
        }
    }
}

impl Shared {
    /// Act on a coordinator transition.
    fn advance(self: Arc<Self>, entry: Arc<InstanceEntry>, step: Step) -> BoxFuture<'static, ()> {
        async move {
            match step {
                Step::Dispatch { stage, calls } => {
                    let id = entry.id();
                    for (position, call) in calls.into_iter().enumerate() {
                        tokio::spawn(Arc::clone(&self).run_call(id, stage, position, call));
                    }
                }
                Step::Wait | Step::Ignored => {}
                Step::Finished(termination) => self.finish(&entry, termination).await,
            }
        }
        .boxed()
    }

    /// Dispatch one call and route its response back to the instance.
    async fn run_call(self: Arc<Self>, id: InstanceId, stage: usize, position: usize, call: CallDescriptor) {
        let procedure = call.procedure().to_string();
        let response = match AssertUnwindSafe(self.dispatcher.dispatch(call))
            .catch_unwind()
            .await
        {
            Ok(response) => response,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    instance_id = %id,
                    procedure = %procedure,
                    error = %message,
                    "Sub-procedure dispatch panicked"
                );
                Response::failure(format!("Procedure '{procedure}' panicked: {message}"))
            }
        };

        let Some(entry) = self.registry.get(&id).await else {
            debug!(
                instance_id = %id,
                stage,
                position,
                "Response for an instance that is no longer live, dropping"
            );
            return;
        };
        let step = entry.lock().await.on_response(stage, position, response);
        self.advance(entry, step).await;
    }

    /// Enforce the procedure deadline whether or not the client is still waiting.
    async fn expire_after(self: Arc<Self>, id: InstanceId, limit: Duration) {
        tokio::time::sleep(limit).await;
        let Some(entry) = self.registry.get(&id).await else {
            return;
        };
        let millis = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
        let expired = entry.lock().await.expire(millis);
        if let Some(termination) = expired {
            self.finish(&entry, termination).await;
        }
    }

    async fn finish(&self, entry: &InstanceEntry, termination: Termination) {
        self.registry.remove(&entry.id()).await;
        match entry.take_reply().await {
            Some(reply) => {
                if reply.send(termination).is_err() {
                    warn!(
                        instance_id = %entry.id(),
                        procedure = %entry.procedure(),
                        "Client went away before the outcome was delivered"
                    );
                }
            }
            None => debug!(instance_id = %entry.id(), "Outcome already delivered"),
        }
    }
}
