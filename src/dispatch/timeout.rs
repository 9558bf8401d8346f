//! Per-call deadline.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::orchestration::call::CallDescriptor;
use crate::types::Response;

use super::Dispatcher;

/// Wraps a dispatcher so that calls exceeding `timeout` yield a `Failure`
/// response. The underlying call is dropped, not rolled back.
pub struct TimeoutDispatcher<D> {
    inner: D,
    timeout: Duration,
}

impl<D: Dispatcher> TimeoutDispatcher<D> {
    pub fn new(inner: D, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<D: Dispatcher> Dispatcher for TimeoutDispatcher<D> {
    async fn dispatch(&self, call: CallDescriptor) -> Response {
        let procedure = call.procedure().to_string();
        match tokio::time::timeout(self.timeout, self.inner.dispatch(call)).await {
            Ok(response) => response,
            Err(_) => {
                let millis = self.timeout.as_millis();
                warn!(procedure = %procedure, timeout_ms = millis, "Sub-procedure call timed out");
                Response::failure(format!(
                    "Procedure '{procedure}' timed out after {millis} ms"
                ))
            }
        }
    }
}
