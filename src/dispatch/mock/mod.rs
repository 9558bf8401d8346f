//! Mock dispatcher implementation for testing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Dispatcher;
use crate::orchestration::call::CallDescriptor;
use crate::types::Response;

type Responder = Arc<dyn Fn(&CallDescriptor) -> Response + Send + Sync>;

/// Mock dispatcher for testing.
///
/// Procedures without a scripted response succeed with no tables.
#[derive(Default)]
pub struct MockDispatcher {
    responders: RwLock<HashMap<String, Responder>>,
    delays: RwLock<HashMap<String, Duration>>,
    calls: RwLock<Vec<CallDescriptor>>,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `procedure` with `response`.
    pub async fn set_response(&self, procedure: impl Into<String>, response: Response) {
        self.set_responder(procedure, move |_| response.clone()).await;
    }

    /// Answer `procedure` by calling `responder` with the call.
    pub async fn set_responder<F>(&self, procedure: impl Into<String>, responder: F)
    where
        F: Fn(&CallDescriptor) -> Response + Send + Sync + 'static,
    {
        self.responders
            .write()
            .await
            .insert(procedure.into(), Arc::new(responder));
    }

    /// Delay every response to `procedure`.
    pub async fn set_delay(&self, procedure: impl Into<String>, delay: Duration) {
        self.delays.write().await.insert(procedure.into(), delay);
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Calls received so far, in arrival order.
    pub async fn calls(&self) -> Vec<CallDescriptor> {
        self.calls.read().await.clone()
    }

    pub async fn calls_to(&self, procedure: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.procedure() == procedure)
            .count()
    }
}

#[async_trait]
impl Dispatcher for MockDispatcher {
    async fn dispatch(&self, call: CallDescriptor) -> Response {
        self.calls.write().await.push(call.clone());

        let delay = self.delays.read().await.get(call.procedure()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let responder = self.responders.read().await.get(call.procedure()).cloned();
        match responder {
            Some(responder) => responder(&call),
            None => Response::success(vec![]),
        }
    }
}
