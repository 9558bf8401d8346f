//! Sub-procedure dispatch.
//!
//! `Dispatcher` is the boundary between the engine and whatever executes
//! ordinary procedures. It takes a call descriptor and eventually yields a
//! `Response`; failures are responses too, never errors. Completion order
//! across concurrent calls is unspecified.
//!
//! - `local/`: in-process procedure table with per-partition serialization
//! - `mock/`: scripted responses and delays, for tests
//! - `timeout`: per-call deadline wrapper around any dispatcher

pub mod local;
pub mod mock;
mod timeout;

pub use local::{LocalDispatcher, SubProcedure};
pub use mock::MockDispatcher;
pub use timeout::TimeoutDispatcher;

use std::sync::Arc;

use async_trait::async_trait;

use crate::orchestration::call::CallDescriptor;
use crate::types::Response;

/// Executes sub-procedure calls.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Execute `call` and return its response.
    async fn dispatch(&self, call: CallDescriptor) -> Response;
}

#[async_trait]
impl<D: Dispatcher + ?Sized> Dispatcher for Arc<D> {
    async fn dispatch(&self, call: CallDescriptor) -> Response {
        (**self).dispatch(call).await
    }
}
