//! In-process dispatcher.
//!
//! Executes registered `SubProcedure`s directly. Each partition is a mutex:
//! a single-partition call holds the lock of the partition owning its
//! partitioning argument, a multi-partition call holds every partition lock
//! (acquired in index order). Calls on different partitions run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::catalog::ProcedureConfig;
use crate::orchestration::call::CallDescriptor;
use crate::orchestration::error::Result;
use crate::types::{Response, Table, Value};

use super::Dispatcher;

/// An ordinary (single- or multi-partition) procedure.
#[async_trait]
pub trait SubProcedure: Send + Sync {
    /// Run with arguments already coerced to the declared parameter types.
    ///
    /// `Err` becomes a `Failure` response carrying the message.
    async fn run(&self, args: &[Value]) -> std::result::Result<Vec<Table>, String>;
}

struct RegisteredProcedure {
    config: ProcedureConfig,
    procedure: Arc<dyn SubProcedure>,
}

/// Dispatcher over an in-process procedure table.
pub struct LocalDispatcher {
    procedures: HashMap<String, RegisteredProcedure>,
    partitions: Vec<Mutex<()>>,
}

impl LocalDispatcher {
    pub fn new(partition_count: usize) -> Self {
        Self {
            procedures: HashMap::new(),
            partitions: (0..partition_count.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Register a procedure. Its config is validated here.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        config: ProcedureConfig,
        procedure: impl SubProcedure + 'static,
    ) -> Result<()> {
        let name = name.into();
        config.validate(&name)?;
        debug!(
            procedure = %name,
            single_partition = config.is_single_partition(),
            "Registered sub-procedure"
        );
        self.procedures.insert(
            name,
            RegisteredProcedure {
                config,
                procedure: Arc::new(procedure),
            },
        );
        Ok(())
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    async fn lock_partitions(&self, partition: Option<usize>) -> Vec<MutexGuard<'_, ()>> {
        match partition {
            Some(p) => vec![self.partitions[p % self.partitions.len()].lock().await],
            None => {
                let mut guards = Vec::with_capacity(self.partitions.len());
                for partition in &self.partitions {
                    guards.push(partition.lock().await);
                }
                guards
            }
        }
    }
}

#[async_trait]
impl Dispatcher for LocalDispatcher {
    async fn dispatch(&self, call: CallDescriptor) -> Response {
        let (name, args) = call.into_parts();

        let Some(registered) = self.procedures.get(&name) else {
            warn!(procedure = %name, "Sub-procedure not found");
            return Response::failure(format!("Procedure '{name}' was not found"));
        };

        let args = match registered.config.coerce_arguments(&name, args) {
            Ok(args) => args,
            Err(e) => {
                warn!(procedure = %name, error = %e, "Sub-procedure arguments rejected");
                return Response::failure(e.to_string());
            }
        };

        let partition = registered
            .config
            .partition_for(&args, self.partitions.len());
        let _guards = self.lock_partitions(partition).await;
        debug!(procedure = %name, ?partition, "Running sub-procedure");

        match registered.procedure.run(&args).await {
            Ok(tables) => Response::success(tables),
            Err(reason) => {
                debug!(procedure = %name, %reason, "Sub-procedure failed");
                Response::failure(reason)
            }
        }
    }
}
