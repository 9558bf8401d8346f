//! Live instance registry.
//!
//! Maps instance ids to their coordinators so sub-procedure responses can be
//! routed back to the instance that issued the call. An entry lives from the
//! moment the client call is accepted until the instance terminates or times
//! out; responses for ids no longer present are dropped.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex, MutexGuard, RwLock};
use tracing::debug;

use super::context::InstanceId;
use super::coordinator::ActiveInstance;
use super::outcome::Termination;

/// One registered instance: its coordinator plus the client reply channel.
pub struct InstanceEntry {
    id: InstanceId,
    procedure: String,
    instance: Mutex<Box<dyn ActiveInstance>>,
    reply: Mutex<Option<oneshot::Sender<Termination>>>,
}

impl InstanceEntry {
    pub fn new(instance: Box<dyn ActiveInstance>, reply: oneshot::Sender<Termination>) -> Self {
        Self {
            id: instance.instance_id(),
            procedure: instance.procedure().to_string(),
            instance: Mutex::new(instance),
            reply: Mutex::new(Some(reply)),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    /// Exclusive access to the coordinator. At most one stage of an instance
    /// runs at a time.
    pub async fn lock(&self) -> MutexGuard<'_, Box<dyn ActiveInstance>> {
        self.instance.lock().await
    }

    /// Take the reply sender. Returns `None` once taken.
    pub async fn take_reply(&self) -> Option<oneshot::Sender<Termination>> {
        self.reply.lock().await.take()
    }
}

/// Registry of in-flight compound procedure instances.
#[derive(Default)]
pub struct InstanceRegistry {
    instances: RwLock<HashMap<InstanceId, Arc<InstanceEntry>>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry under its instance id.
    pub async fn insert(&self, entry: InstanceEntry) -> Arc<InstanceEntry> {
        let entry = Arc::new(entry);
        let mut instances = self.instances.write().await;
        instances.insert(entry.id(), Arc::clone(&entry));
        debug!(
            instance_id = %entry.id(),
            procedure = %entry.procedure(),
            live = instances.len(),
            "Registered compound procedure instance"
        );
        entry
    }

    pub async fn get(&self, id: &InstanceId) -> Option<Arc<InstanceEntry>> {
        self.instances.read().await.get(id).cloned()
    }

    /// Remove an entry. Returns `None` if it was already removed.
    pub async fn remove(&self, id: &InstanceId) -> Option<Arc<InstanceEntry>> {
        let removed = self.instances.write().await.remove(id);
        if removed.is_some() {
            debug!(instance_id = %id, "Unregistered compound procedure instance");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.instances.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.instances.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::aggregator::ResponseSet;
    use crate::orchestration::context::{InstanceContext, StageContext, StageLimits};
    use crate::orchestration::coordinator::{Coordinator, Step};
    use crate::orchestration::error::StageResult;
    use crate::orchestration::pipeline::StagePipeline;
    use crate::types::Table;

    fn done(ctx: &mut StageContext<'_, ()>, _responses: &ResponseSet) -> StageResult {
        ctx.complete(Table::default())?;
        Ok(())
    }

    fn entry() -> (InstanceEntry, oneshot::Receiver<Termination>) {
        let pipeline = StagePipeline::new_stage_list("done", done).build().unwrap();
        let coordinator = Coordinator::new(
            pipeline,
            InstanceContext::new("Done", vec![], ()),
            StageLimits::default(),
        );
        let (tx, rx) = oneshot::channel();
        (InstanceEntry::new(Box::new(coordinator), tx), rx)
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let registry = InstanceRegistry::new();
        let (entry, _rx) = entry();
        let id = entry.id();

        registry.insert(entry).await;
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get(&id).await.unwrap().procedure(), "Done");

        assert!(registry.remove(&id).await.is_some());
        assert!(registry.remove(&id).await.is_none());
        assert!(registry.get(&id).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_entry_drives_coordinator_and_replies_once() {
        let registry = InstanceRegistry::new();
        let (entry, rx) = entry();
        let entry = registry.insert(entry).await;

        let step = entry.lock().await.start();
        let Step::Finished(termination) = step else {
            panic!("expected termination");
        };
        assert!(entry.lock().await.is_terminated());

        entry.take_reply().await.unwrap().send(termination).unwrap();
        assert!(entry.take_reply().await.is_none());
        assert!(rx.await.unwrap().outcome.is_complete());
    }
}
