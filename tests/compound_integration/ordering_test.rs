//! Response ordering and short-circuiting against a scripted dispatcher.

use std::sync::Arc;
use std::time::Duration;

use stagewright::config::EngineConfig;
use stagewright::dispatch::MockDispatcher;
use stagewright::orchestration::error::{StageError, StageResult};
use stagewright::orchestration::{ClientStatus, ResponseSet, StageContext, StagePipeline};
use stagewright::types::{Column, ColumnType, Response, Table, Value};
use stagewright::{CompoundEngine, CompoundProcedure, ProcedureCatalog, ProcedureConfig};

const LOOKUPS: [(&str, u64); 3] = [("Slow", 60), ("Medium", 30), ("Fast", 0)];

/// Fans out to three lookups, then completes with their names in the order
/// the responses were handed over.
struct FanOut;

impl CompoundProcedure for FanOut {
    type State = ();

    fn init(&self, _params: &[Value]) -> Result<(), StageError> {
        Ok(())
    }

    fn stages(&self) -> stagewright::orchestration::Result<StagePipeline<()>> {
        StagePipeline::new_stage_list("fanOut", fan_out)
            .then("collect", collect)
            .build()
    }
}

fn fan_out(ctx: &mut StageContext<'_, ()>, _responses: &ResponseSet) -> StageResult {
    for (name, _) in LOOKUPS {
        ctx.queue_call(name, vec![])?;
    }
    Ok(())
}

fn collect(ctx: &mut StageContext<'_, ()>, responses: &ResponseSet) -> StageResult {
    let mut names = Table::new(vec![Column::new("NAME", ColumnType::String)]);
    for response in responses {
        let name = response.scalar().cloned().unwrap_or(Value::Null);
        names
            .add_row(vec![name])
            .map_err(|e| StageError::failed(e.to_string()))?;
    }
    ctx.complete(names)?;
    Ok(())
}

/// Decides its outcome in the entry stage.
struct Shortcut {
    succeed: bool,
}

impl CompoundProcedure for Shortcut {
    type State = bool;

    fn init(&self, _params: &[Value]) -> Result<bool, StageError> {
        Ok(self.succeed)
    }

    fn stages(&self) -> stagewright::orchestration::Result<StagePipeline<bool>> {
        StagePipeline::new_stage_list("decide", decide)
            .then("unreachable", unreachable_stage)
            .build()
    }
}

fn decide(ctx: &mut StageContext<'_, bool>, _responses: &ResponseSet) -> StageResult {
    if *ctx.state() {
        ctx.complete(Table::single("DONE", ColumnType::TinyInt, Value::TinyInt(1)))?;
    } else {
        ctx.queue_call("Fast", vec![])?;
        ctx.abort("changed my mind")?;
    }
    Ok(())
}

fn unreachable_stage(ctx: &mut StageContext<'_, bool>, _responses: &ResponseSet) -> StageResult {
    ctx.queue_call("Slow", vec![])?;
    Ok(())
}

async fn engine() -> (CompoundEngine, Arc<MockDispatcher>) {
    let mock = Arc::new(MockDispatcher::new());
    for (name, delay) in LOOKUPS {
        mock.set_response(
            name,
            Response::success(vec![Table::single("NAME", ColumnType::String, Value::from(name))]),
        )
        .await;
        mock.set_delay(name, Duration::from_millis(delay)).await;
    }

    let mut catalog = ProcedureCatalog::new();
    catalog
        .register("FanOut", ProcedureConfig::multi_partition(vec![]), FanOut)
        .unwrap();
    catalog
        .register(
            "ShortcutComplete",
            ProcedureConfig::multi_partition(vec![]),
            Shortcut { succeed: true },
        )
        .unwrap();
    catalog
        .register(
            "ShortcutAbort",
            ProcedureConfig::multi_partition(vec![]),
            Shortcut { succeed: false },
        )
        .unwrap();

    let engine = CompoundEngine::new(catalog, mock.clone(), &EngineConfig::default());
    (engine, mock)
}

#[tokio::test]
async fn test_responses_follow_issuance_order_not_completion_order() {
    let (engine, mock) = engine().await;

    let response = engine.call("FanOut", vec![]).await;

    assert_eq!(response.status, ClientStatus::Success);
    let names: Vec<&str> = response
        .result()
        .unwrap()
        .rows()
        .iter()
        .filter_map(|row| row[0].as_str())
        .collect();
    assert_eq!(names, vec!["Slow", "Medium", "Fast"]);
    assert_eq!(mock.call_count().await, 3);
}

#[tokio::test]
async fn test_entry_stage_completion_dispatches_nothing() {
    let (engine, mock) = engine().await;

    let response = engine.call("ShortcutComplete", vec![]).await;

    assert_eq!(response.status, ClientStatus::Success);
    assert_eq!(
        response.result().and_then(Table::scalar),
        Some(&Value::TinyInt(1))
    );
    assert_eq!(mock.call_count().await, 0);
}

#[tokio::test]
async fn test_abort_discards_calls_queued_in_the_same_stage() {
    let (engine, mock) = engine().await;

    let response = engine.call("ShortcutAbort", vec![]).await;

    assert_eq!(response.status, ClientStatus::UserAbort);
    assert_eq!(response.status_string.as_deref(), Some("changed my mind"));
    assert_eq!(mock.call_count().await, 0);
    assert_eq!(engine.live_instances().await, 0);
}
