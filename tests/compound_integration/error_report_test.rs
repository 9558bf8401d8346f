//! A five-stage procedure that defers its failure to a dedicated
//! error-logging stage instead of aborting at the first bad lookup.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use stagewright::config::EngineConfig;
use stagewright::dispatch::{LocalDispatcher, SubProcedure};
use stagewright::orchestration::error::{StageError, StageResult};
use stagewright::orchestration::{ClientStatus, ResponseSet, StageContext, StagePipeline};
use stagewright::standalone::{Warehouse, GET_CUSTOMER, GET_PART, INSERT_ORDER};
use stagewright::types::{ColumnType, Table, Value};
use stagewright::{call_args, CompoundEngine, CompoundProcedure, ProcedureCatalog, ProcedureConfig};

use crate::common::{order_id, CUSTOMER, PART};

const HANDLE_HIT: &str = "HandleHit";
const LOG_ERROR: &str = "LogError";
const HEARTBEAT: &str = "Heartbeat";

/// Appends every message it receives.
#[derive(Clone, Default)]
struct ErrorLog(Arc<Mutex<Vec<String>>>);

impl ErrorLog {
    async fn messages(&self) -> Vec<String> {
        self.0.lock().await.clone()
    }
}

#[async_trait]
impl SubProcedure for ErrorLog {
    async fn run(&self, args: &[Value]) -> Result<Vec<Table>, String> {
        let message = args[0].as_str().unwrap_or_default().to_string();
        self.0.lock().await.push(message);
        Ok(vec![Table::affected_rows(1)])
    }
}

/// Does nothing. Keeps a stage that has nothing to do from stalling.
struct Heartbeat;

#[async_trait]
impl SubProcedure for Heartbeat {
    async fn run(&self, _args: &[Value]) -> Result<Vec<Table>, String> {
        Ok(vec![])
    }
}

#[derive(Default)]
struct HitState {
    customer: String,
    part: String,
    quantity: i64,
    errors: Vec<String>,
    order: Option<Table>,
    log_runs: u8,
}

impl HitState {
    fn report(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    fn errors_reported(&self) -> bool {
        !self.errors.is_empty()
    }
}

type Ctx<'a> = StageContext<'a, HitState>;

struct HandleHit;

impl CompoundProcedure for HandleHit {
    type State = HitState;

    fn init(&self, params: &[Value]) -> Result<HitState, StageError> {
        Ok(HitState {
            customer: params[0].as_str().unwrap_or_default().to_string(),
            part: params[1].as_str().unwrap_or_default().to_string(),
            quantity: params[2].as_i64().unwrap_or_default(),
            ..HitState::default()
        })
    }

    fn stages(&self) -> stagewright::orchestration::Result<StagePipeline<HitState>> {
        StagePipeline::new_stage_list("lookupCustomer", lookup_customer)
            .then("lookupPart", lookup_part)
            .then("reserve", reserve)
            .then("logErrors", log_errors)
            .then("finish", finish)
            .build()
    }
}

fn found(responses: &ResponseSet) -> bool {
    responses[0].table(0).is_some_and(|t| !t.is_empty())
}

fn lookup_customer(ctx: &mut Ctx<'_>, _responses: &ResponseSet) -> StageResult {
    let customer = Value::from(ctx.state().customer.as_str());
    ctx.queue_call(GET_CUSTOMER, vec![customer])?;
    Ok(())
}

fn lookup_part(ctx: &mut Ctx<'_>, responses: &ResponseSet) -> StageResult {
    if !found(responses) {
        let error = format!("Unknown customer '{}'", ctx.state().customer);
        ctx.state_mut().report(error);
        ctx.queue_call(HEARTBEAT, vec![])?;
        return Ok(());
    }
    let part = Value::from(ctx.state().part.as_str());
    ctx.queue_call(GET_PART, vec![part])?;
    Ok(())
}

fn reserve(ctx: &mut Ctx<'_>, responses: &ResponseSet) -> StageResult {
    if ctx.state().errors_reported() {
        ctx.queue_call(HEARTBEAT, vec![])?;
        return Ok(());
    }
    if !found(responses) {
        let error = format!("Unknown part '{}'", ctx.state().part);
        ctx.state_mut().report(error);
        ctx.queue_call(HEARTBEAT, vec![])?;
        return Ok(());
    }
    let part = responses[0].table(0).and_then(|t| t.get_named(0, "PARTNUM"));
    let part = part.and_then(Value::as_i64).unwrap_or_default();
    let quantity = ctx.state().quantity;
    ctx.queue_call(INSERT_ORDER, call_args![7i64, part, quantity])?;
    Ok(())
}

fn log_errors(ctx: &mut Ctx<'_>, responses: &ResponseSet) -> StageResult {
    if !ctx.state().errors_reported() {
        match responses[0].table(1) {
            Some(order) if responses[0].affected_rows() == Some(1) => {
                ctx.state_mut().order = Some(order.clone());
            }
            _ => ctx.state_mut().report("Order insert failed"),
        }
    }
    if ctx.state().errors_reported() {
        let message = ctx.state().errors.join("; ");
        ctx.queue_call(LOG_ERROR, vec![Value::from(message)])?;
        ctx.state_mut().log_runs += 1;
        let runs = ctx.state().log_runs;
        ctx.set_app_status_code(runs);
    } else {
        ctx.queue_call(HEARTBEAT, vec![])?;
    }
    Ok(())
}

fn finish(ctx: &mut Ctx<'_>, _responses: &ResponseSet) -> StageResult {
    if ctx.state().errors_reported() {
        let message = ctx.state().errors.join("; ");
        ctx.abort(message)?;
        return Ok(());
    }
    match ctx.state_mut().order.take() {
        Some(order) => ctx.complete(order)?,
        None => return Err(StageError::failed("no order recorded")),
    }
    Ok(())
}

async fn engine() -> (CompoundEngine, ErrorLog) {
    let warehouse = Arc::new(Warehouse::seeded().await);
    let log = ErrorLog::default();

    let mut local = LocalDispatcher::new(4);
    warehouse.register(&mut local).unwrap();
    local
        .register(
            LOG_ERROR,
            ProcedureConfig::multi_partition(vec![ColumnType::String]),
            log.clone(),
        )
        .unwrap();
    local
        .register(HEARTBEAT, ProcedureConfig::multi_partition(vec![]), Heartbeat)
        .unwrap();

    let mut catalog = ProcedureCatalog::new();
    catalog
        .register(
            HANDLE_HIT,
            ProcedureConfig::multi_partition(vec![
                ColumnType::String,
                ColumnType::String,
                ColumnType::Integer,
            ]),
            HandleHit,
        )
        .unwrap();

    let engine = CompoundEngine::new(catalog, Arc::new(local), &EngineConfig::default());
    (engine, log)
}

#[tokio::test]
async fn test_failed_lookup_is_logged_once_then_aborts() {
    let (engine, log) = engine().await;

    let response = engine
        .call(HANDLE_HIT, call_args!["Mrs. Nobody", PART, 1i32])
        .await;

    assert_eq!(response.status, ClientStatus::UserAbort);
    assert_eq!(
        response.status_string.as_deref(),
        Some("Unknown customer 'Mrs. Nobody'")
    );
    assert_eq!(response.app_status.code, Some(1));
    assert_eq!(log.messages().await, vec!["Unknown customer 'Mrs. Nobody'"]);
}

#[tokio::test]
async fn test_later_lookup_failure_takes_the_same_branch() {
    let (engine, log) = engine().await;

    let response = engine
        .call(HANDLE_HIT, call_args![CUSTOMER, "Right-Handed Widget", 1i32])
        .await;

    assert_eq!(response.status, ClientStatus::UserAbort);
    assert_eq!(response.app_status.code, Some(1));
    assert_eq!(
        log.messages().await,
        vec!["Unknown part 'Right-Handed Widget'"]
    );
}

#[tokio::test]
async fn test_clean_run_skips_error_log() {
    let (engine, log) = engine().await;

    let response = engine.call(HANDLE_HIT, call_args![CUSTOMER, PART, 2i32]).await;

    assert_eq!(response.status, ClientStatus::Success);
    assert!(order_id(&response).is_some());
    assert_eq!(response.app_status.code, None);
    assert!(log.messages().await.is_empty());
}

#[tokio::test]
async fn test_rejected_insert_is_reported_through_the_log_stage() {
    let (engine, log) = engine().await;

    let response = engine.call(HANDLE_HIT, call_args![CUSTOMER, PART, 50i32]).await;

    assert_eq!(response.status, ClientStatus::UserAbort);
    assert_eq!(response.status_string.as_deref(), Some("Order insert failed"));
    assert_eq!(log.messages().await.len(), 1);
}
