//! `PlaceOrder`: look up a customer and a part, check stock, insert the order.

use crate::catalog::{CompoundProcedure, ProcedureConfig};
use crate::orchestration::aggregator::ResponseSet;
use crate::orchestration::context::StageContext;
use crate::orchestration::error::{Result, StageError, StageResult};
use crate::orchestration::pipeline::StagePipeline;
use crate::types::{ColumnType, Response, Table, Value};

use super::warehouse::{GET_CUSTOMER, GET_PART, INSERT_ORDER};

pub const PLACE_ORDER: &str = "PlaceOrder";

/// Order placement as a three-stage compound procedure.
///
/// Arguments: customer name, part name, quantity.
pub struct PlaceOrder;

impl PlaceOrder {
    pub fn config() -> ProcedureConfig {
        ProcedureConfig::multi_partition(vec![
            ColumnType::String,
            ColumnType::String,
            ColumnType::Integer,
        ])
    }
}

/// Fields carried between the stages of one order.
#[derive(Debug, Default)]
pub struct OrderState {
    customer_name: String,
    part_name: String,
    quantity: i64,
}

type Ctx<'a> = StageContext<'a, OrderState>;

impl CompoundProcedure for PlaceOrder {
    type State = OrderState;

    fn init(&self, params: &[Value]) -> std::result::Result<OrderState, StageError> {
        let (Some(customer_name), Some(part_name), Some(quantity)) = (
            params[0].as_str(),
            params[1].as_str(),
            params[2].as_i64(),
        ) else {
            return Err(StageError::failed("customer, part and quantity are required"));
        };
        if quantity <= 0 {
            return Err(StageError::failed(format!("Invalid quantity {quantity}")));
        }
        Ok(OrderState {
            customer_name: customer_name.to_string(),
            part_name: part_name.to_string(),
            quantity,
        })
    }

    fn stages(&self) -> Result<StagePipeline<OrderState>> {
        StagePipeline::new_stage_list("getData", get_data)
            .then("insertOrder", insert_order)
            .then("finishUp", finish_up)
            .build()
    }
}

fn get_data(ctx: &mut Ctx<'_>, _responses: &ResponseSet) -> StageResult {
    let customer = Value::from(ctx.state().customer_name.as_str());
    let part = Value::from(ctx.state().part_name.as_str());
    ctx.queue_call(GET_CUSTOMER, vec![customer])?;
    ctx.queue_call(GET_PART, vec![part])?;
    Ok(())
}

fn first_row<'r>(response: &'r Response, what: &str) -> std::result::Result<&'r Table, StageError> {
    if let Some(reason) = response.failure_reason() {
        return Err(StageError::abort(format!("{what} lookup failed: {reason}")));
    }
    response
        .table(0)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| StageError::abort(format!("No such {what}")))
}

fn insert_order(ctx: &mut Ctx<'_>, responses: &ResponseSet) -> StageResult {
    let customer = first_row(&responses[0], "customer")?;
    let part = first_row(&responses[1], "part")?;

    let customer_id = customer.get_named(0, "CUSTID").and_then(Value::as_i64);
    let part_num = part.get_named(0, "PARTNUM").and_then(Value::as_i64);
    let available = part.get_named(0, "AVAILABLE").and_then(Value::as_i64);
    let (Some(customer_id), Some(part_num), Some(available)) = (customer_id, part_num, available)
    else {
        return Err(StageError::failed("lookup returned null keys"));
    };

    let quantity = ctx.state().quantity;
    if available < quantity {
        ctx.abort(format!("Only {available} parts available"))?;
        return Ok(());
    }

    ctx.queue_call(
        INSERT_ORDER,
        vec![
            Value::BigInt(customer_id),
            Value::BigInt(part_num),
            Value::BigInt(quantity),
        ],
    )?;
    Ok(())
}

fn finish_up(ctx: &mut Ctx<'_>, responses: &ResponseSet) -> StageResult {
    let insert = &responses[0];
    if insert.affected_rows() != Some(1) {
        let reason = insert.failure_reason().unwrap_or("no rows inserted");
        ctx.abort(format!("Order insert failed: {reason}"))?;
        return Ok(());
    }
    match insert.table(1) {
        Some(order_id) => ctx.complete(order_id.clone())?,
        None => return Err(StageError::failed("insert returned no ORDERID")),
    }
    Ok(())
}
