//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use stagewright::config::Config;
use stagewright::orchestration::ClientResponse;
use stagewright::standalone::{Standalone, Warehouse, PLACE_ORDER};
use stagewright::types::Value;
use stagewright::utils::bootstrap::try_init_tracing;

pub const CUSTOMER: &str = "Mr. Customer";
pub const PART: &str = "Left-Handed Widget";

/// Standalone engine over the seeded warehouse with default config.
pub async fn standalone() -> Standalone {
    try_init_tracing();
    Standalone::build(&Config::for_test())
        .await
        .expect("standalone engine")
}

/// Standalone engine over `warehouse`.
pub fn standalone_with(warehouse: Arc<Warehouse>) -> Standalone {
    try_init_tracing();
    Standalone::with_warehouse(&Config::for_test(), warehouse).expect("standalone engine")
}

pub async fn place_order(
    standalone: &Standalone,
    customer: &str,
    part: &str,
    quantity: i32,
) -> ClientResponse {
    standalone
        .engine()
        .call(
            PLACE_ORDER,
            vec![Value::from(customer), Value::from(part), Value::from(quantity)],
        )
        .await
}

/// The ORDERID of a successful order response.
pub fn order_id(response: &ClientResponse) -> Option<i64> {
    response
        .result()
        .and_then(|t| t.get_named(0, "ORDERID"))
        .and_then(Value::as_i64)
}
