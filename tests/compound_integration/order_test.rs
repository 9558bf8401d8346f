//! Order placement against the seeded warehouse.

use std::sync::Arc;

use stagewright::orchestration::ClientStatus;
use stagewright::standalone::Warehouse;
use stagewright::types::Value;

use crate::common::{order_id, place_order, standalone, standalone_with, CUSTOMER, PART};

#[tokio::test]
async fn test_order_within_stock_completes_with_order_id() {
    let standalone = standalone().await;

    let response = place_order(&standalone, CUSTOMER, PART, 3).await;

    assert_eq!(response.status, ClientStatus::Success);
    let id = order_id(&response).expect("ORDERID");
    let orders = standalone.warehouse().orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_id, id);
    assert_eq!(orders[0].customer_id, 7);
    assert_eq!(orders[0].part_num, 42);
    assert_eq!(standalone.warehouse().available(42).await, Some(2));
}

#[tokio::test]
async fn test_order_beyond_stock_aborts() {
    let standalone = standalone().await;

    let response = place_order(&standalone, CUSTOMER, PART, 10).await;

    assert_eq!(response.status, ClientStatus::UserAbort);
    assert_eq!(
        response.status_string.as_deref(),
        Some("Only 5 parts available")
    );
    assert!(response.results.is_empty());
    assert!(standalone.warehouse().orders().await.is_empty());
}

#[tokio::test]
async fn test_unknown_customer_aborts() {
    let standalone = standalone().await;

    let response = place_order(&standalone, "Mrs. Nobody", PART, 1).await;

    assert_eq!(response.status, ClientStatus::UserAbort);
    assert_eq!(response.status_string.as_deref(), Some("No such customer"));
}

#[tokio::test]
async fn test_wrong_argument_count_is_graceful_failure() {
    let standalone = standalone().await;

    let response = standalone
        .engine()
        .call(stagewright::standalone::PLACE_ORDER, stagewright::call_args![CUSTOMER])
        .await;

    assert_eq!(response.status, ClientStatus::GracefulFailure);
}

#[tokio::test]
async fn test_null_quantity_is_unexpected_failure() {
    let standalone = standalone().await;

    let response = standalone
        .engine()
        .call(
            stagewright::standalone::PLACE_ORDER,
            vec![Value::from(CUSTOMER), Value::from(PART), Value::Null],
        )
        .await;

    assert_eq!(response.status, ClientStatus::UnexpectedFailure);
    assert_eq!(
        response.status_string.as_deref(),
        Some("customer, part and quantity are required")
    );
    assert!(standalone.warehouse().orders().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_orders_get_distinct_ids() {
    let warehouse = Warehouse::new();
    warehouse.add_customer(7, CUSTOMER).await;
    warehouse.add_part(42, PART, 100).await;
    let standalone = Arc::new(standalone_with(Arc::new(warehouse)));

    let orders = (0..10).map(|_| {
        let standalone = Arc::clone(&standalone);
        async move { place_order(&standalone, CUSTOMER, PART, 3).await }
    });
    let responses = futures::future::join_all(orders).await;

    let mut ids: Vec<i64> = responses
        .iter()
        .map(|r| order_id(r).expect("ORDERID"))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 10);
    assert_eq!(standalone.warehouse().available(42).await, Some(70));
    assert_eq!(standalone.engine().live_instances().await, 0);
}
