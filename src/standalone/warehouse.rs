//! In-memory warehouse: customers, parts and orders, plus the sub-procedures
//! that read and write them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::catalog::ProcedureConfig;
use crate::dispatch::{LocalDispatcher, SubProcedure};
use crate::orchestration::error::Result;
use crate::types::{Column, ColumnType, Table, Value};

pub const GET_CUSTOMER: &str = "GetCustomer";
pub const GET_PART: &str = "GetPart";
pub const INSERT_ORDER: &str = "InsertOrder";

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: i64,
    pub customer_id: i64,
    pub part_num: i64,
    pub quantity: i64,
}

#[derive(Debug, Default)]
struct Tables {
    customers: HashMap<i64, String>,
    parts: HashMap<i64, (String, i64)>,
    orders: Vec<Order>,
    next_order_id: i64,
}

/// Shared warehouse state.
#[derive(Debug, Default)]
pub struct Warehouse {
    tables: RwLock<Tables>,
}

impl Warehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Warehouse with one customer ("Mr. Customer", id 7) and one part
    /// ("Left-Handed Widget", partnum 42, 5 available).
    pub async fn seeded() -> Self {
        let warehouse = Self::new();
        warehouse.add_customer(7, "Mr. Customer").await;
        warehouse.add_part(42, "Left-Handed Widget", 5).await;
        warehouse
    }

    pub async fn add_customer(&self, id: i64, name: impl Into<String>) {
        self.tables.write().await.customers.insert(id, name.into());
    }

    pub async fn add_part(&self, part_num: i64, name: impl Into<String>, available: i64) {
        self.tables
            .write()
            .await
            .parts
            .insert(part_num, (name.into(), available));
    }

    pub async fn available(&self, part_num: i64) -> Option<i64> {
        self.tables.read().await.parts.get(&part_num).map(|(_, a)| *a)
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.tables.read().await.orders.clone()
    }

    /// Register the warehouse sub-procedures with `dispatcher`.
    pub fn register(self: &Arc<Self>, dispatcher: &mut LocalDispatcher) -> Result<()> {
        dispatcher.register(
            GET_CUSTOMER,
            ProcedureConfig::multi_partition(vec![ColumnType::String]),
            GetCustomer(Arc::clone(self)),
        )?;
        dispatcher.register(
            GET_PART,
            ProcedureConfig::multi_partition(vec![ColumnType::String]),
            GetPart(Arc::clone(self)),
        )?;
        dispatcher.register(
            INSERT_ORDER,
            ProcedureConfig::single_partition(
                vec![ColumnType::BigInt, ColumnType::BigInt, ColumnType::Integer],
                0,
            ),
            InsertOrder(Arc::clone(self)),
        )?;
        Ok(())
    }
}

fn build(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> std::result::Result<Table, String> {
    rows.into_iter()
        .try_fold(Table::new(columns), |table, row| table.with_row(row))
        .map_err(|e| e.to_string())
}

/// `SELECT CUSTID, NAME FROM CUSTOMERS WHERE NAME = ?`
struct GetCustomer(Arc<Warehouse>);

#[async_trait]
impl SubProcedure for GetCustomer {
    async fn run(&self, args: &[Value]) -> std::result::Result<Vec<Table>, String> {
        let name = args[0].as_str().unwrap_or_default();
        let tables = self.0.tables.read().await;
        let rows = tables
            .customers
            .iter()
            .filter(|(_, n)| n.as_str() == name)
            .map(|(id, n)| vec![Value::BigInt(*id), Value::from(n.as_str())])
            .collect();
        let table = build(
            vec![
                Column::new("CUSTID", ColumnType::BigInt),
                Column::new("NAME", ColumnType::String),
            ],
            rows,
        )?;
        Ok(vec![table])
    }
}

/// `SELECT PARTNUM, NAME, AVAILABLE FROM PARTS WHERE NAME = ?`
struct GetPart(Arc<Warehouse>);

#[async_trait]
impl SubProcedure for GetPart {
    async fn run(&self, args: &[Value]) -> std::result::Result<Vec<Table>, String> {
        let name = args[0].as_str().unwrap_or_default();
        let tables = self.0.tables.read().await;
        let rows = tables
            .parts
            .iter()
            .filter(|(_, (n, _))| n.as_str() == name)
            .map(|(num, (n, available))| {
                vec![
                    Value::BigInt(*num),
                    Value::from(n.as_str()),
                    Value::BigInt(*available),
                ]
            })
            .collect();
        let table = build(
            vec![
                Column::new("PARTNUM", ColumnType::BigInt),
                Column::new("NAME", ColumnType::String),
                Column::new("AVAILABLE", ColumnType::BigInt),
            ],
            rows,
        )?;
        Ok(vec![table])
    }
}

/// Insert an order and reserve its parts.
///
/// Returns the modified-tuple count, then a table with the new `ORDERID`.
struct InsertOrder(Arc<Warehouse>);

#[async_trait]
impl SubProcedure for InsertOrder {
    async fn run(&self, args: &[Value]) -> std::result::Result<Vec<Table>, String> {
        let (Some(customer_id), Some(part_num), Some(quantity)) =
            (args[0].as_i64(), args[1].as_i64(), args[2].as_i64())
        else {
            return Err("InsertOrder arguments may not be null".to_string());
        };

        let mut tables = self.0.tables.write().await;
        if !tables.customers.contains_key(&customer_id) {
            return Ok(vec![Table::affected_rows(0)]);
        }
        let Some((_, available)) = tables.parts.get_mut(&part_num) else {
            return Ok(vec![Table::affected_rows(0)]);
        };
        if *available < quantity {
            return Ok(vec![Table::affected_rows(0)]);
        }
        *available -= quantity;

        tables.next_order_id += 1;
        let order_id = tables.next_order_id;
        tables.orders.push(Order {
            order_id,
            customer_id,
            part_num,
            quantity,
        });
        debug!(order_id, customer_id, part_num, quantity, "Inserted order");

        Ok(vec![
            Table::affected_rows(1),
            Table::single("ORDERID", ColumnType::BigInt, Value::BigInt(order_id)),
        ])
    }
}
