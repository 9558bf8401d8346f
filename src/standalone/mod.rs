//! Standalone runtime: the engine over the in-process dispatcher and the
//! demo warehouse.
//!
//! # Example
//!
//! ```ignore
//! use stagewright::config::Config;
//! use stagewright::standalone::{Standalone, PLACE_ORDER};
//!
//! let standalone = Standalone::build(&Config::default()).await?;
//! let response = standalone
//!     .engine()
//!     .call(PLACE_ORDER, call_args!["Mr. Customer", "Left-Handed Widget", 3])
//!     .await;
//! ```

mod order;
mod warehouse;

pub use order::{OrderState, PlaceOrder, PLACE_ORDER};
pub use warehouse::{Order, Warehouse, GET_CUSTOMER, GET_PART, INSERT_ORDER};

use std::sync::Arc;

use tracing::info;

use crate::catalog::ProcedureCatalog;
use crate::config::Config;
use crate::dispatch::{Dispatcher, LocalDispatcher, TimeoutDispatcher};
use crate::engine::CompoundEngine;
use crate::orchestration::error::Result;

/// A wired engine plus the warehouse it operates on.
pub struct Standalone {
    engine: CompoundEngine,
    warehouse: Arc<Warehouse>,
}

impl Standalone {
    /// Build over a freshly seeded warehouse.
    pub async fn build(config: &Config) -> Result<Self> {
        Self::with_warehouse(config, Arc::new(Warehouse::seeded().await))
    }

    pub fn with_warehouse(config: &Config, warehouse: Arc<Warehouse>) -> Result<Self> {
        let mut local = LocalDispatcher::new(config.dispatch.partition_count);
        warehouse.register(&mut local)?;

        let dispatcher: Arc<dyn Dispatcher> = match config.dispatch.call_timeout() {
            Some(timeout) => Arc::new(TimeoutDispatcher::new(local, timeout)),
            None => Arc::new(local),
        };

        let mut catalog = ProcedureCatalog::new();
        catalog.register(PLACE_ORDER, PlaceOrder::config(), PlaceOrder)?;

        info!(
            partitions = config.dispatch.partition_count,
            procedures = catalog.len(),
            "Standalone engine ready"
        );

        Ok(Self {
            engine: CompoundEngine::new(catalog, dispatcher, &config.engine),
            warehouse,
        })
    }

    pub fn engine(&self) -> &CompoundEngine {
        &self.engine
    }

    pub fn warehouse(&self) -> &Arc<Warehouse> {
        &self.warehouse
    }
}
