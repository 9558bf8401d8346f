//! Stagewright - staged compound procedures
//!
//! A compound procedure is one client-visible call executed as an ordered
//! pipeline of stages. Each stage fans out independent sub-procedure calls;
//! their responses, in issuance order, feed the next stage. Sub-calls commit
//! independently, so a compound procedure has saga semantics rather than
//! transactional ones.

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod orchestration;
#[cfg(feature = "standalone")]
pub mod standalone;
pub mod types;
pub mod utils;

pub use catalog::{CompoundProcedure, ProcedureCatalog, ProcedureConfig};
pub use engine::CompoundEngine;
