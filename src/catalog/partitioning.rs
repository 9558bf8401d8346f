//! Procedure registration metadata: parameter types and partitioning hints.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::orchestration::error::{EngineError, Result};
use crate::types::{ColumnType, Value};

/// Where a procedure executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Partitioning {
    /// Runs across every partition.
    #[default]
    Multi,
    /// Runs on the partition owning the value of parameter `parameter`.
    Single { parameter: usize },
}

/// Explicit, validated registration metadata for one procedure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcedureConfig {
    pub parameters: Vec<ColumnType>,
    pub partitioning: Partitioning,
}

impl ProcedureConfig {
    pub fn multi_partition(parameters: Vec<ColumnType>) -> Self {
        Self {
            parameters,
            partitioning: Partitioning::Multi,
        }
    }

    pub fn single_partition(parameters: Vec<ColumnType>, parameter: usize) -> Self {
        Self {
            parameters,
            partitioning: Partitioning::Single { parameter },
        }
    }

    pub fn is_single_partition(&self) -> bool {
        matches!(self.partitioning, Partitioning::Single { .. })
    }

    /// Check the partitioning hint against the declared parameters.
    pub fn validate(&self, procedure: &str) -> Result<()> {
        let Partitioning::Single { parameter } = self.partitioning else {
            return Ok(());
        };
        let Some(ty) = self.parameters.get(parameter) else {
            return Err(EngineError::InvalidConfig {
                procedure: procedure.to_string(),
                message: format!(
                    "partition parameter {parameter} out of range ({} parameters)",
                    self.parameters.len()
                ),
            });
        };
        if !(ty.is_integer() || matches!(ty, ColumnType::String | ColumnType::Varbinary)) {
            return Err(EngineError::InvalidConfig {
                procedure: procedure.to_string(),
                message: format!("partition parameter {parameter} has unpartitionable type {ty}"),
            });
        }
        Ok(())
    }

    /// Coerce client arguments to the declared parameter types.
    pub fn coerce_arguments(&self, procedure: &str, args: Vec<Value>) -> Result<Vec<Value>> {
        if args.len() != self.parameters.len() {
            return Err(EngineError::InvalidArguments {
                procedure: procedure.to_string(),
                message: format!(
                    "expected {} arguments, got {}",
                    self.parameters.len(),
                    args.len()
                ),
            });
        }

        args.into_iter()
            .zip(&self.parameters)
            .enumerate()
            .map(|(index, (arg, ty))| {
                arg.coerce_to(*ty).ok_or_else(|| EngineError::InvalidArguments {
                    procedure: procedure.to_string(),
                    message: format!("argument {index} ({arg}) cannot be converted to {ty}"),
                })
            })
            .collect()
    }

    /// Partition owning `args`, or `None` for multi-partition procedures.
    pub fn partition_for(&self, args: &[Value], partition_count: usize) -> Option<usize> {
        let Partitioning::Single { parameter } = self.partitioning else {
            return None;
        };
        let count = partition_count.max(1);
        let partition = match args.get(parameter) {
            Some(value) => match value.as_i64() {
                Some(v) => v.rem_euclid(count as i64) as usize,
                None => hash_partition(value, count),
            },
            None => 0,
        };
        Some(partition)
    }
}

fn hash_partition(value: &Value, count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    match value {
        Value::String(s) => s.hash(&mut hasher),
        Value::Varbinary(b) => b.hash(&mut hasher),
        _ => return 0,
    }
    (hasher.finish() % count as u64) as usize
}
