//! Engine and dispatch settings.

use std::time::Duration;

use serde::Deserialize;

/// Default maximum number of calls one stage may queue.
pub const DEFAULT_MAX_CALLS_PER_STAGE: usize = 10;

/// Default partition count of the in-process dispatcher.
pub const DEFAULT_PARTITION_COUNT: usize = 8;

/// Compound procedure execution settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum calls a single stage invocation may queue.
    ///
    /// Default: 10.
    pub max_calls_per_stage: usize,

    /// Deadline for a whole compound procedure, in milliseconds.
    ///
    /// Unset means no deadline. When exceeded the client gets a timeout and
    /// no further stages run; calls already dispatched still complete.
    pub procedure_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_calls_per_stage: DEFAULT_MAX_CALLS_PER_STAGE,
            procedure_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    pub fn procedure_timeout(&self) -> Option<Duration> {
        self.procedure_timeout_ms.map(Duration::from_millis)
    }
}

/// Sub-procedure dispatch settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Number of partitions of the in-process dispatcher.
    pub partition_count: usize,

    /// Per-call deadline in milliseconds. Unset means no deadline.
    pub call_timeout_ms: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            partition_count: DEFAULT_PARTITION_COUNT,
            call_timeout_ms: None,
        }
    }
}

impl DispatchConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}
