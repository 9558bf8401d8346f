//! Error taxonomy for compound procedure execution.

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the pipeline, the coordinator and the client boundary.
///
/// Everything except `ProcedureNotFound` and `InvalidArguments` is an internal
/// protocol violation: the affected instance terminates with an `Abort`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("Stage {stage} produced no work and no outcome")]
    StalledPipeline { stage: usize },

    #[error("Pipeline exhausted after {stages} stages without an outcome")]
    PipelineExhausted { stages: usize },

    #[error("Procedure outcome already declared")]
    DoubleTermination,

    #[error("Duplicate response for stage {stage} position {position}")]
    DuplicateDelivery { stage: usize, position: usize },

    #[error("Unexpected response for stage {stage} position {position}: {reason}")]
    UnexpectedDelivery {
        stage: usize,
        position: usize,
        reason: String,
    },

    #[error("Stage queued more than {limit} procedure calls")]
    TooManyCalls { limit: usize },

    #[error("Compound procedure '{0}' cannot be called from a compound procedure")]
    NestedCompoundCall(String),

    #[error("Procedure '{0}' was not found")]
    ProcedureNotFound(String),

    #[error("Invalid arguments for '{procedure}': {message}")]
    InvalidArguments { procedure: String, message: String },

    #[error("Invalid procedure configuration for '{procedure}': {message}")]
    InvalidConfig { procedure: String, message: String },

    #[error("Stage {stage} panicked: {message}")]
    StagePanicked { stage: usize, message: String },

    #[error("Stage {stage} failed: {message}")]
    StageFailed { stage: usize, message: String },

    #[error("Compound procedure timed out after {millis} ms")]
    TimedOut { millis: u64 },
}

/// Error returned by a stage body or a procedure's `init`.
///
/// `Abort` is the expected user-initiated failure path; it reaches the client
/// as a user abort carrying the message verbatim. Anything else is reported
/// as an unexpected failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("{0}")]
    Abort(String),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl StageError {
    pub fn abort(message: impl Into<String>) -> Self {
        StageError::Abort(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        StageError::Failed(message.into())
    }
}

/// Result type for stage bodies.
pub type StageResult = std::result::Result<(), StageError>;
