//! Terminal outcomes and their client-facing rendering.

use std::fmt;

use crate::types::Table;

use super::error::EngineError;

/// Final value of one instance. Set once, never overwritten.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Complete(Table),
    Abort(String),
}

impl Outcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete(_))
    }
}

/// Application-defined status carried on the final response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppStatus {
    pub code: Option<u8>,
    pub message: Option<String>,
}

/// Why an instance terminated.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationCause {
    /// A stage called `complete` or `abort`.
    Declared,
    /// A stage returned `StageError::Abort`.
    StageAbort,
    /// Protocol violation, stage failure or panic.
    Internal(EngineError),
    /// The procedure timeout expired.
    TimedOut,
}

/// Outcome plus the context needed to render it for the client.
#[derive(Debug, Clone, PartialEq)]
pub struct Termination {
    pub outcome: Outcome,
    pub cause: TerminationCause,
    pub app_status: AppStatus,
}

impl Termination {
    pub fn declared(outcome: Outcome) -> Self {
        Self {
            outcome,
            cause: TerminationCause::Declared,
            app_status: AppStatus::default(),
        }
    }

    pub fn stage_abort(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Abort(message.into()),
            cause: TerminationCause::StageAbort,
            app_status: AppStatus::default(),
        }
    }

    /// Convert an internal error into an implicit abort.
    pub fn internal(err: EngineError) -> Self {
        let message = match &err {
            EngineError::StalledPipeline { .. } => {
                "internal error: stage produced no work and no outcome".to_string()
            }
            EngineError::PipelineExhausted { .. } => {
                "internal error: pipeline completed without an outcome".to_string()
            }
            other => format!("internal error: {other}"),
        };
        Self {
            outcome: Outcome::Abort(message),
            cause: TerminationCause::Internal(err),
            app_status: AppStatus::default(),
        }
    }

    pub fn timed_out(millis: u64) -> Self {
        let err = EngineError::TimedOut { millis };
        Self {
            outcome: Outcome::Abort(err.to_string()),
            cause: TerminationCause::TimedOut,
            app_status: AppStatus::default(),
        }
    }

    pub fn with_app_status(mut self, app_status: AppStatus) -> Self {
        self.app_status = app_status;
        self
    }
}

/// Status reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    Success,
    /// A stage aborted the procedure.
    UserAbort,
    /// The call was rejected before any stage ran (bad arguments).
    GracefulFailure,
    /// Internal error, stage failure or missing procedure.
    UnexpectedFailure,
    /// The procedure timeout expired.
    Timeout,
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientStatus::Success => "SUCCESS",
            ClientStatus::UserAbort => "USER_ABORT",
            ClientStatus::GracefulFailure => "GRACEFUL_FAILURE",
            ClientStatus::UnexpectedFailure => "UNEXPECTED_FAILURE",
            ClientStatus::Timeout => "TIMEOUT",
        };
        f.write_str(name)
    }
}

/// The single response a client receives for a compound procedure call.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientResponse {
    pub status: ClientStatus,
    pub status_string: Option<String>,
    pub results: Vec<Table>,
    pub app_status: AppStatus,
}

impl ClientResponse {
    pub fn graceful_failure(err: &impl fmt::Display) -> Self {
        Self::failure(ClientStatus::GracefulFailure, err.to_string())
    }

    pub fn unexpected_failure(err: &impl fmt::Display) -> Self {
        Self::failure(ClientStatus::UnexpectedFailure, err.to_string())
    }

    fn failure(status: ClientStatus, message: String) -> Self {
        Self {
            status,
            status_string: Some(message),
            results: Vec::new(),
            app_status: AppStatus::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ClientStatus::Success
    }

    /// First result table, if the call succeeded with one.
    pub fn result(&self) -> Option<&Table> {
        self.results.first()
    }
}

impl From<Termination> for ClientResponse {
    fn from(termination: Termination) -> Self {
        let Termination {
            outcome,
            cause,
            app_status,
        } = termination;

        match outcome {
            Outcome::Complete(table) => Self {
                status: ClientStatus::Success,
                status_string: None,
                results: vec![table],
                app_status,
            },
            Outcome::Abort(message) => {
                let status = match cause {
                    TerminationCause::Declared | TerminationCause::StageAbort => {
                        ClientStatus::UserAbort
                    }
                    TerminationCause::Internal(_) => ClientStatus::UnexpectedFailure,
                    TerminationCause::TimedOut => ClientStatus::Timeout,
                };
                Self {
                    status,
                    status_string: Some(message),
                    results: Vec::new(),
                    app_status,
                }
            }
        }
    }
}
