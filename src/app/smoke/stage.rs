use std::time::Duration;

use serde::Serialize;

use crate::app::error::{ERR_DEPENDENCY, ERR_TIMEOUT};
use crate::app::smoke::invocation::{InvocationOutcome, InvocationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Failure aborts the run.
    Mandatory,
    /// Outcome is reported but never gates the result.
    Diagnostic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pass,
    Warn,
    Fail,
    Skip,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Pass => "pass",
            StageStatus::Warn => "warn",
            StageStatus::Fail => "fail",
            StageStatus::Skip => "skip",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Execution,
    Assertion,
    /// A host tool the run needs (adb) is missing or unusable.
    Dependency,
}

impl FailureKind {
    pub fn code(self) -> &'static str {
        match self {
            FailureKind::Timeout => ERR_TIMEOUT,
            FailureKind::Execution => "ERR_EXECUTION",
            FailureKind::Assertion => "ERR_ASSERTION",
            FailureKind::Dependency => ERR_DEPENDENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl StageFailure {
    pub fn execution(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Execution,
            message: message.into(),
        }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Assertion,
            message: message.into(),
        }
    }

    pub fn dependency(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Dependency,
            message: message.into(),
        }
    }

    pub fn from_invocation(description: &str, result: &InvocationResult) -> Self {
        match &result.outcome {
            InvocationOutcome::TimedOut => Self {
                kind: FailureKind::Timeout,
                message: format!("{description} timed out"),
            },
            InvocationOutcome::Failed { exit_code } => {
                let detail = result.output.trim();
                let code = exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                if detail.is_empty() {
                    Self::execution(format!("{description} failed (exit {code})"))
                } else {
                    Self::execution(format!("{description} failed (exit {code}): {detail}"))
                }
            }
            InvocationOutcome::Fault { message } => {
                Self::execution(format!("{description} could not run: {message}"))
            }
            InvocationOutcome::Succeeded => {
                Self::assertion(format!("{description} succeeded but its output was rejected"))
            }
        }
    }
}

/// `Ok(None)` passes, `Ok(Some(warning))` passes with a warning.
pub type StageResult = Result<Option<String>, StageFailure>;

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub name: &'static str,
    pub kind: StageKind,
    pub status: StageStatus,
    pub duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StageReport {
    pub fn from_result(name: &'static str, kind: StageKind, result: StageResult, elapsed: Duration) -> Self {
        let duration_ms = elapsed.as_millis();
        match result {
            Ok(None) => Self {
                name,
                kind,
                status: StageStatus::Pass,
                duration_ms,
                error_code: None,
                message: None,
            },
            Ok(Some(warning)) => Self {
                name,
                kind,
                status: StageStatus::Warn,
                duration_ms,
                error_code: Some("WARN"),
                message: Some(warning),
            },
            Err(failure) => Self {
                name,
                kind,
                status: match kind {
                    StageKind::Mandatory => StageStatus::Fail,
                    StageKind::Diagnostic => StageStatus::Warn,
                },
                duration_ms,
                error_code: Some(failure.kind.code()),
                message: Some(failure.message),
            },
        }
    }

    pub fn skipped(name: &'static str, kind: StageKind) -> Self {
        Self {
            name,
            kind,
            status: StageStatus::Skip,
            duration_ms: 0,
            error_code: None,
            message: None,
        }
    }
}
