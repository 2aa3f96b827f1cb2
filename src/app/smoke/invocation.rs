use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::app::adb::runner::run_shell_with_timeout;

pub const TIMEOUT_OUTPUT: &str = "Timeout";

/// One shell command line plus how to run and label it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub description: String,
    pub capture_output: bool,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(command: impl Into<String>, description: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
            capture_output: true,
            timeout,
        }
    }

    pub fn without_capture(mut self) -> Self {
        self.capture_output = false;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvocationOutcome {
    Succeeded,
    Failed { exit_code: Option<i32> },
    TimedOut,
    Fault { message: String },
}

/// Success flag plus the captured text: stdout on success, stderr on failure,
/// `"Timeout"` on timeout and the fault description on a spawn/poll error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub outcome: InvocationOutcome,
    pub output: String,
}

impl InvocationResult {
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            outcome: InvocationOutcome::Succeeded,
            output: output.into(),
        }
    }

    pub fn failed(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self {
            outcome: InvocationOutcome::Failed { exit_code },
            output: stderr.into(),
        }
    }

    pub fn timed_out() -> Self {
        Self {
            outcome: InvocationOutcome::TimedOut,
            output: TIMEOUT_OUTPUT.to_string(),
        }
    }

    pub fn fault(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            outcome: InvocationOutcome::Fault {
                message: message.clone(),
            },
            output: message,
        }
    }

    pub fn success(&self) -> bool {
        self.outcome == InvocationOutcome::Succeeded
    }
}

/// Seam between the orchestrator and the machine it drives.
pub trait CommandHost {
    fn execute(&mut self, invocation: &Invocation) -> InvocationResult;

    fn pause(&mut self, duration: Duration);
}

/// Runs invocations through the real host shell.
pub struct ShellHost {
    trace_id: String,
}

impl ShellHost {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
        }
    }
}

impl CommandHost for ShellHost {
    fn execute(&mut self, invocation: &Invocation) -> InvocationResult {
        match run_shell_with_timeout(&invocation.command, invocation.timeout, &self.trace_id) {
            Ok(output) if output.succeeded() => {
                if invocation.capture_output {
                    InvocationResult::succeeded(output.stdout)
                } else {
                    InvocationResult::succeeded(String::new())
                }
            }
            Ok(output) => {
                let stderr = if invocation.capture_output {
                    output.stderr
                } else {
                    String::new()
                };
                InvocationResult::failed(output.exit_code, stderr)
            }
            Err(err) if err.is_timeout() => InvocationResult::timed_out(),
            Err(err) => {
                warn!(
                    trace_id = %self.trace_id,
                    command = %invocation.command,
                    error = %err,
                    "invocation fault"
                );
                InvocationResult::fault(err.error)
            }
        }
    }

    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
