use std::collections::BTreeMap;
use std::fmt::Display;
use std::io::Write;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::app::adb::command::AdbCommand;
use crate::app::adb::locator::resolve_adb_program;
use crate::app::config::SmokeConfig;
use crate::app::smoke::invocation::{CommandHost, Invocation, InvocationOutcome, InvocationResult};
use crate::app::smoke::report::{SmokeSummary, TOOL_NAME};
use crate::app::smoke::stage::{StageKind, StageReport, StageResult, StageStatus};

pub type StageFn<H> = for<'r, 'a> fn(&'r mut SmokeRun<'a, H>) -> StageResult;

/// A named step of the run and whether its failure aborts the rest.
pub struct Stage<H> {
    pub name: &'static str,
    pub kind: StageKind,
    pub run: StageFn<H>,
}

impl<H> Stage<H> {
    pub fn mandatory(name: &'static str, run: StageFn<H>) -> Self {
        Self {
            name,
            kind: StageKind::Mandatory,
            run,
        }
    }

    pub fn diagnostic(name: &'static str, run: StageFn<H>) -> Self {
        Self {
            name,
            kind: StageKind::Diagnostic,
            run,
        }
    }
}

/// State shared by the stages of one run: the host being driven, the
/// resolved adb command line, and the console that receives progress lines.
pub struct SmokeRun<'a, H> {
    host: &'a mut H,
    config: &'a SmokeConfig,
    adb: AdbCommand,
    console: &'a mut dyn Write,
    trace_id: String,
    artifacts: BTreeMap<String, String>,
}

impl<'a, H: CommandHost> SmokeRun<'a, H> {
    pub fn new(
        host: &'a mut H,
        config: &'a SmokeConfig,
        console: &'a mut dyn Write,
        trace_id: &str,
    ) -> Self {
        let program = resolve_adb_program(&config.adb.command_path);
        Self {
            host,
            config,
            adb: AdbCommand::new(program, config.serial()),
            console,
            trace_id: trace_id.to_string(),
            artifacts: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &'a SmokeConfig {
        self.config
    }

    pub fn adb(&self) -> &AdbCommand {
        &self.adb
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// An invocation with the default command timeout.
    pub fn invocation(&self, command: impl Into<String>, description: impl Into<String>) -> Invocation {
        Invocation::new(
            command,
            description,
            Duration::from_secs(self.config.timing.command_timeout_secs),
        )
    }

    /// Runs one command exactly once, printing a status line before and the
    /// outcome after.
    pub fn invoke(&mut self, invocation: Invocation) -> InvocationResult {
        self.line(format_args!("--> {}...", invocation.description));
        debug!(
            trace_id = %self.trace_id,
            command = %invocation.command,
            timeout_secs = invocation.timeout.as_secs(),
            "invoking"
        );

        let result = self.host.execute(&invocation);
        let detail = result.output.trim().to_string();
        match &result.outcome {
            InvocationOutcome::Succeeded => {
                self.line(format_args!("[ok] {}", invocation.description));
                if invocation.capture_output && !detail.is_empty() {
                    self.line(format_args!("    output: {detail}"));
                }
            }
            InvocationOutcome::Failed { exit_code } => {
                match exit_code {
                    Some(code) => self.line(format_args!(
                        "[fail] {} (exit code {code})",
                        invocation.description
                    )),
                    None => self.line(format_args!("[fail] {}", invocation.description)),
                }
                if !detail.is_empty() {
                    self.line(format_args!("    error: {detail}"));
                }
            }
            InvocationOutcome::TimedOut => self.line(format_args!(
                "[timeout] {} after {}s",
                invocation.description,
                invocation.timeout.as_secs()
            )),
            InvocationOutcome::Fault { message } => {
                self.line(format_args!("[error] {}: {message}", invocation.description))
            }
        }
        result
    }

    pub fn pause(&mut self, duration: Duration) {
        if !duration.is_zero() {
            self.host.pause(duration);
        }
    }

    /// Prints an indented informational line.
    pub fn note(&mut self, message: impl Display) {
        self.line(format_args!("    {message}"));
    }

    pub fn record_artifact(&mut self, name: &str, path: &str) {
        self.artifacts.insert(name.to_string(), path.to_string());
    }

    fn line(&mut self, message: impl Display) {
        let _ = writeln!(self.console, "{message}");
    }

    /// Runs `stages` in order. The first mandatory failure marks every later
    /// stage as skipped and fails the run; diagnostic stages never do.
    pub fn execute(mut self, stages: &[Stage<H>]) -> SmokeSummary {
        let started_at = Utc::now().to_rfc3339();
        info!(
            trace_id = %self.trace_id,
            adb_program = %self.adb.program(),
            package = %self.config.package.name,
            stages = stages.len(),
            "smoke run started"
        );
        self.line("Starting Termux native binaries smoke test");
        self.line("=".repeat(50));

        let mut checks = Vec::with_capacity(stages.len());
        let mut aborted = false;
        for stage in stages {
            if aborted {
                checks.push(StageReport::skipped(stage.name, stage.kind));
                continue;
            }

            let start = Instant::now();
            let result = (stage.run)(&mut self);
            let report = StageReport::from_result(stage.name, stage.kind, result, start.elapsed());
            let message = report.message.clone().unwrap_or_default();
            match report.status {
                StageStatus::Fail => {
                    warn!(
                        trace_id = %self.trace_id,
                        stage = stage.name,
                        error_code = report.error_code.unwrap_or_default(),
                        error = %message,
                        "mandatory stage failed; aborting"
                    );
                    self.line(format_args!("[abort] {}: {message}", stage.name));
                    aborted = true;
                }
                StageStatus::Warn => {
                    warn!(
                        trace_id = %self.trace_id,
                        stage = stage.name,
                        warning = %message,
                        "stage finished with warning"
                    );
                    self.line(format_args!("[warn] {}: {message}", stage.name));
                }
                StageStatus::Pass | StageStatus::Skip => {
                    info!(
                        trace_id = %self.trace_id,
                        stage = stage.name,
                        duration_ms = report.duration_ms as u64,
                        "stage passed"
                    );
                }
            }
            checks.push(report);
        }

        let status = if aborted {
            StageStatus::Fail
        } else {
            StageStatus::Pass
        };
        info!(trace_id = %self.trace_id, status = status.as_str(), "smoke run finished");

        SmokeSummary {
            tool: TOOL_NAME,
            status,
            trace_id: self.trace_id,
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            adb_program: self.adb.program().to_string(),
            serial: self.adb.serial().map(str::to_string),
            package: self.config.package.name.clone(),
            artifacts: self.artifacts,
            checks,
        }
    }
}
