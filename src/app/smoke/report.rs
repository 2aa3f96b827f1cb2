use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::app::error::AppError;
use crate::app::smoke::stage::{StageReport, StageStatus};

pub const TOOL_NAME: &str = "termux_native_smoke";

#[derive(Debug, Clone, Serialize)]
pub struct SmokeSummary {
    pub tool: &'static str,
    pub status: StageStatus,
    pub trace_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub adb_program: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    pub package: String,
    pub artifacts: BTreeMap<String, String>,
    pub checks: Vec<StageReport>,
}

impl SmokeSummary {
    pub fn passed(&self) -> bool {
        self.status == StageStatus::Pass
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }

    pub fn check(&self, name: &str) -> Option<&StageReport> {
        self.checks.iter().find(|check| check.name == name)
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string_pretty(self).map_err(|err| {
            AppError::system(format!("Failed to serialize summary: {err}"), &self.trace_id)
        })
    }

    /// Human-readable block printed at the end of a run; every line is taken
    /// from a recorded stage report.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\nTest Results Summary:");
        let _ = writeln!(out, "{}", "=".repeat(30));
        for check in &self.checks {
            let _ = write!(
                out,
                "[{}] {} ({} ms)",
                check.status.as_str(),
                check.name,
                check.duration_ms
            );
            if let Some(message) = &check.message {
                let _ = write!(out, " - {message}");
            }
            out.push('\n');
        }
        for (name, path) in &self.artifacts {
            let _ = writeln!(out, "{name}: {path}");
        }
        let _ = writeln!(out, "status: {}", self.status.as_str());
        let _ = writeln!(out, "trace_id: {}", self.trace_id);
        out
    }
}
