use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::error::AppError;

pub const DEFAULT_PACKAGE: &str = "com.termux";
pub const DEFAULT_ACTIVITY: &str = ".app.TermuxActivity";
pub const DEFAULT_BUILD_COMMAND: &str = "make build";
pub const DEFAULT_APK_PATH: &str =
    "app/build/outputs/apk/debug/termux-app_apt-android-7-debug_arm64-v8a.apk";
pub const DEFAULT_BOOTSTRAP_DIR: &str = "/data/data/com.termux/files/usr/bin";
pub const DEFAULT_SCREENSHOT_PATH: &str = "/tmp/termux_test_result.png";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AdbSettings {
    /// Empty means "resolve from the SDK environment, else `adb` on PATH".
    pub command_path: String,
    /// Empty means no `-s` selector.
    pub serial: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildSettings {
    pub command: String,
    pub timeout_secs: u64,
    pub apk_path: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            command: DEFAULT_BUILD_COMMAND.to_string(),
            timeout_secs: 120,
            apk_path: DEFAULT_APK_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PackageSettings {
    pub name: String,
    pub activity: String,
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_PACKAGE.to_string(),
            activity: DEFAULT_ACTIVITY.to_string(),
        }
    }
}

impl PackageSettings {
    /// Component name accepted by `am start -n`.
    pub fn component(&self) -> String {
        format!("{}/{}", self.name, self.activity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingSettings {
    pub command_timeout_secs: u64,
    pub startup_timeout_secs: u64,
    pub startup_poll_interval_ms: u64,
    pub type_delay_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            command_timeout_secs: 30,
            startup_timeout_secs: 5,
            startup_poll_interval_ms: 1000,
            type_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InspectionSettings {
    pub bootstrap_dir: String,
    pub screenshot_path: String,
}

impl Default for InspectionSettings {
    fn default() -> Self {
        Self {
            bootstrap_dir: DEFAULT_BOOTSTRAP_DIR.to_string(),
            screenshot_path: DEFAULT_SCREENSHOT_PATH.to_string(),
        }
    }
}

/// One command typed into the terminal, followed by ENTER and a settle wait.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionStep {
    pub text: String,
    pub settle_ms: u64,
}

impl InteractionStep {
    pub fn new(text: &str, settle_ms: u64) -> Self {
        Self {
            text: text.to_string(),
            settle_ms,
        }
    }
}

pub fn default_interaction() -> Vec<InteractionStep> {
    vec![
        InteractionStep::new("clear", 1000),
        InteractionStep::new("ls", 3000),
        InteractionStep::new("ls /", 3000),
        InteractionStep::new("which ls", 2000),
        InteractionStep::new("ls -la", 3000),
        InteractionStep::new("pwd", 2000),
        InteractionStep::new("which sh", 2000),
        InteractionStep::new("echo $PATH", 2000),
        InteractionStep::new("/system/bin/ls", 3000),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SmokeConfig {
    #[serde(default)]
    pub adb: AdbSettings,
    #[serde(default)]
    pub build: BuildSettings,
    #[serde(default)]
    pub package: PackageSettings,
    #[serde(default)]
    pub timing: TimingSettings,
    #[serde(default)]
    pub inspection: InspectionSettings,
    #[serde(default = "default_interaction")]
    pub interaction: Vec<InteractionStep>,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            adb: AdbSettings::default(),
            build: BuildSettings::default(),
            package: PackageSettings::default(),
            timing: TimingSettings::default(),
            inspection: InspectionSettings::default(),
            interaction: default_interaction(),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub serial: Option<String>,
    pub apk_path: Option<String>,
    pub screenshot_path: Option<String>,
}

impl SmokeConfig {
    pub fn apply_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(serial) = non_empty(overrides.serial) {
            self.adb.serial = serial;
        }
        if let Some(apk_path) = non_empty(overrides.apk_path) {
            self.build.apk_path = apk_path;
        }
        if let Some(screenshot_path) = non_empty(overrides.screenshot_path) {
            self.inspection.screenshot_path = screenshot_path;
        }
        self
    }

    pub fn serial(&self) -> Option<&str> {
        let trimmed = self.adb.serial.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("TERMUX_SMOKE_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".termux_smoke_config.json")
}

pub fn load_config(trace_id: &str) -> Result<SmokeConfig, AppError> {
    load_config_from_path(&config_path(), trace_id)
}

pub fn load_config_from_path(path: &Path, trace_id: &str) -> Result<SmokeConfig, AppError> {
    if !path.exists() {
        return Ok(SmokeConfig::default());
    }
    let raw = fs::read_to_string(path).map_err(|err| {
        AppError::config(
            format!("Failed to read config {}: {err}", path.display()),
            trace_id,
        )
    })?;
    let config: SmokeConfig = serde_json::from_str(&raw).map_err(|err| {
        AppError::config(
            format!("Failed to parse config {}: {err}", path.display()),
            trace_id,
        )
    })?;
    Ok(validate_config(config))
}

fn validate_config(mut config: SmokeConfig) -> SmokeConfig {
    let defaults = SmokeConfig::default();
    if config.build.command.trim().is_empty() {
        config.build.command = defaults.build.command;
    }
    if config.build.timeout_secs == 0 {
        config.build.timeout_secs = defaults.build.timeout_secs;
    }
    if config.build.apk_path.trim().is_empty() {
        config.build.apk_path = defaults.build.apk_path;
    }
    if config.package.name.trim().is_empty() {
        config.package.name = defaults.package.name;
    }
    if config.package.activity.trim().is_empty() {
        config.package.activity = defaults.package.activity;
    }
    if config.timing.command_timeout_secs == 0 {
        config.timing.command_timeout_secs = defaults.timing.command_timeout_secs;
    }
    if config.timing.startup_timeout_secs == 0 {
        config.timing.startup_timeout_secs = defaults.timing.startup_timeout_secs;
    }
    if !(100..=10_000).contains(&config.timing.startup_poll_interval_ms) {
        config.timing.startup_poll_interval_ms = defaults.timing.startup_poll_interval_ms;
    }
    if config.inspection.bootstrap_dir.trim().is_empty() {
        config.inspection.bootstrap_dir = defaults.inspection.bootstrap_dir;
    }
    if config.inspection.screenshot_path.trim().is_empty() {
        config.inspection.screenshot_path = defaults.inspection.screenshot_path;
    }
    config.interaction.retain(|step| !step.text.trim().is_empty());
    config
}
