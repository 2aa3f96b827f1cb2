use std::path::{Path, PathBuf};

use crate::app::error::AppError;

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|candidate| candidate.strip_suffix('"'))
    {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed
        .strip_prefix('\'')
        .and_then(|candidate| candidate.strip_suffix('\''))
    {
        return inner.trim().to_string();
    }
    trimmed.to_string()
}

/// Resolves the adb program: configured path, else the SDK's platform-tools,
/// else plain `adb` from PATH.
pub fn resolve_adb_program(config_command_path: &str) -> String {
    let sdk_root = std::env::var_os("ANDROID_SDK_ROOT")
        .or_else(|| std::env::var_os("ANDROID_HOME"))
        .map(PathBuf::from);
    resolve_adb_program_with_sdk(config_command_path, sdk_root.as_deref())
}

pub fn resolve_adb_program_with_sdk(config_command_path: &str, sdk_root: Option<&Path>) -> String {
    let normalized = normalize_command_path(config_command_path);
    if !normalized.is_empty() {
        return normalized;
    }
    if let Some(candidate) = sdk_root.map(sdk_adb_path).filter(|path| path.is_file()) {
        return candidate.to_string_lossy().to_string();
    }
    "adb".to_string()
}

fn sdk_adb_path(sdk_root: &Path) -> PathBuf {
    let name = if cfg!(windows) { "adb.exe" } else { "adb" };
    sdk_root.join("platform-tools").join(name)
}

/// A missing or unusable adb is a dependency error, not a device problem.
pub fn validate_adb_program(program: &str, trace_id: &str) -> Result<(), AppError> {
    if program.trim().is_empty() {
        return Err(AppError::dependency("ADB command is empty", trace_id));
    }
    if program == "adb" {
        return Ok(());
    }
    let path = Path::new(program);
    if path.is_dir() {
        return Err(AppError::dependency(
            "ADB path must point to an executable file",
            trace_id,
        ));
    }
    if !path.exists() {
        return Err(AppError::dependency(
            format!("ADB executable not found at {program}"),
            trace_id,
        ));
    }
    Ok(())
}
