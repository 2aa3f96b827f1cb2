use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::app::adb::apps::listing_contains_package;
use crate::app::adb::command::KEYCODE_ENTER;
use crate::app::adb::locator::validate_adb_program;
use crate::app::adb::parse::{
    listing_reports_device, parse_adb_devices, parse_entry_count, parse_process_listing,
};
use crate::app::config::SmokeConfig;
use crate::app::models::DeviceSummary;
use crate::app::screenshot::verify_png_file;
use crate::app::smoke::invocation::{CommandHost, InvocationOutcome, InvocationResult};
use crate::app::smoke::orchestrator::{SmokeRun, Stage};
use crate::app::smoke::report::SmokeSummary;
use crate::app::smoke::stage::{StageFailure, StageResult};

/// The Termux install-and-exercise sequence, in execution order.
pub fn termux_stages<H: CommandHost>() -> Vec<Stage<H>> {
    vec![
        Stage::mandatory("check_device", check_device::<H>),
        Stage::mandatory("build_apk", build_apk::<H>),
        Stage::diagnostic("uninstall_previous", uninstall_previous::<H>),
        Stage::mandatory("install_apk", install_apk::<H>),
        Stage::mandatory("verify_install", verify_install::<H>),
        Stage::mandatory("launch_app", launch_app::<H>),
        Stage::diagnostic("wait_for_startup", wait_for_startup::<H>),
        Stage::diagnostic("terminal_interaction", terminal_interaction::<H>),
        Stage::diagnostic("bootstrap_check", bootstrap_check::<H>),
        Stage::diagnostic("process_listing", process_listing::<H>),
        Stage::diagnostic("screenshot", screenshot::<H>),
    ]
}

pub fn run_termux_smoke_test<H: CommandHost>(
    host: &mut H,
    config: &SmokeConfig,
    console: &mut dyn Write,
    trace_id: &str,
) -> SmokeSummary {
    SmokeRun::new(host, config, console, trace_id).execute(&termux_stages())
}

/// True only when the listing command succeeds and mentions `device`.
pub fn check_device_connected<H: CommandHost>(run: &mut SmokeRun<'_, H>) -> bool {
    check_device(run).is_ok()
}

fn require_success(description: &str, result: &InvocationResult) -> StageResult {
    if result.success() {
        Ok(None)
    } else {
        Err(StageFailure::from_invocation(description, result))
    }
}

pub fn check_device<H: CommandHost>(run: &mut SmokeRun<'_, H>) -> StageResult {
    if let Err(err) = validate_adb_program(run.adb().program(), run.trace_id()) {
        run.note(format_args!("No usable adb: {}", err.error));
        return Err(StageFailure::dependency(err.error));
    }

    let description = "Checking device connection";
    let invocation = run.invocation(run.adb().devices(), description);
    let result = run.invoke(invocation);
    if !result.success() {
        run.note("No Android device found");
        return Err(StageFailure::from_invocation(description, &result));
    }
    if !listing_reports_device(&result.output) {
        run.note("No Android device found");
        return Err(StageFailure::assertion(
            "device listing does not report an attached device",
        ));
    }
    run.note("Android device detected");

    let devices = parse_adb_devices(&result.output);
    let online: Vec<&DeviceSummary> = devices.iter().filter(|device| device.is_online()).collect();
    info!(trace_id = %run.trace_id(), listed = devices.len(), online = online.len(), "device listing parsed");
    if online.is_empty() {
        return Ok(Some(
            "device listing matched but no device is in the `device` state".to_string(),
        ));
    }
    for device in &online {
        match (&device.model, &device.transport_id) {
            (Some(model), Some(transport)) => run.note(format_args!(
                "{} model {model} (transport {transport})",
                device.serial
            )),
            (Some(model), None) => run.note(format_args!("{} model {model}", device.serial)),
            _ => run.note(&device.serial),
        }
    }
    if let Some(serial) = run.adb().serial() {
        if !online.iter().any(|device| device.serial == serial) {
            return Ok(Some(format!("selected serial {serial} is not listed as online")));
        }
    }
    Ok(None)
}

pub fn build_apk<H: CommandHost>(run: &mut SmokeRun<'_, H>) -> StageResult {
    let build = &run.config().build;
    let description = "Building Termux APK";
    let invocation = run
        .invocation(build.command.as_str(), description)
        .with_timeout(Duration::from_secs(build.timeout_secs));
    let result = run.invoke(invocation);
    require_success(description, &result)
}

/// Best effort: the package may not have been installed before.
pub fn uninstall_previous<H: CommandHost>(run: &mut SmokeRun<'_, H>) -> StageResult {
    let package = &run.config().package.name;
    let description = "Uninstalling existing Termux (if any)";
    let invocation = run.invocation(run.adb().uninstall(package), description);
    let result = run.invoke(invocation);
    require_success(description, &result)
}

pub fn install_apk<H: CommandHost>(run: &mut SmokeRun<'_, H>) -> StageResult {
    let apk_path = &run.config().build.apk_path;
    let description = "Installing Termux APK";
    if !Path::new(apk_path).is_file() {
        run.note(format_args!("Build artifact not found on host: {apk_path}"));
    }
    let invocation = run.invocation(run.adb().install(apk_path), description);
    let result = run.invoke(invocation);
    require_success(description, &result)
}

/// The package listing must name the package even when install reported success.
pub fn verify_install<H: CommandHost>(run: &mut SmokeRun<'_, H>) -> StageResult {
    let package = &run.config().package.name;
    let description = "Verifying installation";
    let invocation = run.invocation(run.adb().list_packages_matching(package), description);
    let result = run.invoke(invocation);
    let mismatch = match &result.outcome {
        InvocationOutcome::Succeeded => !listing_contains_package(&result.output, package),
        // grep exits 1 without output when nothing matched.
        InvocationOutcome::Failed { exit_code: Some(1) } => result.output.trim().is_empty(),
        _ => false,
    };
    if result.success() && !mismatch {
        return Ok(None);
    }
    if !mismatch {
        return Err(StageFailure::from_invocation(description, &result));
    }
    run.note(format_args!("{package} package not found after installation"));
    Err(StageFailure::assertion(format!(
        "{package} not found in package listing after installation"
    )))
}

pub fn launch_app<H: CommandHost>(run: &mut SmokeRun<'_, H>) -> StageResult {
    let component = run.config().package.component();
    let description = "Launching Termux app";
    let invocation = run.invocation(run.adb().start_activity(&component), description);
    let result = run.invoke(invocation);
    require_success(description, &result)?;
    // `am start` exits 0 on some releases even when the activity is missing.
    if let Some(line) = result
        .output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("Error"))
    {
        return Err(StageFailure::assertion(format!("am start reported: {line}")));
    }
    Ok(None)
}

pub fn startup_poll_attempts(budget: Duration, interval: Duration) -> u32 {
    let interval_ms = interval.as_millis().max(1);
    let attempts = budget.as_millis().div_ceil(interval_ms).max(1);
    u32::try_from(attempts).unwrap_or(u32::MAX)
}

/// Polls for the app process instead of sleeping a fixed time.
pub fn wait_for_startup<H: CommandHost>(run: &mut SmokeRun<'_, H>) -> StageResult {
    let timing = &run.config().timing;
    let package = &run.config().package.name;
    let budget = Duration::from_secs(timing.startup_timeout_secs);
    let interval = Duration::from_millis(timing.startup_poll_interval_ms);
    let attempts = startup_poll_attempts(budget, interval);

    run.note(format_args!("Waiting up to {}s for app startup...", budget.as_secs()));
    for attempt in 1..=attempts {
        let invocation = run.invocation(run.adb().pidof(package), "Checking for app process");
        let result = run.invoke(invocation);
        let pid = result.output.trim();
        if result.success() && !pid.is_empty() {
            run.note(format_args!("{package} running as pid {pid}"));
            return Ok(None);
        }
        if attempt < attempts {
            run.pause(interval);
        }
    }
    Ok(Some(format!(
        "{package} process not observed within {}s",
        budget.as_secs()
    )))
}

/// Types each scripted command and presses ENTER. Nothing is read back; the
/// screenshot is the record of what the terminal showed.
pub fn terminal_interaction<H: CommandHost>(run: &mut SmokeRun<'_, H>) -> StageResult {
    let steps = &run.config().interaction;
    let type_delay = Duration::from_millis(run.config().timing.type_delay_ms);
    run.note("Testing terminal functionality...");

    let mut failed = 0usize;
    for step in steps {
        let typed = run
            .invocation(run.adb().input_text(&step.text), format!("Typing '{}' command", step.text))
            .without_capture();
        if !run.invoke(typed).success() {
            failed += 1;
        }
        run.pause(type_delay);

        let enter = run
            .invocation(run.adb().keyevent(KEYCODE_ENTER), "Pressing Enter")
            .without_capture();
        if !run.invoke(enter).success() {
            failed += 1;
        }
        run.pause(Duration::from_millis(step.settle_ms));
    }

    if failed == 0 {
        Ok(None)
    } else {
        Ok(Some(format!(
            "{failed} of {} input events failed",
            steps.len() * 2
        )))
    }
}

/// Packaging invariant: the app's `usr/bin` holds no bundled binaries.
pub fn bootstrap_check<H: CommandHost>(run: &mut SmokeRun<'_, H>) -> StageResult {
    let dir = &run.config().inspection.bootstrap_dir;
    let description = "Checking bootstrap files count";
    let invocation = run.invocation(run.adb().count_entries(dir), description);
    let result = run.invoke(invocation);
    require_success(description, &result)?;

    let count = parse_entry_count(&result.output);
    if count == 0 {
        run.note("No bootstrap files found - using Android native binaries only");
        return Ok(None);
    }
    let warning = format!("Found {count} files in {dir} (expected 0 for native-only implementation)");
    run.note(&warning);
    Ok(Some(warning))
}

pub fn process_listing<H: CommandHost>(run: &mut SmokeRun<'_, H>) -> StageResult {
    let package = &run.config().package.name;
    let description = "Checking running Termux processes";
    let invocation = run.invocation(run.adb().processes_matching(package), description);
    let result = run.invoke(invocation);
    require_success(description, &result)?;

    let processes = parse_process_listing(&result.output);
    if processes.is_empty() {
        return Ok(Some(format!("no process rows matched {package}")));
    }
    let listed = processes
        .iter()
        .map(|process| format!("{} (pid {}, user {})", process.name, process.pid, process.user))
        .collect::<Vec<_>>()
        .join(", ");
    run.note(format_args!("Termux processes: {listed}"));
    Ok(None)
}

pub fn screenshot<H: CommandHost>(run: &mut SmokeRun<'_, H>) -> StageResult {
    let path = &run.config().inspection.screenshot_path;
    let description = "Taking screenshot";
    let invocation = run
        .invocation(run.adb().screencap_to(path), description)
        .without_capture();
    let result = run.invoke(invocation);
    require_success(description, &result)?;

    match verify_png_file(Path::new(path)) {
        Ok(size) => {
            run.record_artifact("screenshot", path);
            run.note(format_args!("Screenshot saved to {path} ({size} bytes)"));
            Ok(None)
        }
        Err(message) => Ok(Some(message)),
    }
}
