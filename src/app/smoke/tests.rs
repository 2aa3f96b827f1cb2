use std::collections::VecDeque;
use std::time::Duration;

use crate::app::config::{InteractionStep, SmokeConfig};
use crate::app::smoke::invocation::{CommandHost, Invocation, InvocationResult};
use crate::app::smoke::orchestrator::SmokeRun;
use crate::app::smoke::report::SmokeSummary;
use crate::app::smoke::stage::{StageKind, StageStatus};
use crate::app::smoke::stages::{
    check_device_connected, run_termux_smoke_test, startup_poll_attempts, termux_stages,
};

/// Answers invocations from scripted rules; the first rule whose pattern occurs in the
/// command line wins. A rule replays its responses in order and repeats the last one.
struct ScriptedHost {
    rules: Vec<(&'static str, VecDeque<InvocationResult>)>,
    commands: Vec<String>,
    pauses: Vec<Duration>,
}

impl ScriptedHost {
    fn new() -> Self {
        Self {
            rules: Vec::new(),
            commands: Vec::new(),
            pauses: Vec::new(),
        }
    }

    /// Responses for a device where everything works.
    fn healthy() -> Self {
        Self::new()
            .respond(
                " devices",
                vec![InvocationResult::succeeded(
                    "List of devices attached\nR58M123\tdevice\n",
                )],
            )
            .respond(
                "pm list packages",
                vec![InvocationResult::succeeded("package:com.termux\n")],
            )
            .respond(
                "am start",
                vec![InvocationResult::succeeded(
                    "Starting: Intent { cmp=com.termux/.app.TermuxActivity }\n",
                )],
            )
            .respond("pidof", vec![InvocationResult::succeeded("12345\n")])
            .respond("wc -l", vec![InvocationResult::succeeded("0\n")])
            .respond(
                "shell ps",
                vec![InvocationResult::succeeded(
                    "u0_a211 12345 734 15012340 120344 0 0 S com.termux\n",
                )],
            )
    }

    fn respond(mut self, pattern: &'static str, responses: Vec<InvocationResult>) -> Self {
        // Later rules override earlier ones for the same pattern.
        self.rules.retain(|(existing, _)| *existing != pattern);
        self.rules.insert(0, (pattern, responses.into()));
        self
    }

    fn issued(&self, pattern: &str) -> usize {
        self.commands
            .iter()
            .filter(|command| command.contains(pattern))
            .count()
    }
}

impl CommandHost for ScriptedHost {
    fn execute(&mut self, invocation: &Invocation) -> InvocationResult {
        self.commands.push(invocation.command.clone());
        for (pattern, responses) in self.rules.iter_mut() {
            if invocation.command.contains(*pattern) {
                if responses.len() > 1 {
                    if let Some(next) = responses.pop_front() {
                        return next;
                    }
                }
                return responses
                    .front()
                    .cloned()
                    .unwrap_or_else(|| InvocationResult::succeeded(""));
            }
        }
        InvocationResult::succeeded("")
    }

    fn pause(&mut self, duration: Duration) {
        self.pauses.push(duration);
    }
}

fn test_config() -> SmokeConfig {
    let mut config = SmokeConfig::default();
    config.adb.command_path = "adb".to_string();
    config.inspection.screenshot_path = std::env::temp_dir()
        .join("termux_smoke_test_missing_screenshot.png")
        .to_string_lossy()
        .to_string();
    config
}

fn run(host: &mut ScriptedHost, config: &SmokeConfig) -> (SmokeSummary, String) {
    let mut console: Vec<u8> = Vec::new();
    let summary = run_termux_smoke_test(host, config, &mut console, "trace-test");
    (summary, String::from_utf8_lossy(&console).to_string())
}

fn status_of(summary: &SmokeSummary, name: &str) -> StageStatus {
    summary
        .check(name)
        .map(|check| check.status)
        .unwrap_or_else(|| panic!("missing check {name}"))
}

#[test]
fn healthy_device_passes_every_mandatory_stage() {
    let mut host = ScriptedHost::healthy();
    let config = test_config();
    let (summary, console) = run(&mut host, &config);

    assert!(summary.passed());
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(summary.checks.len(), termux_stages::<ScriptedHost>().len());
    for check in summary
        .checks
        .iter()
        .filter(|check| check.kind == StageKind::Mandatory)
    {
        assert_eq!(check.status, StageStatus::Pass, "{}", check.name);
    }
    assert_eq!(host.issued("make build"), 1);
    assert_eq!(host.issued("adb uninstall com.termux"), 1);
    assert_eq!(
        host.issued(
            "adb install app/build/outputs/apk/debug/termux-app_apt-android-7-debug_arm64-v8a.apk"
        ),
        1
    );
    assert_eq!(
        host.issued("adb shell am start -n com.termux/.app.TermuxActivity"),
        1
    );
    assert!(console.contains("Android device detected"));
    assert!(console.contains("No bootstrap files found - using Android native binaries only"));
    assert!(console.contains("Termux processes: com.termux (pid 12345, user u0_a211)"));
}

#[test]
fn stages_run_in_fixed_order() {
    let mut host = ScriptedHost::healthy();
    let (summary, _) = run(&mut host, &test_config());
    let names: Vec<&str> = summary.checks.iter().map(|check| check.name).collect();
    assert_eq!(
        names,
        vec![
            "check_device",
            "build_apk",
            "uninstall_previous",
            "install_apk",
            "verify_install",
            "launch_app",
            "wait_for_startup",
            "terminal_interaction",
            "bootstrap_check",
            "process_listing",
            "screenshot",
        ]
    );
    let first_build = host.commands.iter().position(|c| c == "make build");
    let first_install = host.commands.iter().position(|c| c.contains(" install "));
    assert!(first_build < first_install);
}

#[test]
fn failed_device_listing_aborts_before_any_other_command() {
    let mut host = ScriptedHost::healthy().respond(
        " devices",
        vec![InvocationResult::failed(Some(1), "adb: command not found")],
    );
    let (summary, console) = run(&mut host, &test_config());

    assert!(!summary.passed());
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(host.commands.len(), 1);
    assert_eq!(status_of(&summary, "check_device"), StageStatus::Fail);
    assert!(summary
        .checks
        .iter()
        .skip(1)
        .all(|check| check.status == StageStatus::Skip));
    assert!(console.contains("No Android device found"));
}

#[test]
fn empty_device_listing_fails_the_gate() {
    let mut host =
        ScriptedHost::healthy().respond(" devices", vec![InvocationResult::succeeded("")]);
    let (summary, _) = run(&mut host, &test_config());

    assert_eq!(summary.exit_code(), 1);
    assert_eq!(host.commands, vec!["adb devices -l".to_string()]);
    assert_eq!(
        summary.check("check_device").and_then(|c| c.error_code),
        Some("ERR_ASSERTION")
    );
}

#[test]
fn missing_adb_binary_is_a_dependency_failure() {
    let mut host = ScriptedHost::healthy();
    let mut config = test_config();
    config.adb.command_path = "/definitely/not/here/adb".to_string();
    let (summary, console) = run(&mut host, &config);

    assert_eq!(summary.exit_code(), 1);
    assert!(host.commands.is_empty());
    assert_eq!(
        summary.check("check_device").and_then(|c| c.error_code),
        Some("ERR_DEPENDENCY")
    );
    assert!(console.contains("No usable adb: ADB executable not found at /definitely/not/here/adb"));
}

#[test]
fn long_device_listing_details_are_reported() {
    let mut host = ScriptedHost::healthy().respond(
        " devices",
        vec![InvocationResult::succeeded(
            "List of devices attached\nR58M123 device product:a52q model:SM_A525F device:a52q transport_id:3\n",
        )],
    );
    let (summary, console) = run(&mut host, &test_config());

    assert!(summary.passed());
    assert_eq!(host.issued("adb devices -l"), 1);
    assert!(console.contains("R58M123 model SM_A525F (transport 3)"));
}

#[test]
fn gate_passes_on_device_substring() {
    let mut host = ScriptedHost::new().respond(
        " devices",
        vec![InvocationResult::succeeded("List of devices attached\nR58M123\tdevice\n")],
    );
    let config = test_config();
    let mut console: Vec<u8> = Vec::new();
    let mut smoke = SmokeRun::new(&mut host, &config, &mut console, "trace-gate");
    assert!(check_device_connected(&mut smoke));
}

#[test]
fn build_failure_issues_no_install_commands() {
    let mut host = ScriptedHost::healthy().respond(
        "make build",
        vec![InvocationResult::failed(Some(2), "make: *** [build] Error 1")],
    );
    let (summary, _) = run(&mut host, &test_config());

    assert_eq!(summary.exit_code(), 1);
    assert_eq!(status_of(&summary, "build_apk"), StageStatus::Fail);
    assert_eq!(host.issued("uninstall"), 0);
    assert_eq!(host.issued(" install "), 0);
    assert_eq!(status_of(&summary, "install_apk"), StageStatus::Skip);
}

#[test]
fn build_timeout_is_recorded_as_timeout() {
    let mut host =
        ScriptedHost::healthy().respond("make build", vec![InvocationResult::timed_out()]);
    let (summary, console) = run(&mut host, &test_config());

    assert_eq!(summary.exit_code(), 1);
    assert_eq!(
        summary.check("build_apk").and_then(|c| c.error_code),
        Some("ERR_TIMEOUT")
    );
    assert!(console.contains("[timeout] Building Termux APK after 120s"));
}

#[test]
fn uninstall_failure_does_not_stop_the_run() {
    let mut host = ScriptedHost::healthy().respond(
        "uninstall",
        vec![InvocationResult::failed(
            Some(1),
            "Failure [DELETE_FAILED_INTERNAL_ERROR]",
        )],
    );
    let (summary, _) = run(&mut host, &test_config());

    assert!(summary.passed());
    assert_eq!(status_of(&summary, "uninstall_previous"), StageStatus::Warn);
    assert_eq!(host.issued(" install "), 1);
}

#[test]
fn missing_package_after_install_fails_the_run() {
    let mut host = ScriptedHost::healthy().respond(
        "pm list packages",
        vec![InvocationResult::succeeded("package:com.termux.api\n")],
    );
    let (summary, console) = run(&mut host, &test_config());

    assert_eq!(summary.exit_code(), 1);
    assert_eq!(status_of(&summary, "install_apk"), StageStatus::Pass);
    assert_eq!(status_of(&summary, "verify_install"), StageStatus::Fail);
    assert!(console.contains("com.termux package not found after installation"));
    assert_eq!(host.issued("am start"), 0);
}

#[test]
fn empty_grep_result_is_a_mismatch() {
    let mut host = ScriptedHost::healthy().respond(
        "pm list packages",
        vec![InvocationResult::failed(Some(1), "")],
    );
    let (summary, _) = run(&mut host, &test_config());

    assert_eq!(
        summary.check("verify_install").and_then(|c| c.error_code),
        Some("ERR_ASSERTION")
    );
    assert!(!summary.passed());
}

#[test]
fn adb_error_during_verification_is_an_execution_failure() {
    let mut host = ScriptedHost::healthy().respond(
        "pm list packages",
        vec![InvocationResult::failed(
            Some(1),
            "error: no devices/emulators found\n",
        )],
    );
    let (summary, console) = run(&mut host, &test_config());

    assert!(!summary.passed());
    assert_eq!(
        summary.check("verify_install").and_then(|c| c.error_code),
        Some("ERR_EXECUTION")
    );
    assert!(!console.contains("package not found after installation"));

    let mut host = ScriptedHost::healthy().respond(
        "pm list packages",
        vec![InvocationResult::failed(Some(255), "")],
    );
    let (summary, _) = run(&mut host, &test_config());
    assert_eq!(
        summary.check("verify_install").and_then(|c| c.error_code),
        Some("ERR_EXECUTION")
    );
}

#[test]
fn launch_error_text_fails_even_with_zero_exit() {
    let mut host = ScriptedHost::healthy().respond(
        "am start",
        vec![InvocationResult::succeeded(
            "Starting: Intent { cmp=com.termux/.app.TermuxActivity }\nError type 3\nError: Activity class {com.termux/com.termux.app.TermuxActivity} does not exist.\n",
        )],
    );
    let (summary, _) = run(&mut host, &test_config());

    assert_eq!(status_of(&summary, "launch_app"), StageStatus::Fail);
    assert_eq!(host.issued("input text"), 0);
}

#[test]
fn interaction_types_each_command_then_enter() {
    let mut host = ScriptedHost::healthy();
    let config = test_config();
    let (summary, _) = run(&mut host, &config);

    assert_eq!(status_of(&summary, "terminal_interaction"), StageStatus::Pass);
    assert_eq!(host.issued("input text"), 9);
    assert_eq!(host.issued("input keyevent 66"), 9);
    assert_eq!(host.issued("adb shell input text 'echo%s\\$PATH'"), 1);
    assert_eq!(host.issued("adb shell input text /system/bin/ls"), 1);

    let text_positions: Vec<usize> = host
        .commands
        .iter()
        .enumerate()
        .filter(|(_, c)| c.contains("input text") || c.contains("input keyevent"))
        .map(|(i, _)| i)
        .collect();
    for pair in text_positions.chunks(2) {
        assert!(host.commands[pair[0]].contains("input text"));
        assert!(host.commands[pair[1]].contains("input keyevent"));
    }

    // One type delay plus one settle wait per step.
    let settle_total: Duration = config
        .interaction
        .iter()
        .map(|step| Duration::from_millis(step.settle_ms))
        .sum();
    let waits: Duration = host.pauses.iter().sum();
    assert_eq!(waits, settle_total + Duration::from_secs(9));
}

#[test]
fn interaction_failures_never_change_the_result() {
    let mut host = ScriptedHost::healthy().respond(
        "shell input",
        vec![InvocationResult::failed(Some(255), "error: closed")],
    );
    let (summary, _) = run(&mut host, &test_config());

    assert!(summary.passed());
    let check = summary.check("terminal_interaction").expect("check");
    assert_eq!(check.status, StageStatus::Warn);
    assert_eq!(check.message.as_deref(), Some("18 of 18 input events failed"));
}

#[test]
fn custom_interaction_script_is_used() {
    let mut host = ScriptedHost::healthy();
    let mut config = test_config();
    config.interaction = vec![InteractionStep::new("uname -a", 0)];
    let (summary, _) = run(&mut host, &config);

    assert!(summary.passed());
    assert_eq!(host.issued("input text"), 1);
    assert_eq!(host.issued("input text uname%s-a"), 1);
}

#[test]
fn bundled_binaries_warn_without_failing() {
    let mut host =
        ScriptedHost::healthy().respond("wc -l", vec![InvocationResult::succeeded("42\n")]);
    let (summary, console) = run(&mut host, &test_config());

    assert!(summary.passed());
    assert_eq!(status_of(&summary, "bootstrap_check"), StageStatus::Warn);
    assert!(console.contains(
        "Found 42 files in /data/data/com.termux/files/usr/bin (expected 0 for native-only implementation)"
    ));
    assert!(!console.contains("No bootstrap files found"));
}

#[test]
fn failed_bootstrap_listing_is_only_a_warning() {
    let mut host = ScriptedHost::healthy().respond(
        "wc -l",
        vec![InvocationResult::failed(Some(1), "error: device offline")],
    );
    let (summary, console) = run(&mut host, &test_config());

    assert!(summary.passed());
    assert_eq!(summary.exit_code(), 0);
    let check = summary.check("bootstrap_check").expect("check");
    assert_eq!(check.status, StageStatus::Warn);
    assert_eq!(check.error_code, Some("ERR_EXECUTION"));
    assert!(!console.contains("No bootstrap files found"));
}

#[test]
fn failed_process_listing_is_only_a_warning() {
    let mut host = ScriptedHost::healthy().respond(
        "shell ps",
        vec![InvocationResult::failed(Some(1), "")],
    );
    let (summary, _) = run(&mut host, &test_config());

    assert!(summary.passed());
    let check = summary.check("process_listing").expect("check");
    assert_eq!(check.status, StageStatus::Warn);
    assert_eq!(status_of(&summary, "screenshot"), StageStatus::Warn);
    assert_eq!(host.issued("screencap"), 1);
}

#[test]
fn startup_wait_polls_until_the_process_appears() {
    let mut host = ScriptedHost::healthy().respond(
        "pidof",
        vec![
            InvocationResult::failed(Some(1), ""),
            InvocationResult::failed(Some(1), ""),
            InvocationResult::succeeded("4242\n"),
        ],
    );
    let (summary, console) = run(&mut host, &test_config());

    assert_eq!(status_of(&summary, "wait_for_startup"), StageStatus::Pass);
    assert_eq!(host.issued("pidof"), 3);
    assert!(console.contains("com.termux running as pid 4242"));
}

#[test]
fn startup_wait_is_bounded_and_diagnostic() {
    let mut host =
        ScriptedHost::healthy().respond("pidof", vec![InvocationResult::failed(Some(1), "")]);
    let (summary, _) = run(&mut host, &test_config());

    assert!(summary.passed());
    assert_eq!(status_of(&summary, "wait_for_startup"), StageStatus::Warn);
    assert_eq!(host.issued("pidof"), 5);
}

#[test]
fn poll_attempts_cover_the_budget() {
    assert_eq!(
        startup_poll_attempts(Duration::from_secs(5), Duration::from_millis(1000)),
        5
    );
    assert_eq!(
        startup_poll_attempts(Duration::from_secs(5), Duration::from_millis(1500)),
        4
    );
    assert_eq!(startup_poll_attempts(Duration::ZERO, Duration::from_millis(500)), 1);
}

#[test]
fn screenshot_problems_are_warnings() {
    let mut host = ScriptedHost::healthy().respond(
        "screencap",
        vec![InvocationResult::failed(Some(1), "")],
    );
    let (summary, _) = run(&mut host, &test_config());
    assert!(summary.passed());
    assert_eq!(status_of(&summary, "screenshot"), StageStatus::Warn);
    assert!(summary.artifacts.is_empty());
}

#[test]
fn serial_is_threaded_through_every_adb_call() {
    let mut host = ScriptedHost::healthy();
    let mut config = test_config();
    config.adb.serial = "R58M123".to_string();
    let (summary, _) = run(&mut host, &config);

    assert!(summary.passed());
    assert_eq!(summary.serial.as_deref(), Some("R58M123"));
    let adb_calls: Vec<&String> = host
        .commands
        .iter()
        .filter(|c| c.starts_with("adb "))
        .collect();
    assert!(!adb_calls.is_empty());
    assert!(adb_calls.iter().all(|c| c.starts_with("adb -s R58M123 ")));
}

#[test]
fn invoke_prints_status_and_outcome_lines() {
    let mut host = ScriptedHost::new()
        .respond("ok-cmd", vec![InvocationResult::succeeded("hello\n")])
        .respond("bad-cmd", vec![InvocationResult::failed(Some(3), "nope\n")]);
    let config = test_config();
    let mut console: Vec<u8> = Vec::new();
    {
        let mut smoke = SmokeRun::new(&mut host, &config, &mut console, "trace-io");
        let ok = smoke.invoke(smoke.invocation("ok-cmd", "Doing good"));
        assert!(ok.success());
        let bad = smoke.invoke(smoke.invocation("bad-cmd", "Doing bad"));
        assert!(!bad.success());
        assert_eq!(bad.output, "nope\n");
    }
    let text = String::from_utf8_lossy(&console);
    assert!(text.contains("--> Doing good...\n[ok] Doing good\n    output: hello\n"));
    assert!(text.contains("--> Doing bad...\n[fail] Doing bad (exit code 3)\n    error: nope\n"));
}
