use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use termux_native_smoke_lib::app::config::{load_config, load_config_from_path, ConfigOverrides};
use termux_native_smoke_lib::app::logging::init_logging;
use termux_native_smoke_lib::app::smoke::invocation::ShellHost;
use termux_native_smoke_lib::app::smoke::stages::run_termux_smoke_test;
use tracing::error;
use uuid::Uuid;

/// Builds, installs and exercises Termux on an attached device, then checks
/// that no bootstrap binaries were bundled.
#[derive(Debug, Parser)]
#[command(name = "termux-smoke", version, about)]
struct Cli {
    /// Device serial passed to adb as `-s`.
    #[arg(long, env = "ANDROID_SERIAL")]
    serial: Option<String>,

    /// Config file (defaults to $TERMUX_SMOKE_CONFIG_PATH or ~/.termux_smoke_config.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// APK to install instead of the configured build artifact.
    #[arg(long)]
    apk: Option<String>,

    /// Host path for the final screenshot.
    #[arg(long)]
    screenshot: Option<String>,

    /// Print the summary as JSON; progress lines move to stderr.
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let trace_id = Uuid::new_v4().to_string();
    let loaded = match &cli.config {
        Some(path) => load_config_from_path(path, &trace_id),
        None => load_config(&trace_id),
    };
    let config = match loaded {
        Ok(config) => config.apply_overrides(ConfigOverrides {
            serial: cli.serial.clone(),
            apk_path: cli.apk.clone(),
            screenshot_path: cli.screenshot.clone(),
        }),
        Err(err) => {
            error!(trace_id = %trace_id, error = %err, "failed to load config");
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let mut host = ShellHost::new(trace_id.as_str());
    let summary = if cli.json {
        let mut stderr = io::stderr();
        run_termux_smoke_test(&mut host, &config, &mut stderr, &trace_id)
    } else {
        let mut stdout = io::stdout();
        run_termux_smoke_test(&mut host, &config, &mut stdout, &trace_id)
    };

    let output = if cli.json {
        match summary.to_json() {
            Ok(json) => json,
            Err(err) => {
                error!(trace_id = %trace_id, error = %err, "failed to serialize summary");
                eprintln!("{err}");
                std::process::exit(1);
            }
        }
    } else {
        summary.render_text()
    };
    let mut stdout = io::stdout();
    let _ = writeln!(stdout, "{output}");
    let _ = stdout.flush();

    std::process::exit(summary.exit_code());
}
