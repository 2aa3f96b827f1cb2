pub mod app;

pub use app::config::{load_config, load_config_from_path, ConfigOverrides, SmokeConfig};
pub use app::smoke::invocation::{CommandHost, Invocation, InvocationResult, ShellHost};
pub use app::smoke::report::SmokeSummary;
pub use app::smoke::stages::{check_device_connected, run_termux_smoke_test};
