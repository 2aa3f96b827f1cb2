use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::app::error::AppError;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub fn run_command_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // Own process group, so a timeout can take down everything a shell line started.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let mut child = command
        .spawn()
        .map_err(|err| AppError::system(format!("Failed to spawn {program}: {err}"), trace_id))?;

    // Drain stdout/stderr in parallel; otherwise, a chatty child process can block once the pipe
    // buffer fills, and we will incorrectly hit the timeout.
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stdout", trace_id))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stderr", trace_id))?;

    let stdout_handle = spawn_drain(stdout);
    let stderr_handle = spawn_drain(stderr);

    let start = Instant::now();
    let exit_code = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status.code(),
            Ok(None) => {
                if start.elapsed() > timeout {
                    kill_process_tree(&mut child);
                    let _ = child.wait();
                    // Readers are left detached: a descendant that escaped the group may
                    // still hold the pipes open.
                    drop(stdout_handle);
                    drop(stderr_handle);
                    debug!(
                        trace_id = %trace_id,
                        program = %program,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "command timed out"
                    );
                    return Err(AppError::timeout(
                        format!("Command timed out after {}s", timeout.as_secs_f32()),
                        trace_id,
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return Err(AppError::system(
                    format!("Failed to poll command: {err}"),
                    trace_id,
                ));
            }
        }
    };

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();
    debug!(
        trace_id = %trace_id,
        program = %program,
        exit_code = ?exit_code,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "command finished"
    );

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).to_string(),
        stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
        exit_code,
    })
}

/// Runs a full command line through the host shell, so pipes and redirects
/// in `command_line` behave as typed.
pub fn run_shell_with_timeout(
    command_line: &str,
    timeout: Duration,
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    if command_line.trim().is_empty() {
        return Err(AppError::validation("command is required", trace_id));
    }
    let (program, args) = shell_invocation(command_line);
    run_command_with_timeout(program, &args, timeout, trace_id)
}

fn shell_invocation(command_line: &str) -> (&'static str, Vec<String>) {
    if cfg!(windows) {
        ("cmd.exe", vec!["/C".to_string(), command_line.to_string()])
    } else {
        ("sh", vec!["-c".to_string(), command_line.to_string()])
    }
}

#[cfg(unix)]
fn kill_process_tree(child: &mut Child) {
    if let Ok(pgid) = i32::try_from(child.id()) {
        // SAFETY: plain signal delivery to the group created at spawn; no memory is shared.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) {
    let _ = child.kill();
}

fn spawn_drain<R>(reader: R) -> JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut reader = reader;
        let mut buffer = Vec::<u8>::new();
        let mut temp = [0u8; 4096];
        loop {
            match reader.read(&mut temp) {
                Ok(0) => break,
                Ok(count) => buffer.extend_from_slice(&temp[..count]),
                Err(_) => break,
            }
        }
        buffer
    })
}
