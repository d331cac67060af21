//! Child processes without console windows.

use std::process::{ExitStatus, Output};
use std::time::Duration;

use tokio::process::Command;

use crate::AppError;

/// `CREATE_NO_WINDOW` process creation flag.
pub const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub fn hidden(program: &str) -> Command {
    let mut cmd = Command::new(program);
    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);
    cmd.kill_on_drop(true);
    cmd
}

/// Runs `program` to completion, killing it after `timeout`.
pub async fn run_hidden(program: &str, args: &[&str], timeout: Duration) -> Result<Output, AppError> {
    let mut cmd = hidden(program);
    cmd.args(args);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(res) => res.map_err(AppError::Io),
        Err(_) => Err(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("{program} timed out after {}s", timeout.as_secs()),
        ))),
    }
}

/// PowerShell snippet that runs `program` elevated through UAC, waits, and
/// exits with its exit code.
pub fn powershell_elevated(program: &str, args: &[String]) -> String {
    let ps_args = args
        .iter()
        .map(|a| format!("'{}'", a.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "$p = Start-Process -FilePath '{}' -ArgumentList @({}) -Verb RunAs -Wait -PassThru; exit $p.ExitCode",
        program.replace('\'', "''"),
        ps_args
    )
}

pub async fn run_elevated(program: &str, args: &[String]) -> Result<ExitStatus, AppError> {
    let ps_cmd = powershell_elevated(program, args);
    hidden("powershell")
        .args(["-NoProfile", "-NonInteractive", "-Command", &ps_cmd])
        .status()
        .await
        .map_err(AppError::Io)
}

/// Decodes tool output. Lossy: console tools may print in the OEM code page.
pub fn output_text(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        text.push('\n');
        text.push_str(&stderr);
    }
    text
}
