//! External tool discovery and execution.
//!
//! All heavy computation is delegated to external binaries; this module
//! finds them, runs them as blocking subprocesses and applies the optional
//! bounded wait.

use crate::error::{HybseqError, Result};
use log::debug;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Locates an external tool binary.
///
/// An environment variable named `HYBSEQ_<TOOL>` (uppercased, with `.` and
/// `-` mapped to `_`, e.g. `HYBSEQ_SPADES_PY`) overrides the PATH search.
pub fn find_tool(name: &str) -> Result<PathBuf> {
    let env_name = format!(
        "HYBSEQ_{}",
        name.to_uppercase().replace(['.', '-'], "_")
    );
    if let Ok(path) = std::env::var(&env_name) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
    }
    which::which(name).map_err(|_| HybseqError::ToolNotFound {
        tool: name.to_string(),
    })
}

/// Runs a command to completion, collecting stdout and stderr.
///
/// With a timeout, the command runs on a worker thread and the caller waits
/// at most that long; expiry yields a [`HybseqError::ToolTimeout`]. The exit
/// status is returned untouched so callers decide whether non-zero is fatal.
pub fn run_tool(mut command: Command, tool: &str, timeout: Option<Duration>) -> Result<Output> {
    debug!("{command:?}");
    match timeout {
        None => Ok(command.output()?),
        Some(timeout) => {
            let (tx, rx) = mpsc::channel();
            let tool_name = tool.to_string();
            thread::spawn(move || {
                let _ = tx.send(command.output());
            });
            match rx.recv_timeout(timeout) {
                Ok(output) => Ok(output?),
                Err(mpsc::RecvTimeoutError::Timeout) => Err(HybseqError::ToolTimeout {
                    tool: tool_name,
                    seconds: timeout.as_secs(),
                }),
                Err(mpsc::RecvTimeoutError::Disconnected) => Err(HybseqError::IllegalState(
                    format!("worker thread running {tool_name} crashed"),
                )),
            }
        }
    }
}

/// Maps a non-zero exit status to a [`HybseqError::ToolFailed`] carrying the
/// tail of stderr.
pub fn check_status(output: &Output, tool: &str) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail: String = stderr
        .lines()
        .rev()
        .take(5)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("; ");
    Err(HybseqError::ToolFailed {
        tool: tool.to_string(),
        status: output.status.code().unwrap_or(-1),
        detail,
    })
}
