//! Timed external command execution.
//!
//! The shell backend and the swipe shortcuts both run short-lived helper
//! programs.  A helper that hangs (a wedged system service, a prompt waiting
//! on stdin) must not stall the pointer pipeline, so every run is bounded by
//! a deadline and the child is killed when the deadline passes.
//!
//! # Why `kill_on_drop`? (for beginners)
//!
//! `tokio::time::timeout` cancels the *future* waiting on the child, which
//! drops the `Child` handle.  Without `kill_on_drop(true)` dropping the handle
//! leaves the process running in the background; with it, tokio sends
//! `SIGKILL` as part of the drop.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::application::pointer_sink::InjectionError;
use crate::application::system_action::CommandRunner;

/// Runs commands with `tokio::process`, killing them after `timeout`.
#[derive(Debug, Clone)]
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<(), InjectionError> {
        debug!(program, ?args, "running command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| InjectionError::Unavailable(format!("cannot spawn {program}: {e}")))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(program, timeout = ?self.timeout, "command timed out and was killed");
                return Err(InjectionError::Timeout(self.timeout));
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(InjectionError::Rejected(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
    }
}
