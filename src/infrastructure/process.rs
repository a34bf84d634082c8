//! External process invocation.
//!
//! [`CommandRunner`] is the single place a child process is started. It never
//! interprets exit status; callers decide what a failure means.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::domain::{AppError, Result};

/// Exit status and captured output of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Stdout and stderr joined, for error reports.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }

    /// Human-readable exit status.
    #[must_use]
    pub fn status_text(&self) -> String {
        self.code.map_or_else(
            || "terminated by signal".to_string(),
            |code| format!("exit status {code}"),
        )
    }

    /// Converts a non-zero exit into `AppError::Tool`.
    ///
    /// # Errors
    /// Returns `AppError::Tool` carrying `tool` and the captured output.
    pub fn check(self, tool: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(AppError::tool(tool, self.status_text(), self.diagnostic()))
        }
    }
}

/// Runs a tool with arguments and optional stdin, capturing its output.
pub trait CommandRunner: Send + Sync {
    /// # Errors
    /// Returns error only if the process could not be started or waited on.
    fn run(&self, tool: &str, args: &[&str], stdin: Option<&str>) -> Result<CommandOutput>;
}

/// Runs real processes with `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, tool: &str, args: &[&str], stdin: Option<&str>) -> Result<CommandOutput> {
        let mut command = Command::new(tool);
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = command
            .spawn()
            .map_err(|e| AppError::io(format!("Failed to start {tool}"), e))?;

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                let written = pipe.write_all(input.as_bytes());
                // dropping the pipe closes stdin
                drop(pipe);
                if let Err(e) = written {
                    // reap the child before reporting
                    if let Err(wait) = child.wait() {
                        tracing::warn!(tool, error = %wait, "Failed to wait for child");
                    }
                    return Err(AppError::io(format!("Failed to write to {tool}"), e));
                }
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| AppError::io(format!("Failed to wait for {tool}"), e))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_maps_failure_to_tool_error() {
        let err = CommandOutput::failed(1, "bad user\n").check("useradd").unwrap_err();
        match err {
            AppError::Tool {
                tool,
                message,
                diagnostic,
            } => {
                assert_eq!(tool, "useradd");
                assert_eq!(message, "exit status 1");
                assert_eq!(diagnostic, "bad user");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_diagnostic_joins_streams() {
        let output = CommandOutput {
            code: None,
            stdout: "out\n".into(),
            stderr: "err\n".into(),
        };
        assert_eq!(output.diagnostic(), "out\nerr");
        assert_eq!(output.status_text(), "terminated by signal");
        assert!(CommandOutput::ok("").check("x").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_feeds_stdin() {
        let output = SystemRunner.run("cat", &[], Some("a\nb\n")).unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "a\nb\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_stdin_write_failure_is_io_error() {
        // `true` exits without reading, so a large input hits a closed pipe
        let input = "x".repeat(4 << 20);
        let err = SystemRunner.run("true", &[], Some(&input)).unwrap_err();
        match err {
            AppError::Io { message, .. } => assert_eq!(message, "Failed to write to true"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_binary_is_io_error() {
        let err = SystemRunner
            .run("definitely-not-a-real-tool-4242", &[], None)
            .unwrap_err();
        assert!(matches!(err, AppError::Io { .. }));
    }
}
