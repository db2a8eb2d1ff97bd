//! External command execution for route table mutation.
//!
//! Route commands are run directly (no intermediate shell) from a program
//! name and an argument vector. [`shellquote`] and [`render_command`] exist
//! only to produce readable, copy-pasteable command lines for logs.
//!
//! # Example
//!
//! ```ignore
//! use ripsync_common::shell::{self, CommandRunner, ShellRunner, IP_CMD};
//!
//! let runner = ShellRunner::new();
//! let args = vec!["route".to_string(), "show".to_string()];
//! let result = runner.run(IP_CMD, &args).await?;
//! if !result.success() {
//!     eprintln!("Failed with code {}: {}", result.exit_code, result.stderr);
//! }
//! ```

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{RipsyncError, RipsyncResult};

/// Path to the `ip` command (iproute2) used on Linux.
///
/// Route tools are run by absolute path, never looked up on `PATH`. On
/// merged-usr distributions `/sbin` links to `/usr/sbin`, so this also
/// finds an iproute2 installed there.
pub const IP_CMD: &str = "/sbin/ip";

/// Path to the BSD `route` command used on Darwin.
pub const ROUTE_CMD: &str = "/sbin/route";

/// Exit status the route tools return when the route is already present
/// in the kernel table.
pub const ROUTE_EXISTS_EXIT_CODE: i32 = 2;

/// Regex for characters that need escaping in shell double-quotes.
/// Matches: $, `, ", \, and newline
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Characters that force an argument to be quoted when rendered.
static NEEDS_QUOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^A-Za-z0-9_./:@%+=,-]"#).expect("Invalid regex pattern"));

/// Quotes a string for safe use in shell commands.
///
/// The string is wrapped in double quotes and `$`, `` ` ``, `"`, `\` and
/// newline are backslash-escaped.
///
/// # Example
///
/// ```
/// use ripsync_common::shell::shellquote;
///
/// assert_eq!(shellquote("simple"), "\"simple\"");
/// assert_eq!(shellquote("with$var"), "\"with\\$var\"");
/// assert_eq!(shellquote("with\"quote"), "\"with\\\"quote\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Renders a program and its arguments as a single command line.
///
/// Arguments made only of harmless characters are left bare, everything
/// else goes through [`shellquote`].
pub fn render_command(program: &str, args: &[String]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        if arg.is_empty() || NEEDS_QUOTE_RE.is_match(arg) {
            line.push_str(&shellquote(arg));
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Result of an external command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// The exit code of the command (0 = success, -1 = killed by signal).
    pub exit_code: i32,
    /// The captured stdout output.
    pub stdout: String,
    /// The captured stderr output.
    pub stderr: String,
}

impl ExecResult {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns true if the route tool reported the route as already present.
    pub fn route_exists(&self) -> bool {
        self.exit_code == ROUTE_EXISTS_EXIT_CODE
    }

    /// Returns the combined output (stdout + stderr) for error messages.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Capability to run an external program to completion.
///
/// `Ok` carries the exit status of a process that ran; `Err` means the
/// process could not be started or did not finish.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` and waits for it to exit.
    async fn run(&self, program: &str, args: &[String]) -> RipsyncResult<ExecResult>;
}

/// Production [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    timeout: Option<Duration>,
}

impl ShellRunner {
    /// Creates a runner that waits for commands indefinitely.
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// Creates a runner that gives up on commands after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// Returns the configured timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, program: &str, args: &[String]) -> RipsyncResult<ExecResult> {
        exec(program, args, self.timeout).await
    }
}

/// Executes an external command asynchronously.
///
/// # Arguments
///
/// * `program` - The program to execute
/// * `args` - Its argument vector
/// * `timeout` - Optional upper bound on the run time; the child is killed
///   when it elapses
///
/// # Returns
///
/// * `Ok(ExecResult)` - The command ran and exited
/// * `Err(RipsyncError)` - The command could not be spawned or timed out
pub async fn exec(
    program: &str,
    args: &[String],
    timeout: Option<Duration>,
) -> RipsyncResult<ExecResult> {
    let command_line = render_command(program, args);
    tracing::debug!(command = %command_line, "Executing command");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match timeout {
        Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
            Ok(output) => output,
            Err(_) => {
                return Err(RipsyncError::CommandTimeout {
                    command: command_line,
                    secs: limit.as_secs(),
                })
            }
        },
        None => cmd.output().await,
    }
    .map_err(|e| RipsyncError::ShellExec {
        command: command_line.clone(),
        source: e,
    })?;

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    let result = ExecResult {
        exit_code,
        stdout,
        stderr,
    };

    if result.success() {
        tracing::trace!(command = %command_line, exit_code, "Command succeeded");
    } else {
        tracing::debug!(
            command = %command_line,
            exit_code,
            stderr = %result.stderr,
            "Command exited non-zero"
        );
    }

    Ok(result)
}
