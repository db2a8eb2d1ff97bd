//! Common infrastructure for the ripsync daemon.
//!
//! - [`shell`]: external command execution behind the [`CommandRunner`]
//!   capability, plus command-line rendering for logs
//! - [`error`]: error types shared by the ripsync crates
//!
//! # Example
//!
//! ```ignore
//! use ripsync_common::{CommandRunner, RipsyncResult, ShellRunner};
//!
//! async fn show_routes(runner: &dyn CommandRunner) -> RipsyncResult<String> {
//!     let args = vec!["route".to_string(), "show".to_string()];
//!     let result = runner.run(ripsync_common::shell::IP_CMD, &args).await?;
//!     Ok(result.stdout)
//! }
//! ```

pub mod error;
pub mod shell;

// Re-export commonly used items at crate root
pub use error::{RipsyncError, RipsyncResult};
pub use shell::{CommandRunner, ExecResult, ShellRunner};
