//! Error types for ripsync operations.
//!
//! This module defines the error types shared by the ripsync crates.
//! All errors implement `std::error::Error` via `thiserror`.

use std::io;
use thiserror::Error;

/// Result type alias for ripsync operations.
pub type RipsyncResult<T> = Result<T, RipsyncError>;

/// Errors that can occur during ripsync operations.
#[derive(Debug, Error)]
pub enum RipsyncError {
    /// Failed to execute an external command (spawn error).
    #[error("Failed to execute command '{command}': {source}")]
    ShellExec {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// External command did not finish within the configured timeout.
    #[error("Command timed out after {secs}s: '{command}'")]
    CommandTimeout {
        /// The command that hung.
        command: String,
        /// The timeout that elapsed.
        secs: u64,
    },

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Interface not found or has no IPv4 address.
    #[error("Interface '{interface}' not found or has no IPv4 address")]
    InterfaceNotFound {
        /// The interface name.
        interface: String,
    },

    /// Socket operation failed (bind, multicast join).
    #[error("Socket operation failed: {operation}: {source}")]
    Socket {
        /// The operation that failed.
        operation: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// No route command syntax exists for this platform.
    #[error("Unsupported platform '{platform}'")]
    UnsupportedPlatform {
        /// The platform identifier.
        platform: String,
    },

    /// Internal error (a daemon task stopped unexpectedly).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl RipsyncError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an interface not found error.
    pub fn interface_not_found(interface: impl Into<String>) -> Self {
        Self::InterfaceNotFound {
            interface: interface.into(),
        }
    }

    /// Creates a socket error.
    pub fn socket(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Socket {
            operation: operation.into(),
            source,
        }
    }

    /// Creates an unsupported platform error.
    pub fn unsupported_platform(platform: impl Into<String>) -> Self {
        Self::UnsupportedPlatform {
            platform: platform.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
