//! Error Types
//!
//! Two error families cover the engine:
//!
//! - [`FreyrError`] - fatal setup and I/O failures surfaced through the
//!   crate-wide [`Result`] alias (config loading, thread spawning, sockets).
//! - [`CommandError`] - recoverable command failures. Handlers bubble these
//!   up with `?`; the command dispatcher is the only place that converts
//!   them into response-sink writes. A failed command never unwinds past
//!   the dispatcher and never disturbs the frame loop.

use thiserror::Error;

/// Fatal error conditions for engine setup and the surrounding binary.
#[derive(Error, Debug)]
pub enum FreyrError {
    /// File or socket I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A config file could not be opened or read.
    #[error("config file {path}: {message}")]
    Config {
        /// Path of the offending file
        path: String,
        /// What went wrong
        message: String,
    },

    /// Malformed command-line arguments.
    #[error("invalid command line: {0}")]
    Cli(String),
}

/// Recoverable failure of a single command.
///
/// Rendered through the response sink at level `E`; the command is
/// otherwise ignored.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Malformed or incomplete command arguments.
    #[error("{0}")]
    Usage(String),

    /// A named module, egress, group or tier does not exist.
    #[error("{0}")]
    NotFound(String),
}

impl CommandError {
    pub fn usage(message: impl Into<String>) -> Self {
        CommandError::Usage(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CommandError::NotFound(message.into())
    }
}

/// Alias for `Result<T, FreyrError>`.
pub type Result<T> = std::result::Result<T, FreyrError>;
