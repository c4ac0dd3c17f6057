//! CLI error handling with user-friendly messages.

use std::fmt;
use std::process;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Failed to prepare or run ingestion
    Ingest(String),
    /// Failed to render a deferred transform
    Render(String),
    /// Failed to create the HTTP client
    Http(String),
    /// Failed to write an output file
    FileWrite {
        path: String,
        error: std::io::Error,
    },
}

impl CliError {
    /// Exit the process with an error message and a non-zero code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {self}");
        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {msg}"),
            CliError::Ingest(msg) => write!(f, "Ingestion failed: {msg}"),
            CliError::Render(msg) => write!(f, "Render failed: {msg}"),
            CliError::Http(msg) => write!(f, "Failed to create HTTP client: {msg}"),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{path}': {error}")
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}
