//! Error types for the integration test runner
//!
//! Every fatal condition maps onto one process exit code, so CI scripts
//! can tell a crashing subject apart from a wrong answer.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::testing::{RunStatus, SkippedCase};

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the runner
#[derive(Error, Debug)]
pub enum Error {
    // === Argument Errors ===
    #[error("{0}")]
    Argument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file '{}': {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },

    // === Run Errors ===
    #[error("{}", no_cases_message(.root, .skipped))]
    NoTestCases {
        root: PathBuf,
        skipped: Vec<SkippedCase>,
    },

    // === Workspace Errors ===
    #[error("Failed to prepare directory '{}': {source}", .path.display())]
    WorkspacePrepare {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove directory '{}': {source}", .path.display())]
    WorkspaceTeardown {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    // === IO Errors ===
    #[error("Failed to read file '{}': {error}", .path.display())]
    FileRead { path: PathBuf, error: String },

    #[error("Failed to write file '{}': {error}", .path.display())]
    FileWrite { path: PathBuf, error: String },
}

impl Error {
    /// Create a file read error
    pub fn file_read(path: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self::FileRead {
            path: path.into(),
            error: error.to_string(),
        }
    }

    /// Create a file write error
    pub fn file_write(path: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self::FileWrite {
            path: path.into(),
            error: error.to_string(),
        }
    }

    /// The run status this error terminates the process with
    pub fn status(&self) -> RunStatus {
        match self {
            Error::Argument(_) | Error::Config(_) | Error::ConfigParse { .. } => {
                RunStatus::InvalidArguments
            }
            Error::NoTestCases { .. } => RunStatus::NoTestCases,
            Error::WorkspacePrepare { .. }
            | Error::WorkspaceTeardown { .. }
            | Error::FileRead { .. }
            | Error::FileWrite { .. } => RunStatus::Environment,
        }
    }
}

fn no_cases_message(root: &std::path::Path, skipped: &[SkippedCase]) -> String {
    let mut message = format!("no test data was found in {}", root.display());
    if !skipped.is_empty() {
        message.push_str(&format!(" ({} incomplete cases skipped)", skipped.len()));
    }
    message
}
