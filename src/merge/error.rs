//! Error types for part concatenation.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Input directory or file missing
    E001InputNotFound,
    /// E002: No part files to merge
    E002NoInput,
    /// E003: Part file could not be read or decoded
    E003ReadFailure,
    /// E004: Configuration missing or invalid
    E004InvalidConfig,
    /// E005: Write operation failed
    E005WriteFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001InputNotFound => "E001",
            Self::E002NoInput => "E002",
            Self::E003ReadFailure => "E003",
            Self::E004InvalidConfig => "E004",
            Self::E005WriteFailure => "E005",
        }
    }
}

/// Errors that can occur while merging part files
#[derive(Debug, Error)]
pub enum MergeError {
    /// Input directory or file does not exist
    #[error("[{code}] Input not found: {}", path.display())]
    InputNotFound { code: &'static str, path: PathBuf },

    /// Nothing to merge; the destination was not touched
    #[error("[{code}] No part files to merge into {}", destination.display())]
    NoInput {
        code: &'static str,
        destination: PathBuf,
    },

    /// Part file could not be read
    #[error("[{code}] Failed to read part {}: {message}", path.display())]
    ReadFailure {
        code: &'static str,
        path: PathBuf,
        message: String,
    },

    /// Invalid configuration provided
    #[error("[{code}] Invalid configuration: {message}")]
    InvalidConfig { code: &'static str, message: String },

    /// Write operation failed
    #[error("[{code}] Write operation failed for {}: {message}", path.display())]
    WriteFailure {
        code: &'static str,
        path: PathBuf,
        message: String,
    },
}

impl MergeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InputNotFound { .. } => ErrorCode::E001InputNotFound,
            Self::NoInput { .. } => ErrorCode::E002NoInput,
            Self::ReadFailure { .. } => ErrorCode::E003ReadFailure,
            Self::InvalidConfig { .. } => ErrorCode::E004InvalidConfig,
            Self::WriteFailure { .. } => ErrorCode::E005WriteFailure,
        }
    }

    pub fn input_not_found(path: &Path) -> Self {
        Self::InputNotFound {
            code: ErrorCode::E001InputNotFound.as_str(),
            path: path.to_path_buf(),
        }
    }

    pub fn no_input(destination: &Path) -> Self {
        Self::NoInput {
            code: ErrorCode::E002NoInput.as_str(),
            destination: destination.to_path_buf(),
        }
    }

    pub fn read_failure(path: &Path, reason: impl Display) -> Self {
        Self::ReadFailure {
            code: ErrorCode::E003ReadFailure.as_str(),
            path: path.to_path_buf(),
            message: reason.to_string(),
        }
    }

    pub fn invalid_config(message: String) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::E004InvalidConfig.as_str(),
            message,
        }
    }

    pub fn write_failure(path: &Path, reason: impl Display) -> Self {
        Self::WriteFailure {
            code: ErrorCode::E005WriteFailure.as_str(),
            path: path.to_path_buf(),
            message: reason.to_string(),
        }
    }
}

/// Result type alias for MergeError
pub type Result<T> = std::result::Result<T, MergeError>;
