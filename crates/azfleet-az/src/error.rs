//! Error types for the command gateway.
//!
//! Azure reports most failures as free text on stderr. All substring matching
//! on that text lives in [`classify`] so the recognised phrases are kept in one
//! place and tested together.

use thiserror::Error;

/// A result type using `AzError`.
pub type Result<T> = std::result::Result<T, AzError>;

/// Errors raised while running an Azure CLI command.
#[derive(Debug, Error)]
pub enum AzError {
    /// The CLI process could not be launched.
    #[error("failed to launch {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The command exited with a non-zero status.
    #[error("Error {description}: {stderr}")]
    CommandFailed {
        /// Human-readable description of the command.
        description: String,
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The command succeeded but printed nothing and the caller required data.
    #[error("No json data returned for {description}: {stderr}")]
    NoData {
        /// Human-readable description of the command.
        description: String,
        /// Captured standard error.
        stderr: String,
    },

    /// Standard output was not valid JSON.
    #[error("failed to decode output of {description}: {source}")]
    Decode {
        /// Human-readable description of the command.
        description: String,
        /// JSON parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The `az` executable could not be found.
    #[error("{0} not found in PATH")]
    Locate(String),
}

impl AzError {
    /// Classify this error by the diagnostic text Azure returned.
    #[must_use]
    pub fn kind(&self) -> AzErrorKind {
        match self {
            Self::CommandFailed { stderr, .. } | Self::NoData { stderr, .. } => classify(stderr),
            Self::Spawn { .. } | Self::Decode { .. } | Self::Locate(_) => AzErrorKind::Other,
        }
    }

    /// Returns true if Azure reported that the referenced object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == AzErrorKind::NotFound
    }
}

/// Coarse classification of an Azure failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AzErrorKind {
    /// The referenced object does not exist (e.g. a deleted directory user).
    NotFound,
    /// The platform rejected the request because of a conflicting operation or
    /// exhausted capacity.
    Conflict,
    /// The spurious "guest agent detected running" message reported while a
    /// start operation is still pending.
    BenignStartWarning,
    /// Anything else.
    Other,
}

const NOT_FOUND_MARKERS: &[&str] = &["does not exist"];

const BENIGN_START_MARKERS: &[&str] = &["VM guest agent was detected running"];

const CONFLICT_MARKERS: &[&str] = &[
    "(Conflict)",
    "Code: Conflict",
    "ResourceExists",
    "OperationNotAllowed",
    "AllocationFailed",
];

/// Classify free-form diagnostic text returned by the Azure CLI.
#[must_use]
pub fn classify(text: &str) -> AzErrorKind {
    let contains_any = |markers: &[&str]| markers.iter().any(|m| text.contains(m));

    if contains_any(CONFLICT_MARKERS) {
        AzErrorKind::Conflict
    } else if contains_any(BENIGN_START_MARKERS) {
        AzErrorKind::BenignStartWarning
    } else if contains_any(NOT_FOUND_MARKERS) {
        AzErrorKind::NotFound
    } else {
        AzErrorKind::Other
    }
}
