//! Error types for orphan cleanup.

use std::path::PathBuf;

use azfleet_az::AzError;
use thiserror::Error;

/// A result type using `RbacError`.
pub type Result<T> = std::result::Result<T, RbacError>;

/// Errors that can occur while planning or removing role assignments.
#[derive(Debug, Error)]
pub enum RbacError {
    /// A gateway command failed.
    #[error(transparent)]
    Az(#[from] AzError),

    /// The report file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Report path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The report file is not a valid stale-identity report.
    #[error("invalid stale-identity report {}: {source}", path.display())]
    Parse {
        /// Report path.
        path: PathBuf,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A gateway reply did not have the expected shape.
    #[error("unexpected {what} payload: {source}")]
    Decode {
        /// What was being decoded.
        what: &'static str,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },
}
