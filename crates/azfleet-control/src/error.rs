//! Error types for VM discovery and control.

use azfleet_az::AzError;
use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur while discovering or controlling VMs.
#[derive(Debug, Error)]
pub enum ControlError {
    /// A VM's OS profile exposed both or neither of the Windows and Linux
    /// configurations.
    #[error(
        "VM {vm} has an invalid OS profile (is_linux={is_linux}, is_windows={is_windows}): \
         exactly one of Linux or Windows is required"
    )]
    InvalidOsProfile {
        /// The VM being classified.
        vm: String,
        /// Whether a Linux configuration was present.
        is_linux: bool,
        /// Whether a Windows configuration was present.
        is_windows: bool,
    },

    /// A discovery payload did not have the expected shape.
    #[error("unexpected {what} payload: {source}")]
    Decode {
        /// What was being decoded.
        what: &'static str,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The command gateway failed.
    #[error(transparent)]
    Az(#[from] AzError),
}

impl ControlError {
    /// Returns true if the failure came from the Azure side rather than from
    /// malformed data.
    #[must_use]
    pub const fn is_gateway(&self) -> bool {
        matches!(self, Self::Az(_))
    }
}
