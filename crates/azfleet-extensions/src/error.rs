//! Error types for extension reconciliation.

use azfleet_az::AzError;
use azfleet_control::ControlError;
use thiserror::Error;

/// A result type using `ExtensionError`.
pub type Result<T> = std::result::Result<T, ExtensionError>;

/// Errors that can occur while reconciling extensions.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// VM discovery or control failed.
    #[error(transparent)]
    Control(#[from] ControlError),

    /// A gateway command failed.
    #[error(transparent)]
    Az(#[from] AzError),

    /// The extension listing did not have the expected shape.
    #[error("unexpected extension listing for {vm}: {source}")]
    Decode {
        /// VM whose extensions were listed.
        vm: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}
