//! Platform extension reconciler for azfleet worker VMs.
//!
//! Every worker VM must carry four Azure platform extensions:
//!
//! | Extension | Linux | Windows |
//! |-----------|-------|---------|
//! | Monitor agent | `AzureMonitorLinuxAgent` | `AzureMonitorWindowsAgent` |
//! | Guest configuration | `AzurePolicyforLinux` | `AzurePolicyforWindows` |
//! | AAD login | `AADSSHLoginForLinux` | `AADLoginForWindows` |
//! | Guest attestation | `GuestAttestation` | `GuestAttestation` |
//!
//! The [`ExtensionReconciler`] starts a VM if needed, waits for it to run,
//! lists its installed extensions and issues a fire-and-forget install for
//! each one that is missing. Installed extensions are only reported, so
//! running the reconciler again on a converged VM issues no installs.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use azfleet_az::AzCli;
//! use azfleet_control::{ControlConfig, VmFleetController};
//! use azfleet_core::ResourceGroupRef;
//! use azfleet_extensions::ExtensionReconciler;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let az = Arc::new(AzCli::locate()?);
//! let control = VmFleetController::new(
//!     az,
//!     ResourceGroupRef::new("0000-sub", "workers"),
//!     ControlConfig::default(),
//! );
//! let mut reconciler = ExtensionReconciler::new(control, Some("worker-uami".to_string()));
//! let report = reconciler.reconcile(&["worker-1".to_string()]).await?;
//! println!("{} VMs processed", report.vms.len());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod error;
pub mod reconciler;
pub mod types;

pub use catalog::{check_extension, install_command, ExtensionKind};
pub use error::{ExtensionError, Result};
pub use reconciler::ExtensionReconciler;
pub use types::{ExtensionListing, ExtensionRecord, FleetReport, VmReport};
