//! VM state model and power control for azfleet worker fleets.
//!
//! This crate discovers the VMs in a resource group, classifies their power
//! state, and starts deallocated workers on demand. All Azure calls go through
//! an [`azfleet_az::AzGateway`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │           Extension reconciler / fleet tooling               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    VmFleetController                         │
//! │  ┌─────────────┐ ┌─────────────────┐ ┌─────────────────────┐ │
//! │  │  Discovery  │ │  Start + capacity│ │  Wait for running   │ │
//! │  │  (list/get) │ │  cool-down       │ │  (bounded polling)  │ │
//! │  └─────────────┘ └─────────────────┘ └─────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                     ┌─────────────────┐
//!                     │    AzGateway    │
//!                     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use azfleet_az::AzCli;
//! use azfleet_control::{ControlConfig, VmFleetController};
//! use azfleet_core::ResourceGroupRef;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let az = Arc::new(AzCli::locate()?);
//! let group = ResourceGroupRef::new("0000-sub", "workers");
//! let mut control = VmFleetController::new(az, group, ControlConfig::default());
//!
//! for (name, mut vm) in control.list_vms().await? {
//!     if vm.is_deallocated() {
//!         control.try_start_vm(&mut vm).await;
//!     }
//!     println!("{name}: {}", vm.power);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Power states
//!
//! Azure reports `PowerState/*` status codes; the recognised set is
//! `deallocated`, `deallocating`, `running`, `starting` and `stopped`.
//! Anything else is classified as unknown. See the [`state`] module.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod service;
pub mod state;
pub mod types;
pub mod wait;

pub use error::{ControlError, Result};
pub use service::{get_power_state, InstanceView, StartOutcome, VmFleetController};
pub use state::{OsFamily, PowerState, VmState};
pub use types::ControlConfig;
pub use wait::{wait_until_running, WaitOutcome};
