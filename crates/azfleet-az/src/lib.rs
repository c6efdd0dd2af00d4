//! Azure CLI command gateway for azfleet.
//!
//! Every interaction with the Azure control plane goes through the
//! [`AzGateway`] trait: a command fragment plus a human-readable description
//! goes in, decoded JSON (or an [`AzError`]) comes out. The gateway performs no
//! retries and does not interpret domain-specific error text; callers use
//! [`AzError::kind`] when they need to tell a "not found" from a capacity
//! conflict.
//!
//! # Example
//!
//! ```no_run
//! use azfleet_az::{AzCli, AzCommand, AzGateway};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let az = AzCli::locate()?;
//! let command = AzCommand::new(["vm", "list"]).flag("--resource-group", "workers");
//! let vms = az.run(&command, "listing worker VMs", false).await?;
//! println!("{vms}");
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature to get [`MockAz`], which records issued
//! commands and replies from prefix-matched rules.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod command;
pub mod credentials;
pub mod error;
pub mod gateway;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use command::AzCommand;
pub use credentials::{set_subscription, Credentials};
pub use error::{classify, AzError, AzErrorKind, Result};
pub use gateway::{AzCli, AzGateway};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockAz, MockReply};
