//! Core types and utilities for azfleet.
//!
//! This crate provides the foundational types shared by the fleet tooling:
//!
//! - **Identifiers**: Strongly-typed IDs for directory principals, role
//!   assignments, and RBAC scopes
//! - **Resources**: Builders for ARM resource IDs within a subscription and
//!   resource group
//!
//! # Example
//!
//! ```
//! use azfleet_core::{PrincipalId, ResourceGroupRef};
//!
//! let principal = PrincipalId::new("810b0fcc-607a-413b-af86-14100c709f44").unwrap();
//! assert_eq!(principal.as_str(), "810b0fcc-607a-413b-af86-14100c709f44");
//!
//! let group = ResourceGroupRef::new("0000-sub", "workers");
//! assert_eq!(
//!     group.vm_id("worker-1"),
//!     "/subscriptions/0000-sub/resourceGroups/workers/providers/Microsoft.Compute/virtualMachines/worker-1"
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod resource;

pub use ids::{IdError, PrincipalId, RoleAssignmentId, Scope};
pub use resource::ResourceGroupRef;
