//! Orphaned role-assignment cleanup.
//!
//! When a user is deleted from the directory, their role assignments stay
//! behind and can no longer be removed by principal. This crate finds those
//! assignments by id and deletes them one at a time.
//!
//! Two entry modes share the same deletion step:
//!
//! ```text
//!   stale-identity report ──▶ filter_report ──▶ plan_from_report ──┐
//!   (JSON file)               (drop principals    (per-scope       │
//!                              that still exist)   listing cache)  ▼
//!                                                            RemovalPlan ──▶ remove
//!   no report ──────────────▶ discover ────────────────────────────▲     (dry run or
//!                             (role assignment list --all)               one delete per id)
//! ```
//!
//! A directory lookup that fails with anything other than "does not exist"
//! is never treated as confirmation that a principal is gone.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod directory;
pub mod error;
pub mod reconciler;
pub mod report;
pub mod types;

pub use directory::{lookup_principal, Verdict};
pub use error::{RbacError, Result};
pub use reconciler::{FilterOutcome, OrphanReconciler, RunOutcome};
pub use report::{StaleIdentity, StaleIdentityReport, EXAMPLE_REPORT};
pub use types::{DirectoryUser, DiscoveryScan, RemovalPlan, RemovalSummary, RoleAssignment};
