//! Extension listings and reconciliation reports.

use std::collections::BTreeMap;

use azfleet_control::{StartOutcome, WaitOutcome};
use serde::Deserialize;

use crate::catalog::ExtensionKind;

/// An installed extension as returned by `vm extension list`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionRecord {
    /// Extension instance name.
    pub name: String,
    /// Provisioning state reported by the platform.
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

impl ExtensionRecord {
    /// Provisioning state, or `"unknown"` if the platform omitted it.
    #[must_use]
    pub fn state(&self) -> &str {
        self.provisioning_state.as_deref().unwrap_or("unknown")
    }
}

/// Installed extensions keyed by instance name.
pub type ExtensionListing = BTreeMap<String, ExtensionRecord>;

/// Result of reconciling one VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmReport {
    /// VM name.
    pub vm: String,
    /// Outcome of the start request, if the VM was not running.
    pub start: Option<StartOutcome>,
    /// Outcome of waiting for the running state, if a wait happened.
    pub wait: Option<WaitOutcome>,
    /// Extensions already present, with their provisioning state.
    pub present: Vec<(ExtensionKind, String)>,
    /// Extensions for which an install was issued.
    pub installed: Vec<ExtensionKind>,
    /// Extensions whose install command failed, with the error text.
    pub failed: Vec<(ExtensionKind, String)>,
}

impl VmReport {
    /// Create an empty report for a VM.
    #[must_use]
    pub fn new(vm: impl Into<String>) -> Self {
        Self {
            vm: vm.into(),
            start: None,
            wait: None,
            present: Vec::new(),
            installed: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// The wait for the running state timed out.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.wait == Some(WaitOutcome::TimedOut)
    }
}

/// Result of reconciling a set of VMs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetReport {
    /// Requested VM names that do not exist in the resource group.
    pub missing: Vec<String>,
    /// Per-VM results for VMs that were processed.
    pub vms: Vec<VmReport>,
    /// VMs whose processing failed, with the error text.
    pub failed_vms: Vec<(String, String)>,
}

impl FleetReport {
    /// Names of VMs that did not reach the running state in time.
    #[must_use]
    pub fn timed_out(&self) -> Vec<&str> {
        self.vms
            .iter()
            .filter(|r| r.timed_out())
            .map(|r| r.vm.as_str())
            .collect()
    }

    /// Total install commands issued.
    #[must_use]
    pub fn installs_issued(&self) -> usize {
        self.vms.iter().map(|r| r.installed.len()).sum()
    }

    /// No VM failed, no install failed, and nothing timed out.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed_vms.is_empty()
            && self
                .vms
                .iter()
                .all(|r| r.failed.is_empty() && !r.timed_out())
    }
}
