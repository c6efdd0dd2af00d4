//! VM inventory and power control for one resource group.
//!
//! [`VmFleetController`] lists VMs, fetches their state through a two-step
//! discovery (VM descriptor, then instance view), and requests starts. Start
//! requests are suppressed for a cool-down window after Azure reports a
//! capacity conflict so a busy region is not hammered with doomed requests.

use std::collections::BTreeMap;
use std::sync::Arc;

use azfleet_az::{AzCommand, AzErrorKind, AzGateway};
use azfleet_core::ResourceGroupRef;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::{ControlError, Result};
use crate::state::{OsFamily, PowerState, VmState, POWER_STATE_PREFIX};
use crate::types::ControlConfig;

/// The `statuses` part of a VM instance view.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceView {
    /// Status entries, including provisioning and power state.
    #[serde(default)]
    pub statuses: Vec<InstanceViewStatus>,
}

/// One status entry of an instance view.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceViewStatus {
    /// Status code, e.g. `PowerState/running`.
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable status.
    #[serde(default)]
    pub display_status: Option<String>,
}

impl InstanceView {
    /// Decode from `vm get-instance-view` output, which nests the view under
    /// `instanceView`, or from a bare instance view.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Decode` if the payload has the wrong shape.
    pub fn from_value(value: Value) -> Result<Self> {
        let view = match value {
            Value::Object(mut map) if map.contains_key("instanceView") => map
                .remove("instanceView")
                .unwrap_or(Value::Null),
            other => other,
        };
        serde_json::from_value(view).map_err(|source| ControlError::Decode {
            what: "instance view",
            source,
        })
    }
}

/// Find the power-state code in an instance view, or `"unknown"`.
#[must_use]
pub fn get_power_state(instance_view: &InstanceView) -> String {
    instance_view
        .statuses
        .iter()
        .filter_map(|s| s.code.as_deref())
        .find(|code| code.starts_with(POWER_STATE_PREFIX))
        .unwrap_or("unknown")
        .to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VmDescriptor {
    name: String,
    #[serde(default)]
    os_profile: Option<OsProfile>,
    #[serde(default)]
    identity: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OsProfile {
    #[serde(default)]
    linux_configuration: Option<Value>,
    #[serde(default)]
    windows_configuration: Option<Value>,
}

impl VmDescriptor {
    fn os_family(&self) -> Result<OsFamily> {
        let profile = self.os_profile.as_ref();
        let is_linux = profile.is_some_and(|p| p.linux_configuration.is_some());
        let is_windows = profile.is_some_and(|p| p.windows_configuration.is_some());
        OsFamily::from_flags(&self.name, is_linux, is_windows)
    }
}

fn decode<T: serde::de::DeserializeOwned>(what: &'static str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|source| ControlError::Decode { what, source })
}

/// What happened to a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The start was accepted and the VM marked as starting.
    Requested,
    /// Dropped because the capacity cool-down is active.
    Suppressed,
    /// Azure reported a conflict; the cool-down has been entered.
    Conflict,
    /// Azure returned its spurious "guest agent running" warning.
    BenignWarning,
    /// Any other failure; logged.
    Failed,
}

/// Control relationship to the VMs of one resource group.
pub struct VmFleetController<G: AzGateway + ?Sized> {
    az: Arc<G>,
    group: ResourceGroupRef,
    config: ControlConfig,
    unavailable_until: Option<DateTime<Utc>>,
}

impl<G: AzGateway + ?Sized> VmFleetController<G> {
    /// Create a controller for the given resource group.
    pub fn new(az: Arc<G>, group: ResourceGroupRef, config: ControlConfig) -> Self {
        Self {
            az,
            group,
            config,
            unavailable_until: None,
        }
    }

    /// The resource group this controller manages.
    #[must_use]
    pub fn group(&self) -> &ResourceGroupRef {
        &self.group
    }

    /// The controller configuration.
    #[must_use]
    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// The gateway used for all commands.
    #[must_use]
    pub fn gateway(&self) -> &Arc<G> {
        &self.az
    }

    /// When start requests resume, if the capacity cool-down is active.
    #[must_use]
    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        self.unavailable_until
    }

    fn scoped(&self, words: &[&str]) -> AzCommand {
        AzCommand::new(words.iter().copied())
            .flag("--resource-group", self.group.resource_group.as_str())
            .flag("--subscription", self.group.subscription_id.as_str())
    }

    /// List every VM in the resource group with its current state.
    ///
    /// # Errors
    ///
    /// Fails on any gateway error or on a VM with an invalid OS profile; a
    /// partial inventory is never returned.
    pub async fn list_vms(&self) -> Result<BTreeMap<String, VmState>> {
        let listing = self
            .az
            .run(
                &self.scoped(&["vm", "list"]),
                &format!("listing VMs in {}", self.group.resource_group),
                false,
            )
            .await?;
        let descriptors: Vec<VmDescriptor> = decode("VM list", listing)?;

        let mut results = BTreeMap::new();
        for descriptor in descriptors {
            let state = self.get_vm_state(&descriptor.name).await?;
            results.insert(descriptor.name, state);
        }
        Ok(results)
    }

    /// Fetch the current state of one VM.
    ///
    /// # Errors
    ///
    /// Fails on any gateway error, a malformed payload, or an OS profile that
    /// is not exactly one of Linux or Windows.
    pub async fn get_vm_state(&self, vm_name: &str) -> Result<VmState> {
        let descriptor = self
            .az
            .run(
                &self.scoped(&["vm", "show"]).flag("--name", vm_name),
                &format!("fetching VM {vm_name}"),
                false,
            )
            .await?;
        let descriptor: VmDescriptor = decode("VM descriptor", descriptor)?;

        let view = self
            .az
            .run(
                &self.scoped(&["vm", "get-instance-view"]).flag("--name", vm_name),
                &format!("fetching instance view of {vm_name}"),
                false,
            )
            .await?;
        let power = get_power_state(&InstanceView::from_value(view)?);

        let os = descriptor.os_family()?;
        let mut state = VmState::with_os(descriptor.name, PowerState::from_code(&power), os);
        state.identity = descriptor.identity;
        state.subscription_id.clone_from(&self.group.subscription_id);
        state.resource_group.clone_from(&self.group.resource_group);
        Ok(state)
    }

    /// Returns true if start requests are currently suppressed, clearing an
    /// expired cool-down.
    fn in_cooldown(&mut self, now: DateTime<Utc>) -> bool {
        match self.unavailable_until {
            Some(until) if now > until => {
                self.unavailable_until = None;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    fn enter_cooldown(&mut self, now: DateTime<Utc>) {
        let window = chrono::Duration::from_std(self.config.unavailable_timeout())
            .unwrap_or_else(|_| chrono::Duration::weeks(52));
        self.unavailable_until = Some(now.checked_add_signed(window).unwrap_or(now));
    }

    /// Request a start of the VM without waiting for it to run.
    ///
    /// Failures are absorbed: a conflict enters the capacity cool-down, and
    /// any failure clears the VM's `starting` flag.
    pub async fn try_start_vm(&mut self, vm: &mut VmState) -> StartOutcome {
        if self.in_cooldown(Utc::now()) {
            warn!(vm = %vm.name, "Ignoring request to start vm because of capacity restrictions");
            return StartOutcome::Suppressed;
        }

        info!(vm = %vm.name, "VM is deallocated, attempting restart");
        let command = self
            .scoped(&["vm", "start"])
            .flag("--name", vm.name.as_str())
            .arg("--no-wait");
        let result = self
            .az
            .run(&command, &format!("starting VM {}", vm.name), true)
            .await;

        match result {
            Ok(_) => {
                vm.on_start();
                StartOutcome::Requested
            }
            Err(e) => {
                vm.starting = false;
                match e.kind() {
                    AzErrorKind::Conflict => {
                        error!(vm = %vm.name, error = %e, "VM failed to start");
                        self.enter_cooldown(Utc::now());
                        StartOutcome::Conflict
                    }
                    AzErrorKind::BenignStartWarning => {
                        warn!(vm = %vm.name, "{e}");
                        StartOutcome::BenignWarning
                    }
                    AzErrorKind::NotFound | AzErrorKind::Other => {
                        error!(vm = %vm.name, error = %e, "VM failed to start");
                        StartOutcome::Failed
                    }
                }
            }
        }
    }
}
