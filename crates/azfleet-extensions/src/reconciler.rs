//! Per-VM extension reconciliation.
//!
//! ```text
//!   not running ──▶ try_start_vm ──▶ wait_until_running ─┐
//!                                                        ▼
//!   running ──────────────────────────────────▶ vm extension list
//!                                                        │
//!                          for each ExtensionKind::ALL   ▼
//!                      present: report state   absent: vm extension set --no-wait
//! ```
//!
//! A wait that times out is recorded in the report and the extension checks
//! still run. Install failures are recorded per extension and never abort the
//! remaining extensions or VMs.

use std::collections::BTreeSet;

use azfleet_az::{AzCommand, AzGateway};
use azfleet_control::{wait_until_running, VmFleetController, VmState, WaitOutcome};
use tracing::{error, info, warn};

use crate::catalog::{check_extension, install_command, ExtensionKind};
use crate::error::{ExtensionError, Result};
use crate::types::{ExtensionListing, ExtensionRecord, FleetReport, VmReport};

/// Brings VMs of one resource group to the required extension set.
pub struct ExtensionReconciler<G: AzGateway + ?Sized> {
    controller: VmFleetController<G>,
    uami: Option<String>,
}

impl<G: AzGateway + ?Sized> ExtensionReconciler<G> {
    /// Create a reconciler. `uami` names the user-assigned managed identity
    /// the Windows monitor agent authenticates with.
    pub fn new(controller: VmFleetController<G>, uami: Option<String>) -> Self {
        Self { controller, uami }
    }

    /// The underlying VM controller.
    #[must_use]
    pub fn controller(&self) -> &VmFleetController<G> {
        &self.controller
    }

    /// List the extensions installed on a VM, keyed by instance name.
    ///
    /// # Errors
    ///
    /// Returns a gateway error if the listing fails, or `Decode` if it is not
    /// a list of extension records.
    pub async fn list_extensions(&self, vm: &VmState) -> Result<ExtensionListing> {
        let group = self.controller.group();
        let command = AzCommand::new(["vm", "extension", "list"])
            .flag("--resource-group", group.resource_group.as_str())
            .flag("--subscription", group.subscription_id.as_str())
            .flag("--vm-name", vm.name.as_str());
        let value = self
            .controller
            .gateway()
            .run(&command, &format!("listing extensions on {}", vm.name), false)
            .await?;

        let records: Vec<ExtensionRecord> =
            serde_json::from_value(value).map_err(|source| ExtensionError::Decode {
                vm: vm.name.clone(),
                source,
            })?;
        Ok(records.into_iter().map(|r| (r.name.clone(), r)).collect())
    }

    /// Reconcile one VM: start it if needed, then install whatever is missing.
    ///
    /// # Errors
    ///
    /// Fails if re-fetching the VM state while waiting fails or if the
    /// extension listing cannot be obtained. Install failures are recorded in
    /// the report instead.
    pub async fn reconcile_vm(&mut self, mut vm: VmState) -> Result<VmReport> {
        info!(vm = %vm.name, "Checking extensions are installed on VM {}...", vm.name);
        let mut report = VmReport::new(vm.name.clone());

        if !vm.is_running() {
            info!(vm = %vm.name, power = %vm.power, "Wait for {} to be running...", vm.name);
            if !vm.is_starting_or_running() {
                report.start = Some(self.controller.try_start_vm(&mut vm).await);
            }
            let (latest, outcome) = wait_until_running(&self.controller, vm).await?;
            if outcome == WaitOutcome::TimedOut {
                warn!(vm = %latest.name, "VM did not reach running state, checking extensions anyway");
            }
            report.wait = Some(outcome);
            vm = latest;
        }

        let extensions = self.list_extensions(&vm).await?;
        for kind in ExtensionKind::ALL {
            if check_extension(kind, &vm, &extensions) {
                let state = extensions
                    .get(kind.instance_name(vm.os))
                    .map_or("unknown", ExtensionRecord::state)
                    .to_string();
                report.present.push((kind, state));
                continue;
            }

            match self.install(kind, &vm).await {
                Ok(()) => report.installed.push(kind),
                Err(e) => {
                    error!(vm = %vm.name, extension = %kind, error = %e, "extension install failed");
                    report.failed.push((kind, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    async fn install(&self, kind: ExtensionKind, vm: &VmState) -> Result<()> {
        let command = install_command(kind, vm, self.controller.group(), self.uami.as_deref());
        info!(vm = %vm.name, extension = %kind, "Installing {} {}", kind.label(), kind.instance_name(vm.os));
        self.controller
            .gateway()
            .run(
                &command,
                &format!("installing {} on {}", kind.instance_name(vm.os), vm.name),
                true,
            )
            .await?;
        Ok(())
    }

    /// Reconcile the named VMs, or every VM in the resource group when
    /// `names` is empty. Each VM is processed once, in name order.
    ///
    /// Names that do not exist are reported as missing. A VM whose processing
    /// fails is recorded and the remaining VMs are still processed.
    ///
    /// # Errors
    ///
    /// Fails only if the initial VM inventory cannot be fetched.
    pub async fn reconcile(&mut self, names: &[String]) -> Result<FleetReport> {
        let mut inventory = self.controller.list_vms().await?;
        let mut report = FleetReport::default();

        let targets: BTreeSet<String> = if names.is_empty() {
            inventory.keys().cloned().collect()
        } else {
            names.iter().cloned().collect()
        };

        for name in targets {
            let Some(vm) = inventory.remove(&name) else {
                warn!(vm = %name, "VM {name} not found");
                report.missing.push(name);
                continue;
            };
            match self.reconcile_vm(vm).await {
                Ok(vm_report) => report.vms.push(vm_report),
                Err(e) => {
                    error!(vm = %name, error = %e, "failed to reconcile VM");
                    report.failed_vms.push((name, e.to_string()));
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use azfleet_az::{MockAz, MockReply};
    use azfleet_control::{ControlConfig, OsFamily, PowerState, StartOutcome};
    use azfleet_core::ResourceGroupRef;
    use serde_json::json;

    use super::*;

    fn reconciler(az: Arc<MockAz>) -> ExtensionReconciler<MockAz> {
        let control = VmFleetController::new(
            az,
            ResourceGroupRef::new("sub", "rg"),
            ControlConfig::default(),
        );
        ExtensionReconciler::new(control, None)
    }

    fn running(os: OsFamily) -> VmState {
        let mut vm = VmState::with_os("w1", PowerState::Running, os);
        vm.subscription_id = "sub".into();
        vm.resource_group = "rg".into();
        vm
    }

    #[tokio::test]
    async fn list_extensions_keys_by_name() {
        let az = Arc::new(MockAz::new());
        az.on(
            "vm extension list",
            MockReply::Json(json!([
                {"name": "GuestAttestation", "provisioningState": "Succeeded"},
                {"name": "AzurePolicyforLinux", "provisioningState": "Creating"}
            ])),
        );
        let listing = reconciler(az.clone())
            .list_extensions(&running(OsFamily::Linux))
            .await
            .unwrap();

        assert_eq!(listing.len(), 2);
        assert_eq!(listing["AzurePolicyforLinux"].state(), "Creating");
        assert_eq!(
            az.calls(),
            vec!["vm extension list --resource-group rg --subscription sub --vm-name w1".to_string()]
        );
    }

    #[tokio::test]
    async fn empty_listing_output_is_an_error() {
        let az = Arc::new(MockAz::new());
        az.on("vm extension list", MockReply::Empty);
        let err = reconciler(az)
            .list_extensions(&running(OsFamily::Linux))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtensionError::Az(_)));
    }

    #[tokio::test]
    async fn empty_listing_output_fails_vm_without_installs() {
        let az = Arc::new(MockAz::new());
        az.on("vm list", MockReply::Json(json!([{"name": "w1"}])));
        az.on("vm show", MockReply::Json(json!({"name": "w1", "osProfile": {"linuxConfiguration": {}}})));
        az.on(
            "vm get-instance-view",
            MockReply::Json(json!({"statuses": [{"code": "PowerState/running"}]})),
        );
        az.on("vm extension list", MockReply::Empty);

        let report = reconciler(az.clone()).reconcile(&["w1".to_string()]).await.unwrap();
        assert!(report.vms.is_empty());
        assert_eq!(report.failed_vms.len(), 1);
        assert_eq!(report.failed_vms[0].0, "w1");
        assert_eq!(az.count("vm extension set"), 0);
    }

    #[tokio::test]
    async fn duplicate_names_are_processed_once() {
        let az = Arc::new(MockAz::new());
        az.on("vm list", MockReply::Json(json!([{"name": "w1"}])));
        az.on("vm show", MockReply::Json(json!({"name": "w1", "osProfile": {"linuxConfiguration": {}}})));
        az.on(
            "vm get-instance-view",
            MockReply::Json(json!({"statuses": [{"code": "PowerState/running"}]})),
        );
        az.on("vm extension list", MockReply::Json(json!([])));

        let report = reconciler(az.clone())
            .reconcile(&["w1".to_string(), "w1".to_string()])
            .await
            .unwrap();
        assert!(report.missing.is_empty());
        assert_eq!(report.vms.len(), 1);
        assert_eq!(az.count("vm extension list"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_vm_is_waited_for_without_a_start_request() {
        let az = Arc::new(MockAz::new());
        az.on("vm show", MockReply::Json(json!({"name": "w1", "osProfile": {"linuxConfiguration": {}}})));
        az.on(
            "vm get-instance-view",
            MockReply::Json(json!({"statuses": [{"code": "PowerState/running"}]})),
        );
        az.on("vm extension list", MockReply::Json(json!([])));

        let vm = VmState::with_os("w1", PowerState::Starting, OsFamily::Linux);
        let report = reconciler(az.clone()).reconcile_vm(vm).await.unwrap();
        assert_eq!(report.start, None);
        assert_eq!(report.wait, Some(WaitOutcome::Running));
        assert_eq!(az.count("vm start"), 0);
    }

    #[tokio::test]
    async fn malformed_listing_is_decode_error() {
        let az = Arc::new(MockAz::new());
        az.on("vm extension list", MockReply::Json(json!({"name": 3})));
        let err = reconciler(az)
            .list_extensions(&running(OsFamily::Linux))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtensionError::Decode { .. }));
    }

    #[tokio::test]
    async fn running_vm_is_not_started() {
        let az = Arc::new(MockAz::new());
        az.on("vm extension list", MockReply::Json(json!([])));
        let report = reconciler(az.clone())
            .reconcile_vm(running(OsFamily::Windows))
            .await
            .unwrap();

        assert_eq!(report.start, None);
        assert_eq!(report.wait, None);
        assert_eq!(report.installed, ExtensionKind::ALL.to_vec());
        assert_eq!(az.count("vm start"), 0);
    }

    #[tokio::test]
    async fn install_failure_does_not_stop_other_extensions() {
        let az = Arc::new(MockAz::new());
        az.on("vm extension list", MockReply::Json(json!([])));
        az.on(
            "vm extension set --name AzureMonitorLinuxAgent",
            MockReply::Fail("quota exceeded".into()),
        );
        let report = reconciler(az.clone())
            .reconcile_vm(running(OsFamily::Linux))
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, ExtensionKind::MonitorAgent);
        assert!(report.failed[0].1.contains("quota exceeded"));
        assert_eq!(report.installed.len(), 3);
        assert_eq!(az.count("vm extension set"), 4);
    }

    #[tokio::test]
    async fn present_extensions_report_state() {
        let az = Arc::new(MockAz::new());
        az.on(
            "vm extension list",
            MockReply::Json(json!([{"name": "AADSSHLoginForLinux", "provisioningState": "Failed"}])),
        );
        let report = reconciler(az)
            .reconcile_vm(running(OsFamily::Linux))
            .await
            .unwrap();

        assert_eq!(
            report.present,
            vec![(ExtensionKind::AadSshLogin, "Failed".to_string())]
        );
        assert!(!report.installed.contains(&ExtensionKind::AadSshLogin));
    }

    #[tokio::test(start_paused = true)]
    async fn suppressed_start_still_checks_extensions() {
        let az = Arc::new(MockAz::new());
        az.on("vm start", MockReply::Fail("(Conflict) no capacity".into()));
        az.on(
            "vm show",
            MockReply::Json(json!({"name": "w1", "osProfile": {"linuxConfiguration": {}}})),
        );
        az.on(
            "vm get-instance-view",
            MockReply::Json(json!({"statuses": [{"code": "PowerState/deallocated"}]})),
        );
        az.on("vm extension list", MockReply::Json(json!([])));
        let mut reconciler = reconciler(az.clone());

        let vm = VmState::with_os("w1", PowerState::Deallocated, OsFamily::Linux);
        let report = reconciler.reconcile_vm(vm).await.unwrap();
        assert_eq!(report.start, Some(StartOutcome::Conflict));
        assert_eq!(report.wait, Some(WaitOutcome::TimedOut));
        assert_eq!(report.installed.len(), 4);

        let vm = VmState::with_os("w1", PowerState::Deallocated, OsFamily::Linux);
        let report = reconciler.reconcile_vm(vm).await.unwrap();
        assert_eq!(report.start, Some(StartOutcome::Suppressed));
        assert_eq!(az.count("vm start"), 1);
    }

    #[tokio::test]
    async fn missing_and_failing_vms_are_recorded() {
        let az = Arc::new(MockAz::new());
        az.on("vm list", MockReply::Json(json!([{"name": "w1"}])));
        az.on(
            "vm show",
            MockReply::Json(json!({"name": "w1", "osProfile": {"linuxConfiguration": {}}})),
        );
        az.on(
            "vm get-instance-view",
            MockReply::Json(json!({"statuses": [{"code": "PowerState/running"}]})),
        );
        az.on("vm extension list", MockReply::Fail("throttled".into()));

        let report = reconciler(az)
            .reconcile(&["w1".to_string(), "ghost".to_string()])
            .await
            .unwrap();

        assert_eq!(report.missing, vec!["ghost".to_string()]);
        assert!(report.vms.is_empty());
        assert_eq!(report.failed_vms.len(), 1);
        assert_eq!(report.failed_vms[0].0, "w1");
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn empty_names_means_every_vm() {
        let az = Arc::new(MockAz::new());
        az.on("vm list", MockReply::Json(json!([{"name": "a"}, {"name": "b"}])));
        az.on("vm show", MockReply::Json(json!({"name": "a", "osProfile": {"linuxConfiguration": {}}})));
        az.on(
            "vm show --resource-group rg --subscription sub --name b",
            MockReply::Json(json!({"name": "b", "osProfile": {"windowsConfiguration": {}}})),
        );
        az.on(
            "vm get-instance-view",
            MockReply::Json(json!({"statuses": [{"code": "PowerState/running"}]})),
        );
        az.on("vm extension list", MockReply::Json(json!([])));

        let report = reconciler(az).reconcile(&[]).await.unwrap();
        let names: Vec<_> = report.vms.iter().map(|r| r.vm.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(report.installs_issued(), 8);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn inventory_failure_is_fatal() {
        let az = Arc::new(MockAz::new());
        az.on("vm list", MockReply::Fail("Please run 'az login'".into()));
        let err = reconciler(az).reconcile(&[]).await.unwrap_err();
        assert!(matches!(err, ExtensionError::Control(_)));
    }
}
