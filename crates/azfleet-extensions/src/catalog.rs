//! The fixed catalog of required extensions.
//!
//! Names and publishers differ between Linux and Windows and must match what
//! Azure expects exactly.

use std::fmt;

use azfleet_az::AzCommand;
use azfleet_control::{OsFamily, VmState};
use azfleet_core::ResourceGroupRef;
use serde_json::json;
use tracing::info;

use crate::types::ExtensionListing;

/// One of the four extensions every worker VM must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExtensionKind {
    /// Azure Monitor agent.
    MonitorAgent,
    /// Guest configuration (Azure Policy) agent.
    GuestConfiguration,
    /// Entra ID (AAD) login.
    AadSshLogin,
    /// Guest attestation.
    GuestAttestation,
}

impl ExtensionKind {
    /// Every required extension, in reconciliation order.
    pub const ALL: [Self; 4] = [
        Self::MonitorAgent,
        Self::GuestConfiguration,
        Self::AadSshLogin,
        Self::GuestAttestation,
    ];

    /// Human-readable label used in progress output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::MonitorAgent => "Monitor agent",
            Self::GuestConfiguration => "Guest configuration extension",
            Self::AadSshLogin => "AAD SSH Login extension",
            Self::GuestAttestation => "GuestAttestation extension",
        }
    }

    /// Name under which the extension appears in `vm extension list`.
    #[must_use]
    pub const fn instance_name(self, os: OsFamily) -> &'static str {
        match (self, os) {
            (Self::GuestConfiguration, OsFamily::Linux) => "AzurePolicyforLinux",
            (Self::GuestConfiguration, OsFamily::Windows) => "AzurePolicyforWindows",
            _ => self.type_name(os),
        }
    }

    /// Value passed as `--name` to `vm extension set`.
    #[must_use]
    pub const fn type_name(self, os: OsFamily) -> &'static str {
        match (self, os) {
            (Self::MonitorAgent, OsFamily::Linux) => "AzureMonitorLinuxAgent",
            (Self::MonitorAgent, OsFamily::Windows) => "AzureMonitorWindowsAgent",
            (Self::GuestConfiguration, OsFamily::Linux) => "ConfigurationForLinux",
            (Self::GuestConfiguration, OsFamily::Windows) => "ConfigurationforWindows",
            (Self::AadSshLogin, OsFamily::Linux) => "AADSSHLoginForLinux",
            (Self::AadSshLogin, OsFamily::Windows) => "AADLoginForWindows",
            (Self::GuestAttestation, _) => "GuestAttestation",
        }
    }

    /// Extension publisher.
    #[must_use]
    pub const fn publisher(self, os: OsFamily) -> &'static str {
        match (self, os) {
            (Self::MonitorAgent, _) => "Microsoft.Azure.Monitor",
            (Self::GuestConfiguration, _) => "Microsoft.GuestConfiguration",
            (Self::AadSshLogin, _) => "Microsoft.Azure.ActiveDirectory",
            (Self::GuestAttestation, OsFamily::Linux) => "Microsoft.Azure.Security.LinuxAttestation",
            (Self::GuestAttestation, OsFamily::Windows) => {
                "Microsoft.Azure.Security.WindowsAttestation"
            }
        }
    }
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returns true if the extension is present in the listing, reporting its
/// provisioning state when it is.
#[must_use]
pub fn check_extension(kind: ExtensionKind, vm: &VmState, extensions: &ExtensionListing) -> bool {
    let name = kind.instance_name(vm.os);
    match extensions.get(name) {
        Some(record) => {
            info!(
                vm = %vm.name,
                state = %record.state(),
                "{} {name} is installed and in state: {}",
                kind.label(),
                record.state()
            );
            true
        }
        None => false,
    }
}

/// Build the fire-and-forget install command for an extension.
///
/// On Windows the monitor agent is bound to the user-assigned managed identity
/// `uami` when one is given.
#[must_use]
pub fn install_command(
    kind: ExtensionKind,
    vm: &VmState,
    group: &ResourceGroupRef,
    uami: Option<&str>,
) -> AzCommand {
    let os = vm.os;
    let set = AzCommand::new(["vm", "extension", "set"]);
    let in_group = |cmd: AzCommand| {
        cmd.flag("--resource-group", group.resource_group.as_str())
            .flag("--subscription", group.subscription_id.as_str())
            .flag("--vm-name", vm.name.as_str())
    };

    match kind {
        ExtensionKind::MonitorAgent => {
            let cmd = set
                .flag("--name", kind.type_name(os))
                .flag("--publisher", kind.publisher(os))
                .flag("--ids", group.vm_id(&vm.name))
                .flag("--enable-auto-upgrade", "true")
                .arg("--no-wait");
            match uami {
                Some(uami) if vm.is_windows() && !uami.is_empty() => {
                    cmd.flag("--settings", monitor_agent_settings(group, uami))
                }
                _ => cmd,
            }
        }
        ExtensionKind::GuestConfiguration => in_group(
            set.flag("--publisher", kind.publisher(os))
                .flag("--name", kind.type_name(os))
                .flag("--extension-instance-name", kind.instance_name(os)),
        )
        .flag("--enable-auto-upgrade", "true")
        .arg("--no-wait"),
        ExtensionKind::AadSshLogin | ExtensionKind::GuestAttestation => in_group(
            set.flag("--publisher", kind.publisher(os))
                .flag("--name", kind.type_name(os)),
        )
        .arg("--no-wait"),
    }
}

/// Compact settings payload binding the monitor agent to a managed identity.
fn monitor_agent_settings(group: &ResourceGroupRef, uami: &str) -> String {
    json!({
        "authentication": {
            "managedIdentity": {
                "identifier-name": "mi_res_id",
                "identifier-value": group.user_assigned_identity_id(uami),
            }
        }
    })
    .to_string()
}
