//! VM power-state model.
//!
//! A [`VmState`] is built fresh from every discovery call. The `on_start` and
//! `on_deallocate` markers record an action this process just requested, ahead
//! of the platform confirming it, so that follow-up logic does not request the
//! same transition twice.
//!
//! ```text
//!   ┌─────────────┐  start   ┌──────────┐  (platform)  ┌─────────┐
//!   │ Deallocated │─────────▶│ Starting │─────────────▶│ Running │
//!   │ / Stopped   │          └──────────┘              └────┬────┘
//!   └─────────────┘                                         │ deallocate
//!          ▲                 ┌──────────────┐               │
//!          └─────────────────│ Deallocating │◀──────────────┘
//!             (platform)     └──────────────┘
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ControlError, Result};

/// Prefix shared by every power-state status code.
pub const POWER_STATE_PREFIX: &str = "PowerState";

/// Power classification of a VM.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerState {
    /// `PowerState/deallocated`
    Deallocated,
    /// `PowerState/deallocating`
    Deallocating,
    /// `PowerState/running`
    Running,
    /// `PowerState/starting`
    Starting,
    /// `PowerState/stopped`
    Stopped,
    /// Any other code reported by the platform, kept verbatim.
    Unknown(String),
}

impl PowerState {
    /// Parse a platform status code such as `PowerState/running`.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "PowerState/deallocated" => Self::Deallocated,
            "PowerState/deallocating" => Self::Deallocating,
            "PowerState/running" => Self::Running,
            "PowerState/starting" => Self::Starting,
            "PowerState/stopped" => Self::Stopped,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The platform status code for this state.
    #[must_use]
    pub fn as_code(&self) -> &str {
        match self {
            Self::Deallocated => "PowerState/deallocated",
            Self::Deallocating => "PowerState/deallocating",
            Self::Running => "PowerState/running",
            Self::Starting => "PowerState/starting",
            Self::Stopped => "PowerState/stopped",
            Self::Unknown(code) => code,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Operating system family of a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OsFamily {
    /// Linux guest.
    Linux,
    /// Windows guest.
    Windows,
}

impl OsFamily {
    /// Classify from the presence of Linux and Windows OS configurations.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidOsProfile` unless exactly one is present.
    pub fn from_flags(vm: &str, is_linux: bool, is_windows: bool) -> Result<Self> {
        match (is_linux, is_windows) {
            (true, false) => Ok(Self::Linux),
            (false, true) => Ok(Self::Windows),
            _ => Err(ControlError::InvalidOsProfile {
                vm: vm.to_string(),
                is_linux,
                is_windows,
            }),
        }
    }
}

/// Observed condition of one VM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmState {
    /// VM name, unique within its resource group.
    pub name: String,
    /// Current power classification.
    pub power: PowerState,
    /// Guest OS family.
    pub os: OsFamily,
    /// A start has been requested or observed.
    pub starting: bool,
    /// When `starting` was set.
    pub start_time: Option<DateTime<Utc>>,
    /// A deallocation has been requested or observed.
    pub deallocating: bool,
    /// When `deallocating` was set.
    pub deallocate_time: Option<DateTime<Utc>>,
    /// Identity block copied from the VM descriptor.
    pub identity: Option<Value>,
    /// Subscription the VM lives in.
    pub subscription_id: String,
    /// Resource group the VM lives in.
    pub resource_group: String,
}

impl VmState {
    /// Build a state from a discovered power code and OS flags.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidOsProfile` unless exactly one of
    /// `is_linux` and `is_windows` is set.
    pub fn new(
        name: impl Into<String>,
        power_code: &str,
        is_linux: bool,
        is_windows: bool,
    ) -> Result<Self> {
        let name = name.into();
        let os = OsFamily::from_flags(&name, is_linux, is_windows)?;
        Ok(Self::with_os(name, PowerState::from_code(power_code), os))
    }

    /// Build a state for an already-classified OS.
    #[must_use]
    pub fn with_os(name: impl Into<String>, power: PowerState, os: OsFamily) -> Self {
        let now = Utc::now();
        let starting = power == PowerState::Starting;
        let deallocating = power == PowerState::Deallocating;
        Self {
            name: name.into(),
            power,
            os,
            starting,
            start_time: starting.then_some(now),
            deallocating,
            deallocate_time: deallocating.then_some(now),
            identity: None,
            subscription_id: String::new(),
            resource_group: String::new(),
        }
    }

    /// Returns true for a Linux guest.
    #[must_use]
    pub fn is_linux(&self) -> bool {
        self.os == OsFamily::Linux
    }

    /// Returns true for a Windows guest.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == OsFamily::Windows
    }

    /// Image family label used when provisioning workers.
    #[must_use]
    pub const fn vm_type(&self) -> &'static str {
        match self.os {
            OsFamily::Linux => "Linux",
            OsFamily::Windows => "Windows11",
        }
    }

    /// The platform reported a code outside the recognised set.
    #[must_use]
    pub fn is_unknown_state(&self) -> bool {
        matches!(self.power, PowerState::Unknown(_))
    }

    /// Running, or on its way there.
    #[must_use]
    pub fn is_starting_or_running(&self) -> bool {
        matches!(self.power, PowerState::Running | PowerState::Starting)
    }

    /// Running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.power == PowerState::Running
    }

    /// Deallocated, deallocating, or stopped.
    #[must_use]
    pub fn is_deallocated(&self) -> bool {
        matches!(
            self.power,
            PowerState::Deallocating | PowerState::Deallocated | PowerState::Stopped
        )
    }

    /// Record that a start was just requested so it is not requested again.
    pub fn on_start(&mut self) {
        self.starting = true;
        self.start_time = Some(Utc::now());
        self.power = PowerState::Starting;
        self.deallocating = false;
    }

    /// Record that a deallocation was just requested.
    pub fn on_deallocate(&mut self) {
        self.starting = false;
        self.power = PowerState::Deallocating;
        self.deallocating = true;
        self.deallocate_time = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_both_os_families() {
        let result = VmState::new("w1", "PowerState/running", true, true);
        assert!(matches!(
            result,
            Err(ControlError::InvalidOsProfile {
                is_linux: true,
                is_windows: true,
                ..
            })
        ));
    }

    #[test]
    fn rejects_neither_os_family() {
        let result = VmState::new("w1", "PowerState/running", false, false);
        assert!(matches!(result, Err(ControlError::InvalidOsProfile { .. })));
    }

    #[test]
    fn power_codes_round_trip() {
        for code in [
            "PowerState/deallocated",
            "PowerState/deallocating",
            "PowerState/running",
            "PowerState/starting",
            "PowerState/stopped",
            "PowerState/weird",
        ] {
            assert_eq!(PowerState::from_code(code).as_code(), code);
        }
        assert_eq!(
            PowerState::from_code("unknown"),
            PowerState::Unknown("unknown".into())
        );
    }

    #[test]
    fn classification_predicates() {
        let vm = VmState::new("w", "PowerState/stopped", true, false).unwrap();
        assert!(vm.is_deallocated());
        assert!(!vm.is_running());
        assert!(!vm.is_starting_or_running());
        assert!(!vm.is_unknown_state());

        let vm = VmState::new("w", "PowerState/deallocating", true, false).unwrap();
        assert!(vm.is_deallocated());

        let vm = VmState::new("w", "PowerState/running", false, true).unwrap();
        assert!(vm.is_running());
        assert!(vm.is_starting_or_running());
        assert!(vm.is_windows());
        assert_eq!(vm.vm_type(), "Windows11");

        let vm = VmState::new("w", "unknown", true, false).unwrap();
        assert!(vm.is_unknown_state());
        assert!(!vm.is_deallocated());
        assert_eq!(vm.vm_type(), "Linux");
    }

    #[test]
    fn discovered_transitions_set_bookkeeping() {
        let vm = VmState::new("w", "PowerState/starting", true, false).unwrap();
        assert!(vm.starting);
        assert!(vm.start_time.is_some());
        assert!(!vm.deallocating);

        let vm = VmState::new("w", "PowerState/deallocating", true, false).unwrap();
        assert!(vm.deallocating);
        assert!(vm.deallocate_time.is_some());
        assert!(!vm.starting);
    }

    #[test]
    fn on_start_always_starting_or_running() {
        for code in [
            "PowerState/deallocated",
            "PowerState/deallocating",
            "PowerState/stopped",
            "PowerState/running",
            "something-else",
        ] {
            let mut vm = VmState::new("w", code, true, false).unwrap();
            vm.on_start();
            assert!(vm.is_starting_or_running(), "after on_start from {code}");
            assert!(vm.starting);
            assert!(!vm.deallocating);
            assert!(vm.start_time.is_some());
        }
    }

    #[test]
    fn on_deallocate_clears_starting() {
        let mut vm = VmState::new("w", "PowerState/running", true, false).unwrap();
        vm.on_start();
        vm.on_deallocate();
        assert!(!vm.starting);
        assert!(vm.deallocating);
        assert_eq!(vm.power, PowerState::Deallocating);
        assert!(vm.is_deallocated());
    }
}
