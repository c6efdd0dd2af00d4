//! ARM resource id construction.

use serde::{Deserialize, Serialize};

/// A subscription and resource group pair that VM commands are scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroupRef {
    /// Azure subscription id.
    pub subscription_id: String,
    /// Resource group name within the subscription.
    pub resource_group: String,
}

impl ResourceGroupRef {
    /// Create a new reference.
    #[must_use]
    pub fn new(subscription_id: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
        }
    }

    fn prefix(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers",
            self.subscription_id, self.resource_group
        )
    }

    /// Full resource id of a virtual machine in this group.
    #[must_use]
    pub fn vm_id(&self, vm_name: &str) -> String {
        format!("{}/Microsoft.Compute/virtualMachines/{vm_name}", self.prefix())
    }

    /// Full resource id of a user-assigned managed identity in this group.
    #[must_use]
    pub fn user_assigned_identity_id(&self, identity_name: &str) -> String {
        format!(
            "{}/Microsoft.ManagedIdentity/userAssignedIdentities/{identity_name}",
            self.prefix()
        )
    }
}
