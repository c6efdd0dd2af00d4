//! Role assignments, directory users and cleanup results.

use std::collections::{BTreeMap, BTreeSet};

use azfleet_core::{PrincipalId, RoleAssignmentId, Scope};
use serde::Deserialize;

/// A role assignment as returned by `role assignment list`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    /// Fully-qualified assignment id.
    pub id: RoleAssignmentId,
    /// Object id of the assignee. Empty for some built-in assignments.
    #[serde(default)]
    pub principal_id: String,
    /// Assignee type, e.g. `User`, `ServicePrincipal` or `Group`.
    #[serde(default)]
    pub principal_type: Option<String>,
    /// Assignee display name, empty once the principal is deleted.
    #[serde(default)]
    pub principal_name: Option<String>,
    /// Scope of the assignment.
    pub scope: Scope,
}

impl RoleAssignment {
    /// The assignee is a directory user.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.principal_type.as_deref() == Some("User")
    }

    /// The assignee, if the id is present.
    #[must_use]
    pub fn principal(&self) -> Option<PrincipalId> {
        PrincipalId::new(self.principal_id.as_str()).ok()
    }
}

/// The fields of `ad user show` used for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    /// First name.
    #[serde(default)]
    pub given_name: Option<String>,
    /// Last name.
    #[serde(default)]
    pub surname: Option<String>,
    /// Sign-in name.
    #[serde(default)]
    pub user_principal_name: Option<String>,
}

impl DirectoryUser {
    /// `Given Surname <upn>` for log output.
    #[must_use]
    pub fn display(&self) -> String {
        let given = self.given_name.as_deref().unwrap_or_default();
        let surname = self.surname.as_deref().unwrap_or_default();
        match self.user_principal_name.as_deref() {
            Some(upn) => format!("{given} {surname} <{upn}>"),
            None => format!("{given} {surname}"),
        }
    }
}

/// Role assignment ids to delete, grouped by scope.
pub type RemovalPlan = BTreeMap<Scope, BTreeSet<RoleAssignmentId>>;

/// Result of a discovery-driven scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryScan {
    /// Every user principal that was looked up, with `true` if it is orphaned.
    pub checked: BTreeMap<PrincipalId, bool>,
    /// Assignments of orphaned principals.
    pub plan: RemovalPlan,
}

/// Result of the deletion step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalSummary {
    /// The run was a dry run and nothing was deleted.
    pub dry_run: bool,
    /// Assignments deleted, or that would be deleted in a dry run.
    pub removed: Vec<RoleAssignmentId>,
    /// Deletions that failed, with the error text.
    pub failures: Vec<(RoleAssignmentId, String)>,
}

impl RemovalSummary {
    /// Failure lines in the form printed at the end of a run.
    #[must_use]
    pub fn failure_messages(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|(id, msg)| format!("Failed to remove role {id}: {msg}"))
            .collect()
    }
}
