//! Stale-identity reports exported from the security portal.

use std::collections::BTreeSet;
use std::path::Path;

use azfleet_core::{PrincipalId, Scope};
use serde::{Deserialize, Serialize};

use crate::error::{RbacError, Result};

/// Example report, shown in CLI help.
pub const EXAMPLE_REPORT: &str = r#"{
  "Stale identities": [
    {
      "RoleName": "Unknown",
      "PrincipalName": "identity not found or stale account",
      "Scope": "/subscriptions/.../resourceGroups/.../providers/Microsoft.Storage/storageAccounts/...",
      "UserName": "810b0fcc-607a-413b-af86-14100c709f44",
      "IdentityType": "User",
      "AssignmentType": "Permanent"
    }
  ]
}"#;

/// One row of a stale-identity report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StaleIdentity {
    /// Role name, usually `Unknown` for a deleted principal.
    #[serde(default)]
    pub role_name: Option<String>,
    /// Display name, if the portal still knew it.
    #[serde(default)]
    pub principal_name: Option<String>,
    /// Scope the role was assigned at.
    pub scope: Scope,
    /// Object id of the principal. The portal exports it as `UserName`.
    pub user_name: PrincipalId,
    /// Principal type, e.g. `User`.
    #[serde(default)]
    pub identity_type: Option<String>,
    /// `Permanent` or `Eligible`.
    #[serde(default)]
    pub assignment_type: Option<String>,
}

impl StaleIdentity {
    /// Create a row with only the fields cleanup relies on.
    #[must_use]
    pub fn new(user_name: PrincipalId, scope: Scope) -> Self {
        Self {
            role_name: None,
            principal_name: None,
            scope,
            user_name,
            identity_type: None,
            assignment_type: None,
        }
    }
}

/// A stale-identity report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleIdentityReport {
    /// The report rows; `None` when the key is missing from the file.
    #[serde(rename = "Stale identities", default, skip_serializing_if = "Option::is_none")]
    pub stale_identities: Option<Vec<StaleIdentity>>,
}

impl StaleIdentityReport {
    /// Build a report from rows.
    #[must_use]
    pub fn from_entries(entries: Vec<StaleIdentity>) -> Self {
        Self {
            stale_identities: Some(entries),
        }
    }

    /// Read and parse a report file.
    ///
    /// # Errors
    ///
    /// Returns `Read` if the file cannot be read and `Parse` if it is not a
    /// JSON object of the expected shape.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RbacError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| RbacError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The rows, or an empty slice when the key was missing.
    #[must_use]
    pub fn entries(&self) -> &[StaleIdentity] {
        self.stale_identities.as_deref().unwrap_or_default()
    }

    /// Distinct principal ids referenced by the report.
    #[must_use]
    pub fn principals(&self) -> BTreeSet<PrincipalId> {
        self.entries().iter().map(|e| e.user_name.clone()).collect()
    }
}
