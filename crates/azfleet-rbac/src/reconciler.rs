//! Planning and removal of orphaned role assignments.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use azfleet_az::{AzCommand, AzGateway};
use azfleet_core::{PrincipalId, Scope};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::directory::lookup_principal;
use crate::error::{RbacError, Result};
use crate::report::{StaleIdentity, StaleIdentityReport};
use crate::types::{DiscoveryScan, RemovalPlan, RemovalSummary, RoleAssignment};

/// A stale-identity report with live principals removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Rows whose principal was not shown to be live.
    pub entries: Vec<StaleIdentity>,
    /// Principals dropped from the report because they are not orphaned.
    pub kept_principals: BTreeSet<PrincipalId>,
    /// Number of rows dropped.
    pub removed_entries: usize,
}

/// How a cleanup run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The report file has no `Stale identities` key.
    MissingStaleIdentities,
    /// Every reported principal turned out to be live.
    NothingToProcess,
    /// No role assignment belongs to an orphaned principal.
    NothingToRemove,
    /// The deletion step ran.
    Removed(RemovalSummary),
}

/// Finds and removes role assignments left behind by deleted users.
pub struct OrphanReconciler<G: AzGateway + ?Sized> {
    az: Arc<G>,
}

impl<G: AzGateway + ?Sized> OrphanReconciler<G> {
    /// Create a reconciler using the given gateway.
    pub fn new(az: Arc<G>) -> Self {
        Self { az }
    }

    async fn list_role_assignments(
        &self,
        scope: Option<&Scope>,
        description: &str,
    ) -> Result<Vec<RoleAssignment>> {
        let command = AzCommand::new(["role", "assignment", "list"]);
        let command = match scope {
            Some(scope) => command.flag("--scope", scope.as_str()),
            None => command.arg("--all"),
        };
        let value = self.az.run(&command, description, false).await?;
        serde_json::from_value(value).map_err(|source| RbacError::Decode {
            what: "role assignment list",
            source,
        })
    }

    /// Drop every row whose principal is not confirmed orphaned.
    ///
    /// A principal that resolves to a live user, or whose lookup fails for
    /// any reason other than "does not exist", is removed from the report.
    pub async fn filter_report(&self, entries: &[StaleIdentity]) -> FilterOutcome {
        let principals: BTreeSet<PrincipalId> =
            entries.iter().map(|e| e.user_name.clone()).collect();
        let count = principals.len();

        let mut kept_principals = BTreeSet::new();
        for (pos, principal) in principals.into_iter().enumerate() {
            let description = format!("check user {pos} of {count}: {principal} exists");
            if !lookup_principal(self.az.as_ref(), &principal, &description)
                .await
                .is_orphaned()
            {
                kept_principals.insert(principal);
            }
        }

        let remaining: Vec<StaleIdentity> = entries
            .iter()
            .filter(|e| !kept_principals.contains(&e.user_name))
            .cloned()
            .collect();
        let removed_entries = entries.len() - remaining.len();

        if !kept_principals.is_empty() {
            let left: BTreeSet<_> = remaining.iter().map(|e| &e.user_name).collect();
            info!(
                "Removed {} non-orphaned identities from the list, leaving {}.",
                kept_principals.len(),
                left.len()
            );
        }
        if removed_entries > 0 {
            info!(
                "Removed {removed_entries} non-orphaned roles from the list, we now have {}.",
                remaining.len()
            );
        }

        FilterOutcome {
            entries: remaining,
            kept_principals,
            removed_entries,
        }
    }

    /// Resolve report rows to role assignment ids, listing each scope once.
    ///
    /// # Errors
    ///
    /// Fails if a scope's role assignments cannot be listed.
    pub async fn plan_from_report(&self, entries: &[StaleIdentity]) -> Result<RemovalPlan> {
        info!("Looking up role assignment info for orphaned accounts...");
        let count = entries.len();
        let mut by_scope: BTreeMap<Scope, Vec<RoleAssignment>> = BTreeMap::new();
        let mut plan = RemovalPlan::new();

        for (pos, entry) in entries.iter().enumerate() {
            if !by_scope.contains_key(&entry.scope) {
                let description = format!(
                    "{pos} of {count}: list role assignments for scope {}",
                    entry.scope
                );
                let assignments = self
                    .list_role_assignments(Some(&entry.scope), &description)
                    .await?;
                by_scope.insert(entry.scope.clone(), assignments);
            }

            let matching = by_scope
                .get(&entry.scope)
                .into_iter()
                .flatten()
                .filter(|a| a.principal_id == entry.user_name.as_str());
            for assignment in matching {
                plan.entry(entry.scope.clone())
                    .or_default()
                    .insert(assignment.id.clone());
            }
        }

        Ok(plan)
    }

    /// Scan every role assignment in the subscription for deleted users.
    ///
    /// Only `User` assignments are considered. Each principal is looked up
    /// once and every assignment of an orphaned principal is collected.
    ///
    /// # Errors
    ///
    /// Fails if the role assignments cannot be listed.
    pub async fn discover(&self) -> Result<DiscoveryScan> {
        let assignments = self
            .list_role_assignments(
                None,
                "list all role assignments to find orphaned accounts",
            )
            .await?;

        let mut scan = DiscoveryScan::default();
        for assignment in assignments {
            if !assignment.is_user() {
                continue;
            }
            let Some(principal) = assignment.principal() else {
                warn!(role = %assignment.id, "user assignment without a principal id");
                continue;
            };

            let orphaned = match scan.checked.get(&principal) {
                Some(orphaned) => *orphaned,
                None => {
                    let name = assignment.principal_name.as_deref().unwrap_or_default();
                    let description = format!("check if principal {principal} {name} is an orphan");
                    let orphaned = lookup_principal(self.az.as_ref(), &principal, &description)
                        .await
                        .is_orphaned();
                    scan.checked.insert(principal, orphaned);
                    orphaned
                }
            };

            if orphaned {
                scan.plan
                    .entry(assignment.scope)
                    .or_default()
                    .insert(assignment.id);
            }
        }

        Ok(scan)
    }

    /// Delete every planned assignment, one command per id.
    ///
    /// In a dry run nothing is deleted and the intended removals are logged.
    /// A failed delete is recorded and the remaining ids are still processed.
    pub async fn remove(&self, plan: &RemovalPlan, dry_run: bool) -> RemovalSummary {
        let mut summary = RemovalSummary {
            dry_run,
            ..RemovalSummary::default()
        };

        for (scope, roles) in plan {
            if dry_run {
                info!(scope = %scope, "DRY_RUN: would remove {} role assignments from scope {scope}", roles.len());
            } else {
                info!(scope = %scope, "Removing {} role assignments from scope {scope} ...", roles.len());
            }

            for role in roles {
                if dry_run {
                    info!(role = %role, "DRY RUN: would remove role {role}");
                    summary.removed.push(role.clone());
                    continue;
                }

                let command =
                    AzCommand::new(["role", "assignment", "delete"]).flag("--ids", role.as_str());
                match self
                    .az
                    .run(&command, &format!("Removing stale role {role} ..."), true)
                    .await
                {
                    Ok(result) => {
                        if let Some(state) = result.get("provisioningState").and_then(Value::as_str) {
                            info!(role = %role, state = %state, "{state}");
                        }
                        summary.removed.push(role.clone());
                    }
                    Err(e) => {
                        error!(role = %role, error = %e, "Failed to remove role {role}");
                        summary.failures.push((role.clone(), e.to_string()));
                    }
                }
            }
        }

        summary
    }

    /// Run a full cleanup, from a report file when one is given, otherwise by
    /// scanning the subscription.
    ///
    /// # Errors
    ///
    /// Fails if the report cannot be loaded or role assignments cannot be
    /// listed. Individual delete failures are reported in the summary.
    pub async fn run(&self, report: Option<&Path>, dry_run: bool) -> Result<RunOutcome> {
        let plan = match report {
            Some(path) => {
                let report = StaleIdentityReport::load(path)?;
                let Some(entries) = report.stale_identities else {
                    warn!("No 'Stale identities' found");
                    return Ok(RunOutcome::MissingStaleIdentities);
                };
                let filtered = self.filter_report(&entries).await;
                if filtered.entries.is_empty() {
                    info!("No stale identities to process");
                    return Ok(RunOutcome::NothingToProcess);
                }
                self.plan_from_report(&filtered.entries).await?
            }
            None => self.discover().await?.plan,
        };

        if plan.is_empty() {
            info!("No stale role assignments found for orphaned accounts, nothing to remove!");
            return Ok(RunOutcome::NothingToRemove);
        }

        Ok(RunOutcome::Removed(self.remove(&plan, dry_run).await))
    }
}

#[cfg(test)]
mod tests {
    use azfleet_az::{MockAz, MockReply};
    use azfleet_core::RoleAssignmentId;
    use serde_json::json;

    use super::*;

    const NOT_FOUND: &str = "ERROR: Resource 'x' does not exist or one of its queried reference-property objects are not present.";

    fn entry(principal: &str, scope: &str) -> StaleIdentity {
        StaleIdentity::new(PrincipalId::new(principal).unwrap(), Scope::new(scope).unwrap())
    }

    fn rid(id: &str) -> RoleAssignmentId {
        RoleAssignmentId::new(id).unwrap()
    }

    fn reconciler(az: &Arc<MockAz>) -> OrphanReconciler<MockAz> {
        OrphanReconciler::new(az.clone())
    }

    #[tokio::test]
    async fn live_principal_drops_all_its_rows() {
        let az = Arc::new(MockAz::new());
        az.on("ad user show --id live", MockReply::Json(json!({"givenName": "Ada"})));
        az.on("ad user show --id gone", MockReply::Fail(NOT_FOUND.into()));
        let entries = vec![
            entry("live", "/sub/a"),
            entry("gone", "/sub/a"),
            entry("live", "/sub/b"),
        ];

        let outcome = reconciler(&az).filter_report(&entries).await;
        assert_eq!(outcome.removed_entries, 2);
        assert_eq!(outcome.entries, vec![entry("gone", "/sub/a")]);
        assert!(outcome.kept_principals.contains(&PrincipalId::new("live").unwrap()));
        assert_eq!(az.count("ad user show"), 2);
    }

    #[tokio::test]
    async fn unexpected_lookup_error_keeps_principal() {
        let az = Arc::new(MockAz::new());
        az.on("ad user show", MockReply::Fail("network unreachable".into()));
        let outcome = reconciler(&az).filter_report(&[entry("p", "/s")]).await;
        assert!(outcome.entries.is_empty());
        assert_eq!(outcome.removed_entries, 1);
    }

    #[tokio::test]
    async fn plan_lists_each_scope_once() {
        let az = Arc::new(MockAz::new());
        az.on(
            "role assignment list --scope /sub/x",
            MockReply::Json(json!([
                {"id": "r1", "principalId": "abc", "scope": "/sub/x"},
                {"id": "r2", "principalId": "def", "scope": "/sub/x"},
                {"id": "r3", "principalId": "other", "scope": "/sub/x"}
            ])),
        );
        let plan = reconciler(&az)
            .plan_from_report(&[entry("abc", "/sub/x"), entry("def", "/sub/x")])
            .await
            .unwrap();

        assert_eq!(az.count("role assignment list"), 1);
        let ids = &plan[&Scope::new("/sub/x").unwrap()];
        assert_eq!(ids.iter().cloned().collect::<Vec<_>>(), vec![rid("r1"), rid("r2")]);
    }

    #[tokio::test]
    async fn plan_propagates_listing_failure() {
        let az = Arc::new(MockAz::new());
        az.on("role assignment list", MockReply::Fail("AuthorizationFailed".into()));
        let err = reconciler(&az)
            .plan_from_report(&[entry("abc", "/sub/x")])
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::Az(_)));
    }

    #[tokio::test]
    async fn discovery_skips_non_user_principals() {
        let az = Arc::new(MockAz::new());
        az.on(
            "role assignment list --all",
            MockReply::Json(json!([
                {"id": "sp1", "principalId": "sp", "principalType": "ServicePrincipal", "scope": "/s"},
                {"id": "g1", "principalId": "grp", "principalType": "Group", "scope": "/s"}
            ])),
        );
        az.on("ad user show", MockReply::Fail(NOT_FOUND.into()));

        let scan = reconciler(&az).discover().await.unwrap();
        assert!(scan.checked.is_empty());
        assert!(scan.plan.is_empty());
        assert_eq!(az.count("ad user show"), 0);
    }

    #[tokio::test]
    async fn discovery_collects_every_assignment_of_an_orphan() {
        let az = Arc::new(MockAz::new());
        az.on(
            "role assignment list --all",
            MockReply::Json(json!([
                {"id": "r1", "principalId": "gone", "principalType": "User", "scope": "/s1"},
                {"id": "r2", "principalId": "gone", "principalType": "User", "scope": "/s2"},
                {"id": "r3", "principalId": "live", "principalType": "User", "scope": "/s1"},
                {"id": "r4", "principalId": "flaky", "principalType": "User", "scope": "/s1"}
            ])),
        );
        az.on("ad user show --id gone", MockReply::Fail(NOT_FOUND.into()));
        az.on("ad user show --id live", MockReply::Json(json!({"givenName": "L"})));
        az.on("ad user show --id flaky", MockReply::Fail("throttled".into()));

        let scan = reconciler(&az).discover().await.unwrap();
        assert_eq!(az.count("ad user show --id gone"), 1);
        assert_eq!(scan.checked.len(), 3);
        assert!(scan.checked[&PrincipalId::new("gone").unwrap()]);
        assert!(!scan.checked[&PrincipalId::new("flaky").unwrap()]);

        let mut expected = RemovalPlan::new();
        expected.entry(Scope::new("/s1").unwrap()).or_default().insert(rid("r1"));
        expected.entry(Scope::new("/s2").unwrap()).or_default().insert(rid("r2"));
        assert_eq!(scan.plan, expected);
    }

    #[tokio::test]
    async fn remove_continues_after_failure() {
        let az = Arc::new(MockAz::new());
        az.on("role assignment delete --ids r1", MockReply::Fail("conflict".into()));
        az.on(
            "role assignment delete --ids r2",
            MockReply::Json(json!({"provisioningState": "Succeeded"})),
        );
        let mut plan = RemovalPlan::new();
        plan.entry(Scope::new("/s").unwrap())
            .or_default()
            .extend([rid("r1"), rid("r2"), rid("r3")]);

        let summary = reconciler(&az).remove(&plan, false).await;
        assert_eq!(az.count("role assignment delete"), 3);
        assert_eq!(summary.removed, vec![rid("r2"), rid("r3")]);
        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failure_messages()[0].starts_with("Failed to remove role r1: "));
    }

    #[tokio::test]
    async fn dry_run_issues_no_deletes() {
        let az = Arc::new(MockAz::new());
        let mut plan = RemovalPlan::new();
        plan.entry(Scope::new("/s").unwrap()).or_default().insert(rid("r1"));

        let summary = reconciler(&az).remove(&plan, true).await;
        assert!(summary.dry_run);
        assert_eq!(summary.removed, vec![rid("r1")]);
        assert!(az.calls().is_empty());
    }

    #[tokio::test]
    async fn discovery_with_nothing_orphaned_removes_nothing() {
        let az = Arc::new(MockAz::new());
        az.on("role assignment list --all", MockReply::Json(json!([])));
        let outcome = reconciler(&az).run(None, false).await.unwrap();
        assert_eq!(outcome, RunOutcome::NothingToRemove);
        assert_eq!(az.count("role assignment delete"), 0);
    }
}
