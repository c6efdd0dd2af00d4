//! Subcommand handlers. Each returns `true` when every item succeeded.

use std::sync::Arc;

use azfleet_az::{set_subscription, AzGateway};
use azfleet_control::{ControlConfig, VmFleetController};
use azfleet_core::ResourceGroupRef;
use azfleet_extensions::{ExtensionReconciler, FleetReport};
use azfleet_rbac::{OrphanReconciler, RemovalSummary, RunOutcome};
use tracing::info;

use crate::{InstallExtensionsArgs, RemoveOrphansArgs};

pub async fn install_extensions<G: AzGateway + ?Sized>(
    az: Arc<G>,
    args: InstallExtensionsArgs,
) -> anyhow::Result<bool> {
    let group = ResourceGroupRef::new(args.subscription, args.resource_group);
    let config = ControlConfig::from_env();
    info!(
        subscription = %group.subscription_id,
        resource_group = %group.resource_group,
        "checking extensions"
    );

    let controller = VmFleetController::new(az, group, config);
    let mut reconciler = ExtensionReconciler::new(controller, args.uami);
    let report = reconciler.reconcile(&args.vms).await?;

    for line in fleet_summary(&report) {
        println!("{line}");
    }
    Ok(report.failed_vms.is_empty() && report.vms.iter().all(|r| r.failed.is_empty()))
}

fn fleet_summary(report: &FleetReport) -> Vec<String> {
    let mut lines = Vec::new();
    for name in &report.missing {
        lines.push(format!("VM {name} not found"));
    }
    for vm in &report.vms {
        let installed: Vec<String> = vm.installed.iter().map(ToString::to_string).collect();
        lines.push(format!(
            "{}: {} present, {} installing{}",
            vm.vm,
            vm.present.len(),
            vm.installed.len(),
            if installed.is_empty() {
                String::new()
            } else {
                format!(" ({})", installed.join(", "))
            }
        ));
        for (kind, error) in &vm.failed {
            lines.push(format!("  failed to install {kind}: {error}"));
        }
    }
    for name in report.timed_out() {
        lines.push(format!("Timeout waiting for {name} to start"));
    }
    for (name, error) in &report.failed_vms {
        lines.push(format!("{name}: {error}"));
    }
    lines
}

pub async fn remove_orphans<G: AzGateway + ?Sized>(
    az: Arc<G>,
    args: RemoveOrphansArgs,
) -> anyhow::Result<bool> {
    if let Some(subscription) = &args.subscription {
        println!("Switching to subscription {subscription} ...");
        set_subscription(az.as_ref(), subscription).await?;
    }

    let outcome = OrphanReconciler::new(az)
        .run(args.json_file.as_deref(), args.dry_run)
        .await?;

    let clean = match &outcome {
        RunOutcome::Removed(summary) => summary.failures.is_empty(),
        RunOutcome::MissingStaleIdentities
        | RunOutcome::NothingToProcess
        | RunOutcome::NothingToRemove => true,
    };
    for line in outcome_summary(&outcome) {
        println!("{line}");
    }
    Ok(clean)
}

fn outcome_summary(outcome: &RunOutcome) -> Vec<String> {
    match outcome {
        RunOutcome::MissingStaleIdentities => vec!["No 'Stale identities' found".to_string()],
        RunOutcome::NothingToProcess => vec!["No stale identities to process".to_string()],
        RunOutcome::NothingToRemove => {
            vec!["No stale role assignments found for orphaned accounts, nothing to remove!".to_string()]
        }
        RunOutcome::Removed(summary) => removal_summary(summary),
    }
}

fn removal_summary(summary: &RemovalSummary) -> Vec<String> {
    let verb = if summary.dry_run { "Would remove" } else { "Removed" };
    let mut lines = vec![format!("{verb} {} role assignments", summary.removed.len())];
    lines.extend(summary.failure_messages());
    lines
}
