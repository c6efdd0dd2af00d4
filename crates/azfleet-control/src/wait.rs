//! Bounded wait for a VM to reach the running state.

use azfleet_az::AzGateway;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::Result;
use crate::service::VmFleetController;
use crate::state::VmState;

/// How a wait for the running state ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The VM reported running.
    Running,
    /// The configured timeout elapsed first.
    TimedOut,
}

/// Re-fetch the VM's state at the configured interval until it is running or
/// the configured timeout elapses.
///
/// Returns the last observed state together with the outcome. A timeout is
/// not an error; callers decide whether to carry on.
///
/// # Errors
///
/// Propagates discovery failures from [`VmFleetController::get_vm_state`].
pub async fn wait_until_running<G: AzGateway + ?Sized>(
    controller: &VmFleetController<G>,
    mut vm: VmState,
) -> Result<(VmState, WaitOutcome)> {
    let interval = controller.config().poll_interval();
    let timeout = controller.config().start_timeout();
    let started = Instant::now();

    while !vm.is_running() {
        if started.elapsed() >= timeout {
            warn!(vm = %vm.name, power = %vm.power, "Timeout: starting vm");
            return Ok((vm, WaitOutcome::TimedOut));
        }
        sleep(interval).await;
        vm = controller.get_vm_state(&vm.name).await?;
        debug!(vm = %vm.name, power = %vm.power, "polled VM state");
    }

    Ok((vm, WaitOutcome::Running))
}
