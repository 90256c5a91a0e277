//! Teardown of everything a run created.
//!
//! Names are recorded in a [`ResourceLedger`] before the resource is created,
//! so a start that fails halfway is still cleaned up. Teardown is best effort:
//! each failure is logged and reported, never raised, so that it cannot mask
//! the error that ended the run.

use std::time::Duration;

use crate::compose::ComposeStack;
use crate::error::{InfraError, InfraResult};
use crate::identity::RunIdentity;
use crate::runtime::ContainerRuntime;

/// Grace period given to containers during teardown.
pub const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

/// Resources created by one run, in creation order.
#[derive(Debug, Clone)]
pub struct ResourceLedger {
    identity: RunIdentity,
    containers: Vec<String>,
    networks: Vec<String>,
    volumes: Vec<String>,
    stacks: Vec<ComposeStack>,
}

impl ResourceLedger {
    /// Creates an empty ledger for `identity`.
    pub fn new(identity: RunIdentity) -> Self {
        Self {
            identity,
            containers: Vec::new(),
            networks: Vec::new(),
            volumes: Vec::new(),
            stacks: Vec::new(),
        }
    }

    /// The run this ledger belongs to.
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Records a container name.
    pub fn record_container(&mut self, name: &str) -> InfraResult<()> {
        self.check_owned(name)?;
        push_unique(&mut self.containers, name);
        Ok(())
    }

    /// Records a network name.
    pub fn record_network(&mut self, name: &str) -> InfraResult<()> {
        self.check_owned(name)?;
        push_unique(&mut self.networks, name);
        Ok(())
    }

    /// Records a volume name.
    pub fn record_volume(&mut self, name: &str) -> InfraResult<()> {
        self.check_owned(name)?;
        push_unique(&mut self.volumes, name);
        Ok(())
    }

    /// Records a compose stack.
    pub fn record_stack(&mut self, stack: ComposeStack) -> InfraResult<()> {
        self.check_owned(stack.project())?;
        self.stacks.push(stack);
        Ok(())
    }

    pub fn containers(&self) -> &[String] {
        &self.containers
    }

    pub fn networks(&self) -> &[String] {
        &self.networks
    }

    pub fn volumes(&self) -> &[String] {
        &self.volumes
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
            && self.networks.is_empty()
            && self.volumes.is_empty()
            && self.stacks.is_empty()
    }

    /// Removes every recorded resource in reverse creation order.
    ///
    /// Containers go first (they hold networks and volumes), then compose
    /// stacks, then networks and volumes. The ledger is emptied.
    pub fn teardown(&mut self, runtime: &dyn ContainerRuntime) -> CleanupReport {
        let mut report = CleanupReport::default();

        for name in self.containers.drain(..).rev() {
            // A container that never started may not stop; removal still applies.
            if let Err(e) = runtime.stop(&name, TEARDOWN_GRACE) {
                tracing::debug!(container = %name, "stop failed: {}", e);
            }
            report.record(&name, runtime.remove(&name));
        }
        for stack in self.stacks.drain(..).rev() {
            let project = stack.project().to_string();
            report.record(&project, stack.down());
        }
        for name in self.networks.drain(..).rev() {
            report.record(&name, runtime.remove_network(&name));
        }
        for name in self.volumes.drain(..).rev() {
            report.record(&name, runtime.remove_volume(&name));
        }

        report.log_summary(self.identity.run_id());
        report
    }

    fn check_owned(&self, name: &str) -> InfraResult<()> {
        if self.identity.owns(name) {
            Ok(())
        } else {
            Err(InfraError::NotOwned {
                name: name.to_string(),
                run_id: self.identity.run_id().to_string(),
            })
        }
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

/// Outcome of a teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Names removed.
    pub removed: Vec<String>,
    /// `(name, error message)` for every removal that failed.
    pub errors: Vec<(String, String)>,
}

impl CleanupReport {
    /// Returns true if every removal succeeded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn record(&mut self, name: &str, result: InfraResult<()>) {
        match result {
            Ok(()) => self.removed.push(name.to_string()),
            Err(e) => {
                tracing::warn!(resource = %name, "cleanup failed: {}", e);
                self.errors.push((name.to_string(), e.to_string()));
            }
        }
    }

    fn log_summary(&self, run_id: &str) {
        if self.removed.is_empty() && self.errors.is_empty() {
            return;
        }
        tracing::info!(
            run_id,
            removed = self.removed.len(),
            failed = self.errors.len(),
            "teardown complete"
        );
    }
}

/// Removes everything labeled with `run_id`, for runs that crashed before
/// their own teardown.
pub fn cleanup_run(runtime: &dyn ContainerRuntime, run_id: &str) -> InfraResult<CleanupReport> {
    let found = runtime.list_by_run(run_id)?;
    let mut ledger = ResourceLedger::new(RunIdentity::from_run_id(run_id));
    let mut recorded = Vec::new();
    for name in &found.containers {
        recorded.push((name, ledger.record_container(name)));
    }
    for name in &found.networks {
        recorded.push((name, ledger.record_network(name)));
    }
    for name in &found.volumes {
        recorded.push((name, ledger.record_volume(name)));
    }
    for (name, result) in recorded {
        if let Err(e) = result {
            tracing::warn!(resource = %name, "skipping labeled resource: {}", e);
        }
    }
    Ok(ledger.teardown(runtime))
}
