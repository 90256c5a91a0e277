//! Test doubles for the container layer.
//!
//! [`ScriptedRuntime`] replays statuses per container in the order scripted;
//! the last one repeats forever. Exec replies come from a queue, then from an
//! optional handler, and default to a successful empty output.
//!
//! [`RecordingRunner`] sits one level lower and records the docker command
//! lines a [`DockerCli`](crate::DockerCli) would run.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{InfraError, InfraResult};
use crate::process::{CommandRunner, ProcessError, ProcessOutput, ProcessSpec};
use crate::runtime::{
    ContainerRuntime, ContainerSpec, ExecRequest, RunResources, ServiceStatus,
};

type ExecHandler = Box<dyn Fn(&ExecRequest) -> ProcessOutput + Send + Sync>;
type InspectHook = Box<dyn Fn(&str, usize) + Send + Sync>;

#[derive(Default)]
struct State {
    statuses: HashMap<String, VecDeque<ServiceStatus>>,
    exec_queue: VecDeque<ProcessOutput>,
    exec_handler: Option<ExecHandler>,
    inspect_hook: Option<InspectHook>,
    exec_failure: Option<String>,
    exec_requests: Vec<ExecRequest>,
    logs: HashMap<String, String>,
    started: Vec<ContainerSpec>,
    containers: Vec<String>,
    networks: Vec<String>,
    volumes: Vec<String>,
    removed: Vec<String>,
    failing_removals: Vec<String>,
    inspections: usize,
}

/// In-memory container runtime driven by a script.
#[derive(Default)]
pub struct ScriptedRuntime {
    state: Mutex<State>,
}

impl ScriptedRuntime {
    /// Creates an empty runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the statuses `inspect` returns for `name`.
    pub fn script_status(&self, name: &str, statuses: Vec<ServiceStatus>) {
        self.lock()
            .statuses
            .insert(name.to_string(), statuses.into_iter().collect());
    }

    /// Queues one exec reply.
    pub fn push_exec(&self, output: ProcessOutput) {
        self.lock().exec_queue.push_back(output);
    }

    /// Answers execs that find the queue empty.
    pub fn on_exec<F>(&self, handler: F)
    where
        F: Fn(&ExecRequest) -> ProcessOutput + Send + Sync + 'static,
    {
        self.lock().exec_handler = Some(Box::new(handler));
    }

    /// Calls `hook` with the container name and the running inspection count
    /// on every `inspect`.
    pub fn on_inspect<F>(&self, hook: F)
    where
        F: Fn(&str, usize) + Send + Sync + 'static,
    {
        self.lock().inspect_hook = Some(Box::new(hook));
    }

    /// Makes every exec fail at the runtime level.
    pub fn fail_exec(&self, message: &str) {
        self.lock().exec_failure = Some(message.to_string());
    }

    /// Sets the log text returned for `name`.
    pub fn set_logs(&self, name: &str, text: &str) {
        self.lock().logs.insert(name.to_string(), text.to_string());
    }

    /// Makes removal of `name` fail.
    pub fn fail_removal_of(&self, name: &str) {
        self.lock().failing_removals.push(name.to_string());
    }

    /// Pretends a resource already exists (e.g. left over from a crash).
    pub fn add_existing(&self, resources: RunResources) {
        let mut state = self.lock();
        state.containers.extend(resources.containers);
        state.networks.extend(resources.networks);
        state.volumes.extend(resources.volumes);
    }

    /// Every exec request seen so far.
    pub fn exec_requests(&self) -> Vec<ExecRequest> {
        self.lock().exec_requests.clone()
    }

    /// Every container spec started so far.
    pub fn started(&self) -> Vec<ContainerSpec> {
        self.lock().started.clone()
    }

    /// Every resource name removed so far, in order.
    pub fn removed(&self) -> Vec<String> {
        self.lock().removed.clone()
    }

    /// Number of `inspect` calls.
    pub fn inspections(&self) -> usize {
        self.lock().inspections
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remove_named(&self, name: &str, kind: fn(&mut State) -> &mut Vec<String>) -> InfraResult<()> {
        let mut state = self.lock();
        if state.failing_removals.iter().any(|n| n == name) {
            return Err(InfraError::command_failed(
                format!("rm {}", name),
                1,
                "simulated removal failure",
            ));
        }
        let list = kind(&mut *state);
        list.retain(|n| n != name);
        state.removed.push(name.to_string());
        Ok(())
    }
}

impl ContainerRuntime for ScriptedRuntime {
    fn start(&self, spec: &ContainerSpec) -> InfraResult<String> {
        let mut state = self.lock();
        state.started.push(spec.clone());
        state.containers.push(spec.name.clone());
        Ok(format!("id-{}", spec.name))
    }

    fn inspect(&self, name: &str) -> InfraResult<ServiceStatus> {
        let mut state = self.lock();
        state.inspections += 1;
        if let Some(ref hook) = state.inspect_hook {
            hook(name, state.inspections);
        }
        let queue = state.statuses.get_mut(name);
        match queue {
            Some(queue) if queue.len() > 1 => Ok(queue.pop_front().unwrap_or_default()),
            Some(queue) => Ok(queue.front().copied().unwrap_or_default()),
            None => Ok(ServiceStatus::healthy()),
        }
    }

    fn exec(&self, request: &ExecRequest) -> InfraResult<ProcessOutput> {
        let mut state = self.lock();
        state.exec_requests.push(request.clone());
        if let Some(ref message) = state.exec_failure {
            return Err(InfraError::command_failed("docker exec", -1, message.clone()));
        }
        if let Some(output) = state.exec_queue.pop_front() {
            return Ok(output);
        }
        if let Some(ref handler) = state.exec_handler {
            return Ok(handler(request));
        }
        Ok(ProcessOutput::with_status(0, "", ""))
    }

    fn logs(&self, name: &str, tail: usize) -> InfraResult<String> {
        let state = self.lock();
        let text = state.logs.get(name).cloned().unwrap_or_default();
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.len().saturating_sub(tail);
        Ok(lines[start..].join("\n"))
    }

    fn stop(&self, _name: &str, _grace: Duration) -> InfraResult<()> {
        Ok(())
    }

    fn remove(&self, name: &str) -> InfraResult<()> {
        self.remove_named(name, |s| &mut s.containers)
    }

    fn create_network(&self, name: &str, _labels: &[(String, String)]) -> InfraResult<()> {
        self.lock().networks.push(name.to_string());
        Ok(())
    }

    fn remove_network(&self, name: &str) -> InfraResult<()> {
        self.remove_named(name, |s| &mut s.networks)
    }

    fn create_volume(&self, name: &str, _labels: &[(String, String)]) -> InfraResult<()> {
        self.lock().volumes.push(name.to_string());
        Ok(())
    }

    fn remove_volume(&self, name: &str) -> InfraResult<()> {
        self.remove_named(name, |s| &mut s.volumes)
    }

    fn list_by_run(&self, run_id: &str) -> InfraResult<RunResources> {
        let state = self.lock();
        let suffix = format!("-{}", run_id);
        let matching = |names: &[String]| -> Vec<String> {
            names.iter().filter(|n| n.ends_with(&suffix)).cloned().collect()
        };
        Ok(RunResources {
            containers: matching(&state.containers),
            networks: matching(&state.networks),
            volumes: matching(&state.volumes),
        })
    }
}

/// Records every command and replies from a fixed queue.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<ProcessSpec>>,
    replies: Mutex<VecDeque<ProcessOutput>>,
}

impl RecordingRunner {
    /// Creates a runner that answers with `outputs` in order, then with
    /// successful empty outputs.
    pub fn reply(outputs: Vec<ProcessOutput>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(outputs.into()),
        })
    }

    /// Arguments of every command run so far.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.specs().into_iter().map(|s| s.args).collect()
    }

    /// Every command run so far.
    pub fn specs(&self) -> Vec<ProcessSpec> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(spec.clone());
        Ok(self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| ProcessOutput::with_status(0, "", "")))
    }
}
