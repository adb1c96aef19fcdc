// Everything a watched unit needs from the outside world

use crate::notify::{EventLog, Notifier};
use crate::process::monitor::{ProcessProbe, PsProbe};
use crate::process::runner::{CommandRunner, ShellRunner};
use crate::state::StateStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Fixed pause between steps of the stop escalation
pub const STOP_WAIT: Duration = Duration::from_secs(1);

/// Shared collaborators for one run: state store, process table, command
/// execution and event routing.
#[derive(Clone)]
pub struct Context {
    pub state: StateStore,
    pub probe: Arc<dyn ProcessProbe>,
    pub runner: Arc<dyn CommandRunner>,
    pub events: EventLog,
    /// Count descendants of a process towards its CPU and RAM usage
    pub include_children: bool,
    pub stop_wait: Duration,
}

impl Context {
    /// A context backed by the real OS: `ps`, `sh -c` and signals
    pub fn new<P: AsRef<Path>>(state_file: P) -> Self {
        Self {
            state: StateStore::new(state_file),
            probe: Arc::new(PsProbe::new()),
            runner: Arc::new(ShellRunner::new()),
            events: EventLog::new(),
            include_children: true,
            stop_wait: STOP_WAIT,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn ProcessProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.events.add_notifier(notifier);
        self
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    pub fn include_children(mut self, include: bool) -> Self {
        self.include_children = include;
        self
    }

    pub fn with_stop_wait(mut self, wait: Duration) -> Self {
        self.stop_wait = wait;
        self
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("state", &self.state)
            .field("events", &self.events)
            .field("include_children", &self.include_children)
            .field("stop_wait", &self.stop_wait)
            .finish()
    }
}
