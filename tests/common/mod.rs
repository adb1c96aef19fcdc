// Shared fakes for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use vigil::context::Context;
use vigil::notify::Notifier;
use vigil::process::{
    CommandRunner, ManagedProcess, ProcessCommands, ProcessProbe, Snapshot, SnapshotEntry,
    StopSignal,
};
use vigil::Result;

/// In-memory host: live pids, a fixed `ps` listing, and commands that
/// bring pids up or down when run.
#[derive(Default)]
pub struct FakeHost {
    alive: Mutex<HashSet<u32>>,
    entries: Mutex<HashMap<u32, SnapshotEntry>>,
    commands: Mutex<Vec<String>>,
    signals: Mutex<Vec<(u32, StopSignal)>>,
    spawns: Mutex<HashMap<String, (u32, PathBuf)>>,
    kills: Mutex<HashMap<String, u32>>,
    snapshots: Mutex<usize>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark `pid` running and write it to `pid_file`
    pub fn run_process(&self, pid: u32, pid_file: &Path) {
        std::fs::write(pid_file, pid.to_string()).unwrap();
        self.alive.lock().unwrap().insert(pid);
    }

    pub fn kill_process(&self, pid: u32) {
        self.alive.lock().unwrap().remove(&pid);
    }

    pub fn is_running(&self, pid: u32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }

    pub fn set_usage(&self, pid: u32, parent_pid: u32, cpu_percent: f32, ram_kb: u64) {
        self.entries.lock().unwrap().insert(
            pid,
            SnapshotEntry {
                pid,
                parent_pid,
                cpu_percent,
                ram_kb,
            },
        );
    }

    pub fn spawns_on(&self, command: &str, pid: u32, pid_file: &Path) {
        self.spawns
            .lock()
            .unwrap()
            .insert(command.to_string(), (pid, pid_file.to_path_buf()));
    }

    pub fn kills_on(&self, command: &str, pid: u32) {
        self.kills.lock().unwrap().insert(command.to_string(), pid);
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn take_commands(&self) -> Vec<String> {
        std::mem::take(&mut *self.commands.lock().unwrap())
    }

    pub fn signals(&self) -> Vec<(u32, StopSignal)> {
        self.signals.lock().unwrap().clone()
    }

    pub fn snapshot_count(&self) -> usize {
        *self.snapshots.lock().unwrap()
    }
}

#[async_trait]
impl ProcessProbe for FakeHost {
    async fn snapshot(&self) -> Result<Snapshot> {
        *self.snapshots.lock().unwrap() += 1;
        let entries: Vec<SnapshotEntry> = self.entries.lock().unwrap().values().copied().collect();
        Ok(Snapshot::from_entries(entries))
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.is_running(pid)
    }

    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()> {
        self.signals.lock().unwrap().push((pid, signal));
        if signal == StopSignal::Kill {
            self.kill_process(pid);
        }
        Ok(())
    }
}

#[async_trait]
impl CommandRunner for FakeHost {
    async fn run(&self, command: &str) -> Result<ExitStatus> {
        self.commands.lock().unwrap().push(command.to_string());
        if let Some((pid, pid_file)) = self.spawns.lock().unwrap().get(command).cloned() {
            std::fs::write(pid_file, pid.to_string())?;
            self.alive.lock().unwrap().insert(pid);
        }
        if let Some(pid) = self.kills.lock().unwrap().get(command).copied() {
            self.alive.lock().unwrap().remove(&pid);
        }
        Ok(ExitStatus::default())
    }
}

/// Collects every notification it is sent
#[derive(Default)]
pub struct Inbox {
    messages: Mutex<Vec<String>>,
}

impl Inbox {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for Inbox {
    async fn send(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub temp_dir: TempDir,
    pub host: Arc<FakeHost>,
    pub inbox: Arc<Inbox>,
    pub ctx: Context,
}

impl Harness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let host = FakeHost::new();
        let inbox = Arc::new(Inbox::default());
        let ctx = Context::new(temp_dir.path().join("state").join("state.json"))
            .with_probe(host.clone())
            .with_runner(host.clone())
            .with_notifier(inbox.clone())
            .with_stop_wait(Duration::ZERO);
        Self {
            temp_dir,
            host,
            inbox,
            ctx,
        }
    }

    pub fn pid_file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(format!("{}.pid", name))
    }

    /// A process whose commands are `<name> start`, `<name> stop` and,
    /// when `with_restart` is set, `<name> restart`
    pub fn process(&self, name: &str, with_restart: bool) -> ManagedProcess {
        ManagedProcess::new(name, commands(name, with_restart)).with_pid_file(self.pid_file(name))
    }
}

pub fn commands(name: &str, with_restart: bool) -> ProcessCommands {
    ProcessCommands {
        start: format!("{} start", name),
        stop: format!("{} stop", name),
        restart: with_restart.then(|| format!("{} restart", name)),
    }
}
