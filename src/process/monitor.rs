use crate::error::{Result, VigilError};
use crate::process::snapshot::{Snapshot, SnapshotEntry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::process::Command;
use tracing::{debug, warn};

/// Signals used by the stop escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Terminate,
    Kill,
}

impl std::fmt::Display for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopSignal::Terminate => write!(f, "SIGTERM"),
            StopSignal::Kill => write!(f, "SIGKILL"),
        }
    }
}

/// Window onto the host's process table
#[async_trait]
pub trait ProcessProbe: Send + Sync {
    /// Take one listing of every process on the host
    async fn snapshot(&self) -> Result<Snapshot>;

    /// Whether a process with this pid exists
    fn is_alive(&self, pid: u32) -> bool;

    /// Deliver a stop signal to a single pid
    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()>;
}

/// Which probe implementation to build from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerKind {
    #[default]
    Ps,
    Sysinfo,
}

impl SamplerKind {
    pub fn build(self) -> Arc<dyn ProcessProbe> {
        match self {
            SamplerKind::Ps => Arc::new(PsProbe::new()),
            SamplerKind::Sysinfo => Arc::new(SysinfoProbe::new()),
        }
    }
}

/// Samples the process table through `ps`
#[derive(Debug, Clone)]
pub struct PsProbe {
    program: String,
}

impl PsProbe {
    pub fn new() -> Self {
        Self {
            program: "ps".to_string(),
        }
    }

    /// Use a different `ps` binary
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for PsProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessProbe for PsProbe {
    async fn snapshot(&self) -> Result<Snapshot> {
        let output = Command::new(&self.program)
            .args(["axo", "pid=,ppid=,pcpu=,rss="])
            .output()
            .await
            .map_err(|e| {
                VigilError::SamplerError(format!("Failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            warn!(
                "{} exited with {}, using whatever it printed",
                self.program, output.status
            );
        }

        let snapshot = Snapshot::parse_ps(&String::from_utf8_lossy(&output.stdout));
        debug!("Sampled {} processes via {}", snapshot.len(), self.program);
        Ok(snapshot)
    }

    fn is_alive(&self, pid: u32) -> bool {
        is_pid_alive(pid)
    }

    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()> {
        send_signal(pid, signal)
    }
}

/// Samples the process table through `sysinfo`, for hosts without a usable `ps`
#[derive(Debug, Clone, Default)]
pub struct SysinfoProbe;

impl SysinfoProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessProbe for SysinfoProbe {
    async fn snapshot(&self) -> Result<Snapshot> {
        let mut system = System::new();

        // CPU usage is a delta, so it needs two refreshes some time apart
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );

        let snapshot = Snapshot::from_entries(system.processes().iter().map(|(pid, process)| {
            SnapshotEntry {
                pid: pid.as_u32(),
                parent_pid: process.parent().map(|p| p.as_u32()).unwrap_or(0),
                cpu_percent: process.cpu_usage(),
                ram_kb: process.memory() / 1024,
            }
        }));
        debug!("Sampled {} processes via sysinfo", snapshot.len());
        Ok(snapshot)
    }

    fn is_alive(&self, pid: u32) -> bool {
        is_pid_alive(pid)
    }

    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()> {
        send_signal(pid, signal)
    }
}

/// Probe a pid with signal 0.
///
/// A process we are not allowed to signal still exists, so EPERM counts as
/// alive. Only ESRCH means dead; any other failure is also reported as dead.
#[cfg(unix)]
pub fn is_pid_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;

    let Some(nix_pid) = to_nix_pid(pid) else {
        return false;
    };
    classify_probe(kill(nix_pid, None))
}

#[cfg(unix)]
fn classify_probe(result: nix::Result<()>) -> bool {
    use nix::errno::Errno;

    match result {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(Errno::ESRCH) => false,
        Err(e) => {
            debug!("Liveness probe failed unexpectedly: {}", e);
            false
        }
    }
}

/// Send a stop signal to exactly one process
#[cfg(unix)]
pub fn send_signal(pid: u32, signal: StopSignal) -> Result<()> {
    use nix::sys::signal::{kill, Signal};

    let nix_pid =
        to_nix_pid(pid).ok_or_else(|| VigilError::SignalError(pid, "invalid pid".to_string()))?;
    let nix_signal = match signal {
        StopSignal::Terminate => Signal::SIGTERM,
        StopSignal::Kill => Signal::SIGKILL,
    };
    kill(nix_pid, nix_signal).map_err(|e| VigilError::SignalError(pid, e.to_string()))
}

/// Pids 0 and anything that would go negative address process groups
#[cfg(unix)]
fn to_nix_pid(pid: u32) -> Option<nix::unistd::Pid> {
    i32::try_from(pid)
        .ok()
        .filter(|&raw| raw > 0)
        .map(nix::unistd::Pid::from_raw)
}

#[cfg(not(unix))]
pub fn is_pid_alive(pid: u32) -> bool {
    let mut system = System::new();
    let sys_pid = sysinfo::Pid::from_u32(pid);
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[sys_pid]),
        true,
        ProcessRefreshKind::everything(),
    );
    system.process(sys_pid).is_some()
}

#[cfg(not(unix))]
pub fn send_signal(pid: u32, _signal: StopSignal) -> Result<()> {
    let mut system = System::new();
    let sys_pid = sysinfo::Pid::from_u32(pid);
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[sys_pid]),
        true,
        ProcessRefreshKind::everything(),
    );
    match system.process(sys_pid) {
        Some(process) if process.kill() => Ok(()),
        _ => Err(VigilError::SignalError(pid, "kill failed".to_string())),
    }
}
