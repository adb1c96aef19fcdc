use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Last recorded transition of a managed process.
///
/// This is not a live status: it is whatever the watcher last did (or last
/// observed, for the threshold states) and it is persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Started,
    Stopped,
    Restarted,
    AboveCpuLimit,
    AboveRamLimit,
}

impl ProcessState {
    pub const ALL: [ProcessState; 5] = [
        ProcessState::Started,
        ProcessState::Stopped,
        ProcessState::Restarted,
        ProcessState::AboveCpuLimit,
        ProcessState::AboveRamLimit,
    ];

    /// Action outcomes whose grace period blocks every other transition
    pub fn is_predominant(&self) -> bool {
        matches!(
            self,
            ProcessState::Started | ProcessState::Stopped | ProcessState::Restarted
        )
    }

    /// Sustained conditions that must be observed for a full grace window
    pub fn is_threshold(&self) -> bool {
        !self.is_predominant()
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessState::Started => write!(f, "started"),
            ProcessState::Stopped => write!(f, "stopped"),
            ProcessState::Restarted => write!(f, "restarted"),
            ProcessState::AboveCpuLimit => write!(f, "above_cpu_limit"),
            ProcessState::AboveRamLimit => write!(f, "above_ram_limit"),
        }
    }
}

/// Shell commands used to drive a process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessCommands {
    pub start: String,
    pub stop: String,
    #[serde(default)]
    pub restart: Option<String>,
}

/// Grace periods in seconds, one per transition kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GracePeriods {
    #[serde(default)]
    pub start: u64,
    #[serde(default)]
    pub stop: u64,
    #[serde(default)]
    pub restart: u64,
    #[serde(default)]
    pub cpu: u64,
    #[serde(default)]
    pub ram: u64,
}

impl GracePeriods {
    /// Grace period that applies once `state` has been recorded
    pub fn for_state(&self, state: ProcessState) -> Duration {
        let secs = match state {
            ProcessState::Started => self.start,
            ProcessState::Stopped => self.stop,
            ProcessState::Restarted => self.restart,
            ProcessState::AboveCpuLimit => self.cpu,
            ProcessState::AboveRamLimit => self.ram,
        };
        Duration::from_secs(secs)
    }
}
