// Process module - Watched process lifecycle, sampling and supervision

pub mod limits;
mod managed;
pub mod monitor;
pub mod pid;
pub mod runner;
pub mod snapshot;
pub mod supervisor;
pub mod types;

pub use limits::ResourceLimits;
pub use managed::ManagedProcess;
pub use monitor::{ProcessProbe, PsProbe, SamplerKind, StopSignal, SysinfoProbe};
pub use pid::PidFile;
pub use runner::{CommandRunner, ShellRunner};
pub use snapshot::{Snapshot, SnapshotEntry};
pub use supervisor::{Action, RunReport, Supervisor, Watchable};
pub use types::{GracePeriods, ProcessCommands, ProcessState};
