// State module - Persistent record of the last transition per process

use crate::error::{Result, VigilError};
use crate::process::ProcessState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Last recorded transition for one process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub state: ProcessState,
    /// Epoch seconds of the last time `state` changed
    pub updated_at: i64,
}

/// Everything in the state file, keyed by process name
pub type StateMap = BTreeMap<String, PersistedState>;

/// Current wall-clock time in epoch seconds
pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

/// State store handles persistence of per-process state to disk.
///
/// The file is shared by every unit in a run and by overlapping runs, so
/// every read-modify-write happens under an exclusive lock on a sibling
/// `.lock` file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Create a new state store with the given file path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the whole mapping. A missing or empty file is an empty mapping;
    /// a file that does not parse is an error rather than lost history.
    pub fn read(&self) -> Result<StateMap> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StateMap::new()),
            Err(e) => {
                return Err(VigilError::StateLoadError(format!(
                    "Failed to read state file {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if contents.trim().is_empty() {
            return Ok(StateMap::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            VigilError::StateCorruption(format!(
                "Failed to parse state file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Replace the whole mapping on disk
    pub fn write(&self, states: &StateMap) -> Result<()> {
        let _lock = self.lock()?;
        self.write_unlocked(states)
    }

    /// Recorded state for one process, if any
    pub fn get(&self, name: &str) -> Result<Option<PersistedState>> {
        Ok(self.read()?.get(name).copied())
    }

    /// Record `state` for `name` at the current time
    pub fn update_state(&self, name: &str, state: ProcessState) -> Result<PersistedState> {
        self.update_state_at(name, state, now_epoch())
    }

    /// Record `state` for `name`.
    ///
    /// Re-recording the state that is already there keeps its original
    /// timestamp; only a change of state moves `updated_at` to `now`.
    pub fn update_state_at(
        &self,
        name: &str,
        state: ProcessState,
        now: i64,
    ) -> Result<PersistedState> {
        let _lock = self.lock()?;
        let mut states = self.read()?;

        let updated_at = match states.get(name) {
            Some(previous) if previous.state == state => previous.updated_at,
            _ => now,
        };
        let record = PersistedState { state, updated_at };
        states.insert(name.to_string(), record);

        self.write_unlocked(&states)?;
        debug!("Recorded state {} for {} (since {})", state, name, updated_at);
        Ok(record)
    }

    /// Get the path to the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    VigilError::StateSaveError(format!("Failed to create state directory: {}", e))
                })?;
            }
        }
        Ok(())
    }

    /// Take the exclusive state lock, blocking until it is free
    fn lock(&self) -> Result<StateLock> {
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())
            .map_err(|e| VigilError::StateLockError(format!("Failed to open lock file: {}", e)))?;
        StateLock::acquire(file)
    }

    fn write_unlocked(&self, states: &StateMap) -> Result<()> {
        self.ensure_parent()?;

        // Write to a temporary file first so readers never see a torn file
        let temp_path = self.path.with_extension("tmp");

        {
            let file = File::create(&temp_path).map_err(|e| {
                VigilError::StateSaveError(format!("Failed to create temp state file: {}", e))
            })?;

            let mut writer = BufWriter::new(file);

            serde_json::to_writer_pretty(&mut writer, states).map_err(|e| {
                VigilError::StateSaveError(format!("Failed to serialize state: {}", e))
            })?;

            writer.flush().map_err(|e| {
                VigilError::StateSaveError(format!("Failed to flush state file: {}", e))
            })?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            VigilError::StateSaveError(format!("Failed to rename temp state file: {}", e))
        })?;

        Ok(())
    }
}

/// Held for the duration of a read-modify-write; released on drop
#[cfg(unix)]
struct StateLock {
    _flock: nix::fcntl::Flock<File>,
}

#[cfg(unix)]
impl StateLock {
    fn acquire(file: File) -> Result<Self> {
        use nix::fcntl::{Flock, FlockArg};

        let flock = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| {
            VigilError::StateLockError(format!("flock failed: {}", errno))
        })?;
        Ok(Self { _flock: flock })
    }
}

#[cfg(not(unix))]
struct StateLock {
    _file: File,
}

#[cfg(not(unix))]
impl StateLock {
    fn acquire(file: File) -> Result<Self> {
        Ok(Self { _file: file })
    }
}
