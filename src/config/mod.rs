use crate::context::Context;
use crate::error::{Result, VigilError};
use crate::notify::{EventLog, NotifierConfig};
use crate::process::{GracePeriods, ProcessCommands, ResourceLimits, SamplerKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Everything one vigil invocation needs: where state lives, how to log and
/// notify, and the processes to watch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// JSON file holding the last recorded state of every process
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Tag carried by every log line
    #[serde(default = "default_program")]
    pub program: String,

    /// Minimum level: trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Append logs here instead of writing them to stdout
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    #[serde(default)]
    pub sampler: SamplerKind,

    /// Count descendants towards a process's CPU and RAM usage
    #[serde(default = "default_include_children")]
    pub include_children: bool,

    #[serde(default)]
    pub notifiers: Vec<NotifierConfig>,

    #[serde(default)]
    pub processes: Vec<ProcessConfig>,
}

/// One watched process as written in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Unique key in the watch list and the state file
    pub name: String,

    #[serde(default)]
    pub pid_file: Option<PathBuf>,

    pub commands: ProcessCommands,

    #[serde(default)]
    pub limits: ResourceLimits,

    /// Grace periods in seconds
    #[serde(default)]
    pub grace: GracePeriods,
}

fn default_state_file() -> PathBuf {
    PathBuf::from("~/.vigil/state.json")
}

fn default_program() -> String {
    "vigil".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_include_children() -> bool {
    true
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            program: default_program(),
            log_level: default_log_level(),
            log_file: None,
            sampler: SamplerKind::default(),
            include_children: default_include_children(),
            notifiers: Vec::new(),
            processes: Vec::new(),
        }
    }
}

impl WatchConfig {
    /// Load a configuration file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<WatchConfig> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            VigilError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let mut config = match extension {
            "toml" => Self::parse_toml(&contents)?,
            "json" => Self::parse_json(&contents)?,
            _ => {
                return Err(VigilError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        config.expand_env_vars();
        config.validate()?;

        Ok(config)
    }

    pub fn parse_toml(contents: &str) -> Result<WatchConfig> {
        toml::from_str(contents)
            .map_err(|e| VigilError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    pub fn parse_json(contents: &str) -> Result<WatchConfig> {
        serde_json::from_str(contents)
            .map_err(|e| VigilError::InvalidConfig(format!("Failed to parse JSON: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        self.level()?;

        if self.program.trim().is_empty() {
            return Err(VigilError::MissingConfigField("program".to_string()));
        }

        if self.state_file.as_os_str().is_empty() {
            return Err(VigilError::MissingConfigField("state_file".to_string()));
        }

        for notifier in &self.notifiers {
            match notifier {
                NotifierConfig::Command { command } if command.trim().is_empty() => {
                    return Err(VigilError::MissingConfigField(
                        "notifiers.command".to_string(),
                    ))
                }
                NotifierConfig::Command { .. } => {}
            }
        }

        for process in &self.processes {
            process.validate()?;
        }

        Ok(())
    }

    /// Configured minimum log level
    pub fn level(&self) -> Result<Level> {
        self.log_level.parse::<Level>().map_err(|_| {
            VigilError::ConfigValidationError(format!(
                "Invalid log_level: {}. Must be one of: trace, debug, info, warn, error",
                self.log_level
            ))
        })
    }

    /// Processes keyed by name, a later entry replacing an earlier one
    pub fn process_map(&self) -> BTreeMap<&str, &ProcessConfig> {
        self.processes
            .iter()
            .map(|process| (process.name.as_str(), process))
            .collect()
    }

    /// Collaborators described by this configuration, backed by the real OS
    pub fn context(&self) -> Context {
        let notifiers = self.notifiers.iter().map(NotifierConfig::build).collect();
        Context::new(&self.state_file)
            .with_probe(self.sampler.build())
            .with_events(EventLog::with_notifiers(notifiers))
            .include_children(self.include_children)
    }

    /// Expand environment variables and a leading `~` in paths and commands
    fn expand_env_vars(&mut self) {
        self.state_file = expand_env_in_path(&self.state_file);

        if let Some(ref log_file) = self.log_file {
            self.log_file = Some(expand_env_in_path(log_file));
        }

        for notifier in &mut self.notifiers {
            match notifier {
                NotifierConfig::Command { command } => *command = expand_env_in_string(command),
            }
        }

        for process in &mut self.processes {
            process.expand_env_vars();
        }
    }
}

impl ProcessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(VigilError::MissingConfigField("name".to_string()));
        }

        if self.commands.start.trim().is_empty() {
            return Err(VigilError::MissingConfigField(format!(
                "{}: commands.start",
                self.name
            )));
        }

        if self.commands.stop.trim().is_empty() {
            return Err(VigilError::MissingConfigField(format!(
                "{}: commands.stop",
                self.name
            )));
        }

        if let Some(cpu) = self.limits.cpu_percent {
            if cpu.is_nan() || cpu <= 0.0 {
                return Err(VigilError::ConfigValidationError(format!(
                    "{}: limits.cpu_percent must be greater than 0",
                    self.name
                )));
            }
        }

        if self.limits.ram_kb == Some(0) {
            return Err(VigilError::ConfigValidationError(format!(
                "{}: limits.ram_kb must be greater than 0",
                self.name
            )));
        }

        Ok(())
    }

    fn expand_env_vars(&mut self) {
        if let Some(ref pid_file) = self.pid_file {
            self.pid_file = Some(expand_env_in_path(pid_file));
        }

        self.commands.start = expand_env_in_string(&self.commands.start);
        self.commands.stop = expand_env_in_string(&self.commands.stop);
        if let Some(ref restart) = self.commands.restart {
            self.commands.restart = Some(expand_env_in_string(restart));
        }
    }
}

/// Expand `$VAR`, `${VAR}` and a leading `~` in a string
pub fn expand_env_in_string(s: &str) -> String {
    let mut result = match s.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => match std::env::var("HOME") {
            Ok(home) => format!("{}{}", home, rest),
            Err(_) => s.to_string(),
        },
        _ => s.to_string(),
    };

    substitute_env_vars(&result)
}

/// Replace `${NAME}` and `$NAME` with the value of `NAME`. A bare `$NAME`
/// takes the longest run of `[A-Za-z0-9_]`. Unset variables stay as written.
fn substitute_env_vars(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(at) = rest.find('$') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];

        let (name, consumed) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            },
            None => {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], end)
            }
        };

        let value = if name.is_empty() || name.contains(['=', '\0']) {
            None
        } else {
            std::env::var(name).ok()
        };
        match value {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[at..at + 1 + consumed]),
        }
        rest = &after[consumed..];
    }

    out.push_str(rest);
    out
}

pub fn expand_env_in_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(expand_env_in_string(&path_str))
}
