// CLI module - User-facing command-line interface

mod output;

pub use output::{print_error, StatusRow};

use crate::config::{expand_env_in_path, WatchConfig};
use crate::context::Context;
use crate::error::{Result, VigilError};
use crate::logging;
use crate::process::{Action, ManagedProcess, Supervisor};
use crate::state::now_epoch;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, Instrument, Level};

/// Vigil - keeps an eye on processes started by others
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long, default_value = "~/.vigil/config.toml")]
    config: PathBuf,

    /// Minimum log level, overriding the configuration file
    #[arg(long)]
    log_level: Option<Level>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Start dead processes and restart those over their limits
    Watch,
    /// Start every process that is not running
    Start,
    /// Stop every process
    Stop,
    /// Restart every process
    Restart,
    /// Show the recorded state of every process
    Status,
}

impl Commands {
    fn action(self) -> Option<Action> {
        match self {
            Commands::Watch => Some(Action::Watch),
            Commands::Start => Some(Action::Start),
            Commands::Stop => Some(Action::Stop),
            Commands::Restart => Some(Action::Restart),
            Commands::Status => None,
        }
    }
}

impl Cli {
    /// Run the CLI application
    pub async fn run() -> Result<()> {
        let cli = Cli::parse();
        cli.execute().await
    }

    /// Execute the parsed command
    pub async fn execute(&self) -> Result<()> {
        let config = self.load_config()?;
        let level = match self.log_level {
            Some(level) => level,
            None => config.level()?,
        };
        logging::init(level, config.log_file.as_deref())?;

        let span = logging::program_span(&config.program);
        async {
            debug!("Loaded {} process(es)", config.processes.len());
            match self.command.action() {
                Some(action) => {
                    let supervisor = Supervisor::from_config(&config);
                    let report = supervisor.run(action).await;
                    output::print_report(action, &report);
                    Ok(())
                }
                None => {
                    let rows = status_rows(&config, &config.context())?;
                    output::print_status(&rows, now_epoch());
                    Ok(())
                }
            }
        }
        .instrument(span)
        .await
    }

    fn load_config(&self) -> Result<WatchConfig> {
        let path = expand_env_in_path(&self.config);
        if !path.exists() {
            return Err(VigilError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        WatchConfig::from_file(&path)
    }
}

/// Recorded state and liveness of every configured process, in name order
pub fn status_rows(config: &WatchConfig, ctx: &Context) -> Result<Vec<StatusRow>> {
    let states = ctx.state.read()?;
    let rows = config
        .process_map()
        .into_values()
        .map(|process_config| {
            let process = ManagedProcess::from_config(process_config);
            let recorded = states.get(process.name());
            let pid = process.pid();
            StatusRow {
                name: process.name().to_string(),
                state: recorded.map(|r| r.state),
                updated_at: recorded.map(|r| r.updated_at),
                pid,
                alive: pid.map(|pid| ctx.probe.is_alive(pid)).unwrap_or(false),
            }
        })
        .collect();
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessConfig;
    use crate::process::{GracePeriods, ProcessCommands, ProcessState, ResourceLimits};
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_arguments() {
        let cli = Cli::parse_from([
            "vigil",
            "-c",
            "/etc/vigil.toml",
            "--log-level",
            "debug",
            "watch",
        ]);
        assert_eq!(cli.config, PathBuf::from("/etc/vigil.toml"));
        assert_eq!(cli.log_level, Some(Level::DEBUG));
        assert_eq!(cli.command.action(), Some(Action::Watch));

        let cli = Cli::parse_from(["vigil", "status"]);
        assert_eq!(cli.config, PathBuf::from("~/.vigil/config.toml"));
        assert_eq!(cli.command.action(), None);
    }

    #[test]
    fn test_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["vigil", "reload"]).is_err());
    }

    #[test]
    fn test_status_rows() {
        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("web.pid");
        std::fs::write(&pid_path, std::process::id().to_string()).unwrap();

        let process = |name: &str, pid_file: Option<PathBuf>| ProcessConfig {
            name: name.to_string(),
            pid_file,
            commands: ProcessCommands {
                start: "true".to_string(),
                stop: "true".to_string(),
                restart: None,
            },
            limits: ResourceLimits::default(),
            grace: GracePeriods::default(),
        };
        let mut config = WatchConfig::default();
        config.state_file = temp_dir.path().join("state.json");
        config.processes = vec![process("web", Some(pid_path)), process("cron", None)];

        let ctx = config.context();
        ctx.state
            .update_state_at("web", ProcessState::Started, 1_700_000_000)
            .unwrap();

        let rows = status_rows(&config, &ctx).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].name, "cron");
        assert_eq!(rows[0].state, None);
        assert!(!rows[0].alive);

        assert_eq!(rows[1].name, "web");
        assert_eq!(rows[1].state, Some(ProcessState::Started));
        assert_eq!(rows[1].updated_at, Some(1_700_000_000));
        assert_eq!(rows[1].pid, Some(std::process::id()));
        assert!(rows[1].alive);
    }

    #[tokio::test]
    async fn test_missing_config_file() {
        let cli = Cli::parse_from(["vigil", "-c", "/nonexistent/vigil.toml", "watch"]);
        let result = cli.execute().await;
        assert!(matches!(result, Err(VigilError::ConfigError(_))));
    }
}
