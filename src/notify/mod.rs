// Notify module - Routing of log events to notification sinks

use crate::error::{Result, VigilError};
use crate::process::runner::ShellRunner;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn, Level};

/// Somewhere to deliver important messages (mail, chat, pager...)
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Pipes every message into a shell command's stdin,
/// e.g. `mail -s "[vigil] alert" ops@example.com`
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    command: String,
    runner: ShellRunner,
}

impl CommandNotifier {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            runner: ShellRunner::new(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let status = self.runner.run_with_input(&self.command, message).await?;
        if status.success() {
            Ok(())
        } else {
            Err(VigilError::NotifyError(format!(
                "`{}` exited with {}",
                self.command, status
            )))
        }
    }
}

/// Notification sink as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NotifierConfig {
    Command { command: String },
}

impl NotifierConfig {
    pub fn build(&self) -> Arc<dyn Notifier> {
        match self {
            NotifierConfig::Command { command } => Arc::new(CommandNotifier::new(command.clone())),
        }
    }
}

/// Sends every event to `tracing` and every warning or error to all
/// notifiers.
///
/// There is no deduplication: a process that stays down is reported on
/// every run.
#[derive(Clone, Default)]
pub struct EventLog {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notifiers(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn add_notifier(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn notifier_count(&self) -> usize {
        self.notifiers.len()
    }

    pub async fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => error!("{}", message),
            Level::WARN => warn!("{}", message),
            Level::INFO => info!("{}", message),
            Level::DEBUG => debug!("{}", message),
            _ => trace!("{}", message),
        }

        if level <= Level::WARN {
            for notifier in &self.notifiers {
                if let Err(e) = notifier.send(message).await {
                    error!("Failed to deliver notification: {}", e);
                }
            }
        }
    }

    pub async fn info(&self, message: &str) {
        self.log(Level::INFO, message).await
    }

    pub async fn warn(&self, message: &str) {
        self.log(Level::WARN, message).await
    }

    pub async fn error(&self, message: &str) {
        self.log(Level::ERROR, message).await
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("notifiers", &self.notifiers.len())
            .finish()
    }
}
