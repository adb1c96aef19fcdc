use crate::config::WatchConfig;
use crate::context::Context;
use crate::error::{Result, VigilError};
use crate::process::managed::ManagedProcess;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Operation applied uniformly to every watched unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Watch,
    Start,
    Stop,
    Restart,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::Watch => "watch",
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Restart => "restart",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Action {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "watch" => Ok(Action::Watch),
            "start" => Ok(Action::Start),
            "stop" => Ok(Action::Stop),
            "restart" => Ok(Action::Restart),
            other => Err(VigilError::InvalidConfig(format!("Unknown action: {}", other))),
        }
    }
}

/// Anything the supervisor can drive through the four actions
#[async_trait]
pub trait Watchable: Send + Sync {
    fn name(&self) -> &str;

    async fn watch(&self, ctx: &Context) -> Result<()>;

    async fn start(&self, ctx: &Context) -> Result<()>;

    async fn stop(&self, ctx: &Context) -> Result<()>;

    async fn restart(&self, ctx: &Context) -> Result<()>;

    async fn perform(&self, ctx: &Context, action: Action) -> Result<()> {
        match action {
            Action::Watch => self.watch(ctx).await,
            Action::Start => self.start(ctx).await,
            Action::Stop => self.stop(ctx).await,
            Action::Restart => self.restart(ctx).await,
        }
    }
}

#[async_trait]
impl Watchable for ManagedProcess {
    fn name(&self) -> &str {
        ManagedProcess::name(self)
    }

    async fn watch(&self, ctx: &Context) -> Result<()> {
        ManagedProcess::watch(self, ctx).await
    }

    async fn start(&self, ctx: &Context) -> Result<()> {
        ManagedProcess::start(self, ctx).await
    }

    async fn stop(&self, ctx: &Context) -> Result<()> {
        ManagedProcess::stop(self, ctx).await
    }

    async fn restart(&self, ctx: &Context) -> Result<()> {
        ManagedProcess::restart(self, ctx).await
    }
}

/// Outcome of one pass over the watch list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Holds the watch list and applies one action to all of it per invocation
pub struct Supervisor {
    ctx: Context,
    units: BTreeMap<String, Box<dyn Watchable>>,
}

impl Supervisor {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            units: BTreeMap::new(),
        }
    }

    /// Build the context and watch list described by a configuration file
    pub fn from_config(config: &WatchConfig) -> Self {
        let mut supervisor = Self::new(config.context());
        for process in &config.processes {
            supervisor.add(ManagedProcess::from_config(process));
        }
        supervisor
    }

    /// Register a unit. A later unit with the same name replaces the earlier one.
    pub fn add<W: Watchable + 'static>(&mut self, unit: W) {
        let name = unit.name().to_string();
        if self.units.insert(name.clone(), Box::new(unit)).is_some() {
            warn!("Process {} registered twice, keeping the last one", name);
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Apply `action` to every unit in name order. A failing unit is
    /// reported and the pass carries on with the next one.
    pub async fn run(&self, action: Action) -> RunReport {
        self.ctx
            .events
            .info(&format!(
                "Vigil on duty: {} on {} process(es)",
                action,
                self.units.len()
            ))
            .await;

        let mut report = RunReport::default();
        for (name, unit) in &self.units {
            debug!("Running {} on {}", action, name);
            match unit.perform(&self.ctx, action).await {
                Ok(()) => report.succeeded.push(name.clone()),
                Err(e) => {
                    self.ctx
                        .events
                        .error(&format!("Failed to {} process {}: {}", action, name, e))
                        .await;
                    report.failed.push(name.clone());
                }
            }
        }

        info!(
            "{} finished: {} ok, {} failed",
            action,
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("ctx", &self.ctx)
            .field("units", &self.units.keys().collect::<Vec<_>>())
            .finish()
    }
}
