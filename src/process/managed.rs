use crate::config::ProcessConfig;
use crate::context::Context;
use crate::error::Result;
use crate::process::limits::ResourceLimits;
use crate::process::monitor::StopSignal;
use crate::process::pid::PidFile;
use crate::process::types::{GracePeriods, ProcessCommands, ProcessState};
use crate::state::{now_epoch, PersistedState};
use std::path::Path;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// One externally launched process, supervised by name.
///
/// Holds no state of its own between calls: every decision re-reads the
/// last recorded transition from the state store.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedProcess {
    name: String,
    pid_file: Option<PidFile>,
    limits: ResourceLimits,
    commands: ProcessCommands,
    grace: GracePeriods,
}

impl ManagedProcess {
    pub fn new(name: impl Into<String>, commands: ProcessCommands) -> Self {
        Self {
            name: name.into(),
            pid_file: None,
            limits: ResourceLimits::default(),
            commands,
            grace: GracePeriods::default(),
        }
    }

    pub fn from_config(config: &ProcessConfig) -> Self {
        let mut process = Self::new(config.name.clone(), config.commands.clone())
            .with_limits(config.limits)
            .with_grace(config.grace);
        if let Some(ref pid_file) = config.pid_file {
            process = process.with_pid_file(pid_file);
        }
        process
    }

    pub fn with_pid_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.pid_file = Some(PidFile::new(path));
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_grace(mut self, grace: GracePeriods) -> Self {
        self.grace = grace;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    pub fn commands(&self) -> &ProcessCommands {
        &self.commands
    }

    pub fn grace(&self) -> &GracePeriods {
        &self.grace
    }

    /// Pid from the pid file, if there is a usable one
    pub fn pid(&self) -> Option<u32> {
        self.pid_file.as_ref().and_then(PidFile::read)
    }

    pub fn is_alive(&self, ctx: &Context) -> bool {
        self.live_pid(ctx).is_some()
    }

    fn live_pid(&self, ctx: &Context) -> Option<u32> {
        self.pid().filter(|&pid| ctx.probe.is_alive(pid))
    }

    fn remove_pid_file(&self) -> Result<()> {
        match self.pid_file {
            Some(ref pid_file) => pid_file.remove(),
            None => Ok(()),
        }
    }

    /// Last recorded transition for this process
    pub fn recorded(&self, ctx: &Context) -> Result<Option<PersistedState>> {
        ctx.state.get(&self.name)
    }

    /// Whether a predominant state was recorded less than its own grace
    /// period ago. While this holds, no transition is permitted.
    pub fn pending_grace_time(&self, ctx: &Context) -> Result<bool> {
        let recorded = self.recorded(ctx)?;
        Ok(self.pending_grace_time_at(recorded.as_ref(), now_epoch()))
    }

    /// Whether moving to `target` is permitted right now
    pub fn processable(&self, ctx: &Context, target: ProcessState) -> Result<bool> {
        let recorded = self.recorded(ctx)?;
        Ok(self.processable_at(recorded.as_ref(), target, now_epoch()))
    }

    pub(crate) fn pending_grace_time_at(
        &self,
        recorded: Option<&PersistedState>,
        now: i64,
    ) -> bool {
        match recorded {
            Some(record) if record.state.is_predominant() => {
                !self.grace_elapsed(record, record.state, now)
            }
            _ => false,
        }
    }

    pub(crate) fn processable_at(
        &self,
        recorded: Option<&PersistedState>,
        target: ProcessState,
        now: i64,
    ) -> bool {
        if self.pending_grace_time_at(recorded, now) {
            return false;
        }
        if target.is_predominant() {
            return true;
        }
        // a threshold must have been observed continuously for its own window
        match recorded {
            Some(record) if record.state == target => self.grace_elapsed(record, target, now),
            _ => false,
        }
    }

    fn grace_elapsed(&self, record: &PersistedState, state: ProcessState, now: i64) -> bool {
        let elapsed = now.saturating_sub(record.updated_at).max(0) as u64;
        elapsed >= self.grace.for_state(state).as_secs()
    }

    /// One reactive cycle: start the process if it is dead, otherwise
    /// restart it once it has been over a limit for a full grace window.
    pub async fn watch(&self, ctx: &Context) -> Result<()> {
        info!("Watching process {}", self.name);

        let Some(pid) = self.live_pid(ctx) else {
            ctx.events
                .warn(&format!("Process {} is dead", self.name))
                .await;
            return self.start(ctx).await;
        };

        if self.limits.is_empty() {
            return Ok(());
        }

        let snapshot = ctx.probe.snapshot().await?;
        let cpu = snapshot.cpu_usage(pid, ctx.include_children);
        let ram = snapshot.ram_usage(pid, ctx.include_children);
        debug!(
            "Process {} (PID: {}) uses cpu {:?}% ram {:?} KiB",
            self.name, pid, cpu, ram
        );

        if self.limits.cpu_exceeded(cpu) {
            let message = format!(
                "Process {} is above CPU limit ({:.1}% > {:.1}%)",
                self.name,
                cpu.unwrap_or_default(),
                self.limits.cpu_percent.unwrap_or_default()
            );
            if self
                .handle_excursion(ctx, ProcessState::AboveCpuLimit, &message)
                .await?
            {
                // one restart per cycle; RAM is looked at again next run
                return Ok(());
            }
        }

        if self.limits.ram_exceeded(ram) {
            let message = format!(
                "Process {} is above RAM limit ({} KiB > {} KiB)",
                self.name,
                ram.unwrap_or_default(),
                self.limits.ram_kb.unwrap_or_default()
            );
            self.handle_excursion(ctx, ProcessState::AboveRamLimit, &message)
                .await?;
        }

        Ok(())
    }

    /// Record a limit excursion and restart once it is actionable.
    /// Returns whether a restart was issued.
    async fn handle_excursion(
        &self,
        ctx: &Context,
        state: ProcessState,
        message: &str,
    ) -> Result<bool> {
        if self.pending_grace_time(ctx)? {
            debug!("{}, but a grace period is pending", message);
            return Ok(false);
        }

        ctx.state.update_state(&self.name, state)?;

        if !self.processable(ctx, state)? {
            info!("{}, waiting out the {} grace period", message, state);
            return Ok(false);
        }

        ctx.events.warn(message).await;
        self.restart(ctx).await?;
        Ok(true)
    }

    pub async fn start(&self, ctx: &Context) -> Result<()> {
        if self.is_alive(ctx) {
            debug!("Process {} is already running", self.name);
            return Ok(());
        }

        if !self.processable(ctx, ProcessState::Started)? {
            info!("Not starting process {}: grace period pending", self.name);
            return Ok(());
        }

        ctx.events
            .warn(&format!("Starting process {}", self.name))
            .await;
        self.remove_pid_file()?;
        self.run_command(ctx, "start", &self.commands.start).await;
        ctx.state.update_state(&self.name, ProcessState::Started)?;
        Ok(())
    }

    /// Stop the process, escalating from the stop command to SIGTERM and
    /// then SIGKILL. Blocks for up to three `stop_wait` intervals.
    pub async fn stop(&self, ctx: &Context) -> Result<()> {
        if !self.processable(ctx, ProcessState::Stopped)? {
            info!("Not stopping process {}: grace period pending", self.name);
            return Ok(());
        }

        ctx.events
            .warn(&format!("Stopping process {}", self.name))
            .await;

        // the pid file may vanish mid-sequence, so hold on to the pid
        let Some(pid) = self.live_pid(ctx) else {
            self.remove_pid_file()?;
            ctx.state.update_state(&self.name, ProcessState::Stopped)?;
            return Ok(());
        };

        self.run_command(ctx, "stop", &self.commands.stop).await;
        sleep(ctx.stop_wait).await;

        for signal in [StopSignal::Terminate, StopSignal::Kill] {
            if !ctx.probe.is_alive(pid) {
                break;
            }
            warn!(
                "Process {} (PID: {}) still alive, sending {}",
                self.name, pid, signal
            );
            if let Err(e) = ctx.probe.signal(pid, signal) {
                debug!("{}", e);
            }
            sleep(ctx.stop_wait).await;
        }

        if ctx.probe.is_alive(pid) {
            ctx.events
                .error(&format!(
                    "Process {} (PID: {}) survived SIGKILL, will retry next run",
                    self.name, pid
                ))
                .await;
            return Ok(());
        }

        info!("Process {} stopped", self.name);
        self.remove_pid_file()?;
        ctx.state.update_state(&self.name, ProcessState::Stopped)?;
        Ok(())
    }

    /// Restart through the restart command when there is one and the
    /// process is up (recorded as `Restarted`), otherwise stop then start
    /// (recorded as `Started`).
    pub async fn restart(&self, ctx: &Context) -> Result<()> {
        if !self.processable(ctx, ProcessState::Restarted)? {
            info!("Not restarting process {}: grace period pending", self.name);
            return Ok(());
        }

        ctx.events
            .warn(&format!("Restarting process {}", self.name))
            .await;

        let alive = self.is_alive(ctx);
        if alive {
            if let Some(ref command) = self.commands.restart {
                ctx.state.update_state(&self.name, ProcessState::Restarted)?;
                self.run_command(ctx, "restart", command).await;
                return Ok(());
            }
            self.stop(ctx).await?;
        }
        self.start(ctx).await
    }

    /// Fire a configured command. Its outcome is only logged: whether it
    /// worked is decided by the next liveness check.
    async fn run_command(&self, ctx: &Context, what: &str, command: &str) {
        debug!("Running {} command for {}: {}", what, self.name, command);
        match ctx.runner.run(command).await {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(
                "{} command for {} exited with {}",
                what, self.name, status
            ),
            Err(e) => error!("{} command for {} failed: {}", what, self.name, e),
        }
    }
}
