use crate::error::{Result, VigilError};
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Executes the opaque shell commands configured for a process.
///
/// The exit status is returned for logging only; callers never treat it as
/// proof that the command did what it was meant to. The next liveness check
/// is the only judge of that.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> Result<ExitStatus>;
}

/// Runs commands through `sh -c`, waiting for them to finish
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
        }
    }

    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Run `command` with `input` written to its stdin
    pub async fn run_with_input(&self, command: &str, input: &str) -> Result<ExitStatus> {
        let mut child = self
            .command(command)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| VigilError::CommandError(command.to_string(), e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            // a command that exits without reading its input is not a failure here
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(VigilError::CommandError(command.to_string(), e.to_string()));
                }
            }
        }

        child
            .wait()
            .await
            .map_err(|e| VigilError::CommandError(command.to_string(), e.to_string()))
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(command);
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        cmd
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str) -> Result<ExitStatus> {
        self.command(command)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| VigilError::CommandError(command.to_string(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_reports_exit_status() {
        let runner = ShellRunner::new();

        assert!(runner.run("true").await.unwrap().success());
        assert_eq!(runner.run("exit 3").await.unwrap().code(), Some(3));
    }

    #[tokio::test]
    async fn test_run_executes_through_shell() {
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join("marker");

        let runner = ShellRunner::new();
        runner
            .run(&format!("echo started > {}", marker.display()))
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&marker).unwrap(), "started\n");
    }

    #[tokio::test]
    async fn test_run_with_input() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("out");

        let runner = ShellRunner::new();
        runner
            .run_with_input(&format!("cat > {}", out.display()), "process down")
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "process down");
    }

    #[tokio::test]
    async fn test_missing_shell_is_an_error() {
        let runner = ShellRunner::with_shell("/nonexistent/sh");
        let result = runner.run("true").await;
        assert!(matches!(result, Err(VigilError::CommandError(_, _))));
    }
}
