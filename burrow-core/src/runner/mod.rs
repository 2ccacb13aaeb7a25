//! Command runner
//!
//! Synchronous shell commands, Python scripts (blocking or detached), and
//! the npm/changelog project helpers. Shell commands and Python scripts run
//! with the workspace root as their working directory no matter where the
//! current logical directory points; the project helpers use the current
//! logical directory.

mod project;
mod python;

pub use project::LaunchReport;
pub use python::{ExecMode, PythonRun};

use crate::config::RunnerConfig;
use crate::error::{BurrowError, Result};
use crate::process::ProcessRegistry;
use crate::workspace::Workspace;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs commands and scripts inside a workspace
#[derive(Debug, Clone)]
pub struct CommandRunner {
    workspace: Arc<Workspace>,
    registry: ProcessRegistry,
    config: RunnerConfig,
}

impl CommandRunner {
    /// Create a runner for a workspace, registering detached processes in `registry`
    pub fn new(workspace: Arc<Workspace>, registry: ProcessRegistry, config: RunnerConfig) -> Self {
        Self {
            workspace,
            registry,
            config,
        }
    }

    /// Workspace the runner is confined to
    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    /// Registry holding detached processes
    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Runner configuration
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run a shell command in the workspace root and return its output.
    ///
    /// Stdout is returned when non-empty, stderr otherwise. A non-zero exit
    /// status is not an error.
    pub async fn run_command(&self, command_line: &str) -> Result<String> {
        let mut command = self.shell_command(command_line);
        command
            .current_dir(self.workspace.root())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!("Running command: {}", command_line);

        let deadline = self.config.command_timeout;
        let output = match tokio::time::timeout(deadline, command.output()).await {
            Ok(output) => output.map_err(|e| {
                BurrowError::Execution(format!("Failed to run `{}`: {}", command_line, e))
            })?,
            Err(_) => {
                warn!("Command timed out after {:?}: {}", deadline, command_line);
                return Err(BurrowError::Timeout(deadline));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.is_empty() {
            return Ok(stdout.into_owned());
        }
        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    }

    fn shell_command(&self, command_line: &str) -> Command {
        let shell = self.config.shell.as_str();
        let flag = if shell.eq_ignore_ascii_case("cmd") || shell.eq_ignore_ascii_case("cmd.exe") {
            "/C"
        } else {
            "-c"
        };

        let mut command = Command::new(shell);
        command.arg(flag).arg(command_line);
        command
    }
}

/// Host operating system name and family, e.g. `linux (unix)`
pub fn os_name() -> String {
    format!("{} ({})", std::env::consts::OS, std::env::consts::FAMILY)
}

#[cfg(test)]
pub(crate) mod runner_tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Runner over a fresh temp workspace, with `sh` standing in for python
    pub(crate) fn test_runner() -> (TempDir, CommandRunner) {
        let dir = TempDir::new().unwrap();
        let workspace = Arc::new(Workspace::open(dir.path()).unwrap());
        let config = RunnerConfig {
            shell: "sh".to_string(),
            python: "sh".to_string(),
            npm: "echo".to_string(),
            command_timeout: Duration::from_secs(5),
            python_timeout: Duration::from_secs(5),
        };
        let runner = CommandRunner::new(workspace, ProcessRegistry::new(50), config);
        (dir, runner)
    }

    #[test]
    fn test_os_name() {
        let name = os_name();
        assert!(name.starts_with(std::env::consts::OS));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_prefers_stdout() {
        let (_dir, runner) = test_runner();
        let output = runner.run_command("echo hello; echo oops >&2").await.unwrap();
        assert_eq!(output, "hello\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_falls_back_to_stderr() {
        let (_dir, runner) = test_runner();
        let output = runner.run_command("echo oops >&2; exit 1").await.unwrap();
        assert_eq!(output, "oops\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_uses_root_not_current_dir() {
        let (dir, runner) = test_runner();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        runner.workspace().change_dir("sub").await.unwrap();

        let output = runner.run_command("pwd").await.unwrap();
        let reported = std::path::PathBuf::from(output.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            runner.workspace().root().canonicalize().unwrap()
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_timeout() {
        let (dir, _) = test_runner();
        let workspace = Arc::new(Workspace::open(dir.path()).unwrap());
        let config = RunnerConfig {
            shell: "sh".to_string(),
            command_timeout: Duration::from_millis(100),
            ..RunnerConfig::default()
        };
        let runner = CommandRunner::new(workspace, ProcessRegistry::default(), config);

        let err = runner.run_command("sleep 5").await.unwrap_err();
        assert!(matches!(err, BurrowError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_run_command_missing_shell() {
        let (dir, _) = test_runner();
        let workspace = Arc::new(Workspace::open(dir.path()).unwrap());
        let config = RunnerConfig {
            shell: "definitely-not-a-shell-binary".to_string(),
            ..RunnerConfig::default()
        };
        let runner = CommandRunner::new(workspace, ProcessRegistry::default(), config);

        let err = runner.run_command("echo hi").await.unwrap_err();
        assert!(matches!(err, BurrowError::Execution(_)));
    }
}
