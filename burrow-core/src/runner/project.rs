//! npm and changelog helpers, run in the current logical directory

use super::CommandRunner;
use crate::error::{BurrowError, Result};
use crate::process::OutputMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::info;

/// Outcome of launching a detached project command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchReport {
    /// Whether the command was started
    pub success: bool,
    /// Pid of the detached process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Human-readable status
    pub message: String,
}

impl LaunchReport {
    /// A launch that did not happen
    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            success: false,
            pid: None,
            message: message.into(),
        }
    }
}

impl CommandRunner {
    /// Start `npm install [packages...]` in the background.
    ///
    /// An empty `packages` installs from `package.json`.
    pub async fn install_npm_packages(&self, packages: &str) -> Result<LaunchReport> {
        let cwd = self.workspace().current_dir().await;
        let npm = self.config().npm.clone();

        let mut argv = vec!["install".to_string()];
        argv.extend(packages.split_whitespace().map(str::to_string));

        let mut command = Command::new(&npm);
        command.args(&argv).current_dir(&cwd);

        let label = format!("{} {}", npm, argv.join(" "));
        let process = self.registry().spawn(command, label.clone(), OutputMode::Capture).await?;

        Ok(LaunchReport {
            success: true,
            pid: Some(process.pid),
            message: format!(
                "Started: {} in background. Use PID with check_process_logs to see logs.",
                label
            ),
        })
    }

    /// Scaffold a Vite app named `app_name` in the background.
    ///
    /// Output goes to `<root>/<app_name>_vite_logs.txt`.
    pub async fn create_vite_app(&self, app_name: &str, template: &str) -> Result<LaunchReport> {
        validate_app_name(app_name)?;

        let (app_path, cwd) = {
            let view = self.workspace().view().await;
            (view.resolve(app_name)?, view.current_dir().to_path_buf())
        };

        if tokio::fs::try_exists(&app_path).await? {
            return Ok(LaunchReport::refused(format!("Folder {} already exists.", app_name)));
        }

        let log_file = self.workspace().root().join(format!("{}_vite_logs.txt", app_name));
        let npm = self.config().npm.clone();

        let mut command = Command::new(&npm);
        command
            .args(["create", "vite@latest", app_name, "--", "--template", template])
            .current_dir(&cwd);

        let label = format!("{} create vite@latest {} -- --template {}", npm, app_name, template);
        let process = self
            .registry()
            .spawn(command, label, OutputMode::LogFile(log_file.clone()))
            .await?;

        info!("Creating Vite app {} (PID: {})", app_name, process.pid);

        Ok(LaunchReport {
            success: true,
            pid: Some(process.pid),
            message: format!(
                "Started Vite app creation for {}. Logs at {}",
                app_name,
                log_file.display()
            ),
        })
    }

    /// Append a version section to `CHANGELOG.md` and return its path
    pub async fn create_changelog(&self, version: &str, changes: &str) -> Result<PathBuf> {
        let path = self.workspace().current_dir().await.join("CHANGELOG.md");

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(format!("## Version {}\n{}\n\n", version, changes).as_bytes())
            .await?;
        file.flush().await?;

        Ok(path)
    }
}

fn validate_app_name(app_name: &str) -> Result<()> {
    let bad = app_name.trim().is_empty()
        || app_name == "."
        || app_name == ".."
        || app_name.contains(['/', '\\']);

    if bad {
        return Err(BurrowError::InvalidArgument(format!(
            "'{}' is not a valid app name",
            app_name
        )));
    }
    Ok(())
}
