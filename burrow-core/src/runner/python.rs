use super::CommandRunner;
use crate::error::{BurrowError, Result};
use crate::process::OutputMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Bytes of a script inspected by [`ExecMode::Auto`]
const PREVIEW_BYTES: u64 = 300;

/// Lowercase markers of a long-running web server entry point
const SERVER_MARKERS: &[&str] = &["uvicorn.run", "fastapi"];

/// How `run_python` executes a script
///
/// Deserializes through [`FromStr`], so any letter case is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
    /// Pick `Subprocess` for web servers, `Exec` otherwise
    #[default]
    Auto,
    /// Run to completion and capture output
    Exec,
    /// Launch detached and register in the process registry
    Subprocess,
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecMode::Auto => write!(f, "auto"),
            ExecMode::Exec => write!(f, "exec"),
            ExecMode::Subprocess => write!(f, "subprocess"),
        }
    }
}

impl FromStr for ExecMode {
    type Err = BurrowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ExecMode::Auto),
            "exec" => Ok(ExecMode::Exec),
            "subprocess" => Ok(ExecMode::Subprocess),
            other => Err(BurrowError::InvalidArgument(format!(
                "Unknown mode '{}', expected auto, exec or subprocess",
                other
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for ExecMode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let mode = String::deserialize(deserializer)?;
        mode.parse().map_err(serde::de::Error::custom)
    }
}

/// Outcome of `run_python`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PythonRun {
    /// Whether the script ran (exec) or started (subprocess) successfully
    pub success: bool,
    /// Mode actually used, after auto detection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ExecMode>,
    /// Captured stdout (exec) or a start notice (subprocess)
    pub output: String,
    /// `Type: message` of the failure, empty on success
    pub error: String,
    /// Pid of the detached process
    pub pid: Option<u32>,
}

impl PythonRun {
    /// A run that failed before producing output
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }
}

impl CommandRunner {
    /// Run a Python file relative to the workspace root.
    ///
    /// `timeout` bounds exec mode only and defaults to the configured
    /// python timeout. Detached runs are never bounded.
    pub async fn run_python(
        &self,
        filename: &str,
        mode: ExecMode,
        timeout: Option<Duration>,
    ) -> Result<PythonRun> {
        let path = self.workspace().resolve_from_root(filename)?;
        if !tokio::fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
            return Err(BurrowError::FileNotFound(path));
        }

        let mode = match mode {
            ExecMode::Auto => detect_mode(&path).await?,
            explicit => explicit,
        };
        debug!("Running {} in {} mode", path.display(), mode);

        match mode {
            ExecMode::Subprocess => self.launch_python(&path).await,
            _ => {
                let deadline = timeout.unwrap_or(self.config().python_timeout);
                self.exec_python(&path, deadline).await
            }
        }
    }

    async fn exec_python(&self, path: &Path, deadline: Duration) -> Result<PythonRun> {
        let mut command = Command::new(&self.config().python);
        command
            .arg(path)
            .current_dir(self.workspace().root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            BurrowError::Execution(format!("Failed to start {}: {}", self.config().python, e))
        })?;

        // Dropping the child on timeout kills it
        let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!("{} exceeded {:?}, killed", path.display(), deadline);
                return Ok(PythonRun {
                    mode: Some(ExecMode::Exec),
                    error: format!("TimeoutError: execution exceeded {}s", deadline.as_secs_f64()),
                    ..PythonRun::default()
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let success = output.status.success();
        let error = if success {
            String::new()
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .map(|line| line.trim().to_string())
                .unwrap_or_else(|| format!("ExitError: exit status {}", output.status))
        };

        Ok(PythonRun {
            success,
            mode: Some(ExecMode::Exec),
            output: stdout,
            error,
            pid: None,
        })
    }

    async fn launch_python(&self, path: &Path) -> Result<PythonRun> {
        let mut command = Command::new(&self.config().python);
        command
            .arg(path)
            .current_dir(self.workspace().root())
            .env("PYTHONUNBUFFERED", "1");

        let label = format!("{} {}", self.config().python, path.display());
        let info = self.registry().spawn(command, label, OutputMode::Capture).await?;
        info!("Detached {} as PID {}", path.display(), info.pid);

        Ok(PythonRun {
            success: true,
            mode: Some(ExecMode::Subprocess),
            output: format!("Started process PID={}", info.pid),
            error: String::new(),
            pid: Some(info.pid),
        })
    }
}

async fn detect_mode(path: &Path) -> Result<ExecMode> {
    let file = tokio::fs::File::open(path).await?;
    let mut preview = Vec::with_capacity(PREVIEW_BYTES as usize);
    file.take(PREVIEW_BYTES).read_to_end(&mut preview).await?;

    let preview = String::from_utf8_lossy(&preview).to_lowercase();
    if SERVER_MARKERS.iter().any(|marker| preview.contains(marker)) {
        Ok(ExecMode::Subprocess)
    } else {
        Ok(ExecMode::Exec)
    }
}
