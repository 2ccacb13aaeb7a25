use super::{build, object_schema};
use crate::runner::{CommandRunner, ExecMode, LaunchReport, PythonRun, os_name as host_os_name};
use crate::tools::{
    BoxedTool, Capability, ToolError, ToolExecutionContext, ToolHandler, ToolMetadata, ToolOutput,
    ValidationError, parse_args,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

#[derive(Deserialize)]
struct RunCommandArgs {
    command: String,
}

struct RunCommand(CommandRunner);

#[async_trait]
impl ToolHandler for RunCommand {
    async fn handle(&self, args: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
        let args: RunCommandArgs = parse_args(args)?;
        let output = self.0.run_command(&args.command).await?;
        Ok(ToolOutput::text(output))
    }
}

pub(super) fn run_command(runner: CommandRunner) -> BoxedTool {
    build(
        ToolMetadata::new(
            "run_command",
            "Run a shell command with the workspace root as working directory \
             (not the current directory).",
        )
        .with_returns("Stdout, or stderr when stdout is empty"),
        object_schema(json!({ "command": { "type": "string" } }), &["command"]),
        &[Capability::Subprocess],
        RunCommand(runner),
    )
}

struct OsName;

#[async_trait]
impl ToolHandler for OsName {
    async fn handle(&self, _: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::text(host_os_name()))
    }
}

pub(super) fn os_name() -> BoxedTool {
    build(
        ToolMetadata::new("os_name", "Get the host operating system name and family."),
        object_schema(json!({}), &[]),
        &[],
        OsName,
    )
}

#[derive(Deserialize)]
struct RunPythonArgs {
    filename: String,
    #[serde(default)]
    mode: ExecMode,
    #[serde(default)]
    timeout: Option<f64>,
}

impl RunPythonArgs {
    fn timeout(&self) -> Result<Option<Duration>, ToolError> {
        self.timeout
            .map(|secs| {
                Duration::try_from_secs_f64(secs).ok().filter(|d| !d.is_zero()).ok_or_else(|| {
                    ToolError::validation(vec![ValidationError::new(
                        "timeout",
                        "must be a positive number of seconds",
                    )])
                })
            })
            .transpose()
    }
}

struct RunPython(CommandRunner);

#[async_trait]
impl ToolHandler for RunPython {
    async fn handle(&self, args: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
        let args: RunPythonArgs = parse_args(args)?;
        let timeout = args.timeout()?;

        let run = match self.0.run_python(&args.filename, args.mode, timeout).await {
            Ok(run) => run,
            Err(e) => PythonRun::failed(e.to_string()),
        };
        ToolOutput::json(&run)
    }
}

pub(super) fn run_python(runner: CommandRunner) -> BoxedTool {
    build(
        ToolMetadata::new(
            "run_python",
            "Run a Python file relative to the workspace root. \
             auto picks subprocess for FastAPI/uvicorn apps and exec otherwise; \
             exec waits up to timeout seconds, subprocess returns a pid immediately.",
        )
        .with_returns("{success, output, error, pid}"),
        object_schema(
            json!({
                "filename": { "type": "string" },
                "mode": { "type": "string", "enum": ["auto", "exec", "subprocess"], "default": "auto" },
                "timeout": { "type": "number", "description": "Seconds, exec mode only" }
            }),
            &["filename"],
        ),
        &[Capability::FilesystemRead, Capability::Subprocess],
        RunPython(runner),
    )
}

#[derive(Deserialize)]
struct ViteArgs {
    app_name: String,
    #[serde(default = "default_template")]
    template: String,
}

fn default_template() -> String {
    "react".to_string()
}

struct CreateViteApp(CommandRunner);

#[async_trait]
impl ToolHandler for CreateViteApp {
    async fn handle(&self, args: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
        let args: ViteArgs = parse_args(args)?;
        let report = match self.0.create_vite_app(&args.app_name, &args.template).await {
            Ok(report) => report,
            Err(e) => LaunchReport::refused(format!("Error starting Vite app: {}", e)),
        };
        ToolOutput::json(&report)
    }
}

pub(super) fn create_vite_app(runner: CommandRunner) -> BoxedTool {
    build(
        ToolMetadata::new(
            "create_vite_app",
            "Create a Vite app in the current directory in the background. \
             Output is logged to <app_name>_vite_logs.txt in the workspace root.",
        )
        .with_returns("{success, pid, message}"),
        object_schema(
            json!({
                "app_name": { "type": "string" },
                "template": { "type": "string", "default": "react" }
            }),
            &["app_name"],
        ),
        &[Capability::Subprocess, Capability::FilesystemWrite],
        CreateViteApp(runner),
    )
}

#[derive(Deserialize)]
struct NpmArgs {
    #[serde(default)]
    packages: String,
}

struct InstallNpmPackages(CommandRunner);

#[async_trait]
impl ToolHandler for InstallNpmPackages {
    async fn handle(&self, args: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
        let args: NpmArgs = parse_args(args)?;
        let report = match self.0.install_npm_packages(&args.packages).await {
            Ok(report) => report,
            Err(e) => LaunchReport::refused(format!("Error running npm install: {}", e)),
        };
        ToolOutput::json(&report)
    }
}

pub(super) fn install_npm_packages(runner: CommandRunner) -> BoxedTool {
    build(
        ToolMetadata::new(
            "install_npm_packages",
            "Run npm install in the current directory in the background. \
             With no packages, installs from package.json.",
        )
        .with_returns("{success, pid, message}"),
        object_schema(
            json!({
                "packages": { "type": "string", "description": "Space-separated package names" }
            }),
            &[],
        ),
        &[Capability::Subprocess, Capability::FilesystemWrite],
        InstallNpmPackages(runner),
    )
}

#[derive(Deserialize)]
struct ChangelogArgs {
    version: String,
    changes: String,
}

struct CreateChangelog(CommandRunner);

#[async_trait]
impl ToolHandler for CreateChangelog {
    async fn handle(&self, args: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
        let args: ChangelogArgs = parse_args(args)?;
        let path = self.0.create_changelog(&args.version, &args.changes).await?;
        Ok(ToolOutput::text(format!("Changelog updated at {}", path.display())))
    }
}

pub(super) fn create_changelog(runner: CommandRunner) -> BoxedTool {
    build(
        ToolMetadata::new(
            "create_changelog",
            "Create or append to CHANGELOG.md in the current directory.",
        ),
        object_schema(
            json!({
                "version": { "type": "string" },
                "changes": { "type": "string" }
            }),
            &["version", "changes"],
        ),
        &[Capability::FilesystemWrite],
        CreateChangelog(runner),
    )
}
