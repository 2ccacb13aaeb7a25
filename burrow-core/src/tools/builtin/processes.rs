use super::{build, object_schema};
use crate::error::BurrowError;
use crate::process::{ProcessRegistry, StopOutcome};
use crate::tools::{
    BoxedTool, Capability, ToolError, ToolExecutionContext, ToolHandler, ToolMetadata, ToolOutput,
    parse_args,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Deserialize)]
struct PidArgs {
    pid: u32,
}

/// Result of `stop_process`
#[derive(Debug, Serialize)]
struct StopReport {
    success: bool,
    message: String,
}

struct StopProcess(ProcessRegistry);

#[async_trait]
impl ToolHandler for StopProcess {
    async fn handle(&self, args: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
        let PidArgs { pid } = parse_args(args)?;

        let report = match self.0.stop(pid).await {
            Ok(StopOutcome::Terminated) => StopReport {
                success: true,
                message: format!("Process {} terminated.", pid),
            },
            Ok(StopOutcome::AlreadyExited { exit }) => StopReport {
                success: true,
                message: format!("Process {} had already exited (exit code: {}).", pid, exit),
            },
            Err(e @ BurrowError::ProcessNotFound(_)) => StopReport {
                success: false,
                message: e.to_string(),
            },
            Err(e) => StopReport {
                success: false,
                message: format!("Error stopping process {}: {}", pid, e),
            },
        };
        ToolOutput::json(&report)
    }
}

pub(super) fn stop_process(registry: ProcessRegistry) -> BoxedTool {
    build(
        ToolMetadata::new(
            "stop_process",
            "Stop a process started by run_python, install_npm_packages or create_vite_app.",
        )
        .with_returns("{success, message}"),
        object_schema(json!({ "pid": { "type": "integer", "minimum": 0 } }), &["pid"]),
        &[Capability::ProcessControl],
        StopProcess(registry),
    )
}

struct CheckProcessLogs(ProcessRegistry);

#[async_trait]
impl ToolHandler for CheckProcessLogs {
    async fn handle(&self, args: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
        let PidArgs { pid } = parse_args(args)?;
        Ok(ToolOutput::text(self.0.report(pid).await))
    }
}

pub(super) fn check_process_logs(registry: ProcessRegistry) -> BoxedTool {
    build(
        ToolMetadata::new(
            "check_process_logs",
            "Report whether a process is running or finished, with recent output \
             when it was started here.",
        ),
        object_schema(json!({ "pid": { "type": "integer", "minimum": 0 } }), &["pid"]),
        &[Capability::ProcessControl],
        CheckProcessLogs(registry),
    )
}
