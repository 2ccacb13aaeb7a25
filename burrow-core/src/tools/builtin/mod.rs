//! Built-in workspace tools
//!
//! Every tool is a [`HandlerTool`] over a small handler struct holding the
//! shared [`Workspace`] or [`CommandRunner`]. Arguments are deserialized into
//! typed structs; a bad argument becomes a validation error, never a panic.

mod commands;
mod editing;
mod filesystem;
mod processes;

use super::{BoxedTool, Capability, CapabilitySet, HandlerTool, ToolHandler, ToolMetadata, ToolSchema};
use crate::runner::CommandRunner;
use serde_json::{Value, json};
use std::sync::Arc;

/// Names of all built-in tools, in listing order
pub const BUILTIN_TOOL_NAMES: &[&str] = &[
    "run_command",
    "list_files",
    "write_file",
    "read_file",
    "current_working_directory",
    "change_directory",
    "os_name",
    "run_python",
    "stop_process",
    "check_process_logs",
    "create_vite_app",
    "install_npm_packages",
    "create_changelog",
    "insert_file_content",
    "delete_file_content",
    "update_file_content",
];

/// Build every built-in tool over one runner (and its workspace and registry)
pub fn builtin_tools(runner: &CommandRunner) -> Vec<BoxedTool> {
    let workspace = runner.workspace().clone();

    vec![
        commands::run_command(runner.clone()),
        filesystem::list_files(workspace.clone()),
        filesystem::write_file(workspace.clone()),
        filesystem::read_file(workspace.clone()),
        filesystem::current_working_directory(workspace.clone()),
        filesystem::change_directory(workspace.clone()),
        commands::os_name(),
        commands::run_python(runner.clone()),
        processes::stop_process(runner.registry().clone()),
        processes::check_process_logs(runner.registry().clone()),
        commands::create_vite_app(runner.clone()),
        commands::install_npm_packages(runner.clone()),
        commands::create_changelog(runner.clone()),
        editing::insert_file_content(workspace.clone()),
        editing::delete_file_content(workspace.clone()),
        editing::update_file_content(workspace),
    ]
}

fn build<H: ToolHandler + 'static>(
    metadata: ToolMetadata,
    schema: Value,
    capabilities: &[Capability],
    handler: H,
) -> BoxedTool {
    Arc::new(
        HandlerTool::new(metadata, ToolSchema::new(schema), handler)
            .with_capabilities(capabilities.iter().copied().collect::<CapabilitySet>()),
    )
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn row_properties() -> Value {
    json!({
        "row": {
            "type": "integer",
            "description": "0-based row index"
        },
        "rows": {
            "type": "array",
            "items": { "type": "integer" },
            "description": "0-based row indices; takes precedence over row"
        }
    })
}
