use super::{build, object_schema};
use crate::error::BurrowError;
use crate::tools::{
    BoxedTool, Capability, ToolError, ToolExecutionContext, ToolHandler, ToolMetadata, ToolOutput,
    parse_args,
};
use crate::workspace::Workspace;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

struct ListFiles(Arc<Workspace>);

#[async_trait]
impl ToolHandler for ListFiles {
    async fn handle(&self, _: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
        let dir = self.0.current_dir().await;
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(BurrowError::from)?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(BurrowError::from)? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        Ok(ToolOutput::text(names.join("\n")))
    }
}

pub(super) fn list_files(workspace: Arc<Workspace>) -> BoxedTool {
    build(
        ToolMetadata::new("list_files", "List files in the current directory of the workspace.")
            .with_returns("Newline-separated entry names"),
        object_schema(json!({}), &[]),
        &[Capability::FilesystemRead],
        ListFiles(workspace),
    )
}

#[derive(Deserialize)]
struct WriteFileArgs {
    filename: String,
    content: String,
}

struct WriteFile(Arc<Workspace>);

#[async_trait]
impl ToolHandler for WriteFile {
    async fn handle(&self, args: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
        let args: WriteFileArgs = parse_args(args)?;
        let path = self.0.resolve(&args.filename).await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(BurrowError::from)?;
        }
        tokio::fs::write(&path, args.content).await.map_err(BurrowError::from)?;

        Ok(ToolOutput::text(format!(
            "File {} created with provided content.",
            path.display()
        )))
    }
}

pub(super) fn write_file(workspace: Arc<Workspace>) -> BoxedTool {
    build(
        ToolMetadata::new(
            "write_file",
            "Write plain text content into a file in the workspace. Overwrites the file if it exists.",
        ),
        object_schema(
            json!({
                "filename": { "type": "string" },
                "content": { "type": "string" }
            }),
            &["filename", "content"],
        ),
        &[Capability::FilesystemWrite],
        WriteFile(workspace),
    )
}

#[derive(Deserialize)]
struct ReadFileArgs {
    filename: String,
}

struct ReadFile(Arc<Workspace>);

#[async_trait]
impl ToolHandler for ReadFile {
    async fn handle(&self, args: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
        let args: ReadFileArgs = parse_args(args)?;
        let path = self.0.resolve(&args.filename).await?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BurrowError::FileNotFound(path).into());
            }
            Err(e) => return Err(BurrowError::from(e).into()),
        };

        Ok(ToolOutput::text(String::from_utf8_lossy(&bytes)))
    }
}

pub(super) fn read_file(workspace: Arc<Workspace>) -> BoxedTool {
    build(
        ToolMetadata::new("read_file", "Read and return the content of a file in the workspace.")
            .with_returns("File text"),
        object_schema(json!({ "filename": { "type": "string" } }), &["filename"]),
        &[Capability::FilesystemRead],
        ReadFile(workspace),
    )
}

struct CurrentDir(Arc<Workspace>);

#[async_trait]
impl ToolHandler for CurrentDir {
    async fn handle(&self, _: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::text(self.0.current_dir().await.display().to_string()))
    }
}

pub(super) fn current_working_directory(workspace: Arc<Workspace>) -> BoxedTool {
    build(
        ToolMetadata::new(
            "current_working_directory",
            "Get the current logical working directory (inside the workspace).",
        )
        .with_returns("Absolute path"),
        object_schema(json!({}), &[]),
        &[Capability::FilesystemRead],
        CurrentDir(workspace),
    )
}

#[derive(Deserialize)]
struct ChangeDirArgs {
    path: String,
}

struct ChangeDir(Arc<Workspace>);

#[async_trait]
impl ToolHandler for ChangeDir {
    async fn handle(&self, args: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
        let args: ChangeDirArgs = parse_args(args)?;
        let target = self.0.change_dir(&args.path).await?;
        Ok(ToolOutput::text(format!("Changed directory to {}", target.display())))
    }
}

pub(super) fn change_directory(workspace: Arc<Workspace>) -> BoxedTool {
    build(
        ToolMetadata::new(
            "change_directory",
            "Change the current logical working directory (restricted inside workspace).",
        ),
        object_schema(json!({ "path": { "type": "string" } }), &["path"]),
        &[Capability::FilesystemRead],
        ChangeDir(workspace),
    )
}
