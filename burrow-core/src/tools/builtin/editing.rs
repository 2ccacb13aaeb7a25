//! insert/delete/update_file_content
//!
//! An edit that matches nothing still succeeds, carrying a `NO_MATCH`
//! warning so callers can tell it apart from a real change.

use super::{build, object_schema, row_properties};
use crate::editor::{self, EditContent, EditOutcome, RowTarget};
use crate::tools::{
    BoxedTool, Capability, ToolError, ToolExecutionContext, ToolHandler, ToolMetadata, ToolOutput,
    ToolWarning, parse_args,
};
use crate::workspace::Workspace;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::path::Path;
use std::sync::Arc;

#[derive(Deserialize)]
struct EditArgs {
    filename: String,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    row: Option<i64>,
    #[serde(default)]
    rows: Option<Vec<i64>>,
    #[serde(default)]
    substring: Option<String>,
}

impl EditArgs {
    fn target(&self) -> RowTarget {
        RowTarget::from_args(self.row, self.rows.clone())
    }

    fn content(&self) -> EditContent {
        self.content.clone().map(EditContent::from).unwrap_or_else(|| "".into())
    }
}

fn outcome_output(outcome: EditOutcome, path: &Path, unchanged: String) -> ToolOutput {
    match outcome {
        EditOutcome::Modified => {
            ToolOutput::text(format!("Updated file '{}' successfully.", path.display()))
        }
        EditOutcome::Unchanged => {
            ToolOutput::text(unchanged.clone()).with_warning(ToolWarning::no_match(unchanged))
        }
    }
}

fn edit_schema(with_content: bool, with_substring: bool, required: &[&str]) -> Value {
    let mut properties = Map::new();
    properties.insert(
        "filename".into(),
        json!({ "type": "string", "description": "Path relative to the current directory" }),
    );
    if with_content {
        properties.insert(
            "content".into(),
            json!({ "description": "Text, or a JSON value written as indented JSON" }),
        );
    }
    if let Value::Object(rows) = row_properties() {
        properties.extend(rows);
    }
    if with_substring {
        properties.insert(
            "substring".into(),
            json!({ "type": "string", "description": "Edit only this text within the targeted rows" }),
        );
    }
    object_schema(Value::Object(properties), required)
}

struct InsertContent(Arc<Workspace>);

#[async_trait]
impl ToolHandler for InsertContent {
    async fn handle(&self, args: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
        let args: EditArgs = parse_args(args)?;
        let path = self.0.resolve(&args.filename).await?;

        let outcome = editor::insert(&path, &args.target(), &args.content()).await?;
        Ok(match outcome {
            EditOutcome::Modified => {
                ToolOutput::text(format!("Inserted content into '{}'.", path.display()))
            }
            EditOutcome::Unchanged => outcome_output(
                outcome,
                &path,
                format!("No valid rows to insert at in '{}'.", path.display()),
            ),
        })
    }
}

pub(super) fn insert_file_content(workspace: Arc<Workspace>) -> BoxedTool {
    build(
        ToolMetadata::new(
            "insert_file_content",
            "Insert content at specific row(s) in a file inside the workspace. \
             Appends when no row is given; creates the file if missing.",
        ),
        edit_schema(true, false, &["filename", "content"]),
        &[Capability::FilesystemWrite],
        InsertContent(workspace),
    )
}

struct DeleteContent(Arc<Workspace>);

#[async_trait]
impl ToolHandler for DeleteContent {
    async fn handle(&self, args: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
        let args: EditArgs = parse_args(args)?;
        let path = self.0.resolve(&args.filename).await?;

        let outcome = editor::delete(&path, &args.target(), args.substring.as_deref()).await?;
        Ok(outcome_output(
            outcome,
            &path,
            format!("No matching rows or substrings found in '{}'.", path.display()),
        ))
    }
}

pub(super) fn delete_file_content(workspace: Arc<Workspace>) -> BoxedTool {
    build(
        ToolMetadata::new(
            "delete_file_content",
            "Delete rows or a substring from a file. Without row, rows or substring the file is cleared.",
        ),
        edit_schema(false, true, &["filename"]),
        &[Capability::FilesystemWrite],
        DeleteContent(workspace),
    )
}

struct UpdateContent(Arc<Workspace>);

#[async_trait]
impl ToolHandler for UpdateContent {
    async fn handle(&self, args: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
        let args: EditArgs = parse_args(args)?;
        let path = self.0.resolve(&args.filename).await?;

        let outcome = editor::update(
            &path,
            &args.target(),
            &args.content(),
            args.substring.as_deref(),
        )
        .await?;
        Ok(outcome_output(
            outcome,
            &path,
            format!("No updates applied to '{}'.", path.display()),
        ))
    }
}

pub(super) fn update_file_content(workspace: Arc<Workspace>) -> BoxedTool {
    build(
        ToolMetadata::new(
            "update_file_content",
            "Replace rows, or a substring within rows, of a file. \
             Without row or rows the whole file is targeted.",
        ),
        edit_schema(true, true, &["filename", "content"]),
        &[Capability::FilesystemWrite],
        UpdateContent(workspace),
    )
}
