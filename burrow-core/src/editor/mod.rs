//! Line-oriented file editing
//!
//! Every edit is a full read-modify-write: the file is loaded as a
//! [`LineBuffer`], the edit is applied in memory, and the whole sequence is
//! written back (truncate and rewrite). Files are decoded leniently; invalid
//! UTF-8 becomes U+FFFD rather than failing the edit.
//!
//! Edits are not serialized against each other. Two concurrent edits of the
//! same file race, and the last write wins.

mod lines;

pub use lines::{EditOutcome, LineBuffer, RowTarget};

use crate::error::{BurrowError, Result};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Content supplied to insert/update: plain text or a structured value.
#[derive(Debug, Clone, PartialEq)]
pub enum EditContent {
    /// Inserted as-is
    Text(String),
    /// Serialized as indented JSON, keys in caller order
    Structured(Value),
}

impl EditContent {
    /// Render to the text that is written into the file
    pub fn render(&self) -> Result<String> {
        match self {
            EditContent::Text(text) => Ok(text.clone()),
            EditContent::Structured(value) => to_indented_json(value),
        }
    }
}

impl From<Value> for EditContent {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => EditContent::Text(text),
            other => EditContent::Structured(other),
        }
    }
}

impl From<&str> for EditContent {
    fn from(text: &str) -> Self {
        EditContent::Text(text.to_string())
    }
}

fn to_indented_json(value: &Value) -> Result<String> {
    use serde::Serialize;

    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(out).map_err(|e| BurrowError::Other(e.to_string()))
}

async fn load(path: &Path) -> Result<LineBuffer> {
    let bytes = tokio::fs::read(path).await?;
    Ok(LineBuffer::parse(&String::from_utf8_lossy(&bytes)))
}

async fn store(path: &Path, buffer: &LineBuffer) -> Result<()> {
    tokio::fs::write(path, buffer.to_text()).await?;
    Ok(())
}

async fn require_file(path: &Path) -> Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(BurrowError::FileNotFound(path.to_path_buf())),
    }
}

/// Insert content into a file, creating it and its parent directories if needed
pub async fn insert(path: &Path, target: &RowTarget, content: &EditContent) -> Result<EditOutcome> {
    let content = content.render()?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut buffer = match tokio::fs::try_exists(path).await? {
        true => load(path).await?,
        false => LineBuffer::default(),
    };

    let outcome = buffer.insert(target, &content)?;
    if outcome.is_modified() {
        store(path, &buffer).await?;
    }
    debug!("Insert into {} at {:?}: {:?}", path.display(), target, outcome);
    Ok(outcome)
}

/// Delete rows or substrings from an existing file
pub async fn delete(path: &Path, target: &RowTarget, substring: Option<&str>) -> Result<EditOutcome> {
    require_file(path).await?;

    let mut buffer = load(path).await?;
    let outcome = buffer.delete(target, substring)?;
    if outcome.is_modified() {
        store(path, &buffer).await?;
    }
    debug!("Delete on {} at {:?}: {:?}", path.display(), target, outcome);
    Ok(outcome)
}

/// Update rows or substrings of an existing file
pub async fn update(
    path: &Path,
    target: &RowTarget,
    content: &EditContent,
    substring: Option<&str>,
) -> Result<EditOutcome> {
    require_file(path).await?;
    let content = content.render()?;

    let mut buffer = load(path).await?;
    let outcome = buffer.update(target, &content, substring)?;
    if outcome.is_modified() {
        store(path, &buffer).await?;
    }
    debug!("Update on {} at {:?}: {:?}", path.display(), target, outcome);
    Ok(outcome)
}

#[cfg(test)]
mod editor_tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_insert_creates_file_and_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deep/nested/notes.txt");

        insert(&path, &RowTarget::All, &"hello".into()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn test_insert_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "one\ntwo\n").unwrap();

        insert(&path, &RowTarget::Row(1), &"X".into()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\nX\ntwo\n");
    }

    #[tokio::test]
    async fn test_structured_content_serialized_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let content = EditContent::from(serde_json::json!({"zeta": 1, "alpha": "é"}));
        insert(&path, &RowTarget::All, &content).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "{\n    \"zeta\": 1,\n    \"alpha\": \"é\"\n}\n");
    }

    #[tokio::test]
    async fn test_update_and_delete_require_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.txt");

        let err = update(&path, &RowTarget::All, &"x".into(), None).await.unwrap_err();
        assert!(matches!(err, BurrowError::FileNotFound(_)));

        let err = delete(&path, &RowTarget::All, None).await.unwrap_err();
        assert!(matches!(err, BurrowError::FileNotFound(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_unchanged_edit_leaves_bytes_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crlf.txt");
        std::fs::write(&path, "a\r\nb").unwrap();

        let outcome = delete(&path, &RowTarget::Row(10), None).await.unwrap();
        assert_eq!(outcome, EditOutcome::Unchanged);
        assert_eq!(std::fs::read(&path).unwrap(), b"a\r\nb");
    }

    #[tokio::test]
    async fn test_delete_rows_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("three.txt");
        std::fs::write(&path, "zero\none\ntwo\n").unwrap();

        let outcome = delete(&path, &RowTarget::Rows(vec![0, 2]), None).await.unwrap();
        assert!(outcome.is_modified());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\n");
    }

    #[tokio::test]
    async fn test_lossy_decoding() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bin.txt");
        std::fs::write(&path, [b'o', b'k', 0xff, b'\n']).unwrap();

        update(&path, &RowTarget::All, &"fixed".into(), Some("ok")).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "fixed\u{fffd}\n");
    }
}
