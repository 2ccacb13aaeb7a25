//! Workspace sandbox
//!
//! A [`Workspace`] owns the immutable workspace root and the mutable
//! current logical directory. Every file tool resolves user paths through
//! it, and no resolution may leave the root.
//!
//! The current directory sits behind a `tokio::sync::RwLock`. A single
//! resolution takes the read lock for its duration; a directory change holds
//! the write lock across resolve, directory check and commit. Callers that
//! need several resolutions against the same directory take a
//! [`WorkspaceView`] and resolve through it.

mod resolver;

pub use resolver::{is_contained, normalize_lexically, resolve_within};

use crate::error::{BurrowError, Result};
use std::path::{Path, PathBuf};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

/// Workspace root plus the current logical directory
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    current: RwLock<PathBuf>,
}

impl Workspace {
    /// Open a workspace rooted at an existing directory.
    ///
    /// The root is canonicalized once so containment checks compare against
    /// its real location.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root).map_err(|e| {
            BurrowError::Configuration(format!(
                "Workspace root {} is not accessible: {}",
                root.display(),
                e
            ))
        })?;

        if !canonical.is_dir() {
            return Err(BurrowError::NotADirectory(canonical));
        }

        info!("Workspace root: {}", canonical.display());
        Ok(Self {
            current: RwLock::new(canonical.clone()),
            root: canonical,
        })
    }

    /// Create the root directory if needed, then open it
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        Self::open(root)
    }

    /// The workspace root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot of the current logical directory
    pub async fn current_dir(&self) -> PathBuf {
        self.current.read().await.clone()
    }

    /// Resolve a path against the current logical directory
    pub async fn resolve(&self, input: &str) -> Result<PathBuf> {
        self.view().await.resolve(input)
    }

    /// Resolve a path against the workspace root, ignoring the current directory
    pub fn resolve_from_root(&self, input: &str) -> Result<PathBuf> {
        resolve_within(&self.root, &self.root, input)
    }

    /// Scoped read view; the current directory cannot change while it is held
    pub async fn view(&self) -> WorkspaceView<'_> {
        WorkspaceView {
            root: &self.root,
            current: self.current.read().await,
        }
    }

    /// Change the current logical directory.
    ///
    /// The target must resolve inside the root and be an existing directory;
    /// on any failure the current directory is left untouched.
    pub async fn change_dir(&self, input: &str) -> Result<PathBuf> {
        let mut current = self.current.write().await;
        let target = resolve_within(&self.root, &current, input)?;

        let is_dir = tokio::fs::metadata(&target)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            debug!("Rejected directory change to {}", target.display());
            return Err(BurrowError::NotADirectory(target));
        }

        info!("Changed directory to {}", target.display());
        *current = target.clone();
        Ok(target)
    }
}

/// Read-locked view of a workspace for multi-step consistent resolution
#[derive(Debug)]
pub struct WorkspaceView<'a> {
    root: &'a Path,
    current: RwLockReadGuard<'a, PathBuf>,
}

impl WorkspaceView<'_> {
    /// The workspace root
    pub fn root(&self) -> &Path {
        self.root
    }

    /// The current logical directory
    pub fn current_dir(&self) -> &Path {
        &self.current
    }

    /// Resolve a path against the held current directory
    pub fn resolve(&self, input: &str) -> Result<PathBuf> {
        resolve_within(self.root, &self.current, input)
    }
}

#[cfg(test)]
mod workspace_tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace() -> (TempDir, Workspace) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi\n").unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        (dir, ws)
    }

    #[tokio::test]
    async fn test_starts_at_root() {
        let (_dir, ws) = workspace();
        assert_eq!(ws.current_dir().await, ws.root());
        assert_eq!(ws.resolve("").await.unwrap(), ws.root());
    }

    #[tokio::test]
    async fn test_change_dir_then_resolve_relative() {
        let (_dir, ws) = workspace();
        let moved = ws.change_dir("src").await.unwrap();
        assert_eq!(moved, ws.root().join("src"));

        let resolved = ws.resolve("nested/file.rs").await.unwrap();
        assert_eq!(resolved, ws.root().join("src/nested/file.rs"));

        let up = ws.resolve("../notes.txt").await.unwrap();
        assert_eq!(up, ws.root().join("notes.txt"));
    }

    #[tokio::test]
    async fn test_change_dir_escape_leaves_state() {
        let (_dir, ws) = workspace();
        ws.change_dir("src").await.unwrap();

        let err = ws.change_dir("../../..").await.unwrap_err();
        assert!(matches!(err, BurrowError::Containment(_)));
        assert_eq!(ws.current_dir().await, ws.root().join("src"));
    }

    #[tokio::test]
    async fn test_change_dir_to_file_or_missing_rejected() {
        let (_dir, ws) = workspace();

        let err = ws.change_dir("notes.txt").await.unwrap_err();
        assert!(matches!(err, BurrowError::NotADirectory(_)));

        let err = ws.change_dir("does-not-exist").await.unwrap_err();
        assert!(matches!(err, BurrowError::NotADirectory(_)));

        assert_eq!(ws.current_dir().await, ws.root());
    }

    #[tokio::test]
    async fn test_view_holds_directory() {
        let (_dir, ws) = workspace();
        ws.change_dir("src").await.unwrap();

        let view = ws.view().await;
        assert_eq!(view.current_dir(), ws.root().join("src"));
        assert_eq!(view.resolve("a").unwrap(), ws.root().join("src/a"));
        assert_eq!(view.resolve("../b").unwrap(), ws.root().join("b"));
    }

    #[tokio::test]
    async fn test_resolve_from_root_ignores_current_dir() {
        let (_dir, ws) = workspace();
        ws.change_dir("src/nested").await.unwrap();
        assert_eq!(ws.resolve_from_root("app.py").unwrap(), ws.root().join("app.py"));
    }

    #[test]
    fn test_open_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let err = Workspace::open(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, BurrowError::Configuration(_)));
    }

    #[test]
    fn test_create_makes_root() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::create(dir.path().join("fresh/ws")).unwrap();
        assert!(ws.root().is_dir());
    }
}
