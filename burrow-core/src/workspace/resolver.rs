//! Path containment
//!
//! Resolution is lexical: `.` and `..` are folded without touching the
//! filesystem, so paths that do not exist yet (a file about to be created)
//! resolve the same way as existing ones. Symlinks inside the workspace are
//! not followed.

use crate::error::{BurrowError, Result};
use std::path::{Component, Path, PathBuf};

/// Resolve `input` against `current` and require the result to stay under `root`.
///
/// An empty input resolves to `current`. Absolute inputs are accepted when
/// they already lie inside the root.
pub fn resolve_within(root: &Path, current: &Path, input: &str) -> Result<PathBuf> {
    if input.is_empty() {
        return Ok(current.to_path_buf());
    }

    let joined = current.join(input);
    let resolved = normalize_lexically(&joined);

    if is_contained(root, &resolved) {
        Ok(resolved)
    } else {
        Err(BurrowError::Containment(resolved))
    }
}

/// True if the longest common prefix of `root` and `path` is `root` itself
pub fn is_contained(root: &Path, path: &Path) -> bool {
    let mut path_components = path.components();
    for root_component in root.components() {
        match path_components.next() {
            Some(c) if c == root_component => {}
            _ => return false,
        }
    }
    true
}

/// Fold `.` and `..` components. `..` at the filesystem root stays at the root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // pop() refuses to remove the root, which is the clamp we want
                let at_root = !out.pop();
                if at_root && !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

#[cfg(test)]
mod resolver_tests {
    use super::*;

    fn ws() -> PathBuf {
        PathBuf::from("/ws")
    }

    #[test]
    fn test_empty_input_is_current() {
        let current = ws().join("a");
        assert_eq!(resolve_within(&ws(), &current, "").unwrap(), current);
    }

    #[test]
    fn test_relative_join() {
        let resolved = resolve_within(&ws(), &ws().join("a"), "b/c.txt").unwrap();
        assert_eq!(resolved, PathBuf::from("/ws/a/b/c.txt"));
    }

    #[test]
    fn test_parent_inside_root() {
        let resolved = resolve_within(&ws(), &ws().join("a/b"), "../../x").unwrap();
        assert_eq!(resolved, PathBuf::from("/ws/x"));
    }

    #[test]
    fn test_parent_escape_rejected() {
        let err = resolve_within(&ws(), &ws(), "../etc/passwd").unwrap_err();
        match err {
            BurrowError::Containment(path) => assert_eq!(path, PathBuf::from("/etc/passwd")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sibling_with_shared_prefix_rejected() {
        // "/ws2" shares a string prefix with "/ws" but not a path prefix
        assert!(resolve_within(&ws(), &ws(), "../ws2/file").is_err());
    }

    #[test]
    fn test_absolute_inputs() {
        assert!(resolve_within(&ws(), &ws(), "/etc").is_err());
        assert_eq!(
            resolve_within(&ws(), &ws(), "/ws/inner").unwrap(),
            PathBuf::from("/ws/inner")
        );
    }

    #[test]
    fn test_root_itself_allowed() {
        assert_eq!(resolve_within(&ws(), &ws().join("a"), "..").unwrap(), ws());
        assert_eq!(resolve_within(&ws(), &ws(), ".").unwrap(), ws());
    }

    #[test]
    fn test_many_parent_segments_never_escape() {
        for depth in 0..8 {
            let input = format!("{}tmp", "../".repeat(depth));
            let current = ws().join("a/b/c");
            match resolve_within(&ws(), &current, &input) {
                Ok(path) => assert!(path.starts_with("/ws"), "escaped to {}", path.display()),
                Err(BurrowError::Containment(path)) => assert!(!path.starts_with("/ws")),
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_normalize_clamps_at_root() {
        assert_eq!(normalize_lexically(Path::new("/../../a")), PathBuf::from("/a"));
        assert_eq!(normalize_lexically(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
    }
}
