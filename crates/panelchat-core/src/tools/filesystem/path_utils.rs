//! Workspace path resolution and containment checks.

use std::path::{Component, Path, PathBuf};

use crate::error::ToolError;

/// The workspace root the file tools operate in, if one is open.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    root: Option<PathBuf>,
}

impl Workspace {
    /// Open a workspace at `root`; relative roots are made absolute.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root: Some(root) }
    }

    /// A workspace with no folder open
    pub fn none() -> Self {
        Self { root: None }
    }

    pub fn from_option(root: Option<PathBuf>) -> Self {
        root.map(Self::new).unwrap_or_default()
    }

    /// The root directory, or `NoWorkspace`
    pub fn root(&self) -> Result<&Path, ToolError> {
        self.root.as_deref().ok_or(ToolError::NoWorkspace)
    }

    /// Resolve a workspace-relative path, refusing anything that escapes the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ToolError> {
        let root = self.root()?;
        let joined = root.join(relative);
        ensure_within(&joined, root)?;
        Ok(joined)
    }

    /// Whether `path` names the workspace root itself
    pub fn is_root(&self, path: &Path) -> bool {
        let Some(root) = self.root.as_deref() else {
            return false;
        };
        if normalize_path(path) == normalize_path(root) {
            return true;
        }
        matches!(
            (dunce::canonicalize(path), dunce::canonicalize(root)),
            (Ok(a), Ok(b)) if a == b
        )
    }

    /// Express `path` relative to the root with forward slashes.
    pub fn relative_display(&self, path: &Path) -> String {
        match self.root.as_deref().and_then(|root| path.strip_prefix(root).ok()) {
            Some(rel) => path_to_display(rel),
            None => path_to_display(path),
        }
    }
}

/// Convert a path to a display string with forward slash separators.
pub fn path_to_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Normalize a path by resolving `.` and `..` components without filesystem access.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(p) => components.push(Component::Prefix(p)),
            Component::RootDir => {
                components.retain(|c| matches!(c, Component::Prefix(_)));
                components.push(Component::RootDir);
            }
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::RootDir | Component::Prefix(_)) => {}
                Some(Component::ParentDir) | None => components.push(Component::ParentDir),
                Some(Component::Normal(_) | Component::CurDir) => {
                    components.pop();
                }
            },
            Component::Normal(c) => components.push(Component::Normal(c)),
        }
    }

    if components.is_empty() {
        PathBuf::from(".")
    } else {
        components.iter().collect()
    }
}

/// Check that `path` stays inside `root`.
///
/// The lexical check catches `..` traversal for paths that do not exist yet.
/// When the deepest existing ancestor can be canonicalized, symlinks are
/// resolved as well.
pub fn ensure_within(path: &Path, root: &Path) -> Result<(), ToolError> {
    let normalized = normalize_path(path);
    let normalized_root = normalize_path(root);
    if !normalized.starts_with(&normalized_root) {
        return Err(outside(path, root));
    }

    let Ok(canonical_root) = dunce::canonicalize(root) else {
        return Ok(());
    };

    let mut ancestor = normalized.as_path();
    loop {
        if let Ok(canonical) = dunce::canonicalize(ancestor) {
            if canonical.starts_with(&canonical_root) {
                return Ok(());
            }
            return Err(outside(path, root));
        }
        match ancestor.parent() {
            Some(parent) => ancestor = parent,
            None => return Ok(()),
        }
    }
}

fn outside(path: &Path, root: &Path) -> ToolError {
    ToolError::PermissionDenied(format!(
        "Path {} is outside workspace {}",
        path_to_display(path),
        path_to_display(root)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/ws/src/../lib.rs")),
            PathBuf::from("/ws/lib.rs")
        );
        assert_eq!(normalize_path(Path::new("/ws/./a/./b")), PathBuf::from("/ws/a/b"));
        assert_eq!(normalize_path(Path::new("/../..")), PathBuf::from("/"));
        assert_eq!(normalize_path(Path::new("")), PathBuf::from("."));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = tempfile::TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());

        assert!(ws.resolve("src/main.rs").is_ok());
        assert!(matches!(
            ws.resolve("../outside.txt"),
            Err(ToolError::PermissionDenied(_))
        ));
        assert!(matches!(
            ws.resolve("a/../../outside.txt"),
            Err(ToolError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_is_root() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        let ws = Workspace::new(dir.path());

        assert!(ws.is_root(&ws.resolve("").unwrap()));
        assert!(ws.is_root(&ws.resolve(".").unwrap()));
        assert!(ws.is_root(&ws.resolve("src/..").unwrap()));
        assert!(!ws.is_root(&ws.resolve("src").unwrap()));
        assert!(!Workspace::none().is_root(dir.path()));
    }

    #[test]
    fn test_resolve_without_workspace() {
        let ws = Workspace::none();
        assert!(matches!(ws.resolve("a.txt"), Err(ToolError::NoWorkspace)));
    }

    #[test]
    fn test_relative_display() {
        let ws = Workspace::new("/ws");
        assert_eq!(ws.relative_display(Path::new("/ws/src/config.ts")), "src/config.ts");
        assert_eq!(ws.relative_display(Path::new("/other/x")), "/other/x");
    }
}
