//! Resolve annotated path text to a canonical host path.
//!
//! Canonical paths are absolute and lexically normalized (`.` dropped, `..`
//! popped, symlinks untouched). A canonical path ends with `/` iff it denotes
//! a directory: an existing directory on the host, or a missing path whose
//! text ends with `/`.

use std::path::{Component, Path, PathBuf};

/// Absolute, normalized host path; directories carry a trailing `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalPath(String);

impl CanonicalPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    pub fn is_dir(&self) -> bool {
        self.0.ends_with('/')
    }

    /// Final component; empty for a directory.
    pub fn basename(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Directory holding this path, with a trailing `/`. A directory is its
    /// own parent here.
    pub fn parent_dir(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[..=i],
            None => "/",
        }
    }
}

impl std::fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tagged path resolved against the host filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedPath {
    pub canonical: CanonicalPath,
    pub exists: bool,
    pub is_dir: bool,
}

/// Qualify `text` relative to `base`.
pub fn qualify_path_from(base: &Path, text: &str) -> QualifiedPath {
    let joined = base.join(text);
    let metadata = std::fs::metadata(&joined).ok();
    let exists = metadata.is_some();
    let is_dir = match metadata {
        Some(meta) => meta.is_dir(),
        None => text.ends_with('/'),
    };

    let mut canonical = normalize_path(&joined).to_string_lossy().into_owned();
    if is_dir && !canonical.ends_with('/') {
        canonical.push('/');
    }

    QualifiedPath {
        canonical: CanonicalPath(canonical),
        exists,
        is_dir,
    }
}

/// Lexical normalization: no filesystem access, no symlink resolution.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_dots() {
        assert_eq!(
            normalize_path(Path::new("/a/./b/../c//d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(normalize_path(Path::new("/../..")), PathBuf::from("/"));
    }

    #[test]
    fn test_relative_and_absolute_forms_agree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x"), b"1").unwrap();

        let relative = qualify_path_from(dir.path(), "./x");
        let absolute = qualify_path_from(dir.path(), &dir.path().join("x").to_string_lossy());
        assert_eq!(relative, absolute);
        assert!(relative.exists);
        assert!(!relative.is_dir);
        assert!(!relative.canonical.is_dir());
    }

    #[test]
    fn test_existing_directory_gets_trailing_separator() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();

        let q = qualify_path_from(dir.path(), "data");
        assert!(q.exists && q.is_dir);
        assert!(q.canonical.as_str().ends_with("/data/"));
        assert_eq!(q.canonical.basename(), "");
    }

    #[test]
    fn test_missing_path_directory_from_trailing_separator() {
        let dir = tempfile::tempdir().unwrap();

        let q = qualify_path_from(dir.path(), "results/");
        assert!(!q.exists);
        assert!(q.is_dir);
        assert!(q.canonical.is_dir());

        let q = qualify_path_from(dir.path(), "results/out.txt");
        assert!(!q.exists);
        assert!(!q.is_dir);
        assert_eq!(q.canonical.basename(), "out.txt");
    }

    #[test]
    fn test_parent_dir() {
        let q = qualify_path_from(Path::new("/work"), "out/r.txt");
        assert_eq!(q.canonical.parent_dir(), "/work/out/");

        let q = qualify_path_from(Path::new("/work"), "out/");
        assert_eq!(q.canonical.parent_dir(), "/work/out/");
    }

    #[test]
    fn test_canonicalization_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("d")).unwrap();

        for text in ["d", "./d/../d/", "missing.txt", "new/"] {
            let once = qualify_path_from(dir.path(), text);
            let twice = qualify_path_from(dir.path(), once.canonical.as_str());
            assert_eq!(once, twice, "{text}");
        }
    }
}
