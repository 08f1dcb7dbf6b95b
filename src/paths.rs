//! Hierarchical, slash-separated paths used to identify inputs and outputs of
//! a compile action, independent of the host filesystem's path conventions.
//!
//! Grounded on the path utilities (`source_name`, `strip_prefix`,
//! `canonicalize` in the `utils` module): a thin, allocation-light wrapper
//! kept platform-agnostic via `path-slash`/`dunce` rather than raw
//! [`std::path::Path`] comparisons, which differ subtly across platforms
//! (trailing slashes, `\\` vs `/`, UNC prefixes).

use std::{
    fmt,
    path::{Path, PathBuf},
};

/// A hierarchical, slash-separated, possibly-absolute path.
///
/// Equality is structural: two `ExecPath`s are equal iff their segment lists
/// are equal, regardless of how they were constructed.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ExecPath(PathBuf);

impl ExecPath {
    /// Builds an `ExecPath` from any path-like value, normalizing to `/`
    /// separators so that paths built on different platforms compare equal.
    pub fn new(path: impl AsRef<Path>) -> Self {
        use path_slash::PathExt;
        Self(PathBuf::from(path.as_ref().to_slash_lossy().as_ref()))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn is_absolute(&self) -> bool {
        self.0.is_absolute()
    }

    pub fn segment_count(&self) -> usize {
        self.0.components().count()
    }

    /// The parent path, or the empty path if this path has no parent.
    pub fn parent(&self) -> ExecPath {
        match self.0.parent() {
            Some(p) => ExecPath::new(p),
            None => ExecPath::new(""),
        }
    }

    /// The final path segment, e.g. `include` in `third_party/include`.
    pub fn base_name(&self) -> &str {
        self.0.file_name().and_then(|s| s.to_str()).unwrap_or("")
    }

    /// Returns `true` iff `prefix` is a segment-aligned prefix of `self`,
    /// i.e. `a/b` is a prefix of `a/b/c` but not of `a/bc`.
    pub fn starts_with(&self, prefix: &ExecPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Strips `root` from this path, returning the path unchanged if it is
    /// not actually rooted there.
    pub fn relative_to(&self, root: &ExecPath) -> ExecPath {
        match self.0.strip_prefix(&root.0) {
            Ok(rel) => ExecPath::new(rel),
            Err(_) => self.clone(),
        }
    }

    pub fn join(&self, rest: impl AsRef<Path>) -> ExecPath {
        ExecPath::new(self.0.join(rest))
    }
}

impl fmt::Debug for ExecPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExecPath({})", self.0.display())
    }
}

impl fmt::Display for ExecPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for ExecPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl From<&str> for ExecPath {
    fn from(s: &str) -> Self {
        ExecPath::new(s)
    }
}

impl From<PathBuf> for ExecPath {
    fn from(p: PathBuf) -> Self {
        ExecPath::new(p)
    }
}

impl From<&Path> for ExecPath {
    fn from(p: &Path) -> Self {
        ExecPath::new(p)
    }
}

/// Returns `true` iff `path` is segment-aligned-prefixed by any of `prefixes`.
pub fn starts_with_any(path: &ExecPath, prefixes: &[ExecPath]) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix))
}

/// Canonicalizes `path`, platform-agnostic: on Windows this avoids the
/// `\\?\` UNC prefix `std::fs::canonicalize` would otherwise produce.
///
/// Non-existent paths are returned unchanged rather than erroring, matching
/// `utils::canonicalized` — the core deals with exec-root relative paths
/// that may not exist on the machine running this code (e.g. in unit
/// tests).
pub fn canonicalized(path: impl Into<PathBuf>) -> PathBuf {
    let path = path.into();
    dunce::canonicalize(&path).unwrap_or(path)
}
