//! Crate-wide error type.
//!
//! Everything below a soft inclusion warning is fatal to the action that
//! raised it. The action itself never retries; retry policy belongs to the
//! surrounding scheduler.

use std::{fmt, path::PathBuf};

/// Convenience alias used throughout the crate.
pub type Result<T, E = CompileError> = std::result::Result<T, E>;

/// An [`std::io::Error`] annotated with the path that caused it.
#[derive(Debug)]
pub struct IoError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

impl IoError {
    pub fn new(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), source }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.source)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error("failed to parse dependency file {path}: {message}")]
    DependencyParse { path: PathBuf, message: String },

    #[error(
        "undeclared inclusion(s) in {source}: the following files are not among the declared \
         headers of this rule:\n{}", offending.iter().map(|p| format!("  {p}")).collect::<Vec<_>>().join("\n")
    )]
    UndeclaredInclusion { source: PathBuf, offending: Vec<String> },

    #[error("executor failed while compiling {source} ({label}): {message}")]
    Executor { source: PathBuf, label: String, message: String },

    #[error("failed to materialize output {0}")]
    OutputMaterialization(PathBuf),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("action execution was interrupted")]
    Interrupted,

    #[error("{0}")]
    Msg(String),
}

impl CompileError {
    pub(crate) fn msg(msg: impl fmt::Display) -> Self {
        CompileError::Msg(msg.to_string())
    }

    pub(crate) fn io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        CompileError::Io(IoError::new(err, path))
    }
}
