//! Parses a `.d` file: the Make-style dependency list a C/C++ preprocessor
//! emits via `-MD -MF`.
//!
//! Accepts `TARGET: DEP1 DEP2 \\\n DEP3 …`, tolerates multiple rules in one
//! file (their dependency lists are concatenated, target names are
//! discarded), and treats a backslash immediately before a newline as a
//! continuation. Grounded on the hand-rolled, regex-free parsers
//! (`resolver/parse.rs`'s `capture_imports`, `utils::source_name`) used for
//! "pull a list of paths out of a text blob" — here plain byte/char
//! scanning is a better fit than a regex because the grammar is a single
//! flat token stream, not nested syntax.

use crate::{
    error::{CompileError, Result},
    paths::ExecPath,
};
use std::path::Path;

/// An ordered sequence of dependency exec-paths parsed from a `.d` file.
///
/// Duplicates are preserved in first-seen order; the parser performs no
/// deduplication of its own.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DependencySet(Vec<ExecPath>);

impl DependencySet {
    pub fn paths(&self) -> &[ExecPath] {
        &self.0
    }

    pub fn into_paths(self) -> Vec<ExecPath> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExecPath> {
        self.0.iter()
    }

    /// Parses a dotd payload held in memory (e.g. an executor's in-memory
    /// reply), interpreted as Latin-1.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self> {
        // Latin-1's code points map 1:1 onto the first 256 Unicode scalar
        // values, so this is lossless for any byte sequence.
        let text: String = bytes.iter().map(|&b| b as char).collect();
        Self::parse_str(&text)
    }

    /// Parses a dotd file from disk.
    #[tracing::instrument(level = "trace", skip_all, fields(path = %path.as_ref().display()))]
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| CompileError::io(e, path))?;
        Self::parse_bytes(&bytes).map_err(|e| match e {
            CompileError::DependencyParse { message, .. } => {
                CompileError::DependencyParse { path: path.to_path_buf(), message }
            }
            other => other,
        })
    }

    fn parse_str(text: &str) -> Result<Self> {
        // Backslash-newline is a line continuation: join it into the
        // logical line it interrupts before splitting on remaining
        // newlines.
        let joined = text.replace("\\\r\n", " ").replace("\\\n", " ");

        let mut deps = Vec::new();
        for line in joined.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let Some(colon) = line.find(':') else {
                return Err(CompileError::DependencyParse {
                    path: Default::default(),
                    message: format!("expected `target: deps` rule, got: {line:?}"),
                });
            };
            tokenize(&line[colon + 1..], &mut deps);
        }

        Ok(Self(deps.into_iter().map(ExecPath::new).collect()))
    }
}

/// Splits `deps` on whitespace into path tokens, unescaping `\ ` to a
/// literal space within a token rather than treating it as a separator.
fn tokenize(deps: &str, out: &mut Vec<String>) {
    let mut current = String::new();
    let mut chars = deps.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&' ') {
            current.push(' ');
            chars.next();
            continue;
        }
        if c.is_whitespace() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(c);
    }
    if !current.is_empty() {
        out.push(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_simple_rule_with_continuation() {
        let set = DependencySet::parse_bytes(b"t: a b \\\n c\n").unwrap();
        assert_eq!(
            set.into_paths(),
            vec![ExecPath::new("a"), ExecPath::new("b"), ExecPath::new("c")]
        );
    }

    #[test]
    fn concatenates_multiple_rules() {
        let set = DependencySet::parse_bytes(b"t1: a b\nt2: c d\n").unwrap();
        assert_eq!(
            set.into_paths(),
            vec![
                ExecPath::new("a"),
                ExecPath::new("b"),
                ExecPath::new("c"),
                ExecPath::new("d")
            ]
        );
    }

    #[test]
    fn unescapes_backslash_space_within_a_path() {
        let set = DependencySet::parse_bytes(b"t: foo\\ bar.h baz.h\n").unwrap();
        assert_eq!(set.into_paths(), vec![ExecPath::new("foo bar.h"), ExecPath::new("baz.h")]);
    }

    #[test]
    fn preserves_duplicates_in_first_seen_order() {
        let set = DependencySet::parse_bytes(b"t: a a b\n").unwrap();
        assert_eq!(
            set.into_paths(),
            vec![ExecPath::new("a"), ExecPath::new("a"), ExecPath::new("b")]
        );
    }

    #[test]
    fn rejects_a_line_without_a_colon() {
        let err = DependencySet::parse_bytes(b"not a rule at all\n").unwrap_err();
        assert!(matches!(err, CompileError::DependencyParse { .. }));
    }
}
