//! The compilation context: the immutable bundle of include-path and
//! declared-header information that both the command-line assembler and the
//! inclusion validator read from.
//!
//! Grounded on `ProjectPathsConfig` (`crates/core/src/utils.rs` /
//! `project.rs`): a plain data struct built once up front and shared by
//! reference across every later stage, rather than threaded as loose
//! function parameters.

use crate::{artifact::Artifact, paths::ExecPath};
use std::collections::BTreeSet;

/// A header whose transitive includes were pre-scanned ("pregrepped") ahead
/// of time, paired with the include spellings found inside it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PregreppedHeader {
    pub header: ExecPath,
    pub includes: Vec<String>,
}

/// Everything the assembler and the validator need to know about where a
/// compilation's headers may legitimately come from.
#[derive(Clone, Debug, Default)]
pub struct CompilationContext {
    quote_include_dirs: Vec<ExecPath>,
    include_dirs: Vec<ExecPath>,
    system_include_dirs: Vec<ExecPath>,
    declared_include_dirs: BTreeSet<ExecPath>,
    declared_include_warn_dirs: BTreeSet<ExecPath>,
    declared_include_srcs: BTreeSet<Artifact>,
    pregrepped_headers: Vec<PregreppedHeader>,
    compilation_prerequisites: BTreeSet<Artifact>,
    defines: Vec<String>,
    module_map: Option<Artifact>,
}

impl CompilationContext {
    pub fn builder() -> CompilationContextBuilder {
        CompilationContextBuilder::default()
    }

    pub fn quote_include_dirs(&self) -> &[ExecPath] {
        &self.quote_include_dirs
    }

    pub fn include_dirs(&self) -> &[ExecPath] {
        &self.include_dirs
    }

    pub fn system_include_dirs(&self) -> &[ExecPath] {
        &self.system_include_dirs
    }

    /// Declared directories a header may live under and still pass strict
    /// inclusion checking. May contain entries whose final segment is the
    /// literal wildcard `**`.
    pub fn declared_include_dirs(&self) -> &BTreeSet<ExecPath> {
        &self.declared_include_dirs
    }

    /// Declared directories that only earn a soft warning rather than a hard
    /// failure.
    pub fn declared_include_warn_dirs(&self) -> &BTreeSet<ExecPath> {
        &self.declared_include_warn_dirs
    }

    /// Individually whitelisted header artifacts, matched exactly rather
    /// than by directory membership.
    pub fn declared_include_srcs(&self) -> &BTreeSet<Artifact> {
        &self.declared_include_srcs
    }

    pub fn pregrepped_headers(&self) -> &[PregreppedHeader] {
        &self.pregrepped_headers
    }

    pub fn compilation_prerequisites(&self) -> &BTreeSet<Artifact> {
        &self.compilation_prerequisites
    }

    pub fn defines(&self) -> &[String] {
        &self.defines
    }

    pub fn module_map(&self) -> Option<&Artifact> {
        self.module_map.as_ref()
    }
}

/// Builds a [`CompilationContext`] from its constituent lists and sets.
#[derive(Default)]
pub struct CompilationContextBuilder {
    inner: CompilationContext,
}

impl CompilationContextBuilder {
    pub fn quote_include_dirs(mut self, dirs: Vec<ExecPath>) -> Self {
        self.inner.quote_include_dirs = dirs;
        self
    }

    pub fn include_dirs(mut self, dirs: Vec<ExecPath>) -> Self {
        self.inner.include_dirs = dirs;
        self
    }

    pub fn system_include_dirs(mut self, dirs: Vec<ExecPath>) -> Self {
        self.inner.system_include_dirs = dirs;
        self
    }

    pub fn declared_include_dirs(mut self, dirs: BTreeSet<ExecPath>) -> Self {
        self.inner.declared_include_dirs = dirs;
        self
    }

    pub fn declared_include_warn_dirs(mut self, dirs: BTreeSet<ExecPath>) -> Self {
        self.inner.declared_include_warn_dirs = dirs;
        self
    }

    pub fn declared_include_srcs(mut self, srcs: BTreeSet<Artifact>) -> Self {
        self.inner.declared_include_srcs = srcs;
        self
    }

    pub fn pregrepped_headers(mut self, headers: Vec<PregreppedHeader>) -> Self {
        self.inner.pregrepped_headers = headers;
        self
    }

    pub fn compilation_prerequisites(mut self, prereqs: BTreeSet<Artifact>) -> Self {
        self.inner.compilation_prerequisites = prereqs;
        self
    }

    pub fn defines(mut self, defines: Vec<String>) -> Self {
        self.inner.defines = defines;
        self
    }

    pub fn module_map(mut self, module_map: Option<Artifact>) -> Self {
        self.inner.module_map = module_map;
        self
    }

    pub fn build(self) -> CompilationContext {
        self.inner
    }
}

/// A declared directory whose last segment is the literal `**` wildcard
/// matches any descendant directory of its parent, not just direct children.
pub const WILDCARD_SEGMENT: &str = "**";
