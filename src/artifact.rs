//! The artifact model: files the build graph tracks, either checked in
//! (source) or produced by some other action (derived), plus the
//! middleman variant used to compact dependency edges.
//!
//! Grounded on the artifact/root split (`ArtifactOutput`,
//! `ProjectPathsConfig::root`/`artifacts` in `cache.rs`): a root plus a
//! root-relative path, never a single opaque filesystem path, so that
//! moving the whole build to a different exec root never changes an
//! artifact's identity.

use crate::paths::ExecPath;
use std::{collections::BTreeSet, fmt};

/// Whether a root hosts checked-in sources or action outputs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RootKind {
    Source,
    Derived,
}

/// A root an artifact's `root_relative_path` is resolved against.
///
/// Source roots contribute no prefix to the exec path (a source file's exec
/// path is simply its root-relative path); derived roots contribute the
/// configuration-specific output prefix (e.g. `bazel-out/k8-opt/bin`).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ArtifactRoot {
    pub kind: RootKind,
    pub exec_path_prefix: ExecPath,
}

impl ArtifactRoot {
    pub fn source() -> Self {
        Self { kind: RootKind::Source, exec_path_prefix: ExecPath::new("") }
    }

    pub fn derived(exec_path_prefix: impl Into<ExecPath>) -> Self {
        Self { kind: RootKind::Derived, exec_path_prefix: exec_path_prefix.into() }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
enum ArtifactVariant {
    Normal,
    /// An aggregator that expands into a concrete set of real artifacts on
    /// demand; see [`crate::boundary::MiddlemanExpander`].
    Middleman,
}

/// A file the build system tracks.
///
/// Equality, ordering and hashing are all defined purely in terms of
/// [`Artifact::exec_path`] — per the data model's invariant, two artifacts
/// with equal exec paths are the same artifact regardless of how they were
/// constructed.
#[derive(Clone)]
pub struct Artifact {
    root: ArtifactRoot,
    root_relative_path: ExecPath,
    variant: ArtifactVariant,
}

impl Artifact {
    pub fn source(root_relative_path: impl Into<ExecPath>) -> Self {
        Self {
            root: ArtifactRoot::source(),
            root_relative_path: root_relative_path.into(),
            variant: ArtifactVariant::Normal,
        }
    }

    pub fn derived(root: ArtifactRoot, root_relative_path: impl Into<ExecPath>) -> Self {
        debug_assert_eq!(root.kind, RootKind::Derived);
        Self { root, root_relative_path: root_relative_path.into(), variant: ArtifactVariant::Normal }
    }

    pub fn middleman(root: ArtifactRoot, root_relative_path: impl Into<ExecPath>) -> Self {
        Self { root, root_relative_path: root_relative_path.into(), variant: ArtifactVariant::Middleman }
    }

    pub fn is_source_artifact(&self) -> bool {
        self.root.kind == RootKind::Source
    }

    pub fn is_middleman_artifact(&self) -> bool {
        self.variant == ArtifactVariant::Middleman
    }

    pub fn root_relative_path(&self) -> &ExecPath {
        &self.root_relative_path
    }

    pub fn root(&self) -> &ArtifactRoot {
        &self.root
    }

    /// The path identifying this artifact within the action's execution
    /// root; the only field that matters for equality.
    pub fn exec_path(&self) -> ExecPath {
        if self.root.exec_path_prefix.segment_count() == 0 {
            self.root_relative_path.clone()
        } else {
            self.root.exec_path_prefix.join(self.root_relative_path.as_path())
        }
    }

    /// Alias for [`Artifact::exec_path`], matching the `path` accessor named
    /// in the component design.
    pub fn path(&self) -> ExecPath {
        self.exec_path()
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("exec_path", &self.exec_path())
            .field("source", &self.is_source_artifact())
            .field("middleman", &self.is_middleman_artifact())
            .finish()
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.exec_path() == other.exec_path()
    }
}
impl Eq for Artifact {}

impl PartialOrd for Artifact {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Artifact {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.exec_path().as_path().cmp(other.exec_path().as_path())
    }
}
impl std::hash::Hash for Artifact {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.exec_path().as_path().hash(state)
    }
}

/// An ordered collection of artifacts, keyed by exec path.
pub type ArtifactSet = BTreeSet<Artifact>;

/// The `.d` file an action's executor is asked to produce: either a real
/// artifact written to disk, or a virtual exec-path whose contents only ever
/// exist as an in-memory [`crate::boundary::Reply`].
///
/// Modeled as an enum rather than two optional fields: exactly one of the two
/// shapes applies to any given action, never both and never neither.
#[derive(Clone, Debug)]
pub enum DotdFile {
    OnDisk(Artifact),
    Virtual(ExecPath),
}

impl DotdFile {
    /// The exec-path this dotd file would be referenced by on the command
    /// line, regardless of which variant it is.
    pub fn exec_path(&self) -> ExecPath {
        match self {
            DotdFile::OnDisk(artifact) => artifact.exec_path(),
            DotdFile::Virtual(path) => path.clone(),
        }
    }

    pub fn as_artifact(&self) -> Option<&Artifact> {
        match self {
            DotdFile::OnDisk(artifact) => Some(artifact),
            DotdFile::Virtual(_) => None,
        }
    }
}

/// Expands every middleman artifact in `artifacts` into `out`, copying
/// non-middleman artifacts through unchanged. Non-recursive: a middleman
/// that (erroneously) expands to another middleman is not expanded further.
pub fn expand_middlemen(
    artifacts: &ArtifactSet,
    expander: &dyn crate::boundary::MiddlemanExpander,
    out: &mut ArtifactSet,
) {
    for artifact in artifacts {
        if artifact.is_middleman_artifact() {
            expander.expand(artifact, out);
        } else {
            out.insert(artifact.clone());
        }
    }
}
