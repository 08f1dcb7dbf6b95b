//! The narrow interfaces this crate calls out through.
//!
//! None of these are implemented here — the action graph, the
//! remote-execution transport and the on-disk artifact cache that would back
//! a real build system live outside this crate entirely. Modeled as
//! `Send + Sync` trait objects, matching the `Compiler`/`ArtifactOutput`
//! trait-object-friendly boundaries in `compilers/mod.rs`.

use crate::{
    action::CompileAction,
    artifact::{Artifact, ArtifactSet},
    error::Result,
    paths::ExecPath,
};

/// Severity of an event emitted through [`EventHandler`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// An optional source location attached to an emitted event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Location {
    pub file: String,
    pub line: Option<u32>,
}

/// Consumes `(kind, location, message, label)` event tuples.
///
/// The only level this crate ever emits is [`Level::Warning`], for soft
/// inclusion-policy violations; the enum carries the others so a single sink
/// can also be reused by callers for their own diagnostics.
pub trait EventHandler: Send + Sync {
    fn handle(&self, level: Level, location: Option<&Location>, message: &str, label: Option<&str>);
}

/// Resolves a dependency's exec path, discovered from a `.d` file, to the
/// concrete source [`Artifact`] it names.
pub trait ArtifactResolver: Send + Sync {
    fn resolve_source_artifact(&self, exec_path: &ExecPath) -> Option<Artifact>;
}

/// Resolves a discovered dependency artifact to whatever auxiliary artifacts
/// ride along with it (e.g. a precompiled module paired with a header).
///
/// The default implementation adds nothing; most resolved artifacts have no
/// auxiliaries.
pub trait IncludeResolver: Send + Sync {
    fn auxiliary_artifacts(&self, artifact: &Artifact) -> Vec<Artifact> {
        let _ = artifact;
        Vec::new()
    }
}

/// An [`IncludeResolver`] that never adds auxiliary artifacts, for
/// toolchains that have no such concept.
pub struct NoopIncludeResolver;
impl IncludeResolver for NoopIncludeResolver {}

/// Expands a middleman artifact into the concrete artifacts it aggregates.
///
/// Implementations must be non-recursive: a single call adds exactly the
/// artifacts this middleman directly stands in for.
pub trait MiddlemanExpander: Send + Sync {
    fn expand(&self, artifact: &Artifact, out: &mut ArtifactSet);
}

/// In-memory reply from the executor, standing in for a `.d` file that was
/// never written to disk.
#[derive(Clone, Debug, Default)]
pub struct Reply {
    contents: Vec<u8>,
}

impl Reply {
    pub fn new(contents: Vec<u8>) -> Self {
        Self { contents }
    }

    /// The Latin-1 dotd payload this reply carries.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }
}

/// Estimated resources a local execution of an action would consume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResourceSet {
    pub memory_mb: f64,
    pub cpu: f64,
    pub io: f64,
}

impl ResourceSet {
    /// The fixed local-execution estimate: roughly 200 MB and half a core,
    /// no dedicated I/O budget.
    pub const LOCAL: ResourceSet = ResourceSet { memory_mb: 200.0, cpu: 0.5, io: 0.0 };
}

/// Executes a compile action (or reports that none is needed) and reports
/// back whatever the backing strategy knows about the action's true inputs.
pub trait Executor: Send + Sync {
    /// Runs the action, returning an in-memory dotd reply if the strategy
    /// produced one instead of writing a `.d` file to disk.
    fn exec_with_reply(
        &self,
        action: &CompileAction,
        ctx: &dyn ActionExecutionContext,
    ) -> Result<Option<Reply>>;

    /// A short human-readable description of where this executor runs
    /// actions (`"local"`, `"remote"`, ...), used only for diagnostics.
    fn strategy_locality(&self) -> &str;

    /// Whether this executor wants the core to discover true inputs from the
    /// compiler's own dependency output, or whether it already knows the
    /// full input set up front (e.g. a sandboxed strategy with its own
    /// scanner).
    fn needs_include_scanning(&self) -> bool;

    fn estimate_resource_consumption(&self, action: &CompileAction) -> ResourceSet;

    /// Debug-only: the include files this executor's own strategy believes
    /// it scanned for `action`, for cross-checking against the updater's
    /// result.
    fn scanned_include_files(&self, action: &CompileAction, ctx: &dyn ActionExecutionContext) -> Vec<String>;
}

/// Bundles the collaborators an executing action needs: the executor
/// itself, the artifact resolver, the middleman expander, the event sink
/// and the exec root all actions share.
pub trait ActionExecutionContext: Send + Sync {
    fn executor(&self) -> &dyn Executor;
    fn artifact_resolver(&self) -> &dyn ArtifactResolver;
    fn middleman_expander(&self) -> &dyn MiddlemanExpander;
    fn event_handler(&self) -> &dyn EventHandler;
    fn exec_root(&self) -> &ExecPath;
}
