//! Enforces a compile action's declared-inclusion policy against its
//! discovered inputs.
//!
//! The validator never mutates an action; it only reads the live input set
//! the updater already published and reports what it finds. Grounded on the
//! two-speed diagnostics style (hard failures vs collected warnings emitted
//! through a sink) seen in `compile::project`'s output processing.

use crate::{
    artifact::{expand_middlemen, Artifact, ArtifactSet},
    boundary::{EventHandler, Level, MiddlemanExpander},
    config::Configuration,
    context::CompilationContext,
    error::{CompileError, Result},
    paths::{starts_with_any, ExecPath},
};
use std::collections::BTreeSet;

/// Whether a directory contains a package-boundary marker file (a `BUILD`
/// file, in this crate's domain), consulted by the sub-package fallback in
/// [`is_declared_in`].
///
/// Abstracted behind a trait so the walk can be exercised in tests without
/// touching a real filesystem; production callers back it with actual
/// directory probes under the execution root.
pub trait PackageBoundaryProbe: Send + Sync {
    fn has_build_marker(&self, root_relative_dir: &ExecPath) -> bool;
}

/// A [`PackageBoundaryProbe`] that checks for a literal `BUILD` file under
/// `exec_root.join(root_relative_dir)`.
pub struct FilesystemPackageBoundaryProbe {
    pub exec_root: std::path::PathBuf,
}

impl PackageBoundaryProbe for FilesystemPackageBoundaryProbe {
    fn has_build_marker(&self, root_relative_dir: &ExecPath) -> bool {
        self.exec_root.join(root_relative_dir.as_path()).join("BUILD").is_file()
    }
}

/// The collected outcome of a validation pass: any undeclared inclusions
/// found, ready to be turned into a fatal error.
#[derive(Clone, Debug, Default)]
pub struct IncludeProblems {
    offending: Vec<String>,
}

impl IncludeProblems {
    pub fn has_problems(&self) -> bool {
        !self.offending.is_empty()
    }

    pub fn message(&self) -> String {
        self.offending.join("\n")
    }

    pub fn assert_problem_free(&self, source: &ExecPath) -> Result<()> {
        if self.has_problems() {
            Err(CompileError::UndeclaredInclusion {
                source: source.as_path().to_path_buf(),
                offending: self.offending.clone(),
            })
        } else {
            Ok(())
        }
    }
}

/// Returns `true` iff `input` is covered by `dirs`/`srcs` under the
/// inclusion-policy rules: an exact match in `srcs`, a derived artifact
/// whose root is an `include` root sitting directly under a declared dir or
/// wildcard, or — the subtle fallback — a source that lives below a
/// declared dir in a subdirectory that never crosses a sub-package (`BUILD`)
/// boundary.
pub fn is_declared_in(
    input: &Artifact,
    dirs: &BTreeSet<ExecPath>,
    srcs: &BTreeSet<Artifact>,
    probe: &dyn PackageBoundaryProbe,
) -> bool {
    if srcs.contains(input) {
        return true;
    }
    if !input.is_source_artifact() && input.root().exec_path_prefix.base_name() != "include" {
        return false;
    }

    let d = input.root_relative_path().parent();
    if d.segment_count() == 0 || dirs.contains(&d) {
        return true;
    }
    if dirs.iter().any(|w| w.base_name() == "**" && d.starts_with(&w.parent())) {
        return true;
    }

    let mut cur = d;
    loop {
        if probe.has_build_marker(&cur) {
            return false;
        }
        if dirs.contains(&cur) {
            return true;
        }
        if cur.segment_count() == 0 {
            return false;
        }
        cur = cur.parent();
    }
}

/// Parameters a single validation pass needs; bundled for readability at
/// call sites rather than threaded as a long parameter list.
pub struct ValidationRequest<'a> {
    pub live_inputs: &'a ArtifactSet,
    pub mandatory_inputs: &'a ArtifactSet,
    pub optional_inputs: &'a ArtifactSet,
    pub context: &'a CompilationContext,
    pub config: &'a Configuration,
    pub extra_system_include_prefixes: &'a [ExecPath],
    pub middleman_expander: &'a dyn MiddlemanExpander,
    pub event_handler: &'a dyn EventHandler,
    pub probe: &'a dyn PackageBoundaryProbe,
    pub inputs_known: bool,
    pub source_label: &'a str,
}

/// Runs the validation pass described by `req`, emitting warnings through
/// its event handler as a side effect and returning any hard problems found.
#[tracing::instrument(level = "debug", skip_all, fields(label = req.source_label))]
pub fn validate_inclusions(req: &ValidationRequest<'_>) -> IncludeProblems {
    if !req.config.should_scan_includes() || !req.inputs_known {
        return IncludeProblems::default();
    }

    let mut allowed = ArtifactSet::new();
    expand_middlemen(req.mandatory_inputs, req.middleman_expander, &mut allowed);
    allowed.extend(req.optional_inputs.iter().cloned());

    let mut ignore_dirs: Vec<ExecPath> = req.config.built_in_include_directories().to_vec();
    ignore_dirs.extend(req.extra_system_include_prefixes.iter().cloned());
    ignore_dirs.extend(req.context.system_include_dirs().iter().cloned());

    let empty_srcs = BTreeSet::new();
    let mut problems = IncludeProblems::default();

    for input in req.live_inputs {
        if req.context.compilation_prerequisites().contains(input) || allowed.contains(input) {
            continue;
        }
        if starts_with_any(&input.exec_path(), &ignore_dirs) {
            continue;
        }

        if is_declared_in(input, req.context.declared_include_dirs(), req.context.declared_include_srcs(), req.probe)
        {
            crate::debug::print_validation_debug(
                req.config.verbose_validation_debug(),
                req.source_label,
                &format!("{} OK (strict declared dir/src)", input.exec_path()),
            );
            continue;
        }
        if is_declared_in(input, req.context.declared_include_warn_dirs(), &empty_srcs, req.probe) {
            tracing::warn!(input = %input.exec_path(), "undeclared inclusion permitted under warn dir");
            crate::debug::print_validation_debug(
                req.config.verbose_validation_debug(),
                req.source_label,
                &format!("{} OK (warn dir only)", input.exec_path()),
            );
            req.event_handler.handle(
                Level::Warning,
                None,
                &format!("undeclared inclusion of {} permitted by a warn dir", input.exec_path()),
                Some(req.source_label),
            );
            continue;
        }
        crate::debug::print_validation_debug(
            req.config.verbose_validation_debug(),
            req.source_label,
            &format!("{} REJECTED", input.exec_path()),
        );
        problems.offending.push(input.exec_path().to_string());
    }

    problems
}
