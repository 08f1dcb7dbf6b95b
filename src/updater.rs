//! Rebuilds a compile action's live input set from whatever dependency
//! information its executor produced.
//!
//! Grounded on the post-compile artifact bookkeeping in `cache.rs`
//! (`read_cache`/`insert_artifacts`): discovery and validation are two
//! distinct passes over the same data, and discovery never itself decides
//! whether what it found is *allowed* — that is the validator's job (see
//! [`crate::validate`]).

use crate::{
    artifact::{Artifact, ArtifactSet, DotdFile},
    boundary::{ArtifactResolver, IncludeResolver, Reply},
    depset::DependencySet,
    error::{CompileError, Result},
    paths::{starts_with_any, ExecPath},
};
use std::collections::BTreeMap;

/// A compile action's input set: the static inputs fixed at construction
/// plus whatever the updater has discovered since.
#[derive(Clone, Debug)]
pub struct InputSet {
    mandatory: ArtifactSet,
    optional: ArtifactSet,
    live: ArtifactSet,
    inputs_known: bool,
}

impl InputSet {
    /// Builds the initial input set at action construction time. `live`
    /// starts as the union of mandatory inputs, optional inputs and
    /// compilation prerequisites; `inputs_known` is `true` from the start
    /// only when include scanning is disabled for this toolchain.
    pub fn new(
        mandatory: ArtifactSet,
        optional: ArtifactSet,
        compilation_prerequisites: &ArtifactSet,
        should_scan_includes: bool,
    ) -> Self {
        let mut live = ArtifactSet::new();
        live.extend(mandatory.iter().cloned());
        live.extend(optional.iter().cloned());
        live.extend(compilation_prerequisites.iter().cloned());
        Self { mandatory, optional, live, inputs_known: !should_scan_includes }
    }

    pub fn mandatory(&self) -> &ArtifactSet {
        &self.mandatory
    }

    pub fn optional(&self) -> &ArtifactSet {
        &self.optional
    }

    pub fn live(&self) -> &ArtifactSet {
        &self.live
    }

    pub fn inputs_known(&self) -> bool {
        self.inputs_known
    }
}

/// Parameters a discovery pass needs.
pub struct UpdateRequest<'a> {
    pub exec_root: &'a ExecPath,
    pub system_include_prefixes: &'a [ExecPath],
    pub artifact_resolver: &'a dyn ArtifactResolver,
    pub include_resolver: &'a dyn IncludeResolver,
    pub reply: Option<&'a Reply>,
    pub dotd: Option<&'a DotdFile>,
    pub compilation_prerequisites: &'a ArtifactSet,
    pub declared_include_srcs: &'a ArtifactSet,
    pub source_artifact: &'a Artifact,
}

/// Rebuilds `current`'s live input set from the action's dependency output.
///
/// Returns the new, fully-known [`InputSet`] on success. On failure the
/// caller should treat the action's execution as failed; `current` is left
/// untouched (the crate's convention is that a `Result::Err` never leaves
/// behind a half-updated value).
#[tracing::instrument(level = "debug", skip_all)]
pub fn update_from_discovery(current: &InputSet, req: &UpdateRequest<'_>) -> Result<InputSet> {
    if !current_needs_scanning(current, req) {
        return Ok(current.clone());
    }

    let deps = match req.reply {
        Some(reply) => DependencySet::parse_bytes(reply.contents())?,
        None => match req.dotd {
            Some(DotdFile::OnDisk(artifact)) => DependencySet::parse_file(artifact.exec_path().as_path())?,
            Some(DotdFile::Virtual(_)) | None => DependencySet::default(),
        },
    };

    let allowed_derived_inputs = build_allowed_derived_inputs(current, req);

    let mut live = ArtifactSet::new();
    live.extend(current.mandatory.iter().cloned());
    live.extend(current.optional.iter().cloned());
    live.extend(req.compilation_prerequisites.iter().cloned());

    let mut offending = Vec::new();

    for dep in deps.iter() {
        let lookup_key = if dep.is_absolute() {
            if starts_with_any(dep, req.system_include_prefixes) {
                continue;
            } else if dep.starts_with(req.exec_root) {
                dep.relative_to(req.exec_root)
            } else {
                offending.push(dep.to_string());
                continue;
            }
        } else {
            dep.clone()
        };

        let resolved = allowed_derived_inputs
            .get(&lookup_key)
            .cloned()
            .or_else(|| req.artifact_resolver.resolve_source_artifact(&lookup_key));

        match resolved {
            Some(artifact) => {
                live.extend(req.include_resolver.auxiliary_artifacts(&artifact));
                live.insert(artifact);
            }
            None => offending.push(lookup_key.to_string()),
        }
    }

    if !offending.is_empty() {
        return Err(CompileError::UndeclaredInclusion {
            source: req.source_artifact.exec_path().as_path().to_path_buf(),
            offending,
        });
    }

    Ok(InputSet { mandatory: current.mandatory.clone(), optional: current.optional.clone(), live, inputs_known: true })
}

fn current_needs_scanning(current: &InputSet, _req: &UpdateRequest<'_>) -> bool {
    // Include scanning being disabled is encoded at construction time via
    // `InputSet::new`'s `should_scan_includes` flag: `inputs_known` is
    // already `true` and there is nothing for discovery to do.
    !current.inputs_known
}

fn build_allowed_derived_inputs(current: &InputSet, req: &UpdateRequest<'_>) -> BTreeMap<ExecPath, Artifact> {
    let mut map = BTreeMap::new();
    let derived_entries = current
        .mandatory
        .iter()
        .filter(|a| !a.is_source_artifact())
        .chain(req.declared_include_srcs.iter())
        .chain(req.compilation_prerequisites.iter())
        .chain(std::iter::once(req.source_artifact).filter(|a| !a.is_source_artifact()));
    for artifact in derived_entries {
        map.insert(artifact.exec_path(), artifact.clone());
    }
    map
}

/// Rebuilds an input set from exec-paths previously persisted by a build
/// cache. Unlike [`update_from_discovery`], unresolved paths are silently
/// dropped rather than treated as errors — deliberately: a missing
/// resolution here means the cache is stale, and the next real execution's
/// fingerprint comparison is what decides whether to recompile, not this
/// restore path. The resulting set may therefore violate the usual
/// "live ⊇ mandatory ∪ prerequisites ∪ optional" invariant until the action
/// actually re-executes.
pub fn update_from_cache(
    current: &InputSet,
    persisted_exec_paths: &[ExecPath],
    artifact_resolver: &dyn ArtifactResolver,
) -> InputSet {
    let mut live = ArtifactSet::new();
    for path in persisted_exec_paths {
        if let Some(artifact) = artifact_resolver.resolve_source_artifact(path) {
            live.insert(artifact);
        }
    }
    InputSet { mandatory: current.mandatory.clone(), optional: current.optional.clone(), live, inputs_known: true }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactRoot;

    struct ResolveAnything;
    impl ArtifactResolver for ResolveAnything {
        fn resolve_source_artifact(&self, exec_path: &ExecPath) -> Option<Artifact> {
            Some(Artifact::source(exec_path.as_path()))
        }
    }

    struct ResolveNothing;
    impl ArtifactResolver for ResolveNothing {
        fn resolve_source_artifact(&self, _exec_path: &ExecPath) -> Option<Artifact> {
            None
        }
    }

    struct NoAuxiliaries;
    impl IncludeResolver for NoAuxiliaries {}

    #[test]
    fn discovery_no_op_when_inputs_already_known() {
        let mandatory = ArtifactSet::from([Artifact::source("pkg/x.cc")]);
        let input_set = InputSet::new(mandatory, ArtifactSet::new(), &ArtifactSet::new(), false);
        assert!(input_set.inputs_known());

        let req = UpdateRequest {
            exec_root: &ExecPath::new("/exec/root"),
            system_include_prefixes: &[],
            artifact_resolver: &ResolveAnything,
            include_resolver: &NoAuxiliaries,
            reply: None,
            dotd: None,
            compilation_prerequisites: &ArtifactSet::new(),
            declared_include_srcs: &ArtifactSet::new(),
            source_artifact: &Artifact::source("pkg/x.cc"),
        };
        let updated = update_from_discovery(&input_set, &req).unwrap();
        assert_eq!(updated.live().len(), input_set.live().len());
    }

    #[test]
    fn resolves_dependencies_from_reply() {
        let mandatory = ArtifactSet::from([Artifact::source("pkg/x.cc")]);
        let input_set = InputSet::new(mandatory, ArtifactSet::new(), &ArtifactSet::new(), true);
        assert!(!input_set.inputs_known());

        let reply = Reply::new(b"x.o: pkg/x.cc pkg/x.h\n".to_vec());
        let req = UpdateRequest {
            exec_root: &ExecPath::new("/exec/root"),
            system_include_prefixes: &[],
            artifact_resolver: &ResolveAnything,
            include_resolver: &NoAuxiliaries,
            reply: Some(&reply),
            dotd: None,
            compilation_prerequisites: &ArtifactSet::new(),
            declared_include_srcs: &ArtifactSet::new(),
            source_artifact: &Artifact::source("pkg/x.cc"),
        };
        let updated = update_from_discovery(&input_set, &req).unwrap();
        assert!(updated.inputs_known());
        assert!(updated.live().contains(&Artifact::source("pkg/x.h")));
    }

    #[test]
    fn absolute_path_under_exec_root_is_normalized_not_an_error() {
        let mandatory = ArtifactSet::from([Artifact::source("pkg/x.cc")]);
        let input_set = InputSet::new(mandatory, ArtifactSet::new(), &ArtifactSet::new(), true);
        let reply = Reply::new(b"x.o: /exec/root/pkg/x.h\n".to_vec());
        let req = UpdateRequest {
            exec_root: &ExecPath::new("/exec/root"),
            system_include_prefixes: &[],
            artifact_resolver: &ResolveAnything,
            include_resolver: &NoAuxiliaries,
            reply: Some(&reply),
            dotd: None,
            compilation_prerequisites: &ArtifactSet::new(),
            declared_include_srcs: &ArtifactSet::new(),
            source_artifact: &Artifact::source("pkg/x.cc"),
        };
        let updated = update_from_discovery(&input_set, &req).unwrap();
        assert!(updated.live().contains(&Artifact::source("pkg/x.h")));
    }

    #[test]
    fn absolute_path_outside_exec_root_and_system_prefixes_is_an_error() {
        let mandatory = ArtifactSet::from([Artifact::source("pkg/x.cc")]);
        let input_set = InputSet::new(mandatory, ArtifactSet::new(), &ArtifactSet::new(), true);
        let reply = Reply::new(b"x.o: /opt/elsewhere/x.h\n".to_vec());
        let req = UpdateRequest {
            exec_root: &ExecPath::new("/exec/root"),
            system_include_prefixes: &[],
            artifact_resolver: &ResolveAnything,
            include_resolver: &NoAuxiliaries,
            reply: Some(&reply),
            dotd: None,
            compilation_prerequisites: &ArtifactSet::new(),
            declared_include_srcs: &ArtifactSet::new(),
            source_artifact: &Artifact::source("pkg/x.cc"),
        };
        let err = update_from_discovery(&input_set, &req).unwrap_err();
        assert!(matches!(err, CompileError::UndeclaredInclusion { .. }));
    }

    #[test]
    fn unresolvable_dependency_is_an_error() {
        let mandatory = ArtifactSet::from([Artifact::source("pkg/x.cc")]);
        let input_set = InputSet::new(mandatory, ArtifactSet::new(), &ArtifactSet::new(), true);
        let reply = Reply::new(b"x.o: pkg/missing.h\n".to_vec());
        let req = UpdateRequest {
            exec_root: &ExecPath::new("/exec/root"),
            system_include_prefixes: &[],
            artifact_resolver: &ResolveNothing,
            include_resolver: &NoAuxiliaries,
            reply: Some(&reply),
            dotd: None,
            compilation_prerequisites: &ArtifactSet::new(),
            declared_include_srcs: &ArtifactSet::new(),
            source_artifact: &Artifact::source("pkg/x.cc"),
        };
        let err = update_from_discovery(&input_set, &req).unwrap_err();
        assert!(matches!(err, CompileError::UndeclaredInclusion { .. }));
    }

    #[test]
    fn cache_restore_silently_drops_unresolvable_paths() {
        let mandatory = ArtifactSet::from([Artifact::source("pkg/x.cc")]);
        let input_set = InputSet::new(mandatory, ArtifactSet::new(), &ArtifactSet::new(), true);
        let restored =
            update_from_cache(&input_set, &[ExecPath::new("pkg/gone.h")], &ResolveNothing);
        assert!(restored.inputs_known());
        assert!(restored.live().is_empty());
    }

    #[test]
    fn derived_source_artifact_in_mandatory_inputs_is_reusable_without_reresolving() {
        let derived = Artifact::derived(ArtifactRoot::derived("bin"), "pkg/gen.h");
        let mandatory = ArtifactSet::from([Artifact::source("pkg/x.cc"), derived.clone()]);
        let input_set = InputSet::new(mandatory, ArtifactSet::new(), &ArtifactSet::new(), true);
        let reply = Reply::new(format!("x.o: {}\n", derived.exec_path()).into_bytes());
        let req = UpdateRequest {
            exec_root: &ExecPath::new("/exec/root"),
            system_include_prefixes: &[],
            artifact_resolver: &ResolveNothing,
            include_resolver: &NoAuxiliaries,
            reply: Some(&reply),
            dotd: None,
            compilation_prerequisites: &ArtifactSet::new(),
            declared_include_srcs: &ArtifactSet::new(),
            source_artifact: &Artifact::source("pkg/x.cc"),
        };
        let updated = update_from_discovery(&input_set, &req).unwrap();
        assert!(updated.live().contains(&derived));
    }
}
