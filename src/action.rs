//! The compile action itself: the aggregate that ties the command-line
//! assembler, the input-set updater, the inclusion validator and the
//! fingerprint together into one executable unit of work.
//!
//! Grounded on the top-level `Project`/compile-pipeline orchestration in
//! `compile/project.rs`: one struct per unit of work, immutable except for
//! the one piece of state execution legitimately changes (here, the live
//! input set; there, the on-disk artifact cache).

use crate::{
    argv::{self, ArgvRequest, OutputKind, SourceLanguage},
    artifact::{Artifact, ArtifactSet, DotdFile},
    boundary::{ActionExecutionContext, IncludeResolver},
    config::{Configuration, FeatureSet},
    context::CompilationContext,
    error::{CompileError, Result},
    fingerprint::{self, Fingerprint, FingerprintInputs},
    paths::ExecPath,
    updater::{self, InputSet, UpdateRequest},
    validate::{self, PackageBoundaryProbe, ValidationRequest},
};
use std::sync::{Arc, Mutex};

/// Distinguishes behavioral subclasses of the compile action: a tagged
/// variant in place of a subclass hierarchy.
///
/// Part of [`CompileAction::action_class_id`], which in turn feeds the
/// fingerprint — two actions that differ only in behavior must never
/// collide in a cache keyed by fingerprint.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActionBehavior {
    /// A real compile: the executor is expected to actually run the
    /// compiler and report genuine dependency information.
    Normal,
    /// A stand-in compile used for testing/analysis tooling, where the
    /// executor fabricates outputs without running a real compiler.
    Fake,
}

impl ActionBehavior {
    fn class_suffix(self) -> &'static str {
        match self {
            ActionBehavior::Normal => "normal",
            ActionBehavior::Fake => "fake",
        }
    }
}

/// Everything needed to construct a [`CompileAction`], gathered into one
/// struct since the aggregate itself has no sensible smaller decomposition.
pub struct NewCompileAction {
    pub owner_label: String,
    pub source_label: String,
    pub features: FeatureSet,
    pub source: Artifact,
    pub source_language: SourceLanguage,
    pub mandatory_inputs: ArtifactSet,
    pub optional_inputs: ArtifactSet,
    pub output: Artifact,
    pub output_kind: OutputKind,
    pub gcno: Option<Artifact>,
    pub dwo: Option<Artifact>,
    pub dotd: Option<DotdFile>,
    pub config: Arc<Configuration>,
    pub context: Arc<CompilationContext>,
    pub copts: Vec<String>,
    pub plugin_opts: Vec<String>,
    pub copts_filter: Arc<dyn Fn(&str) -> bool + Send + Sync>,
    pub extra_system_include_prefixes: Vec<ExecPath>,
    pub modules_enabled: bool,
    pub fdo_build_stamp: Option<String>,
    pub include_resolver: Arc<dyn IncludeResolver>,
    pub behavior: ActionBehavior,
}

/// A single C/C++ compile action.
///
/// Everything here is immutable after construction except the live input
/// set, which [`CompileAction::execute`] may update exactly once (twice
/// counting the initial population at construction). That mutation is
/// guarded by a single lock, per the concurrency model: the action is
/// thread-compatible, not internally concurrent.
pub struct CompileAction {
    owner_label: String,
    source_label: String,
    features: FeatureSet,
    source: Artifact,
    source_language: SourceLanguage,
    output: Artifact,
    output_kind: OutputKind,
    gcno: Option<Artifact>,
    dwo: Option<Artifact>,
    dotd: Option<DotdFile>,
    config: Arc<Configuration>,
    context: Arc<CompilationContext>,
    copts: Vec<String>,
    plugin_opts: Vec<String>,
    copts_filter: Arc<dyn Fn(&str) -> bool + Send + Sync>,
    extra_system_include_prefixes: Vec<ExecPath>,
    modules_enabled: bool,
    fdo_build_stamp: Option<String>,
    include_resolver: Arc<dyn IncludeResolver>,
    behavior: ActionBehavior,
    inputs: Mutex<InputSet>,
}

impl CompileAction {
    pub fn new(params: NewCompileAction) -> Self {
        debug_assert!(
            params.mandatory_inputs.contains(&params.source),
            "the source artifact must be a member of the mandatory input set"
        );
        let inputs = InputSet::new(
            params.mandatory_inputs,
            params.optional_inputs,
            params.context.compilation_prerequisites(),
            params.config.should_scan_includes(),
        );
        Self {
            owner_label: params.owner_label,
            source_label: params.source_label,
            features: params.features,
            source: params.source,
            source_language: params.source_language,
            output: params.output,
            output_kind: params.output_kind,
            gcno: params.gcno,
            dwo: params.dwo,
            dotd: params.dotd,
            config: params.config,
            context: params.context,
            copts: params.copts,
            plugin_opts: params.plugin_opts,
            copts_filter: params.copts_filter,
            extra_system_include_prefixes: params.extra_system_include_prefixes,
            modules_enabled: params.modules_enabled,
            fdo_build_stamp: params.fdo_build_stamp,
            include_resolver: params.include_resolver,
            behavior: params.behavior,
            inputs: Mutex::new(inputs),
        }
    }

    pub fn owner_label(&self) -> &str {
        &self.owner_label
    }

    pub fn source(&self) -> &Artifact {
        &self.source
    }

    pub fn output(&self) -> &Artifact {
        &self.output
    }

    pub fn dwo(&self) -> Option<&Artifact> {
        self.dwo.as_ref()
    }

    pub fn mandatory_inputs(&self) -> ArtifactSet {
        self.lock_inputs().mandatory().clone()
    }

    pub fn live_inputs(&self) -> ArtifactSet {
        self.lock_inputs().live().clone()
    }

    pub fn inputs_known(&self) -> bool {
        self.lock_inputs().inputs_known()
    }

    /// The fingerprint-distinguishing identity of this action's behavioral
    /// subclass.
    pub fn action_class_id(&self) -> String {
        format!("CppCompile/{}", self.behavior.class_suffix())
    }

    /// Assembles this action's compiler command line.
    pub fn argv(&self) -> Result<Vec<String>> {
        let tool_path = self
            .config
            .tool_path("gcc")
            .ok_or_else(|| CompileError::msg("toolchain configuration has no path for the gcc tool"))?;
        let source_exec_path = self.source.exec_path();
        let output_exec_path = self.output.exec_path();
        let req = ArgvRequest {
            tool_path,
            source_exec_path: &source_exec_path,
            source_label: &self.source_label,
            source_language: self.source_language,
            features: &self.features,
            context: self.context.as_ref(),
            config: self.config.as_ref(),
            copts_filter: &*self.copts_filter,
            plugin_opts: &self.plugin_opts,
            copts: &self.copts,
            fdo_build_stamp: self.fdo_build_stamp.as_deref(),
            dotd: self.dotd.as_ref(),
            modules_enabled: self.modules_enabled,
            output_kind: self.output_kind,
            output_exec_path: &output_exec_path,
            fission_enabled: self.config.use_fission(),
        };
        argv::assemble(&req)
    }

    /// The shell environment the executor should run this action's compiler
    /// invocation under: the toolchain's default environment, plus
    /// `PWD=/proc/self/cwd` when coverage instrumentation is enabled so the
    /// absolute paths the compiler embeds in coverage notes stay hermetic.
    pub fn environment(&self) -> std::collections::BTreeMap<String, String> {
        let mut env = self.config.default_shell_environment().clone();
        if self.config.is_code_coverage_enabled() {
            env.insert("PWD".to_string(), "/proc/self/cwd".to_string());
        }
        env
    }

    /// This action's content-addressed cache key, computed only from fields
    /// frozen before execution — never from the live input set.
    #[tracing::instrument(level = "debug", skip_all, fields(label = %self.owner_label))]
    pub fn compute_key(&self) -> Result<Fingerprint> {
        let argv = self.argv()?;
        let action_class_id = self.action_class_id();
        let inputs = FingerprintInputs {
            action_class_id: &action_class_id,
            argv: &argv,
            declared_include_dirs: self.context.declared_include_dirs(),
            declared_include_warn_dirs: self.context.declared_include_warn_dirs(),
            declared_include_srcs: self.context.declared_include_srcs(),
            extra_system_include_prefixes: &self.extra_system_include_prefixes,
        };
        Ok(fingerprint::compute_key(&inputs))
    }

    fn system_include_prefixes(&self) -> Vec<ExecPath> {
        let mut prefixes = self.config.built_in_include_directories().to_vec();
        prefixes.extend(self.extra_system_include_prefixes.iter().cloned());
        prefixes.extend(self.context.system_include_dirs().iter().cloned());
        prefixes
    }

    fn lock_inputs(&self) -> std::sync::MutexGuard<'_, InputSet> {
        self.inputs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs this action to completion: executes the compiler, makes sure
    /// coverage-note outputs exist, discovers the true input set from the
    /// dependency output and validates it against the declared-inclusion
    /// policy.
    #[tracing::instrument(level = "debug", skip_all, fields(label = %self.owner_label))]
    pub fn execute(&self, ctx: &dyn ActionExecutionContext, probe: &dyn PackageBoundaryProbe) -> Result<()> {
        let reply = ctx.executor().exec_with_reply(self, ctx).map_err(|e| CompileError::Executor {
            source: self.source.exec_path().as_path().to_path_buf(),
            label: self.owner_label.clone(),
            message: e.to_string(),
        })?;

        self.ensure_gcno_materialized(ctx)?;

        let system_include_prefixes = self.system_include_prefixes();
        {
            let current = self.lock_inputs();
            let req = UpdateRequest {
                exec_root: ctx.exec_root(),
                system_include_prefixes: &system_include_prefixes,
                artifact_resolver: ctx.artifact_resolver(),
                include_resolver: &*self.include_resolver,
                reply: reply.as_ref(),
                dotd: self.dotd.as_ref(),
                compilation_prerequisites: self.context.compilation_prerequisites(),
                declared_include_srcs: self.context.declared_include_srcs(),
                source_artifact: &self.source,
            };
            let updated = updater::update_from_discovery(&current, &req)?;
            drop(current);
            *self.inputs.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = updated;
        }
        drop(reply);

        let guard = self.lock_inputs();
        let validation_req = ValidationRequest {
            live_inputs: guard.live(),
            mandatory_inputs: guard.mandatory(),
            optional_inputs: guard.optional(),
            context: self.context.as_ref(),
            config: self.config.as_ref(),
            extra_system_include_prefixes: &self.extra_system_include_prefixes,
            middleman_expander: ctx.middleman_expander(),
            event_handler: ctx.event_handler(),
            probe,
            inputs_known: guard.inputs_known(),
            source_label: &self.source_label,
        };
        let problems = validate::validate_inclusions(&validation_req);
        let source_exec_path = self.source.exec_path();
        drop(guard);
        problems.assert_problem_free(&source_exec_path)
    }

    fn ensure_gcno_materialized(&self, ctx: &dyn ActionExecutionContext) -> Result<()> {
        let Some(gcno) = &self.gcno else { return Ok(()) };
        let abs = std::path::Path::new(ctx.exec_root().as_path()).join(gcno.exec_path().as_path());
        if abs.exists() {
            return Ok(());
        }
        if let Some(parent) = abs.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        std::fs::File::create(&abs).map_err(|_| CompileError::OutputMaterialization(abs))?;
        Ok(())
    }

    /// A serializable snapshot of this action for external observability
    /// tooling: which tool ran, with which options, against which inputs.
    pub fn extra_action_info(&self) -> Result<ExtraActionInfo> {
        let argv = self.argv()?;
        let tool = argv.first().cloned().unwrap_or_default();
        let compiler_option = argv.into_iter().skip(1).collect();
        let guard = self.lock_inputs();
        let sources_and_headers = if guard.inputs_known() {
            guard.live().iter().map(|a| a.exec_path().to_string()).collect()
        } else {
            std::iter::once(self.source.exec_path().to_string())
                .chain(self.context.declared_include_srcs().iter().map(|a| a.exec_path().to_string()))
                .collect()
        };
        Ok(ExtraActionInfo {
            tool,
            compiler_option,
            output_file: self.output.exec_path().to_string(),
            source_file: self.source.exec_path().to_string(),
            sources_and_headers,
        })
    }
}

/// An observability-only snapshot of an action's tool invocation, emitted
/// for external tooling rather than consumed internally.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ExtraActionInfo {
    pub tool: String,
    pub compiler_option: Vec<String>,
    pub output_file: String,
    pub source_file: String,
    pub sources_and_headers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        artifact::ArtifactRoot,
        boundary::{ArtifactResolver, EventHandler, Executor, Level, Location, MiddlemanExpander, Reply, ResourceSet},
        config::FeatureGatedOption,
    };
    use std::collections::BTreeSet;

    struct FakeExecutor {
        reply: Option<Vec<u8>>,
    }
    impl Executor for FakeExecutor {
        fn exec_with_reply(&self, _action: &CompileAction, _ctx: &dyn ActionExecutionContext) -> Result<Option<Reply>> {
            Ok(self.reply.clone().map(Reply::new))
        }
        fn strategy_locality(&self) -> &str {
            "local"
        }
        fn needs_include_scanning(&self) -> bool {
            true
        }
        fn estimate_resource_consumption(&self, _action: &CompileAction) -> ResourceSet {
            ResourceSet::LOCAL
        }
        fn scanned_include_files(&self, _action: &CompileAction, _ctx: &dyn ActionExecutionContext) -> Vec<String> {
            Vec::new()
        }
    }

    struct FakeResolver;
    impl ArtifactResolver for FakeResolver {
        fn resolve_source_artifact(&self, exec_path: &ExecPath) -> Option<Artifact> {
            Some(Artifact::source(exec_path.as_path()))
        }
    }

    struct NoMiddlemen;
    impl MiddlemanExpander for NoMiddlemen {
        fn expand(&self, _artifact: &Artifact, _out: &mut ArtifactSet) {}
    }

    struct CollectingEvents(Mutex<Vec<String>>);
    impl EventHandler for CollectingEvents {
        fn handle(&self, _level: Level, _location: Option<&Location>, message: &str, _label: Option<&str>) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    struct NoBuildFiles;
    impl PackageBoundaryProbe for NoBuildFiles {
        fn has_build_marker(&self, _: &ExecPath) -> bool {
            false
        }
    }

    struct Ctx {
        executor: FakeExecutor,
        resolver: FakeResolver,
        expander: NoMiddlemen,
        events: CollectingEvents,
        exec_root: ExecPath,
    }
    impl ActionExecutionContext for Ctx {
        fn executor(&self) -> &dyn Executor {
            &self.executor
        }
        fn artifact_resolver(&self) -> &dyn ArtifactResolver {
            &self.resolver
        }
        fn middleman_expander(&self) -> &dyn MiddlemanExpander {
            &self.expander
        }
        fn event_handler(&self) -> &dyn EventHandler {
            &self.events
        }
        fn exec_root(&self) -> &ExecPath {
            &self.exec_root
        }
    }

    fn base_action() -> CompileAction {
        let source = Artifact::source("pkg/x.cc");
        let output = Artifact::derived(ArtifactRoot::derived("bin"), "pkg/x.o");
        let mandatory = ArtifactSet::from([source.clone()]);
        let context = CompilationContext::builder()
            .declared_include_dirs(BTreeSet::from([ExecPath::new("pkg")]))
            .build();
        let config = Configuration::builder()
            .should_scan_includes(true)
            .tool_path("gcc", "/usr/bin/gcc")
            .compiler_options(vec![FeatureGatedOption::always("-Wall")])
            .build();
        CompileAction::new(NewCompileAction {
            owner_label: "//pkg:x".into(),
            source_label: "//pkg:x.cc".into(),
            features: FeatureSet::new(),
            source,
            source_language: SourceLanguage::Cxx,
            mandatory_inputs: mandatory,
            optional_inputs: ArtifactSet::new(),
            output,
            output_kind: OutputKind::Object,
            gcno: None,
            dwo: None,
            dotd: Some(DotdFile::Virtual(ExecPath::new("bin/pkg/x.d"))),
            config: Arc::new(config),
            context: Arc::new(context),
            copts: Vec::new(),
            plugin_opts: Vec::new(),
            copts_filter: Arc::new(|_: &str| true),
            extra_system_include_prefixes: Vec::new(),
            modules_enabled: false,
            fdo_build_stamp: None,
            include_resolver: Arc::new(crate::boundary::NoopIncludeResolver),
            behavior: ActionBehavior::Normal,
        })
    }

    #[test]
    fn clean_compile_discovers_and_validates_inputs() {
        let tmp = tempfile::tempdir().unwrap();
        let action = base_action();
        let ctx = Ctx {
            executor: FakeExecutor { reply: Some(b"x.o: pkg/x.cc pkg/x.h\n".to_vec()) },
            resolver: FakeResolver,
            expander: NoMiddlemen,
            events: CollectingEvents(Mutex::new(Vec::new())),
            exec_root: ExecPath::new(tmp.path()),
        };
        action.execute(&ctx, &NoBuildFiles).unwrap();
        assert!(action.inputs_known());
        assert!(action.live_inputs().contains(&Artifact::source("pkg/x.h")));
    }

    #[test]
    fn undeclared_include_is_a_fatal_error() {
        let tmp = tempfile::tempdir().unwrap();
        let action = base_action();
        let ctx = Ctx {
            executor: FakeExecutor { reply: Some(b"x.o: pkg/x.cc other_pkg/secret.h\n".to_vec()) },
            resolver: FakeResolver,
            expander: NoMiddlemen,
            events: CollectingEvents(Mutex::new(Vec::new())),
            exec_root: ExecPath::new(tmp.path()),
        };
        let err = action.execute(&ctx, &NoBuildFiles).unwrap_err();
        assert!(matches!(err, CompileError::UndeclaredInclusion { .. }));
    }

    #[test]
    fn fingerprint_is_unaffected_by_discovered_inputs() {
        let tmp = tempfile::tempdir().unwrap();
        let action = base_action();
        let before = action.compute_key().unwrap();
        let ctx = Ctx {
            executor: FakeExecutor { reply: Some(b"x.o: pkg/x.cc pkg/x.h\n".to_vec()) },
            resolver: FakeResolver,
            expander: NoMiddlemen,
            events: CollectingEvents(Mutex::new(Vec::new())),
            exec_root: ExecPath::new(tmp.path()),
        };
        action.execute(&ctx, &NoBuildFiles).unwrap();
        let after = action.compute_key().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn environment_adds_hermetic_pwd_only_when_coverage_enabled() {
        let source = Artifact::source("pkg/x.cc");
        let output = Artifact::derived(ArtifactRoot::derived("bin"), "pkg/x.o");
        let mandatory = ArtifactSet::from([source.clone()]);
        let context = CompilationContext::builder().build();
        let without_coverage = Configuration::builder().tool_path("gcc", "/usr/bin/gcc").build();
        let with_coverage =
            Configuration::builder().tool_path("gcc", "/usr/bin/gcc").is_code_coverage_enabled(true).build();

        let make = |config: Configuration| {
            CompileAction::new(NewCompileAction {
                owner_label: "//pkg:x".into(),
                source_label: "//pkg:x.cc".into(),
                features: FeatureSet::new(),
                source: source.clone(),
                source_language: SourceLanguage::Cxx,
                mandatory_inputs: mandatory.clone(),
                optional_inputs: ArtifactSet::new(),
                output: output.clone(),
                output_kind: OutputKind::Object,
                gcno: None,
                dwo: None,
                dotd: None,
                config: Arc::new(config),
                context: Arc::new(context.clone()),
                copts: Vec::new(),
                plugin_opts: Vec::new(),
                copts_filter: Arc::new(|_: &str| true),
                extra_system_include_prefixes: Vec::new(),
                modules_enabled: false,
                fdo_build_stamp: None,
                include_resolver: Arc::new(crate::boundary::NoopIncludeResolver),
                behavior: ActionBehavior::Normal,
            })
        };

        assert_eq!(make(without_coverage).environment().get("PWD"), None);
        assert_eq!(make(with_coverage).environment().get("PWD").map(String::as_str), Some("/proc/self/cwd"));
    }
}
