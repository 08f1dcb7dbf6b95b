//! Assembles the compiler command line for a single compile action.
//!
//! A pure function over a bundle of already-resolved inputs: no I/O, no
//! global state, and the same inputs always produce the same, byte-equal
//! argv. Ordering matters — it feeds the action fingerprint (see
//! [`crate::fingerprint`]) — so this module is deliberately flat and
//! sequential rather than built from composable little pieces that might
//! get reordered by an unrelated refactor.
//!
//! Grounded on the `CompilerInput`/`SolcVersionedInput` argument assembly
//! (`compilers/mod.rs`, `compilers/solc/mod.rs`), generalized from "one
//! compiler, one fixed flag set" to an explicit, ordered pipeline of flag
//! groups.

use crate::{
    artifact::DotdFile,
    config::{Configuration, FeatureSet, PARSE_HEADERS, PREPROCESS_HEADERS},
    context::CompilationContext,
    error::{CompileError, Result},
    paths::ExecPath,
};
use std::path::Path;

/// The macro name the FDO build stamp, if any, is passed under.
pub const FDO_BUILD_STAMP_MACRO: &str = "BUILD_FDO_STAMP";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SourceLanguage {
    C,
    Cxx,
    CxxHeader,
}

impl SourceLanguage {
    fn is_cxx_like(self) -> bool {
        matches!(self, SourceLanguage::Cxx | SourceLanguage::CxxHeader)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputKind {
    Object,
    Assembler,
    Preprocessed,
}

/// Everything [`assemble`] needs, gathered into one borrow so the function
/// itself stays a plain, testable transform.
pub struct ArgvRequest<'a> {
    pub tool_path: &'a Path,
    pub source_exec_path: &'a ExecPath,
    pub source_label: &'a str,
    pub source_language: SourceLanguage,
    pub features: &'a FeatureSet,
    pub context: &'a CompilationContext,
    pub config: &'a Configuration,
    pub copts_filter: &'a dyn Fn(&str) -> bool,
    pub plugin_opts: &'a [String],
    pub copts: &'a [String],
    pub fdo_build_stamp: Option<&'a str>,
    pub dotd: Option<&'a DotdFile>,
    pub modules_enabled: bool,
    pub output_kind: OutputKind,
    pub output_exec_path: &'a ExecPath,
    pub fission_enabled: bool,
}

/// Builds the compiler argv for `req`, in the exact order a real toolchain
/// invocation needs it.
pub fn assemble(req: &ArgvRequest<'_>) -> Result<Vec<String>> {
    let mut argv = Vec::new();

    // 1. compiler executable
    argv.push(req.tool_path.to_string_lossy().into_owned());

    // 2. header compile mode
    if req.source_language == SourceLanguage::CxxHeader {
        let parse = req.features.contains(PARSE_HEADERS);
        let preprocess = req.features.contains(PREPROCESS_HEADERS);
        match (parse, preprocess) {
            (true, false) => argv.extend(["-x".into(), "c++-header".into()]),
            (false, true) => argv.extend(["-E".into(), "-x".into(), "c++".into()]),
            _ => {
                debug_assert!(
                    false,
                    "a C++ header source must enable exactly one of parse_headers/preprocess_headers"
                );
                return Err(CompileError::InvariantViolation(
                    "C++ header compile action missing parse_headers/preprocess_headers feature".into(),
                ));
            }
        }
    }

    // 3-5. include directories
    for dir in req.context.quote_include_dirs() {
        argv.extend(["-iquote".into(), dir.to_string()]);
    }
    for dir in req.context.include_dirs() {
        argv.push(format!("-I{dir}"));
    }
    for dir in req.context.system_include_dirs() {
        argv.extend(["-isystem".into(), dir.to_string()]);
    }

    // 6. plugin options, verbatim, ahead of toolchain compiler options
    argv.extend(req.plugin_opts.iter().cloned());

    // 7. toolchain compiler options, filtered
    argv.extend(req.config.compiler_options(req.features).into_iter().filter(|o| (req.copts_filter)(o)));

    // 8. coverage instrumentation, filtered
    if req.config.is_code_coverage_enabled() {
        argv.extend(
            ["-fprofile-arcs", "-ftest-coverage"]
                .into_iter()
                .filter(|o| (req.copts_filter)(o))
                .map(str::to_owned),
        );
    }

    // 9. language-specific toolchain options, filtered
    if req.source_language.is_cxx_like() {
        argv.extend(req.config.cxx_options(req.features).into_iter().filter(|o| (req.copts_filter)(o)));
    } else {
        argv.extend(req.config.c_options().iter().filter(|o| (req.copts_filter)(o.as_str())).cloned());
    }

    // 10. explicit copts, verbatim — the filter is deliberately not applied
    argv.extend(req.copts.iter().cloned());

    // 11. warnings
    for w in req.config.c_warnings() {
        argv.push(format!("-W{w}"));
    }

    // 12. defines
    for d in req.context.defines() {
        argv.push(format!("-D{d}"));
    }

    // 13. FDO build stamp
    if let Some(stamp) = req.fdo_build_stamp {
        argv.push(format!("-D{FDO_BUILD_STAMP_MACRO}=\"{stamp}\""));
    }

    // 14. unfiltered toolchain options
    argv.extend(req.config.unfiltered_compiler_options(req.features));

    // 15. determinism aid
    argv.push(format!("-frandom-seed={}", req.output_exec_path));

    // 16. per-file copts
    let source_filename = req.source_exec_path.base_name();
    for copt in req.config.per_file_copts() {
        if copt.matcher.matches(req.source_label, source_filename) {
            argv.extend(copt.options.iter().cloned());
        }
    }

    // 17. dependency output
    if let Some(dotd) = req.dotd {
        argv.extend(["-MD".into(), "-MF".into(), dotd.exec_path().to_string()]);
    }

    // 18. Clang modules
    if req.modules_enabled {
        if let Some(module_map) = req.context.module_map() {
            argv.extend([
                "-Xclang-only=-fmodule-maps".to_string(),
                "-Xclang-only=-fmodules-strict-decluse".to_string(),
                format!("-Xclang-only=-fmodule-name={}", module_map.root_relative_path().base_name()),
                format!("-Xclang-only=-fmodule-map-file={}", module_map.exec_path()),
            ]);
        }
    }

    // 19. output-kind switch
    match req.output_kind {
        OutputKind::Assembler => argv.push("-S".into()),
        OutputKind::Preprocessed => argv.push("-E".into()),
        OutputKind::Object => {}
    }

    // 20. Fission
    if req.fission_enabled {
        argv.push("-gsplit-dwarf".into());
    }

    // 21. source and output
    argv.extend(["-c".into(), req.source_exec_path.to_string()]);
    argv.extend(["-o".into(), req.output_exec_path.to_string()]);

    Ok(argv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Configuration, FeatureGatedOption},
        context::CompilationContext,
    };
    use std::collections::BTreeSet;

    fn base_request<'a>(
        context: &'a CompilationContext,
        config: &'a Configuration,
        features: &'a FeatureSet,
        source: &'a ExecPath,
        output: &'a ExecPath,
        filter: &'a dyn Fn(&str) -> bool,
    ) -> ArgvRequest<'a> {
        ArgvRequest {
            tool_path: Path::new("/usr/bin/gcc"),
            source_exec_path: source,
            source_label: "//pkg:x",
            source_language: SourceLanguage::Cxx,
            features,
            context,
            config,
            copts_filter: filter,
            plugin_opts: &[],
            copts: &[],
            fdo_build_stamp: None,
            dotd: None,
            modules_enabled: false,
            output_kind: OutputKind::Object,
            output_exec_path: output,
            fission_enabled: false,
        }
    }

    #[test]
    fn orders_include_dirs_before_toolchain_options() {
        let context = CompilationContext::builder()
            .quote_include_dirs(vec![ExecPath::new("pkg")])
            .include_dirs(vec![ExecPath::new("third_party/include")])
            .build();
        let config = Configuration::builder().compiler_options(vec![FeatureGatedOption::always("-Wall")]).build();
        let features = FeatureSet::new();
        let source = ExecPath::new("pkg/x.cc");
        let output = ExecPath::new("bin/pkg/x.o");
        let always = |_: &str| true;
        let req = base_request(&context, &config, &features, &source, &output, &always);

        let argv = assemble(&req).unwrap();
        let iquote = argv.iter().position(|a| a == "-iquote").unwrap();
        let include = argv.iter().position(|a| a == "-Ithird_party/include").unwrap();
        let wall = argv.iter().position(|a| a == "-Wall").unwrap();
        assert!(iquote < include);
        assert!(include < wall);
        assert_eq!(argv.last().unwrap(), &output.to_string());
        assert_eq!(argv[argv.len() - 2], "-o");
    }

    #[test]
    fn header_without_a_mode_feature_is_an_invariant_violation() {
        let context = CompilationContext::builder().build();
        let config = Configuration::builder().build();
        let features = FeatureSet::new();
        let source = ExecPath::new("pkg/x.h");
        let output = ExecPath::new("bin/pkg/x.h.pch");
        let always = |_: &str| true;
        let mut req = base_request(&context, &config, &features, &source, &output, &always);
        req.source_language = SourceLanguage::CxxHeader;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| assemble(&req)));
        match result {
            Ok(Err(CompileError::InvariantViolation(_))) => {}
            Ok(Ok(_)) => panic!("expected an invariant violation"),
            Err(_) => {}
        }
    }

    #[test]
    fn copts_filter_excludes_matching_toolchain_options_but_not_explicit_copts() {
        let context = CompilationContext::builder().build();
        let config =
            Configuration::builder().compiler_options(vec![FeatureGatedOption::always("-Werror")]).build();
        let features = FeatureSet::new();
        let source = ExecPath::new("pkg/x.cc");
        let output = ExecPath::new("bin/pkg/x.o");
        let drop_werror = |opt: &str| opt != "-Werror";
        let mut req = base_request(&context, &config, &features, &source, &output, &drop_werror);
        let copts = vec!["-Werror".to_string()];
        req.copts = &copts;

        let argv = assemble(&req).unwrap();
        assert_eq!(argv.iter().filter(|a| a.as_str() == "-Werror").count(), 1);
    }

    #[test]
    fn is_pure() {
        let context = CompilationContext::builder().build();
        let config = Configuration::builder().build();
        let features = FeatureSet::new();
        let source = ExecPath::new("pkg/x.cc");
        let output = ExecPath::new("bin/pkg/x.o");
        let always = |_: &str| true;
        let req = base_request(&context, &config, &features, &source, &output, &always);

        assert_eq!(assemble(&req).unwrap(), assemble(&req).unwrap());
    }
}
