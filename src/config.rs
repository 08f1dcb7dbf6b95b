//! Toolchain and feature configuration: everything the command-line
//! assembler and the inclusion validator read from outside the action
//! itself.
//!
//! Grounded on the split between `ProjectPathsConfig` ("where files live")
//! and `SolcConfig` ("what the compiler should be told"), collapsed here
//! into one layered struct because this crate has no project-wide path
//! resolution of its own.

use crate::paths::ExecPath;
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

/// The active feature set for a compilation. The assembler only looks for
/// two well-known members; anything else is opaque to the core and exists
/// purely to gate [`FeatureGatedOption`]s.
pub type FeatureSet = BTreeSet<String>;

pub const PARSE_HEADERS: &str = "parse_headers";
pub const PREPROCESS_HEADERS: &str = "preprocess_headers";

/// A compiler flag that only applies when a named feature is active.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FeatureGatedOption {
    pub option: String,
    pub requires_feature: Option<String>,
}

impl FeatureGatedOption {
    pub fn always(option: impl Into<String>) -> Self {
        Self { option: option.into(), requires_feature: None }
    }

    pub fn gated(option: impl Into<String>, feature: impl Into<String>) -> Self {
        Self { option: option.into(), requires_feature: Some(feature.into()) }
    }

    fn applies(&self, features: &FeatureSet) -> bool {
        match &self.requires_feature {
            Some(f) => features.contains(f),
            None => true,
        }
    }
}

fn filtered(options: &[FeatureGatedOption], features: &FeatureSet) -> Vec<String> {
    options.iter().filter(|o| o.applies(features)).map(|o| o.option.clone()).collect()
}

/// Matches a source by its label or by a suffix of its filename, for
/// per-file `copts` overrides.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FileMatcher {
    Label(String),
    FilenameSuffix(String),
}

impl FileMatcher {
    pub fn matches(&self, label: &str, filename: &str) -> bool {
        match self {
            FileMatcher::Label(l) => l == label,
            FileMatcher::FilenameSuffix(suffix) => filename.ends_with(suffix.as_str()),
        }
    }
}

/// One entry of `per_file_copts`: options applied verbatim to every source
/// whose label or filename the matcher accepts.
#[derive(Clone, Debug)]
pub struct PerFileCopt {
    pub matcher: FileMatcher,
    pub options: Vec<String>,
}

/// Toolchain-wide configuration shared by every action built against it.
///
/// Immutable once constructed; a single toolchain configuration is typically
/// shared across many actions, so cloning is cheap via `Arc` at the call
/// site if needed — this type does not impose that choice itself.
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    should_scan_includes: bool,
    use_fission: bool,
    is_code_coverage_enabled: bool,
    built_in_include_directories: Vec<ExecPath>,
    compiler_options: Vec<FeatureGatedOption>,
    c_options: Vec<String>,
    cxx_options: Vec<FeatureGatedOption>,
    unfiltered_compiler_options: Vec<FeatureGatedOption>,
    c_warnings: Vec<String>,
    per_file_copts: Vec<PerFileCopt>,
    tool_paths: BTreeMap<String, PathBuf>,
    default_shell_environment: BTreeMap<String, String>,
    verbose_validation_debug: bool,
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    pub fn should_scan_includes(&self) -> bool {
        self.should_scan_includes
    }

    pub fn use_fission(&self) -> bool {
        self.use_fission
    }

    pub fn is_code_coverage_enabled(&self) -> bool {
        self.is_code_coverage_enabled
    }

    pub fn built_in_include_directories(&self) -> &[ExecPath] {
        &self.built_in_include_directories
    }

    pub fn compiler_options(&self, features: &FeatureSet) -> Vec<String> {
        filtered(&self.compiler_options, features)
    }

    pub fn c_options(&self) -> &[String] {
        &self.c_options
    }

    pub fn cxx_options(&self, features: &FeatureSet) -> Vec<String> {
        filtered(&self.cxx_options, features)
    }

    pub fn unfiltered_compiler_options(&self, features: &FeatureSet) -> Vec<String> {
        filtered(&self.unfiltered_compiler_options, features)
    }

    pub fn c_warnings(&self) -> &[String] {
        &self.c_warnings
    }

    pub fn per_file_copts(&self) -> &[PerFileCopt] {
        &self.per_file_copts
    }

    pub fn tool_path(&self, tool: &str) -> Option<&Path> {
        self.tool_paths.get(tool).map(PathBuf::as_path)
    }

    pub fn default_shell_environment(&self) -> &BTreeMap<String, String> {
        &self.default_shell_environment
    }

    /// Whether the inclusion validator should also dump its per-input
    /// verdicts to stderr via [`crate::debug`]. A diagnostic aid only — never
    /// consulted by the validator's pass/fail logic itself.
    pub fn verbose_validation_debug(&self) -> bool {
        self.verbose_validation_debug
    }
}

#[derive(Default)]
pub struct ConfigurationBuilder {
    inner: Configuration,
}

impl ConfigurationBuilder {
    pub fn should_scan_includes(mut self, v: bool) -> Self {
        self.inner.should_scan_includes = v;
        self
    }

    pub fn use_fission(mut self, v: bool) -> Self {
        self.inner.use_fission = v;
        self
    }

    pub fn is_code_coverage_enabled(mut self, v: bool) -> Self {
        self.inner.is_code_coverage_enabled = v;
        self
    }

    pub fn built_in_include_directories(mut self, dirs: Vec<ExecPath>) -> Self {
        self.inner.built_in_include_directories = dirs;
        self
    }

    pub fn compiler_options(mut self, opts: Vec<FeatureGatedOption>) -> Self {
        self.inner.compiler_options = opts;
        self
    }

    pub fn c_options(mut self, opts: Vec<String>) -> Self {
        self.inner.c_options = opts;
        self
    }

    pub fn cxx_options(mut self, opts: Vec<FeatureGatedOption>) -> Self {
        self.inner.cxx_options = opts;
        self
    }

    pub fn unfiltered_compiler_options(mut self, opts: Vec<FeatureGatedOption>) -> Self {
        self.inner.unfiltered_compiler_options = opts;
        self
    }

    pub fn c_warnings(mut self, warnings: Vec<String>) -> Self {
        self.inner.c_warnings = warnings;
        self
    }

    pub fn per_file_copts(mut self, copts: Vec<PerFileCopt>) -> Self {
        self.inner.per_file_copts = copts;
        self
    }

    pub fn tool_path(mut self, tool: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.inner.tool_paths.insert(tool.into(), path.into());
        self
    }

    pub fn default_shell_environment(mut self, env: BTreeMap<String, String>) -> Self {
        self.inner.default_shell_environment = env;
        self
    }

    pub fn verbose_validation_debug(mut self, v: bool) -> Self {
        self.inner.verbose_validation_debug = v;
        self
    }

    pub fn build(self) -> Configuration {
        self.inner
    }
}
