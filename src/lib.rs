#![doc = include_str!("../README.md")]
#![warn(rustdoc::all)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Models a single C/C++ compile action the way a Bazel-family build system
//! does: a pure description of one compiler invocation, the inputs it may
//! legitimately read, and the machinery to discover, validate and
//! fingerprint those inputs around it.
//!
//! See the crate-level modules for the pieces of the pipeline, assembled end
//! to end by [`action::CompileAction`]:
//!
//! - [`paths`] / [`artifact`] — the path and artifact model.
//! - [`depset`] — the `.d` dependency-file parser.
//! - [`context`] — the declared-inclusion policy an action is checked
//!   against.
//! - [`config`] — the toolchain/feature configuration the assembler and
//!   validator read from.
//! - [`argv`] — the pure command-line assembler.
//! - [`updater`] — rebuilds an action's live input set from discovered
//!   dependencies.
//! - [`validate`] — enforces the declared-inclusion policy over the live
//!   input set.
//! - [`fingerprint`] — the action's content-addressed cache key.
//! - [`boundary`] — the executor/resolver/event-sink traits this crate calls
//!   out through, never implements.
//! - [`error`] — the crate-wide error hierarchy.

#[macro_use]
extern crate tracing;

pub mod error;
pub use error::{CompileError, Result};

pub mod paths;
pub use paths::ExecPath;

pub mod artifact;
pub use artifact::{Artifact, ArtifactRoot, ArtifactSet, DotdFile, RootKind};

pub mod depset;
pub use depset::DependencySet;

pub mod context;
pub use context::CompilationContext;

pub mod config;
pub use config::Configuration;

pub mod boundary;

pub mod argv;

pub mod validate;
pub use validate::IncludeProblems;

pub mod updater;
pub use updater::InputSet;

pub mod fingerprint;
pub use fingerprint::Fingerprint;

pub mod action;
pub use action::{ActionBehavior, CompileAction, NewCompileAction};

pub mod debug;
