//! Computes a compile action's cache key: a deterministic digest over
//! exactly the fields that are frozen before the action ever executes.
//!
//! The live input set discovered post-execution must never feed this
//! digest — only the command line and the declared-inclusion policy inputs
//! that shaped it. Grounded on `CacheEntry::content_hash` (`cache.rs`): a
//! `sha2` digest over a canonical byte sequence, hex-encoded with
//! `const-hex` for the on-disk/log representation.

use crate::{artifact::Artifact, paths::ExecPath};
use sha2::{Digest, Sha256};
use std::{collections::BTreeSet, fmt};

/// A compile action's content-addressed identity.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fields `compute_key` folds into the digest; everything here must be
/// fixed before the action executes.
pub struct FingerprintInputs<'a> {
    pub action_class_id: &'a str,
    pub argv: &'a [String],
    pub declared_include_dirs: &'a BTreeSet<ExecPath>,
    pub declared_include_warn_dirs: &'a BTreeSet<ExecPath>,
    pub declared_include_srcs: &'a BTreeSet<Artifact>,
    pub extra_system_include_prefixes: &'a [ExecPath],
}

/// Folds `inputs` into a single deterministic fingerprint.
///
/// Order matters for the digest but not for correctness of the set-typed
/// fields — `BTreeSet` already iterates them in ascending order, so no
/// additional sort is needed before folding them in.
#[tracing::instrument(level = "trace", skip_all, fields(action_class = inputs.action_class_id))]
pub fn compute_key(inputs: &FingerprintInputs<'_>) -> Fingerprint {
    let mut hasher = Sha256::new();
    fold_str(&mut hasher, inputs.action_class_id);
    for arg in inputs.argv {
        fold_str(&mut hasher, arg);
    }
    for dir in inputs.declared_include_dirs {
        fold_str(&mut hasher, &dir.to_string());
    }
    for dir in inputs.declared_include_warn_dirs {
        fold_str(&mut hasher, &dir.to_string());
    }
    for src in inputs.declared_include_srcs {
        fold_str(&mut hasher, &src.exec_path().to_string());
    }
    for prefix in inputs.extra_system_include_prefixes {
        fold_str(&mut hasher, &prefix.to_string());
    }
    Fingerprint(hex::encode(hasher.finalize()))
}

/// Folds a length-prefixed string into `hasher` so that e.g. folding `"ab"`
/// then `"c"` never collides with folding `"a"` then `"bc"`.
fn fold_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}
