//! Process-wide diagnostic print block for inclusion-validation debugging.
//!
//! Not part of this crate's contract: a config-gated stderr dump, kept
//! separate from the crate's own `trace!`-based structured logging.
//! Serialized by a single mutex so concurrent actions printing their own
//! validation traces don't interleave mid-line.

use once_cell::sync::Lazy;
use std::sync::Mutex;

static PRINT_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Prints `message` to stderr under the shared lock, if `enabled`.
///
/// `enabled` is expected to come from a toolchain/feature flag
/// (`--verbose_validation_debug`-style), never hardcoded true in production
/// configuration.
pub fn print_validation_debug(enabled: bool, label: &str, message: &str) {
    if !enabled {
        return;
    }
    let _guard = PRINT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    eprintln!("[validation] {label}: {message}");
}
