//! Configuration for one load (§7.2, ambient).
//!
//! Loading this struct from TOML, environment variables, or CLI flags is
//! the out-of-scope CLI's job — this module only defines the parsed shape
//! the core consumes, with the defaults the rest of the design assumes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Tuning knobs for one origin visit. All fields have defaults matching the
/// design notes' "implementation choice, typically a few thousand objects
/// or a few megabytes per batch" guidance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Scratch directory backing the Working Tree for this load.
    pub working_tree_root: PathBuf,

    /// The archive visit id this load reports status against. Assigned by
    /// the out-of-scope caller when it creates the origin visit, before
    /// invoking the loader; the core only ever threads it through to
    /// `ArchiveClient::origin_visit_update`.
    #[serde(default = "default_visit")]
    pub visit: i64,

    /// Archive batch submissions never exceed this many objects.
    #[serde(default = "default_archive_batch_max_objects")]
    pub archive_batch_max_objects: usize,

    /// Archive batch submissions never exceed this many bytes.
    #[serde(default = "default_archive_batch_max_bytes")]
    pub archive_batch_max_bytes: usize,

    /// Upper bound on a single svndiff source or target window, matching
    /// the "bounded memory footprint" design constraint.
    #[serde(default = "default_svndiff_window_max_bytes")]
    pub svndiff_window_max_bytes: usize,

    /// Maximum retry attempts for a transient `ArchiveError` before it
    /// becomes fatal.
    #[serde(default = "default_archive_retry_max_attempts")]
    pub archive_retry_max_attempts: u32,

    /// Base delay for the archive retry backoff, doubled per attempt.
    #[serde(default = "default_archive_retry_base_delay_ms")]
    pub archive_retry_base_delay_ms: u64,
}

fn default_visit() -> i64 {
    1
}

fn default_archive_batch_max_objects() -> usize {
    2000
}

fn default_archive_batch_max_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_svndiff_window_max_bytes() -> usize {
    102_400
}

fn default_archive_retry_max_attempts() -> u32 {
    5
}

fn default_archive_retry_base_delay_ms() -> u64 {
    500
}

impl LoaderConfig {
    /// Builds a config with every tuning knob at its documented default,
    /// rooted at the given scratch directory.
    pub fn with_defaults(working_tree_root: impl Into<PathBuf>) -> Self {
        Self {
            working_tree_root: working_tree_root.into(),
            visit: default_visit(),
            archive_batch_max_objects: default_archive_batch_max_objects(),
            archive_batch_max_bytes: default_archive_batch_max_bytes(),
            svndiff_window_max_bytes: default_svndiff_window_max_bytes(),
            archive_retry_max_attempts: default_archive_retry_max_attempts(),
            archive_retry_base_delay_ms: default_archive_retry_base_delay_ms(),
        }
    }
}
