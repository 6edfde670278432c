//! Typed error kinds for the SVN archive loader.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`LoaderError`] enum unifies them for callers that want a
//! single error type (the [`crate::history_walker::HistoryWalker`]'s public
//! `run` method returns this).

use thiserror::Error;

use crate::gitobj::ObjectId;

/// Unified error type for a single load (one origin visit).
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Resume verification found that a previously ingested revision no
    /// longer hashes to the identifier recorded in `VisitState`.
    #[error("history altered: revision {revision} now hashes to {recomputed}, expected {expected}")]
    HistoryAltered {
        revision: i64,
        expected: ObjectId,
        recomputed: ObjectId,
    },

    #[error(transparent)]
    Svn(#[from] SvnError),

    #[error(transparent)]
    Svndiff(#[from] SvndiffError),

    #[error(transparent)]
    WorkingTree(#[from] WorkingTreeError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// The editor received a construct it cannot classify.
    #[error("unsupported revision shape at r{revision}: {detail}")]
    UnsupportedRevisionShape { revision: i64, detail: String },
}

/// Errors surfaced by a [`crate::svn::SvnSession`] implementation.
#[derive(Debug, Error)]
pub enum SvnError {
    #[error("svn protocol error: {0}")]
    Protocol(String),

    #[error("svn network error: {0}")]
    Network(String),

    #[error("failed to parse svn XML output: {0}")]
    XmlParse(String),

    #[error("svn revision {0} not found")]
    RevisionNotFound(i64),

    #[error("svn I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from applying an svndiff (svndiff1) delta window.
#[derive(Debug, Error)]
pub enum SvndiffError {
    #[error("bad svndiff magic header")]
    BadMagic,

    #[error("unsupported svndiff version {0}")]
    UnsupportedVersion(u8),

    #[error("svndiff instruction references source offset {offset} beyond source window of length {source_len}")]
    SourceOutOfRange { offset: usize, source_len: usize },

    #[error("svndiff instruction references target offset {offset} beyond target buffer of length {target_len}")]
    TargetOutOfRange { offset: usize, target_len: usize },

    #[error("svndiff window exceeds configured maximum of {max} bytes (got {got})")]
    WindowTooLarge { max: usize, got: usize },

    #[error("truncated svndiff stream: expected {expected} more bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("unknown svndiff instruction opcode {0:#04x}")]
    UnknownOpcode(u8),
}

/// Errors from Working Tree filesystem operations.
#[derive(Debug, Error)]
pub enum WorkingTreeError {
    #[error("working tree I/O error at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("working tree path escapes scratch root: '{0}'")]
    PathEscape(String),
}

/// Errors from the (out-of-scope, trait-modeled) archive client.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive rejected a batch of {kind} objects: {detail}")]
    BatchRejected { kind: &'static str, detail: String },

    #[error("archive request failed after {attempts} attempts: {detail}")]
    RetriesExhausted { attempts: u32, detail: String },
}
