//! svn-archive-loader core library.
//!
//! This crate provides the revision-replay engine that walks a Subversion
//! repository's history and submits its content to a content-addressed,
//! Git-object-model-compatible archive: EOL normalization, an on-disk
//! working tree, an in-memory hash tree, svndiff application, the revision
//! builder, and the History Walker that orchestrates all of them across a
//! full load or a resumed one.

pub mod archive;
pub mod config;
pub mod eol;
pub mod errors;
pub mod gitobj;
pub mod hash_tree;
pub mod history_walker;
pub mod replay;
pub mod revision_builder;
pub mod svn;
pub mod svndiff;
pub mod testing;
pub mod working_tree;

// Re-exports for convenience.
pub use config::LoaderConfig;
pub use errors::LoaderError;
pub use history_walker::{HistoryWalker, LoadSummary, VisitState, VisitStateStore};
