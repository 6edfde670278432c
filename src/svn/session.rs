//! The `SvnSession` and `EditorSink` interfaces (§4.I, §6, Design Notes).
//!
//! Both are modeled as traits so the low-level SVN remote-access library —
//! explicitly out of scope here — can be swapped in behind them. The crate
//! ships no production implementation of `SvnSession`; `crate::testing`
//! provides a fixture-backed one for exercising the History Walker.

use std::path::Path;

use async_trait::async_trait;

use crate::errors::LoaderError;
use crate::svn::types::{CopyFrom, LogEntry};

/// The callback interface SVN uses to describe one revision's mutations
/// (§4.D). Implemented by the Replay Editor; driven by an `SvnSession`'s
/// `replay` method. Modeled as a trait (dynamic dispatch target) rather
/// than reproducing the source's reliance on late-bound method lookup —
/// see Design Notes. Methods are async: `add_directory`/`add_file` may need
/// to suspend on a `copyfrom` export, and `apply_textdelta` receives bytes
/// read from the network session.
#[async_trait]
pub trait EditorSink {
    async fn open_root(&mut self) -> Result<(), LoaderError>;
    async fn add_directory(&mut self, path: &str, copy_from: Option<CopyFrom>) -> Result<(), LoaderError>;
    async fn open_directory(&mut self, path: &str) -> Result<(), LoaderError>;
    async fn change_dir_prop(&mut self, path: &str, name: &str, value: Option<String>) -> Result<(), LoaderError>;
    async fn delete_entry(&mut self, path: &str) -> Result<(), LoaderError>;
    async fn add_file(&mut self, path: &str, copy_from: Option<CopyFrom>) -> Result<(), LoaderError>;
    async fn open_file(&mut self, path: &str) -> Result<(), LoaderError>;
    async fn apply_textdelta(&mut self, path: &str, svndiff: &[u8]) -> Result<(), LoaderError>;
    async fn change_file_prop(&mut self, path: &str, name: &str, value: Option<String>) -> Result<(), LoaderError>;
    async fn close_file(&mut self, path: &str) -> Result<(), LoaderError>;
    async fn close_directory(&mut self, path: &str) -> Result<(), LoaderError>;
    async fn close_edit(&mut self) -> Result<(), LoaderError>;
}

/// A tagged-variant recording of a single editor callback, used by fixture
/// sessions (`crate::testing::FixtureSvnSession`) to script a revision's
/// replay stream as plain data rather than a dynamic call sequence.
#[derive(Debug, Clone)]
pub enum EditorOp {
    AddDirectory { path: String, copy_from: Option<CopyFrom> },
    OpenDirectory { path: String },
    ChangeDirProp { path: String, name: String, value: Option<String> },
    DeleteEntry { path: String },
    AddFile { path: String, copy_from: Option<CopyFrom> },
    OpenFile { path: String },
    ApplyTextdelta { path: String, svndiff: Vec<u8> },
    ChangeFileProp { path: String, name: String, value: Option<String> },
    CloseFile { path: String },
    CloseDirectory { path: String },
}

/// Replays `ops` (preceded by `open_root` and followed by `close_edit`)
/// into `sink`. Shared by any `SvnSession` implementation driven off a
/// scripted or recorded operation list.
pub async fn drive(sink: &mut dyn EditorSink, ops: &[EditorOp]) -> Result<(), LoaderError> {
    sink.open_root().await?;
    for op in ops {
        match op {
            EditorOp::AddDirectory { path, copy_from } => {
                sink.add_directory(path, copy_from.clone()).await?
            }
            EditorOp::OpenDirectory { path } => sink.open_directory(path).await?,
            EditorOp::ChangeDirProp { path, name, value } => {
                sink.change_dir_prop(path, name, value.clone()).await?
            }
            EditorOp::DeleteEntry { path } => sink.delete_entry(path).await?,
            EditorOp::AddFile { path, copy_from } => sink.add_file(path, copy_from.clone()).await?,
            EditorOp::OpenFile { path } => sink.open_file(path).await?,
            EditorOp::ApplyTextdelta { path, svndiff } => {
                sink.apply_textdelta(path, svndiff).await?
            }
            EditorOp::ChangeFileProp { path, name, value } => {
                sink.change_file_prop(path, name, value.clone()).await?
            }
            EditorOp::CloseFile { path } => sink.close_file(path).await?,
            EditorOp::CloseDirectory { path } => sink.close_directory(path).await?,
        }
    }
    sink.close_edit().await
}

/// The external SVN remote-access collaborator (§6). No production
/// implementation ships in this crate — see module docs.
#[async_trait]
pub trait SvnSession {
    async fn get_uuid(&self) -> Result<String, LoaderError>;
    async fn get_head_revision(&self) -> Result<i64, LoaderError>;
    async fn get_log(&self, from: i64, to: i64) -> Result<Vec<LogEntry>, LoaderError>;
    async fn replay(&self, rev: i64, sink: &mut dyn EditorSink) -> Result<(), LoaderError>;
    async fn export(&self, path: &str, rev: i64, dest: &Path) -> Result<(), LoaderError>;
}
