//! The SVN-facing boundary: wire types, the `SvnSession`/`EditorSink`
//! interfaces, and the `svn log --xml` parser.

pub mod log_parser;
pub mod session;
pub mod types;

pub use log_parser::parse_log;
pub use session::{drive, EditorOp, EditorSink, SvnSession};
pub use types::{ChangeAction, ChangedPath, CopyFrom, LogEntry, parse_svn_date};
