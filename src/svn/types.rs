//! Wire-shaped types exchanged with an `SvnSession`.

use serde::{Deserialize, Serialize};

/// One `svn log` entry (§6 `get_log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub revision: i64,
    pub author: String,
    /// ISO-8601 date with microsecond precision, as `svn log --xml` emits it.
    pub date: String,
    pub message: String,
    pub changed_paths: Vec<ChangedPath>,
}

/// One entry of a log record's changed-paths list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedPath {
    pub path: String,
    pub action: ChangeAction,
    pub copy_from: Option<CopyFrom>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeAction {
    Added,
    Deleted,
    Modified,
    Replaced,
}

/// The `copyfrom` source of an `add_directory`/`add_file` editor callback,
/// or of a changed-path log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyFrom {
    pub path: String,
    pub revision: i64,
}

/// Parses the author/committer date string emitted by `svn log --xml`
/// (`YYYY-MM-DDTHH:MM:SS.ffffffZ`) into seconds and microseconds since the
/// Unix epoch, as §4.E's date format requires.
pub fn parse_svn_date(date: &str) -> Option<(i64, u32)> {
    let dt = chrono::DateTime::parse_from_rfc3339(date).ok()?;
    let secs = dt.timestamp();
    let micros = dt.timestamp_subsec_micros();
    Some((secs, micros))
}
