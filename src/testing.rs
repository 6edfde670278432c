//! In-memory fixtures used to exercise the History Walker end to end
//! without a network connection or an `svn` binary (§4.H, §4.I, §7.3).
//!
//! The crate ships no production `ArchiveClient`/`SvnSession` — both
//! collaborators are explicitly out of scope (§1). `InMemoryArchiveClient`,
//! `FixtureSvnSession`, and `InMemoryVisitStateStore` stand in for them in
//! unit and integration tests, the way a real local SVN/Git repo would for
//! end-to-end coverage — here the stand-in is fixture data rather than a
//! subprocess, driving every invariant in §8 deterministically and without
//! a network connection or an `svn` binary.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::archive::{
    ArchiveClient, BlobObject, DirectoryObject, RevisionObject, SnapshotObject, VisitStatus,
};
use crate::errors::{ArchiveError, LoaderError, SvnError};
use crate::gitobj::ObjectId;
use crate::history_walker::{VisitState, VisitStateStore};
use crate::svn::{EditorOp, EditorSink, LogEntry, SvnSession};
use crate::working_tree::FileKind;

/// A fully in-memory `ArchiveClient`. Existence checks and submissions are
/// backed by `Mutex`-guarded maps; nothing here ever fails unless
/// `fail_next_add` has been armed, which is how tests exercise the
/// `ArchiveError` retry path (§7).
#[derive(Default)]
pub struct InMemoryArchiveClient {
    blobs: Mutex<HashMap<ObjectId, BlobObject>>,
    dirs: Mutex<HashMap<ObjectId, DirectoryObject>>,
    revisions: Mutex<HashMap<ObjectId, RevisionObject>>,
    snapshots: Mutex<Vec<SnapshotObject>>,
    visit_statuses: Mutex<Vec<(String, i64, VisitStatus, Option<ObjectId>)>>,
    /// Number of remaining `content_add`/`directory_add`/`revision_add`
    /// calls to reject with a transient `ArchiveError` before succeeding,
    /// used to pin the retry-with-backoff behavior.
    fail_next_add: Mutex<u32>,
    /// Running count of objects actually persisted, used by the
    /// idempotence test to assert a second load adds nothing new.
    pub blobs_added: Mutex<usize>,
    pub dirs_added: Mutex<usize>,
    pub revisions_added: Mutex<usize>,
}

impl InMemoryArchiveClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the next `n` add calls (across any of the three object kinds)
    /// to fail with a transient `ArchiveError::BatchRejected`.
    pub fn fail_next_adds(&self, n: u32) {
        *self.fail_next_add.lock().unwrap() = n;
    }

    fn maybe_fail(&self, kind: &'static str) -> Result<(), LoaderError> {
        let mut remaining = self.fail_next_add.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(LoaderError::Archive(ArchiveError::BatchRejected {
                kind,
                detail: "fixture-injected transient failure".to_string(),
            }));
        }
        Ok(())
    }

    pub fn snapshots(&self) -> Vec<SnapshotObject> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn visit_statuses(&self) -> Vec<(String, i64, VisitStatus, Option<ObjectId>)> {
        self.visit_statuses.lock().unwrap().clone()
    }

    pub fn revision(&self, id: &ObjectId) -> Option<RevisionObject> {
        self.revisions.lock().unwrap().get(id).cloned()
    }

    pub fn revision_ids(&self) -> Vec<ObjectId> {
        self.revisions.lock().unwrap().keys().copied().collect()
    }

    pub fn directory(&self, id: &ObjectId) -> Option<DirectoryObject> {
        self.dirs.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl ArchiveClient for InMemoryArchiveClient {
    async fn content_missing(&self, ids: &[ObjectId]) -> Result<Vec<ObjectId>, LoaderError> {
        let blobs = self.blobs.lock().unwrap();
        Ok(ids.iter().filter(|id| !blobs.contains_key(*id)).copied().collect())
    }

    async fn content_add(&self, blobs: &[BlobObject]) -> Result<(), LoaderError> {
        self.maybe_fail("blob")?;
        let mut store = self.blobs.lock().unwrap();
        let mut added = self.blobs_added.lock().unwrap();
        for b in blobs {
            if store.insert(b.id, b.clone()).is_none() {
                *added += 1;
            }
        }
        Ok(())
    }

    async fn directory_missing(&self, ids: &[ObjectId]) -> Result<Vec<ObjectId>, LoaderError> {
        let dirs = self.dirs.lock().unwrap();
        Ok(ids.iter().filter(|id| !dirs.contains_key(*id)).copied().collect())
    }

    async fn directory_add(&self, dirs: &[DirectoryObject]) -> Result<(), LoaderError> {
        self.maybe_fail("directory")?;
        let mut store = self.dirs.lock().unwrap();
        let mut added = self.dirs_added.lock().unwrap();
        for d in dirs {
            if store.insert(d.id, d.clone()).is_none() {
                *added += 1;
            }
        }
        Ok(())
    }

    async fn revision_missing(&self, ids: &[ObjectId]) -> Result<Vec<ObjectId>, LoaderError> {
        let revs = self.revisions.lock().unwrap();
        Ok(ids.iter().filter(|id| !revs.contains_key(*id)).copied().collect())
    }

    async fn revision_add(&self, revisions: &[RevisionObject]) -> Result<(), LoaderError> {
        self.maybe_fail("revision")?;
        let mut store = self.revisions.lock().unwrap();
        let mut added = self.revisions_added.lock().unwrap();
        for r in revisions {
            if store.insert(r.id, r.clone()).is_none() {
                *added += 1;
            }
        }
        Ok(())
    }

    async fn snapshot_add(&self, snapshot: &SnapshotObject) -> Result<(), LoaderError> {
        self.snapshots.lock().unwrap().push(snapshot.clone());
        Ok(())
    }

    async fn origin_visit_update(
        &self,
        origin_url: &str,
        visit: i64,
        status: VisitStatus,
        snapshot_id: Option<ObjectId>,
    ) -> Result<(), LoaderError> {
        self.visit_statuses
            .lock()
            .unwrap()
            .push((origin_url.to_string(), visit, status, snapshot_id));
        Ok(())
    }
}

/// One exported file used by `FixtureSvnSession::export`, e.g. for a
/// `copyfrom` source or a resume-time full export of the last revision.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub rel_path: String,
    pub contents: Vec<u8>,
    pub kind: FileKind,
}

/// One revision's scripted replay, keyed by revision number.
#[derive(Debug, Clone)]
pub struct RevisionFixture {
    pub log: LogEntry,
    pub ops: Vec<EditorOp>,
}

/// A scripted `SvnSession`: every revision's editor callback stream and log
/// entry is supplied up front by the test, and `export` is served from a
/// fixed table rather than a real checkout. This is the `testing`-module
/// stand-in for the out-of-scope low-level SVN remote-access library
/// (§1, §4.I Design Notes).
#[derive(Default)]
pub struct FixtureSvnSession {
    pub uuid: String,
    pub head_revision: i64,
    pub revisions: HashMap<i64, RevisionFixture>,
    /// Keyed by `(path, revision)`; served by `export`.
    pub exports: HashMap<(String, i64), Vec<ExportFile>>,
    /// Keyed by `(path, revision)`; relative paths of empty directories
    /// `export` should still create on disk, even though no `ExportFile`
    /// lists them.
    pub export_empty_dirs: HashMap<(String, i64), Vec<String>>,
}

impl FixtureSvnSession {
    pub fn new(uuid: impl Into<String>, head_revision: i64) -> Self {
        Self {
            uuid: uuid.into(),
            head_revision,
            revisions: HashMap::new(),
            exports: HashMap::new(),
            export_empty_dirs: HashMap::new(),
        }
    }

    pub fn with_revision(mut self, rev: i64, log: LogEntry, ops: Vec<EditorOp>) -> Self {
        self.revisions.insert(rev, RevisionFixture { log, ops });
        self
    }

    pub fn with_export(mut self, path: impl Into<String>, rev: i64, files: Vec<ExportFile>) -> Self {
        self.exports.insert((path.into(), rev), files);
        self
    }

    /// Scripts `export` to also create the given empty directories (relative
    /// paths, no backing `ExportFile`) — used to exercise the empty-directory
    /// preservation invariant across a `copyfrom` export.
    pub fn with_export_empty_dirs(
        mut self,
        path: impl Into<String>,
        rev: i64,
        dirs: Vec<String>,
    ) -> Self {
        self.export_empty_dirs.insert((path.into(), rev), dirs);
        self
    }
}

#[async_trait]
impl SvnSession for FixtureSvnSession {
    async fn get_uuid(&self) -> Result<String, LoaderError> {
        Ok(self.uuid.clone())
    }

    async fn get_head_revision(&self) -> Result<i64, LoaderError> {
        Ok(self.head_revision)
    }

    async fn get_log(&self, from: i64, to: i64) -> Result<Vec<LogEntry>, LoaderError> {
        let mut out = Vec::new();
        for rev in from..=to {
            let fixture = self.revisions.get(&rev).ok_or_else(|| {
                LoaderError::Svn(SvnError::RevisionNotFound(rev))
            })?;
            out.push(fixture.log.clone());
        }
        Ok(out)
    }

    async fn replay(&self, rev: i64, sink: &mut dyn EditorSink) -> Result<(), LoaderError> {
        let fixture = self
            .revisions
            .get(&rev)
            .ok_or_else(|| LoaderError::Svn(SvnError::RevisionNotFound(rev)))?;
        crate::svn::drive(sink, &fixture.ops).await
    }

    async fn export(&self, path: &str, rev: i64, dest: &Path) -> Result<(), LoaderError> {
        let files = self
            .exports
            .get(&(path.to_string(), rev))
            .cloned()
            .unwrap_or_default();
        for file in files {
            let full = dest.join(&file.rel_path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LoaderError::Svn(SvnError::Io(e))
                })?;
            }
            match file.kind {
                FileKind::Symlink => {
                    let target = String::from_utf8_lossy(&file.contents).into_owned();
                    std::os::unix::fs::symlink(target, &full)
                        .map_err(|e| LoaderError::Svn(SvnError::Io(e)))?;
                }
                FileKind::Regular | FileKind::Executable => {
                    std::fs::write(&full, &file.contents)
                        .map_err(|e| LoaderError::Svn(SvnError::Io(e)))?;
                    if file.kind == FileKind::Executable {
                        use std::os::unix::fs::PermissionsExt;
                        let mut perms = std::fs::metadata(&full)
                            .map_err(|e| LoaderError::Svn(SvnError::Io(e)))?
                            .permissions();
                        perms.set_mode(0o755);
                        std::fs::set_permissions(&full, perms)
                            .map_err(|e| LoaderError::Svn(SvnError::Io(e)))?;
                    }
                }
            }
        }
        if let Some(dirs) = self.export_empty_dirs.get(&(path.to_string(), rev)) {
            for rel_dir in dirs {
                std::fs::create_dir_all(dest.join(rel_dir))
                    .map_err(|e| LoaderError::Svn(SvnError::Io(e)))?;
            }
        }
        Ok(())
    }
}

/// An in-memory `VisitStateStore`, keyed by origin URL.
#[derive(Default)]
pub struct InMemoryVisitStateStore {
    states: Mutex<HashMap<String, VisitState>>,
}

impl InMemoryVisitStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, origin_url: impl Into<String>, state: VisitState) {
        self.states.lock().unwrap().insert(origin_url.into(), state);
    }
}

#[async_trait]
impl VisitStateStore for InMemoryVisitStateStore {
    async fn load(&self, origin_url: &str) -> Result<Option<VisitState>, LoaderError> {
        Ok(self.states.lock().unwrap().get(origin_url).cloned())
    }

    async fn save(&self, origin_url: &str, state: &VisitState) -> Result<(), LoaderError> {
        self.states
            .lock()
            .unwrap()
            .insert(origin_url.to_string(), state.clone());
        Ok(())
    }
}
