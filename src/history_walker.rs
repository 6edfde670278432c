//! History Walker (§4.F): orchestrates per-revision iteration from
//! `start_rev..head_rev`, handling resume, divergence ("altered history")
//! detection, and final snapshot emission. This is the component that ties
//! every other piece (Working Tree, Hash Tree, Replay Editor, Revision
//! Builder, and the out-of-scope Archive Client / SVN Session) into one
//! load.
//!
//! One `HistoryWalker::run` call is one load: one SVN session, one scratch
//! Working Tree, one Hash Tree, driven to completion single-threaded and
//! cooperatively (§5) — there is no intra-load parallelism to schedule.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::archive::{
    ArchiveClient, BlobObject, DirectoryEntry, DirectoryObject, RevisionObject, SnapshotObject,
    VisitStatus,
};
use crate::config::LoaderConfig;
use crate::errors::{ArchiveError, LoaderError};
use crate::gitobj::{self, ObjectId};
use crate::hash_tree::HashTree;
use crate::replay::ReplayEditor;
use crate::revision_builder::{self, DirectoryNode};
use crate::svn::{parse_svn_date, SvnSession};
use crate::working_tree::WorkingTree;

/// The visit bookkeeping the external layer persists across loads (§3,
/// §6). The core only ever reads it once at the start of a load and
/// writes it once at the end.
///
/// `last_revision_parent_id` is an addition beyond the four fields named
/// in §3: recomputing `last_revision_id` on resume (§4.F step 2b) requires
/// rebuilding the exact commit manifest of `last_svn_revision`, which
/// needs that revision's own parent id. The core has no way to recover a
/// revision's parent from the archive (`ArchiveClient` exposes existence
/// checks and submissions only, never reads), so the parent id has to
/// travel with the rest of the visit state. See DESIGN.md.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitState {
    pub last_svn_revision: i64,
    pub last_revision_id: ObjectId,
    pub last_revision_parent_id: Option<ObjectId>,
    pub last_snapshot_id: Option<ObjectId>,
    pub repo_uuid: String,
}

/// The external bookkeeping collaborator (§6 "Persisted state"): reads the
/// prior visit's state at the start of a load, writes the new state at the
/// end. No production implementation ships here; `crate::testing`'s
/// `InMemoryVisitStateStore` exercises the History Walker in tests.
#[async_trait]
pub trait VisitStateStore {
    async fn load(&self, origin_url: &str) -> Result<Option<VisitState>, LoaderError>;
    async fn save(&self, origin_url: &str, state: &VisitState) -> Result<(), LoaderError>;
}

/// Outcome of one `HistoryWalker::run` call.
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub revisions_loaded: u64,
    pub final_revision_id: Option<ObjectId>,
    pub snapshot_id: Option<ObjectId>,
    /// `true` if a cancel signal was observed between revisions; when set,
    /// no snapshot was emitted and `VisitState` was not updated (§5).
    pub cancelled: bool,
}

/// Orchestrates one load of an SVN origin into the archive.
pub struct HistoryWalker<S, A, V> {
    session: S,
    archive: A,
    visit_store: V,
    origin_url: String,
    config: LoaderConfig,
    start_from_scratch: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl<S, A, V> HistoryWalker<S, A, V>
where
    S: SvnSession + Sync,
    A: ArchiveClient + Sync,
    V: VisitStateStore + Sync,
{
    pub fn new(
        session: S,
        archive: A,
        visit_store: V,
        origin_url: impl Into<String>,
        config: LoaderConfig,
    ) -> Self {
        Self {
            session,
            archive,
            visit_store,
            origin_url: origin_url.into(),
            config,
            start_from_scratch: false,
            cancel: None,
        }
    }

    /// Forces the load to ignore any existing `VisitState` and start from
    /// revision 1, as if this were the origin's first visit.
    pub fn start_from_scratch(mut self, yes: bool) -> Self {
        self.start_from_scratch = yes;
        self
    }

    /// Installs a flag checked between revisions (§5 "Cancellation is
    /// checked between revisions only").
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|f| f.load(Ordering::SeqCst)).unwrap_or(false)
    }

    #[instrument(skip(self), fields(origin = %self.origin_url))]
    pub async fn run(&self) -> Result<LoadSummary, LoaderError> {
        let repo_uuid = self.session.get_uuid().await?;
        let head_rev = self.session.get_head_revision().await?;
        info!(head_rev, repo_uuid, "resolved SVN session");

        let working_tree = WorkingTree::new(&self.config.working_tree_root)?;
        let mut hash_tree = HashTree::new();

        let prior_state = if self.start_from_scratch {
            None
        } else {
            self.visit_store.load(&self.origin_url).await?
        };

        let (start_rev, mut parent_id) = match &prior_state {
            Some(state) => {
                self.verify_and_resume(state, &working_tree, &mut hash_tree).await?;
                (state.last_svn_revision + 1, Some(state.last_revision_id))
            }
            None => (1, None),
        };

        // The parent of whatever revision ends up as `last_revision_id` in
        // the persisted `VisitState` — *not* that revision's own id. Needed
        // so a future resume can recompute that revision's exact manifest
        // (§4.F step 2b). Carried over unchanged when nothing new replays;
        // updated to the pre-commit `parent_id` on every replayed revision
        // so it always trails one revision behind.
        let mut last_revision_parent_id = prior_state.as_ref().and_then(|s| s.last_revision_parent_id);

        if start_rev > head_rev {
            info!(start_rev, head_rev, "nothing new to replay; emitting snapshot only");
            let snapshot_id = self.emit_snapshot(parent_id).await?;
            let last_svn_revision = prior_state.as_ref().map(|s| s.last_svn_revision).unwrap_or(0);
            self.persist_visit_state(last_svn_revision, parent_id, last_revision_parent_id, snapshot_id)
                .await?;
            return Ok(LoadSummary {
                revisions_loaded: 0,
                final_revision_id: parent_id,
                snapshot_id: Some(snapshot_id),
                cancelled: false,
            });
        }

        let mut revisions_loaded = 0u64;
        let mut last_loaded_rev = start_rev - 1;

        for rev in start_rev..=head_rev {
            last_revision_parent_id = parent_id;
            self.replay_one_revision(rev, &repo_uuid, &working_tree, &mut hash_tree, &mut parent_id)
                .await?;
            revisions_loaded += 1;
            last_loaded_rev = rev;

            if self.is_cancelled() {
                info!(rev, "cancel observed between revisions; stopping without a snapshot");
                return Ok(LoadSummary {
                    revisions_loaded,
                    final_revision_id: parent_id,
                    snapshot_id: None,
                    cancelled: true,
                });
            }
        }

        let snapshot_id = self.emit_snapshot(parent_id).await?;
        self.persist_visit_state(last_loaded_rev, parent_id, last_revision_parent_id, snapshot_id)
            .await?;

        Ok(LoadSummary {
            revisions_loaded,
            final_revision_id: parent_id,
            snapshot_id: Some(snapshot_id),
            cancelled: false,
        })
    }

    /// §4.F step 2: exports the last-known revision onto disk, rebuilds
    /// the Hash Tree from it, and recomputes that revision's identifier to
    /// verify the source history has not been altered since the last
    /// visit.
    #[instrument(skip(self, working_tree, hash_tree))]
    async fn verify_and_resume(
        &self,
        state: &VisitState,
        working_tree: &WorkingTree,
        hash_tree: &mut HashTree,
    ) -> Result<(), LoaderError> {
        info!(revision = state.last_svn_revision, "resuming: exporting prior revision");
        self.session
            .export("", state.last_svn_revision, working_tree.root())
            .await?;

        {
            let mut editor = ReplayEditor::new(
                working_tree,
                hash_tree,
                &self.session,
                self.config.svndiff_window_max_bytes,
            );
            editor.reingest_subtree("")?;
        }
        let recomputed_tree_id = hash_tree.root_id();

        let log = self
            .session
            .get_log(state.last_svn_revision, state.last_svn_revision)
            .await?;
        let entry = log.into_iter().next().ok_or_else(|| LoaderError::UnsupportedRevisionShape {
            revision: state.last_svn_revision,
            detail: "no log entry for the last ingested revision".to_string(),
        })?;
        let (secs, micros) = parse_svn_date(&entry.date).ok_or_else(|| {
            LoaderError::UnsupportedRevisionShape {
                revision: state.last_svn_revision,
                detail: format!("unparseable SVN log date: {}", entry.date),
            }
        })?;

        let recomputed = revision_builder::build_revision(
            recomputed_tree_id,
            state.last_revision_parent_id,
            &entry.author,
            secs,
            micros,
            &state.repo_uuid,
            state.last_svn_revision,
            &entry.message,
        );

        if recomputed.id != state.last_revision_id {
            return Err(LoaderError::HistoryAltered {
                revision: state.last_svn_revision,
                expected: state.last_revision_id,
                recomputed: recomputed.id,
            });
        }
        info!(revision = state.last_svn_revision, "resume verification passed");
        Ok(())
    }

    #[instrument(skip(self, working_tree, hash_tree, parent_id), fields(rev))]
    async fn replay_one_revision(
        &self,
        rev: i64,
        repo_uuid: &str,
        working_tree: &WorkingTree,
        hash_tree: &mut HashTree,
        parent_id: &mut Option<ObjectId>,
    ) -> Result<(), LoaderError> {
        let log = self.session.get_log(rev, rev).await?;
        let entry = log.into_iter().next().ok_or_else(|| LoaderError::UnsupportedRevisionShape {
            revision: rev,
            detail: "no log entry for this revision".to_string(),
        })?;

        let (touched_dirs, new_blobs) = {
            let mut editor = ReplayEditor::new(
                working_tree,
                hash_tree,
                &self.session,
                self.config.svndiff_window_max_bytes,
            );
            self.session.replay(rev, &mut editor).await?;
            editor.take_touched()
        };

        let tree_id = hash_tree.root_id();
        let (secs, micros) = parse_svn_date(&entry.date).ok_or_else(|| {
            LoaderError::UnsupportedRevisionShape {
                revision: rev,
                detail: format!("unparseable SVN log date: {}", entry.date),
            }
        })?;

        let revision = revision_builder::build_revision(
            tree_id,
            *parent_id,
            &entry.author,
            secs,
            micros,
            repo_uuid,
            rev,
            &entry.message,
        );

        self.submit_revision(hash_tree, &touched_dirs, &new_blobs, revision.clone()).await?;
        info!(rev, tree_id = %tree_id, revision_id = %revision.id, "revision committed");
        *parent_id = Some(revision.id);
        Ok(())
    }

    /// Submits one revision's objects in the order §4.E/§5 require: missing
    /// blobs, then missing directories (post-order, children before their
    /// parents), then the revision itself. All three steps must complete
    /// before the next revision's replay begins.
    #[instrument(skip(self, hash_tree, touched_dirs, new_blobs, revision))]
    async fn submit_revision(
        &self,
        hash_tree: &mut HashTree,
        touched_dirs: &HashSet<String>,
        new_blobs: &HashMap<ObjectId, Vec<u8>>,
        revision: RevisionObject,
    ) -> Result<(), LoaderError> {
        self.submit_blobs(new_blobs).await?;
        self.submit_directories(hash_tree, touched_dirs).await?;
        self.submit_single_revision(revision).await
    }

    async fn submit_blobs(&self, new_blobs: &HashMap<ObjectId, Vec<u8>>) -> Result<(), LoaderError> {
        if new_blobs.is_empty() {
            return Ok(());
        }
        let ids: Vec<ObjectId> = new_blobs.keys().copied().collect();
        let missing = self.with_retry("content_missing", || self.archive.content_missing(&ids)).await?;
        if missing.is_empty() {
            return Ok(());
        }
        let objects: Vec<BlobObject> = missing
            .iter()
            .map(|id| BlobObject {
                id: *id,
                content: new_blobs[id].clone(),
            })
            .collect();
        for batch in self.chunk_by_size(&objects, |b| b.content.len()) {
            self.with_retry("content_add", || self.archive.content_add(batch)).await?;
        }
        Ok(())
    }

    async fn submit_directories(
        &self,
        hash_tree: &mut HashTree,
        touched_dirs: &HashSet<String>,
    ) -> Result<(), LoaderError> {
        if touched_dirs.is_empty() {
            return Ok(());
        }
        let mut nodes: Vec<DirectoryNode> = Vec::with_capacity(touched_dirs.len());
        for path in touched_dirs {
            let Some(entries) = hash_tree.entries_of(path) else {
                continue;
            };
            let dir_entries: Vec<DirectoryEntry> = entries
                .into_iter()
                .map(|(name, mode, target)| DirectoryEntry { name, mode, target })
                .collect();
            nodes.push(DirectoryNode {
                path: path.clone(),
                entries: dir_entries,
            });
        }
        let ordered = revision_builder::order_directories_post_order(nodes);
        let candidates: Vec<DirectoryObject> = ordered
            .into_iter()
            .map(|n| revision_builder::build_directory(&n.entries))
            .collect();

        let ids: Vec<ObjectId> = candidates.iter().map(|d| d.id).collect();
        let missing = self
            .with_retry("directory_missing", || self.archive.directory_missing(&ids))
            .await?;
        if missing.is_empty() {
            return Ok(());
        }
        let missing_set: HashSet<ObjectId> = missing.into_iter().collect();
        // `candidates` is already in post-order (children before parents);
        // filtering preserves that relative order.
        let to_submit: Vec<DirectoryObject> =
            candidates.into_iter().filter(|d| missing_set.contains(&d.id)).collect();
        for batch in self.chunk_by_size(&to_submit, |d| {
            d.entries.iter().map(|e| e.name.len() + 24).sum()
        }) {
            self.with_retry("directory_add", || self.archive.directory_add(batch)).await?;
        }
        Ok(())
    }

    async fn submit_single_revision(&self, revision: RevisionObject) -> Result<(), LoaderError> {
        let ids = [revision.id];
        let missing = self
            .with_retry("revision_missing", || self.archive.revision_missing(&ids))
            .await?;
        if missing.is_empty() {
            return Ok(());
        }
        let batch = [revision];
        self.with_retry("revision_add", || self.archive.revision_add(&batch)).await
    }

    #[instrument(skip(self, revision_id))]
    async fn emit_snapshot(&self, revision_id: Option<ObjectId>) -> Result<ObjectId, LoaderError> {
        let branches = gitobj::serialize_snapshot_branches(revision_id);
        let id = gitobj::snapshot_id(&branches);
        let snapshot = SnapshotObject {
            id,
            origin_url: self.origin_url.clone(),
            revision_id,
        };
        self.with_retry("snapshot_add", || self.archive.snapshot_add(&snapshot)).await?;
        self.with_retry("origin_visit_update", || {
            self.archive.origin_visit_update(
                &self.origin_url,
                self.config.visit,
                VisitStatus::Full,
                Some(id),
            )
        })
        .await?;
        info!(snapshot_id = %id, "snapshot emitted");
        Ok(id)
    }

    async fn persist_visit_state(
        &self,
        last_svn_revision: i64,
        last_revision_id: Option<ObjectId>,
        last_revision_parent_id: Option<ObjectId>,
        last_snapshot_id: ObjectId,
    ) -> Result<(), LoaderError> {
        let Some(last_revision_id) = last_revision_id else {
            // No revisions at all were ever loaded (head_rev == 0): there
            // is nothing to persist besides the empty snapshot itself,
            // which the caller already submitted.
            return Ok(());
        };
        let repo_uuid = self.session.get_uuid().await?;
        let state = VisitState {
            last_svn_revision,
            last_revision_id,
            last_revision_parent_id,
            last_snapshot_id: Some(last_snapshot_id),
            repo_uuid,
        };
        self.visit_store.save(&self.origin_url, &state).await
    }

    /// Retries a transient `ArchiveError` with exponential backoff, up to
    /// `config.archive_retry_max_attempts` total tries (§7). Any other
    /// error kind propagates immediately — the core recovers nothing else.
    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut f: F) -> Result<T, LoaderError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, LoaderError>>,
    {
        let mut attempt = 0u32;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(LoaderError::Archive(e)) => {
                    attempt += 1;
                    if attempt >= self.config.archive_retry_max_attempts {
                        return Err(LoaderError::Archive(ArchiveError::RetriesExhausted {
                            attempts: attempt,
                            detail: e.to_string(),
                        }));
                    }
                    let delay_ms = self.config.archive_retry_base_delay_ms * (1u64 << (attempt - 1));
                    warn!(op, attempt, delay_ms, error = %e, "retrying archive operation");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Splits `items` into batches respecting both
    /// `archive_batch_max_objects` and `archive_batch_max_bytes` (§5).
    fn chunk_by_size<'a, T>(
        &self,
        items: &'a [T],
        size_of: impl Fn(&T) -> usize,
    ) -> Vec<&'a [T]> {
        if items.is_empty() {
            return Vec::new();
        }
        let mut batches = Vec::new();
        let mut start = 0;
        let mut count = 0usize;
        let mut bytes = 0usize;
        for (i, item) in items.iter().enumerate() {
            let item_size = size_of(item);
            if count > 0
                && (count >= self.config.archive_batch_max_objects
                    || bytes + item_size > self.config.archive_batch_max_bytes)
            {
                batches.push(&items[start..i]);
                start = i;
                count = 0;
                bytes = 0;
            }
            count += 1;
            bytes += item_size;
        }
        batches.push(&items[start..]);
        batches
    }
}

/// Convenience constructor mirroring the out-of-scope CLI's working
/// directory layout: one subdirectory per origin under a shared root.
pub fn scratch_dir_for_origin(root: &std::path::Path, origin_url: &str) -> PathBuf {
    let digest = gitobj::blob_id(origin_url.as_bytes()).to_hex();
    root.join(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svn::{ChangeAction, ChangedPath, CopyFrom, EditorOp, LogEntry};
    use crate::testing::{
        ExportFile, FixtureSvnSession, InMemoryArchiveClient, InMemoryVisitStateStore,
    };
    use crate::working_tree::FileKind;

    fn log_entry(rev: i64, author: &str, message: &str) -> LogEntry {
        LogEntry {
            revision: rev,
            author: author.to_string(),
            date: "2009-09-29T19:56:46.769580Z".to_string(),
            message: message.to_string(),
            changed_paths: vec![ChangedPath {
                path: "/trunk/a.txt".to_string(),
                action: ChangeAction::Added,
                copy_from: None,
            }],
        }
    }

    fn config(dir: &tempfile::TempDir) -> LoaderConfig {
        LoaderConfig::with_defaults(dir.path())
    }

    fn single_file_revision(rev: i64, path: &str, contents: &[u8], author: &str) -> (LogEntry, Vec<EditorOp>) {
        let log = log_entry(rev, author, &format!("revision {rev}"));
        let ops = vec![
            EditorOp::AddFile { path: path.to_string(), copy_from: None },
            EditorOp::ApplyTextdelta {
                path: path.to_string(),
                svndiff: crate::svndiff::literal_svndiff(contents),
            },
            EditorOp::CloseFile { path: path.to_string() },
        ];
        (log, ops)
    }

    #[tokio::test]
    async fn fresh_load_walks_every_revision_and_builds_a_linear_parent_chain() {
        let dir = tempfile::tempdir().unwrap();
        let (log1, ops1) = single_file_revision(1, "a.txt", b"one", "jrandom");
        let (log2, ops2) = single_file_revision(2, "a.txt", b"two", "jrandom");
        let session = FixtureSvnSession::new("repo-uuid", 2)
            .with_revision(1, log1, ops1)
            .with_revision(2, log2, ops2);
        let archive = InMemoryArchiveClient::new();
        let visit_store = InMemoryVisitStateStore::new();

        let walker = HistoryWalker::new(session, archive, visit_store, "file:///repo", config(&dir));
        let summary = walker.run().await.unwrap();

        assert_eq!(summary.revisions_loaded, 2);
        assert!(!summary.cancelled);
        assert!(summary.final_revision_id.is_some());
        assert_eq!(*walker.archive.revisions_added.lock().unwrap(), 2);
        assert_eq!(*walker.archive.blobs_added.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn idempotent_second_load_adds_nothing_new() {
        let dir = tempfile::tempdir().unwrap();
        let (log1, ops1) = single_file_revision(1, "a.txt", b"one", "jrandom");
        let session1 = FixtureSvnSession::new("repo-uuid", 1).with_revision(1, log1.clone(), ops1.clone());
        let archive = InMemoryArchiveClient::new();
        let visit_store = InMemoryVisitStateStore::new();
        let walker = HistoryWalker::new(session1, archive, visit_store, "file:///repo", config(&dir));
        let first = walker.run().await.unwrap();

        // Second load: same origin, same revision range, with a resume
        // export fixture that reproduces the exact working copy contents.
        let session2 = FixtureSvnSession::new("repo-uuid", 1)
            .with_revision(1, log1, ops1)
            .with_export(
                "",
                1,
                vec![ExportFile { rel_path: "a.txt".to_string(), contents: b"one".to_vec(), kind: FileKind::Regular }],
            );
        let dir2 = tempfile::tempdir().unwrap();
        let walker2 = HistoryWalker::new(session2, walker.archive, walker.visit_store, "file:///repo", config(&dir2));
        let second = walker2.run().await.unwrap();

        assert_eq!(second.revisions_loaded, 0);
        assert_eq!(first.final_revision_id, second.final_revision_id);
        assert_eq!(first.snapshot_id, second.snapshot_id);
        assert_eq!(*walker2.archive.revisions_added.lock().unwrap(), 1);
        assert_eq!(*walker2.archive.blobs_added.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn resume_equivalence_matches_a_single_run() {
        let dir_one_shot = tempfile::tempdir().unwrap();
        let (log1, ops1) = single_file_revision(1, "a.txt", b"one", "jrandom");
        let (log2, ops2) = single_file_revision(2, "a.txt", b"two", "jrandom");
        let (log3, ops3) = single_file_revision(3, "a.txt", b"three", "jrandom");

        let one_shot_session = FixtureSvnSession::new("repo-uuid", 3)
            .with_revision(1, log1.clone(), ops1.clone())
            .with_revision(2, log2.clone(), ops2.clone())
            .with_revision(3, log3.clone(), ops3.clone());
        let one_shot = HistoryWalker::new(
            one_shot_session,
            InMemoryArchiveClient::new(),
            InMemoryVisitStateStore::new(),
            "file:///repo",
            config(&dir_one_shot),
        );
        let one_shot_summary = one_shot.run().await.unwrap();

        // Two runs: rev 1..2, then rev 3, resuming in between.
        let dir_first = tempfile::tempdir().unwrap();
        let first_session = FixtureSvnSession::new("repo-uuid", 2)
            .with_revision(1, log1.clone(), ops1.clone())
            .with_revision(2, log2.clone(), ops2.clone());
        let first_run = HistoryWalker::new(
            first_session,
            InMemoryArchiveClient::new(),
            InMemoryVisitStateStore::new(),
            "file:///repo",
            config(&dir_first),
        );
        first_run.run().await.unwrap();

        let dir_second = tempfile::tempdir().unwrap();
        let second_session = FixtureSvnSession::new("repo-uuid", 3)
            .with_revision(1, log1, ops1)
            .with_revision(2, log2, ops2)
            .with_revision(3, log3, ops3)
            .with_export(
                "",
                2,
                vec![ExportFile { rel_path: "a.txt".to_string(), contents: b"two".to_vec(), kind: FileKind::Regular }],
            );
        let second_run = HistoryWalker::new(
            second_session,
            first_run.archive,
            first_run.visit_store,
            "file:///repo",
            config(&dir_second),
        );
        let resumed_summary = second_run.run().await.unwrap();

        assert_eq!(one_shot_summary.final_revision_id, resumed_summary.final_revision_id);
    }

    /// The persisted `VisitState.last_revision_parent_id` must be the
    /// *parent* of `last_revision_id`, not `last_revision_id` itself — a
    /// three-revision load's stored parent must equal revision 2's id, and
    /// a second resume-then-no-op load (§4.F step 4) must carry that same
    /// value forward unchanged rather than collapsing it to the tip.
    #[tokio::test]
    async fn persisted_visit_state_records_the_true_parent_of_the_last_revision() {
        let dir = tempfile::tempdir().unwrap();
        let (log1, ops1) = single_file_revision(1, "a.txt", b"one", "jrandom");
        let (log2, ops2) = single_file_revision(2, "a.txt", b"two", "jrandom");
        let (log3, ops3) = single_file_revision(3, "a.txt", b"three", "jrandom");
        let session = FixtureSvnSession::new("repo-uuid", 3)
            .with_revision(1, log1, ops1)
            .with_revision(2, log2, ops2)
            .with_revision(3, log3.clone(), ops3.clone());
        let archive = InMemoryArchiveClient::new();
        let visit_store = InMemoryVisitStateStore::new();
        let walker = HistoryWalker::new(session, archive, visit_store, "file:///repo", config(&dir));
        let summary = walker.run().await.unwrap();

        let rev3_id = summary.final_revision_id.unwrap();
        let rev2_id = walker.archive.revision(&rev3_id).unwrap().parent_id.unwrap();
        let state = walker.visit_store.load("file:///repo").await.unwrap().unwrap();
        assert_eq!(state.last_revision_id, rev3_id);
        assert_eq!(state.last_revision_parent_id, Some(rev2_id));
        assert_ne!(state.last_revision_parent_id, Some(state.last_revision_id));

        // A second, no-op load (nothing new to replay) must carry the same
        // parent forward rather than collapsing it to the tip revision. Its
        // session still needs revision 3's log record (resume verification
        // recomputes that revision's manifest) even though replay never runs.
        let dir2 = tempfile::tempdir().unwrap();
        let session2 = FixtureSvnSession::new("repo-uuid", 3)
            .with_revision(3, log3, ops3)
            .with_export(
                "",
                3,
                vec![ExportFile { rel_path: "a.txt".to_string(), contents: b"three".to_vec(), kind: FileKind::Regular }],
            );
        let walker2 = HistoryWalker::new(session2, walker.archive, walker.visit_store, "file:///repo", config(&dir2));
        let summary2 = walker2.run().await.unwrap();
        assert_eq!(summary2.revisions_loaded, 0);
        let state2 = walker2.visit_store.load("file:///repo").await.unwrap().unwrap();
        assert_eq!(state2.last_revision_parent_id, Some(rev2_id));
    }

    #[tokio::test]
    async fn altered_history_is_detected_and_nothing_new_is_emitted() {
        let dir = tempfile::tempdir().unwrap();
        let (log1, ops1) = single_file_revision(1, "a.txt", b"one", "jrandom");
        let session = FixtureSvnSession::new("repo-uuid", 1).with_revision(1, log1.clone(), ops1.clone());
        let archive = InMemoryArchiveClient::new();
        let visit_store = InMemoryVisitStateStore::new();
        let walker = HistoryWalker::new(session, archive, visit_store, "file:///repo", config(&dir));
        walker.run().await.unwrap();
        let snapshots_before = walker.archive.snapshots().len();

        // A second session claims the same revision 1 but with a different
        // author -- the tree and commit manifest both change underneath
        // the previously recorded VisitState.
        let (altered_log, altered_ops) = single_file_revision(1, "a.txt", b"one", "someone-else");
        let altered_session = FixtureSvnSession::new("repo-uuid", 1)
            .with_revision(1, altered_log, altered_ops)
            .with_export(
                "",
                1,
                vec![ExportFile { rel_path: "a.txt".to_string(), contents: b"one".to_vec(), kind: FileKind::Regular }],
            );
        let dir2 = tempfile::tempdir().unwrap();
        let walker2 = HistoryWalker::new(
            altered_session,
            walker.archive,
            walker.visit_store,
            "file:///repo",
            config(&dir2),
        );
        let result = walker2.run().await;
        assert!(matches!(result, Err(LoaderError::HistoryAltered { .. })));
        assert_eq!(walker2.archive.snapshots().len(), snapshots_before);
    }

    #[tokio::test]
    async fn cancel_flag_stops_between_revisions_without_a_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (log1, ops1) = single_file_revision(1, "a.txt", b"one", "jrandom");
        let (log2, ops2) = single_file_revision(2, "a.txt", b"two", "jrandom");
        let (log3, ops3) = single_file_revision(3, "a.txt", b"three", "jrandom");
        let session = FixtureSvnSession::new("repo-uuid", 3)
            .with_revision(1, log1, ops1)
            .with_revision(2, log2, ops2)
            .with_revision(3, log3, ops3);
        let archive = InMemoryArchiveClient::new();
        let visit_store = InMemoryVisitStateStore::new();

        let flag = Arc::new(AtomicBool::new(false));
        let walker = HistoryWalker::new(session, archive, visit_store, "file:///repo", config(&dir))
            .with_cancel_flag(flag.clone());
        flag.store(true, Ordering::SeqCst);

        let summary = walker.run().await.unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.revisions_loaded, 1);
        assert!(summary.snapshot_id.is_none());
        assert!(walker.archive.snapshots().is_empty());
        assert!(walker.visit_store.load("file:///repo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_repository_emits_a_well_defined_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let session = FixtureSvnSession::new("repo-uuid", 0);
        let archive = InMemoryArchiveClient::new();
        let visit_store = InMemoryVisitStateStore::new();
        let walker = HistoryWalker::new(session, archive, visit_store, "file:///repo", config(&dir));
        let summary = walker.run().await.unwrap();

        assert_eq!(summary.revisions_loaded, 0);
        assert!(summary.final_revision_id.is_none());
        let snapshots = walker.archive.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert!(snapshots[0].revision_id.is_none());
        assert_eq!(snapshots[0].id, gitobj::snapshot_id(&gitobj::serialize_snapshot_branches(None)));
    }

    #[tokio::test]
    async fn copy_from_subtree_matches_source_subtree_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let log1 = log_entry(1, "jrandom", "create trunk");
        let ops1 = vec![
            EditorOp::AddDirectory { path: "trunk".to_string(), copy_from: None },
            EditorOp::AddFile { path: "trunk/a.txt".to_string(), copy_from: None },
            EditorOp::ApplyTextdelta {
                path: "trunk/a.txt".to_string(),
                svndiff: crate::svndiff::literal_svndiff(b"hello"),
            },
            EditorOp::CloseFile { path: "trunk/a.txt".to_string() },
        ];
        let log2 = log_entry(2, "jrandom", "branch trunk");
        let ops2 = vec![EditorOp::AddDirectory {
            path: "branches/b1".to_string(),
            copy_from: Some(CopyFrom { path: "trunk".to_string(), revision: 1 }),
        }];

        let session = FixtureSvnSession::new("repo-uuid", 2)
            .with_revision(1, log1, ops1)
            .with_revision(2, log2, ops2)
            .with_export(
                "trunk",
                1,
                vec![ExportFile {
                    rel_path: "a.txt".to_string(),
                    contents: b"hello".to_vec(),
                    kind: FileKind::Regular,
                }],
            );
        let archive = InMemoryArchiveClient::new();
        let visit_store = InMemoryVisitStateStore::new();
        let walker = HistoryWalker::new(session, archive, visit_store, "file:///repo", config(&dir));
        walker.run().await.unwrap();

        // trunk and branches/b1 both contain only a.txt -> blob_id(b"hello"),
        // so copying trunk must produce the same directory identifier rather
        // than a freshly-submitted, distinct one.
        let expected_dir = revision_builder::build_directory(&[DirectoryEntry {
            name: "a.txt".to_string(),
            mode: gitobj::EntryMode::RegularFile,
            target: gitobj::blob_id(b"hello"),
        }]);
        assert!(walker.archive.directory(&expected_dir.id).is_some());
        assert_eq!(walker.archive.revision_ids().len(), 2);
    }
}
