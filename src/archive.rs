//! The Archive Client interface (§4.H, §6): the content-addressed storage
//! collaborator the History Walker and Revision Builder submit objects to.
//! No production implementation ships in this crate — the archive storage
//! layer is explicitly out of scope. `crate::testing::InMemoryArchiveClient`
//! is the fixture used to exercise the rest of the pipeline.

use async_trait::async_trait;

use crate::errors::LoaderError;
use crate::gitobj::{EntryMode, ObjectId};

/// A blob object ready for archive submission: its id and raw content.
#[derive(Debug, Clone)]
pub struct BlobObject {
    pub id: ObjectId,
    pub content: Vec<u8>,
}

/// One entry of a directory object's body, mirroring `gitobj::TreeEntryRef`
/// but owned so it can be batched and submitted independently of the Hash
/// Tree node it was read from.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub name: String,
    pub mode: EntryMode,
    pub target: ObjectId,
}

/// A directory object ready for archive submission.
#[derive(Debug, Clone)]
pub struct DirectoryObject {
    pub id: ObjectId,
    pub entries: Vec<DirectoryEntry>,
}

/// A revision (commit) object ready for archive submission.
#[derive(Debug, Clone)]
pub struct RevisionObject {
    pub id: ObjectId,
    pub tree_id: ObjectId,
    pub parent_id: Option<ObjectId>,
    pub author: String,
    pub author_epoch_secs: i64,
    pub author_epoch_micros: u32,
    pub svn_repo_uuid: String,
    pub svn_revision: i64,
    pub message: String,
}

/// A named pointer at the tip of an origin visit's revision history, the
/// final object submitted once a load reaches the target revision.
/// `revision_id` is `None` only for a repository with no revisions at all
/// (head revision 0) — the "empty snapshot" case.
#[derive(Debug, Clone)]
pub struct SnapshotObject {
    pub id: ObjectId,
    pub origin_url: String,
    pub revision_id: Option<ObjectId>,
}

/// Bookkeeping status recorded for the overall origin visit, submitted
/// alongside (but independent of) content objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitStatus {
    Full,
    Partial,
}

/// The archive storage collaborator. Every method is a batch submission or
/// membership check; the History Walker is responsible for batching per
/// `LoaderConfig`'s `archive_batch_max_objects`/`archive_batch_max_bytes`
/// and for retrying per `archive_retry_max_attempts`.
#[async_trait]
pub trait ArchiveClient {
    /// Returns the subset of `ids` the archive does not already hold.
    async fn content_missing(&self, ids: &[ObjectId]) -> Result<Vec<ObjectId>, LoaderError>;
    async fn content_add(&self, blobs: &[BlobObject]) -> Result<(), LoaderError>;

    async fn directory_missing(&self, ids: &[ObjectId]) -> Result<Vec<ObjectId>, LoaderError>;
    async fn directory_add(&self, dirs: &[DirectoryObject]) -> Result<(), LoaderError>;

    async fn revision_missing(&self, ids: &[ObjectId]) -> Result<Vec<ObjectId>, LoaderError>;
    async fn revision_add(&self, revisions: &[RevisionObject]) -> Result<(), LoaderError>;

    async fn snapshot_add(&self, snapshot: &SnapshotObject) -> Result<(), LoaderError>;

    /// Records the overall status of one origin visit. `visit` identifies
    /// which visit this status belongs to (assigned by the caller that
    /// created it); `snapshot_id` links the status to the snapshot this
    /// load emitted, when one was emitted.
    async fn origin_visit_update(
        &self,
        origin_url: &str,
        visit: i64,
        status: VisitStatus,
        snapshot_id: Option<ObjectId>,
    ) -> Result<(), LoaderError>;
}

/// Lets a caller hand `HistoryWalker` a shared handle (`Arc<impl ArchiveClient>`)
/// while retaining its own clone to inspect what was submitted afterward —
/// the History Walker otherwise takes ownership of its archive client.
#[async_trait]
impl<T: ArchiveClient + Sync + Send> ArchiveClient for std::sync::Arc<T> {
    async fn content_missing(&self, ids: &[ObjectId]) -> Result<Vec<ObjectId>, LoaderError> {
        (**self).content_missing(ids).await
    }

    async fn content_add(&self, blobs: &[BlobObject]) -> Result<(), LoaderError> {
        (**self).content_add(blobs).await
    }

    async fn directory_missing(&self, ids: &[ObjectId]) -> Result<Vec<ObjectId>, LoaderError> {
        (**self).directory_missing(ids).await
    }

    async fn directory_add(&self, dirs: &[DirectoryObject]) -> Result<(), LoaderError> {
        (**self).directory_add(dirs).await
    }

    async fn revision_missing(&self, ids: &[ObjectId]) -> Result<Vec<ObjectId>, LoaderError> {
        (**self).revision_missing(ids).await
    }

    async fn revision_add(&self, revisions: &[RevisionObject]) -> Result<(), LoaderError> {
        (**self).revision_add(revisions).await
    }

    async fn snapshot_add(&self, snapshot: &SnapshotObject) -> Result<(), LoaderError> {
        (**self).snapshot_add(snapshot).await
    }

    async fn origin_visit_update(
        &self,
        origin_url: &str,
        visit: i64,
        status: VisitStatus,
        snapshot_id: Option<ObjectId>,
    ) -> Result<(), LoaderError> {
        (**self)
            .origin_visit_update(origin_url, visit, status, snapshot_id)
            .await
    }
}
