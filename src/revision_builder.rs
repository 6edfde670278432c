//! Revision Builder (§4.E): assembles the commit manifest for one revision
//! and computes its content-addressed identifier, then hands the caller the
//! ordered batch of objects (missing blobs, missing directories post-order,
//! the revision itself) ready for `ArchiveClient` submission.

use crate::archive::{DirectoryEntry, DirectoryObject, RevisionObject};
use crate::gitobj::{self, EntryMode, ObjectId};

/// Builds the manifest body a revision's commit id is hashed from.
///
/// `author` is the SVN author verbatim — no synthetic `@uuid` email is
/// appended (Open Question, resolved). `parent_id` is `None` only for the
/// first revision loaded in an origin visit.
pub fn build_manifest(
    tree_id: ObjectId,
    parent_id: Option<ObjectId>,
    author: &str,
    author_epoch_secs: i64,
    author_epoch_micros: u32,
    svn_repo_uuid: &str,
    svn_revision: i64,
    message: &str,
) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(&format!("tree {}\n", tree_id.to_hex()));
    if let Some(parent) = parent_id {
        out.push_str(&format!("parent {}\n", parent.to_hex()));
    }
    out.push_str(&format!(
        "author {author} {author_epoch_secs}.{author_epoch_micros:06} +0000\n"
    ));
    out.push_str(&format!(
        "committer {author} {author_epoch_secs}.{author_epoch_micros:06} +0000\n"
    ));
    out.push_str(&format!("svn_repo_uuid {svn_repo_uuid}\n"));
    out.push_str(&format!("svn_revision {svn_revision}\n"));
    out.push('\n');
    out.push_str(message);
    out.into_bytes()
}

/// Builds the complete `RevisionObject` for one revision, ready for
/// submission once its tree and every ancestor directory are known to the
/// archive.
#[allow(clippy::too_many_arguments)]
pub fn build_revision(
    tree_id: ObjectId,
    parent_id: Option<ObjectId>,
    author: &str,
    author_epoch_secs: i64,
    author_epoch_micros: u32,
    svn_repo_uuid: &str,
    svn_revision: i64,
    message: &str,
) -> RevisionObject {
    let manifest = build_manifest(
        tree_id,
        parent_id,
        author,
        author_epoch_secs,
        author_epoch_micros,
        svn_repo_uuid,
        svn_revision,
        message,
    );
    RevisionObject {
        id: gitobj::commit_id(&manifest),
        tree_id,
        parent_id,
        author: author.to_string(),
        author_epoch_secs,
        author_epoch_micros,
        svn_repo_uuid: svn_repo_uuid.to_string(),
        svn_revision,
        message: message.to_string(),
    }
}

/// Serializes one directory's entries into a `DirectoryObject`, matching
/// the Hash Tree's own `gitobj::tree_id`/`serialize_tree_entries` framing.
pub fn build_directory(entries: &[DirectoryEntry]) -> DirectoryObject {
    let refs: Vec<gitobj::TreeEntryRef<'_>> = entries
        .iter()
        .map(|e| gitobj::TreeEntryRef {
            name: &e.name,
            mode: e.mode,
            target: e.target,
        })
        .collect();
    let serialized = gitobj::serialize_tree_entries(&refs);
    DirectoryObject {
        id: gitobj::tree_id(&serialized),
        entries: entries.to_vec(),
    }
}

/// A single directory node gathered while walking the Hash Tree bottom-up,
/// used to order directory submissions so every child directory is
/// archived before its parent.
#[derive(Debug, Clone)]
pub struct DirectoryNode {
    pub path: String,
    pub entries: Vec<DirectoryEntry>,
}

/// Orders a set of collected directory nodes so that no directory appears
/// before any directory it references as a child entry — a simple
/// depth-based sort, since deeper paths can only be referenced by their
/// shallower ancestors.
pub fn order_directories_post_order(mut nodes: Vec<DirectoryNode>) -> Vec<DirectoryNode> {
    nodes.sort_by_key(|n| std::cmp::Reverse(depth(&n.path)));
    nodes
}

/// The root path (`""`) is depth 0; every other path is `1 +` its number of
/// `/` separators. Without forcing the root to its own depth, a top-level
/// directory like `"a"` (zero slashes) ties with `""` (also zero slashes)
/// and the stable sort can place the root before it, violating the
/// children-before-parents ordering.
fn depth(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.matches('/').count() + 1
    }
}
