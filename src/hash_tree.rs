//! Hash Tree (§4.C): an in-memory Merkle tree mirroring the Working Tree.
//! Each directory node caches its content-addressed tree id; mutations along
//! a path invalidate every ancestor directory on that path so `root_id`
//! only has to recompute what actually changed.
//!
//! Per the design notes, there are no back-pointers from a node to its
//! parent — invalidation rides the recursion stack of the mutating call,
//! not a cyclic parent reference.

use std::collections::BTreeMap;

use crate::gitobj::{self, EntryMode, ObjectId, TreeEntryRef};

/// A single entry of the Hash Tree: either a blob leaf or a nested
/// directory.
#[derive(Debug, Clone)]
enum Node {
    File { blob_id: ObjectId, mode: EntryMode },
    Dir(DirNode),
}

#[derive(Debug, Clone, Default)]
struct DirNode {
    entries: BTreeMap<String, Node>,
    /// `None` means dirty (needs recomputation).
    cached_id: Option<ObjectId>,
}

impl DirNode {
    fn mark_dirty(&mut self) {
        self.cached_id = None;
    }
}

/// The in-memory Merkle tree mirroring the Working Tree.
#[derive(Debug, Clone, Default)]
pub struct HashTree {
    root: DirNode,
}

fn split(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

impl HashTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a leaf at `path`, creating any missing
    /// intermediate directories. Marks all ancestors dirty.
    pub fn put_file(&mut self, path: &str, blob_id: ObjectId, mode: EntryMode) {
        assert!(!mode.is_dir(), "put_file requires a non-directory mode");
        let components = split(path);
        assert!(!components.is_empty(), "cannot put a file at the empty path");
        Self::put_file_rec(&mut self.root, &components, blob_id, mode);
    }

    fn put_file_rec(dir: &mut DirNode, components: &[&str], blob_id: ObjectId, mode: EntryMode) {
        dir.mark_dirty();
        let (head, rest) = (components[0], &components[1..]);
        if rest.is_empty() {
            dir.entries
                .insert(head.to_string(), Node::File { blob_id, mode });
            return;
        }
        let child = dir
            .entries
            .entry(head.to_string())
            .or_insert_with(|| Node::Dir(DirNode::default()));
        let child_dir = match child {
            Node::Dir(d) => d,
            Node::File { .. } => {
                *child = Node::Dir(DirNode::default());
                match child {
                    Node::Dir(d) => d,
                    Node::File { .. } => unreachable!(),
                }
            }
        };
        Self::put_file_rec(child_dir, rest, blob_id, mode);
    }

    /// Creates an empty directory at `path` (a no-op if one already exists
    /// there). Marks ancestors dirty.
    pub fn put_dir(&mut self, path: &str) {
        let components = split(path);
        if components.is_empty() {
            return;
        }
        Self::put_dir_rec(&mut self.root, &components);
    }

    fn put_dir_rec(dir: &mut DirNode, components: &[&str]) {
        dir.mark_dirty();
        let (head, rest) = (components[0], &components[1..]);
        let child = dir
            .entries
            .entry(head.to_string())
            .or_insert_with(|| Node::Dir(DirNode::default()));
        let child_dir = match child {
            Node::Dir(d) => d,
            Node::File { .. } => {
                *child = Node::Dir(DirNode::default());
                match child {
                    Node::Dir(d) => d,
                    Node::File { .. } => unreachable!(),
                }
            }
        };
        if !rest.is_empty() {
            Self::put_dir_rec(child_dir, rest);
        }
    }

    /// Removes the subtree at `path`, if present. Marks ancestors dirty.
    pub fn remove(&mut self, path: &str) {
        let components = split(path);
        if components.is_empty() {
            return;
        }
        Self::remove_rec(&mut self.root, &components);
    }

    fn remove_rec(dir: &mut DirNode, components: &[&str]) {
        dir.mark_dirty();
        let (head, rest) = (components[0], &components[1..]);
        if rest.is_empty() {
            dir.entries.remove(head);
            return;
        }
        if let Some(Node::Dir(child_dir)) = dir.entries.get_mut(head) {
            Self::remove_rec(child_dir, rest);
        }
    }

    /// Moves the subtree at `src` to `dst`. Equivalent to remove + re-insert
    /// of the same node value: the moved subtree's own cached identifiers
    /// are preserved, only the two paths' ancestors are marked dirty.
    pub fn move_path(&mut self, src: &str, dst: &str) {
        let src_components = split(src);
        let dst_components = split(dst);
        if src_components.is_empty() || dst_components.is_empty() {
            return;
        }
        let Some(node) = Self::take_rec(&mut self.root, &src_components) else {
            return;
        };
        Self::insert_node_rec(&mut self.root, &dst_components, node);
    }

    fn take_rec(dir: &mut DirNode, components: &[&str]) -> Option<Node> {
        dir.mark_dirty();
        let (head, rest) = (components[0], &components[1..]);
        if rest.is_empty() {
            return dir.entries.remove(head);
        }
        match dir.entries.get_mut(head) {
            Some(Node::Dir(child_dir)) => Self::take_rec(child_dir, rest),
            _ => None,
        }
    }

    fn insert_node_rec(dir: &mut DirNode, components: &[&str], node: Node) {
        dir.mark_dirty();
        let (head, rest) = (components[0], &components[1..]);
        if rest.is_empty() {
            dir.entries.insert(head.to_string(), node);
            return;
        }
        let child = dir
            .entries
            .entry(head.to_string())
            .or_insert_with(|| Node::Dir(DirNode::default()));
        if let Node::Dir(child_dir) = child {
            Self::insert_node_rec(child_dir, rest, node);
        }
    }

    /// Looks up the blob id of an existing file leaf, used by the Replay
    /// Editor when applying a text delta against prior content.
    pub fn file_blob_id(&self, path: &str) -> Option<ObjectId> {
        let components = split(path);
        if components.is_empty() {
            return None;
        }
        let mut dir = &self.root;
        for (i, head) in components.iter().enumerate() {
            match dir.entries.get(*head) {
                Some(Node::File { blob_id, .. }) if i == components.len() - 1 => {
                    return Some(*blob_id)
                }
                Some(Node::Dir(child)) if i < components.len() - 1 => dir = child,
                _ => return None,
            }
        }
        None
    }

    /// Recomputes every dirty directory bottom-up and returns the root tree
    /// identifier. Empty directories (zero entries) still hash and
    /// contribute their own tree id — they are never pruned.
    pub fn root_id(&mut self) -> ObjectId {
        Self::compute(&mut self.root)
    }

    /// Returns the (name, mode, target-id) entries of the directory at
    /// `path` (the root directory if `path` is empty), for archive
    /// submission. Every `cached_id` must already be fresh — call
    /// `root_id()` first.
    pub fn entries_of(&self, path: &str) -> Option<Vec<(String, EntryMode, ObjectId)>> {
        let components = split(path);
        let mut dir = &self.root;
        for head in &components {
            match dir.entries.get(*head) {
                Some(Node::Dir(child)) => dir = child,
                _ => return None,
            }
        }
        Some(
            dir.entries
                .iter()
                .map(|(name, node)| match node {
                    Node::File { blob_id, mode } => (name.clone(), *mode, *blob_id),
                    Node::Dir(child) => (
                        name.clone(),
                        EntryMode::Directory,
                        child.cached_id.expect("entries_of called before root_id()"),
                    ),
                })
                .collect(),
        )
    }

    fn compute(dir: &mut DirNode) -> ObjectId {
        if let Some(id) = dir.cached_id {
            return id;
        }
        let mut owned_entries: Vec<(String, EntryMode, ObjectId)> =
            Vec::with_capacity(dir.entries.len());
        for (name, node) in dir.entries.iter_mut() {
            let (mode, id) = match node {
                Node::File { blob_id, mode } => (*mode, *blob_id),
                Node::Dir(child) => (EntryMode::Directory, Self::compute(child)),
            };
            owned_entries.push((name.clone(), mode, id));
        }
        let refs: Vec<TreeEntryRef<'_>> = owned_entries
            .iter()
            .map(|(name, mode, id)| TreeEntryRef {
                name,
                mode: *mode,
                target: *id,
            })
            .collect();
        let id = gitobj::tree_id(&gitobj::serialize_tree_entries(&refs));
        dir.cached_id = Some(id);
        id
    }
}
