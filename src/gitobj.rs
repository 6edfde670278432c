//! Byte-exact, Git-compatible object framing and hashing.
//!
//! Both the Hash Tree (directory identifiers) and the Revision Builder
//! (commit identifiers) need the same `"<kind> <len>\0" + body` framing
//! and SHA-1 digest that `git hash-object` produces, so it lives here once
//! rather than being duplicated at both call sites.

use std::fmt;
use std::str::FromStr;

use sha1::{Digest, Sha1};

/// A 20-byte SHA-1 digest, displayed as lowercase hex exactly like
/// `git hash-object` / `git cat-file` would print it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 20]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Error returned when parsing a malformed hex object id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseObjectIdError {
    #[error("object id must be 40 hex characters, got {0}")]
    WrongLength(usize),
    #[error("object id is not valid hex: {0}")]
    InvalidHex(String),
}

impl FromStr for ObjectId {
    type Err = ParseObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(ParseObjectIdError::WrongLength(s.len()));
        }
        let bytes =
            hex::decode(s).map_err(|e| ParseObjectIdError::InvalidHex(e.to_string()))?;
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl serde::Serialize for ObjectId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for ObjectId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The well-known SHA-1 of an empty Git blob (`git hash-object -t blob /dev/null`).
pub const EMPTY_BLOB_HEX: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";

/// The well-known SHA-1 of an empty Git tree (`git hash-object -t tree /dev/null`).
pub const EMPTY_TREE_HEX: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

fn framed_hash(kind: &str, body: &[u8]) -> ObjectId {
    let header = format!("{} {}\0", kind, body.len());
    let mut hasher = Sha1::new();
    hasher.update(header.as_bytes());
    hasher.update(body);
    let digest = hasher.finalize();
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest);
    ObjectId(bytes)
}

/// Identifier of a blob: hash of `"blob <len>\0"` followed by `bytes`.
pub fn blob_id(bytes: &[u8]) -> ObjectId {
    framed_hash("blob", bytes)
}

/// Unix permission bits a tree entry may carry, mirroring Git's four modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    RegularFile,
    ExecutableFile,
    Symlink,
    Directory,
}

impl EntryMode {
    /// Octal mode string as Git prints it (no leading `0` in the `ls-tree`
    /// sense — Git always emits 6 digits for files/symlinks and `40000` for
    /// trees).
    fn as_octal(self) -> &'static str {
        match self {
            EntryMode::RegularFile => "100644",
            EntryMode::ExecutableFile => "100755",
            EntryMode::Symlink => "120000",
            EntryMode::Directory => "40000",
        }
    }

    pub fn is_dir(self) -> bool {
        matches!(self, EntryMode::Directory)
    }
}

/// One entry going into a tree's serialized body.
#[derive(Debug, Clone, Copy)]
pub struct TreeEntryRef<'a> {
    pub name: &'a str,
    pub mode: EntryMode,
    pub target: ObjectId,
}

/// Serializes tree entries per §3: `perm SP name \0 raw-target-id`,
/// concatenated in ascending byte-lexicographic order of name with a
/// synthetic trailing `/` on directory names used only to decide sort
/// order (never emitted).
///
/// Entries must already be unique by name; this function does not dedup.
pub fn serialize_tree_entries(entries: &[TreeEntryRef<'_>]) -> Vec<u8> {
    let mut sorted: Vec<&TreeEntryRef<'_>> = entries.iter().collect();
    sorted.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

    let mut body = Vec::new();
    for entry in sorted {
        body.extend_from_slice(entry.mode.as_octal().as_bytes());
        body.push(b' ');
        body.extend_from_slice(entry.name.as_bytes());
        body.push(0);
        body.extend_from_slice(entry.target.as_bytes());
    }
    body
}

fn sort_key(entry: &TreeEntryRef<'_>) -> String {
    if entry.mode.is_dir() {
        format!("{}/", entry.name)
    } else {
        entry.name.to_string()
    }
}

/// Identifier of a tree from its already-serialized entry body.
pub fn tree_id(serialized_entries: &[u8]) -> ObjectId {
    framed_hash("tree", serialized_entries)
}

/// Identifier of a commit (revision) from its manifest body (see
/// `revision_builder::build_manifest` for manifest construction).
pub fn commit_id(manifest: &[u8]) -> ObjectId {
    framed_hash("commit", manifest)
}

/// Serializes a snapshot's single `HEAD` branch. A repository with no
/// revisions at all has no branch to point anywhere, so its serialized
/// branch set is empty — the "well-defined empty-snapshot identifier" of
/// §8 scenario 5.
pub fn serialize_snapshot_branches(revision_id: Option<ObjectId>) -> Vec<u8> {
    match revision_id {
        Some(id) => format!("HEAD {}\n", id.to_hex()).into_bytes(),
        None => Vec::new(),
    }
}

/// Identifier of a snapshot from its serialized branch set.
pub fn snapshot_id(serialized_branches: &[u8]) -> ObjectId {
    framed_hash("snapshot", serialized_branches)
}
