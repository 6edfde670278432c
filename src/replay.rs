//! Replay Editor (§4.D): receives the SVN editor callback stream for one
//! revision and mutates the Working Tree and Hash Tree in lockstep.
//!
//! Properties on a file accumulate in a side map until `close_file`, which
//! is the only point at which EOL style (and `svn:special`/`svn:executable`)
//! are resolved — directory properties are never inherited by files for
//! this purpose (§4.D).

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::eol::{self, EolStyle};
use crate::errors::{LoaderError, WorkingTreeError};
use crate::gitobj::{self, EntryMode, ObjectId};
use crate::hash_tree::HashTree;
use crate::svn::{CopyFrom, EditorSink, SvnSession};
use crate::svndiff;
use crate::working_tree::{FileKind, WorkingTree};

const SVN_SPECIAL: &str = "svn:special";
const SVN_EXECUTABLE: &str = "svn:executable";
const SVN_EOL_STYLE: &str = "svn:eol-style";
const SYMLINK_PREFIX: &str = "link ";

/// Mutates a `WorkingTree`/`HashTree` pair for the duration of one
/// revision's replay. Borrowed rather than owned: the History Walker keeps
/// both alive across every revision in a load.
pub struct ReplayEditor<'a> {
    working_tree: &'a WorkingTree,
    hash_tree: &'a mut HashTree,
    session: &'a (dyn SvnSession + Sync),
    svndiff_window_max_bytes: usize,
    file_props: HashMap<String, HashMap<String, Option<String>>>,
    pending_content: HashMap<String, Vec<u8>>,
    touched_dirs: HashSet<String>,
    new_blobs: HashMap<ObjectId, Vec<u8>>,
}

impl<'a> ReplayEditor<'a> {
    pub fn new(
        working_tree: &'a WorkingTree,
        hash_tree: &'a mut HashTree,
        session: &'a (dyn SvnSession + Sync),
        svndiff_window_max_bytes: usize,
    ) -> Self {
        Self {
            working_tree,
            hash_tree,
            session,
            svndiff_window_max_bytes,
            file_props: HashMap::new(),
            pending_content: HashMap::new(),
            touched_dirs: HashSet::new(),
            new_blobs: HashMap::new(),
        }
    }

    /// Marks `path` and every ancestor directory (including the root, `""`)
    /// as touched by the revision currently being replayed, so the History
    /// Walker only re-derives `DirectoryObject`s for directories the
    /// revision actually changed.
    fn touch_ancestors(&mut self, path: &str) {
        self.touched_dirs.insert(String::new());
        let mut components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        components.pop();
        let mut prefix = String::new();
        for c in components {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(c);
            self.touched_dirs.insert(prefix.clone());
        }
    }

    /// Drains this revision's touched-directory paths and newly produced
    /// blob contents, resetting both for the next revision.
    pub fn take_touched(&mut self) -> (HashSet<String>, HashMap<ObjectId, Vec<u8>>) {
        (
            std::mem::take(&mut self.touched_dirs),
            std::mem::take(&mut self.new_blobs),
        )
    }

    /// Re-ingests a subtree exported onto disk at `path`, registering every
    /// file it contains with the Hash Tree. Used after a `copyfrom` export
    /// and, by the History Walker, to rebuild the Hash Tree from a resumed
    /// Working Tree.
    pub fn reingest_subtree(&mut self, path: &str) -> Result<(), LoaderError> {
        for file in self.working_tree.walk(path)? {
            // A walked symlink's `contents` is already its target path
            // (see `WorkingTree::walk`), matching exactly what `close_file`
            // hashes as a symlink's blob content below.
            let mode = if file.symlink {
                EntryMode::Symlink
            } else if file.executable {
                EntryMode::ExecutableFile
            } else {
                EntryMode::RegularFile
            };
            let id = gitobj::blob_id(&file.contents);
            self.hash_tree.put_file(&file.rel_path, id, mode);
            self.touch_ancestors(&file.rel_path);
            self.new_blobs.insert(id, file.contents);
        }
        // `walk` only ever reports file/symlink leaves, so an empty
        // subdirectory would otherwise never reach the Hash Tree — walk the
        // directories separately and register each one explicitly (§4.C:
        // empty directories are never pruned).
        for dir_path in self.working_tree.walk_dirs(path)? {
            self.hash_tree.put_dir(&dir_path);
            self.touch_ancestors(&dir_path);
            self.touched_dirs.insert(dir_path);
        }
        Ok(())
    }

    async fn copy_subtree(&mut self, dest_path: &str, copy_from: &CopyFrom) -> Result<(), LoaderError> {
        let dest = self.working_tree.resolve(dest_path)?;
        self.session
            .export(&copy_from.path, copy_from.revision, &dest)
            .await?;
        self.reingest_subtree(dest_path)
    }

    fn props_for(&mut self, path: &str) -> &mut HashMap<String, Option<String>> {
        self.file_props.entry(path.to_string()).or_default()
    }

    /// Reads a file's current content in the raw form a textdelta source
    /// must start from, treating "does not exist yet" (a brand new
    /// `add_file` with no prior delta source) as empty rather than an
    /// error. Any other I/O failure still propagates. If the path is
    /// currently a symlink on disk — a prior `svn:special` file — the
    /// source is the `link <target>` bytes SVN itself would have served,
    /// not the symlink-followed file contents.
    fn read_existing_or_empty(&self, path: &str) -> Result<Vec<u8>, LoaderError> {
        match self.working_tree.read_delta_source(path) {
            Ok(bytes) => Ok(bytes),
            Err(WorkingTreeError::Io { ref source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait::async_trait]
impl<'a> EditorSink for ReplayEditor<'a> {
    #[instrument(skip(self))]
    async fn open_root(&mut self) -> Result<(), LoaderError> {
        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_directory(&mut self, path: &str, copy_from: Option<CopyFrom>) -> Result<(), LoaderError> {
        self.working_tree.add_dir(path)?;
        self.touch_ancestors(path);
        self.touched_dirs.insert(path.to_string());
        if let Some(from) = copy_from {
            self.copy_subtree(path, &from).await?;
        } else {
            self.hash_tree.put_dir(path);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn open_directory(&mut self, _path: &str) -> Result<(), LoaderError> {
        Ok(())
    }

    #[instrument(skip(self))]
    async fn change_dir_prop(
        &mut self,
        path: &str,
        name: &str,
        value: Option<String>,
    ) -> Result<(), LoaderError> {
        // Directory properties (e.g. svn:externals, svn:mergeinfo) are
        // recorded only so a future caller can inspect them; they are never
        // interpreted and never affect a file's EOL resolution.
        debug!(path, name, recorded = value.is_some(), "directory property recorded");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_entry(&mut self, path: &str) -> Result<(), LoaderError> {
        self.working_tree.remove(path)?;
        self.hash_tree.remove(path);
        self.file_props.remove(path);
        self.pending_content.remove(path);
        self.touch_ancestors(path);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_file(&mut self, path: &str, copy_from: Option<CopyFrom>) -> Result<(), LoaderError> {
        self.file_props.insert(path.to_string(), HashMap::new());
        if let Some(from) = copy_from {
            let dest = self.working_tree.resolve(path)?;
            self.session.export(&from.path, from.revision, &dest).await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn open_file(&mut self, path: &str) -> Result<(), LoaderError> {
        self.file_props.entry(path.to_string()).or_default();
        Ok(())
    }

    #[instrument(skip(self, svndiff))]
    async fn apply_textdelta(&mut self, path: &str, svndiff: &[u8]) -> Result<(), LoaderError> {
        let source = self.read_existing_or_empty(path)?;
        let new_content = svndiff::apply(&source, svndiff, self.svndiff_window_max_bytes)?;
        self.pending_content.insert(path.to_string(), new_content);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn change_file_prop(
        &mut self,
        path: &str,
        name: &str,
        value: Option<String>,
    ) -> Result<(), LoaderError> {
        self.props_for(path).insert(name.to_string(), value);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn close_file(&mut self, path: &str) -> Result<(), LoaderError> {
        let raw = match self.pending_content.remove(path) {
            Some(bytes) => bytes,
            None => self.read_existing_or_empty(path)?,
        };
        let props = self.file_props.remove(path).unwrap_or_default();
        let is_special = props.get(SVN_SPECIAL).map(|v| v.is_some()).unwrap_or(false);

        let (mode, file_kind, stored, blob_content) = if is_special {
            // Open Question resolution (§9): the target is whatever
            // remains after stripping the `link ` prefix, with no further
            // trimming of surrounding whitespace.
            let target = raw
                .strip_prefix(SYMLINK_PREFIX.as_bytes())
                .unwrap_or(&raw)
                .to_vec();
            (EntryMode::Symlink, FileKind::Symlink, target.clone(), target)
        } else {
            let executable = props.get(SVN_EXECUTABLE).map(|v| v.is_some()).unwrap_or(false);
            let eol_value = props.get(SVN_EOL_STYLE).and_then(|v| v.as_deref());
            let style = EolStyle::from_property_value(eol_value);
            let normalized = eol::normalize(&raw, style);
            let (mode, kind) = if executable {
                (EntryMode::ExecutableFile, FileKind::Executable)
            } else {
                (EntryMode::RegularFile, FileKind::Regular)
            };
            (mode, kind, normalized.clone(), normalized)
        };

        self.working_tree.write_file(path, &stored, file_kind)?;
        let blob_id = gitobj::blob_id(&blob_content);
        self.hash_tree.put_file(path, blob_id, mode);
        self.touch_ancestors(path);
        self.new_blobs.insert(blob_id, blob_content);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn close_directory(&mut self, _path: &str) -> Result<(), LoaderError> {
        Ok(())
    }

    #[instrument(skip(self))]
    async fn close_edit(&mut self) -> Result<(), LoaderError> {
        Ok(())
    }
}
