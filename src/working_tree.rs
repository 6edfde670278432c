//! Working Tree (§4.A): an on-disk scratch directory holding the checked-out
//! state of the revision currently being built, with no `.svn/` metadata
//! and no keyword expansion. The Replay Editor and History Walker mutate it
//! in lockstep with the Hash Tree.

use std::fs;
use std::os::unix::fs::{self as unix_fs, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::WorkingTreeError;

/// A file discovered while walking an exported subtree, used to re-ingest
/// a `copyfrom` subtree or to rebuild the Hash Tree from disk on resume.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    /// Path relative to the walk root, using `/` separators.
    pub rel_path: String,
    pub executable: bool,
    pub symlink: bool,
    pub contents: Vec<u8>,
}

/// The on-disk shape a path should take when written into the Working
/// Tree. A real POSIX symlink is created for `Symlink`, matching what
/// `svn export` itself produces for an `svn:special` file — the Working
/// Tree's byte-exactness guarantee (§4.A) covers symlinks too, not just
/// regular files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Executable,
    Symlink,
}

/// On-disk scratch directory mirroring the SVN working copy.
pub struct WorkingTree {
    root: PathBuf,
}

impl WorkingTree {
    /// Creates (if missing) and takes ownership of `root` as the scratch
    /// directory for one load.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, WorkingTreeError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a `/`-separated SVN path to its on-disk location, rejecting
    /// any path that would escape the scratch root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, WorkingTreeError> {
        if path.split('/').any(|c| c == ".." || c == ".") {
            return Err(WorkingTreeError::PathEscape(path.to_string()));
        }
        Ok(self.root.join(path))
    }

    pub fn add_dir(&self, path: &str) -> Result<(), WorkingTreeError> {
        let full = self.resolve(path)?;
        fs::create_dir_all(&full).map_err(|e| io_err(&full, e))?;
        debug!(path, "working tree: created directory");
        Ok(())
    }

    pub fn remove(&self, path: &str) -> Result<(), WorkingTreeError> {
        let full = self.resolve(path)?;
        if full.is_dir() {
            fs::remove_dir_all(&full).map_err(|e| io_err(&full, e))?;
        } else if full.exists() || full.symlink_metadata().is_ok() {
            fs::remove_file(&full).map_err(|e| io_err(&full, e))?;
        }
        debug!(path, "working tree: removed");
        Ok(())
    }

    /// Writes `path` as `kind`, creating parent directories as needed. For
    /// `FileKind::Symlink`, `bytes` is the link target (already stripped of
    /// the `link ` prefix per the resolved Open Question — see §4.D) and a
    /// real symlink is created rather than a placeholder regular file.
    pub fn write_file(
        &self,
        path: &str,
        bytes: &[u8],
        kind: FileKind,
    ) -> Result<(), WorkingTreeError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        match kind {
            FileKind::Symlink => {
                // A prior entry at this path (e.g. a replaced file) must be
                // cleared first: `symlink()` fails if anything exists there.
                match fs::symlink_metadata(&full) {
                    Ok(meta) if meta.is_dir() => {
                        fs::remove_dir_all(&full).map_err(|e| io_err(&full, e))?
                    }
                    Ok(_) => fs::remove_file(&full).map_err(|e| io_err(&full, e))?,
                    Err(_) => {}
                }
                let target = String::from_utf8_lossy(bytes).into_owned();
                unix_fs::symlink(&target, &full).map_err(|e| io_err(&full, e))?;
            }
            FileKind::Regular | FileKind::Executable => {
                fs::write(&full, bytes).map_err(|e| io_err(&full, e))?;
                if kind == FileKind::Executable {
                    let mut perms =
                        fs::metadata(&full).map_err(|e| io_err(&full, e))?.permissions();
                    perms.set_mode(0o755);
                    fs::set_permissions(&full, perms).map_err(|e| io_err(&full, e))?;
                }
            }
        }
        Ok(())
    }

    pub fn read_file(&self, path: &str) -> Result<Vec<u8>, WorkingTreeError> {
        let full = self.resolve(path)?;
        fs::read(&full).map_err(|e| io_err(&full, e))
    }

    /// Reads `path`'s prior content in the raw, un-interpreted form SVN
    /// itself would hand a textdelta applier — the form `apply_textdelta`
    /// must use as its delta source. For a real POSIX symlink (the on-disk
    /// shape `write_file(FileKind::Symlink, ...)` produces for an
    /// `svn:special` file, see §4.D) that means re-synthesizing the
    /// `link <target>` text the symlink's own entry stood in for, since the
    /// Working Tree stores the target bare, not the `link `-prefixed raw
    /// bytes the EOL/property pipeline expects as input. Every other path
    /// is read back verbatim.
    pub fn read_delta_source(&self, path: &str) -> Result<Vec<u8>, WorkingTreeError> {
        let full = self.resolve(path)?;
        match fs::symlink_metadata(&full) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = fs::read_link(&full).map_err(|e| io_err(&full, e))?;
                let mut raw = b"link ".to_vec();
                raw.extend_from_slice(target.to_string_lossy().as_bytes());
                Ok(raw)
            }
            _ => fs::read(&full).map_err(|e| io_err(&full, e)),
        }
    }

    pub fn is_executable(&self, path: &str) -> Result<bool, WorkingTreeError> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full).map_err(|e| io_err(&full, e))?;
        Ok(meta.permissions().mode() & 0o111 != 0)
    }

    /// Recursively lists every regular file under `path` (relative to the
    /// scratch root), in depth-first order. Used to rebuild the Hash Tree
    /// from disk on resume, and to re-ingest a `copyfrom` subtree after
    /// `SvnSession::export` has populated it.
    pub fn walk(&self, path: &str) -> Result<Vec<WalkedFile>, WorkingTreeError> {
        let full = self.resolve(path)?;
        let mut out = Vec::new();
        match fs::symlink_metadata(&full) {
            Ok(meta) if meta.is_dir() => self.walk_rec(&full, path, &mut out)?,
            Ok(_) => out.push(self.read_walked_file(&full, path)?),
            Err(_) => {}
        }
        Ok(out)
    }

    fn walk_rec(
        &self,
        dir: &Path,
        rel_prefix: &str,
        out: &mut Vec<WalkedFile>,
    ) -> Result<(), WorkingTreeError> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .map_err(|e| io_err(dir, e))?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name())
            .collect();
        names.sort();
        for name in names {
            let child_path = dir.join(&name);
            let rel = if rel_prefix.is_empty() {
                name.to_string_lossy().to_string()
            } else {
                format!("{}/{}", rel_prefix, name.to_string_lossy())
            };
            // A symlink is always a leaf, even one pointing at a directory:
            // it is never followed during the walk.
            let file_type = fs::symlink_metadata(&child_path)
                .map_err(|e| io_err(&child_path, e))?
                .file_type();
            if file_type.is_dir() {
                self.walk_rec(&child_path, &rel, out)?;
            } else {
                out.push(self.read_walked_file(&child_path, &rel)?);
            }
        }
        Ok(())
    }

    /// Recursively lists every directory strictly under `path` (relative to
    /// the scratch root), in depth-first order — including directories with
    /// zero entries, which `walk` never reports since it only emits file/
    /// symlink leaves. Used alongside `walk` to rebuild the Hash Tree's
    /// empty directories on resume and after a `copyfrom` export.
    pub fn walk_dirs(&self, path: &str) -> Result<Vec<String>, WorkingTreeError> {
        let full = self.resolve(path)?;
        let mut out = Vec::new();
        if let Ok(meta) = fs::symlink_metadata(&full) {
            if meta.is_dir() {
                self.walk_dirs_rec(&full, path, &mut out)?;
            }
        }
        Ok(out)
    }

    fn walk_dirs_rec(
        &self,
        dir: &Path,
        rel_prefix: &str,
        out: &mut Vec<String>,
    ) -> Result<(), WorkingTreeError> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .map_err(|e| io_err(dir, e))?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name())
            .collect();
        names.sort();
        for name in names {
            let child_path = dir.join(&name);
            let rel = if rel_prefix.is_empty() {
                name.to_string_lossy().to_string()
            } else {
                format!("{}/{}", rel_prefix, name.to_string_lossy())
            };
            let file_type = fs::symlink_metadata(&child_path)
                .map_err(|e| io_err(&child_path, e))?
                .file_type();
            if file_type.is_dir() {
                out.push(rel.clone());
                self.walk_dirs_rec(&child_path, &rel, out)?;
            }
        }
        Ok(())
    }

    fn read_walked_file(&self, full: &Path, rel: &str) -> Result<WalkedFile, WorkingTreeError> {
        let meta = fs::symlink_metadata(full).map_err(|e| io_err(full, e))?;
        if meta.file_type().is_symlink() {
            let target = fs::read_link(full).map_err(|e| io_err(full, e))?;
            let contents = target.to_string_lossy().into_owned().into_bytes();
            return Ok(WalkedFile {
                rel_path: rel.to_string(),
                executable: false,
                symlink: true,
                contents,
            });
        }
        let contents = fs::read(full).map_err(|e| io_err(full, e))?;
        let executable = meta.permissions().mode() & 0o111 != 0;
        Ok(WalkedFile {
            rel_path: rel.to_string(),
            executable,
            symlink: false,
            contents,
        })
    }
}

fn io_err(path: &Path, source: std::io::Error) -> WorkingTreeError {
    WorkingTreeError::Io {
        path: path.display().to_string(),
        source,
    }
}
