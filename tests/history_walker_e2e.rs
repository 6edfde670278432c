//! Black-box end-to-end tests for the revision-replay engine.
//!
//! These construct a `HistoryWalker` against the public API only — scripted
//! `FixtureSvnSession`s, the in-memory `ArchiveClient`/`VisitStateStore` —
//! and assert on the objects actually submitted. No real `svn`/`svnadmin`
//! binary is needed because the SVN session itself is out of scope here
//! (§1); the fixtures stand in for it.

use std::sync::Arc;

use svn_archive_loader::archive::ArchiveClient;
use svn_archive_loader::config::LoaderConfig;
use svn_archive_loader::gitobj::{self, EntryMode};
use svn_archive_loader::history_walker::HistoryWalker;
use svn_archive_loader::svn::{ChangeAction, ChangedPath, CopyFrom, EditorOp, LogEntry};
use svn_archive_loader::svndiff::literal_svndiff;
use svn_archive_loader::testing::{FixtureSvnSession, InMemoryArchiveClient, InMemoryVisitStateStore};

fn log(rev: i64, author: &str, date: &str, message: &str) -> LogEntry {
    LogEntry {
        revision: rev,
        author: author.to_string(),
        date: date.to_string(),
        message: message.to_string(),
        changed_paths: vec![ChangedPath {
            path: "/a.txt".to_string(),
            action: ChangeAction::Modified,
            copy_from: None,
        }],
    }
}

fn eol_revision(rev: i64, date: &str, eol_style: Option<&str>, content: &[u8]) -> (LogEntry, Vec<EditorOp>) {
    let path = "a.txt".to_string();
    let mut ops = vec![EditorOp::OpenFile { path: path.clone() }];
    ops.push(EditorOp::ChangeFileProp {
        path: path.clone(),
        name: "svn:eol-style".to_string(),
        value: eol_style.map(|s| s.to_string()),
    });
    ops.push(EditorOp::ApplyTextdelta {
        path: path.clone(),
        svndiff: literal_svndiff(content),
    });
    ops.push(EditorOp::CloseFile { path });
    (log(rev, "jrandom", date, &format!("r{rev}")), ops)
}

/// Walks an eight-revision sequence toggling `svn:eol-style` between every
/// recognized value, mirroring the EOL corner-case integration scenario of
/// §8. Revision 1 creates the file (no eol-style yet, CRLF source bytes);
/// each later revision flips the property and/or the raw bytes, and the
/// stored blob must match `eol::normalize`'s table every time.
#[tokio::test]
async fn eol_style_toggling_across_revisions_matches_normalizer_table() {
    let dir = tempfile::tempdir().unwrap();
    let date = "2012-01-01T00:00:00.000000Z";

    let mut session = FixtureSvnSession::new("eol-repo-uuid", 8);
    // r1: create with no eol-style, CRLF bytes -> stored verbatim (absent passes through).
    let create_ops = vec![
        EditorOp::AddFile { path: "a.txt".to_string(), copy_from: None },
        EditorOp::ApplyTextdelta { path: "a.txt".to_string(), svndiff: literal_svndiff(b"A\r\nB\r\n") },
        EditorOp::CloseFile { path: "a.txt".to_string() },
    ];
    session = session.with_revision(1, log(1, "jrandom", date, "create"), create_ops);

    // r2: set eol-style=native on the now-CRLF file -> converts to LF.
    let (l, o) = eol_revision(2, date, Some("native"), b"A\r\nB\r\n");
    session = session.with_revision(2, l, o);

    // r3: switch eol-style to CRLF on an LF source -> expands to CRLF.
    let (l, o) = eol_revision(3, date, Some("CRLF"), b"A\nB\n");
    session = session.with_revision(3, l, o);

    // r4: switch to CR on an LF source -> expands to CR.
    let (l, o) = eol_revision(4, date, Some("CR"), b"A\nB\n");
    session = session.with_revision(4, l, o);

    // r5: switch to LF on a lone-CR source -> converts to LF.
    let (l, o) = eol_revision(5, date, Some("LF"), b"A\rB\rC");
    session = session.with_revision(5, l, o);

    // r6: mark binary -> passes through untouched even with mixed EOLs.
    let (l, o) = eol_revision(6, date, Some("binary"), b"A\r\nB");
    session = session.with_revision(6, l, o);

    // r7: drop the property back to absent -> passes through untouched.
    let (l, o) = eol_revision(7, date, None, b"A\r\nB\r\n");
    session = session.with_revision(7, l, o);

    // r8: back to native on an already-LF file -> idempotent no-op conversion.
    let (l, o) = eol_revision(8, date, Some("native"), b"A\nB\n");
    session = session.with_revision(8, l, o);

    let archive = Arc::new(InMemoryArchiveClient::new());
    let visit_store = InMemoryVisitStateStore::new();
    let walker = HistoryWalker::new(session, archive.clone(), visit_store, "file:///eol-repo", LoaderConfig::with_defaults(dir.path()));
    let summary = walker.run().await.unwrap();

    assert_eq!(summary.revisions_loaded, 8);

    let expect_blob = |content: &[u8]| gitobj::blob_id(content);
    assert!(archive.content_missing(&[expect_blob(b"A\r\nB\r\n")]).await.unwrap().is_empty());
    assert!(archive.content_missing(&[expect_blob(b"A\nB\n")]).await.unwrap().is_empty());
    assert!(archive.content_missing(&[expect_blob(b"A\r\nB\r\n")]).await.unwrap().is_empty());
    assert!(archive.content_missing(&[expect_blob(b"A\rB\r")]).await.unwrap().is_empty());
    assert!(archive.content_missing(&[expect_blob(b"A\nB\nC")]).await.unwrap().is_empty());
    assert!(archive.content_missing(&[expect_blob(b"A\r\nB")]).await.unwrap().is_empty());
}

/// A revision adding nothing but an empty directory must still change the
/// root tree id, per §8's "empty-directory preservation" invariant.
#[tokio::test]
async fn empty_directory_addition_changes_root_tree_id() {
    let dir = tempfile::tempdir().unwrap();
    let date = "2012-01-01T00:00:00.000000Z";

    let log1 = log(1, "jrandom", date, "seed file");
    let ops1 = vec![
        EditorOp::AddFile { path: "a.txt".to_string(), copy_from: None },
        EditorOp::ApplyTextdelta { path: "a.txt".to_string(), svndiff: literal_svndiff(b"hi") },
        EditorOp::CloseFile { path: "a.txt".to_string() },
    ];
    let log2 = log(2, "jrandom", date, "add empty dir");
    let ops2 = vec![EditorOp::AddDirectory { path: "empty".to_string(), copy_from: None }];

    let session = FixtureSvnSession::new("repo-uuid", 2)
        .with_revision(1, log1, ops1)
        .with_revision(2, log2, ops2);
    let archive = Arc::new(InMemoryArchiveClient::new());
    let visit_store = InMemoryVisitStateStore::new();
    let walker = HistoryWalker::new(session, archive.clone(), visit_store, "file:///repo", LoaderConfig::with_defaults(dir.path()));
    let summary = walker.run().await.unwrap();

    assert_eq!(summary.revisions_loaded, 2);
    let rev2 = archive.revision(summary.final_revision_id.as_ref().unwrap()).unwrap();
    let rev1_id = rev2.parent_id.unwrap();
    let rev1 = archive.revision(&rev1_id).unwrap();
    assert_ne!(rev1.tree_id, rev2.tree_id, "adding an empty directory must change the root tree id");

    // The empty directory itself must have been submitted as the well-known
    // empty tree, and referenced by the root directory's entries.
    let empty_dir = archive.directory(&gitobj::EMPTY_TREE_HEX.parse().unwrap());
    assert!(empty_dir.is_some());
}

/// Executable and symlink files produce distinct tree entry modes, and a
/// symlink's blob content is its target path with the `link ` prefix
/// stripped and no further trimming (the pinned Open Question resolution).
#[tokio::test]
async fn executable_and_symlink_properties_produce_distinct_modes() {
    let dir = tempfile::tempdir().unwrap();
    let date = "2012-01-01T00:00:00.000000Z";

    let ops = vec![
        EditorOp::AddFile { path: "run.sh".to_string(), copy_from: None },
        EditorOp::ChangeFileProp {
            path: "run.sh".to_string(),
            name: "svn:executable".to_string(),
            value: Some("*".to_string()),
        },
        EditorOp::ApplyTextdelta { path: "run.sh".to_string(), svndiff: literal_svndiff(b"#!/bin/sh\n") },
        EditorOp::CloseFile { path: "run.sh".to_string() },
        EditorOp::AddFile { path: "link.txt".to_string(), copy_from: None },
        EditorOp::ChangeFileProp {
            path: "link.txt".to_string(),
            name: "svn:special".to_string(),
            value: Some("*".to_string()),
        },
        EditorOp::ApplyTextdelta {
            path: "link.txt".to_string(),
            svndiff: literal_svndiff(b"link run.sh"),
        },
        EditorOp::CloseFile { path: "link.txt".to_string() },
    ];
    let session = FixtureSvnSession::new("repo-uuid", 1).with_revision(1, log(1, "jrandom", date, "add exe + symlink"), ops);
    let archive = Arc::new(InMemoryArchiveClient::new());
    let visit_store = InMemoryVisitStateStore::new();
    let walker = HistoryWalker::new(session, archive.clone(), visit_store, "file:///repo", LoaderConfig::with_defaults(dir.path()));
    let summary = walker.run().await.unwrap();

    let revision = archive.revision(&summary.final_revision_id.unwrap()).unwrap();
    let root = archive.directory(&revision.tree_id).unwrap();
    let run_sh = root.entries.iter().find(|e| e.name == "run.sh").unwrap();
    let link_txt = root.entries.iter().find(|e| e.name == "link.txt").unwrap();

    assert_eq!(run_sh.mode, EntryMode::ExecutableFile);
    assert_eq!(link_txt.mode, EntryMode::Symlink);
    assert_eq!(link_txt.target, gitobj::blob_id(b"run.sh"));
}

/// Modifying an existing symlink's target via `apply_textdelta` must use
/// the prior `link <target>` raw bytes as the delta source, not the
/// symlink-followed file contents (which don't exist) or empty content.
/// The second revision's delta source-copies the `"link "` prefix straight
/// from revision 1's raw content and appends a new target, so if the
/// wrong (empty) source were used, the source-copy instruction itself
/// would fail with an out-of-range error rather than silently succeed.
#[tokio::test]
async fn modifying_an_existing_symlink_uses_link_prefixed_bytes_as_delta_source() {
    let dir = tempfile::tempdir().unwrap();
    let date = "2012-01-01T00:00:00.000000Z";

    let ops1 = vec![
        EditorOp::AddFile { path: "link.txt".to_string(), copy_from: None },
        EditorOp::ChangeFileProp {
            path: "link.txt".to_string(),
            name: "svn:special".to_string(),
            value: Some("*".to_string()),
        },
        EditorOp::ApplyTextdelta {
            path: "link.txt".to_string(),
            svndiff: literal_svndiff(b"link run.sh"),
        },
        EditorOp::CloseFile { path: "link.txt".to_string() },
    ];

    // r2: source-copy the "link " prefix (5 bytes, offset 0) from the prior
    // raw content, then append new-data "other.sh" -> "link other.sh".
    let mut instructions = vec![0b00_000101u8, 0]; // source copy, length 5, offset 0
    instructions.push(0b10_001000); // new data, length 8
    let data = b"other.sh";
    let mut svndiff = vec![b'S', b'V', b'N', 0];
    svndiff.push(0); // source view offset
    svndiff.push(11); // source view length ("link run.sh")
    svndiff.push(13); // target view length ("link other.sh")
    svndiff.push(instructions.len() as u8);
    svndiff.push(data.len() as u8);
    svndiff.extend_from_slice(&instructions);
    svndiff.extend_from_slice(data);

    let ops2 = vec![
        EditorOp::OpenFile { path: "link.txt".to_string() },
        EditorOp::ChangeFileProp {
            path: "link.txt".to_string(),
            name: "svn:special".to_string(),
            value: Some("*".to_string()),
        },
        EditorOp::ApplyTextdelta { path: "link.txt".to_string(), svndiff },
        EditorOp::CloseFile { path: "link.txt".to_string() },
    ];

    let session = FixtureSvnSession::new("repo-uuid", 2)
        .with_revision(1, log(1, "jrandom", date, "add symlink"), ops1)
        .with_revision(2, log(2, "jrandom", date, "retarget symlink"), ops2);
    let archive = Arc::new(InMemoryArchiveClient::new());
    let visit_store = InMemoryVisitStateStore::new();
    let walker = HistoryWalker::new(session, archive.clone(), visit_store, "file:///repo", LoaderConfig::with_defaults(dir.path()));
    let summary = walker.run().await.unwrap();

    assert_eq!(summary.revisions_loaded, 2);
    let revision = archive.revision(&summary.final_revision_id.unwrap()).unwrap();
    let root = archive.directory(&revision.tree_id).unwrap();
    let link_txt = root.entries.iter().find(|e| e.name == "link.txt").unwrap();

    assert_eq!(link_txt.mode, EntryMode::Symlink);
    assert_eq!(link_txt.target, gitobj::blob_id(b"other.sh"));
}

/// A `copyfrom` subtree containing an empty directory must preserve that
/// empty directory in the copy destination, not silently drop it (§4.C:
/// empty directories are never pruned, including when reached via a
/// `copyfrom` export rather than a direct `add_directory`).
#[tokio::test]
async fn copy_from_preserves_an_empty_subdirectory() {
    let dir = tempfile::tempdir().unwrap();
    let date = "2012-01-01T00:00:00.000000Z";

    let log1 = log(1, "jrandom", date, "create trunk with an empty subdir");
    let ops1 = vec![
        EditorOp::AddDirectory { path: "trunk".to_string(), copy_from: None },
        EditorOp::AddDirectory { path: "trunk/empty".to_string(), copy_from: None },
        EditorOp::AddFile { path: "trunk/a.txt".to_string(), copy_from: None },
        EditorOp::ApplyTextdelta { path: "trunk/a.txt".to_string(), svndiff: literal_svndiff(b"hello") },
        EditorOp::CloseFile { path: "trunk/a.txt".to_string() },
    ];
    let log2 = log(2, "jrandom", date, "branch trunk");
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
            vec![svn_archive_loader::testing::ExportFile {
                rel_path: "a.txt".to_string(),
                contents: b"hello".to_vec(),
                kind: svn_archive_loader::working_tree::FileKind::Regular,
            }],
        )
        .with_export_empty_dirs("trunk", 1, vec!["empty".to_string()]);

    let archive = Arc::new(InMemoryArchiveClient::new());
    let visit_store = InMemoryVisitStateStore::new();
    let walker = HistoryWalker::new(session, archive.clone(), visit_store, "file:///repo", LoaderConfig::with_defaults(dir.path()));
    let summary = walker.run().await.unwrap();

    let revision = archive.revision(&summary.final_revision_id.unwrap()).unwrap();
    let root = archive.directory(&revision.tree_id).unwrap();
    let branches = root.entries.iter().find(|e| e.name == "branches").unwrap();
    let branches_dir = archive.directory(&branches.target).unwrap();
    let b1 = branches_dir.entries.iter().find(|e| e.name == "b1").unwrap();
    let b1_dir = archive.directory(&b1.target).unwrap();

    let empty_entry = b1_dir.entries.iter().find(|e| e.name == "empty").unwrap();
    assert_eq!(empty_entry.mode, EntryMode::Directory);
    assert_eq!(empty_entry.target, gitobj::EMPTY_TREE_HEX.parse().unwrap());
}
