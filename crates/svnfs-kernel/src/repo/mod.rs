//! Repository access.
//!
//! [`RepositorySession`] is the seam between the filesystem core and whatever
//! talks to the repository. A session is a single connection and is not safe
//! for concurrent use, so the trait only requires `Send` and every method takes
//! `&mut self`. The [`SessionGuard`](crate::session::SessionGuard) is what makes
//! one session shareable across threads.
//!
//! - [`MemoryRepository`] - in-memory revisions (tests, demos)
//! - [`SvnCommandSession`] - drives the `svn` command-line client

mod memory;
mod svn;

use std::io::{self, Write};

use thiserror::Error;

use crate::path::Revnum;

pub use memory::{Commit, MemoryRepository};
pub use svn::SvnCommandSession;

/// Node kind as reported by the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
    /// Anything else the repository may report (e.g. an unknown node type).
    Other,
}

/// Result of a stat on one repository path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoEntry {
    pub kind: NodeKind,
    /// Size in bytes. Zero for directories.
    pub size: u64,
}

/// One child returned by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoDirEntry {
    pub name: String,
    pub kind: NodeKind,
}

/// Repository access errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("path not found: {path}@{revision}")]
    NotFound { path: String, revision: Revnum },

    #[error("no such revision: {0}")]
    NoSuchRevision(Revnum),

    #[error("not a directory: {path}@{revision}")]
    NotADirectory { path: String, revision: Revnum },

    #[error("not a file: {path}@{revision}")]
    NotAFile { path: String, revision: Revnum },

    #[error("svn exited with {status}: {stderr}")]
    Command { status: i32, stderr: String },

    #[error("unexpected svn output: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Repository result type.
pub type RepoResult<T> = Result<T, RepoError>;

/// A single open connection to a versioned repository.
///
/// Paths are repository-absolute (`/trunk/README`); `/` is the repository root.
pub trait RepositorySession: Send {
    /// Youngest revision in the repository.
    fn latest_revision(&mut self) -> RepoResult<Revnum>;

    /// Kind and size of `path` at `revision`.
    fn stat(&mut self, path: &str, revision: Revnum) -> RepoResult<RepoEntry>;

    /// Children of the directory `path` at `revision`.
    ///
    /// Order is whatever the repository returns; callers treat it as unordered.
    fn list(&mut self, path: &str, revision: Revnum) -> RepoResult<Vec<RepoDirEntry>>;

    /// Stream the content of the file `path` at `revision` into `sink`.
    fn fetch(&mut self, path: &str, revision: Revnum, sink: &mut dyn Write) -> RepoResult<()>;
}

impl<S: RepositorySession + ?Sized> RepositorySession for Box<S> {
    fn latest_revision(&mut self) -> RepoResult<Revnum> {
        (**self).latest_revision()
    }

    fn stat(&mut self, path: &str, revision: Revnum) -> RepoResult<RepoEntry> {
        (**self).stat(path, revision)
    }

    fn list(&mut self, path: &str, revision: Revnum) -> RepoResult<Vec<RepoDirEntry>> {
        (**self).list(path, revision)
    }

    fn fetch(&mut self, path: &str, revision: Revnum, sink: &mut dyn Write) -> RepoResult<()> {
        (**self).fetch(path, revision, sink)
    }
}
