//! VFS operations.
//!
//! Four path-based entry points a dispatcher calls from any thread. Paths are
//! virtual paths (`/`, `/12`, `/12/trunk/README`); inode bookkeeping belongs
//! to the dispatcher.

use tracing::{debug, warn};

use super::error::{VfsError, VfsResult};
use super::types::{DirEntry, FileAttr, FileType};
use crate::cache::MaterializationCache;
use crate::path::VirtualPath;
use crate::repo::{NodeKind, RepoError};
use crate::session::SessionGuard;

/// Core VFS operations trait.
pub trait VfsOps: Send + Sync {
    /// Get file attributes.
    fn attributes(&self, path: &str) -> VfsResult<FileAttr>;

    /// Prepare a file for reading.
    ///
    /// Must succeed before [`read`](VfsOps::read) is called for the same path.
    fn open(&self, path: &str) -> VfsResult<()>;

    /// Read file contents.
    ///
    /// Reads up to `size` bytes starting at `offset`.
    /// Returns fewer bytes if EOF is reached.
    fn read(&self, path: &str, offset: u64, size: u32) -> VfsResult<Vec<u8>>;

    /// Read directory entries, starting with `.` and `..`.
    fn list_directory(&self, path: &str) -> VfsResult<Vec<DirEntry>>;
}

/// Read-only filesystem over every revision of one repository.
///
/// ```text
/// /               # one directory per revision, newest first
/// /12/            # repository root at r12
/// /12/trunk/a.c   # content fetched once, then served from the cache
/// ```
#[derive(Debug)]
pub struct RevisionFs {
    guard: SessionGuard,
    cache: MaterializationCache,
}

impl RevisionFs {
    /// Create a filesystem over the session held by `guard`.
    pub fn new(guard: SessionGuard, cache: MaterializationCache) -> Self {
        Self { guard, cache }
    }

    /// The session guard.
    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    /// The materialization cache.
    pub fn cache(&self) -> &MaterializationCache {
        &self.cache
    }
}

fn remote(op: &str, path: &str, err: RepoError) -> VfsError {
    warn!(op, path, error = %err, "repository call failed");
    VfsError::remote(format!("{op} {path}"))
}

fn dot_entries() -> Vec<DirEntry> {
    vec![DirEntry::directory("."), DirEntry::directory("..")]
}

impl VfsOps for RevisionFs {
    fn attributes(&self, path: &str) -> VfsResult<FileAttr> {
        let (revision, repo_path) = match VirtualPath::parse(path)? {
            VirtualPath::Root => return Ok(FileAttr::directory()),
            VirtualPath::Revision {
                revision,
                repo_path,
            } => (revision, repo_path),
        };

        debug!(repo_path, revision, "stat");
        let entry = {
            let mut session = self.guard.shared()?;
            session.stat(&repo_path, revision)
        };
        let entry = entry.map_err(|e| remote("stat", path, e))?;
        Ok(FileAttr::from(&entry))
    }

    fn open(&self, path: &str) -> VfsResult<()> {
        let (revision, repo_path) = match VirtualPath::parse(path) {
            Ok(VirtualPath::Revision {
                revision,
                repo_path,
            }) => (revision, repo_path),
            Ok(VirtualPath::Root) => return Err(VfsError::not_found(path)),
            Err(e) => {
                debug!(path, error = %e, "open of malformed path");
                return Err(e.into());
            }
        };

        self.cache
            .ensure_materialized(&self.guard, path, revision, &repo_path)
            .map_err(|e| {
                warn!(path, error = %e, "materialization failed");
                VfsError::from(e)
            })?;
        Ok(())
    }

    fn read(&self, path: &str, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        self.cache.read(path, offset, size).map_err(|e| {
            warn!(path, offset, size, error = %e, "read failed");
            VfsError::from(e)
        })
    }

    fn list_directory(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let (revision, repo_path) = match VirtualPath::parse(path)? {
            VirtualPath::Root => {
                let latest = {
                    let mut session = self.guard.shared()?;
                    session.latest_revision()
                };
                let latest = latest.map_err(|e| remote("latest-revision", path, e))?;

                let mut entries = dot_entries();
                entries.extend((1..=latest).rev().map(|r| DirEntry::directory(r.to_string())));
                return Ok(entries);
            }
            VirtualPath::Revision {
                revision,
                repo_path,
            } => (revision, repo_path),
        };

        debug!(repo_path, revision, "list");
        let children = {
            let mut session = self.guard.shared()?;
            session.list(&repo_path, revision)
        };
        let children = children.map_err(|e| remote("list", path, e))?;

        let mut entries = dot_entries();
        entries.extend(children.into_iter().map(|child| {
            let kind = match child.kind {
                NodeKind::Directory => FileType::Directory,
                NodeKind::File | NodeKind::Other => FileType::File,
            };
            DirEntry::new(child.name, kind)
        }));
        Ok(entries)
    }
}
