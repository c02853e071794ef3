//! # svnfs-kernel
//!
//! Core of svnfs: a read-only filesystem where the top level lists revisions
//! and each revision directory mirrors the repository as of that revision.
//!
//! - [`path`] encodes and decodes `/{revision}/{repository-path}`
//! - [`repo`] is the repository session seam ([`RepositorySession`])
//! - [`session`] serializes every call into the one session
//! - [`cache`] fetches file content once per virtual path into local files
//! - [`vfs`] answers attributes / open / read / list_directory requests

pub mod cache;
pub mod path;
pub mod repo;
pub mod session;
pub mod vfs;

pub use cache::{CacheError, MaterializationCache};
pub use path::{PathError, Revnum, VirtualPath};
pub use repo::{
    Commit, MemoryRepository, NodeKind, RepoDirEntry, RepoEntry, RepoError, RepoResult,
    RepositorySession, SvnCommandSession,
};
pub use session::{AccessMode, LockError, SessionGuard, SessionLease};
pub use vfs::{DirEntry, FileAttr, FileType, RevisionFs, VfsError, VfsOps, VfsResult};
