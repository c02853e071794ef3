//! VFS error types.
//!
//! Each variant is one failure channel of a filesystem operation and maps to
//! exactly one errno for the dispatcher.

use std::io;
use thiserror::Error;

use crate::cache::CacheError;
use crate::path::PathError;
use crate::session::LockError;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Malformed virtual path. Indistinguishable from a missing file.
    #[error("not found: {0}")]
    NotFound(String),

    /// The repository failed a metadata or listing call.
    #[error("repository error: {0}")]
    Remote(String),

    /// The repository failed to deliver file content during open.
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// A local cache file could not be allocated.
    #[error("cache file unavailable: {0}")]
    Resource(String),

    /// Read of a path that was never opened.
    #[error("not materialized: {0}")]
    NotMaterialized(String),

    /// The repository session could not be acquired.
    #[error("repository session busy")]
    Busy,

    /// I/O error on a local cache file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a Remote error.
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    /// Create a Resource error.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Errno reported to the kernel for this error.
    pub fn errno(&self) -> i32 {
        match self {
            VfsError::NotFound(_) => libc::ENOENT,
            VfsError::Remote(_) => libc::EPIPE,
            VfsError::FetchFailed(_) => libc::ENOENT,
            VfsError::Resource(_) => libc::ENOMEM,
            VfsError::NotMaterialized(_) => libc::EIO,
            VfsError::Busy => libc::EBUSY,
            VfsError::Io(_) => libc::EIO,
        }
    }
}

impl From<PathError> for VfsError {
    fn from(e: PathError) -> Self {
        VfsError::NotFound(e.to_string())
    }
}

impl From<LockError> for VfsError {
    fn from(_: LockError) -> Self {
        VfsError::Busy
    }
}

/// Repository errors are logged where they happen; only the summary survives.
impl From<CacheError> for VfsError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Busy(_) => VfsError::Busy,
            CacheError::Create { .. } => VfsError::Resource(e.to_string()),
            CacheError::Fetch { path, revision, .. } => {
                VfsError::FetchFailed(format!("{path}@{revision}"))
            }
            CacheError::Finish { source, .. } | CacheError::Read { source, .. } => {
                VfsError::Io(source)
            }
            CacheError::NotCached(vpath) => VfsError::NotMaterialized(vpath),
        }
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::Io(e) => e,
            other => io::Error::from_raw_os_error(other.errno()),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::RepoError;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(VfsError::not_found("/x").errno(), libc::ENOENT);
        assert_eq!(VfsError::remote("boom").errno(), libc::EPIPE);
        assert_eq!(VfsError::FetchFailed("/a@1".into()).errno(), libc::ENOENT);
        assert_eq!(VfsError::resource("tmp").errno(), libc::ENOMEM);
        assert_eq!(VfsError::NotMaterialized("/1/a".into()).errno(), libc::EIO);
        assert_eq!(VfsError::Busy.errno(), libc::EBUSY);
        assert_eq!(VfsError::Io(io::Error::other("disk")).errno(), libc::EIO);
    }

    #[test]
    fn test_cache_error_translation() {
        let fetch = CacheError::Fetch {
            path: "/a".into(),
            revision: 3,
            source: RepoError::NoSuchRevision(3),
        };
        match VfsError::from(fetch) {
            VfsError::FetchFailed(msg) => assert_eq!(msg, "/a@3"),
            other => panic!("unexpected: {other:?}"),
        }

        let create = CacheError::Create {
            dir: "/nope".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(matches!(VfsError::from(create), VfsError::Resource(_)));

        let missing = CacheError::NotCached("/1/a".into());
        assert!(matches!(VfsError::from(missing), VfsError::NotMaterialized(_)));
    }

    #[test]
    fn test_into_io_error() {
        let err: io::Error = VfsError::Busy.into();
        assert_eq!(err.raw_os_error(), Some(libc::EBUSY));

        let err: io::Error = VfsError::not_found("/x").into();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
