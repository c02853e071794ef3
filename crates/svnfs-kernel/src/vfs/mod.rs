//! Virtual filesystem operations.
//!
//! - [`VfsOps`] - the four operations a dispatcher calls
//! - [`RevisionFs`] - the implementation over one repository session
//!
//! ## Design Decisions
//!
//! - **Path-based, no inodes**: operations take virtual paths. The FUSE
//!   adapter keeps the inode ↔ path mapping.
//! - **Open before read**: `open` materializes the file; `read` only ever
//!   touches the local copy.
//! - **One error per failure**: every operation returns exactly one
//!   [`VfsError`] variant, each with a fixed errno.

mod error;
mod ops;
mod types;

pub use error::{VfsError, VfsResult};
pub use ops::{RevisionFs, VfsOps};
pub use types::{DIR_PERM, DirEntry, FILE_PERM, FileAttr, FileType, UNREADABLE_PERM};
