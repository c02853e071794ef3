//! Core VFS types.

use crate::repo::{NodeKind, RepoEntry};

/// Permission bits for directories.
pub const DIR_PERM: u16 = 0o755;

/// Permission bits for regular files.
pub const FILE_PERM: u16 = 0o644;

/// Permission bits for nodes that are neither files nor directories.
pub const UNREADABLE_PERM: u16 = 0o000;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// File attributes (metadata).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttr {
    /// Size in bytes.
    pub size: u64,
    /// File type.
    pub kind: FileType,
    /// Unix permissions (e.g., 0o644).
    pub perm: u16,
}

impl FileAttr {
    /// Attributes for a regular file.
    pub fn file(size: u64) -> Self {
        Self {
            size,
            kind: FileType::File,
            perm: FILE_PERM,
        }
    }

    /// Attributes for a directory.
    pub fn directory() -> Self {
        Self {
            size: 0,
            kind: FileType::Directory,
            perm: DIR_PERM,
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

impl From<&RepoEntry> for FileAttr {
    fn from(entry: &RepoEntry) -> Self {
        match entry.kind {
            NodeKind::File => FileAttr::file(entry.size),
            NodeKind::Directory => FileAttr {
                size: entry.size,
                ..FileAttr::directory()
            },
            // Shown as a file nobody can open.
            NodeKind::Other => FileAttr {
                size: entry.size,
                kind: FileType::File,
                perm: UNREADABLE_PERM,
            },
        }
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_from_repo_entry() {
        let file = FileAttr::from(&RepoEntry {
            kind: NodeKind::File,
            size: 42,
        });
        assert!(file.is_file());
        assert_eq!(file.size, 42);
        assert_eq!(file.perm, 0o644);

        let dir = FileAttr::from(&RepoEntry {
            kind: NodeKind::Directory,
            size: 0,
        });
        assert!(dir.is_dir());
        assert_eq!(dir.perm, 0o755);

        let other = FileAttr::from(&RepoEntry {
            kind: NodeKind::Other,
            size: 3,
        });
        assert!(other.is_file());
        assert_eq!(other.perm, 0);
        assert_eq!(other.size, 3);
    }

    #[test]
    fn test_dir_entry() {
        let file = DirEntry::file("test.txt");
        assert_eq!(file.name, "test.txt");
        assert!(file.kind.is_file());

        let dir = DirEntry::directory("subdir");
        assert!(dir.kind.is_dir());
    }
}
