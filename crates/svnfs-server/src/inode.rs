//! Inode numbers for virtual paths.
//!
//! FUSE addresses nodes by inode; the kernel crate addresses them by path.
//! Numbers are handed out on first sight and never reused, so an inode stays
//! valid for the life of the mount even after the kernel forgets it.

use std::collections::HashMap;

/// Inode of `/`.
pub const ROOT_INODE: u64 = fuser::FUSE_ROOT_ID;

/// Bidirectional inode ↔ virtual path map.
#[derive(Debug)]
pub struct InodeTable {
    paths: HashMap<u64, String>,
    inodes: HashMap<String, u64>,
    next: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    pub fn new() -> Self {
        let mut table = Self {
            paths: HashMap::new(),
            inodes: HashMap::new(),
            next: ROOT_INODE + 1,
        };
        table.paths.insert(ROOT_INODE, "/".to_string());
        table.inodes.insert("/".to_string(), ROOT_INODE);
        table
    }

    /// Virtual path for an inode.
    pub fn path(&self, ino: u64) -> Option<&str> {
        self.paths.get(&ino).map(String::as_str)
    }

    /// Inode for a virtual path, allocating one if the path is new.
    pub fn intern(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.inodes.get(path) {
            return ino;
        }
        let ino = self.next;
        self.next += 1;
        self.paths.insert(ino, path.to_string());
        self.inodes.insert(path.to_string(), ino);
        ino
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Parent of a virtual path; `/` is its own parent.
pub fn parent(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}
