//! FUSE dispatcher.
//!
//! Translates inode-addressed kernel requests into path-addressed
//! [`VfsOps`] calls and replies with the errno each [`VfsError`] maps to.
//! The filesystem is read-only: write opens fail with `EROFS` and no
//! mutating callback is implemented.
//!
//! fuser delivers every request on one session thread. Anything that may
//! touch the repository or the disk runs on a worker thread and replies from
//! there, so a slow first `open` never holds up reads of files that are
//! already cached.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, Request,
};
use parking_lot::Mutex;
use svnfs_kernel::path::join;
use svnfs_kernel::{FileAttr as NodeAttr, FileType as NodeType, VfsError, VfsOps, VfsResult};
use tracing::{debug, info, warn};

use crate::inode::{InodeTable, parent};

const BLOCK_SIZE: u32 = 512;

/// State shared between the session thread and request workers.
struct Dispatch {
    ops: Arc<dyn VfsOps>,
    inodes: Mutex<InodeTable>,
    ttl: Duration,
    mounted_at: SystemTime,
}

impl Dispatch {
    fn path_of(&self, ino: u64) -> VfsResult<String> {
        self.inodes
            .lock()
            .path(ino)
            .map(str::to_string)
            .ok_or_else(|| VfsError::not_found(format!("inode {ino}")))
    }

    /// Resolve `name` under `parent_ino`, allocating its inode.
    fn lookup_child(&self, parent_ino: u64, name: &OsStr) -> VfsResult<(u64, NodeAttr)> {
        let parent_path = self.path_of(parent_ino)?;
        let name = name
            .to_str()
            .ok_or_else(|| VfsError::not_found(name.to_string_lossy()))?;
        let path = join(&parent_path, name);
        let attr = self.ops.attributes(&path)?;
        Ok((self.inodes.lock().intern(&path), attr))
    }

    fn attributes(&self, ino: u64) -> VfsResult<NodeAttr> {
        self.ops.attributes(&self.path_of(ino)?)
    }

    fn open(&self, ino: u64) -> VfsResult<()> {
        self.ops.open(&self.path_of(ino)?)
    }

    fn read(&self, ino: u64, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        self.ops.read(&self.path_of(ino)?, offset, size)
    }

    /// Directory listing with an inode per entry.
    fn entries(&self, ino: u64) -> VfsResult<Vec<(u64, FileType, String)>> {
        let path = self.path_of(ino)?;
        let listing = self.ops.list_directory(&path)?;

        let mut inodes = self.inodes.lock();
        Ok(listing
            .into_iter()
            .map(|entry| {
                let entry_ino = match entry.name.as_str() {
                    "." => ino,
                    ".." => inodes.intern(parent(&path)),
                    name => inodes.intern(&join(&path, name)),
                };
                (entry_ino, file_type(entry.kind), entry.name)
            })
            .collect())
    }

    fn fuse_attr(&self, ino: u64, attr: &NodeAttr, (uid, gid): (u32, u32)) -> FileAttr {
        fuse_attr(ino, attr, uid, gid, self.mounted_at)
    }
}

/// Read-only FUSE filesystem over a [`VfsOps`] implementation.
pub struct SvnFs {
    inner: Arc<Dispatch>,
}

impl SvnFs {
    pub fn new(ops: Arc<dyn VfsOps>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Dispatch {
                ops,
                inodes: Mutex::new(InodeTable::new()),
                ttl,
                mounted_at: SystemTime::now(),
            }),
        }
    }

    /// Run `job` on its own thread.
    ///
    /// If the thread cannot be started the job, and the reply it owns, is
    /// dropped; fuser answers a dropped reply with `EIO`.
    fn spawn(&self, op: &'static str, job: impl FnOnce(&Dispatch) + Send + 'static) {
        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name(format!("svnfs-{op}"))
            .spawn(move || job(&inner));
        if let Err(e) = spawned {
            warn!(op, error = %e, "could not start request worker");
        }
    }
}

fn owner(req: &Request<'_>) -> (u32, u32) {
    (req.uid(), req.gid())
}

fn file_type(kind: NodeType) -> FileType {
    match kind {
        NodeType::Directory => FileType::Directory,
        NodeType::File => FileType::RegularFile,
    }
}

fn fuse_attr(ino: u64, attr: &NodeAttr, uid: u32, gid: u32, time: SystemTime) -> FileAttr {
    FileAttr {
        ino,
        size: attr.size,
        blocks: attr.size.div_ceil(u64::from(BLOCK_SIZE)),
        atime: time,
        mtime: time,
        ctime: time,
        crtime: time,
        kind: file_type(attr.kind),
        perm: attr.perm,
        nlink: if attr.is_dir() { 2 } else { 1 },
        uid,
        gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

fn is_write_open(flags: i32) -> bool {
    flags & libc::O_ACCMODE != libc::O_RDONLY
}

impl Filesystem for SvnFs {
    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let name: OsString = name.to_os_string();
        let owner = owner(req);
        self.spawn("lookup", move |fs| match fs.lookup_child(parent, &name) {
            Ok((ino, attr)) => reply.entry(&fs.ttl, &fs.fuse_attr(ino, &attr, owner), 0),
            Err(e) => reply.error(e.errno()),
        });
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let owner = owner(req);
        self.spawn("getattr", move |fs| match fs.attributes(ino) {
            Ok(attr) => reply.attr(&fs.ttl, &fs.fuse_attr(ino, &attr, owner)),
            Err(e) => reply.error(e.errno()),
        });
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        if is_write_open(flags) {
            reply.error(libc::EROFS);
            return;
        }
        self.spawn("open", move |fs| match fs.open(ino) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(e.errno()),
        });
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        self.spawn("read", move |fs| match fs.read(ino, offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.errno()),
        });
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        self.spawn("readdir", move |fs| {
            let entries = match fs.entries(ino) {
                Ok(entries) => entries,
                Err(e) => {
                    reply.error(e.errno());
                    return;
                }
            };

            let skip = usize::try_from(offset).unwrap_or(0);
            for (i, (entry_ino, kind, name)) in entries.iter().enumerate().skip(skip) {
                if reply.add(*entry_ino, (i + 1) as i64, *kind, name) {
                    break;
                }
            }
            reply.ok();
        });
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }
}

/// Mount `fs` read-only at `mountpoint` and serve until unmounted.
pub fn mount(fs: SvnFs, mountpoint: &Path, fs_name: &str) -> io::Result<()> {
    info!(mountpoint = %mountpoint.display(), fs_name, "mounting");
    let options = [MountOption::RO, MountOption::FSName(fs_name.to_string())];
    fuser::mount2(fs, mountpoint, &options)?;
    debug!(mountpoint = %mountpoint.display(), "session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::ROOT_INODE;
    use std::sync::mpsc;
    use svnfs_kernel::{Commit, MaterializationCache, MemoryRepository, RevisionFs, SessionGuard};

    fn setup() -> (SvnFs, Arc<RevisionFs>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = MemoryRepository::new();
        repo.commit(Commit::new().put("/trunk/README", "read me"));
        repo.commit(Commit::new().put("/trunk/README", "read me again"));
        let vfs = Arc::new(RevisionFs::new(
            SessionGuard::new(repo),
            MaterializationCache::new(dir.path()),
        ));
        let fs = SvnFs::new(Arc::clone(&vfs) as Arc<dyn VfsOps>, Duration::from_secs(1));
        (fs, vfs, dir)
    }

    fn resolve(fs: &SvnFs, path: &[&str]) -> u64 {
        path.iter().fold(ROOT_INODE, |ino, name| {
            fs.inner.lookup_child(ino, OsStr::new(name)).unwrap().0
        })
    }

    #[test]
    fn test_lookup_allocates_stable_inodes() {
        let (fs, _vfs, _dir) = setup();
        let d = &fs.inner;
        let (rev, attr) = d.lookup_child(ROOT_INODE, OsStr::new("2")).unwrap();
        assert!(attr.is_dir());
        let (trunk, _) = d.lookup_child(rev, OsStr::new("trunk")).unwrap();
        let (readme, attr) = d.lookup_child(trunk, OsStr::new("README")).unwrap();
        assert_eq!(attr.size, 13);
        assert_eq!(d.path_of(readme).unwrap(), "/2/trunk/README");
        assert_eq!(d.lookup_child(trunk, OsStr::new("README")).unwrap().0, readme);
    }

    #[test]
    fn test_lookup_errors() {
        let (fs, _vfs, _dir) = setup();
        let d = &fs.inner;
        let err = d.lookup_child(ROOT_INODE, OsStr::new("trunk")).unwrap_err();
        assert_eq!(err.errno(), libc::ENOENT);
        let err = d.lookup_child(ROOT_INODE, OsStr::new("9")).unwrap_err();
        assert_eq!(err.errno(), libc::EPIPE);
        let err = d.lookup_child(4242, OsStr::new("x")).unwrap_err();
        assert_eq!(err.errno(), libc::ENOENT);
    }

    #[test]
    fn test_root_entries() {
        let (fs, _vfs, _dir) = setup();
        let entries = fs.inner.entries(ROOT_INODE).unwrap();
        let names: Vec<&str> = entries.iter().map(|(_, _, n)| n.as_str()).collect();
        assert_eq!(names, vec![".", "..", "2", "1"]);
        assert_eq!(entries[0].0, ROOT_INODE);
        assert_eq!(entries[1].0, ROOT_INODE);
        assert!(entries.iter().all(|(_, k, _)| *k == FileType::Directory));
        assert_eq!(fs.inner.path_of(entries[2].0).unwrap(), "/2");
    }

    #[test]
    fn test_nested_entries_link_parent() {
        let (fs, _vfs, _dir) = setup();
        let rev = resolve(&fs, &["1"]);
        let trunk = resolve(&fs, &["1", "trunk"]);
        let entries = fs.inner.entries(trunk).unwrap();
        assert_eq!(entries[0].0, trunk);
        assert_eq!(entries[1].0, rev);
        assert_eq!(entries[2].1, FileType::RegularFile);
        assert_eq!(fs.inner.path_of(entries[2].0).unwrap(), "/1/trunk/README");
    }

    #[test]
    fn test_open_then_read_by_inode() {
        let (fs, _vfs, _dir) = setup();
        let readme = resolve(&fs, &["1", "trunk", "README"]);
        fs.inner.open(readme).unwrap();
        assert_eq!(fs.inner.read(readme, 5, 64).unwrap(), b"me");
    }

    #[test]
    fn test_cached_read_not_blocked_by_pending_open() {
        let (fs, vfs, _dir) = setup();
        let cached = resolve(&fs, &["1", "trunk", "README"]);
        let uncached = resolve(&fs, &["2", "trunk", "README"]);
        fs.inner.open(cached).unwrap();

        // Simulate a long fetch: the session stays busy until released.
        let held = vfs.guard().exclusive().unwrap();

        let (open_tx, open_rx) = mpsc::channel();
        fs.spawn("open", move |d| {
            let _ = open_tx.send(d.open(uncached));
        });

        let (read_tx, read_rx) = mpsc::channel();
        fs.spawn("read", move |d| {
            let _ = read_tx.send(d.read(cached, 0, 64));
        });

        let data = read_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("cached read waited on the session");
        assert_eq!(data.unwrap(), b"read me");
        assert!(open_rx.try_recv().is_err());

        drop(held);
        let opened = open_rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(opened.is_ok());
        assert_eq!(fs.inner.read(uncached, 0, 64).unwrap(), b"read me again");
    }

    #[test]
    fn test_fuse_attr() {
        let now = SystemTime::now();
        let file = fuse_attr(7, &NodeAttr::file(1025), 1000, 100, now);
        assert_eq!(file.ino, 7);
        assert_eq!(file.kind, FileType::RegularFile);
        assert_eq!(file.perm, 0o644);
        assert_eq!(file.blocks, 3);
        assert_eq!(file.nlink, 1);
        assert_eq!((file.uid, file.gid), (1000, 100));

        let dir = fuse_attr(1, &NodeAttr::directory(), 0, 0, now);
        assert_eq!(dir.kind, FileType::Directory);
        assert_eq!(dir.perm, 0o755);
        assert_eq!(dir.nlink, 2);
    }

    #[test]
    fn test_write_opens_rejected() {
        assert!(!is_write_open(libc::O_RDONLY));
        assert!(is_write_open(libc::O_WRONLY));
        assert!(is_write_open(libc::O_RDWR));
        assert!(is_write_open(libc::O_RDWR | libc::O_APPEND));
    }
}
