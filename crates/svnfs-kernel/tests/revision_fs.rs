//! End-to-end behavior of the revision filesystem over an in-memory repository.

use std::time::Duration;

use svnfs_kernel::path::{encode, split};
use svnfs_kernel::{
    Commit, MaterializationCache, MemoryRepository, RevisionFs, SessionGuard, VfsError, VfsOps,
    VirtualPath,
};

fn five_revisions() -> MemoryRepository {
    let mut repo = MemoryRepository::new();
    repo.commit(Commit::new().put("/hello", "hello"));
    repo.commit(Commit::new().put("/trunk/src/main.c", "int main(void) { return 0; }\n"));
    repo.commit(Commit::new().mkdir("/tags"));
    repo.commit(Commit::new().put("/hello", "hello, revision four"));
    repo.commit(Commit::new().delete("/tags"));
    repo
}

fn mount(repo: MemoryRepository) -> (RevisionFs, tempfile::TempDir) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempfile::tempdir().unwrap();
    let guard = SessionGuard::new(repo).with_timeout(Some(Duration::from_secs(5)));
    (RevisionFs::new(guard, MaterializationCache::new(dir.path())), dir)
}

#[test]
fn test_codec_examples() {
    assert_eq!(VirtualPath::parse("/").unwrap(), VirtualPath::Root);
    assert_eq!(split("/123").unwrap(), (123, "/"));
    assert_eq!(split("/123/a/b").unwrap(), (123, "/a/b"));
    assert!(split("/abc").is_err());
    assert!(split("/123x/a").is_err());
    assert!(split("").is_err());
    assert_eq!(split(&encode(77, "/x/y")).unwrap(), (77, "/x/y"));
}

#[test]
fn test_root_lists_revisions_newest_first() {
    let (fs, _dir) = mount(five_revisions());
    let names: Vec<String> = fs
        .list_directory("/")
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec![".", "..", "5", "4", "3", "2", "1"]);
}

#[test]
fn test_empty_repository_lists_only_dots() {
    let (fs, _dir) = mount(MemoryRepository::new());
    let names: Vec<String> = fs
        .list_directory("/")
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec![".", ".."]);
}

#[test]
fn test_open_then_read_hello() {
    let (fs, _dir) = mount(five_revisions());
    fs.open("/1/hello").unwrap();
    assert_eq!(fs.read("/1/hello", 0, 5).unwrap(), b"hello");
    assert_eq!(fs.read("/1/hello", 5, 5).unwrap().len(), 0);
}

#[test]
fn test_each_revision_sees_its_own_content() {
    let (fs, _dir) = mount(five_revisions());
    fs.open("/3/hello").unwrap();
    fs.open("/4/hello").unwrap();
    assert_eq!(fs.read("/3/hello", 0, 100).unwrap(), b"hello");
    assert_eq!(fs.read("/4/hello", 0, 100).unwrap(), b"hello, revision four");
    assert_eq!(fs.attributes("/4/hello").unwrap().size, 20);
}

#[test]
fn test_deleted_paths_follow_history() {
    let (fs, _dir) = mount(five_revisions());
    assert!(fs.attributes("/4/tags").unwrap().is_dir());
    assert!(matches!(fs.attributes("/5/tags"), Err(VfsError::Remote(_))));
}

#[test]
fn test_missing_file_releases_session() {
    let (fs, _dir) = mount(five_revisions());
    let err = fs.attributes("/5/missing-file").unwrap_err();
    assert!(matches!(err, VfsError::Remote(_)));
    assert_eq!(err.errno(), libc::EPIPE);

    // The guard must be free again for an unrelated call.
    assert!(fs.attributes("/5/hello").unwrap().is_file());
    assert!(fs.list_directory("/2/trunk").is_ok());
}

#[test]
fn test_nested_listing() {
    let (fs, _dir) = mount(five_revisions());
    let entries = fs.list_directory("/2/trunk/src").unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec![".", "..", "main.c"]);
    assert!(entries[2].kind.is_file());
}

#[test]
fn test_open_is_idempotent() {
    let (fs, dir) = mount(five_revisions());
    fs.open("/2/trunk/src/main.c").unwrap();
    let first = fs.cache().lookup("/2/trunk/src/main.c").unwrap();
    fs.open("/2/trunk/src/main.c").unwrap();
    let second = fs.cache().lookup("/2/trunk/src/main.c").unwrap();
    assert_eq!(first, second);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_failures_map_to_errno() {
    let (fs, _dir) = mount(five_revisions());
    assert_eq!(fs.attributes("/nope").unwrap_err().errno(), libc::ENOENT);
    assert_eq!(fs.open("/1/absent").unwrap_err().errno(), libc::ENOENT);
    assert_eq!(fs.read("/1/hello", 0, 1).unwrap_err().errno(), libc::EIO);
}
