//! In-memory repository.
//!
//! Every revision is a full snapshot of the tree, which keeps lookups trivial
//! and is plenty for tests and demo mounts.

use std::collections::BTreeMap;
use std::io::Write;

use super::{NodeKind, RepoDirEntry, RepoEntry, RepoError, RepoResult, RepositorySession};
use crate::path::Revnum;

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Directory,
    Special,
}

type Tree = BTreeMap<String, Node>;

/// A change set applied by [`MemoryRepository::commit`].
#[derive(Debug, Clone, Default)]
pub struct Commit {
    ops: Vec<Op>,
}

#[derive(Debug, Clone)]
enum Op {
    Put(String, Vec<u8>),
    Mkdir(String),
    Special(String),
    Delete(String),
}

impl Commit {
    /// Create an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file. Parent directories are created as needed.
    pub fn put(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.ops.push(Op::Put(path.into(), content.into()));
        self
    }

    /// Add a directory. Parent directories are created as needed.
    pub fn mkdir(mut self, path: impl Into<String>) -> Self {
        self.ops.push(Op::Mkdir(path.into()));
        self
    }

    /// Add a node that is neither a file nor a directory.
    pub fn special(mut self, path: impl Into<String>) -> Self {
        self.ops.push(Op::Special(path.into()));
        self
    }

    /// Remove a path and everything below it.
    pub fn delete(mut self, path: impl Into<String>) -> Self {
        self.ops.push(Op::Delete(path.into()));
        self
    }
}

/// Multi-revision repository held in memory.
///
/// Revision 0 is the empty tree, matching a freshly created Subversion
/// repository.
#[derive(Debug, Clone)]
pub struct MemoryRepository {
    revisions: Vec<Tree>,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    /// Create a repository containing only revision 0.
    pub fn new() -> Self {
        let mut root = Tree::new();
        root.insert("/".to_string(), Node::Directory);
        Self {
            revisions: vec![root],
        }
    }

    /// Youngest revision.
    pub fn youngest(&self) -> Revnum {
        (self.revisions.len() - 1) as Revnum
    }

    /// Apply `commit` on top of the youngest revision and return the new number.
    pub fn commit(&mut self, commit: Commit) -> Revnum {
        let mut tree = self.revisions[self.revisions.len() - 1].clone();
        for op in commit.ops {
            match op {
                Op::Put(path, content) => {
                    let path = normalize(&path);
                    ensure_parents(&mut tree, &path);
                    tree.insert(path, Node::File(content));
                }
                Op::Mkdir(path) => {
                    let path = normalize(&path);
                    ensure_parents(&mut tree, &path);
                    tree.insert(path, Node::Directory);
                }
                Op::Special(path) => {
                    let path = normalize(&path);
                    ensure_parents(&mut tree, &path);
                    tree.insert(path, Node::Special);
                }
                Op::Delete(path) => {
                    let path = normalize(&path);
                    if path != "/" {
                        let prefix = format!("{path}/");
                        tree.retain(|p, _| p != &path && !p.starts_with(&prefix));
                    }
                }
            }
        }
        self.revisions.push(tree);
        self.youngest()
    }

    fn tree(&self, revision: Revnum) -> RepoResult<&Tree> {
        usize::try_from(revision)
            .ok()
            .and_then(|r| self.revisions.get(r))
            .ok_or(RepoError::NoSuchRevision(revision))
    }

    fn node(&self, path: &str, revision: Revnum) -> RepoResult<(String, &Node)> {
        let path = normalize(path);
        let tree = self.tree(revision)?;
        match tree.get(&path) {
            Some(node) => Ok((path, node)),
            None => Err(RepoError::NotFound { path, revision }),
        }
    }
}

/// Leading slash, no trailing slash, no empty components.
fn normalize(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    format!("/{}", parts.join("/"))
}

fn ensure_parents(tree: &mut Tree, path: &str) {
    let mut current = String::new();
    let components: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    for component in components.iter().take(components.len().saturating_sub(1)) {
        current.push('/');
        current.push_str(component);
        tree.entry(current.clone()).or_insert(Node::Directory);
    }
}

fn kind_of(node: &Node) -> NodeKind {
    match node {
        Node::File(_) => NodeKind::File,
        Node::Directory => NodeKind::Directory,
        Node::Special => NodeKind::Other,
    }
}

impl RepositorySession for MemoryRepository {
    fn latest_revision(&mut self) -> RepoResult<Revnum> {
        Ok(self.youngest())
    }

    fn stat(&mut self, path: &str, revision: Revnum) -> RepoResult<RepoEntry> {
        let (_, node) = self.node(path, revision)?;
        let size = match node {
            Node::File(data) => data.len() as u64,
            Node::Directory | Node::Special => 0,
        };
        Ok(RepoEntry {
            kind: kind_of(node),
            size,
        })
    }

    fn list(&mut self, path: &str, revision: Revnum) -> RepoResult<Vec<RepoDirEntry>> {
        let (path, node) = self.node(path, revision)?;
        if !matches!(node, Node::Directory) {
            return Err(RepoError::NotADirectory { path, revision });
        }

        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{path}/")
        };
        let tree = self.tree(revision)?;
        Ok(tree
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter_map(|(p, node)| {
                let name = &p[prefix.len()..];
                (!name.is_empty() && !name.contains('/')).then(|| RepoDirEntry {
                    name: name.to_string(),
                    kind: kind_of(node),
                })
            })
            .collect())
    }

    fn fetch(&mut self, path: &str, revision: Revnum, sink: &mut dyn Write) -> RepoResult<()> {
        let (path, node) = self.node(path, revision)?;
        match node {
            Node::File(data) => {
                sink.write_all(data)?;
                Ok(())
            }
            _ => Err(RepoError::NotAFile { path, revision }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        repo.commit(
            Commit::new()
                .put("/trunk/README", "hello")
                .put("/trunk/src/main.c", "int main;")
                .mkdir("/tags"),
        );
        repo.commit(Commit::new().put("/trunk/README", "hello, world"));
        repo
    }

    #[test]
    fn test_revision_zero_is_empty() {
        let mut repo = MemoryRepository::new();
        assert_eq!(repo.latest_revision().unwrap(), 0);
        assert!(repo.list("/", 0).unwrap().is_empty());
        assert_eq!(repo.stat("/", 0).unwrap().kind, NodeKind::Directory);
    }

    #[test]
    fn test_commit_advances_revision() {
        let mut repo = sample();
        assert_eq!(repo.latest_revision().unwrap(), 2);
    }

    #[test]
    fn test_stat_sizes_per_revision() {
        let mut repo = sample();
        assert_eq!(repo.stat("/trunk/README", 1).unwrap().size, 5);
        assert_eq!(repo.stat("/trunk/README", 2).unwrap().size, 12);
        assert_eq!(repo.stat("/trunk", 1).unwrap().kind, NodeKind::Directory);
    }

    #[test]
    fn test_stat_missing() {
        let mut repo = sample();
        assert!(matches!(
            repo.stat("/nope", 1),
            Err(RepoError::NotFound { .. })
        ));
        assert!(matches!(
            repo.stat("/trunk", 9),
            Err(RepoError::NoSuchRevision(9))
        ));
    }

    #[test]
    fn test_list_direct_children_only() {
        let mut repo = sample();
        let mut names: Vec<String> = repo
            .list("/trunk", 1)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["README", "src"]);

        let root = repo.list("/", 1).unwrap();
        assert_eq!(root.len(), 2);
    }

    #[test]
    fn test_list_file_is_error() {
        let mut repo = sample();
        assert!(matches!(
            repo.list("/trunk/README", 1),
            Err(RepoError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_fetch() {
        let mut repo = sample();
        let mut out = Vec::new();
        repo.fetch("/trunk/README", 1, &mut out).unwrap();
        assert_eq!(out, b"hello");

        out.clear();
        repo.fetch("trunk/README/", 2, &mut out).unwrap();
        assert_eq!(out, b"hello, world");
    }

    #[test]
    fn test_fetch_directory_is_error() {
        let mut repo = sample();
        let mut out = Vec::new();
        assert!(matches!(
            repo.fetch("/trunk", 1, &mut out),
            Err(RepoError::NotAFile { .. })
        ));
    }

    #[test]
    fn test_delete_removes_subtree() {
        let mut repo = sample();
        let rev = repo.commit(Commit::new().delete("/trunk/src"));
        assert!(repo.stat("/trunk/src/main.c", rev).is_err());
        assert!(repo.stat("/trunk/src/main.c", rev - 1).is_ok());
    }

    #[test]
    fn test_special_node() {
        let mut repo = MemoryRepository::new();
        let rev = repo.commit(Commit::new().special("/dev/thing"));
        assert_eq!(repo.stat("/dev/thing", rev).unwrap().kind, NodeKind::Other);
    }
}
