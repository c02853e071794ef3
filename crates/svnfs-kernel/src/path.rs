//! Virtual path codec.
//!
//! The filesystem namespace encodes a revision and a repository path in a
//! single absolute path:
//!
//! ```text
//! /                 # listing of every revision
//! /123              # root of the repository at r123
//! /123/src/main.c   # /src/main.c at r123
//! ```
//!
//! Nothing else is a valid virtual path.

use thiserror::Error;

/// A Subversion revision number.
pub type Revnum = u64;

/// Why a virtual path could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path does not start with '/': {0:?}")]
    NotAbsolute(String),

    #[error("cannot split the root directory")]
    Root,

    #[error("no revision specified: {0:?}")]
    NoRevision(String),

    #[error("invalid character in revision: {0:?}")]
    InvalidRevision(String),

    #[error("revision out of range: {0:?}")]
    RevisionOutOfRange(String),
}

/// A decoded virtual path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualPath {
    /// The literal `/`, which lists all revisions.
    Root,
    /// A path inside one revision. `repo_path` always starts with `/`.
    Revision { revision: Revnum, repo_path: String },
}

impl VirtualPath {
    /// Decode any virtual path, including the root.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path == "/" {
            return Ok(VirtualPath::Root);
        }
        let (revision, repo_path) = split(path)?;
        Ok(VirtualPath::Revision {
            revision,
            repo_path: repo_path.to_string(),
        })
    }

    /// Returns true for the revision listing root.
    pub fn is_root(&self) -> bool {
        matches!(self, VirtualPath::Root)
    }

    /// The revision this path addresses, if any.
    pub fn revision(&self) -> Option<Revnum> {
        match self {
            VirtualPath::Root => None,
            VirtualPath::Revision { revision, .. } => Some(*revision),
        }
    }
}

impl std::fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VirtualPath::Root => f.write_str("/"),
            VirtualPath::Revision {
                revision,
                repo_path,
            } => f.write_str(&encode(*revision, repo_path)),
        }
    }
}

/// Split a non-root virtual path into its revision and repository path.
///
/// The root `/` is rejected; callers that accept it use [`VirtualPath::parse`].
/// An empty repository path (`/123`) normalizes to `/`.
pub fn split(path: &str) -> Result<(Revnum, &str), PathError> {
    let Some(rest) = path.strip_prefix('/') else {
        return Err(PathError::NotAbsolute(path.to_string()));
    };
    if rest.is_empty() {
        return Err(PathError::Root);
    }

    let boundary = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if boundary == 0 {
        return Err(PathError::NoRevision(path.to_string()));
    }

    let (digits, remainder) = rest.split_at(boundary);
    if !remainder.is_empty() && !remainder.starts_with('/') {
        return Err(PathError::InvalidRevision(path.to_string()));
    }

    let revision: Revnum = digits
        .parse()
        .map_err(|_| PathError::RevisionOutOfRange(path.to_string()))?;

    let repo_path = if remainder.is_empty() { "/" } else { remainder };
    Ok((revision, repo_path))
}

/// Build the virtual path for `repo_path` at `revision`.
///
/// The repository root encodes as `/{revision}` with no trailing slash.
pub fn encode(revision: Revnum, repo_path: &str) -> String {
    if repo_path.is_empty() || repo_path == "/" {
        format!("/{revision}")
    } else if repo_path.starts_with('/') {
        format!("/{revision}{repo_path}")
    } else {
        format!("/{revision}/{repo_path}")
    }
}

/// Join a child name onto a virtual path.
pub fn join(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}
