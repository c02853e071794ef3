//! Materialization cache.
//!
//! Maps a virtual path (`/12/trunk/README`) to a local file holding that path's
//! content. The first open of a virtual path fetches it from the repository
//! while holding the session exclusively; every later open and every read is
//! served from disk without touching the session.
//!
//! The key is the virtual path string, not the repository path or a content
//! hash: `/12/README` and `/13/README` are separate entries even when their
//! bytes are identical. Entries are never evicted and cache files are left on
//! disk when the process exits.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use crate::path::Revnum;
use crate::repo::RepoError;
use crate::session::{LockError, SessionGuard};

/// File name prefix for cache files.
pub const CACHE_FILE_PREFIX: &str = "svnfs.";

/// Length of the random suffix after [`CACHE_FILE_PREFIX`].
pub const CACHE_FILE_RAND_LEN: usize = 6;

/// Materialization and cache read errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The session guard could not be acquired.
    #[error(transparent)]
    Busy(#[from] LockError),

    /// The cache file could not be created.
    #[error("could not create cache file in {dir}: {source}")]
    Create {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The repository failed to deliver the content.
    #[error("could not fetch {path}@{revision}: {source}")]
    Fetch {
        path: String,
        revision: Revnum,
        #[source]
        source: RepoError,
    },

    /// The cache file could not be flushed, closed or persisted.
    #[error("could not finish cache file for {vpath}: {source}")]
    Finish {
        vpath: String,
        #[source]
        source: io::Error,
    },

    /// A read was requested for a path that was never materialized.
    #[error("no cache entry for {0}")]
    NotCached(String),

    /// The cache file could not be opened, sought or read.
    #[error("could not read cache file {file}: {source}")]
    Read {
        file: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Virtual path → local file, fetched on first use.
#[derive(Debug)]
pub struct MaterializationCache {
    entries: DashMap<String, PathBuf>,
    dir: PathBuf,
}

impl MaterializationCache {
    /// Create an empty cache storing files in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            entries: DashMap::new(),
            dir: dir.into(),
        }
    }

    /// Create an empty cache in the system temp directory.
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir())
    }

    /// Directory cache files are created in.
    pub fn cache_dir(&self) -> &Path {
        &self.dir
    }

    /// Local file for `vpath`, if it has been materialized.
    pub fn lookup(&self, vpath: &str) -> Option<PathBuf> {
        self.entries.get(vpath).map(|entry| entry.value().clone())
    }

    /// Number of materialized paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been materialized yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Make sure `vpath` has a local copy and return its location.
    ///
    /// On a miss the session is held exclusively from file creation until the
    /// entry is registered. On any failure the partial file is removed and no
    /// entry is added.
    pub fn ensure_materialized(
        &self,
        guard: &SessionGuard,
        vpath: &str,
        revision: Revnum,
        repo_path: &str,
    ) -> Result<PathBuf, CacheError> {
        if let Some(local) = self.lookup(vpath) {
            debug!(vpath, local = %local.display(), "cache hit");
            return Ok(local);
        }

        debug!(vpath, "cache miss");
        let mut session = guard.exclusive()?;

        // Another opener may have filled the entry while we waited.
        if let Some(local) = self.lookup(vpath) {
            debug!(vpath, "materialized while waiting");
            return Ok(local);
        }

        let file = tempfile::Builder::new()
            .prefix(CACHE_FILE_PREFIX)
            .rand_bytes(CACHE_FILE_RAND_LEN)
            .tempfile_in(&self.dir)
            .map_err(|source| CacheError::Create {
                dir: self.dir.clone(),
                source,
            })?;

        let mut writer = BufWriter::new(file);
        session
            .fetch(repo_path, revision, &mut writer)
            .map_err(|source| CacheError::Fetch {
                path: repo_path.to_string(),
                revision,
                source,
            })?;

        let finish = |source: io::Error| CacheError::Finish {
            vpath: vpath.to_string(),
            source,
        };
        let file = writer.into_inner().map_err(|e| finish(e.into_error()))?;
        file.as_file().sync_data().map_err(finish)?;
        let local = file.into_temp_path().keep().map_err(|e| finish(e.error))?;

        self.entries.insert(vpath.to_string(), local.clone());
        drop(session);

        debug!(vpath, local = %local.display(), "materialized");
        Ok(local)
    }

    /// Read up to `size` bytes of `vpath` starting at `offset`.
    ///
    /// Fewer bytes come back at end of file; an offset past the end yields an
    /// empty buffer.
    pub fn read(&self, vpath: &str, offset: u64, size: u32) -> Result<Vec<u8>, CacheError> {
        let local = self
            .lookup(vpath)
            .ok_or_else(|| CacheError::NotCached(vpath.to_string()))?;
        read_range(&local, offset, size).map_err(|source| CacheError::Read {
            file: local,
            source,
        })
    }
}

fn read_range(local: &Path, offset: u64, size: u32) -> io::Result<Vec<u8>> {
    let mut file = File::open(local)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity(size as usize);
    file.take(u64::from(size)).read_to_end(&mut buf)?;
    Ok(buf)
}
