//! Mount configuration.
//!
//! Values come from two layers: an optional TOML file and the command line.
//! Command-line values win. The merged layer is resolved once into an
//! immutable [`Config`].
//!
//! ```toml
//! repository = "https://svn.example.org/repos/project"
//! mountpoint = "~/mnt/project"
//! cache_dir = "~/.cache/svnfs"
//! lock_timeout_ms = 30000
//! attr_ttl_secs = 1
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_ATTR_TTL, DEFAULT_FS_NAME, DEFAULT_SVN_BINARY,
};

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no repository given (pass REPOSITORY or set `repository` in the config file)")]
    MissingRepository,

    #[error("no mountpoint given (pass MOUNTPOINT or set `mountpoint` in the config file)")]
    MissingMountpoint,

    #[error("repository path {path} does not exist: {source}")]
    LocalRepository {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One layer of optional settings (config file or CLI).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub repository: Option<String>,
    pub mountpoint: Option<String>,
    pub cache_dir: Option<String>,
    pub lock_timeout_ms: Option<u64>,
    pub attr_ttl_secs: Option<u64>,
    pub svn_binary: Option<String>,
    pub fs_name: Option<String>,
}

impl ConfigLayer {
    /// Default config file location: `$XDG_CONFIG_HOME/svnfs/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the file layer.
    ///
    /// An explicit path must exist. The default path is optional: if it is
    /// missing an empty layer is returned.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(&expand(&path.to_string_lossy())),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let layer = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(layer)
    }

    /// Parse config TOML.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Overlay `over` on top of `self`; set fields in `over` win.
    pub fn merge(self, over: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            repository: over.repository.or(self.repository),
            mountpoint: over.mountpoint.or(self.mountpoint),
            cache_dir: over.cache_dir.or(self.cache_dir),
            lock_timeout_ms: over.lock_timeout_ms.or(self.lock_timeout_ms),
            attr_ttl_secs: over.attr_ttl_secs.or(self.attr_ttl_secs),
            svn_binary: over.svn_binary.or(self.svn_binary),
            fs_name: over.fs_name.or(self.fs_name),
        }
    }

    /// Fill defaults and validate required fields.
    pub fn resolve(self) -> Result<Config, ConfigError> {
        let repository = self.repository.ok_or(ConfigError::MissingRepository)?;
        let mountpoint = self.mountpoint.ok_or(ConfigError::MissingMountpoint)?;

        Ok(Config {
            repository: repository_url(&repository)?,
            mountpoint: expand(&mountpoint),
            cache_dir: self.cache_dir.as_deref().map(expand),
            // Zero and absent both mean "wait for the session".
            lock_timeout: self
                .lock_timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            attr_ttl: self
                .attr_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_ATTR_TTL),
            svn_binary: self
                .svn_binary
                .unwrap_or_else(|| DEFAULT_SVN_BINARY.to_string()),
            fs_name: self.fs_name.unwrap_or_else(|| DEFAULT_FS_NAME.to_string()),
        })
    }
}

/// Resolved, immutable mount configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Repository URL handed to the `svn` client.
    pub repository: String,
    pub mountpoint: PathBuf,
    /// Cache directory; `None` uses the system temporary directory.
    pub cache_dir: Option<PathBuf>,
    /// Bound on waiting for the repository session; `None` waits forever.
    pub lock_timeout: Option<Duration>,
    pub attr_ttl: Duration,
    pub svn_binary: String,
    pub fs_name: String,
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// URLs pass through; a local path becomes an absolute `file://` URL.
fn repository_url(repository: &str) -> Result<String, ConfigError> {
    if repository.contains("://") {
        return Ok(repository.trim_end_matches('/').to_string());
    }
    let path = expand(repository);
    let absolute = path
        .canonicalize()
        .map_err(|source| ConfigError::LocalRepository { path, source })?;
    Ok(format!("file://{}", absolute.display()))
}
