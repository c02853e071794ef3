//! Server configuration constants.
//!
//! Centralizes defaults that the config file and CLI can override.

use std::time::Duration;

/// Name of the `svn` client binary looked up on `PATH`.
pub const DEFAULT_SVN_BINARY: &str = "svn";

/// Filesystem name shown in the mount table.
pub const DEFAULT_FS_NAME: &str = "svnfs";

/// How long the kernel may cache attributes and entries.
pub const DEFAULT_ATTR_TTL: Duration = Duration::from_secs(1);

/// Config file name under the user's config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory under the user's config directory.
pub const CONFIG_DIR_NAME: &str = "svnfs";
