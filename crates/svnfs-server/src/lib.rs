//! svnfs server: configuration, FUSE dispatch and mounting.

pub mod config;
pub mod constants;
pub mod fuse;
pub mod inode;

pub use config::{Config, ConfigError, ConfigLayer};
pub use fuse::{SvnFs, mount};
