//! Session guard.
//!
//! The repository session is a single connection that must never see two calls
//! at once. Every call goes through a [`SessionLease`], and a lease can only be
//! obtained from the one mutex inside [`SessionGuard`].
//!
//! Leases come in two flavors. [`AccessMode::Shared`] is used for metadata
//! reads (stat, list, latest revision) and [`AccessMode::Exclusive`] for the
//! fetch-and-cache sequence. Both take the same lock: the mode only labels the
//! call site in logs, it does not admit parallel holders.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::trace;

use crate::repo::RepositorySession;

/// Why a lease was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Metadata and listing calls.
    Shared,
    /// Fetch a file and register it in the cache as one unit.
    Exclusive,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Shared => f.write_str("shared"),
            AccessMode::Exclusive => f.write_str("exclusive"),
        }
    }
}

/// The guard could not be acquired.
#[derive(Debug, Clone, Error)]
#[error("repository session busy ({mode} acquisition timed out after {waited:?})")]
pub struct LockError {
    pub mode: AccessMode,
    pub waited: Duration,
}

/// Serializes all use of one [`RepositorySession`].
pub struct SessionGuard {
    session: Mutex<Box<dyn RepositorySession>>,
    timeout: Option<Duration>,
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("session", &"<locked>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SessionGuard {
    /// Wrap a session. Acquisition blocks until the session is free.
    pub fn new(session: impl RepositorySession + 'static) -> Self {
        Self {
            session: Mutex::new(Box::new(session)),
            timeout: None,
        }
    }

    /// Give up acquiring after `timeout` and report the session as busy.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configured acquisition timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Acquire for metadata access.
    pub fn shared(&self) -> Result<SessionLease<'_>, LockError> {
        self.acquire(AccessMode::Shared)
    }

    /// Acquire for a fetch-and-cache sequence.
    pub fn exclusive(&self) -> Result<SessionLease<'_>, LockError> {
        self.acquire(AccessMode::Exclusive)
    }

    /// Acquire the session. The lease releases it when dropped.
    pub fn acquire(&self, mode: AccessMode) -> Result<SessionLease<'_>, LockError> {
        let session = match self.timeout {
            None => self.session.lock(),
            Some(timeout) => self.session.try_lock_for(timeout).ok_or(LockError {
                mode,
                waited: timeout,
            })?,
        };
        trace!(%mode, "session acquired");
        Ok(SessionLease { session, mode })
    }
}

/// Exclusive access to the session for as long as it lives.
pub struct SessionLease<'a> {
    session: MutexGuard<'a, Box<dyn RepositorySession>>,
    mode: AccessMode,
}

impl fmt::Debug for SessionLease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLease")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl SessionLease<'_> {
    /// Mode this lease was acquired with.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }
}

impl Deref for SessionLease<'_> {
    type Target = dyn RepositorySession;

    fn deref(&self) -> &Self::Target {
        &**self.session
    }
}

impl DerefMut for SessionLease<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut **self.session
    }
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        trace!(mode = %self.mode, "session released");
    }
}
