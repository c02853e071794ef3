//! Repository session backed by the `svn` command-line client.
//!
//! Each call runs one `svn` subcommand against `URL/path@rev`. Authentication
//! is whatever the client's own configuration provides; the session always runs
//! with `--non-interactive` so a missing credential fails instead of prompting.

use std::io::{self, Read, Write};
use std::process::{Command, Stdio};

use tracing::debug;

use super::{NodeKind, RepoDirEntry, RepoEntry, RepoError, RepoResult, RepositorySession};
use crate::path::Revnum;

/// Error codes svn reports for paths that do not exist at a revision.
const NOT_FOUND_CODES: &[&str] = &["E200009", "E160013", "W160013", "E170000"];

/// Session that shells out to `svn`.
#[derive(Debug, Clone)]
pub struct SvnCommandSession {
    url: String,
    binary: String,
}

impl SvnCommandSession {
    /// Open a session and verify the repository answers.
    pub fn open(url: impl Into<String>, binary: impl Into<String>) -> RepoResult<Self> {
        let mut session = Self {
            url: url.into().trim_end_matches('/').to_string(),
            binary: binary.into(),
        };
        let youngest = session.latest_revision()?;
        debug!(url = %session.url, youngest, "opened svn session");
        Ok(session)
    }

    /// Repository root URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// `URL/path@rev`. The peg revision also protects names containing `@`.
    fn target(&self, path: &str, revision: Option<Revnum>) -> String {
        let path = path.trim_end_matches('/');
        let path = if path.is_empty() || path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        match revision {
            Some(rev) => format!("{}{}@{}", self.url, path, rev),
            None => format!("{}{}", self.url, path),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--non-interactive").args(args);
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Run to completion and return stdout.
    ///
    /// `subject` is the repository path and revision the command is about, if
    /// any; a "no such path" failure is reported against it.
    fn run(&self, args: &[&str], subject: Option<(&str, Revnum)>) -> RepoResult<Vec<u8>> {
        debug!(binary = %self.binary, ?args, "svn");
        let output = self.command(args).output()?;
        if !output.status.success() {
            return Err(command_error(
                output.status.code(),
                &String::from_utf8_lossy(&output.stderr),
                subject,
            ));
        }
        Ok(output.stdout)
    }
}

fn command_error(status: Option<i32>, stderr: &str, subject: Option<(&str, Revnum)>) -> RepoError {
    let missing = NOT_FOUND_CODES.iter().any(|code| stderr.contains(code));
    match subject {
        Some((path, revision)) if missing => RepoError::NotFound {
            path: path.to_string(),
            revision,
        },
        _ => RepoError::Command {
            status: status.unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        },
    }
}

/// Parse the output of `svn info --show-item revision`.
pub(crate) fn parse_revision(stdout: &str) -> RepoResult<Revnum> {
    let trimmed = stdout.trim();
    trimmed
        .parse()
        .map_err(|_| RepoError::Protocol(format!("expected a revision number, got {trimmed:?}")))
}

/// Parse one line of `svn list --verbose --depth empty` for a known target name.
///
/// ```text
///      12 kyle              1234 Mar 03 12:00 main.c
///      12 kyle                   Mar 03 12:00 ./
/// ```
pub(crate) fn parse_stat_line(line: &str, name: &str) -> RepoResult<RepoEntry> {
    let line = line.trim_end();
    if line.ends_with("./") {
        return Ok(RepoEntry {
            kind: NodeKind::Directory,
            size: 0,
        });
    }

    let head = line
        .strip_suffix(name)
        .ok_or_else(|| RepoError::Protocol(format!("listing does not name {name:?}: {line:?}")))?;
    let fields: Vec<&str> = head.split_whitespace().collect();
    // [rev, author?, lock?, size, month, day, time-or-year]
    if fields.len() < 5 {
        return Err(RepoError::Protocol(format!("short listing line: {line:?}")));
    }
    let size = fields[fields.len() - 4]
        .parse()
        .map_err(|_| RepoError::Protocol(format!("no size in listing line: {line:?}")))?;
    Ok(RepoEntry {
        kind: NodeKind::File,
        size,
    })
}

/// Parse the output of `svn list`. Directories carry a trailing `/`.
pub(crate) fn parse_list(stdout: &str) -> Vec<RepoDirEntry> {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| match line.strip_suffix('/') {
            Some(dir) => RepoDirEntry {
                name: dir.to_string(),
                kind: NodeKind::Directory,
            },
            None => RepoDirEntry {
                name: line.to_string(),
                kind: NodeKind::File,
            },
        })
        .collect()
}

fn base_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

impl RepositorySession for SvnCommandSession {
    fn latest_revision(&mut self) -> RepoResult<Revnum> {
        let target = self.target("/", None);
        let stdout = self.run(&["info", "--show-item", "revision", &target], None)?;
        parse_revision(&String::from_utf8_lossy(&stdout))
    }

    fn stat(&mut self, path: &str, revision: Revnum) -> RepoResult<RepoEntry> {
        let target = self.target(path, Some(revision));
        let stdout = self.run(
            &["list", "--verbose", "--depth", "empty", &target],
            Some((path, revision)),
        )?;
        let stdout = String::from_utf8_lossy(&stdout);
        let line = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| RepoError::NotFound {
                path: path.to_string(),
                revision,
            })?;
        parse_stat_line(line, base_name(path))
    }

    fn list(&mut self, path: &str, revision: Revnum) -> RepoResult<Vec<RepoDirEntry>> {
        let target = self.target(path, Some(revision));
        let stdout = self.run(&["list", &target], Some((path, revision)))?;
        Ok(parse_list(&String::from_utf8_lossy(&stdout)))
    }

    fn fetch(&mut self, path: &str, revision: Revnum, sink: &mut dyn Write) -> RepoResult<()> {
        let target = self.target(path, Some(revision));
        let args = ["cat", target.as_str()];
        debug!(binary = %self.binary, ?args, "svn");

        let mut child = self
            .command(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain stderr concurrently so a chatty client cannot block on a full pipe.
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        let copied = match child.stdout.take() {
            Some(mut stdout) => io::copy(&mut stdout, sink).map(|_| ()),
            None => Err(io::Error::other("svn cat produced no stdout pipe")),
        };
        // The pipe is closed; a client that ignores SIGPIPE must not outlive
        // a failed sink, or wait() never returns.
        if copied.is_err() {
            let _ = child.kill();
        }
        let status = child.wait()?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if let Err(e) = copied {
            debug!(path, revision, error = %e, "svn cat output not stored");
            return Err(e.into());
        }
        if !status.success() {
            return Err(command_error(
                status.code(),
                &stderr,
                Some((path, revision)),
            ));
        }
        Ok(())
    }
}
