//! Backend module for process transports.
//!
//! A [`Spawner`] turns a [`CommandLine`] into a [`Transport`]: a byte stream
//! to and from one child process, plus the means to reap or kill it. The
//! production backends are [`ProcessSpawner`] (piped stdio) and, on Unix,
//! [`PtySpawner`] (a pseudo-terminal); [`LocalSpawner`] picks one of them
//! from a [`BackendType`]. Tests use the scripted spawner in
//! [`mock`](crate::mock).

mod command;
mod local;
mod process;
#[cfg(unix)]
mod pty;

use std::fmt;
use std::future::Future;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

pub use command::{Arg, CommandLine};
pub use local::{LocalSpawner, LocalTransport};
pub use process::{ProcessSpawner, ProcessTransport};
#[cfg(unix)]
pub use pty::{PtySpawner, PtyTransport};

use crate::error::Result;
use crate::types::ProcessExitStatus;

/// How children are connected to the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Piped stdio, stderr merged into stdout.
    #[default]
    Pipe,
    /// A pseudo-terminal as stdin, stdout and controlling terminal.
    Pty,
}

impl BackendType {
    /// Check if this backend is available on this platform.
    #[must_use]
    pub const fn is_available(self) -> bool {
        match self {
            Self::Pipe => true,
            Self::Pty => cfg!(unix),
        }
    }

    /// Get the backend name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pipe => "pipe",
            Self::Pty => "pty",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pipe" => Ok(Self::Pipe),
            "pty" => Ok(Self::Pty),
            other => Err(format!("unknown backend '{other}' (expected pipe or pty)")),
        }
    }
}

/// A connection to one running child.
///
/// Reads yield the child's output (stdout and stderr interleaved), writes go
/// to its stdin, and shutting down the write half closes stdin.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {
    /// Wait for the child to terminate.
    fn wait(&mut self) -> impl Future<Output = io::Result<ProcessExitStatus>> + Send;

    /// Ask the child to die. Does not wait for it.
    fn kill(&mut self) -> io::Result<()>;

    /// Process ID, if known and still running.
    fn pid(&self) -> Option<u32>;
}

/// Launches children.
pub trait Spawner: Send + Sync {
    /// The transport type produced by this spawner.
    type Transport: Transport;

    /// Launch `command`.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Spawn`](crate::ExpectError::Spawn) if the
    /// executable cannot be launched.
    fn spawn(&self, command: &CommandLine) -> Result<Self::Transport>;

    /// Backend name, for logs.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_type_parses_any_case() {
        assert_eq!("PTY".parse::<BackendType>(), Ok(BackendType::Pty));
        assert_eq!("pipe".parse::<BackendType>(), Ok(BackendType::Pipe));
        let err = "ssh".parse::<BackendType>().unwrap_err();
        assert!(err.contains("'ssh'"));
    }

    #[test]
    fn backend_type_names() {
        assert_eq!(BackendType::default(), BackendType::Pipe);
        assert_eq!(BackendType::Pty.to_string(), "pty");
        assert!(BackendType::Pipe.is_available());
        assert_eq!(BackendType::Pty.is_available(), cfg!(unix));
    }
}
