//! Backend chosen at run time from configuration.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::{BackendType, CommandLine, ProcessSpawner, ProcessTransport, Spawner, Transport};
#[cfg(unix)]
use super::{PtySpawner, PtyTransport};
#[cfg(not(unix))]
use crate::error::ExpectError;
use crate::error::Result;
use crate::types::ProcessExitStatus;

/// Spawner for local children over either backend.
#[derive(Debug, Clone)]
pub enum LocalSpawner {
    /// Piped stdio.
    Pipe(ProcessSpawner),
    /// Pseudo-terminal.
    #[cfg(unix)]
    Pty(PtySpawner),
}

impl Default for LocalSpawner {
    fn default() -> Self {
        Self::Pipe(ProcessSpawner::new())
    }
}

impl LocalSpawner {
    /// Create a spawner for `backend` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Config`] if the backend is not available on
    /// this platform.
    pub fn for_backend(backend: BackendType) -> Result<Self> {
        match backend {
            BackendType::Pipe => Ok(Self::Pipe(ProcessSpawner::new())),
            #[cfg(unix)]
            BackendType::Pty => Ok(Self::Pty(PtySpawner::new())),
            #[cfg(not(unix))]
            BackendType::Pty => Err(ExpectError::config(format!(
                "backend '{backend}' is not available on this platform"
            ))),
        }
    }

    /// The backend this spawner uses.
    #[must_use]
    pub const fn backend(&self) -> BackendType {
        match self {
            Self::Pipe(_) => BackendType::Pipe,
            #[cfg(unix)]
            Self::Pty(_) => BackendType::Pty,
        }
    }
}

impl From<ProcessSpawner> for LocalSpawner {
    fn from(spawner: ProcessSpawner) -> Self {
        Self::Pipe(spawner)
    }
}

#[cfg(unix)]
impl From<PtySpawner> for LocalSpawner {
    fn from(spawner: PtySpawner) -> Self {
        Self::Pty(spawner)
    }
}

impl Spawner for LocalSpawner {
    type Transport = LocalTransport;

    fn spawn(&self, command: &CommandLine) -> Result<LocalTransport> {
        match self {
            Self::Pipe(spawner) => spawner.spawn(command).map(LocalTransport::Pipe),
            #[cfg(unix)]
            Self::Pty(spawner) => spawner.spawn(command).map(LocalTransport::Pty),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Pipe(spawner) => spawner.name(),
            #[cfg(unix)]
            Self::Pty(spawner) => spawner.name(),
        }
    }
}

/// Transport produced by [`LocalSpawner`].
#[derive(Debug)]
pub enum LocalTransport {
    /// Piped stdio.
    Pipe(ProcessTransport),
    /// Pseudo-terminal.
    #[cfg(unix)]
    Pty(PtyTransport),
}

impl AsyncRead for LocalTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Pipe(t) => Pin::new(t).poll_read(cx, buf),
            #[cfg(unix)]
            Self::Pty(t) => Pin::new(t).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for LocalTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Pipe(t) => Pin::new(t).poll_write(cx, buf),
            #[cfg(unix)]
            Self::Pty(t) => Pin::new(t).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Pipe(t) => Pin::new(t).poll_flush(cx),
            #[cfg(unix)]
            Self::Pty(t) => Pin::new(t).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Pipe(t) => Pin::new(t).poll_shutdown(cx),
            #[cfg(unix)]
            Self::Pty(t) => Pin::new(t).poll_shutdown(cx),
        }
    }
}

impl Transport for LocalTransport {
    async fn wait(&mut self) -> io::Result<ProcessExitStatus> {
        match self {
            Self::Pipe(t) => t.wait().await,
            #[cfg(unix)]
            Self::Pty(t) => t.wait().await,
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        match self {
            Self::Pipe(t) => t.kill(),
            #[cfg(unix)]
            Self::Pty(t) => t.kill(),
        }
    }

    fn pid(&self) -> Option<u32> {
        match self {
            Self::Pipe(t) => t.pid(),
            #[cfg(unix)]
            Self::Pty(t) => t.pid(),
        }
    }
}
