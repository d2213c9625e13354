//! Local process backend.
//!
//! Children run with piped stdio. Their stdout and stderr are merged into a
//! single read stream by polling both pipes from `poll_read`, so no helper
//! tasks are needed and output from either pipe can satisfy a pattern.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::debug;

use super::{CommandLine, Spawner, Transport};
use crate::error::{Result, SpawnError};
use crate::types::ProcessExitStatus;

/// Spawner for local processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessSpawner {
    /// Extra environment variables for every child.
    env: HashMap<String, String>,
    /// Working directory for every child.
    working_dir: Option<PathBuf>,
}

impl ProcessSpawner {
    /// Create a spawner that inherits the parent's environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }
}

impl Spawner for ProcessSpawner {
    type Transport = ProcessTransport;

    fn spawn(&self, command: &CommandLine) -> Result<ProcessTransport> {
        let name = command.program_name();

        let mut cmd = Command::new(command.program());
        cmd.args(command.argv())
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| SpawnError::from_launch(&name, e))?;

        let missing = |stream| SpawnError::MissingStream {
            stream,
            command: name.clone(),
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        debug!(command = %command, pid = ?child.id(), "spawned process");

        Ok(ProcessTransport {
            child,
            stdin: Some(stdin),
            stdout: Some(stdout),
            stderr: Some(stderr),
            stderr_first: false,
        })
    }

    fn name(&self) -> &'static str {
        "pipe"
    }
}

/// Transport over a child's piped stdio.
#[derive(Debug)]
pub struct ProcessTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    /// Alternates which pipe is polled first so neither starves the other.
    stderr_first: bool,
}

/// Poll one pipe. `Ready(Ok(true))` means data arrived; `Ready(Ok(false))`
/// means the pipe is (now) closed.
fn poll_pipe<R: AsyncRead + Unpin>(
    pipe: &mut Option<R>,
    cx: &mut Context<'_>,
    buf: &mut ReadBuf<'_>,
) -> Poll<io::Result<bool>> {
    let Some(reader) = pipe.as_mut() else {
        return Poll::Ready(Ok(false));
    };
    let before = buf.filled().len();
    match Pin::new(reader).poll_read(cx, buf) {
        Poll::Ready(Ok(())) if buf.filled().len() > before => Poll::Ready(Ok(true)),
        Poll::Ready(Ok(())) => {
            *pipe = None;
            Poll::Ready(Ok(false))
        }
        Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
        Poll::Pending => Poll::Pending,
    }
}

impl AsyncRead for ProcessTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let this = &mut *self;
        let stderr_first = this.stderr_first;
        this.stderr_first = !stderr_first;

        for use_stderr in [stderr_first, !stderr_first] {
            let polled = if use_stderr {
                poll_pipe(&mut this.stderr, cx, buf)
            } else {
                poll_pipe(&mut this.stdout, cx, buf)
            };
            match polled {
                Poll::Ready(Ok(true)) => return Poll::Ready(Ok(())),
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Ready(Ok(false)) | Poll::Pending => {}
            }
        }

        if this.stdout.is_none() && this.stderr.is_none() {
            // Both pipes closed: end of output.
            Poll::Ready(Ok(()))
        } else {
            Poll::Pending
        }
    }
}

impl AsyncWrite for ProcessTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.stdin.as_mut() {
            Some(stdin) => Pin::new(stdin).poll_write(cx, buf),
            None => Poll::Ready(Err(stdin_closed())),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.stdin.as_mut() {
            Some(stdin) => Pin::new(stdin).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        let result = std::task::ready!(Pin::new(stdin).poll_shutdown(cx));
        // Dropping the handle is what closes the pipe.
        self.stdin = None;
        Poll::Ready(result)
    }
}

fn stdin_closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "stdin of the child is closed")
}

impl Transport for ProcessTransport {
    async fn wait(&mut self) -> io::Result<ProcessExitStatus> {
        self.stdin = None;
        self.child.wait().await.map(ProcessExitStatus::from)
    }

    fn kill(&mut self) -> io::Result<()> {
        match self.child.start_kill() {
            // Already reaped.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }

    fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}
