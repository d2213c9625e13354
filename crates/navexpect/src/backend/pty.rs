//! Pseudo-terminal backend.
//!
//! Each child gets the slave side of a fresh terminal as stdin, stdout and
//! stderr, and becomes the session leader with that terminal as its
//! controlling terminal. Tools that open `/dev/tty` for the passphrase then
//! read it from the same place the session writes to.
//!
//! The terminal is configured before the child starts: echo is off, so
//! answers never come back as output, and `\n` is not translated to `\r\n`,
//! so output reads the same as over pipes.

use std::collections::HashMap;
use std::io;
use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};

use rustix::fs::{Mode, OFlags, fcntl_setfl, open};
use rustix::io::Errno;
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};
use rustix::termios::{
    LocalModes, OptionalActions, OutputModes, Winsize, tcgetattr, tcsetattr, tcsetwinsize,
};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::process::{Child, Command};
use tracing::debug;

use super::{CommandLine, Spawner, Transport};
use crate::error::{Result, SpawnError};
use crate::types::ProcessExitStatus;

/// Terminal end-of-file character (Ctrl-D).
const EOF_CHAR: u8 = 0x04;

/// Terminal size reported to children, as (columns, rows).
const DIMENSIONS: (u16, u16) = (80, 24);

fn os_error(errno: Errno) -> io::Error {
    io::Error::from_raw_os_error(errno.raw_os_error())
}

/// Allocate a terminal pair. The master is non-blocking, the slave has echo
/// and output newline translation switched off.
fn open_terminal() -> io::Result<(OwnedFd, OwnedFd)> {
    let master = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY).map_err(os_error)?;
    grantpt(&master).map_err(os_error)?;
    unlockpt(&master).map_err(os_error)?;
    let slave_name = ptsname(&master, Vec::new()).map_err(os_error)?;
    let slave = open(
        slave_name.as_c_str(),
        OFlags::RDWR | OFlags::NOCTTY,
        Mode::empty(),
    )
    .map_err(os_error)?;

    let mut termios = tcgetattr(&slave).map_err(os_error)?;
    termios.local_modes.remove(LocalModes::ECHO);
    termios.output_modes.remove(OutputModes::ONLCR);
    tcsetattr(&slave, OptionalActions::Now, &termios).map_err(os_error)?;

    let (cols, rows) = DIMENSIONS;
    let winsize = Winsize {
        ws_col: cols,
        ws_row: rows,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    tcsetwinsize(&master, winsize).map_err(os_error)?;

    fcntl_setfl(&master, OFlags::NONBLOCK).map_err(os_error)?;
    Ok((master, slave))
}

/// Spawner for children attached to a pseudo-terminal.
#[derive(Debug, Clone, Default)]
pub struct PtySpawner {
    /// Extra environment variables for every child.
    env: HashMap<String, String>,
    /// Working directory for every child.
    working_dir: Option<PathBuf>,
}

impl PtySpawner {
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

impl Spawner for PtySpawner {
    type Transport = PtyTransport;

    #[allow(unsafe_code)]
    fn spawn(&self, command: &CommandLine) -> Result<PtyTransport> {
        let name = command.program_name();
        let (master, slave) = open_terminal().map_err(SpawnError::Io)?;

        let mut cmd = Command::new(command.program());
        cmd.args(command.argv())
            .envs(&self.env)
            .stdin(Stdio::from(slave.try_clone().map_err(SpawnError::Io)?))
            .stdout(Stdio::from(slave.try_clone().map_err(SpawnError::Io)?))
            .stderr(Stdio::from(slave))
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        // SAFETY: the hook runs in the forked child after stdio is in place
        // and only calls setsid and ioctl, which are async-signal-safe. Fd 0
        // is the terminal slave at that point.
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                if libc::ioctl(0, libc::TIOCSCTTY, 0) == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = cmd
            .spawn()
            .map_err(|e| SpawnError::from_launch(&name, e))?;
        // The command still holds our copies of the slave; the master only
        // sees end of output once every copy is closed.
        drop(cmd);

        let master = AsyncFd::new(master).map_err(SpawnError::Io)?;
        debug!(command = %command, pid = ?child.id(), "spawned process on a terminal");

        Ok(PtyTransport {
            child,
            master,
            input_closed: false,
        })
    }

    fn name(&self) -> &'static str {
        "pty"
    }
}

/// Transport over the master side of a child's terminal.
#[derive(Debug)]
pub struct PtyTransport {
    child: Child,
    master: AsyncFd<OwnedFd>,
    /// Set once end-of-file has been sent; later writes fail.
    input_closed: bool,
}

impl AsyncRead for PtyTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = std::task::ready!(self.master.poll_read_ready(cx))?;

            let unfilled = buf.initialize_unfilled();
            match rustix::io::read(self.master.get_ref(), unfilled) {
                Ok(n) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Err(Errno::AGAIN) => guard.clear_ready(),
                Err(Errno::INTR) => {}
                // Linux reports a hung-up terminal as EIO: end of output.
                Err(Errno::IO) => return Poll::Ready(Ok(())),
                Err(e) => return Poll::Ready(Err(os_error(e))),
            }
        }
    }
}

impl AsyncWrite for PtyTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.input_closed {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "terminal input of the child is closed",
            )));
        }
        loop {
            let mut guard = std::task::ready!(self.master.poll_write_ready(cx))?;

            match rustix::io::write(self.master.get_ref(), buf) {
                Ok(n) => return Poll::Ready(Ok(n)),
                Err(Errno::AGAIN) => guard.clear_ready(),
                Err(Errno::INTR) => {}
                Err(Errno::IO) => {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "terminal of the child is gone",
                    )));
                }
                Err(e) => return Poll::Ready(Err(os_error(e))),
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    /// A terminal cannot be half-closed; send end-of-file instead, so a child
    /// blocked on a read sees its input end.
    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.input_closed {
            return Poll::Ready(Ok(()));
        }
        let sent = std::task::ready!(self.as_mut().poll_write(cx, &[EOF_CHAR]));
        self.input_closed = true;
        Poll::Ready(sent.map(|_| ()))
    }
}

impl Transport for PtyTransport {
    async fn wait(&mut self) -> io::Result<ProcessExitStatus> {
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
