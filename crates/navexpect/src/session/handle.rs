//! Session handle for interacting with spawned processes.
//!
//! This module provides the main `Session` type: one live child, the output
//! it has produced, and the deadline policy for waiting on it.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::sink::Sink;
use crate::backend::{CommandLine, Spawner, Transport};
use crate::config::SessionConfig;
use crate::error::{ExpectError, Result};
use crate::expect::{ExpectState, Matcher, PatternSet, RingBuffer};
use crate::types::{PatternOutcome, ProcessExitStatus, SessionState};

/// Size of a single read from the transport.
const READ_CHUNK: usize = 4096;

/// A session handle for interacting with a spawned process.
///
/// A session is created for one operation and closed at its end. It is not
/// meant to be shared.
pub struct Session<T: Transport> {
    /// The underlying transport.
    transport: T,
    /// Session configuration.
    config: SessionConfig,
    /// Output not yet consumed by a match.
    matcher: Matcher,
    /// Everything the child printed, bounded.
    transcript: RingBuffer,
    /// Tee destination for output.
    sink: Sink,
    /// Displayable command, secrets masked.
    command: String,
    /// Current session state.
    state: SessionState,
    /// EOF flag.
    eof: bool,
}

impl<T: Transport> Session<T> {
    /// Wrap an already running transport.
    pub fn new(transport: T, config: SessionConfig, sink: Sink, command: impl Into<String>) -> Self {
        Self {
            matcher: Matcher::new(config.buffer_size),
            transcript: RingBuffer::new(config.transcript_limit),
            transport,
            config,
            sink,
            command: command.into(),
            state: SessionState::Running,
            eof: false,
        }
    }

    /// Spawn `command` and open a session on it.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Spawn`] if the executable cannot be launched.
    pub fn open<S>(spawner: &S, command: &CommandLine, config: SessionConfig, sink: Sink) -> Result<Self>
    where
        S: Spawner<Transport = T>,
    {
        let transport = spawner.spawn(command)?;
        debug!(command = %command, backend = spawner.name(), pid = ?transport.pid(), "session opened");
        Ok(Self::new(transport, config, sink, command.to_string()))
    }

    /// Get the current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Get the session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The command this session runs, secrets masked.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Check if the child has closed its output.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.eof
    }

    /// Exit status, once the child has been reaped.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ProcessExitStatus> {
        match self.state {
            SessionState::Exited(status) => Some(status),
            _ => None,
        }
    }

    /// Output not yet consumed by a match.
    #[must_use]
    pub fn pending(&mut self) -> String {
        self.matcher.buffer_str()
    }

    /// Everything the child printed so far, oldest bytes dropped past the
    /// transcript limit.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.transcript.snapshot()
    }

    /// Get the underlying transport.
    ///
    /// Use with caution as direct access bypasses session management.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state.is_usable() {
            Ok(())
        } else {
            Err(ExpectError::SessionClosed)
        }
    }

    /// Wait for one of `patterns`, the end of output, or the deadline.
    ///
    /// Patterns are tried against the output that has arrived since the last
    /// consumed match; when several match, the one listed first wins. A match
    /// consumes output through its end. On EOF the remaining output is
    /// drained into the outcome. On timeout it stays pending.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::SessionClosed`] after [`close`](Self::close) or
    /// [`terminate`](Self::terminate), or an I/O error if reading fails.
    pub async fn await_one(&mut self, patterns: &PatternSet, timeout: Duration) -> Result<PatternOutcome> {
        self.ensure_open()?;
        let state = ExpectState::new(timeout);

        loop {
            if let Some(result) = self.matcher.try_match_any(patterns) {
                let m = self.matcher.consume_match(&result);
                debug!(
                    command = %self.command,
                    pattern = ?patterns.get(m.pattern_index),
                    "pattern matched"
                );
                return Ok(PatternOutcome::Matched(m));
            }

            if self.eof {
                debug!(command = %self.command, expected = %patterns.describe(), "output ended");
                return Ok(PatternOutcome::Eof {
                    buffer: self.matcher.take_all(),
                });
            }

            if state.is_timed_out() {
                debug!(
                    command = %self.command,
                    expected = %patterns.describe(),
                    ?timeout,
                    "wait timed out"
                );
                return Ok(PatternOutcome::Timeout {
                    duration: timeout,
                    buffer: self.matcher.buffer_str(),
                });
            }

            self.read_with_timeout(state.remaining_time()).await?;
        }
    }

    /// Wait for the child to close its output, bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Same as [`await_one`](Self::await_one).
    pub async fn read_to_eof(&mut self, timeout: Duration) -> Result<PatternOutcome> {
        self.await_one(&PatternSet::new(), timeout).await
    }

    /// Send a line of input, followed by the configured line ending.
    ///
    /// The text itself is never logged.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Write`] if the child has gone away or closed its
    /// input, or [`ExpectError::SessionClosed`] after close.
    pub async fn send_line(&mut self, text: &str) -> Result<()> {
        self.ensure_open()?;

        let mut data = Vec::with_capacity(text.len() + 2);
        data.extend_from_slice(text.as_bytes());
        data.extend_from_slice(self.config.line_ending.as_bytes());

        self.transport
            .write_all(&data)
            .await
            .map_err(|source| ExpectError::Write { source })?;
        self.transport
            .flush()
            .await
            .map_err(|source| ExpectError::Write { source })?;

        debug!(command = %self.command, bytes = data.len(), "sent line");
        Ok(())
    }

    /// Close the session.
    ///
    /// Closes the child's input, copies its remaining output to the sink
    /// until EOF, and reaps it. Draining and reaping share the close timeout;
    /// a child still running when it elapses is killed.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::SessionClosed`] if already closed, or an I/O
    /// error if the child cannot be reaped.
    pub async fn close(&mut self) -> Result<ProcessExitStatus> {
        self.ensure_open()?;
        let deadline = Instant::now() + self.config.close_timeout;

        if let Err(e) = self.transport.shutdown().await {
            debug!(command = %self.command, error = %e, "closing stdin failed");
        }

        while !self.eof {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.read_with_timeout(remaining).await?;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        let status = match tokio::time::timeout(remaining, self.transport.wait()).await {
            Ok(status) => status.map_err(|e| ExpectError::io_context("waiting for process", e))?,
            Err(_) => {
                warn!(
                    command = %self.command,
                    timeout = ?self.config.close_timeout,
                    "process did not finish in time, killing it"
                );
                self.kill_and_reap().await?
            }
        };

        self.finish(status);
        Ok(status)
    }

    /// Kill the child and reap it.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::SessionClosed`] if already closed, or an I/O
    /// error if the child cannot be reaped.
    pub async fn terminate(&mut self) -> Result<ProcessExitStatus> {
        self.ensure_open()?;
        let status = self.kill_and_reap().await?;
        self.finish(status);
        Ok(status)
    }

    async fn kill_and_reap(&mut self) -> Result<ProcessExitStatus> {
        if let Err(e) = self.transport.kill() {
            debug!(command = %self.command, error = %e, "kill failed");
        }
        self.transport
            .wait()
            .await
            .map_err(|e| ExpectError::io_context("waiting for killed process", e))
    }

    fn finish(&mut self, status: ProcessExitStatus) {
        debug!(command = %self.command, %status, "session closed");
        self.state = SessionState::Exited(status);
    }

    /// Read one chunk, bounded by `timeout`. Returns the number of bytes read;
    /// zero on EOF or timeout.
    async fn read_with_timeout(&mut self, timeout: Duration) -> Result<usize> {
        let mut buf = [0u8; READ_CHUNK];

        match tokio::time::timeout(timeout, self.transport.read(&mut buf)).await {
            Ok(Ok(0)) => {
                self.eof = true;
                Ok(0)
            }
            Ok(Ok(n)) => {
                let chunk = &buf[..n];
                self.matcher.append(chunk);
                self.transcript.append(chunk);
                if let Err(e) = self.sink.write_all(chunk) {
                    warn!(command = %self.command, error = %e, "output sink write failed");
                }
                Ok(n)
            }
            Ok(Err(e)) => Err(ExpectError::io_context("reading from process", e)),
            // Timeout, but not an error - caller will handle
            Err(_) => Ok(0),
        }
    }
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("command", &self.command)
            .field("state", &self.state)
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expect::Pattern;
    use crate::mock::{MockSpawner, MockTransport, Scenario};
    use crate::session::SharedBuffer;

    const SHORT: Duration = Duration::from_millis(50);
    const LONG: Duration = Duration::from_secs(5);

    fn session(scenario: Scenario, sink: Sink) -> (Session<MockTransport>, MockTransport) {
        let transport = MockTransport::new(scenario);
        let handle = transport.clone();
        (Session::new(transport, SessionConfig::default(), sink, "mock"), handle)
    }

    fn set(patterns: &[&str]) -> PatternSet {
        patterns.iter().map(|p| Pattern::literal(*p)).collect()
    }

    #[tokio::test]
    async fn first_listed_pattern_wins() {
        // Both arrive in one chunk; "ERROR:" is earlier in the text.
        let scenario = Scenario::new().output("ERROR: bad\nnavencrypt is now registered.\n");
        let (mut session, _) = session(scenario, Sink::null());

        let outcome = session
            .await_one(&set(&["navencrypt is now registered.", "ERROR:"]), LONG)
            .await
            .unwrap();
        assert!(outcome.matched(0));
        let m = outcome.into_match().unwrap();
        assert_eq!(m.before, "ERROR: bad\n");
    }

    #[tokio::test]
    async fn consumed_output_never_rematches() {
        let scenario = Scenario::new().output("Type MASTER passphrase: ").exit(0);
        let (mut session, _) = session(scenario, Sink::null());
        let prompt = set(&["Type MASTER passphrase:"]);

        assert!(session.await_one(&prompt, LONG).await.unwrap().is_match());
        let second = session.await_one(&prompt, LONG).await.unwrap();
        assert!(second.is_eof());
        assert_eq!(second.buffer(), Some(" "));
    }

    #[tokio::test]
    async fn timeout_leaves_output_pending() {
        let scenario = Scenario::new().output("still working").hang();
        let (mut session, _) = session(scenario, Sink::null());

        let outcome = session.await_one(&set(&["Done."]), SHORT).await.unwrap();
        assert!(outcome.is_timeout());
        assert_eq!(outcome.buffer(), Some("still working"));
        assert_eq!(session.pending(), "still working");

        let again = session.await_one(&set(&["working"]), SHORT).await.unwrap();
        assert!(again.is_match());
        session.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn send_line_appends_line_ending() {
        let scenario = Scenario::new().prompt("Type MASTER passphrase: ").exit(0);
        let (mut session, handle) = session(scenario, Sink::null());

        session.await_one(&set(&["passphrase:"]), LONG).await.unwrap();
        session.send_line("pw").await.unwrap();
        assert_eq!(session.close().await.unwrap(), ProcessExitStatus::Exited(0));
        assert_eq!(handle.input_str(), "pw\n");
        assert_eq!(handle.lines_read(), ["pw"]);
    }

    #[tokio::test]
    async fn close_reports_exit_status_and_drains_to_sink() {
        let buffer = SharedBuffer::new();
        let scenario = Scenario::new().output("working...\n").output("tail\n").exit(4);
        let (mut session, _) = session(scenario, Sink::buffer(&buffer));

        session.await_one(&set(&["working"]), LONG).await.unwrap();
        let status = session.close().await.unwrap();

        assert_eq!(status, ProcessExitStatus::Exited(4));
        assert_eq!(session.exit_status(), Some(ProcessExitStatus::Exited(4)));
        assert_eq!(buffer.to_string_lossy(), "working...\ntail\n");
        assert_eq!(session.transcript(), "working...\ntail\n");
    }

    #[tokio::test]
    async fn calls_after_close_fail() {
        let (mut session, _) = session(Scenario::new().exit(0), Sink::null());
        session.close().await.unwrap();

        assert!(matches!(
            session.await_one(&set(&["x"]), SHORT).await,
            Err(ExpectError::SessionClosed)
        ));
        assert!(matches!(session.send_line("x").await, Err(ExpectError::SessionClosed)));
        assert!(matches!(session.close().await, Err(ExpectError::SessionClosed)));
        assert!(matches!(session.terminate().await, Err(ExpectError::SessionClosed)));
    }

    #[tokio::test]
    async fn close_kills_a_hung_child() {
        let (transport, handle) = {
            let t = MockTransport::new(Scenario::new().output("busy").hang());
            let h = t.clone();
            (t, h)
        };
        let config = SessionConfig::default().close_timeout(SHORT);
        let mut session = Session::new(transport, config, Sink::null(), "mock");

        let status = session.close().await.unwrap();
        assert_eq!(status, ProcessExitStatus::Signaled(9));
        assert!(handle.was_killed());
    }

    #[tokio::test]
    async fn send_after_exit_is_write_error() {
        let (mut session, _) = session(Scenario::new().output("bye").exit(1), Sink::null());
        assert!(session.read_to_eof(LONG).await.unwrap().is_eof());
        assert!(matches!(
            session.send_line("late").await,
            Err(ExpectError::Write { .. })
        ));
    }

    #[tokio::test]
    async fn open_goes_through_spawner() {
        let spawner = MockSpawner::new();
        spawner.push(Scenario::new().output("hello").exit(0));
        let cmd = CommandLine::new("navencrypt").arg("acl").secret_arg("--auth=k");

        let mut session =
            Session::open(&spawner, &cmd, SessionConfig::default(), Sink::null()).unwrap();
        assert_eq!(session.command(), "navencrypt acl --auth=***");
        assert!(session.read_to_eof(LONG).await.unwrap().is_eof());
        assert_eq!(spawner.commands(), vec![cmd]);

        let err = Session::open(&spawner, &CommandLine::new("navencrypt"), SessionConfig::default(), Sink::null())
            .unwrap_err();
        assert!(err.is_spawn());
    }
}
