//! Mock transport and spawner.
//!
//! The transport plays a [`Scenario`] against whatever the session writes.
//! Clones share state, so a test can keep a handle and inspect the input the
//! "child" received after the session is gone.

use std::collections::VecDeque;
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::event::MockEvent;
use super::scenario::Scenario;
use crate::backend::{CommandLine, Spawner, Transport};
use crate::error::{Result, SpawnError};
use crate::types::ProcessExitStatus;

/// Signal number reported for a killed mock child.
const SIGKILL: i32 = 9;

/// Shared state for the mock transport.
#[derive(Debug, Default)]
struct MockState {
    /// Script still to run.
    events: VecDeque<MockEvent>,
    /// Output printed but not yet read.
    output: VecDeque<u8>,
    /// Everything written to stdin.
    input: Vec<u8>,
    /// Input not yet consumed by a `ReadLine`.
    unread: VecDeque<u8>,
    /// Lines consumed by `ReadLine`, without terminators.
    lines_read: Vec<String>,
    /// Whether stdin has been closed.
    stdin_closed: bool,
    /// Set once the child has exited.
    status: Option<ProcessExitStatus>,
    /// Whether the child was killed.
    killed: bool,
    /// Tasks waiting on output or exit.
    wakers: Vec<Waker>,
}

impl MockState {
    /// Run the script until it blocks or ends.
    fn advance(&mut self) {
        while self.status.is_none() {
            let Some(event) = self.events.front() else {
                self.status = Some(ProcessExitStatus::Exited(0));
                break;
            };
            match event {
                MockEvent::Output(data) => {
                    self.output.extend(data.iter().copied());
                }
                MockEvent::ReadLine => {
                    if let Some(pos) = self.unread.iter().position(|&b| b == b'\n') {
                        let raw: Vec<u8> = self.unread.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&raw);
                        self.lines_read
                            .push(line.trim_end_matches(['\r', '\n']).to_string());
                    } else if !self.stdin_closed {
                        break;
                    }
                }
                MockEvent::Exit(code) => {
                    self.status = Some(ProcessExitStatus::Exited(*code));
                    self.events.clear();
                    break;
                }
                MockEvent::Hang => break,
            }
            self.events.pop_front();
        }
    }

    fn wake_all(&mut self) {
        for waker in self.wakers.drain(..) {
            waker.wake();
        }
    }

    fn park(&mut self, cx: &Context<'_>) {
        if !self.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            self.wakers.push(cx.waker().clone());
        }
    }
}

/// A mock transport for testing.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a transport that plays `scenario`.
    #[must_use]
    pub fn new(scenario: Scenario) -> Self {
        let state = MockState {
            events: scenario.events().iter().cloned().collect(),
            ..MockState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Everything written to the child's stdin.
    #[must_use]
    pub fn input(&self) -> Vec<u8> {
        self.lock().input.clone()
    }

    /// Everything written to the child's stdin, as a string.
    #[must_use]
    pub fn input_str(&self) -> String {
        String::from_utf8_lossy(&self.lock().input).into_owned()
    }

    /// Lines the child consumed at its `ReadLine` steps.
    #[must_use]
    pub fn lines_read(&self) -> Vec<String> {
        self.lock().lines_read.clone()
    }

    /// Whether stdin has been closed.
    #[must_use]
    pub fn stdin_closed(&self) -> bool {
        self.lock().stdin_closed
    }

    /// Whether the child was killed.
    #[must_use]
    pub fn was_killed(&self) -> bool {
        self.lock().killed
    }

    /// Exit status, once exited.
    #[must_use]
    pub fn status(&self) -> Option<ProcessExitStatus> {
        self.lock().status
    }
}

impl AsyncRead for MockTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut state = self.lock();
        state.advance();

        if !state.output.is_empty() {
            let n = buf.remaining().min(state.output.len());
            let chunk: Vec<u8> = state.output.drain(..n).collect();
            buf.put_slice(&chunk);
            return Poll::Ready(Ok(()));
        }

        if state.status.is_some() {
            return Poll::Ready(Ok(()));
        }

        state.park(cx);
        Poll::Pending
    }
}

impl AsyncWrite for MockTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.lock();
        if state.status.is_some() || state.stdin_closed {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock child is not reading",
            )));
        }
        state.input.extend_from_slice(buf);
        state.unread.extend(buf.iter().copied());
        state.wake_all();
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut state = self.lock();
        state.stdin_closed = true;
        state.wake_all();
        Poll::Ready(Ok(()))
    }
}

impl Transport for MockTransport {
    async fn wait(&mut self) -> io::Result<ProcessExitStatus> {
        poll_fn(|cx| {
            let mut state = self.lock();
            state.advance();
            match state.status {
                Some(status) => Poll::Ready(Ok(status)),
                None => {
                    state.park(cx);
                    Poll::Pending
                }
            }
        })
        .await
    }

    fn kill(&mut self) -> io::Result<()> {
        let mut state = self.lock();
        if state.status.is_none() {
            state.status = Some(ProcessExitStatus::Signaled(SIGKILL));
            state.killed = true;
            state.events.clear();
        }
        state.wake_all();
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        None
    }
}

#[derive(Debug, Default)]
struct SpawnerState {
    scenarios: VecDeque<Scenario>,
    commands: Vec<CommandLine>,
    transports: Vec<MockTransport>,
}

/// Spawner that hands out scripted transports in order.
///
/// Spawning with no scenario left fails as if the executable were missing.
#[derive(Debug, Clone, Default)]
pub struct MockSpawner {
    state: Arc<Mutex<SpawnerState>>,
}

impl MockSpawner {
    /// Create a spawner with no scenarios.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a spawner that plays `scenarios` in order.
    #[must_use]
    pub fn with_scenarios(scenarios: impl IntoIterator<Item = Scenario>) -> Self {
        let spawner = Self::new();
        for scenario in scenarios {
            spawner.push(scenario);
        }
        spawner
    }

    fn lock(&self) -> MutexGuard<'_, SpawnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the script for the next spawn.
    pub fn push(&self, scenario: Scenario) -> &Self {
        self.lock().scenarios.push_back(scenario);
        self
    }

    /// Command lines spawned so far.
    #[must_use]
    pub fn commands(&self) -> Vec<CommandLine> {
        self.lock().commands.clone()
    }

    /// Transports handed out so far.
    #[must_use]
    pub fn transports(&self) -> Vec<MockTransport> {
        self.lock().transports.clone()
    }

    /// Number of successful spawns.
    #[must_use]
    pub fn spawn_count(&self) -> usize {
        self.lock().transports.len()
    }

    /// Scenarios not yet used.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.lock().scenarios.len()
    }
}

impl Spawner for MockSpawner {
    type Transport = MockTransport;

    fn spawn(&self, command: &CommandLine) -> Result<MockTransport> {
        let mut state = self.lock();
        let scenario = state
            .scenarios
            .pop_front()
            .ok_or_else(|| SpawnError::command_not_found(command.program_name()))?;
        let transport = MockTransport::new(scenario);
        state.commands.push(command.clone());
        state.transports.push(transport.clone());
        Ok(transport)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn plays_script_against_input() {
        let mut transport = MockTransport::new(
            Scenario::new()
                .prompt("Type MASTER passphrase: ")
                .output("ok\n")
                .exit(0),
        );
        let handle = transport.clone();

        let mut buf = [0u8; 64];
        let n = transport.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"Type MASTER passphrase: ");

        transport.write_all(b"pw\r\n").await.unwrap();
        let mut rest = String::new();
        transport.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "ok\n");
        assert_eq!(handle.lines_read(), ["pw"]);
        assert_eq!(transport.wait().await.unwrap(), ProcessExitStatus::Exited(0));
    }

    #[tokio::test]
    async fn read_line_unblocks_on_stdin_close() {
        let mut transport = MockTransport::new(Scenario::new().read_line().output("eof seen"));
        transport.shutdown().await.unwrap();

        let mut out = String::new();
        transport.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "eof seen");
        assert!(transport.stdin_closed());
        assert!(transport.write_all(b"x\n").await.is_err());
    }

    #[tokio::test]
    async fn kill_wakes_waiter() {
        let mut transport = MockTransport::new(Scenario::new().hang());
        let mut killer = transport.clone();
        let waiter = tokio::spawn(async move { transport.wait().await });
        tokio::task::yield_now().await;

        killer.kill().unwrap();
        let status = waiter.await.unwrap().unwrap();
        assert_eq!(status, ProcessExitStatus::Signaled(SIGKILL));
        assert!(killer.was_killed());
    }

    #[test]
    fn spawner_records_and_runs_out() {
        let spawner = MockSpawner::with_scenarios([Scenario::new().exit(0)]);
        let cmd = CommandLine::new("navencrypt-prepare").arg("-d");
        assert!(spawner.spawn(&cmd).is_ok());
        assert_eq!(spawner.commands(), vec![cmd.clone()]);
        assert_eq!(spawner.remaining(), 0);

        let err = spawner.spawn(&cmd).unwrap_err();
        assert!(err.is_spawn());
        assert_eq!(spawner.spawn_count(), 1);
    }
}
