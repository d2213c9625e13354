//! Scripted prompt/answer exchanges.
//!
//! An [`Exchange`] wraps one session for one operation. Each step either
//! continues or halts the script; [`Exchange::finish`] turns however the
//! script ended into an [`Outcome`] and disposes of the child.

use std::time::Duration;

use tracing::{debug, warn};

use crate::backend::Transport;
use crate::error::{ExpectError, Result};
use crate::expect::{Pattern, PatternSet};
use crate::outcome::{Failure, Operation, Outcome};
use crate::session::Session;
use crate::types::{Match, PatternOutcome, ProcessExitStatus};

/// Why a script stopped early.
#[derive(Debug)]
pub(crate) enum Halt {
    /// The operation failed; report it in the outcome.
    Failed(Failure),
    /// Something broke; report it as an error.
    Fatal(ExpectError),
}

impl From<Failure> for Halt {
    fn from(failure: Failure) -> Self {
        Self::Failed(failure)
    }
}

impl From<ExpectError> for Halt {
    fn from(err: ExpectError) -> Self {
        Self::Fatal(err)
    }
}

/// Result of one scripted step.
pub(crate) type Step<T> = std::result::Result<T, Halt>;

pub(crate) struct Exchange<T: Transport> {
    session: Session<T>,
    operation: Operation,
}

impl<T: Transport> Exchange<T> {
    pub(crate) const fn new(session: Session<T>, operation: Operation) -> Self {
        Self { session, operation }
    }

    pub(crate) fn session(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    /// Wait for one of `patterns`; the end of output or the deadline halt the
    /// script.
    pub(crate) async fn expect_any(&mut self, patterns: &PatternSet, timeout: Duration) -> Step<Match> {
        match self.session.await_one(patterns, timeout).await? {
            PatternOutcome::Matched(m) => Ok(m),
            PatternOutcome::Eof { .. } => Err(Failure::PromptMismatch {
                expected: patterns.describe(),
            }
            .into()),
            PatternOutcome::Timeout { duration, .. } => Err(Failure::Timeout {
                expected: patterns.describe(),
                after: duration,
            }
            .into()),
        }
    }

    /// Wait for `pattern`.
    pub(crate) async fn expect(&mut self, pattern: &Pattern, timeout: Duration) -> Step<Match> {
        self.expect_any(&PatternSet::from(pattern.clone()), timeout).await
    }

    /// Wait for `prompt`, then answer it.
    pub(crate) async fn answer(&mut self, prompt: &Pattern, reply: &str, timeout: Duration) -> Step<()> {
        self.expect(prompt, timeout).await?;
        self.reply(prompt, reply).await
    }

    /// Send `reply` to `prompt`, which has already matched.
    ///
    /// A child that has stopped reading its input fails the operation; the
    /// outcome then carries its exit status.
    pub(crate) async fn reply(&mut self, prompt: &Pattern, reply: &str) -> Step<()> {
        match self.session.send_line(reply).await {
            Ok(()) => Ok(()),
            Err(ExpectError::Write { source }) => {
                debug!(operation = %self.operation, error = %source, "child stopped reading input");
                Err(Failure::InputClosed {
                    reply: format!("the reply to '{}'", prompt.as_str()),
                }
                .into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Wait for `confirmation` alone, until it appears, output ends, or the
    /// deadline passes.
    ///
    /// Refusal messages never cut the wait short. When output ends without
    /// the confirmation, a refusal in the leftover output names the failure.
    pub(crate) async fn confirm(
        &mut self,
        confirmation: &Pattern,
        refusals: &PatternSet,
        timeout: Duration,
    ) -> Step<()> {
        let expected = PatternSet::from(confirmation.clone());
        match self.session.await_one(&expected, timeout).await? {
            PatternOutcome::Matched(_) => Ok(()),
            PatternOutcome::Eof { buffer } => Err(refusal(refusals, &buffer)
                .unwrap_or_else(|| Failure::PromptMismatch {
                    expected: expected.describe(),
                })
                .into()),
            PatternOutcome::Timeout { duration, .. } => Err(Failure::Timeout {
                expected: expected.describe(),
                after: duration,
            }
            .into()),
        }
    }

    /// Wait for the child to finish printing.
    ///
    /// Returns the output that followed the last consumed match.
    pub(crate) async fn read_to_eof(&mut self, timeout: Duration) -> Step<String> {
        match self.session.read_to_eof(timeout).await? {
            PatternOutcome::Eof { buffer } => Ok(buffer),
            PatternOutcome::Timeout { duration, .. } => Err(Failure::Timeout {
                expected: "end of output".to_string(),
                after: duration,
            }
            .into()),
            PatternOutcome::Matched(_) => Ok(String::new()),
        }
    }

    /// Close the session and require a zero exit status.
    pub(crate) async fn require_clean_exit(&mut self) -> Step<ProcessExitStatus> {
        let status = self.session.close().await?;
        if status.success() {
            Ok(status)
        } else {
            Err(Failure::ExitStatus(status).into())
        }
    }

    /// Turn a matched refusal marker into a failure, quoting the rest of its
    /// line when it has arrived.
    pub(crate) fn rejection(&mut self, m: &Match) -> Failure {
        let pending = self.session.pending();
        let tail = pending.lines().next().unwrap_or_default();
        Failure::Rejected {
            message: format!("{}{tail}", m.matched).trim().to_string(),
        }
    }

    /// Dispose of the child and build the outcome.
    ///
    /// A child still running is closed after success or an ordinary failure,
    /// and killed after a timeout or a fatal error.
    pub(crate) async fn finish(mut self, result: Step<()>) -> Result<Outcome> {
        match result {
            Ok(()) => {
                let status = self.dispose(true).await?;
                Ok(Outcome::succeeded(self.operation, self.session.transcript())
                    .with_exit_status(status))
            }
            Err(Halt::Failed(failure)) => {
                let status = self.dispose(!failure.is_timeout()).await?;
                debug!(operation = %self.operation, %failure, "operation failed");
                Ok(Outcome::failed(self.operation, failure, self.session.transcript())
                    .with_exit_status(status))
            }
            Err(Halt::Fatal(err)) => {
                if let Err(e) = self.dispose(false).await {
                    warn!(operation = %self.operation, error = %e, "cleanup after error failed");
                }
                Err(err)
            }
        }
    }

    async fn dispose(&mut self, graceful: bool) -> Result<Option<ProcessExitStatus>> {
        if !self.session.state().is_usable() {
            return Ok(self.session.exit_status());
        }
        let status = if graceful {
            self.session.close().await?
        } else {
            self.session.terminate().await?
        };
        Ok(Some(status))
    }
}

/// The first refusal in `output`, quoted through the end of its line.
pub(crate) fn refusal(refusals: &PatternSet, output: &str) -> Option<Failure> {
    let bytes = output.as_bytes();
    let (_, found) = refusals.find_match(bytes)?;
    let rest = String::from_utf8_lossy(&bytes[found.start..]);
    Some(Failure::Rejected {
        message: rest.lines().next().unwrap_or_default().trim().to_string(),
    })
}
