//! Operation outcomes.
//!
//! Every driver call ends in exactly one [`Outcome`]. A missing prompt, an
//! explicit rejection, or a non-zero exit are ordinary [`Failure`]s carried
//! inside it; only faults the caller cannot act on (the tool is missing, I/O
//! broke) surface as [`ExpectError`](crate::ExpectError).

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::error::format_buffer_snippet;
use crate::types::ProcessExitStatus;

/// The navencrypt operations that can be driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Register the host with a key server.
    Register,
    /// Check a master passphrase.
    CheckPassword,
    /// Prepare an encrypted volume.
    PrepareVolume,
    /// Tear down an encrypted volume.
    TeardownVolume,
    /// Move a directory into an encrypted volume.
    EncryptDirectory,
    /// Add an access rule.
    AddRule,
    /// List access rules.
    ListRules,
    /// Delete an access rule.
    DeleteRule,
    /// Switch enforcement mode.
    SetMode,
}

impl Operation {
    /// Short name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::CheckPassword => "check-password",
            Self::PrepareVolume => "prepare-volume",
            Self::TeardownVolume => "teardown-volume",
            Self::EncryptDirectory => "encrypt-directory",
            Self::AddRule => "add-rule",
            Self::ListRules => "list-rules",
            Self::DeleteRule => "delete-rule",
            Self::SetMode => "set-mode",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an operation did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    /// The process ended before the expected output appeared.
    #[error("process ended while waiting for {expected}")]
    PromptMismatch {
        /// What was being waited for.
        expected: String,
    },

    /// The expected output did not appear in time.
    #[error("timed out after {after:?} waiting for {expected}")]
    Timeout {
        /// What was being waited for.
        expected: String,
        /// How long was waited.
        after: Duration,
    },

    /// The tool reported an error or refused the request.
    #[error("rejected: {message}")]
    Rejected {
        /// The tool's message.
        message: String,
    },

    /// The process stopped reading its input before a reply could be sent.
    #[error("process closed its input before {reply} was sent")]
    InputClosed {
        /// What was being sent, never the text itself.
        reply: String,
    },

    /// The tool printed its usage text.
    #[error("the tool rejected its arguments")]
    InvalidUsage,

    /// The process finished unsuccessfully.
    #[error("process {0}")]
    ExitStatus(ProcessExitStatus),

    /// The rule to delete is not in the rule list.
    #[error("no rule matches '{rule}'")]
    RuleNotFound {
        /// The rule as requested.
        rule: String,
    },
}

impl Failure {
    /// Check if this is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// The result of one driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Which operation ran.
    pub operation: Operation,
    /// Whether it succeeded.
    pub success: bool,
    /// Why it failed, when it did.
    pub failure: Option<Failure>,
    /// Exit status, when the child was reaped.
    pub exit_status: Option<ProcessExitStatus>,
    /// Everything the tool printed.
    pub transcript: String,
}

impl Outcome {
    /// A successful outcome.
    #[must_use]
    pub const fn succeeded(operation: Operation, transcript: String) -> Self {
        Self {
            operation,
            success: true,
            failure: None,
            exit_status: None,
            transcript,
        }
    }

    /// A failed outcome.
    #[must_use]
    pub const fn failed(operation: Operation, failure: Failure, transcript: String) -> Self {
        Self {
            operation,
            success: false,
            failure: Some(failure),
            exit_status: None,
            transcript,
        }
    }

    /// Attach the exit status.
    #[must_use]
    pub const fn with_exit_status(mut self, status: Option<ProcessExitStatus>) -> Self {
        self.exit_status = status;
        self
    }

    /// Whether the operation succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// The failure, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure {
            None => write!(f, "{} succeeded", self.operation),
            Some(failure) => write!(
                f,
                "{} failed: {failure}\n{}",
                self.operation,
                format_buffer_snippet(&self.transcript)
            ),
        }
    }
}
