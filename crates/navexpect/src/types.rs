//! Common types for navexpect.
//!
//! This module defines the match and outcome types returned by session waits,
//! session state, and process exit status.

use std::fmt;
use std::time::Duration;

/// A successful pattern match.
#[derive(Debug, Clone)]
pub struct Match {
    /// The index of the pattern that matched within its set.
    pub pattern_index: usize,

    /// The full text that matched.
    pub matched: String,

    /// Newly arrived text before the match.
    pub before: String,
}

impl Match {
    /// Create a new match result.
    #[must_use]
    pub fn new(pattern_index: usize, matched: impl Into<String>, before: impl Into<String>) -> Self {
        Self {
            pattern_index,
            matched: matched.into(),
            before: before.into(),
        }
    }

    /// Get the full matched text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.matched
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.matched)
    }
}

/// What happened while waiting on a pattern set.
///
/// Every wait ends in exactly one of these; process end and deadline expiry
/// are always possible regardless of which patterns were asked for.
#[derive(Debug, Clone)]
pub enum PatternOutcome {
    /// A pattern matched.
    Matched(Match),

    /// The process closed its output before any pattern matched.
    Eof {
        /// Output that arrived after the last consumed match.
        buffer: String,
    },

    /// The deadline elapsed with no matching output.
    Timeout {
        /// The duration that elapsed.
        duration: Duration,
        /// Pending output at timeout (left unconsumed).
        buffer: String,
    },
}

impl PatternOutcome {
    /// Check if this is a successful match.
    #[must_use]
    pub const fn is_match(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    /// Check if this is an EOF.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof { .. })
    }

    /// Check if this is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Index of the matched pattern, if any.
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        match self {
            Self::Matched(m) => Some(m.pattern_index),
            _ => None,
        }
    }

    /// Check whether the pattern at `index` is the one that matched.
    #[must_use]
    pub fn matched(&self, index: usize) -> bool {
        self.index() == Some(index)
    }

    /// Get the match if this is a successful match.
    #[must_use]
    pub fn into_match(self) -> Option<Match> {
        match self {
            Self::Matched(m) => Some(m),
            _ => None,
        }
    }

    /// Get the buffer contents (for EOF or timeout).
    #[must_use]
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Self::Eof { buffer } | Self::Timeout { buffer, .. } => Some(buffer),
            Self::Matched(_) => None,
        }
    }
}

/// The state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session is running and ready for operations.
    Running,

    /// Process has exited with status.
    Exited(ProcessExitStatus),
}

impl SessionState {
    /// Check if the session is usable for operations.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Exited(status) => write!(f, "exited ({status})"),
        }
    }
}

/// Exit status of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExitStatus {
    /// Process exited with a code.
    Exited(i32),

    /// Process was terminated by a signal (Unix).
    Signaled(i32),

    /// Exit status is unknown.
    Unknown,
}

impl ProcessExitStatus {
    /// Check if the process exited successfully (code 0).
    #[must_use]
    pub const fn success(self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Get the exit code if the process exited normally.
    #[must_use]
    pub const fn code(self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(code),
            _ => None,
        }
    }

    /// Get the signal number if the process was signaled.
    #[must_use]
    pub const fn signal(self) -> Option<i32> {
        match self {
            Self::Signaled(sig) => Some(sig),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signaled(sig) => write!(f, "terminated by signal {sig}"),
            Self::Unknown => write!(f, "unknown exit status"),
        }
    }
}

impl From<std::process::ExitStatus> for ProcessExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(code) = status.code() {
                Self::Exited(code)
            } else if let Some(sig) = status.signal() {
                Self::Signaled(sig)
            } else {
                Self::Unknown
            }
        }

        #[cfg(not(unix))]
        {
            status.code().map_or(Self::Unknown, Self::Exited)
        }
    }
}
