//! Configuration types for navexpect.
//!
//! [`SessionConfig`] governs a single interactive session. [`NavConfig`]
//! is the tool-level configuration: where the navencrypt executables live,
//! how long to wait for them, and which prompts to look for. It can be loaded
//! from TOML and overridden from `NAVEXPECT_*` environment variables.

mod env;
mod file;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use env::{DEFAULT_PREFIX, EnvConfig, vars};
pub use file::{
    DEFAULT_LOCK_FILE, DEFAULT_LOCK_RELEASE_DELAY, EncryptConfig, NavConfig, PatternSpec,
    ProgramConfig, PromptConfig,
};

/// Default wait for an interactive prompt (30 seconds).
pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wait for a long-running step to finish (5 minutes).
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(300);

/// Default bound on draining output and reaping the child at close.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default size of the pending-output buffer (1 MB).
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Default size of the retained transcript (256 KB).
pub const DEFAULT_TRANSCRIPT_LIMIT: usize = 256 * 1024;

/// Configuration for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Line ending appended by `send_line`.
    pub line_ending: LineEnding,

    /// Maximum bytes of unconsumed output kept for matching.
    pub buffer_size: usize,

    /// Maximum bytes of transcript kept for diagnostics.
    pub transcript_limit: usize,

    /// Bound on draining output and reaping the child at close.
    pub close_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            line_ending: LineEnding::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            transcript_limit: DEFAULT_TRANSCRIPT_LIMIT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Create a session configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the line ending style.
    #[must_use]
    pub const fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Set the pending-output buffer size.
    #[must_use]
    pub const fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set the transcript limit.
    #[must_use]
    pub const fn transcript_limit(mut self, limit: usize) -> Self {
        self.transcript_limit = limit;
        self
    }

    /// Set the close timeout.
    #[must_use]
    pub const fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

/// Configuration for timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Wait for an interactive prompt, in seconds.
    #[serde(with = "duration_secs")]
    pub prompt: Duration,

    /// Wait for a long-running step (moving data, registering) to report
    /// completion, in seconds.
    #[serde(with = "duration_secs")]
    pub completion: Duration,

    /// Bound on draining output and reaping the child at close, in seconds.
    #[serde(with = "duration_secs")]
    pub close: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT_TIMEOUT,
            completion: DEFAULT_COMPLETION_TIMEOUT,
            close: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

impl TimeoutConfig {
    /// Create a timeout configuration where every wait uses `timeout`.
    #[must_use]
    pub const fn uniform(timeout: Duration) -> Self {
        Self {
            prompt: timeout,
            completion: timeout,
            close: timeout,
        }
    }

    /// Set the prompt timeout.
    #[must_use]
    pub const fn prompt(mut self, timeout: Duration) -> Self {
        self.prompt = timeout;
        self
    }

    /// Set the completion timeout.
    #[must_use]
    pub const fn completion(mut self, timeout: Duration) -> Self {
        self.completion = timeout;
        self
    }

    /// Set the close timeout.
    #[must_use]
    pub const fn close(mut self, timeout: Duration) -> Self {
        self.close = timeout;
        self
    }
}

/// Line ending styles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Unix-style line ending (LF).
    #[default]
    Lf,
    /// Windows-style line ending (CRLF).
    CrLf,
    /// Classic Mac line ending (CR).
    Cr,
}

impl LineEnding {
    /// Get the line ending as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
        }
    }

    /// Get the line ending as bytes.
    #[must_use]
    pub const fn as_bytes(self) -> &'static [u8] {
        self.as_str().as_bytes()
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Lf => "lf",
            Self::CrLf => "crlf",
            Self::Cr => "cr",
        }
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LineEnding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lf" => Ok(Self::Lf),
            "crlf" => Ok(Self::CrLf),
            "cr" => Ok(Self::Cr),
            other => Err(format!("unknown line ending '{other}' (expected lf, crlf or cr)")),
        }
    }
}

/// Serde adapter storing a [`Duration`] as whole seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Serde adapter storing a [`Duration`] as whole milliseconds.
mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
