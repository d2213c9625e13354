//! Pattern matching engine for expect operations.
//!
//! The matcher owns the output that has arrived since the last consumed
//! match. Matching consumes through the end of the match, so text that has
//! already been matched can never satisfy a later wait.

use std::time::Duration;

use tokio::time::Instant;

use super::buffer::RingBuffer;
use super::pattern::PatternSet;
use crate::types::Match;

/// The pattern matching engine.
#[derive(Debug)]
pub struct Matcher {
    /// Output not yet consumed by a match.
    pending: RingBuffer,
}

impl Matcher {
    /// Create a new matcher with the specified buffer size.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self {
            pending: RingBuffer::new(buffer_size),
        }
    }

    /// Append newly arrived output.
    pub fn append(&mut self, data: &[u8]) {
        self.pending.append(data);
    }

    /// Get the pending output as a string.
    #[must_use]
    pub fn buffer_str(&mut self) -> String {
        self.pending.as_str_lossy()
    }

    /// Drain all pending output.
    pub fn take_all(&mut self) -> String {
        self.pending.take_str()
    }

    /// Try to match the set against pending output.
    #[must_use]
    pub fn try_match_any(&mut self, patterns: &PatternSet) -> Option<MatchResult> {
        let text = self.pending.as_slice();
        patterns
            .find_match(text)
            .map(|(pattern_index, pm)| MatchResult {
                pattern_index,
                start: pm.start,
                end: pm.end,
            })
    }

    /// Consume pending output through the end of `result` and return a Match.
    pub fn consume_match(&mut self, result: &MatchResult) -> Match {
        let before = self.pending.consume_str(result.start);
        let matched = self.pending.consume_str(result.len());

        Match::new(result.pattern_index, matched, before)
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(super::buffer::DEFAULT_CAPACITY)
    }
}

/// Result of a pattern match.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Index of the pattern that matched.
    pub pattern_index: usize,
    /// Start position in the pending buffer.
    pub start: usize,
    /// End position in the pending buffer.
    pub end: usize,
}

impl MatchResult {
    /// Get the length of the match.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the match is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Deadline bookkeeping for one wait.
#[derive(Debug, Clone, Copy)]
pub struct ExpectState {
    /// Start time of the wait.
    start_time: Instant,
    /// Timeout duration.
    timeout: Duration,
}

impl ExpectState {
    /// Start a wait bounded by `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            start_time: Instant::now(),
            timeout,
        }
    }

    /// Check if the wait has timed out.
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        self.start_time.elapsed() >= self.timeout
    }

    /// Get the remaining time until timeout.
    #[must_use]
    pub fn remaining_time(&self) -> Duration {
        self.timeout.saturating_sub(self.start_time.elapsed())
    }

    /// The configured timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}
