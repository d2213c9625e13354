//! Expect pattern matching module.
//!
//! Pattern types, the pending-output buffer, and the matching engine used by
//! [`Session::await_one`](crate::session::Session::await_one).

mod buffer;
mod matcher;
mod pattern;

pub use buffer::{DEFAULT_CAPACITY, RingBuffer};
pub use matcher::{ExpectState, MatchResult, Matcher};
pub use pattern::{CompiledRegex, Pattern, PatternMatch, PatternSet};
