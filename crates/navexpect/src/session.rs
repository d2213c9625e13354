//! Session module for managing spawned process interactions.
//!
//! A [`Session`] owns one child for the duration of one operation. It offers
//! exactly two primitives: [`Session::await_one`], which waits for the first
//! of several patterns (or the end of output, or a deadline), and
//! [`Session::send_line`]. Everything the child prints is copied to a
//! [`Sink`] as it arrives.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use navexpect::{CommandLine, Pattern, PatternSet, ProcessSpawner, Session, SessionConfig, Sink};
//!
//! # async fn run() -> navexpect::Result<()> {
//! let cmd = CommandLine::new("navencrypt").args(["acl", "--list"]);
//! let mut session = Session::open(&ProcessSpawner::new(), &cmd, SessionConfig::default(), Sink::stdout())?;
//!
//! let prompt = PatternSet::from(Pattern::literal("Type MASTER passphrase:"));
//! if session.await_one(&prompt, Duration::from_secs(30)).await?.is_match() {
//!     session.send_line("secret").await?;
//! }
//! let status = session.close().await?;
//! # Ok(())
//! # }
//! ```

mod handle;
mod sink;

pub use handle::Session;
pub use sink::{SharedBuffer, Sink};
