//! navexpect: Expect-style automation of the navencrypt command-line tools
//!
//! This crate drives `navencrypt`, `navencrypt-prepare` and `navencrypt-move`
//! through their interactive prompts: it supplies the master passphrase,
//! confirms destructive steps, and reads the console output to decide whether
//! each operation succeeded.
//!
//! # Features
//!
//! - **Async-first design** with Tokio runtime, plus a blocking facade
//! - **Expect-style sessions** that wait for the first of several patterns,
//!   the end of output, or a deadline
//! - **Configurable prompts** loaded from TOML and `NAVEXPECT_*` variables
//! - **Pipe or pseudo-terminal backends**, chosen in configuration
//! - **Mock backend** for testing (feature: `mock`)
//!
//! # Example
//!
//! ```ignore
//! use navexpect::{Mode, NavConfig, Navencrypt, Passphrase, Sink};
//!
//! #[tokio::main]
//! async fn main() -> navexpect::Result<()> {
//!     let nav = Navencrypt::new(NavConfig::load_with_env(None)?)?;
//!     let passphrase = Passphrase::new(std::env::var("NAV_PASSPHRASE").unwrap_or_default())?;
//!     let outcome = nav.set_mode(Mode::Permissive, &passphrase, &Sink::stdout()).await?;
//!     println!("{outcome}");
//!     Ok(())
//! }
//! ```

// Core types
pub mod config;
pub mod error;
pub mod outcome;
pub mod types;

// Core modules
pub mod backend;
pub mod expect;
pub mod logging;
pub mod session;
pub mod sync;

// Drivers
pub mod navencrypt;

/// Mock backend for testing.
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use backend::{
    Arg, BackendType, CommandLine, LocalSpawner, LocalTransport, ProcessSpawner, ProcessTransport,
    Spawner, Transport,
};
#[cfg(unix)]
pub use backend::{PtySpawner, PtyTransport};
pub use config::{LineEnding, NavConfig, PatternSpec, PromptConfig, SessionConfig, TimeoutConfig};
pub use error::{ExpectError, Result, SpawnError};
pub use expect::{Pattern, PatternSet};
pub use logging::{LogFormat, init_tracing};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockEvent, MockSpawner, MockTransport, Scenario};
pub use navencrypt::{
    Mode, Navencrypt, Passphrase, Registration, RuleList, RuleListing, RuleRow, normalize_rule,
};
pub use outcome::{Failure, Operation, Outcome};
pub use session::{Session, SharedBuffer, Sink};
pub use sync::{BlockingNavencrypt, block_on};
pub use types::{Match, PatternOutcome, ProcessExitStatus, SessionState};
