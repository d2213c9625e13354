//! Mock backend support for testing.
//!
//! This module provides a scripted stand-in for the navencrypt executables so
//! drivers can be tested without spawning real processes:
//!
//! - [`Scenario`]: the script a fake child follows
//! - [`MockTransport`]: a transport that plays a scenario
//! - [`MockSpawner`]: a spawner that hands out scenarios in order
//!
//! # Example
//!
//! ```rust,ignore
//! use navexpect::mock::{MockSpawner, Scenario};
//!
//! let spawner = MockSpawner::new();
//! spawner.push(
//!     Scenario::new()
//!         .prompt("Type MASTER passphrase: ")
//!         .output("1 rule(s) were added\n")
//!         .exit(0),
//! );
//! ```

mod event;
mod scenario;
mod transport;

pub use event::MockEvent;
pub use scenario::Scenario;
pub use transport::{MockSpawner, MockTransport};
