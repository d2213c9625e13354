//! Drivers for the navencrypt command-line tools.
//!
//! [`Navencrypt`] runs one operation per call: it spawns the right tool,
//! answers its prompts, and reports an [`Outcome`](crate::Outcome). Prompt
//! texts come from [`PromptConfig`](crate::config::PromptConfig), so a tool
//! release that rewords a prompt only needs a configuration change.
//!
//! ```rust,ignore
//! use navexpect::{Navencrypt, NavConfig, Passphrase, Sink};
//!
//! let nav = Navencrypt::new(NavConfig::load("/etc/navexpect.toml")?)?;
//! let passphrase = Passphrase::new(secret)?;
//! let outcome = nav.check_password(&passphrase, &Sink::null()).await?;
//! if !outcome.success {
//!     eprintln!("{outcome}");
//! }
//! ```

mod client;
mod exchange;
mod params;
mod prompts;
mod rule_list;

pub use client::{Navencrypt, RuleListing};
pub use params::{Mode, Passphrase, Registration};
pub use rule_list::{HEADER_LINES, RuleList, RuleRow, normalize_rule};
