//! Environment-based configuration.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "NAVEXPECT";

/// Environment variable reader.
///
/// Takes a snapshot of the prefixed variables when created, so later changes
/// to the process environment are not observed.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
    /// Snapshot of matching variables, keyed by full name.
    vars: HashMap<String, String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Create a reader over the current process environment.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    /// Create a reader over an explicit set of variables.
    #[must_use]
    pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let prefix = prefix.into().to_uppercase();
        let wanted = format!("{prefix}_");
        let vars = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| prefix.is_empty() || k.starts_with(&wanted))
            .collect();
        Self { prefix, vars }
    }

    /// Build the full environment variable name.
    #[must_use]
    pub fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value. Empty values count as unset.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(&self.var_name(name))
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Get a parsed value, reporting values that fail to parse.
    ///
    /// Returns `Ok(None)` when the variable is unset.
    pub fn parse<T>(&self, name: &str) -> Result<Option<T>, String>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|raw| {
                raw.trim()
                    .parse()
                    .map_err(|e| format!("{}={raw:?}: {e}", self.var_name(name)))
            })
            .transpose()
    }

    /// Get a duration in seconds.
    pub fn duration_secs(&self, name: &str) -> Result<Option<Duration>, String> {
        Ok(self.parse::<u64>(name)?.map(Duration::from_secs))
    }

    /// Get a duration in milliseconds.
    pub fn duration_millis(&self, name: &str) -> Result<Option<Duration>, String> {
        Ok(self.parse::<u64>(name)?.map(Duration::from_millis))
    }

    /// Check if a variable is set.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All captured variables, keyed by name without the prefix.
    #[must_use]
    pub fn all(&self) -> HashMap<String, String> {
        let strip = if self.prefix.is_empty() {
            0
        } else {
            self.prefix.len() + 1
        };
        self.vars
            .iter()
            .map(|(k, v)| (k[strip..].to_string(), v.clone()))
            .collect()
    }
}

/// Variable names understood by [`NavConfig::apply_env`](super::NavConfig::apply_env).
pub mod vars {
    /// Path of the `navencrypt` executable.
    pub const NAVENCRYPT_BIN: &str = "NAVENCRYPT_BIN";
    /// Path of the `navencrypt-prepare` executable.
    pub const PREPARE_BIN: &str = "PREPARE_BIN";
    /// Path of the `navencrypt-move` executable.
    pub const MOVE_BIN: &str = "MOVE_BIN";
    /// Prompt timeout in seconds.
    pub const PROMPT_TIMEOUT: &str = "PROMPT_TIMEOUT";
    /// Completion timeout in seconds.
    pub const COMPLETION_TIMEOUT: &str = "COMPLETION_TIMEOUT";
    /// Close timeout in seconds.
    pub const CLOSE_TIMEOUT: &str = "CLOSE_TIMEOUT";
    /// Lock file cleared after encrypting a directory.
    pub const LOCK_FILE: &str = "LOCK_FILE";
    /// Delay before clearing the lock file, in milliseconds.
    pub const LOCK_RELEASE_DELAY_MS: &str = "LOCK_RELEASE_DELAY_MS";
    /// Line ending sent after each answer.
    pub const LINE_ENDING: &str = "LINE_ENDING";
    /// Backend connecting the tools: `pipe` or `pty`.
    pub const BACKEND: &str = "BACKEND";
}
