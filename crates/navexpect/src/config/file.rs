//! File-based configuration loading.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::env::{EnvConfig, vars};
use super::{LineEnding, SessionConfig, TimeoutConfig, duration_millis};
use crate::backend::BackendType;
use crate::error::{ExpectError, Result};
use crate::expect::Pattern;

/// Default lock file left behind by `navencrypt-move`.
pub const DEFAULT_LOCK_FILE: &str = "/tmp/.navencrypt-move.lock";

/// Default pause between closing `navencrypt-move` and clearing its lock.
pub const DEFAULT_LOCK_RELEASE_DELAY: Duration = Duration::from_secs(1);

/// Tool-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NavConfig {
    /// How the tools are connected: piped stdio or a pseudo-terminal.
    pub backend: BackendType,

    /// Line ending sent after each answer.
    pub line_ending: LineEnding,

    /// Maximum bytes of transcript kept per operation.
    pub transcript_limit: usize,

    /// Header lines preceding the rules in `navencrypt acl --list` output.
    pub rule_list_header_lines: usize,

    /// Executable locations.
    pub programs: ProgramConfig,

    /// Wait bounds.
    pub timeouts: TimeoutConfig,

    /// Directory encryption settings.
    pub encrypt: EncryptConfig,

    /// Prompt and confirmation texts.
    pub prompts: PromptConfig,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::default(),
            line_ending: LineEnding::Lf,
            transcript_limit: super::DEFAULT_TRANSCRIPT_LIMIT,
            rule_list_header_lines: crate::navencrypt::HEADER_LINES,
            programs: ProgramConfig::default(),
            timeouts: TimeoutConfig::default(),
            encrypt: EncryptConfig::default(),
            prompts: PromptConfig::default(),
        }
    }
}

impl NavConfig {
    /// Parse a configuration from TOML text. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ExpectError::config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ExpectError::io_context(format!("reading {}", path.display()), e))?;
        Self::from_toml_str(&text)
            .map_err(|e| ExpectError::config(format!("{}: {e}", path.display())))
    }

    /// Defaults overridden from the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(&EnvConfig::default())?;
        Ok(config)
    }

    /// Load an optional file, then apply environment overrides.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(&EnvConfig::default())?;
        Ok(config)
    }

    /// Apply overrides from environment variables.
    pub fn apply_env(&mut self, env: &EnvConfig) -> Result<()> {
        if let Some(bin) = env.get(vars::NAVENCRYPT_BIN) {
            self.programs.navencrypt = bin.into();
        }
        if let Some(bin) = env.get(vars::PREPARE_BIN) {
            self.programs.prepare = bin.into();
        }
        if let Some(bin) = env.get(vars::MOVE_BIN) {
            self.programs.mover = bin.into();
        }
        if let Some(timeout) = env.duration_secs(vars::PROMPT_TIMEOUT).map_err(ExpectError::config)? {
            self.timeouts.prompt = timeout;
        }
        if let Some(timeout) = env
            .duration_secs(vars::COMPLETION_TIMEOUT)
            .map_err(ExpectError::config)?
        {
            self.timeouts.completion = timeout;
        }
        if let Some(timeout) = env.duration_secs(vars::CLOSE_TIMEOUT).map_err(ExpectError::config)? {
            self.timeouts.close = timeout;
        }
        if let Some(path) = env.get(vars::LOCK_FILE) {
            self.encrypt.lock_file = path.into();
        }
        if let Some(delay) = env
            .duration_millis(vars::LOCK_RELEASE_DELAY_MS)
            .map_err(ExpectError::config)?
        {
            self.encrypt.lock_release_delay = delay;
        }
        if let Some(ending) = env.parse::<LineEnding>(vars::LINE_ENDING).map_err(ExpectError::config)? {
            self.line_ending = ending;
        }
        if let Some(backend) = env.parse::<BackendType>(vars::BACKEND).map_err(ExpectError::config)? {
            self.backend = backend;
        }
        self.validate()
    }

    /// Check that the backend is available, every prompt compiles and
    /// every program is named.
    pub fn validate(&self) -> Result<()> {
        if !self.backend.is_available() {
            return Err(ExpectError::config(format!(
                "backend '{}' is not available on this platform",
                self.backend
            )));
        }
        self.programs.validate()?;
        self.prompts.validate()
    }

    /// Session settings derived from this configuration.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new()
            .line_ending(self.line_ending)
            .transcript_limit(self.transcript_limit)
            .close_timeout(self.timeouts.close)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ExpectError::config(format!("cannot render TOML: {e}")))
    }
}

/// Executable locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProgramConfig {
    /// The `navencrypt` executable.
    pub navencrypt: PathBuf,
    /// The `navencrypt-prepare` executable.
    pub prepare: PathBuf,
    /// The `navencrypt-move` executable.
    #[serde(rename = "move")]
    pub mover: PathBuf,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            navencrypt: "navencrypt".into(),
            prepare: "navencrypt-prepare".into(),
            mover: "navencrypt-move".into(),
        }
    }
}

impl ProgramConfig {
    fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("programs.navencrypt", &self.navencrypt),
            ("programs.prepare", &self.prepare),
            ("programs.move", &self.mover),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ExpectError::config(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}

/// Directory encryption settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncryptConfig {
    /// Lock file `navencrypt-move` leaves behind after a successful run.
    pub lock_file: PathBuf,

    /// Pause after the move finishes before the lock is cleared, in
    /// milliseconds.
    #[serde(rename = "lock_release_delay_ms", with = "duration_millis")]
    pub lock_release_delay: Duration,
}

impl Default for EncryptConfig {
    fn default() -> Self {
        Self {
            lock_file: DEFAULT_LOCK_FILE.into(),
            lock_release_delay: DEFAULT_LOCK_RELEASE_DELAY,
        }
    }
}

/// A prompt as written in configuration: a plain string is a literal, a
/// `{ regex = "..." }` table is a regular expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternSpec {
    /// Exact text.
    Literal(String),
    /// Regular expression.
    Regex {
        /// The expression source.
        regex: String,
    },
}

impl PatternSpec {
    /// A literal spec.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// A regex spec.
    pub fn regex(source: impl Into<String>) -> Self {
        Self::Regex {
            regex: source.into(),
        }
    }

    /// Compile into a [`Pattern`]; `name` labels configuration errors.
    pub fn compile(&self, name: &str) -> Result<Pattern> {
        match self {
            Self::Literal(text) if text.is_empty() => Err(ExpectError::config(format!(
                "prompts.{name} must not be empty"
            ))),
            Self::Literal(text) => Ok(Pattern::literal(text.clone())),
            Self::Regex { regex } => Pattern::regex(regex)
                .map_err(|e| ExpectError::config(format!("prompts.{name}: {e}"))),
        }
    }
}

impl fmt::Display for PatternSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => write!(f, "{text:?}"),
            Self::Regex { regex } => write!(f, "/{regex}/"),
        }
    }
}

impl From<&str> for PatternSpec {
    fn from(text: &str) -> Self {
        Self::literal(text)
    }
}

/// Prompt and confirmation texts printed by the navencrypt tools, and the
/// fixed replies sent to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptConfig {
    /// Register: master key type menu.
    pub key_type: PatternSpec,
    /// Register: reply selecting a single-passphrase master key.
    pub key_type_reply: String,
    /// Register: usage text printed for bad arguments.
    pub register_usage: PatternSpec,
    /// Register: success confirmation.
    pub registered: PatternSpec,
    /// Explicit error marker.
    pub error: PatternSpec,
    /// Master passphrase prompt.
    pub passphrase: PatternSpec,
    /// Master passphrase confirmation prompt.
    pub verify_passphrase: PatternSpec,
    /// Rejection of a wrong passphrase.
    pub incorrect_key: PatternSpec,
    /// Rejection of a passphrase of unacceptable length.
    pub passphrase_length: PatternSpec,
    /// Teardown: first warning confirmation.
    pub undo_warning: PatternSpec,
    /// Teardown: "are you sure" confirmation.
    pub undo_confirm: PatternSpec,
    /// Teardown: reply accepting both confirmations.
    pub confirm_reply: String,
    /// Encrypt: completion marker.
    pub done: PatternSpec,
    /// Add rule: confirmation.
    pub rules_added: PatternSpec,
    /// Delete rule: confirmation.
    pub rules_deleted: PatternSpec,
    /// Set mode: confirmation, with `{mode}` replaced by the requested mode.
    pub mode_changed: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            key_type: "Choose MASTER key type:".into(),
            key_type_reply: "1".to_string(),
            register_usage: "Try `navencrypt register --help' for more information.".into(),
            registered: "navencrypt is now registered.".into(),
            error: "ERROR:".into(),
            passphrase: "Type MASTER passphrase:".into(),
            verify_passphrase: "Verify MASTER passphrase:".into(),
            incorrect_key: PatternSpec::regex(r"(?i)(incorrect|invalid) (master )?key"),
            passphrase_length: PatternSpec::regex(
                r"(?i)passphrase (is too (short|long)|must (be|have) (at least|between|no more than))",
            ),
            undo_warning: PatternSpec::regex(r"(?i)do you want to continue"),
            undo_confirm: PatternSpec::regex(r"(?i)are you sure"),
            confirm_reply: "yes".to_string(),
            done: "Done.".into(),
            rules_added: PatternSpec::regex(r"\d+ rule\(s\) were added"),
            rules_deleted: PatternSpec::regex(r"\d+ rule\(s\) were deleted"),
            mode_changed: "navencrypt is now in {mode} mode".to_string(),
        }
    }
}

impl PromptConfig {
    /// All pattern entries with their configuration names.
    fn entries(&self) -> [(&'static str, &PatternSpec); 13] {
        [
            ("key_type", &self.key_type),
            ("register_usage", &self.register_usage),
            ("registered", &self.registered),
            ("error", &self.error),
            ("passphrase", &self.passphrase),
            ("verify_passphrase", &self.verify_passphrase),
            ("incorrect_key", &self.incorrect_key),
            ("passphrase_length", &self.passphrase_length),
            ("undo_warning", &self.undo_warning),
            ("undo_confirm", &self.undo_confirm),
            ("done", &self.done),
            ("rules_added", &self.rules_added),
            ("rules_deleted", &self.rules_deleted),
        ]
    }

    fn validate(&self) -> Result<()> {
        for (name, spec) in self.entries() {
            spec.compile(name)?;
        }
        if self.mode_changed.trim().is_empty() {
            return Err(ExpectError::config("prompts.mode_changed must not be empty"));
        }
        if self.key_type_reply.contains(['\n', '\r']) || self.confirm_reply.contains(['\n', '\r']) {
            return Err(ExpectError::config("prompt replies must be single lines"));
        }
        Ok(())
    }
}
