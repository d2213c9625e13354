//! Compiled prompt patterns.

use crate::config::PromptConfig;
use crate::error::Result;
use crate::expect::{Pattern, PatternSet};

use super::params::Mode;

/// The prompts of [`PromptConfig`], compiled once per client.
#[derive(Debug, Clone)]
pub(crate) struct Prompts {
    pub key_type: Pattern,
    pub key_type_reply: String,
    pub register_usage: Pattern,
    pub registered: Pattern,
    pub error: Pattern,
    pub passphrase: Pattern,
    pub verify_passphrase: Pattern,
    pub incorrect_key: Pattern,
    pub passphrase_length: Pattern,
    pub undo_warning: Pattern,
    pub undo_confirm: Pattern,
    pub confirm_reply: String,
    pub done: Pattern,
    pub rules_added: Pattern,
    pub rules_deleted: Pattern,
    mode_changed: String,
}

impl Prompts {
    pub(crate) fn compile(config: &PromptConfig) -> Result<Self> {
        Ok(Self {
            key_type: config.key_type.compile("key_type")?,
            key_type_reply: config.key_type_reply.clone(),
            register_usage: config.register_usage.compile("register_usage")?,
            registered: config.registered.compile("registered")?,
            error: config.error.compile("error")?,
            passphrase: config.passphrase.compile("passphrase")?,
            verify_passphrase: config.verify_passphrase.compile("verify_passphrase")?,
            incorrect_key: config.incorrect_key.compile("incorrect_key")?,
            passphrase_length: config.passphrase_length.compile("passphrase_length")?,
            undo_warning: config.undo_warning.compile("undo_warning")?,
            undo_confirm: config.undo_confirm.compile("undo_confirm")?,
            confirm_reply: config.confirm_reply.clone(),
            done: config.done.compile("done")?,
            rules_added: config.rules_added.compile("rules_added")?,
            rules_deleted: config.rules_deleted.compile("rules_deleted")?,
            mode_changed: config.mode_changed.clone(),
        })
    }

    /// Confirmation printed once the tool has switched to `mode`.
    pub(crate) fn mode_changed(&self, mode: Mode) -> Pattern {
        Pattern::literal(self.mode_changed.replace("{mode}", mode.as_str()))
    }

    /// The markers of an explicit refusal.
    pub(crate) fn rejections(&self) -> PatternSet {
        PatternSet::from_patterns(vec![self.error.clone(), self.incorrect_key.clone()])
    }
}
