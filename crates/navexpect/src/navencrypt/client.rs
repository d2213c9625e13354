//! The navencrypt client and its operation drivers.

use std::io;
use std::path::Path;

use tracing::{debug, info, warn};

use super::exchange::{Exchange, Halt, Step, refusal};
use super::params::{Mode, Passphrase, Registration, check_text, path_arg};
use super::prompts::Prompts;
use super::rule_list::RuleList;
use crate::backend::{CommandLine, LocalSpawner, Spawner};
use crate::config::NavConfig;
use crate::error::Result;
use crate::expect::{Pattern, PatternSet};
use crate::outcome::{Failure, Operation, Outcome};
use crate::session::{Session, Sink};

/// A parsed rule listing together with the outcome of producing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleListing {
    /// Outcome of running the listing.
    pub outcome: Outcome,
    /// The parsed rules; empty unless the listing succeeded.
    pub rules: RuleList,
}

/// Drives the navencrypt command-line tools.
///
/// Each operation spawns one child, answers its prompts, and reports an
/// [`Outcome`]. Nothing is shared between calls, so one client can run
/// operations back to back. Callers serialise operations that touch the same
/// device, directory, or lock file.
#[derive(Debug)]
pub struct Navencrypt<S: Spawner = LocalSpawner> {
    spawner: S,
    config: NavConfig,
    prompts: Prompts,
}

impl Navencrypt<LocalSpawner> {
    /// Create a client that runs local processes over the configured
    /// backend.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Config`](crate::ExpectError::Config) if the
    /// backend is unavailable or a configured prompt does not compile.
    pub fn new(config: NavConfig) -> Result<Self> {
        Self::with_spawner(LocalSpawner::for_backend(config.backend)?, config)
    }

    /// Create a client from defaults and `NAVEXPECT_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Config`](crate::ExpectError::Config) for bad
    /// override values.
    pub fn from_env() -> Result<Self> {
        Self::new(NavConfig::from_env()?)
    }
}

impl<S: Spawner> Navencrypt<S> {
    /// Create a client with a custom spawner.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Config`](crate::ExpectError::Config) if the
    /// configuration is invalid.
    pub fn with_spawner(spawner: S, config: NavConfig) -> Result<Self> {
        config.validate()?;
        let prompts = Prompts::compile(&config.prompts)?;
        Ok(Self {
            spawner,
            config,
            prompts,
        })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &NavConfig {
        &self.config
    }

    /// The spawner in use.
    #[must_use]
    pub const fn spawner(&self) -> &S {
        &self.spawner
    }

    fn navencrypt(&self) -> CommandLine {
        CommandLine::new(&self.config.programs.navencrypt)
    }

    fn open(&self, operation: Operation, command: &CommandLine, sink: &Sink) -> Result<Exchange<S::Transport>> {
        info!(%operation, command = %command, "starting");
        let session = Session::open(
            &self.spawner,
            command,
            self.config.session_config(),
            sink.clone(),
        )?;
        Ok(Exchange::new(session, operation))
    }

    fn report(outcome: &Outcome) {
        match &outcome.failure {
            None => info!(operation = %outcome.operation, "succeeded"),
            Some(failure) => info!(operation = %outcome.operation, %failure, "failed"),
        }
    }

    /// Register this host with a key server, using a single master
    /// passphrase.
    ///
    /// Succeeds iff the tool confirms the registration. Its usage text, an
    /// `ERROR:` line, the end of output, or a timeout are failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched, a parameter cannot be
    /// passed to it, or I/O with it fails.
    pub async fn register(
        &self,
        registration: &Registration,
        passphrase: &Passphrase,
        sink: &Sink,
    ) -> Result<Outcome> {
        registration.validate()?;
        let command = self
            .navencrypt()
            .arg("register")
            .arg(format!(
                "--server={}:{}",
                registration.server, registration.port
            ))
            .arg(format!("--org={}", registration.org))
            .secret_arg(format!("--auth={}", registration.auth))
            .arg(format!("--clientname={}", registration.client_name))
            .arg("--skip-ssl-check");

        let mut exchange = self.open(Operation::Register, &command, sink)?;
        let result = self.register_script(&mut exchange, passphrase).await;
        let outcome = exchange.finish(result).await?;
        Self::report(&outcome);
        Ok(outcome)
    }

    async fn register_script(
        &self,
        exchange: &mut Exchange<S::Transport>,
        passphrase: &Passphrase,
    ) -> Step<()> {
        let p = &self.prompts;
        let timeouts = &self.config.timeouts;

        let start = PatternSet::from_patterns(vec![p.key_type.clone(), p.register_usage.clone()]);
        let m = exchange.expect_any(&start, timeouts.prompt).await?;
        if m.pattern_index == 1 {
            return Err(Failure::InvalidUsage.into());
        }

        exchange.reply(&p.key_type, &p.key_type_reply).await?;
        exchange
            .answer(&p.passphrase, passphrase.expose(), timeouts.prompt)
            .await?;
        exchange
            .answer(&p.verify_passphrase, passphrase.expose(), timeouts.prompt)
            .await?;

        let finish = PatternSet::from_patterns(vec![p.registered.clone(), p.error.clone()]);
        let m = exchange.expect_any(&finish, timeouts.completion).await?;
        if m.pattern_index == 0 {
            Ok(())
        } else {
            Err(exchange.rejection(&m).into())
        }
    }

    /// Check a master passphrase.
    ///
    /// Lists the access rules, which requires the passphrase, and succeeds
    /// unless the tool answers with a wrong-key or passphrase-length message.
    /// No answer within the prompt timeout also counts as success. A missing
    /// passphrase prompt is a failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched or I/O with it fails.
    pub async fn check_password(&self, passphrase: &Passphrase, sink: &Sink) -> Result<Outcome> {
        let command = self.navencrypt().args(["acl", "--list"]);
        let mut exchange = self.open(Operation::CheckPassword, &command, sink)?;
        let result = self.check_password_script(&mut exchange, passphrase).await;
        let outcome = exchange.finish(result).await?;
        Self::report(&outcome);
        Ok(outcome)
    }

    async fn check_password_script(
        &self,
        exchange: &mut Exchange<S::Transport>,
        passphrase: &Passphrase,
    ) -> Step<()> {
        let p = &self.prompts;
        let timeout = self.config.timeouts.prompt;

        exchange.answer(&p.passphrase, passphrase.expose(), timeout).await?;

        let rejections =
            PatternSet::from_patterns(vec![p.incorrect_key.clone(), p.passphrase_length.clone()]);
        match exchange.expect_any(&rejections, timeout).await {
            Ok(m) => Err(exchange.rejection(&m).into()),
            Err(Halt::Failed(Failure::PromptMismatch { .. })) => Ok(()),
            Err(Halt::Failed(Failure::Timeout { after, .. })) => {
                warn!(
                    ?after,
                    "no answer after the passphrase; treating the passphrase as accepted"
                );
                exchange.session().terminate().await?;
                Ok(())
            }
            Err(halt) => Err(halt),
        }
    }

    /// Prepare an encrypted volume on `device`, mounted at `mount_dir`.
    ///
    /// Succeeds iff the tool exits with status 0 after taking the passphrase.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched, a path cannot be
    /// passed to it, or I/O with it fails.
    pub async fn prepare_volume(
        &self,
        backing_file: &Path,
        device: &Path,
        mount_dir: &Path,
        passphrase: &Passphrase,
        sink: &Sink,
    ) -> Result<Outcome> {
        let command = CommandLine::new(&self.config.programs.prepare)
            .arg("-d")
            .arg(path_arg("backing_file", backing_file)?)
            .arg(path_arg("device", device)?)
            .arg(path_arg("mount_dir", mount_dir)?);

        let mut exchange = self.open(Operation::PrepareVolume, &command, sink)?;
        let result = self.prepare_script(&mut exchange, passphrase).await;
        let outcome = exchange.finish(result).await?;
        Self::report(&outcome);
        Ok(outcome)
    }

    async fn prepare_script(
        &self,
        exchange: &mut Exchange<S::Transport>,
        passphrase: &Passphrase,
    ) -> Step<()> {
        let timeouts = &self.config.timeouts;
        exchange
            .answer(&self.prompts.passphrase, passphrase.expose(), timeouts.prompt)
            .await?;
        exchange.read_to_eof(timeouts.completion).await?;
        exchange.require_clean_exit().await?;
        Ok(())
    }

    /// Tear down the encrypted volume mounted at `mount_dir`.
    ///
    /// Confirms the undo warning and the "are you sure" question, gives the
    /// passphrase, and succeeds iff the tool exits with status 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched, the path cannot be
    /// passed to it, or I/O with it fails.
    pub async fn teardown_volume(
        &self,
        mount_dir: &Path,
        passphrase: &Passphrase,
        sink: &Sink,
    ) -> Result<Outcome> {
        let command = CommandLine::new(&self.config.programs.prepare)
            .arg("--undo-force")
            .arg(path_arg("mount_dir", mount_dir)?);

        let mut exchange = self.open(Operation::TeardownVolume, &command, sink)?;
        let result = self.teardown_script(&mut exchange, passphrase).await;
        let outcome = exchange.finish(result).await?;
        Self::report(&outcome);
        Ok(outcome)
    }

    async fn teardown_script(
        &self,
        exchange: &mut Exchange<S::Transport>,
        passphrase: &Passphrase,
    ) -> Step<()> {
        let p = &self.prompts;
        let timeouts = &self.config.timeouts;
        exchange
            .answer(&p.undo_warning, &p.confirm_reply, timeouts.prompt)
            .await?;
        exchange
            .answer(&p.undo_confirm, &p.confirm_reply, timeouts.prompt)
            .await?;
        exchange
            .answer(&p.passphrase, passphrase.expose(), timeouts.prompt)
            .await?;
        exchange.read_to_eof(timeouts.completion).await?;
        exchange.require_clean_exit().await?;
        Ok(())
    }

    /// Move `source_dir` into the encrypted volume at `mount_target`, under
    /// access `category`.
    ///
    /// Succeeds iff the tool reports `Done.`. After success the tool's lock
    /// file is removed, best effort, once the configured delay has passed.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched, a parameter cannot be
    /// passed to it, or I/O with it fails.
    pub async fn encrypt_directory(
        &self,
        category: &str,
        source_dir: &Path,
        mount_target: &Path,
        passphrase: &Passphrase,
        sink: &Sink,
    ) -> Result<Outcome> {
        check_text("category", category)?;
        let command = CommandLine::new(&self.config.programs.mover)
            .arg("encrypt")
            .arg(category)
            .arg(path_arg("source_dir", source_dir)?)
            .arg(path_arg("mount_target", mount_target)?);

        let mut exchange = self.open(Operation::EncryptDirectory, &command, sink)?;
        let result = self
            .confirm_script(&mut exchange, passphrase, &self.prompts.done)
            .await;
        let outcome = exchange.finish(result).await?;
        if outcome.success {
            self.release_move_lock().await;
        }
        Self::report(&outcome);
        Ok(outcome)
    }

    async fn release_move_lock(&self) {
        let encrypt = &self.config.encrypt;
        tokio::time::sleep(encrypt.lock_release_delay).await;
        match tokio::fs::remove_file(&encrypt.lock_file).await {
            Ok(()) => debug!(path = %encrypt.lock_file.display(), "removed move lock"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %encrypt.lock_file.display(), "no move lock to remove");
            }
            Err(e) => warn!(
                path = %encrypt.lock_file.display(),
                error = %e,
                "could not remove move lock"
            ),
        }
    }

    /// Answer the passphrase prompt, then wait for `confirmation` until the
    /// tool finishes. Output that never confirms is a failure; a refusal in
    /// it only names the failure.
    async fn confirm_script(
        &self,
        exchange: &mut Exchange<S::Transport>,
        passphrase: &Passphrase,
        confirmation: &Pattern,
    ) -> Step<()> {
        let timeouts = &self.config.timeouts;
        exchange
            .answer(&self.prompts.passphrase, passphrase.expose(), timeouts.prompt)
            .await?;
        exchange
            .confirm(confirmation, &self.prompts.rejections(), timeouts.completion)
            .await
    }

    /// Add an access rule.
    ///
    /// Succeeds iff the tool confirms that rules were added.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched, the rule cannot be
    /// passed to it, or I/O with it fails.
    pub async fn add_rule(&self, rule: &str, passphrase: &Passphrase, sink: &Sink) -> Result<Outcome> {
        check_text("rule", rule)?;
        let command = self
            .navencrypt()
            .args(["acl", "--add"])
            .arg(format!("--rule={rule}"));

        let mut exchange = self.open(Operation::AddRule, &command, sink)?;
        let result = self
            .confirm_script(&mut exchange, passphrase, &self.prompts.rules_added)
            .await;
        let outcome = exchange.finish(result).await?;
        Self::report(&outcome);
        Ok(outcome)
    }

    /// List the access rules.
    ///
    /// Succeeds iff the listing ran to completion without a refusal and the
    /// tool exited with status 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched or I/O with it fails.
    pub async fn list_rules(&self, passphrase: &Passphrase, sink: &Sink) -> Result<RuleListing> {
        let command = self.navencrypt().args(["acl", "--list"]);
        let mut exchange = self.open(Operation::ListRules, &command, sink)?;
        let mut listing = String::new();
        let result = self.list_script(&mut exchange, passphrase, &mut listing).await;
        let outcome = exchange.finish(result).await?;
        Self::report(&outcome);

        let rules = if outcome.success {
            RuleList::parse_with_header(&listing, self.config.rule_list_header_lines)
        } else {
            RuleList::default()
        };
        debug!(rules = rules.len(), "parsed rule listing");
        Ok(RuleListing { outcome, rules })
    }

    async fn list_script(
        &self,
        exchange: &mut Exchange<S::Transport>,
        passphrase: &Passphrase,
        listing: &mut String,
    ) -> Step<()> {
        let timeouts = &self.config.timeouts;
        exchange
            .answer(&self.prompts.passphrase, passphrase.expose(), timeouts.prompt)
            .await?;
        *listing = exchange.read_to_eof(timeouts.completion).await?;

        if let Some(failure) = refusal(&self.prompts.rejections(), listing) {
            return Err(failure.into());
        }
        exchange.require_clean_exit().await?;
        Ok(())
    }

    /// Delete the access rule whose text equals `rule`.
    ///
    /// Lists the rules first and looks `rule` up by exact match after
    /// whitespace normalization. When it is not listed the outcome is a
    /// [`Failure::RuleNotFound`] and no delete command is run.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched, the rule cannot be
    /// passed to it, or I/O with it fails.
    pub async fn delete_rule(&self, rule: &str, passphrase: &Passphrase, sink: &Sink) -> Result<Outcome> {
        check_text("rule", rule)?;
        let RuleListing { outcome: listed, rules } = self.list_rules(passphrase, sink).await?;
        if !listed.success {
            return Ok(Outcome {
                operation: Operation::DeleteRule,
                ..listed
            });
        }

        let Some(row) = rules.resolve(rule) else {
            let outcome = Outcome::failed(
                Operation::DeleteRule,
                Failure::RuleNotFound {
                    rule: rule.to_string(),
                },
                listed.transcript,
            );
            Self::report(&outcome);
            return Ok(outcome);
        };
        debug!(ordinal = %row.ordinal, "resolved rule");

        let command = self
            .navencrypt()
            .args(["acl", "--del"])
            .arg(format!("--line={}", row.ordinal));

        let mut exchange = self.open(Operation::DeleteRule, &command, sink)?;
        let result = self
            .confirm_script(&mut exchange, passphrase, &self.prompts.rules_deleted)
            .await;
        let mut outcome = exchange.finish(result).await?;
        outcome.transcript = listed.transcript + &outcome.transcript;
        Self::report(&outcome);
        Ok(outcome)
    }

    /// Switch the enforcement mode.
    ///
    /// Succeeds iff the tool confirms the new mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched or I/O with it fails.
    pub async fn set_mode(&self, mode: Mode, passphrase: &Passphrase, sink: &Sink) -> Result<Outcome> {
        let command = self.navencrypt().arg("set").arg(format!("--mode={mode}"));

        let mut exchange = self.open(Operation::SetMode, &command, sink)?;
        let result = self
            .confirm_script(&mut exchange, passphrase, &self.prompts.mode_changed(mode))
            .await;
        let outcome = exchange.finish(result).await?;
        Self::report(&outcome);
        Ok(outcome)
    }
}
