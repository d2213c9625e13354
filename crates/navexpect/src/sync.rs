//! Synchronous wrapper for the async client.
//!
//! This module provides a blocking API for callers that do not run an async
//! runtime of their own. Each wrapper owns a current-thread tokio runtime and
//! drives one operation at a time on it.

use std::path::Path;

use tokio::runtime::{Builder, Runtime};

use crate::backend::{LocalSpawner, Spawner};
use crate::config::NavConfig;
use crate::error::{ExpectError, Result};
use crate::navencrypt::{Mode, Navencrypt, Passphrase, Registration, RuleListing};
use crate::outcome::Outcome;
use crate::session::Sink;

fn runtime() -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ExpectError::io_context("creating tokio runtime", e))
}

/// A blocking [`Navencrypt`] client.
///
/// Must not be used from inside an async context; `block_on` panics there.
pub struct BlockingNavencrypt<S: Spawner = LocalSpawner> {
    /// The tokio runtime.
    runtime: Runtime,
    /// The inner async client.
    inner: Navencrypt<S>,
}

impl BlockingNavencrypt<LocalSpawner> {
    /// Create a client that runs local processes over the configured
    /// backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the runtime cannot
    /// be created.
    pub fn new(config: NavConfig) -> Result<Self> {
        Self::from_client(Navencrypt::new(config)?)
    }
}

impl<S: Spawner> BlockingNavencrypt<S> {
    /// Wrap an existing async client.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be created.
    pub fn from_client(inner: Navencrypt<S>) -> Result<Self> {
        Ok(Self {
            runtime: runtime()?,
            inner,
        })
    }

    /// The wrapped async client.
    #[must_use]
    pub const fn client(&self) -> &Navencrypt<S> {
        &self.inner
    }

    /// See [`Navencrypt::register`].
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched or I/O with it fails.
    pub fn register(
        &self,
        registration: &Registration,
        passphrase: &Passphrase,
        sink: &Sink,
    ) -> Result<Outcome> {
        self.runtime
            .block_on(self.inner.register(registration, passphrase, sink))
    }

    /// See [`Navencrypt::check_password`].
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched or I/O with it fails.
    pub fn check_password(&self, passphrase: &Passphrase, sink: &Sink) -> Result<Outcome> {
        self.runtime
            .block_on(self.inner.check_password(passphrase, sink))
    }

    /// See [`Navencrypt::prepare_volume`].
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched or I/O with it fails.
    pub fn prepare_volume(
        &self,
        backing_file: &Path,
        device: &Path,
        mount_dir: &Path,
        passphrase: &Passphrase,
        sink: &Sink,
    ) -> Result<Outcome> {
        self.runtime.block_on(self.inner.prepare_volume(
            backing_file,
            device,
            mount_dir,
            passphrase,
            sink,
        ))
    }

    /// See [`Navencrypt::teardown_volume`].
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched or I/O with it fails.
    pub fn teardown_volume(
        &self,
        mount_dir: &Path,
        passphrase: &Passphrase,
        sink: &Sink,
    ) -> Result<Outcome> {
        self.runtime
            .block_on(self.inner.teardown_volume(mount_dir, passphrase, sink))
    }

    /// See [`Navencrypt::encrypt_directory`].
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched or I/O with it fails.
    pub fn encrypt_directory(
        &self,
        category: &str,
        source_dir: &Path,
        mount_target: &Path,
        passphrase: &Passphrase,
        sink: &Sink,
    ) -> Result<Outcome> {
        self.runtime.block_on(self.inner.encrypt_directory(
            category,
            source_dir,
            mount_target,
            passphrase,
            sink,
        ))
    }

    /// See [`Navencrypt::add_rule`].
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched or I/O with it fails.
    pub fn add_rule(&self, rule: &str, passphrase: &Passphrase, sink: &Sink) -> Result<Outcome> {
        self.runtime
            .block_on(self.inner.add_rule(rule, passphrase, sink))
    }

    /// See [`Navencrypt::list_rules`].
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched or I/O with it fails.
    pub fn list_rules(&self, passphrase: &Passphrase, sink: &Sink) -> Result<RuleListing> {
        self.runtime.block_on(self.inner.list_rules(passphrase, sink))
    }

    /// See [`Navencrypt::delete_rule`].
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched or I/O with it fails.
    pub fn delete_rule(&self, rule: &str, passphrase: &Passphrase, sink: &Sink) -> Result<Outcome> {
        self.runtime
            .block_on(self.inner.delete_rule(rule, passphrase, sink))
    }

    /// See [`Navencrypt::set_mode`].
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched or I/O with it fails.
    pub fn set_mode(&self, mode: Mode, passphrase: &Passphrase, sink: &Sink) -> Result<Outcome> {
        self.runtime
            .block_on(self.inner.set_mode(mode, passphrase, sink))
    }
}

impl<S: Spawner> std::fmt::Debug for BlockingNavencrypt<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingNavencrypt").finish_non_exhaustive()
    }
}

/// Run async code synchronously.
///
/// This is a convenience function for running a single async operation
/// without managing a runtime.
///
/// # Errors
///
/// Returns an error if the runtime cannot be created.
pub fn block_on<F, T>(future: F) -> Result<T>
where
    F: std::future::Future<Output = T>,
{
    Ok(runtime()?.block_on(future))
}
