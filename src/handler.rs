// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Provider handlers.
//!
//! A __handler__ knows how to check, install, and uninstall one provider shape,
//! e.g., a Homebrew formula, an App Store app, or a macOS preference. All
//! handlers share the same three operation contract through [`Handler`].
//!
//! # Contract
//!
//! - `check` reports a [`CheckResult`] snapshot and never mutates anything.
//! - `install` and `uninstall` report success as a plain boolean, and are
//!   idempotent, i.e., running them again after success is harmless.
//! - Failures never escape a handler. A failed command turns into a result
//!   value, and the reason lands in the install log.
//! - Under dry-run, mutating commands are not executed. A `[DRY-RUN] Would`
//!   line is logged in their place. Read-only checks still run for real.
//!
//! # Symlinks
//!
//! The [`Symlink`] handler is not part of provider detection. Any package or
//! pre-install task may carry a symlink config in addition to its provider
//! shape, which is reconciled on its own.

pub mod brew;
pub mod defaults;
pub mod directory;
pub mod mas;
pub mod npm;
pub mod script;
pub mod symlink;

pub use brew::Brew;
pub use defaults::Defaults;
pub use directory::Directory;
pub use mas::Mas;
pub use npm::Npm;
pub use script::Script;
pub use symlink::Symlink;

use crate::{
    config::{PackageProvider, SymlinkConfig, TaskProvider},
    log::InstallLog,
    settings::DEFAULT_PURCHASE_TRIGGER,
    shell::{truncate, ExecResult, RunOptions, Shell, SystemShell},
};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

/// Installation status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Installed,
    NotInstalled,
    Modified,
    Error,
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Installed => "installed",
            Self::NotInstalled => "not_installed",
            Self::Modified => "modified",
            Self::Error => "error",
        };
        fmt.write_str(name)
    }
}

/// Point-in-time status of an item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CheckResult {
    pub status: Status,
    pub message: String,
}

impl CheckResult {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn installed(message: impl Into<String>) -> Self {
        Self::new(Status::Installed, message)
    }

    pub fn not_installed(message: impl Into<String>) -> Self {
        Self::new(Status::NotInstalled, message)
    }

    pub fn modified(message: impl Into<String>) -> Self {
        Self::new(Status::Modified, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Status::Error, message)
    }
}

/// Check, install, and uninstall contract of a provider shape.
#[allow(async_fn_in_trait)]
pub trait Handler {
    /// Provider shape this handler manages.
    type Config;

    /// Report current status of item.
    async fn check<S: Shell>(&self, ctx: &Context<S>, config: &Self::Config, name: &str)
        -> CheckResult;

    /// Bring item into its installed state.
    async fn install<S: Shell>(&self, ctx: &Context<S>, config: &Self::Config, name: &str)
        -> bool;

    /// Revert item, as far as the provider allows it.
    async fn uninstall<S: Shell>(&self, ctx: &Context<S>, config: &Self::Config, name: &str)
        -> bool;
}

/// Everything a handler needs to do its job.
///
/// Owns the shell to run commands through, and the install log to report
/// progress to. One context is shared by every handler of a run.
#[derive(Debug)]
pub struct Context<S = SystemShell>
where
    S: Shell,
{
    shell: S,
    log: InstallLog,
    dotfiles_dir: PathBuf,
    dry_run: bool,
    purchase_trigger: String,
}

impl<S> Context<S>
where
    S: Shell,
{
    /// Construct new handler context.
    pub fn new(shell: S, log: InstallLog, dotfiles_dir: impl Into<PathBuf>) -> Self {
        Self {
            shell,
            log,
            dotfiles_dir: dotfiles_dir.into(),
            dry_run: false,
            purchase_trigger: DEFAULT_PURCHASE_TRIGGER.to_string(),
        }
    }

    /// Toggle dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the app store failure text that triggers a purchase.
    pub fn with_purchase_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.purchase_trigger = trigger.into();
        self
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    pub fn log(&self) -> &InstallLog {
        &self.log
    }

    pub fn dotfiles_dir(&self) -> &Path {
        &self.dotfiles_dir
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn purchase_trigger(&self) -> &str {
        &self.purchase_trigger
    }

    /// Run read-only command.
    pub(crate) async fn query(&self, command: &str) -> ExecResult {
        self.shell.run(command, &RunOptions::default()).await
    }

    /// Run mutating command.
    ///
    /// Logs `intent` and runs `command` for real. Under dry-run, only logs
    /// that `command` would have run, and reports success.
    pub(crate) async fn mutate(
        &self,
        intent: impl AsRef<str>,
        command: &str,
        opts: &RunOptions,
    ) -> ExecResult {
        if self.dry_run {
            self.log
                .would_run(truncate(command.replace('\n', " ").as_str(), 120));
            return ExecResult::ok("");
        }

        self.log.append(intent);
        self.shell.run(command, opts).await
    }

    /// Log line that only makes sense when something really happened.
    pub(crate) fn done(&self, message: impl AsRef<str>) {
        if !self.dry_run {
            self.log.append(message);
        }
    }

    /// Check package through the handler of its provider shape.
    pub async fn check_package(&self, provider: &PackageProvider, name: &str) -> CheckResult {
        match provider {
            PackageProvider::Brew(config) => Brew.check(self, config, name).await,
            PackageProvider::Mas(config) => Mas.check(self, config, name).await,
            PackageProvider::Npm(config) => Npm.check(self, config, name).await,
        }
    }

    /// Install package through the handler of its provider shape.
    pub async fn install_package(&self, provider: &PackageProvider, name: &str) -> bool {
        match provider {
            PackageProvider::Brew(config) => Brew.install(self, config, name).await,
            PackageProvider::Mas(config) => Mas.install(self, config, name).await,
            PackageProvider::Npm(config) => Npm.install(self, config, name).await,
        }
    }

    /// Uninstall package through the handler of its provider shape.
    pub async fn uninstall_package(&self, provider: &PackageProvider, name: &str) -> bool {
        match provider {
            PackageProvider::Brew(config) => Brew.uninstall(self, config, name).await,
            PackageProvider::Mas(config) => Mas.uninstall(self, config, name).await,
            PackageProvider::Npm(config) => Npm.uninstall(self, config, name).await,
        }
    }

    /// Check pre-install task through the handler of its provider shape.
    pub async fn check_task(&self, provider: &TaskProvider, name: &str) -> CheckResult {
        match provider {
            TaskProvider::Defaults(config) => Defaults.check(self, config, name).await,
            TaskProvider::Directory(config) => Directory.check(self, config, name).await,
            TaskProvider::Script(config) => Script.check(self, config, name).await,
        }
    }

    /// Install pre-install task through the handler of its provider shape.
    pub async fn install_task(&self, provider: &TaskProvider, name: &str) -> bool {
        match provider {
            TaskProvider::Defaults(config) => Defaults.install(self, config, name).await,
            TaskProvider::Directory(config) => Directory.install(self, config, name).await,
            TaskProvider::Script(config) => Script.install(self, config, name).await,
        }
    }

    /// Uninstall pre-install task through the handler of its provider shape.
    pub async fn uninstall_task(&self, provider: &TaskProvider, name: &str) -> bool {
        match provider {
            TaskProvider::Defaults(config) => Defaults.uninstall(self, config, name).await,
            TaskProvider::Directory(config) => Directory.uninstall(self, config, name).await,
            TaskProvider::Script(config) => Script.uninstall(self, config, name).await,
        }
    }

    pub async fn check_symlink(&self, config: &SymlinkConfig, name: &str) -> CheckResult {
        Symlink.check(self, config, name).await
    }

    pub async fn install_symlink(&self, config: &SymlinkConfig, name: &str) -> bool {
        Symlink.install(self, config, name).await
    }

    pub async fn uninstall_symlink(&self, config: &SymlinkConfig, name: &str) -> bool {
        Symlink.uninstall(self, config, name).await
    }
}
