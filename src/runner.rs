// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Installation and uninstallation orchestrator.
//!
//! The runner drives every item of a resolved profile through its handler.
//! Runs are best effort: a failed item marks the whole run as failed, but never
//! stops the remaining items from being processed.
//!
//! # Install Phases
//!
//! 1. Pre-install tasks, strictly one after another in resolution order.
//! 2. Packages, sorted by name and split into batches of a fixed size. Items of
//!    one batch run concurrently, batches run one after another.
//!
//! Uninstall mirrors this. Packages go first in reverse name order, then the
//! pre-install tasks. Only preference tasks are actually reverted, because
//! scripts and directories may have produced user data.
//!
//! # Progress
//!
//! Each item reports its state transitions as [`ProgressItem`] events through
//! an unbounded channel. Events of items in the same batch may arrive in any
//! order.

use crate::{
    config::{ConfigDocument, Package, PreInstallTask, SymlinkConfig},
    handler::{CheckResult, Context, Status},
    profile::{self, ProfileError},
    registry::{select_pre_install_handler, HandlerKind},
    shell::{Shell, SystemShell},
};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, instrument};

/// State of an item as seen by a progress display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    Pending,
    InProgress,
    Done,
    Error,
}

/// Progress event of a single item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressItem {
    pub name: String,
    pub state: ProgressState,
    pub message: Option<String>,
}

/// Sending half of a progress event stream.
///
/// Reporting never fails. Events are dropped if nobody listens.
#[derive(Default, Debug, Clone)]
pub struct Progress {
    sender: Option<UnboundedSender<ProgressItem>>,
}

impl Progress {
    /// Progress reporter that discards every event.
    pub fn none() -> Self {
        Self::default()
    }

    /// Progress reporter paired with its receiving end.
    pub fn channel() -> (Self, UnboundedReceiver<ProgressItem>) {
        let (sender, receiver) = unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    pub fn report(&self, name: &str, state: ProgressState, message: impl Into<String>) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(ProgressItem {
                name: name.to_string(),
                state,
                message: Some(message.into()),
            });
        }
    }

    fn working(&self, name: &str, message: &str) {
        self.report(name, ProgressState::InProgress, message);
    }

    fn done(&self, name: &str, message: &str) {
        self.report(name, ProgressState::Done, message);
    }

    fn error(&self, name: &str, message: &str) {
        self.report(name, ProgressState::Error, message);
    }
}

/// Kind of item reported by a status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    Package,
    PreInstall,
    Symlink,
}

/// Status of one item of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemStatus {
    pub name: String,
    pub description: Option<String>,
    pub status: Status,
    pub message: String,
    pub kind: ItemKind,
}

impl ItemStatus {
    fn new(name: &str, description: Option<&str>, result: CheckResult, kind: ItemKind) -> Self {
        Self {
            name: name.to_string(),
            description: description.map(ToString::to_string),
            status: result.status,
            message: result.message,
            kind,
        }
    }

    fn symlink(name: &str, config: &SymlinkConfig, result: CheckResult) -> Self {
        Self {
            name: format!("{name} (symlink)"),
            description: Some(format!("→ {}", config.destination)),
            status: result.status,
            message: result.message,
            kind: ItemKind::Symlink,
        }
    }
}

/// Orchestrator over a handler context.
#[derive(Debug)]
pub struct Runner<S = SystemShell>
where
    S: Shell,
{
    ctx: Context<S>,
    batch_size: usize,
}

impl<S> Runner<S>
where
    S: Shell,
{
    /// Construct new runner that reconciles `batch_size` packages at a time.
    pub fn new(ctx: Context<S>, batch_size: usize) -> Self {
        Self {
            ctx,
            batch_size: batch_size.max(1),
        }
    }

    pub fn context(&self) -> &Context<S> {
        &self.ctx
    }

    /// Check every item of a profile, one after another.
    ///
    /// # Errors
    ///
    /// - Return [`ProfileError::NotFound`] if profile does not exist.
    #[instrument(skip(self, document), level = "debug")]
    pub async fn check_profile(
        &self,
        document: &ConfigDocument,
        profile: &str,
    ) -> Result<Vec<ItemStatus>, ProfileError> {
        let resolved = profile::resolve(document, profile)?;
        let mut statuses = Vec::new();

        for name in &resolved.pre_install {
            statuses.extend(self.check_task_item(document, name).await);
        }

        for name in &resolved.packages {
            statuses.extend(self.check_package_item(document, name).await);
        }

        Ok(statuses)
    }

    /// Check every item of a profile concurrently.
    ///
    /// Result order is the same as for [`Runner::check_profile`].
    ///
    /// # Errors
    ///
    /// - Return [`ProfileError::NotFound`] if profile does not exist.
    #[instrument(skip(self, document), level = "debug")]
    pub async fn check_profile_parallel(
        &self,
        document: &ConfigDocument,
        profile: &str,
    ) -> Result<Vec<ItemStatus>, ProfileError> {
        let resolved = profile::resolve(document, profile)?;

        let tasks = join_all(
            resolved
                .pre_install
                .iter()
                .map(|name| self.check_task_item(document, name)),
        );
        let packages = join_all(
            resolved
                .packages
                .iter()
                .map(|name| self.check_package_item(document, name)),
        );
        let (tasks, packages) = futures::join!(tasks, packages);

        Ok(tasks.into_iter().chain(packages).flatten().collect())
    }

    /// Install every item of a profile.
    ///
    /// Returns true if every item ended up installed.
    ///
    /// # Errors
    ///
    /// - Return [`ProfileError::NotFound`] if profile does not exist.
    #[instrument(skip(self, document, progress), level = "debug")]
    pub async fn install_profile(
        &self,
        document: &ConfigDocument,
        profile: &str,
        progress: &Progress,
    ) -> Result<bool, ProfileError> {
        let resolved = profile::resolve(document, profile)?;
        let log = self.ctx.log();
        log.begin(format!("install --profile {profile}{}", self.dry_run_flag()));

        let mut success = true;

        log.append("=== Pre-install tasks ===");
        for name in &resolved.pre_install {
            success &= self.install_task_item(document, name, progress).await;
        }

        log.append("=== Packages ===");
        let mut packages = resolved.packages;
        packages.sort();
        for (index, batch) in packages.chunks(self.batch_size).enumerate() {
            debug!("install batch {index}: {batch:?}");
            let results = join_all(
                batch
                    .iter()
                    .map(|name| self.install_package_item(document, name, progress)),
            )
            .await;

            // INVARIANT: A failed batch never stops later batches.
            success &= results.into_iter().all(|ok| ok);
        }

        log.finish(success);
        info!("install of profile {profile} finished, success: {success}");
        Ok(success)
    }

    /// Uninstall every item of a profile.
    ///
    /// Returns true if every package was uninstalled and every preference was
    /// reverted.
    ///
    /// # Errors
    ///
    /// - Return [`ProfileError::NotFound`] if profile does not exist.
    #[instrument(skip(self, document, progress), level = "debug")]
    pub async fn uninstall_profile(
        &self,
        document: &ConfigDocument,
        profile: &str,
        progress: &Progress,
    ) -> Result<bool, ProfileError> {
        let resolved = profile::resolve(document, profile)?;
        let log = self.ctx.log();
        log.begin(format!("uninstall --profile {profile}{}", self.dry_run_flag()));

        let mut success = true;

        log.append("=== Uninstalling packages ===");
        let mut packages = resolved.packages;
        packages.sort_by(|a, b| b.cmp(a));
        for batch in packages.chunks(self.batch_size) {
            let results = join_all(
                batch
                    .iter()
                    .map(|name| self.uninstall_package_item(document, name, progress)),
            )
            .await;
            success &= results.into_iter().all(|ok| ok);
        }

        log.append("=== Removing pre-install settings ===");
        for name in &resolved.pre_install {
            success &= self.uninstall_task_item(document, name, progress).await;
        }

        log.finish(success);
        info!("uninstall of profile {profile} finished, success: {success}");
        Ok(success)
    }

    /// Install a single package by name, outside of any profile.
    ///
    /// Unlike profile runs, a missing definition or handler is a failure.
    #[instrument(skip(self, document, progress), level = "debug")]
    pub async fn install_package(
        &self,
        document: &ConfigDocument,
        name: &str,
        progress: &Progress,
    ) -> bool {
        let log = self.ctx.log();
        log.begin(format!("install-package {name}{}", self.dry_run_flag()));
        progress.working(name, "Checking...");

        let Some(package) = document.packages.get(name) else {
            progress.error(name, "No config");
            log.append(format!("No config for package {name}"));
            log.finish(false);
            return false;
        };

        if package.provider.is_none() {
            progress.error(name, "No handler");
            log.append(format!("No handler for package {name}"));
            log.finish(false);
            return false;
        }

        let success = self.reconcile_package(package, name, progress).await;
        log.finish(success);
        success
    }

    async fn check_task_item(&self, document: &ConfigDocument, name: &str) -> Vec<ItemStatus> {
        let Some(task) = document.pre_install.get(name) else {
            return vec![ItemStatus::new(
                name,
                None,
                CheckResult::error("No config"),
                ItemKind::PreInstall,
            )];
        };

        let result = self.ctx.check_task(&task.provider, name).await;
        let mut statuses = vec![ItemStatus::new(
            name,
            task.description.as_deref(),
            result,
            ItemKind::PreInstall,
        )];
        if let Some(link) = &task.config {
            let result = self.ctx.check_symlink(link, name).await;
            statuses.push(ItemStatus::symlink(name, link, result));
        }

        statuses
    }

    async fn check_package_item(&self, document: &ConfigDocument, name: &str) -> Vec<ItemStatus> {
        let Some(package) = document.packages.get(name) else {
            return vec![ItemStatus::new(
                name,
                None,
                CheckResult::error("No config"),
                ItemKind::Package,
            )];
        };

        let description = package.description.as_deref();
        let Some(provider) = &package.provider else {
            return vec![ItemStatus::new(
                name,
                description,
                CheckResult::error("No handler found"),
                ItemKind::Package,
            )];
        };

        let result = self.ctx.check_package(provider, name).await;
        let mut statuses = vec![ItemStatus::new(name, description, result, ItemKind::Package)];
        if let Some(link) = &package.config {
            let result = self.ctx.check_symlink(link, name).await;
            statuses.push(ItemStatus::symlink(name, link, result));
        }

        statuses
    }

    async fn install_task_item(
        &self,
        document: &ConfigDocument,
        name: &str,
        progress: &Progress,
    ) -> bool {
        progress.working(name, "Checking...");
        let Some(task) = document.pre_install.get(name) else {
            progress.error(name, "No config");
            self.ctx
                .log()
                .append(format!("No config for pre-install task {name}"));
            return true;
        };

        self.reconcile_task(task, name, progress).await
    }

    async fn reconcile_task(&self, task: &PreInstallTask, name: &str, progress: &Progress) -> bool {
        let check = self.ctx.check_task(&task.provider, name).await;
        let success = match check.status {
            Status::Installed => {
                progress.done(name, "Already installed");
                true
            }
            // INVARIANT: Only preference check errors fail the run. Other tasks
            // are installed regardless.
            Status::Error if select_pre_install_handler(task) == HandlerKind::Defaults => {
                progress.error(name, &check.message);
                self.ctx
                    .log()
                    .append(format!("Cannot install {name}: {}", check.message));
                false
            }
            Status::Error | Status::NotInstalled | Status::Modified => {
                if check.status == Status::Error {
                    self.ctx
                        .log()
                        .append(format!("Check failed for {name}: {}", check.message));
                }
                progress.working(name, "Installing...");
                let ok = self.ctx.install_task(&task.provider, name).await;
                self.report_install(name, ok, progress);
                ok
            }
        };

        if let Some(link) = &task.config {
            self.reconcile_symlink(link, name).await;
        }

        success
    }

    async fn install_package_item(
        &self,
        document: &ConfigDocument,
        name: &str,
        progress: &Progress,
    ) -> bool {
        progress.working(name, "Checking...");
        let Some(package) = document.packages.get(name) else {
            progress.error(name, "No config");
            self.ctx
                .log()
                .append(format!("No config for package {name}"));
            return true;
        };

        if package.provider.is_none() {
            progress.error(name, "No handler");
            self.ctx
                .log()
                .append(format!("No handler for package {name}"));
            return true;
        }

        self.reconcile_package(package, name, progress).await
    }

    async fn reconcile_package(&self, package: &Package, name: &str, progress: &Progress) -> bool {
        let Some(provider) = &package.provider else {
            return false;
        };

        let check = self.ctx.check_package(provider, name).await;
        let success = match check.status {
            Status::Installed => {
                progress.done(name, "Already installed");
                true
            }
            Status::Error => {
                progress.error(name, &check.message);
                self.ctx
                    .log()
                    .append(format!("Cannot install {name}: {}", check.message));
                false
            }
            Status::NotInstalled | Status::Modified => {
                progress.working(name, "Installing...");
                let ok = self.ctx.install_package(provider, name).await;
                self.report_install(name, ok, progress);
                ok
            }
        };

        if let Some(link) = &package.config {
            self.reconcile_symlink(link, name).await;
        }

        success
    }

    /// Link whenever the link is not in place, no matter how the item fared.
    async fn reconcile_symlink(&self, link: &SymlinkConfig, name: &str) {
        let check = self.ctx.check_symlink(link, name).await;
        if check.status != Status::Installed {
            self.ctx.install_symlink(link, name).await;
        }
    }

    async fn uninstall_package_item(
        &self,
        document: &ConfigDocument,
        name: &str,
        progress: &Progress,
    ) -> bool {
        progress.working(name, "Checking...");
        let Some(package) = document.packages.get(name) else {
            progress.done(name, "No config");
            return true;
        };

        if let Some(link) = &package.config {
            self.ctx.uninstall_symlink(link, name).await;
        }

        let Some(provider) = &package.provider else {
            progress.done(name, "No handler");
            return true;
        };

        let check = self.ctx.check_package(provider, name).await;
        if check.status == Status::NotInstalled {
            progress.done(name, "Not installed");
            return true;
        }

        progress.working(name, "Uninstalling...");
        let ok = self.ctx.uninstall_package(provider, name).await;
        if ok {
            progress.done(name, self.past_tense("Uninstalled", "Would uninstall"));
        } else {
            progress.error(name, "Failed");
        }

        ok
    }

    async fn uninstall_task_item(
        &self,
        document: &ConfigDocument,
        name: &str,
        progress: &Progress,
    ) -> bool {
        let Some(task) = document.pre_install.get(name) else {
            return true;
        };

        if let Some(link) = &task.config {
            self.ctx.uninstall_symlink(link, name).await;
        }

        // INVARIANT: Scripts and directories are never reverted.
        if select_pre_install_handler(task) != HandlerKind::Defaults {
            return true;
        }

        progress.working(name, "Removing...");
        let ok = self.ctx.uninstall_task(&task.provider, name).await;
        if ok {
            progress.done(name, self.past_tense("Removed", "Would remove"));
        } else {
            progress.error(name, "Failed");
        }

        ok
    }

    fn report_install(&self, name: &str, ok: bool, progress: &Progress) {
        if ok {
            progress.done(name, self.past_tense("Installed", "Would install"));
        } else {
            progress.error(name, "Failed");
        }
    }

    fn past_tense<'a>(&self, real: &'a str, simulated: &'a str) -> &'a str {
        if self.ctx.is_dry_run() {
            simulated
        } else {
            real
        }
    }

    fn dry_run_flag(&self) -> &'static str {
        if self.ctx.is_dry_run() {
            " --dry-run"
        } else {
            ""
        }
    }
}
