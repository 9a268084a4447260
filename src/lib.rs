// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Declarative package reconciliation for dotfiles.
//!
//! Dots keeps a machine in the state described by a single configuration
//! document inside of the dotfiles directory. The document names packages,
//! pre-install tasks, and profiles that group them together.
//!
//! # Profiles
//!
//! A __profile__ is a named selection of packages and pre-install tasks that
//! may inherit from other profiles. Resolving a profile flattens its whole
//! inheritance chain into two ordered lists without duplicates. See
//! [`profile`] for the exact ordering rules.
//!
//! # Handlers
//!
//! Every package and pre-install task is managed by exactly one __handler__,
//! picked from the shape of its configuration entry. Handlers know how to
//! check, install, and uninstall their items by shelling out to the right
//! tool, e.g., Homebrew for formulas or `defaults` for macOS preferences.
//! See [`registry`] for how handlers are picked, and [`handler`] for what each
//! handler does.
//!
//! # Reconciliation
//!
//! The [`Runner`] drives a resolved profile through the handlers. It runs
//! pre-install tasks strictly in order, then packages in concurrent batches,
//! and records everything it does in a durable [`InstallLog`].

pub mod backup;
pub mod config;
pub mod handler;
pub mod inventory;
pub mod log;
pub mod path;
pub mod profile;
pub mod registry;
pub mod runner;
pub mod settings;
pub mod shell;
pub mod store;

#[doc(inline)]
pub use config::{ConfigDocument, Package, PreInstallTask, Profile};

#[doc(inline)]
pub use handler::{CheckResult, Context, Status};

#[doc(inline)]
pub use log::InstallLog;

#[doc(inline)]
pub use profile::ResolvedProfile;

#[doc(inline)]
pub use runner::{ItemStatus, Progress, ProgressItem, ProgressState, Runner};

#[doc(inline)]
pub use settings::Settings;

#[doc(inline)]
pub use shell::{Shell, SystemShell};

#[doc(inline)]
pub use store::ConfigStore;
