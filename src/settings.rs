// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tool settings layout.
//!
//! Dots reads an optional settings file to figure out where the managed
//! dotfiles directory lives, where the package configuration document and the
//! install log sit inside of it, and how the orchestrator should behave. Every
//! field is optional, so an empty or missing settings file is perfectly valid.
//!
//! # General Layout
//!
//! ```toml
//! dotfiles_dir = "~/.dotfiles"
//! config_file = "packages.json"
//! log_file = ".dots-install.log"
//! batch_size = 5
//! shell = "/bin/bash"
//! purchase_trigger = "purchase"
//! ```
//!
//! Relative `config_file` and `log_file` paths are resolved against the
//! dotfiles directory. The `DOTFILES_DIR` environment variable always wins
//! over the `dotfiles_dir` field.

use crate::path::{default_dotfiles_dir, resolve_against};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Default number of packages reconciled concurrently.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Default shell used to run package commands.
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Default app store failure text that means "buy it first".
pub const DEFAULT_PURCHASE_TRIGGER: &str = "purchase";

/// Settings file layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Managed dotfiles directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dotfiles_dir: Option<PathBuf>,

    /// Package configuration document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,

    /// Durable install log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Amount of packages to reconcile at the same time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Shell to run package commands through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,

    /// Failure text of the app store installer that triggers a purchase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_trigger: Option<String>,
}

impl Settings {
    /// Load settings from target path.
    ///
    /// A missing settings file is not an error, default settings are used
    /// instead.
    ///
    /// # Errors
    ///
    /// - Return [`SettingsError::Read`] if file exists but cannot be read.
    /// - Return [`SettingsError::Deserialize`] if file contents are malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_to_string(path) {
            Ok(data) => data.parse(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no settings file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(SettingsError::Read {
                source: err,
                path: path.to_path_buf(),
            }),
        }
    }

    /// Resolve settings into concrete values.
    ///
    /// Takes `DOTFILES_DIR` from the environment if it is set.
    ///
    /// # Errors
    ///
    /// - Return [`SettingsError::NoWayHome`] if no dotfiles directory was
    ///   configured and the home directory cannot be determined.
    pub fn resolve(&self) -> Result<Resolved> {
        let env_dir = std::env::var_os("DOTFILES_DIR").map(PathBuf::from);
        self.resolve_with(env_dir)
    }

    fn resolve_with(&self, env_dir: Option<PathBuf>) -> Result<Resolved> {
        let dotfiles_dir = match env_dir.or_else(|| self.dotfiles_dir.clone()) {
            Some(dir) => dir,
            None => default_dotfiles_dir()?,
        };

        let config_file = resolve_against(
            &dotfiles_dir,
            self.config_file
                .as_deref()
                .unwrap_or_else(|| Path::new("packages.json")),
        );
        let log_file = resolve_against(
            &dotfiles_dir,
            self.log_file
                .as_deref()
                .unwrap_or_else(|| Path::new(".dots-install.log")),
        );

        Ok(Resolved {
            dotfiles_dir,
            config_file,
            log_file,
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
            shell: self
                .shell
                .clone()
                .unwrap_or_else(|| DEFAULT_SHELL.to_string()),
            purchase_trigger: self
                .purchase_trigger
                .clone()
                .unwrap_or_else(|| DEFAULT_PURCHASE_TRIGGER.to_string()),
        })
    }
}

impl FromStr for Settings {
    type Err = SettingsError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(SettingsError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        for path in [
            &mut settings.dotfiles_dir,
            &mut settings.config_file,
            &mut settings.log_file,
        ]
        .into_iter()
        .flatten()
        {
            *path = PathBuf::from(
                shellexpand::full(&path.to_string_lossy())
                    .map_err(SettingsError::ShellExpansion)?
                    .into_owned(),
            );
        }

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(SettingsError::Serialize)?
                .as_str(),
        )
    }
}

/// Fully resolved settings.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Resolved {
    pub dotfiles_dir: PathBuf,
    pub config_file: PathBuf,
    pub log_file: PathBuf,
    pub batch_size: usize,
    pub shell: String,
    pub purchase_trigger: String,
}

/// Settings error types.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Failed to read settings file.
    #[error("failed to read settings file {path:?}")]
    Read {
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize settings.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize settings.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on settings.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// No dotfiles directory could be determined.
    #[error(transparent)]
    NoWayHome(#[from] crate::path::NoWayHome),
}

impl From<SettingsError> for FmtError {
    fn from(_: SettingsError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = SettingsError> = std::result::Result<T, E>;
