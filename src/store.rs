// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration store management and manipulation.
//!
//! Dots keeps every package, pre-install task, and profile in one JSON document
//! called the __configuration store__. The store lives inside of the dotfiles
//! directory, by default at `packages.json`, so it is versioned right alongside
//! the dotfiles it describes.
//!
//! # Caching
//!
//! The document is read lazily on first access and cached afterwards. Saving
//! through the store refreshes the cache. Edits made by other processes are
//! only picked up after [`ConfigStore::invalidate`].

use crate::{
    config::{ConfigDocument, ConfigError, Package, PreInstallTask, Profile},
    profile::{self, ProfileError, ResolvedProfile},
};

use std::{
    collections::BTreeSet,
    fs::{read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{debug, instrument};

/// Package configuration document backed by a file.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    cache: Mutex<Option<Arc<ConfigDocument>>>,
}

impl ConfigStore {
    /// Open configuration store at target path.
    ///
    /// Nothing is read until the document is first needed.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    /// Path to backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load configuration document.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::ConfigNotFound`] if backing file does not exist.
    /// - Return [`StoreError::Read`] if backing file cannot be read.
    /// - Return [`StoreError::Config`] if document is malformed.
    #[instrument(skip(self), level = "debug")]
    pub fn load(&self) -> Result<Arc<ConfigDocument>> {
        let mut cache = self.lock();
        if let Some(document) = cache.as_ref() {
            return Ok(Arc::clone(document));
        }

        debug!("read configuration document {}", self.path.display());
        let data = read_to_string(&self.path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => StoreError::ConfigNotFound {
                path: self.path.clone(),
            },
            _ => StoreError::Read {
                source: err,
                path: self.path.clone(),
            },
        })?;

        let document = Arc::new(data.parse::<ConfigDocument>()?);
        *cache = Some(Arc::clone(&document));

        Ok(document)
    }

    /// Forget cached document.
    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    /// Write document to backing file, and cache it.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Write`] if backing file cannot be written.
    #[instrument(skip(self, document), level = "debug")]
    pub fn save(&self, document: ConfigDocument) -> Result<()> {
        write(&self.path, document.to_string()).map_err(|err| StoreError::Write {
            source: err,
            path: self.path.clone(),
        })?;
        *self.lock() = Some(Arc::new(document));

        Ok(())
    }

    pub fn package(&self, name: &str) -> Result<Option<Package>> {
        Ok(self.load()?.packages.get(name).cloned())
    }

    pub fn pre_install(&self, name: &str) -> Result<Option<PreInstallTask>> {
        Ok(self.load()?.pre_install.get(name).cloned())
    }

    pub fn profile(&self, name: &str) -> Result<Option<Profile>> {
        Ok(self.load()?.profiles.get(name).cloned())
    }

    pub fn profile_names(&self) -> Result<Vec<String>> {
        Ok(self.load()?.profiles.keys().cloned().collect())
    }

    pub fn package_names(&self) -> Result<Vec<String>> {
        Ok(self.load()?.packages.keys().cloned().collect())
    }

    pub fn pre_install_names(&self) -> Result<Vec<String>> {
        Ok(self.load()?.pre_install.keys().cloned().collect())
    }

    /// Resolve profile with everything it inherits.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Profile`] if profile does not exist.
    pub fn resolve_profile(&self, name: &str) -> Result<ResolvedProfile> {
        let document = self.load()?;
        Ok(profile::resolve(document.as_ref(), name)?)
    }

    /// Every package that any profile ends up with.
    pub fn tracked_packages(&self) -> Result<BTreeSet<String>> {
        let document = self.load()?;
        Ok(profile::tracked_packages(document.as_ref()))
    }

    /// Insert or replace package definition.
    pub fn add_package(&self, name: impl Into<String>, package: Package) -> Result<()> {
        let mut document = self.edit()?;
        document.packages.insert(name.into(), package);
        self.save(document)
    }

    /// Remove package definition, and drop it from every profile.
    ///
    /// Returns false if there was no such package.
    pub fn remove_package(&self, name: &str) -> Result<bool> {
        let mut document = self.edit()?;
        if document.packages.remove(name).is_none() {
            return Ok(false);
        }

        for profile in document.profiles.values_mut() {
            if let Some(packages) = profile.packages.as_mut() {
                packages.retain(|package| package != name);
            }
        }

        self.save(document)?;
        Ok(true)
    }

    /// Append package to profile, unless it is already listed.
    ///
    /// Returns false if there was no such profile.
    pub fn add_package_to_profile(&self, package: &str, profile: &str) -> Result<bool> {
        let mut document = self.edit()?;
        let Some(entry) = document.profiles.get_mut(profile) else {
            return Ok(false);
        };

        let packages = entry.packages.get_or_insert_with(Vec::new);
        if packages.iter().any(|name| name == package) {
            return Ok(true);
        }

        packages.push(package.to_string());
        self.save(document)?;
        Ok(true)
    }

    /// Remove package from profile.
    ///
    /// Returns false, without writing anything, if there was no such profile
    /// or the profile does not list the package.
    pub fn remove_package_from_profile(&self, package: &str, profile: &str) -> Result<bool> {
        let mut document = self.edit()?;
        let Some(packages) = document
            .profiles
            .get_mut(profile)
            .and_then(|entry| entry.packages.as_mut())
        else {
            return Ok(false);
        };

        let before = packages.len();
        packages.retain(|name| name != package);
        if packages.len() == before {
            return Ok(false);
        }

        self.save(document)?;
        Ok(true)
    }

    fn edit(&self) -> Result<ConfigDocument> {
        let document = self.load()?;
        Ok(ConfigDocument::clone(document.as_ref()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<ConfigDocument>>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// All possible error types for configuration store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backing file does not exist.
    #[error("config file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Backing file cannot be read.
    #[error("failed to read config file {}", path.display())]
    Read {
        source: std::io::Error,
        path: PathBuf,
    },

    /// Backing file cannot be written.
    #[error("failed to write config file {}", path.display())]
    Write {
        source: std::io::Error,
        path: PathBuf,
    },

    /// Document is malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Profile resolution failed.
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// Friendly result alias :3
type Result<T, E = StoreError> = std::result::Result<T, E>;
