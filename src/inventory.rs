// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Inventory of what the formula manager already has installed.
//!
//! Used to spot software that was installed by hand and never made it into
//! any profile, and to adopt such software into the configuration store.

use crate::{
    config::{BrewConfig, ConfigDocument, Package, PackageProvider},
    handler::brew::{installed_casks, installed_formulas},
    profile::tracked_packages,
    shell::Shell,
    store::{ConfigStore, StoreError},
};

use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::info;

/// Kind of installed formula manager package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstalledKind {
    Formula,
    Cask,
}

impl Display for InstalledKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Formula => fmt.write_str("formula"),
            Self::Cask => fmt.write_str("cask"),
        }
    }
}

/// Package found on the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Installed {
    pub name: String,
    pub kind: InstalledKind,
}

/// Every installed top-level formula and cask.
pub async fn installed(shell: &impl Shell) -> Vec<Installed> {
    let (formulas, casks) = futures::join!(installed_formulas(shell), installed_casks(shell));

    formulas
        .into_iter()
        .map(|name| Installed {
            name,
            kind: InstalledKind::Formula,
        })
        .chain(casks.into_iter().map(|name| Installed {
            name,
            kind: InstalledKind::Cask,
        }))
        .collect()
}

/// Installed packages that no profile references, sorted by name.
pub fn untracked(document: &ConfigDocument, installed: Vec<Installed>) -> Vec<Installed> {
    let tracked = tracked_packages(document);
    let mut untracked = installed
        .into_iter()
        .filter(|item| !tracked.contains(&item.name))
        .collect::<Vec<_>>();
    untracked.sort_by(|a, b| a.name.cmp(&b.name));
    untracked
}

/// Add a package entry for every installed package that has none yet.
///
/// New entries are not added to any profile. Returns the names added.
pub fn adopt(document: &mut ConfigDocument, installed: &[Installed]) -> Vec<String> {
    let mut added = Vec::new();
    for item in installed {
        if document.packages.contains_key(&item.name) {
            continue;
        }

        let config = BrewConfig {
            brew: item.name.clone(),
            cask: (item.kind == InstalledKind::Cask).then_some(true),
            ..Default::default()
        };
        document
            .packages
            .insert(item.name.clone(), Package::new(PackageProvider::Brew(config)));
        added.push(item.name.clone());
    }

    added
}

/// Adopt everything installed into the configuration store.
///
/// # Errors
///
/// - Return [`StoreError`] if the store cannot be loaded or saved.
pub async fn snapshot(shell: &impl Shell, store: &ConfigStore) -> Result<Vec<String>, StoreError> {
    let installed = installed(shell).await;
    let current = store.load()?;
    let mut document = ConfigDocument::clone(current.as_ref());
    let added = adopt(&mut document, &installed);

    if !added.is_empty() {
        store.save(document)?;
    }
    info!("adopted {} installed packages", added.len());

    Ok(added)
}
