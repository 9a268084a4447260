// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Handler registry and capability detection.
//!
//! Package and pre-install entries do not name their provider. Instead, the
//! provider is figured out from the shape of the entry, i.e., which fields it
//! carries. Shapes are not mutually exclusive, so detection follows a fixed
//! precedence and the first match wins.
//!
//! # Package Precedence
//!
//! 1. Formula/cask manager: a `brew` string field.
//! 2. App store installer: a numeric `mas` field.
//! 3. Global package manager: an `npm` string field.
//! 4. Nothing, i.e., no handler.
//!
//! # Pre-install Precedence
//!
//! An explicit `provider` tag is authoritative and skips detection entirely.
//! Otherwise:
//!
//! 1. Preference writer: both `domain` and `key` fields.
//! 2. Directory manager: a `path` or `paths` field.
//! 3. Script runner: any of `check`, `install`, `command`, or `run`.
//! 4. Script runner, no matter what.
//!
//! Pre-install tasks therefore always have a handler.

use crate::config::{
    Package, PackageProvider, PreInstallTask, ProviderTag, TaskProvider,
};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Identity of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Brew,
    Mas,
    Npm,
    Defaults,
    Directory,
    Script,
}

impl Display for HandlerKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Brew => "brew",
            Self::Mas => "mas",
            Self::Npm => "npm",
            Self::Defaults => "defaults",
            Self::Directory => "directory",
            Self::Script => "script",
        };
        fmt.write_str(name)
    }
}

impl From<&PackageProvider> for HandlerKind {
    fn from(provider: &PackageProvider) -> Self {
        match provider {
            PackageProvider::Brew(_) => Self::Brew,
            PackageProvider::Mas(_) => Self::Mas,
            PackageProvider::Npm(_) => Self::Npm,
        }
    }
}

impl From<&TaskProvider> for HandlerKind {
    fn from(provider: &TaskProvider) -> Self {
        match provider {
            TaskProvider::Defaults(_) => Self::Defaults,
            TaskProvider::Directory(_) => Self::Directory,
            TaskProvider::Script(_) => Self::Script,
        }
    }
}

/// Select handler for a package, if any shape matched.
pub fn select_package_handler(package: &Package) -> Option<HandlerKind> {
    package.provider.as_ref().map(HandlerKind::from)
}

/// Select handler for a pre-install task.
pub fn select_pre_install_handler(task: &PreInstallTask) -> HandlerKind {
    HandlerKind::from(&task.provider)
}

/// Display name of the handler managing a package.
pub fn handler_name(package: &Package) -> &'static str {
    match &package.provider {
        Some(PackageProvider::Brew(config)) if config.is_cask() => "brew cask",
        Some(PackageProvider::Brew(_)) => "brew",
        Some(PackageProvider::Mas(_)) => "mas",
        Some(PackageProvider::Npm(_)) => "npm",
        None => "unknown",
    }
}

/// Detect the provider shape of a package entry.
///
/// # Errors
///
/// - Return [`ShapeError`] if a shape matched, but the rest of its fields are
///   malformed.
pub fn detect_package_provider(fields: &Map<String, Value>) -> Result<Option<PackageProvider>> {
    if fields.get("brew").is_some_and(Value::is_string) {
        return parse_shape(fields, HandlerKind::Brew).map(|c| Some(PackageProvider::Brew(c)));
    }

    if fields.get("mas").is_some_and(Value::is_u64) {
        return parse_shape(fields, HandlerKind::Mas).map(|c| Some(PackageProvider::Mas(c)));
    }

    if fields.get("npm").is_some_and(Value::is_string) {
        return parse_shape(fields, HandlerKind::Npm).map(|c| Some(PackageProvider::Npm(c)));
    }

    Ok(None)
}

/// Detect the provider shape of a pre-install task entry.
///
/// # Errors
///
/// - Return [`ShapeError`] if the chosen shape has malformed fields.
pub fn detect_task_provider(
    tag: Option<ProviderTag>,
    fields: &Map<String, Value>,
) -> Result<TaskProvider> {
    let kind = match tag {
        Some(ProviderTag::Defaults) => HandlerKind::Defaults,
        Some(ProviderTag::Directory) => HandlerKind::Directory,
        Some(ProviderTag::Script) => HandlerKind::Script,
        None if has(fields, &["domain"]) && has(fields, &["key"]) => HandlerKind::Defaults,
        None if has(fields, &["path", "paths"]) => HandlerKind::Directory,
        None if has(fields, &["check", "install", "command", "run"]) => HandlerKind::Script,
        None => HandlerKind::Script,
    };

    match kind {
        HandlerKind::Defaults => parse_shape(fields, kind).map(TaskProvider::Defaults),
        HandlerKind::Directory => parse_shape(fields, kind).map(TaskProvider::Directory),
        _ => parse_shape(fields, HandlerKind::Script).map(TaskProvider::Script),
    }
}

fn has(fields: &Map<String, Value>, any_of: &[&str]) -> bool {
    any_of.iter().any(|field| fields.contains_key(*field))
}

fn parse_shape<T>(fields: &Map<String, Value>, kind: HandlerKind) -> Result<T>
where
    T: DeserializeOwned,
{
    serde_json::from_value(Value::Object(fields.clone()))
        .map_err(|source| ShapeError { kind, source })
}

/// Entry matched a provider shape, but its fields are malformed.
#[derive(Debug, thiserror::Error)]
#[error("invalid {kind} config: {source}")]
pub struct ShapeError {
    pub kind: HandlerKind,
    pub source: serde_json::Error,
}

/// Friendly result alias :3
type Result<T, E = ShapeError> = std::result::Result<T, E>;
