// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the package configuration document to simplify the
//! process of serialization and deserialization. File I/O is left to the
//! caller to figure out, see [`ConfigStore`](crate::store::ConfigStore).
//!
//! # General Layout
//!
//! The configuration document is a JSON object composed of three named
//! mappings, and an optional version tag:
//!
//! ```json
//! {
//!   "version": "1",
//!   "packages": {
//!     "ripgrep": { "description": "grep, but fast", "brew": "ripgrep" },
//!     "alacritty": {
//!       "brew": "alacritty",
//!       "cask": true,
//!       "config": { "source": "alacritty", "destination": "~/.config/alacritty" }
//!     }
//!   },
//!   "pre-install": {
//!     "dock-autohide": { "domain": "com.apple.dock", "key": "autohide", "value": true }
//!   },
//!   "profiles": {
//!     "base": { "packages": ["ripgrep"], "pre-install": ["dock-autohide"] },
//!     "personal": { "base": "@base", "packages": ["alacritty"] }
//!   }
//! }
//! ```
//!
//! # Provider Shapes
//!
//! Each package and pre-install entry embeds exactly one provider shape at the
//! top level of the entry. The shape is not tagged, so it is detected while
//! parsing. See [`registry`](crate::registry) for the detection order. Every
//! entry is assigned to exactly one provider variant, or to none at all for
//! packages that match no known shape.
//!
//! Fields that dots does not understand are kept around as-is, so loading and
//! saving a document never drops anything the user wrote.

use crate::registry::{detect_package_provider, detect_task_provider, ShapeError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::BTreeMap,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Package configuration document.
#[derive(Default, Debug, Clone, Deserialize, Serialize)]
pub struct ConfigDocument {
    /// Version tag of document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// All known packages by name.
    #[serde(default)]
    pub packages: BTreeMap<String, Package>,

    /// All known pre-install tasks by name.
    #[serde(default, rename = "pre-install")]
    pub pre_install: BTreeMap<String, PreInstallTask>,

    /// All known profiles by name.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl FromStr for ConfigDocument {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(data).map_err(ConfigError::Deserialize)
    }
}

impl Display for ConfigDocument {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let mut data = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        data.push('\n');
        fmt.write_str(data.as_str())
    }
}

/// Package definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(try_from = "RawPackage", into = "RawPackage")]
pub struct Package {
    /// Brief description of package.
    pub description: Option<String>,

    /// Detected provider shape, or nothing if the entry matches no shape.
    pub provider: Option<PackageProvider>,

    /// Optional symlink to manage alongside the package.
    pub config: Option<SymlinkConfig>,

    fields: Map<String, Value>,
}

impl Package {
    /// Construct new package from a provider shape.
    pub fn new(provider: PackageProvider) -> Self {
        Self {
            description: None,
            provider: Some(provider),
            config: None,
            fields: Map::new(),
        }
    }

    /// Attach description to package.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach symlink configuration to package.
    pub fn with_symlink(mut self, config: SymlinkConfig) -> Self {
        self.config = Some(config);
        self
    }
}

#[derive(Deserialize, Serialize)]
struct RawPackage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    config: Option<SymlinkConfig>,

    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl TryFrom<RawPackage> for Package {
    type Error = ShapeError;

    fn try_from(raw: RawPackage) -> Result<Self, Self::Error> {
        Ok(Self {
            provider: detect_package_provider(&raw.fields)?,
            description: raw.description,
            config: raw.config,
            fields: raw.fields,
        })
    }
}

impl From<Package> for RawPackage {
    fn from(package: Package) -> Self {
        let mut fields = package.fields;
        if let Some(provider) = &package.provider {
            merge_fields(&mut fields, provider.to_fields());
        }

        Self {
            description: package.description,
            config: package.config,
            fields,
        }
    }
}

/// Pre-install task definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(try_from = "RawTask", into = "RawTask")]
pub struct PreInstallTask {
    /// Brief description of task.
    pub description: Option<String>,

    /// Explicit provider tag that overrides shape detection.
    pub provider_tag: Option<ProviderTag>,

    /// Detected, or explicitly tagged, provider shape.
    pub provider: TaskProvider,

    /// Optional symlink to manage alongside the task.
    pub config: Option<SymlinkConfig>,

    fields: Map<String, Value>,
}

impl PreInstallTask {
    /// Construct new pre-install task from a provider shape.
    pub fn new(provider: TaskProvider) -> Self {
        Self {
            description: None,
            provider_tag: None,
            provider,
            config: None,
            fields: Map::new(),
        }
    }
}

#[derive(Deserialize, Serialize)]
struct RawTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider: Option<ProviderTag>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    config: Option<SymlinkConfig>,

    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl TryFrom<RawTask> for PreInstallTask {
    type Error = ShapeError;

    fn try_from(raw: RawTask) -> Result<Self, Self::Error> {
        Ok(Self {
            provider: detect_task_provider(raw.provider, &raw.fields)?,
            provider_tag: raw.provider,
            description: raw.description,
            config: raw.config,
            fields: raw.fields,
        })
    }
}

impl From<PreInstallTask> for RawTask {
    fn from(task: PreInstallTask) -> Self {
        let mut fields = task.fields;
        merge_fields(&mut fields, task.provider.to_fields());

        Self {
            description: task.description,
            provider: task.provider_tag,
            config: task.config,
            fields,
        }
    }
}

fn merge_fields(fields: &mut Map<String, Value>, shape: Result<Value, serde_json::Error>) {
    // INVARIANT: Typed provider fields win over whatever was read from disk.
    if let Ok(Value::Object(shape)) = shape {
        fields.extend(shape);
    }
}

/// Explicit provider tag of a pre-install task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    Script,
    Directory,
    Defaults,
}

/// Provider shapes a package can take.
#[derive(Debug, Clone, PartialEq)]
pub enum PackageProvider {
    Brew(BrewConfig),
    Mas(MasConfig),
    Npm(NpmConfig),
}

impl PackageProvider {
    fn to_fields(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Brew(config) => serde_json::to_value(config),
            Self::Mas(config) => serde_json::to_value(config),
            Self::Npm(config) => serde_json::to_value(config),
        }
    }
}

/// Provider shapes a pre-install task can take.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskProvider {
    Defaults(DefaultsConfig),
    Directory(DirectoryConfig),
    Script(ScriptConfig),
}

impl TaskProvider {
    fn to_fields(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Defaults(config) => serde_json::to_value(config),
            Self::Directory(config) => serde_json::to_value(config),
            Self::Script(config) => serde_json::to_value(config),
        }
    }
}

/// Formula/cask manager shape.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BrewConfig {
    /// Formula or cask name.
    pub brew: String,

    /// Treat package as a cask instead of a formula.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cask: Option<bool>,

    /// Repository tap to register before installing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tap: Option<String>,

    /// Extra arguments appended to the install command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,

    /// Command to run after a successful install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_install: Option<String>,
}

impl BrewConfig {
    pub fn is_cask(&self) -> bool {
        self.cask == Some(true)
    }
}

/// App store installer shape.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MasConfig {
    /// Numeric app identifier.
    pub mas: u64,
}

/// Global package manager shape.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NpmConfig {
    /// Global package name.
    pub npm: String,

    /// Extra arguments appended to the install command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// OS preference writer shape.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DefaultsConfig {
    /// Preference domain, e.g., "com.apple.dock".
    pub domain: String,

    /// Preference key inside of domain.
    pub key: String,

    /// Explicit value type, detected from value when absent.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<DefaultsType>,

    /// Expected value.
    pub value: Value,
}

/// Value types the preference writer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultsType {
    Bool,
    String,
    Int,
    Float,
    Dict,
    Array,
}

/// Directory manager shape.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DirectoryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<OneOrMany<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parents: Option<bool>,
}

impl DirectoryConfig {
    /// All declared paths, `paths` taking priority over `path`.
    pub fn paths(&self) -> Vec<&str> {
        match (&self.paths, &self.path) {
            (Some(paths), _) => paths.as_slice().iter().map(String::as_str).collect(),
            (None, Some(path)) => vec![path.as_str()],
            (None, None) => Vec::new(),
        }
    }

    /// Requested permission bits as written, `mode` taking priority.
    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref().or(self.permissions.as_deref())
    }

    /// Create missing parent directories, defaults to true.
    pub fn parents(&self) -> bool {
        self.parents != Some(false)
    }
}

/// Script runner shape.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScriptConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_install: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

impl ScriptConfig {
    /// First present install command out of `install`, `command`, and `run`.
    pub fn install_command(&self) -> Option<&str> {
        self.install
            .as_deref()
            .or(self.command.as_deref())
            .or(self.run.as_deref())
    }
}

/// Symlink management attached to any package or task.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SymlinkConfig {
    /// Path relative to the dotfiles directory.
    pub source: String,

    /// Path to place the link at, may use `~` and variables.
    pub destination: String,
}

/// Profile definition.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Profile(s) to inherit from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<OneOrMany<String>>,

    /// Package names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<Vec<String>>,

    /// Pre-install task names.
    #[serde(default, rename = "pre-install", skip_serializing_if = "Option::is_none")]
    pub pre_install: Option<Vec<String>>,
}

impl Profile {
    /// Base profile names with the optional "@" sigil stripped.
    pub fn bases(&self) -> impl Iterator<Item = &str> {
        self.base
            .iter()
            .flat_map(|base| base.as_slice())
            .map(|name| name.strip_prefix('@').unwrap_or(name.as_str()))
    }

    pub fn packages(&self) -> &[String] {
        self.packages.as_deref().unwrap_or_default()
    }

    pub fn pre_install(&self) -> &[String] {
        self.pre_install.as_deref().unwrap_or_default()
    }
}

/// Either one value or a list of values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values.as_slice(),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("malformed configuration document: {0}")]
    Deserialize(#[source] serde_json::Error),

    /// Failed to serialize configuration.
    #[error("failed to serialize configuration document: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn deserialize_config_document() -> anyhow::Result<()> {
        let result: ConfigDocument = indoc! {r#"
            {
              "version": "2",
              "packages": {
                "ripgrep": { "description": "fast grep", "brew": "ripgrep" },
                "slack": { "mas": 803453959 },
                "tsc": { "npm": "typescript", "options": ["--force"] },
                "mystery": { "description": "nothing to see" }
              },
              "pre-install": {
                "dock": { "domain": "com.apple.dock", "key": "autohide", "value": true },
                "dirs": { "provider": "directory", "paths": ["~/a", "~/b"] }
              },
              "profiles": {
                "base": { "packages": ["ripgrep"] },
                "work": { "base": ["@base"], "pre-install": ["dock"] }
              }
            }
        "#}
        .parse()?;

        assert_eq!(result.version.as_deref(), Some("2"));
        assert_eq!(
            result.packages["ripgrep"].provider,
            Some(PackageProvider::Brew(BrewConfig {
                brew: "ripgrep".into(),
                ..Default::default()
            }))
        );
        assert_eq!(
            result.packages["slack"].provider,
            Some(PackageProvider::Mas(MasConfig { mas: 803453959 }))
        );
        assert_eq!(
            result.packages["tsc"].provider,
            Some(PackageProvider::Npm(NpmConfig {
                npm: "typescript".into(),
                options: Some(vec!["--force".into()]),
            }))
        );
        assert_eq!(result.packages["mystery"].provider, None);
        assert_eq!(
            result.pre_install["dock"].provider,
            TaskProvider::Defaults(DefaultsConfig {
                domain: "com.apple.dock".into(),
                key: "autohide".into(),
                kind: None,
                value: json!(true),
            })
        );
        assert_eq!(
            result.pre_install["dirs"].provider_tag,
            Some(ProviderTag::Directory)
        );
        assert_eq!(
            result.profiles["work"].bases().collect::<Vec<_>>(),
            vec!["base"]
        );

        Ok(())
    }

    #[test]
    fn round_trip_keeps_unknown_fields() -> anyhow::Result<()> {
        let document: ConfigDocument = indoc! {r#"
            {
              "packages": {
                "git": { "brew": "git", "pinned": "2.44" }
              },
              "pre-install": {
                "hello": { "provider": "script", "run": "echo hi", "note": 1 }
              }
            }
        "#}
        .parse()?;

        let result = document.to_string();
        let expect = indoc! {r#"
            {
              "packages": {
                "git": {
                  "brew": "git",
                  "pinned": "2.44"
                }
              },
              "pre-install": {
                "hello": {
                  "provider": "script",
                  "note": 1,
                  "run": "echo hi"
                }
              },
              "profiles": {}
            }
        "#};

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn serialize_new_package_flat() -> anyhow::Result<()> {
        let package = Package::new(PackageProvider::Brew(BrewConfig {
            brew: "firefox".into(),
            cask: Some(true),
            ..Default::default()
        }))
        .with_description("browser");

        let result = serde_json::to_value(&package)?;
        let expect = json!({ "description": "browser", "brew": "firefox", "cask": true });
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn malformed_shape_is_rejected() {
        let result = r#"{ "packages": { "bad": { "brew": "x", "cask": "yes" } } }"#
            .parse::<ConfigDocument>();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));

        let result =
            r#"{ "pre-install": { "bad": { "provider": "defaults", "check": "true" } } }"#
                .parse::<ConfigDocument>();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn directory_paths_and_defaults() {
        let config = DirectoryConfig {
            path: Some("~/one".into()),
            permissions: Some("0700".into()),
            ..Default::default()
        };
        assert_eq!(config.paths(), vec!["~/one"]);
        assert_eq!(config.mode(), Some("0700"));
        assert!(config.parents());

        let config = DirectoryConfig {
            paths: Some(OneOrMany::One("~/many".into())),
            path: Some("~/ignored".into()),
            parents: Some(false),
            ..Default::default()
        };
        assert_eq!(config.paths(), vec!["~/many"]);
        assert!(!config.parents());
    }

    #[test]
    fn script_install_command_priority() {
        let config = ScriptConfig {
            command: Some("second".into()),
            run: Some("third".into()),
            ..Default::default()
        };
        assert_eq!(config.install_command(), Some("second"));

        let config = ScriptConfig {
            install: Some("first".into()),
            command: Some("second".into()),
            ..Default::default()
        };
        assert_eq!(config.install_command(), Some("first"));
    }
}
