// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way, e.g., the dotfiles directory, the
//! settings file, and user supplied paths inside package definitions.

use std::{
    env,
    path::{Component, Path, PathBuf},
};

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to the managed dotfiles directory.
///
/// Uses `$HOME/.dotfiles`. Does not check if the path returned actually
/// exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_dotfiles_dir() -> Result<PathBuf> {
    home_dir().map(|path| path.join(".dotfiles"))
}

/// Determine default absolute path to the settings file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/dots/settings.toml`. Does not
/// check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_settings_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("dots").join("settings.toml"))
        .ok_or(NoWayHome)
}

/// Expand `~` and environment variables in a user supplied path.
///
/// Unset variables expand to nothing, except `XDG_CONFIG_HOME` which falls
/// back to `~/.config`. The result is made absolute against the current
/// directory and lexically normalized, so `..` components never touch the
/// file system.
pub fn expand_path(path: impl AsRef<str>) -> PathBuf {
    let expanded = shellexpand::full_with_context_no_errors(
        path.as_ref(),
        || dirs::home_dir().map(|home| home.to_string_lossy().into_owned()),
        |var: &str| -> Option<String> {
            match env::var(var) {
                Ok(value) => Some(value),
                Err(_) if var == "XDG_CONFIG_HOME" => dirs::home_dir()
                    .map(|home| home.join(".config").to_string_lossy().into_owned()),
                Err(_) => Some(String::new()),
            }
        },
    );

    let expanded = PathBuf::from(expanded.into_owned());
    let absolute = std::path::absolute(&expanded).unwrap_or(expanded);
    normalize(absolute)
}

/// Lexically normalize a path by folding `.` and `..` components.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let mut normal = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => {
                if !normal.pop() {
                    normal.push(component);
                }
            }
            _ => normal.push(component),
        }
    }

    normal
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_against(base: impl AsRef<Path>, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        return path.to_path_buf();
    }

    normalize(base.as_ref().join(path))
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
