// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Directory manager.
//!
//! Ensures that a set of directories exist, optionally with specific
//! permission bits. Modes are written as octal strings, e.g., "0700" or "755".
//!
//! Permission bits are only verified by `check` when exactly one path is
//! declared. With several paths, the mode is still applied on install, but
//! drift is not reported.

use crate::{
    backup::backup_file,
    config::DirectoryConfig,
    handler::{CheckResult, Context, Handler},
    path::expand_path,
    shell::Shell,
};

use std::{
    fs::{metadata, read_dir, remove_dir, set_permissions, symlink_metadata, DirBuilder, Permissions},
    os::unix::fs::{DirBuilderExt, PermissionsExt},
    path::Path,
};
use tracing::instrument;

const DEFAULT_MODE: u32 = 0o755;

/// Handler for plain directories.
#[derive(Default, Debug, Clone, Copy)]
pub struct Directory;

impl Handler for Directory {
    type Config = DirectoryConfig;

    #[instrument(skip(self, _ctx, config), level = "debug")]
    async fn check<S: Shell>(
        &self,
        _ctx: &Context<S>,
        config: &DirectoryConfig,
        name: &str,
    ) -> CheckResult {
        let paths = config.paths();
        if paths.is_empty() {
            return CheckResult::error("No paths specified");
        }

        let mut missing = Vec::new();
        for raw in &paths {
            match metadata(expand_path(raw)) {
                Ok(meta) if !meta.is_dir() => {
                    return CheckResult::modified(format!("{raw} exists but is not a directory"));
                }
                Ok(_) => {}
                Err(_) => missing.push(*raw),
            }
        }

        if !missing.is_empty() {
            return CheckResult::not_installed(format!("Missing: {}", missing.join(", ")));
        }

        if let (Some(mode), [raw]) = (config.mode(), paths.as_slice()) {
            let Some(expected) = parse_mode(mode) else {
                return CheckResult::error(format!("Invalid mode: {mode}"));
            };

            let actual = match metadata(expand_path(raw)) {
                Ok(meta) => meta.permissions().mode() & 0o777,
                Err(error) => return CheckResult::error(format!("Cannot stat {raw}: {error}")),
            };

            if actual != expected {
                return CheckResult::modified(format!(
                    "Wrong permissions: {actual:o}, expected: {expected:o}"
                ));
            }
        }

        CheckResult::installed("All directories exist")
    }

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn install<S: Shell>(
        &self,
        ctx: &Context<S>,
        config: &DirectoryConfig,
        name: &str,
    ) -> bool {
        let mode = match config.mode().map(|mode| (mode, parse_mode(mode))) {
            Some((_, Some(bits))) => Some(bits),
            Some((raw, None)) => {
                ctx.log()
                    .append(format!("Invalid mode for {name}: {raw}"));
                return false;
            }
            None => None,
        };

        let paths = config.paths();
        if paths.is_empty() {
            ctx.log().append(format!("No paths specified for {name}"));
            return false;
        }

        for raw in paths {
            let path = expand_path(raw);

            if ctx.is_dry_run() {
                ctx.log()
                    .would(format!("create directory: {}", path.display()));
                continue;
            }

            if let Err(message) = ensure_directory(&path, mode, config.parents(), ctx) {
                ctx.log()
                    .append(format!("Failed to create directory {}: {message}", path.display()));
                return false;
            }
        }

        true
    }

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn uninstall<S: Shell>(
        &self,
        ctx: &Context<S>,
        config: &DirectoryConfig,
        name: &str,
    ) -> bool {
        // INVARIANT: Never remove a directory that still has content.
        for raw in config.paths().into_iter().rev() {
            let path = expand_path(raw);
            let Ok(meta) = symlink_metadata(&path) else {
                continue;
            };

            if !meta.is_dir() {
                ctx.log()
                    .append(format!("Skipping non-directory: {}", path.display()));
                continue;
            }

            let is_empty = match read_dir(&path) {
                Ok(mut entries) => entries.next().is_none(),
                Err(error) => {
                    ctx.log()
                        .append(format!("Cannot read directory {}: {error}", path.display()));
                    continue;
                }
            };

            if !is_empty {
                ctx.log()
                    .append(format!("Skipping non-empty directory: {}", path.display()));
                continue;
            }

            if ctx.is_dry_run() {
                ctx.log()
                    .would(format!("remove empty directory: {}", path.display()));
                continue;
            }

            match remove_dir(&path) {
                Ok(()) => ctx
                    .log()
                    .append(format!("Removed empty directory: {}", path.display())),
                Err(error) => ctx
                    .log()
                    .append(format!("Failed to remove directory {}: {error}", path.display())),
            }
        }

        true
    }
}

fn ensure_directory<S: Shell>(
    path: &Path,
    mode: Option<u32>,
    parents: bool,
    ctx: &Context<S>,
) -> Result<(), String> {
    if let Ok(meta) = metadata(path) {
        if meta.is_dir() {
            if let Some(bits) = mode {
                set_permissions(path, Permissions::from_mode(bits)).map_err(|e| e.to_string())?;
                ctx.log()
                    .append(format!("Set permissions on {}: {bits:04o}", path.display()));
            }
            return Ok(());
        }

        if let Some(backup) = backup_file(path).map_err(|e| e.to_string())? {
            ctx.log()
                .append(format!("Backed up file to: {}", backup.display()));
        }
    }

    DirBuilder::new()
        .recursive(parents)
        .mode(mode.unwrap_or(DEFAULT_MODE))
        .create(path)
        .map_err(|e| e.to_string())?;

    // INVARIANT: The process umask must not weaken an explicit mode.
    if let Some(bits) = mode {
        set_permissions(path, Permissions::from_mode(bits)).map_err(|e| e.to_string())?;
    }

    ctx.log()
        .append(format!("Created directory: {}", path.display()));
    Ok(())
}

/// Parse octal permission string, e.g., "0755", "755", or "0o700".
fn parse_mode(mode: &str) -> Option<u32> {
    let digits = mode
        .strip_prefix("0o")
        .or_else(|| mode.strip_prefix('0'))
        .unwrap_or(mode);
    if digits.is_empty() {
        return Some(0);
    }

    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|bits| *bits <= 0o7777)
}
