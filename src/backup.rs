// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup policy for displaced files.
//!
//! Whenever something has to be put in place of an existing file, that file
//! is renamed in place to `<path>.backupN`, with N being the smallest positive
//! integer whose name is still free. Existing backups are never overwritten.

use std::{
    ffi::OsString,
    fs::{rename, symlink_metadata},
    io,
    path::{Path, PathBuf},
};

/// Determine the first free backup path for target path.
pub fn next_backup_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    (1u32..)
        .map(|n| {
            let mut name = OsString::from(path.as_os_str());
            name.push(format!(".backup{n}"));
            PathBuf::from(name)
        })
        .find(|candidate| symlink_metadata(candidate).is_err())
        .unwrap_or_else(|| path.with_extension("backup"))
}

/// Move target path out of the way.
///
/// Returns the backup path, or nothing if there was nothing to back up.
///
/// # Errors
///
/// - Return [`io::Error`] if rename fails.
pub fn backup_file(path: impl AsRef<Path>) -> io::Result<Option<PathBuf>> {
    let path = path.as_ref();
    if symlink_metadata(path).is_err() {
        return Ok(None);
    }

    let backup = next_backup_path(path);
    rename(path, &backup)?;

    Ok(Some(backup))
}
