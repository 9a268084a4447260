// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Durable install log.
//!
//! Install and uninstall runs leave a human readable trail in an append-only
//! log file inside of the dotfiles directory. Each run is wrapped in a header
//! and a footer block. Each event is one timestamped line.
//!
//! Handlers of one batch append concurrently. Every line is written with a
//! single call on a file opened in append mode while holding a lock, so lines
//! never interleave.

use chrono::{SecondsFormat, Utc};
use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::{debug, warn};

const RULE: &str = "============================================================";

/// Append-only install log.
#[derive(Debug)]
pub struct InstallLog {
    path: Option<PathBuf>,
    lock: Mutex<()>,
}

impl InstallLog {
    /// Construct new install log at target path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            lock: Mutex::new(()),
        }
    }

    /// Construct install log that only forwards to tracing.
    pub fn disabled() -> Self {
        Self {
            path: None,
            lock: Mutex::new(()),
        }
    }

    /// Path to log file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append timestamped line.
    pub fn append(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        debug!("{message}");
        self.write(format!("[{}] {message}\n", timestamp()));
    }

    /// Append a line describing a mutating action skipped by dry-run.
    pub fn would(&self, action: impl AsRef<str>) {
        self.append(format!("[DRY-RUN] Would {}", action.as_ref()));
    }

    /// Append a line describing a command skipped by dry-run.
    pub fn would_run(&self, command: impl AsRef<str>) {
        self.would(format!("run: {}", command.as_ref()));
    }

    /// Open a run with a header block.
    pub fn begin(&self, command: impl AsRef<str>) {
        self.write(format!(
            "\n{RULE}\nDots manager started at {}\nCommand: dots {}\n{RULE}\n",
            timestamp(),
            command.as_ref()
        ));
    }

    /// Close a run with a footer block.
    pub fn finish(&self, success: bool) {
        let status = if success { "SUCCESS" } else { "FAILED" };
        self.append(format!(
            "\nDots manager finished at {} - {status}\n{RULE}",
            timestamp()
        ));
    }

    fn write(&self, record: String) {
        let Some(path) = &self.path else {
            return;
        };

        // INVARIANT: One record, one write, under the lock.
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(record.as_bytes()));

        if let Err(error) = result {
            warn!("cannot write install log {}: {error}", path.display());
        }
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{fs::read_to_string, sync::Arc, thread};

    #[test]
    fn run_is_wrapped_in_header_and_footer() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let log = InstallLog::new(dir.path().join("install.log"));

        log.begin("install --profile work --dry-run");
        log.would_run("brew install git");
        log.finish(false);

        let content = read_to_string(dir.path().join("install.log"))?;
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(lines[1], RULE);
        assert!(lines[2].starts_with("Dots manager started at "));
        assert_eq!(lines[3], "Command: dots install --profile work --dry-run");
        assert_eq!(lines[4], RULE);
        assert!(lines[5].ends_with("] [DRY-RUN] Would run: brew install git"));
        assert!(lines[7].starts_with("Dots manager finished at "));
        assert!(lines[7].ends_with(" - FAILED"));
        assert_eq!(lines[8], RULE);

        Ok(())
    }

    #[test]
    fn concurrent_appends_keep_lines_whole() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let log = Arc::new(InstallLog::new(dir.path().join("install.log")));

        let workers = (0..8)
            .map(|worker| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for line in 0..50 {
                        log.append(format!("worker {worker} line {line}"));
                    }
                })
            })
            .collect::<Vec<_>>();
        for worker in workers {
            worker.join().map_err(|_| anyhow::anyhow!("worker panicked"))?;
        }

        let content = read_to_string(dir.path().join("install.log"))?;
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 400);
        assert!(lines
            .iter()
            .all(|line| line.starts_with('[') && line.contains("] worker ")));

        Ok(())
    }

    #[test]
    fn disabled_log_writes_nothing() {
        let log = InstallLog::disabled();
        log.append("nothing");
        assert_eq!(log.path(), None);
    }
}
