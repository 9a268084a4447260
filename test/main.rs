// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

mod integration;

use anyhow::Result;
use dots::{
    shell::{ExecResult, RunOptions},
    ConfigStore, Context, InstallLog, Runner, Shell,
};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};
use tempfile::TempDir;

/// Dotfiles directory holding a configuration store.
pub(crate) struct DotfilesFixture {
    dir: TempDir,
}

impl DotfilesFixture {
    pub(crate) fn new(document: impl AsRef<str>) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        write(dir.path().join("packages.json"), document.as_ref())?;
        Ok(Self { dir })
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn write_file(
        &self,
        name: impl AsRef<Path>,
        contents: impl AsRef<str>,
    ) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        write(&path, contents.as_ref())?;
        Ok(path)
    }

    pub(crate) fn store(&self) -> ConfigStore {
        ConfigStore::open(self.dir.path().join("packages.json"))
    }

    pub(crate) fn runner(
        &self,
        shell: RecordingShell,
        dry_run: bool,
        batch_size: usize,
    ) -> Runner<RecordingShell> {
        let log = InstallLog::new(self.log_file());
        let ctx = Context::new(shell, log, self.dir.path()).with_dry_run(dry_run);
        Runner::new(ctx, batch_size)
    }

    pub(crate) fn log_file(&self) -> PathBuf {
        self.dir.path().join(".dots-install.log")
    }

    pub(crate) fn log(&self) -> Result<String> {
        Ok(read_to_string(self.log_file())?)
    }
}

#[derive(Debug, Default)]
struct ShellState {
    responses: Vec<(String, ExecResult)>,
    history: Vec<String>,
}

/// Shell that answers commands by prefix, and records everything it ran.
///
/// Clones share state, so a test can keep one handle while the runner owns
/// another. Unmatched commands succeed with no output.
#[derive(Debug, Default, Clone)]
pub(crate) struct RecordingShell {
    state: Arc<Mutex<ShellState>>,
}

impl RecordingShell {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix`. First registered match wins.
    pub(crate) fn respond(self, prefix: impl Into<String>, result: ExecResult) -> Self {
        self.state().responses.push((prefix.into(), result));
        self
    }

    /// Replace the answer for `prefix`, or register it first in line.
    pub(crate) fn set(&self, prefix: impl Into<String>, result: ExecResult) {
        let prefix = prefix.into();
        let mut state = self.state();
        state.responses.retain(|(known, _)| *known != prefix);
        state.responses.insert(0, (prefix, result));
    }

    pub(crate) fn history(&self) -> Vec<String> {
        self.state().history.clone()
    }

    pub(crate) fn ran(&self, prefix: &str) -> bool {
        self.state()
            .history
            .iter()
            .any(|command| command.starts_with(prefix))
    }

    fn state(&self) -> MutexGuard<'_, ShellState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Shell for RecordingShell {
    async fn run(&self, command: &str, _opts: &RunOptions) -> ExecResult {
        let mut state = self.state();
        state.history.push(command.to_string());
        state
            .responses
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| ExecResult::ok(""))
    }
}
