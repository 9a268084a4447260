// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shell command execution.
//!
//! Every provider handler does its real work by shelling out to an external
//! tool. The [`Shell`] trait is the layer of indirection between handlers and
//! the operating system, so handlers can be driven by a scripted shell instead
//! of a real one.

use crate::settings::DEFAULT_SHELL;

use std::{collections::BTreeMap, path::PathBuf};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Options for a single shell invocation.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Shell binary to use instead of the default one.
    pub shell: Option<String>,

    /// Extra environment variables.
    pub env: BTreeMap<String, String>,

    /// Working directory.
    pub cwd: Option<PathBuf>,
}

/// Outcome of a shell invocation.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl ExecResult {
    /// Successful result with given standard output.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
            code: 0,
        }
    }

    /// Failed result with given standard error.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
            code,
        }
    }
}

/// Layer of indirection for running shell commands.
#[allow(async_fn_in_trait)]
pub trait Shell {
    /// Run command line through a shell.
    ///
    /// Never fails. A command that cannot even be spawned is reported as an
    /// unsuccessful [`ExecResult`].
    async fn run(&self, command: &str, opts: &RunOptions) -> ExecResult;

    /// Check if program exists in `PATH`.
    async fn command_exists(&self, program: &str) -> bool {
        self.run(&format!("command -v {program}"), &RunOptions::default())
            .await
            .success
    }
}

/// Shell that runs commands on the host system.
#[derive(Debug, Clone)]
pub struct SystemShell {
    shell: String,
}

impl SystemShell {
    /// Construct new system shell that uses target shell binary by default.
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for SystemShell {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL)
    }
}

impl Shell for SystemShell {
    #[instrument(skip(self, opts), level = "debug")]
    async fn run(&self, command: &str, opts: &RunOptions) -> ExecResult {
        let shell = opts.shell.as_deref().unwrap_or(self.shell.as_str());
        let mut cmd = Command::new(shell);
        cmd.arg("-c").arg(command).envs(&opts.env).kill_on_drop(true);
        if let Some(cwd) = &opts.cwd {
            cmd.current_dir(cwd);
        }

        let output = match cmd.output().await {
            Ok(output) => output,
            Err(error) => {
                debug!("failed to spawn {shell}: {error}");
                return ExecResult::failed(1, error.to_string());
            }
        };

        let result = ExecResult {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(output.stdout.as_slice())
                .trim()
                .to_string(),
            stderr: String::from_utf8_lossy(output.stderr.as_slice())
                .trim()
                .to_string(),
            code: output.status.code().unwrap_or(1),
        };
        debug!("exit code {}", result.code);

        result
    }
}

/// Shorten string to at most `max` characters, marking the cut with "...".
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let mut short = text
        .chars()
        .take(max.saturating_sub(3))
        .collect::<String>();
    short.push_str("...");
    short
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    use std::sync::Mutex;

    /// Shell that answers from a script of canned results.
    ///
    /// Responses are matched by command prefix, first match wins. Commands
    /// with no matching response succeed with empty output. Every command is
    /// recorded in order.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedShell {
        responses: Vec<(String, ExecResult)>,
        history: Mutex<Vec<String>>,
    }

    impl ScriptedShell {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn respond(mut self, prefix: impl Into<String>, result: ExecResult) -> Self {
            self.responses.push((prefix.into(), result));
            self
        }

        pub(crate) fn history(&self) -> Vec<String> {
            self.history.lock().map(|h| h.clone()).unwrap_or_default()
        }
    }

    impl Shell for ScriptedShell {
        async fn run(&self, command: &str, _opts: &RunOptions) -> ExecResult {
            if let Ok(mut history) = self.history.lock() {
                history.push(command.to_string());
            }

            self.responses
                .iter()
                .find(|(prefix, _)| command.starts_with(prefix.as_str()))
                .map(|(_, result)| result.clone())
                .unwrap_or_else(|| ExecResult::ok(""))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("short", 10, "short"; "fits")]
    #[test_case("0123456789abc", 10, "0123456..."; "cut")]
    #[test_case("héllo wörld", 8, "héllo..."; "multibyte")]
    #[test]
    fn truncate_marks_cut(input: &str, max: usize, expect: &str) {
        pretty_assertions::assert_eq!(truncate(input, max), expect);
    }

    #[tokio::test]
    async fn system_shell_captures_output() {
        let shell = SystemShell::new("/bin/sh");
        let result = shell
            .run("echo out; echo err >&2; exit 3", &RunOptions::default())
            .await;
        assert_eq!(
            result,
            ExecResult {
                success: false,
                stdout: "out".into(),
                stderr: "err".into(),
                code: 3,
            }
        );
    }

    #[tokio::test]
    async fn system_shell_applies_env_and_cwd() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let opts = RunOptions {
            shell: Some("/bin/sh".into()),
            env: [("DOTS_GREETING".to_string(), "hi".to_string())].into(),
            cwd: Some(dir.path().to_path_buf()),
        };
        let result = SystemShell::default()
            .run("echo $DOTS_GREETING; pwd", &opts)
            .await;
        assert!(result.success);
        assert!(result.stdout.starts_with("hi\n"));

        Ok(())
    }

    #[tokio::test]
    async fn missing_shell_is_a_failed_result() {
        let shell = SystemShell::new("/definitely/not/a/shell");
        let result = shell.run("true", &RunOptions::default()).await;
        assert!(!result.success);
        assert_eq!(result.code, 1);
        assert!(!result.stderr.is_empty());
    }

    #[tokio::test]
    async fn command_exists_uses_command_v() {
        let shell = SystemShell::new("/bin/sh");
        assert!(shell.command_exists("sh").await);
        assert!(!shell.command_exists("dots-no-such-program").await);
    }
}
