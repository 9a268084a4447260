// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Script runner.
//!
//! Runs arbitrary user commands. The check command decides installation status
//! purely through its exit code. Scripts cannot be reverted, so uninstall is a
//! logged no-op.

use crate::{
    config::ScriptConfig,
    handler::{CheckResult, Context, Handler},
    path::expand_path,
    shell::{truncate, RunOptions, Shell},
};

use tracing::instrument;

const OUTPUT_PREVIEW_LINES: usize = 5;

/// Handler for user supplied scripts.
#[derive(Default, Debug, Clone, Copy)]
pub struct Script;

impl Script {
    fn run_options(config: &ScriptConfig) -> RunOptions {
        RunOptions {
            shell: config.shell.clone(),
            env: config.env.clone().unwrap_or_default(),
            cwd: config.working_dir.as_deref().map(expand_path),
        }
    }
}

impl Handler for Script {
    type Config = ScriptConfig;

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn check<S: Shell>(&self, ctx: &Context<S>, config: &ScriptConfig, name: &str) -> CheckResult {
        let Some(check) = &config.check else {
            return CheckResult::error("No check command specified");
        };

        let result = ctx.shell().run(check, &Self::run_options(config)).await;
        if result.success {
            CheckResult::installed("Check passed")
        } else {
            CheckResult::not_installed("Check failed")
        }
    }

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn install<S: Shell>(&self, ctx: &Context<S>, config: &ScriptConfig, name: &str) -> bool {
        let Some(cmd) = config.install_command() else {
            ctx.log()
                .append(format!("No install command specified for {name}"));
            return false;
        };

        let opts = Self::run_options(config);
        let intent = format!("Running install script for {name}: {}", truncate(cmd, 80));
        let result = ctx.mutate(intent, cmd, &opts).await;
        if !result.success {
            ctx.log().append(format!(
                "Install script failed for {name} (exit {}): {}",
                result.code, result.stderr
            ));
            return false;
        }

        let mut lines = result.stdout.lines().filter(|line| !line.trim().is_empty());
        for line in lines.by_ref().take(OUTPUT_PREVIEW_LINES) {
            ctx.log().append(format!("  {line}"));
        }
        if lines.next().is_some() {
            ctx.log().append("  ... (output truncated)");
        }

        if let Some(hook) = &config.post_install {
            let result = ctx
                .mutate(format!("Running post-install for {name}"), hook, &opts)
                .await;
            if !result.success {
                ctx.log()
                    .append(format!("Post-install warning for {name}: {}", result.stderr));
            }
        }

        ctx.done(format!("Successfully ran install script for {name}"));
        true
    }

    #[instrument(skip(self, ctx, _config), level = "debug")]
    async fn uninstall<S: Shell>(&self, ctx: &Context<S>, _config: &ScriptConfig, name: &str) -> bool {
        ctx.log()
            .append(format!("Script {name} cannot be uninstalled (skipping)"));
        true
    }
}
