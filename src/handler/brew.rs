// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Formula and cask manager.

use crate::{
    config::BrewConfig,
    handler::{CheckResult, Context, Handler},
    shell::{RunOptions, Shell},
};

use tracing::instrument;

/// Handler for Homebrew formulas and casks.
#[derive(Default, Debug, Clone, Copy)]
pub struct Brew;

impl Brew {
    fn kind_flag(config: &BrewConfig) -> &'static str {
        if config.is_cask() {
            "--cask"
        } else {
            "--formula"
        }
    }

    fn install_command(config: &BrewConfig) -> String {
        let mut cmd = String::from("brew install");
        if config.is_cask() {
            cmd.push_str(" --cask");
        }
        cmd.push(' ');
        cmd.push_str(&config.brew);
        for option in config.options.iter().flatten() {
            cmd.push(' ');
            cmd.push_str(option);
        }
        cmd
    }

    fn uninstall_command(config: &BrewConfig) -> String {
        if config.is_cask() {
            format!("brew uninstall --cask {}", config.brew)
        } else {
            format!("brew uninstall {}", config.brew)
        }
    }
}

impl Handler for Brew {
    type Config = BrewConfig;

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn check<S: Shell>(&self, ctx: &Context<S>, config: &BrewConfig, name: &str) -> CheckResult {
        if !ctx.shell().command_exists("brew").await {
            return CheckResult::error("Homebrew is not installed");
        }

        let cmd = format!("brew list {} {}", Self::kind_flag(config), config.brew);
        if ctx.query(&cmd).await.success {
            CheckResult::installed("Installed")
        } else {
            CheckResult::not_installed("Not installed")
        }
    }

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn install<S: Shell>(&self, ctx: &Context<S>, config: &BrewConfig, name: &str) -> bool {
        let opts = RunOptions::default();

        if let Some(tap) = &config.tap {
            let cmd = format!("brew tap {tap}");
            let result = ctx.mutate(format!("Adding tap {tap}"), &cmd, &opts).await;
            if !result.success {
                ctx.log()
                    .append(format!("Failed to add tap {tap}: {}", result.stderr));
                return false;
            }
        }

        let cmd = Self::install_command(config);
        let result = ctx
            .mutate(format!("Installing {name}: {cmd}"), &cmd, &opts)
            .await;
        if !result.success {
            ctx.log()
                .append(format!("Failed to install {name}: {}", result.stderr));
            return false;
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

        ctx.done(format!("Successfully installed {name}"));
        true
    }

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn uninstall<S: Shell>(&self, ctx: &Context<S>, config: &BrewConfig, name: &str) -> bool {
        let cmd = Self::uninstall_command(config);
        let result = ctx
            .mutate(format!("Uninstalling {name}: {cmd}"), &cmd, &RunOptions::default())
            .await;
        if !result.success {
            ctx.log()
                .append(format!("Failed to uninstall {name}: {}", result.stderr));
            return false;
        }

        ctx.done(format!("Successfully uninstalled {name}"));
        true
    }
}

/// Names of formulas installed on request, i.e., not just as dependencies.
pub async fn installed_formulas(shell: &impl Shell) -> Vec<String> {
    list_names(shell, "brew leaves").await
}

/// Names of all installed casks.
pub async fn installed_casks(shell: &impl Shell) -> Vec<String> {
    list_names(shell, "brew list --cask").await
}

async fn list_names(shell: &impl Shell, command: &str) -> Vec<String> {
    let result = shell.run(command, &RunOptions::default()).await;
    if !result.success {
        return Vec::new();
    }

    result
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}
