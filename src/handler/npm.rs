// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Global package manager.

use crate::{
    config::NpmConfig,
    handler::{CheckResult, Context, Handler},
    shell::{RunOptions, Shell},
};

use tracing::instrument;

/// Handler for globally installed npm packages.
#[derive(Default, Debug, Clone, Copy)]
pub struct Npm;

impl Handler for Npm {
    type Config = NpmConfig;

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn check<S: Shell>(&self, ctx: &Context<S>, config: &NpmConfig, name: &str) -> CheckResult {
        if !ctx.shell().command_exists("npm").await {
            return CheckResult::error("npm is not installed");
        }

        let cmd = format!("npm list -g --depth=0 {}", config.npm);
        let result = ctx.query(&cmd).await;
        if result.success && lists_package(&result.stdout, &config.npm) {
            CheckResult::installed("Installed globally")
        } else {
            CheckResult::not_installed("Not installed")
        }
    }

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn install<S: Shell>(&self, ctx: &Context<S>, config: &NpmConfig, name: &str) -> bool {
        let mut cmd = format!("npm install -g {}", config.npm);
        for option in config.options.iter().flatten() {
            cmd.push(' ');
            cmd.push_str(option);
        }

        let result = ctx
            .mutate(format!("Installing {name}: {cmd}"), &cmd, &RunOptions::default())
            .await;
        if !result.success {
            ctx.log()
                .append(format!("Failed to install {name}: {}", result.stderr));
            return false;
        }

        ctx.done(format!("Successfully installed {name}"));
        true
    }

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn uninstall<S: Shell>(&self, ctx: &Context<S>, config: &NpmConfig, name: &str) -> bool {
        let cmd = format!("npm uninstall -g {}", config.npm);
        let result = ctx
            .mutate(format!("Uninstalling {name}: {cmd}"), &cmd, &RunOptions::default())
            .await;
        if !result.success {
            ctx.log()
                .append(format!("Failed to uninstall {name}: {}", result.stderr));
        }

        result.success
    }
}

/// Check that a global listing names the exact package.
///
/// Listing lines end in `name@version`, scoped names carry a leading "@" of
/// their own, e.g., `@scope/name@1.0.0`.
fn lists_package(listing: &str, package: &str) -> bool {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().last())
        .filter_map(|entry| entry.rsplit_once('@'))
        .any(|(entry, _)| entry == package)
}
