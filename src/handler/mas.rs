// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! App store installer.
//!
//! Apps that were never bought by the current account cannot be installed
//! directly. When an install fails with the purchase trigger text in its error
//! output, the app is purchased and the install is retried exactly once.

use crate::{
    config::MasConfig,
    handler::{CheckResult, Context, Handler},
    shell::{RunOptions, Shell},
};

use tracing::instrument;

/// Handler for Mac App Store apps.
#[derive(Default, Debug, Clone, Copy)]
pub struct Mas;

impl Handler for Mas {
    type Config = MasConfig;

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn check<S: Shell>(&self, ctx: &Context<S>, config: &MasConfig, name: &str) -> CheckResult {
        if !ctx.shell().command_exists("mas").await {
            return CheckResult::error("mas CLI is not installed");
        }

        let result = ctx.query("mas list").await;
        if !result.success {
            return CheckResult::error("Failed to list installed apps");
        }

        let prefix = format!("{} ", config.mas);
        if result
            .stdout
            .lines()
            .any(|line| line.trim_start().starts_with(prefix.as_str()))
        {
            CheckResult::installed("Installed")
        } else {
            CheckResult::not_installed("Not installed")
        }
    }

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn install<S: Shell>(&self, ctx: &Context<S>, config: &MasConfig, name: &str) -> bool {
        let opts = RunOptions::default();
        let cmd = format!("mas install {}", config.mas);

        let result = ctx
            .mutate(format!("Installing {name} from App Store: {}", config.mas), &cmd, &opts)
            .await;
        if result.success {
            ctx.done(format!("Successfully installed {name}"));
            return true;
        }

        if !result.stderr.contains(ctx.purchase_trigger()) {
            ctx.log()
                .append(format!("Failed to install {name}: {}", result.stderr));
            return false;
        }

        let purchase = format!("mas purchase {}", config.mas);
        let result = ctx
            .mutate(format!("Purchasing {name}: {purchase}"), &purchase, &opts)
            .await;
        if !result.success {
            ctx.log()
                .append(format!("Failed to purchase {name}: {}", result.stderr));
            return false;
        }

        let result = ctx
            .mutate(format!("Retrying install of {name}"), &cmd, &opts)
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
    async fn uninstall<S: Shell>(&self, ctx: &Context<S>, config: &MasConfig, name: &str) -> bool {
        let cmd = format!("mas uninstall {}", config.mas);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        handler::{testing::Fixture, Status},
        shell::{testing::ScriptedShell, ExecResult},
    };
    use pretty_assertions::assert_eq;

    const XCODE: MasConfig = MasConfig { mas: 497799835 };

    #[tokio::test]
    async fn check_matches_id_at_line_start() -> anyhow::Result<()> {
        let listing = "409183694  Keynote (13.1)\n4977998350  Decoy (1.0)";
        let shell = ScriptedShell::new().respond("mas list", ExecResult::ok(listing));
        let fixture = Fixture::new(shell)?;

        let result = Mas.check(&fixture.ctx, &XCODE, "xcode").await;
        assert_eq!(result.status, Status::NotInstalled);

        let keynote = MasConfig { mas: 409183694 };
        let result = Mas.check(&fixture.ctx, &keynote, "keynote").await;
        assert_eq!(result.status, Status::Installed);

        Ok(())
    }

    #[tokio::test]
    async fn check_reports_listing_failure() -> anyhow::Result<()> {
        let shell = ScriptedShell::new().respond("mas list", ExecResult::failed(1, "nope"));
        let fixture = Fixture::new(shell)?;

        let result = Mas.check(&fixture.ctx, &XCODE, "xcode").await;
        assert_eq!(result, CheckResult::error("Failed to list installed apps"));

        Ok(())
    }

    #[tokio::test]
    async fn purchase_then_retry_once() -> anyhow::Result<()> {
        // Responses match by prefix, so the retry fails as well.
        let shell = ScriptedShell::new().respond(
            "mas install",
            ExecResult::failed(1, "Error: app was not purchased, use purchase"),
        );
        let fixture = Fixture::new(shell)?;

        assert!(!Mas.install(&fixture.ctx, &XCODE, "xcode").await);
        assert_eq!(
            fixture.history(),
            vec![
                "mas install 497799835",
                "mas purchase 497799835",
                "mas install 497799835",
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn other_failures_do_not_purchase() -> anyhow::Result<()> {
        let shell =
            ScriptedShell::new().respond("mas install", ExecResult::failed(1, "network down"));
        let fixture = Fixture::new(shell)?;

        assert!(!Mas.install(&fixture.ctx, &XCODE, "xcode").await);
        assert_eq!(fixture.history(), vec!["mas install 497799835"]);

        Ok(())
    }

    #[tokio::test]
    async fn custom_purchase_trigger() -> anyhow::Result<()> {
        let shell = ScriptedShell::new()
            .respond("mas install", ExecResult::failed(1, "not owned by account"));
        let mut fixture = Fixture::new(shell)?;
        fixture.ctx = fixture.ctx.with_purchase_trigger("not owned");

        Mas.install(&fixture.ctx, &XCODE, "xcode").await;
        assert_eq!(fixture.history()[1], "mas purchase 497799835");

        Ok(())
    }
}
