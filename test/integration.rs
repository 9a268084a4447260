// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{DotfilesFixture, RecordingShell};

use anyhow::Result;
use dots::{
    handler::symlink::is_symlink_to, shell::ExecResult, Progress, ProgressState, Status,
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeMap;

#[tokio::test]
async fn failed_batch_does_not_stop_later_batches() -> Result<()> {
    let fixture = DotfilesFixture::new(indoc! {r#"
        {
          "packages": {
            "alpha": { "brew": "alpha" },
            "bravo": { "brew": "bravo" },
            "charlie": { "brew": "charlie" },
            "delta": { "brew": "delta" },
            "echo": { "brew": "echo" }
          },
          "profiles": {
            "work": { "packages": ["echo", "delta", "charlie", "bravo", "alpha"] }
          }
        }
    "#})?;
    let shell = RecordingShell::new()
        .respond("brew list", ExecResult::failed(1, ""))
        .respond("brew install bravo", ExecResult::failed(1, "No available formula"));
    let runner = fixture.runner(shell.clone(), false, 2);
    let (progress, mut receiver) = Progress::channel();

    let document = fixture.store().load()?;
    let success = runner.install_profile(&document, "work", &progress).await?;
    assert!(!success);
    drop(progress);

    let mut last = BTreeMap::new();
    while let Some(item) = receiver.recv().await {
        last.insert(item.name, (item.state, item.message.unwrap_or_default()));
    }
    assert_eq!(
        last.into_iter().collect::<Vec<_>>(),
        vec![
            ("alpha".to_string(), (ProgressState::Done, "Installed".to_string())),
            ("bravo".to_string(), (ProgressState::Error, "Failed".to_string())),
            ("charlie".to_string(), (ProgressState::Done, "Installed".to_string())),
            ("delta".to_string(), (ProgressState::Done, "Installed".to_string())),
            ("echo".to_string(), (ProgressState::Done, "Installed".to_string())),
        ]
    );

    let installs = shell
        .history()
        .into_iter()
        .filter(|command| command.starts_with("brew install"))
        .collect::<Vec<_>>();
    assert_eq!(installs.len(), 5);
    assert_eq!(installs.last().map(String::as_str), Some("brew install echo"));

    let log = fixture.log()?;
    assert!(log.contains("Command: dots install --profile work\n"));
    assert!(log.contains("Failed to install bravo: No available formula"));
    assert!(log.contains("Successfully installed echo"));
    let footer = log.trim_end().lines().rev().nth(1);
    assert!(footer.is_some_and(|line| line.ends_with(" - FAILED")));

    Ok(())
}

#[tokio::test]
async fn unchecked_script_still_runs() -> Result<()> {
    let fixture = DotfilesFixture::new(indoc! {r#"
        {
          "pre-install": {
            "greet": { "run": "echo hi" }
          },
          "profiles": {
            "base": { "pre-install": ["greet"] }
          }
        }
    "#})?;
    let shell = RecordingShell::new();
    let runner = fixture.runner(shell.clone(), false, 5);
    let document = fixture.store().load()?;

    let statuses = runner.check_profile(&document, "base").await?;
    assert_eq!(statuses[0].status, Status::Error);
    assert_eq!(statuses[0].message, "No check command specified");

    assert!(runner.install_profile(&document, "base", &Progress::none()).await?);
    assert!(shell.ran("echo hi"));
    assert!(fixture.log()?.contains("Check failed for greet: No check command specified"));

    Ok(())
}

#[tokio::test]
async fn inherited_profile_resolves_through_store() -> Result<()> {
    let fixture = DotfilesFixture::new(indoc! {r#"
        {
          "packages": {
            "git": { "brew": "git" },
            "firefox": { "brew": "firefox", "cask": true },
            "slack": { "mas": 803453959 }
          },
          "pre-install": {
            "dock": { "domain": "com.apple.dock", "key": "autohide", "value": true },
            "code": { "paths": ["~/code"] }
          },
          "profiles": {
            "base": { "packages": ["git", "firefox"], "pre-install": ["dock"] },
            "personal": { "base": "base", "packages": ["slack", "git"], "pre-install": ["code"] }
          }
        }
    "#})?;
    let store = fixture.store();

    let resolved = store.resolve_profile("personal")?;
    assert_eq!(resolved.packages, vec!["git", "firefox", "slack"]);
    assert_eq!(resolved.pre_install, vec!["dock", "code"]);
    assert_eq!(
        store.tracked_packages()?.into_iter().collect::<Vec<_>>(),
        vec!["firefox", "git", "slack"]
    );

    Ok(())
}

#[tokio::test]
async fn preference_is_written_then_reported_as_set() -> Result<()> {
    let fixture = DotfilesFixture::new(indoc! {r#"
        {
          "pre-install": {
            "dock": { "domain": "com.apple.dock", "key": "autohide", "value": true }
          },
          "profiles": {
            "base": { "pre-install": ["dock"] }
          }
        }
    "#})?;
    let shell = RecordingShell::new().respond(
        "defaults read",
        ExecResult::failed(1, "The domain/default pair does not exist"),
    );
    let runner = fixture.runner(shell.clone(), false, 5);
    let document = fixture.store().load()?;

    let before = runner.check_profile(&document, "base").await?;
    assert_eq!(before[0].status, Status::NotInstalled);
    assert_eq!(before[0].message, "Not set");

    assert!(runner.install_profile(&document, "base", &Progress::none()).await?);
    assert!(shell.ran(r#"defaults write "com.apple.dock" "autohide" -bool YES"#));

    shell.set("defaults read", ExecResult::ok("1"));
    let after = runner.check_profile(&document, "base").await?;
    assert_eq!(after[0].status, Status::Installed);
    assert_eq!(after[0].message, "Set to 1");

    Ok(())
}

#[tokio::test]
async fn dry_run_touches_nothing() -> Result<()> {
    let fixture = DotfilesFixture::new("{}")?;
    fixture.write_file("zshrc", "export EDITOR=vim")?;
    let code_dir = fixture.path().join("home/code");
    let link = fixture.path().join("home/.zshrc");
    fixture.write_file(
        "packages.json",
        json!({
            "packages": {
                "zsh": {
                    "brew": "zsh",
                    "config": { "source": "zshrc", "destination": link }
                }
            },
            "pre-install": {
                "code": { "paths": [code_dir] },
                "hello": { "check": "false", "run": "echo hi" }
            },
            "profiles": {
                "base": { "packages": ["zsh"], "pre-install": ["code", "hello"] }
            }
        })
        .to_string(),
    )?;
    let shell = RecordingShell::new()
        .respond("brew list", ExecResult::failed(1, ""))
        .respond("false", ExecResult::failed(1, ""));
    let runner = fixture.runner(shell.clone(), true, 5);

    let document = fixture.store().load()?;
    assert!(runner.install_profile(&document, "base", &Progress::none()).await?);

    assert!(!shell.ran("brew install"));
    assert!(!shell.ran("echo hi"));
    assert!(!code_dir.exists());
    assert!(!link.exists());

    let log = fixture.log()?;
    assert!(log.contains("Command: dots install --profile base --dry-run"));
    assert!(log.contains("[DRY-RUN] Would run: brew install zsh"));
    assert!(log.contains("[DRY-RUN] Would run: echo hi"));
    assert!(log.contains(&format!("[DRY-RUN] Would create directory: {}", code_dir.display())));
    assert!(log.contains("[DRY-RUN] Would create symlink: "));
    assert!(!log.contains("Successfully installed zsh"));

    Ok(())
}

#[tokio::test]
async fn package_symlink_is_placed_and_removed() -> Result<()> {
    let fixture = DotfilesFixture::new("{}")?;
    let source = fixture.write_file("gitconfig", "[user]\n  name = John Doe")?;
    let link = fixture.path().join("home/.gitconfig");
    fixture.write_file(
        "packages.json",
        json!({
            "packages": {
                "git": {
                    "brew": "git",
                    "config": { "source": "gitconfig", "destination": link }
                }
            },
            "profiles": { "base": { "packages": ["git"] } }
        })
        .to_string(),
    )?;
    let shell = RecordingShell::new();
    let runner = fixture.runner(shell.clone(), false, 5);
    let document = fixture.store().load()?;

    let statuses = runner.check_profile(&document, "base").await?;
    assert_eq!(statuses[1].name, "git (symlink)");
    assert_eq!(statuses[1].status, Status::NotInstalled);

    // Package is already installed, the link still gets placed.
    assert!(runner.install_package(&document, "git", &Progress::none()).await);
    assert!(!shell.ran("brew install"));
    assert!(is_symlink_to(&link, &source));

    let statuses = runner.check_profile_parallel(&document, "base").await?;
    assert_eq!(statuses[1].status, Status::Installed);

    assert!(runner.uninstall_profile(&document, "base", &Progress::none()).await?);
    assert!(shell.ran("brew uninstall git"));
    assert!(!link.exists());
    assert!(source.exists());

    Ok(())
}
