// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Symlink manager.
//!
//! Links a path inside of the dotfiles directory to a destination somewhere
//! else, typically inside of the home directory. Whatever already occupies the
//! destination is backed up first, unless it is a symlink, which is simply
//! replaced.

use crate::{
    backup::backup_file,
    config::SymlinkConfig,
    handler::{CheckResult, Context, Handler},
    path::{expand_path, normalize, resolve_against},
    shell::Shell,
};

use mkdirp::mkdirp;
use std::{
    fs::{read_link, remove_file, symlink_metadata},
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};
use tracing::instrument;

/// Handler for symlinks into the dotfiles directory.
#[derive(Default, Debug, Clone, Copy)]
pub struct Symlink;

impl Symlink {
    fn source<S: Shell>(ctx: &Context<S>, config: &SymlinkConfig) -> PathBuf {
        resolve_against(ctx.dotfiles_dir(), &config.source)
    }
}

impl Handler for Symlink {
    type Config = SymlinkConfig;

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn check<S: Shell>(
        &self,
        ctx: &Context<S>,
        config: &SymlinkConfig,
        name: &str,
    ) -> CheckResult {
        let source = Self::source(ctx, config);
        let dest = expand_path(&config.destination);

        if !source.exists() {
            return CheckResult::error(format!("Source not found: {}", source.display()));
        }

        let Ok(meta) = symlink_metadata(&dest) else {
            return CheckResult::not_installed(format!("Symlink missing: {}", config.destination));
        };

        if !meta.file_type().is_symlink() {
            return CheckResult::modified(format!("Not a symlink: {}", config.destination));
        }

        if is_symlink_to(&dest, &source) {
            return CheckResult::installed("Symlink correct");
        }

        let target = read_link(&dest)
            .map(|target| target.display().to_string())
            .unwrap_or_default();
        CheckResult::modified(format!("Points to: {target}"))
    }

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn install<S: Shell>(&self, ctx: &Context<S>, config: &SymlinkConfig, name: &str) -> bool {
        let source = Self::source(ctx, config);
        let dest = expand_path(&config.destination);

        if !source.exists() {
            ctx.log().append(format!(
                "Symlink source not found for {name}: {}",
                source.display()
            ));
            return false;
        }

        if ctx.is_dry_run() {
            ctx.log().would(format!(
                "create symlink: {} -> {}",
                dest.display(),
                source.display()
            ));
            return true;
        }

        match place_link(ctx, &source, &dest) {
            Ok(()) => {
                ctx.log().append(format!(
                    "Created symlink: {} -> {}",
                    dest.display(),
                    source.display()
                ));
                true
            }
            Err(error) => {
                ctx.log()
                    .append(format!("Failed to create symlink for {name}: {error}"));
                false
            }
        }
    }

    #[instrument(skip(self, ctx, config), level = "debug")]
    async fn uninstall<S: Shell>(
        &self,
        ctx: &Context<S>,
        config: &SymlinkConfig,
        name: &str,
    ) -> bool {
        let source = Self::source(ctx, config);
        let dest = expand_path(&config.destination);

        let Ok(meta) = symlink_metadata(&dest) else {
            return true;
        };

        // INVARIANT: Only ever remove a link that points at our own source.
        if !meta.file_type().is_symlink() {
            ctx.log().append(format!(
                "Not removing {}: not a symlink",
                dest.display()
            ));
            return true;
        }

        if !is_symlink_to(&dest, &source) {
            ctx.log().append(format!(
                "Not removing {}: points elsewhere",
                dest.display()
            ));
            return true;
        }

        if ctx.is_dry_run() {
            ctx.log()
                .would(format!("remove symlink: {}", dest.display()));
            return true;
        }

        match remove_file(&dest) {
            Ok(()) => {
                ctx.log()
                    .append(format!("Removed symlink: {}", dest.display()));
                true
            }
            Err(error) => {
                ctx.log()
                    .append(format!("Failed to remove symlink for {name}: {error}"));
                false
            }
        }
    }
}

fn place_link<S: Shell>(ctx: &Context<S>, source: &Path, dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        mkdirp(parent)?;
    }

    if let Ok(meta) = symlink_metadata(dest) {
        if meta.file_type().is_symlink() {
            remove_file(dest)?;
            ctx.log()
                .append(format!("Removed existing symlink: {}", dest.display()));
        } else if let Some(backup) = backup_file(dest)? {
            ctx.log()
                .append(format!("Backed up existing file to: {}", backup.display()));
        }
    }

    symlink(source, dest)
}

/// Check that link resolves to target.
///
/// Relative link targets are resolved against the directory holding the link.
pub fn is_symlink_to(link: impl AsRef<Path>, target: impl AsRef<Path>) -> bool {
    let link = link.as_ref();
    let Ok(points_to) = read_link(link) else {
        return false;
    };

    let base = link.parent().unwrap_or(Path::new("/"));
    normalize(base.join(points_to)) == normalize(target.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        handler::{testing::Fixture, Status},
        shell::testing::ScriptedShell,
    };
    use pretty_assertions::assert_eq;
    use std::fs::{create_dir_all, read_to_string, write};

    fn link(fixture: &Fixture, source: &str, dest: &str) -> SymlinkConfig {
        SymlinkConfig {
            source: source.into(),
            destination: fixture.dir.path().join(dest).display().to_string(),
        }
    }

    #[tokio::test]
    async fn check_walks_every_state() -> anyhow::Result<()> {
        let fixture = Fixture::new(ScriptedShell::new())?;
        let home = fixture.dir.path().join("home");
        create_dir_all(&home)?;
        write(fixture.dir.path().join("vimrc"), "set nu")?;
        write(fixture.dir.path().join("other"), "")?;

        let result = Symlink.check(&fixture.ctx, &link(&fixture, "nope", "home/.nope"), "x").await;
        assert_eq!(result.status, Status::Error);

        let config = link(&fixture, "vimrc", "home/.vimrc");
        let result = Symlink.check(&fixture.ctx, &config, "vim").await;
        assert_eq!(result.status, Status::NotInstalled);

        write(home.join(".vimrc"), "mine")?;
        let result = Symlink.check(&fixture.ctx, &config, "vim").await;
        assert_eq!(result.status, Status::Modified);
        assert!(result.message.starts_with("Not a symlink: "));

        std::fs::remove_file(home.join(".vimrc"))?;
        symlink(fixture.dir.path().join("other"), home.join(".vimrc"))?;
        let result = Symlink.check(&fixture.ctx, &config, "vim").await;
        assert_eq!(result.status, Status::Modified);
        assert!(result.message.starts_with("Points to: "));

        std::fs::remove_file(home.join(".vimrc"))?;
        symlink("../vimrc", home.join(".vimrc"))?;
        let result = Symlink.check(&fixture.ctx, &config, "vim").await;
        assert_eq!(result, CheckResult::installed("Symlink correct"));

        Ok(())
    }

    #[tokio::test]
    async fn install_backs_up_then_links() -> anyhow::Result<()> {
        let fixture = Fixture::new(ScriptedShell::new())?;
        write(fixture.dir.path().join("gitconfig"), "[user]")?;
        let dest = fixture.dir.path().join("home/deep/.gitconfig");
        create_dir_all(fixture.dir.path().join("home/deep"))?;
        write(&dest, "old")?;

        let config = link(&fixture, "gitconfig", "home/deep/.gitconfig");
        assert!(Symlink.install(&fixture.ctx, &config, "git").await);
        assert_eq!(read_to_string(&dest)?, "[user]");
        assert_eq!(
            read_to_string(fixture.dir.path().join("home/deep/.gitconfig.backup1"))?,
            "old"
        );

        // Re-install replaces the link instead of backing it up.
        assert!(Symlink.install(&fixture.ctx, &config, "git").await);
        assert!(!fixture.dir.path().join("home/deep/.gitconfig.backup2").exists());
        assert_eq!(
            Symlink.check(&fixture.ctx, &config, "git").await.status,
            Status::Installed
        );

        Ok(())
    }

    #[tokio::test]
    async fn install_creates_missing_parents() -> anyhow::Result<()> {
        let fixture = Fixture::new(ScriptedShell::new())?;
        write(fixture.dir.path().join("init.lua"), "")?;
        let config = link(&fixture, "init.lua", "home/.config/nvim/init.lua");

        assert!(Symlink.install(&fixture.ctx, &config, "nvim").await);
        assert!(is_symlink_to(
            fixture.dir.path().join("home/.config/nvim/init.lua"),
            fixture.dir.path().join("init.lua")
        ));

        Ok(())
    }

    #[tokio::test]
    async fn uninstall_only_removes_own_links() -> anyhow::Result<()> {
        let fixture = Fixture::new(ScriptedShell::new())?;
        write(fixture.dir.path().join("zshrc"), "")?;
        write(fixture.dir.path().join("elsewhere"), "")?;
        let config = link(&fixture, "zshrc", ".zshrc");
        let dest = fixture.dir.path().join(".zshrc");

        symlink(fixture.dir.path().join("elsewhere"), &dest)?;
        assert!(Symlink.uninstall(&fixture.ctx, &config, "zsh").await);
        assert!(symlink_metadata(&dest).is_ok());

        std::fs::remove_file(&dest)?;
        symlink(fixture.dir.path().join("zshrc"), &dest)?;
        assert!(Symlink.uninstall(&fixture.ctx, &config, "zsh").await);
        assert!(symlink_metadata(&dest).is_err());

        assert!(Symlink.uninstall(&fixture.ctx, &config, "zsh").await);

        Ok(())
    }

    #[tokio::test]
    async fn dry_run_leaves_destination_alone() -> anyhow::Result<()> {
        let fixture = Fixture::new(ScriptedShell::new())?.dry_run();
        write(fixture.dir.path().join("tmux.conf"), "")?;
        let config = link(&fixture, "tmux.conf", ".tmux.conf");

        assert!(Symlink.install(&fixture.ctx, &config, "tmux").await);
        assert!(symlink_metadata(fixture.dir.path().join(".tmux.conf")).is_err());
        assert_eq!(fixture.log_lines().len(), 1);
        assert!(fixture.log_lines()[0].starts_with("[DRY-RUN] Would create symlink: "));

        Ok(())
    }
}
