// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dots::{
    config::{BrewConfig, MasConfig, NpmConfig, PackageProvider},
    inventory::{self, InstalledKind},
    path::default_settings_file,
    registry::handler_name,
    settings::Resolved,
    ConfigStore, Context, InstallLog, ItemStatus, Package, Progress, ProgressItem, ProgressState,
    Runner, Settings, Status, SystemShell,
};

use anyhow::{bail, Result};
use clap::{ArgGroup, Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::{collections::HashMap, future::Future, path::PathBuf, process::exit, time::Duration};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "dots [options] <dots-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to settings file.
    #[arg(short, long, global = true, value_name = "path")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let settings = match self.settings {
            Some(path) => Settings::load(path)?,
            None => Settings::load(default_settings_file()?)?,
        };
        let settings = settings.resolve()?;

        match self.command {
            Command::Check(opts) => run_check(settings, opts).await,
            Command::Install(opts) => run_install(settings, opts).await,
            Command::InstallPackage(opts) => run_install_package(settings, opts).await,
            Command::Uninstall(opts) => run_uninstall(settings, opts).await,
            Command::Resolve(opts) => run_resolve(settings, opts),
            Command::List(opts) => run_list(settings, opts),
            Command::Add(opts) => run_add(settings, opts),
            Command::Remove(opts) => run_remove(settings, opts),
            Command::Untracked => run_untracked(settings).await,
            Command::Snapshot => run_snapshot(settings).await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Show status of every item in a profile.
    #[command(override_usage = "dots check [options] --profile <profile>")]
    Check(ProfileOptions),

    /// Install every item in a profile.
    #[command(override_usage = "dots install [options] --profile <profile>")]
    Install(RunOptions),

    /// Install a single package by name.
    #[command(override_usage = "dots install-package [options] <package>")]
    InstallPackage(InstallPackageOptions),

    /// Uninstall every item in a profile.
    #[command(override_usage = "dots uninstall [options] --profile <profile>")]
    Uninstall(RunOptions),

    /// Show the flattened contents of a profile.
    #[command(override_usage = "dots resolve <profile>")]
    Resolve(ResolveOptions),

    /// List known packages or profiles.
    #[command(override_usage = "dots list [options]")]
    List(ListOptions),

    /// Add package to configuration.
    #[command(override_usage = "dots add [options] <name>")]
    Add(AddOptions),

    /// Remove package from configuration and every profile.
    #[command(override_usage = "dots remove <name>")]
    Remove(RemoveOptions),

    /// List installed formulas and casks that no profile tracks.
    Untracked,

    /// Add every installed formula and cask without an entry to configuration.
    Snapshot,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ProfileOptions {
    /// Name of profile.
    #[arg(short, long, value_name = "profile")]
    pub profile: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RunOptions {
    /// Name of profile.
    #[arg(short, long, value_name = "profile")]
    pub profile: String,

    /// Log what would be done without changing anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InstallPackageOptions {
    /// Name of package entry.
    #[arg(required = true, value_name = "package")]
    pub name: String,

    /// Log what would be done without changing anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ResolveOptions {
    /// Name of profile.
    #[arg(required = true, value_name = "profile")]
    pub profile: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    /// List profiles instead of packages.
    #[arg(short, long)]
    pub profiles: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about, group(ArgGroup::new("provider").required(true)))]
struct AddOptions {
    /// Name of package entry.
    #[arg(required = true, value_name = "name")]
    pub name: String,

    /// Manage package as Homebrew formula of the same name.
    #[arg(long, group = "provider")]
    pub brew: bool,

    /// Manage package as Homebrew cask of the same name.
    #[arg(long, group = "provider")]
    pub cask: bool,

    /// Manage package as App Store app with this identifier.
    #[arg(long, group = "provider", value_name = "id")]
    pub mas: Option<u64>,

    /// Manage package as global npm package of the same name.
    #[arg(long, group = "provider")]
    pub npm: bool,

    /// Also add package to this profile.
    #[arg(short, long, value_name = "profile")]
    pub profile: Option<String>,

    /// Brief description of package.
    #[arg(short, long, value_name = "summary")]
    pub description: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RemoveOptions {
    /// Name of package entry.
    #[arg(required = true, value_name = "name")]
    pub name: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let shows_progress = matches!(
        cli.command,
        Command::Install(_) | Command::InstallPackage(_) | Command::Uninstall(_)
    );

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(if shows_progress { "warn" } else { "info" }))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn build_runner(settings: &Resolved, dry_run: bool) -> Runner {
    let log = InstallLog::new(settings.log_file.clone());
    let ctx = Context::new(
        SystemShell::new(settings.shell.clone()),
        log,
        settings.dotfiles_dir.clone(),
    )
    .with_dry_run(dry_run)
    .with_purchase_trigger(settings.purchase_trigger.clone());

    Runner::new(ctx, settings.batch_size)
}

async fn run_check(settings: Resolved, opts: ProfileOptions) -> Result<()> {
    let store = ConfigStore::open(settings.config_file.clone());
    let document = store.load()?;
    let runner = build_runner(&settings, false);

    let statuses = runner
        .check_profile_parallel(&document, &opts.profile)
        .await?;
    for status in &statuses {
        print_status(status);
    }

    let installed = statuses
        .iter()
        .filter(|status| status.status == Status::Installed)
        .count();
    println!("\n{installed}/{} installed", statuses.len());

    Ok(())
}

fn print_status(item: &ItemStatus) {
    let icon = match item.status {
        Status::Installed => "✓",
        Status::NotInstalled => "✗",
        Status::Modified => "~",
        Status::Error => "!",
    };
    match &item.description {
        Some(description) => println!(
            "{icon} {:<28} {:<32} {description}",
            item.name, item.message
        ),
        None => println!("{icon} {:<28} {}", item.name, item.message),
    }
}

async fn run_install(settings: Resolved, opts: RunOptions) -> Result<()> {
    let store = ConfigStore::open(settings.config_file.clone());
    let document = store.load()?;
    let runner = &build_runner(&settings, opts.dry_run);
    let document = &document;
    let profile = opts.profile.as_str();

    let success = with_progress(|progress| async move {
        runner.install_profile(document, profile, &progress).await
    })
    .await?;

    if !success {
        bail!(
            "install of profile {profile} had failures, see {}",
            settings.log_file.display()
        );
    }
    info!("profile {profile} installed");

    Ok(())
}

async fn run_install_package(settings: Resolved, opts: InstallPackageOptions) -> Result<()> {
    let store = ConfigStore::open(settings.config_file.clone());
    let document = store.load()?;
    let runner = &build_runner(&settings, opts.dry_run);
    let document = &document;
    let name = opts.name.as_str();

    let success = with_progress(|progress| async move {
        runner.install_package(document, name, &progress).await
    })
    .await;

    if !success {
        bail!(
            "install of package {name} failed, see {}",
            settings.log_file.display()
        );
    }

    Ok(())
}

async fn run_uninstall(settings: Resolved, opts: RunOptions) -> Result<()> {
    let store = ConfigStore::open(settings.config_file.clone());
    let document = store.load()?;
    let runner = &build_runner(&settings, opts.dry_run);
    let document = &document;
    let profile = opts.profile.as_str();

    let success = with_progress(|progress| async move {
        runner.uninstall_profile(document, profile, &progress).await
    })
    .await?;

    if !success {
        bail!(
            "uninstall of profile {profile} had failures, see {}",
            settings.log_file.display()
        );
    }

    Ok(())
}

/// Run job while rendering its progress events as spinners.
async fn with_progress<F, Fut, T>(job: F) -> T
where
    F: FnOnce(Progress) -> Fut,
    Fut: Future<Output = T>,
{
    let (progress, receiver) = Progress::channel();

    // INVARIANT: The job owns the only sender, so rendering ends with the job.
    let (result, ()) = tokio::join!(job(progress), render(receiver));
    result
}

async fn render(mut receiver: UnboundedReceiver<ProgressItem>) {
    let multi = MultiProgress::new();
    let style = ProgressStyle::with_template("{spinner} {prefix:28.bold} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let mut bars: HashMap<String, ProgressBar> = HashMap::new();

    while let Some(item) = receiver.recv().await {
        let bar = bars.entry(item.name.clone()).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new_spinner());
            bar.set_style(style.clone());
            bar.set_prefix(item.name.clone());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });

        let message = item.message.unwrap_or_default();
        match item.state {
            ProgressState::Pending | ProgressState::InProgress => bar.set_message(message),
            ProgressState::Done => bar.finish_with_message(format!("✓ {message}")),
            ProgressState::Error => bar.finish_with_message(format!("✗ {message}")),
        }
    }
}

fn run_resolve(settings: Resolved, opts: ResolveOptions) -> Result<()> {
    let store = ConfigStore::open(settings.config_file);
    let resolved = store.resolve_profile(&opts.profile)?;

    println!("pre-install:");
    for task in &resolved.pre_install {
        println!("  {task}");
    }
    println!("packages:");
    for package in &resolved.packages {
        println!("  {package}");
    }

    Ok(())
}

fn run_list(settings: Resolved, opts: ListOptions) -> Result<()> {
    let store = ConfigStore::open(settings.config_file);
    let document = store.load()?;

    if opts.profiles {
        for name in document.profiles.keys() {
            let resolved = store.resolve_profile(name)?;
            println!(
                "{name:<20} {} packages, {} pre-install tasks",
                resolved.packages.len(),
                resolved.pre_install.len()
            );
        }
        return Ok(());
    }

    for (name, package) in &document.packages {
        println!(
            "{name:<28} {:<10} {}",
            handler_name(package),
            package.description.as_deref().unwrap_or_default()
        );
    }

    Ok(())
}

fn run_add(settings: Resolved, opts: AddOptions) -> Result<()> {
    let provider = if let Some(id) = opts.mas {
        PackageProvider::Mas(MasConfig { mas: id })
    } else if opts.npm {
        PackageProvider::Npm(NpmConfig {
            npm: opts.name.clone(),
            options: None,
        })
    } else {
        PackageProvider::Brew(BrewConfig {
            brew: opts.name.clone(),
            cask: opts.cask.then_some(true),
            ..Default::default()
        })
    };

    let mut package = Package::new(provider);
    if let Some(description) = opts.description {
        package = package.with_description(description);
    }

    let store = ConfigStore::open(settings.config_file);
    store.add_package(opts.name.as_str(), package)?;
    info!("added package {}", opts.name);

    if let Some(profile) = opts.profile {
        if !store.add_package_to_profile(&opts.name, &profile)? {
            bail!("profile {profile} does not exist");
        }
        info!("added package {} to profile {profile}", opts.name);
    }

    Ok(())
}

fn run_remove(settings: Resolved, opts: RemoveOptions) -> Result<()> {
    let store = ConfigStore::open(settings.config_file);
    if !store.remove_package(&opts.name)? {
        bail!("package {} does not exist", opts.name);
    }
    info!("removed package {}", opts.name);

    Ok(())
}

async fn run_untracked(settings: Resolved) -> Result<()> {
    let store = ConfigStore::open(settings.config_file.clone());
    let document = store.load()?;
    let shell = SystemShell::new(settings.shell);

    let untracked = inventory::untracked(&document, inventory::installed(&shell).await);
    for kind in [InstalledKind::Formula, InstalledKind::Cask] {
        let names = untracked
            .iter()
            .filter(|item| item.kind == kind)
            .map(|item| item.name.as_str())
            .collect::<Vec<_>>();
        println!("{kind}s ({}):", names.len());
        for name in names {
            println!("  {name}");
        }
    }

    Ok(())
}

async fn run_snapshot(settings: Resolved) -> Result<()> {
    let store = ConfigStore::open(settings.config_file.clone());
    let shell = SystemShell::new(settings.shell);

    let added = inventory::snapshot(&shell, &store).await?;
    if added.is_empty() {
        info!("configuration already covers every installed package");
        return Ok(());
    }

    for name in &added {
        println!("  {name}");
    }
    info!(
        "added {} packages to {}, use 'dots add' to put them in a profile",
        added.len(),
        store.path().display()
    );

    Ok(())
}
