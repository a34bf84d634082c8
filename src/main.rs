//! Samba Manager - manage smb.conf shares and Samba accounts from the command line.
//!
//! Mutations run one at a time on the service's queue; reads go straight to smb.conf
//! under a shared lock.
//!
//! Examples:
//!   samba-manager init
//!   samba-manager users add alice < password.txt
//!   samba-manager shares add --owner alice --with bob,carol --name Docs
//!   samba-manager config set --global workgroup=OFFICE
//!   samba-manager orphans list -f json

mod cli;

use std::fs;
use std::io::{self, BufRead, Read};
use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use samba_manager::application::sections::normalize_key;
use samba_manager::application::{
    format_accounts_table, format_orphans_table, format_report, format_settings,
    format_shares_table, to_json, AppContext, ManagerService, OutputFormat,
};
use samba_manager::domain::{
    AppConfig, GlobalSettings, HomesSettings, NewShare, SettingsUpdate, ShareFilter, ShareScope,
    ShareSpec,
};
use samba_manager::infrastructure::{ensure_config_exists, load_config};

use cli::{Cli, Commands, ConfigCommands, OrphanCommands, ShareArgs, ShareCommands, UserCommands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli.output_format().map_err(anyhow::Error::msg)?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(AppConfig::default_config_path);

    if matches!(cli.command, Commands::Init) {
        return cmd_init(&config_path);
    }

    let config = load_config(&config_path)?;
    let ctx = AppContext::from_config(config);
    let service = ManagerService::start(&ctx)?;

    let result = dispatch(&service, cli.command, format, &config_path).await;
    service.shutdown().await;
    result
}

async fn dispatch(
    service: &ManagerService,
    command: Commands,
    format: OutputFormat,
    config_path: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Init => cmd_init(config_path),
        Commands::Users(command) => cmd_users(service, command, format).await,
        Commands::Shares(command) => cmd_shares(service, command, format).await,
        Commands::Config(command) => cmd_config(service, command, format).await,
        Commands::Orphans(command) => cmd_orphans(service, command, format).await,
        Commands::Status => {
            let status = service.service_status().await?;
            print_output(format, &status, || status.clone())
        }
    }
}

/// Create the default configuration file.
fn cmd_init(path: &Path) -> anyhow::Result<()> {
    if ensure_config_exists(path)? {
        println!("{} Created {}", "✓".green().bold(), path.display());
    } else {
        println!("{} already exists", path.display());
    }
    Ok(())
}

async fn cmd_users(service: &ManagerService, command: UserCommands, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        UserCommands::List { search } => {
            let mut accounts = service.list_accounts().await?;
            if let Some(search) = search {
                let needle = search.to_lowercase();
                accounts.retain(|a| a.username.to_lowercase().contains(&needle));
            }
            print_output(format, &accounts, || format_accounts_table(&accounts))
        }
        UserCommands::Add { username } => {
            let secret = read_secret()?;
            let account = service.provision_user(&username, &secret).await?;
            print_output(format, &account, || {
                format!(
                    "{} Created user {} ({})",
                    "✓".green().bold(),
                    account.username.cyan(),
                    account.home_dir.display()
                )
            })
        }
        UserCommands::Remove {
            username,
            purge_home,
        } => {
            let report = service.deprovision_user(&username, purge_home).await?;
            print_output(format, &report, || format_report(&username, &report))
        }
        UserCommands::Passwd { username } => {
            let secret = read_secret()?;
            service.change_credential(&username, &secret).await?;
            println!("{} Password updated for {}", "✓".green().bold(), username.cyan());
            Ok(())
        }
    }
}

fn share_spec(args: ShareArgs) -> ShareSpec {
    ShareSpec {
        shared_with: args.shared_with,
        read_only: args.read_only,
        comment: args.comment,
        sub_path: args.sub_path,
    }
}

async fn cmd_shares(service: &ManagerService, command: ShareCommands, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        ShareCommands::List { owner, visible_to } => {
            let filter = match (owner, visible_to) {
                (Some(owner), _) => ShareFilter::OwnedBy(owner),
                (None, Some(user)) => ShareFilter::VisibleTo(user),
                (None, None) => ShareFilter::All,
            };
            let shares = service.list_shares(filter).await?;
            print_output(format, &shares, || format_shares_table(&shares))
        }
        ShareCommands::Add { owner, name, share } => {
            let record = service
                .create_share(NewShare {
                    owner,
                    name,
                    spec: share_spec(share),
                })
                .await?;
            print_output(format, &record, || {
                format!("{} Created share {}", "✓".green().bold(), record.id.cyan())
            })
        }
        ShareCommands::Update { id, share } => {
            let record = service
                .update_share(&id, share_spec(share), ShareScope::Any)
                .await?;
            print_output(format, &record, || {
                format!("{} Updated share {}", "✓".green().bold(), record.id.cyan())
            })
        }
        ShareCommands::Remove { id } => {
            service.delete_share(&id, ShareScope::Any).await?;
            println!("{} Removed share {}", "✓".green().bold(), id.cyan());
            Ok(())
        }
    }
}

async fn cmd_config(service: &ManagerService, command: ConfigCommands, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Show => {
            let settings = service.settings().await?;
            print_output(format, &settings, || format_settings(&settings))
        }
        ConfigCommands::Set { global, homes } => {
            if global.is_empty() && homes.is_empty() {
                bail!("nothing to set: pass --global or --homes KEY=VALUE");
            }
            let update = settings_update(&global, &homes)?;
            let changed = service.update_settings(update).await?;
            println!("{} {} line(s) changed", "✓".green().bold(), changed);
            Ok(())
        }
        ConfigCommands::Raw => {
            let raw = service.raw().await?;
            print_output(format, &raw, || raw.content.clone())
        }
        ConfigCommands::Replace { file } => {
            let content = read_replacement(&file)?;
            service.replace_raw(content).await?;
            println!("{} Configuration replaced and validated", "✓".green().bold());
            Ok(())
        }
    }
}

async fn cmd_orphans(service: &ManagerService, command: OrphanCommands, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        OrphanCommands::List => {
            let orphans = service.list_orphans().await?;
            print_output(format, &orphans, || format_orphans_table(&orphans))
        }
        OrphanCommands::Remove { name } => {
            service.delete_orphan(&name).await?;
            println!("{} Deleted orphaned directory {}", "✓".green().bold(), name.cyan());
            Ok(())
        }
    }
}

/// Print `value` as JSON or the table/text produced by `render`.
fn print_output<T, F>(format: OutputFormat, value: &T, render: F) -> anyhow::Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce() -> String,
{
    let output = match format {
        OutputFormat::Json => to_json(value)?,
        OutputFormat::Table => render(),
    };
    println!("{output}");
    Ok(())
}

/// Builds a settings update from `key=value` pairs.
///
/// Keys match ignoring case, spaces, underscores and dashes.
fn settings_update(global: &[String], homes: &[String]) -> anyhow::Result<SettingsUpdate> {
    let mut update = SettingsUpdate::default();

    if !global.is_empty() {
        let mut settings = GlobalSettings::default();
        for pair in global {
            let (key, value) = split_pair(pair)?;
            let slot = settings
                .field_mut(&key)
                .with_context(|| format!("unknown [global] key '{pair}'"))?;
            *slot = value;
        }
        update.global = Some(settings);
    }

    if !homes.is_empty() {
        let mut settings = HomesSettings::default();
        for pair in homes {
            let (key, value) = split_pair(pair)?;
            let slot = settings
                .field_mut(&key)
                .with_context(|| format!("unknown [homes] key '{pair}'"))?;
            *slot = value;
        }
        update.homes = Some(settings);
    }

    Ok(update)
}

fn split_pair(pair: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = pair
        .split_once('=')
        .with_context(|| format!("expected KEY=VALUE, got '{pair}'"))?;
    let key = normalize_key(key).replace(['_', '-'], "");
    Ok((key, value.trim().to_string()))
}

/// Reads one line from stdin, without the line ending.
fn read_secret() -> anyhow::Result<String> {
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    let secret = line.trim_end_matches(['\r', '\n']).to_string();
    if secret.is_empty() {
        bail!("no password given on stdin");
    }
    Ok(secret)
}

fn read_replacement(file: &Path) -> anyhow::Result<String> {
    if file == Path::new("-") {
        let mut content = String::new();
        io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read replacement config from stdin")?;
        Ok(content)
    } else {
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
    }
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time().with_writer(io::stderr))
        .with(filter)
        .init();
}
