//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for operators.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use samba_manager::application::OutputFormat;

/// Samba Manager - manage smb.conf shares and Samba accounts.
///
/// Every change is serialized through one worker and validated before it reaches smb.conf.
#[derive(Parser, Debug)]
#[command(name = "samba-manager")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to the user config directory).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format: table or json.
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default configuration file if none exists.
    Init,

    /// Manage Samba accounts.
    #[command(subcommand)]
    Users(UserCommands),

    /// Manage generated share sections.
    #[command(subcommand)]
    Shares(ShareCommands),

    /// Inspect or change the [global] and [homes] sections.
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Home directories without an account.
    #[command(subcommand)]
    Orphans(OrphanCommands),

    /// Show the running service's session status.
    Status,
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// List accounts.
    List {
        /// Only show usernames containing this text.
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Create an account with its home directory (password read from stdin).
    Add {
        username: String,
    },

    /// Remove an account and every share that references it.
    Remove {
        username: String,

        /// Also delete the home directory.
        #[arg(long)]
        purge_home: bool,
    },

    /// Set a new password (read from stdin).
    Passwd {
        username: String,
    },
}

/// Share attributes shared by `add` and `update`.
#[derive(Args, Debug)]
pub struct ShareArgs {
    /// Users granted access, comma separated.
    #[arg(short = 'w', long = "with", value_delimiter = ',', required = true)]
    pub shared_with: Vec<String>,

    /// Export the share read-only.
    #[arg(long)]
    pub read_only: bool,

    /// Free-text comment.
    #[arg(long, default_value = "")]
    pub comment: String,

    /// Directory below the owner's home.
    #[arg(long, default_value = "")]
    pub sub_path: String,
}

#[derive(Subcommand, Debug)]
pub enum ShareCommands {
    /// List shares.
    List {
        /// Only shares owned by this user.
        #[arg(long, conflicts_with = "visible_to")]
        owner: Option<String>,

        /// Only shares this user owns or is granted.
        #[arg(long)]
        visible_to: Option<String>,
    },

    /// Create a share in the owner's home directory.
    Add {
        /// Owning user.
        #[arg(short, long)]
        owner: String,

        /// Share name (letters, digits, CJK); a timestamp is used if omitted.
        #[arg(short, long, default_value = "")]
        name: String,

        #[command(flatten)]
        share: ShareArgs,
    },

    /// Regenerate a share from new attributes.
    Update {
        /// Share id, e.g. alice-share-Docs.
        id: String,

        #[command(flatten)]
        share: ShareArgs,
    },

    /// Remove a share section. The directory is kept.
    Remove {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show known [global] and [homes] keys.
    Show,

    /// Rewrite existing keys, e.g. --global workgroup=OFFICE.
    Set {
        /// [global] key=value pairs.
        #[arg(long = "global", value_name = "KEY=VALUE")]
        global: Vec<String>,

        /// [homes] key=value pairs.
        #[arg(long = "homes", value_name = "KEY=VALUE")]
        homes: Vec<String>,
    },

    /// Print the raw smb.conf.
    Raw,

    /// Replace smb.conf with FILE ('-' for stdin), reverting if it does not validate.
    Replace {
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum OrphanCommands {
    /// List orphaned home directories with sizes.
    List,

    /// Delete an orphaned home directory.
    Remove {
        name: String,
    },
}

impl Cli {
    /// Parse the output format argument.
    pub fn output_format(&self) -> Result<OutputFormat, String> {
        self.format.parse()
    }
}
