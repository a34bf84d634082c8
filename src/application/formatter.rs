//! Output formatting for accounts, shares, orphans and settings.
//!
//! Supports two output formats: table view and JSON.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::domain::{
    Account, AppError, DeprovisionReport, OrphanedDirectory, Result, SectionSettings,
    ShareRecord,
};

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable tables.
    #[default]
    Table,
    /// JSON format for programmatic use.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {s}. Use: table, json")),
        }
    }
}

/// Pretty JSON for any serializable value.
///
/// # Errors
/// Returns error if serialization fails.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(AppError::json_parse)
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header);
    table
}

/// Table of accounts.
#[must_use]
pub fn format_accounts_table(accounts: &[Account]) -> String {
    let mut table = new_table(vec!["#", "Username", "Home"]);
    for (i, account) in accounts.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            account.username.clone(),
            account.home_dir.display().to_string(),
        ]);
    }
    table.to_string()
}

/// Table of share records.
#[must_use]
pub fn format_shares_table(shares: &[ShareRecord]) -> String {
    let mut table = new_table(vec!["ID", "Owner", "Shared with", "Mode", "Path", "Comment"]);
    for share in shares {
        let mode = if share.read_only { "ro" } else { "rw" };
        let comment = if share.comment.is_empty() {
            "-".to_string()
        } else {
            truncate(&share.comment, 30)
        };
        table.add_row(vec![
            share.id.clone(),
            share.owner.clone(),
            share.shared_with.join(", "),
            mode.to_string(),
            share.path.clone(),
            comment,
        ]);
    }
    table.to_string()
}

/// Table of orphaned home directories with sizes.
#[must_use]
pub fn format_orphans_table(orphans: &[OrphanedDirectory]) -> String {
    let mut table = new_table(vec!["Name", "Path", "Size"]);
    for orphan in orphans {
        table.add_row(vec![
            orphan.name.clone(),
            orphan.path.display().to_string(),
            human_size(orphan.size_bytes),
        ]);
    }
    table.to_string()
}

/// Both reserved sections as key/value tables. Unset keys show as `-`.
#[must_use]
pub fn format_settings(settings: &SectionSettings) -> String {
    let global = &settings.global;
    let homes = &settings.homes;

    let mut global_table = new_table(vec!["[global]", "Value"]);
    for (key, value) in [
        ("workgroup", &global.workgroup),
        ("server string", &global.server_string),
        ("security", &global.security),
        ("passdb backend", &global.passdb_backend),
        ("map to guest", &global.map_to_guest),
        ("access based share enum", &global.access_based_share_enum),
    ] {
        global_table.add_row(vec![key, or_dash(value)]);
    }

    let mut homes_table = new_table(vec!["[homes]", "Value"]);
    for (key, value) in [
        ("comment", &homes.comment),
        ("browseable", &homes.browseable),
        ("writable", &homes.writable),
        ("valid users", &homes.valid_users),
        ("force user", &homes.force_user),
        ("force group", &homes.force_group),
        ("create mask", &homes.create_mask),
        ("directory mask", &homes.directory_mask),
    ] {
        homes_table.add_row(vec![key, or_dash(value)]);
    }

    format!("{global_table}\n{homes_table}")
}

/// Summary of a deprovisioning run.
#[must_use]
pub fn format_report(username: &str, report: &DeprovisionReport) -> String {
    let list = |ids: &[String]| {
        if ids.is_empty() {
            "none".dimmed().to_string()
        } else {
            ids.join(", ")
        }
    };
    format!(
        "{} Removed user {}\n  Deleted shares: {}\n  Updated shares: {}\n  Home removed: {}",
        "✓".green().bold(),
        username.cyan(),
        list(&report.deleted_shares),
        list(&report.updated_shares),
        if report.home_removed { "yes".yellow() } else { "no".normal() }
    )
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

/// Byte count with a binary unit suffix.
#[must_use]
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut unit = 0;
    let mut whole = bytes;
    let mut rest = 0;
    while whole >= 1024 && unit < UNITS.len() - 1 {
        rest = whole % 1024;
        whole /= 1024;
        unit += 1;
    }
    if unit == 0 {
        format!("{whole} {}", UNITS[0])
    } else {
        format!("{whole}.{} {}", rest * 10 / 1024, UNITS[unit])
    }
}

/// Truncates a string to max length with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world!", 8), "hello...");
        assert_eq!(truncate("共享文件夹说明", 6), "共享文...");
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(1536), "1.5 KiB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("table".parse::<OutputFormat>(), Ok(OutputFormat::Table));
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("markdown".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_tables_contain_rows() {
        let shares = [ShareRecord {
            id: "alice-share-Docs".into(),
            owner: "alice".into(),
            path: "/home/samba/alice".into(),
            shared_with: vec!["bob".into(), "carol".into()],
            read_only: true,
            comment: String::new(),
            sub_path: String::new(),
        }];
        let out = format_shares_table(&shares);
        assert!(out.contains("alice-share-Docs"));
        assert!(out.contains("bob, carol"));
        assert!(out.contains("ro"));

        let orphans = [OrphanedDirectory {
            name: "ghost".into(),
            path: PathBuf::from("/home/samba/ghost"),
            size_bytes: 2048,
        }];
        assert!(format_orphans_table(&orphans).contains("2.0 KiB"));
    }

    #[test]
    fn test_json_output() {
        let accounts = [Account {
            username: "alice".into(),
            home_dir: PathBuf::from("/home/samba/alice"),
        }];
        let json = to_json(&accounts).unwrap();
        assert!(json.contains("\"username\": \"alice\""));
    }
}
