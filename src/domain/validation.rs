//! Input validation shared by every component.
//!
//! Usernames and share names reach process arguments and filesystem paths,
//! so they are checked against fixed patterns before any use.

use std::sync::LazyLock;

use regex::Regex;

use super::error::{AppError, Result};

#[allow(clippy::unwrap_used)]
static ACCOUNT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{1,32}$").unwrap()
});

#[allow(clippy::unwrap_used)]
static RECORD_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9\p{Han}]+$").unwrap()
});

#[allow(clippy::unwrap_used)]
static SHARE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_-]+)-share-(.+)$").unwrap()
});

/// Whether `name` is a usable account name: 1-32 of `[A-Za-z0-9_-]`.
#[must_use]
pub fn is_valid_account_name(name: &str) -> bool {
    ACCOUNT_NAME.is_match(name)
}

/// Whether `name` is a usable custom share name: letters, digits or Han characters.
#[must_use]
pub fn is_valid_record_name(name: &str) -> bool {
    RECORD_NAME.is_match(name)
}

/// Splits a generated share id into `(owner, suffix)`.
///
/// Returns `None` for section names that are not generated shares.
#[must_use]
pub fn parse_share_id(id: &str) -> Option<(&str, &str)> {
    let caps = SHARE_ID.captures(id)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Returns the account name or a validation error naming the field.
///
/// # Errors
/// Returns `AppError::Validation` if the name does not match the account pattern.
pub fn require_account_name<'a>(name: &'a str, field: &str) -> Result<&'a str> {
    if is_valid_account_name(name) {
        Ok(name)
    } else {
        Err(AppError::validation(format!(
            "{field} '{name}' must be 1-32 letters, numbers, underscores or dashes"
        )))
    }
}

/// Normalizes a subdirectory path relative to a home directory.
///
/// Redundant separators and `.` segments collapse, `a/../b` folds to `b`, and a
/// leading separator is dropped. An empty result means the home directory itself.
///
/// # Errors
/// Returns `AppError::Validation` if a `..` segment survives cleaning.
pub fn clean_subpath(raw: &str) -> Result<String> {
    let rooted = raw.starts_with('/') || raw.starts_with('\\');
    let mut segments: Vec<&str> = Vec::new();

    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                // `/..` is `/`
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let cleaned = segments.join("/");
    let cleaned = cleaned.trim_start_matches('\\');

    if cleaned.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(AppError::validation(
            "invalid subdirectory path: path traversal not allowed",
        ));
    }

    Ok(cleaned.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_names() {
        assert!(is_valid_account_name("alice"));
        assert!(is_valid_account_name("Bob_2-x"));
        assert!(is_valid_account_name(&"a".repeat(32)));
        assert!(!is_valid_account_name(&"a".repeat(33)));
        assert!(!is_valid_account_name(""));
        assert!(!is_valid_account_name("alice;rm"));
        assert!(!is_valid_account_name("al ice"));
        assert!(!is_valid_account_name("../etc"));
    }

    #[test]
    fn test_record_names() {
        assert!(is_valid_record_name("Docs"));
        assert!(is_valid_record_name("项目2025"));
        assert!(!is_valid_record_name(""));
        assert!(!is_valid_record_name("my-docs"));
        assert!(!is_valid_record_name("a b"));
        assert!(!is_valid_record_name("x]"));
    }

    #[test]
    fn test_parse_share_id() {
        assert_eq!(parse_share_id("alice-share-Docs"), Some(("alice", "Docs")));
        assert_eq!(
            parse_share_id("bob-smith-share-20250101120000"),
            Some(("bob-smith", "20250101120000"))
        );
        assert_eq!(parse_share_id("homes"), None);
        assert_eq!(parse_share_id("alice-share-"), None);
    }

    #[test]
    fn test_clean_subpath_rejects_traversal() {
        assert!(clean_subpath("../x").is_err());
        assert!(clean_subpath("a/../../b").is_err());
        assert!(clean_subpath("..").is_err());
        assert!(clean_subpath("x/../../../etc").is_err());
    }

    #[test]
    fn test_clean_subpath_normalizes() {
        assert_eq!(clean_subpath("./").unwrap(), "");
        assert_eq!(clean_subpath("").unwrap(), "");
        assert_eq!(clean_subpath(".").unwrap(), "");
        assert_eq!(clean_subpath("a/./b").unwrap(), "a/b");
        assert_eq!(clean_subpath("/projects//2025/").unwrap(), "projects/2025");
        assert_eq!(clean_subpath("a/../b").unwrap(), "b");
        assert_eq!(clean_subpath("/../x").unwrap(), "x");
    }

    #[test]
    fn test_require_account_name() {
        assert_eq!(require_account_name("carol", "owner").unwrap(), "carol");
        let err = require_account_name("car ol", "owner").unwrap_err();
        assert!(err.to_string().contains("owner 'car ol'"));
    }
}
