//! Domain models for shares, accounts and the reserved config sections.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A generated share section (`owner-share-suffix`) as read from smb.conf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    /// Section header, e.g. `alice-share-Docs` or `alice-share-20251128184826`.
    pub id: String,
    /// Owner username taken from the header.
    pub owner: String,
    /// Shared directory as stored in the `path` key.
    pub path: String,
    /// Users granted access. The owner is implicit and never listed.
    pub shared_with: Vec<String>,
    pub read_only: bool,
    pub comment: String,
    /// Path relative to the owner's home, empty for the home itself.
    pub sub_path: String,
}

impl ShareRecord {
    /// Whether `username` owns or is granted this share.
    #[must_use]
    pub fn is_visible_to(&self, username: &str) -> bool {
        self.owner == username || self.shared_with.iter().any(|u| u == username)
    }

    /// Mutable attributes of this record, as used to regenerate its body.
    #[must_use]
    pub fn spec(&self) -> ShareSpec {
        ShareSpec {
            shared_with: self.shared_with.clone(),
            read_only: self.read_only,
            comment: self.comment.clone(),
            sub_path: self.sub_path.clone(),
        }
    }
}

/// Attributes written into a share body. Owner is not part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSpec {
    pub shared_with: Vec<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub sub_path: String,
}

/// Request to create a share.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewShare {
    pub owner: String,
    /// Optional custom name; a timestamp suffix is used when empty.
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub spec: ShareSpec,
}

/// Who is asking for a share mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareScope {
    /// Administrative access to every share.
    Any,
    /// Self-service access limited to shares owned by this user.
    Owner(String),
}

/// Optional narrowing of a share listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ShareFilter {
    #[default]
    All,
    OwnedBy(String),
    VisibleTo(String),
}

impl ShareFilter {
    /// Whether `record` passes this filter.
    #[must_use]
    pub fn matches(&self, record: &ShareRecord) -> bool {
        match self {
            Self::All => true,
            Self::OwnedBy(owner) => record.owner == *owner,
            Self::VisibleTo(user) => record.is_visible_to(user),
        }
    }
}

/// Share deletions and rewrites computed before a user is removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalPlan {
    pub delete: Vec<String>,
    pub update: Vec<ShareRecord>,
}

impl RemovalPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.update.is_empty()
    }

    /// Ids of the shares that will be rewritten.
    #[must_use]
    pub fn updated_ids(&self) -> Vec<String> {
        self.update.iter().map(|r| r.id.clone()).collect()
    }
}

/// What deprovisioning a user changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeprovisionReport {
    pub deleted_shares: Vec<String>,
    pub updated_shares: Vec<String>,
    pub home_removed: bool,
}

/// An account known to the password database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub home_dir: PathBuf,
}

/// A directory under the home root with no matching account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanedDirectory {
    pub name: String,
    pub path: PathBuf,
    /// Total size of readable files in bytes.
    pub size_bytes: u64,
}

/// Raw smb.conf content together with its location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawConfig {
    pub path: PathBuf,
    pub content: String,
}

/// Known keys of the `[global]` section.
///
/// Empty fields mean "not set" when read and "leave alone" when updating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    pub workgroup: String,
    pub server_string: String,
    pub security: String,
    pub passdb_backend: String,
    pub map_to_guest: String,
    pub access_based_share_enum: String,
}

impl GlobalSettings {
    /// Slot for a normalized key (lower-case, no whitespace).
    pub fn field_mut(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "workgroup" => Some(&mut self.workgroup),
            "serverstring" => Some(&mut self.server_string),
            "security" => Some(&mut self.security),
            "passdbbackend" => Some(&mut self.passdb_backend),
            "maptoguest" => Some(&mut self.map_to_guest),
            "accessbasedshareenum" => Some(&mut self.access_based_share_enum),
            _ => None,
        }
    }

    /// Value for a normalized key, if known.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        let value = match key {
            "workgroup" => &self.workgroup,
            "serverstring" => &self.server_string,
            "security" => &self.security,
            "passdbbackend" => &self.passdb_backend,
            "maptoguest" => &self.map_to_guest,
            "accessbasedshareenum" => &self.access_based_share_enum,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// Known keys of the `[homes]` section, synonyms folded together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomesSettings {
    pub comment: String,
    pub browseable: String,
    pub writable: String,
    pub valid_users: String,
    pub force_user: String,
    pub force_group: String,
    pub create_mask: String,
    pub directory_mask: String,
}

impl HomesSettings {
    /// Slot for a normalized key (lower-case, no whitespace).
    pub fn field_mut(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "comment" => Some(&mut self.comment),
            "browseable" | "browsable" => Some(&mut self.browseable),
            "writable" | "writeable" => Some(&mut self.writable),
            "validusers" => Some(&mut self.valid_users),
            "forceuser" => Some(&mut self.force_user),
            "forcegroup" => Some(&mut self.force_group),
            "createmask" | "createmode" => Some(&mut self.create_mask),
            "directorymask" | "directorymode" => Some(&mut self.directory_mask),
            _ => None,
        }
    }

    /// Value for a normalized key, if known.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        let value = match key {
            "comment" => &self.comment,
            "browseable" | "browsable" => &self.browseable,
            "writable" | "writeable" => &self.writable,
            "validusers" => &self.valid_users,
            "forceuser" => &self.force_user,
            "forcegroup" => &self.force_group,
            "createmask" | "createmode" => &self.create_mask,
            "directorymask" | "directorymode" => &self.directory_mask,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// Both reserved sections together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSettings {
    pub global: GlobalSettings,
    pub homes: HomesSettings,
}

/// Partial update of the reserved sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub global: Option<GlobalSettings>,
    #[serde(default)]
    pub homes: Option<HomesSettings>,
}
