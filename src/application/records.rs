//! Share records and reserved sections on top of the sectioned text model.
//!
//! Every operation reads the file fresh, works on a [`ConfigDocument`] and
//! writes the whole file back at most once. Mutations hold the exclusive side
//! of the [`ConfigStore`] guard for their full read-modify-write.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::application::sections::{normalize_key, ConfigDocument, Section};
use crate::domain::validation::{
    clean_subpath, is_valid_record_name, parse_share_id, require_account_name,
};
use crate::domain::{
    AppError, GlobalSettings, HomesSettings, RemovalPlan, Result, SectionSettings,
    SettingsUpdate, ShareRecord, ShareScope, ShareSpec,
};
use crate::infrastructure::{Clock, ConfigStore};

/// Suffix format for unnamed shares, second resolution.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

const INDENT: &str = "   ";

/// Where account homes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeLayout {
    root: PathBuf,
}

impl HomeLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn home_dir(&self, username: &str) -> PathBuf {
        self.root.join(username)
    }

    /// Shared directory for `owner`; the home itself when `sub_path` is empty.
    #[must_use]
    pub fn share_path(&self, owner: &str, sub_path: &str) -> PathBuf {
        let home = self.home_dir(owner);
        if sub_path.is_empty() {
            home
        } else {
            home.join(sub_path)
        }
    }

    /// Part of `path` below the owner's home, or empty if it is the home or lies elsewhere.
    #[must_use]
    pub fn sub_path_of(&self, owner: &str, path: &str) -> String {
        Path::new(path)
            .strip_prefix(self.home_dir(owner))
            .map(|rest| rest.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Checks a share spec and returns it with a cleaned subpath.
///
/// # Errors
/// Returns `AppError::Validation` for an empty or malformed `shared_with`, a
/// multi-line comment or a traversing subpath.
pub fn prepare_spec(spec: &ShareSpec) -> Result<ShareSpec> {
    if spec.shared_with.is_empty() {
        return Err(AppError::validation("must share with at least one user"));
    }
    for user in &spec.shared_with {
        require_account_name(user, "shared_with user")?;
    }
    require_single_line(&spec.comment, "comment")?;

    Ok(ShareSpec {
        shared_with: spec.shared_with.clone(),
        read_only: spec.read_only,
        comment: spec.comment.trim().to_string(),
        sub_path: clean_subpath(&spec.sub_path)?,
    })
}

/// Accepts an empty name (timestamp suffix) or a letters/digits/CJK name.
///
/// # Errors
/// Returns `AppError::Validation` for any other name.
pub fn check_share_name(name: &str) -> Result<()> {
    if name.is_empty() || is_valid_record_name(name) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "share name '{name}' may only contain letters, numbers or CJK characters"
        )))
    }
}

fn require_single_line(value: &str, field: &str) -> Result<()> {
    if value.contains(['\n', '\r']) {
        Err(AppError::validation(format!("{field} must be a single line")))
    } else {
        Ok(())
    }
}

/// Body lines of a generated share section.
#[must_use]
pub fn share_body(path: &str, spec: &ShareSpec) -> Vec<String> {
    let mut lines = vec![
        format!("{INDENT}path = {path}"),
        format!("{INDENT}browseable = yes"),
        format!("{INDENT}valid users = {}", spec.shared_with.join(" ")),
        format!("{INDENT}force user = root"),
        format!("{INDENT}force group = root"),
    ];
    if spec.read_only {
        lines.push(format!("{INDENT}read only = yes"));
    } else {
        lines.push(format!("{INDENT}read only = no"));
        lines.push(format!("{INDENT}writable = yes"));
    }
    if !spec.comment.is_empty() {
        lines.push(format!("{INDENT}comment = {}", spec.comment));
    }
    lines
}

fn is_truthy(value: &str) -> bool {
    ["yes", "true", "1"]
        .iter()
        .any(|t| value.eq_ignore_ascii_case(t))
}

/// Every generated share section of `doc`, in file order.
#[must_use]
pub fn share_records(doc: &ConfigDocument, layout: &HomeLayout) -> Vec<ShareRecord> {
    doc.sections()
        .iter()
        .filter_map(|section| {
            let (owner, _) = parse_share_id(section.name())?;
            let mut record = ShareRecord {
                id: section.name().to_string(),
                owner: owner.to_string(),
                path: String::new(),
                shared_with: Vec::new(),
                read_only: false,
                comment: String::new(),
                sub_path: String::new(),
            };
            for (key, value) in section.entries() {
                match normalize_key(key).as_str() {
                    "path" => {
                        record.path = value.to_string();
                        record.sub_path = layout.sub_path_of(owner, value);
                    }
                    "readonly" => record.read_only = is_truthy(value),
                    "comment" => record.comment = value.to_string(),
                    "validusers" => {
                        record.shared_with = value
                            .split_whitespace()
                            .filter(|user| *user != owner)
                            .map(ToString::to_string)
                            .collect();
                    }
                    _ => {}
                }
            }
            Some(record)
        })
        .collect()
}

/// Known keys of the reserved sections. The first occurrence of a key wins.
#[must_use]
pub fn read_settings(doc: &ConfigDocument) -> SectionSettings {
    let mut settings = SectionSettings::default();

    if let Some(section) = doc.section("global") {
        for (key, value) in section.entries() {
            if let Some(slot) = settings.global.field_mut(&normalize_key(key)) {
                if slot.is_empty() {
                    *slot = value.to_string();
                }
            }
        }
    }
    if let Some(section) = doc.section("homes") {
        for (key, value) in section.entries() {
            if let Some(slot) = settings.homes.field_mut(&normalize_key(key)) {
                if slot.is_empty() {
                    *slot = value.to_string();
                }
            }
        }
    }

    settings
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(ToString::to_string)
}

/// Rewrites existing `[global]` keys that are set in `update`. Returns lines changed.
pub fn apply_global(doc: &mut ConfigDocument, update: &GlobalSettings) -> usize {
    doc.section_mut("global")
        .map_or(0, |section| section.rewrite_entries(|key| non_empty(update.field(key))))
}

/// Rewrites existing `[homes]` keys that are set in `update`. Returns lines changed.
pub fn apply_homes(doc: &mut ConfigDocument, update: &HomesSettings) -> usize {
    doc.section_mut("homes")
        .map_or(0, |section| section.rewrite_entries(|key| non_empty(update.field(key))))
}

fn check_settings_values(update: &SettingsUpdate) -> Result<()> {
    let global = update.global.iter().flat_map(|g| {
        [
            &g.workgroup,
            &g.server_string,
            &g.security,
            &g.passdb_backend,
            &g.map_to_guest,
            &g.access_based_share_enum,
        ]
    });
    let homes = update.homes.iter().flat_map(|h| {
        [
            &h.comment,
            &h.browseable,
            &h.writable,
            &h.valid_users,
            &h.force_user,
            &h.force_group,
            &h.create_mask,
            &h.directory_mask,
        ]
    });
    global
        .chain(homes)
        .try_for_each(|value| require_single_line(value, "setting value"))
}

/// Shares to delete and rewrite when `username` goes away.
///
/// Owned shares are deleted. Grants are revoked, and a share left granted to
/// nobody is deleted instead of kept with an empty list.
#[must_use]
pub fn plan_user_removal(records: &[ShareRecord], username: &str) -> RemovalPlan {
    let mut plan = RemovalPlan::default();

    for record in records {
        if record.owner == username {
            plan.delete.push(record.id.clone());
            continue;
        }
        if !record.shared_with.iter().any(|u| u == username) {
            continue;
        }

        let remaining: Vec<String> = record
            .shared_with
            .iter()
            .filter(|u| *u != username)
            .cloned()
            .collect();
        if remaining.is_empty() {
            plan.delete.push(record.id.clone());
        } else {
            plan.update.push(ShareRecord {
                shared_with: remaining,
                ..record.clone()
            });
        }
    }

    plan
}

/// Applies `plan` to `doc`. Updated records keep their stored path.
pub fn apply_removal_plan(doc: &mut ConfigDocument, plan: &RemovalPlan) {
    for id in &plan.delete {
        doc.remove_exact(id);
    }
    for record in &plan.update {
        if let Some(section) = doc.find_exact_mut(&record.id) {
            section.replace_body(share_body(&record.path, &record.spec()));
        }
    }
}

fn check_scope(scope: &ShareScope, owner: &str, id: &str) -> Result<()> {
    match scope {
        ShareScope::Owner(user) if user != owner => Err(AppError::forbidden(format!(
            "share '{id}' belongs to another user"
        ))),
        _ => Ok(()),
    }
}

fn owner_of(id: &str) -> Result<&str> {
    parse_share_id(id)
        .map(|(owner, _)| owner)
        .ok_or_else(|| AppError::validation(format!("invalid share ID format: '{id}'")))
}

fn check_free(doc: &ConfigDocument, id: &str) -> Result<()> {
    if doc.section(id).is_some() {
        Err(AppError::conflict(format!("share '{id}' already exists")))
    } else {
        Ok(())
    }
}

fn missing_share(id: &str) -> AppError {
    AppError::not_found(format!("share '{id}'"))
}

/// Record-level reads and writes of the managed config file.
pub struct RecordMutator {
    store: Arc<ConfigStore>,
    layout: HomeLayout,
    clock: Arc<dyn Clock>,
}

impl RecordMutator {
    #[must_use]
    pub fn new(store: Arc<ConfigStore>, layout: HomeLayout, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            layout,
            clock,
        }
    }

    #[must_use]
    pub fn layout(&self) -> &HomeLayout {
        &self.layout
    }

    /// All share records in file order.
    ///
    /// # Errors
    /// Returns error if the config file cannot be read.
    pub fn list_share_records(&self) -> Result<Vec<ShareRecord>> {
        let doc = self.store.shared().read_document()?;
        Ok(share_records(&doc, &self.layout))
    }

    /// The share with header `id`.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if no such section exists.
    pub fn find_share(&self, id: &str) -> Result<ShareRecord> {
        self.list_share_records()?
            .into_iter()
            .find(|record| record.id == id)
            .ok_or_else(|| missing_share(id))
    }

    /// Known keys of `[global]` and `[homes]`.
    ///
    /// # Errors
    /// Returns error if the config file cannot be read.
    pub fn settings(&self) -> Result<SectionSettings> {
        let doc = self.store.shared().read_document()?;
        Ok(read_settings(&doc))
    }

    /// # Errors
    /// See [`RecordMutator::update_settings`].
    pub fn upsert_global(&self, update: &GlobalSettings) -> Result<usize> {
        self.update_settings(&SettingsUpdate {
            global: Some(update.clone()),
            homes: None,
        })
    }

    /// # Errors
    /// See [`RecordMutator::update_settings`].
    pub fn upsert_homes(&self, update: &HomesSettings) -> Result<usize> {
        self.update_settings(&SettingsUpdate {
            global: None,
            homes: Some(update.clone()),
        })
    }

    /// Rewrites the non-empty keys of both partials in one write.
    ///
    /// Keys missing from the file are not added. Returns the number of lines
    /// changed; nothing is written when that is zero.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for multi-line values, or an IO error.
    pub fn update_settings(&self, update: &SettingsUpdate) -> Result<usize> {
        check_settings_values(update)?;

        let config = self.store.exclusive();
        let mut doc = config.read_document()?;

        let mut changed = 0;
        if let Some(global) = &update.global {
            changed += apply_global(&mut doc, global);
        }
        if let Some(homes) = &update.homes {
            changed += apply_homes(&mut doc, homes);
        }

        if changed == 0 {
            debug!("Settings unchanged, nothing written");
            return Ok(0);
        }

        config.write_document(&doc)?;
        info!(changed, "Settings updated");
        Ok(changed)
    }

    /// Computes the id for a new share and checks that it is free.
    ///
    /// The id is `owner-share-name`, or `owner-share-<timestamp>` when `name` is empty.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for a bad owner or name and
    /// `AppError::Conflict` if the id is already taken (compared without ASCII case).
    pub fn available_share_id(&self, owner: &str, name: &str) -> Result<String> {
        require_account_name(owner, "owner")?;
        check_share_name(name)?;

        let suffix = if name.is_empty() {
            self.clock.now().format(TIMESTAMP_FORMAT).to_string()
        } else {
            name.to_string()
        };
        let id = format!("{owner}-share-{suffix}");

        let doc = self.store.shared().read_document()?;
        check_free(&doc, &id)?;
        Ok(id)
    }

    /// Appends a share section and returns its id.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for bad input and `AppError::Conflict` if
    /// the id is already taken.
    pub fn append_share(&self, owner: &str, name: &str, spec: &ShareSpec) -> Result<String> {
        let spec = prepare_spec(spec)?;
        let id = self.available_share_id(owner, name)?;
        self.insert_share(&id, owner, &spec)?;
        Ok(id)
    }

    /// Appends section `id` for `owner`, checking the id again under the writer lock.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for a bad spec or an id not owned by
    /// `owner`, and `AppError::Conflict` if the id is taken.
    pub fn insert_share(&self, id: &str, owner: &str, spec: &ShareSpec) -> Result<()> {
        if owner_of(id)? != owner {
            return Err(AppError::validation(format!(
                "share '{id}' does not belong to '{owner}'"
            )));
        }
        let spec = prepare_spec(spec)?;
        let path = self.layout.share_path(owner, &spec.sub_path);

        let config = self.store.exclusive();
        let mut doc = config.read_document()?;
        check_free(&doc, id)?;

        doc.push_section(Section::new(id, share_body(&path.to_string_lossy(), &spec)));
        config.write_document(&doc)?;

        info!(share_id = id, owner, "Share created");
        Ok(())
    }

    /// Replaces the body of share `id`. The owner stays the one in the id.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for a malformed id or spec,
    /// `AppError::NotFound` if absent and `AppError::Forbidden` if out of `scope`.
    pub fn update_share(&self, id: &str, spec: &ShareSpec, scope: &ShareScope) -> Result<ShareRecord> {
        let owner = owner_of(id)?;
        let spec = prepare_spec(spec)?;
        let path = self
            .layout
            .share_path(owner, &spec.sub_path)
            .to_string_lossy()
            .into_owned();

        let config = self.store.exclusive();
        let mut doc = config.read_document()?;
        let section = doc.find_exact_mut(id).ok_or_else(|| missing_share(id))?;
        check_scope(scope, owner, id)?;

        section.replace_body(share_body(&path, &spec));
        config.write_document(&doc)?;

        info!(share_id = id, owner, "Share updated");
        Ok(ShareRecord {
            id: id.to_string(),
            owner: owner.to_string(),
            path,
            shared_with: spec.shared_with,
            read_only: spec.read_only,
            comment: spec.comment,
            sub_path: spec.sub_path,
        })
    }

    /// Removes share `id`. Its directory is left in place.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for a malformed id,
    /// `AppError::NotFound` if absent and `AppError::Forbidden` if out of `scope`.
    pub fn delete_share(&self, id: &str, scope: &ShareScope) -> Result<()> {
        let owner = owner_of(id)?;

        let config = self.store.exclusive();
        let mut doc = config.read_document()?;
        if doc.find_exact(id).is_none() {
            return Err(missing_share(id));
        }
        check_scope(scope, owner, id)?;

        doc.remove_exact(id);
        config.write_document(&doc)?;

        info!(share_id = id, owner, "Share deleted");
        Ok(())
    }

    /// Plans and applies share cleanup for `username` in one read and one write.
    ///
    /// Nothing is written when the plan is empty.
    ///
    /// # Errors
    /// Returns error if the config file cannot be read or written.
    pub fn delete_all_records_for_user(&self, username: &str) -> Result<RemovalPlan> {
        let config = self.store.exclusive();
        let mut doc = config.read_document()?;
        let plan = plan_user_removal(&share_records(&doc, &self.layout), username);

        if plan.is_empty() {
            debug!(username, "No shares reference user");
            return Ok(plan);
        }

        apply_removal_plan(&mut doc, &plan);
        config.write_document(&doc)?;

        info!(
            username,
            deleted = plan.delete.len(),
            updated = plan.update.len(),
            "Shares cleaned up for user"
        );
        Ok(plan)
    }
}
