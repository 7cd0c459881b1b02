//! Core data types for the list builder.
//!
//! Keys, the immutable [`Notification`] payload carried by every leaf, the
//! [`ParentRef`] back-reference stored on entries, and the builder
//! configuration.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{ListBuilderError, Result};

/// A group is only valid while it has a summary and at least this many
/// children.
pub const MIN_CHILDREN_FOR_GROUP: usize = 2;

// ============================================================================
// Keys
// ============================================================================

/// Stable identity of a leaf, derived from the posting package and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryKey(Arc<str>);

impl EntryKey {
    /// Wrap an already-formatted key.
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// Key for notification `id` posted by `package`.
    pub fn for_notification(package: &str, id: i32) -> Self {
        Self(format!("{package}:{id}").into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identity of a group, scoped to the package that posted it.
///
/// Compared by package and group name, so two packages using the same group
/// name never collide, whatever characters the names contain. The
/// `"{package}|g:{group}"` label is kept for display and logs only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "GroupKeyParts", into = "GroupKeyParts")]
pub struct GroupKey {
    package: Arc<str>,
    group: Arc<str>,
    label: Arc<str>,
}

#[derive(Serialize, Deserialize)]
struct GroupKeyParts {
    package: Arc<str>,
    group: Arc<str>,
}

impl From<GroupKeyParts> for GroupKey {
    fn from(parts: GroupKeyParts) -> Self {
        Self::for_group(&parts.package, &parts.group)
    }
}

impl From<GroupKey> for GroupKeyParts {
    fn from(key: GroupKey) -> Self {
        Self {
            package: key.package,
            group: key.group,
        }
    }
}

impl GroupKey {
    /// Key for group `group` posted by `package`.
    pub fn for_group(package: &str, group: &str) -> Self {
        Self {
            package: package.into(),
            group: group.into(),
            label: format!("{package}|g:{group}").into(),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Display label. Not unique across packages; compare keys instead.
    pub fn as_str(&self) -> &str {
        &self.label
    }

    fn parts(&self) -> (&str, &str) {
        (&self.package, &self.group)
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.parts() == other.parts()
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts().hash(state);
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts().cmp(&other.parts())
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Where an entry sits in the built list.
///
/// Entries store `Option<ParentRef>`: `None` means the entry is not part of
/// the current list (filtered, discarded or never shown).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentRef {
    /// Top level of the list.
    Root,
    /// Member (summary or child) of the named group.
    Group(GroupKey),
}

impl ParentRef {
    pub fn is_root(&self) -> bool {
        matches!(self, ParentRef::Root)
    }

    pub fn group_key(&self) -> Option<&GroupKey> {
        match self {
            ParentRef::Root => None,
            ParentRef::Group(key) => Some(key),
        }
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentRef::Root => f.write_str("<root>"),
            ParentRef::Group(key) => write!(f, "{key}"),
        }
    }
}

// ============================================================================
// Notification payload
// ============================================================================

/// Immutable source record behind a leaf.
///
/// Produced by the entry source once per posted notification. The builder
/// never mutates it; per-pass annotations live on [`crate::entry::Leaf`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Posting package.
    pub package: String,
    /// Notification id, unique within the package.
    pub id: i32,
    /// Ranking position assigned upstream (lower sorts first).
    pub rank: i32,
    /// Display timestamp; more recent sorts first among equal ranks.
    pub when: i64,
    /// Arrival time; the latest summary of a group wins.
    pub post_time: i64,
    /// Group name, if the notification belongs to a group.
    #[serde(default)]
    pub group: Option<String>,
    /// Whether this notification is the summary of its group.
    #[serde(default)]
    pub is_group_summary: bool,
}

impl Notification {
    /// Create an ungrouped notification with rank and timestamps zeroed.
    pub fn new(package: impl Into<String>, id: i32) -> Self {
        Self {
            package: package.into(),
            id,
            rank: 0,
            when: 0,
            post_time: 0,
            group: None,
            is_group_summary: false,
        }
    }

    /// Builder method: set rank
    pub fn with_rank(mut self, rank: i32) -> Self {
        self.rank = rank;
        self
    }

    /// Builder method: set display timestamp
    pub fn with_when(mut self, when: i64) -> Self {
        self.when = when;
        self
    }

    /// Builder method: set arrival time
    pub fn with_post_time(mut self, post_time: i64) -> Self {
        self.post_time = post_time;
        self
    }

    /// Builder method: place in a group
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Builder method: mark as group summary
    pub fn as_group_summary(mut self) -> Self {
        self.is_group_summary = true;
        self
    }

    pub fn key(&self) -> EntryKey {
        EntryKey::for_notification(&self.package, self.id)
    }

    /// Group key scoped to this notification's package, if grouped.
    pub fn group_key(&self) -> Option<GroupKey> {
        self.group
            .as_deref()
            .map(|group| GroupKey::for_group(&self.package, group))
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the list builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListBuilderConfig {
    /// Show a summary whose group has no children as a standalone leaf
    /// instead of discarding it.
    pub keep_childless_summaries: bool,
    /// Maximum invalidation-triggered rebuilds chained after one dispatch.
    pub max_consecutive_rebuilds: usize,
    /// Emit a trace event for every leaf whose parent changed in a pass.
    pub log_parenting_changes: bool,
}

impl Default for ListBuilderConfig {
    fn default() -> Self {
        Self {
            keep_childless_summaries: false,
            max_consecutive_rebuilds: 16,
            log_parenting_changes: true,
        }
    }
}

impl ListBuilderConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_consecutive_rebuilds == 0 {
            return Err(ListBuilderError::invalid_config(
                "max_consecutive_rebuilds must be >= 1",
            ));
        }
        Ok(())
    }

    /// Builder method: keep or discard childless summaries
    pub fn with_keep_childless_summaries(mut self, keep: bool) -> Self {
        self.keep_childless_summaries = keep;
        self
    }

    /// Builder method: set the rebuild chain limit
    pub fn with_max_consecutive_rebuilds(mut self, limit: usize) -> Self {
        self.max_consecutive_rebuilds = limit;
        self
    }

    /// Builder method: toggle parenting-change logging
    pub fn with_log_parenting_changes(mut self, enabled: bool) -> Self {
        self.log_parenting_changes = enabled;
        self
    }
}
