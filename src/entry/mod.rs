//! The entry model: leaves, groups, and the arena that owns them.
//!
//! Entries never point at each other directly. Parents and group members are
//! stored as keys into the [`EntryArena`], which keeps the tree free of
//! reference cycles while still letting any entry answer "who is my parent".
//!
//! Stage code works on lists of [`ListEntry`] (a key tagged with its kind);
//! pluggables and listeners receive [`EntryView`]s, which resolve those keys
//! to borrowed leaves and groups.

pub mod arena;
pub mod group;
pub mod leaf;

pub use arena::{EntryArena, ReconcileStats};
pub use group::GroupEntry;
pub use leaf::Leaf;

use crate::types::{EntryKey, GroupKey, ParentRef};

/// A top-level slot in the list being built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListEntry {
    Leaf(EntryKey),
    Group(GroupKey),
}

impl ListEntry {
    pub fn key_str(&self) -> &str {
        match self {
            ListEntry::Leaf(key) => key.as_str(),
            ListEntry::Group(key) => key.as_str(),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, ListEntry::Group(_))
    }
}

/// Read-only view of a list entry, as handed to pluggables and listeners.
#[derive(Debug, Clone, Copy)]
pub enum EntryView<'a> {
    Leaf(&'a Leaf),
    Group {
        group: &'a GroupEntry,
        summary: &'a Leaf,
    },
}

impl<'a> EntryView<'a> {
    pub fn key_str(&self) -> &'a str {
        match self {
            EntryView::Leaf(leaf) => leaf.key().as_str(),
            EntryView::Group { group, .. } => group.key().as_str(),
        }
    }

    /// The leaf used for sectioning and comparison: the leaf itself, or the
    /// group's summary.
    pub fn representative(&self) -> &'a Leaf {
        match self {
            EntryView::Leaf(leaf) => leaf,
            EntryView::Group { summary, .. } => summary,
        }
    }

    pub fn parent(&self) -> Option<&'a ParentRef> {
        match self {
            EntryView::Leaf(leaf) => leaf.parent(),
            EntryView::Group { group, .. } => group.parent(),
        }
    }

    pub fn previous_parent(&self) -> Option<&'a ParentRef> {
        match self {
            EntryView::Leaf(leaf) => leaf.previous_parent(),
            EntryView::Group { group, .. } => group.previous_parent(),
        }
    }

    pub fn as_leaf(&self) -> Option<&'a Leaf> {
        match self {
            EntryView::Leaf(leaf) => Some(leaf),
            EntryView::Group { .. } => None,
        }
    }

    pub fn as_group(&self) -> Option<&'a GroupEntry> {
        match self {
            EntryView::Leaf(_) => None,
            EntryView::Group { group, .. } => Some(group),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, EntryView::Group { .. })
    }

    /// The [`ListEntry`] this view resolves.
    pub fn to_list_entry(&self) -> ListEntry {
        match self {
            EntryView::Leaf(leaf) => ListEntry::Leaf(leaf.key().clone()),
            EntryView::Group { group, .. } => ListEntry::Group(group.key().clone()),
        }
    }
}
