//! The render boundary: an owned snapshot of a finished list.
//!
//! A [`RenderList`] is captured after the last stage of a pass and handed to
//! the render listener. It shares notification payloads with the builder but
//! is otherwise detached from it, so it can be kept, compared, or serialized
//! after the builder moves on.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;

use crate::entry::{EntryArena, Leaf, ListEntry};
use crate::errors::Result;
use crate::types::{EntryKey, GroupKey, Notification, ParentRef};

/// A rendered leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeafSnapshot {
    pub key: EntryKey,
    pub notification: Arc<Notification>,
    pub parent: Option<ParentRef>,
    /// Set for top-level entries only.
    pub section: Option<i32>,
}

impl LeafSnapshot {
    fn capture(leaf: &Leaf, section: Option<i32>) -> Self {
        Self {
            key: leaf.key().clone(),
            notification: leaf.notification_arc().clone(),
            parent: leaf.parent().cloned(),
            section,
        }
    }
}

/// A rendered group with its summary and sorted children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSnapshot {
    pub key: GroupKey,
    pub summary: LeafSnapshot,
    pub children: Vec<LeafSnapshot>,
    pub section: Option<i32>,
}

/// One top-level slot of a rendered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderEntry {
    Leaf(LeafSnapshot),
    Group(GroupSnapshot),
}

impl RenderEntry {
    pub fn key_str(&self) -> &str {
        match self {
            RenderEntry::Leaf(leaf) => leaf.key.as_str(),
            RenderEntry::Group(group) => group.key.as_str(),
        }
    }

    /// The leaf itself, or the group's summary.
    pub fn representative(&self) -> &LeafSnapshot {
        match self {
            RenderEntry::Leaf(leaf) => leaf,
            RenderEntry::Group(group) => &group.summary,
        }
    }

    pub fn section(&self) -> Option<i32> {
        match self {
            RenderEntry::Leaf(leaf) => leaf.section,
            RenderEntry::Group(group) => group.section,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafSnapshot> {
        match self {
            RenderEntry::Leaf(leaf) => Some(leaf),
            RenderEntry::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupSnapshot> {
        match self {
            RenderEntry::Leaf(_) => None,
            RenderEntry::Group(group) => Some(group),
        }
    }
}

/// The finished, sorted top-level list delivered to the render listener.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderList {
    entries: Vec<RenderEntry>,
}

impl RenderList {
    pub(crate) fn capture(arena: &EntryArena, top_level: &[ListEntry]) -> Self {
        let entries = top_level
            .iter()
            .filter_map(|entry| match entry {
                ListEntry::Leaf(key) => arena
                    .leaf(key)
                    .map(|leaf| RenderEntry::Leaf(LeafSnapshot::capture(leaf, leaf.section()))),
                ListEntry::Group(key) => {
                    let group = arena.group(key)?;
                    let summary = arena.leaf(group.summary()?)?;
                    let children = group
                        .children()
                        .iter()
                        .filter_map(|child| arena.leaf(child))
                        .map(|child| LeafSnapshot::capture(child, None))
                        .collect();
                    Some(RenderEntry::Group(GroupSnapshot {
                        key: key.clone(),
                        summary: LeafSnapshot::capture(summary, None),
                        children,
                        section: group.section(),
                    }))
                }
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[RenderEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RenderEntry> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&RenderEntry> {
        self.entries.get(index)
    }

    /// Every leaf in display order: top-level leaves, and for each group its
    /// summary followed by its children.
    pub fn leaves(&self) -> impl Iterator<Item = &LeafSnapshot> {
        self.entries.iter().flat_map(|entry| {
            let (head, tail): (&LeafSnapshot, &[LeafSnapshot]) = match entry {
                RenderEntry::Leaf(leaf) => (leaf, &[]),
                RenderEntry::Group(group) => (&group.summary, &group.children),
            };
            std::iter::once(head).chain(tail.iter())
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl<'a> IntoIterator for &'a RenderList {
    type Item = &'a RenderEntry;
    type IntoIter = std::slice::Iter<'a, RenderEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Human-readable dump of a rendered list, one line per leaf.
///
/// ```text
/// [0] pkg:1 (section 0)
/// [1] pkg|g:g (section 0)
///   summary pkg:2
///   [1.0] pkg:3
/// ```
pub fn dump_list(list: &RenderList) -> String {
    let mut out = String::new();
    for (i, entry) in list.iter().enumerate() {
        let section = entry
            .section()
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        let _ = writeln!(out, "[{i}] {} (section {section})", entry.key_str());
        if let RenderEntry::Group(group) = entry {
            let _ = writeln!(out, "  summary {}", group.summary.key);
            for (j, child) in group.children.iter().enumerate() {
                let _ = writeln!(out, "  [{i}.{j}] {}", child.key);
            }
        }
    }
    out
}
