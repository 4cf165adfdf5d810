//! Node directory: the most recent identity heard from each node.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Characters kept from a long name when it stands in for a short name.
const SHORT_NAME_CHARS: usize = 8;

/// One node's identity, names already sanitized for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub node_id: u32,
    pub id: String,
    pub long_name: String,
    pub short_name: String,
    pub updated_at: DateTime<Utc>,
}

/// Thread-safe map from node number to identity.
#[derive(Debug, Default)]
pub struct NodeDirectory {
    entries: RwLock<HashMap<u32, DirectoryEntry>>,
}

impl NodeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `node_id`. Fields are not merged.
    pub fn update(&self, node_id: u32, id: &str, long_name: &str, short_name: &str) {
        let entry = DirectoryEntry {
            node_id,
            id: sanitize_for_display(id),
            long_name: sanitize_for_display(long_name),
            short_name: sanitize_for_display(short_name),
            updated_at: Utc::now(),
        };
        debug!(node = %format_args!("!{node_id:08x}"), long_name = %entry.long_name, "node directory updated");
        self.entries.write().unwrap_or_else(PoisonError::into_inner).insert(node_id, entry);
    }

    pub fn get(&self, node_id: u32) -> Option<DirectoryEntry> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).get(&node_id).cloned()
    }

    /// Long name, else short name, else the id string, else `!NNNNNNNN`.
    pub fn resolve_name(&self, node_id: u32) -> String {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&node_id)
            .and_then(|entry| {
                [&entry.long_name, &entry.short_name, &entry.id].into_iter().find(|name| !name.is_empty()).cloned()
            })
            .unwrap_or_else(|| hex_id(node_id))
    }

    /// Short name, else the long name cut to eight characters, else `!NNNNNNNN`.
    pub fn resolve_short_name(&self, node_id: u32) -> String {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&node_id) {
            Some(entry) if !entry.short_name.is_empty() => entry.short_name.clone(),
            Some(entry) if !entry.long_name.is_empty() => entry.long_name.chars().take(SHORT_NAME_CHARS).collect(),
            _ => hex_id(node_id),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every entry, ordered by node number.
    pub fn snapshot(&self) -> Vec<DirectoryEntry> {
        let mut entries: Vec<_> =
            self.entries.read().unwrap_or_else(PoisonError::into_inner).values().cloned().collect();
        entries.sort_by_key(|entry| entry.node_id);
        entries
    }
}

fn hex_id(node_id: u32) -> String {
    format!("!{node_id:08x}")
}

fn is_hidden(c: char) -> bool {
    matches!(u32::from(c),
        0x00..=0x1F
        | 0x7F..=0x9F
        // combining marks
        | 0x0300..=0x036F
        | 0x1AB0..=0x1AFF
        | 0x20D0..=0x20FF
        | 0xFE20..=0xFE2F
        // zero-width joiner and variation selectors
        | 0x200D
        | 0xFE00..=0xFE0F
        // symbols and dingbats
        | 0x2600..=0x27BF
        // emoji blocks
        | 0x1F300..=0x1FAFF)
}

/// Strip control characters, emoji and combining marks, then trim.
pub fn sanitize_for_display(name: &str) -> String {
    let kept: String = name.chars().filter(|&c| !is_hidden(c)).collect();
    kept.trim().to_string()
}
