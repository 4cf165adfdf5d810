//! Text payloads and the keyword scanning used to categorize them.

use std::collections::BTreeMap;

use serde::Serialize;

use super::packet::NodeIdentity;
use super::packet_type::PacketType;

/// Rough subject of a device console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextCategory {
    DeviceInfo,
    ChannelConfig,
    Config,
    NodeInfo,
    DeviceStatus,
    General,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TextData {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<TextCategory>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
    /// Subject guessed from keywords for console text; the packet stays `TEXT`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inferred_type: Option<PacketType>,
    /// Identity recovered from node-info style console output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<NodeIdentity>,
}

impl TextData {
    /// Text as received over the mesh, without categorization.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    /// Console or status text, categorized with key/value details extracted.
    pub fn categorized(text: impl Into<String>) -> Self {
        let mut data = Self::new(text);
        data.categorize();
        data
    }

    fn categorize(&mut self) {
        let lower = self.text.to_ascii_lowercase();
        let has = |needle: &str| lower.contains(needle);

        let (category, keys): (TextCategory, &[&str]) = if has("firmware") || has("version") {
            (TextCategory::DeviceInfo, &["firmware", "version", "build", "hw", "hardware"])
        } else if has("channel") && (has("settings") || has("config")) {
            (TextCategory::ChannelConfig, &["channel", "frequency", "name", "psk", "bw", "sf", "cr"])
        } else if has("preferences") || has("config") {
            (TextCategory::Config, &["region", "modem", "power", "bandwidth", "spread"])
        } else if has("owner") || has("user") || has("node id") {
            (TextCategory::NodeInfo, &["owner", "user", "name", "id", "short", "long"])
        } else if has("device info") || has("my info") {
            (TextCategory::DeviceStatus, &["battery", "voltage", "uptime", "heap", "nodes"])
        } else {
            (TextCategory::General, &[])
        };

        self.category = Some(category);
        for key in keys {
            if let Some(value) = key_value(&self.text, key) {
                self.details.insert((*key).to_string(), value);
            }
        }
    }
}

/// Byte offsets where `needle` (lowercase ASCII) occurs in `text`, ignoring ASCII case.
pub(crate) fn find_all_ci<'a>(text: &'a str, needle: &'a str) -> impl Iterator<Item = usize> + 'a {
    let haystack = text.as_bytes();
    let needle = needle.as_bytes();
    (0..haystack.len().saturating_sub(needle.len()) + 1)
        .filter(move |&start| {
            !needle.is_empty()
                && haystack.get(start..start + needle.len()).is_some_and(|window| window.eq_ignore_ascii_case(needle))
        })
}

fn is_value_end(c: char) -> bool {
    matches!(c, '\n' | ',' | ';')
}

/// Value for `key` written as `key: value`, `key=value` or `key value`.
fn key_value(text: &str, key: &str) -> Option<String> {
    let separated = find_all_ci(text, key).find_map(|start| {
        let rest = text[start + key.len()..].trim_start_matches(|c: char| c.is_ascii_whitespace());
        let rest = rest.strip_prefix([':', '='])?;
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
        let value = rest.split(is_value_end).next().unwrap_or_default();
        (!value.is_empty()).then_some(value)
    });
    if let Some(value) = separated.map(str::trim).filter(|value| !value.is_empty()) {
        return Some(value.to_string());
    }

    find_all_ci(text, key).find_map(|start| {
        let rest = &text[start + key.len()..];
        let rest = rest.strip_prefix(|c: char| c.is_ascii_whitespace())?;
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
        let value = rest.split(|c: char| is_value_end(c) || c.is_ascii_whitespace()).next().unwrap_or_default();
        (!value.is_empty()).then(|| value.to_string())
    })
}
