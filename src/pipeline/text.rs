//! Free-text chunks: console output, status lines and stray JSON.

use tracing::debug;

use crate::messages::{BROADCAST_ADDR, User};
use crate::types::{DecodedData, NodeIdentity, Packet, PacketType, TextData, find_all_ci, parse_node_id};

const HEX_ID_LEN: usize = 8;

/// Build a text packet from a chunk none of the binary decoders accepted.
///
/// Whitespace-only input yields nothing.
pub(crate) fn text_packet(raw: &[u8]) -> Option<Packet> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut data = TextData::categorized(trimmed);
    let mut packet = Packet::new(PacketType::Text, raw);

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        debug!(len = trimmed.len(), "json text chunk");
        return Some(packet.with_decoded(DecodedData::Text(data)));
    }

    data.inferred_type = infer_subject(&text);
    if data.inferred_type == Some(PacketType::NodeInfo) {
        data.identity = extract_identity(&text);
    }

    let ids = node_id_mentions(&text);
    packet.from = ids.first().copied().unwrap_or(0);
    packet.to = ids.get(1).copied().unwrap_or(BROADCAST_ADDR);

    Some(packet.with_decoded(DecodedData::Text(data)))
}

/// Subject of a console line, judged by keywords in a fixed order.
pub(crate) fn infer_subject(text: &str) -> Option<PacketType> {
    let lower = text.to_ascii_lowercase();
    let has = |needle: &str| lower.contains(needle);

    let subject = if has("connected to") || has("starting up") || has("device info") || has("firmware") {
        PacketType::Admin
    } else if has("channel") && (has("settings") || has("config")) {
        PacketType::Admin
    } else if has("module") && has("config") {
        PacketType::Admin
    } else if has("preferences") || has("setting") {
        PacketType::Admin
    } else if has("my info") || has("node id") || has("owner") || text.contains("!!") {
        PacketType::NodeInfo
    } else if has("rx:") || has("tx:") {
        PacketType::Routing
    } else if has("position") || has("gps") || has("lat") || has("lon") {
        PacketType::Position
    } else if has("battery") || has("voltage") || has("telemetry") || has("sensor") {
        PacketType::Telemetry
    } else if has("admin") || has("config") {
        PacketType::Admin
    } else if has("range") && has("test") {
        PacketType::RangeTest
    } else {
        return None;
    };
    Some(subject)
}

fn hex_run_at(bytes: &[u8], start: usize) -> bool {
    bytes.get(start..start + HEX_ID_LEN).is_some_and(|run| run.iter().all(u8::is_ascii_hexdigit))
}

fn hex_value_at(text: &str, start: usize) -> Option<u32> {
    text.get(start..start + HEX_ID_LEN).and_then(parse_node_id)
}

/// Every `!NNNNNNNN` or `0xNNNNNNNN` mention, left to right, without overlap.
pub(crate) fn node_id_mentions(text: &str) -> Vec<u32> {
    let bytes = text.as_bytes();
    let mut ids = Vec::new();
    let mut index = 0;
    while index < bytes.len() {
        let prefix = if bytes[index] == b'!' {
            1
        } else if bytes[index..].starts_with(b"0x") {
            2
        } else {
            0
        };
        if prefix > 0 && hex_run_at(bytes, index + prefix) {
            if let Some(id) = hex_value_at(text, index + prefix) {
                ids.push(id);
            }
            index += prefix + HEX_ID_LEN;
        } else {
            index += 1;
        }
    }
    ids
}

/// First eight-digit hex run after `start` on the same line.
fn hex_run_on_line(text: &str, start: usize) -> Option<u32> {
    let bytes = text.as_bytes();
    let line_end = bytes[start..].iter().position(|&byte| byte == b'\n').map_or(bytes.len(), |end| start + end);
    (start..line_end.saturating_sub(HEX_ID_LEN - 1))
        .find(|&index| hex_run_at(bytes, index))
        .and_then(|index| hex_value_at(text, index))
}

/// Node number mentioned in node-info style text.
///
/// Tried in order: `!NNNNNNNN`, `0xNNNNNNNN`, then a hex run following
/// `node` or `id` on the same line.
pub(crate) fn extract_node_num(text: &str) -> Option<u32> {
    let bytes = text.as_bytes();
    for prefix in ["!", "0x"] {
        if let Some(id) = find_all_ci(text, prefix)
            .find(|&index| hex_run_at(bytes, index + prefix.len()))
            .and_then(|index| hex_value_at(text, index + prefix.len()))
        {
            return Some(id);
        }
    }
    for keyword in ["node", "id"] {
        if let Some(id) = find_all_ci(text, keyword).find_map(|index| hex_run_on_line(text, index + keyword.len())) {
            return Some(id);
        }
    }
    None
}

fn after_keyword<'a>(text: &'a str, index: usize, keyword: &str) -> &'a str {
    let rest = &text[index + keyword.len()..];
    rest.strip_prefix(':').unwrap_or(rest)
}

/// `Owner: John Doe (JD)` style: long name then short name in parentheses.
fn name_with_short(text: &str, keyword: &str) -> Option<(String, String)> {
    find_all_ci(text, keyword).find_map(|index| {
        let rest = after_keyword(text, index, keyword);
        let stop = rest.find(['(', '\n'])?;
        let (long, tail) = rest.split_at(stop);
        if long.is_empty() {
            return None;
        }
        let inner = tail.strip_prefix('(')?;
        let close = inner.find(')')?;
        if close == 0 {
            return None;
        }
        Some((long.trim().to_string(), inner[..close].trim().to_string()))
    })
}

/// `User: Alice Smith` style: the rest of the line is the long name.
fn name_only(text: &str, keyword: &str) -> Option<String> {
    find_all_ci(text, keyword).find_map(|index| {
        let rest = after_keyword(text, index, keyword).trim_start();
        let line = rest.split('\n').next().unwrap_or_default();
        (!line.is_empty()).then(|| line.trim().to_string())
    })
}

const NAME_KEYWORDS: [&str; 3] = ["owner", "user", "name"];

/// Identity described by node-info console output, when it names the node.
pub(crate) fn extract_identity(text: &str) -> Option<NodeIdentity> {
    let node_num = extract_node_num(text).filter(|&num| num != 0)?;

    let (long_name, short_name) = NAME_KEYWORDS
        .iter()
        .find_map(|keyword| name_with_short(text, keyword))
        .or_else(|| NAME_KEYWORDS.iter().find_map(|keyword| name_only(text, keyword)).map(|long| (long, String::new())))?;

    if long_name.is_empty() && short_name.is_empty() {
        return None;
    }

    debug!(node = %format_args!("!{node_num:08x}"), %long_name, %short_name, "identity found in text");
    Some(NodeIdentity {
        node_num: Some(node_num),
        user: User { id: format!("!{node_num:08x}"), long_name, short_name, ..User::default() },
        local_device: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(packet: &Packet) -> &TextData {
        match &packet.decoded {
            Some(DecodedData::Text(data)) => data,
            other => panic!("expected text payload, got {other:?}"),
        }
    }

    #[test]
    fn whitespace_is_not_a_packet() {
        assert!(text_packet(b"  \r\n\t").is_none());
    }

    #[test]
    fn json_bodies_stay_verbatim() {
        let packet = text_packet(b"  {\"hello\": 1}\n").unwrap();
        assert_eq!(packet.packet_type, PacketType::Text);
        assert_eq!(text_of(&packet).text, "{\"hello\": 1}");
        assert_eq!(text_of(&packet).inferred_type, None);
        assert_eq!(packet.from, 0);
    }

    #[test]
    fn keyword_order() {
        assert_eq!(infer_subject("Connected to radio"), Some(PacketType::Admin));
        assert_eq!(infer_subject("Channel settings follow"), Some(PacketType::Admin));
        assert_eq!(infer_subject("Owner: Pat"), Some(PacketType::NodeInfo));
        assert_eq!(infer_subject("!!"), Some(PacketType::NodeInfo));
        assert_eq!(infer_subject("RX: 12 bytes"), Some(PacketType::Routing));
        assert_eq!(infer_subject("GPS fix acquired"), Some(PacketType::Position));
        assert_eq!(infer_subject("Battery 80%"), Some(PacketType::Telemetry));
        assert_eq!(infer_subject("admin key"), Some(PacketType::Admin));
        assert_eq!(infer_subject("Range test 7"), Some(PacketType::RangeTest));
        assert_eq!(infer_subject("hi there"), None);
    }

    #[test]
    fn node_ids_fill_from_then_to() {
        let packet = text_packet(b"msg !a1b2c3d4 -> 0x0000beef ok").unwrap();
        assert_eq!(packet.from, 0xa1b2_c3d4);
        assert_eq!(packet.to, 0x0000_beef);
        assert_eq!(packet.packet_type, PacketType::Text);

        let single = text_packet(b"heard !00000042").unwrap();
        assert_eq!(single.from, 0x42);
        assert!(single.is_broadcast());

        assert_eq!(node_id_mentions("!1234567 0X12345678"), Vec::<u32>::new());
    }

    #[test]
    fn owner_with_short_name() {
        let identity = extract_identity("Node ID: !deadbeef\nOwner: John Doe (JD)").unwrap();
        assert_eq!(identity.node_num, Some(0xdead_beef));
        assert_eq!(identity.user.id, "!deadbeef");
        assert_eq!(identity.user.long_name, "John Doe");
        assert_eq!(identity.user.short_name, "JD");
    }

    #[test]
    fn owner_without_short_name() {
        let identity = extract_identity("my info node 0a0b0c0d\nuser: Alice Smith").unwrap();
        assert_eq!(identity.node_num, Some(0x0a0b_0c0d));
        assert_eq!(identity.user.long_name, "Alice Smith");
        assert_eq!(identity.user.short_name, "");
    }

    #[test]
    fn identity_needs_a_node_and_a_name() {
        assert!(extract_identity("Owner: John Doe (JD)").is_none());
        assert!(extract_identity("node id !00000000 owner: x").is_none());
        assert!(extract_identity("my info !12345678").is_none());
    }

    #[test]
    fn node_info_text_carries_identity() {
        let packet = text_packet(b"Owner: Ridge Runner (RR) !0badcafe").unwrap();
        let data = text_of(&packet);
        assert_eq!(data.inferred_type, Some(PacketType::NodeInfo));
        let identity = data.identity.as_ref().unwrap();
        assert_eq!(identity.user.short_name, "RR");
        assert_eq!(packet.from, 0x0bad_cafe);
    }

    #[test]
    fn hex_after_keyword_stays_on_line() {
        assert_eq!(extract_node_num("node\n12345678"), None);
        assert_eq!(extract_node_num("id = cafef00d"), Some(0xcafe_f00d));
    }
}
