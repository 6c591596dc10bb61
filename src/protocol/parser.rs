//! Tag scanner for `<TAG>value</TAG>` list responses.

use hashbrown::HashMap;

/// Upper-cased tag name to trimmed value, for one record.
pub type RawFields = HashMap<String, String>;

const RECORD_TAG: &str = "LISTRESPONSE";
const CONTAINER_TAGS: [&str; 2] = ["CMD", RECORD_TAG];

/// Splits a list response into per-record field maps.
///
/// Accepts both closed `<LISTRESPONSE>…</LISTRESPONSE>` blocks and bare
/// repeated `<LISTRESPONSE>` markers with no close tag. Regions that yield no
/// fields are dropped.
pub fn split_records(text: &str) -> Vec<RawFields> {
    let upper = text.to_ascii_uppercase();
    let open = format!("<{RECORD_TAG}>");
    let close = format!("</{RECORD_TAG}>");

    let mut regions: Vec<&str> = Vec::new();
    if upper.contains(&close) {
        let mut pos = 0;
        while let Some(rel) = upper[pos..].find(&open) {
            let start = pos + rel + open.len();
            let Some(end_rel) = upper[start..].find(&close) else {
                // Trailing block cut off mid-transfer.
                regions.push(&text[start..]);
                break;
            };
            regions.push(&text[start..start + end_rel]);
            pos = start + end_rel + close.len();
        }
    } else {
        let mut starts = upper.match_indices(&open).map(|(i, _)| i + open.len()).peekable();
        while let Some(start) = starts.next() {
            let end = starts.peek().map_or(text.len(), |next| next - open.len());
            regions.push(&text[start..end]);
        }
    }

    regions
        .into_iter()
        .map(parse_tags)
        .filter(|fields| !fields.is_empty())
        .collect()
}

/// Collects every well-formed `<NAME>value</NAME>` pair in `block`.
///
/// Unterminated tags are skipped one token at a time; container tags are
/// stepped over rather than captured.
pub fn parse_tags(block: &str) -> RawFields {
    let upper = block.to_ascii_uppercase();
    let mut fields = RawFields::new();
    let mut pos = 0;

    while let Some(rel) = upper[pos..].find('<') {
        let name_start = pos + rel + 1;
        let Some(name_len) = upper[name_start..].find('>') else {
            break;
        };
        let name_end = name_start + name_len;
        let name = upper[name_start..name_end].trim();
        let value_start = name_end + 1;

        if !is_tag_name(name) || CONTAINER_TAGS.contains(&name) {
            pos = if name.starts_with('/') || is_tag_name(name) {
                value_start
            } else {
                name_start
            };
            continue;
        }

        let closing = format!("</{name}>");
        match upper[value_start..].find(&closing) {
            Some(value_len) => {
                let value = block[value_start..value_start + value_len].trim();
                fields.insert(name.to_string(), value.to_string());
                pos = value_start + value_len + closing.len();
            }
            None => pos = value_start,
        }
    }

    fields
}

fn is_tag_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
