//! Control-file parsing (`key: value` lines with continuations).

use std::collections::BTreeMap;

/// Parse control text into a key→value map.
///
/// A line splitting into exactly two `:`-separated fields starts a new key
/// (lowercased); any other line continues the current key's value,
/// newline-joined. A synthesized `title` holds the first line of
/// `description`, or `***` when there is no description.
pub fn parse_control(text: &str) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    let mut key: Option<String> = None;
    for line in text.split('\n') {
        let fields: Vec<&str> = line.split(':').collect();
        let value = if fields.len() == 2 {
            key = Some(fields[0].trim().to_lowercase());
            fields[1].trim().to_string()
        } else {
            fields[0].trim().to_string()
        };
        if let Some(key) = &key {
            map.entry(key.clone())
                .and_modify(|existing| {
                    existing.push('\n');
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
    }

    let title = map
        .get("description")
        .map(|d| d.lines().next().unwrap_or("").to_string())
        .unwrap_or_else(|| "***".to_string());
    map.insert("title".to_string(), title);
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_keys_and_continuation() {
        let map = parse_control("description: line one\nmore text\nmaintainer: alice");
        assert_eq!(map["description"], "line one\nmore text");
        assert_eq!(map["title"], "line one");
        assert_eq!(map["maintainer"], "alice");
    }

    #[test]
    fn test_keys_are_lowercased() {
        let map = parse_control("Maintainer: bob");
        assert_eq!(map["maintainer"], "bob");
    }

    #[test]
    fn test_multi_colon_line_continues_with_first_field() {
        // "url: http://x" splits into three fields and therefore continues
        // the previous key with the first field only.
        let map = parse_control("description: d\nurl: http://x");
        assert_eq!(map["description"], "d\nurl");
    }

    #[test]
    fn test_title_defaults_without_description() {
        let map = parse_control("maintainer: alice");
        assert_eq!(map["title"], "***");
    }

    #[test]
    fn test_leading_continuation_without_key_is_dropped() {
        let map = parse_control("stray line\nname: pkg");
        assert_eq!(map.get("stray line"), None);
        assert_eq!(map["name"], "pkg");
    }
}
