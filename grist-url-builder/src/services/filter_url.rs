//! Filter URL templates for the Grist `records` endpoint.
//!
//! A template looks like
//! `{base}/api/docs/{doc}/tables/{table}/records?filter=%7B%22Status%22%3A%5B%22{id}%22%5D%7D`:
//! the whole `filter` value is percent-encoded except the literal `{id}`
//! marker, which downstream consumers replace with a record key.

use serde_json::{json, Map, Value};

/// Literal marker left unencoded in generated templates.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Stand-in serialized in place of the marker. Made only of unreserved
/// characters so percent-encoding leaves it untouched.
const SENTINEL: &str = "GRIST_URL_BUILDER_PLACEHOLDER_ID";

/// Percent-encode the JSON filter `{"<column>":["{id}"]}`, keeping `{id}`
/// literal.
pub fn encode_filter(column_name: &str) -> String {
    let mut filter = Map::new();
    filter.insert(column_name.to_string(), json!([SENTINEL]));
    let filter = Value::Object(filter).to_string();

    let encoded = urlencoding::encode(&filter).into_owned();

    // The array value is serialized after the key, so the last occurrence is
    // always the one we inserted, even if the column name contains the
    // sentinel text.
    match encoded.rfind(SENTINEL) {
        Some(start) => {
            let mut template = String::with_capacity(encoded.len());
            template.push_str(&encoded[..start]);
            template.push_str(ID_PLACEHOLDER);
            template.push_str(&encoded[start + SENTINEL.len()..]);
            template
        }
        None => encoded,
    }
}

/// Build the full records URL template for a document table and column.
pub fn build_template(base_url: &str, doc_id: &str, table_name: &str, column_name: &str) -> String {
    format!(
        "{}/api/docs/{}/tables/{}/records?filter={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(doc_id),
        urlencoding::encode(table_name),
        encode_filter(column_name)
    )
}

/// Replace every `{id}` in the template with `value`.
pub fn substitute(template: &str, value: &str) -> String {
    template.replace(ID_PLACEHOLDER, value)
}

/// Decoded `filter` query value of a URL, if present.
pub fn decoded_filter(url: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    let raw = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("filter="))?;
    urlencoding::decode(raw).ok().map(|decoded| decoded.into_owned())
}

/// String form of a JSON test value as it is spliced into a template.
///
/// Strings are used verbatim; numbers and booleans use their JSON text.
/// `null` and blank strings count as missing.
pub fn test_value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://grist.example.org";

    #[test]
    fn template_contains_single_literal_placeholder() {
        let url = build_template(BASE, "abc123", "Projects", "Status");

        assert_eq!(url.matches(ID_PLACEHOLDER).count(), 1);
        assert_eq!(url.matches('{').count(), 1);
        assert_eq!(url.matches('}').count(), 1);
        assert!(url.starts_with("https://grist.example.org/api/docs/abc123/tables/Projects/records?filter="));
    }

    #[test]
    fn filled_template_decodes_to_column_filter() {
        let url = build_template(BASE, "abc123", "Projects", "Status");
        let filled = substitute(&url, "42");

        let filter = decoded_filter(&filled).unwrap();
        assert_eq!(filter, r#"{"Status":["42"]}"#);

        let parsed: Value = serde_json::from_str(&filter).unwrap();
        assert_eq!(parsed, json!({"Status": ["42"]}));
    }

    #[test]
    fn reserved_characters_in_column_are_encoded() {
        let encoded = encode_filter("Nom {complet} & \"x\"/y");

        assert_eq!(encoded.matches(ID_PLACEHOLDER).count(), 1);
        assert_eq!(encoded.matches('{').count(), 1);
        for reserved in ['"', '&', ' ', '/', ':', '[', ']'] {
            assert!(!encoded.contains(reserved), "{reserved:?} left unencoded");
        }

        let filled = substitute(&encoded, "7");
        let decoded = urlencoding::decode(&filled).unwrap();
        let parsed: Value = serde_json::from_str(&decoded).unwrap();
        assert_eq!(parsed, json!({"Nom {complet} & \"x\"/y": ["7"]}));
    }

    #[test]
    fn column_named_like_sentinel_keeps_its_name() {
        let encoded = encode_filter(SENTINEL);
        let decoded = urlencoding::decode(&substitute(&encoded, "1"))
            .unwrap()
            .into_owned();
        let parsed: Value = serde_json::from_str(&decoded).unwrap();
        assert_eq!(parsed, json!({ "GRIST_URL_BUILDER_PLACEHOLDER_ID": ["1"] }));
    }

    #[test]
    fn substitute_replaces_every_occurrence() {
        let filled = substitute("a/{id}/b?x={id}", "99");
        assert_eq!(filled, "a/99/b?x=99");
        assert!(!filled.contains(ID_PLACEHOLDER));
    }

    #[test]
    fn path_segments_are_encoded() {
        let url = build_template("https://grist.example.org/", "doc/1", "My Table", "C");
        assert!(url.starts_with("https://grist.example.org/api/docs/doc%2F1/tables/My%20Table/records"));
    }

    #[test]
    fn test_value_text_follows_json_type() {
        assert_eq!(test_value_text(&json!("abc")), Some("abc".to_string()));
        assert_eq!(test_value_text(&json!(42)), Some("42".to_string()));
        assert_eq!(test_value_text(&json!(0)), Some("0".to_string()));
        assert_eq!(test_value_text(&json!(true)), Some("true".to_string()));
        assert_eq!(test_value_text(&json!("  ")), None);
        assert_eq!(test_value_text(&Value::Null), None);
    }
}
