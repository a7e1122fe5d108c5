use std::collections::BTreeMap;

use serde_json::Value;
use url::Url;

/// Returns the URL unchanged if it parses as an absolute `http` or `https` URL with a host, and `None` otherwise.
///
/// Relative paths and `data:` URLs are valid in a browser but meaningless to a payment provider.
pub fn absolute_http_url(candidate: &str) -> Option<String> {
    let url = Url::parse(candidate.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Some(url.to_string()),
        _ => None,
    }
}

/// Flattens a JSON object into a flat string map, joining nested keys with `_`. Strings are used verbatim, other
/// scalars are rendered as JSON and nulls are dropped.
///
/// `{"shipping": {"city": "Paris"}, "user_id": 4}` becomes `{"shipping_city": "Paris", "user_id": "4"}`.
pub fn flatten_metadata(value: &Value) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    flatten_into("", value, &mut result);
    result
}

fn flatten_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Null => {},
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() { k.clone() } else { format!("{prefix}_{k}") };
                flatten_into(&key, v, out);
            }
        },
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_into(&format!("{prefix}_{i}"), v, out);
            }
        },
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        },
        other => {
            out.insert(prefix.to_string(), other.to_string());
        },
    }
}
