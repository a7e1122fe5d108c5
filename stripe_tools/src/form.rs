use std::collections::BTreeMap;

/// Builds `application/x-www-form-urlencoded` bodies in Stripe's bracket notation, e.g.
/// `line_items[0][price_data][unit_amount]=2500`.
#[derive(Debug, Clone, Default)]
pub struct FormBuilder {
    fields: Vec<(String, String)>,
}

impl FormBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<K: Into<String>, V: ToString>(&mut self, key: K, value: V) -> &mut Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    pub fn push_opt<K: Into<String>, V: ToString>(&mut self, key: K, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.push(key, v);
        }
        self
    }

    /// Adds every entry of `map` as `prefix[key]=value`.
    pub fn push_map(&mut self, prefix: &str, map: &BTreeMap<String, String>) -> &mut Self {
        for (k, v) in map {
            self.push(format!("{prefix}[{k}]"), v);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
