//! Per-session localized strings, filtered to the channel's language.

use std::collections::HashMap;

use serde_json::{Map, Value};

use castbot_common::models::LanguageRow;

use crate::utils::template;

#[derive(Debug, Clone, Default)]
pub struct LanguageTable {
    language: String,
    entries: HashMap<String, String>,
}

impl LanguageTable {
    /// Keeps only `language` rows; the first row wins for duplicate keys.
    pub fn for_language(rows: &[LanguageRow], language: &str) -> Self {
        let mut entries = HashMap::new();
        for row in rows.iter().filter(|r| r.language == language) {
            entries.entry(row.key.clone()).or_insert_with(|| row.value.clone());
        }
        Self {
            language: language.to_string(),
            entries,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Localized text for `key` with `vars` substituted. A missing key yields
    /// a diagnostic string instead of an error.
    pub fn message(&self, key: &str, vars: &Value) -> String {
        match self.get(key) {
            Some(tpl) => template::render(tpl, vars),
            None => format!("Missing translation for '{}'", key),
        }
    }

    /// All entries as a JSON object, for `${lang.KEY}` placeholders.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }
}
