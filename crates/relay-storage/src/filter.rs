// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Structured field filters, as passed down from `relay-dispatcher` when
//! listing task messages. Each filter targets a set of (possibly nested)
//! fields; `relay-storage-surreal` flattens them to dotted Mongo-style
//! queries, `relay-storage-sql` flattens them to JSON-path column
//! comparisons (§4.3).

use std::collections::HashMap;

use serde_json::Value;

/// One filter clause: a set of fields ANDed together, optionally negated
/// (`exclude`). A list of `Filter`s is combined per §4.3's algebra:
/// inclusionary filters OR'd, exclusionary filters OR'd-then-negated, the
/// two groups AND'd.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub fields: HashMap<String, Value>,
    pub exclude: bool,
}

impl Filter {
    pub fn include(fields: HashMap<String, Value>) -> Self {
        Filter {
            fields,
            exclude: false,
        }
    }

    pub fn exclude(fields: HashMap<String, Value>) -> Self {
        Filter {
            fields,
            exclude: true,
        }
    }

    /// Flatten nested object values to dotted paths, e.g.
    /// `{"content": {"type": "text"}}` -> `{"content.type": "text"}`.
    pub fn flatten(&self) -> HashMap<String, Value> {
        let mut out = HashMap::new();
        flatten_into(&mut out, "", &self.fields);
        out
    }
}

fn flatten_into(out: &mut HashMap<String, Value>, prefix: &str, fields: &HashMap<String, Value>) {
    for (key, value) in fields {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(map) => {
                let nested: HashMap<String, Value> =
                    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                flatten_into(out, &full_key, &nested);
            }
            other => {
                out.insert(full_key, other.clone());
            }
        }
    }
}

/// Split a filter list into inclusionary and exclusionary groups (§4.3).
pub fn split_filters(filters: &[Filter]) -> (Vec<&Filter>, Vec<&Filter>) {
    let include: Vec<&Filter> = filters.iter().filter(|f| !f.exclude).collect();
    let exclude: Vec<&Filter> = filters.iter().filter(|f| f.exclude).collect();
    (include, exclude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_nested_object_to_dotted_path() {
        let mut fields = HashMap::new();
        fields.insert("content".to_string(), json!({"type": "text"}));
        let f = Filter::include(fields);
        let flat = f.flatten();
        assert_eq!(flat.get("content.type"), Some(&json!("text")));
    }

    #[test]
    fn empty_filter_list_splits_to_empty_groups() {
        let (inc, exc) = split_filters(&[]);
        assert!(inc.is_empty() && exc.is_empty());
    }

    #[test]
    fn splits_include_and_exclude() {
        let a = Filter::include(HashMap::new());
        let b = Filter::exclude(HashMap::new());
        let (inc, exc) = split_filters(&[a, b]);
        assert_eq!(inc.len(), 1);
        assert_eq!(exc.len(), 1);
    }
}
