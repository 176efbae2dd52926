// Flatten nested values into (leaf path, serialized value) records.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::path::{Key, join};

/// One stored leaf: the path relative to the store root and its JSON text.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub value: String,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Emit one record per leaf under `base`, in key insertion / index order.
///
/// Containers never produce a record of their own, so empty objects and
/// arrays vanish from the output.
pub fn flatten(value: &Value, base: &str) -> Vec<Record> {
    let mut out = Vec::new();
    walk(value, base, &mut out);
    out
}

fn walk(value: &Value, path: &str, out: &mut Vec<Record>) {
    match value {
        Value::Object(map) => {
            for (name, child) in map {
                walk(child, &join(path, &Key::Name(name.clone())), out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk(child, &join(path, &Key::Index(index)), out);
            }
        }
        leaf => out.push(Record::new(path, leaf.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{Record, flatten};
    use serde_json::json;

    #[test]
    fn flattens_objects_and_arrays_in_order() {
        let value = json!({
            "a": {"a1": 1, "a2": "2", "a3": {"a3a": 3}},
            "b": [0, 1],
            "c": [{"a": 1}, {"b": 2}, {"c": 3}]
        });
        let records = flatten(&value, "");
        let expected = [
            ("a.a1", "1"),
            ("a.a2", "\"2\""),
            ("a.a3.a3a", "3"),
            ("b[0]", "0"),
            ("b[1]", "1"),
            ("c[0].a", "1"),
            ("c[1].b", "2"),
            ("c[2].c", "3"),
        ];
        assert_eq!(records.len(), expected.len());
        for (record, (key, value)) in records.iter().zip(expected) {
            assert_eq!(record, &Record::new(key, value));
        }
    }

    #[test]
    fn base_path_prefixes_every_key() {
        let records = flatten(&json!({"x": [true, null]}), "settings");
        assert_eq!(
            records,
            vec![
                Record::new("settings.x[0]", "true"),
                Record::new("settings.x[1]", "null"),
            ]
        );
    }

    #[test]
    fn leaves_and_empty_containers() {
        assert_eq!(
            flatten(&json!("hi"), "greeting"),
            vec![Record::new("greeting", "\"hi\"")]
        );
        assert!(flatten(&json!({}), "empty").is_empty());
        assert!(flatten(&json!({"list": []}), "").is_empty());
    }
}
