use serde_json::Value;

use crate::model::config_service::JsonPath;

/// Descends `path` from `root`. Objects are entered by key, arrays by numeric index.
/// Missing nodes and `null` values are absent.
pub fn get_path<'a>(root: &'a Value, path: &JsonPath) -> Option<&'a Value> {
    path.segments().iter().try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    }).filter(|v| !v.is_null())
}

pub fn get_optional_path<'a>(root: &'a Value, path: Option<&JsonPath>) -> Option<&'a Value> {
    path.and_then(|p| get_path(root, p))
}

/// Scalar as trimmed text, empty strings are absent.
pub fn value_as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

pub fn get_text(root: &Value, path: Option<&JsonPath>) -> Option<String> {
    get_optional_path(root, path).and_then(value_as_text)
}

/// Lists of scalars or of objects carrying a `name`/`title`/`label`; a single scalar is a one element list.
pub fn value_as_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(|item| match item {
            Value::Object(map) => ["name", "title", "label", "value"].iter()
                .find_map(|key| map.get(*key).and_then(value_as_text)),
            other => value_as_text(other),
        }).collect(),
        other => value_as_text(other).into_iter().collect(),
    }
}
