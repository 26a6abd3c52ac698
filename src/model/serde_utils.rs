use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::Bool(value) => Some(value.to_string()),
        Value::Number(value) => Some(value.to_string()),
        Value::String(value) => Some(value.to_string()),
        _ => None,
    }
}

pub fn deserialize_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    Ok(value_to_string(&value).unwrap_or_default())
}

/// Accepts a yaml sequence or a comma separated string.
pub fn deserialize_as_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    let items = match value {
        Value::String(text) => text.split(',').map(str::to_string).collect(),
        Value::Array(values) => values.iter().filter_map(value_to_string).collect(),
        Value::Null => vec![],
        other => value_to_string(&other).into_iter().collect(),
    };
    Ok(items.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
}
