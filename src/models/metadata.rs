use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Open key-value map attached to every log entry
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Arbitrary client-supplied value kept as-is through ingestion.
///
/// Serialized untagged, so any JSON shape a client sends is stored unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum MetadataValue {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<MetadataValue>),
    Object(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MetadataValue::Null)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Number(value.into())
    }
}

impl From<serde_json::Value> for MetadataValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => MetadataValue::Null,
            serde_json::Value::Bool(b) => MetadataValue::Bool(b),
            serde_json::Value::Number(n) => MetadataValue::Number(n),
            serde_json::Value::String(s) => MetadataValue::String(s),
            serde_json::Value::Array(items) => {
                MetadataValue::Array(items.into_iter().map(MetadataValue::from).collect())
            }
            serde_json::Value::Object(map) => MetadataValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, MetadataValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Accepts `null` wherever a defaultable value is expected.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_shapes_survive() {
        let raw = json!({
            "requestId": "abc",
            "retries": 3,
            "ratio": 0.25,
            "cached": false,
            "missing": null,
            "tags": ["db", {"shard": 2}],
            "http": {"status": 504, "headers": {"x-trace": "t1"}}
        });

        let metadata: Metadata = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(metadata["requestId"].as_str(), Some("abc"));
        assert!(metadata["missing"].is_null());
        assert!(matches!(metadata["tags"], MetadataValue::Array(ref items) if items.len() == 2));

        assert_eq!(serde_json::to_value(&metadata).unwrap(), raw);
    }

    #[test]
    fn test_from_json_value() {
        let value = MetadataValue::from(json!({"a": [1, "two"]}));
        let MetadataValue::Object(map) = value else {
            panic!("expected object");
        };
        assert_eq!(
            map["a"],
            MetadataValue::Array(vec![MetadataValue::from(1i64), MetadataValue::from("two")])
        );
    }
}
