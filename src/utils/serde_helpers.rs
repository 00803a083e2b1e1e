/// 用于处理 SurrealDB Thing ID 的序列化/反序列化辅助模块

use serde::{Deserialize, Deserializer, Serializer};

/// 记录ID在查询结果中可能以字符串或 Thing 结构返回，统一反序列化为纯ID字符串
pub mod thing_id {
    use super::*;

    pub fn serialize<S>(id: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(id)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum IdValue {
            String(String),
            Thing {
                #[allow(dead_code)]
                tb: String,
                id: serde_json::Value,
            },
        }

        match IdValue::deserialize(deserializer)? {
            IdValue::String(s) => Ok(strip_table_prefix(&s)),
            IdValue::Thing { id, .. } => Ok(id_value_to_string(id)),
        }
    }

    fn id_value_to_string(id: serde_json::Value) -> String {
        match id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Object(map) => {
                // sql::Id 枚举形式，例如 {"String": "..."}
                map.into_iter()
                    .next()
                    .map(|(_, v)| id_value_to_string(v))
                    .unwrap_or_default()
            }
            other => other.to_string(),
        }
    }

    fn strip_table_prefix(id: &str) -> String {
        match id.split_once(':') {
            Some((_, rest)) => rest.trim_matches(['⟨', '⟩'].as_ref()).to_string(),
            None => id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Record {
        #[serde(with = "thing_id")]
        id: String,
    }

    #[test]
    fn test_deserialize_plain_string() {
        let rec: Record = serde_json::from_str(r#"{"id": "abc-123"}"#).unwrap();
        assert_eq!(rec.id, "abc-123");
    }

    #[test]
    fn test_deserialize_prefixed_string() {
        let rec: Record = serde_json::from_str(r#"{"id": "media:abc-123"}"#).unwrap();
        assert_eq!(rec.id, "abc-123");
    }

    #[test]
    fn test_deserialize_thing_struct() {
        let rec: Record =
            serde_json::from_str(r#"{"id": {"tb": "media", "id": {"String": "abc-123"}}}"#)
                .unwrap();
        assert_eq!(rec.id, "abc-123");
    }
}
