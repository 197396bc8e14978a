// src/deutils.rs
//! serde helpers for the loosely typed JSON the queue server and stored presets produce.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::model::{Patient, QueueConfig};

pub fn default_true() -> bool { true }

/// Accepts `"7"`, `7` or `7.0` and yields the textual form.
pub fn deserialize_string_from_anything<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let v = Value::deserialize(deserializer)?;
    value_to_string(&v).ok_or_else(|| D::Error::custom(format!("expected string or number, got {}", v)))
}

/// Optional flavour of [`deserialize_string_from_anything`]; `null` and `""` map to `None`.
pub fn deserialize_opt_string_from_anything<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.as_ref()
        .and_then(value_to_string)
        .filter(|s| !s.trim().is_empty()))
}

/// Call timestamps arrive as epoch millis, sometimes quoted, sometimes as floats.
pub fn deserialize_opt_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let v = Option::<Value>::deserialize(deserializer)?;
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| D::Error::custom("timestamp out of range")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("non-numeric timestamp: {}", s))),
        Some(other) => Err(D::Error::custom(format!("unexpected timestamp: {}", other))),
    }
}

/// The server encodes "nobody is being served" as `null`, `{}` or a patient with an empty id.
pub fn deserialize_current_patient<'de, D>(deserializer: D) -> Result<Option<Patient>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) if map.is_empty() => Ok(None),
        Some(other) => {
            let patient: Patient = serde_json::from_value(other).map_err(serde::de::Error::custom)?;
            Ok(if patient.is_sentinel() { None } else { Some(patient) })
        }
    }
}

/// Stored presets hold their configuration either inline or as serialized JSON text.
pub fn decode_config_value(value: &Value) -> Result<QueueConfig, serde_json::Error> {
    match value {
        Value::String(text) => serde_json::from_str(text),
        other => QueueConfig::deserialize(other),
    }
}

fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(
            n.as_i64()
                .map(|i| i.to_string())
                .unwrap_or_else(|| n.to_string()),
        ),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "deserialize_opt_string_from_anything")]
        window: Option<String>,
        #[serde(default, deserialize_with = "deserialize_opt_timestamp")]
        ts: Option<i64>,
    }

    #[test]
    fn numbers_and_strings_collapse_to_text() {
        let p: Probe = serde_json::from_value(json!({"window": 2, "ts": "1700000000000"})).unwrap();
        assert_eq!(p.window.as_deref(), Some("2"));
        assert_eq!(p.ts, Some(1_700_000_000_000));

        let p: Probe = serde_json::from_value(json!({"window": "", "ts": null})).unwrap();
        assert_eq!(p.window, None);
        assert_eq!(p.ts, None);
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let r: Result<Probe, _> = serde_json::from_value(json!({"ts": "soon"}));
        assert!(r.is_err());
    }

    #[test]
    fn config_decodes_from_text_or_object() {
        let cfg = QueueConfig::default();
        let as_obj = serde_json::to_value(&cfg).unwrap();
        let as_text = Value::String(serde_json::to_string(&cfg).unwrap());

        assert_eq!(decode_config_value(&as_obj).unwrap().layout, cfg.layout);
        assert_eq!(decode_config_value(&as_text).unwrap().layout, cfg.layout);
        assert!(decode_config_value(&Value::String("{not json".into())).is_err());
    }
}
