//! Decode rules for the composite topics.
//!
//! Pure functions, so the payload shapes can be tested without a store.

use serde_json::Value;

/// Composite topic: dash-delimited indoor sensor reading.
pub const TOPIC_INDOOR: &str = "innen";
/// Composite topic: JSON object of device settings.
pub const TOPIC_SETTINGS: &str = "send_settings";

/// Derived keys for a decomposed indoor reading.
pub const KEY_INDOOR_TEMPERATURE: &str = "indoor/temperature";
pub const KEY_INDOOR_HUMIDITY: &str = "indoor/humidity";
pub const KEY_INDOOR_PRESSURE: &str = "indoor/pressure";

/// The raw settings blob is always kept under this key for audit visibility.
pub const KEY_SETTINGS_RAW: &str = "send_settings_payload";
/// Prefix for per-setting derived keys.
pub const SETTING_KEY_PREFIX: &str = "setting_";
/// Synthetic payload signalling "re-read the settings group".
pub const SETTINGS_UPDATED_MARKER: &str = "updated";

/// One decomposed `innen` reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndoorReading {
    pub temperature: String,
    pub humidity: String,
    pub pressure: String,
}

/// Splits an `innen` payload of the form `<temp>-<humidity>-<pressure>`.
///
/// Returns `None` unless the split yields exactly three parts; the caller
/// then stores the payload verbatim.
pub fn split_indoor(raw: &str) -> Option<IndoorReading> {
    let parts: Vec<&str> = raw.split('-').collect();
    match parts.as_slice() {
        [temperature, humidity, pressure] => Some(IndoorReading {
            temperature: temperature.trim().to_string(),
            humidity: humidity.trim().to_string(),
            pressure: pressure.trim().to_string(),
        }),
        _ => None,
    }
}

/// Parses a `send_settings` payload into per-setting key/value pairs.
///
/// Only a JSON object counts; arrays, scalars and malformed JSON return
/// `None` and the caller falls back to verbatim storage.
pub fn parse_settings(raw: &str) -> Option<Vec<(String, String)>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(
            map.into_iter()
                .map(|(name, value)| {
                    (
                        format!("{}{}", SETTING_KEY_PREFIX, name),
                        render_value(&value),
                    )
                })
                .collect(),
        ),
        _ => None,
    }
}

// String values lose their JSON quotes, everything else keeps its JSON
// rendering.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indoor_triple_splits_and_trims() {
        let reading = split_indoor(" 21.5 - 48 -1013 ").unwrap();
        assert_eq!(reading.temperature, "21.5");
        assert_eq!(reading.humidity, "48");
        assert_eq!(reading.pressure, "1013");
    }

    #[test]
    fn indoor_rejects_wrong_part_counts() {
        assert_eq!(split_indoor("21.5-48"), None);
        assert_eq!(split_indoor("a-b-c-d"), None);
        assert_eq!(split_indoor(""), None);
        assert_eq!(split_indoor("plain text"), None);
    }

    #[test]
    fn indoor_accepts_empty_fields() {
        // "--" splits into three empty parts, which is still a valid shape.
        let reading = split_indoor("--").unwrap();
        assert_eq!(reading.temperature, "");
        assert_eq!(reading.pressure, "");
    }

    #[test]
    fn settings_object_expands_with_prefix() {
        let pairs = parse_settings(r#"{"x":"1","y":"2"}"#).unwrap();
        assert!(pairs.contains(&("setting_x".to_string(), "1".to_string())));
        assert!(pairs.contains(&("setting_y".to_string(), "2".to_string())));
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn settings_values_keep_json_rendering_unless_strings() {
        let pairs = parse_settings(r#"{"interval":30,"enabled":true,"label":"pump"}"#).unwrap();
        assert!(pairs.contains(&("setting_interval".to_string(), "30".to_string())));
        assert!(pairs.contains(&("setting_enabled".to_string(), "true".to_string())));
        assert!(pairs.contains(&("setting_label".to_string(), "pump".to_string())));
    }

    #[test]
    fn settings_rejects_non_objects() {
        assert_eq!(parse_settings("not json"), None);
        assert_eq!(parse_settings(r#"["a","b"]"#), None);
        assert_eq!(parse_settings("42"), None);
        assert_eq!(parse_settings(r#""just a string""#), None);
    }
}
