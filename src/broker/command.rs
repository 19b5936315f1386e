//! Outbound command encodings understood by the device firmware.

/// Topic for settings changes.
pub const CHANGE_SETTING_TOPIC: &str = "changeSetting";

/// Topic that triggers the device to emit its current settings.
pub const SETTINGS_REQUEST_TOPIC: &str = "settings";

/// Literal payload for a settings request. The device answers on
/// `send_settings`.
pub const SETTINGS_REQUEST_PAYLOAD: &str = "REQUEST_SETTINGS";

/// Encodes a "change setting" command.
///
/// The firmware expects a bracket-wrapped two-field text encoding, not
/// strict JSON: `["<name>"],["<value>"]`. Name and value pass through
/// unescaped.
pub fn encode_setting_change(name: &str, value: &str) -> String {
    format!("[\"{}\"],[\"{}\"]", name, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_change_uses_the_bracket_encoding() {
        assert_eq!(
            encode_setting_change("pump_interval", "30"),
            r#"["pump_interval"],["30"]"#
        );
    }

    #[test]
    fn values_pass_through_unescaped() {
        assert_eq!(encode_setting_change("label", "a b"), r#"["label"],["a b"]"#);
        assert_eq!(encode_setting_change("", ""), r#"[""],[""]"#);
    }
}
