//! Link selector for the console connection.

use serde::{Deserialize, Serialize};

/// How the client reaches the console.
///
/// Serialized in lower case (`"usb"`, `"wifi"`) in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchProtocol {
    /// USB cable, length-prefixed binary frames.
    Usb,
    /// TCP socket over WiFi, line-terminated text.
    #[default]
    WiFi,
}

impl SwitchProtocol {
    /// Returns `true` when commands must be terminated with `\r\n`.
    ///
    /// Only the WiFi service reads its socket line by line.
    pub fn uses_crlf(self) -> bool {
        matches!(self, SwitchProtocol::WiFi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_wifi_uses_crlf() {
        assert!(SwitchProtocol::WiFi.uses_crlf());
        assert!(!SwitchProtocol::Usb.uses_crlf());
    }

    #[test]
    fn test_default_protocol_is_wifi() {
        assert_eq!(SwitchProtocol::default(), SwitchProtocol::WiFi);
    }

    #[test]
    fn test_protocol_serializes_lower_case() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            protocol: SwitchProtocol,
        }

        let text = toml::to_string(&Wrapper { protocol: SwitchProtocol::Usb }).unwrap();
        assert_eq!(text.trim(), r#"protocol = "usb""#);

        let parsed: Wrapper = toml::from_str(r#"protocol = "wifi""#).unwrap();
        assert_eq!(parsed.protocol, SwitchProtocol::WiFi);
    }
}
