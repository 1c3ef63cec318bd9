use serde::{Deserialize, Serialize};

/// Address, port and token a remote device needs to pair with this host.
///
/// Created once at startup and shared read-only by every session. The
/// field names match the payload encoded into the pairing QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingInfo {
    pub server_ip: String,
    pub port_no: u16,
    pub pairing_token: String,
}

impl PairingInfo {
    /// Returns the JSON text a QR renderer should encode.
    pub fn qr_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Clipboard operation requested by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardAction {
    Get,
    Set,
}

impl ClipboardAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "get" => Some(Self::Get),
            "set" => Some(Self::Set),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
        }
    }
}

/// Media control requested by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaAction {
    Volume,
    Brightness,
    PlayPause,
    Next,
    Previous,
}

impl MediaAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "volume" => Some(Self::Volume),
            "brightness" => Some(Self::Brightness),
            "playpause" => Some(Self::PlayPause),
            "next" => Some(Self::Next),
            "previous" => Some(Self::Previous),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Volume => "volume",
            Self::Brightness => "brightness",
            Self::PlayPause => "playpause",
            Self::Next => "next",
            Self::Previous => "previous",
        }
    }
}

/// Default step for a bare "up"/"down" volume or brightness adjustment.
pub const DEFAULT_LEVEL_STEP: i32 = 10;

/// Signed percentage step for volume and brightness.
///
/// Accepts `"up"`, `"down"`, signed numeric strings (`"+10"`, `"-5"`) or
/// plain JSON integers.
pub fn parse_level_step(value: &serde_json::Value) -> Option<i32> {
    match value {
        serde_json::Value::Null => Some(DEFAULT_LEVEL_STEP),
        serde_json::Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        serde_json::Value::String(s) => match s.trim() {
            "up" | "" => Some(DEFAULT_LEVEL_STEP),
            "down" => Some(-DEFAULT_LEVEL_STEP),
            other => other.parse::<i32>().ok(),
        },
        _ => None,
    }
}

/// One entry in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Full absolute path.
    pub path: String,
    pub is_dir: bool,
    /// Size in bytes (0 for directories).
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pairing_payload_field_names() {
        let info = PairingInfo {
            server_ip: "192.168.1.20".into(),
            port_no: 9000,
            pairing_token: "ab12cd34".into(),
        };
        let payload: serde_json::Value =
            serde_json::from_str(&info.qr_payload().unwrap()).unwrap();
        assert_eq!(payload["server_ip"], "192.168.1.20");
        assert_eq!(payload["port_no"], 9000);
        assert_eq!(payload["pairing_token"], "ab12cd34");
    }

    #[test]
    fn clipboard_action_parse() {
        assert_eq!(ClipboardAction::parse("get"), Some(ClipboardAction::Get));
        assert_eq!(ClipboardAction::parse("set"), Some(ClipboardAction::Set));
        assert_eq!(ClipboardAction::parse("GET"), None);
    }

    #[test]
    fn media_action_parse() {
        assert_eq!(MediaAction::parse("playpause"), Some(MediaAction::PlayPause));
        assert_eq!(MediaAction::parse("volume").map(MediaAction::as_str), Some("volume"));
        assert_eq!(MediaAction::parse("rewind"), None);
    }

    #[test]
    fn level_step_variants() {
        assert_eq!(parse_level_step(&json!("up")), Some(10));
        assert_eq!(parse_level_step(&json!("down")), Some(-10));
        assert_eq!(parse_level_step(&json!("+5")), Some(5));
        assert_eq!(parse_level_step(&json!("-20")), Some(-20));
        assert_eq!(parse_level_step(&json!(15)), Some(15));
        assert_eq!(parse_level_step(&serde_json::Value::Null), Some(10));
        assert_eq!(parse_level_step(&json!("loud")), None);
        assert_eq!(parse_level_step(&json!([1])), None);
    }
}
