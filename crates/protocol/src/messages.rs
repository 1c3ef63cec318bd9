use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::types::{FileEntry, PairingInfo};

// ---------------------------------------------------------------------------
// Request payloads
//
// Every field is optional on the wire; missing fields fall back to their
// defaults so a sparse envelope still reaches its handler.
// ---------------------------------------------------------------------------

/// Pairing attempt with the token read from the QR code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairRequest {
    pub token: String,
}

/// Shell command to run on the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandRequest {
    pub command: String,
}

/// Clipboard read or write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardRequest {
    pub action: String,
    pub data: String,
}

impl Default for ClipboardRequest {
    fn default() -> Self {
        Self {
            action: "get".into(),
            data: String::new(),
        }
    }
}

/// Presentation remote: the action is a key name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationRequest {
    pub action: String,
}

/// Volume, brightness or playback control.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaRequest {
    pub action: String,
    pub value: serde_json::Value,
}

/// Touchpad position from the device.
///
/// `normalized_x`/`normalized_y` are in `[0, 1]`; when absent they are
/// derived from the raw finger position and the touchpad size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteInputRequest {
    pub finger_x: Option<f64>,
    pub finger_y: Option<f64>,
    pub normalized_x: Option<f64>,
    pub normalized_y: Option<f64>,
    pub touchpad_width: Option<f64>,
    pub touchpad_height: Option<f64>,
}

impl RemoteInputRequest {
    /// Resolves the normalized finger position, clamped to `[0, 1]`.
    pub fn normalized(&self) -> Option<(f64, f64)> {
        let x = self.normalized_x.or_else(|| ratio(self.finger_x, self.touchpad_width))?;
        let y = self.normalized_y.or_else(|| ratio(self.finger_y, self.touchpad_height))?;
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        Some((x.clamp(0.0, 1.0), y.clamp(0.0, 1.0)))
    }
}

fn ratio(pos: Option<f64>, extent: Option<f64>) -> Option<f64> {
    match (pos, extent) {
        (Some(p), Some(e)) if e > 0.0 => Some(p / e),
        _ => None,
    }
}

/// Announces a new upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileStartRequest {
    #[serde(deserialize_with = "string_or_number")]
    pub file_id: String,
    #[serde(alias = "name")]
    pub file_name: String,
    #[serde(alias = "size", deserialize_with = "whole_number")]
    pub file_size: u64,
    pub mime: String,
}

/// One base64 fragment of an upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileChunkRequest {
    #[serde(deserialize_with = "string_or_number")]
    pub file_id: String,
    #[serde(deserialize_with = "whole_number")]
    pub index: u64,
    pub data: String,
}

/// Finalizes an upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileEndRequest {
    #[serde(deserialize_with = "string_or_number")]
    pub file_id: String,
}

/// Accepts a transfer id sent as a JSON string or number.
fn string_or_number<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    match Value::deserialize(de)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(D::Error::custom(format!(
            "expected a string or number, found {other}"
        ))),
    }
}

/// Accepts a non-negative integer written as `4`, `4.0` or `"4"`.
fn whole_number<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(de)?;
    let parsed = match &value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole_f64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_f64))
        }
        Value::Null => Some(0),
        _ => None,
    };
    parsed.ok_or_else(|| D::Error::custom(format!("expected a whole number, found {value}")))
}

fn whole_f64(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}

/// Lists a host directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileListRequest {
    pub directory: String,
}

/// Fetches a host file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileDownloadRequest {
    pub file_path: String,
}

// ---------------------------------------------------------------------------
// Reply payloads
// ---------------------------------------------------------------------------

/// Unsolicited greeting sent on connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloGreeting {
    pub token: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloAck {
    pub message: String,
    /// Seconds since the Unix epoch.
    pub server_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSuccess {
    pub message: String,
    pub server_info: PairingInfo,
}

/// Generic reply carrying only a human-readable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageOnly {
    pub message: String,
}

impl MessageOnly {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub command: String,
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipboardResponse {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pong {
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostnameResponse {
    pub hostname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPressResponse {
    pub key: String,
    pub status: String,
    pub message: String,
}

/// Shared shape of `volume_response`, `brightness_response` and `media_response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaResponse {
    pub action: String,
    pub status: String,
    pub message: String,
    /// Level after the change, when the platform reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteInputResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStartResponse {
    pub file_id: String,
    pub receive: bool,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChunkResponse {
    pub file_id: String,
    pub index: u64,
    pub received: u64,
    /// Present only when the percentage crossed a reporting boundary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEndResponse {
    pub file_id: String,
    pub status: String,
    pub file_name: String,
    pub file_size: u64,
    pub path: String,
}

/// Failure of a `file_chunk` or `file_end` for one transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferErrorResponse {
    pub file_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileListResponse {
    pub directory: String,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDownloadResponse {
    pub file_name: String,
    pub file_path: String,
    pub file_size: u64,
    pub mime: String,
    /// Base64-encoded file contents.
    pub data: String,
}
