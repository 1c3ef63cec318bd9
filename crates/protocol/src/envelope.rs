use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::INVALID_JSON_MESSAGE;
use crate::messages::*;

/// Inbound envelope from a paired device.
///
/// The `type` field selects the variant; remaining fields form the payload.
/// Types the agent does not know deserialize to [`Request::Unknown`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Hello {},
    Pair(PairRequest),
    Command(CommandRequest),
    Clipboard(ClipboardRequest),
    Ping {},
    GetHostname {},
    Presentation(PresentationRequest),
    Media(MediaRequest),
    RemoteInput(RemoteInputRequest),
    FileStart(FileStartRequest),
    FileChunk(FileChunkRequest),
    FileEnd(FileEndRequest),
    FileListRequest(FileListRequest),
    FileDownloadRequest(FileDownloadRequest),
    #[serde(other)]
    Unknown,
}

impl Request {
    /// Wire name of this request type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hello {} => "hello",
            Self::Pair(_) => "pair",
            Self::Command(_) => "command",
            Self::Clipboard(_) => "clipboard",
            Self::Ping {} => "ping",
            Self::GetHostname {} => "get_hostname",
            Self::Presentation(_) => "presentation",
            Self::Media(_) => "media",
            Self::RemoteInput(_) => "remote_input",
            Self::FileStart(_) => "file_start",
            Self::FileChunk(_) => "file_chunk",
            Self::FileEnd(_) => "file_end",
            Self::FileListRequest(_) => "file_list_request",
            Self::FileDownloadRequest(_) => "file_download_request",
            Self::Unknown => "unknown",
        }
    }

    /// Returns `true` for requests that act on the host and can be gated
    /// behind a successful `pair`.
    pub fn is_privileged(&self) -> bool {
        match self {
            Self::Hello {} | Self::Pair(_) | Self::Ping {} | Self::GetHostname {} => false,
            Self::Command(_)
            | Self::Clipboard(_)
            | Self::Presentation(_)
            | Self::Media(_)
            | Self::RemoteInput(_)
            | Self::FileStart(_)
            | Self::FileChunk(_)
            | Self::FileEnd(_)
            | Self::FileListRequest(_)
            | Self::FileDownloadRequest(_) => true,
            Self::Unknown => false,
        }
    }
}

/// Outbound envelope. Every inbound request produces exactly one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Hello(HelloGreeting),
    HelloAck(HelloAck),
    PairSuccess(PairSuccess),
    PairFailed(MessageOnly),
    CommandResponse(CommandResponse),
    ClipboardResponse(ClipboardResponse),
    Pong(Pong),
    Hostname(HostnameResponse),
    KeyPressResponse(KeyPressResponse),
    VolumeResponse(MediaResponse),
    BrightnessResponse(MediaResponse),
    MediaResponse(MediaResponse),
    RemoteInputResponse(RemoteInputResponse),
    FileStartResponse(FileStartResponse),
    FileChunkResponse(FileChunkResponse),
    FileChunkError(TransferErrorResponse),
    FileEndResponse(FileEndResponse),
    FileEndError(TransferErrorResponse),
    FileListResponse(FileListResponse),
    FileListError(MessageOnly),
    FileDownloadResponse(FileDownloadResponse),
    FileDownloadError(MessageOnly),
    Error(MessageOnly),
}

impl Reply {
    /// Creates a generic `error` reply.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(MessageOnly::new(message))
    }

    /// Serializes the reply to its JSON text form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Reasons an inbound text frame could not become a [`Request`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("{}", INVALID_JSON_MESSAGE)]
    InvalidJson,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Invalid {msg_type} payload: {reason}")]
    InvalidPayload { msg_type: String, reason: String },
}

impl DecodeError {
    pub fn into_reply(self) -> Reply {
        Reply::error(self.to_string())
    }
}

/// Decodes one inbound text frame.
///
/// A body that is not a JSON object is [`DecodeError::InvalidJson`]. A
/// missing `type` is reported as the type `unknown`; a non-string `type` is
/// reported using its JSON text.
pub fn decode_request(text: &str) -> Result<Request, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(|_| DecodeError::InvalidJson)?;
    let Value::Object(map) = &value else {
        return Err(DecodeError::InvalidJson);
    };

    let msg_type = match map.get("type") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => return Err(DecodeError::UnknownType(other.to_string())),
        None => return Err(DecodeError::UnknownType("unknown".into())),
    };

    match serde_json::from_value::<Request>(value) {
        Ok(Request::Unknown) => Err(DecodeError::UnknownType(msg_type)),
        Ok(req) => Ok(req),
        Err(e) => Err(DecodeError::InvalidPayload {
            msg_type,
            reason: e.to_string(),
        }),
    }
}
