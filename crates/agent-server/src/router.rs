//! Message router: one decoded request in, exactly one reply out.
//!
//! The router never fails. Decode errors, semantic errors and capability
//! failures all become `error` or `<op>_error` replies.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use deskbridge_file_ops::{DEFAULT_MAX_DOWNLOAD_BYTES, expand_path, list_directory, read_for_download};
use deskbridge_protocol::constants::*;
use deskbridge_protocol::messages::*;
use deskbridge_protocol::types::parse_level_step;
use deskbridge_protocol::{
    ClipboardAction, DecodeError, MediaAction, PairingInfo, Reply, Request, decode_request,
};
use deskbridge_transfer::{FileAssembler, TransferError, TransferRegistry};
use futures_util::FutureExt;

use crate::capabilities::{CapabilityError, CapabilityFuture, Capabilities, MediaKey};
use crate::input::translate;
use crate::pairing::validate_token;

/// Default timeout for `command` execution.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-process router settings.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Reject privileged requests until the connection has paired.
    pub require_pairing: bool,
    pub command_timeout: Duration,
    pub max_download_bytes: u64,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            require_pairing: false,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
        }
    }
}

/// Connection-local state threaded through every dispatch.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub conn_id: String,
    pub peer: String,
    pub paired: bool,
}

impl SessionState {
    pub fn new(conn_id: impl Into<String>, peer: impl Into<String>) -> Self {
        Self {
            conn_id: conn_id.into(),
            peer: peer.into(),
            paired: false,
        }
    }
}

/// Dispatches device requests to the transfer registry, file operations
/// and host capabilities.
pub struct Router<C> {
    pairing: PairingInfo,
    registry: Arc<TransferRegistry>,
    assembler: FileAssembler,
    capabilities: Arc<C>,
    options: RouterOptions,
}

impl<C: Capabilities> Router<C> {
    pub fn new(
        pairing: PairingInfo,
        registry: Arc<TransferRegistry>,
        assembler: FileAssembler,
        capabilities: Arc<C>,
        options: RouterOptions,
    ) -> Self {
        Self {
            pairing,
            registry,
            assembler,
            capabilities,
            options,
        }
    }

    pub fn pairing_info(&self) -> &PairingInfo {
        &self.pairing
    }

    pub fn registry(&self) -> &Arc<TransferRegistry> {
        &self.registry
    }

    /// The `hello` sent on connect, before any client request.
    pub fn greeting(&self) -> Reply {
        Reply::Hello(HelloGreeting {
            token: self.pairing.pairing_token.clone(),
            message: HELLO_MESSAGE.into(),
        })
    }

    /// Decodes one text frame and produces its reply.
    pub async fn dispatch(&self, state: &mut SessionState, text: &str) -> Reply {
        match decode_request(text) {
            Ok(request) => self.handle(state, request).await,
            Err(e) => {
                tracing::debug!(conn_id = %state.conn_id, "rejected frame: {e}");
                e.into_reply()
            }
        }
    }

    /// Handles one decoded request.
    async fn handle(&self, state: &mut SessionState, request: Request) -> Reply {
        if self.options.require_pairing && request.is_privileged() && !state.paired {
            tracing::warn!(
                conn_id = %state.conn_id,
                kind = request.kind(),
                "privileged request before pairing"
            );
            return Reply::error(NOT_PAIRED_MESSAGE);
        }

        match request {
            Request::Hello {} => Reply::HelloAck(HelloAck {
                message: HELLO_ACK_MESSAGE.into(),
                server_time: now_secs(),
            }),
            Request::Pair(req) => self.handle_pair(state, req),
            Request::Command(req) => self.handle_command(req).await,
            Request::Clipboard(req) => self.handle_clipboard(req).await,
            Request::Ping {} => Reply::Pong(Pong {
                timestamp: now_secs(),
            }),
            Request::GetHostname {} => Reply::Hostname(HostnameResponse {
                hostname: self.capabilities.hostname(),
            }),
            Request::Presentation(req) => self.handle_presentation(req).await,
            Request::Media(req) => self.handle_media(req).await,
            Request::RemoteInput(req) => self.handle_remote_input(state, req).await,
            Request::FileStart(req) => self.handle_file_start(req),
            Request::FileChunk(req) => self.handle_file_chunk(req),
            Request::FileEnd(req) => self.handle_file_end(req).await,
            Request::FileListRequest(req) => self.handle_file_list(req).await,
            Request::FileDownloadRequest(req) => self.handle_file_download(req).await,
            Request::Unknown => DecodeError::UnknownType("unknown".into()).into_reply(),
        }
    }

    fn handle_pair(&self, state: &mut SessionState, req: PairRequest) -> Reply {
        if validate_token(&req.token, &self.pairing.pairing_token) {
            state.paired = true;
            tracing::info!(conn_id = %state.conn_id, peer = %state.peer, "device paired");
            Reply::PairSuccess(PairSuccess {
                message: PAIR_SUCCESS_MESSAGE.into(),
                server_info: self.pairing.clone(),
            })
        } else {
            tracing::warn!(conn_id = %state.conn_id, peer = %state.peer, "pairing attempt failed");
            Reply::PairFailed(MessageOnly::new(PAIR_FAILED_MESSAGE))
        }
    }

    async fn handle_command(&self, req: CommandRequest) -> Reply {
        let command = req.command.trim().to_string();
        let respond = |status: &str, message: String, output: Option<String>| {
            Reply::CommandResponse(CommandResponse {
                command: command.clone(),
                status: status.into(),
                message,
                output,
            })
        };

        let Some(program) = command.split_whitespace().next() else {
            return respond(STATUS_ERROR, "Command cannot be empty".into(), None);
        };
        if program.eq_ignore_ascii_case("sudo") {
            tracing::warn!(command = %command, "sudo command rejected");
            return respond(STATUS_ERROR, "Sudo commands are not supported".into(), None);
        }

        let timeout = self.options.command_timeout;
        let result = match tokio::time::timeout(
            timeout,
            guarded(self.capabilities.run_command(command.clone())),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(CapabilityError::Timeout(timeout.as_secs())),
        };

        match result {
            Ok(out) if out.success => respond(
                STATUS_SUCCESS,
                format!("Command {command} executed successfully"),
                Some(out.stdout),
            ),
            Ok(out) => {
                let code = out
                    .exit_code
                    .map_or_else(|| "signal".to_string(), |c| c.to_string());
                respond(
                    STATUS_ERROR,
                    format!("Command {command} exited with {code}"),
                    Some(out.combined().to_string()),
                )
            }
            Err(e) => {
                tracing::warn!(command = %command, "command failed: {e}");
                respond(
                    STATUS_ERROR,
                    format!("Error executing command \"{command}\": {e}"),
                    None,
                )
            }
        }
    }

    async fn handle_clipboard(&self, req: ClipboardRequest) -> Reply {
        match ClipboardAction::parse(&req.action) {
            Some(ClipboardAction::Get) => match guarded(self.capabilities.clipboard_get()).await {
                Ok(data) => Reply::ClipboardResponse(ClipboardResponse {
                    action: ClipboardAction::Get.as_str().into(),
                    data: Some(data),
                    message: None,
                }),
                Err(e) => Reply::error(format!("Clipboard error: {e}")),
            },
            Some(ClipboardAction::Set) => {
                match guarded(self.capabilities.clipboard_set(req.data)).await {
                    Ok(()) => Reply::ClipboardResponse(ClipboardResponse {
                        action: ClipboardAction::Set.as_str().into(),
                        data: None,
                        message: Some("Clipboard updated".into()),
                    }),
                    Err(e) => Reply::error(format!("Clipboard error: {e}")),
                }
            }
            None => Reply::error(format!("Unknown clipboard action: {}", req.action)),
        }
    }

    async fn handle_presentation(&self, req: PresentationRequest) -> Reply {
        let key = match req.action.as_str() {
            "next" => "right".to_string(),
            "previous" => "left".to_string(),
            other => other.to_string(),
        };
        if key.is_empty() {
            return Reply::KeyPressResponse(KeyPressResponse {
                key,
                status: STATUS_ERROR.into(),
                message: "No key given".into(),
            });
        }

        let (status, message) = match guarded(self.capabilities.press_key(key.clone())).await {
            Ok(()) => (STATUS_SUCCESS, "Key pressed".to_string()),
            Err(e) => {
                tracing::warn!(key = %key, "key press failed: {e}");
                (STATUS_ERROR, e.to_string())
            }
        };
        Reply::KeyPressResponse(KeyPressResponse {
            key,
            status: status.into(),
            message,
        })
    }

    async fn handle_media(&self, req: MediaRequest) -> Reply {
        let Some(action) = MediaAction::parse(&req.action) else {
            return Reply::error(format!("Unknown media action: {}", req.action));
        };

        match action {
            MediaAction::Volume | MediaAction::Brightness => {
                let wrap: fn(MediaResponse) -> Reply = if action == MediaAction::Volume {
                    Reply::VolumeResponse
                } else {
                    Reply::BrightnessResponse
                };
                let Some(step) = parse_level_step(&req.value) else {
                    return wrap(media_response(
                        action,
                        Err(CapabilityError::Rejected(format!(
                            "Invalid {} value: {}",
                            action.as_str(),
                            req.value
                        ))),
                    ));
                };
                let result = if action == MediaAction::Volume {
                    guarded(self.capabilities.adjust_volume(step)).await
                } else {
                    guarded(self.capabilities.adjust_brightness(step)).await
                };
                wrap(media_response(action, result))
            }
            MediaAction::PlayPause | MediaAction::Next | MediaAction::Previous => {
                let key = match action {
                    MediaAction::PlayPause => MediaKey::PlayPause,
                    MediaAction::Next => MediaKey::Next,
                    _ => MediaKey::Previous,
                };
                let result = guarded(self.capabilities.media_key(key)).await.map(|()| None);
                Reply::MediaResponse(media_response(action, result))
            }
        }
    }

    async fn handle_remote_input(&self, state: &SessionState, req: RemoteInputRequest) -> Reply {
        let Some(normalized) = req.normalized() else {
            return remote_input_error();
        };

        let caps = &self.capabilities;
        let outcome = async {
            let screen = guarded(caps.screen_size()).await?;
            let cursor = guarded(caps.cursor_position()).await?;
            let mv = translate(normalized, screen, cursor);
            guarded(caps.move_cursor_by(mv.delta_x, mv.delta_y)).await?;
            Ok::<_, CapabilityError>(mv)
        }
        .await;

        match outcome {
            Ok(mv) => Reply::RemoteInputResponse(RemoteInputResponse {
                status: STATUS_SUCCESS.into(),
                x: Some(mv.target_x),
                y: Some(mv.target_y),
                message: None,
            }),
            Err(e) => {
                tracing::warn!(conn_id = %state.conn_id, "cursor move failed: {e}");
                remote_input_error()
            }
        }
    }

    fn handle_file_start(&self, req: FileStartRequest) -> Reply {
        self.registry
            .begin(&req.file_id, &req.file_name, req.file_size, &req.mime);
        Reply::FileStartResponse(FileStartResponse {
            file_id: req.file_id,
            receive: true,
            status: STATUS_READY.into(),
        })
    }

    fn handle_file_chunk(&self, req: FileChunkRequest) -> Reply {
        let result = self
            .registry
            .append_encoded(&req.file_id, req.index, &req.data);
        match result {
            Ok(progress) => Reply::FileChunkResponse(FileChunkResponse {
                file_id: req.file_id,
                index: req.index,
                received: progress.received,
                progress: progress.percent,
            }),
            Err(e) => {
                tracing::warn!(transfer_id = %req.file_id, index = req.index, "chunk rejected: {e}");
                Reply::FileChunkError(TransferErrorResponse {
                    file_id: req.file_id,
                    message: e.to_string(),
                })
            }
        }
    }

    async fn handle_file_end(&self, req: FileEndRequest) -> Reply {
        let file_id = req.file_id;
        let end_error = |file_id: String, message: String| {
            Reply::FileEndError(TransferErrorResponse { file_id, message })
        };

        let completed = match self.registry.finish(&file_id) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(transfer_id = %file_id, "file_end rejected: {e}");
                return end_error(file_id, e.to_string());
            }
        };

        let size = completed.size();
        let assembler = self.assembler.clone();
        let name = completed.name;
        let data = completed.data;
        let persisted =
            tokio::task::spawn_blocking(move || assembler.persist(&name, &data)).await;

        let path = match persisted {
            Ok(Ok(path)) => path,
            Ok(Err(e)) => {
                tracing::error!(transfer_id = %file_id, "failed to save upload: {e}");
                return end_error(file_id, e.to_string());
            }
            Err(e) => {
                tracing::error!(transfer_id = %file_id, "save task failed: {e}");
                return end_error(file_id, TransferError::Io(std::io::Error::other(e)).to_string());
            }
        };

        tracing::info!(transfer_id = %file_id, path = %path.display(), bytes = size, "transfer complete");
        Reply::FileEndResponse(FileEndResponse {
            file_id,
            status: STATUS_SUCCESS.into(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_size: size,
            path: path.to_string_lossy().into_owned(),
        })
    }

    async fn handle_file_list(&self, req: FileListRequest) -> Reply {
        let (dir, is_default) = if req.directory.trim().is_empty() {
            (self.assembler.downloads_dir().to_path_buf(), true)
        } else {
            (expand_path(req.directory.trim()), false)
        };

        let target = dir.clone();
        let listed = tokio::task::spawn_blocking(move || {
            if is_default {
                std::fs::create_dir_all(&target)?;
            }
            list_directory(&target)
        })
        .await;

        match listed {
            Ok(Ok(files)) => Reply::FileListResponse(FileListResponse {
                directory: dir.to_string_lossy().into_owned(),
                files,
            }),
            Ok(Err(e)) => Reply::FileListError(MessageOnly::new(e.to_string())),
            Err(e) => Reply::FileListError(MessageOnly::new(e.to_string())),
        }
    }

    async fn handle_file_download(&self, req: FileDownloadRequest) -> Reply {
        let raw = req.file_path.trim();
        if raw.is_empty() {
            return Reply::FileDownloadError(MessageOnly::new("No file path given"));
        }

        let path: PathBuf = expand_path(raw);
        let max = self.options.max_download_bytes;
        match tokio::task::spawn_blocking(move || read_for_download(&path, max)).await {
            Ok(Ok(file)) => Reply::FileDownloadResponse(file.into_response()),
            Ok(Err(e)) => {
                tracing::warn!(path = raw, "download refused: {e}");
                Reply::FileDownloadError(MessageOnly::new(e.to_string()))
            }
            Err(e) => Reply::FileDownloadError(MessageOnly::new(e.to_string())),
        }
    }
}

/// Awaits a capability call, converting a panic into [`CapabilityError::Failed`].
async fn guarded<T>(fut: CapabilityFuture<'_, T>) -> Result<T, CapabilityError> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(CapabilityError::Failed("capability panicked".into())),
    }
}

fn media_response(action: MediaAction, result: Result<Option<u8>, CapabilityError>) -> MediaResponse {
    match result {
        Ok(level) => MediaResponse {
            action: action.as_str().into(),
            status: STATUS_SUCCESS.into(),
            message: format!("{} applied", action.as_str()),
            level,
        },
        Err(e) => {
            tracing::warn!(action = action.as_str(), "media action failed: {e}");
            MediaResponse {
                action: action.as_str().into(),
                status: STATUS_ERROR.into(),
                message: e.to_string(),
                level: None,
            }
        }
    }
}

fn remote_input_error() -> Reply {
    Reply::RemoteInputResponse(RemoteInputResponse {
        status: STATUS_ERROR.into(),
        x: None,
        y: None,
        message: Some(CURSOR_MOVE_FAILED.into()),
    })
}

/// Seconds since the Unix epoch.
fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
