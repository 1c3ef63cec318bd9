use std::time::Duration;

/// Default TCP port the agent listens on.
pub const DEFAULT_PORT: u16 = 9000;

/// Length of the pairing token.
pub const TOKEN_LENGTH: usize = 8;

/// How often the server pings an idle client.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(5);

/// Time to wait for a pong before the connection is considered dead.
///
/// Must stay well above [`WS_PING_PERIOD`] so a busy client that is
/// streaming chunks is not dropped between pings.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// Maximum message size in bytes (50 MB).
pub const WS_MAX_MESSAGE_SIZE: usize = 50 * 1024 * 1024;

/// Greeting text carried by the server `hello`.
pub const HELLO_MESSAGE: &str = "Welcome from server!";

/// Reply text for an acknowledged client `hello`.
pub const HELLO_ACK_MESSAGE: &str = "Hello acknowledged from server";

pub const PAIR_SUCCESS_MESSAGE: &str = "Device paired successfully";
pub const PAIR_FAILED_MESSAGE: &str = "Invalid pairing token";

/// Reply text for a privileged request on an unpaired connection when the
/// pairing gate is enabled.
pub const NOT_PAIRED_MESSAGE: &str = "Device is not paired";

/// Reply text for an envelope body that is not a JSON object.
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON format";

/// Reply text when a remote cursor move fails.
pub const CURSOR_MOVE_FAILED: &str = "Failed to move cursor";

/// Status strings used in reply payloads.
pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";
pub const STATUS_READY: &str = "ready";
