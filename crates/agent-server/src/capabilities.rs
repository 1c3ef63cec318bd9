//! Host capability seam.
//!
//! The router owns protocol semantics; everything that touches the host
//! desktop (shell, clipboard, keyboard, audio, display, pointer) goes
//! through [`Capabilities`]. Implementors only override what the platform
//! supports; the defaults report [`CapabilityError::Unsupported`].

use std::future::Future;
use std::pin::Pin;

/// A boxed future returned by capability methods.
pub type CapabilityFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, CapabilityError>> + Send + 'a>>;

/// Failure of a host capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("{0} is not supported on this host")]
    Unsupported(&'static str),

    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0} seconds")]
    Timeout(u64),

    #[error("{0}")]
    Rejected(String),
}

/// Captured result of a shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Stdout when the command succeeded, stderr otherwise.
    pub fn combined(&self) -> &str {
        if self.success || self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Media transport keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    PlayPause,
    Next,
    Previous,
}

/// Host-side effects reachable from device requests.
pub trait Capabilities: Send + Sync + 'static {
    /// Runs a shell command. The router has already rejected empty and
    /// `sudo` commands and enforces the timeout.
    fn run_command(&self, command: String) -> CapabilityFuture<'_, CommandOutput> {
        let _ = command;
        Box::pin(async { Err(CapabilityError::Unsupported("command")) })
    }

    fn clipboard_get(&self) -> CapabilityFuture<'_, String> {
        Box::pin(async { Err(CapabilityError::Unsupported("clipboard")) })
    }

    fn clipboard_set(&self, text: String) -> CapabilityFuture<'_, ()> {
        let _ = text;
        Box::pin(async { Err(CapabilityError::Unsupported("clipboard")) })
    }

    /// Presses a named key such as `right` or `left`.
    fn press_key(&self, key: String) -> CapabilityFuture<'_, ()> {
        let _ = key;
        Box::pin(async { Err(CapabilityError::Unsupported("key press")) })
    }

    /// Adjusts output volume by a signed percentage step. Returns the new
    /// level when the platform reports one.
    fn adjust_volume(&self, step: i32) -> CapabilityFuture<'_, Option<u8>> {
        let _ = step;
        Box::pin(async { Err(CapabilityError::Unsupported("volume")) })
    }

    /// Adjusts display brightness by a signed percentage step.
    fn adjust_brightness(&self, step: i32) -> CapabilityFuture<'_, Option<u8>> {
        let _ = step;
        Box::pin(async { Err(CapabilityError::Unsupported("brightness")) })
    }

    fn media_key(&self, key: MediaKey) -> CapabilityFuture<'_, ()> {
        let _ = key;
        Box::pin(async { Err(CapabilityError::Unsupported("media keys")) })
    }

    /// Primary screen size in pixels.
    fn screen_size(&self) -> CapabilityFuture<'_, (u32, u32)> {
        Box::pin(async { Err(CapabilityError::Unsupported("pointer")) })
    }

    fn cursor_position(&self) -> CapabilityFuture<'_, (i32, i32)> {
        Box::pin(async { Err(CapabilityError::Unsupported("pointer")) })
    }

    /// Moves the cursor by a relative offset.
    fn move_cursor_by(&self, dx: i32, dy: i32) -> CapabilityFuture<'_, ()> {
        let _ = (dx, dy);
        Box::pin(async { Err(CapabilityError::Unsupported("pointer")) })
    }

    fn hostname(&self) -> String {
        hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;
    impl Capabilities for Bare {}

    #[tokio::test]
    async fn defaults_are_unsupported() {
        let caps = Bare;
        assert!(matches!(
            caps.run_command("ls".into()).await,
            Err(CapabilityError::Unsupported("command"))
        ));
        assert!(matches!(
            caps.clipboard_get().await,
            Err(CapabilityError::Unsupported(_))
        ));
        assert!(matches!(
            caps.move_cursor_by(1, 1).await,
            Err(CapabilityError::Unsupported("pointer"))
        ));
    }

    #[test]
    fn default_hostname_is_not_empty() {
        assert!(!Bare.hostname().is_empty());
    }

    #[test]
    fn combined_output_prefers_stderr_on_failure() {
        let out = CommandOutput {
            success: false,
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "boom".into(),
        };
        assert_eq!(out.combined(), "boom");

        let ok = CommandOutput {
            success: true,
            exit_code: Some(0),
            stdout: "fine".into(),
            stderr: "warning".into(),
        };
        assert_eq!(ok.combined(), "fine");
    }
}
