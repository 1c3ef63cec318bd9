//! Host capabilities backed by the local desktop.
//!
//! Commands run without a shell. Clipboard access goes through `arboard`.
//! Keys, pointer, audio and backlight use the usual platform tools
//! (`xdotool`, `pactl`, `brightnessctl`, `playerctl` on Linux, `osascript`
//! on macOS, PowerShell `SendKeys` on Windows); anything missing is
//! reported as a capability failure.

use deskbridge_agent_server::{
    Capabilities, CapabilityError, CapabilityFuture, CommandOutput, MediaKey,
};
use tokio::process::Command;

/// Capabilities of the machine the agent runs on.
#[derive(Debug, Default)]
pub struct HostCapabilities;

impl HostCapabilities {
    pub fn new() -> Self {
        Self
    }
}

impl Capabilities for HostCapabilities {
    fn run_command(&self, command: String) -> CapabilityFuture<'_, CommandOutput> {
        Box::pin(async move {
            let (program, args) = split_command(&command)?;
            tracing::info!(%program, "running device command");

            // The router drops this future on timeout; kill_on_drop reaps the child.
            let output = Command::new(program)
                .args(args)
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|e| CapabilityError::Failed(format!("failed to start {program}: {e}")))?;

            Ok(CommandOutput {
                success: output.status.success(),
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        })
    }

    fn clipboard_get(&self) -> CapabilityFuture<'_, String> {
        Box::pin(async {
            blocking(|| {
                let mut clipboard = arboard::Clipboard::new().map_err(clipboard_error)?;
                clipboard.get_text().map_err(clipboard_error)
            })
            .await
        })
    }

    fn clipboard_set(&self, text: String) -> CapabilityFuture<'_, ()> {
        Box::pin(async move {
            blocking(move || {
                let mut clipboard = arboard::Clipboard::new().map_err(clipboard_error)?;
                clipboard.set_text(text).map_err(clipboard_error)
            })
            .await
        })
    }

    fn press_key(&self, key: String) -> CapabilityFuture<'_, ()> {
        Box::pin(async move {
            if cfg!(target_os = "linux") {
                run_tool("xdotool", &["key", &xdotool_key(&key)]).await?;
            } else if cfg!(target_os = "macos") {
                let script = macos_key_script(&key);
                run_tool("osascript", &["-e", &script]).await?;
            } else if cfg!(windows) {
                let script = format!(
                    "(New-Object -ComObject WScript.Shell).SendKeys('{}')",
                    send_keys_code(&key)
                );
                run_tool("powershell", &["-NoProfile", "-Command", &script]).await?;
            } else {
                return Err(CapabilityError::Unsupported("key press"));
            }
            Ok(())
        })
    }

    fn adjust_volume(&self, step: i32) -> CapabilityFuture<'_, Option<u8>> {
        Box::pin(async move {
            if cfg!(target_os = "linux") {
                let delta = format!("{step:+}%");
                run_tool("pactl", &["set-sink-volume", "@DEFAULT_SINK@", &delta]).await?;
                let out = run_tool("pactl", &["get-sink-volume", "@DEFAULT_SINK@"]).await?;
                Ok(first_percent(&out))
            } else if cfg!(target_os = "macos") {
                let out = run_tool("osascript", &["-e", "output volume of (get volume settings)"]).await?;
                let current: i32 = out
                    .trim()
                    .parse()
                    .map_err(|_| CapabilityError::Failed(format!("unexpected volume: {out}")))?;
                let level = (current + step).clamp(0, 100);
                run_tool("osascript", &["-e", &format!("set volume output volume {level}")]).await?;
                Ok(u8::try_from(level).ok())
            } else {
                Err(CapabilityError::Unsupported("volume"))
            }
        })
    }

    fn adjust_brightness(&self, step: i32) -> CapabilityFuture<'_, Option<u8>> {
        Box::pin(async move {
            if !cfg!(target_os = "linux") {
                return Err(CapabilityError::Unsupported("brightness"));
            }
            let delta = if step >= 0 {
                format!("{step}%+")
            } else {
                format!("{}%-", step.unsigned_abs())
            };
            run_tool("brightnessctl", &["set", &delta]).await?;
            let out = run_tool("brightnessctl", &["-m"]).await?;
            Ok(brightnessctl_percent(&out))
        })
    }

    fn media_key(&self, key: MediaKey) -> CapabilityFuture<'_, ()> {
        Box::pin(async move {
            if !cfg!(target_os = "linux") {
                return Err(CapabilityError::Unsupported("media keys"));
            }
            let verb = match key {
                MediaKey::PlayPause => "play-pause",
                MediaKey::Next => "next",
                MediaKey::Previous => "previous",
            };
            run_tool("playerctl", &[verb]).await?;
            Ok(())
        })
    }

    fn screen_size(&self) -> CapabilityFuture<'_, (u32, u32)> {
        Box::pin(async {
            if !cfg!(target_os = "linux") {
                return Err(CapabilityError::Unsupported("pointer"));
            }
            let out = run_tool("xdotool", &["getdisplaygeometry"]).await?;
            parse_geometry(&out)
                .ok_or_else(|| CapabilityError::Failed(format!("unexpected geometry: {out}")))
        })
    }

    fn cursor_position(&self) -> CapabilityFuture<'_, (i32, i32)> {
        Box::pin(async {
            if !cfg!(target_os = "linux") {
                return Err(CapabilityError::Unsupported("pointer"));
            }
            let out = run_tool("xdotool", &["getmouselocation", "--shell"]).await?;
            parse_mouse_location(&out)
                .ok_or_else(|| CapabilityError::Failed(format!("unexpected location: {out}")))
        })
    }

    fn move_cursor_by(&self, dx: i32, dy: i32) -> CapabilityFuture<'_, ()> {
        Box::pin(async move {
            if !cfg!(target_os = "linux") {
                return Err(CapabilityError::Unsupported("pointer"));
            }
            let (dx, dy) = (dx.to_string(), dy.to_string());
            run_tool("xdotool", &["mousemove_relative", "--", &dx, &dy]).await?;
            Ok(())
        })
    }
}

/// Splits a command line on whitespace into program and arguments.
fn split_command(command: &str) -> Result<(&str, Vec<&str>), CapabilityError> {
    let mut parts = command.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| CapabilityError::Rejected("Command cannot be empty".into()))?;
    if program.eq_ignore_ascii_case("sudo") {
        return Err(CapabilityError::Rejected(
            "Sudo commands are not supported".into(),
        ));
    }
    Ok((program, parts.collect()))
}

/// Runs a helper tool and returns its stdout.
async fn run_tool(program: &str, args: &[&str]) -> Result<String, CapabilityError> {
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| CapabilityError::Failed(format!("{program} unavailable: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(program, status = %output.status, "helper tool failed");
        return Err(CapabilityError::Failed(format!(
            "{program} failed: {}",
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Runs blocking clipboard work off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, CapabilityError>
where
    F: FnOnce() -> Result<T, CapabilityError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CapabilityError::Failed(e.to_string()))?
}

fn clipboard_error(e: arboard::Error) -> CapabilityError {
    CapabilityError::Failed(format!("clipboard unavailable: {e}"))
}

/// Maps a device key name to an xdotool keysym.
fn xdotool_key(key: &str) -> String {
    match key.to_ascii_lowercase().as_str() {
        "right" => "Right".into(),
        "left" => "Left".into(),
        "up" => "Up".into(),
        "down" => "Down".into(),
        "space" => "space".into(),
        "enter" | "return" => "Return".into(),
        "escape" | "esc" => "Escape".into(),
        "pageup" => "Prior".into(),
        "pagedown" => "Next".into(),
        "home" => "Home".into(),
        "end" => "End".into(),
        "tab" => "Tab".into(),
        "backspace" => "BackSpace".into(),
        other if other.len() > 1 && other.starts_with('f') && other[1..].parse::<u8>().is_ok() => {
            other.to_ascii_uppercase()
        }
        _ => key.to_string(),
    }
}

fn macos_key_script(key: &str) -> String {
    let code = match key.to_ascii_lowercase().as_str() {
        "right" => Some(124),
        "left" => Some(123),
        "down" => Some(125),
        "up" => Some(126),
        "space" => Some(49),
        "enter" | "return" => Some(36),
        "escape" | "esc" => Some(53),
        _ => None,
    };
    match code {
        Some(c) => format!("tell application \"System Events\" to key code {c}"),
        None => format!(
            "tell application \"System Events\" to keystroke \"{}\"",
            key.replace(['"', '\\'], "")
        ),
    }
}

fn send_keys_code(key: &str) -> String {
    match key.to_ascii_lowercase().as_str() {
        "right" => "{RIGHT}".into(),
        "left" => "{LEFT}".into(),
        "up" => "{UP}".into(),
        "down" => "{DOWN}".into(),
        "space" => " ".into(),
        "enter" | "return" => "{ENTER}".into(),
        "escape" | "esc" => "{ESC}".into(),
        other => other.replace(['\'', '{', '}'], ""),
    }
}

/// First `NN%` token in `pactl get-sink-volume` output.
fn first_percent(text: &str) -> Option<u8> {
    text.split_whitespace()
        .find_map(|tok| tok.strip_suffix('%')?.parse::<u8>().ok())
}

/// Percent column of `brightnessctl -m`: `device,class,current,NN%,max`.
fn brightnessctl_percent(text: &str) -> Option<u8> {
    text.lines()
        .next()?
        .split(',')
        .nth(3)?
        .trim()
        .strip_suffix('%')?
        .parse()
        .ok()
}

/// Parses `xdotool getdisplaygeometry` output: `1920 1080`.
fn parse_geometry(text: &str) -> Option<(u32, u32)> {
    let mut parts = text.split_whitespace();
    let w = parts.next()?.parse().ok()?;
    let h = parts.next()?.parse().ok()?;
    Some((w, h))
}

/// Parses `xdotool getmouselocation --shell` output.
fn parse_mouse_location(text: &str) -> Option<(i32, i32)> {
    let mut x = None;
    let mut y = None;
    for line in text.lines() {
        match line.trim().split_once('=') {
            Some(("X", v)) => x = v.parse().ok(),
            Some(("Y", v)) => y = v.parse().ok(),
            _ => {}
        }
    }
    Some((x?, y?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_command_on_whitespace() {
        let (program, args) = split_command("  ls   -la  /tmp ").unwrap();
        assert_eq!(program, "ls");
        assert_eq!(args, ["-la", "/tmp"]);
    }

    #[test]
    fn split_command_rejects_empty_and_sudo() {
        assert!(matches!(split_command("   "), Err(CapabilityError::Rejected(_))));
        assert!(matches!(
            split_command("Sudo reboot"),
            Err(CapabilityError::Rejected(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_command_captures_stdout() {
        let host = HostCapabilities::new();
        let out = host.run_command("echo hello world".into()).await.unwrap();
        assert!(out.success);
        assert_eq!(out.exit_code, Some(0));
        assert_eq!(out.stdout.trim(), "hello world");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_command_reports_exit_code() {
        let host = HostCapabilities::new();
        let out = host.run_command("false".into()).await.unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(1));
    }

    #[tokio::test]
    async fn run_command_missing_program() {
        let host = HostCapabilities::new();
        let result = host
            .run_command("definitely-not-a-real-binary-xyz".into())
            .await;
        assert!(matches!(result, Err(CapabilityError::Failed(_))));
    }

    #[test]
    fn key_name_mapping() {
        assert_eq!(xdotool_key("right"), "Right");
        assert_eq!(xdotool_key("PageDown"), "Next");
        assert_eq!(xdotool_key("f5"), "F5");
        assert_eq!(xdotool_key("a"), "a");
        assert_eq!(send_keys_code("left"), "{LEFT}");
        assert!(macos_key_script("right").ends_with("key code 124"));
        assert!(macos_key_script("b").contains("keystroke \"b\""));
    }

    #[test]
    fn parses_pactl_volume() {
        let out = "Volume: front-left: 39321 /  60% / -13.31 dB,   front-right: 39321 /  60% / -13.31 dB";
        assert_eq!(first_percent(out), Some(60));
        assert_eq!(first_percent("no numbers"), None);
    }

    #[test]
    fn parses_brightnessctl_machine_output() {
        assert_eq!(
            brightnessctl_percent("intel_backlight,backlight,400,40%,1000\n"),
            Some(40)
        );
        assert_eq!(brightnessctl_percent(""), None);
    }

    #[test]
    fn parses_xdotool_output() {
        assert_eq!(parse_geometry("1920 1080\n"), Some((1920, 1080)));
        assert_eq!(parse_geometry("garbage"), None);
        assert_eq!(
            parse_mouse_location("X=812\nY=-4\nSCREEN=0\nWINDOW=65011719\n"),
            Some((812, -4))
        );
        assert_eq!(parse_mouse_location("SCREEN=0"), None);
    }
}
