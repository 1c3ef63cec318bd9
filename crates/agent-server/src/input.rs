//! Touchpad to cursor translation.

/// Relative cursor movement derived from a normalized touch position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorMove {
    pub target_x: i32,
    pub target_y: i32,
    pub delta_x: i32,
    pub delta_y: i32,
}

/// Maps a normalized touchpad position onto the screen.
///
/// The target is `round(nx * width)`, `round(ny * height)`; the delta is the
/// offset from the current cursor position. Inputs outside `[0, 1]` are
/// clamped.
pub fn translate(
    normalized: (f64, f64),
    screen: (u32, u32),
    cursor: (i32, i32),
) -> CursorMove {
    let (nx, ny) = normalized;
    let target_x = (nx.clamp(0.0, 1.0) * f64::from(screen.0)).round() as i32;
    let target_y = (ny.clamp(0.0, 1.0) * f64::from(screen.1)).round() as i32;
    CursorMove {
        target_x,
        target_y,
        delta_x: target_x.saturating_sub(cursor.0),
        delta_y: target_y.saturating_sub(cursor.1),
    }
}
