use super::modes::{MouseEncoding, MouseTracking};

/// Mouse buttons as the wire protocol counts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
    /// Motion with no button held (mode 1003 only).
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    Press,
    Release,
    Motion,
}

impl MouseButton {
    fn code(self) -> u8 {
        match self {
            MouseButton::Left => 0,
            MouseButton::Middle => 1,
            MouseButton::Right => 2,
            MouseButton::None => 3,
            MouseButton::WheelUp => 64,
            MouseButton::WheelDown => 65,
        }
    }
}

/// Encode a mouse report, or `None` when the active tracking mode does not
/// cover this event. `column` and `line` are 0-based grid coordinates.
pub fn encode_mouse_event(
    button: MouseButton,
    column: usize,
    line: usize,
    kind: MouseEventKind,
    tracking: MouseTracking,
    encoding: MouseEncoding,
) -> Option<Vec<u8>> {
    match tracking {
        MouseTracking::Off => return None,
        MouseTracking::Normal => {
            if kind == MouseEventKind::Motion {
                return None;
            }
        }
        MouseTracking::ButtonMotion => {
            if kind == MouseEventKind::Motion && button == MouseButton::None {
                return None;
            }
        }
        MouseTracking::AnyMotion => {}
    }

    let mut cb = button.code();
    if kind == MouseEventKind::Motion {
        cb += 32;
    }

    // 1-based coordinates on the wire.
    let x = column + 1;
    let y = line + 1;

    let report = match encoding {
        MouseEncoding::Sgr => {
            let terminator = if kind == MouseEventKind::Release { 'm' } else { 'M' };
            format!("\x1b[<{cb};{x};{y}{terminator}").into_bytes()
        }
        MouseEncoding::Urxvt => {
            let cb = if kind == MouseEventKind::Release { 3 + 32 } else { cb + 32 };
            format!("\x1b[{cb};{x};{y}M").into_bytes()
        }
        MouseEncoding::Utf8 => {
            // Like the default form but with coordinates UTF-8 encoded, so
            // positions past 223 survive.
            let cb = if kind == MouseEventKind::Release { 3 } else { cb };
            let mut out = b"\x1b[M".to_vec();
            out.push(cb + 32);
            let mut push_coord = |v: usize| {
                let v = (v + 32).min(2015) as u32;
                let c = char::from_u32(v).unwrap_or(' ');
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            };
            push_coord(x);
            push_coord(y);
            out
        }
        MouseEncoding::Default => {
            let cb = if kind == MouseEventKind::Release { 3 } else { cb };
            let clamp = |v: usize| (v + 32).min(255) as u8;
            // The classic encoding cannot express positions past 223.
            if x > 223 || y > 223 {
                return None;
            }
            vec![0x1b, b'[', b'M', cb + 32, clamp(x), clamp(y)]
        }
    };
    Some(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_off_reports_nothing() {
        assert!(encode_mouse_event(
            MouseButton::Left,
            0,
            0,
            MouseEventKind::Press,
            MouseTracking::Off,
            MouseEncoding::Sgr,
        )
        .is_none());
    }

    #[test]
    fn sgr_press_and_release_use_distinct_terminators() {
        let press = encode_mouse_event(
            MouseButton::Left,
            4,
            9,
            MouseEventKind::Press,
            MouseTracking::Normal,
            MouseEncoding::Sgr,
        )
        .unwrap();
        assert_eq!(press, b"\x1b[<0;5;10M");
        let release = encode_mouse_event(
            MouseButton::Left,
            4,
            9,
            MouseEventKind::Release,
            MouseTracking::Normal,
            MouseEncoding::Sgr,
        )
        .unwrap();
        assert_eq!(release, b"\x1b[<0;5;10m");
    }

    #[test]
    fn default_encoding_offsets_by_32_and_caps_range() {
        let press = encode_mouse_event(
            MouseButton::Middle,
            0,
            0,
            MouseEventKind::Press,
            MouseTracking::Normal,
            MouseEncoding::Default,
        )
        .unwrap();
        assert_eq!(press, vec![0x1b, b'[', b'M', 33, 33, 33]);
        assert!(
            encode_mouse_event(
                MouseButton::Left,
                300,
                0,
                MouseEventKind::Press,
                MouseTracking::Normal,
                MouseEncoding::Default,
            )
            .is_none(),
            "default encoding cannot express past 223"
        );
    }

    #[test]
    fn motion_requires_matching_tracking_mode() {
        let motion = |tracking| {
            encode_mouse_event(
                MouseButton::Left,
                1,
                1,
                MouseEventKind::Motion,
                tracking,
                MouseEncoding::Sgr,
            )
        };
        assert!(motion(MouseTracking::Normal).is_none());
        assert!(motion(MouseTracking::ButtonMotion).is_some());
        let hover = encode_mouse_event(
            MouseButton::None,
            1,
            1,
            MouseEventKind::Motion,
            MouseTracking::ButtonMotion,
            MouseEncoding::Sgr,
        );
        assert!(hover.is_none(), "hover motion needs mode 1003");
        assert!(encode_mouse_event(
            MouseButton::None,
            1,
            1,
            MouseEventKind::Motion,
            MouseTracking::AnyMotion,
            MouseEncoding::Sgr,
        )
        .is_some());
    }

    #[test]
    fn wheel_buttons_use_the_64_range() {
        let up = encode_mouse_event(
            MouseButton::WheelUp,
            0,
            0,
            MouseEventKind::Press,
            MouseTracking::Normal,
            MouseEncoding::Sgr,
        )
        .unwrap();
        assert_eq!(up, b"\x1b[<64;1;1M");
    }
}
