/// Which mouse events the application asked to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseTracking {
    #[default]
    Off,
    /// Mode 1000: presses and releases.
    Normal,
    /// Mode 1002: plus motion while a button is held.
    ButtonMotion,
    /// Mode 1003: all motion.
    AnyMotion,
}

/// How mouse reports are encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseEncoding {
    /// `CSI M` with 32-offset bytes, coordinates capped at 223.
    #[default]
    Default,
    /// Mode 1005: coordinates as UTF-8.
    Utf8,
    /// Mode 1006: `CSI < b ; x ; y M/m`.
    Sgr,
    /// Mode 1015: `CSI b ; x ; y M`.
    Urxvt,
}

/// Mode flags tracked by the emulation (the screen owns origin, wrap,
/// insert, and cursor visibility itself).
#[derive(Debug, Clone)]
pub struct TerminalModes {
    /// DECCKM: cursor keys send application sequences.
    pub cursor_keys_application: bool,
    /// DECKPAM/DECNKM: application keypad.
    pub keypad_application: bool,
    /// DECSCNM: reverse video over the whole screen.
    pub reverse_video: bool,
    /// DECBKM: backarrow sends BS instead of DEL.
    pub backarrow_sends_bs: bool,
    pub mouse_tracking: MouseTracking,
    pub mouse_encoding: MouseEncoding,
    /// Mode 1004.
    pub focus_events: bool,
    /// Mode 2004.
    pub bracketed_paste: bool,
    /// Mode 1007: wheel becomes arrow keys on the alternate screen.
    pub alternate_scroll: bool,
    /// LNM: LF implies CR.
    pub linefeed_newline: bool,
    /// Input decoding: UTF-8 when set, Latin-1 / active charset otherwise.
    pub utf8: bool,
}

impl Default for TerminalModes {
    fn default() -> Self {
        Self {
            cursor_keys_application: false,
            keypad_application: false,
            reverse_video: false,
            backarrow_sends_bs: false,
            mouse_tracking: MouseTracking::Off,
            mouse_encoding: MouseEncoding::Default,
            focus_events: false,
            bracketed_paste: false,
            alternate_scroll: false,
            linefeed_newline: false,
            utf8: true,
        }
    }
}
