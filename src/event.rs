//! Structured notifications the core hands to its host.
//!
//! The core never talks to a GUI directly. State changes that a shell might
//! want to surface (titles, bell, mode flips) and degradations it might want
//! to report (history I/O trouble, table saturation) are queued as events and
//! drained by the host after each `receive_data` call.

/// Cursor shape requested via DECSCUSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorShape {
    Block,
    Underline,
    Bar,
}

/// Diagnostic events: the core keeps operating, the host decides whether to
/// tell the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A history backend read or write failed; the operation degraded
    /// (zero-filled read or truncated write) and the screen continues.
    HistoryIoError { detail: String },
    /// The extended-character table is full; clusters now render as their
    /// first code point.
    ExtendedCharTableFull,
    /// An OSC 8 span exceeded the per-span text cap and was discarded.
    HyperlinkSpanOverflow,
    /// An OSC 52 clipboard request was rejected (the default policy).
    ClipboardAccessRejected,
}

/// Notifications emitted by the emulation alongside screen updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// Window title changed (OSC 0/2).
    TitleChanged { title: String },
    /// Icon title changed (OSC 0/1).
    IconTitleChanged { title: String },
    /// Tab title changed (OSC 30).
    TabTitleChanged { title: String },
    /// Font change requested (OSC 50).
    FontChangeRequested { font: String },
    /// Working directory reported by the shell (OSC 7).
    CwdChanged { path: String },
    /// BEL received; the host decides audible vs visual.
    Bell,
    /// Cursor style change requested (DECSCUSR).
    CursorStyleChanged { shape: CursorShape, blinking: bool },
    /// The cursor-keys / keypad application modes changed; hosts that do
    /// their own key pre-processing may care.
    KeypadModeChanged { application: bool },
    /// Mouse tracking was enabled or disabled.
    MouseTrackingChanged { enabled: bool },
    /// A palette entry was redefined (OSC 4) or the whole palette reset
    /// (OSC 104, index `None`).
    PaletteChanged {
        index: Option<u8>,
        rgb: Option<(u8, u8, u8)>,
    },
    /// Cursor color set (OSC 12) or reset (OSC 112, `None`).
    CursorColorChanged { rgb: Option<(u8, u8, u8)> },
    /// The selection content changed.
    SelectionChanged,
    /// Primary/alternate screen switch.
    ScreenSwitched { alternate: bool },
    /// Shell integration mark (OSC 133) recorded at an absolute line.
    ShellIntegrationMark { kind: ShellMark, line: usize },
    /// A degradation the host may surface.
    Diagnostic(Diagnostic),
}

/// Shell integration mark kinds (OSC 133).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellMark {
    PromptStart,
    InputStart,
    OutputStart,
}
