//! VT-102 + xterm emulation: the byte-stream state machine that drives the
//! screen model.
//!
//! The VT500-series parser itself comes from the `vte` crate; this module
//! implements `vte::Perform` on top of it, owning the primary/alternate
//! screens, mode flags, character sets, titles, and the outbound byte
//! queue. The parser never aborts on malformed input: unknown sequences
//! are logged at trace level and swallowed.

pub mod charset;
pub mod keyboard;
pub mod modes;
pub mod mouse;

use std::sync::Arc;

use crate::character::{ColorEntry, ColorTable, ExtendedCharTable, Intensity, LineProperty, Rendition};
use crate::config::{ConfigError, CoreConfig};
use crate::event::{CursorShape, Diagnostic, ShellMark, TerminalEvent};
use crate::history::{HistoryMode, HistoryScroll};
use crate::screen::Screen;

pub use charset::{Charset, CharsetState};
pub use keyboard::{encode_key, DefaultKeyTable, KeyBindingTable, KeyCode, KeyContext, Modifiers};
pub use modes::{MouseEncoding, MouseTracking, TerminalModes};
pub use mouse::{encode_mouse_event, MouseButton, MouseEventKind};

/// Callback receiving bytes the emulation wants written back to the PTY.
pub type SendDataCallback = Box<dyn FnMut(&[u8])>;

/// The terminal emulation. Feed it PTY bytes with [`receive_data`]
/// (arbitrary chunk boundaries are fine; partial sequences are held across
/// calls) and query the current screen for the image.
///
/// [`receive_data`]: Emulation::receive_data
pub struct Emulation {
    parser: vte::Parser,
    term: Term,
}

struct Term {
    primary: Screen,
    alternate: Screen,
    using_alternate: bool,

    modes: TerminalModes,
    charsets: CharsetState,
    saved_charsets: CharsetState,

    window_title: String,
    icon_title: String,
    title_stack: Vec<(String, String)>,

    color_table: ColorTable,
    pixel_size: (usize, usize),
    last_printed: Option<char>,

    key_table: Box<dyn KeyBindingTable>,
    send_data: Option<SendDataCallback>,
    /// Outbound bytes buffered while no callback is registered.
    pending_out: Vec<u8>,
    events: Vec<TerminalEvent>,

    config: CoreConfig,
}

impl Emulation {
    /// Build an emulation with its own extended-character registry.
    pub fn new(lines: usize, columns: usize, config: CoreConfig) -> Result<Self, ConfigError> {
        let table = ExtendedCharTable::new(config.extended_char_limit);
        Self::with_extended_chars(lines, columns, config, table)
    }

    /// Build an emulation sharing a host-owned extended-character registry.
    pub fn with_extended_chars(
        lines: usize,
        columns: usize,
        config: CoreConfig,
        extended_chars: Arc<ExtendedCharTable>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let history = HistoryScroll::new(&config.history_mode, config.scrollback_dir.as_deref())?;
        let primary = Screen::new(
            lines,
            columns,
            history,
            extended_chars.clone(),
            config.osc8_allowed_schemes.clone(),
            config.reflow_on_resize,
        );
        // The alternate screen never evicts to history and never reflows.
        let alternate = Screen::new(
            lines,
            columns,
            HistoryScroll::None,
            extended_chars,
            config.osc8_allowed_schemes.clone(),
            false,
        );

        let modes = TerminalModes {
            utf8: config.utf8,
            mouse_tracking: if config.mouse_tracking_initial {
                MouseTracking::Normal
            } else {
                MouseTracking::Off
            },
            ..TerminalModes::default()
        };

        Ok(Self {
            parser: vte::Parser::new(),
            term: Term {
                primary,
                alternate,
                using_alternate: false,
                modes,
                charsets: CharsetState::default(),
                saved_charsets: CharsetState::default(),
                window_title: String::new(),
                icon_title: String::new(),
                title_stack: Vec::new(),
                color_table: ColorTable::default(),
                pixel_size: (0, 0),
                last_printed: None,
                key_table: Box::new(DefaultKeyTable),
                send_data: None,
                pending_out: Vec::new(),
                events: Vec::new(),
                config,
            },
        })
    }

    /// Register the outbound byte sink. Invoked synchronously whenever the
    /// emulation produces a reply (DSR, DA, mouse reports, key events).
    pub fn set_send_data_callback(&mut self, callback: impl FnMut(&[u8]) + 'static) {
        self.term.send_data = Some(Box::new(callback));
    }

    pub fn set_key_binding_table(&mut self, table: Box<dyn KeyBindingTable>) {
        self.term.key_table = table;
    }

    /// Process a chunk of PTY output. Chunks may split escape sequences
    /// anywhere; the parser carries its state across calls.
    pub fn receive_data(&mut self, bytes: &[u8]) {
        let Self { parser, term } = self;
        for &byte in bytes {
            if term.modes.utf8 || byte.is_ascii() {
                parser.advance(term, byte);
            } else {
                // Latin-1: each high byte maps to the same code point.
                let mut buf = [0u8; 4];
                for &b in (byte as char).encode_utf8(&mut buf).as_bytes() {
                    parser.advance(term, b);
                }
            }
        }
        self.term.collect_screen_diagnostics();
    }

    /// Resize both screens. The primary reflows (when configured), the
    /// alternate truncates or pads.
    pub fn set_image_size(&mut self, lines: usize, columns: usize) {
        self.term.primary.set_size(lines, columns);
        self.term.alternate.set_size(lines, columns);
    }

    /// Pixel dimensions reported by window ops; never interpreted.
    pub fn set_pixel_size(&mut self, width: usize, height: usize) {
        self.term.pixel_size = (width, height);
    }

    /// Translate a key event into bytes, consult the host key table first,
    /// and emit the result outbound. Returns the bytes for convenience.
    pub fn send_key_event(&mut self, key: KeyCode, modifiers: Modifiers) -> Vec<u8> {
        let context = KeyContext {
            application_cursor_keys: self.term.modes.cursor_keys_application,
            application_keypad: self.term.modes.keypad_application,
            newline_mode: self.term.modes.linefeed_newline,
            backarrow_sends_bs: self.term.modes.backarrow_sends_bs,
        };
        let bytes = self
            .term
            .key_table
            .lookup(key, modifiers, &context)
            .unwrap_or_else(|| encode_key(key, modifiers, &context));
        self.term.send(&bytes);
        bytes
    }

    /// Report a mouse event if the application enabled tracking for it.
    pub fn send_mouse_event(
        &mut self,
        button: MouseButton,
        column: usize,
        line: usize,
        kind: MouseEventKind,
    ) {
        // Alternate scroll (mode 1007): with tracking off, wheel events on
        // the alternate screen turn into arrow keys so pagers scroll.
        if self.term.modes.mouse_tracking == MouseTracking::Off
            && self.term.modes.alternate_scroll
            && self.term.using_alternate
            && kind == MouseEventKind::Press
        {
            match button {
                MouseButton::WheelUp => {
                    self.send_key_event(KeyCode::Up, Modifiers::empty());
                    return;
                }
                MouseButton::WheelDown => {
                    self.send_key_event(KeyCode::Down, Modifiers::empty());
                    return;
                }
                _ => {}
            }
        }

        if let Some(report) = encode_mouse_event(
            button,
            column,
            line,
            kind,
            self.term.modes.mouse_tracking,
            self.term.modes.mouse_encoding,
        ) {
            self.term.send(&report);
        }
    }

    /// Focus-in/out reports (mode 1004).
    pub fn send_focus_event(&mut self, focused: bool) {
        if self.term.modes.focus_events {
            let report: &[u8] = if focused { b"\x1b[I" } else { b"\x1b[O" };
            self.term.send(report);
        }
    }

    /// Wrap pasted data in bracketed-paste markers when the mode is on.
    pub fn wrap_paste(&self, data: &[u8]) -> Vec<u8> {
        if self.term.modes.bracketed_paste {
            let mut out = b"\x1b[200~".to_vec();
            out.extend_from_slice(data);
            out.extend_from_slice(b"\x1b[201~");
            out
        } else {
            data.to_vec()
        }
    }

    /// Notifications queued since the last call.
    pub fn take_events(&mut self) -> Vec<TerminalEvent> {
        std::mem::take(&mut self.term.events)
    }

    /// Outbound bytes buffered while no send callback was registered.
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.term.pending_out)
    }

    /// The screen currently receiving output.
    pub fn screen_mut(&mut self) -> &mut Screen {
        self.term.screen()
    }

    pub fn using_alternate_screen(&self) -> bool {
        self.term.using_alternate
    }

    pub fn modes(&self) -> &TerminalModes {
        &self.term.modes
    }

    pub fn window_title(&self) -> &str {
        &self.term.window_title
    }

    pub fn icon_title(&self) -> &str {
        &self.term.icon_title
    }

    pub fn color_table(&self) -> &ColorTable {
        &self.term.color_table
    }

    pub fn set_color_table(&mut self, table: ColorTable) {
        self.term.color_table = table;
    }

    /// Total addressable lines of the current screen (history + visible).
    pub fn line_count(&mut self) -> usize {
        self.term.screen().total_lines()
    }

    /// Switch the primary screen's history backend, migrating content.
    pub fn set_history_mode(&mut self, mode: &HistoryMode) -> std::io::Result<()> {
        let dir = self.term.config.scrollback_dir.clone();
        self.term.primary.set_history(mode, dir.as_deref())
    }
}

impl Term {
    fn screen(&mut self) -> &mut Screen {
        if self.using_alternate {
            &mut self.alternate
        } else {
            &mut self.primary
        }
    }

    fn send(&mut self, bytes: &[u8]) {
        match &mut self.send_data {
            Some(callback) => callback(bytes),
            None => self.pending_out.extend_from_slice(bytes),
        }
    }

    fn event(&mut self, event: TerminalEvent) {
        self.events.push(event);
    }

    fn collect_screen_diagnostics(&mut self) {
        let diagnostics = self.screen().take_diagnostics();
        self.events
            .extend(diagnostics.into_iter().map(TerminalEvent::Diagnostic));
    }

    fn line_feed(&mut self) {
        let newline = self.modes.linefeed_newline;
        let screen = self.screen();
        screen.index();
        if newline {
            screen.carriage_return();
        }
    }

    fn switch_screen(&mut self, alternate: bool, clear_on_enter: bool) {
        if self.using_alternate == alternate {
            return;
        }
        self.using_alternate = alternate;
        if alternate && clear_on_enter {
            let screen = self.screen();
            screen.reset();
        }
        self.event(TerminalEvent::ScreenSwitched { alternate });
    }

    fn reset_all(&mut self) {
        let was_alternate = self.using_alternate;
        self.primary.reset();
        self.alternate.reset();
        self.using_alternate = false;
        let utf8 = self.modes.utf8;
        self.modes = TerminalModes {
            utf8,
            ..TerminalModes::default()
        };
        self.charsets.reset();
        self.saved_charsets.reset();
        self.last_printed = None;
        if was_alternate {
            self.event(TerminalEvent::ScreenSwitched { alternate: false });
        }
    }

    // ------------------------------------------------------------------
    // Modes
    // ------------------------------------------------------------------

    fn set_ansi_mode(&mut self, mode: u16, enable: bool) {
        match mode {
            4 => self.screen().set_insert_mode(enable),
            20 => self.modes.linefeed_newline = enable,
            _ => tracing::trace!("ignored ANSI mode {mode}"),
        }
    }

    fn set_dec_mode(&mut self, mode: u16, enable: bool) {
        match mode {
            1 => self.modes.cursor_keys_application = enable,
            3 => {
                // DECCOLM: 80/132 columns, clearing the screen and homing.
                let lines = self.screen().lines();
                let columns = if enable { 132 } else { 80 };
                self.primary.set_size(lines, columns);
                self.alternate.set_size(lines, columns);
                let screen = self.screen();
                screen.clear_entire_screen(false);
                screen.set_cursor_yx(0, 0);
            }
            5 => self.modes.reverse_video = enable,
            6 => self.screen().set_origin_mode(enable),
            7 => self.screen().set_auto_wrap(enable),
            25 => self.screen().set_cursor_visible(enable),
            47 => self.switch_screen(enable, false),
            66 => {
                self.modes.keypad_application = enable;
                self.event(TerminalEvent::KeypadModeChanged { application: enable });
            }
            67 => self.modes.backarrow_sends_bs = enable,
            1000 => self.set_mouse_tracking(MouseTracking::Normal, enable),
            1002 => self.set_mouse_tracking(MouseTracking::ButtonMotion, enable),
            1003 => self.set_mouse_tracking(MouseTracking::AnyMotion, enable),
            1004 => self.modes.focus_events = enable,
            1005 => self.set_mouse_encoding(MouseEncoding::Utf8, enable),
            1006 => self.set_mouse_encoding(MouseEncoding::Sgr, enable),
            1007 => self.modes.alternate_scroll = enable,
            1015 => self.set_mouse_encoding(MouseEncoding::Urxvt, enable),
            1047 => {
                if enable {
                    self.switch_screen(true, true);
                } else {
                    self.switch_screen(false, false);
                }
            }
            1048 => {
                if enable {
                    self.screen().save_cursor();
                    self.saved_charsets = self.charsets;
                } else {
                    self.screen().restore_cursor();
                    self.charsets = self.saved_charsets;
                }
            }
            1049 => {
                if enable {
                    self.primary.save_cursor();
                    self.switch_screen(true, true);
                } else {
                    self.switch_screen(false, false);
                    self.primary.restore_cursor();
                }
            }
            2004 => self.modes.bracketed_paste = enable,
            _ => tracing::trace!("ignored DEC private mode {mode}"),
        }
    }

    fn set_mouse_tracking(&mut self, tracking: MouseTracking, enable: bool) {
        self.modes.mouse_tracking = if enable { tracking } else { MouseTracking::Off };
        self.event(TerminalEvent::MouseTrackingChanged { enabled: enable });
    }

    fn set_mouse_encoding(&mut self, encoding: MouseEncoding, enable: bool) {
        self.modes.mouse_encoding = if enable {
            encoding
        } else {
            MouseEncoding::Default
        };
    }

    fn dec_mode_state(&mut self, mode: u16) -> Option<bool> {
        match mode {
            1 => Some(self.modes.cursor_keys_application),
            5 => Some(self.modes.reverse_video),
            6 => Some(self.screen().origin_mode()),
            7 => None, // autowrap state is not exposed; report unknown
            25 => Some(self.screen().cursor_visible()),
            47 | 1047 | 1049 => Some(self.using_alternate),
            66 => Some(self.modes.keypad_application),
            67 => Some(self.modes.backarrow_sends_bs),
            1000 => Some(self.modes.mouse_tracking == MouseTracking::Normal),
            1002 => Some(self.modes.mouse_tracking == MouseTracking::ButtonMotion),
            1003 => Some(self.modes.mouse_tracking == MouseTracking::AnyMotion),
            1004 => Some(self.modes.focus_events),
            1005 => Some(self.modes.mouse_encoding == MouseEncoding::Utf8),
            1006 => Some(self.modes.mouse_encoding == MouseEncoding::Sgr),
            1007 => Some(self.modes.alternate_scroll),
            1015 => Some(self.modes.mouse_encoding == MouseEncoding::Urxvt),
            2004 => Some(self.modes.bracketed_paste),
            _ => None,
        }
    }

    fn report_mode_state(&mut self, mode: u16, state: Option<bool>, dec_private: bool) {
        let pm = match state {
            Some(true) => 1,
            Some(false) => 2,
            None => 0,
        };
        let prefix = if dec_private { "?" } else { "" };
        let response = format!("\x1b[{prefix}{mode};{pm}$y");
        self.send(response.as_bytes());
    }

    // ------------------------------------------------------------------
    // SGR
    // ------------------------------------------------------------------

    /// Apply SGR. `groups` preserves vte's subparameter grouping: the
    /// colon form `38:2:<id>:r:g:b` arrives as one group, the legacy
    /// semicolon form `38;2;r;g;b` as five.
    fn apply_sgr(&mut self, groups: &[Vec<u16>]) {
        if groups.is_empty() {
            self.screen().set_default_rendition();
            return;
        }
        let mut i = 0;
        while i < groups.len() {
            let group = &groups[i];
            match group.first().copied().unwrap_or(0) {
                0 => self.screen().set_default_rendition(),
                1 => self.screen().set_rendition(Rendition::BOLD),
                2 => self.screen().set_rendition(Rendition::FAINT),
                3 => self.screen().set_rendition(Rendition::ITALIC),
                4 => self.screen().set_rendition(Rendition::UNDERLINE),
                5 => self.screen().set_rendition(Rendition::BLINK),
                7 => self.screen().set_rendition(Rendition::REVERSE),
                8 => self.screen().set_rendition(Rendition::CONCEAL),
                9 => self.screen().set_rendition(Rendition::STRIKEOUT),
                22 => {
                    let screen = self.screen();
                    screen.reset_rendition(Rendition::BOLD);
                    screen.reset_rendition(Rendition::FAINT);
                }
                23 => self.screen().reset_rendition(Rendition::ITALIC),
                24 => self.screen().reset_rendition(Rendition::UNDERLINE),
                25 => self.screen().reset_rendition(Rendition::BLINK),
                27 => self.screen().reset_rendition(Rendition::REVERSE),
                28 => self.screen().reset_rendition(Rendition::CONCEAL),
                29 => self.screen().reset_rendition(Rendition::STRIKEOUT),
                53 => self.screen().set_rendition(Rendition::OVERLINE),
                55 => self.screen().reset_rendition(Rendition::OVERLINE),
                code @ 30..=37 => {
                    let color = ColorEntry::Palette(code as u8 - 30, Intensity::Normal);
                    self.screen().set_foreground(color);
                }
                39 => self.screen().set_foreground(ColorEntry::DefaultForeground),
                code @ 40..=47 => {
                    let color = ColorEntry::Palette(code as u8 - 40, Intensity::Normal);
                    self.screen().set_background(color);
                }
                49 => self.screen().set_background(ColorEntry::DefaultBackground),
                code @ 90..=97 => {
                    let color = ColorEntry::Palette(code as u8 - 90, Intensity::Intense);
                    self.screen().set_foreground(color);
                }
                code @ 100..=107 => {
                    let color = ColorEntry::Palette(code as u8 - 100, Intensity::Intense);
                    self.screen().set_background(color);
                }
                code @ (38 | 48) => {
                    let background = code == 48;
                    let color = if group.len() > 1 {
                        // Colon form: the whole spec lives in this group.
                        parse_extended_color(&group[1..], true).0
                    } else {
                        // Semicolon form: the spec spans the next groups.
                        let rest: Vec<u16> = groups[i + 1..]
                            .iter()
                            .map(|g| g.first().copied().unwrap_or(0))
                            .collect();
                        let (color, consumed) = parse_extended_color(&rest, false);
                        i += consumed;
                        color
                    };
                    if let Some(color) = color {
                        if background {
                            self.screen().set_background(color);
                        } else {
                            self.screen().set_foreground(color);
                        }
                    }
                }
                other => tracing::trace!("ignored SGR {other}"),
            }
            i += 1;
        }
    }

    // ------------------------------------------------------------------
    // OSC
    // ------------------------------------------------------------------

    fn handle_osc(&mut self, params: &[&[u8]]) {
        let Some(number) = params.first().and_then(|p| std::str::from_utf8(*p).ok()) else {
            return;
        };
        let arg = |i: usize| -> String {
            params
                .get(i)
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .unwrap_or_default()
        };

        match number {
            "0" => {
                let title = arg(1);
                self.window_title = title.clone();
                self.icon_title = title.clone();
                self.event(TerminalEvent::TitleChanged { title: title.clone() });
                self.event(TerminalEvent::IconTitleChanged { title });
            }
            "1" => {
                let title = arg(1);
                self.icon_title = title.clone();
                self.event(TerminalEvent::IconTitleChanged { title });
            }
            "2" => {
                let title = arg(1);
                self.window_title = title.clone();
                self.event(TerminalEvent::TitleChanged { title });
            }
            "4" => self.handle_osc_palette(params),
            "7" => {
                let uri = arg(1);
                let path = uri
                    .strip_prefix("file://")
                    .map(|rest| match rest.find('/') {
                        Some(slash) => rest[slash..].to_string(),
                        None => rest.to_string(),
                    })
                    .unwrap_or(uri);
                self.event(TerminalEvent::CwdChanged { path });
            }
            "8" => {
                // OSC 8 ; params ; uri. An empty uri closes the span.
                let uri = arg(2);
                if uri.is_empty() {
                    self.screen().hyperlinks.end();
                } else {
                    self.screen().hyperlinks.begin(&uri);
                }
            }
            "10" | "11" => self.handle_osc_default_color(number == "11", &arg(1)),
            "12" => {
                if let Some(rgb) = parse_color_spec(&arg(1)) {
                    self.event(TerminalEvent::CursorColorChanged { rgb: Some(rgb) });
                }
            }
            "30" => {
                let title = arg(1);
                self.event(TerminalEvent::TabTitleChanged { title });
            }
            "50" => {
                let font = arg(1);
                self.event(TerminalEvent::FontChangeRequested { font });
            }
            "52" => {
                // Clipboard access is rejected by default; the host learns
                // about the attempt and nothing else happens.
                tracing::trace!("OSC 52 clipboard request rejected");
                self.event(TerminalEvent::Diagnostic(Diagnostic::ClipboardAccessRejected));
            }
            "104" => {
                let index = params
                    .get(1)
                    .and_then(|p| std::str::from_utf8(p).ok())
                    .and_then(|s| s.parse::<u8>().ok());
                match index {
                    Some(i) => {
                        self.color_table.palette[i as usize & 0x0f] =
                            ColorTable::default().palette[i as usize & 0x0f];
                        self.event(TerminalEvent::PaletteChanged {
                            index: Some(i),
                            rgb: None,
                        });
                    }
                    None => {
                        self.color_table = ColorTable::default();
                        self.event(TerminalEvent::PaletteChanged {
                            index: None,
                            rgb: None,
                        });
                    }
                }
            }
            "112" => self.event(TerminalEvent::CursorColorChanged { rgb: None }),
            "133" => self.handle_osc_shell_mark(&arg(1)),
            other => tracing::trace!("ignored OSC {other}"),
        }
    }

    fn handle_osc_palette(&mut self, params: &[&[u8]]) {
        // OSC 4 ; index ; spec. A "?" spec queries, anything else sets.
        let Some(index) = params
            .get(1)
            .and_then(|p| std::str::from_utf8(p).ok())
            .and_then(|s| s.parse::<u8>().ok())
        else {
            return;
        };
        let spec = params
            .get(2)
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .unwrap_or_default();
        if spec == "?" {
            let (r, g, b) = crate::character::indexed_to_rgb(index, &self.color_table);
            let response = format!(
                "\x1b]4;{index};rgb:{:04x}/{:04x}/{:04x}\x1b\\",
                r as u16 * 0x0101,
                g as u16 * 0x0101,
                b as u16 * 0x0101
            );
            self.send(response.as_bytes());
        } else if let Some(rgb) = parse_color_spec(&spec) {
            if (index as usize) < 16 {
                self.color_table.palette[index as usize] = rgb;
            }
            self.event(TerminalEvent::PaletteChanged {
                index: Some(index),
                rgb: Some(rgb),
            });
        }
    }

    fn handle_osc_default_color(&mut self, background: bool, spec: &str) {
        if spec == "?" {
            let (r, g, b) = if background {
                self.color_table.background
            } else {
                self.color_table.foreground
            };
            let number = if background { 11 } else { 10 };
            let response = format!(
                "\x1b]{number};rgb:{:04x}/{:04x}/{:04x}\x1b\\",
                r as u16 * 0x0101,
                g as u16 * 0x0101,
                b as u16 * 0x0101
            );
            self.send(response.as_bytes());
        } else if let Some(rgb) = parse_color_spec(spec) {
            if background {
                self.color_table.background = rgb;
            } else {
                self.color_table.foreground = rgb;
            }
            self.event(TerminalEvent::PaletteChanged {
                index: None,
                rgb: Some(rgb),
            });
        }
    }

    fn handle_osc_shell_mark(&mut self, marker: &str) {
        let (mark, property) = match marker.chars().next() {
            Some('A') => (ShellMark::PromptStart, LineProperty::PROMPT_START),
            Some('B') => (ShellMark::InputStart, LineProperty::INPUT_START),
            Some('C') => (ShellMark::OutputStart, LineProperty::OUTPUT_START),
            _ => return,
        };
        let screen = self.screen();
        screen.set_line_property(property, true);
        let line = screen.history_lines() + screen.cursor_position().0;
        self.event(TerminalEvent::ShellIntegrationMark { kind: mark, line });
    }

    // ------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------

    fn report_device_status(&mut self, params: &[u16], dec_private: bool) {
        match params.first().copied().unwrap_or(0) {
            5 => self.send(b"\x1b[0n"),
            6 => {
                let screen = self.screen();
                let (mut row, col) = screen.cursor_position();
                if screen.origin_mode() {
                    row -= screen.top_margin();
                }
                let response = if dec_private {
                    format!("\x1b[?{};{}R", row + 1, col + 1)
                } else {
                    format!("\x1b[{};{}R", row + 1, col + 1)
                };
                self.send(response.as_bytes());
            }
            other => tracing::trace!("ignored DSR {other}"),
        }
    }

    fn report_window_op(&mut self, params: &[u16]) {
        match params.first().copied().unwrap_or(0) {
            14 => {
                let (w, h) = self.pixel_size;
                let response = format!("\x1b[4;{h};{w}t");
                self.send(response.as_bytes());
            }
            18 => {
                let screen = self.screen();
                let response = format!("\x1b[8;{};{}t", screen.lines(), screen.columns());
                self.send(response.as_bytes());
            }
            22 => {
                // Push titles; xterm keeps a small stack.
                self.title_stack
                    .push((self.icon_title.clone(), self.window_title.clone()));
                if self.title_stack.len() > 10 {
                    self.title_stack.remove(0);
                }
            }
            23 => {
                if let Some((icon, window)) = self.title_stack.pop() {
                    self.icon_title = icon.clone();
                    self.window_title = window.clone();
                    self.event(TerminalEvent::TitleChanged { title: window });
                    self.event(TerminalEvent::IconTitleChanged { title: icon });
                }
            }
            other => tracing::trace!("ignored window op {other}"),
        }
    }

    fn report_cursor_style(&mut self, param: u16) {
        let (shape, blinking) = match param {
            0 | 1 => (CursorShape::Block, true),
            2 => (CursorShape::Block, false),
            3 => (CursorShape::Underline, true),
            4 => (CursorShape::Underline, false),
            5 => (CursorShape::Bar, true),
            6 => (CursorShape::Bar, false),
            _ => return,
        };
        self.event(TerminalEvent::CursorStyleChanged { shape, blinking });
    }

    /// DECSWL/DECDWL/DECDHL: replace the current line's size marks.
    fn set_line_rendition(&mut self, marks: LineProperty) {
        let size = LineProperty::DOUBLE_WIDTH
            | LineProperty::DOUBLE_HEIGHT_TOP
            | LineProperty::DOUBLE_HEIGHT_BOT;
        let screen = self.screen();
        screen.set_line_property(size, false);
        screen.set_line_property(marks, true);
    }

    /// DECSTR: soft reset.
    fn soft_reset(&mut self) {
        self.modes.cursor_keys_application = false;
        self.modes.keypad_application = false;
        let screen = self.screen();
        screen.set_insert_mode(false);
        screen.set_origin_mode(false);
        screen.set_auto_wrap(true);
        screen.set_cursor_visible(true);
        screen.set_default_margins();
        screen.set_default_rendition();
        screen.save_cursor();
    }
}

fn extract_params(params: &vte::Params) -> Vec<u16> {
    params
        .iter()
        .flat_map(|subparams| subparams.iter().copied())
        .collect()
}

fn param(params: &[u16], index: usize, default: u16) -> u16 {
    params
        .get(index)
        .copied()
        .filter(|&v| v != 0)
        .unwrap_or(default)
}

/// Parse the tail of an SGR 38/48 spec: `5;index` or a truecolor triple.
/// The colon form may carry a colorspace id before the channels
/// (`2:<id>:r:g:b`); the legacy semicolon form never does. Returns the
/// color and the number of parameters consumed.
fn parse_extended_color(rest: &[u16], colon: bool) -> (Option<ColorEntry>, usize) {
    match rest.first() {
        Some(5) if rest.len() >= 2 => (Some(ColorEntry::Indexed(rest[1] as u8)), 2),
        Some(2) if colon && rest.len() >= 5 => (
            Some(ColorEntry::Rgb(rest[2] as u8, rest[3] as u8, rest[4] as u8)),
            5,
        ),
        Some(2) if rest.len() >= 4 => (
            Some(ColorEntry::Rgb(rest[1] as u8, rest[2] as u8, rest[3] as u8)),
            4,
        ),
        _ => (None, rest.len().min(1)),
    }
}

/// Parse `#RRGGBB` or `rgb:RR/GG/BB` (with 1-4 hex digits per channel).
fn parse_color_spec(spec: &str) -> Option<(u8, u8, u8)> {
    if let Some(hex) = spec.strip_prefix('#') {
        if hex.len() == 6 {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            return Some((r, g, b));
        }
        return None;
    }
    let channels = spec.strip_prefix("rgb:")?;
    let mut parts = channels.split('/');
    let mut channel = || -> Option<u8> {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 4 {
            return None;
        }
        let value = u16::from_str_radix(part, 16).ok()?;
        // Scale to 8 bits regardless of the digit count.
        let max = (16u32.pow(part.len() as u32) - 1) as u32;
        Some(((value as u32 * 255) / max) as u8)
    };
    let r = channel()?;
    let g = channel()?;
    let b = channel()?;
    Some((r, g, b))
}

impl vte::Perform for Term {
    fn print(&mut self, c: char) {
        let c = if c.is_ascii() { self.charsets.apply(c) } else { c };
        self.last_printed = Some(c);
        self.screen().show_character(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x07 => self.event(TerminalEvent::Bell),
            0x08 => self.screen().cursor_left(1),
            0x09 => self.screen().tab(1),
            0x0a | 0x0b | 0x0c => self.line_feed(),
            0x0d => self.screen().carriage_return(),
            0x0e => self.charsets.shift_out(),
            0x0f => self.charsets.shift_in(),
            other => tracing::trace!("ignored control byte {other:#04x}"),
        }
    }

    fn csi_dispatch(
        &mut self,
        params: &vte::Params,
        intermediates: &[u8],
        ignore: bool,
        action: char,
    ) {
        if ignore {
            tracing::trace!("oversized CSI sequence ignored (final {action:?})");
            return;
        }
        let raw = extract_params(params);
        let private = intermediates.contains(&b'?');
        let gt = intermediates.contains(&b'>');

        match action {
            '@' => self.screen().insert_chars(param(&raw, 0, 1) as usize),
            'A' => self.screen().cursor_up(param(&raw, 0, 1) as usize),
            'B' | 'e' => self.screen().cursor_down(param(&raw, 0, 1) as usize),
            'C' | 'a' => self.screen().cursor_right(param(&raw, 0, 1) as usize),
            'D' => self.screen().cursor_left(param(&raw, 0, 1) as usize),
            'E' => {
                let n = param(&raw, 0, 1) as usize;
                let screen = self.screen();
                screen.cursor_down(n);
                screen.carriage_return();
            }
            'F' => {
                let n = param(&raw, 0, 1) as usize;
                let screen = self.screen();
                screen.cursor_up(n);
                screen.carriage_return();
            }
            'G' | '`' => self.screen().set_cursor_x(param(&raw, 0, 1) as usize - 1),
            'H' | 'f' => {
                let y = param(&raw, 0, 1) as usize - 1;
                let x = param(&raw, 1, 1) as usize - 1;
                self.screen().set_cursor_yx(y, x);
            }
            'I' => self.screen().tab(param(&raw, 0, 1) as usize),
            'J' => match raw.first().copied().unwrap_or(0) {
                0 => self.screen().clear_to_end_of_screen(private),
                1 => self.screen().clear_to_begin_of_screen(private),
                2 => self.screen().clear_entire_screen(private),
                3 => {
                    // xterm extension: wipe scrollback only.
                    let dropped = self.screen().history_lines();
                    if dropped > 0 {
                        let dir = self.config.scrollback_dir.clone();
                        let mode = self.config.history_mode.clone();
                        if let Err(err) = self.primary.set_history(&HistoryMode::None, None) {
                            tracing::warn!("failed to clear scrollback: {err}");
                        } else if let Err(err) = self.primary.set_history(&mode, dir.as_deref()) {
                            tracing::warn!("failed to reinstall scrollback: {err}");
                        }
                    }
                }
                other => tracing::trace!("ignored ED {other}"),
            },
            'K' => match raw.first().copied().unwrap_or(0) {
                0 => self.screen().clear_to_end_of_line(private),
                1 => self.screen().clear_to_begin_of_line(private),
                2 => self.screen().clear_entire_line(private),
                other => tracing::trace!("ignored EL {other}"),
            },
            'L' => self.screen().insert_lines(param(&raw, 0, 1) as usize),
            'M' => self.screen().delete_lines(param(&raw, 0, 1) as usize),
            'P' => self.screen().delete_chars(param(&raw, 0, 1) as usize),
            'S' => self.screen().scroll_up(param(&raw, 0, 1) as usize),
            'T' => self.screen().scroll_down(param(&raw, 0, 1) as usize),
            'X' => self.screen().erase_chars(param(&raw, 0, 1) as usize),
            'Z' => self.screen().backtab(param(&raw, 0, 1) as usize),
            'b' => {
                // REP caps the count so a hostile stream cannot spin here.
                if let Some(c) = self.last_printed {
                    let count = (param(&raw, 0, 1) as usize).min(2048);
                    for _ in 0..count {
                        self.screen().show_character(c);
                    }
                }
            }
            'c' => {
                if param(&raw, 0, 0) == 0 {
                    if gt {
                        self.send(b"\x1b[>1;115;0c");
                    } else {
                        self.send(b"\x1b[?62;1;4c");
                    }
                }
            }
            'd' => self.screen().set_cursor_y(param(&raw, 0, 1) as usize - 1),
            'g' => match raw.first().copied().unwrap_or(0) {
                0 => self.screen().clear_tab_stop_at_cursor(),
                3 => self.screen().clear_all_tab_stops(),
                other => tracing::trace!("ignored TBC {other}"),
            },
            'h' | 'l' => {
                let enable = action == 'h';
                for &mode in &raw {
                    if private {
                        self.set_dec_mode(mode, enable);
                    } else {
                        self.set_ansi_mode(mode, enable);
                    }
                }
            }
            'm' => {
                if gt {
                    // XTMODKEYS and friends; not SGR.
                    tracing::trace!("ignored CSI > m");
                } else {
                    let groups: Vec<Vec<u16>> =
                        params.iter().map(|subparams| subparams.to_vec()).collect();
                    self.apply_sgr(&groups);
                }
            }
            'n' => self.report_device_status(&raw, private),
            'p' => {
                if intermediates.contains(&b'$') {
                    if raw.is_empty() {
                        self.report_mode_state(0, None, private);
                    }
                    for &mode in &raw {
                        let state = if private {
                            self.dec_mode_state(mode)
                        } else {
                            match mode {
                                20 => Some(self.modes.linefeed_newline),
                                _ => None,
                            }
                        };
                        self.report_mode_state(mode, state, private);
                    }
                } else if intermediates.contains(&b'!') {
                    self.soft_reset();
                }
            }
            'q' => {
                if intermediates.contains(&b' ') {
                    self.report_cursor_style(raw.first().copied().unwrap_or(0));
                } else if intermediates.contains(&b'"') {
                    // DECSCA
                    match raw.first().copied().unwrap_or(0) {
                        1 => self.screen().set_rendition(Rendition::PROTECTED),
                        _ => self.screen().reset_rendition(Rendition::PROTECTED),
                    }
                }
            }
            'r' => {
                let lines = self.screen().lines();
                let top = param(&raw, 0, 1) as usize - 1;
                let bottom = param(&raw, 1, lines as u16) as usize - 1;
                self.screen().set_margins(top, bottom);
            }
            's' => self.screen().save_cursor(),
            't' => self.report_window_op(&raw),
            'u' => self.screen().restore_cursor(),
            other => tracing::trace!("ignored CSI final {other:?}"),
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        match (byte, intermediates) {
            (b'7', []) => {
                self.saved_charsets = self.charsets;
                self.screen().save_cursor();
            }
            (b'8', []) => {
                self.charsets = self.saved_charsets;
                self.screen().restore_cursor();
            }
            // DECDHL top/bottom halves are double width as well.
            (b'3', [b'#']) => self.set_line_rendition(
                LineProperty::DOUBLE_HEIGHT_TOP | LineProperty::DOUBLE_WIDTH,
            ),
            (b'4', [b'#']) => self.set_line_rendition(
                LineProperty::DOUBLE_HEIGHT_BOT | LineProperty::DOUBLE_WIDTH,
            ),
            (b'5', [b'#']) => self.set_line_rendition(LineProperty::empty()),
            (b'6', [b'#']) => self.set_line_rendition(LineProperty::DOUBLE_WIDTH),
            (b'8', [b'#']) => self.screen().align_test(),
            (b'=', []) => {
                self.modes.keypad_application = true;
                self.event(TerminalEvent::KeypadModeChanged { application: true });
            }
            (b'>', []) => {
                self.modes.keypad_application = false;
                self.event(TerminalEvent::KeypadModeChanged { application: false });
            }
            (b'D', []) => self.screen().index(),
            (b'E', []) => self.screen().next_line(),
            (b'H', []) => self.screen().set_tab_stop_at_cursor(),
            (b'M', []) => self.screen().reverse_index(),
            (b'N', []) => self.charsets.single_shift(2),
            (b'O', []) => self.charsets.single_shift(3),
            (b'Z', []) => self.send(b"\x1b[?62;1;4c"),
            (b'c', []) => self.reset_all(),
            (b'G', [b'%']) => self.modes.utf8 = true,
            (b'@', [b'%']) => self.modes.utf8 = false,
            (final_byte, [designator @ (b'(' | b')' | b'*' | b'+')]) => {
                if let Some(charset) = Charset::from_final_byte(final_byte) {
                    let index = match designator {
                        b'(' => 0,
                        b')' => 1,
                        b'*' => 2,
                        _ => 3,
                    };
                    self.charsets.designate(index, charset);
                } else {
                    tracing::trace!("ignored charset designation {final_byte:?}");
                }
            }
            (b'\\', []) => {} // ST
            (other, _) => tracing::trace!("ignored ESC final {other:?}"),
        }
    }

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        self.handle_osc(params);
    }

    // DCS, SOS, PM, and APC payloads are consumed and discarded.
    fn hook(&mut self, _params: &vte::Params, _intermediates: &[u8], _ignore: bool, action: char) {
        tracing::trace!("ignoring DCS payload (final {action:?})");
    }

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::{SelectionMode, SelectionOptions};

    fn emulation(lines: usize, columns: usize) -> Emulation {
        let config = CoreConfig {
            history_mode: HistoryMode::Unbounded,
            ..CoreConfig::default()
        };
        Emulation::new(lines, columns, config).unwrap()
    }

    fn feed(emulation: &mut Emulation, bytes: &[u8]) {
        emulation.receive_data(bytes);
    }

    fn row_text(emulation: &mut Emulation, row: usize) -> String {
        let screen = emulation.screen_mut();
        let columns = screen.columns();
        let hist = screen.history_lines();
        let mut buf = vec![crate::character::Character::default(); columns];
        screen.image(&mut buf, hist + row, hist + row + 1);
        buf.iter()
            .filter(|c| c.width != 0)
            .map(|c| c.literal_char())
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    fn history_text(emulation: &mut Emulation, line: usize) -> String {
        let screen = emulation.screen_mut();
        let len = screen.history().line_length(line);
        let mut buf = vec![crate::character::Character::default(); len];
        screen.history().get_cells(line, 0, &mut buf);
        buf.iter()
            .filter(|c| c.width != 0)
            .map(|c| c.literal_char())
            .collect()
    }

    #[test]
    fn plain_text_lands_on_the_grid() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"hello\r\nworld");
        assert_eq!(row_text(&mut e, 0), "hello");
        assert_eq!(row_text(&mut e, 1), "world");
        assert_eq!(e.screen_mut().cursor_position(), (1, 5));
    }

    #[test]
    fn sgr_colors_and_reset() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b[31mred\x1b[0m\x1b[1mbold");
        let screen = e.screen_mut();
        let mut buf = vec![crate::character::Character::default(); 80];
        let hist = screen.history_lines();
        screen.image(&mut buf, hist, hist + 1);
        for cell in &buf[0..3] {
            assert_eq!(cell.fg, ColorEntry::Palette(1, Intensity::Normal));
            assert_eq!(cell.rendition, Rendition::empty());
        }
        for cell in &buf[3..7] {
            assert_eq!(cell.fg, ColorEntry::DefaultForeground);
            assert_eq!(cell.rendition, Rendition::BOLD);
        }
    }

    fn first_cell(e: &mut Emulation) -> crate::character::Character {
        let screen = e.screen_mut();
        let mut buf = vec![crate::character::Character::default(); screen.columns()];
        let hist = screen.history_lines();
        screen.image(&mut buf, hist, hist + 1);
        buf[0]
    }

    #[test]
    fn sgr_colon_truecolor_skips_the_colorspace_id() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b[38:2::10:20:30mX");
        assert_eq!(first_cell(&mut e).fg, ColorEntry::Rgb(10, 20, 30));
    }

    #[test]
    fn sgr_colon_truecolor_without_colorspace_id() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b[48:2:10:20:30mX");
        assert_eq!(first_cell(&mut e).bg, ColorEntry::Rgb(10, 20, 30));
    }

    #[test]
    fn sgr_colon_indexed_color() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b[38:5:196mX");
        assert_eq!(first_cell(&mut e).fg, ColorEntry::Indexed(196));
    }

    #[test]
    fn sgr_semicolon_truecolor_keeps_following_params() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b[38;2;10;20;30;1mX");
        let cell = first_cell(&mut e);
        assert_eq!(cell.fg, ColorEntry::Rgb(10, 20, 30));
        assert!(
            cell.rendition.contains(Rendition::BOLD),
            "params after the triple still apply"
        );
    }

    #[test]
    fn line_size_marks_via_decdwl_and_decdhl() {
        let mut e = emulation(4, 20);
        feed(&mut e, b"\x1b#6");
        assert!(e
            .screen_mut()
            .current_line_property()
            .contains(LineProperty::DOUBLE_WIDTH));

        feed(&mut e, b"\x1b#3");
        let property = e.screen_mut().current_line_property();
        assert!(property.contains(LineProperty::DOUBLE_HEIGHT_TOP));
        assert!(property.contains(LineProperty::DOUBLE_WIDTH));
        assert!(!property.contains(LineProperty::DOUBLE_HEIGHT_BOT));

        feed(&mut e, b"\x1b#4");
        let property = e.screen_mut().current_line_property();
        assert!(property.contains(LineProperty::DOUBLE_HEIGHT_BOT));
        assert!(!property.contains(LineProperty::DOUBLE_HEIGHT_TOP));

        feed(&mut e, b"\x1b#5");
        let property = e.screen_mut().current_line_property();
        assert!(!property.intersects(
            LineProperty::DOUBLE_WIDTH
                | LineProperty::DOUBLE_HEIGHT_TOP
                | LineProperty::DOUBLE_HEIGHT_BOT
        ));
    }

    #[test]
    fn autowrap_evicts_wrapped_line_to_history() {
        let mut e = emulation(2, 10);
        feed(&mut e, b"0123456789ABCDEFGHIJ");
        assert_eq!(row_text(&mut e, 0), "0123456789");
        assert_eq!(row_text(&mut e, 1), "ABCDEFGHIJ");
        assert_eq!(e.screen_mut().history_lines(), 0);

        feed(&mut e, b"\r\nXYZ");
        assert_eq!(e.screen_mut().history_lines(), 1);
        assert_eq!(history_text(&mut e, 0), "0123456789");
        assert!(
            e.screen_mut().history().is_wrapped(0),
            "autowrap continuation carries WRAPPED into history"
        );
        assert_eq!(row_text(&mut e, 0), "ABCDEFGHIJ");
        assert_eq!(row_text(&mut e, 1), "XYZ");
    }

    #[test]
    fn osc8_hyperlink_span_is_extracted() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b]8;;https://example.com\x1b\\link\x1b]8;;\x1b\\");
        assert_eq!(row_text(&mut e, 0), "link");
        let screen = e.screen_mut();
        let spans = screen.hyperlinks.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].url, "https://example.com");
        assert_eq!(spans[0].text, "link");
        assert_eq!(spans[0].begin, (0, 0));
        assert_eq!(spans[0].end, (0, 3));
    }

    #[test]
    fn titles_emit_events() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b]2;my title\x07");
        assert_eq!(e.window_title(), "my title");
        assert!(e
            .take_events()
            .iter()
            .any(|ev| matches!(ev, TerminalEvent::TitleChanged { title } if title == "my title")));
    }

    #[test]
    fn title_stack_push_and_pop() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b]2;first\x07\x1b[22;2t\x1b]2;second\x07");
        assert_eq!(e.window_title(), "second");
        feed(&mut e, b"\x1b[23;2t");
        assert_eq!(e.window_title(), "first");
    }

    #[test]
    fn cursor_position_report() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b[5;10H\x1b[6n");
        assert_eq!(e.take_outbound(), b"\x1b[5;10R");
    }

    #[test]
    fn device_attributes_reports() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b[c");
        assert_eq!(e.take_outbound(), b"\x1b[?62;1;4c");
        feed(&mut e, b"\x1b[>c");
        assert_eq!(e.take_outbound(), b"\x1b[>1;115;0c");
    }

    #[test]
    fn decrqm_reports_mode_state() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b[?2004h\x1b[?2004$p");
        assert_eq!(e.take_outbound(), b"\x1b[?2004;1$y");
        feed(&mut e, b"\x1b[?9999$p");
        assert_eq!(e.take_outbound(), b"\x1b[?9999;0$y");
    }

    #[test]
    fn alternate_screen_round_trip_preserves_primary() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"MainText");
        feed(&mut e, b"\x1b[?1049h");
        assert!(e.using_alternate_screen());
        feed(&mut e, b"AltStuff");
        feed(&mut e, b"\x1b[?1049l");
        assert!(!e.using_alternate_screen());
        assert_eq!(row_text(&mut e, 0), "MainText");
    }

    #[test]
    fn alternate_screen_does_not_touch_history() {
        let mut e = emulation(2, 10);
        feed(&mut e, b"a\r\nb\r\nc");
        let hist = e.screen_mut().history_lines();
        assert!(hist > 0);
        feed(&mut e, b"\x1b[?1049h");
        for _ in 0..5 {
            feed(&mut e, b"x\r\n");
        }
        assert_eq!(
            e.screen_mut().history_lines(),
            0,
            "alternate screen has no history"
        );
        feed(&mut e, b"\x1b[?1049l");
        assert_eq!(e.screen_mut().history_lines(), hist);
    }

    #[test]
    fn margins_and_origin_mode() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b[6;21r\x1b[?6h\x1b[1;1H");
        assert_eq!(e.screen_mut().cursor_position(), (5, 0));
        feed(&mut e, b"\x1b[?6l\x1b[3;1H");
        assert_eq!(e.screen_mut().cursor_position(), (2, 0));
    }

    #[test]
    fn latin1_mode_decodes_high_bytes() {
        let config = CoreConfig {
            utf8: false,
            ..CoreConfig::default()
        };
        let mut e = Emulation::new(4, 20, config).unwrap();
        feed(&mut e, &[b'c', b'a', b'f', 0xe9]);
        assert_eq!(row_text(&mut e, 0), "café");
    }

    #[test]
    fn malformed_utf8_emits_replacement() {
        let mut e = emulation(4, 20);
        feed(&mut e, &[0xff, b'o', b'k']);
        let text = row_text(&mut e, 0);
        assert!(text.ends_with("ok"));
        assert!(text.starts_with('\u{fffd}'));
    }

    #[test]
    fn chunk_boundaries_do_not_split_sequences() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b[3");
        feed(&mut e, b"1mre");
        feed(&mut e, b"d");
        let screen = e.screen_mut();
        let mut buf = vec![crate::character::Character::default(); 80];
        let hist = screen.history_lines();
        screen.image(&mut buf, hist, hist + 1);
        assert_eq!(buf[0].fg, ColorEntry::Palette(1, Intensity::Normal));
        assert_eq!(row_text(&mut e, 0), "red");
    }

    #[test]
    fn special_graphics_charset_designation() {
        let mut e = emulation(4, 20);
        feed(&mut e, b"\x1b(0q\x1b(Bq");
        assert_eq!(row_text(&mut e, 0), "─q");
    }

    #[test]
    fn si_so_switch_between_g0_and_g1() {
        let mut e = emulation(4, 20);
        feed(&mut e, b"\x1b)0q\x0eq\x0fq");
        assert_eq!(row_text(&mut e, 0), "q─q");
    }

    #[test]
    fn replaying_decoded_text_reproduces_the_image() {
        use crate::character::Character;
        use crate::decoder::{PlainTextDecoder, TerminalCharacterDecoder};

        let mut original = emulation(4, 10);
        feed(&mut original, b"wrap across lines\r\nsecond\r\nx");

        // Decode the visible screen to plain text.
        let mut decoder = PlainTextDecoder::new();
        decoder.begin();
        {
            let screen = original.screen_mut();
            let hist = screen.history_lines();
            let mut buf = vec![Character::default(); 10];
            for row in 0..4 {
                screen.image(&mut buf, hist + row, hist + row + 1);
                let property = screen.line_property_range(hist + row, hist + row + 1)[0];
                decoder.decode_line(&buf, property);
            }
        }
        let text = decoder.end();

        // Replay into a fresh screen of the same width.
        let mut replayed = emulation(4, 10);
        feed(&mut replayed, text.replace('\n', "\r\n").as_bytes());

        for row in 0..4 {
            let a = row_text(&mut original, row);
            let b = row_text(&mut replayed, row);
            assert_eq!(a, b, "row {row} must survive a decode/replay cycle");
        }
    }

    #[test]
    fn rep_repeats_last_character() {
        let mut e = emulation(4, 20);
        feed(&mut e, b"A\x1b[3b");
        assert_eq!(row_text(&mut e, 0), "AAAA");
    }

    #[test]
    fn key_events_respect_application_cursor_mode() {
        let mut e = emulation(24, 80);
        assert_eq!(e.send_key_event(KeyCode::Up, Modifiers::empty()), b"\x1b[A");
        feed(&mut e, b"\x1b[?1h");
        assert_eq!(e.send_key_event(KeyCode::Up, Modifiers::empty()), b"\x1bOA");
    }

    #[test]
    fn host_key_table_overrides_builtin() {
        struct Table;
        impl KeyBindingTable for Table {
            fn lookup(&self, key: KeyCode, _: Modifiers, _: &KeyContext) -> Option<Vec<u8>> {
                match key {
                    KeyCode::F(1) => Some(b"custom".to_vec()),
                    _ => None,
                }
            }
        }
        let mut e = emulation(24, 80);
        e.set_key_binding_table(Box::new(Table));
        assert_eq!(e.send_key_event(KeyCode::F(1), Modifiers::empty()), b"custom");
        assert_eq!(e.send_key_event(KeyCode::F(2), Modifiers::empty()), b"\x1bOQ");
    }

    #[test]
    fn mouse_events_are_gated_and_encoded() {
        let mut e = emulation(24, 80);
        e.send_mouse_event(MouseButton::Left, 2, 3, MouseEventKind::Press);
        assert!(e.take_outbound().is_empty(), "tracking disabled");
        feed(&mut e, b"\x1b[?1000h\x1b[?1006h");
        e.send_mouse_event(MouseButton::Left, 2, 3, MouseEventKind::Press);
        assert_eq!(e.take_outbound(), b"\x1b[<0;3;4M");
    }

    #[test]
    fn alternate_scroll_turns_wheel_into_arrows() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b[?1007h\x1b[?1049h");
        let _ = e.take_outbound();
        e.send_mouse_event(MouseButton::WheelUp, 0, 0, MouseEventKind::Press);
        assert_eq!(e.take_outbound(), b"\x1b[A");
        feed(&mut e, b"\x1b[?1049l");
        e.send_mouse_event(MouseButton::WheelUp, 0, 0, MouseEventKind::Press);
        assert!(
            e.take_outbound().is_empty(),
            "no translation on the primary screen"
        );
    }

    #[test]
    fn bracketed_paste_wraps_only_when_enabled() {
        let mut e = emulation(24, 80);
        assert_eq!(e.wrap_paste(b"x"), b"x");
        feed(&mut e, b"\x1b[?2004h");
        assert_eq!(e.wrap_paste(b"x"), b"\x1b[200~x\x1b[201~");
    }

    #[test]
    fn focus_reports_follow_mode_1004() {
        let mut e = emulation(24, 80);
        e.send_focus_event(true);
        assert!(e.take_outbound().is_empty());
        feed(&mut e, b"\x1b[?1004h");
        e.send_focus_event(true);
        assert_eq!(e.take_outbound(), b"\x1b[I");
    }

    #[test]
    fn bell_produces_event() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x07");
        assert!(e
            .take_events()
            .iter()
            .any(|ev| matches!(ev, TerminalEvent::Bell)));
    }

    #[test]
    fn osc52_is_rejected_with_diagnostic() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b]52;c;aGVsbG8=\x07");
        assert!(e.take_events().iter().any(|ev| matches!(
            ev,
            TerminalEvent::Diagnostic(Diagnostic::ClipboardAccessRejected)
        )));
    }

    #[test]
    fn shell_marks_set_line_properties() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b]133;A\x07$ ");
        let property = e.screen_mut().current_line_property();
        assert!(property.contains(LineProperty::PROMPT_START));
        assert!(e.take_events().iter().any(|ev| matches!(
            ev,
            TerminalEvent::ShellIntegrationMark {
                kind: ShellMark::PromptStart,
                ..
            }
        )));
    }

    #[test]
    fn decscusr_reports_cursor_style() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b[4 q");
        assert!(e.take_events().iter().any(|ev| matches!(
            ev,
            TerminalEvent::CursorStyleChanged {
                shape: CursorShape::Underline,
                blinking: false
            }
        )));
    }

    #[test]
    fn osc_color_queries_are_answered() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b]10;?\x07");
        let out = e.take_outbound();
        let text = String::from_utf8_lossy(&out);
        assert!(text.starts_with("\x1b]10;rgb:"), "got {text:?}");
    }

    #[test]
    fn ris_resets_screen_and_modes() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b[31mstuff\x1b[?1h\x1b[?1049h");
        feed(&mut e, b"\x1bc");
        assert!(!e.using_alternate_screen());
        assert!(!e.modes().cursor_keys_application);
        assert_eq!(row_text(&mut e, 0), "");
    }

    #[test]
    fn selection_flows_through_emulation() {
        let mut e = emulation(4, 20);
        feed(&mut e, b"pick me");
        let screen = e.screen_mut();
        let hist = screen.history_lines();
        screen.set_selection_start(hist, 0, SelectionMode::Stream);
        screen.set_selection_end(hist, 6);
        assert_eq!(
            screen.selected_text(
                SelectionOptions::PRESERVE_LINE_BREAKS
                    | SelectionOptions::TRIM_TRAILING_WHITESPACE
            ),
            "pick me"
        );
    }

    #[test]
    fn decaln_fills_screen() {
        let mut e = emulation(3, 5);
        feed(&mut e, b"\x1b#8");
        for row in 0..3 {
            assert_eq!(row_text(&mut e, row), "EEEEE");
        }
    }

    #[test]
    fn unknown_sequences_are_swallowed() {
        let mut e = emulation(4, 20);
        feed(&mut e, b"\x1b[99;99;99zok\x1b]7777;whatever\x07fine\x1bP+junk\x1b\\!");
        assert_eq!(row_text(&mut e, 0), "okfine!");
    }

    #[test]
    fn window_size_report() {
        let mut e = emulation(24, 80);
        feed(&mut e, b"\x1b[18t");
        assert_eq!(e.take_outbound(), b"\x1b[8;24;80t");
    }
}
