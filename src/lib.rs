//! Terminal emulator core.
//!
//! Squall turns a PTY byte stream into a grid of styled cells, keeps
//! bounded or unbounded scrollback, finds interactive regions in the
//! visible text, and hands the result to a renderer. It is the engine of a
//! terminal emulator with everything host-shaped cut away: no PTY
//! plumbing, no painting, no configuration files, no UI.
//!
//! The pieces line up with the data flow:
//!
//! - [`emulation::Emulation`] parses VT/xterm escape sequences and drives
//!   the screens; replies (cursor reports, mouse tracking, key encodings)
//!   come back through its outbound callback.
//! - [`screen::Screen`] is the passive grid: cursor, margins, tab stops,
//!   selection, alternate screen, reflow, eviction into history.
//! - [`history`] stores evicted lines behind one of three backends: none,
//!   a bounded in-memory ring, or unlinked temp files with demand-paged
//!   reads.
//! - [`screen::ScreenWindow`] is the sliding view a renderer scrolls over
//!   history plus screen.
//! - [`filter::FilterChain`] scans the visible image for URLs, file paths,
//!   colors, and OSC 8 hyperlinks, producing activatable hotspots.
//!
//! ```no_run
//! use squall::{CoreConfig, Emulation};
//!
//! let mut emulation = Emulation::new(24, 80, CoreConfig::default())?;
//! emulation.set_send_data_callback(|bytes| {
//!     // write replies back to the PTY
//!     let _ = bytes;
//! });
//! emulation.receive_data(b"\x1b[1mhello\r\n");
//! # Ok::<(), squall::ConfigError>(())
//! ```

pub mod character;
pub mod config;
pub mod decoder;
pub mod emulation;
pub mod event;
pub mod filter;
pub mod history;
pub mod screen;

pub use character::{
    Character, ColorEntry, ColorTable, ExtendedCharTable, Intensity, LineProperty, Rendition,
};
pub use config::{ConfigError, CoreConfig};
pub use decoder::{HtmlDecoder, PlainTextDecoder, TerminalCharacterDecoder};
pub use emulation::{
    Emulation, KeyBindingTable, KeyCode, Modifiers, MouseButton, MouseEventKind,
};
pub use event::{CursorShape, Diagnostic, ShellMark, TerminalEvent};
pub use filter::{
    Activation, ColorFilter, EscapeSequenceUrlFilter, FileFilter, Filter, FilterChain, HotSpot,
    HotSpotAction, HotSpotType, RegExpFilter, UrlFilter,
};
pub use history::HistoryMode;
pub use screen::{Screen, ScreenWindow, SelectionMode, SelectionOptions};
