use bitflags::bitflags;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::color::ColorEntry;

bitflags! {
    /// Non-color text attributes of a cell.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Rendition: u16 {
        const BOLD      = 1 << 0;
        const BLINK     = 1 << 1;
        const UNDERLINE = 1 << 2;
        const REVERSE   = 1 << 3;
        const ITALIC    = 1 << 4;
        const STRIKEOUT = 1 << 5;
        const OVERLINE  = 1 << 6;
        const FAINT     = 1 << 7;
        const CONCEAL   = 1 << 8;
        /// DECSCA guard: selective erase (DECSED/DECSEL) skips this cell.
        const PROTECTED = 1 << 9;
        /// Cell lies inside an OSC 8 hyperlink span.
        const LINKED    = 1 << 10;
        /// The code field is an extended-char handle, not a code point.
        const EXTENDED  = 1 << 11;
    }
}

bitflags! {
    /// Per-line properties carried next to the cell data.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct LineProperty: u8 {
        /// The line continues on the next one (soft wrap).
        const WRAPPED            = 1 << 0;
        const DOUBLE_WIDTH       = 1 << 1;
        const DOUBLE_HEIGHT_TOP  = 1 << 2;
        const DOUBLE_HEIGHT_BOT  = 1 << 3;
        /// Shell integration marks (OSC 133).
        const PROMPT_START       = 1 << 4;
        const INPUT_START        = 1 << 5;
        const OUTPUT_START       = 1 << 6;
    }
}

/// A single grid cell.
///
/// `code` holds a Unicode scalar value, or an [`ExtendedCharTable`] handle
/// when [`Rendition::EXTENDED`] is set. `width` is the column count the cell
/// occupies: 1, 2 for East Asian wide characters, or 0 for the trailing half
/// of a wide character.
///
/// [`ExtendedCharTable`]: super::ExtendedCharTable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Character {
    pub code: u32,
    pub fg: ColorEntry,
    pub bg: ColorEntry,
    pub rendition: Rendition,
    pub width: u8,
}

impl Default for Character {
    fn default() -> Self {
        Self {
            code: ' ' as u32,
            fg: ColorEntry::DefaultForeground,
            bg: ColorEntry::DefaultBackground,
            rendition: Rendition::empty(),
            width: 1,
        }
    }
}

impl Character {
    /// Serialized record size in the file-backed history.
    pub const SERIALIZED_LEN: usize = 16;

    pub fn new(code: u32, fg: ColorEntry, bg: ColorEntry, rendition: Rendition, width: u8) -> Self {
        Self {
            code,
            fg,
            bg,
            rendition,
            width,
        }
    }

    /// The trailing half of a wide character: code point 0, width 0, same
    /// colors and rendition as the leading cell.
    pub fn wide_trailing(leading: &Character) -> Self {
        Self {
            code: 0,
            fg: leading.fg,
            bg: leading.bg,
            rendition: leading.rendition,
            width: 0,
        }
    }

    /// An erased cell: blank, default foreground, the given background.
    pub fn erased(bg: ColorEntry) -> Self {
        Self {
            bg,
            ..Self::default()
        }
    }

    /// Whether the cell still holds the default (blank) value. Trailing
    /// default cells are trimmed when a line is evicted to history.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// The literal code point, or U+FFFD if the cell holds an extended-char
    /// handle (callers that can expand handles go through the table instead).
    pub fn literal_char(&self) -> char {
        if self.rendition.contains(Rendition::EXTENDED) {
            char::REPLACEMENT_CHARACTER
        } else {
            char::from_u32(self.code).unwrap_or(char::REPLACEMENT_CHARACTER)
        }
    }

    /// Visual equality: same resolved appearance. Rendition and colors must
    /// match; the code point itself is not part of the comparison.
    pub fn same_appearance(&self, other: &Character) -> bool {
        self.fg == other.fg && self.bg == other.bg && self.rendition == other.rendition
    }

    /// Encode into a fixed 16-byte record (file-backed history layout).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= Self::SERIALIZED_LEN);
        buf[0..4].copy_from_slice(&self.code.to_le_bytes());
        self.fg.encode_into(&mut buf[4..8]);
        self.bg.encode_into(&mut buf[8..12]);
        buf[12..14].copy_from_slice(&self.rendition.bits().to_le_bytes());
        buf[14] = self.width;
        buf[15] = 0;
    }

    /// Decode a record previously written by [`encode_into`](Self::encode_into).
    pub fn decode_from(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= Self::SERIALIZED_LEN);
        Self {
            code: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            fg: ColorEntry::decode_from(&buf[4..8]),
            bg: ColorEntry::decode_from(&buf[8..12]),
            rendition: Rendition::from_bits_truncate(u16::from_le_bytes([buf[12], buf[13]])),
            width: buf[14],
        }
    }
}

/// Column width of a single character (0 for zero-width combining marks).
pub fn char_width(c: char) -> u8 {
    UnicodeWidthChar::width(c).unwrap_or(0) as u8
}

/// Column width of a string as it would occupy cells on screen. Filters use
/// this to convert text offsets back into grid columns.
pub fn string_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_trailing_carries_style_with_zero_width() {
        let lead = Character::new(
            '漢' as u32,
            ColorEntry::Indexed(203),
            ColorEntry::DefaultBackground,
            Rendition::BOLD,
            2,
        );
        let trail = Character::wide_trailing(&lead);
        assert_eq!(trail.code, 0);
        assert_eq!(trail.width, 0);
        assert_eq!(trail.fg, lead.fg);
        assert_eq!(trail.rendition, lead.rendition);
    }

    #[test]
    fn encode_decode_round_trip() {
        let cell = Character::new(
            'x' as u32,
            ColorEntry::Rgb(1, 2, 3),
            ColorEntry::Indexed(99),
            Rendition::UNDERLINE | Rendition::ITALIC,
            1,
        );
        let mut buf = [0u8; Character::SERIALIZED_LEN];
        cell.encode_into(&mut buf);
        assert_eq!(Character::decode_from(&buf), cell);
    }

    #[test]
    fn default_cell_is_default() {
        assert!(Character::default().is_default());
        let mut c = Character::default();
        c.code = 'a' as u32;
        assert!(!c.is_default());
    }

    #[test]
    fn width_helpers_agree_with_unicode_width() {
        assert_eq!(char_width('a'), 1);
        assert_eq!(char_width('漢'), 2);
        assert_eq!(string_width("a漢b"), 4);
    }
}
