/// Brightness variant selected by SGR bold-as-bright or faint handling for
/// the 16-color palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Intensity {
    #[default]
    Normal,
    Intense,
    Faint,
}

/// A cell color before resolution against a color scheme.
///
/// The default-foreground and default-background sentinels stay distinct so
/// that reverse video can swap them; palette and indexed entries resolve
/// through the host-supplied [`ColorTable`] at render or export time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorEntry {
    DefaultForeground,
    DefaultBackground,
    /// 16-color palette index (0..16) with an intensity variant.
    Palette(u8, Intensity),
    /// 256-color index.
    Indexed(u8),
    Rgb(u8, u8, u8),
}

impl ColorEntry {
    /// Encode into a fixed 4-byte field of the file-backed history record.
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= 4);
        match *self {
            ColorEntry::DefaultForeground => buf[..4].copy_from_slice(&[0, 0, 0, 0]),
            ColorEntry::DefaultBackground => buf[..4].copy_from_slice(&[1, 0, 0, 0]),
            ColorEntry::Palette(i, intensity) => {
                let v = match intensity {
                    Intensity::Normal => 0,
                    Intensity::Intense => 1,
                    Intensity::Faint => 2,
                };
                buf[..4].copy_from_slice(&[2, i, v, 0]);
            }
            ColorEntry::Indexed(i) => buf[..4].copy_from_slice(&[3, i, 0, 0]),
            ColorEntry::Rgb(r, g, b) => buf[..4].copy_from_slice(&[4, r, g, b]),
        }
    }

    pub fn decode_from(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= 4);
        match buf[0] {
            0 => ColorEntry::DefaultForeground,
            1 => ColorEntry::DefaultBackground,
            2 => {
                let intensity = match buf[2] {
                    1 => Intensity::Intense,
                    2 => Intensity::Faint,
                    _ => Intensity::Normal,
                };
                ColorEntry::Palette(buf[1] & 0x0f, intensity)
            }
            3 => ColorEntry::Indexed(buf[1]),
            _ => ColorEntry::Rgb(buf[1], buf[2], buf[3]),
        }
    }

    /// Resolve to concrete RGB against `table`.
    pub fn resolve(&self, table: &ColorTable) -> (u8, u8, u8) {
        match *self {
            ColorEntry::DefaultForeground => table.foreground,
            ColorEntry::DefaultBackground => table.background,
            ColorEntry::Palette(index, intensity) => {
                let index = index as usize & 0x0f;
                match intensity {
                    Intensity::Normal => table.palette[index],
                    Intensity::Intense => table.palette[if index < 8 { index + 8 } else { index }],
                    Intensity::Faint => dim(table.palette[index]),
                }
            }
            ColorEntry::Indexed(index) => indexed_to_rgb(index, table),
            ColorEntry::Rgb(r, g, b) => (r, g, b),
        }
    }
}

/// The 16-color palette plus default foreground/background, supplied by the
/// color-scheme collaborator. The 256-color cube and grayscale ramp are
/// computed, not stored.
#[derive(Debug, Clone)]
pub struct ColorTable {
    pub foreground: (u8, u8, u8),
    pub background: (u8, u8, u8),
    pub palette: [(u8, u8, u8); 16],
}

impl Default for ColorTable {
    fn default() -> Self {
        // xterm's stock palette.
        Self {
            foreground: (0xe5, 0xe5, 0xe5),
            background: (0x00, 0x00, 0x00),
            palette: [
                (0x00, 0x00, 0x00),
                (0xcd, 0x00, 0x00),
                (0x00, 0xcd, 0x00),
                (0xcd, 0xcd, 0x00),
                (0x00, 0x00, 0xee),
                (0xcd, 0x00, 0xcd),
                (0x00, 0xcd, 0xcd),
                (0xe5, 0xe5, 0xe5),
                (0x7f, 0x7f, 0x7f),
                (0xff, 0x00, 0x00),
                (0x00, 0xff, 0x00),
                (0xff, 0xff, 0x00),
                (0x5c, 0x5c, 0xff),
                (0xff, 0x00, 0xff),
                (0x00, 0xff, 0xff),
                (0xff, 0xff, 0xff),
            ],
        }
    }
}

fn dim((r, g, b): (u8, u8, u8)) -> (u8, u8, u8) {
    (
        (r as u16 * 2 / 3) as u8,
        (g as u16 * 2 / 3) as u8,
        (b as u16 * 2 / 3) as u8,
    )
}

/// Convert a 256-color index to RGB. The first 16 come from the palette,
/// 16-231 form a 6x6x6 cube, 232-255 a grayscale ramp.
pub fn indexed_to_rgb(index: u8, table: &ColorTable) -> (u8, u8, u8) {
    match index {
        0..=15 => table.palette[index as usize],
        16..=231 => {
            let idx = index - 16;
            let r = idx / 36;
            let g = (idx % 36) / 6;
            let b = idx % 6;
            let to_val = |v: u8| if v == 0 { 0 } else { 55 + 40 * v };
            (to_val(r), to_val(g), to_val(b))
        }
        232..=255 => {
            let v = 8 + 10 * (index - 232);
            (v, v, v)
        }
    }
}
