pub mod cell;
pub mod color;
pub mod extended;

pub use cell::{char_width, string_width, Character, LineProperty, Rendition};
pub use color::{indexed_to_rgb, ColorEntry, ColorTable, Intensity};
pub use extended::ExtendedCharTable;
