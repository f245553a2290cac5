use regex::Regex;

use super::hotspot::{HotSpot, HotSpotType, Payload};
use super::{for_each_match, Filter, FilterContext};

/// Finds color literals: `#RRGGBB`, `#RRGGBBAA`, and 12-hex-digit
/// `#RRRRGGGGBBBB` forms. Activation shows a swatch for the RGB value.
pub struct ColorFilter {
    regex: Regex,
}

impl ColorFilter {
    pub fn new() -> Self {
        Self {
            regex: Regex::new(r"#(?:[[:xdigit:]]{12}|[[:xdigit:]]{8}|[[:xdigit:]]{6})\b")
                .expect("static color pattern"),
        }
    }
}

impl Default for ColorFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_hex(text: &str) -> Option<(u8, u8, u8)> {
    let digits = text.strip_prefix('#')?;
    let channel_width = match digits.len() {
        6 | 8 => 2,
        12 => 4,
        _ => return None,
    };
    let mut channels = (0..3).map(|i| {
        let chunk = &digits[i * channel_width..(i + 1) * channel_width];
        // Wide channels keep their most significant byte.
        u8::from_str_radix(&chunk[..2], 16)
    });
    let r = channels.next()?.ok()?;
    let g = channels.next()?.ok()?;
    let b = channels.next()?.ok()?;
    Some((r, g, b))
}

impl Filter for ColorFilter {
    fn process(&mut self, context: &FilterContext) -> Vec<HotSpot> {
        for_each_match(&self.regex, context, |start, end, text| {
            let (r, g, b) = parse_hex(text)?;
            Some(HotSpot::new(
                start,
                end,
                HotSpotType::Color,
                text.to_string(),
                Payload::Color(r, g, b),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Activation, HotSpotAction};

    fn spots(text: &str) -> Vec<HotSpot> {
        let positions = vec![0];
        let context = FilterContext {
            buffer: text,
            line_positions: &positions,
            hyperlinks: &[],
        };
        ColorFilter::new().process(&context)
    }

    #[test]
    fn six_digit_colors_match() {
        let spots = spots("border: #ff8000;");
        assert_eq!(spots.len(), 1);
        assert_eq!(
            spots[0].activate(HotSpotAction::Primary),
            Some(Activation::ShowColorSwatch(0xff, 0x80, 0x00))
        );
    }

    #[test]
    fn eight_and_twelve_digit_forms_reduce_to_rgb() {
        let spots8 = spots("#11223344 ");
        assert_eq!(
            spots8[0].activate(HotSpotAction::Primary),
            Some(Activation::ShowColorSwatch(0x11, 0x22, 0x33))
        );
        let spots12 = spots("#aaaabbbbcccc ");
        assert_eq!(
            spots12[0].activate(HotSpotAction::Primary),
            Some(Activation::ShowColorSwatch(0xaa, 0xbb, 0xcc))
        );
    }

    #[test]
    fn partial_hex_runs_do_not_match() {
        assert!(spots("#ff00zz").is_empty());
        assert!(spots("#ff00").is_empty());
    }
}
