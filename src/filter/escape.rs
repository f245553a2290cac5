use super::hotspot::{HotSpot, HotSpotType, Payload};
use super::{Filter, FilterContext};

/// Turns the screen's recorded OSC 8 hyperlink spans into hotspots. The
/// spans arrive in the context already clipped to the window and in
/// view-relative coordinates, so no text scanning happens here.
#[derive(Debug, Default)]
pub struct EscapeSequenceUrlFilter;

impl EscapeSequenceUrlFilter {
    pub fn new() -> Self {
        Self
    }
}

impl Filter for EscapeSequenceUrlFilter {
    fn process(&mut self, context: &FilterContext) -> Vec<HotSpot> {
        context
            .hyperlinks
            .iter()
            .map(|span| {
                HotSpot::new(
                    span.begin,
                    // Recorded ends are inclusive; hotspots point one past.
                    (span.end.0, span.end.1 + 1),
                    HotSpotType::EscapedUrl,
                    span.text.clone(),
                    Payload::EscapedUrl(span.url.clone()),
                )
            })
            .collect()
    }
}
