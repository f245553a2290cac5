//! The filter chain: a post-pass over the visible image that finds URLs,
//! file paths, colors, OSC 8 hyperlinks, and user-supplied patterns, and
//! turns them into activatable hotspots.

pub mod color;
pub mod escape;
pub mod file;
pub mod hotspot;
pub mod url;

use regex::Regex;

use crate::character::string_width;
use crate::decoder::{PlainTextDecoder, TerminalCharacterDecoder};
use crate::screen::{ExtractedUrl, Screen, ScreenWindow};

pub use color::ColorFilter;
pub use escape::EscapeSequenceUrlFilter;
pub use file::FileFilter;
pub use hotspot::{Activation, HotSpot, HotSpotAction, HotSpotType};
pub use url::UrlFilter;

/// Everything a filter may look at during one pass: the visible image as
/// text, the byte offset at which each row starts, and the OSC 8 spans
/// intersecting the window (already in view-relative coordinates).
pub struct FilterContext<'a> {
    pub buffer: &'a str,
    pub line_positions: &'a [usize],
    pub hyperlinks: &'a [ExtractedUrl],
}

impl FilterContext<'_> {
    /// Convert a byte offset in `buffer` into a `(line, column)` grid
    /// position. Columns count cells, so wide characters weigh two.
    pub fn line_column(&self, position: usize) -> Option<(usize, usize)> {
        for (line, &start) in self.line_positions.iter().enumerate() {
            let next = self
                .line_positions
                .get(line + 1)
                .copied()
                .unwrap_or(self.buffer.len() + 1);
            if start <= position && position < next {
                let column = string_width(&self.buffer[start..position.min(self.buffer.len())]);
                return Some((line, column));
            }
        }
        None
    }
}

/// A filter scans the serialized image and produces hotspots.
pub trait Filter {
    fn process(&mut self, context: &FilterContext) -> Vec<HotSpot>;
}

/// Run `regex` over the buffer and hand each non-empty match to `make`.
pub(crate) fn for_each_match(
    regex: &Regex,
    context: &FilterContext,
    mut make: impl FnMut((usize, usize), (usize, usize), &str) -> Option<HotSpot>,
) -> Vec<HotSpot> {
    let mut spots = Vec::new();
    for found in regex.find_iter(context.buffer) {
        if found.as_str().is_empty() {
            continue;
        }
        let (Some(start), Some(end)) = (
            context.line_column(found.start()),
            context.line_column(found.end()),
        ) else {
            continue;
        };
        if let Some(spot) = make(start, end, found.as_str()) {
            spots.push(spot);
        }
    }
    spots
}

/// A plain regex filter producing [`HotSpotType::Marker`] hotspots, used
/// for user-supplied patterns (highlight rules, watch expressions).
pub struct RegExpFilter {
    regex: Regex,
}

impl RegExpFilter {
    pub fn new(regex: Regex) -> Self {
        Self { regex }
    }
}

impl Filter for RegExpFilter {
    fn process(&mut self, context: &FilterContext) -> Vec<HotSpot> {
        for_each_match(&self.regex, context, |start, end, text| {
            Some(HotSpot::new(
                start,
                end,
                HotSpotType::Marker,
                text.to_string(),
                hotspot::Payload::None,
            ))
        })
    }
}

/// An ordered list of filters plus the published hotspot list.
///
/// A pass is atomic with respect to queries: hotspots are rebuilt into a
/// staging list and swapped in only when the last filter has run, so a
/// query between chunks still sees the previous pass in full.
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
    hotspots: Vec<HotSpot>,

    buffer: String,
    line_positions: Vec<usize>,
    hyperlinks: Vec<ExtractedUrl>,
    staging: Vec<HotSpot>,
    next_filter: usize,
}

impl FilterChain {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            hotspots: Vec::new(),
            buffer: String::new(),
            line_positions: Vec::new(),
            hyperlinks: Vec::new(),
            staging: Vec::new(),
            next_filter: 0,
        }
    }

    pub fn add_filter(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.hotspots.clear();
    }

    /// Serialize the window's visible image for the next pass. Wrapped
    /// lines are joined without a separator so content split across a soft
    /// wrap (long URLs especially) matches as one string.
    pub fn set_image(&mut self, window: &ScreenWindow, screen: &mut Screen) {
        let mut decoder = PlainTextDecoder::new();
        decoder.set_record_line_positions(true);
        decoder.set_extended_char_table(screen.extended_chars().clone());
        decoder.begin();

        let top = window.current_line();
        let lines = window.window_lines();
        let image = window.get_image(screen);
        let properties = window.get_line_properties(screen);
        let columns = screen.columns();
        for row in 0..lines {
            let cells = &image[row * columns..(row + 1) * columns];
            decoder.decode_line(cells, properties[row]);
        }

        self.line_positions = decoder.line_positions().to_vec();
        self.buffer = decoder.end();

        self.hyperlinks = screen
            .hyperlinks
            .spans()
            .iter()
            .filter(|span| span.end.0 >= top && span.begin.0 < top + lines)
            .map(|span| ExtractedUrl {
                url: span.url.clone(),
                text: span.text.clone(),
                begin: (span.begin.0 - top.min(span.begin.0), span.begin.1),
                end: (span.end.0 - top.min(span.end.0), span.end.1),
            })
            .collect();

        self.staging.clear();
        self.next_filter = 0;
    }

    /// Run one filter of the pending pass. Returns `false` once the pass
    /// is complete and the new hotspot list is published.
    pub fn process_next_chunk(&mut self) -> bool {
        if self.next_filter >= self.filters.len() {
            self.hotspots = std::mem::take(&mut self.staging);
            return false;
        }
        let context = FilterContext {
            buffer: &self.buffer,
            line_positions: &self.line_positions,
            hyperlinks: &self.hyperlinks,
        };
        let spots = self.filters[self.next_filter].process(&context);
        self.staging.extend(spots);
        self.next_filter += 1;
        if self.next_filter >= self.filters.len() {
            self.hotspots = std::mem::take(&mut self.staging);
            return false;
        }
        true
    }

    /// Run the whole pass at once.
    pub fn process(&mut self, window: &ScreenWindow, screen: &mut Screen) {
        self.set_image(window, screen);
        while self.process_next_chunk() {}
    }

    pub fn hotspots(&self) -> &[HotSpot] {
        &self.hotspots
    }

    /// The first hotspot covering `(line, column)`, in insertion order.
    pub fn hotspot_at(&self, line: usize, column: usize) -> Option<&HotSpot> {
        self.hotspots.iter().find(|spot| spot.contains(line, column))
    }

    pub fn count(&self, kind: HotSpotType) -> usize {
        self.hotspots.iter().filter(|s| s.kind() == kind).count()
    }

    pub fn filter_by(&self, kind: HotSpotType) -> Vec<&HotSpot> {
        self.hotspots.iter().filter(|s| s.kind() == kind).collect()
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::ExtendedCharTable;
    use crate::history::{HistoryMode, HistoryScroll};

    fn screen_and_window(text: &str) -> (Screen, ScreenWindow) {
        let mut screen = Screen::new(
            6,
            40,
            HistoryScroll::new(&HistoryMode::Bounded(100), None).unwrap(),
            ExtendedCharTable::new(8),
            vec!["https".to_string()],
            true,
        );
        for c in text.chars() {
            match c {
                '\n' => {
                    screen.carriage_return();
                    screen.index();
                }
                _ => screen.show_character(c),
            }
        }
        let mut window = ScreenWindow::new(6);
        window.notify_output_changed(&screen);
        (screen, window)
    }

    #[test]
    fn url_and_email_are_found_with_grid_ranges() {
        let (mut screen, window) = screen_and_window("see https://a.test/x and mail me@b.test");
        let mut chain = FilterChain::new();
        chain.add_filter(Box::new(UrlFilter::new()));
        chain.process(&window, &mut screen);

        assert_eq!(chain.count(HotSpotType::Link), 1);
        assert_eq!(chain.count(HotSpotType::EmailAddress), 1);

        let link = &chain.filter_by(HotSpotType::Link)[0];
        assert_eq!(link.text(), "https://a.test/x");
        assert_eq!(link.start_line(), 0);
        assert_eq!(link.start_column(), 4);
        assert_eq!(link.end_column(), 20);

        let email = &chain.filter_by(HotSpotType::EmailAddress)[0];
        assert_eq!(email.text(), "me@b.test");
        assert_eq!(email.start_column(), 30);
    }

    #[test]
    fn chunked_processing_publishes_atomically() {
        let (mut screen, window) = screen_and_window("x https://a.test y #ff0000");
        let mut chain = FilterChain::new();
        chain.add_filter(Box::new(UrlFilter::new()));
        chain.add_filter(Box::new(ColorFilter::new()));

        chain.process(&window, &mut screen);
        assert_eq!(chain.hotspots().len(), 2);

        // Start a new pass; until it finishes, queries see the old list.
        chain.set_image(&window, &mut screen);
        assert!(chain.process_next_chunk());
        assert_eq!(chain.hotspots().len(), 2, "old pass still published");
        assert!(!chain.process_next_chunk());
        assert_eq!(chain.hotspots().len(), 2, "new pass now published");
    }

    #[test]
    fn hotspot_lookup_first_covering_wins() {
        let (mut screen, window) = screen_and_window("https://a.test");
        let mut chain = FilterChain::new();
        chain.add_filter(Box::new(UrlFilter::new()));
        chain.add_filter(Box::new(RegExpFilter::new(Regex::new("a.test").unwrap())));
        chain.process(&window, &mut screen);

        assert_eq!(chain.hotspots().len(), 2);
        let spot = chain.hotspot_at(0, 9).unwrap();
        assert_eq!(spot.kind(), HotSpotType::Link, "insertion order wins");
        assert!(chain.hotspot_at(3, 0).is_none());
    }

    #[test]
    fn url_split_across_wrap_matches_whole() {
        let mut screen = Screen::new(
            4,
            10,
            HistoryScroll::new(&HistoryMode::Bounded(100), None).unwrap(),
            ExtendedCharTable::new(8),
            vec![],
            true,
        );
        for c in "https://ab.test/pq".chars() {
            screen.show_character(c);
        }
        let mut window = ScreenWindow::new(4);
        window.notify_output_changed(&screen);

        let mut chain = FilterChain::new();
        chain.add_filter(Box::new(UrlFilter::new()));
        chain.process(&window, &mut screen);

        let links = chain.filter_by(HotSpotType::Link);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].text(), "https://ab.test/pq");
        assert_eq!(links[0].start_line(), 0);
        assert_eq!(links[0].end_line(), 1, "match spans the soft wrap");
    }

    #[test]
    fn marker_filter_reports_user_pattern() {
        let (mut screen, window) = screen_and_window("error: testcase failed");
        let mut chain = FilterChain::new();
        chain.add_filter(Box::new(RegExpFilter::new(Regex::new("error:").unwrap())));
        chain.process(&window, &mut screen);
        let spots = chain.hotspots();
        assert_eq!(spots.len(), 1);
        assert_eq!(spots[0].kind(), HotSpotType::Marker);
        assert_eq!(spots[0].text(), "error:");
    }

    #[test]
    fn wide_characters_shift_grid_columns() {
        let (mut screen, window) = screen_and_window("漢漢 https://a.test");
        let mut chain = FilterChain::new();
        chain.add_filter(Box::new(UrlFilter::new()));
        chain.process(&window, &mut screen);
        let links = chain.filter_by(HotSpotType::Link);
        assert_eq!(links.len(), 1);
        assert_eq!(
            links[0].start_column(),
            5,
            "two wide chars occupy four cells"
        );
    }
}
