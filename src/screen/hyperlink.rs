use crate::event::Diagnostic;

/// A hyperlink span recorded from OSC 8 sequences: the URI, the visible
/// text it annotated, and the cell range it covers. Rows are absolute
/// (history plus screen).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedUrl {
    pub url: String,
    pub text: String,
    pub begin: (usize, usize),
    pub end: (usize, usize),
}

/// Maximum cells a single span may annotate. Past this the span is
/// discarded wholesale; adversarial input must not grow the history file.
const MAX_SPAN_CELLS: usize = 2048;

/// Collects OSC 8 hyperlink spans as the emulation prints their visible
/// text. Stored per screen; the alternate screen gets its own instance.
#[derive(Debug, Default)]
pub struct UrlExtractor {
    reading: bool,
    current: Option<ExtractedUrl>,
    history: Vec<ExtractedUrl>,
    allowed_schemes: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl UrlExtractor {
    pub fn new(allowed_schemes: Vec<String>) -> Self {
        Self {
            allowed_schemes,
            ..Self::default()
        }
    }

    pub fn reading(&self) -> bool {
        self.reading
    }

    /// An opening `OSC 8 ; params ; uri` arrived. Unknown schemes are
    /// rejected here so their spans never buffer anything.
    pub fn begin(&mut self, url: &str) {
        let allowed = url
            .split_once(':')
            .is_some_and(|(scheme, _)| self.allowed_schemes.iter().any(|s| s == scheme));
        if !allowed {
            tracing::trace!("OSC 8 scheme rejected: {url}");
            self.reading = false;
            self.current = None;
            return;
        }
        self.reading = true;
        self.current = Some(ExtractedUrl {
            url: url.to_string(),
            text: String::new(),
            begin: (0, 0),
            end: (0, 0),
        });
    }

    /// A printable character landed at `(row, col)` while a span is open.
    pub fn append_char(&mut self, c: char, row: usize, col: usize) {
        if !self.reading {
            return;
        }
        let Some(current) = self.current.as_mut() else {
            return;
        };
        if current.text.is_empty() {
            current.begin = (row, col);
        }
        current.text.push(c);
        current.end = (row, col);
        if current.text.chars().count() > MAX_SPAN_CELLS {
            tracing::trace!("OSC 8 span over {MAX_SPAN_CELLS} cells discarded");
            self.diagnostics.push(Diagnostic::HyperlinkSpanOverflow);
            self.reading = false;
            self.current = None;
        }
    }

    /// The closing `OSC 8 ; ;` arrived.
    pub fn end(&mut self) {
        self.reading = false;
        if let Some(current) = self.current.take() {
            if !current.text.is_empty() {
                self.history.push(current);
            }
        }
    }

    pub fn spans(&self) -> &[ExtractedUrl] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.reading = false;
        self.current = None;
        self.history.clear();
    }

    /// `lines` lines fell off the top of the history; shift the recorded
    /// coordinates down and drop spans that are now out of range.
    pub fn history_lines_removed(&mut self, lines: usize) {
        for span in &mut self.history {
            span.begin.0 = span.begin.0.wrapping_sub(lines);
            span.end.0 = span.end.0.wrapping_sub(lines);
        }
        self.history
            .retain(|span| span.begin.0 <= span.end.0 && span.end.0 < usize::MAX / 2);
    }

    /// Remap span coordinates after a reflow. `f` returns the new position
    /// of an old absolute coordinate, or `None` when it no longer exists.
    pub fn remap<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, usize) -> Option<(usize, usize)>,
    {
        self.history.retain_mut(|span| {
            match (f(span.begin.0, span.begin.1), f(span.end.0, span.end.1)) {
                (Some(begin), Some(end)) => {
                    span.begin = begin;
                    span.end = end;
                    true
                }
                _ => false,
            }
        });
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> UrlExtractor {
        UrlExtractor::new(vec!["https".to_string(), "file".to_string()])
    }

    #[test]
    fn span_records_url_text_and_range() {
        let mut x = extractor();
        x.begin("https://example.com");
        for (i, c) in "link".chars().enumerate() {
            x.append_char(c, 0, i);
        }
        x.end();
        assert_eq!(x.spans().len(), 1);
        let span = &x.spans()[0];
        assert_eq!(span.url, "https://example.com");
        assert_eq!(span.text, "link");
        assert_eq!(span.begin, (0, 0));
        assert_eq!(span.end, (0, 3));
    }

    #[test]
    fn unknown_scheme_is_rejected_at_open() {
        let mut x = extractor();
        x.begin("gopher://old.example");
        assert!(!x.reading());
        x.append_char('a', 0, 0);
        x.end();
        assert!(x.spans().is_empty());
    }

    #[test]
    fn oversized_span_is_discarded_with_diagnostic() {
        let mut x = extractor();
        x.begin("https://example.com");
        for i in 0..3000 {
            x.append_char('a', i / 80, i % 80);
        }
        x.end();
        assert!(x.spans().is_empty());
        assert_eq!(
            x.take_diagnostics(),
            vec![Diagnostic::HyperlinkSpanOverflow]
        );
    }

    #[test]
    fn pruning_shifts_rows_and_drops_scrolled_out_spans() {
        let mut x = extractor();
        x.begin("https://a.test");
        x.append_char('a', 1, 0);
        x.end();
        x.begin("https://b.test");
        x.append_char('b', 10, 0);
        x.end();

        x.history_lines_removed(5);
        assert_eq!(x.spans().len(), 1, "span above the cut is gone");
        assert_eq!(x.spans()[0].begin.0, 5);
    }

    #[test]
    fn empty_span_records_nothing() {
        let mut x = extractor();
        x.begin("https://example.com");
        x.end();
        assert!(x.spans().is_empty());
    }
}
