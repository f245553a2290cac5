use std::path::PathBuf;

/// What kind of region a hotspot marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotSpotType {
    Link,
    EmailAddress,
    File,
    /// A hyperlink delivered via OSC 8 rather than found by regex.
    EscapedUrl,
    Color,
    /// A user-supplied regular expression matched here.
    Marker,
    NotSpecified,
}

/// Which of a hotspot's actions the user triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotSpotAction {
    /// Click / Enter: open the URL, open the file in the editor.
    Primary,
    /// Context action: reveal a file in the file manager.
    Secondary,
    /// Copy the underlying text to the clipboard.
    Copy,
}

/// A request the host executes on the user's behalf. The core never opens
/// URLs, files, or the clipboard itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    OpenUrl(String),
    CopyToClipboard(String),
    OpenFile {
        path: PathBuf,
        line: Option<u32>,
        column: Option<u32>,
    },
    RevealInFileManager(PathBuf),
    ShowColorSwatch(u8, u8, u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Payload {
    Url(String),
    Email(String),
    File {
        path: PathBuf,
        line: Option<u32>,
        column: Option<u32>,
    },
    EscapedUrl(String),
    Color(u8, u8, u8),
    None,
}

/// A clickable region of the visible image, in view-relative coordinates.
/// `start ≤ end` in reading order; `end` points one past the last cell of
/// the match on its line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotSpot {
    start: (usize, usize),
    end: (usize, usize),
    kind: HotSpotType,
    text: String,
    payload: Payload,
}

impl HotSpot {
    pub(crate) fn new(
        start: (usize, usize),
        end: (usize, usize),
        kind: HotSpotType,
        text: String,
        payload: Payload,
    ) -> Self {
        Self {
            start,
            end,
            kind,
            text,
            payload,
        }
    }

    pub fn start_line(&self) -> usize {
        self.start.0
    }

    pub fn start_column(&self) -> usize {
        self.start.1
    }

    pub fn end_line(&self) -> usize {
        self.end.0
    }

    pub fn end_column(&self) -> usize {
        self.end.1
    }

    pub fn kind(&self) -> HotSpotType {
        self.kind
    }

    /// The matched text as it appeared on screen.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether this hotspot covers the cell at `(line, column)`.
    pub fn contains(&self, line: usize, column: usize) -> bool {
        if line < self.start.0 || line > self.end.0 {
            return false;
        }
        if line == self.start.0 && column < self.start.1 {
            return false;
        }
        if line == self.end.0 && column > self.end.1 {
            return false;
        }
        true
    }

    /// Resolve an action into the request the host should perform.
    pub fn activate(&self, action: HotSpotAction) -> Option<Activation> {
        match (&self.payload, action) {
            (Payload::Url(url), HotSpotAction::Primary) => Some(Activation::OpenUrl(url.clone())),
            (Payload::Url(url), HotSpotAction::Copy) => {
                Some(Activation::CopyToClipboard(url.clone()))
            }
            (Payload::Email(address), HotSpotAction::Primary) => {
                Some(Activation::OpenUrl(format!("mailto:{address}")))
            }
            (Payload::Email(address), HotSpotAction::Copy) => {
                Some(Activation::CopyToClipboard(address.clone()))
            }
            (Payload::EscapedUrl(url), HotSpotAction::Primary) => {
                Some(Activation::OpenUrl(url.clone()))
            }
            (Payload::EscapedUrl(url), HotSpotAction::Copy) => {
                Some(Activation::CopyToClipboard(url.clone()))
            }
            (Payload::File { path, line, column }, HotSpotAction::Primary) => {
                Some(Activation::OpenFile {
                    path: path.clone(),
                    line: *line,
                    column: *column,
                })
            }
            (Payload::File { path, .. }, HotSpotAction::Secondary) => {
                Some(Activation::RevealInFileManager(path.clone()))
            }
            (Payload::File { path, .. }, HotSpotAction::Copy) => Some(
                Activation::CopyToClipboard(path.to_string_lossy().into_owned()),
            ),
            (Payload::Color(r, g, b), HotSpotAction::Primary) => {
                Some(Activation::ShowColorSwatch(*r, *g, *b))
            }
            (Payload::Color(..), HotSpotAction::Copy) | (Payload::None, HotSpotAction::Copy) => {
                Some(Activation::CopyToClipboard(self.text.clone()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url_spot() -> HotSpot {
        HotSpot::new(
            (1, 4),
            (1, 22),
            HotSpotType::Link,
            "https://example.com".into(),
            Payload::Url("https://example.com".into()),
        )
    }

    #[test]
    fn containment_respects_start_and_end_columns() {
        let spot = url_spot();
        assert!(spot.contains(1, 4));
        assert!(spot.contains(1, 22));
        assert!(!spot.contains(1, 3));
        assert!(!spot.contains(1, 23));
        assert!(!spot.contains(0, 10));
    }

    #[test]
    fn multi_line_spot_covers_interior_lines_fully() {
        let spot = HotSpot::new(
            (0, 70),
            (2, 5),
            HotSpotType::Link,
            "…".into(),
            Payload::None,
        );
        assert!(spot.contains(0, 79));
        assert!(!spot.contains(0, 69));
        assert!(spot.contains(1, 0));
        assert!(spot.contains(1, 79));
        assert!(spot.contains(2, 5));
        assert!(!spot.contains(2, 6));
    }

    #[test]
    fn activation_maps_to_host_requests() {
        let spot = url_spot();
        assert_eq!(
            spot.activate(HotSpotAction::Primary),
            Some(Activation::OpenUrl("https://example.com".into()))
        );
        assert_eq!(
            spot.activate(HotSpotAction::Copy),
            Some(Activation::CopyToClipboard("https://example.com".into()))
        );
        assert_eq!(spot.activate(HotSpotAction::Secondary), None);
    }
}
