use regex::Regex;

use super::hotspot::{HotSpot, HotSpotType, Payload};
use super::{for_each_match, Filter, FilterContext};

// Altering these patterns has a major effect on filter performance,
// especially on windows full of dense text. The match must end before
// whitespace, quotes, brackets, and trailing punctuation.
const FULL_URL: &str = r#"(?:[a-z][a-z0-9+.-]*://|www\.[^\s<>'".])[^\s<>'"]*[^!,.\s<>'"\]):]"#;
const EMAIL: &str = r#"\b[\w.+-]+@[\w.-]+\.\w+\b"#;

/// Finds URLs (`scheme://…`, `www.…`) and email addresses.
pub struct UrlFilter {
    combined: Regex,
    full_url: Regex,
}

impl UrlFilter {
    pub fn new() -> Self {
        Self {
            combined: Regex::new(&format!("(?:{FULL_URL}|{EMAIL})")).expect("static url pattern"),
            full_url: Regex::new(FULL_URL).expect("static url pattern"),
        }
    }
}

impl Default for UrlFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for UrlFilter {
    fn process(&mut self, context: &FilterContext) -> Vec<HotSpot> {
        for_each_match(&self.combined, context, |start, end, text| {
            if self.full_url.is_match(text) {
                // Bare www. hosts get a scheme so activation can open them.
                let url = if text.starts_with("www.") {
                    format!("http://{text}")
                } else {
                    text.to_string()
                };
                Some(HotSpot::new(
                    start,
                    end,
                    HotSpotType::Link,
                    text.to_string(),
                    Payload::Url(url),
                ))
            } else {
                Some(HotSpot::new(
                    start,
                    end,
                    HotSpotType::EmailAddress,
                    text.to_string(),
                    Payload::Email(text.to_string()),
                ))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(text: &str) -> Vec<(HotSpotType, String)> {
        let positions = vec![0];
        let context = FilterContext {
            buffer: text,
            line_positions: &positions,
            hyperlinks: &[],
        };
        UrlFilter::new()
            .process(&context)
            .into_iter()
            .map(|s| (s.kind(), s.text().to_string()))
            .collect()
    }

    #[test]
    fn schemes_and_www_hosts_are_links() {
        assert_eq!(
            matches("go to https://example.com/a?b=c now"),
            vec![(HotSpotType::Link, "https://example.com/a?b=c".into())]
        );
        assert_eq!(
            matches("see www.example.com."),
            vec![(HotSpotType::Link, "www.example.com".into())]
        );
    }

    #[test]
    fn emails_are_classified_separately() {
        assert_eq!(
            matches("mail me@host.example please"),
            vec![(HotSpotType::EmailAddress, "me@host.example".into())]
        );
    }

    #[test]
    fn trailing_punctuation_is_excluded() {
        assert_eq!(
            matches("(https://example.com/x)"),
            vec![(HotSpotType::Link, "https://example.com/x".into())]
        );
    }

    #[test]
    fn www_activation_gains_a_scheme() {
        let positions = vec![0];
        let context = FilterContext {
            buffer: "www.example.com ",
            line_positions: &positions,
            hyperlinks: &[],
        };
        let spots = UrlFilter::new().process(&context);
        let activation = spots[0].activate(super::super::HotSpotAction::Primary);
        assert_eq!(
            activation,
            Some(super::super::Activation::OpenUrl(
                "http://www.example.com".into()
            ))
        );
    }
}
