use std::path::PathBuf;

use thiserror::Error;

use crate::history::HistoryMode;

/// Construction-time configuration. The host builds one of these and hands
/// it to [`Emulation::new`](crate::emulation::Emulation::new); there is no
/// file, CLI, or environment surface in the core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub history_mode: HistoryMode,
    /// Directory for the unbounded backend's temp files; `None` means the
    /// system temp directory.
    pub scrollback_dir: Option<PathBuf>,
    /// Initial UTF-8 mode. When off, input bytes are Latin-1 / the active
    /// character set.
    pub utf8: bool,
    pub mouse_tracking_initial: bool,
    /// Whether the renderer applies BiDi. Only affects selection semantics;
    /// the core always stores logical order.
    pub bidi_enabled: bool,
    /// Extra characters treated as word-constituent by double-click
    /// selection and the file filter.
    pub word_characters: String,
    /// Disable to force truncate/pad on all resizes, alternate-screen style.
    pub reflow_on_resize: bool,
    /// URL schemes honored by the OSC 8 extractor; anything else aborts the
    /// span at the terminator.
    pub osc8_allowed_schemes: Vec<String>,
    /// Maximum code points per extended-char handle.
    pub extended_char_limit: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            history_mode: HistoryMode::Bounded(1000),
            scrollback_dir: None,
            utf8: true,
            mouse_tracking_initial: false,
            bidi_enabled: false,
            word_characters: ":@-./_~".to_string(),
            reflow_on_resize: true,
            osc8_allowed_schemes: vec![
                "http".to_string(),
                "https".to_string(),
                "file".to_string(),
                "mailto".to_string(),
            ],
            extended_char_limit: 8,
        }
    }
}

impl CoreConfig {
    /// Reject configurations the core cannot operate under. Anything that
    /// passes here will not fail later for configuration reasons.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.history_mode, HistoryMode::Bounded(0)) {
            return Err(ConfigError::EmptyBoundedHistory);
        }
        if self.extended_char_limit < 2 {
            return Err(ConfigError::ExtendedCharLimit(self.extended_char_limit));
        }
        if let Some(dir) = &self.scrollback_dir {
            if !dir.is_dir() {
                return Err(ConfigError::ScrollbackDir(dir.clone()));
            }
        }
        for scheme in &self.osc8_allowed_schemes {
            let valid = !scheme.is_empty()
                && scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
            if !valid {
                return Err(ConfigError::InvalidScheme(scheme.clone()));
            }
        }
        Ok(())
    }
}

/// Why construction was refused. The host decides how to present these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("bounded history requires at least one line")]
    EmptyBoundedHistory,
    #[error("extended character limit {0} is below the minimum of 2")]
    ExtendedCharLimit(usize),
    #[error("scrollback directory {0:?} does not exist or is not a directory")]
    ScrollbackDir(PathBuf),
    #[error("{0:?} is not a valid URL scheme")]
    InvalidScheme(String),
    #[error("failed to create scrollback files")]
    Scrollback(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(CoreConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_line_bounded_history_is_rejected() {
        let config = CoreConfig {
            history_mode: HistoryMode::Bounded(0),
            ..CoreConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyBoundedHistory)
        ));
    }

    #[test]
    fn missing_scrollback_dir_is_rejected() {
        let config = CoreConfig {
            scrollback_dir: Some(PathBuf::from("/no/such/dir/anywhere")),
            ..CoreConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ScrollbackDir(_))
        ));
    }

    #[test]
    fn malformed_schemes_are_rejected() {
        let config = CoreConfig {
            osc8_allowed_schemes: vec!["ht tp".to_string()],
            ..CoreConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidScheme(_))));
    }
}
