use std::path::{Path, PathBuf};

use regex::Regex;

use super::hotspot::{HotSpot, HotSpotType, Payload};
use super::{for_each_match, Filter, FilterContext};

/// Finds file paths: quoted or bare, optionally suffixed with `:line`,
/// `:line:col`, or `(line)`. Bare candidates are cheap to match, so each
/// one is verified against the filesystem before it becomes a hotspot:
/// absolute paths directly, relative ones against a listing of the
/// session's working directory.
pub struct FileFilter {
    regex: Regex,
    cwd: Option<PathBuf>,
    listed_dir: Option<PathBuf>,
    dir_entries: Vec<String>,
}

impl FileFilter {
    /// `word_characters` are the extra characters the host treats as part
    /// of words (and therefore of file names).
    pub fn new(word_characters: &str) -> Self {
        Self {
            regex: Regex::new(&build_pattern(word_characters)).expect("file pattern"),
            cwd: None,
            listed_dir: None,
            dir_entries: Vec::new(),
        }
    }

    /// Update the session working directory (the collaborator reports it,
    /// typically from OSC 7).
    pub fn set_directory(&mut self, cwd: impl Into<PathBuf>) {
        self.cwd = Some(cwd.into());
    }

    fn refresh_dir_listing(&mut self) {
        if self.listed_dir == self.cwd {
            return;
        }
        self.listed_dir = self.cwd.clone();
        self.dir_entries.clear();
        let Some(dir) = &self.cwd else {
            return;
        };
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                if let Ok(name) = entry.file_name().into_string() {
                    self.dir_entries.push(name);
                }
            }
        }
    }

    fn resolve(&self, candidate: &str) -> Option<(PathBuf, Option<u32>, Option<u32>)> {
        let mut text = candidate;
        if (text.starts_with('\'') && text.ends_with('\'') && text.len() >= 2)
            || (text.starts_with('"') && text.ends_with('"') && text.len() >= 2)
        {
            text = &text[1..text.len() - 1];
        }
        // ctest error output: [/path/to/file(123)]
        if text.starts_with("[/") && text.ends_with(']') {
            text = &text[1..text.len() - 1];
        }

        let (path_part, line, column) = split_position_suffix(text);
        if path_part.is_empty() {
            return None;
        }
        // '.' and '..' can be real targets, '...' and longer never are.
        if path_part.len() >= 3 && path_part.chars().all(|c| c == '.') {
            return None;
        }

        if path_part.starts_with('/') {
            let path = Path::new(path_part);
            if path.exists() {
                return Some((path.to_path_buf(), line, column));
            }
            return None;
        }

        let cwd = self.cwd.as_ref()?;
        let matched = self.dir_entries.iter().any(|entry| {
            path_part == entry
                || (path_part.starts_with(entry.as_str())
                    && matches!(path_part.as_bytes().get(entry.len()), Some(b'/') | Some(b':')))
        });
        if matched {
            Some((cwd.join(path_part), line, column))
        } else {
            None
        }
    }
}

/// Strip a trailing `:line`, `:line:col`, `:line:col:`, or `(line)`.
fn split_position_suffix(text: &str) -> (&str, Option<u32>, Option<u32>) {
    if let Some(open) = text.rfind('(') {
        if let Some(inner) = text[open + 1..].strip_suffix(')') {
            if let Ok(line) = inner.parse::<u32>() {
                return (&text[..open], Some(line), None);
            }
        }
    }

    let trimmed = text.strip_suffix(':').unwrap_or(text);
    let mut parts = trimmed.rsplitn(3, ':');
    let last = parts.next().unwrap_or("");
    let middle = parts.next();
    let head = parts.next();

    if let (Some(head), Some(middle), Ok(column)) =
        (head, middle, last.parse::<u32>())
    {
        if let Ok(line) = middle.parse::<u32>() {
            return (head, Some(line), Some(column));
        }
    }
    if let (Some(_), Ok(line)) = (middle, last.parse::<u32>()) {
        let path = &trimmed[..trimmed.rfind(':').unwrap_or(0)];
        return (path, Some(line), None);
    }
    (trimmed, None, None)
}

fn build_pattern(word_characters: &str) -> String {
    // The extra word characters land inside a character class; escape the
    // few bytes that are magic there and keep '-' at the end.
    let mut class_extra = String::new();
    let mut has_dash = false;
    for c in word_characters.chars() {
        match c {
            '-' => has_dash = true,
            '\\' | ']' | '^' => {
                class_extra.push('\\');
                class_extra.push(c);
            }
            _ => class_extra.push(c),
        }
    }
    if has_dash {
        class_extra.push('-');
    }

    format!(
        concat!(
            // Everything between single or double quotes.
            r#"'[^'\n]+'"#,
            r#"|"[^\n"]+""#,
            // A run of word characters, optionally rooted, with optional
            // :line or :line:col suffixes (grep and compiler output).
            r"|(?:[^\n\s/\[]/)?[\p{{L}}\w{class_extra}]+(?::\d+)?(?::\d+:?)?",
            // ctest output: [/path/to/file(123)]
            r"|\[[/\w{class_extra}]+\(\d+\)\]",
        ),
        class_extra = class_extra
    )
}

impl Filter for FileFilter {
    fn process(&mut self, context: &FilterContext) -> Vec<HotSpot> {
        self.refresh_dir_listing();
        let regex = self.regex.clone(); // cheap: Regex is internally shared
        for_each_match(&regex, context, |start, end, text| {
            let (path, line, column) = self.resolve(text)?;
            Some(HotSpot::new(
                start,
                end,
                HotSpotType::File,
                text.to_string(),
                Payload::File { path, line, column },
            ))
        })
    }
}
