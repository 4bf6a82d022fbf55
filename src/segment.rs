use std::sync::OnceLock;

use regex::Regex;

/// A subtitle cue: the frame it starts at and the text shown from there until the
/// next segment starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub start: usize,
    text: String,
}

impl Segment {
    pub fn new(start: usize) -> Self {
        Segment {
            start,
            text: String::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = normalize_text(text);
    }

    pub(crate) fn take_text(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

fn blank_lines() -> &'static Regex {
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();
    BLANK_LINES
        .get_or_init(|| Regex::new(r"\r?\n(?:\r?\n)+").expect("blank line pattern is valid"))
}

/// Removes empty lines. A blank line ends a cue in the subtitle file, so cue text can
/// never carry one; runs of line breaks collapse into one and leading or trailing
/// breaks are dropped.
pub fn normalize_text(text: &str) -> String {
    let collapsed = blank_lines().replace_all(text, "\n");
    collapsed.trim_matches(|c| c == '\n' || c == '\r').to_string()
}
