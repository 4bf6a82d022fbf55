use crate::timecode::Timestamp;

/// One entry of a subtitle file as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub sequence_number: u64,
    pub show_at: Timestamp,
    pub hide_at: Timestamp,
    pub text: String,
    /// Line holding the time range, for error reporting.
    pub line: usize,
}
