use thiserror::Error;

/// Fatal problems in a subtitle file. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("there should be a sequence number on line {line}")]
    MissingSequenceNumber { line: usize },
    #[error("bad sequence number on line {line}, expected: {expected}, found: {found}")]
    BadSequenceNumber {
        line: usize,
        expected: u64,
        found: u64,
    },
    #[error("invalid timecode on line {line}")]
    MalformedTimestamp { line: usize },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match *self {
            ParseError::MissingSequenceNumber { line }
            | ParseError::BadSequenceNumber { line, .. }
            | ParseError::MalformedTimestamp { line } => line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("audio has no frames")]
    NoFrames,
    #[error("audio has no channels")]
    NoChannels,
    #[error("audio has a sample rate of zero")]
    NoSampleRate,
    #[error("{samples} samples do not divide into frames of {channels} channels")]
    PartialFrame { samples: usize, channels: u16 },
    #[error("unsupported sample format: {bits} bit {format}")]
    UnsupportedFormat { bits: u16, format: &'static str },
}
