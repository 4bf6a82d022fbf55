//! Segment-indexed sample buffer for marking subtitle boundaries on audio.
//!
//! A [`PlaybackCursor`] partitions decoded audio into subtitle segments and tracks a
//! playback position against that partition. [`Session`] wraps it for an editor:
//! navigation, boundary edits, SRT load and save, and a [`PlaybackEngine`] that an audio
//! output callback renders through.

pub mod audio;
pub mod cursor;
pub mod error;
pub mod parser;
pub mod playback;
pub mod segment;
pub mod serialiser;
pub mod session;
pub mod srt;
pub mod timecode;
pub mod timeline;

pub use audio::SampleBuffer;
pub use cursor::PlaybackCursor;
pub use error::{BufferError, ParseError};
pub use playback::{PlaybackEngine, PlaybackEvent, SharedCursor};
pub use segment::Segment;
pub use session::{CueInfo, Session, SessionOptions, Snapshot};
pub use srt::Cue;
pub use timecode::{MalformedTimestamp, Precision, Timestamp};
pub use timeline::SegmentTimeline;
