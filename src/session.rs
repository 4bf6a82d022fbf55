use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::audio::SampleBuffer;
use crate::cursor::PlaybackCursor;
use crate::parser;
use crate::playback::{lock, PlaybackEngine, PlaybackEvent, SharedCursor};
use crate::serialiser;
use crate::timecode::Precision;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    /// Timestamp precision used when saving.
    pub precision: Precision,
    /// Step for relative navigation, in seconds.
    pub skip_seconds: f64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            precision: Precision::Millisecond,
            skip_seconds: 1.0,
        }
    }
}

/// A real segment as presented to a viewer: its frame range and text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueInfo {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Everything a view needs to draw the cursor and the segment around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub position: usize,
    pub current: CueInfo,
    pub segments: usize,
    pub playing: bool,
}

/// One audio file and its subtitles, open for editing.
///
/// Every method takes the cursor lock for the duration of the call only, so an audio
/// callback rendering through [`Session::engine`] waits at most one edit.
pub struct Session {
    srt_path: PathBuf,
    options: SessionOptions,
    cursor: SharedCursor,
    engine: PlaybackEngine,
    events: Receiver<PlaybackEvent>,
}

impl Session {
    /// Opens `buffer` with the subtitles stored at `srt_path`. A missing subtitle file
    /// starts an empty timeline; a malformed one is an error.
    pub fn open<P: Into<PathBuf>>(
        buffer: SampleBuffer,
        srt_path: P,
        options: SessionOptions,
    ) -> Result<Self> {
        let srt_path = srt_path.into();
        let cursor = load(&srt_path, buffer)?;
        let cursor = Arc::new(Mutex::new(cursor));
        let (engine, events) = PlaybackEngine::new(cursor.clone());
        Ok(Session {
            srt_path,
            options,
            cursor,
            engine,
            events,
        })
    }

    /// Conventional subtitle location for an audio file: `<audio-path>.srt`.
    pub fn default_srt_path<P: AsRef<Path>>(audio_path: P) -> PathBuf {
        let mut path = audio_path.as_ref().as_os_str().to_owned();
        path.push(".srt");
        PathBuf::from(path)
    }

    pub fn srt_path(&self) -> &Path {
        &self.srt_path
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    /// Notifications the audio callback queued since the last call.
    pub fn drain_events(&self) -> Vec<PlaybackEvent> {
        self.events.try_iter().collect()
    }

    fn with_cursor<R>(&self, what: &str, f: impl FnOnce(&mut PlaybackCursor) -> R) -> R {
        let mut cursor = lock(&self.cursor);
        let result = f(&mut cursor);
        cursor.log_state(what);
        result
    }

    pub fn seek(&self, position: usize) {
        self.with_cursor("seek", |c| c.seek(position));
    }

    pub fn seek_seconds(&self, seconds: f64) {
        self.with_cursor("seek", |c| {
            let frame = seconds.max(0.0) * f64::from(c.buffer().sample_rate());
            c.seek(frame as usize);
        });
    }

    pub fn skip_segments(&self, count: i64) {
        self.with_cursor("skip segments", |c| c.skip_segments(count));
    }

    /// Steps by the configured amount, `steps` times (negative steps go back).
    pub fn skip_steps(&self, steps: i32) {
        let seconds = self.options.skip_seconds * f64::from(steps);
        self.skip_seconds(seconds);
    }

    pub fn skip_seconds(&self, seconds: f64) {
        self.with_cursor("skip seconds", |c| c.skip_seconds(seconds));
    }

    pub fn jump_to_segment_start(&self) {
        self.with_cursor("jump to segment start", |c| c.jump_to_segment_start());
    }

    /// Starts a new segment at the cursor.
    pub fn mark(&self) -> bool {
        self.with_cursor("mark", |c| c.add_segment())
    }

    /// Merges the current segment into the previous one.
    pub fn join(&self) -> bool {
        self.with_cursor("join", |c| c.join_segment())
    }

    pub fn set_text(&self, text: &str) {
        self.with_cursor("set text", |c| c.set_current_text(text));
    }

    pub fn set_segment_text(&self, index: usize, text: &str) -> bool {
        self.with_cursor("set text", |c| c.set_segment_text(index, text))
    }

    pub fn snapshot(&self) -> Snapshot {
        let cursor = lock(&self.cursor);
        let (start, end) = cursor.current_range();
        Snapshot {
            position: cursor.position(),
            current: CueInfo {
                index: cursor.current_index(),
                start,
                end,
                text: cursor.current_segment().text().to_string(),
            },
            segments: cursor.timeline().len(),
            playing: self.engine.is_playing(),
        }
    }

    pub fn cues(&self) -> Vec<CueInfo> {
        let cursor = lock(&self.cursor);
        let timeline = cursor.timeline();
        timeline
            .segments()
            .iter()
            .enumerate()
            .filter_map(|(index, segment)| {
                let (start, end) = timeline.range(index)?;
                Some(CueInfo {
                    index,
                    start,
                    end,
                    text: segment.text().to_string(),
                })
            })
            .collect()
    }

    pub fn peak_amplitude(&self, offset: usize, window: usize) -> f32 {
        lock(&self.cursor).peak_amplitude(offset, window)
    }

    pub fn segment_starts_in_range(&self, start: usize, end: usize) -> Vec<usize> {
        lock(&self.cursor)
            .timeline()
            .starts_in_range(start, end)
            .collect()
    }

    pub fn frames(&self) -> usize {
        lock(&self.cursor).timeline().total_frames()
    }

    pub fn sample_rate(&self) -> u32 {
        lock(&self.cursor).buffer().sample_rate()
    }

    pub fn channels(&self) -> u16 {
        lock(&self.cursor).buffer().channels()
    }

    /// Writes the subtitles back to disk. Failure is reported as a warning and leaves
    /// both the file on disk and the timeline in memory untouched.
    pub fn save(&self) -> bool {
        let contents = {
            let cursor = lock(&self.cursor);
            serialiser::serialize(
                cursor.timeline(),
                cursor.buffer().sample_rate(),
                self.options.precision,
            )
        };
        match contents.and_then(|contents| serialiser::save(&self.srt_path, &contents)) {
            Ok(()) => true,
            Err(err) => {
                warn!(path = %self.srt_path.display(), "{:#}", err);
                false
            }
        }
    }
}

fn load(path: &Path, buffer: SampleBuffer) -> Result<PlaybackCursor> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "no subtitle file, starting with an empty timeline");
            return Ok(PlaybackCursor::new(buffer));
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("Failed to open SRT file: '{}'", path.display()))
        }
    };
    let cursor = parser::deserialize(&data, buffer)
        .with_context(|| format!("Failed to parse SRT file: '{}'", path.display()))?;
    info!(
        path = %path.display(),
        segments = cursor.timeline().len(),
        "subtitles loaded"
    );
    Ok(cursor)
}
