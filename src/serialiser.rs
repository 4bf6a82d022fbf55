use crate::segment::Segment;
use crate::timecode::{Precision, Timestamp};
use crate::timeline::SegmentTimeline;

use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

/// Renders every real segment as a numbered cue. A cue ends where the next segment
/// starts; the last one ends with the audio.
pub fn serialize(
    timeline: &SegmentTimeline,
    sample_rate: u32,
    precision: Precision,
) -> Result<String> {
    let mut out = String::new();
    write_cues(&mut out, timeline, sample_rate, precision)
        .context("Failed to format subtitles.")?;
    Ok(out)
}

fn write_cues<W: fmt::Write>(
    buf: &mut W,
    timeline: &SegmentTimeline,
    sample_rate: u32,
    precision: Precision,
) -> fmt::Result {
    let segments = timeline.segments();
    for (i, segment) in segments.iter().enumerate() {
        let end = segments
            .get(i + 1)
            .map_or(timeline.total_frames(), |next| next.start);
        write_cue(buf, i + 1, segment, end, sample_rate, precision)?;
    }
    Ok(())
}

fn write_cue<W: fmt::Write>(
    buf: &mut W,
    sequence_number: usize,
    segment: &Segment,
    end: usize,
    sample_rate: u32,
    precision: Precision,
) -> fmt::Result {
    writeln!(buf, "{}", sequence_number)?;
    writeln!(
        buf,
        "{} --> {}",
        Timestamp::from_frame(segment.start, sample_rate, precision),
        Timestamp::from_frame(end, sample_rate, precision)
    )?;
    for line in segment.text().lines() {
        writeln!(buf, "{}", line)?;
    }
    writeln!(buf)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn write_synced(file: File, contents: &str) -> io::Result<()> {
    let mut writer = BufWriter::new(file);
    writer.write_all(contents.as_bytes())?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

/// Writes `contents` next to `path` first and then renames it over `path`, so an
/// interrupted save never leaves a truncated file behind.
pub fn save<P: AsRef<Path>>(path: P, contents: &str) -> Result<()> {
    let path = path.as_ref();
    let tmp = temp_path(path);

    let file = File::create(&tmp)
        .with_context(|| format!("Cannot create temporary file: '{}'", tmp.display()))?;
    write_synced(file, contents)
        .with_context(|| format!("Failed to write to temporary file: '{}'", tmp.display()))?;

    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err).with_context(|| {
            format!(
                "Cannot save subtitles to '{}': error when trying to replace with temp file",
                path.display()
            )
        });
    }

    info!(path = %path.display(), bytes = contents.len(), "subtitles saved");
    Ok(())
}
