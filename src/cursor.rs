use crate::audio::SampleBuffer;
use crate::segment::Segment;
use crate::timeline::SegmentTimeline;

use tracing::debug;

/// Playback position over a [`SampleBuffer`], kept in step with the segment that
/// contains it.
///
/// Every mutation ends in [`PlaybackCursor::reconcile`], so `current_index` always
/// names the segment whose range holds `position`. The one exception is a position
/// equal to the frame count, which resolves to the last segment.
#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    buffer: SampleBuffer,
    timeline: SegmentTimeline,
    position: usize,
    current: usize,
}

impl PlaybackCursor {
    pub fn new(buffer: SampleBuffer) -> Self {
        let timeline = SegmentTimeline::new(buffer.frames());
        PlaybackCursor {
            buffer,
            timeline,
            position: 0,
            current: 0,
        }
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn timeline(&self) -> &SegmentTimeline {
        &self.timeline
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_segment(&self) -> &Segment {
        &self.timeline.segments()[self.current]
    }

    /// Start of the segment after the current one; the frame count for the last segment.
    pub fn next_segment_start(&self) -> usize {
        self.current_range().1
    }

    pub fn current_range(&self) -> (usize, usize) {
        self.timeline
            .range(self.current)
            .unwrap_or((0, self.timeline.total_frames()))
    }

    pub fn reconcile(&mut self) {
        let segments = self.timeline.segments();
        let last = segments.len() - 1;
        self.current = self.current.min(last);
        while self.current < last && self.position >= segments[self.current + 1].start {
            self.current += 1;
        }
        while self.current > 0 && self.position < segments[self.current].start {
            self.current -= 1;
        }
    }

    /// Moves to `position`, clamped to the buffer.
    pub fn seek(&mut self, position: usize) {
        self.position = position.min(self.timeline.total_frames());
        self.reconcile();
    }

    /// Puts the cursor back on the first frame of the first segment.
    pub fn rewind(&mut self) {
        self.position = 0;
        self.current = 0;
    }

    pub fn jump_to_segment_start(&mut self) {
        self.position = self.current_segment().start;
    }

    /// Moves `count` segments forward (or backward when negative) without wrapping,
    /// and parks the cursor on the start of the segment it lands on.
    pub fn skip_segments(&mut self, count: i64) {
        let last = self.timeline.last_index() as i64;
        self.current = (self.current as i64 + count).clamp(0, last) as usize;
        self.position = self.current_segment().start;
    }

    pub fn skip_seconds(&mut self, seconds: f64) {
        let delta = (seconds * f64::from(self.buffer.sample_rate())).round() as i64;
        let last_frame = self.timeline.total_frames() as i64 - 1;
        self.position = (self.position as i64).saturating_add(delta).clamp(0, last_frame) as usize;
        self.reconcile();
    }

    /// Starts a new segment at the cursor. Returns `false` when the cursor already sits
    /// on a segment start or at the end of the buffer.
    pub fn add_segment(&mut self) -> bool {
        let inserted = self.timeline.insert_boundary(self.position).is_some();
        self.reconcile();
        inserted
    }

    /// Folds the current segment into the previous one.
    pub fn join_segment(&mut self) -> bool {
        if self.position >= self.timeline.total_frames() {
            return false;
        }
        let merged = self.timeline.merge_with_previous(self.current);
        if merged {
            self.current -= 1;
            self.reconcile();
        }
        merged
    }

    pub fn set_current_text(&mut self, text: &str) {
        self.timeline.set_text(self.current, text);
    }

    pub fn set_segment_text(&mut self, index: usize, text: &str) -> bool {
        self.timeline.set_text(index, text)
    }

    /// Fills `out` with interleaved frames from the cursor onward and advances the
    /// cursor past them.
    ///
    /// Copying stops at the end of the buffer, or at the start of the next segment when
    /// `stop_at_segment_end` is set; whatever is left of `out` is filled with silence.
    /// On reaching that end the cursor is pinned to the last frame before it, and the
    /// return value tells the caller to halt playback if the end was a segment end.
    ///
    /// Runs on the audio thread: no allocation, no locking, time bounded by `out.len()`.
    pub fn copy_frames_for_playback(
        &mut self,
        out: &mut [f32],
        stop_at_segment_end: bool,
    ) -> bool {
        let channels = usize::from(self.buffer.channels());
        let end = if stop_at_segment_end {
            self.next_segment_start()
        } else {
            self.timeline.total_frames()
        };

        let requested = out.len() / channels;
        let available = end.saturating_sub(self.position).min(requested);
        let from = self.position * channels;
        let copied = available * channels;
        out[..copied].copy_from_slice(&self.buffer.samples()[from..from + copied]);
        out[copied..].fill(0.0);
        self.position += available;

        let mut should_stop = false;
        if self.position >= end {
            self.position = end - 1;
            should_stop = stop_at_segment_end;
        }
        self.reconcile();
        should_stop
    }

    /// Largest absolute sample over all channels in `[offset, offset + window)`,
    /// clipped to the buffer.
    pub fn peak_amplitude(&self, offset: usize, window: usize) -> f32 {
        let frames = self.buffer.frames();
        let end = offset.saturating_add(window).min(frames);
        (offset.min(end)..end)
            .flat_map(|index| self.buffer.frame(index))
            .fold(0.0f32, |peak, s| peak.max(s.abs()))
    }

    pub(crate) fn log_state(&self, what: &str) {
        debug!(
            position = self.position,
            segment = self.current,
            segments = self.timeline.len(),
            "{}",
            what
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, channels: u16) -> SampleBuffer {
        let samples = (0..frames * usize::from(channels))
            .map(|i| (i + 1) as f32)
            .collect();
        SampleBuffer::new(samples, channels, 100).unwrap()
    }

    fn assert_reconciled(cursor: &PlaybackCursor) {
        let (start, end) = cursor.current_range();
        let total = cursor.timeline().total_frames();
        if cursor.position() == total {
            assert_eq!(cursor.current_index(), cursor.timeline().last_index());
        } else {
            assert!(
                start <= cursor.position() && cursor.position() < end,
                "position {} outside segment {} [{}, {})",
                cursor.position(),
                cursor.current_index(),
                start,
                end
            );
        }
    }

    fn with_boundaries(frames: usize, boundaries: &[usize]) -> PlaybackCursor {
        let mut cursor = PlaybackCursor::new(ramp(frames, 1));
        for &b in boundaries {
            cursor.seek(b);
            cursor.add_segment();
        }
        cursor.rewind();
        cursor
    }

    #[test]
    fn add_segment_at_cursor() {
        let mut cursor = PlaybackCursor::new(ramp(1000, 1));
        cursor.seek(300);
        assert!(cursor.add_segment());
        assert!(!cursor.add_segment());
        assert_eq!(cursor.current_index(), 1);
        assert_eq!(cursor.current_range(), (300, 1000));
        assert_reconciled(&cursor);
    }

    #[test]
    fn add_segment_at_end_is_ignored() {
        let mut cursor = PlaybackCursor::new(ramp(1000, 1));
        cursor.seek(1000);
        assert!(!cursor.add_segment());
        assert_eq!(cursor.timeline().len(), 1);
        assert_reconciled(&cursor);
    }

    #[test]
    fn join_merges_into_previous() {
        let mut cursor = with_boundaries(1000, &[300, 600]);
        cursor.set_segment_text(1, "one");
        cursor.set_segment_text(2, "two");
        cursor.seek(700);
        assert!(cursor.join_segment());
        assert_eq!(cursor.current_index(), 1);
        assert_eq!(cursor.current_range(), (300, 1000));
        assert_eq!(cursor.current_segment().text(), "one\ntwo");
        assert_reconciled(&cursor);
    }

    #[test]
    fn join_first_segment_is_noop() {
        let mut cursor = with_boundaries(1000, &[300]);
        cursor.seek(100);
        assert!(!cursor.join_segment());
        assert_eq!(cursor.timeline().len(), 2);
    }

    #[test]
    fn join_at_buffer_end_is_noop() {
        let mut cursor = with_boundaries(1000, &[300]);
        cursor.seek(1000);
        assert!(!cursor.join_segment());
        assert_eq!(cursor.timeline().len(), 2);
    }

    #[test]
    fn skip_segments_clamps() {
        let mut cursor = with_boundaries(1000, &[300, 600]);
        cursor.skip_segments(1);
        assert_eq!((cursor.current_index(), cursor.position()), (1, 300));
        cursor.skip_segments(5);
        assert_eq!((cursor.current_index(), cursor.position()), (2, 600));
        cursor.skip_segments(-1);
        assert_eq!((cursor.current_index(), cursor.position()), (1, 300));
        cursor.skip_segments(-9);
        assert_eq!((cursor.current_index(), cursor.position()), (0, 0));
        assert_reconciled(&cursor);
    }

    #[test]
    fn skip_seconds_clamps_to_buffer() {
        // 100 Hz, so one second is 100 frames.
        let mut cursor = with_boundaries(1000, &[300]);
        cursor.skip_seconds(3.5);
        assert_eq!((cursor.position(), cursor.current_index()), (350, 1));
        cursor.skip_seconds(-1.0);
        assert_eq!((cursor.position(), cursor.current_index()), (250, 0));
        cursor.skip_seconds(100.0);
        assert_eq!(cursor.position(), 999);
        cursor.skip_seconds(-100.0);
        assert_eq!(cursor.position(), 0);
        assert_reconciled(&cursor);
    }

    #[test]
    fn jump_to_segment_start() {
        let mut cursor = with_boundaries(1000, &[300]);
        cursor.seek(450);
        cursor.jump_to_segment_start();
        assert_eq!(cursor.position(), 300);
    }

    #[test]
    fn copy_runs_out_at_buffer_end() {
        let mut cursor = PlaybackCursor::new(ramp(100, 2));
        cursor.seek(95);
        let mut out = [9.0f32; 20];
        let stop = cursor.copy_frames_for_playback(&mut out, false);
        assert!(!stop);
        let expected: Vec<f32> = (191..=200).map(|v| v as f32).collect();
        assert_eq!(&out[..10], expected.as_slice());
        assert!(out[10..].iter().all(|&s| s == 0.0));
        assert_eq!(cursor.position(), 99);
        assert_reconciled(&cursor);
    }

    #[test]
    fn copy_stops_at_segment_end() {
        let mut cursor = with_boundaries(100, &[50]);
        cursor.seek(47);
        let mut out = [9.0f32; 10];
        let stop = cursor.copy_frames_for_playback(&mut out, true);
        assert!(stop);
        assert_eq!(&out[..3], &[48.0, 49.0, 50.0]);
        assert!(out[3..].iter().all(|&s| s == 0.0));
        assert_eq!(cursor.position(), 49);
        assert_eq!(cursor.current_index(), 0);
    }

    #[test]
    fn copy_crosses_segments_in_free_play() {
        let mut cursor = with_boundaries(100, &[50]);
        cursor.seek(45);
        let mut out = [0.0f32; 10];
        assert!(!cursor.copy_frames_for_playback(&mut out, false));
        assert_eq!(out[9], 55.0);
        assert_eq!(cursor.position(), 55);
        assert_eq!(cursor.current_index(), 1);
    }

    #[test]
    fn copy_inside_segment_keeps_playing() {
        let mut cursor = with_boundaries(100, &[50]);
        let mut out = [0.0f32; 10];
        assert!(!cursor.copy_frames_for_playback(&mut out, true));
        assert_eq!(cursor.position(), 10);
    }

    #[test]
    fn peak_spans_all_channels() {
        let samples = vec![0.1, -0.2, 0.3, -0.9, 0.5, 0.4];
        let cursor = PlaybackCursor::new(SampleBuffer::new(samples, 2, 100).unwrap());
        assert_eq!(cursor.peak_amplitude(0, 1), 0.2);
        assert_eq!(cursor.peak_amplitude(0, 3), 0.9);
        assert_eq!(cursor.peak_amplitude(2, 10), 0.5);
        assert_eq!(cursor.peak_amplitude(10, 10), 0.0);
    }

    #[test]
    fn reconcile_holds_after_mixed_edits() {
        let mut cursor = PlaybackCursor::new(ramp(1000, 1));
        let mut out = [0.0f32; 64];
        for step in 0..40 {
            match step % 5 {
                0 => {
                    cursor.skip_seconds(1.3);
                    cursor.add_segment();
                }
                1 => cursor.skip_segments(-1),
                2 => {
                    cursor.copy_frames_for_playback(&mut out, step % 2 == 0);
                }
                3 => {
                    cursor.join_segment();
                }
                _ => cursor.skip_seconds(-0.7),
            }
            assert_reconciled(&cursor);
        }
    }
}
