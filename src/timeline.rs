use crate::segment::Segment;

use tracing::debug;

/// Ordered partition of `0..total_frames` into subtitle segments.
///
/// The last entry is a sentinel whose start is the total frame count. It closes the
/// range of the last real segment and is never exposed as a segment itself.
#[derive(Debug, Clone)]
pub struct SegmentTimeline {
    segments: Vec<Segment>,
}

impl SegmentTimeline {
    pub fn new(total_frames: usize) -> Self {
        debug_assert!(total_frames > 0, "timeline over an empty buffer");
        SegmentTimeline {
            segments: vec![Segment::new(0), Segment::new(total_frames)],
        }
    }

    pub fn total_frames(&self) -> usize {
        self.segments[self.segments.len() - 1].start
    }

    /// Number of real segments, sentinel excluded. Never zero.
    pub fn len(&self) -> usize {
        self.segments.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn last_index(&self) -> usize {
        self.segments.len() - 2
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments[..self.segments.len() - 1]
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments().get(index)
    }

    /// Frame range `[start, end)` covered by segment `index`.
    pub fn range(&self, index: usize) -> Option<(usize, usize)> {
        if index > self.last_index() {
            return None;
        }
        Some((self.segments[index].start, self.segments[index + 1].start))
    }

    /// Index of the segment whose range holds `position`. Positions at or past the
    /// end resolve to the last segment.
    pub fn index_containing(&self, position: usize) -> usize {
        let after = self.segments.partition_point(|s| s.start <= position);
        after.saturating_sub(1).min(self.last_index())
    }

    /// Splits the segment holding `position` so that a new, empty segment starts there.
    /// Returns the index of the new segment, or `None` when `position` is already a
    /// segment start or lies outside the buffer.
    pub fn insert_boundary(&mut self, position: usize) -> Option<usize> {
        if position >= self.total_frames() {
            return None;
        }
        let index = self.index_containing(position);
        if self.segments[index].start == position {
            return None;
        }
        self.segments.insert(index + 1, Segment::new(position));
        debug!(position, index = index + 1, "inserted segment boundary");
        Some(index + 1)
    }

    /// Removes segment `index`, appending its text to the previous segment on a new line.
    /// The first segment and the sentinel cannot be merged away.
    pub fn merge_with_previous(&mut self, index: usize) -> bool {
        if index == 0 || index > self.last_index() {
            return false;
        }
        let mut removed = self.segments.remove(index);
        let previous = &mut self.segments[index - 1];
        let mut text = previous.take_text();
        let appended = removed.take_text();
        if !text.is_empty() && !appended.is_empty() {
            text.push('\n');
        }
        text.push_str(&appended);
        previous.set_text(&text);
        debug!(index, start = removed.start, "merged segment into previous");
        true
    }

    /// Starts of the real segments in `[start, end)`, ascending.
    pub fn starts_in_range(&self, start: usize, end: usize) -> impl Iterator<Item = usize> + '_ {
        self.segments()
            .iter()
            .map(|s| s.start)
            .skip_while(move |&st| st < start)
            .take_while(move |&st| st < end)
    }

    pub fn set_text(&mut self, index: usize, text: &str) -> bool {
        if index > self.last_index() {
            return false;
        }
        self.segments[index].set_text(text);
        true
    }
}
