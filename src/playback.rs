use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use crate::cursor::PlaybackCursor;

/// Cursor and timeline as shared between the editing thread and the audio callback.
pub type SharedCursor = Arc<Mutex<PlaybackCursor>>;

const EVENT_QUEUE_LEN: usize = 16;

/// Locks the shared cursor for an edit. A panic while the lock was held cannot leave
/// the cursor half-updated in a way `reconcile` does not repair, so poisoning is ignored.
pub fn lock(cursor: &Mutex<PlaybackCursor>) -> MutexGuard<'_, PlaybackCursor> {
    cursor.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Notifications from the audio callback, handled later on the editing thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Playback moved into segment `index`.
    SegmentChanged { index: usize },
    /// Playback halted at the end of the segment it was playing.
    Stopped,
}

/// The handle an audio output callback renders through.
///
/// Clones share the cursor, the transport flags and the event queue, so one clone can
/// live inside the callback while another drives the transport from the editor.
#[derive(Debug, Clone)]
pub struct PlaybackEngine {
    cursor: SharedCursor,
    playing: Arc<AtomicBool>,
    stop_at_segment_end: Arc<AtomicBool>,
    events: SyncSender<PlaybackEvent>,
}

impl PlaybackEngine {
    pub fn new(cursor: SharedCursor) -> (Self, Receiver<PlaybackEvent>) {
        let (events, receiver) = sync_channel(EVENT_QUEUE_LEN);
        let engine = PlaybackEngine {
            cursor,
            playing: Arc::new(AtomicBool::new(false)),
            stop_at_segment_end: Arc::new(AtomicBool::new(false)),
            events,
        };
        (engine, receiver)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Replays the current segment from its start and halts at its end.
    pub fn play_segment(&self) {
        lock(&self.cursor).jump_to_segment_start();
        self.stop_at_segment_end.store(true, Ordering::Release);
        self.playing.store(true, Ordering::Release);
    }

    /// Starts or pauses playback that runs across segment boundaries.
    pub fn toggle(&self) {
        self.stop_at_segment_end.store(false, Ordering::Release);
        self.playing.fetch_xor(true, Ordering::AcqRel);
    }

    pub fn stop(&self) {
        self.playing.store(false, Ordering::Release);
    }

    /// Audio callback entry point. Fills `out` with interleaved frames.
    ///
    /// Never blocks: if an edit holds the cursor, this block is rendered as silence and
    /// playback resumes on the next callback. Never allocates: events go into a queue
    /// sized up front and are dropped if the editor has not drained it.
    pub fn render(&self, out: &mut [f32]) {
        if !self.is_playing() {
            out.fill(0.0);
            return;
        }
        let mut cursor = match self.cursor.try_lock() {
            Ok(cursor) => cursor,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                out.fill(0.0);
                return;
            }
        };

        let before = cursor.current_index();
        let stop_at_segment_end = self.stop_at_segment_end.load(Ordering::Acquire);
        let should_stop = cursor.copy_frames_for_playback(out, stop_at_segment_end);
        let after = cursor.current_index();
        drop(cursor);

        if after != before {
            let _ = self.events.try_send(PlaybackEvent::SegmentChanged { index: after });
        }
        if should_stop {
            self.playing.store(false, Ordering::Release);
            let _ = self.events.try_send(PlaybackEvent::Stopped);
        }
    }
}
