use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::SoundId;

/// Runs once when a scheduled trigger finishes playing.
pub type FinishCallback = Box<dyn FnOnce() + Send + 'static>;

struct VoiceState {
    finished: bool,
    cancelled: bool,
    on_finish: Option<FinishCallback>,
}

struct Voice {
    sound: SoundId,
    start: f64,
    gain: f32,
    state: Mutex<VoiceState>,
}

/// Shared handle to one in-flight trigger.
///
/// The sink marks it finished when playback ends; the scheduler can cancel
/// it. Whichever happens first wins: a cancelled voice never runs its
/// completion callback and a finished voice ignores cancellation.
#[derive(Clone)]
pub struct ScheduledHandle {
    voice: Arc<Voice>,
}

impl ScheduledHandle {
    /// Creates a live handle. `on_finish` is attached before the handle is
    /// shared, so no completion can slip past it.
    pub fn new(
        sound: impl Into<SoundId>,
        start: f64,
        gain: f32,
        on_finish: Option<FinishCallback>,
    ) -> Self {
        Self {
            voice: Arc::new(Voice {
                sound: sound.into(),
                start,
                gain,
                state: Mutex::new(VoiceState {
                    finished: false,
                    cancelled: false,
                    on_finish,
                }),
            }),
        }
    }

    pub fn sound(&self) -> &str {
        &self.voice.sound
    }

    pub fn start(&self) -> f64 {
        self.voice.start
    }

    pub fn gain(&self) -> f32 {
        self.voice.gain
    }

    pub fn is_finished(&self) -> bool {
        self.voice.state.lock().finished
    }

    pub fn is_cancelled(&self) -> bool {
        self.voice.state.lock().cancelled
    }

    /// True once the handle can no longer produce sound or callbacks.
    pub fn is_done(&self) -> bool {
        let state = self.voice.state.lock();
        state.finished || state.cancelled
    }

    /// Replaces the completion callback. On a voice that already finished
    /// it runs right away, on the caller's thread; on a cancelled voice it is
    /// dropped.
    pub fn set_on_finish(&self, callback: FinishCallback) {
        {
            let mut state = self.voice.state.lock();
            if state.cancelled {
                warn!(sound = %self.voice.sound, "completion callback attached to a cancelled voice, dropping it");
                return;
            }
            if !state.finished {
                state.on_finish = Some(callback);
                return;
            }
        }
        callback();
    }

    /// Drops the completion callback without cancelling playback.
    pub fn detach(&self) {
        self.voice.state.lock().on_finish = None;
    }

    pub fn cancel(&self) {
        let mut state = self.voice.state.lock();
        if state.finished {
            return;
        }
        state.cancelled = true;
        state.on_finish = None;
    }

    /// Called by the sink when playback completes. Runs the completion
    /// callback at most once, outside the handle's lock.
    pub fn finish(&self) {
        let callback = {
            let mut state = self.voice.state.lock();
            if state.finished || state.cancelled {
                return;
            }
            state.finished = true;
            state.on_finish.take()
        };

        if let Some(callback) = callback {
            callback();
        }
    }
}

impl fmt::Debug for ScheduledHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.voice.state.lock();
        f.debug_struct("ScheduledHandle")
            .field("sound", &self.voice.sound)
            .field("start", &self.voice.start)
            .field("finished", &state.finished)
            .field("cancelled", &state.cancelled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> FinishCallback {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn finish_runs_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = ScheduledHandle::new("click", 0.0, 1.0, None);
        handle.set_on_finish(counting(&calls));

        handle.finish();
        handle.finish();

        assert!(handle.is_finished());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_prevents_callback_and_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = ScheduledHandle::new("click", 0.0, 1.0, None);
        handle.set_on_finish(counting(&calls));

        handle.cancel();
        handle.cancel();
        handle.finish();

        assert!(handle.is_cancelled());
        assert!(!handle.is_finished());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn detached_voice_finishes_silently() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = ScheduledHandle::new("click", 0.0, 1.0, None);
        handle.set_on_finish(counting(&calls));

        handle.detach();
        handle.finish();

        assert!(handle.is_finished());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn callback_attached_after_finish_still_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = ScheduledHandle::new("click", 0.0, 1.0, None);
        handle.finish();

        handle.set_on_finish(counting(&calls));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        handle.finish();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_attached_after_cancel_never_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = ScheduledHandle::new("click", 0.0, 1.0, None);
        handle.cancel();

        handle.set_on_finish(counting(&calls));
        handle.finish();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn callback_given_at_creation_runs_on_finish() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = ScheduledHandle::new("click", 0.0, 1.0, Some(counting(&calls)));
        handle.finish();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_after_finish_is_ignored() {
        let handle = ScheduledHandle::new("click", 0.0, 1.0, None);
        handle.finish();
        handle.cancel();
        assert!(handle.is_finished());
        assert!(!handle.is_cancelled());
    }
}
