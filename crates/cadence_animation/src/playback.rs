//! Shared playback state
//!
//! Every primitive (motion, timer, sequence, parallel) carries the same
//! [`PlaybackState`] and callback slots. The scheduler owns them; user code
//! refers to a playback by its [`PlaybackId`].

use crate::easing::Easing;
use crate::error::Result;
use crate::motion::MotionTrack;
use crate::parallel::ParallelState;
use crate::registry::OwnerId;
use crate::scheduler::PlaybackScheduler;
use crate::sequence::SequenceState;
use crate::ticker::TimeMode;
use slotmap::new_key_type;
use smallvec::SmallVec;

new_key_type! {
    /// Handle to a playback owned by a [`PlaybackScheduler`]
    pub struct PlaybackId;
}

impl PlaybackId {
    /// Convert to raw u64 (for logging or host-side storage)
    pub fn to_raw(self) -> u64 {
        self.0.as_ffi()
    }

    /// Reconstruct from a value produced by [`PlaybackId::to_raw`]
    pub fn from_raw(raw: u64) -> Self {
        PlaybackId::from(slotmap::KeyData::from_ffi(raw))
    }
}

/// Callback receiving the scheduler and the firing playback
///
/// An `Err` returned here propagates out of the engine call that fired it.
pub type PlaybackCallback = Box<dyn FnMut(&mut PlaybackScheduler, PlaybackId) -> Result<()>>;

/// The four lifecycle callbacks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    Start,
    Update,
    Interrupt,
    Complete,
}

impl CallbackKind {
    fn slot(self) -> usize {
        match self {
            CallbackKind::Start => 0,
            CallbackKind::Update => 1,
            CallbackKind::Interrupt => 2,
            CallbackKind::Complete => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CallbackKind::Start => "start",
            CallbackKind::Update => "update",
            CallbackKind::Interrupt => "interrupt",
            CallbackKind::Complete => "complete",
        }
    }
}

/// Callback slots of one playback
#[derive(Default)]
pub(crate) struct Callbacks {
    slots: [Option<PlaybackCallback>; 4],
}

impl Callbacks {
    pub fn set(&mut self, kind: CallbackKind, callback: Option<PlaybackCallback>) {
        self.slots[kind.slot()] = callback;
    }

    /// Remove a callback for the duration of its invocation
    pub fn take(&mut self, kind: CallbackKind) -> Option<PlaybackCallback> {
        self.slots[kind.slot()].take()
    }

    /// Put a taken callback back unless it was replaced while running
    pub fn restore(&mut self, kind: CallbackKind, callback: PlaybackCallback) {
        let slot = &mut self.slots[kind.slot()];
        if slot.is_none() {
            *slot = Some(callback);
        }
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }
}

/// Kind of a playback, as reported by [`PlaybackScheduler::kind`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlaybackType {
    Motion,
    Timer,
    Sequence,
    Parallel,
}

/// Timing and lifecycle flags shared by every primitive
#[derive(Clone, Debug)]
pub(crate) struct PlaybackState {
    /// Leaf duration in seconds (ignored by composites)
    pub duration: f32,
    /// Composite duration override; rescales the whole timeline
    pub duration_override: Option<f32>,
    pub progress: f32,
    pub elapsed: f32,
    pub playing: bool,
    pub paused: bool,
    /// Played but not yet through its first (deferred) tick
    pub armed: bool,
    pub started: bool,
    /// Latched once Complete fired for the current run
    pub completed: bool,
    pub time_mode: TimeMode,
    pub easing: Easing,
    pub auto_dispose: bool,
    /// Bumped whenever a run begins or ends
    pub run: u64,
}

impl PlaybackState {
    pub fn new(duration: f32) -> Self {
        Self {
            duration: sanitize_duration(duration),
            duration_override: None,
            progress: 0.0,
            elapsed: 0.0,
            playing: false,
            paused: false,
            armed: false,
            started: false,
            completed: false,
            time_mode: TimeMode::default(),
            easing: Easing::Linear,
            auto_dispose: false,
            run: 0,
        }
    }

    pub fn begin_run(&mut self) {
        self.run += 1;
        self.playing = true;
        self.paused = false;
        self.armed = true;
        self.reset();
    }

    pub fn end_run(&mut self) {
        self.run += 1;
        self.playing = false;
        self.paused = false;
        self.armed = false;
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.progress = 0.0;
        self.started = false;
        self.completed = false;
    }
}

/// Primitive-specific data
pub(crate) enum PlaybackKind {
    Timer,
    Motion(Box<dyn MotionTrack>),
    Sequence(SequenceState),
    Parallel(ParallelState),
}

impl PlaybackKind {
    pub fn tag(&self) -> PlaybackType {
        match self {
            PlaybackKind::Timer => PlaybackType::Timer,
            PlaybackKind::Motion(_) => PlaybackType::Motion,
            PlaybackKind::Sequence(_) => PlaybackType::Sequence,
            PlaybackKind::Parallel(_) => PlaybackType::Parallel,
        }
    }

    pub fn children(&self) -> Option<&[PlaybackId]> {
        match self {
            PlaybackKind::Sequence(seq) => Some(&seq.children),
            PlaybackKind::Parallel(par) => Some(&par.children),
            _ => None,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.children().is_some()
    }
}

/// A playback as stored in the scheduler
pub(crate) struct PlaybackEntry {
    pub state: PlaybackState,
    pub callbacks: Callbacks,
    pub kind: PlaybackKind,
    /// Composites that list this playback as a child
    pub parents: SmallVec<[PlaybackId; 2]>,
    /// Registry slot, removed again on dispose
    pub registration: Option<(OwnerId, String)>,
}

impl PlaybackEntry {
    pub fn new(kind: PlaybackKind, duration: f32) -> Self {
        Self {
            state: PlaybackState::new(duration),
            callbacks: Callbacks::default(),
            kind,
            parents: SmallVec::new(),
            registration: None,
        }
    }
}

/// Negative and NaN durations collapse to zero
pub(crate) fn sanitize_duration(duration: f32) -> f32 {
    if duration.is_finite() {
        duration.max(0.0)
    } else if duration == f32::INFINITY {
        f32::MAX
    } else {
        0.0
    }
}

/// Clamp progress into `0.0..=1.0`, mapping NaN to 0
pub(crate) fn clamp_progress(progress: f32) -> f32 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_run_arms_and_resets() {
        let mut state = PlaybackState::new(2.0);
        state.progress = 0.7;
        state.completed = true;
        state.begin_run();

        assert!(state.playing && state.armed);
        assert_eq!(state.progress, 0.0);
        assert!(!state.completed);
        assert_eq!(state.run, 1);

        state.end_run();
        assert!(!state.playing);
        assert_eq!(state.run, 2);
    }

    #[test]
    fn test_sanitize_duration() {
        assert_eq!(sanitize_duration(-1.0), 0.0);
        assert_eq!(sanitize_duration(f32::NAN), 0.0);
        assert_eq!(sanitize_duration(1.5), 1.5);
    }

    #[test]
    fn test_clamp_progress() {
        assert_eq!(clamp_progress(1.5), 1.0);
        assert_eq!(clamp_progress(-0.5), 0.0);
        assert_eq!(clamp_progress(f32::NAN), 0.0);
    }

    #[test]
    fn test_raw_id_round_trip() {
        let mut map = slotmap::SlotMap::<PlaybackId, ()>::with_key();
        let id = map.insert(());
        assert_eq!(PlaybackId::from_raw(id.to_raw()), id);
    }
}
