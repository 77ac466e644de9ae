//! Playback scheduler
//!
//! Owns every playback, the reuse registry and the list of roots that frame
//! ticks advance. Composite children are never ticked directly; their parent
//! maps its own progress onto them.
//!
//! Callbacks receive `&mut PlaybackScheduler` and may re-play, stop or
//! dispose anything, including the playback that is firing. Each playback
//! carries a run counter; after every callback the engine checks that the
//! object is still alive and on the same run before touching it again.

use crate::builder::{MotionMut, PlaybackMut};
use crate::error::{PlaybackError, Result};
use crate::motion::{Motion, TypedTrack};
use crate::parallel::{ParallelLayout, ParallelState};
use crate::playback::{
    clamp_progress, sanitize_duration, CallbackKind, PlaybackCallback, PlaybackEntry, PlaybackId,
    PlaybackKind, PlaybackState, PlaybackType,
};
use crate::registry::{OwnerId, Registry};
use crate::sequence::{SequenceLayout, SequenceState};
use crate::ticker::{FrameTime, TimeMode};
use crate::values::Animatable;
use slotmap::SlotMap;
use smallvec::SmallVec;
use std::any::type_name;
use tracing::{debug, trace};

type IdList = SmallVec<[PlaybackId; 8]>;

/// Owns and advances all playbacks
pub struct PlaybackScheduler {
    playbacks: SlotMap<PlaybackId, PlaybackEntry>,
    registry: Registry,
    /// Roots advanced by `tick`/`fixed_tick`, in play order
    active: Vec<PlaybackId>,
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self {
            playbacks: SlotMap::with_key(),
            registry: Registry::new(),
            active: Vec::new(),
        }
    }

    // ========================================================================
    // Factories
    // ========================================================================

    /// Create a timer: a playback with a duration and callbacks but no value
    pub fn create_timer(&mut self, duration: f32) -> PlaybackId {
        let id = self
            .playbacks
            .insert(PlaybackEntry::new(PlaybackKind::Timer, duration));
        debug!(?id, duration, "created timer");
        id
    }

    /// Create a motion that pushes every evaluated value into `setter`
    ///
    /// The motion needs an initial and a final value (see
    /// [`PlaybackScheduler::motion`]) before it can play.
    pub fn create_motion<T, F>(&mut self, setter: F) -> Motion<T>
    where
        T: Animatable,
        F: FnMut(T) + 'static,
    {
        let track = TypedTrack::<T>::new(Box::new(setter));
        let id = self.playbacks.insert(PlaybackEntry::new(
            PlaybackKind::Motion(Box::new(track)),
            0.0,
        ));
        debug!(?id, value = type_name::<T>(), "created motion");
        Motion::from_id(id)
    }

    /// Create a sequence playing `items` back-to-back
    pub fn create_sequence(&mut self, items: &[PlaybackId]) -> Result<PlaybackId> {
        self.create_composite(PlaybackKind::Sequence(SequenceState::new(items)), items)
    }

    /// Create a parallel playing all `items` at once
    pub fn create_parallel(&mut self, items: &[PlaybackId]) -> Result<PlaybackId> {
        self.create_composite(PlaybackKind::Parallel(ParallelState::new(items)), items)
    }

    fn create_composite(&mut self, kind: PlaybackKind, items: &[PlaybackId]) -> Result<PlaybackId> {
        let tag = kind.tag();
        let id = self.playbacks.insert(PlaybackEntry::new(kind, 0.0));
        let linked = self.validate_children(id, items).and_then(|()| {
            self.link_children(id);
            self.refresh_layout(id)
        });
        if let Err(err) = linked {
            self.unlink_children(id);
            self.playbacks.remove(id);
            return Err(err);
        }
        debug!(?id, kind = ?tag, children = items.len(), "created composite");
        Ok(id)
    }

    // ========================================================================
    // Registry-backed factories
    // ========================================================================

    /// Motion registered under `(owner, key)`, created on first request
    ///
    /// A hit re-binds the setter to the new closure and keeps every other
    /// setting, including a run in progress.
    pub fn get_motion<T, F>(&mut self, owner: OwnerId, key: &str, setter: F) -> Result<Motion<T>>
    where
        T: Animatable,
        F: FnMut(T) + 'static,
    {
        if let Some(id) = self.lookup(owner, key) {
            self.typed_track_mut::<T>(id)?.setter = Box::new(setter);
            debug!(?id, key, "reused motion");
            return Ok(Motion::from_id(id));
        }
        let motion = self.create_motion(setter);
        self.register(owner, key, motion.id());
        Ok(motion)
    }

    /// Timer registered under `(owner, key)`; a miss creates a zero-length timer
    pub fn get_timer(&mut self, owner: OwnerId, key: &str) -> Result<PlaybackId> {
        if let Some(id) = self.reuse(owner, key, PlaybackType::Timer)? {
            return Ok(id);
        }
        let id = self.create_timer(0.0);
        self.register(owner, key, id);
        Ok(id)
    }

    /// Sequence registered under `(owner, key)`
    ///
    /// `items` are only used when the sequence is created. Use
    /// [`PlaybackScheduler::set_children`] to change a reused one.
    pub fn get_sequence(&mut self, owner: OwnerId, key: &str, items: &[PlaybackId]) -> Result<PlaybackId> {
        if let Some(id) = self.reuse(owner, key, PlaybackType::Sequence)? {
            return Ok(id);
        }
        let id = self.create_sequence(items)?;
        self.register(owner, key, id);
        Ok(id)
    }

    /// Parallel registered under `(owner, key)`; see [`PlaybackScheduler::get_sequence`]
    pub fn get_parallel(&mut self, owner: OwnerId, key: &str, items: &[PlaybackId]) -> Result<PlaybackId> {
        if let Some(id) = self.reuse(owner, key, PlaybackType::Parallel)? {
            return Ok(id);
        }
        let id = self.create_parallel(items)?;
        self.register(owner, key, id);
        Ok(id)
    }

    /// Look up a live registered playback of the expected kind
    fn reuse(&self, owner: OwnerId, key: &str, expected: PlaybackType) -> Result<Option<PlaybackId>> {
        let Some(id) = self.lookup(owner, key) else {
            return Ok(None);
        };
        let found = self.entry(id)?.kind.tag();
        if found != expected {
            return Err(PlaybackError::TypeMismatch {
                id,
                expected: kind_name(found),
                found: kind_name(expected),
            });
        }
        debug!(?id, key, kind = ?expected, "reused playback");
        Ok(Some(id))
    }

    fn lookup(&self, owner: OwnerId, key: &str) -> Option<PlaybackId> {
        self.registry
            .get(owner, key)
            .filter(|id| self.playbacks.contains_key(*id))
    }

    fn register(&mut self, owner: OwnerId, key: &str, id: PlaybackId) {
        self.registry.insert(owner, key, id);
        if let Some(entry) = self.playbacks.get_mut(id) {
            entry.registration = Some((owner, key.to_owned()));
        }
        debug!(?id, owner = owner.to_raw(), key, "registered playback");
    }

    /// The reuse registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Builder for settings shared by every primitive
    pub fn configure(&mut self, id: impl Into<PlaybackId>) -> Result<PlaybackMut<'_>> {
        let id = id.into();
        self.entry(id)?;
        Ok(PlaybackMut::new(self, id))
    }

    /// Builder for a motion's values and value hooks
    pub fn motion<T: Animatable>(&mut self, motion: Motion<T>) -> Result<MotionMut<'_, T>> {
        self.typed_track_mut::<T>(motion.id())?;
        Ok(MotionMut::new(self, motion.id()))
    }

    /// Set a leaf's duration, or a composite's duration override
    pub fn set_duration(&mut self, id: impl Into<PlaybackId>, duration: f32) -> Result<()> {
        let id = id.into();
        self.entry(id)?;
        self.write_duration(id, duration);
        Ok(())
    }

    pub(crate) fn write_duration(&mut self, id: PlaybackId, duration: f32) {
        let duration = sanitize_duration(duration);
        let Some(entry) = self.playbacks.get_mut(id) else {
            return;
        };
        if entry.kind.is_composite() {
            entry.state.duration_override = Some(duration);
        } else {
            entry.state.duration = duration;
        }
        self.invalidate_ancestors(id);
    }

    /// Drop a composite's duration override so it plays at its natural length
    pub fn clear_duration_override(&mut self, id: impl Into<PlaybackId>) -> Result<()> {
        let id = id.into();
        self.entry_mut(id)?.state.duration_override = None;
        self.invalidate_ancestors(id);
        Ok(())
    }

    pub(crate) fn state_mut(&mut self, id: PlaybackId) -> Option<&mut PlaybackState> {
        self.playbacks.get_mut(id).map(|entry| &mut entry.state)
    }

    pub(crate) fn set_callback(
        &mut self,
        id: PlaybackId,
        kind: CallbackKind,
        callback: Option<PlaybackCallback>,
    ) {
        if let Some(entry) = self.playbacks.get_mut(id) {
            entry.callbacks.set(kind, callback);
        }
    }

    pub(crate) fn clear_callbacks(&mut self, id: PlaybackId) {
        if let Some(entry) = self.playbacks.get_mut(id) {
            entry.callbacks.clear();
        }
    }

    pub(crate) fn typed_track_mut<T: Animatable>(&mut self, id: PlaybackId) -> Result<&mut TypedTrack<T>> {
        let entry = self.entry_mut(id)?;
        let PlaybackKind::Motion(track) = &mut entry.kind else {
            return Err(PlaybackError::NotAMotion(id));
        };
        let stored = track.value_type();
        track
            .as_any_mut()
            .downcast_mut::<TypedTrack<T>>()
            .ok_or(PlaybackError::TypeMismatch {
                id,
                expected: stored,
                found: type_name::<T>(),
            })
    }

    pub(crate) fn typed_track<T: Animatable>(&self, id: PlaybackId) -> Result<&TypedTrack<T>> {
        let entry = self.entry(id)?;
        let PlaybackKind::Motion(track) = &entry.kind else {
            return Err(PlaybackError::NotAMotion(id));
        };
        track
            .as_any()
            .downcast_ref::<TypedTrack<T>>()
            .ok_or(PlaybackError::TypeMismatch {
                id,
                expected: track.value_type(),
                found: type_name::<T>(),
            })
    }

    // ========================================================================
    // Composite structure
    // ========================================================================

    /// Replace a composite's children
    ///
    /// Fails with [`PlaybackError::Structural`] on dead, repeated or cyclic
    /// children; the composite keeps its old children in that case.
    pub fn set_children(&mut self, id: impl Into<PlaybackId>, items: &[PlaybackId]) -> Result<()> {
        let id = id.into();
        if !self.entry(id)?.kind.is_composite() {
            return Err(PlaybackError::NotAComposite(id));
        }
        self.validate_children(id, items)?;
        self.unlink_children(id);
        if let Some(entry) = self.playbacks.get_mut(id) {
            match &mut entry.kind {
                PlaybackKind::Sequence(seq) => *seq = SequenceState::new(items),
                PlaybackKind::Parallel(par) => *par = ParallelState::new(items),
                _ => {}
            }
        }
        self.link_children(id);
        self.invalidate_ancestors(id);
        debug!(?id, children = items.len(), "children replaced");
        self.refresh_layout(id)
    }

    /// Recompute a sequence's child offsets after durations changed
    pub fn update_sequence(&mut self, id: impl Into<PlaybackId>) -> Result<()> {
        self.update_layout(id.into(), PlaybackType::Sequence)
    }

    /// Recompute a parallel's timeline after durations changed
    pub fn evaluate_parallel(&mut self, id: impl Into<PlaybackId>) -> Result<()> {
        self.update_layout(id.into(), PlaybackType::Parallel)
    }

    fn update_layout(&mut self, id: PlaybackId, expected: PlaybackType) -> Result<()> {
        let entry = self.entry_mut(id)?;
        match &mut entry.kind {
            PlaybackKind::Sequence(seq) if expected == PlaybackType::Sequence => seq.stale = true,
            PlaybackKind::Parallel(par) if expected == PlaybackType::Parallel => par.stale = true,
            _ => return Err(PlaybackError::NotAComposite(id)),
        }
        self.refresh_layout(id)
    }

    /// Children of a composite
    pub fn children(&self, id: impl Into<PlaybackId>) -> Result<&[PlaybackId]> {
        let id = id.into();
        self.entry(id)?
            .kind
            .children()
            .ok_or(PlaybackError::NotAComposite(id))
    }

    /// Sequence child offsets and timeline, refreshed if stale
    pub fn sequence_layout(&mut self, id: impl Into<PlaybackId>) -> Result<SequenceLayout> {
        let id = id.into();
        self.refresh_layout(id)?;
        match &self.entry(id)?.kind {
            PlaybackKind::Sequence(seq) => Ok(seq.layout.clone()),
            _ => Err(PlaybackError::NotAComposite(id)),
        }
    }

    /// Parallel timeline, refreshed if stale
    pub fn parallel_layout(&mut self, id: impl Into<PlaybackId>) -> Result<ParallelLayout> {
        let id = id.into();
        self.refresh_layout(id)?;
        match &self.entry(id)?.kind {
            PlaybackKind::Parallel(par) => Ok(par.layout.clone()),
            _ => Err(PlaybackError::NotAComposite(id)),
        }
    }

    fn validate_children(&self, composite: PlaybackId, items: &[PlaybackId]) -> Result<()> {
        for (index, &child) in items.iter().enumerate() {
            let reason = if !self.playbacks.contains_key(child) {
                format!("child {index} has been disposed")
            } else if child == composite || self.is_ancestor(child, composite) {
                format!("child {index} would make the composite contain itself")
            } else if items[..index].contains(&child) {
                format!("child {index} is listed twice")
            } else {
                continue;
            };
            return Err(PlaybackError::Structural { composite, reason });
        }
        Ok(())
    }

    /// Whether `candidate` contains `id` somewhere below it
    fn is_ancestor(&self, candidate: PlaybackId, id: PlaybackId) -> bool {
        let mut pending: IdList = self.parents_of(id);
        while let Some(parent) = pending.pop() {
            if parent == candidate {
                return true;
            }
            pending.extend(self.parents_of(parent));
        }
        false
    }

    fn parents_of(&self, id: PlaybackId) -> IdList {
        self.playbacks
            .get(id)
            .map(|entry| entry.parents.iter().copied().collect())
            .unwrap_or_default()
    }

    fn children_of(&self, id: PlaybackId) -> IdList {
        self.playbacks
            .get(id)
            .and_then(|entry| entry.kind.children())
            .map(|children| children.iter().copied().collect())
            .unwrap_or_default()
    }

    fn link_children(&mut self, id: PlaybackId) {
        for child in self.children_of(id) {
            if let Some(entry) = self.playbacks.get_mut(child) {
                entry.parents.push(id);
            }
        }
    }

    fn unlink_children(&mut self, id: PlaybackId) {
        for child in self.children_of(id) {
            if let Some(entry) = self.playbacks.get_mut(child) {
                entry.parents.retain(|parent| *parent != id);
            }
        }
    }

    /// Mark every composite above `id` as needing a layout refresh
    fn invalidate_ancestors(&mut self, id: PlaybackId) {
        let mut pending = self.parents_of(id);
        while let Some(parent) = pending.pop() {
            let Some(entry) = self.playbacks.get_mut(parent) else {
                continue;
            };
            match &mut entry.kind {
                PlaybackKind::Sequence(seq) => seq.stale = true,
                PlaybackKind::Parallel(par) => par.stale = true,
                _ => {}
            }
            pending.extend(entry.parents.iter().copied());
        }
    }

    /// Rebuild a stale composite layout from its children's spans
    fn refresh_layout(&mut self, id: PlaybackId) -> Result<()> {
        let stale = match &self.entry(id)?.kind {
            PlaybackKind::Sequence(seq) => seq.stale,
            PlaybackKind::Parallel(par) => par.stale,
            _ => false,
        };
        if !stale {
            return Ok(());
        }

        let children = self.children_of(id);
        let mut durations: SmallVec<[f32; 8]> = SmallVec::with_capacity(children.len());
        for (index, &child) in children.iter().enumerate() {
            match self.span_of(child) {
                Ok(duration) => durations.push(duration),
                Err(PlaybackError::Disposed(_)) => {
                    return Err(PlaybackError::Structural {
                        composite: id,
                        reason: format!("child {index} has been disposed"),
                    })
                }
                Err(err) => return Err(err),
            }
        }

        let entry = self.entry_mut(id)?;
        match &mut entry.kind {
            PlaybackKind::Sequence(seq) => {
                seq.layout = SequenceLayout::from_durations(&durations);
                seq.stale = false;
                trace!(?id, timeline = seq.layout.timeline(), "sequence layout refreshed");
            }
            PlaybackKind::Parallel(par) => {
                par.layout = ParallelLayout::from_durations(&durations);
                par.stale = false;
                trace!(?id, timeline = par.layout.timeline(), "parallel layout refreshed");
            }
            _ => {}
        }
        Ok(())
    }

    /// Effective duration: the override if set, else the (fresh) natural length
    fn span_of(&mut self, id: PlaybackId) -> Result<f32> {
        self.refresh_layout(id)?;
        Ok(effective_duration(self.entry(id)?))
    }

    // ========================================================================
    // Playback control
    // ========================================================================

    /// Start a new run
    ///
    /// A playback that is already playing fires Interrupt first. The first
    /// tick after `play` only arms the run; time starts counting on the next.
    /// A sequence whose children add up to zero completes on the spot.
    pub fn play(&mut self, id: impl Into<PlaybackId>) -> Result<()> {
        let id = id.into();
        self.prepare(id)?;
        if self.entry(id)?.state.playing {
            self.interrupt(id)?;
        }

        let entry = self.entry_mut(id)?;
        entry.state.begin_run();
        if let PlaybackKind::Motion(track) = &mut entry.kind {
            track.capture_initial();
        }
        let run = entry.state.run;
        let empty_sequence =
            matches!(&entry.kind, PlaybackKind::Sequence(seq) if seq.layout.timeline() <= 0.0);
        self.reset_children(id)?;

        if empty_sequence {
            debug!(?id, "zero-length sequence completes immediately");
            return self.complete_now(id, run);
        }
        if !self.active.contains(&id) {
            self.active.push(id);
        }
        let duration = self.span_of(id)?;
        debug!(?id, duration, "play");
        Ok(())
    }

    /// Set the duration (or override) and play
    pub fn play_for(&mut self, id: impl Into<PlaybackId>, duration: f32) -> Result<()> {
        let id = id.into();
        self.set_duration(id, duration)?;
        self.play(id)
    }

    /// Set a motion's values and duration, then play
    pub fn play_motion<T: Animatable>(
        &mut self,
        motion: Motion<T>,
        initial: T,
        target: T,
        duration: f32,
    ) -> Result<()> {
        self.motion(motion)?.set_values(initial, target);
        self.play_for(motion, duration)
    }

    /// Cancel a run; fires Interrupt if the playback was playing
    pub fn stop(&mut self, id: impl Into<PlaybackId>) -> Result<()> {
        let id = id.into();
        self.entry(id)?;
        self.interrupt(id)
    }

    /// Freeze a run in place
    pub fn pause(&mut self, id: impl Into<PlaybackId>) -> Result<()> {
        let id = id.into();
        let state = &mut self.entry_mut(id)?.state;
        if state.playing && !state.paused {
            state.paused = true;
            debug!(?id, progress = state.progress, "pause");
        }
        Ok(())
    }

    /// Continue a paused run from its current progress
    pub fn resume(&mut self, id: impl Into<PlaybackId>) -> Result<()> {
        let id = id.into();
        if !self.entry(id)?.state.paused {
            return Ok(());
        }
        let duration = self.span_of(id)?;
        let state = &mut self.entry_mut(id)?.state;
        state.paused = false;
        state.elapsed = state.progress * duration;
        debug!(?id, elapsed = state.elapsed, "resume");
        Ok(())
    }

    /// Clear lifecycle flags and progress of a playback and all its children
    ///
    /// Values are not re-applied and no callbacks fire.
    pub fn reset_state(&mut self, id: impl Into<PlaybackId>) -> Result<()> {
        let id = id.into();
        self.entry_mut(id)?.state.reset();
        self.reset_children(id)
    }

    /// Jump to `progress` (clamped to `0.0..=1.0`) and apply it
    ///
    /// No lifecycle callbacks fire for the playback itself; composite
    /// children are driven as usual.
    pub fn set_progress(&mut self, id: impl Into<PlaybackId>, progress: f32) -> Result<()> {
        let id = id.into();
        let progress = clamp_progress(progress);
        let duration = self.span_of(id)?;
        self.entry_mut(id)?.state.elapsed = progress * duration;
        self.apply_progress(id, progress)
    }

    /// Advance a single playing root by `dt` seconds
    pub fn advance(&mut self, id: impl Into<PlaybackId>, dt: f32) -> Result<()> {
        let id = id.into();
        let state = &mut self.entry_mut(id)?.state;
        if !state.playing || state.paused {
            return Ok(());
        }
        if state.armed {
            state.armed = false;
            trace!(?id, "first tick armed");
            return Ok(());
        }
        let run = state.run;

        let duration = self.span_of(id)?;
        let state = &mut self.entry_mut(id)?.state;
        state.elapsed += if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let finished = state.elapsed >= duration;
        let progress = if finished {
            state.elapsed = duration;
            1.0
        } else {
            state.elapsed / duration
        };
        trace!(?id, progress, "advance");

        self.apply_progress(id, progress)?;
        if !self.same_run(id, run) {
            return Ok(());
        }
        if self.latch(id, |state| &mut state.started) {
            self.fire(id, CallbackKind::Start)?;
            if !self.same_run(id, run) {
                return Ok(());
            }
        }
        self.fire(id, CallbackKind::Update)?;
        if finished && self.same_run(id, run) {
            self.finish_run(id)?;
        }
        Ok(())
    }

    fn complete_now(&mut self, id: PlaybackId, run: u64) -> Result<()> {
        if let Some(state) = self.state_mut(id) {
            state.armed = false;
        }
        self.apply_progress(id, 1.0)?;
        if !self.same_run(id, run) {
            return Ok(());
        }
        self.fire(id, CallbackKind::Update)?;
        if self.same_run(id, run) {
            self.finish_run(id)?;
        }
        Ok(())
    }

    /// End the current run normally and fire Complete
    fn finish_run(&mut self, id: PlaybackId) -> Result<()> {
        let state = &mut self.entry_mut(id)?.state;
        state.completed = true;
        state.end_run();
        let run = state.run;
        debug!(?id, "complete");

        self.fire(id, CallbackKind::Complete)?;
        let auto_dispose = self
            .playbacks
            .get(id)
            .is_some_and(|entry| entry.state.run == run && entry.state.auto_dispose);
        if auto_dispose {
            self.dispose(id);
        }
        Ok(())
    }

    /// Cancel a playing run: playing is cleared before any Interrupt fires
    fn interrupt(&mut self, id: PlaybackId) -> Result<()> {
        let state = &mut self.entry_mut(id)?.state;
        if !state.playing {
            return Ok(());
        }
        state.end_run();
        self.active.retain(|active| *active != id);
        debug!(?id, "interrupt");
        self.interrupt_children(id)?;
        self.fire(id, CallbackKind::Interrupt)
    }

    /// Interrupt children that started but never completed, deepest first
    fn interrupt_children(&mut self, id: PlaybackId) -> Result<()> {
        for child in self.children_of(id) {
            let in_flight = self
                .playbacks
                .get(child)
                .is_some_and(|entry| entry.state.started && !entry.state.completed);
            if in_flight {
                self.interrupt_children(child)?;
                self.fire(child, CallbackKind::Interrupt)?;
            }
        }
        Ok(())
    }

    /// Check a playback (and its subtree) can play
    fn prepare(&mut self, id: PlaybackId) -> Result<()> {
        self.refresh_layout(id)?;
        if let PlaybackKind::Motion(track) = &self.entry(id)?.kind {
            if let Some(missing) = track.missing() {
                return Err(PlaybackError::Unconfigured { id, missing });
            }
        }
        for child in self.children_of(id) {
            self.prepare(child)?;
        }
        Ok(())
    }

    fn reset_children(&mut self, id: PlaybackId) -> Result<()> {
        if let PlaybackKind::Sequence(seq) = &mut self.entry_mut(id)?.kind {
            seq.active = None;
        }
        for child in self.children_of(id) {
            let entry = self.entry_mut(child)?;
            entry.state.reset();
            if let PlaybackKind::Motion(track) = &mut entry.kind {
                track.capture_initial();
            }
            self.reset_children(child)?;
        }
        Ok(())
    }

    // ========================================================================
    // Progress mapping
    // ========================================================================

    /// Store progress and push it into the value or the children
    fn apply_progress(&mut self, id: PlaybackId, progress: f32) -> Result<()> {
        let entry = self.entry_mut(id)?;
        entry.state.progress = progress;
        let easing = entry.state.easing;
        if let PlaybackKind::Motion(track) = &mut entry.kind {
            return track
                .apply(progress, easing)
                .map_err(|missing| PlaybackError::Unconfigured { id, missing });
        }
        match entry.kind.tag() {
            PlaybackType::Sequence => self.drive_sequence(id, easing.apply(progress)),
            PlaybackType::Parallel => self.drive_parallel(id, easing.apply(progress)),
            _ => Ok(()),
        }
    }

    fn drive_sequence(&mut self, id: PlaybackId, progress: f32) -> Result<()> {
        self.refresh_layout(id)?;
        let (children, located, previous) = match &self.entry(id)?.kind {
            PlaybackKind::Sequence(seq) => (
                seq.children.clone(),
                seq.layout.locate(clamp_progress(progress)),
                seq.active,
            ),
            _ => return Ok(()),
        };
        let Some((index, local)) = located else {
            return Ok(());
        };
        if let PlaybackKind::Sequence(seq) = &mut self.entry_mut(id)?.kind {
            seq.active = Some(index);
        }

        // Leaving a child in either direction first drives it to its end, so
        // a backward scrub leaves later children at their final values.
        // Children skipped over this frame still run to completion.
        let catch_up = match previous {
            Some(prev) if prev == index => 0..0,
            Some(prev) => {
                if let Some(&child) = children.get(prev) {
                    self.finish_child(child)?;
                }
                if index > prev {
                    prev + 1..index
                } else {
                    0..0
                }
            }
            None => 0..index,
        };
        for &child in &children[catch_up] {
            self.finish_child(child)?;
        }
        self.drive_child(children[index], local)
    }

    fn drive_parallel(&mut self, id: PlaybackId, progress: f32) -> Result<()> {
        self.refresh_layout(id)?;
        let plan: SmallVec<[(PlaybackId, f32); 8]> = match &self.entry(id)?.kind {
            PlaybackKind::Parallel(par) => par
                .layout
                .drive_order()
                .map(|i| (par.children[i], par.layout.child_progress(i, progress)))
                .collect(),
            _ => return Ok(()),
        };

        for (child, local) in plan {
            let Some(state) = self.state_mut(child) else {
                continue;
            };
            if state.completed {
                if local >= 1.0 {
                    continue;
                }
                // Scrubbed back below the end: it may complete again
                state.completed = false;
            }
            self.drive_child(child, local)?;
        }
        Ok(())
    }

    /// Force a child to its end; Complete only fires if it has not already
    fn finish_child(&mut self, child: PlaybackId) -> Result<()> {
        self.drive_child(child, 1.0)
    }

    /// Apply local progress to a child and fire its lifecycle callbacks
    fn drive_child(&mut self, child: PlaybackId, progress: f32) -> Result<()> {
        self.apply_progress(child, progress)?;
        if self.latch(child, |state| &mut state.started) {
            self.fire(child, CallbackKind::Start)?;
        }
        self.fire(child, CallbackKind::Update)?;
        if progress >= 1.0 && self.latch(child, |state| &mut state.completed) {
            self.fire(child, CallbackKind::Complete)?;
        }
        Ok(())
    }

    /// Set a flag, returning whether it was previously clear
    fn latch(&mut self, id: PlaybackId, flag: impl FnOnce(&mut PlaybackState) -> &mut bool) -> bool {
        match self.state_mut(id) {
            Some(state) => {
                let flag = flag(state);
                let was_clear = !*flag;
                *flag = true;
                was_clear
            }
            None => false,
        }
    }

    fn same_run(&self, id: PlaybackId, run: u64) -> bool {
        self.playbacks
            .get(id)
            .is_some_and(|entry| entry.state.run == run)
    }

    /// Invoke a callback with the slot emptied for the duration of the call
    fn fire(&mut self, id: PlaybackId, kind: CallbackKind) -> Result<()> {
        let Some(mut callback) = self
            .playbacks
            .get_mut(id)
            .and_then(|entry| entry.callbacks.take(kind))
        else {
            return Ok(());
        };
        trace!(?id, ?kind, "callback");
        let result = callback(self, id);
        if let Some(entry) = self.playbacks.get_mut(id) {
            entry.callbacks.restore(kind, callback);
        }
        result
    }

    // ========================================================================
    // Ticking
    // ========================================================================

    /// Advance playing roots on the variable-rate clocks
    pub fn tick(&mut self, frame: &FrameTime) -> Result<()> {
        self.tick_modes(frame, |mode| !mode.is_fixed())
    }

    /// Advance playing roots on the fixed-step clocks
    pub fn fixed_tick(&mut self, frame: &FrameTime) -> Result<()> {
        self.tick_modes(frame, TimeMode::is_fixed)
    }

    fn tick_modes(&mut self, frame: &FrameTime, include: impl Fn(&TimeMode) -> bool) -> Result<()> {
        // Playbacks started from callbacks this frame wait for the next one
        let snapshot: IdList = self.active.iter().copied().collect();
        for id in snapshot {
            let Some(entry) = self.playbacks.get(id) else {
                continue;
            };
            let mode = entry.state.time_mode;
            if !entry.state.playing || !include(&mode) {
                continue;
            }
            self.advance(id, frame.delta_for(mode))?;
        }

        let playbacks = &self.playbacks;
        self.active
            .retain(|id| playbacks.get(*id).is_some_and(|entry| entry.state.playing));
        Ok(())
    }

    /// Whether any root is still playing
    pub fn has_active_playbacks(&self) -> bool {
        self.active
            .iter()
            .any(|id| self.playbacks.get(*id).is_some_and(|e| e.state.playing))
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Dispose a playback and, for composites, all of its children
    ///
    /// Callbacks are dropped without firing. Returns `false` if the playback
    /// was already gone.
    pub fn dispose(&mut self, id: impl Into<PlaybackId>) -> bool {
        let id = id.into();
        let Some(entry) = self.playbacks.remove(id) else {
            return false;
        };
        if let Some((owner, key)) = &entry.registration {
            if self.registry.get(*owner, key) == Some(id) {
                self.registry.remove(*owner, key);
            }
        }
        self.active.retain(|active| *active != id);

        // Parents keep the dead id and report it on their next refresh
        for &parent in &entry.parents {
            if let Some(parent_entry) = self.playbacks.get_mut(parent) {
                match &mut parent_entry.kind {
                    PlaybackKind::Sequence(seq) => seq.stale = true,
                    PlaybackKind::Parallel(par) => par.stale = true,
                    _ => {}
                }
            }
            self.invalidate_ancestors(parent);
        }
        if let Some(children) = entry.kind.children() {
            for &child in children {
                if let Some(child_entry) = self.playbacks.get_mut(child) {
                    child_entry.parents.retain(|parent| *parent != id);
                }
                self.dispose(child);
            }
        }
        debug!(?id, kind = ?entry.kind.tag(), "disposed");
        true
    }

    /// Dispose the playback registered under `(owner, key)`
    pub fn clear_playback(&mut self, owner: OwnerId, key: &str) -> bool {
        match self.lookup(owner, key) {
            Some(id) => self.dispose(id),
            None => false,
        }
    }

    /// Dispose every playback registered by `owner`
    pub fn clear_playbacks(&mut self, owner: OwnerId) -> usize {
        let disposed = self
            .registry
            .owned_by(owner)
            .into_iter()
            .filter(|id| self.dispose(*id))
            .count();
        debug!(owner = owner.to_raw(), disposed, "cleared owner playbacks");
        disposed
    }

    /// Dispose everything, registered or not
    pub fn clear_all_playbacks(&mut self) -> usize {
        let ids: Vec<PlaybackId> = self.playbacks.keys().collect();
        let disposed = ids.into_iter().filter(|id| self.dispose(*id)).count();
        self.registry = Registry::new();
        self.active.clear();
        debug!(disposed, "cleared all playbacks");
        disposed
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn is_alive(&self, id: impl Into<PlaybackId>) -> bool {
        self.playbacks.contains_key(id.into())
    }

    pub fn is_playing(&self, id: impl Into<PlaybackId>) -> bool {
        self.playbacks
            .get(id.into())
            .is_some_and(|entry| entry.state.playing)
    }

    pub fn is_paused(&self, id: impl Into<PlaybackId>) -> bool {
        self.playbacks
            .get(id.into())
            .is_some_and(|entry| entry.state.paused)
    }

    /// Whether Complete fired for the latest run (or parent-driven pass)
    pub fn is_completed(&self, id: impl Into<PlaybackId>) -> bool {
        self.playbacks
            .get(id.into())
            .is_some_and(|entry| entry.state.completed)
    }

    pub fn kind(&self, id: impl Into<PlaybackId>) -> Result<PlaybackType> {
        Ok(self.entry(id.into())?.kind.tag())
    }

    /// Last applied progress, `0.0..=1.0`
    pub fn progress(&self, id: impl Into<PlaybackId>) -> Result<f32> {
        Ok(self.entry(id.into())?.state.progress)
    }

    /// Effective duration in seconds; composites report their override if set
    pub fn duration(&self, id: impl Into<PlaybackId>) -> Result<f32> {
        let id = id.into();
        let entry = self.entry(id)?;
        if let Some(duration) = entry.state.duration_override {
            return Ok(duration);
        }
        match &entry.kind {
            PlaybackKind::Sequence(seq) => seq.children.iter().map(|&c| self.duration(c)).sum(),
            PlaybackKind::Parallel(par) => par
                .children
                .iter()
                .try_fold(0.0_f32, |longest, &c| Ok(longest.max(self.duration(c)?))),
            _ => Ok(entry.state.duration),
        }
    }

    /// Position in seconds, `progress * duration`
    pub fn current_time(&self, id: impl Into<PlaybackId>) -> Result<f32> {
        let id = id.into();
        Ok(self.progress(id)? * self.duration(id)?)
    }

    pub fn time_mode(&self, id: impl Into<PlaybackId>) -> Result<TimeMode> {
        Ok(self.entry(id.into())?.state.time_mode)
    }

    /// Motion value at its current progress, if both endpoints are known
    pub fn value<T: Animatable>(&self, motion: Motion<T>) -> Result<Option<T>> {
        let id = motion.id();
        let state = &self.entry(id)?.state;
        let (progress, easing) = (state.progress, state.easing);
        Ok(self.typed_track::<T>(id)?.evaluate(progress, easing))
    }

    /// Number of live playbacks
    pub fn len(&self) -> usize {
        self.playbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playbacks.is_empty()
    }

    fn entry(&self, id: PlaybackId) -> Result<&PlaybackEntry> {
        self.playbacks.get(id).ok_or(PlaybackError::Disposed(id))
    }

    fn entry_mut(&mut self, id: PlaybackId) -> Result<&mut PlaybackEntry> {
        self.playbacks
            .get_mut(id)
            .ok_or(PlaybackError::Disposed(id))
    }
}

fn effective_duration(entry: &PlaybackEntry) -> f32 {
    match &entry.kind {
        PlaybackKind::Sequence(seq) => entry
            .state
            .duration_override
            .unwrap_or(seq.layout.timeline()),
        PlaybackKind::Parallel(par) => entry
            .state
            .duration_override
            .unwrap_or(par.layout.timeline()),
        _ => entry.state.duration,
    }
}

fn kind_name(kind: PlaybackType) -> &'static str {
    match kind {
        PlaybackType::Motion => "motion",
        PlaybackType::Timer => "timer",
        PlaybackType::Sequence => "sequence",
        PlaybackType::Parallel => "parallel",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const EPS: f32 = 1e-5;

    fn tick(scheduler: &mut PlaybackScheduler, dt: f32) {
        scheduler.tick(&FrameTime::uniform(dt)).unwrap();
    }

    #[test]
    fn test_motion_runs_to_target() {
        let mut scheduler = PlaybackScheduler::new();
        let value = Rc::new(RefCell::new(-1.0_f32));
        let sink = value.clone();
        let motion = scheduler.create_motion(move |v: f32| *sink.borrow_mut() = v);
        scheduler.play_motion(motion, 0.0, 10.0, 2.0).unwrap();

        tick(&mut scheduler, 1.0);
        assert_eq!(*value.borrow(), -1.0, "first tick is deferred");
        tick(&mut scheduler, 1.0);
        assert!((*value.borrow() - 5.0).abs() < EPS);
        tick(&mut scheduler, 1.0);
        assert!((*value.borrow() - 10.0).abs() < EPS);
        assert!(!scheduler.is_playing(motion));
        assert!(scheduler.is_completed(motion));
    }

    #[test]
    fn test_play_requires_values() {
        let mut scheduler = PlaybackScheduler::new();
        let motion = scheduler.create_motion(|_: f32| {});
        assert_eq!(
            scheduler.play(motion),
            Err(PlaybackError::Unconfigured {
                id: motion.id(),
                missing: "an initial value"
            })
        );
        scheduler.motion(motion).unwrap().set_initial_value(1.0);
        assert!(matches!(
            scheduler.play(motion),
            Err(PlaybackError::Unconfigured { missing: "a final value", .. })
        ));
    }

    #[test]
    fn test_pause_and_resume() {
        let mut scheduler = PlaybackScheduler::new();
        let timer = scheduler.create_timer(4.0);
        scheduler.play(timer).unwrap();
        tick(&mut scheduler, 0.0);
        tick(&mut scheduler, 1.0);
        scheduler.pause(timer).unwrap();
        tick(&mut scheduler, 1.0);
        assert!((scheduler.progress(timer).unwrap() - 0.25).abs() < EPS);
        assert!(scheduler.is_paused(timer));

        scheduler.resume(timer).unwrap();
        tick(&mut scheduler, 1.0);
        assert!((scheduler.progress(timer).unwrap() - 0.5).abs() < EPS);
        assert!((scheduler.current_time(timer).unwrap() - 2.0).abs() < EPS);
    }

    #[test]
    fn test_layout_goes_stale_when_child_duration_changes() {
        let mut scheduler = PlaybackScheduler::new();
        let a = scheduler.create_timer(1.0);
        let b = scheduler.create_timer(1.0);
        let seq = scheduler.create_sequence(&[a, b]).unwrap();
        let outer = scheduler.create_parallel(&[seq]).unwrap();
        assert_eq!(scheduler.sequence_layout(seq).unwrap().timeline(), 2.0);

        scheduler.set_duration(b, 3.0).unwrap();
        assert_eq!(scheduler.sequence_layout(seq).unwrap().offset(1), Some(1.0));
        assert_eq!(scheduler.sequence_layout(seq).unwrap().timeline(), 4.0);
        assert_eq!(scheduler.parallel_layout(outer).unwrap().timeline(), 4.0);
        assert_eq!(scheduler.duration(outer).unwrap(), 4.0);
    }

    #[test]
    fn test_layout_update_checks_kind() {
        let mut scheduler = PlaybackScheduler::new();
        let timer = scheduler.create_timer(1.0);
        let par = scheduler.create_parallel(&[timer]).unwrap();
        assert_eq!(scheduler.evaluate_parallel(par), Ok(()));
        assert_eq!(
            scheduler.update_sequence(par),
            Err(PlaybackError::NotAComposite(par))
        );
        assert_eq!(
            scheduler.children(timer),
            Err(PlaybackError::NotAComposite(timer))
        );
    }

    #[test]
    fn test_failed_composite_is_not_left_behind() {
        let mut scheduler = PlaybackScheduler::new();
        let timer = scheduler.create_timer(1.0);
        let result = scheduler.create_sequence(&[timer, timer]);
        assert!(matches!(result, Err(PlaybackError::Structural { .. })));
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.create_parallel(&[timer]).is_ok());
    }

    #[test]
    fn test_value_query() {
        let mut scheduler = PlaybackScheduler::new();
        let motion = scheduler.create_motion(|_: f32| {});
        assert_eq!(scheduler.value(motion), Ok(None));
        scheduler.motion(motion).unwrap().set_values(2.0, 4.0);
        scheduler.set_progress(motion, 0.5).unwrap();
        assert_eq!(scheduler.value(motion), Ok(Some(3.0)));
    }

    #[test]
    fn test_clear_all_playbacks() {
        let mut scheduler = PlaybackScheduler::new();
        let owner = OwnerId::from_raw(9);
        let a = scheduler.create_timer(1.0);
        let b = scheduler.create_timer(1.0);
        scheduler.create_sequence(&[a, b]).unwrap();
        scheduler.get_timer(owner, "delay").unwrap();

        assert_eq!(scheduler.len(), 4);
        scheduler.clear_all_playbacks();
        assert!(scheduler.is_empty());
        assert!(scheduler.registry().is_empty());
    }
}
