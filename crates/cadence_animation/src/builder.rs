//! Fluent configuration
//!
//! ```
//! use cadence_animation::{Easing, PlaybackScheduler};
//!
//! let mut scheduler = PlaybackScheduler::new();
//! let fade = scheduler.create_motion(|opacity: f32| println!("{opacity}"));
//! scheduler
//!     .motion(fade)
//!     .unwrap()
//!     .set_values(0.0, 1.0)
//!     .set_duration(0.3)
//!     .set_easing(Easing::EaseOutCubic)
//!     .on_complete(|| println!("faded in"));
//! scheduler.play(fade).unwrap();
//! ```

use crate::easing::Easing;
use crate::error::Result;
use crate::motion::{Interpolator, TypedTrack};
use crate::playback::{CallbackKind, PlaybackId};
use crate::scheduler::PlaybackScheduler;
use crate::ticker::TimeMode;
use crate::values::Animatable;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

/// Settings shared by every primitive; see [`PlaybackScheduler::configure`]
pub struct PlaybackMut<'a> {
    scheduler: &'a mut PlaybackScheduler,
    id: PlaybackId,
}

impl<'a> PlaybackMut<'a> {
    pub(crate) fn new(scheduler: &'a mut PlaybackScheduler, id: PlaybackId) -> Self {
        Self { scheduler, id }
    }

    pub fn id(&self) -> PlaybackId {
        self.id
    }

    /// Leaf duration, or the duration override of a composite
    pub fn set_duration(&mut self, duration: f32) -> &mut Self {
        self.scheduler.write_duration(self.id, duration);
        self
    }

    pub fn set_easing(&mut self, easing: Easing) -> &mut Self {
        if let Some(state) = self.scheduler.state_mut(self.id) {
            state.easing = easing;
        }
        self
    }

    pub fn set_time_mode(&mut self, mode: TimeMode) -> &mut Self {
        if let Some(state) = self.scheduler.state_mut(self.id) {
            state.time_mode = mode;
        }
        self
    }

    /// Dispose the playback once a ticked run completes
    pub fn set_auto_dispose(&mut self, auto_dispose: bool) -> &mut Self {
        if let Some(state) = self.scheduler.state_mut(self.id) {
            state.auto_dispose = auto_dispose;
        }
        self
    }

    pub fn on_start(&mut self, callback: impl FnMut() + 'static) -> &mut Self {
        self.plain(CallbackKind::Start, callback)
    }

    pub fn on_update(&mut self, callback: impl FnMut() + 'static) -> &mut Self {
        self.plain(CallbackKind::Update, callback)
    }

    pub fn on_interrupt(&mut self, callback: impl FnMut() + 'static) -> &mut Self {
        self.plain(CallbackKind::Interrupt, callback)
    }

    pub fn on_complete(&mut self, callback: impl FnMut() + 'static) -> &mut Self {
        self.plain(CallbackKind::Complete, callback)
    }

    /// Start callback with access to the scheduler
    pub fn on_start_with<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&mut PlaybackScheduler, PlaybackId) -> Result<()> + 'static,
    {
        self.with(CallbackKind::Start, callback)
    }

    pub fn on_update_with<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&mut PlaybackScheduler, PlaybackId) -> Result<()> + 'static,
    {
        self.with(CallbackKind::Update, callback)
    }

    pub fn on_interrupt_with<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&mut PlaybackScheduler, PlaybackId) -> Result<()> + 'static,
    {
        self.with(CallbackKind::Interrupt, callback)
    }

    /// Complete callback with access to the scheduler (e.g. to chain or loop)
    pub fn on_complete_with<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&mut PlaybackScheduler, PlaybackId) -> Result<()> + 'static,
    {
        self.with(CallbackKind::Complete, callback)
    }

    /// Remove one callback
    pub fn clear_callback(&mut self, kind: CallbackKind) -> &mut Self {
        self.scheduler.set_callback(self.id, kind, None);
        self
    }

    pub fn clear_callbacks(&mut self) -> &mut Self {
        self.scheduler.clear_callbacks(self.id);
        self
    }

    fn plain(&mut self, kind: CallbackKind, mut callback: impl FnMut() + 'static) -> &mut Self {
        self.with(kind, move |_, _| {
            callback();
            Ok(())
        })
    }

    fn with<F>(&mut self, kind: CallbackKind, callback: F) -> &mut Self
    where
        F: FnMut(&mut PlaybackScheduler, PlaybackId) -> Result<()> + 'static,
    {
        self.scheduler
            .set_callback(self.id, kind, Some(Box::new(callback)));
        self
    }
}

/// Typed motion settings; see [`PlaybackScheduler::motion`]
///
/// Derefs to [`PlaybackMut`] for the shared settings.
pub struct MotionMut<'a, T: Animatable> {
    inner: PlaybackMut<'a>,
    marker: PhantomData<fn() -> T>,
}

impl<'a, T: Animatable> MotionMut<'a, T> {
    pub(crate) fn new(scheduler: &'a mut PlaybackScheduler, id: PlaybackId) -> Self {
        Self {
            inner: PlaybackMut::new(scheduler, id),
            marker: PhantomData,
        }
    }

    fn track(&mut self) -> Option<&mut TypedTrack<T>> {
        self.inner.scheduler.typed_track_mut::<T>(self.inner.id).ok()
    }

    pub fn set_initial_value(&mut self, value: T) -> &mut Self {
        if let Some(track) = self.track() {
            track.initial = Some(value);
        }
        self
    }

    pub fn set_final_value(&mut self, value: T) -> &mut Self {
        if let Some(track) = self.track() {
            track.target = Some(value);
        }
        self
    }

    pub fn set_values(&mut self, initial: T, target: T) -> &mut Self {
        self.set_initial_value(initial).set_final_value(target)
    }

    /// Replace the curve + default blend with a custom function of raw progress
    pub fn set_interpolator(&mut self, interpolator: impl Fn(&T, &T, f32) -> T + 'static) -> &mut Self {
        let interpolator: Interpolator<T> = Rc::new(interpolator);
        if let Some(track) = self.track() {
            track.interpolator = Some(interpolator);
        }
        self
    }

    pub fn clear_interpolator(&mut self) -> &mut Self {
        if let Some(track) = self.track() {
            track.interpolator = None;
        }
        self
    }

    pub fn set_setter(&mut self, setter: impl FnMut(T) + 'static) -> &mut Self {
        if let Some(track) = self.track() {
            track.setter = Box::new(setter);
        }
        self
    }

    pub fn set_getter(&mut self, getter: impl Fn() -> T + 'static) -> &mut Self {
        if let Some(track) = self.track() {
            track.getter = Some(Box::new(getter));
        }
        self
    }

    /// Read the initial value from the getter each time the motion plays
    pub fn from_current(&mut self, enabled: bool) -> &mut Self {
        if let Some(track) = self.track() {
            track.from_current = enabled;
        }
        self
    }

    pub fn initial_value(&self) -> Option<&T> {
        self.inner
            .scheduler
            .typed_track::<T>(self.inner.id)
            .ok()?
            .initial
            .as_ref()
    }

    pub fn final_value(&self) -> Option<&T> {
        self.inner
            .scheduler
            .typed_track::<T>(self.inner.id)
            .ok()?
            .target
            .as_ref()
    }
}

impl<'a, T: Animatable> Deref for MotionMut<'a, T> {
    type Target = PlaybackMut<'a>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<'a, T: Animatable> DerefMut for MotionMut<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use crate::{Easing, PlaybackError, PlaybackScheduler, TimeMode};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_configure_shared_settings() {
        let mut scheduler = PlaybackScheduler::new();
        let timer = scheduler.create_timer(1.0);
        scheduler
            .configure(timer)
            .unwrap()
            .set_duration(3.0)
            .set_time_mode(TimeMode::Unscaled)
            .set_easing(Easing::EaseInQuad);

        assert_eq!(scheduler.duration(timer), Ok(3.0));
        assert_eq!(scheduler.time_mode(timer), Ok(TimeMode::Unscaled));
    }

    #[test]
    fn test_motion_values_round_trip() {
        let mut scheduler = PlaybackScheduler::new();
        let motion = scheduler.create_motion(|_: f32| {});
        let mut builder = scheduler.motion(motion).unwrap();
        builder.set_values(1.0, 2.0);
        assert_eq!(builder.initial_value(), Some(&1.0));
        assert_eq!(builder.final_value(), Some(&2.0));
    }

    #[test]
    fn test_motion_builder_checks_type() {
        let mut scheduler = PlaybackScheduler::new();
        let motion = scheduler.create_motion(|_: f32| {});
        let wrong = crate::Motion::<f64>::from_id(motion.id());
        assert!(matches!(
            scheduler.motion(wrong),
            Err(PlaybackError::TypeMismatch { .. })
        ));
        let timer = scheduler.create_timer(1.0);
        assert_eq!(
            scheduler.motion(crate::Motion::<f32>::from_id(timer)).err(),
            Some(PlaybackError::NotAMotion(timer))
        );
    }

    #[test]
    fn test_replaced_setter_receives_values() {
        let mut scheduler = PlaybackScheduler::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let motion = scheduler.create_motion(|_: f32| panic!("old setter"));
        scheduler
            .motion(motion)
            .unwrap()
            .set_values(0.0, 4.0)
            .set_setter(move |v| sink.borrow_mut().push(v));
        scheduler.set_progress(motion, 0.25).unwrap();
        assert_eq!(*seen.borrow(), vec![1.0]);
    }
}
