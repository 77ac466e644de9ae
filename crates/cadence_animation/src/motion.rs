//! Motions
//!
//! A motion interpolates a typed value from an initial to a final value and
//! pushes each result into a user-supplied setter. The scheduler stores the
//! typed track behind [`MotionTrack`] so motions of every value kind share one
//! arena; [`Motion<T>`] keeps the value type on the handle side.

use crate::easing::Easing;
use crate::playback::PlaybackId;
use crate::values::Animatable;
use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

/// Custom blend replacing the curve + [`Animatable::interpolate`] pipeline
///
/// Receives the raw (un-eased) progress.
pub type Interpolator<T> = Rc<dyn Fn(&T, &T, f32) -> T>;

/// Receives every evaluated value
pub type Setter<T> = Box<dyn FnMut(T)>;

/// Reads the property's live value (used when starting from the current value)
pub type Getter<T> = Box<dyn Fn() -> T>;

/// Typed handle to a motion in a [`PlaybackScheduler`](crate::PlaybackScheduler)
pub struct Motion<T> {
    id: PlaybackId,
    marker: PhantomData<fn() -> T>,
}

impl<T> Motion<T> {
    pub(crate) fn from_id(id: PlaybackId) -> Self {
        Self {
            id,
            marker: PhantomData,
        }
    }

    pub fn id(&self) -> PlaybackId {
        self.id
    }
}

impl<T> Clone for Motion<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Motion<T> {}

impl<T> PartialEq for Motion<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Motion<T> {}

impl<T> fmt::Debug for Motion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Motion")
            .field("id", &self.id)
            .field("value", &type_name::<T>())
            .finish()
    }
}

impl<T> From<Motion<T>> for PlaybackId {
    fn from(motion: Motion<T>) -> Self {
        motion.id
    }
}

/// Type-erased view of a motion's value pipeline
pub(crate) trait MotionTrack: Any {
    /// Evaluate at `progress` and push the value into the setter
    ///
    /// Returns the name of the missing piece if the motion is not playable.
    fn apply(&mut self, progress: f32, easing: Easing) -> Result<(), &'static str>;

    /// What stops the motion from playing, if anything
    fn missing(&self) -> Option<&'static str>;

    /// Refresh the initial value from the getter when starting from current
    fn capture_initial(&mut self);

    fn value_type(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) struct TypedTrack<T: Animatable> {
    pub initial: Option<T>,
    pub target: Option<T>,
    pub interpolator: Option<Interpolator<T>>,
    pub setter: Setter<T>,
    pub getter: Option<Getter<T>>,
    pub from_current: bool,
}

impl<T: Animatable> TypedTrack<T> {
    pub fn new(setter: Setter<T>) -> Self {
        Self {
            initial: None,
            target: None,
            interpolator: None,
            setter,
            getter: None,
            from_current: false,
        }
    }

    /// Value at `progress`, without touching the setter
    pub fn evaluate(&self, progress: f32, easing: Easing) -> Option<T> {
        let (start, end) = (self.initial.as_ref()?, self.target.as_ref()?);
        let value = match &self.interpolator {
            Some(interpolate) => interpolate(start, end, progress),
            None => T::interpolate(start, end, easing.apply(progress)),
        };
        Some(value)
    }
}

impl<T: Animatable> MotionTrack for TypedTrack<T> {
    fn apply(&mut self, progress: f32, easing: Easing) -> Result<(), &'static str> {
        if let Some(missing) = self.missing() {
            return Err(missing);
        }
        let value = self.evaluate(progress, easing).ok_or("an initial value")?;
        (self.setter)(value);
        Ok(())
    }

    fn missing(&self) -> Option<&'static str> {
        let can_capture = self.from_current && self.getter.is_some();
        if self.initial.is_none() && !can_capture {
            Some("an initial value")
        } else if self.target.is_none() {
            Some("a final value")
        } else {
            None
        }
    }

    fn capture_initial(&mut self) {
        if !self.from_current {
            return;
        }
        if let Some(getter) = &self.getter {
            self.initial = Some(getter());
        }
    }

    fn value_type(&self) -> &'static str {
        type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recording_track(log: &Rc<RefCell<Vec<f32>>>) -> TypedTrack<f32> {
        let log = log.clone();
        TypedTrack::new(Box::new(move |v| log.borrow_mut().push(v)))
    }

    #[test]
    fn test_apply_uses_curve() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut track = recording_track(&log);
        track.initial = Some(0.0);
        track.target = Some(10.0);

        track.apply(0.5, Easing::EaseInQuad).unwrap();
        assert!((log.borrow()[0] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_interpolator_gets_raw_progress() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut track = recording_track(&log);
        track.initial = Some(0.0);
        track.target = Some(10.0);
        track.interpolator = Some(Rc::new(|a: &f32, b: &f32, t: f32| a + (b - a) * t * 0.5));

        track.apply(1.0, Easing::EaseInQuad).unwrap();
        assert!((log.borrow()[0] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_values() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut track = recording_track(&log);
        assert_eq!(track.missing(), Some("an initial value"));
        track.initial = Some(1.0);
        assert_eq!(track.missing(), Some("a final value"));
        track.target = Some(2.0);
        assert_eq!(track.missing(), None);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_capture_initial_from_getter() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut track = recording_track(&log);
        track.getter = Some(Box::new(|| 7.0));
        track.target = Some(0.0);
        assert_eq!(track.missing(), Some("an initial value"));

        track.from_current = true;
        assert_eq!(track.missing(), None);
        track.capture_initial();
        assert_eq!(track.initial, Some(7.0));
    }
}
