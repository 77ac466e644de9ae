//! Animation presets
//!
//! Parameterized curves for the common "attention" effects, plus ready-made
//! motions for entry/exit animations. The motions are created but not
//! played; chain further settings through [`PlaybackScheduler::motion`].

use crate::easing::Easing;
use crate::error::Result;
use crate::motion::Motion;
use crate::scheduler::PlaybackScheduler;
use cadence_core::Vec2;

/// Pre-built curves and motions for common patterns
pub struct AnimationPreset;

impl AnimationPreset {
    // ========================================================================
    // Curves
    // ========================================================================

    /// Decaying oscillation; `frequency` is the number of swings over the run
    pub fn shake(frequency: f32, decay: f32) -> Easing {
        Easing::Shake {
            frequency: frequency.max(0.0),
            decay: decay.max(0.0),
        }
    }

    pub fn shake_default() -> Easing {
        Self::shake(6.0, 1.5)
    }

    /// Hard on/off toggling between the endpoints
    pub fn blink(count: u32) -> Easing {
        Easing::Blink {
            count: count.max(1),
        }
    }

    /// Smooth there-and-back, `count` times
    pub fn pulse(count: u32) -> Easing {
        Easing::Pulse {
            count: count.max(1),
        }
    }

    /// Overshoot past the target and settle back; larger `amount` overshoots more
    pub fn inflate(amount: f32) -> Easing {
        Easing::Inflate {
            amount: amount.max(0.0),
        }
    }

    pub fn inflate_default() -> Easing {
        Self::inflate(1.70158)
    }

    // ========================================================================
    // Fade motions
    // ========================================================================

    /// Opacity 0 -> 1
    pub fn fade_in<F>(scheduler: &mut PlaybackScheduler, duration: f32, setter: F) -> Result<Motion<f32>>
    where
        F: FnMut(f32) + 'static,
    {
        Self::build(scheduler, setter, 0.0, 1.0, duration, Easing::EaseOutCubic)
    }

    /// Opacity 1 -> 0
    pub fn fade_out<F>(scheduler: &mut PlaybackScheduler, duration: f32, setter: F) -> Result<Motion<f32>>
    where
        F: FnMut(f32) + 'static,
    {
        Self::build(scheduler, setter, 1.0, 0.0, duration, Easing::EaseInCubic)
    }

    /// Opacity toggling `count` times, ending visible
    pub fn blink_opacity<F>(
        scheduler: &mut PlaybackScheduler,
        duration: f32,
        count: u32,
        setter: F,
    ) -> Result<Motion<f32>>
    where
        F: FnMut(f32) + 'static,
    {
        Self::build(scheduler, setter, 0.0, 1.0, duration, Self::blink(count))
    }

    // ========================================================================
    // Scale motions
    // ========================================================================

    /// Scale from zero to full size with an overshoot
    pub fn pop_in<F>(scheduler: &mut PlaybackScheduler, duration: f32, setter: F) -> Result<Motion<Vec2>>
    where
        F: FnMut(Vec2) + 'static,
    {
        Self::build(
            scheduler,
            setter,
            Vec2::ZERO,
            Vec2::ONE,
            duration,
            Self::inflate_default(),
        )
    }

    /// Scale 1 -> `peak` -> 1
    pub fn heartbeat<F>(
        scheduler: &mut PlaybackScheduler,
        duration: f32,
        peak: f32,
        setter: F,
    ) -> Result<Motion<Vec2>>
    where
        F: FnMut(Vec2) + 'static,
    {
        Self::build(
            scheduler,
            setter,
            Vec2::ONE,
            Vec2::new(peak, peak),
            duration,
            Self::pulse(1),
        )
    }

    // ========================================================================
    // Attention motions
    // ========================================================================

    /// Offset oscillating around zero, out to `amplitude`
    pub fn shake_offset<F>(
        scheduler: &mut PlaybackScheduler,
        duration: f32,
        amplitude: Vec2,
        setter: F,
    ) -> Result<Motion<Vec2>>
    where
        F: FnMut(Vec2) + 'static,
    {
        Self::build(
            scheduler,
            setter,
            Vec2::ZERO,
            amplitude,
            duration,
            Self::shake_default(),
        )
    }

    fn build<T, F>(
        scheduler: &mut PlaybackScheduler,
        setter: F,
        initial: T,
        target: T,
        duration: f32,
        easing: Easing,
    ) -> Result<Motion<T>>
    where
        T: crate::values::Animatable,
        F: FnMut(T) + 'static,
    {
        let motion = scheduler.create_motion(setter);
        scheduler
            .motion(motion)?
            .set_values(initial, target)
            .set_duration(duration)
            .set_easing(easing);
        Ok(motion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FrameTime;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_curve_parameters_are_sanitized() {
        assert_eq!(AnimationPreset::blink(0), Easing::Blink { count: 1 });
        assert_eq!(AnimationPreset::inflate(-1.0), Easing::Inflate { amount: 0.0 });
    }

    #[test]
    fn test_fade_in_reaches_opaque() {
        let mut scheduler = PlaybackScheduler::new();
        let opacity = Rc::new(RefCell::new(0.0_f32));
        let sink = opacity.clone();
        let fade = AnimationPreset::fade_in(&mut scheduler, 0.5, move |v| *sink.borrow_mut() = v).unwrap();
        scheduler.play(fade).unwrap();

        for _ in 0..4 {
            scheduler.tick(&FrameTime::uniform(0.25)).unwrap();
        }
        assert!((*opacity.borrow() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_shake_offset_rests_at_zero() {
        let mut scheduler = PlaybackScheduler::new();
        let motion =
            AnimationPreset::shake_offset(&mut scheduler, 1.0, Vec2::new(4.0, 0.0), |_| {}).unwrap();
        scheduler.set_progress(motion, 1.0).unwrap();
        assert_eq!(scheduler.value(motion).unwrap(), Some(Vec2::ZERO));
    }

    #[test]
    fn test_pop_in_overshoots() {
        let mut scheduler = PlaybackScheduler::new();
        let motion = AnimationPreset::pop_in(&mut scheduler, 1.0, |_| {}).unwrap();
        scheduler.set_progress(motion, 0.7).unwrap();
        let scale = scheduler.value(motion).unwrap().unwrap();
        assert!(scale.x > 1.0);
    }
}
