//! Animatable value kinds
//!
//! Each kind supplies only its default interpolation; everything else about
//! a motion is shared. Rotations blend spherically, everything else linearly.

use cadence_core::{Color, Interpolate, Quat, SphericalInterpolate, Vec2, Vec3};

/// A value a [`Motion`](crate::motion::Motion) can drive
pub trait Animatable: Clone + 'static {
    /// Default blend from `start` to `end` at (already eased) progress `t`
    fn interpolate(start: &Self, end: &Self, t: f32) -> Self;
}

macro_rules! linear_animatable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Animatable for $ty {
                fn interpolate(start: &Self, end: &Self, t: f32) -> Self {
                    start.lerp(end, t)
                }
            }
        )*
    };
}

linear_animatable!(f32, f64, Vec2, Vec3, Color);

impl Animatable for Quat {
    fn interpolate(start: &Self, end: &Self, t: f32) -> Self {
        start.slerp(end, t)
    }
}
