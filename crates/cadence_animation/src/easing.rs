//! Easing curves
//!
//! An [`Easing`] reshapes normalized progress before a value is interpolated.
//! Curves may leave `0.0..=1.0` (shake, inflate); motions extrapolate
//! through [`Animatable::interpolate`](crate::values::Animatable::interpolate)
//! in that case.

use std::f32::consts::PI;

/// Easing curve applied to normalized progress
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Easing {
    #[default]
    Linear,
    EaseInQuad,
    EaseOutQuad,
    EaseInOutQuad,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
    EaseInQuart,
    EaseOutQuart,
    EaseInOutQuart,
    /// Back-out style overshoot, see [`AnimationPreset::inflate`](crate::presets::AnimationPreset::inflate)
    Inflate { amount: f32 },
    /// Decaying oscillation around the start value
    Shake { frequency: f32, decay: f32 },
    /// Square wave between start and end, `count` on/off cycles
    Blink { count: u32 },
    /// Start -> end -> start, `count` times
    Pulse { count: u32 },
    CubicBezier(f32, f32, f32, f32),
}

impl Easing {
    /// Names accepted by [`Easing::from_name`]
    pub const NAMES: &'static [&'static str] = &[
        "linear",
        "ease-in-quad",
        "ease-out-quad",
        "ease-in-out-quad",
        "ease-in-cubic",
        "ease-out-cubic",
        "ease-in-out-cubic",
        "ease-in-quart",
        "ease-out-quart",
        "ease-in-out-quart",
        "ease-in",
        "ease-out",
        "ease-in-out",
        "inflate",
        "shake",
        "blink",
        "pulse",
    ];

    /// Apply the easing function to a progress value (0.0 to 1.0)
    pub fn apply(&self, t: f32) -> f32 {
        match *self {
            Easing::Linear => t,
            Easing::EaseInQuad => t * t,
            Easing::EaseOutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Easing::EaseInCubic => t * t * t,
            Easing::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::EaseInQuart => t * t * t * t,
            Easing::EaseOutQuart => 1.0 - (1.0 - t).powi(4),
            Easing::EaseInOutQuart => {
                if t < 0.5 {
                    8.0 * t * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(4) / 2.0
                }
            }
            Easing::Inflate { amount } => {
                let c3 = amount + 1.0;
                let u = t - 1.0;
                1.0 + c3 * u * u * u + amount * u * u
            }
            Easing::Shake { frequency, decay } => {
                if t <= 0.0 || t >= 1.0 {
                    return 0.0;
                }
                (2.0 * PI * frequency * t).sin() * (1.0 - t).powf(decay)
            }
            Easing::Blink { count } => {
                if t >= 1.0 {
                    return 1.0;
                }
                let phase = (t.max(0.0) * count.max(1) as f32 * 2.0).floor() as u32;
                if phase % 2 == 0 {
                    0.0
                } else {
                    1.0
                }
            }
            Easing::Pulse { count } => {
                let s = (PI * count.max(1) as f32 * t).sin();
                s * s
            }
            Easing::CubicBezier(x1, y1, x2, y2) => cubic_bezier_ease(t, x1, y1, x2, y2),
        }
    }

    /// Parse a kebab-case curve name. Parameterized curves get their preset defaults.
    pub fn from_name(name: &str) -> Option<Self> {
        let easing = match name {
            "linear" => Easing::Linear,
            "ease-in-quad" => Easing::EaseInQuad,
            "ease-out-quad" => Easing::EaseOutQuad,
            "ease-in-out-quad" => Easing::EaseInOutQuad,
            "ease-in-cubic" | "ease-in" => Easing::EaseInCubic,
            "ease-out-cubic" | "ease-out" => Easing::EaseOutCubic,
            "ease-in-out-cubic" | "ease-in-out" => Easing::EaseInOutCubic,
            "ease-in-quart" => Easing::EaseInQuart,
            "ease-out-quart" => Easing::EaseOutQuart,
            "ease-in-out-quart" => Easing::EaseInOutQuart,
            "inflate" => crate::presets::AnimationPreset::inflate_default(),
            "shake" => crate::presets::AnimationPreset::shake_default(),
            "blink" => crate::presets::AnimationPreset::blink(3),
            "pulse" => crate::presets::AnimationPreset::pulse(1),
            _ => return None,
        };
        Some(easing)
    }
}

/// Cubic bezier easing (CSS `cubic-bezier()` semantics)
///
/// Newton-Raphson on the x curve, with bisection when the slope flattens out.
fn cubic_bezier_ease(t: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }

    let target = t as f64;
    let (x1, y1, x2, y2) = (x1 as f64, y1 as f64, x2 as f64, y2 as f64);

    let mut p = target;
    for _ in 0..8 {
        let err = bezier_sample(p, x1, x2) - target;
        if err.abs() < 1e-7 {
            return bezier_sample(p, y1, y2) as f32;
        }
        let slope = bezier_slope(p, x1, x2);
        if slope.abs() < 1e-7 {
            break;
        }
        p -= err / slope;
    }

    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    p = target;
    for _ in 0..20 {
        let x = bezier_sample(p, x1, x2);
        if (x - target).abs() < 1e-7 {
            break;
        }
        if x < target {
            lo = p;
        } else {
            hi = p;
        }
        p = (lo + hi) * 0.5;
    }

    bezier_sample(p, y1, y2) as f32
}

/// B(t) = 3(1-t)²t·p1 + 3(1-t)t²·p2 + t³ in Horner form
#[inline]
fn bezier_sample(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    ((a * t + b) * t + c) * t
}

#[inline]
fn bezier_slope(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    (3.0 * a * t + 2.0 * b) * t + c
}
