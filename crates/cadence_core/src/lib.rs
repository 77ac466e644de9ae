//! Cadence Core
//!
//! Plain value types shared by the Cadence playback engine:
//!
//! - **Vectors**: `Vec2` and `Vec3` for positions, scales and offsets
//! - **Colors**: linear RGBA `Color`
//! - **Rotations**: unit quaternion `Quat`
//!
//! Every type knows how to blend itself through [`Interpolate`] (linear) or
//! [`SphericalInterpolate`] (rotations).
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{Interpolate, Vec2};
//!
//! let a = Vec2::new(0.0, 0.0);
//! let b = Vec2::new(10.0, 20.0);
//! assert_eq!(a.lerp(&b, 0.5), Vec2::new(5.0, 10.0));
//! ```

pub mod types;

pub use types::{Color, Interpolate, Quat, SphericalInterpolate, Vec2, Vec3};
