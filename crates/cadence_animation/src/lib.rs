//! Cadence Animation
//!
//! A tweening and playback engine driven by a host frame loop.
//!
//! # Features
//!
//! - **Motions**: Interpolate any [`Animatable`] value into a setter
//! - **Timers**: Duration and callbacks with no value attached
//! - **Sequences / Parallels**: Compose playbacks; composites map their own
//!   progress onto their children and may override the total duration
//! - **Reuse Registry**: Look playbacks up by `(owner, key)` across frames
//! - **Time Modes**: Scaled, unscaled, smoothed and fixed-step clocks
//!
//! # Example
//!
//! ```rust
//! use cadence_animation::{FrameTime, PlaybackScheduler};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let mut scheduler = PlaybackScheduler::new();
//! let x = Rc::new(Cell::new(0.0_f32));
//! let sink = x.clone();
//! let slide = scheduler.create_motion(move |v: f32| sink.set(v));
//! scheduler.play_motion(slide, 0.0, 10.0, 2.0).unwrap();
//!
//! // The first tick after play only arms the run
//! for _ in 0..3 {
//!     scheduler.tick(&FrameTime::uniform(1.0)).unwrap();
//! }
//! assert_eq!(x.get(), 10.0);
//! ```

pub mod builder;
pub mod easing;
pub mod error;
pub mod global;
pub mod motion;
pub mod parallel;
pub mod playback;
pub mod presets;
pub mod registry;
pub mod scheduler;
pub mod sequence;
pub mod ticker;
pub mod values;

pub use builder::{MotionMut, PlaybackMut};
pub use easing::Easing;
pub use error::{PlaybackError, Result};
pub use global::{
    install_global_scheduler, is_global_scheduler_installed, shutdown_global_scheduler,
    with_global_scheduler,
};
pub use motion::{Getter, Interpolator, Motion, Setter};
pub use parallel::ParallelLayout;
pub use playback::{CallbackKind, PlaybackCallback, PlaybackId, PlaybackType};
pub use presets::AnimationPreset;
pub use registry::{OwnerId, Registry};
pub use scheduler::PlaybackScheduler;
pub use sequence::SequenceLayout;
pub use ticker::{FrameTime, TickConfig, Ticker, TimeMode};
pub use values::Animatable;

pub use cadence_core::{Color, Quat, Vec2, Vec3};
