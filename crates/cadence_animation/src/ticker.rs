//! Tick driver adapter
//!
//! The host calls back once per frame with a raw delta. [`Ticker`] turns that
//! into one delta per [`TimeMode`] and runs any fixed steps that came due.

use crate::error::Result;
use crate::scheduler::PlaybackScheduler;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Which clock a playback advances on
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeMode {
    /// Frame delta scaled by the host time scale
    #[default]
    Normal,
    /// Frame delta ignoring the time scale
    Unscaled,
    /// Exponentially smoothed scaled delta
    Smooth,
    /// Fixed timestep scaled by the host time scale
    Fixed,
    /// Fixed timestep ignoring the time scale
    FixedUnscaled,
}

impl TimeMode {
    pub const ALL: [TimeMode; 5] = [
        TimeMode::Normal,
        TimeMode::Unscaled,
        TimeMode::Smooth,
        TimeMode::Fixed,
        TimeMode::FixedUnscaled,
    ];

    /// Whether this mode is advanced by `fixed_tick` instead of `tick`
    pub fn is_fixed(&self) -> bool {
        matches!(self, TimeMode::Fixed | TimeMode::FixedUnscaled)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimeMode::Normal => "normal",
            TimeMode::Unscaled => "unscaled",
            TimeMode::Smooth => "smooth",
            TimeMode::Fixed => "fixed",
            TimeMode::FixedUnscaled => "fixed-unscaled",
        }
    }
}

/// Deltas for one host frame, one per time source (seconds)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameTime {
    pub delta: f32,
    pub unscaled_delta: f32,
    pub smooth_delta: f32,
    pub fixed_delta: f32,
    pub fixed_unscaled_delta: f32,
}

impl FrameTime {
    /// Same delta for every time source
    pub fn uniform(dt: f32) -> Self {
        Self {
            delta: dt,
            unscaled_delta: dt,
            smooth_delta: dt,
            fixed_delta: dt,
            fixed_unscaled_delta: dt,
        }
    }

    pub fn delta_for(&self, mode: TimeMode) -> f32 {
        match mode {
            TimeMode::Normal => self.delta,
            TimeMode::Unscaled => self.unscaled_delta,
            TimeMode::Smooth => self.smooth_delta,
            TimeMode::Fixed => self.fixed_delta,
            TimeMode::FixedUnscaled => self.fixed_unscaled_delta,
        }
    }
}

/// Host clock configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickConfig {
    /// Multiplier applied to scaled time sources
    #[serde(default = "default_time_scale")]
    pub time_scale: f32,
    /// Weight of the newest frame in the smoothed delta (0..=1)
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    /// Fixed step length in seconds
    #[serde(default = "default_fixed_timestep")]
    pub fixed_timestep: f32,
    /// Raw deltas above this are clamped (hitch protection)
    #[serde(default = "default_max_delta")]
    pub max_delta: f32,
    /// Upper bound on fixed steps run for a single frame
    #[serde(default = "default_max_fixed_steps")]
    pub max_fixed_steps: u32,
}

fn default_time_scale() -> f32 {
    1.0
}

fn default_smoothing() -> f32 {
    0.2
}

fn default_fixed_timestep() -> f32 {
    0.02
}

fn default_max_delta() -> f32 {
    0.25
}

fn default_max_fixed_steps() -> u32 {
    8
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            time_scale: default_time_scale(),
            smoothing: default_smoothing(),
            fixed_timestep: default_fixed_timestep(),
            max_delta: default_max_delta(),
            max_fixed_steps: default_max_fixed_steps(),
        }
    }
}

/// Converts host frames into [`FrameTime`]s and drives a scheduler
#[derive(Clone, Debug)]
pub struct Ticker {
    config: TickConfig,
    smooth_delta: Option<f32>,
    fixed_accumulator: f32,
    last_frame: Option<Instant>,
}

impl Ticker {
    pub fn new(config: TickConfig) -> Self {
        Self {
            config,
            smooth_delta: None,
            fixed_accumulator: 0.0,
            last_frame: None,
        }
    }

    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.config.time_scale = non_negative(scale);
    }

    /// Build the frame deltas for a raw host delta and bank fixed-step time
    ///
    /// Negative or non-finite deltas count as zero, so one bad host frame
    /// cannot poison the smoothed delta or the fixed-step accumulator.
    pub fn frame(&mut self, raw_dt: f32) -> FrameTime {
        // `max` maps a NaN limit to 0; an infinite limit disables the clamp
        let raw = non_negative(raw_dt).min(self.config.max_delta.max(0.0));
        let scale = non_negative(self.config.time_scale);
        let step = non_negative(self.config.fixed_timestep);
        let scaled = raw * scale;

        let weight = if self.config.smoothing.is_nan() {
            1.0
        } else {
            self.config.smoothing.clamp(0.0, 1.0)
        };
        let smooth = match self.smooth_delta {
            Some(prev) => prev + (scaled - prev) * weight,
            None => scaled,
        };
        self.smooth_delta = Some(smooth);

        self.fixed_accumulator += raw;

        FrameTime {
            delta: scaled,
            unscaled_delta: raw,
            smooth_delta: smooth,
            fixed_delta: step * scale,
            fixed_unscaled_delta: step,
        }
    }

    /// Like [`Ticker::frame`], measuring the delta from the previous call
    pub fn frame_now(&mut self) -> FrameTime {
        let now = Instant::now();
        let raw = self
            .last_frame
            .map(|last| (now - last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_frame = Some(now);
        self.frame(raw)
    }

    /// Number of fixed steps now due; consumes their time from the accumulator
    pub fn take_fixed_steps(&mut self) -> u32 {
        let step = non_negative(self.config.fixed_timestep);
        if step <= 0.0 {
            self.fixed_accumulator = 0.0;
            return 0;
        }

        let mut steps = 0;
        while self.fixed_accumulator >= step && steps < self.config.max_fixed_steps {
            self.fixed_accumulator -= step;
            steps += 1;
        }
        if steps == self.config.max_fixed_steps {
            // Drop the backlog instead of spiralling
            self.fixed_accumulator = self.fixed_accumulator.min(step);
        }
        steps
    }

    /// Run one host frame: due fixed steps first, then the variable-rate tick
    pub fn drive(&mut self, scheduler: &mut PlaybackScheduler, raw_dt: f32) -> Result<FrameTime> {
        let frame = self.frame(raw_dt);
        let steps = self.take_fixed_steps();
        for _ in 0..steps {
            scheduler.fixed_tick(&frame)?;
        }
        scheduler.tick(&frame)?;
        tracing::trace!(raw_dt, fixed_steps = steps, "ticker frame");
        Ok(frame)
    }
}

fn non_negative(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new(TickConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_scale_only_affects_scaled_sources() {
        let mut ticker = Ticker::new(TickConfig {
            time_scale: 0.5,
            ..TickConfig::default()
        });
        let frame = ticker.frame(0.1);

        assert!((frame.delta - 0.05).abs() < 1e-6);
        assert!((frame.unscaled_delta - 0.1).abs() < 1e-6);
        assert!((frame.fixed_delta - 0.01).abs() < 1e-6);
        assert!((frame.fixed_unscaled_delta - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_smooth_delta_converges() {
        let mut ticker = Ticker::new(TickConfig {
            smoothing: 0.5,
            ..TickConfig::default()
        });
        assert!((ticker.frame(0.1).smooth_delta - 0.1).abs() < 1e-6);
        // A hitch is only half absorbed
        assert!((ticker.frame(0.2).smooth_delta - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_hitch_is_clamped() {
        let mut ticker = Ticker::default();
        let frame = ticker.frame(5.0);
        assert!((frame.unscaled_delta - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_fixed_steps_accumulate() {
        let mut ticker = Ticker::default();
        ticker.frame(0.015);
        assert_eq!(ticker.take_fixed_steps(), 0);
        ticker.frame(0.015);
        assert_eq!(ticker.take_fixed_steps(), 1);
        ticker.frame(0.045);
        assert_eq!(ticker.take_fixed_steps(), 2);
    }

    #[test]
    fn test_fixed_steps_are_capped() {
        let mut ticker = Ticker::new(TickConfig {
            max_fixed_steps: 2,
            ..TickConfig::default()
        });
        ticker.frame(0.25);
        assert_eq!(ticker.take_fixed_steps(), 2);
        assert!(ticker.fixed_accumulator <= 0.02 + 1e-6);
    }

    #[test]
    fn test_out_of_range_config_does_not_panic() {
        let mut ticker = Ticker::new(TickConfig {
            max_delta: -1.0,
            time_scale: f32::NAN,
            fixed_timestep: -0.5,
            smoothing: f32::NAN,
            ..TickConfig::default()
        });
        let frame = ticker.frame(0.016);
        assert_eq!(frame.unscaled_delta, 0.0);
        assert_eq!(frame.delta, 0.0);
        assert_eq!(frame.fixed_unscaled_delta, 0.0);
        assert_eq!(ticker.take_fixed_steps(), 0);

        let mut ticker = Ticker::new(TickConfig {
            max_delta: f32::NAN,
            ..TickConfig::default()
        });
        assert_eq!(ticker.frame(0.016).unscaled_delta, 0.0);
    }

    #[test]
    fn test_bad_host_delta_counts_as_zero() {
        let mut ticker = Ticker::default();
        ticker.frame(0.01);
        for bad in [f32::NAN, f32::INFINITY, -0.5] {
            let frame = ticker.frame(bad);
            assert_eq!(frame.unscaled_delta, 0.0);
            assert!(frame.smooth_delta.is_finite());
        }
        assert!(ticker.fixed_accumulator.is_finite());
        assert!((ticker.fixed_accumulator - 0.01).abs() < 1e-6);

        ticker.frame(0.015);
        assert_eq!(ticker.take_fixed_steps(), 1);
    }

    #[test]
    fn test_smooth_and_fixed_clocks_recover_after_nan_frame() {
        let mut scheduler = PlaybackScheduler::new();
        let smooth = scheduler.create_timer(1.0);
        let fixed = scheduler.create_timer(1.0);
        scheduler
            .configure(smooth)
            .unwrap()
            .set_time_mode(TimeMode::Smooth);
        scheduler
            .configure(fixed)
            .unwrap()
            .set_time_mode(TimeMode::Fixed);
        scheduler.play(smooth).unwrap();
        scheduler.play(fixed).unwrap();

        let mut ticker = Ticker::default();
        ticker.drive(&mut scheduler, 0.016).unwrap();
        ticker.drive(&mut scheduler, f32::NAN).unwrap();
        for _ in 0..200 {
            ticker.drive(&mut scheduler, 0.016).unwrap();
        }

        assert!(scheduler.is_completed(smooth));
        assert!(scheduler.is_completed(fixed));
    }

    #[test]
    fn test_delta_for_mode() {
        let frame = FrameTime {
            delta: 1.0,
            unscaled_delta: 2.0,
            smooth_delta: 3.0,
            fixed_delta: 4.0,
            fixed_unscaled_delta: 5.0,
        };
        let deltas: Vec<f32> = TimeMode::ALL.iter().map(|m| frame.delta_for(*m)).collect();
        assert_eq!(deltas, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }
}
