//! Scenario file handling

use anyhow::{Context, Result};
use cadence_animation::{Easing, TickConfig, TimeMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up when a directory is given
pub const SCENARIO_FILE: &str = "scenario.toml";

/// A playback tree plus the frame loop that drives it (scenario.toml)
#[derive(Debug, Deserialize, Serialize)]
pub struct Scenario {
    pub name: String,
    /// Host frame rate
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Stop after this many frames even if the root is still playing
    #[serde(default = "default_max_frames")]
    pub max_frames: u32,
    /// Print every n-th frame
    #[serde(default = "default_sample_every")]
    pub sample_every: u32,
    #[serde(default)]
    pub tick: TickConfig,
    pub root: NodeConfig,
}

fn default_fps() -> u32 {
    60
}

fn default_max_frames() -> u32 {
    3600
}

fn default_sample_every() -> u32 {
    1
}

fn default_duration() -> f32 {
    1.0
}

/// One playback in the tree
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeConfig {
    Motion(MotionNode),
    Timer(TimerNode),
    Sequence(CompositeNode),
    Parallel(CompositeNode),
}

/// Tween of a named scalar property
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MotionNode {
    pub property: String,
    pub from: f32,
    pub to: f32,
    #[serde(default = "default_duration")]
    pub duration: f32,
    #[serde(default)]
    pub easing: Option<String>,
    #[serde(default)]
    pub time_mode: Option<TimeMode>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimerNode {
    #[serde(default = "default_duration")]
    pub duration: f32,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CompositeNode {
    #[serde(default)]
    pub label: Option<String>,
    /// Rescale the whole composite to this many seconds
    #[serde(default)]
    pub duration: Option<f32>,
    #[serde(default)]
    pub easing: Option<String>,
    #[serde(default)]
    pub children: Vec<NodeConfig>,
}

/// Semantic problems a well-formed TOML file can still have
#[derive(Debug, Error, PartialEq)]
pub enum ScenarioError {
    #[error("fps must be at least 1")]
    ZeroFps,

    #[error("sample_every must be at least 1")]
    ZeroSampleInterval,

    #[error("unknown easing `{name}` at {path} (expected one of: {})", Easing::NAMES.join(", "))]
    UnknownEasing { name: String, path: String },

    #[error("duration at {path} must be a non-negative number, got {duration}")]
    InvalidDuration { duration: f32, path: String },

    #[error("tick.{field} must be {expected}, got {value}")]
    InvalidTick {
        field: &'static str,
        value: f32,
        expected: &'static str,
    },
}

impl Scenario {
    /// Load a scenario from a file, or from `scenario.toml` inside a directory
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let scenario_path = if path.is_dir() {
            path.join(SCENARIO_FILE)
        } else {
            path.to_path_buf()
        };

        if !scenario_path.exists() {
            anyhow::bail!(
                "No scenario found at {}. Run `cadence init` to create one.",
                scenario_path.display()
            );
        }

        let content = fs::read_to_string(&scenario_path)
            .with_context(|| format!("Failed to read {}", scenario_path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to load {}", scenario_path.display()))
    }

    /// Parse and validate scenario TOML
    pub fn parse(content: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(content).context("Invalid scenario TOML")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> std::result::Result<(), ScenarioError> {
        if self.fps == 0 {
            return Err(ScenarioError::ZeroFps);
        }
        if self.sample_every == 0 {
            return Err(ScenarioError::ZeroSampleInterval);
        }
        validate_tick(&self.tick)?;
        self.root.validate("root")
    }
}

fn validate_tick(tick: &TickConfig) -> std::result::Result<(), ScenarioError> {
    let positive = |v: f32| v.is_finite() && v > 0.0;
    let checks = [
        (
            "time_scale",
            tick.time_scale,
            tick.time_scale.is_finite() && tick.time_scale >= 0.0,
            "a non-negative number",
        ),
        (
            "fixed_timestep",
            tick.fixed_timestep,
            positive(tick.fixed_timestep),
            "a positive number",
        ),
        (
            "max_delta",
            tick.max_delta,
            positive(tick.max_delta),
            "a positive number",
        ),
        (
            "smoothing",
            tick.smoothing,
            (0.0..=1.0).contains(&tick.smoothing),
            "between 0 and 1",
        ),
    ];
    for (field, value, valid, expected) in checks {
        if !valid {
            return Err(ScenarioError::InvalidTick {
                field,
                value,
                expected,
            });
        }
    }
    Ok(())
}

impl NodeConfig {
    fn validate(&self, path: &str) -> std::result::Result<(), ScenarioError> {
        match self {
            NodeConfig::Motion(motion) => {
                check_duration(Some(motion.duration), path)?;
                parse_easing(motion.easing.as_deref(), path)?;
            }
            NodeConfig::Timer(timer) => check_duration(Some(timer.duration), path)?,
            NodeConfig::Sequence(node) | NodeConfig::Parallel(node) => {
                check_duration(node.duration, path)?;
                parse_easing(node.easing.as_deref(), path)?;
                for (i, child) in node.children.iter().enumerate() {
                    child.validate(&format!("{path}.children[{i}]"))?;
                }
            }
        }
        Ok(())
    }

    /// Label used in event output (motions are labelled by their property)
    pub fn label(&self) -> Option<&str> {
        match self {
            NodeConfig::Motion(motion) => Some(&motion.property),
            NodeConfig::Timer(timer) => timer.label.as_deref(),
            NodeConfig::Sequence(node) | NodeConfig::Parallel(node) => node.label.as_deref(),
        }
    }
}

fn check_duration(duration: Option<f32>, path: &str) -> std::result::Result<(), ScenarioError> {
    match duration {
        Some(d) if !(d.is_finite() && d >= 0.0) => Err(ScenarioError::InvalidDuration {
            duration: d,
            path: path.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Resolve an optional easing name; absent means linear
pub fn parse_easing(name: Option<&str>, path: &str) -> std::result::Result<Easing, ScenarioError> {
    match name {
        None => Ok(Easing::Linear),
        Some(name) => Easing::from_name(name).ok_or_else(|| ScenarioError::UnknownEasing {
            name: name.to_string(),
            path: path.to_string(),
        }),
    }
}

/// Scenario written by `cadence init`
pub const SAMPLE_SCENARIO: &str = r#"# Cadence scenario: a card entering the screen
name = "card-enter"
fps = 60
max_frames = 600
sample_every = 6

[tick]
time_scale = 1.0

[root]
kind = "sequence"
label = "enter"

[[root.children]]
kind = "timer"
label = "delay"
duration = 0.1

[[root.children]]
kind = "parallel"
label = "reveal"

[[root.children.children]]
kind = "motion"
property = "opacity"
from = 0.0
to = 1.0
duration = 0.3
easing = "ease-out"

[[root.children.children]]
kind = "motion"
property = "scale"
from = 0.8
to = 1.0
duration = 0.45
easing = "inflate"

# Shake oscillates around `from`; `to` is the amplitude
[[root.children]]
kind = "motion"
property = "nudge"
from = 0.0
to = 12.0
duration = 0.2
easing = "shake"
"#;
