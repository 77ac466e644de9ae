//! Plays a scenario headlessly and records what happened

use crate::config::{parse_easing, CompositeNode, MotionNode, NodeConfig, Scenario};
use anyhow::Result;
use cadence_animation::{CallbackKind, PlaybackId, PlaybackScheduler, Ticker};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::debug;

/// Property values at the end of a frame
#[derive(Debug, Clone)]
pub struct Sample {
    pub frame: u32,
    pub time: f32,
    pub values: Vec<(String, f32)>,
}

/// A lifecycle callback that fired on a labelled node
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub frame: u32,
    pub label: String,
    pub kind: CallbackKind,
}

#[derive(Debug)]
pub struct Report {
    pub name: String,
    /// Final value of every property, in declaration order
    pub properties: IndexMap<String, f32>,
    pub samples: Vec<Sample>,
    pub events: Vec<Event>,
    pub frames: u32,
    /// The root completed before `max_frames`
    pub finished: bool,
}

/// Shared sinks the playback callbacks write into
struct Recorder {
    properties: Rc<RefCell<IndexMap<String, f32>>>,
    events: Rc<RefCell<Vec<Event>>>,
    frame: Rc<Cell<u32>>,
}

impl Recorder {
    fn new() -> Self {
        Self {
            properties: Rc::new(RefCell::new(IndexMap::new())),
            events: Rc::new(RefCell::new(Vec::new())),
            frame: Rc::new(Cell::new(0)),
        }
    }

    fn snapshot(&self, time: f32) -> Sample {
        Sample {
            frame: self.frame.get(),
            time,
            values: self
                .properties
                .borrow()
                .iter()
                .map(|(name, value)| (name.clone(), *value))
                .collect(),
        }
    }

    fn listener(&self, label: &str, kind: CallbackKind) -> impl FnMut() + 'static {
        let events = self.events.clone();
        let frame = self.frame.clone();
        let label = label.to_string();
        move || {
            events.borrow_mut().push(Event {
                frame: frame.get(),
                label: label.clone(),
                kind,
            })
        }
    }

    fn observe(&self, scheduler: &mut PlaybackScheduler, id: PlaybackId, label: &str) -> Result<()> {
        scheduler
            .configure(id)?
            .on_start(self.listener(label, CallbackKind::Start))
            .on_interrupt(self.listener(label, CallbackKind::Interrupt))
            .on_complete(self.listener(label, CallbackKind::Complete));
        Ok(())
    }
}

/// Play `scenario` from its first frame until the root completes or `max_frames` runs out
pub fn run(scenario: &Scenario) -> Result<Report> {
    let mut scheduler = PlaybackScheduler::new();
    let recorder = Recorder::new();
    let root = build(&mut scheduler, &recorder, &scenario.root, "root")?;

    debug!(
        scenario = %scenario.name,
        playbacks = scheduler.len(),
        duration = scheduler.duration(root)?,
        "scenario built"
    );

    let mut ticker = Ticker::new(scenario.tick.clone());
    let dt = 1.0 / scenario.fps as f32;
    let mut time = 0.0;
    let mut samples = Vec::new();

    scheduler.play(root)?;
    while scheduler.is_playing(root) && recorder.frame.get() < scenario.max_frames {
        recorder.frame.set(recorder.frame.get() + 1);
        time += ticker.drive(&mut scheduler, dt)?.delta;

        let frame = recorder.frame.get();
        if frame % scenario.sample_every == 0 || !scheduler.is_playing(root) {
            samples.push(recorder.snapshot(time));
        }
    }

    let finished = scheduler.is_completed(root);
    let frames = recorder.frame.get();
    debug!(frames, finished, "scenario stopped");
    scheduler.clear_all_playbacks();

    let properties = recorder.properties.borrow().clone();
    let events = recorder.events.borrow().clone();
    Ok(Report {
        name: scenario.name.clone(),
        properties,
        samples,
        events,
        frames,
        finished,
    })
}

fn build(
    scheduler: &mut PlaybackScheduler,
    recorder: &Recorder,
    node: &NodeConfig,
    path: &str,
) -> Result<PlaybackId> {
    let id = match node {
        NodeConfig::Motion(motion) => build_motion(scheduler, recorder, motion, path)?,
        NodeConfig::Timer(timer) => scheduler.create_timer(timer.duration),
        NodeConfig::Sequence(composite) => {
            let children = build_children(scheduler, recorder, composite, path)?;
            let id = scheduler.create_sequence(&children)?;
            configure_composite(scheduler, id, composite, path)?;
            id
        }
        NodeConfig::Parallel(composite) => {
            let children = build_children(scheduler, recorder, composite, path)?;
            let id = scheduler.create_parallel(&children)?;
            configure_composite(scheduler, id, composite, path)?;
            id
        }
    };

    if let Some(label) = node.label() {
        recorder.observe(scheduler, id, label)?;
    }
    Ok(id)
}

fn build_motion(
    scheduler: &mut PlaybackScheduler,
    recorder: &Recorder,
    node: &MotionNode,
    path: &str,
) -> Result<PlaybackId> {
    let easing = parse_easing(node.easing.as_deref(), path)?;
    recorder
        .properties
        .borrow_mut()
        .insert(node.property.clone(), node.from);

    let properties = recorder.properties.clone();
    let property = node.property.clone();
    let motion = scheduler.create_motion(move |value: f32| {
        properties.borrow_mut().insert(property.clone(), value);
    });

    let mut handle = scheduler.motion(motion)?;
    handle
        .set_values(node.from, node.to)
        .set_duration(node.duration)
        .set_easing(easing);
    if let Some(mode) = node.time_mode {
        handle.set_time_mode(mode);
    }
    Ok(motion.id())
}

fn build_children(
    scheduler: &mut PlaybackScheduler,
    recorder: &Recorder,
    node: &CompositeNode,
    path: &str,
) -> Result<Vec<PlaybackId>> {
    node.children
        .iter()
        .enumerate()
        .map(|(i, child)| build(scheduler, recorder, child, &format!("{path}.children[{i}]")))
        .collect()
}

fn configure_composite(
    scheduler: &mut PlaybackScheduler,
    id: PlaybackId,
    node: &CompositeNode,
    path: &str,
) -> Result<()> {
    let easing = parse_easing(node.easing.as_deref(), path)?;
    let mut handle = scheduler.configure(id)?;
    handle.set_easing(easing);
    if let Some(duration) = node.duration {
        handle.set_duration(duration);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SAMPLE_SCENARIO;

    fn labels(report: &Report) -> Vec<String> {
        report
            .events
            .iter()
            .map(|e| format!("{}:{}", e.label, e.kind.name()))
            .collect()
    }

    #[test]
    fn test_sample_runs_to_completion() {
        let scenario = Scenario::parse(SAMPLE_SCENARIO).unwrap();
        let report = run(&scenario).unwrap();

        assert!(report.finished);
        assert!(report.frames < scenario.max_frames);
        assert!((report.properties["opacity"] - 1.0).abs() < 1e-4);
        assert!((report.properties["scale"] - 1.0).abs() < 1e-4);
        assert!(report.properties["nudge"].abs() < 1e-4);
        assert_eq!(
            report.properties.keys().collect::<Vec<_>>(),
            ["opacity", "scale", "nudge"]
        );

        let events = labels(&report);
        assert_eq!(events.first().map(String::as_str), Some("delay:start"));
        assert_eq!(events.last().map(String::as_str), Some("enter:complete"));
        assert!(!events.iter().any(|e| e.ends_with(":interrupt")));

        // Final frame is always sampled
        assert_eq!(report.samples.last().map(|s| s.frame), Some(report.frames));
    }

    #[test]
    fn test_children_complete_in_order() {
        let scenario = Scenario::parse(SAMPLE_SCENARIO).unwrap();
        let report = run(&scenario).unwrap();
        let completions: Vec<_> = report
            .events
            .iter()
            .filter(|e| e.kind == CallbackKind::Complete)
            .map(|e| e.label.as_str())
            .collect();
        assert_eq!(
            completions,
            ["delay", "opacity", "scale", "reveal", "nudge", "enter"]
        );
    }

    #[test]
    fn test_max_frames_cuts_the_run_short() {
        let mut scenario = Scenario::parse(SAMPLE_SCENARIO).unwrap();
        scenario.max_frames = 3;
        let report = run(&scenario).unwrap();

        assert!(!report.finished);
        assert_eq!(report.frames, 3);
        assert!(!labels(&report).contains(&"enter:complete".to_string()));
    }

    #[test]
    fn test_composite_duration_override_rescales() {
        let scenario = Scenario::parse(
            r#"
            name = "slow"
            fps = 8

            [root]
            kind = "sequence"
            label = "all"
            duration = 2.0

            [[root.children]]
            kind = "motion"
            property = "x"
            from = 0.0
            to = 10.0
            duration = 0.5
            "#,
        )
        .unwrap();
        let report = run(&scenario).unwrap();

        assert!(report.finished);
        // One arming frame plus sixteen 0.125s frames
        assert_eq!(report.frames, 17);
        assert!((report.properties["x"] - 10.0).abs() < 1e-4);
    }
}
