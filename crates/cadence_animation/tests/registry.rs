//! Integration tests for keyed reuse and teardown
//!
//! These tests verify that:
//! - Repeated lookups under one key return the same playback
//! - Owner-level teardown disposes exactly that owner's playbacks
//! - The per-thread global scheduler is inert until installed

use cadence_animation::{
    install_global_scheduler, shutdown_global_scheduler, with_global_scheduler, FrameTime,
    OwnerId, PlaybackError, PlaybackScheduler, Vec2,
};
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_reuse_returns_same_motion() {
    let mut scheduler = PlaybackScheduler::new();
    let owner = OwnerId::next();
    let first = scheduler.get_motion(owner, "fade", |_: f32| {}).unwrap();
    scheduler.motion(first).unwrap().set_values(0.0, 1.0);

    let value = Rc::new(Cell::new(0.0_f32));
    let sink = value.clone();
    let second = scheduler
        .get_motion(owner, "fade", move |v: f32| sink.set(v))
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(scheduler.len(), 1);
    // Settings survive the lookup; only the setter is re-bound
    scheduler.set_progress(second, 0.5).unwrap();
    assert!((value.get() - 0.5).abs() < 1e-6);
}

#[test]
fn test_reuse_keeps_a_running_motion_running() {
    let mut scheduler = PlaybackScheduler::new();
    let owner = OwnerId::next();
    let motion = scheduler.get_motion(owner, "slide", |_: f32| {}).unwrap();
    scheduler.play_motion(motion, 0.0, 1.0, 1.0).unwrap();
    scheduler.tick(&FrameTime::uniform(0.25)).unwrap();
    scheduler.tick(&FrameTime::uniform(0.25)).unwrap();

    let again = scheduler.get_motion(owner, "slide", |_: f32| {}).unwrap();
    assert!(scheduler.is_playing(again));
    assert!((scheduler.progress(again).unwrap() - 0.25).abs() < 1e-6);
}

#[test]
fn test_reuse_with_other_type_is_rejected() {
    let mut scheduler = PlaybackScheduler::new();
    let owner = OwnerId::next();
    let motion = scheduler.get_motion(owner, "offset", |_: f32| {}).unwrap();

    let err = scheduler
        .get_motion(owner, "offset", |_: Vec2| {})
        .unwrap_err();
    assert!(matches!(err, PlaybackError::TypeMismatch { id, .. } if id == motion.id()));

    assert!(matches!(
        scheduler.get_timer(owner, "offset"),
        Err(PlaybackError::TypeMismatch { .. })
    ));
}

#[test]
fn test_keys_are_scoped_per_owner() {
    let mut scheduler = PlaybackScheduler::new();
    let (left, right) = (OwnerId::from_key("left"), OwnerId::from_key("right"));
    let a = scheduler.get_timer(left, "delay").unwrap();
    let b = scheduler.get_timer(right, "delay").unwrap();
    assert_ne!(a, b);
    assert_eq!(scheduler.get_timer(left, "delay"), Ok(a));
    assert_eq!(scheduler.registry().owner_count(), 2);
}

#[test]
fn test_composite_hit_ignores_new_items() {
    let mut scheduler = PlaybackScheduler::new();
    let owner = OwnerId::next();
    let a = scheduler.create_timer(1.0);
    let b = scheduler.create_timer(2.0);
    let seq = scheduler.get_sequence(owner, "intro", &[a]).unwrap();

    assert_eq!(scheduler.get_sequence(owner, "intro", &[a, b]), Ok(seq));
    assert_eq!(scheduler.children(seq), Ok(&[a][..]));
    assert!(matches!(
        scheduler.get_parallel(owner, "intro", &[b]),
        Err(PlaybackError::TypeMismatch { .. })
    ));
}

#[test]
fn test_dispose_frees_the_key() {
    let mut scheduler = PlaybackScheduler::new();
    let owner = OwnerId::next();
    let first = scheduler.get_timer(owner, "pulse").unwrap();
    scheduler.dispose(first);
    assert!(!scheduler.registry().contains(owner, "pulse"));

    let second = scheduler.get_timer(owner, "pulse").unwrap();
    assert_ne!(first, second);
    assert!(scheduler.is_alive(second));
}

#[test]
fn test_clear_playbacks_by_owner() {
    let mut scheduler = PlaybackScheduler::new();
    let (widget, other) = (OwnerId::next(), OwnerId::next());
    let child = scheduler.create_timer(1.0);
    let seq = scheduler.get_sequence(widget, "enter", &[child]).unwrap();
    let fade = scheduler.get_motion(widget, "fade", |_: f32| {}).unwrap();
    let kept = scheduler.get_timer(other, "delay").unwrap();

    assert_eq!(scheduler.clear_playbacks(widget), 2);
    for id in [seq, child, fade.id()] {
        assert!(!scheduler.is_alive(id));
    }
    assert!(scheduler.is_alive(kept));
    assert_eq!(scheduler.registry().len(), 1);
    assert!(!scheduler.clear_playback(widget, "fade"));
    assert!(scheduler.clear_playback(other, "delay"));
}

#[test]
fn test_teardown_drops_callbacks_without_firing() {
    let mut scheduler = PlaybackScheduler::new();
    let fired = Rc::new(Cell::new(false));
    let flag = fired.clone();
    let owner = OwnerId::next();
    let timer = scheduler.get_timer(owner, "t").unwrap();
    scheduler
        .configure(timer)
        .unwrap()
        .set_duration(1.0)
        .on_interrupt(move || flag.set(true));
    scheduler.play(timer).unwrap();

    scheduler.clear_all_playbacks();
    assert!(!fired.get());
    assert!(!scheduler.has_active_playbacks());
    // Teardown is idempotent
    assert_eq!(scheduler.clear_all_playbacks(), 0);
}

#[test]
fn test_global_scheduler_lifecycle() {
    assert_eq!(with_global_scheduler(|s| s.len()), None);

    install_global_scheduler(PlaybackScheduler::new());
    let owner = OwnerId::next();
    let timer = with_global_scheduler(|s| s.get_timer(owner, "late"))
        .unwrap()
        .unwrap();
    assert_eq!(
        with_global_scheduler(|s| s.get_timer(owner, "late")),
        Some(Ok(timer))
    );

    assert!(shutdown_global_scheduler().is_some());
    // Late teardown calls after shutdown are silent
    assert_eq!(with_global_scheduler(|s| s.clear_playbacks(owner)), None);
}
