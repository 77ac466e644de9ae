//! Per-thread global scheduler
//!
//! Hosts that drive animation from one UI thread can install a scheduler
//! once at startup and reach it from anywhere on that thread. Every accessor
//! is a silent no-op when nothing is installed, so teardown code can run
//! after [`shutdown_global_scheduler`] without special casing.

use crate::scheduler::PlaybackScheduler;
use std::cell::RefCell;

// ============================================================================
// Global Playback Scheduler State
// ============================================================================

thread_local! {
    static GLOBAL_SCHEDULER: RefCell<Option<PlaybackScheduler>> = const { RefCell::new(None) };
}

/// Install the scheduler for the current thread
///
/// Returns the previously installed scheduler, if any.
pub fn install_global_scheduler(scheduler: PlaybackScheduler) -> Option<PlaybackScheduler> {
    let previous = GLOBAL_SCHEDULER.with(|cell| match cell.try_borrow_mut() {
        Ok(mut slot) => slot.replace(scheduler),
        Err(_) => {
            tracing::warn!("global scheduler is in use, install ignored");
            None
        }
    });
    tracing::debug!(replaced = previous.is_some(), "global scheduler installed");
    previous
}

/// Remove the current thread's scheduler after disposing all its playbacks
pub fn shutdown_global_scheduler() -> Option<PlaybackScheduler> {
    let mut scheduler = GLOBAL_SCHEDULER.with(|cell| cell.try_borrow_mut().ok()?.take())?;
    let disposed = scheduler.clear_all_playbacks();
    tracing::debug!(disposed, "global scheduler shut down");
    Some(scheduler)
}

/// Check if a scheduler is installed on this thread
pub fn is_global_scheduler_installed() -> bool {
    GLOBAL_SCHEDULER.with(|cell| cell.try_borrow().map(|slot| slot.is_some()).unwrap_or(true))
}

/// Run `f` against the installed scheduler
///
/// Returns `None` without calling `f` when no scheduler is installed, or when
/// called re-entrantly from inside another `with_global_scheduler`. Playback
/// callbacks already receive the scheduler and should use that instead.
pub fn with_global_scheduler<R>(f: impl FnOnce(&mut PlaybackScheduler) -> R) -> Option<R> {
    GLOBAL_SCHEDULER.with(|cell| {
        let mut slot = cell.try_borrow_mut().ok()?;
        let scheduler = slot.as_mut()?;
        Some(f(scheduler))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test runs on its own thread, so the thread-local starts empty

    #[test]
    fn test_accessors_are_noops_without_scheduler() {
        assert!(!is_global_scheduler_installed());
        assert_eq!(with_global_scheduler(|s| s.len()), None);
        assert!(shutdown_global_scheduler().is_none());
    }

    #[test]
    fn test_install_and_shutdown() {
        assert!(install_global_scheduler(PlaybackScheduler::new()).is_none());
        assert!(is_global_scheduler_installed());

        let timer = with_global_scheduler(|s| s.create_timer(1.0)).unwrap();
        assert_eq!(with_global_scheduler(|s| s.is_alive(timer)), Some(true));

        let scheduler = shutdown_global_scheduler().unwrap();
        assert!(!scheduler.is_alive(timer));
        assert!(!is_global_scheduler_installed());
        assert_eq!(with_global_scheduler(|s| s.len()), None);
    }

    #[test]
    fn test_reentrant_access_is_refused() {
        install_global_scheduler(PlaybackScheduler::new());
        let nested = with_global_scheduler(|_| with_global_scheduler(|s| s.len()));
        assert_eq!(nested, Some(None));
        shutdown_global_scheduler();
    }
}
