//! Parallel timeline layout
//!
//! All children start together; the timeline is the longest child. That
//! child is always driven last in a frame so its Complete fires after any
//! sibling finishing on the same frame.

use crate::playback::PlaybackId;
use smallvec::SmallVec;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParallelLayout {
    durations: SmallVec<[f32; 4]>,
    timeline: f32,
    longest: Option<usize>,
}

impl ParallelLayout {
    pub fn from_durations(durations: &[f32]) -> Self {
        let mut longest: Option<usize> = None;
        for (i, &duration) in durations.iter().enumerate() {
            // Strictly greater keeps the first child on ties
            if longest.map_or(true, |l| duration > durations[l]) {
                longest = Some(i);
            }
        }
        Self {
            durations: durations.iter().copied().collect(),
            timeline: longest.map_or(0.0, |l| durations[l]),
            longest,
        }
    }

    pub fn timeline(&self) -> f32 {
        self.timeline
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn longest(&self) -> Option<usize> {
        self.longest
    }

    /// Local progress of child `index` for eased composite progress
    pub fn child_progress(&self, index: usize, progress: f32) -> f32 {
        let duration = self.durations.get(index).copied().unwrap_or(0.0);
        if duration <= 0.0 {
            return 1.0;
        }
        (progress * self.timeline / duration).clamp(0.0, 1.0)
    }

    /// Child indices in drive order, longest last
    pub fn drive_order(&self) -> impl Iterator<Item = usize> + '_ {
        let longest = self.longest;
        (0..self.durations.len())
            .filter(move |&i| Some(i) != longest)
            .chain(longest)
    }
}

/// Parallel-specific part of a playback entry
#[derive(Clone, Debug, Default)]
pub(crate) struct ParallelState {
    pub children: SmallVec<[PlaybackId; 4]>,
    pub layout: ParallelLayout,
    pub stale: bool,
}

impl ParallelState {
    pub fn new(children: &[PlaybackId]) -> Self {
        Self {
            children: children.iter().copied().collect(),
            layout: ParallelLayout::default(),
            stale: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_is_longest_child() {
        let layout = ParallelLayout::from_durations(&[2.0, 5.0, 3.0]);
        assert_eq!(layout.timeline(), 5.0);
        assert_eq!(layout.longest(), Some(1));
    }

    #[test]
    fn test_ties_keep_first() {
        let layout = ParallelLayout::from_durations(&[4.0, 4.0]);
        assert_eq!(layout.longest(), Some(0));
        assert_eq!(layout.drive_order().collect::<Vec<_>>(), vec![1, 0]);
    }

    #[test]
    fn test_drive_order_puts_longest_last() {
        let layout = ParallelLayout::from_durations(&[2.0, 5.0, 3.0]);
        assert_eq!(layout.drive_order().collect::<Vec<_>>(), vec![0, 2, 1]);
    }

    #[test]
    fn test_child_progress_saturates() {
        let layout = ParallelLayout::from_durations(&[2.0, 5.0, 3.0]);
        assert!((layout.child_progress(0, 0.2) - 0.5).abs() < 1e-6);
        assert_eq!(layout.child_progress(0, 0.6), 1.0);
        assert!((layout.child_progress(1, 0.6) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_zero_length_child_is_immediately_done() {
        let layout = ParallelLayout::from_durations(&[0.0, 1.0]);
        assert_eq!(layout.child_progress(0, 0.0), 1.0);
        assert!(ParallelLayout::from_durations(&[]).drive_order().next().is_none());
    }
}
