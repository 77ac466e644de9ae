//! Sequence timeline layout
//!
//! Children play back-to-back. Each child's span starts where the previous
//! one ended; the timeline is the sum of the spans. The scheduler drives the
//! children; this module only maps composite progress onto them.

use crate::playback::PlaybackId;
use smallvec::SmallVec;

/// Child start offsets and durations, cached until a child's duration changes
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SequenceLayout {
    offsets: SmallVec<[f32; 4]>,
    durations: SmallVec<[f32; 4]>,
    timeline: f32,
}

impl SequenceLayout {
    pub fn from_durations(durations: &[f32]) -> Self {
        let mut offsets = SmallVec::with_capacity(durations.len());
        let mut cursor = 0.0;
        for &duration in durations {
            offsets.push(cursor);
            cursor += duration;
        }
        Self {
            offsets,
            durations: durations.iter().copied().collect(),
            timeline: cursor,
        }
    }

    /// Sum of child durations
    pub fn timeline(&self) -> f32 {
        self.timeline
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn offset(&self, index: usize) -> Option<f32> {
        self.offsets.get(index).copied()
    }

    /// Child index owning `progress` and that child's local progress
    ///
    /// Progress 1 (and any progress on an empty timeline) lands on the last
    /// child at local progress 1.
    pub fn locate(&self, progress: f32) -> Option<(usize, f32)> {
        let last = self.durations.len().checked_sub(1)?;
        if progress >= 1.0 || self.timeline <= 0.0 {
            return Some((last, 1.0));
        }

        let t = progress.max(0.0) * self.timeline;
        let index = self
            .offsets
            .partition_point(|&offset| offset <= t)
            .saturating_sub(1)
            .min(last);
        let duration = self.durations[index];
        let local = if duration > 0.0 {
            ((t - self.offsets[index]) / duration).clamp(0.0, 1.0)
        } else {
            1.0
        };
        Some((index, local))
    }
}

/// Sequence-specific part of a playback entry
#[derive(Clone, Debug, Default)]
pub(crate) struct SequenceState {
    pub children: SmallVec<[PlaybackId; 4]>,
    pub layout: SequenceLayout,
    /// Child that received the most recent progress
    pub active: Option<usize>,
    pub stale: bool,
}

impl SequenceState {
    pub fn new(children: &[PlaybackId]) -> Self {
        Self {
            children: children.iter().copied().collect(),
            layout: SequenceLayout::default(),
            active: None,
            stale: true,
        }
    }
}
