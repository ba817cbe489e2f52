//! Per-frame execution statistics.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Timing and workload numbers of the most recently completed
/// `render_frame` call.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FrameStats {
    /// The frame these numbers describe.
    pub frame: u64,
    /// Wall time of the whole `render_frame` call.
    pub duration: Duration,
    /// Time spent snapshotting buckets and signaling workers.
    pub dispatch: Duration,
    /// Time the calling thread blocked on worker completions.
    pub draw_wait: Duration,
    /// Time spent presenting, zero when nothing was flipped.
    pub flip: Duration,
    /// Targets that completed a draw stage.
    pub targets: u32,
    /// Regions culled and drawn.
    pub regions: u32,
    /// Drawable items submitted to guardians.
    pub drawables: u32,
}

/// Workload counters the render threads bump while a frame executes,
/// folded into `FrameStats` when the frame is finalized.
#[derive(Debug, Default)]
pub(crate) struct FrameCounters {
    targets: AtomicU32,
    regions: AtomicU32,
    drawables: AtomicU32,
}

impl FrameCounters {
    pub fn reset(&self) {
        self.targets.store(0, Ordering::Relaxed);
        self.regions.store(0, Ordering::Relaxed);
        self.drawables.store(0, Ordering::Relaxed);
    }

    pub fn add_target(&self, regions: u32, drawables: u32) {
        self.targets.fetch_add(1, Ordering::Relaxed);
        self.regions.fetch_add(regions, Ordering::Relaxed);
        self.drawables.fetch_add(drawables, Ordering::Relaxed);
    }

    pub fn fill(&self, stats: &mut FrameStats) {
        stats.targets = self.targets.load(Ordering::Relaxed);
        stats.regions = self.regions.load(Ordering::Relaxed);
        stats.drawables = self.drawables.load(Ordering::Relaxed);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counters_accumulate_and_reset() {
        let counters = FrameCounters::default();
        counters.add_target(2, 100);
        counters.add_target(1, 20);

        let mut stats = FrameStats::default();
        counters.fill(&mut stats);
        assert_eq!(stats.targets, 2);
        assert_eq!(stats.regions, 3);
        assert_eq!(stats.drawables, 120);

        counters.reset();
        counters.fill(&mut stats);
        assert_eq!(stats.targets, 0);
        assert_eq!(stats.drawables, 0);
    }
}
