//! Culling interchange types: the scene setup handed to cull-result
//! producers, the binned drawable lists consumed by state guardians, and
//! the slot that pairs a target's cull thread with its draw thread.

use std::cmp::Ordering;
use std::sync::{Condvar, Mutex};

use smallvec::SmallVec;

use crate::display::region::Camera;
use crate::errors::Result;
use crate::math;

/// The pixel rectangle a region renders into.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Viewport {
    /// Lower-left corner in pixels.
    pub position: math::Vector2<u32>,
    /// Extent in pixels.
    pub size: math::Vector2<u32>,
}

/// Transient per-(target, region) input of the cull stage. Built by the
/// thread performing cull, handed to the culler, and discarded once the
/// draw stage has consumed the paired result.
#[derive(Debug, Copy, Clone)]
pub struct SceneSetup {
    /// The frame this setup belongs to.
    pub frame: u64,
    /// The region's camera at snapshot time.
    pub camera: Camera,
    /// The region's viewport resolved to pixels.
    pub viewport: Viewport,
}

/// A single drawable item produced by a culler. The identity is opaque to
/// this crate; guardians know what to make of it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Drawable {
    pub id: u64,
    /// Distance from the eye; larger is farther away.
    pub distance: f32,
    /// Transparent items draw after every opaque one.
    pub transparent: bool,
}

impl Drawable {
    pub fn new(id: u64, distance: f32, transparent: bool) -> Self {
        Drawable {
            id,
            distance,
            transparent,
        }
    }
}

/// Produces the drawable items visible from a scene setup. Cull runs on
/// whichever thread the target's threading model assigns, so producers are
/// shared across threads.
pub trait Culler: Send + Sync {
    fn cull(&self, setup: &SceneSetup) -> Result<Vec<Drawable>>;
}

/// One region's finished cull output: drawables binned into opaque and
/// transparent partitions, each ordered back-to-front. Guardians draw the
/// opaque partition first.
#[derive(Debug, Clone)]
pub struct CullResult {
    frame: u64,
    opaque: Vec<Drawable>,
    transparent: Vec<Drawable>,
}

impl CullResult {
    /// Bins unordered drawables into back-to-front partitions for `frame`.
    pub fn bin(frame: u64, drawables: Vec<Drawable>) -> Self {
        let mut opaque = Vec::with_capacity(drawables.len());
        let mut transparent = Vec::new();

        for v in drawables {
            if v.transparent {
                transparent.push(v);
            } else {
                opaque.push(v);
            }
        }

        let back_to_front = |lhs: &Drawable, rhs: &Drawable| {
            rhs.distance
                .partial_cmp(&lhs.distance)
                .unwrap_or(Ordering::Equal)
        };

        opaque.sort_by(back_to_front);
        transparent.sort_by(back_to_front);

        CullResult {
            frame,
            opaque,
            transparent,
        }
    }

    /// An output with no drawables, standing in for a failed cull.
    pub fn empty(frame: u64) -> Self {
        CullResult {
            frame,
            opaque: Vec::new(),
            transparent: Vec::new(),
        }
    }

    /// Keeps drawables in producer order, skipping partitioning and the
    /// back-to-front sort.
    pub fn unsorted(frame: u64, drawables: Vec<Drawable>) -> Self {
        CullResult {
            frame,
            opaque: drawables,
            transparent: Vec::new(),
        }
    }

    /// The frame this result was produced in.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[inline]
    pub fn opaque(&self) -> &[Drawable] {
        &self.opaque
    }

    #[inline]
    pub fn transparent(&self) -> &[Drawable] {
        &self.transparent
    }

    /// Total number of drawables across both partitions.
    #[inline]
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }
}

/// A region's setup paired with its binned output, travelling from the
/// cull stage to the draw stage.
#[derive(Debug, Clone)]
pub(crate) struct RegionCull {
    pub setup: SceneSetup,
    pub result: CullResult,
}

/// Everything a target's cull thread produced for one frame.
#[derive(Debug)]
pub(crate) struct FrameCull {
    pub frame: u64,
    pub regions: SmallVec<[RegionCull; 4]>,
}

impl FrameCull {
    pub fn empty(frame: u64) -> Self {
        FrameCull {
            frame,
            regions: SmallVec::new(),
        }
    }
}

/// Single-slot, frame-tagged channel between a target's cull thread and
/// its draw thread. The cull side publishes exactly once per frame, the
/// draw side takes exactly once with the matching tag; publishing waits
/// for a drained slot so an unconsumed frame is never overwritten.
pub(crate) struct CullSlot {
    slot: Mutex<Option<FrameCull>>,
    cv: Condvar,
}

impl CullSlot {
    pub fn new() -> Self {
        CullSlot {
            slot: Mutex::new(None),
            cv: Condvar::new(),
        }
    }

    /// Publishes one frame's output, blocking until the slot is free.
    pub fn publish(&self, cull: FrameCull) {
        let mut slot = self.slot.lock().unwrap();
        while slot.is_some() {
            slot = self.cv.wait(slot).unwrap();
        }

        *slot = Some(cull);
        self.cv.notify_all();
    }

    /// Takes the output published for exactly `frame`, blocking until it
    /// arrives.
    pub fn take(&self, frame: u64) -> FrameCull {
        let mut slot = self.slot.lock().unwrap();
        loop {
            if slot.as_ref().map(|v| v.frame) == Some(frame) {
                let cull = slot.take().unwrap();
                self.cv.notify_all();
                return cull;
            }

            slot = self.cv.wait(slot).unwrap();
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn bins_back_to_front() {
        let drawables = vec![
            Drawable::new(1, 2.0, false),
            Drawable::new(2, 8.0, true),
            Drawable::new(3, 5.0, false),
            Drawable::new(4, 1.0, true),
            Drawable::new(5, 9.0, false),
        ];

        let result = CullResult::bin(7, drawables);
        assert_eq!(result.frame(), 7);
        assert_eq!(result.len(), 5);

        let opaque: Vec<_> = result.opaque().iter().map(|v| v.id).collect();
        assert_eq!(opaque, vec![5, 3, 1]);

        let transparent: Vec<_> = result.transparent().iter().map(|v| v.id).collect();
        assert_eq!(transparent, vec![2, 4]);
    }

    #[test]
    fn bin_keeps_producer_order_on_ties() {
        let drawables = vec![
            Drawable::new(1, 3.0, false),
            Drawable::new(2, 3.0, false),
            Drawable::new(3, 3.0, false),
        ];

        let result = CullResult::bin(0, drawables);
        let ids: Vec<_> = result.opaque().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn slot_pairs_matching_frames() {
        let slot = Arc::new(CullSlot::new());

        let publisher = {
            let slot = slot.clone();
            thread::spawn(move || {
                for frame in 1..16 {
                    slot.publish(FrameCull::empty(frame));
                }
            })
        };

        for frame in 1..16 {
            let cull = slot.take(frame);
            assert_eq!(cull.frame, frame);
        }

        publisher.join().unwrap();
    }

    #[test]
    fn publish_waits_for_drained_slot() {
        let slot = Arc::new(CullSlot::new());
        slot.publish(FrameCull::empty(1));

        let publisher = {
            let slot = slot.clone();
            thread::spawn(move || {
                // Blocks until frame 1 is taken below.
                slot.publish(FrameCull::empty(2));
            })
        };

        assert_eq!(slot.take(1).frame, 1);
        assert_eq!(slot.take(2).frame, 2);
        publisher.join().unwrap();
    }
}
