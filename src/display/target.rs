use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::cull::{CullSlot, Culler};
use crate::math;
use crate::utils::prelude::ObjectPool;

use super::backends::StateGuardian;
use super::model::ThreadingModel;
use super::properties::{DisplayPipe, FrameBufferProperties};
use super::region::{DisplayRegion, RegionHandle, RegionParams, RegionSnapshot};

impl_handle!(TargetHandle);

/// What kind of output surface a target renders to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// An onscreen window with a swap chain.
    Window,
    /// An offscreen buffer.
    Buffer,
}

/// Creation parameters of a render target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetParams {
    /// The pipe this target is opened on.
    pub pipe: DisplayPipe,
    /// Extent of the surface in pixels.
    pub dimensions: math::Vector2<u32>,
    /// Framebuffer properties, falling back to the engine defaults when
    /// absent.
    pub properties: Option<FrameBufferProperties>,
    /// Threading model, falling back to the engine default when absent.
    pub threading_model: Option<ThreadingModel>,
    /// Whether a frame may return without waiting for this target's
    /// render threads to finish.
    pub fire_and_forget: bool,
}

impl Default for TargetParams {
    fn default() -> Self {
        TargetParams {
            pipe: DisplayPipe::default(),
            dimensions: math::Vector2::new(640, 480),
            properties: None,
            threading_model: None,
            fire_and_forget: false,
        }
    }
}

/// A window or offscreen buffer under engine management, together with
/// its display regions, its state guardian and the slot its cull and draw
/// threads exchange results through.
pub(crate) struct RenderTarget {
    handle: TargetHandle,
    kind: TargetKind,
    pipe: DisplayPipe,
    dimensions: math::Vector2<u32>,
    properties: FrameBufferProperties,
    model: ThreadingModel,
    guardian: Mutex<Box<dyn StateGuardian>>,
    regions: RwLock<ObjectPool<RegionHandle, DisplayRegion>>,
    active: AtomicBool,
    fire_and_forget: AtomicBool,
    releasing: AtomicBool,
    handoff: CullSlot,
}

impl RenderTarget {
    pub fn new(
        handle: TargetHandle,
        kind: TargetKind,
        params: &TargetParams,
        properties: FrameBufferProperties,
        model: ThreadingModel,
        guardian: Box<dyn StateGuardian>,
    ) -> Self {
        RenderTarget {
            handle,
            kind,
            pipe: params.pipe.clone(),
            dimensions: params.dimensions,
            properties,
            model,
            guardian: Mutex::new(guardian),
            regions: RwLock::new(ObjectPool::new()),
            active: AtomicBool::new(true),
            fire_and_forget: AtomicBool::new(params.fire_and_forget),
            releasing: AtomicBool::new(false),
            handoff: CullSlot::new(),
        }
    }

    #[inline]
    pub fn handle(&self) -> TargetHandle {
        self.handle
    }

    #[inline]
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    #[inline]
    pub fn pipe(&self) -> &DisplayPipe {
        &self.pipe
    }

    #[inline]
    pub fn dimensions(&self) -> math::Vector2<u32> {
        self.dimensions
    }

    #[inline]
    pub fn properties(&self) -> &FrameBufferProperties {
        &self.properties
    }

    #[inline]
    pub fn model(&self) -> &ThreadingModel {
        &self.model
    }

    /// Locks the state guardian for a run of stage calls. A lock
    /// poisoned by a contained panic is still handed out; the release
    /// and teardown paths must be able to reach the guardian afterwards.
    pub fn guardian(&self) -> MutexGuard<Box<dyn StateGuardian>> {
        match self.guardian.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The slot this target's cull thread publishes into and its draw
    /// thread takes from.
    #[inline]
    pub fn handoff(&self) -> &CullSlot {
        &self.handoff
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_fire_and_forget(&self) -> bool {
        self.fire_and_forget.load(Ordering::Relaxed)
    }

    pub fn set_fire_and_forget(&self, enable: bool) {
        self.fire_and_forget.store(enable, Ordering::Relaxed);
    }

    /// True once the target has been queued for resource release. A
    /// releasing target is skipped by every later stage.
    #[inline]
    pub fn is_releasing(&self) -> bool {
        self.releasing.load(Ordering::Relaxed)
    }

    /// Marks the target for release, returning true if this call was the
    /// one that marked it.
    pub fn mark_for_release(&self) -> bool {
        !self.releasing.swap(true, Ordering::Relaxed)
    }

    pub fn create_region(&self, params: RegionParams, culler: Arc<dyn Culler>) -> RegionHandle {
        let mut regions = self.regions.write().unwrap();
        regions.create(DisplayRegion::new(params, culler))
    }

    pub fn remove_region(&self, handle: RegionHandle) -> bool {
        let mut regions = self.regions.write().unwrap();
        regions.free(handle).is_some()
    }

    pub fn region(&self, handle: RegionHandle) -> Option<DisplayRegion> {
        let regions = self.regions.read().unwrap();
        regions.get(handle).cloned()
    }

    /// Applies `f` to a region's parameters, returning false for a dead
    /// handle.
    pub fn update_region<F>(&self, handle: RegionHandle, f: F) -> bool
    where
        F: FnOnce(&mut RegionParams),
    {
        let mut regions = self.regions.write().unwrap();
        match regions.get_mut(handle) {
            Some(region) => {
                f(&mut region.params);
                true
            }
            None => false,
        }
    }

    /// Pins the active regions for one frame, ordered by their sort keys.
    /// Stages work off this snapshot so mid-frame region edits never tear
    /// a frame.
    pub fn snapshot_regions(&self) -> RegionSnapshot {
        let regions = self.regions.read().unwrap();
        let mut snapshot: RegionSnapshot = regions
            .iter()
            .filter_map(|handle| regions.get(handle).map(|v| (handle, v.clone())))
            .filter(|(_, v)| v.params.active)
            .collect();

        snapshot.sort_by_key(|(_, v)| v.params.sort);
        snapshot
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::display::backends;
    use crate::utils::prelude::HandleLike;

    fn target(params: &TargetParams) -> RenderTarget {
        RenderTarget::new(
            TargetHandle::new(0, 1),
            TargetKind::Window,
            params,
            params.properties.unwrap_or_default(),
            params.threading_model.clone().unwrap_or_default(),
            backends::new_headless(),
        )
    }

    struct NullCuller;

    impl Culler for NullCuller {
        fn cull(&self, _: &crate::cull::SceneSetup) -> crate::errors::Result<Vec<crate::cull::Drawable>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn snapshot_orders_regions_by_sort() {
        let t = target(&TargetParams::default());
        let culler = Arc::new(NullCuller);

        let mut params = RegionParams::default();
        params.sort = 10;
        let back = t.create_region(params.clone(), culler.clone());

        params.sort = -5;
        let front = t.create_region(params.clone(), culler.clone());

        params.sort = 0;
        let middle = t.create_region(params, culler);

        let order: Vec<_> = t.snapshot_regions().iter().map(|(h, _)| *h).collect();
        assert_eq!(order, vec![front, middle, back]);
    }

    #[test]
    fn snapshot_skips_inactive_regions() {
        let t = target(&TargetParams::default());
        let culler = Arc::new(NullCuller);

        let shown = t.create_region(RegionParams::default(), culler.clone());
        let hidden = t.create_region(RegionParams::default(), culler);
        assert!(t.update_region(hidden, |v| v.active = false));

        let snapshot = t.snapshot_regions();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, shown);

        assert!(t.remove_region(hidden));
        assert!(!t.remove_region(hidden));
    }

    #[test]
    fn release_mark_sticks() {
        let t = target(&TargetParams::default());
        assert!(!t.is_releasing());
        assert!(t.mark_for_release());
        assert!(!t.mark_for_release());
        assert!(t.is_releasing());
    }
}
