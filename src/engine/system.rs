use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use inlinable_string::InlinableString;

use crate::cull::Culler;
use crate::display::backends::StateGuardian;
use crate::display::errors::Error;
use crate::display::region::{Camera, RegionHandle, RegionParams};
use crate::display::target::{RenderTarget, TargetHandle, TargetKind, TargetParams};
use crate::display::{FrameBufferProperties, ThreadingModel};
use crate::errors::Result;
use crate::math;
use crate::settings::Settings;
use crate::utils::prelude::{FastHashMap, HandlePool};

use super::flip::{FlipController, FlipState};
use super::renderer;
use super::stats::{FrameCounters, FrameStats};
use super::thread::{Command, Mailbox, RenderThread, TargetWork, WorkOrder};

/// The mutable collection of registered render targets, keyed by
/// versioned handles. Iteration follows handle-index order so bucket
/// construction is deterministic frame to frame.
struct WindowSet {
    handles: HandlePool<TargetHandle>,
    targets: FastHashMap<TargetHandle, Arc<RenderTarget>>,
}

impl WindowSet {
    fn new() -> Self {
        WindowSet {
            handles: HandlePool::new(),
            targets: FastHashMap::default(),
        }
    }

    fn create<F>(&mut self, build: F) -> (TargetHandle, Arc<RenderTarget>)
    where
        F: FnOnce(TargetHandle) -> RenderTarget,
    {
        let handle = self.handles.create();
        let target = Arc::new(build(handle));
        self.targets.insert(handle, target.clone());
        (handle, target)
    }

    fn get(&self, handle: TargetHandle) -> Option<&Arc<RenderTarget>> {
        self.targets.get(&handle)
    }

    fn remove(&mut self, handle: TargetHandle) -> Option<Arc<RenderTarget>> {
        if self.handles.free(handle) {
            self.targets.remove(&handle)
        } else {
            None
        }
    }

    fn len(&self) -> usize {
        self.handles.len()
    }

    fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = (TargetHandle, &Arc<RenderTarget>)> {
        let targets = &self.targets;
        self.handles
            .iter()
            .filter_map(move |v| targets.get(&v).map(|t| (v, t)))
    }

    fn drain(&mut self) -> Vec<Arc<RenderTarget>> {
        let drained: Vec<_> = self.iter().map(|(_, v)| v.clone()).collect();
        let handles: Vec<_> = self.handles.iter().collect();
        for handle in handles {
            self.handles.free(handle);
        }
        self.targets.clear();
        drained
    }
}

struct PendingRelease {
    owner: Option<InlinableString>,
    target: Arc<RenderTarget>,
}

/// State shared between the engine facade and its render threads.
pub(crate) struct EngineCore {
    windows: Mutex<WindowSet>,
    pub flip: FlipController,
    pub counters: FrameCounters,
    pending: Mutex<Vec<PendingRelease>>,
}

impl EngineCore {
    fn new() -> Self {
        EngineCore {
            windows: Mutex::new(WindowSet::new()),
            flip: FlipController::new(),
            counters: FrameCounters::default(),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Marks a target for release and queues the actual context release
    /// to the thread owning its draw state. Idempotent per target.
    pub fn queue_release(&self, target: &Arc<RenderTarget>) {
        if !target.mark_for_release() {
            return;
        }

        self.pending.lock().unwrap().push(PendingRelease {
            owner: draw_owner(target),
            target: target.clone(),
        });
    }
}

/// The thread that owns a target's draw state, `None` for the calling
/// thread. Context-affine work (release, flip) must run there.
fn draw_owner(target: &RenderTarget) -> Option<InlinableString> {
    let model = target.model();
    if model.draw_on_calling_thread() {
        None
    } else {
        Some(InlinableString::from(model.draw_name()))
    }
}

/// Targets batched by the thread that owns their draw state, `None`
/// batching the calling thread's own.
type OwnerBatches = Vec<(Option<InlinableString>, Vec<Arc<RenderTarget>>)>;

fn push_batch(batches: &mut OwnerBatches, owner: Option<InlinableString>, target: Arc<RenderTarget>) {
    match batches.iter_mut().find(|(v, _)| *v == owner) {
        Some((_, list)) => list.push(target),
        None => batches.push((owner, vec![target])),
    }
}

/// One frame's dispatch plan: the calling thread's own order, one order
/// per named thread, and where each target's flip must run.
struct FramePlan {
    app: WorkOrder,
    workers: Vec<(InlinableString, WorkOrder)>,
    flips: OwnerBatches,
    draw_buckets: usize,
}

fn order_for<'a>(
    app: &'a mut WorkOrder,
    workers: &'a mut Vec<(InlinableString, WorkOrder)>,
    frame: u64,
    owner: Option<&str>,
) -> &'a mut WorkOrder {
    match owner {
        None => app,
        Some(name) => {
            if let Some(i) = workers.iter().position(|(v, _)| v.as_ref() == name) {
                &mut workers[i].1
            } else {
                workers.push((InlinableString::from(name), WorkOrder::new(frame)));
                let last = workers.len() - 1;
                &mut workers[last].1
            }
        }
    }
}

/// State the frame-level operations hand each other under one lock,
/// keeping `render_frame`, the flip protocol and the lifecycle sweeps
/// serialized against each other.
struct FramePacing {
    flips: OwnerBatches,
}

/// The frame coordinator. An engine owns a set of render targets, the
/// named render threads their threading models call for, and the flip
/// handshake tying every target's presentation together.
///
/// All methods take `&self`; the engine can be shared freely across
/// threads.
pub struct Engine {
    core: Arc<EngineCore>,
    threads: Mutex<FastHashMap<InlinableString, RenderThread>>,
    frame: Mutex<FramePacing>,
    settings: RwLock<Settings>,
    frame_count: AtomicU64,
    stats: Mutex<FrameStats>,
}

impl Engine {
    /// Creates an engine with default settings.
    pub fn new() -> Self {
        Self::new_with(Settings::default())
    }

    /// Creates an engine from explicit settings.
    pub fn new_with(settings: Settings) -> Self {
        Engine {
            core: Arc::new(EngineCore::new()),
            threads: Mutex::new(FastHashMap::default()),
            frame: Mutex::new(FramePacing { flips: Vec::new() }),
            settings: RwLock::new(settings),
            frame_count: AtomicU64::new(0),
            stats: Mutex::new(FrameStats::default()),
        }
    }

    /// Registers a window target. It becomes eligible for the next
    /// `render_frame` call.
    pub fn make_window(
        &self,
        params: TargetParams,
        guardian: Box<dyn StateGuardian>,
    ) -> Result<TargetHandle> {
        self.make_target(TargetKind::Window, params, guardian)
    }

    /// Registers a window target with a threading model in string form,
    /// overriding both the params and the engine default.
    pub fn make_window_with(
        &self,
        mut params: TargetParams,
        guardian: Box<dyn StateGuardian>,
        model: &str,
    ) -> Result<TargetHandle> {
        params.threading_model = Some(model.parse()?);
        self.make_target(TargetKind::Window, params, guardian)
    }

    /// Registers an offscreen buffer target.
    pub fn make_buffer(
        &self,
        params: TargetParams,
        guardian: Box<dyn StateGuardian>,
    ) -> Result<TargetHandle> {
        self.make_target(TargetKind::Buffer, params, guardian)
    }

    /// Registers an offscreen buffer target with a threading model in
    /// string form.
    pub fn make_buffer_with(
        &self,
        mut params: TargetParams,
        guardian: Box<dyn StateGuardian>,
        model: &str,
    ) -> Result<TargetHandle> {
        params.threading_model = Some(model.parse()?);
        self.make_target(TargetKind::Buffer, params, guardian)
    }

    fn make_target(
        &self,
        kind: TargetKind,
        params: TargetParams,
        guardian: Box<dyn StateGuardian>,
    ) -> Result<TargetHandle> {
        let (model, properties) = {
            let settings = self.settings.read().unwrap();
            let model = match params.threading_model.clone() {
                Some(v) => v,
                None => settings.threading_model.clone(),
            };
            let properties = params
                .properties
                .unwrap_or(settings.frame_buffer_properties);
            (model, properties)
        };

        if !model.cull_on_calling_thread() {
            self.ensure_thread(model.cull_name())?;
        }
        if !model.fused() && !model.draw_on_calling_thread() {
            self.ensure_thread(model.draw_name())?;
        }

        let (handle, target) = {
            let mut windows = self.core.windows.lock().unwrap();
            windows.create(|handle| {
                RenderTarget::new(handle, kind, &params, properties, model, guardian)
            })
        };

        debug!(
            "{} ({:?}) opened on pipe '{}', threading model '{}'",
            handle,
            kind,
            target.pipe().name,
            target.model()
        );
        Ok(handle)
    }

    fn ensure_thread(&self, name: &str) -> Result<()> {
        let key = InlinableString::from(name);
        let mut threads = self.threads.lock().unwrap();
        if !threads.contains_key(&key) {
            let thread = RenderThread::spawn(name, self.core.clone())?;
            threads.insert(key, thread);
        }

        Ok(())
    }

    fn mailbox(&self, name: &InlinableString) -> Option<Arc<Mailbox>> {
        let threads = self.threads.lock().unwrap();
        threads.get(name).map(|v| v.mailbox().clone())
    }

    /// Waits until every render thread has drained its mailbox.
    fn quiesce(&self) {
        let mailboxes: Vec<_> = {
            let threads = self.threads.lock().unwrap();
            threads.values().map(|v| v.mailbox().clone()).collect()
        };

        for mailbox in mailboxes {
            mailbox.wait_idle();
        }
    }

    /// Detaches a target, returning true if the handle was alive. The
    /// context release runs on the owning thread at the start of its
    /// next command, never mid-draw.
    pub fn remove_window(&self, handle: TargetHandle) -> bool {
        let removed = {
            let mut windows = self.core.windows.lock().unwrap();
            windows.remove(handle)
        };

        match removed {
            Some(target) => {
                debug!("{} removed, release queued", handle);
                self.core.queue_release(&target);
                true
            }
            None => false,
        }
    }

    /// Removes every target and executes all releases immediately on the
    /// owning threads. Also the teardown path.
    pub fn remove_all_windows(&self) {
        let _pacing = self.frame.lock().unwrap();
        self.quiesce();

        let mut groups: OwnerBatches = Vec::new();
        {
            let mut pending = self.core.pending.lock().unwrap();
            for entry in pending.drain(..) {
                push_batch(&mut groups, entry.owner, entry.target);
            }
        }
        {
            let mut windows = self.core.windows.lock().unwrap();
            for target in windows.drain() {
                if target.mark_for_release() {
                    let owner = draw_owner(&target);
                    push_batch(&mut groups, owner, target);
                }
            }
        }

        let mut waits = Vec::new();
        for (owner, targets) in groups {
            match owner {
                None => renderer::release(&targets),
                Some(name) => match self.mailbox(&name) {
                    Some(mailbox) => {
                        mailbox.send(Command::Release(targets));
                        waits.push(mailbox);
                    }
                    None => renderer::release(&targets),
                },
            }
        }

        for mailbox in waits {
            mailbox.wait_idle();
        }
    }

    /// Forces every target to release and reacquire its graphics
    /// context, with all render threads quiesced.
    pub fn reset_all_windows(&self) {
        let _pacing = self.frame.lock().unwrap();
        self.quiesce();

        let targets: Vec<_> = {
            let windows = self.core.windows.lock().unwrap();
            windows.iter().map(|(_, v)| v.clone()).collect()
        };

        for target in targets {
            if target.is_releasing() {
                continue;
            }

            if let Err(err) = target.guardian().reset() {
                warn!("target {} reset failed: {}", target.handle(), err);
                self.core.queue_release(&target);
            }
        }
    }

    /// Sends `terminate` to every render thread and joins them.
    pub fn terminate_threads(&self) {
        let drained: Vec<_> = {
            let mut threads = self.threads.lock().unwrap();
            threads.drain().map(|(_, v)| v).collect()
        };

        for thread in drained {
            thread.terminate();
        }
    }

    /// Runs one full pipeline tick over every active target: cull, draw,
    /// and the synchronized flip when `auto_flip` is on. Failures inside
    /// the frame are handled per target and logged, never returned.
    pub fn render_frame(&self) {
        let mut pacing = self.frame.lock().unwrap();
        let started = Instant::now();

        // Absorb fire-and-forget stragglers from the previous frame
        // before the handshake is re-armed.
        self.core.flip.wait_synced();

        let frame = self.frame_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.core.counters.reset();

        let FramePlan {
            app,
            workers,
            flips,
            draw_buckets,
        } = self.snapshot(frame);

        pacing.flips = flips;
        self.core.flip.begin_frame(draw_buckets);

        // Workers go first: the calling thread's buckets may block on
        // culls a worker publishes, and the other way around. A thread
        // that went away since its targets were made is respawned here.
        let mut dispatched = Vec::new();
        let mut orphans = Vec::new();
        for (name, order) in workers {
            let mailbox = match self.mailbox(&name) {
                Some(v) => Some(v),
                None => match self.ensure_thread(&name) {
                    Ok(()) => self.mailbox(&name),
                    Err(err) => {
                        error!("render thread '{}' unavailable: {}", name, err);
                        None
                    }
                },
            };

            match mailbox {
                Some(mailbox) => dispatched.push((mailbox, order)),
                None => orphans.push(order),
            }
        }

        let mut waits = Vec::new();
        for (mailbox, order) in dispatched {
            let wait = !order.is_fire_and_forget();
            mailbox.send(Command::Frame(order));
            if wait {
                waits.push(mailbox);
            }
        }
        let dispatch = started.elapsed();

        // Inline orders publish all their culls before any of them
        // blocks drawing, whichever way their handoffs pair up.
        renderer::produce(&self.core, &app);
        for order in &orphans {
            renderer::produce(&self.core, order);
        }
        renderer::consume(&self.core, &app);
        for order in &orphans {
            renderer::consume(&self.core, order);
        }

        let waiting = Instant::now();
        for mailbox in waits {
            mailbox.wait_idle();
        }
        let draw_wait = waiting.elapsed();

        let flipping = Instant::now();
        if self.settings.read().unwrap().auto_flip {
            self.core.flip.wait_synced();
            self.flip_planned(&mut pacing);
        }
        let flip = flipping.elapsed();

        let mut stats = FrameStats {
            frame,
            duration: started.elapsed(),
            dispatch,
            draw_wait,
            flip,
            ..Default::default()
        };
        self.core.counters.fill(&mut stats);
        *self.stats.lock().unwrap() = stats;
    }

    /// Blocks until every draw bucket of the current frame has finished.
    /// A no-op when nothing is outstanding.
    pub fn sync_frame(&self) {
        let _pacing = self.frame.lock().unwrap();
        self.core.flip.wait_synced();
    }

    /// Presents the frame once it has synced. Deferred while draw
    /// buckets are still outstanding; a no-op when already flipped.
    pub fn flip_frame(&self) {
        let mut pacing = self.frame.lock().unwrap();
        self.flip_planned(&mut pacing);
    }

    /// Dispatches the planned flip to each thread that drew this frame,
    /// flipping the calling thread's own targets inline.
    fn flip_planned(&self, pacing: &mut FramePacing) {
        if self.core.flip.state() == FlipState::Flipped {
            return;
        }

        self.core.flip.wait_synced();

        let mut waits = Vec::new();
        for (owner, targets) in &pacing.flips {
            if targets.is_empty() {
                continue;
            }

            match owner {
                None => renderer::flip(&self.core, targets),
                Some(name) => match self.mailbox(name) {
                    Some(mailbox) => {
                        mailbox.send(Command::Flip(targets.clone()));
                        waits.push(mailbox);
                    }
                    None => renderer::flip(&self.core, targets),
                },
            }
        }

        for mailbox in waits {
            mailbox.wait_idle();
        }

        self.core.flip.mark_flipped();
    }

    /// Pins the window set into per-thread work orders. Pending releases
    /// drain into the orders of their owning threads, window events go
    /// to the calling thread, and every active target lands in exactly
    /// one cull and one draw bucket.
    fn snapshot(&self, frame: u64) -> FramePlan {
        let mut app = WorkOrder::new(frame);
        let mut workers: Vec<(InlinableString, WorkOrder)> = Vec::new();
        let mut flips: OwnerBatches = Vec::new();

        let drained: Vec<_> = {
            let mut pending = self.core.pending.lock().unwrap();
            pending.drain(..).collect()
        };

        {
            let mut windows = self.core.windows.lock().unwrap();

            // A released handle dies here; its target lives on in the
            // releasing order until the owning thread has let it go.
            for entry in drained {
                windows.remove(entry.target.handle());
                order_for(&mut app, &mut workers, frame, entry.owner.as_deref())
                    .releases
                    .push(entry.target);
            }
            for (_, target) in windows.iter() {
                if !target.is_active() || target.is_releasing() {
                    continue;
                }

                if target.kind() == TargetKind::Window {
                    app.events.push(target.clone());
                }

                let regions = target.snapshot_regions();
                let model = target.model();
                let cull = if model.cull_on_calling_thread() {
                    None
                } else {
                    Some(model.cull_name())
                };
                let draw = if model.draw_on_calling_thread() {
                    None
                } else {
                    Some(model.draw_name())
                };

                if model.fused() {
                    order_for(&mut app, &mut workers, frame, cull)
                        .cull_draws
                        .push(TargetWork {
                            target: target.clone(),
                            regions,
                        });
                } else {
                    order_for(&mut app, &mut workers, frame, cull)
                        .culls
                        .push(TargetWork {
                            target: target.clone(),
                            regions,
                        });
                    order_for(&mut app, &mut workers, frame, draw)
                        .draws
                        .push(target.clone());
                }

                push_batch(&mut flips, draw.map(InlinableString::from), target.clone());
            }
        }

        let mut draw_buckets = 0;
        if app.has_draw_stage() {
            draw_buckets += 1;
        }
        for (_, order) in &workers {
            if order.has_draw_stage() {
                draw_buckets += 1;
            }
        }

        workers.retain(|(_, order)| !order.is_empty());

        FramePlan {
            app,
            workers,
            flips,
            draw_buckets,
        }
    }

    /// Culls and draws a single region immediately on the calling
    /// thread, outside the frame pipeline. Only valid for targets whose
    /// draw stage runs on the calling thread. `cull_sorting` keeps or
    /// skips the back-to-front ordering pass.
    pub fn render_subframe(
        &self,
        target: TargetHandle,
        region: RegionHandle,
        cull_sorting: bool,
    ) -> Result<()> {
        let _pacing = self.frame.lock().unwrap();
        let target = self.target(target)?;
        if !target.model().draw_on_calling_thread() {
            return Err(Error::NotCallingThread.into());
        }

        let region = target
            .region(region)
            .ok_or(Error::RegionHandleInvalid(region))?;

        let frame = self.frame_count.load(Ordering::SeqCst);
        renderer::subframe(&target, &region, frame, cull_sorting)?;
        Ok(())
    }

    fn target(&self, handle: TargetHandle) -> Result<Arc<RenderTarget>> {
        let windows = self.core.windows.lock().unwrap();
        match windows.get(handle) {
            Some(target) => Ok(target.clone()),
            None => Err(Error::TargetHandleInvalid(handle).into()),
        }
    }

    /// The engine-default threading model applied to targets created
    /// without an override.
    pub fn threading_model(&self) -> ThreadingModel {
        self.settings.read().unwrap().threading_model.clone()
    }

    /// Sets the engine-default threading model from its string form.
    pub fn set_threading_model(&self, model: &str) -> Result<()> {
        let model = model.parse()?;
        self.settings.write().unwrap().threading_model = model;
        Ok(())
    }

    /// Whether `render_frame` presents implicitly once the frame syncs.
    pub fn auto_flip(&self) -> bool {
        self.settings.read().unwrap().auto_flip
    }

    pub fn set_auto_flip(&self, enable: bool) {
        self.settings.write().unwrap().auto_flip = enable;
    }

    pub fn frame_buffer_properties(&self) -> FrameBufferProperties {
        self.settings.read().unwrap().frame_buffer_properties
    }

    pub fn set_frame_buffer_properties(&self, properties: FrameBufferProperties) {
        self.settings.write().unwrap().frame_buffer_properties = properties;
    }

    /// The flip handshake's current state.
    pub fn flip_state(&self) -> FlipState {
        self.core.flip.state()
    }

    /// The current frame number, bumped at the start of every
    /// `render_frame` call.
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::SeqCst)
    }

    /// Statistics of the most recently completed frame.
    pub fn frame_stats(&self) -> FrameStats {
        *self.stats.lock().unwrap()
    }

    /// The number of live render threads.
    pub fn render_thread_count(&self) -> usize {
        self.threads.lock().unwrap().len()
    }

    pub fn target_count(&self) -> usize {
        self.core.windows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.windows.lock().unwrap().is_empty()
    }

    pub fn target_dimensions(&self, handle: TargetHandle) -> Result<math::Vector2<u32>> {
        Ok(self.target(handle)?.dimensions())
    }

    /// The frame-buffer properties the target was opened with, resolved
    /// against the engine defaults of that moment.
    pub fn target_frame_buffer_properties(
        &self,
        handle: TargetHandle,
    ) -> Result<FrameBufferProperties> {
        Ok(*self.target(handle)?.properties())
    }

    pub fn target_is_active(&self, handle: TargetHandle) -> Result<bool> {
        Ok(self.target(handle)?.is_active())
    }

    /// Inactive targets are skipped by `render_frame` entirely.
    pub fn set_target_active(&self, handle: TargetHandle, active: bool) -> Result<()> {
        self.target(handle)?.set_active(active);
        Ok(())
    }

    /// Lets `render_frame` return without waiting for this target's
    /// threads to finish. The per-thread frame barrier still holds at
    /// the next dispatch.
    pub fn set_fire_and_forget(&self, handle: TargetHandle, enable: bool) -> Result<()> {
        self.target(handle)?.set_fire_and_forget(enable);
        Ok(())
    }

    /// Adds a display region to a target, fed by `culler`.
    pub fn add_region(
        &self,
        handle: TargetHandle,
        params: RegionParams,
        culler: Arc<dyn Culler>,
    ) -> Result<RegionHandle> {
        Ok(self.target(handle)?.create_region(params, culler))
    }

    /// Removes a region, returning false for a dead region handle.
    pub fn remove_region(&self, handle: TargetHandle, region: RegionHandle) -> Result<bool> {
        Ok(self.target(handle)?.remove_region(region))
    }

    pub fn set_region_camera(
        &self,
        handle: TargetHandle,
        region: RegionHandle,
        camera: Camera,
    ) -> Result<()> {
        let target = self.target(handle)?;
        if target.update_region(region, |v| v.camera = camera) {
            Ok(())
        } else {
            Err(Error::RegionHandleInvalid(region).into())
        }
    }

    pub fn set_region_active(
        &self,
        handle: TargetHandle,
        region: RegionHandle,
        active: bool,
    ) -> Result<()> {
        let target = self.target(handle)?;
        if target.update_region(region, |v| v.active = active) {
            Ok(())
        } else {
            Err(Error::RegionHandleInvalid(region).into())
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.remove_all_windows();
        self.terminate_threads();
    }
}
