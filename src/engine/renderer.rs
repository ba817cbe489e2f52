//! Stage execution shared by the calling thread and the render workers.
//! Failures stay inside the per-target boundary: a broken target is
//! logged and queued for release while the rest of the bucket continues.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::cull::{CullResult, FrameCull, RegionCull, SceneSetup, Viewport};
use crate::display::region::DisplayRegion;
use crate::display::target::RenderTarget;
use crate::errors::Result;
use crate::math;

use super::system::EngineCore;
use super::thread::{TargetWork, WorkOrder};

/// Executes one thread's frame order: queued releases first, then event
/// pumping, fused passes, cull passes and finally draw passes. Every cull
/// this thread owes other threads is published before this thread blocks
/// taking its own draw inputs, so split models can never jam each other.
pub(crate) fn execute(core: &EngineCore, order: &WorkOrder) {
    produce(core, order);
    consume(core, order);
}

/// The non-blocking half of a frame order: releases, event pumping,
/// fused passes and cull publication. A driver running several orders
/// inline on one thread runs this half for all of them before any
/// order's draws block taking.
pub(crate) fn produce(core: &EngineCore, order: &WorkOrder) {
    release(&order.releases);

    for target in &order.events {
        target.guardian().process_events();
    }

    for work in &order.cull_draws {
        fused_target(core, work, order.frame);
    }

    for work in &order.culls {
        cull_target(core, work, order.frame);
    }
}

/// The consuming half: draw passes, then this order's step of the flip
/// handshake.
pub(crate) fn consume(core: &EngineCore, order: &WorkOrder) {
    for target in &order.draws {
        draw_target(core, target, order.frame);
    }

    if order.has_draw_stage() {
        core.flip.bucket_done();
    }
}

/// Presents targets drawn on this thread. A failed flip queues the
/// target's release.
pub(crate) fn flip(core: &EngineCore, targets: &[Arc<RenderTarget>]) {
    for target in targets {
        if target.is_releasing() {
            continue;
        }

        if let Err(err) = target.guardian().flip() {
            warn!("target {} flip failed: {}", target.handle(), err);
            core.queue_release(target);
        }
    }
}

/// Releases targets' rendering resources, best-effort with logging.
pub(crate) fn release(targets: &[Arc<RenderTarget>]) {
    for target in targets {
        target.mark_for_release();
        if let Err(err) = target.guardian().release() {
            warn!("target {} release failed: {}", target.handle(), err);
        }
    }
}

/// One immediate cull+draw of a single region on the calling thread.
pub(crate) fn subframe(
    target: &Arc<RenderTarget>,
    region: &DisplayRegion,
    frame: u64,
    cull_sorting: bool,
) -> Result<u32> {
    let setup = scene_setup(target, region, frame);
    let items = region.culler.cull(&setup)?;
    let result = if cull_sorting {
        CullResult::bin(frame, items)
    } else {
        CullResult::unsorted(frame, items)
    };

    let mut guardian = target.guardian();
    guardian.begin_frame()?;
    let drawn = guardian.draw(&setup, &result)?;
    guardian.end_frame()?;
    Ok(drawn)
}

fn scene_setup(target: &RenderTarget, region: &DisplayRegion, frame: u64) -> SceneSetup {
    let dims = target.dimensions();
    let vp = region.params.viewport;

    SceneSetup {
        frame,
        camera: region.params.camera,
        viewport: Viewport {
            position: math::Vector2::new(
                (vp.position.x * dims.x as f32).round() as u32,
                (vp.position.y * dims.y as f32).round() as u32,
            ),
            size: math::Vector2::new(
                (vp.size.x * dims.x as f32).round() as u32,
                (vp.size.y * dims.y as f32).round() as u32,
            ),
        },
    }
}

/// Checks a target is fit to draw this frame. An invalid guardian gets
/// the target queued for release.
fn check_target(core: &EngineCore, target: &Arc<RenderTarget>) -> bool {
    if target.is_releasing() {
        return false;
    }

    if !target.guardian().is_valid() {
        warn!(
            "target {} guardian invalid, queueing release",
            target.handle()
        );
        core.queue_release(target);
        return false;
    }

    true
}

fn finish_target(
    core: &EngineCore,
    target: &Arc<RenderTarget>,
    outcome: ::std::thread::Result<Result<(u32, u32)>>,
) {
    match outcome {
        Ok(Ok((regions, drawn))) => core.counters.add_target(regions, drawn),
        Ok(Err(err)) => {
            warn!("target {} failed mid-frame: {}", target.handle(), err);
            core.queue_release(target);
        }
        Err(_) => {
            error!("panic contained while rendering target {}", target.handle());
            core.queue_release(target);
        }
    }
}

fn fused_target(core: &EngineCore, work: &TargetWork, frame: u64) {
    let target = &work.target;
    if !check_target(core, target) {
        return;
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(u32, u32)> {
        let mut guardian = target.guardian();
        guardian.begin_frame()?;

        let mut drawn = 0;
        for (_, region) in &work.regions {
            let setup = scene_setup(target, region, frame);
            let items = region.culler.cull(&setup)?;
            let result = CullResult::bin(frame, items);
            drawn += guardian.draw(&setup, &result)?;
        }

        guardian.end_frame()?;
        Ok((work.regions.len() as u32, drawn))
    }));

    finish_target(core, target, outcome);
}

fn cull_target(core: &EngineCore, work: &TargetWork, frame: u64) {
    let target = &work.target;

    // The paired draw thread blocks on this slot, so something must be
    // published no matter how the cull goes.
    if target.is_releasing() {
        target.handoff().publish(FrameCull::empty(frame));
        return;
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<FrameCull> {
        let mut regions = SmallVec::new();
        for (_, region) in &work.regions {
            let setup = scene_setup(target, region, frame);
            let items = region.culler.cull(&setup)?;
            regions.push(RegionCull {
                setup,
                result: CullResult::bin(frame, items),
            });
        }

        Ok(FrameCull { frame, regions })
    }));

    match outcome {
        Ok(Ok(cull)) => target.handoff().publish(cull),
        Ok(Err(err)) => {
            warn!("target {} cull failed: {}", target.handle(), err);
            core.queue_release(target);
            target.handoff().publish(FrameCull::empty(frame));
        }
        Err(_) => {
            error!("panic contained while culling target {}", target.handle());
            core.queue_release(target);
            target.handoff().publish(FrameCull::empty(frame));
        }
    }
}

fn draw_target(core: &EngineCore, target: &Arc<RenderTarget>, frame: u64) {
    // Drain the handoff unconditionally so the cull side can never jam
    // behind a skipped target.
    let cull = target.handoff().take(frame);
    if !check_target(core, target) {
        return;
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(u32, u32)> {
        let mut guardian = target.guardian();
        guardian.begin_frame()?;

        let mut drawn = 0;
        for region in &cull.regions {
            drawn += guardian.draw(&region.setup, &region.result)?;
        }

        guardian.end_frame()?;
        Ok((cull.regions.len() as u32, drawn))
    }));

    finish_target(core, target, outcome);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cull::{Culler, Drawable};
    use crate::display::backends;
    use crate::display::region::{RegionParams, RegionViewport};
    use crate::display::target::{TargetHandle, TargetKind, TargetParams};
    use crate::utils::prelude::HandleLike;

    struct NullCuller;

    impl Culler for NullCuller {
        fn cull(&self, _: &SceneSetup) -> Result<Vec<Drawable>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn viewport_resolves_to_pixels() {
        let params = TargetParams {
            dimensions: math::Vector2::new(800, 600),
            ..Default::default()
        };
        let target = RenderTarget::new(
            TargetHandle::new(0, 1),
            TargetKind::Buffer,
            &params,
            Default::default(),
            Default::default(),
            backends::new_headless(),
        );

        let region = DisplayRegion::new(
            RegionParams {
                viewport: RegionViewport {
                    position: math::Vector2::new(0.5, 0.0),
                    size: math::Vector2::new(0.5, 1.0),
                },
                ..Default::default()
            },
            Arc::new(NullCuller),
        );

        let setup = scene_setup(&target, &region, 3);
        assert_eq!(setup.frame, 3);
        assert_eq!(setup.viewport.position, math::Vector2::new(400, 0));
        assert_eq!(setup.viewport.size, math::Vector2::new(400, 600));
    }
}
