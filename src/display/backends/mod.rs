//! The per-target capability the engine drives every pipeline stage
//! through. A guardian owns one target's rendering state; the engine
//! never touches devices or swap chains itself, it only sequences calls
//! into the guardian from whichever thread the target's threading model
//! picked.

use crate::cull::{CullResult, SceneSetup};
use crate::errors::Result;

mod headless;

/// Stage surface of one render target. A guardian is handed between
/// render threads whole frames at a time and is never called from two
/// threads at once, so implementations only need to be `Send`.
pub trait StateGuardian: Send {
    /// Prepares the target for one frame of drawing. An error skips the
    /// target this frame and queues its release.
    fn begin_frame(&mut self) -> Result<()>;

    /// Draws one region's binned cull output, returning the number of
    /// items drawn.
    fn draw(&mut self, setup: &SceneSetup, result: &CullResult) -> Result<u32>;

    /// Finishes this frame's drawing on the target.
    fn end_frame(&mut self) -> Result<()>;

    /// Presents the finished back buffer.
    fn flip(&mut self) -> Result<()>;

    /// Gives up the target's rendering resources. Called on the thread
    /// that owns the target's draw state, once, as the last call.
    fn release(&mut self) -> Result<()>;

    /// Drops accumulated state so the target starts over from scratch.
    fn reset(&mut self) -> Result<()>;

    /// Whether the underlying surface can still be rendered to. Consulted
    /// before every frame.
    fn is_valid(&self) -> bool;

    /// Pumps windowing events for the target. Offscreen targets ignore
    /// it.
    fn process_events(&mut self) {}
}

/// Creates a guardian with no backing device. Frames run through the
/// whole pipeline without touching hardware, which is all the engine
/// needs when running headless.
pub fn new_headless() -> Box<dyn StateGuardian> {
    Box::new(self::headless::HeadlessGuardian::new())
}
