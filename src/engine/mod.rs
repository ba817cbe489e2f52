//! The frame coordinator: schedules cull and draw work over the window
//! set, runs it on named render threads, and synchronizes the flip.
//!
//! One `render_frame` call walks every active target through the full
//! pipeline. Targets whose threading model names a dedicated thread have
//! their stages bundled into per-thread work orders and dispatched
//! through mailboxes; the rest run inline on the calling thread. Draw
//! completion is accounted by a flip controller so presentation never
//! overtakes rendering.

pub mod flip;
pub mod stats;

mod renderer;
mod system;
mod thread;

pub use self::flip::FlipState;
pub use self::stats::FrameStats;
pub use self::system::Engine;
