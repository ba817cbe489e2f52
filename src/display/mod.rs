//! Render target management: windows and offscreen buffers, the display
//! regions layered onto them, and the threading models that hand their
//! pipeline stages to named render threads.

pub mod backends;
pub mod errors;
pub mod model;
pub mod properties;
pub mod region;
pub mod target;

pub use self::backends::{new_headless, StateGuardian};
pub use self::errors::{Error, Result};
pub use self::model::{ThreadingModel, CALLING_THREAD};
pub use self::properties::{DisplayPipe, FrameBufferProperties};
pub use self::region::{Camera, RegionHandle, RegionParams, RegionViewport};
pub use self::target::{TargetHandle, TargetKind, TargetParams};
