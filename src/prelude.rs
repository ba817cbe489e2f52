pub use crate::math;

pub use crate::cull;
pub use crate::cull::{CullResult, Culler, Drawable, SceneSetup, Viewport};

pub use crate::display;
pub use crate::display::{
    new_headless, Camera, DisplayPipe, FrameBufferProperties, RegionHandle, RegionParams,
    RegionViewport, StateGuardian, TargetHandle, TargetKind, TargetParams, ThreadingModel,
};

pub use crate::engine;
pub use crate::engine::{Engine, FlipState, FrameStats};

pub use crate::errors::Result;
pub use crate::settings::Settings;
