//! # Easel
//!
//! Easel is a small multi-threaded frame pipeline. It coordinates the
//! per-frame work of a set of render targets (windows and offscreen
//! buffers): culling scenes into draw lists, drawing them through
//! backend guardians, and flipping back buffers in sync.
//!
//! Each target carries a threading model naming the threads its cull
//! and draw stages run on. Targets that share a thread name share that
//! thread; the empty name stands for the calling thread. A single
//! `render_frame` call fans the work out over the named threads, waits
//! for it, and presents.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use easel::prelude::*;
//!
//! struct EmptyScene;
//!
//! impl Culler for EmptyScene {
//!     fn cull(&self, _: &SceneSetup) -> Result<Vec<Drawable>> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! let engine = Engine::new();
//! let window = engine
//!     .make_window_with(TargetParams::default(), new_headless(), "renderer")
//!     .unwrap();
//! engine
//!     .add_region(window, RegionParams::default(), Arc::new(EmptyScene))
//!     .unwrap();
//!
//! engine.render_frame();
//! assert_eq!(engine.frame_count(), 1);
//! assert_eq!(engine.flip_state(), FlipState::Flipped);
//! ```

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;

#[macro_use]
pub mod utils;

pub mod cull;
pub mod display;
pub mod engine;
pub mod errors;
pub mod math;
pub mod prelude;
pub mod settings;

pub use self::engine::{Engine, FlipState, FrameStats};
pub use self::errors::Result;
pub use self::settings::Settings;
