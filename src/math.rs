//! Math utilities, re-exported from `cgmath`.

pub use cgmath::*;

pub mod prelude {
    pub use cgmath::prelude::*;
}
