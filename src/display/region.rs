use std::sync::Arc;

use smallvec::SmallVec;

use crate::cull::Culler;
use crate::math;
use crate::math::prelude::*;

impl_handle!(RegionHandle);

/// The camera a display region renders from.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    /// World-to-view transform.
    pub view: math::Matrix4<f32>,
    /// View-to-clip transform.
    pub projection: math::Matrix4<f32>,
}

impl Default for Camera {
    fn default() -> Self {
        Camera {
            view: math::Matrix4::identity(),
            projection: math::Matrix4::identity(),
        }
    }
}

/// A sub-rectangle of a render target, in normalized [0, 1] coordinates
/// relative to the target's dimensions.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RegionViewport {
    /// Lower-left corner.
    pub position: math::Vector2<f32>,
    /// Extent towards the upper-right corner.
    pub size: math::Vector2<f32>,
}

impl Default for RegionViewport {
    fn default() -> Self {
        RegionViewport {
            position: math::Vector2::new(0.0, 0.0),
            size: math::Vector2::new(1.0, 1.0),
        }
    }
}

/// The parameters of a display region.
#[derive(Debug, Copy, Clone)]
pub struct RegionParams {
    /// Normalized sub-rectangle of the target to render into.
    pub viewport: RegionViewport,
    /// Regions of a target render in ascending `sort` order.
    pub sort: i32,
    /// Inactive regions are skipped entirely.
    pub active: bool,
    /// The camera this region renders from.
    pub camera: Camera,
}

impl Default for RegionParams {
    fn default() -> Self {
        RegionParams {
            viewport: RegionViewport::default(),
            sort: 0,
            active: true,
            camera: Camera::default(),
        }
    }
}

/// A display region of a render target: a viewport with a camera and the
/// cull-result producer feeding it.
#[derive(Clone)]
pub struct DisplayRegion {
    pub(crate) params: RegionParams,
    pub(crate) culler: Arc<dyn Culler>,
}

impl DisplayRegion {
    pub(crate) fn new(params: RegionParams, culler: Arc<dyn Culler>) -> Self {
        DisplayRegion { params, culler }
    }
}

/// One frame's snapshot of a target's active regions, ordered by sort key.
pub(crate) type RegionSnapshot = SmallVec<[(RegionHandle, DisplayRegion); 4]>;
