use inlinable_string::InlinableString;

use crate::math;

/// The requested pixel format of a render target's frame buffer. These are
/// wishes forwarded to the state guardian; whether the device honours them
/// is the backend's business.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameBufferProperties {
    /// Bits reserved for the color channels, in total.
    pub color_bits: u8,
    /// Bits reserved for the alpha channel.
    pub alpha_bits: u8,
    /// Bits reserved for the depth buffer.
    pub depth_bits: u8,
    /// Bits reserved for the stencil buffer.
    pub stencil_bits: u8,
    /// Requested multisample count, 0 disables multisampling.
    pub multisamples: u8,
    /// Number of back buffers; 1 gives classic double buffering.
    pub back_buffers: u8,
}

impl Default for FrameBufferProperties {
    fn default() -> Self {
        FrameBufferProperties {
            color_bits: 24,
            alpha_bits: 8,
            depth_bits: 24,
            stencil_bits: 8,
            multisamples: 0,
            back_buffers: 1,
        }
    }
}

/// Plain descriptor of the display device a target is opened on. Pipe and
/// guardian compatibility is a contract between the application and its
/// backend; the engine only records the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPipe {
    /// Display connection name, e.g. a monitor identifier.
    pub name: InlinableString,
    /// Interface tag of the device family, e.g. "opengl".
    pub interface: InlinableString,
    /// Full display size in pixels.
    pub display_size: math::Vector2<u32>,
}

impl Default for DisplayPipe {
    fn default() -> Self {
        DisplayPipe {
            name: InlinableString::from("primary"),
            interface: InlinableString::from("headless"),
            display_size: math::Vector2::new(1920, 1080),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn serde() {
        let props = FrameBufferProperties::default();
        let json = ::serde_json::to_string(&props).unwrap();
        let back: FrameBufferProperties = ::serde_json::from_str(&json).unwrap();
        assert_eq!(props, back);
    }
}
