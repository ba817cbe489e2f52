//! Engine-wide configuration.

use crate::display::{FrameBufferProperties, ThreadingModel};

/// Configuration applied at engine creation. Every field has a sensible
/// default, so partially specified sources deserialize cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether `render_frame` presents implicitly once every draw bucket
    /// of the frame has completed. When disabled, presentation waits for
    /// an explicit `flip_frame` call.
    #[serde(default = "default_auto_flip")]
    pub auto_flip: bool,
    /// The threading model applied to targets created without one of
    /// their own.
    #[serde(default)]
    pub threading_model: ThreadingModel,
    /// Framebuffer properties applied to targets created without their
    /// own.
    #[serde(default)]
    pub frame_buffer_properties: FrameBufferProperties,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            auto_flip: true,
            threading_model: ThreadingModel::default(),
            frame_buffer_properties: FrameBufferProperties::default(),
        }
    }
}

fn default_auto_flip() -> bool {
    true
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert!(settings.auto_flip);
        assert!(settings.threading_model.single_threaded());
    }

    #[test]
    fn partial_source_fills_in_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "threading_model": "cull/draw" }"#).unwrap();
        assert!(settings.auto_flip);
        assert_eq!(settings.threading_model.cull_name(), "cull");
        assert_eq!(settings.threading_model.draw_name(), "draw");
    }
}
