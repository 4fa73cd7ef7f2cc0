//! Startup configuration.
//!
//! [`SurfaceConfig`] describes the window the harness opens, [`RenderConfig`] the camera,
//! animation and frame pacing, and [`HarnessConfig`] bundles both. All three have defaults
//! that reproduce the stock scene: a black 1280x720 window showing a triangle spinning at
//! 90 degrees per second.

use crate::error::ContextCreationError;

/// Rendering surface parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub title: String,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fullscreen: false,
            title: String::new(),
        }
    }
}

impl SurfaceConfig {
    /// Rejects dimensions a surface cannot have.
    pub fn validate(&self) -> Result<(), ContextCreationError> {
        if self.width == 0 || self.height == 0 {
            return Err(ContextCreationError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// Per-frame rendering parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Vertical field of view of the projection.
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Where the object sits relative to the camera.
    pub object_offset: [f32; 3],
    /// Rotation speed about the Y axis, in degrees per second.
    pub angular_rate_degrees: f32,
    pub clear_color: [f32; 4],
    pub depth_test: bool,
    /// Poll and log the GPU error flag after every uniform upload.
    pub poll_gpu_errors: bool,
    /// Upper bound on the frame rate of loops whose present call returns immediately.
    /// `None` runs such loops unthrottled.
    pub frame_cap_hz: Option<u32>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 100.0,
            object_offset: [0.0, 0.0, -8.0],
            angular_rate_degrees: 90.0,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            depth_test: true,
            poll_gpu_errors: cfg!(debug_assertions),
            frame_cap_hz: Some(60),
        }
    }
}

/// Everything the main loop needs to start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarnessConfig {
    pub surface: SurfaceConfig,
    pub render: RenderConfig,
}

impl HarnessConfig {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.surface.width = width;
        self.surface.height = height;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.surface.title = title.into();
        self
    }

    pub fn with_fullscreen(mut self, fullscreen: bool) -> Self {
        self.surface.fullscreen = fullscreen;
        self
    }

    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_scene() {
        let config = HarnessConfig::default();
        assert_eq!((config.surface.width, config.surface.height), (1280, 720));
        assert!(!config.surface.fullscreen);
        assert!(config.surface.title.is_empty());
        assert_eq!(config.render.fov_y_degrees, 45.0);
        assert_eq!(config.render.object_offset, [0.0, 0.0, -8.0]);
        assert_eq!(config.render.angular_rate_degrees, 90.0);
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let config = HarnessConfig::default().with_size(0, 720);
        assert!(matches!(
            config.surface.validate(),
            Err(ContextCreationError::InvalidDimensions { width: 0, height: 720 })
        ));
        assert!(SurfaceConfig::default().validate().is_ok());
    }
}
