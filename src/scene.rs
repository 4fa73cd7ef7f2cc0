//! The stock scene: one colored triangle, and the startup sequence that builds it.

use crate::config::RenderConfig;
use crate::error::HarnessError;
use crate::geometry::GeometryBuffer;
use crate::gpu::{ErrorCode, GraphicsContext};
use crate::renderer::FrameRenderer;
use crate::shader::{ShaderProgramBuilder, ShaderStage};
use crate::{FRAGMENT_SHADER_SOURCE, VERTEX_SHADER_SOURCE};

/// Front face of a pyramid, three components per vertex.
pub const TRIANGLE_POSITIONS: [f32; 9] = [
    0.0, 1.0, 0.0, //
    -1.0, -1.0, 1.0, //
    1.0, -1.0, 1.0,
];

/// Red, green and blue, opaque, one per vertex.
pub const TRIANGLE_COLORS: [f32; 12] = [
    1.0, 0.0, 0.0, 1.0, //
    0.0, 1.0, 0.0, 1.0, //
    0.0, 0.0, 1.0, 1.0,
];

/// WGSL text of the two shader stages.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// The stages embedded in the crate.
    pub fn builtin() -> Self {
        Self::new(VERTEX_SHADER_SOURCE, FRAGMENT_SHADER_SOURCE)
    }
}

/// Compiles and links the program, uploads the triangle and hands both to a renderer.
///
/// Any failure aborts startup and names the stage that failed.
pub fn build_renderer<C: GraphicsContext + ?Sized>(
    ctx: &mut C,
    sources: &ShaderSources,
    config: &RenderConfig,
) -> Result<FrameRenderer, HarnessError> {
    let mut builder = ShaderProgramBuilder::new();

    let vertex = builder.compile_shader(ShaderStage::Vertex, &sources.vertex)?;
    let fragment = builder.compile_shader(ShaderStage::Fragment, &sources.fragment)?;
    for stage in [&vertex, &fragment] {
        if !stage.log().is_empty() {
            log::info!("{} stage log:\n{}", stage.stage(), stage.log());
        }
    }
    log::info!("Compiled shader stages");

    let program = builder.link_program(ctx, &vertex, &fragment)?;

    let position = GeometryBuffer::create(ctx, 3, 3, &TRIANGLE_POSITIONS)?;
    let color = GeometryBuffer::create(ctx, 4, 3, &TRIANGLE_COLORS)?;
    match ctx.get_error() {
        ErrorCode::NoError => log::debug!("Uploaded triangle buffers"),
        code => log::warn!("GPU error after buffer upload: {code}"),
    }

    FrameRenderer::new(ctx, program, position, color, config.clone())
}
