//! # gles_harness
//!
//! A minimal fixed-function style rendering harness: it opens a surface, compiles and
//! links one shader program, uploads two static vertex buffers and spins a colored
//! triangle in front of a perspective camera, one frame per display refresh.
//!
//! ## Layers
//!
//! - [`gpu`]: the [`GraphicsContext`] capability surface and its backends, the windowed
//!   [`WgpuContext`] and the recording [`HeadlessContext`].
//! - [`shader`]: WGSL compilation, program linking and symbol resolution.
//! - [`geometry`], [`transform`], [`animation`]: the data a frame is built from.
//! - [`renderer`]: the per-frame orchestration.
//! - [`scene`] and [`app`]: startup assembly and the main loop.
//!
//! ## Example
//!
//! ```no_run
//! use gles_harness::{run, HarnessConfig, ShaderSources};
//!
//! fn main() -> anyhow::Result<()> {
//!     run(HarnessConfig::default().with_title("Triangle"), ShaderSources::builtin())
//! }
//! ```

pub mod animation;
pub mod app;
pub mod config;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod logging;
pub mod renderer;
pub mod scene;
pub mod shader;
pub mod transform;

pub use crate::animation::AnimationState;
pub use crate::app::{run, run_headless, App};
pub use crate::config::{HarnessConfig, RenderConfig, SurfaceConfig};
pub use crate::error::{
    BufferSizeMismatchError, ContextCreationError, GpuStateError, HarnessError,
    ShaderCompileError, ShaderLinkError, StackUnderflowError, SymbolKind, SymbolNotFoundError,
};
pub use crate::geometry::GeometryBuffer;
pub use crate::gpu::{GraphicsContext, HeadlessContext, WgpuContext};
pub use crate::logging::{init_logging, LoggingConfig};
pub use crate::renderer::{FrameRenderer, FrameReport, RenderState};
pub use crate::scene::{build_renderer, ShaderSources};
pub use crate::shader::{ShaderObject, ShaderProgram, ShaderProgramBuilder, ShaderStage};
pub use crate::transform::{TransformOp, TransformScope, TransformStack};

/// Built-in vertex stage. Declares `aVertexPosition`, `aVertexColor`, `uPMatrix` and
/// `uMVMatrix`.
pub const VERTEX_SHADER_SOURCE: &str = include_str!("shaders/triangle.vert.wgsl");

/// Built-in fragment stage; passes the interpolated vertex color through.
pub const FRAGMENT_SHADER_SOURCE: &str = include_str!("shaders/triangle.frag.wgsl");
