//! # Frame Renderer
//!
//! [`FrameRenderer`] draws one frame of the spinning object per call. It owns every piece of
//! state the frame needs in a [`RenderState`]: the linked program, the two vertex buffers,
//! the symbol locations resolved once at startup, the projection matrix, the model-view
//! [`TransformStack`] and the [`AnimationState`].
//!
//! ## Frame Order
//!
//! Each call to [`FrameRenderer::render_frame`] runs, in this order:
//!
//! 1. viewport over the whole surface, clear color and depth;
//! 2. projection from the surface aspect ratio;
//! 3. model-view: identity, translate to the object offset, rotate about Y by the
//!    accumulated angle (inside a transform scope);
//! 4. advance the animation by the frame's elapsed time;
//! 5. bind the position buffer to its attribute, then the color buffer to its attribute;
//! 6. upload the projection matrix, then the model-view matrix;
//! 7. draw the position buffer's vertices as triangles;
//! 8. unbind the array buffer.
//!
//! GPU failures inside a frame do not stop it. They are collected into the returned
//! [`FrameReport`] and logged.

use web_time::Instant;

use crate::animation::AnimationState;
use crate::config::RenderConfig;
use crate::error::{GpuStateError, HarnessError};
use crate::geometry::GeometryBuffer;
use crate::gpu::{
    AttributeLocation, BufferTarget, ClearMask, ErrorCode, GpuResult, GraphicsContext,
    PrimitiveKind, UniformLocation,
};
use crate::shader::ShaderProgram;
use crate::transform::{TransformOp, TransformStack};

/// Vertex position attribute, 3 components.
pub const POSITION_ATTRIBUTE: &str = "aVertexPosition";
/// Vertex color attribute, 4 components (RGBA).
pub const COLOR_ATTRIBUTE: &str = "aVertexColor";
/// Projection matrix uniform.
pub const PROJECTION_UNIFORM: &str = "uPMatrix";
/// Model-view matrix uniform.
pub const MODEL_VIEW_UNIFORM: &str = "uMVMatrix";

/// What happened during one frame.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FrameReport {
    /// Draw calls the context accepted.
    pub draws: u32,
    /// Failed calls and errors picked up by polling, in the order they occurred.
    pub errors: Vec<GpuStateError>,
}

impl FrameReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn check(&mut self, result: GpuResult<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                self.errors.push(err);
                false
            }
        }
    }
}

/// State owned by the renderer across frames.
#[derive(Debug)]
pub struct RenderState {
    program: ShaderProgram,
    position: GeometryBuffer,
    color: GeometryBuffer,
    position_location: AttributeLocation,
    color_location: AttributeLocation,
    projection_location: UniformLocation,
    model_view_location: UniformLocation,
    projection: nalgebra_glm::Mat4,
    model_view: TransformStack,
    animation: AnimationState,
}

/// Per-frame orchestrator.
#[derive(Debug)]
pub struct FrameRenderer {
    state: RenderState,
    config: RenderConfig,
}

impl FrameRenderer {
    /// Takes ownership of a linked program and its vertex buffers and prepares the context.
    ///
    /// Resolves the four required symbols, activates the program, enables both attribute
    /// arrays and applies the clear color and depth-test setting from `config`.
    ///
    /// # Errors
    ///
    /// [`HarnessError::SymbolNotFound`] if the program lacks a required symbol, or
    /// [`HarnessError::GpuState`] if the context rejects a setup call.
    pub fn new<C: GraphicsContext + ?Sized>(
        ctx: &mut C,
        program: ShaderProgram,
        position: GeometryBuffer,
        color: GeometryBuffer,
        config: RenderConfig,
    ) -> Result<Self, HarnessError> {
        let position_location = program.resolve_attribute_location(POSITION_ATTRIBUTE)?;
        let color_location = program.resolve_attribute_location(COLOR_ATTRIBUTE)?;
        let projection_location = program.resolve_uniform_location(PROJECTION_UNIFORM)?;
        let model_view_location = program.resolve_uniform_location(MODEL_VIEW_UNIFORM)?;

        program.use_program(ctx)?;
        ctx.enable_attribute(position_location)?;
        ctx.enable_attribute(color_location)?;
        ctx.set_clear_color(config.clear_color);
        ctx.set_depth_test(config.depth_test);

        Ok(Self {
            state: RenderState {
                program,
                position,
                color,
                position_location,
                color_location,
                projection_location,
                model_view_location,
                projection: nalgebra_glm::Mat4::identity(),
                model_view: TransformStack::new(),
                animation: AnimationState::new(config.angular_rate_degrees),
            },
            config,
        })
    }

    /// Accumulated rotation in degrees.
    pub fn angle(&self) -> f32 {
        self.state.animation.angle()
    }

    /// Projection used by the most recent frame.
    pub fn projection(&self) -> &nalgebra_glm::Mat4 {
        &self.state.projection
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.state.program
    }

    /// Renders a frame, taking the elapsed time from the wall clock.
    ///
    /// The first tick contributes no rotation.
    pub fn render_tick<C: GraphicsContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        now: Instant,
    ) -> FrameReport {
        let delta_ms = self.state.animation.tick(now);
        self.render_frame(ctx, delta_ms)
    }

    /// Renders one frame and advances the animation by `delta_ms` milliseconds.
    pub fn render_frame<C: GraphicsContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        delta_ms: f32,
    ) -> FrameReport {
        let mut report = FrameReport::default();
        let (width, height) = ctx.surface_size();
        if self.config.poll_gpu_errors {
            let stale = ctx.get_error();
            if stale != ErrorCode::NoError {
                log::debug!("error flag carried into frame: {stale}");
            }
        }

        report.check(ctx.set_viewport(0, 0, width, height));
        report.check(ctx.clear(ClearMask::COLOR | ClearMask::DEPTH));

        let aspect = width as f32 / height.max(1) as f32;
        self.state.projection = nalgebra_glm::perspective_rh_zo(
            aspect,
            self.config.fov_y_degrees.to_radians(),
            self.config.near,
            self.config.far,
        );
        let projection = matrix_columns(&self.state.projection);

        let RenderState {
            position,
            color,
            position_location,
            color_location,
            projection_location,
            model_view_location,
            model_view,
            animation,
            ..
        } = &mut self.state;

        model_view.load_identity();
        let mut scope = model_view.scope();
        let [x, y, z] = self.config.object_offset;
        scope.mutate_current(TransformOp::translate(x, y, z));
        scope.mutate_current(TransformOp::rotate_degrees(
            animation.angle(),
            nalgebra_glm::Vec3::y(),
        ));
        let model_view_columns = scope.current_columns();

        animation.advance(delta_ms);

        report.check(position.bind_for_attribute(ctx, *position_location));
        report.check(color.bind_for_attribute(ctx, *color_location));

        let poll = self.config.poll_gpu_errors;
        upload_matrix(ctx, *projection_location, &projection, poll, &mut report);
        upload_matrix(ctx, *model_view_location, &model_view_columns, poll, &mut report);

        if report.check(ctx.draw_arrays(PrimitiveKind::Triangles, 0, position.item_count())) {
            report.draws += 1;
        }

        report.check(ctx.bind_buffer(BufferTarget::Array, None));
        drop(scope);

        for err in &report.errors {
            log::warn!("frame error: {err}");
        }
        report
    }

    /// Releases the buffers and then the program, in reverse creation order.
    ///
    /// Every release is attempted; the first failure is returned.
    pub fn release<C: GraphicsContext + ?Sized>(self, ctx: &mut C) -> GpuResult<()> {
        let RenderState {
            program,
            position,
            color,
            ..
        } = self.state;

        let results = [
            color.delete(ctx),
            position.delete(ctx),
            ctx.use_program(None),
            program.delete(ctx),
        ];
        log::info!("released renderer resources");
        results.into_iter().collect()
    }
}

fn matrix_columns(matrix: &nalgebra_glm::Mat4) -> [f32; 16] {
    let mut columns = [0.0; 16];
    columns.copy_from_slice(matrix.as_slice());
    columns
}

/// Uploads a matrix and, when `poll` is set, checks the error flag right after.
///
/// The flag keeps the first failure, so a code already in the report is not added again.
fn upload_matrix<C: GraphicsContext + ?Sized>(
    ctx: &mut C,
    location: UniformLocation,
    matrix: &[f32; 16],
    poll: bool,
    report: &mut FrameReport,
) {
    let accepted = report.check(ctx.upload_matrix4(location, matrix));
    if !poll {
        return;
    }
    let code = ctx.get_error();
    log::debug!("error flag after uniform upload: {code}");
    let reported = report.errors.iter().any(|err| err.code == code);
    if accepted && code != ErrorCode::NoError && !reported {
        report
            .errors
            .push(GpuStateError::new(code, "upload_matrix4"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{Command, HeadlessContext};
    use crate::scene::{build_renderer, ShaderSources};

    fn setup(config: RenderConfig) -> (HeadlessContext, FrameRenderer) {
        let mut ctx = HeadlessContext::new(1280, 720);
        let renderer = build_renderer(&mut ctx, &ShaderSources::builtin(), &config).unwrap();
        ctx.take_commands();
        (ctx, renderer)
    }

    #[test]
    fn frame_follows_fixed_order() {
        let (mut ctx, mut renderer) = setup(RenderConfig::default());
        let report = renderer.render_frame(&mut ctx, 0.0);
        assert!(report.is_clean());
        assert_eq!(report.draws, 1);

        let kinds: Vec<&str> = ctx
            .commands()
            .iter()
            .map(|command| match command {
                Command::SetViewport { .. } => "viewport",
                Command::Clear(_) => "clear",
                Command::BindBuffer(_, Some(_)) => "bind",
                Command::BindBuffer(_, None) => "unbind",
                Command::AttributePointer { .. } => "pointer",
                Command::UploadMatrix { .. } => "uniform",
                Command::Draw { .. } => "draw",
                _ => "other",
            })
            .collect();
        assert_eq!(
            kinds,
            [
                "viewport", "clear", "bind", "pointer", "bind", "pointer", "uniform", "uniform",
                "draw", "unbind"
            ]
        );
    }

    #[test]
    fn angle_advances_after_model_view() {
        let (mut ctx, mut renderer) = setup(RenderConfig::default());
        renderer.render_frame(&mut ctx, 1000.0);
        assert_eq!(renderer.angle(), 90.0);

        let first_model_view = ctx.commands().iter().find_map(|command| match command {
            Command::UploadMatrix { location, matrix } if location.binding() == 1 => {
                Some(*matrix)
            }
            _ => None,
        });
        let mut expected = TransformStack::new();
        expected.mutate_current(TransformOp::translate(0.0, 0.0, -8.0));
        assert_eq!(first_model_view, Some(expected.current_columns()));
    }

    #[test]
    fn viewport_follows_surface_size() {
        let (mut ctx, mut renderer) = setup(RenderConfig::default());
        ctx.resize(640, 640);
        renderer.render_frame(&mut ctx, 16.0);

        assert_eq!(
            ctx.commands().first(),
            Some(&Command::SetViewport {
                x: 0,
                y: 0,
                width: 640,
                height: 640,
            })
        );
        let expected = nalgebra_glm::perspective_rh_zo(1.0, 45f32.to_radians(), 0.1, 100.0);
        assert_eq!(*renderer.projection(), expected);
    }

    #[test]
    fn first_tick_does_not_rotate() {
        let (mut ctx, mut renderer) = setup(RenderConfig::default());
        renderer.render_tick(&mut ctx, Instant::now());
        assert_eq!(renderer.angle(), 0.0);
    }

    #[test]
    fn failures_are_reported_not_fatal() {
        let (mut ctx, mut renderer) = setup(RenderConfig::default());
        ctx.use_program(None).unwrap();

        let report = renderer.render_frame(&mut ctx, 16.0);
        assert_eq!(report.draws, 0);
        assert!(report
            .errors
            .iter()
            .all(|err| err.code == ErrorCode::InvalidOperation));
        assert_eq!(report.errors.len(), 3);
        assert_eq!(renderer.angle(), 90.0 * 16.0 / 1000.0);
    }

    #[test]
    fn polled_flag_does_not_repeat_frame_failures() {
        let config = RenderConfig {
            poll_gpu_errors: true,
            ..RenderConfig::default()
        };
        let (mut ctx, mut renderer) = setup(config);
        ctx.delete_buffer(renderer.state.position.handle()).unwrap();

        for _ in 0..2 {
            let report = renderer.render_frame(&mut ctx, 16.0);
            let operations: Vec<&str> = report.errors.iter().map(|err| err.operation).collect();
            assert_eq!(operations, ["bind_buffer", "draw_arrays"]);
            assert_eq!(report.errors[0].code, ErrorCode::InvalidValue);
        }
    }

    #[test]
    fn release_deletes_in_reverse_order() {
        let (mut ctx, renderer) = setup(RenderConfig::default());
        let program = renderer.program().handle();
        renderer.release(&mut ctx).unwrap();

        let commands = ctx.commands();
        assert!(matches!(commands[0], Command::DeleteBuffer(_)));
        assert!(matches!(commands[1], Command::DeleteBuffer(_)));
        assert_eq!(commands[2], Command::UseProgram(None));
        assert_eq!(commands[3], Command::DeleteProgram(program));
    }
}
