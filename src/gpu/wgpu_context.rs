//! # Windowed Backend
//!
//! [`WgpuContext`] implements [`GraphicsContext`] on top of `wgpu`, rendering into the
//! surface of a native window.
//!
//! ## Translation
//!
//! Calls are validated by the shared bind-state tracker first, exactly as in the headless
//! backend, and only then translated:
//!
//! - A buffer upload allocates a `wgpu::Buffer` with `VERTEX` usage holding the bytes.
//! - A linked program owns one shader module per stage, one uniform buffer per
//!   `var<uniform>` in bind group 0, the bind group tying them together, and a cache of
//!   render pipelines keyed by primitive kind and depth-test flag.
//! - `clear` and every `draw_arrays` record and submit their own render pass into the
//!   frame's surface texture. Uniform values are written just before the draw that reads
//!   them, so consecutive draws with different matrices each see their own values.
//! - `present_frame` presents the surface texture. The surface uses vsync presentation, so
//!   this is where the caller is held back to the display rate.
//!
//! ## Errors
//!
//! `wgpu` reports validation failures asynchronously through the device. They are captured
//! by an uncaptured-error hook and surface through [`GraphicsContext::get_error`].
//!
//! ## Lifetime
//!
//! Only one window surface may be live per process. Construction takes a [`SurfaceLease`]
//! which is released when the context is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::ContextCreationError;
use crate::gpu::state::{BindState, VertexStream};
use crate::gpu::{
    AttributeLocation, BufferHandle, BufferTarget, ClearMask, ErrorCode, GpuResult,
    GraphicsContext, PrimitiveKind, ProgramHandle, UniformLocation, UsageHint,
};
use crate::shader::{ProgramInterface, ShaderObject};

static SURFACE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Proof that the caller holds the process-wide rendering surface.
///
/// At most one lease exists at a time; dropping it frees the slot.
#[derive(Debug)]
pub struct SurfaceLease(());

impl SurfaceLease {
    /// Claims the surface slot.
    ///
    /// # Errors
    ///
    /// [`ContextCreationError::AlreadyActive`] while another lease is alive.
    pub fn acquire() -> Result<Self, ContextCreationError> {
        SURFACE_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| SurfaceLease(()))
            .map_err(|_| ContextCreationError::AlreadyActive)
    }
}

impl Drop for SurfaceLease {
    fn drop(&mut self) {
        SURFACE_ACTIVE.store(false, Ordering::Release);
    }
}

/// Surface texture acquired for the frame being built.
struct Frame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

/// GPU objects backing one linked program.
struct GpuProgram {
    vertex_module: wgpu::ShaderModule,
    vertex_entry: String,
    fragment_module: wgpu::ShaderModule,
    fragment_entry: String,
    layout: wgpu::PipelineLayout,
    bind_group: wgpu::BindGroup,
    /// Uniform buffers by `@binding`.
    uniform_buffers: HashMap<u32, wgpu::Buffer>,
    pipelines: HashMap<(PrimitiveKind, bool), wgpu::RenderPipeline>,
}

/// A [`GraphicsContext`] that renders into a window through `wgpu`.
pub struct WgpuContext {
    state: BindState,

    /// The surface associated with the window being rendered to.
    surface: wgpu::Surface<'static>,

    /// Handle to the GPU, used to create every resource below.
    device: wgpu::Device,

    /// Submission queue for command buffers and buffer writes.
    queue: wgpu::Queue,

    /// Current surface configuration; `width` and `height` track the window size.
    surface_config: wgpu::SurfaceConfiguration,

    /// Depth attachment matching the surface size.
    depth_texture_view: wgpu::TextureView,

    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    programs: HashMap<ProgramHandle, GpuProgram>,

    clear_color: wgpu::Color,
    depth_test: bool,
    viewport: (i32, i32, u32, u32),

    frame: Option<Frame>,

    /// Errors reported by the device outside any tracked call.
    device_errors: Arc<Mutex<Option<ErrorCode>>>,

    _lease: SurfaceLease,
}

impl WgpuContext {
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Creates a context rendering into `window`, blocking until the device is ready.
    pub fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, ContextCreationError> {
        pollster::block_on(Self::new_async(window, width, height))
    }

    /// Creates a context rendering into `window`.
    ///
    /// Requests an adapter that can present to the window's surface, opens a device on
    /// it and configures the surface for `width` x `height` pixels with vsync presentation.
    ///
    /// # Errors
    ///
    /// - [`ContextCreationError::InvalidDimensions`] if either dimension is zero.
    /// - [`ContextCreationError::AlreadyActive`] if another context is alive.
    /// - [`ContextCreationError::Surface`], [`ContextCreationError::NoAdapter`] or
    ///   [`ContextCreationError::Device`] if the platform refuses a step.
    pub async fn new_async(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, ContextCreationError> {
        if width == 0 || height == 0 {
            return Err(ContextCreationError::InvalidDimensions { width, height });
        }
        let lease = SurfaceLease::acquire()?;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let surface = instance
            .create_surface(window)
            .map_err(|err| ContextCreationError::Surface(err.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(ContextCreationError::NoAdapter)?;

        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", info.name, info.backend);
        log::debug!("WGPU Adapter Features: {:#?}", adapter.features());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("WGPU Device"),
                    memory_hints: wgpu::MemoryHints::default(),
                    required_features: wgpu::Features::default(),
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|err| ContextCreationError::Device(err.to_string()))?;

        let device_errors = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&device_errors);
        device.on_uncaptured_error(Box::new(move |error: wgpu::Error| {
            log::warn!("GPU device error: {error}");
            if let Ok(mut slot) = sink.lock() {
                slot.get_or_insert(device_error_code(&error));
            }
        }));

        let surface_capabilities = surface.get_capabilities(&adapter);

        // GL writes fragment colors to the framebuffer unconverted, so prefer a linear format.
        let surface_format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .ok_or_else(|| {
                ContextCreationError::Surface("surface reports no texture formats".to_owned())
            })?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &surface_config);
        log::info!("Configured {width}x{height} surface as {surface_format:?}");

        let depth_texture_view = create_depth_texture(&device, width, height);

        Ok(Self {
            state: BindState::default(),
            surface,
            device,
            queue,
            surface_config,
            depth_texture_view,
            buffers: HashMap::new(),
            programs: HashMap::new(),
            clear_color: wgpu::Color::BLACK,
            depth_test: false,
            viewport: (0, 0, width, height),
            frame: None,
            device_errors,
            _lease: lease,
        })
    }

    /// Resizes the rendering surface and its depth attachment.
    ///
    /// A zero dimension (a minimized window) is ignored; the previous size stays in effect.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.frame = None;
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_texture_view = create_depth_texture(&self.device, width, height);
    }

    fn sync_device_errors(&mut self) {
        let pending = self
            .device_errors
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(code) = pending {
            self.state.record(code);
        }
    }

    /// Acquires the surface texture for the current frame if it has not been acquired yet.
    fn ensure_frame(&mut self, operation: &'static str) -> GpuResult<()> {
        if self.frame.is_some() {
            return Ok(());
        }
        let texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                self.surface.configure(&self.device, &self.surface_config);
                self.surface.get_current_texture().map_err(|err| {
                    log::warn!("Failed to get surface texture: {err}");
                    self.state
                        .fail(ErrorCode::InvalidFramebufferOperation, operation)
                })?
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(self.state.fail(ErrorCode::OutOfMemory, operation));
            }
            Err(err) => {
                log::warn!("Failed to get surface texture: {err}");
                return Err(self
                    .state
                    .fail(ErrorCode::InvalidFramebufferOperation, operation));
            }
        };
        let view = texture.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Frame View"),
            format: Some(self.surface_config.format),
            ..Default::default()
        });
        self.frame = Some(Frame { texture, view });
        Ok(())
    }

    /// The viewport clipped to the surface, or `None` if nothing of it is visible.
    fn clipped_viewport(&self) -> Option<(f32, f32, f32, f32)> {
        let (x, y, width, height) = self.viewport;
        let surface_width = self.surface_config.width as i64;
        let surface_height = self.surface_config.height as i64;
        let left = (x as i64).clamp(0, surface_width);
        let top = (y as i64).clamp(0, surface_height);
        let right = (x as i64 + width as i64).clamp(0, surface_width);
        let bottom = (y as i64 + height as i64).clamp(0, surface_height);
        if right <= left || bottom <= top {
            return None;
        }
        // GL measures y from the bottom edge.
        let flipped_top = surface_height - bottom;
        Some((
            left as f32,
            flipped_top as f32,
            (right - left) as f32,
            (bottom - top) as f32,
        ))
    }
}

impl GraphicsContext for WgpuContext {
    fn create_buffer(&mut self) -> GpuResult<BufferHandle> {
        Ok(self.state.create_buffer())
    }

    fn bind_buffer(
        &mut self,
        target: BufferTarget,
        buffer: Option<BufferHandle>,
    ) -> GpuResult<()> {
        self.state.bind_buffer(target, buffer)
    }

    fn upload_data(
        &mut self,
        target: BufferTarget,
        bytes: &[u8],
        usage: UsageHint,
    ) -> GpuResult<()> {
        let handle = self.state.upload_data(target, bytes.len(), usage)?;
        let buffer = wgpu::util::DeviceExt::create_buffer_init(
            &self.device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("Vertex Buffer"),
                contents: bytes,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            },
        );
        if let Some(previous) = self.buffers.insert(handle, buffer) {
            previous.destroy();
        }
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) -> GpuResult<()> {
        self.state.delete_buffer(buffer)?;
        if let Some(buffer) = self.buffers.remove(&buffer) {
            buffer.destroy();
        }
        Ok(())
    }

    fn link_program(
        &mut self,
        vertex: &ShaderObject,
        fragment: &ShaderObject,
        interface: &ProgramInterface,
    ) -> Result<ProgramHandle, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Vertex Stage"),
            source: wgpu::ShaderSource::Wgsl(vertex.source().to_owned().into()),
        });
        let fragment_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Fragment Stage"),
            source: wgpu::ShaderSource::Wgsl(fragment.source().to_owned().into()),
        });

        let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = interface
            .uniforms
            .iter()
            .map(|uniform| wgpu::BindGroupLayoutEntry {
                binding: uniform.binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();
        let bind_group_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &layout_entries,
                label: Some("uniform_bind_group_layout"),
            });

        let uniform_buffers: HashMap<u32, wgpu::Buffer> = interface
            .uniforms
            .iter()
            .map(|uniform| {
                let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(uniform.name.as_str()),
                    size: u64::from(uniform.byte_size.max(16).next_multiple_of(16)),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                (uniform.binding, buffer)
            })
            .collect();

        let group_entries: Vec<wgpu::BindGroupEntry> = interface
            .uniforms
            .iter()
            .filter_map(|uniform| {
                uniform_buffers
                    .get(&uniform.binding)
                    .map(|buffer| wgpu::BindGroupEntry {
                        binding: uniform.binding,
                        resource: buffer.as_entire_binding(),
                    })
            })
            .collect();
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &group_entries,
            label: Some("uniform_bind_group"),
        });

        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Program Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(error.to_string());
        }

        let handle = self.state.register_program(interface.clone());
        self.programs.insert(
            handle,
            GpuProgram {
                vertex_module,
                vertex_entry: vertex.entry_point().to_owned(),
                fragment_module,
                fragment_entry: fragment.entry_point().to_owned(),
                layout,
                bind_group,
                uniform_buffers,
                pipelines: HashMap::new(),
            },
        );
        Ok(handle)
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) -> GpuResult<()> {
        self.state.use_program(program)
    }

    fn delete_program(&mut self, program: ProgramHandle) -> GpuResult<()> {
        self.state.delete_program(program)?;
        if let Some(program) = self.programs.remove(&program) {
            for buffer in program.uniform_buffers.values() {
                buffer.destroy();
            }
        }
        Ok(())
    }

    fn enable_attribute(&mut self, location: AttributeLocation) -> GpuResult<()> {
        self.state.enable_attribute(location)
    }

    fn attribute_pointer(
        &mut self,
        location: AttributeLocation,
        components: u32,
    ) -> GpuResult<()> {
        self.state.attribute_pointer(location, components)
    }

    fn upload_matrix4(&mut self, location: UniformLocation, matrix: &[f32; 16]) -> GpuResult<()> {
        self.state.upload_matrix4(location, matrix)
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        let [r, g, b, a] = rgba.map(f64::from);
        self.clear_color = wgpu::Color { r, g, b, a };
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) -> GpuResult<()> {
        self.viewport = (x, y, width, height);
        Ok(())
    }

    fn clear(&mut self, mask: ClearMask) -> GpuResult<()> {
        if mask.is_empty() {
            return Err(self.state.fail(ErrorCode::InvalidValue, "clear"));
        }
        self.ensure_frame("clear")?;
        let Some(frame) = self.frame.as_ref() else {
            return Err(self.state.fail(ErrorCode::InvalidFramebufferOperation, "clear"));
        };

        let color_load = if mask.contains(ClearMask::COLOR) {
            wgpu::LoadOp::Clear(self.clear_color)
        } else {
            wgpu::LoadOp::Load
        };
        let depth_load = if mask.contains(ClearMask::DEPTH) {
            wgpu::LoadOp::Clear(1.0)
        } else {
            wgpu::LoadOp::Load
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_texture_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn draw_arrays(&mut self, kind: PrimitiveKind, first: u32, count: u32) -> GpuResult<()> {
        const OP: &str = "draw_arrays";

        let call = self.state.prepare_draw(kind, first, count)?;
        if count == 0 {
            return Ok(());
        }
        let Some(viewport) = self.clipped_viewport() else {
            return Ok(());
        };
        self.ensure_frame(OP)?;

        let depth_test = self.depth_test;
        let surface_format = self.surface_config.format;
        let (Some(frame), Some(program)) =
            (self.frame.as_ref(), self.programs.get_mut(&call.program))
        else {
            return Err(self.state.fail(ErrorCode::InvalidOperation, OP));
        };

        for (binding, matrix) in &call.uniforms {
            if let Some(buffer) = program.uniform_buffers.get(binding) {
                self.queue
                    .write_buffer(buffer, 0, bytemuck::cast_slice(matrix.as_slice()));
            }
        }

        let mut vertex_buffers = Vec::with_capacity(call.streams.len());
        for stream in &call.streams {
            match self.buffers.get(&stream.buffer) {
                Some(buffer) => vertex_buffers.push(buffer),
                None => return Err(self.state.fail(ErrorCode::InvalidOperation, OP)),
            }
        }

        ensure_pipeline(
            &self.device,
            surface_format,
            program,
            &call.streams,
            call.kind,
            depth_test,
        );
        let program = &*program;
        let Some(pipeline) = program.pipelines.get(&(call.kind, depth_test)) else {
            return Err(self.state.fail(ErrorCode::InvalidOperation, OP));
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let (x, y, width, height) = viewport;
            render_pass.set_viewport(x, y, width, height, 0.0, 1.0);
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &program.bind_group, &[]);
            for (slot, buffer) in vertex_buffers.iter().enumerate() {
                render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }
            render_pass.draw(call.first..call.first + call.count, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn get_error(&mut self) -> ErrorCode {
        self.sync_device_errors();
        self.state.take_error()
    }

    fn present_frame(&mut self) -> GpuResult<()> {
        self.ensure_frame("present_frame")?;
        if let Some(Frame { texture, view }) = self.frame.take() {
            drop(view);
            texture.present();
        }
        Ok(())
    }

    fn present_blocks(&self) -> bool {
        true
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }
}

fn device_error_code(error: &wgpu::Error) -> ErrorCode {
    match error {
        wgpu::Error::OutOfMemory { .. } => ErrorCode::OutOfMemory,
        _ => ErrorCode::InvalidOperation,
    }
}

fn topology(kind: PrimitiveKind) -> wgpu::PrimitiveTopology {
    match kind {
        PrimitiveKind::Points => wgpu::PrimitiveTopology::PointList,
        PrimitiveKind::Lines => wgpu::PrimitiveTopology::LineList,
        PrimitiveKind::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        PrimitiveKind::Triangles => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveKind::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

/// Builds the pipeline for `kind` and `depth_test` unless it is already cached.
///
/// Each attribute stream gets its own tightly packed vertex buffer slot, in the order the
/// program declares its attributes.
fn ensure_pipeline(
    device: &wgpu::Device,
    surface_format: wgpu::TextureFormat,
    program: &mut GpuProgram,
    streams: &[VertexStream],
    kind: PrimitiveKind,
    depth_test: bool,
) {
    let GpuProgram {
        vertex_module,
        vertex_entry,
        fragment_module,
        fragment_entry,
        layout,
        pipelines,
        ..
    } = program;

    pipelines.entry((kind, depth_test)).or_insert_with(|| {
        log::debug!("Building pipeline for {kind:?} (depth test: {depth_test})");

        let attributes: Vec<[wgpu::VertexAttribute; 1]> = streams
            .iter()
            .map(|stream| {
                [wgpu::VertexAttribute {
                    format: vertex_format(stream.components),
                    offset: 0,
                    shader_location: stream.location,
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout> = streams
            .iter()
            .zip(&attributes)
            .map(|(stream, attribute)| wgpu::VertexBufferLayout {
                array_stride: u64::from(stream.components) * std::mem::size_of::<f32>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attribute,
            })
            .collect();

        let depth_stencil = if depth_test {
            wgpu::DepthStencilState {
                format: WgpuContext::DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }
        } else {
            wgpu::DepthStencilState {
                format: WgpuContext::DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }
        };

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Program Pipeline"),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: vertex_module,
                entry_point: Some(vertex_entry.as_str()),
                buffers: &buffers,
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: topology(kind),
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
                unclipped_depth: false,
            },
            depth_stencil: Some(depth_stencil),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: fragment_module,
                entry_point: Some(fragment_entry.as_str()),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        })
    });
}

/// Creates the depth attachment used by every render pass.
fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: WgpuContext::DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor {
        label: None,
        format: Some(WgpuContext::DEPTH_FORMAT),
        dimension: Some(wgpu::TextureViewDimension::D2),
        aspect: wgpu::TextureAspect::All,
        base_mip_level: 0,
        base_array_layer: 0,
        array_layer_count: None,
        mip_level_count: None,
        usage: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_surface_lease_at_a_time() {
        let lease = SurfaceLease::acquire().unwrap();
        assert!(matches!(
            SurfaceLease::acquire(),
            Err(ContextCreationError::AlreadyActive)
        ));
        drop(lease);
        assert!(SurfaceLease::acquire().is_ok());
    }

    #[test]
    fn every_component_count_has_a_vertex_format() {
        assert_eq!(vertex_format(3), wgpu::VertexFormat::Float32x3);
        assert_eq!(vertex_format(4), wgpu::VertexFormat::Float32x4);
        assert_eq!(
            topology(PrimitiveKind::Triangles),
            wgpu::PrimitiveTopology::TriangleList
        );
    }
}
