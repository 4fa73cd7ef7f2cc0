//! A [`GraphicsContext`] without a display.
//!
//! Every accepted call is appended to a command log, rejected calls are not. Tests read
//! the log back to check call order; the timer-paced main loop uses this backend when no
//! window is wanted.

use std::collections::HashMap;

use crate::gpu::state::BindState;
use crate::gpu::{
    AttributeLocation, BufferHandle, BufferTarget, ClearMask, ErrorCode, GpuResult,
    GraphicsContext, PrimitiveKind, ProgramHandle, UniformLocation, UsageHint,
};
use crate::shader::{ProgramInterface, ShaderObject};

/// One accepted call, as recorded by [`HeadlessContext`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateBuffer(BufferHandle),
    BindBuffer(BufferTarget, Option<BufferHandle>),
    UploadData {
        buffer: BufferHandle,
        byte_len: usize,
        usage: UsageHint,
    },
    DeleteBuffer(BufferHandle),
    LinkProgram(ProgramHandle),
    UseProgram(Option<ProgramHandle>),
    DeleteProgram(ProgramHandle),
    EnableAttribute(AttributeLocation),
    AttributePointer {
        location: AttributeLocation,
        buffer: BufferHandle,
        components: u32,
    },
    UploadMatrix {
        location: UniformLocation,
        matrix: [f32; 16],
    },
    SetClearColor([f32; 4]),
    SetDepthTest(bool),
    SetViewport {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    Clear(ClearMask),
    Draw {
        kind: PrimitiveKind,
        first: u32,
        count: u32,
    },
    Present,
}

/// Recording backend.
///
/// Unlike [`WgpuContext`](super::WgpuContext) any number of these may exist at once.
#[derive(Debug)]
pub struct HeadlessContext {
    state: BindState,
    width: u32,
    height: u32,
    commands: Vec<Command>,
    contents: HashMap<BufferHandle, Vec<u8>>,
    frames_presented: u64,
}

impl HeadlessContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: BindState::default(),
            width,
            height,
            commands: Vec::new(),
            contents: HashMap::new(),
            frames_presented: 0,
        }
    }

    /// Changes the reported surface size, as a window resize would.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Returns the log recorded so far and starts a new one.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Last bytes uploaded into `buffer`, if it is still alive.
    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.contents.get(&buffer).map(Vec::as_slice)
    }
}

impl GraphicsContext for HeadlessContext {
    fn create_buffer(&mut self) -> GpuResult<BufferHandle> {
        let buffer = self.state.create_buffer();
        self.contents.insert(buffer, Vec::new());
        self.commands.push(Command::CreateBuffer(buffer));
        Ok(buffer)
    }

    fn bind_buffer(
        &mut self,
        target: BufferTarget,
        buffer: Option<BufferHandle>,
    ) -> GpuResult<()> {
        self.state.bind_buffer(target, buffer)?;
        self.commands.push(Command::BindBuffer(target, buffer));
        Ok(())
    }

    fn upload_data(
        &mut self,
        target: BufferTarget,
        bytes: &[u8],
        usage: UsageHint,
    ) -> GpuResult<()> {
        let buffer = self.state.upload_data(target, bytes.len(), usage)?;
        self.contents.insert(buffer, bytes.to_vec());
        self.commands.push(Command::UploadData {
            buffer,
            byte_len: bytes.len(),
            usage,
        });
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) -> GpuResult<()> {
        self.state.delete_buffer(buffer)?;
        self.contents.remove(&buffer);
        self.commands.push(Command::DeleteBuffer(buffer));
        Ok(())
    }

    fn link_program(
        &mut self,
        _vertex: &ShaderObject,
        _fragment: &ShaderObject,
        interface: &ProgramInterface,
    ) -> Result<ProgramHandle, String> {
        let program = self.state.register_program(interface.clone());
        self.commands.push(Command::LinkProgram(program));
        Ok(program)
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) -> GpuResult<()> {
        self.state.use_program(program)?;
        self.commands.push(Command::UseProgram(program));
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramHandle) -> GpuResult<()> {
        self.state.delete_program(program)?;
        self.commands.push(Command::DeleteProgram(program));
        Ok(())
    }

    fn enable_attribute(&mut self, location: AttributeLocation) -> GpuResult<()> {
        self.state.enable_attribute(location)?;
        self.commands.push(Command::EnableAttribute(location));
        Ok(())
    }

    fn attribute_pointer(
        &mut self,
        location: AttributeLocation,
        components: u32,
    ) -> GpuResult<()> {
        self.state.attribute_pointer(location, components)?;
        if let Some(buffer) = self.state.bound_buffer(BufferTarget::Array) {
            self.commands.push(Command::AttributePointer {
                location,
                buffer,
                components,
            });
        }
        Ok(())
    }

    fn upload_matrix4(&mut self, location: UniformLocation, matrix: &[f32; 16]) -> GpuResult<()> {
        self.state.upload_matrix4(location, matrix)?;
        self.commands.push(Command::UploadMatrix {
            location,
            matrix: *matrix,
        });
        Ok(())
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.commands.push(Command::SetClearColor(rgba));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.commands.push(Command::SetDepthTest(enabled));
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) -> GpuResult<()> {
        self.commands.push(Command::SetViewport {
            x,
            y,
            width,
            height,
        });
        Ok(())
    }

    fn clear(&mut self, mask: ClearMask) -> GpuResult<()> {
        if mask.is_empty() {
            return Err(self.state.fail(ErrorCode::InvalidValue, "clear"));
        }
        self.commands.push(Command::Clear(mask));
        Ok(())
    }

    fn draw_arrays(&mut self, kind: PrimitiveKind, first: u32, count: u32) -> GpuResult<()> {
        self.state.prepare_draw(kind, first, count)?;
        self.commands.push(Command::Draw { kind, first, count });
        Ok(())
    }

    fn get_error(&mut self) -> ErrorCode {
        self.state.take_error()
    }

    fn present_frame(&mut self) -> GpuResult<()> {
        self.frames_presented += 1;
        self.commands.push(Command::Present);
        Ok(())
    }

    fn present_blocks(&self) -> bool {
        false
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
