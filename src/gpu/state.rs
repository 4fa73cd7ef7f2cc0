//! Bind-point bookkeeping shared by every [`GraphicsContext`](super::GraphicsContext)
//! backend.
//!
//! The tracker owns the GL-visible state: buffer names and sizes, the array bind point,
//! the registered programs and the active one, attribute slots, uniform values and the
//! latched error flag. Backends call into it first and only touch their own resources
//! once a call has been accepted.

use std::collections::{BTreeMap, HashMap};

use crate::error::GpuStateError;
use crate::gpu::{
    AttributeLocation, BufferHandle, BufferTarget, ErrorCode, GpuResult, PrimitiveKind,
    ProgramHandle, UniformLocation, UsageHint,
};
use crate::shader::{ProgramInterface, UniformKind};

#[derive(Debug, Default)]
struct BufferRecord {
    byte_len: usize,
    usage: Option<UsageHint>,
}

#[derive(Debug, Default, Clone, Copy)]
struct AttributeSlot {
    enabled: bool,
    source: Option<(BufferHandle, u32)>,
}

/// One vertex stream feeding a draw, in the order the program declares its attributes.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct VertexStream {
    pub location: u32,
    pub buffer: BufferHandle,
    pub components: u32,
}

/// Everything a backend needs to execute an accepted draw.
#[derive(Debug, Clone)]
pub(crate) struct DrawCall {
    pub program: ProgramHandle,
    pub kind: PrimitiveKind,
    pub first: u32,
    pub count: u32,
    pub streams: Vec<VertexStream>,
    pub uniforms: Vec<(u32, [f32; 16])>,
}

#[derive(Debug, Default)]
pub(crate) struct BindState {
    next_name: u32,
    buffers: HashMap<BufferHandle, BufferRecord>,
    array_buffer: Option<BufferHandle>,
    programs: HashMap<ProgramHandle, ProgramInterface>,
    current_program: Option<ProgramHandle>,
    attributes: BTreeMap<u32, AttributeSlot>,
    uniforms: HashMap<UniformLocation, [f32; 16]>,
    last_error: Option<ErrorCode>,
}

impl BindState {
    fn next_name(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }

    /// Builds the error for a rejected call and latches it if the flag is clear.
    pub fn fail(&mut self, code: ErrorCode, operation: &'static str) -> GpuStateError {
        self.record(code);
        GpuStateError::new(code, operation)
    }

    /// Latches an error raised outside a tracked call (for example by the device).
    pub fn record(&mut self, code: ErrorCode) {
        if code != ErrorCode::NoError && self.last_error.is_none() {
            self.last_error = Some(code);
        }
    }

    pub fn take_error(&mut self) -> ErrorCode {
        self.last_error.take().unwrap_or_default()
    }

    pub fn create_buffer(&mut self) -> BufferHandle {
        let handle = BufferHandle(self.next_name());
        self.buffers.insert(handle, BufferRecord::default());
        handle
    }

    pub fn bind_buffer(
        &mut self,
        target: BufferTarget,
        buffer: Option<BufferHandle>,
    ) -> GpuResult<()> {
        if let Some(handle) = buffer {
            if !self.buffers.contains_key(&handle) {
                return Err(self.fail(ErrorCode::InvalidValue, "bind_buffer"));
            }
        }
        match target {
            BufferTarget::Array => self.array_buffer = buffer,
        }
        Ok(())
    }

    pub fn bound_buffer(&self, target: BufferTarget) -> Option<BufferHandle> {
        match target {
            BufferTarget::Array => self.array_buffer,
        }
    }

    /// Accepts an upload into the buffer bound to `target` and returns that buffer.
    pub fn upload_data(
        &mut self,
        target: BufferTarget,
        byte_len: usize,
        usage: UsageHint,
    ) -> GpuResult<BufferHandle> {
        let Some(handle) = self.bound_buffer(target) else {
            return Err(self.fail(ErrorCode::InvalidOperation, "upload_data"));
        };
        let already_static = self
            .buffers
            .get(&handle)
            .is_some_and(|record| record.usage == Some(UsageHint::Static));
        if already_static {
            return Err(self.fail(ErrorCode::InvalidOperation, "upload_data"));
        }
        let record = self.buffers.entry(handle).or_default();
        record.byte_len = byte_len;
        record.usage = Some(usage);
        Ok(handle)
    }

    pub fn delete_buffer(&mut self, buffer: BufferHandle) -> GpuResult<()> {
        if self.buffers.remove(&buffer).is_none() {
            return Err(self.fail(ErrorCode::InvalidValue, "delete_buffer"));
        }
        if self.array_buffer == Some(buffer) {
            self.array_buffer = None;
        }
        for slot in self.attributes.values_mut() {
            if matches!(slot.source, Some((handle, _)) if handle == buffer) {
                slot.source = None;
            }
        }
        Ok(())
    }

    pub fn register_program(&mut self, interface: ProgramInterface) -> ProgramHandle {
        let handle = ProgramHandle(self.next_name());
        self.programs.insert(handle, interface);
        handle
    }

    pub fn use_program(&mut self, program: Option<ProgramHandle>) -> GpuResult<()> {
        if let Some(handle) = program {
            if !self.programs.contains_key(&handle) {
                return Err(self.fail(ErrorCode::InvalidValue, "use_program"));
            }
        }
        self.current_program = program;
        Ok(())
    }

    pub fn delete_program(&mut self, program: ProgramHandle) -> GpuResult<()> {
        if self.programs.remove(&program).is_none() {
            return Err(self.fail(ErrorCode::InvalidValue, "delete_program"));
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.uniforms.retain(|location, _| location.program != program);
        Ok(())
    }

    pub fn enable_attribute(&mut self, location: AttributeLocation) -> GpuResult<()> {
        self.attributes.entry(location.0).or_default().enabled = true;
        Ok(())
    }

    pub fn attribute_pointer(
        &mut self,
        location: AttributeLocation,
        components: u32,
    ) -> GpuResult<()> {
        if !(1..=4).contains(&components) {
            return Err(self.fail(ErrorCode::InvalidValue, "attribute_pointer"));
        }
        let Some(buffer) = self.array_buffer else {
            return Err(self.fail(ErrorCode::InvalidOperation, "attribute_pointer"));
        };
        self.attributes.entry(location.0).or_default().source = Some((buffer, components));
        Ok(())
    }

    pub fn upload_matrix4(&mut self, location: UniformLocation, matrix: &[f32; 16]) -> GpuResult<()> {
        if self.current_program != Some(location.program) {
            return Err(self.fail(ErrorCode::InvalidOperation, "upload_matrix4"));
        }
        let is_matrix = self
            .programs
            .get(&location.program)
            .and_then(|interface| interface.uniform_by_binding(location.binding))
            .is_some_and(|uniform| uniform.kind == UniformKind::Mat4);
        if !is_matrix {
            return Err(self.fail(ErrorCode::InvalidOperation, "upload_matrix4"));
        }
        self.uniforms.insert(location, *matrix);
        Ok(())
    }

    /// Checks that a draw can run against the current bind state and snapshots its inputs.
    pub fn prepare_draw(
        &mut self,
        kind: PrimitiveKind,
        first: u32,
        count: u32,
    ) -> GpuResult<DrawCall> {
        const OP: &str = "draw_arrays";

        let Some(end) = first.checked_add(count) else {
            return Err(self.fail(ErrorCode::InvalidValue, OP));
        };
        let Some(program) = self.current_program else {
            return Err(self.fail(ErrorCode::InvalidOperation, OP));
        };
        let Some(interface) = self.programs.get(&program) else {
            return Err(self.fail(ErrorCode::InvalidOperation, OP));
        };

        let mut streams = Vec::with_capacity(interface.attributes.len());
        let mut valid = true;
        for attribute in &interface.attributes {
            let slot = self
                .attributes
                .get(&attribute.location)
                .copied()
                .unwrap_or_default();
            let stream = match (slot.enabled, slot.source) {
                (true, Some((buffer, components))) if components == attribute.components => {
                    VertexStream {
                        location: attribute.location,
                        buffer,
                        components,
                    }
                }
                _ => {
                    valid = false;
                    break;
                }
            };
            let needed = end as usize * stream.components as usize * std::mem::size_of::<f32>();
            let available = self
                .buffers
                .get(&stream.buffer)
                .map_or(0, |record| record.byte_len);
            if count > 0 && available < needed {
                valid = false;
                break;
            }
            streams.push(stream);
        }

        let uniforms = interface
            .uniforms
            .iter()
            .filter(|uniform| uniform.kind == UniformKind::Mat4)
            .map(|uniform| {
                let location = UniformLocation {
                    program,
                    binding: uniform.binding,
                };
                let value = self.uniforms.get(&location).copied().unwrap_or([0.0; 16]);
                (uniform.binding, value)
            })
            .collect();

        if !valid {
            return Err(self.fail(ErrorCode::InvalidOperation, OP));
        }

        Ok(DrawCall {
            program,
            kind,
            first,
            count,
            streams,
            uniforms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{AttributeInfo, UniformInfo};

    fn interface() -> ProgramInterface {
        ProgramInterface {
            attributes: vec![AttributeInfo {
                name: "aVertexPosition".to_owned(),
                location: 0,
                components: 3,
            }],
            uniforms: vec![UniformInfo {
                name: "uMVMatrix".to_owned(),
                binding: 1,
                kind: UniformKind::Mat4,
                byte_size: 64,
            }],
        }
    }

    #[test]
    fn first_error_is_latched_until_polled() {
        let mut state = BindState::default();
        let err = state.upload_data(BufferTarget::Array, 12, UsageHint::Static);
        assert_eq!(err.unwrap_err().code, ErrorCode::InvalidOperation);
        let _ = state.bind_buffer(BufferTarget::Array, Some(BufferHandle(99)));

        assert_eq!(state.take_error(), ErrorCode::InvalidOperation);
        assert_eq!(state.take_error(), ErrorCode::NoError);
    }

    #[test]
    fn static_buffers_reject_reupload() {
        let mut state = BindState::default();
        let buffer = state.create_buffer();
        state.bind_buffer(BufferTarget::Array, Some(buffer)).unwrap();
        state.upload_data(BufferTarget::Array, 36, UsageHint::Static).unwrap();
        assert!(state.upload_data(BufferTarget::Array, 36, UsageHint::Static).is_err());
    }

    #[test]
    fn dynamic_buffers_accept_reupload() {
        let mut state = BindState::default();
        let buffer = state.create_buffer();
        state.bind_buffer(BufferTarget::Array, Some(buffer)).unwrap();
        state.upload_data(BufferTarget::Array, 36, UsageHint::Dynamic).unwrap();
        assert_eq!(
            state.upload_data(BufferTarget::Array, 48, UsageHint::Dynamic),
            Ok(buffer)
        );
    }

    #[test]
    fn draw_without_program_is_invalid() {
        let mut state = BindState::default();
        let err = state.prepare_draw(PrimitiveKind::Triangles, 0, 3).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
    }

    #[test]
    fn draw_checks_buffer_length() {
        let mut state = BindState::default();
        let program = state.register_program(interface());
        state.use_program(Some(program)).unwrap();
        let buffer = state.create_buffer();
        state.bind_buffer(BufferTarget::Array, Some(buffer)).unwrap();
        state.upload_data(BufferTarget::Array, 2 * 3 * 4, UsageHint::Static).unwrap();
        state.enable_attribute(AttributeLocation(0)).unwrap();
        state.attribute_pointer(AttributeLocation(0), 3).unwrap();

        assert!(state.prepare_draw(PrimitiveKind::Triangles, 0, 3).is_err());
        let call = state.prepare_draw(PrimitiveKind::Lines, 0, 2).unwrap();
        assert_eq!(call.kind, PrimitiveKind::Lines);
        assert_eq!(call.streams.len(), 1);
        assert_eq!(call.uniforms, vec![(1, [0.0; 16])]);
    }

    #[test]
    fn uniform_of_deleted_program_is_rejected() {
        let mut state = BindState::default();
        let program = state.register_program(interface());
        state.use_program(Some(program)).unwrap();
        let location = UniformLocation { program, binding: 1 };
        state.upload_matrix4(location, &[1.0; 16]).unwrap();

        state.delete_program(program).unwrap();
        let err = state.upload_matrix4(location, &[1.0; 16]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
    }

    #[test]
    fn deleting_a_buffer_clears_its_bindings() {
        let mut state = BindState::default();
        let buffer = state.create_buffer();
        state.bind_buffer(BufferTarget::Array, Some(buffer)).unwrap();
        state.attribute_pointer(AttributeLocation(0), 3).unwrap();
        state.delete_buffer(buffer).unwrap();

        assert_eq!(state.bound_buffer(BufferTarget::Array), None);
        assert!(state.attributes[&0].source.is_none());
    }
}
