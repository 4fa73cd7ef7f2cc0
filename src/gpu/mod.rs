//! # GPU Capability Surface
//!
//! The `gpu` module defines [`GraphicsContext`], the set of primitive GPU operations the
//! rest of the harness is written against, together with the handle and enum types that
//! flow through it.
//!
//! ## Model
//!
//! The surface follows the immediate, bind-point driven model of GL ES 2:
//!
//! - Buffers are created empty, bound to a target, and filled through the bound target.
//! - An attribute pointer declares how the *currently bound* buffer feeds an attribute
//!   location of the active program. Bind state is global, not per buffer.
//! - Exactly one program is active at a time. Uniform values live with the program that
//!   declares them.
//! - `draw_arrays` consumes whatever is bound at the moment it is called.
//!
//! ## Errors
//!
//! Every state-changing call returns a [`GpuResult`], so failures are visible at the call
//! site. The first failure since the last poll is also latched into an error flag that
//! [`GraphicsContext::get_error`] returns and clears, which keeps the classic polling
//! workflow available for diagnostics.
//!
//! ## Backends
//!
//! - [`WgpuContext`]: renders to a window through `wgpu`.
//! - [`HeadlessContext`]: no surface; records every accepted call in a command log.
//!
//! Both share the same validation rules through the internal bind-state tracker, so a
//! sequence of calls that is accepted by one is accepted by the other.

mod headless;
mod state;
mod wgpu_context;

pub use crate::gpu::headless::{Command, HeadlessContext};
pub use crate::gpu::wgpu_context::{SurfaceLease, WgpuContext};

use crate::error::GpuStateError;
use crate::shader::{ProgramInterface, ShaderObject};

/// Result of a state-changing GPU call.
pub type GpuResult<T> = Result<T, GpuStateError>;

/// Opaque name of a GPU buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BufferHandle(pub(crate) u32);

/// Opaque name of a linked program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ProgramHandle(pub(crate) u32);

/// A vertex attribute slot, as resolved from a linked program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct AttributeLocation(pub(crate) u32);

impl AttributeLocation {
    /// The `@location` index the attribute occupies.
    pub fn index(self) -> u32 {
        self.0
    }
}

/// A uniform slot of one particular program.
///
/// The location remembers the program it was resolved from. Using it while another
/// program is active, or after its program was deleted, is rejected.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformLocation {
    pub(crate) program: ProgramHandle,
    pub(crate) binding: u32,
}

impl UniformLocation {
    /// The `@binding` index inside bind group 0.
    pub fn binding(self) -> u32 {
        self.binding
    }

    /// The program this location belongs to.
    pub fn program(self) -> ProgramHandle {
        self.program
    }
}

/// Buffer bind targets.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferTarget {
    /// Per-vertex attribute data.
    Array,
}

/// How often a buffer's contents are expected to change.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UsageHint {
    /// Uploaded once, never mutated.
    Static,
    /// May be re-uploaded every frame.
    Dynamic,
}

/// How vertices are assembled into primitives.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PrimitiveKind {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
}

/// Which framebuffer planes `clear` resets.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct ClearMask(u8);

impl ClearMask {
    pub const COLOR: ClearMask = ClearMask(0b01);
    pub const DEPTH: ClearMask = ClearMask(0b10);

    pub fn contains(self, other: ClearMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ClearMask {
    type Output = ClearMask;

    fn bitor(self, rhs: ClearMask) -> ClearMask {
        ClearMask(self.0 | rhs.0)
    }
}

/// The error flag reported by [`GraphicsContext::get_error`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum ErrorCode {
    #[default]
    NoError,
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    InvalidFramebufferOperation,
    OutOfMemory,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCode::NoError => "NO_ERROR",
            ErrorCode::InvalidEnum => "INVALID_ENUM",
            ErrorCode::InvalidValue => "INVALID_VALUE",
            ErrorCode::InvalidOperation => "INVALID_OPERATION",
            ErrorCode::InvalidFramebufferOperation => "INVALID_FRAMEBUFFER_OPERATION",
            ErrorCode::OutOfMemory => "OUT_OF_MEMORY",
        };
        f.write_str(name)
    }
}

/// The primitive operations the harness needs from a GPU.
///
/// Implementations must be driven from a single thread; none of the methods are
/// reentrant and the bind points they mutate are shared by every caller.
pub trait GraphicsContext {
    /// Allocates a new, empty buffer name.
    fn create_buffer(&mut self) -> GpuResult<BufferHandle>;

    /// Binds `buffer` to `target`, or clears the bind point with `None`.
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferHandle>)
        -> GpuResult<()>;

    /// Replaces the contents of the buffer bound to `target`.
    fn upload_data(&mut self, target: BufferTarget, bytes: &[u8], usage: UsageHint)
        -> GpuResult<()>;

    /// Releases a buffer. Bind points and attribute pointers that refer to it are cleared.
    fn delete_buffer(&mut self, buffer: BufferHandle) -> GpuResult<()>;

    /// Builds a program from two compiled stages whose interface has already been checked.
    ///
    /// On failure the backend's diagnostic log is returned.
    fn link_program(
        &mut self,
        vertex: &ShaderObject,
        fragment: &ShaderObject,
        interface: &ProgramInterface,
    ) -> Result<ProgramHandle, String>;

    /// Makes `program` the target of subsequent uniform uploads and draws.
    fn use_program(&mut self, program: Option<ProgramHandle>) -> GpuResult<()>;

    /// Releases a program. Its uniform locations become invalid.
    fn delete_program(&mut self, program: ProgramHandle) -> GpuResult<()>;

    /// Enables the vertex array for an attribute slot.
    fn enable_attribute(&mut self, location: AttributeLocation) -> GpuResult<()>;

    /// Declares that the buffer currently bound to [`BufferTarget::Array`] feeds `location`
    /// with `components` tightly packed, unnormalized `f32`s per vertex, starting at offset 0.
    fn attribute_pointer(&mut self, location: AttributeLocation, components: u32)
        -> GpuResult<()>;

    /// Stores a column-major 4x4 matrix into a uniform of the active program.
    fn upload_matrix4(&mut self, location: UniformLocation, matrix: &[f32; 16])
        -> GpuResult<()>;

    /// Sets the color used by [`ClearMask::COLOR`].
    fn set_clear_color(&mut self, rgba: [f32; 4]);

    /// Enables or disables depth testing for subsequent draws.
    fn set_depth_test(&mut self, enabled: bool);

    /// Sets the viewport rectangle for subsequent draws.
    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) -> GpuResult<()>;

    /// Clears the selected planes of the frame being built.
    fn clear(&mut self, mask: ClearMask) -> GpuResult<()>;

    /// Draws `count` vertices starting at `first` from the enabled attribute arrays.
    fn draw_arrays(&mut self, kind: PrimitiveKind, first: u32, count: u32) -> GpuResult<()>;

    /// Returns the first error raised since the previous call and clears it.
    fn get_error(&mut self) -> ErrorCode;

    /// Presents the frame being built.
    ///
    /// Backends that own a display block here until the next frame may begin.
    fn present_frame(&mut self) -> GpuResult<()>;

    /// Whether [`GraphicsContext::present_frame`] paces the caller on its own.
    fn present_blocks(&self) -> bool;

    /// Current size of the rendering surface in pixels.
    fn surface_size(&self) -> (u32, u32);
}

/// Reinterprets an `f32` slice as raw bytes for [`GraphicsContext::upload_data`].
pub fn float_bytes(data: &[f32]) -> &[u8] {
    bytemuck::cast_slice(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_mask_combines() {
        let mask = ClearMask::COLOR | ClearMask::DEPTH;
        assert!(mask.contains(ClearMask::COLOR));
        assert!(mask.contains(ClearMask::DEPTH));
        assert!(!ClearMask::COLOR.contains(ClearMask::DEPTH));
        assert!(ClearMask::default().is_empty());
    }

    #[test]
    fn error_codes_print_gl_names() {
        assert_eq!(ErrorCode::NoError.to_string(), "NO_ERROR");
        assert_eq!(ErrorCode::InvalidOperation.to_string(), "INVALID_OPERATION");
    }
}
