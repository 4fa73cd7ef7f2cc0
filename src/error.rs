//! # Errors
//!
//! Every failure the harness can report, one type per failure class, plus the
//! [`HarnessError`] umbrella used by the startup path.
//!
//! Construction-time errors ([`ContextCreationError`], [`ShaderCompileError`],
//! [`ShaderLinkError`], [`SymbolNotFoundError`], [`BufferSizeMismatchError`]) abort
//! startup. Their `Display` text names the failing stage and carries the raw
//! diagnostic log so that the message printed on exit is enough to fix the input.
//!
//! [`GpuStateError`] is the per-call failure of a state-changing GPU operation. The
//! frame loop logs it and keeps going.
//!
//! [`StackUnderflowError`] signals an unbalanced transform stack, which is always a
//! programming error in the caller.

use thiserror::Error;

use crate::gpu::ErrorCode;
use crate::shader::ShaderStage;

/// The rendering surface could not be brought up.
#[derive(Debug, Error)]
pub enum ContextCreationError {
    /// Width or height was zero.
    #[error("invalid surface dimensions {width}x{height}: both must be greater than zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// A rendering surface is already live in this process.
    #[error("a rendering context is already active in this process")]
    AlreadyActive,

    /// The native window could not be created.
    #[error("failed to create window: {0}")]
    Window(String),

    /// The GPU surface could not be created for the window.
    #[error("failed to create GPU surface: {0}")]
    Surface(String),

    /// No adapter can present to the surface.
    #[error("no GPU adapter is compatible with the surface")]
    NoAdapter,

    /// The adapter refused to hand out a device.
    #[error("failed to request GPU device: {0}")]
    Device(String),
}

/// A shader stage failed to compile.
#[derive(Debug, Clone, Error)]
#[error("{stage} shader failed to compile:\n{log}")]
pub struct ShaderCompileError {
    pub stage: ShaderStage,
    pub log: String,
}

/// Two compiled stages could not be linked into a program.
#[derive(Debug, Clone, Error)]
#[error("shader program failed to link:\n{log}")]
pub struct ShaderLinkError {
    pub log: String,
}

/// Which symbol table a lookup was made against.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SymbolKind {
    Attribute,
    Uniform,
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolKind::Attribute => f.write_str("attribute"),
            SymbolKind::Uniform => f.write_str("uniform"),
        }
    }
}

/// A linked program does not declare the requested symbol.
#[derive(Debug, Clone, Error)]
#[error("{kind} `{name}` is not declared by the linked program")]
pub struct SymbolNotFoundError {
    pub kind: SymbolKind,
    pub name: String,
}

/// Vertex data does not match the declared item size and count.
#[derive(Debug, Clone, Error)]
#[error(
    "buffer holds {actual} floats but {item_size} components x {item_count} items requires {expected}"
)]
pub struct BufferSizeMismatchError {
    pub item_size: u32,
    pub item_count: u32,
    pub expected: usize,
    pub actual: usize,
}

/// `pop` was called with no saved matrix.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
#[error("transform stack underflow: pop without a matching push")]
pub struct StackUnderflowError;

/// A state-changing GPU call failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
#[error("{operation} failed with {code}")]
pub struct GpuStateError {
    pub code: ErrorCode,
    pub operation: &'static str,
}

impl GpuStateError {
    pub fn new(code: ErrorCode, operation: &'static str) -> Self {
        Self { code, operation }
    }
}

/// Everything that can stop the harness during startup.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    ContextCreation(#[from] ContextCreationError),

    #[error(transparent)]
    ShaderCompile(#[from] ShaderCompileError),

    #[error(transparent)]
    ShaderLink(#[from] ShaderLinkError),

    #[error(transparent)]
    SymbolNotFound(#[from] SymbolNotFoundError),

    #[error(transparent)]
    BufferSizeMismatch(#[from] BufferSizeMismatchError),

    #[error("vertex item size must be between 1 and 4 components, got {0}")]
    InvalidItemSize(u32),

    #[error(transparent)]
    StackUnderflow(#[from] StackUnderflowError),

    #[error(transparent)]
    GpuState(#[from] GpuStateError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_names_stage_and_log() {
        let err = ShaderCompileError {
            stage: ShaderStage::Vertex,
            log: "expected `)`".to_owned(),
        };
        let text = err.to_string();
        assert!(text.starts_with("vertex shader failed to compile"));
        assert!(text.contains("expected `)`"));
    }

    #[test]
    fn umbrella_is_transparent() {
        let err: HarnessError = SymbolNotFoundError {
            kind: SymbolKind::Uniform,
            name: "uDoesNotExist".to_owned(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "uniform `uDoesNotExist` is not declared by the linked program"
        );
    }
}
