//! # Shader Programs
//!
//! Compiles WGSL stages, checks that two stages fit together, and hands them to the
//! [`GraphicsContext`] to be built into a program whose attribute and uniform locations
//! can then be resolved by name.
//!
//! ## Pipeline
//!
//! 1. [`ShaderProgramBuilder::compile_shader`] parses and validates one stage with `naga`
//!    and reflects its interface: the named `@location` inputs and outputs of the stage's
//!    entry point and the `var<uniform>` globals it declares.
//! 2. [`ShaderProgramBuilder::link_program`] checks the two interfaces against each other
//!    and asks the context to build the program. Only a successful link yields a
//!    [`ShaderProgram`]; there is no half-linked object to misuse.
//! 3. [`ShaderProgram::resolve_attribute_location`] and
//!    [`ShaderProgram::resolve_uniform_location`] turn names into locations once, so the
//!    frame loop never queries by name.
//!
//! ## Naming Contract
//!
//! Attribute names are the names of the vertex entry point's arguments (or of the members
//! of an input struct). Uniform names are the names of the module-scope
//! `var<uniform>` declarations. For example:
//!
//! ```wgsl
//! @group(0) @binding(0) var<uniform> uPMatrix: mat4x4<f32>;
//!
//! @vertex
//! fn vertex_main(@location(0) aVertexPosition: vec3<f32>) -> @builtin(position) vec4<f32> {
//!     return uPMatrix * vec4<f32>(aVertexPosition, 1.0);
//! }
//! ```
//!
//! declares the attribute `aVertexPosition` at location 0 and the uniform `uPMatrix` at
//! binding 0.

use crate::error::{ShaderCompileError, ShaderLinkError, SymbolKind, SymbolNotFoundError};
use crate::gpu::{AttributeLocation, GpuResult, GraphicsContext, ProgramHandle, UniformLocation};

/// One of the two programmable stages.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn naga_stage(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// A named `@location` slot: a vertex attribute, or a value passed between stages.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AttributeInfo {
    pub name: String,
    pub location: u32,
    /// Number of `f32` components (1 for a scalar, 2..=4 for a vector).
    pub components: u32,
}

/// Shape of a uniform as far as uploads are concerned.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformKind {
    /// `mat4x4<f32>`
    Mat4,
    /// Anything else; declared, but not writable through the matrix upload path.
    Other,
}

/// A `var<uniform>` of a linked program.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UniformInfo {
    pub name: String,
    pub binding: u32,
    pub kind: UniformKind,
    pub byte_size: u32,
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct ReflectedUniform {
    group: u32,
    info: UniformInfo,
}

/// One compiled stage.
///
/// Only successfully compiled stages exist as values; a failed compile is a
/// [`ShaderCompileError`]. The object is immutable and is consumed by reference when
/// linking.
#[derive(Debug, Clone)]
pub struct ShaderObject {
    stage: ShaderStage,
    source: String,
    entry_point: String,
    log: String,
    inputs: Vec<AttributeInfo>,
    outputs: Vec<AttributeInfo>,
    uniforms: Vec<ReflectedUniform>,
}

impl ShaderObject {
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Name of the entry point this stage runs.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Compiler notes for a successful compile. Usually empty.
    pub fn log(&self) -> &str {
        &self.log
    }

    pub fn inputs(&self) -> &[AttributeInfo] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[AttributeInfo] {
        &self.outputs
    }
}

/// The symbols a linked program exposes, sorted by location and binding.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ProgramInterface {
    pub attributes: Vec<AttributeInfo>,
    pub uniforms: Vec<UniformInfo>,
}

impl ProgramInterface {
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformInfo> {
        self.uniforms.iter().find(|uniform| uniform.name == name)
    }

    pub fn uniform_by_binding(&self, binding: u32) -> Option<&UniformInfo> {
        self.uniforms.iter().find(|uniform| uniform.binding == binding)
    }
}

/// A successfully linked program.
#[derive(Debug)]
pub struct ShaderProgram {
    handle: ProgramHandle,
    interface: ProgramInterface,
}

impl ShaderProgram {
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    /// Looks up the location of a vertex attribute.
    pub fn resolve_attribute_location(
        &self,
        name: &str,
    ) -> Result<AttributeLocation, SymbolNotFoundError> {
        self.interface
            .attribute(name)
            .map(|attribute| AttributeLocation(attribute.location))
            .ok_or_else(|| SymbolNotFoundError {
                kind: SymbolKind::Attribute,
                name: name.to_owned(),
            })
    }

    /// Looks up the location of a uniform.
    pub fn resolve_uniform_location(
        &self,
        name: &str,
    ) -> Result<UniformLocation, SymbolNotFoundError> {
        self.interface
            .uniform(name)
            .map(|uniform| UniformLocation {
                program: self.handle,
                binding: uniform.binding,
            })
            .ok_or_else(|| SymbolNotFoundError {
                kind: SymbolKind::Uniform,
                name: name.to_owned(),
            })
    }

    /// Activates this program for subsequent uniform uploads and draws.
    pub fn use_program<C: GraphicsContext + ?Sized>(&self, ctx: &mut C) -> GpuResult<()> {
        ctx.use_program(Some(self.handle))
    }

    /// Releases the program. Locations resolved from it are rejected afterwards.
    pub fn delete<C: GraphicsContext + ?Sized>(self, ctx: &mut C) -> GpuResult<()> {
        ctx.delete_program(self.handle)
    }
}

/// Compiles stages and links them into programs.
pub struct ShaderProgramBuilder {
    validator: naga::valid::Validator,
}

impl Default for ShaderProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderProgramBuilder {
    pub fn new() -> Self {
        Self {
            validator: naga::valid::Validator::new(
                naga::valid::ValidationFlags::all(),
                naga::valid::Capabilities::empty(),
            ),
        }
    }

    /// Compiles WGSL source for one stage.
    ///
    /// # Errors
    ///
    /// Returns [`ShaderCompileError`] with the stage and a non-empty diagnostic when the
    /// source does not parse, does not validate, has no entry point for `stage`, or passes
    /// something other than `f32` scalars and vectors through its `@location` slots.
    pub fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<ShaderObject, ShaderCompileError> {
        let fail = |log: String| ShaderCompileError { stage, log };

        let module = naga::front::wgsl::parse_str(source)
            .map_err(|err| fail(err.emit_to_string(source)))?;
        self.validator
            .validate(&module)
            .map_err(|err| fail(error_chain(&err)))?;

        let mut entry_points = module
            .entry_points
            .iter()
            .filter(|entry_point| entry_point.stage == stage.naga_stage());
        let Some(entry_point) = entry_points.next() else {
            return Err(fail(format!("source declares no @{stage} entry point")));
        };

        let mut notes = String::new();
        if entry_points.next().is_some() {
            notes.push_str(&format!(
                "note: several @{stage} entry points declared, using `{}`\n",
                entry_point.name
            ));
        }

        let mut inputs = Vec::new();
        for argument in &entry_point.function.arguments {
            collect_slots(
                &module,
                argument.name.as_deref(),
                argument.ty,
                argument.binding.as_ref(),
                &mut inputs,
            )
            .map_err(fail)?;
        }
        let mut outputs = Vec::new();
        if let Some(result) = &entry_point.function.result {
            collect_slots(&module, None, result.ty, result.binding.as_ref(), &mut outputs)
                .map_err(fail)?;
        }
        inputs.sort_by_key(|slot| slot.location);
        outputs.sort_by_key(|slot| slot.location);

        let uniforms = module
            .global_variables
            .iter()
            .filter(|(_, variable)| variable.space == naga::AddressSpace::Uniform)
            .filter_map(|(_, variable)| {
                let binding = variable.binding.as_ref()?;
                let inner = &module.types[variable.ty].inner;
                Some(ReflectedUniform {
                    group: binding.group,
                    info: UniformInfo {
                        name: variable.name.clone().unwrap_or_default(),
                        binding: binding.binding,
                        kind: uniform_kind(inner),
                        byte_size: inner.size(module.to_ctx()),
                    },
                })
            })
            .collect();

        log::debug!(
            "compiled {stage} stage `{}`: {} inputs, {} outputs",
            entry_point.name,
            inputs.len(),
            outputs.len()
        );

        Ok(ShaderObject {
            stage,
            source: source.to_owned(),
            entry_point: entry_point.name.clone(),
            log: notes,
            inputs,
            outputs,
            uniforms,
        })
    }

    /// Links a vertex and a fragment stage into a program.
    ///
    /// # Errors
    ///
    /// Returns [`ShaderLinkError`] when the stages are passed in the wrong slots, when a
    /// fragment input is not produced by the vertex stage, when the stages disagree about a
    /// uniform, when a uniform lives outside bind group 0, or when the context rejects the
    /// program.
    pub fn link_program<C: GraphicsContext + ?Sized>(
        &self,
        ctx: &mut C,
        vertex: &ShaderObject,
        fragment: &ShaderObject,
    ) -> Result<ShaderProgram, ShaderLinkError> {
        let interface = check_interface(vertex, fragment).map_err(|log| ShaderLinkError { log })?;
        let handle = ctx
            .link_program(vertex, fragment, &interface)
            .map_err(|log| ShaderLinkError { log })?;

        log::info!(
            "linked program {:?}: attributes [{}], uniforms [{}]",
            handle,
            names(interface.attributes.iter().map(|attribute| &attribute.name)),
            names(interface.uniforms.iter().map(|uniform| &uniform.name)),
        );

        Ok(ShaderProgram { handle, interface })
    }
}

fn names<'a>(iter: impl Iterator<Item = &'a String>) -> String {
    iter.map(String::as_str).collect::<Vec<_>>().join(", ")
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut log = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        log.push_str(&format!("\n  caused by: {cause}"));
        source = cause.source();
    }
    log
}

fn float_components(inner: &naga::TypeInner) -> Option<u32> {
    match *inner {
        naga::TypeInner::Scalar(scalar)
            if scalar.kind == naga::ScalarKind::Float && scalar.width == 4 =>
        {
            Some(1)
        }
        naga::TypeInner::Vector { size, scalar }
            if scalar.kind == naga::ScalarKind::Float && scalar.width == 4 =>
        {
            Some(size as u32)
        }
        _ => None,
    }
}

fn uniform_kind(inner: &naga::TypeInner) -> UniformKind {
    match *inner {
        naga::TypeInner::Matrix {
            columns: naga::VectorSize::Quad,
            rows: naga::VectorSize::Quad,
            scalar,
        } if scalar.kind == naga::ScalarKind::Float && scalar.width == 4 => UniformKind::Mat4,
        _ => UniformKind::Other,
    }
}

/// Flattens an entry point argument or result into its `@location` slots.
fn collect_slots(
    module: &naga::Module,
    name: Option<&str>,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    slots: &mut Vec<AttributeInfo>,
) -> Result<(), String> {
    let inner = &module.types[ty].inner;
    match binding {
        Some(naga::Binding::BuiltIn(_)) => Ok(()),
        Some(naga::Binding::Location { location, .. }) => {
            let label = name.unwrap_or("<unnamed>");
            let components = float_components(inner).ok_or_else(|| {
                format!("@location({location}) `{label}` must be an f32 scalar or vector")
            })?;
            slots.push(AttributeInfo {
                name: name.unwrap_or_default().to_owned(),
                location: *location,
                components,
            });
            Ok(())
        }
        None => match inner {
            naga::TypeInner::Struct { members, .. } => {
                for member in members {
                    collect_slots(
                        module,
                        member.name.as_deref(),
                        member.ty,
                        member.binding.as_ref(),
                        slots,
                    )?;
                }
                Ok(())
            }
            _ => Ok(()),
        },
    }
}

/// Checks that two stages form a program and returns the merged interface.
fn check_interface(
    vertex: &ShaderObject,
    fragment: &ShaderObject,
) -> Result<ProgramInterface, String> {
    let mut problems = Vec::new();

    if vertex.stage != ShaderStage::Vertex {
        problems.push(format!("expected a vertex stage, got a {} stage", vertex.stage));
    }
    if fragment.stage != ShaderStage::Fragment {
        problems.push(format!(
            "expected a fragment stage, got a {} stage",
            fragment.stage
        ));
    }
    if !problems.is_empty() {
        return Err(problems.join("\n"));
    }

    for input in &fragment.inputs {
        match vertex
            .outputs
            .iter()
            .find(|output| output.location == input.location)
        {
            None => problems.push(format!(
                "fragment input `{}` at @location({}) is not written by the vertex stage",
                input.name, input.location
            )),
            Some(output) if output.components != input.components => problems.push(format!(
                "@location({}) is written with {} components but read with {}",
                input.location, output.components, input.components
            )),
            Some(_) => {}
        }
    }

    let mut uniforms: Vec<UniformInfo> = Vec::new();
    for reflected in vertex.uniforms.iter().chain(&fragment.uniforms) {
        if reflected.group != 0 {
            problems.push(format!(
                "uniform `{}` is in @group({}); only group 0 is supported",
                reflected.info.name, reflected.group
            ));
            continue;
        }
        let info = &reflected.info;
        match uniforms.iter().find(|existing| existing.binding == info.binding) {
            None => uniforms.push(info.clone()),
            Some(existing) if existing == info => {}
            Some(existing) => problems.push(format!(
                "@binding({}) is declared as `{}` and as `{}`",
                info.binding, existing.name, info.name
            )),
        }
    }
    uniforms.sort_by_key(|uniform| uniform.binding);

    if !problems.is_empty() {
        return Err(problems.join("\n"));
    }

    Ok(ProgramInterface {
        attributes: vertex.inputs.clone(),
        uniforms,
    })
}
