// src/gpu/mod.rs
//! Graphics device abstraction.
//!
//! The pipeline never talks to a graphics API directly; it issues commands
//! through the [`Device`] trait. Two implementations ship with the crate:
//! [`headless::HeadlessDevice`] (deterministic, in-process, counts every call)
//! and an OpenGL 3.3 backend behind the `gl` cargo feature.
//!
//! Meshes and textures arrive pre-loaded as opaque handles; the device only
//! binds and draws them.

pub mod headless;

#[cfg(feature = "gl")]
pub mod gl;

use crate::error::Result;

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    };
}

handle_type!(
    /// One compiled shader stage, prior to linking.
    StageHandle
);
handle_type!(
    /// One linked GPU program.
    ProgramHandle
);
handle_type!(
    /// An immutable GPU texture (color attachment, depth map, material map).
    TextureHandle
);
handle_type!(
    /// A render target: up to four color attachments plus an optional depth buffer.
    TargetHandle
);
handle_type!(
    /// Pre-uploaded geometry (vertex/index buffers, already resident).
    MeshHandle
);

/// Shader stage kinds accepted by [`Device::compile_stage`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
}

/// GLSL-level type of an active uniform or attribute.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Int,
    Bool,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
    Sampler2D,
}

impl SymbolKind {
    /// Parse a GLSL type keyword. Unknown types return `None` and the
    /// declaration is ignored by reflection.
    pub fn from_glsl(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "int" | "uint" => SymbolKind::Int,
            "bool" => SymbolKind::Bool,
            "float" => SymbolKind::Float,
            "vec2" => SymbolKind::Vec2,
            "vec3" => SymbolKind::Vec3,
            "vec4" => SymbolKind::Vec4,
            "mat3" => SymbolKind::Mat3,
            "mat4" => SymbolKind::Mat4,
            "sampler2D" | "sampler2DShadow" => SymbolKind::Sampler2D,
            _ => return None,
        })
    }
}

/// One uniform or attribute retained by the linker.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveSymbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Array size; `1` for non-arrays.
    pub size: u32,
    pub location: i32,
}

/// A uniform value with element-wise equality.
///
/// Scalars, fixed-size tuples and arrays compare element by element; texture
/// bindings compare by handle identity. This bounds the cache comparison cost
/// in [`crate::shader::ShaderProgram`] to the size of the uniform.
#[derive(Clone, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
    FloatArray(Vec<f32>),
    Vec3Array(Vec<[f32; 3]>),
    Vec4Array(Vec<[f32; 4]>),
    /// Texture handle plus the texture unit it should be sampled from.
    Texture(TextureHandle, u32),
}

impl From<glam::Vec2> for UniformValue {
    fn from(v: glam::Vec2) -> Self {
        UniformValue::Vec2(v.to_array())
    }
}

impl From<glam::Vec3> for UniformValue {
    fn from(v: glam::Vec3) -> Self {
        UniformValue::Vec3(v.to_array())
    }
}

impl From<glam::Vec4> for UniformValue {
    fn from(v: glam::Vec4) -> Self {
        UniformValue::Vec4(v.to_array())
    }
}

impl From<glam::Mat4> for UniformValue {
    fn from(m: glam::Mat4) -> Self {
        UniformValue::Mat4(m.to_cols_array())
    }
}

impl From<glam::Mat3> for UniformValue {
    fn from(m: glam::Mat3) -> Self {
        UniformValue::Mat3(m.to_cols_array())
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

/// Pixel format of a render-target attachment.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    /// 8-bit normalized RGBA, display range.
    Rgba8,
    /// Half-float RGBA, HDR intermediates.
    Rgba16F,
    /// Single 8-bit channel (ambient occlusion).
    R8,
}

/// Render-target description.
#[derive(Clone, Debug)]
pub struct TargetDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    /// Up to four color attachments. May be empty for depth-only targets.
    pub color_formats: Vec<TextureFormat>,
    pub depth: bool,
}

/// Fixed-function blend state. Alpha blending is enabled only for the
/// transparency pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlendMode {
    Opaque,
    Alpha,
    Additive,
}

/// Depth test / write state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DepthState {
    pub test: bool,
    pub write: bool,
}

impl DepthState {
    pub const READ_WRITE: DepthState = DepthState { test: true, write: true };
    pub const READ_ONLY: DepthState = DepthState { test: true, write: false };
    pub const DISABLED: DepthState = DepthState { test: false, write: false };
}

/// The command interface the pipeline renders through.
///
/// Submission is single-threaded and frame-synchronous; the device executes
/// asynchronously but preserves submission order, so binding a target before
/// issuing draws into it is the only synchronization the pipeline needs.
pub trait Device {
    // --- programs ---------------------------------------------------------

    /// Compile one stage from (already preprocessed) source text.
    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> Result<StageHandle>;

    /// Link compiled stages into a program. Stage handles stay valid and must
    /// be destroyed separately.
    fn link_program(&mut self, stages: &[StageHandle]) -> Result<ProgramHandle>;

    fn destroy_stage(&mut self, stage: StageHandle);
    fn destroy_program(&mut self, program: ProgramHandle);

    /// Active uniforms actually retained by the linker. Declared-but-unused
    /// uniforms may be absent.
    fn program_uniforms(&self, program: ProgramHandle) -> Vec<ActiveSymbol>;
    fn program_attributes(&self, program: ProgramHandle) -> Vec<ActiveSymbol>;

    fn bind_program(&mut self, program: Option<ProgramHandle>);
    fn bound_program(&self) -> Option<ProgramHandle>;

    /// Push one uniform value. Callers are expected to elide redundant writes;
    /// the device applies every call it receives.
    fn write_uniform(&mut self, program: ProgramHandle, location: i32, value: &UniformValue);

    // --- render targets ---------------------------------------------------

    fn create_target(&mut self, desc: &TargetDesc) -> Result<TargetHandle>;
    fn resize_target(&mut self, target: TargetHandle, width: u32, height: u32);
    fn destroy_target(&mut self, target: TargetHandle);
    fn target_size(&self, target: TargetHandle) -> (u32, u32);
    fn target_color(&self, target: TargetHandle, index: usize) -> Option<TextureHandle>;
    fn target_depth(&self, target: TargetHandle) -> Option<TextureHandle>;

    /// Bind a target for drawing; `None` binds the default framebuffer.
    fn bind_target(&mut self, target: Option<TargetHandle>);
    /// Copy `src` into `dst`: color attachments pairwise, plus depth when
    /// both targets have a depth buffer (history buffers, depth hand-off).
    fn copy_target(&mut self, src: TargetHandle, dst: TargetHandle);

    // --- fixed-function state --------------------------------------------

    fn clear(&mut self, color: Option<[f32; 4]>, depth: Option<f32>);
    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn set_blend(&mut self, mode: BlendMode);
    fn set_depth(&mut self, state: DepthState);
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>);

    // --- draws ------------------------------------------------------------

    fn draw_mesh(&mut self, mesh: MeshHandle);
    /// Draw a fullscreen triangle (no vertex buffers; the vertex shader
    /// synthesizes positions from `gl_VertexID`).
    fn draw_fullscreen(&mut self);
}
