// src/gpu/gl.rs
//! OpenGL 3.3 core backend on top of `glow`.
//!
//! The host owns the context and the swapchain; this device only manages the
//! objects behind the opaque handles. All calls happen on the context thread.

use std::collections::HashMap;

use glow::HasContext;
use log::warn;

use crate::error::{RenderError, Result};

use super::{
    ActiveSymbol, BlendMode, DepthState, Device, MeshHandle, ProgramHandle, ShaderStage,
    StageHandle, SymbolKind, TargetDesc, TargetHandle, TextureFormat, TextureHandle, UniformValue,
};

struct GlProgram {
    native: glow::Program,
    uniforms: Vec<ActiveSymbol>,
    attributes: Vec<ActiveSymbol>,
    /// Our stable location index to the driver's location object.
    locations: HashMap<i32, glow::UniformLocation>,
}

struct GlTarget {
    framebuffer: glow::Framebuffer,
    width: u32,
    height: u32,
    color_formats: Vec<TextureFormat>,
    colors: Vec<(TextureHandle, glow::Texture)>,
    depth: Option<(TextureHandle, glow::Texture)>,
}

/// Geometry registered with [`GlDevice::register_mesh`].
struct GlMesh {
    vao: glow::VertexArray,
    index_count: i32,
}

/// [`Device`] implementation over a live OpenGL 3.3 context.
pub struct GlDevice {
    gl: glow::Context,
    empty_vao: glow::VertexArray,
    stages: HashMap<StageHandle, glow::Shader>,
    programs: HashMap<ProgramHandle, GlProgram>,
    targets: HashMap<TargetHandle, GlTarget>,
    meshes: HashMap<MeshHandle, GlMesh>,
    bound_program: Option<ProgramHandle>,
    next_id: u32,
}

fn stage_kind(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        ShaderStage::Geometry => glow::GEOMETRY_SHADER,
    }
}

fn symbol_kind(gl_type: u32) -> Option<SymbolKind> {
    Some(match gl_type {
        glow::INT | glow::UNSIGNED_INT => SymbolKind::Int,
        glow::BOOL => SymbolKind::Bool,
        glow::FLOAT => SymbolKind::Float,
        glow::FLOAT_VEC2 => SymbolKind::Vec2,
        glow::FLOAT_VEC3 => SymbolKind::Vec3,
        glow::FLOAT_VEC4 => SymbolKind::Vec4,
        glow::FLOAT_MAT3 => SymbolKind::Mat3,
        glow::FLOAT_MAT4 => SymbolKind::Mat4,
        glow::SAMPLER_2D | glow::SAMPLER_2D_SHADOW => SymbolKind::Sampler2D,
        _ => return None,
    })
}

fn texture_formats(format: TextureFormat) -> (i32, u32, u32) {
    match format {
        TextureFormat::Rgba8 => (glow::RGBA8 as i32, glow::RGBA, glow::UNSIGNED_BYTE),
        TextureFormat::Rgba16F => (glow::RGBA16F as i32, glow::RGBA, glow::HALF_FLOAT),
        TextureFormat::R8 => (glow::R8 as i32, glow::RED, glow::UNSIGNED_BYTE),
    }
}

impl GlDevice {
    /// Wrap an existing context. The context must be current and stay current
    /// for this device's lifetime.
    pub fn new(gl: glow::Context) -> Result<Self> {
        let empty_vao = unsafe { gl.create_vertex_array() }
            .map_err(|e| RenderError::Device(format!("create_vertex_array: {}", e)))?;
        Ok(Self {
            gl,
            empty_vao,
            stages: HashMap::new(),
            programs: HashMap::new(),
            targets: HashMap::new(),
            meshes: HashMap::new(),
            bound_program: None,
            next_id: 0,
        })
    }

    /// Register host-uploaded geometry: a configured VAO plus the number of
    /// indices to draw.
    pub fn register_mesh(&mut self, vao: glow::VertexArray, index_count: i32) -> MeshHandle {
        let handle = MeshHandle(self.alloc_id());
        self.meshes.insert(handle, GlMesh { vao, index_count });
        handle
    }

    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn create_attachment(
        &mut self,
        width: u32,
        height: u32,
        format: Option<TextureFormat>,
    ) -> Result<glow::Texture> {
        let gl = &self.gl;
        unsafe {
            let texture = gl
                .create_texture()
                .map_err(|e| RenderError::Device(format!("create_texture: {}", e)))?;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            let (internal, layout, ty) = match format {
                Some(f) => texture_formats(f),
                None => (
                    glow::DEPTH_COMPONENT24 as i32,
                    glow::DEPTH_COMPONENT,
                    glow::UNSIGNED_INT,
                ),
            };
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal,
                width as i32,
                height as i32,
                0,
                layout,
                ty,
                None,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
            Ok(texture)
        }
    }

    fn native_texture(&self, handle: TextureHandle) -> Option<glow::Texture> {
        self.targets.values().find_map(|t| {
            t.colors
                .iter()
                .find(|(h, _)| *h == handle)
                .map(|(_, native)| *native)
                .or(t.depth.filter(|(h, _)| *h == handle).map(|(_, n)| n))
        })
    }
}

impl Device for GlDevice {
    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> Result<StageHandle> {
        let gl = &self.gl;
        unsafe {
            let shader = gl
                .create_shader(stage_kind(stage))
                .map_err(|e| RenderError::Device(format!("create_shader: {}", e)))?;
            gl.shader_source(shader, source);
            gl.compile_shader(shader);
            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                gl.delete_shader(shader);
                return Err(RenderError::Compile { stage, log });
            }
            let handle = StageHandle(self.alloc_id());
            self.stages.insert(handle, shader);
            Ok(handle)
        }
    }

    fn link_program(&mut self, stages: &[StageHandle]) -> Result<ProgramHandle> {
        let gl = &self.gl;
        let natives: Vec<glow::Shader> = stages
            .iter()
            .map(|h| {
                self.stages.get(h).copied().ok_or_else(|| RenderError::Link {
                    log: format!("unknown stage handle {:?}", h),
                })
            })
            .collect::<Result<_>>()?;
        unsafe {
            let program = gl
                .create_program()
                .map_err(|e| RenderError::Device(format!("create_program: {}", e)))?;
            for shader in &natives {
                gl.attach_shader(program, *shader);
            }
            gl.link_program(program);
            for shader in &natives {
                gl.detach_shader(program, *shader);
            }
            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(RenderError::Link { log });
            }

            let mut uniforms = Vec::new();
            let mut locations = HashMap::new();
            let count = gl.get_active_uniforms(program);
            for index in 0..count {
                let Some(active) = gl.get_active_uniform(program, index) else {
                    continue;
                };
                let Some(kind) = symbol_kind(active.utype) else {
                    warn!("uniform '{}' has an unsupported GL type", active.name);
                    continue;
                };
                // Arrays report as "name[0]".
                let name = active.name.trim_end_matches("[0]").to_string();
                let Some(native_location) = gl.get_uniform_location(program, &active.name) else {
                    continue;
                };
                let location = uniforms.len() as i32;
                locations.insert(location, native_location);
                uniforms.push(ActiveSymbol {
                    name,
                    kind,
                    size: active.size as u32,
                    location,
                });
            }

            let mut attributes = Vec::new();
            let attr_count = gl.get_active_attributes(program);
            for index in 0..attr_count {
                let Some(active) = gl.get_active_attribute(program, index) else {
                    continue;
                };
                let Some(kind) = symbol_kind(active.atype) else {
                    continue;
                };
                let location = gl
                    .get_attrib_location(program, &active.name)
                    .map(|l| l as i32)
                    .unwrap_or(-1);
                attributes.push(ActiveSymbol {
                    name: active.name,
                    kind,
                    size: active.size as u32,
                    location,
                });
            }

            let handle = ProgramHandle(self.alloc_id());
            self.programs.insert(
                handle,
                GlProgram {
                    native: program,
                    uniforms,
                    attributes,
                    locations,
                },
            );
            Ok(handle)
        }
    }

    fn destroy_stage(&mut self, stage: StageHandle) {
        if let Some(native) = self.stages.remove(&stage) {
            unsafe { self.gl.delete_shader(native) };
        }
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if let Some(record) = self.programs.remove(&program) {
            unsafe { self.gl.delete_program(record.native) };
        }
        if self.bound_program == Some(program) {
            self.bound_program = None;
        }
    }

    fn program_uniforms(&self, program: ProgramHandle) -> Vec<ActiveSymbol> {
        self.programs
            .get(&program)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn program_attributes(&self, program: ProgramHandle) -> Vec<ActiveSymbol> {
        self.programs
            .get(&program)
            .map(|p| p.attributes.clone())
            .unwrap_or_default()
    }

    fn bind_program(&mut self, program: Option<ProgramHandle>) {
        let native = program.and_then(|p| self.programs.get(&p)).map(|p| p.native);
        unsafe { self.gl.use_program(native) };
        self.bound_program = program;
    }

    fn bound_program(&self) -> Option<ProgramHandle> {
        self.bound_program
    }

    fn write_uniform(&mut self, program: ProgramHandle, location: i32, value: &UniformValue) {
        let Some(record) = self.programs.get(&program) else { return };
        let Some(native) = record.locations.get(&location) else { return };
        let gl = &self.gl;
        let loc = Some(native);
        unsafe {
            match value {
                UniformValue::Int(v) => gl.uniform_1_i32(loc, *v),
                UniformValue::Float(v) => gl.uniform_1_f32(loc, *v),
                UniformValue::Vec2(v) => gl.uniform_2_f32_slice(loc, v),
                UniformValue::Vec3(v) => gl.uniform_3_f32_slice(loc, v),
                UniformValue::Vec4(v) => gl.uniform_4_f32_slice(loc, v),
                UniformValue::Mat3(v) => gl.uniform_matrix_3_f32_slice(loc, false, v),
                UniformValue::Mat4(v) => gl.uniform_matrix_4_f32_slice(loc, false, v),
                UniformValue::FloatArray(v) => gl.uniform_1_f32_slice(loc, v),
                UniformValue::Vec3Array(v) => {
                    gl.uniform_3_f32_slice(loc, bytemuck::cast_slice(v))
                }
                UniformValue::Vec4Array(v) => {
                    gl.uniform_4_f32_slice(loc, bytemuck::cast_slice(v))
                }
                UniformValue::Texture(_, unit) => gl.uniform_1_i32(loc, *unit as i32),
            }
        }
    }

    fn create_target(&mut self, desc: &TargetDesc) -> Result<TargetHandle> {
        if desc.color_formats.len() > 4 {
            return Err(RenderError::Device(format!(
                "target '{}' requests {} color attachments (max 4)",
                desc.label,
                desc.color_formats.len()
            )));
        }
        let framebuffer = unsafe { self.gl.create_framebuffer() }
            .map_err(|e| RenderError::Device(format!("create_framebuffer: {}", e)))?;

        let mut colors = Vec::new();
        for format in &desc.color_formats {
            let texture = self.create_attachment(desc.width, desc.height, Some(*format))?;
            colors.push((TextureHandle(self.alloc_id()), texture));
        }
        let depth = if desc.depth {
            let texture = self.create_attachment(desc.width, desc.height, None)?;
            Some((TextureHandle(self.alloc_id()), texture))
        } else {
            None
        };

        let gl = &self.gl;
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            let mut buffers = Vec::new();
            for (i, (_, texture)) in colors.iter().enumerate() {
                let attachment = glow::COLOR_ATTACHMENT0 + i as u32;
                gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    attachment,
                    glow::TEXTURE_2D,
                    Some(*texture),
                    0,
                );
                buffers.push(attachment);
            }
            gl.draw_buffers(&buffers);
            if let Some((_, texture)) = depth {
                gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    glow::DEPTH_ATTACHMENT,
                    glow::TEXTURE_2D,
                    Some(texture),
                    0,
                );
            }
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            if status != glow::FRAMEBUFFER_COMPLETE {
                return Err(RenderError::Device(format!(
                    "framebuffer '{}' incomplete: 0x{:x}",
                    desc.label, status
                )));
            }
        }

        let handle = TargetHandle(self.alloc_id());
        self.targets.insert(
            handle,
            GlTarget {
                framebuffer,
                width: desc.width,
                height: desc.height,
                color_formats: desc.color_formats.clone(),
                colors,
                depth,
            },
        );
        Ok(handle)
    }

    fn resize_target(&mut self, target: TargetHandle, width: u32, height: u32) {
        let Some(record) = self.targets.get(&target) else { return };
        let formats = record.color_formats.clone();
        let colors: Vec<glow::Texture> = record.colors.iter().map(|(_, n)| *n).collect();
        let depth = record.depth.map(|(_, n)| n);
        // Reallocate storage in place; attachments and handles stay valid.
        for (texture, format) in colors.iter().zip(formats) {
            let (internal, layout, ty) = texture_formats(format);
            unsafe {
                self.gl.bind_texture(glow::TEXTURE_2D, Some(*texture));
                self.gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    internal,
                    width as i32,
                    height as i32,
                    0,
                    layout,
                    ty,
                    None,
                );
            }
        }
        if let Some(texture) = depth {
            unsafe {
                self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
                self.gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    glow::DEPTH_COMPONENT24 as i32,
                    width as i32,
                    height as i32,
                    0,
                    glow::DEPTH_COMPONENT,
                    glow::UNSIGNED_INT,
                    None,
                );
            }
        }
        if let Some(record) = self.targets.get_mut(&target) {
            record.width = width;
            record.height = height;
        }
    }

    fn destroy_target(&mut self, target: TargetHandle) {
        if let Some(record) = self.targets.remove(&target) {
            unsafe {
                for (_, texture) in &record.colors {
                    self.gl.delete_texture(*texture);
                }
                if let Some((_, texture)) = record.depth {
                    self.gl.delete_texture(texture);
                }
                self.gl.delete_framebuffer(record.framebuffer);
            }
        }
    }

    fn target_size(&self, target: TargetHandle) -> (u32, u32) {
        self.targets
            .get(&target)
            .map(|t| (t.width, t.height))
            .unwrap_or((0, 0))
    }

    fn target_color(&self, target: TargetHandle, index: usize) -> Option<TextureHandle> {
        self.targets
            .get(&target)
            .and_then(|t| t.colors.get(index).map(|(h, _)| *h))
    }

    fn target_depth(&self, target: TargetHandle) -> Option<TextureHandle> {
        self.targets.get(&target).and_then(|t| t.depth.map(|(h, _)| h))
    }

    fn bind_target(&mut self, target: Option<TargetHandle>) {
        let native = target.and_then(|t| self.targets.get(&t)).map(|t| t.framebuffer);
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, native) };
    }

    fn copy_target(&mut self, src: TargetHandle, dst: TargetHandle) {
        let (Some(s), Some(d)) = (self.targets.get(&src), self.targets.get(&dst)) else {
            return;
        };
        let mut mask = glow::COLOR_BUFFER_BIT;
        if s.depth.is_some() && d.depth.is_some() {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        unsafe {
            self.gl
                .bind_framebuffer(glow::READ_FRAMEBUFFER, Some(s.framebuffer));
            self.gl
                .bind_framebuffer(glow::DRAW_FRAMEBUFFER, Some(d.framebuffer));
            self.gl.blit_framebuffer(
                0,
                0,
                s.width as i32,
                s.height as i32,
                0,
                0,
                d.width as i32,
                d.height as i32,
                mask,
                glow::NEAREST,
            );
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }

    fn clear(&mut self, color: Option<[f32; 4]>, depth: Option<f32>) {
        let gl = &self.gl;
        let mut mask = 0;
        unsafe {
            if let Some([r, g, b, a]) = color {
                gl.clear_color(r, g, b, a);
                mask |= glow::COLOR_BUFFER_BIT;
            }
            if let Some(d) = depth {
                gl.clear_depth_f32(d);
                mask |= glow::DEPTH_BUFFER_BIT;
            }
            if mask != 0 {
                gl.clear(mask);
            }
        }
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        unsafe { self.gl.viewport(x, y, width as i32, height as i32) };
    }

    fn set_blend(&mut self, mode: BlendMode) {
        let gl = &self.gl;
        unsafe {
            match mode {
                BlendMode::Opaque => gl.disable(glow::BLEND),
                BlendMode::Alpha => {
                    gl.enable(glow::BLEND);
                    gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
                }
                BlendMode::Additive => {
                    gl.enable(glow::BLEND);
                    gl.blend_func(glow::ONE, glow::ONE);
                }
            }
        }
    }

    fn set_depth(&mut self, state: DepthState) {
        let gl = &self.gl;
        unsafe {
            if state.test {
                gl.enable(glow::DEPTH_TEST);
            } else {
                gl.disable(glow::DEPTH_TEST);
            }
            gl.depth_mask(state.write);
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>) {
        let native = texture.and_then(|t| self.native_texture(t));
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, native);
        }
    }

    fn draw_mesh(&mut self, mesh: MeshHandle) {
        let Some(record) = self.meshes.get(&mesh) else { return };
        unsafe {
            self.gl.bind_vertex_array(Some(record.vao));
            self.gl
                .draw_elements(glow::TRIANGLES, record.index_count, glow::UNSIGNED_INT, 0);
        }
    }

    fn draw_fullscreen(&mut self) {
        unsafe {
            self.gl.bind_vertex_array(Some(self.empty_vao));
            self.gl.draw_arrays(glow::TRIANGLES, 0, 3);
        }
    }
}
