// src/gpu/headless.rs
//! Deterministic in-process device.
//!
//! Used for tests and headless hosts. Compilation does a shallow sanity check
//! (an entry point must exist, braces must balance), and linking reflects the
//! preprocessed source the way a driver would: uniforms that are declared but
//! never referenced inside a function body are dropped, which models compiler
//! dead-code elimination. Every call of interest increments a counter.

use std::collections::HashMap;

use crate::error::{RenderError, Result};
use crate::shader::source::{function_body_text, references_symbol, reflect_stage, DeclaredSymbol};

use super::{
    ActiveSymbol, BlendMode, DepthState, Device, MeshHandle, ProgramHandle, ShaderStage,
    StageHandle, TargetDesc, TargetHandle, TextureHandle, UniformValue,
};

/// Call counters, frame-cumulative until [`HeadlessDevice::reset_counters`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceCounters {
    pub uniform_writes: u64,
    pub draw_calls: u64,
    pub fullscreen_draws: u64,
    pub program_binds: u64,
    pub target_binds: u64,
    pub texture_binds: u64,
    pub clears: u64,
    pub target_copies: u64,
}

struct StageRecord {
    stage: ShaderStage,
    source: String,
}

struct ProgramRecord {
    uniforms: Vec<ActiveSymbol>,
    attributes: Vec<ActiveSymbol>,
}

struct TargetRecord {
    label: &'static str,
    width: u32,
    height: u32,
    colors: Vec<TextureHandle>,
    depth: Option<TextureHandle>,
}

/// Mock graphics device with deterministic reflection and call counting.
#[derive(Default)]
pub struct HeadlessDevice {
    next_id: u32,
    stages: HashMap<StageHandle, StageRecord>,
    programs: HashMap<ProgramHandle, ProgramRecord>,
    targets: HashMap<TargetHandle, TargetRecord>,
    bound_program: Option<ProgramHandle>,
    bound_target: Option<TargetHandle>,
    counters: DeviceCounters,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> DeviceCounters {
        self.counters
    }

    pub fn reset_counters(&mut self) {
        self.counters = DeviceCounters::default();
    }

    /// Hand out an opaque mesh handle, standing in for pre-uploaded geometry.
    pub fn register_mesh(&mut self) -> MeshHandle {
        MeshHandle(self.alloc_id())
    }

    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn validate_stage(stage: ShaderStage, source: &str) -> std::result::Result<(), String> {
        let stripped = crate::shader::source::strip_comments(source);
        if !stripped.contains("void main") {
            return Err(format!("{:?} stage: no entry point 'void main' found", stage));
        }
        let opens = stripped.matches('{').count();
        let closes = stripped.matches('}').count();
        if opens != closes {
            return Err(format!(
                "{:?} stage: unbalanced braces ({} open, {} close)",
                stage, opens, closes
            ));
        }
        Ok(())
    }
}

impl Device for HeadlessDevice {
    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> Result<StageHandle> {
        if let Err(log) = Self::validate_stage(stage, source) {
            return Err(RenderError::Compile { stage, log });
        }
        let handle = StageHandle(self.alloc_id());
        self.stages.insert(
            handle,
            StageRecord {
                stage,
                source: source.to_string(),
            },
        );
        Ok(handle)
    }

    fn link_program(&mut self, stages: &[StageHandle]) -> Result<ProgramHandle> {
        let mut records = Vec::with_capacity(stages.len());
        for handle in stages {
            match self.stages.get(handle) {
                Some(record) => records.push(record),
                None => {
                    return Err(RenderError::Link {
                        log: format!("unknown stage handle {:?}", handle),
                    })
                }
            }
        }
        let mut kinds: Vec<ShaderStage> = records.iter().map(|r| r.stage).collect();
        kinds.sort_by_key(|k| *k as u32);
        kinds.dedup();
        if kinds.len() != records.len() {
            return Err(RenderError::Link {
                log: "duplicate shader stage attached".to_string(),
            });
        }
        if !kinds.contains(&ShaderStage::Vertex) || !kinds.contains(&ShaderStage::Fragment) {
            return Err(RenderError::Link {
                log: "program requires both a vertex and a fragment stage".to_string(),
            });
        }

        // Reflect declarations across stages, then keep only symbols a
        // function body actually references.
        let mut declared_uniforms: HashMap<String, DeclaredSymbol> = HashMap::new();
        let mut declared_attributes: HashMap<String, DeclaredSymbol> = HashMap::new();
        let mut bodies = String::new();
        for record in &records {
            let reflection = reflect_stage(record.stage, &record.source);
            declared_uniforms.extend(reflection.uniforms);
            if record.stage == ShaderStage::Vertex {
                declared_attributes.extend(reflection.attributes);
            }
            bodies.push_str(&function_body_text(&record.source));
            bodies.push('\n');
        }

        let mut uniforms: Vec<(String, DeclaredSymbol)> = declared_uniforms
            .into_iter()
            .filter(|(name, _)| references_symbol(&bodies, name))
            .collect();
        uniforms.sort_by(|a, b| a.0.cmp(&b.0));
        let uniforms = uniforms
            .into_iter()
            .enumerate()
            .map(|(i, (name, symbol))| ActiveSymbol {
                name,
                kind: symbol.kind,
                size: symbol.size,
                location: i as i32,
            })
            .collect();

        let mut attributes: Vec<(String, DeclaredSymbol)> = declared_attributes
            .into_iter()
            .filter(|(name, _)| references_symbol(&bodies, name))
            .collect();
        attributes.sort_by(|a, b| a.0.cmp(&b.0));
        let attributes = attributes
            .into_iter()
            .enumerate()
            .map(|(i, (name, symbol))| ActiveSymbol {
                name,
                kind: symbol.kind,
                size: symbol.size,
                location: i as i32,
            })
            .collect();

        let handle = ProgramHandle(self.alloc_id());
        self.programs.insert(
            handle,
            ProgramRecord {
                uniforms,
                attributes,
            },
        );
        Ok(handle)
    }

    fn destroy_stage(&mut self, stage: StageHandle) {
        self.stages.remove(&stage);
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
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
        self.counters.program_binds += 1;
        self.bound_program = program;
    }

    fn bound_program(&self) -> Option<ProgramHandle> {
        self.bound_program
    }

    fn write_uniform(&mut self, _program: ProgramHandle, _location: i32, _value: &UniformValue) {
        self.counters.uniform_writes += 1;
    }

    fn create_target(&mut self, desc: &TargetDesc) -> Result<TargetHandle> {
        if desc.color_formats.len() > 4 {
            return Err(RenderError::Device(format!(
                "target '{}' requests {} color attachments (max 4)",
                desc.label,
                desc.color_formats.len()
            )));
        }
        let colors = (0..desc.color_formats.len())
            .map(|_| TextureHandle(self.alloc_id()))
            .collect();
        let depth = desc.depth.then(|| TextureHandle(self.alloc_id()));
        let handle = TargetHandle(self.alloc_id());
        self.targets.insert(
            handle,
            TargetRecord {
                label: desc.label,
                width: desc.width,
                height: desc.height,
                colors,
                depth,
            },
        );
        Ok(handle)
    }

    fn resize_target(&mut self, target: TargetHandle, width: u32, height: u32) {
        if let Some(record) = self.targets.get_mut(&target) {
            record.width = width;
            record.height = height;
        }
    }

    fn destroy_target(&mut self, target: TargetHandle) {
        self.targets.remove(&target);
        if self.bound_target == Some(target) {
            self.bound_target = None;
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
            .and_then(|t| t.colors.get(index).copied())
    }

    fn target_depth(&self, target: TargetHandle) -> Option<TextureHandle> {
        self.targets.get(&target).and_then(|t| t.depth)
    }

    fn bind_target(&mut self, target: Option<TargetHandle>) {
        self.counters.target_binds += 1;
        self.bound_target = target;
    }

    fn copy_target(&mut self, _src: TargetHandle, _dst: TargetHandle) {
        self.counters.target_copies += 1;
    }

    fn clear(&mut self, _color: Option<[f32; 4]>, _depth: Option<f32>) {
        self.counters.clears += 1;
    }

    fn set_viewport(&mut self, _x: i32, _y: i32, _width: u32, _height: u32) {}

    fn set_blend(&mut self, _mode: BlendMode) {}

    fn set_depth(&mut self, _state: DepthState) {}

    fn bind_texture(&mut self, _unit: u32, _texture: Option<TextureHandle>) {
        self.counters.texture_binds += 1;
    }

    fn draw_mesh(&mut self, _mesh: MeshHandle) {
        self.counters.draw_calls += 1;
    }

    fn draw_fullscreen(&mut self) {
        self.counters.draw_calls += 1;
        self.counters.fullscreen_draws += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERT: &str = "uniform mat4 u_mvp;\nin vec3 a_position;\nvoid main() { gl_Position = u_mvp * vec4(a_position, 1.0); }";
    const FRAG: &str =
        "uniform vec4 u_color;\nuniform float u_unused;\nvoid main() { gl_FragColor = u_color; }";

    #[test]
    fn test_compile_rejects_missing_entry_point() {
        let mut device = HeadlessDevice::new();
        let err = device
            .compile_stage(ShaderStage::Fragment, "this is not glsl")
            .unwrap_err();
        assert!(err.is_compile());
    }

    #[test]
    fn test_link_requires_vertex_and_fragment() {
        let mut device = HeadlessDevice::new();
        let vs = device.compile_stage(ShaderStage::Vertex, VERT).unwrap();
        let err = device.link_program(&[vs]).unwrap_err();
        assert!(err.is_link());
    }

    #[test]
    fn test_linker_drops_unreferenced_uniforms() {
        let mut device = HeadlessDevice::new();
        let vs = device.compile_stage(ShaderStage::Vertex, VERT).unwrap();
        let fs = device.compile_stage(ShaderStage::Fragment, FRAG).unwrap();
        let program = device.link_program(&[vs, fs]).unwrap();
        let uniforms = device.program_uniforms(program);
        let names: Vec<&str> = uniforms.iter().map(|u| u.name.as_str()).collect();
        assert!(names.contains(&"u_mvp"));
        assert!(names.contains(&"u_color"));
        assert!(!names.contains(&"u_unused"));
    }

    #[test]
    fn test_counters_track_calls() {
        let mut device = HeadlessDevice::new();
        let mesh = device.register_mesh();
        device.draw_mesh(mesh);
        device.draw_fullscreen();
        device.clear(Some([0.0; 4]), Some(1.0));
        assert_eq!(device.counters().draw_calls, 2);
        assert_eq!(device.counters().fullscreen_draws, 1);
        assert_eq!(device.counters().clears, 1);
        device.reset_counters();
        assert_eq!(device.counters(), DeviceCounters::default());
    }
}
