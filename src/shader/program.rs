// src/shader/program.rs
//! One compiled+linked GPU program with a uniform value cache.
//!
//! The cache guarantees that a value reaches the GPU at most once per distinct
//! value per bind: re-setting an identical value is a counted no-op, and
//! values set while the program is not current are flushed on the next bind
//! instead of being lost.

use std::collections::{HashMap, HashSet};

use log::warn;

use crate::gpu::{ActiveSymbol, Device, ProgramHandle, SymbolKind, UniformValue};

/// Introspected info for one active uniform or attribute.
#[derive(Clone, Debug)]
pub struct SymbolInfo {
    pub location: i32,
    pub kind: SymbolKind,
    pub size: u32,
}

/// A linked program plus its introspection tables and write-through cache.
pub struct ShaderProgram {
    handle: ProgramHandle,
    uniforms: HashMap<String, SymbolInfo>,
    attributes: HashMap<String, SymbolInfo>,
    last_value: HashMap<String, UniformValue>,
    dirty: HashSet<String>,
    redundant_writes: u64,
    missing_warned: HashSet<String>,
}

impl ShaderProgram {
    /// Wrap a freshly linked program, introspecting every active uniform and
    /// attribute the linker retained.
    pub fn from_linked<D: Device>(device: &D, handle: ProgramHandle) -> Self {
        let to_map = |symbols: Vec<ActiveSymbol>| {
            symbols
                .into_iter()
                .map(|s| {
                    (
                        s.name,
                        SymbolInfo {
                            location: s.location,
                            kind: s.kind,
                            size: s.size,
                        },
                    )
                })
                .collect::<HashMap<_, _>>()
        };
        Self {
            uniforms: to_map(device.program_uniforms(handle)),
            attributes: to_map(device.program_attributes(handle)),
            handle,
            last_value: HashMap::new(),
            dirty: HashSet::new(),
            redundant_writes: 0,
            missing_warned: HashSet::new(),
        }
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// `false` for symbols the linker optimized away; callers must tolerate
    /// this rather than treating it as an error.
    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.contains_key(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn uniform_info(&self, name: &str) -> Option<&SymbolInfo> {
        self.uniforms.get(name)
    }

    pub fn attribute_location(&self, name: &str) -> Option<i32> {
        self.attributes.get(name).map(|a| a.location)
    }

    pub fn uniform_count(&self) -> usize {
        self.uniforms.len()
    }

    /// How many `set_uniform` calls were elided because the value was
    /// unchanged.
    pub fn redundant_writes(&self) -> u64 {
        self.redundant_writes
    }

    /// The most recently set value for a uniform, if any.
    pub fn cached_value(&self, name: &str) -> Option<&UniformValue> {
        self.last_value.get(name)
    }

    /// Bind the program and flush every uniform marked dirty since the last
    /// bind.
    pub fn bind<D: Device>(&mut self, device: &mut D) {
        device.bind_program(Some(self.handle));
        if self.dirty.is_empty() {
            return;
        }
        let dirty: Vec<String> = self.dirty.drain().collect();
        for name in dirty {
            if let (Some(info), Some(value)) = (self.uniforms.get(&name), self.last_value.get(&name))
            {
                device.write_uniform(self.handle, info.location, value);
            }
        }
    }

    /// Set a uniform by name.
    ///
    /// - Unknown name: warn once, no-op (dead-code-eliminated uniforms are
    ///   expected).
    /// - Value equal to the cached value: counted no-op, nothing reaches the
    ///   device.
    /// - Otherwise: cache the value; write immediately if this program is the
    ///   currently bound one, else mark dirty for the next [`Self::bind`].
    pub fn set_uniform<D: Device>(&mut self, device: &mut D, name: &str, value: UniformValue) {
        let Some(info) = self.uniforms.get(name) else {
            if self.missing_warned.insert(name.to_string()) {
                warn!("uniform '{}' not active on program {:?}", name, self.handle);
            }
            return;
        };
        if self.last_value.get(name) == Some(&value) {
            self.redundant_writes += 1;
            return;
        }
        let location = info.location;
        if device.bound_program() == Some(self.handle) {
            device.write_uniform(self.handle, location, &value);
            self.dirty.remove(name);
        } else {
            self.dirty.insert(name.to_string());
        }
        self.last_value.insert(name.to_string(), value);
    }

    /// Forget cached values (used after a reload replaces the GPU program).
    pub fn invalidate_cache(&mut self) {
        self.last_value.clear();
        self.dirty.clear();
    }

    /// Free the GPU program. The wrapper must not be used afterwards.
    pub fn destroy<D: Device>(self, device: &mut D) {
        device.destroy_program(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless::HeadlessDevice;
    use crate::gpu::ShaderStage;

    const VERT: &str = "uniform mat4 u_mvp;\nuniform vec3 u_tint;\nin vec3 a_position;\nvoid main() { gl_Position = u_mvp * vec4(a_position * u_tint, 1.0); }";
    const FRAG: &str = "uniform vec4 u_color;\nvoid main() { gl_FragColor = u_color; }";

    fn linked_program(device: &mut HeadlessDevice) -> ShaderProgram {
        let vs = device.compile_stage(ShaderStage::Vertex, VERT).unwrap();
        let fs = device.compile_stage(ShaderStage::Fragment, FRAG).unwrap();
        let handle = device.link_program(&[vs, fs]).unwrap();
        ShaderProgram::from_linked(device, handle)
    }

    #[test]
    fn test_identical_value_writes_once() {
        let mut device = HeadlessDevice::new();
        let mut program = linked_program(&mut device);
        program.bind(&mut device);
        let before = device.counters().uniform_writes;
        program.set_uniform(&mut device, "u_color", UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]));
        program.set_uniform(&mut device, "u_color", UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]));
        program.set_uniform(&mut device, "u_color", UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(device.counters().uniform_writes - before, 1);
        assert_eq!(program.redundant_writes(), 2);
    }

    #[test]
    fn test_unbound_writes_flush_on_bind() {
        let mut device = HeadlessDevice::new();
        let mut program = linked_program(&mut device);
        // Not bound yet: value must be cached, not written.
        program.set_uniform(&mut device, "u_tint", UniformValue::Vec3([0.5, 0.5, 0.5]));
        assert_eq!(device.counters().uniform_writes, 0);
        program.bind(&mut device);
        assert_eq!(device.counters().uniform_writes, 1);
        // A second bind has nothing dirty to flush.
        program.bind(&mut device);
        assert_eq!(device.counters().uniform_writes, 1);
    }

    #[test]
    fn test_missing_uniform_is_noop() {
        let mut device = HeadlessDevice::new();
        let mut program = linked_program(&mut device);
        program.bind(&mut device);
        assert!(!program.has_uniform("u_optimized_away"));
        program.set_uniform(&mut device, "u_optimized_away", UniformValue::Float(1.0));
        assert_eq!(device.counters().uniform_writes, 0);
    }

    #[test]
    fn test_new_value_while_bound_writes_immediately() {
        let mut device = HeadlessDevice::new();
        let mut program = linked_program(&mut device);
        program.bind(&mut device);
        program.set_uniform(&mut device, "u_color", UniformValue::Vec4([0.0; 4]));
        program.set_uniform(&mut device, "u_color", UniformValue::Vec4([1.0; 4]));
        assert_eq!(device.counters().uniform_writes, 2);
    }
}
