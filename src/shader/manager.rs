// src/shader/manager.rs
//! Shader loading, compilation, variants and hot reload.
//!
//! The manager exclusively owns every [`ShaderProgram`] it registers. Loading
//! is all-or-nothing: if any stage fails to compile or the program fails to
//! link, nothing is registered and whatever was previously registered under
//! that name is left untouched. Hot reload recompiles from the stored source
//! and keeps the previous program alive on failure, so in-flight renders keep
//! working.

use std::collections::HashMap;
use std::path::PathBuf;

use log::{debug, error, info};

use crate::error::{RenderError, Result};
use crate::gpu::{Device, StageHandle};

use super::preprocess::{preprocess, DefineSet};
use super::program::ShaderProgram;
use super::source::Shader;

/// Fetches shader source text by path. The only suspension point in the
/// frame loop lives behind this trait; a host can back it with any fetch
/// mechanism it likes.
pub trait SourceLoader {
    fn load(&self, path: &str) -> Result<String>;
}

/// Loads sources from the filesystem, relative to a root directory.
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceLoader for FsLoader {
    fn load(&self, path: &str) -> Result<String> {
        let full = self.root.join(path);
        std::fs::read_to_string(&full).map_err(|e| RenderError::Load {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Serves sources from an in-memory table; used for the embedded pass shaders
/// and for tests.
#[derive(Default)]
pub struct StaticLoader {
    sources: HashMap<String, String>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.sources.insert(path.into(), text.into());
    }

    pub fn with(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }
}

impl SourceLoader for StaticLoader {
    fn load(&self, path: &str) -> Result<String> {
        self.sources
            .get(path)
            .cloned()
            .ok_or_else(|| RenderError::Load {
                path: path.to_string(),
                reason: "not present in static source table".to_string(),
            })
    }
}

struct Entry {
    /// Name of the [`Shader`] whose source this program was built from.
    base: String,
    defines: DefineSet,
    program: ShaderProgram,
}

struct VariantRecord {
    defines: DefineSet,
    full_name: String,
}

/// Owns shader sources and every linked program, keyed by name.
pub struct ShaderManager {
    loader: Box<dyn SourceLoader>,
    shaders: HashMap<String, Shader>,
    entries: HashMap<String, Entry>,
    variants: HashMap<String, Vec<VariantRecord>>,
}

impl ShaderManager {
    pub fn new(loader: Box<dyn SourceLoader>) -> Self {
        Self {
            loader,
            shaders: HashMap::new(),
            entries: HashMap::new(),
            variants: HashMap::new(),
        }
    }

    /// Fetch, preprocess, compile and link a shader, registering it under
    /// `name`. On any failure nothing is registered.
    pub fn load_shader<D: Device>(
        &mut self,
        device: &mut D,
        name: &str,
        vertex_path: &str,
        fragment_path: &str,
        geometry_path: Option<&str>,
    ) -> Result<()> {
        self.load_shader_with_defines(
            device,
            name,
            vertex_path,
            fragment_path,
            geometry_path,
            DefineSet::new(),
        )
    }

    pub fn load_shader_with_defines<D: Device>(
        &mut self,
        device: &mut D,
        name: &str,
        vertex_path: &str,
        fragment_path: &str,
        geometry_path: Option<&str>,
        defines: DefineSet,
    ) -> Result<()> {
        let vertex = self.loader.load(vertex_path)?;
        let fragment = self.loader.load(fragment_path)?;
        let geometry = match geometry_path {
            Some(path) => Some(self.loader.load(path)?),
            None => None,
        };
        let shader = Shader::new(name, Some(vertex), Some(fragment), geometry);
        let program = build_program(device, &shader, &defines)?;

        debug!(
            "loaded shader '{}' ({} active uniforms)",
            name,
            program.uniform_count()
        );
        if let Some(old) = self.entries.remove(name) {
            old.program.destroy(device);
        }
        self.shaders.insert(name.to_string(), shader);
        self.entries.insert(
            name.to_string(),
            Entry {
                base: name.to_string(),
                defines,
                program,
            },
        );
        Ok(())
    }

    /// Recompile the base shader's stored source with extra defines and
    /// register the result under `base_variant`.
    pub fn create_variant<D: Device>(
        &mut self,
        device: &mut D,
        base: &str,
        variant_name: &str,
        defines: DefineSet,
    ) -> Result<String> {
        let shader = self
            .shaders
            .get(base)
            .ok_or_else(|| RenderError::MissingResource {
                kind: "shader",
                name: base.to_string(),
            })?;
        let program = build_program(device, shader, &defines)?;
        let full_name = format!("{}_{}", base, variant_name);

        if let Some(old) = self.entries.remove(&full_name) {
            old.program.destroy(device);
        }
        self.entries.insert(
            full_name.clone(),
            Entry {
                base: base.to_string(),
                defines: defines.clone(),
                program,
            },
        );

        let records = self.variants.entry(base.to_string()).or_default();
        match records.iter_mut().find(|r| r.defines == defines) {
            Some(record) => record.full_name = full_name.clone(),
            None => records.push(VariantRecord {
                defines,
                full_name: full_name.clone(),
            }),
        }
        info!("created shader variant '{}'", full_name);
        Ok(full_name)
    }

    /// Exact-match variant lookup: the define sets must declare exactly the
    /// same keys with exactly the same values.
    pub fn get_variant(&self, base: &str, defines: &DefineSet) -> Option<&ShaderProgram> {
        let records = self.variants.get(base)?;
        let record = records.iter().find(|r| &r.defines == defines)?;
        self.entries.get(&record.full_name).map(|e| &e.program)
    }

    /// Recompile `name` from its stored source (not from disk) and atomically
    /// replace the registered program. A failed reload is logged and leaves
    /// the previous program in place.
    pub fn reload_shader<D: Device>(&mut self, device: &mut D, name: &str) -> Result<()> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| RenderError::MissingResource {
                kind: "shader",
                name: name.to_string(),
            })?;
        let shader = self
            .shaders
            .get(&entry.base)
            .ok_or_else(|| RenderError::MissingResource {
                kind: "shader source",
                name: entry.base.clone(),
            })?;
        match build_program(device, shader, &entry.defines) {
            Ok(program) => {
                if let Some(entry) = self.entries.get_mut(name) {
                    let old = std::mem::replace(&mut entry.program, program);
                    old.destroy(device);
                    info!("reloaded shader '{}'", name);
                } else {
                    program.destroy(device);
                }
                Ok(())
            }
            Err(e) => {
                error!("reload of shader '{}' failed, keeping previous program: {}", name, e);
                Ok(())
            }
        }
    }

    /// Replace a stage's stored source for `name` (the next reload picks it
    /// up). Re-runs static analysis on the shader.
    pub fn replace_source(
        &mut self,
        name: &str,
        stage: crate::gpu::ShaderStage,
        source: String,
    ) -> Result<()> {
        let shader = self
            .shaders
            .get_mut(name)
            .ok_or_else(|| RenderError::MissingResource {
                kind: "shader",
                name: name.to_string(),
            })?;
        shader.set_source(stage, Some(source));
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ShaderProgram> {
        self.entries.get(name).map(|e| &e.program)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ShaderProgram> {
        self.entries.get_mut(name).map(|e| &mut e.program)
    }

    pub fn shader(&self, name: &str) -> Option<&Shader> {
        self.shaders.get(name)
    }

    /// Free every GPU program and clear all tables.
    pub fn cleanup<D: Device>(&mut self, device: &mut D) {
        for (_, entry) in self.entries.drain() {
            entry.program.destroy(device);
        }
        self.shaders.clear();
        self.variants.clear();
    }
}

/// Preprocess and compile every stage, then link. Partial stage handles are
/// destroyed on the error path so a failed load leaks nothing.
fn build_program<D: Device>(
    device: &mut D,
    shader: &Shader,
    defines: &DefineSet,
) -> Result<ShaderProgram> {
    let mut stage_handles: Vec<StageHandle> = Vec::new();
    for (stage, source) in shader.stages() {
        let expanded = preprocess(source, defines);
        match device.compile_stage(stage, &expanded) {
            Ok(handle) => stage_handles.push(handle),
            Err(e) => {
                for handle in stage_handles {
                    device.destroy_stage(handle);
                }
                return Err(e);
            }
        }
    }
    let linked = device.link_program(&stage_handles);
    for handle in stage_handles {
        device.destroy_stage(handle);
    }
    Ok(ShaderProgram::from_linked(device, linked?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless::HeadlessDevice;

    const VERT: &str = "uniform mat4 u_mvp;\nin vec3 a_position;\nvoid main() { gl_Position = u_mvp * vec4(a_position, 1.0); }";
    const FRAG: &str = "uniform vec4 u_color;\nvoid main() {\n#ifdef TINTED\n    gl_FragColor = u_color * 0.5;\n#else\n    gl_FragColor = u_color;\n#endif\n}";
    const BAD_FRAG: &str = "uniform vec4 u_color; gl_FragColor = u_color;";

    fn manager() -> ShaderManager {
        let loader = StaticLoader::new()
            .with("basic.vert", VERT)
            .with("basic.frag", FRAG)
            .with("bad.frag", BAD_FRAG);
        ShaderManager::new(Box::new(loader))
    }

    #[test]
    fn test_load_and_lookup() {
        let mut device = HeadlessDevice::new();
        let mut mgr = manager();
        mgr.load_shader(&mut device, "basic", "basic.vert", "basic.frag", None)
            .unwrap();
        assert!(mgr.has("basic"));
        assert!(mgr.get("basic").unwrap().has_uniform("u_color"));
        assert!(mgr.shader("basic").unwrap().uniforms().contains_key("u_mvp"));
    }

    #[test]
    fn test_compile_failure_registers_nothing() {
        let mut device = HeadlessDevice::new();
        let mut mgr = manager();
        let err = mgr
            .load_shader(&mut device, "basic", "basic.vert", "bad.frag", None)
            .unwrap_err();
        assert!(err.is_compile());
        assert!(!mgr.has("basic"));
        assert!(mgr.shader("basic").is_none());
    }

    #[test]
    fn test_failed_reload_keeps_previous_program() {
        let mut device = HeadlessDevice::new();
        let mut mgr = manager();
        mgr.load_shader(&mut device, "basic", "basic.vert", "basic.frag", None)
            .unwrap();
        let old_handle = mgr.get("basic").unwrap().handle();
        // Break the stored fragment source, then reload.
        mgr.replace_source("basic", crate::gpu::ShaderStage::Fragment, BAD_FRAG.into())
            .unwrap();
        mgr.reload_shader(&mut device, "basic").unwrap();
        assert_eq!(mgr.get("basic").unwrap().handle(), old_handle);
    }

    #[test]
    fn test_successful_reload_swaps_program() {
        let mut device = HeadlessDevice::new();
        let mut mgr = manager();
        mgr.load_shader(&mut device, "basic", "basic.vert", "basic.frag", None)
            .unwrap();
        let old_handle = mgr.get("basic").unwrap().handle();
        mgr.reload_shader(&mut device, "basic").unwrap();
        assert_ne!(mgr.get("basic").unwrap().handle(), old_handle);
    }

    #[test]
    fn test_variant_exact_match_lookup() {
        let mut device = HeadlessDevice::new();
        let mut mgr = manager();
        mgr.load_shader(&mut device, "basic", "basic.vert", "basic.frag", None)
            .unwrap();
        let defines = DefineSet::new().with("TINTED", true);
        let full = mgr
            .create_variant(&mut device, "basic", "tinted", defines.clone())
            .unwrap();
        assert_eq!(full, "basic_tinted");
        assert!(mgr.get_variant("basic", &defines).is_some());
        // A different define set must not match.
        let other = DefineSet::new().with("TINTED", true).with("EXTRA", 1i64);
        assert!(mgr.get_variant("basic", &other).is_none());
        assert!(mgr.get_variant("basic", &DefineSet::new()).is_none());
    }

    #[test]
    fn test_missing_source_is_load_error() {
        let mut device = HeadlessDevice::new();
        let mut mgr = manager();
        let err = mgr
            .load_shader(&mut device, "ghost", "ghost.vert", "ghost.frag", None)
            .unwrap_err();
        assert!(err.is_load());
        assert!(!mgr.has("ghost"));
    }
}
