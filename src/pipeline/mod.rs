// src/pipeline/mod.rs
//! The multi-pass rendering pipeline.
//!
//! One frame runs shadow depth, deferred G-buffer fill, ambient occlusion,
//! a full-screen lighting resolve, forward transparency, bloom, tone mapping
//! and anti-aliasing, in an order determined purely by per-pass priorities.
//! Passes hand their result forward through [`passes::FrameState::output`],
//! so disabling any pass leaves a still-valid (if less processed) image.

pub mod builtin;
pub mod config;
pub mod jitter;
pub mod passes;
pub mod targets;

use std::time::Instant;

use glam::{Mat4, Vec2, Vec3};
use log::{debug, info};

use crate::camera::Camera;
use crate::error::Result;
use crate::gpu::{Device, TextureHandle};
use crate::scene::{NodeFlags, Scene};
use crate::shader::{includes::register_builtin_includes, ShaderManager};
use crate::stats::RenderStats;

pub use config::{AaMode, PipelineConfig, TonemapOperator};
pub use passes::{DrawItem, FrameData, FrameLight, FrameState, PassConfig, PassKind};

use jitter::JitterSequence;
use targets::RenderTargets;

/// Default priorities; lower runs earlier. Spaced so hosts can slot custom
/// orderings between the built-in passes.
const DEFAULT_PASSES: &[(PassKind, i32)] = &[
    (PassKind::Shadows, 10),
    (PassKind::GBuffer, 20),
    (PassKind::Ssao, 30),
    (PassKind::Lighting, 40),
    (PassKind::Transparent, 50),
    (PassKind::Bloom, 60),
    (PassKind::Tonemap, 70),
    (PassKind::Antialias, 80),
];

/// Owns the device, the shader manager, every render target and the pass
/// table. Hosts drive it with `begin_frame` / `render_scene` / `end_frame`.
pub struct RenderingPipeline<D: Device> {
    device: D,
    shaders: ShaderManager,
    targets: RenderTargets,
    config: PipelineConfig,
    passes: Vec<PassConfig>,
    jitter: JitterSequence,
    state: FrameState,
    frame: FrameData,
    stats: RenderStats,
    camera: Camera,
    frame_start: Option<Instant>,
}

impl<D: Device> RenderingPipeline<D> {
    /// Create the pipeline: allocate every render target and compile all
    /// built-in pass shaders.
    pub fn new(mut device: D, width: u32, height: u32) -> Result<Self> {
        register_builtin_includes();
        let targets = RenderTargets::new(&mut device, width, height)?;
        let mut shaders = ShaderManager::new(Box::new(builtin::builtin_loader()));
        for (name, vertex, fragment) in builtin::PASS_PROGRAMS {
            shaders.load_shader(&mut device, name, vertex, fragment, None)?;
        }
        info!(
            "pipeline ready at {}x{}, {} pass shaders",
            width,
            height,
            builtin::PASS_PROGRAMS.len()
        );
        let output = targets.lighting;
        Ok(Self {
            device,
            shaders,
            targets,
            config: PipelineConfig::default(),
            passes: DEFAULT_PASSES
                .iter()
                .map(|&(kind, priority)| PassConfig::defaults(kind, priority))
                .collect(),
            jitter: JitterSequence::new(),
            state: FrameState {
                light_view_proj: None,
                jitter: Vec2::ZERO,
                prev_view_proj: Mat4::IDENTITY,
                output,
                frame_index: 0,
                history_valid: false,
                ssao_valid: false,
            },
            frame: FrameData::default(),
            stats: RenderStats::default(),
            camera: Camera::default(),
            frame_start: None,
        })
    }

    // --- per-frame protocol ----------------------------------------------

    pub fn begin_frame(&mut self) {
        self.stats.reset();
        self.frame_start = Some(Instant::now());
        self.state.frame_index += 1;
        self.state.light_view_proj = None;
        self.state.ssao_valid = false;
        self.state.output = self.targets.lighting;
        self.state.jitter = if self.config.aa_mode == AaMode::Temporal {
            self.jitter.next()
        } else {
            Vec2::ZERO
        };
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    /// Collect the scene into frame data and run every enabled pass in
    /// priority order.
    pub fn render_scene(&mut self, scene: &mut Scene) {
        self.collect(scene);
        let mut table: Vec<PassConfig> = self.passes.iter().filter(|p| p.enabled).copied().collect();
        table.sort_by_key(|p| p.priority);
        for pass in table {
            if !self.pass_feature_enabled(pass.kind) {
                continue;
            }
            let mut ctx = passes::PassContext {
                device: &mut self.device,
                shaders: &mut self.shaders,
                targets: &self.targets,
                frame: &self.frame,
                config: &self.config,
                pass,
                state: &mut self.state,
                stats: &mut self.stats,
            };
            match pass.kind {
                PassKind::Shadows => passes::shadow::execute(&mut ctx),
                PassKind::GBuffer => passes::geometry::execute(&mut ctx),
                PassKind::Ssao => passes::ssao::execute(&mut ctx),
                PassKind::Lighting => passes::lighting::execute(&mut ctx),
                PassKind::Transparent => passes::transparent::execute(&mut ctx),
                PassKind::Bloom => passes::bloom::execute(&mut ctx),
                PassKind::Tonemap => passes::tonemap::execute(&mut ctx),
                PassKind::Antialias => passes::antialias::execute(&mut ctx),
            }
        }
    }

    pub fn end_frame(&mut self) {
        if self.config.aa_mode == AaMode::Temporal {
            self.device.copy_target(self.state.output, self.targets.history);
            self.state.history_valid = true;
        }
        self.state.prev_view_proj = self.camera.view_projection();
        self.device.bind_target(None);
        if let Some(start) = self.frame_start.take() {
            self.stats.frame_time = start.elapsed();
        }
    }

    // --- configuration ----------------------------------------------------

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PipelineConfig) {
        if config.aa_mode != self.config.aa_mode {
            self.state.history_valid = false;
            self.jitter.reset();
        }
        self.config = config;
    }

    pub fn pass_config(&self, kind: PassKind) -> Option<&PassConfig> {
        self.passes.iter().find(|p| p.kind == kind)
    }

    /// Mutable access to one pass's table row, e.g. to change its clear
    /// values or redirect it into another target.
    pub fn pass_config_mut(&mut self, kind: PassKind) -> Option<&mut PassConfig> {
        self.passes.iter_mut().find(|p| p.kind == kind)
    }

    pub fn set_pass_enabled(&mut self, kind: PassKind, enabled: bool) {
        if let Some(pass) = self.passes.iter_mut().find(|p| p.kind == kind) {
            pass.enabled = enabled;
        }
    }

    pub fn set_pass_priority(&mut self, kind: PassKind, priority: i32) {
        if let Some(pass) = self.passes.iter_mut().find(|p| p.kind == kind) {
            pass.priority = priority;
            debug!("pass '{}' priority set to {}", kind.name(), priority);
        }
    }

    /// Enabled passes sorted by priority. The sort is stable, so equal
    /// priorities keep registration order; enable/disable never reorders.
    pub fn pass_order(&self) -> Vec<PassKind> {
        let mut table: Vec<&PassConfig> = self.passes.iter().filter(|p| p.enabled).collect();
        table.sort_by_key(|p| p.priority);
        table.iter().map(|p| p.kind).collect()
    }

    fn pass_feature_enabled(&self, kind: PassKind) -> bool {
        match kind {
            PassKind::Shadows => self.config.shadows,
            PassKind::GBuffer | PassKind::Lighting => self.config.deferred,
            PassKind::Ssao => self.config.deferred && self.config.ssao,
            PassKind::Bloom => self.config.hdr && self.config.bloom,
            PassKind::Tonemap => self.config.hdr && self.config.tonemapping,
            PassKind::Antialias => self.config.aa_mode != AaMode::None,
            PassKind::Transparent => true,
        }
    }

    // --- host access ------------------------------------------------------

    pub fn resize(&mut self, width: u32, height: u32) {
        self.targets.resize(&mut self.device, width, height);
        // History is the wrong size now; never blend it in.
        self.state.history_valid = false;
    }

    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    /// Color texture holding the most recent completed output.
    pub fn final_texture(&self) -> Option<TextureHandle> {
        self.device.target_color(self.state.output, 0)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// The pipeline's render targets, e.g. for debug views of individual
    /// G-buffer attachments.
    pub fn targets(&self) -> &RenderTargets {
        &self.targets
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn shaders(&self) -> &ShaderManager {
        &self.shaders
    }

    pub fn shaders_mut(&mut self) -> (&mut ShaderManager, &mut D) {
        (&mut self.shaders, &mut self.device)
    }

    /// Hot-reload one shader from its stored source. A failed rebuild keeps
    /// the previous program, so rendering continues uninterrupted.
    pub fn reload_shader(&mut self, name: &str) -> Result<()> {
        self.shaders.reload_shader(&mut self.device, name)
    }

    /// Free every GPU resource and hand the device back.
    pub fn cleanup(mut self) -> D {
        self.shaders.cleanup(&mut self.device);
        self.targets.destroy(&mut self.device);
        self.device
    }

    // --- frame collection -------------------------------------------------

    /// Walk the scene once: frustum-cull, split opaque from transparent,
    /// gather shadow casters and resolve lights into world space.
    fn collect(&mut self, scene: &mut Scene) {
        self.frame.camera = self.camera;
        self.frame.opaque.clear();
        self.frame.transparent.clear();
        self.frame.shadow_casters.clear();
        self.frame.lights.clear();

        let frustum = self.camera.frustum();
        let ids: Vec<_> = scene.iter().map(|(id, _)| id).collect();
        for id in ids {
            let Some(bounds) = scene.world_bounds(id) else { continue };
            let world = scene.world_matrix(id);
            let Some(object) = scene.get(id) else { continue };

            if let Some(light) = object.light() {
                let kind = match light.kind {
                    crate::scene::LightKind::Directional { direction } => {
                        crate::scene::LightKind::Directional {
                            direction: world.transform_vector3(direction).normalize_or_zero(),
                        }
                    }
                    crate::scene::LightKind::Spot { direction, angle } => {
                        crate::scene::LightKind::Spot {
                            direction: world.transform_vector3(direction).normalize_or_zero(),
                            angle,
                        }
                    }
                    other => other,
                };
                self.frame.lights.push(FrameLight {
                    kind,
                    position: world.transform_point3(Vec3::ZERO),
                    color: light.color,
                    intensity: light.intensity,
                    cast_shadows: light.cast_shadows,
                });
            }

            let Some(mesh) = object.mesh().copied() else { continue };
            if !object.flags.contains(NodeFlags::VISIBLE) {
                continue;
            }
            let distance = bounds.center.distance(self.camera.position);
            if let Some(range) = object.lod_range() {
                if distance < range.min_distance || distance > range.max_distance {
                    continue;
                }
            }
            let casts_shadows = object.flags.contains(NodeFlags::CAST_SHADOWS);
            let culled = object.flags.contains(NodeFlags::FRUSTUM_CULL)
                && !frustum.intersects_sphere(bounds.center, bounds.radius);
            if culled && !casts_shadows {
                self.stats.entities_culled += 1;
                continue;
            }
            let material = object.material().cloned().unwrap_or_default();
            let item = DrawItem {
                mesh,
                material: material.clone(),
                world,
                distance,
                render_order: object.render_order,
            };
            // Off-screen casters still matter: their shadows can fall into
            // the view.
            if casts_shadows && !material.transparent {
                self.frame.shadow_casters.push(item.clone());
            }
            if culled {
                self.stats.entities_culled += 1;
                continue;
            }
            if material.transparent {
                self.frame.transparent.push(item);
            } else {
                self.frame.opaque.push(item);
            }
        }

        // Back to front, farthest first; explicit order breaks ties.
        self.frame.transparent.sort_by(|a, b| {
            b.distance
                .partial_cmp(&a.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.render_order.cmp(&b.render_order))
        });
    }
}
