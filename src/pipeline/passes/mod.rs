// src/pipeline/passes/mod.rs
//! The individual render passes.
//!
//! Each pass is a free function over [`PassContext`]; the pipeline decides
//! order and whether a pass runs at all. Passes communicate only through
//! render targets and [`FrameState`], never by calling each other.

pub mod antialias;
pub mod bloom;
pub mod geometry;
pub mod lighting;
pub mod shadow;
pub mod ssao;
pub mod tonemap;
pub mod transparent;

use glam::{Mat4, Vec2, Vec3};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::gpu::{Device, TargetHandle, UniformValue};
use crate::scene::{LightKind, Material, Mesh};
use crate::shader::ShaderManager;
use crate::stats::RenderStats;

use super::config::PipelineConfig;
use super::targets::RenderTargets;

/// Stable identity of a pass, independent of execution order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    Shadows,
    GBuffer,
    Ssao,
    Lighting,
    Transparent,
    Bloom,
    Tonemap,
    Antialias,
}

impl PassKind {
    pub fn name(self) -> &'static str {
        match self {
            PassKind::Shadows => "shadows",
            PassKind::GBuffer => "gbuffer",
            PassKind::Ssao => "ssao",
            PassKind::Lighting => "lighting",
            PassKind::Transparent => "transparent",
            PassKind::Bloom => "bloom",
            PassKind::Tonemap => "tonemap",
            PassKind::Antialias => "antialias",
        }
    }
}

/// One row of the pipeline's pass table.
///
/// Clear values of `None` leave the previous target contents in place.
/// `target` redirects the pass away from its built-in destination; it is a
/// runtime handle and not persisted.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct PassConfig {
    pub kind: PassKind,
    pub enabled: bool,
    pub priority: i32,
    pub clear_color: Option<[f32; 4]>,
    pub clear_depth: Option<f32>,
    #[serde(skip)]
    pub target: Option<TargetHandle>,
}

impl PassConfig {
    /// Table row carrying the pass's built-in clear behavior.
    pub fn defaults(kind: PassKind, priority: i32) -> Self {
        let (clear_color, clear_depth) = match kind {
            // Depth-only map.
            PassKind::Shadows => (None, Some(1.0)),
            PassKind::GBuffer => (Some([0.0, 0.0, 0.0, 0.0]), Some(1.0)),
            // White = fully unoccluded, the no-op AO value.
            PassKind::Ssao => (Some([1.0; 4]), None),
            PassKind::Lighting => (Some([0.0, 0.0, 0.0, 1.0]), Some(1.0)),
            PassKind::Bloom => (Some([0.0, 0.0, 0.0, 1.0]), None),
            // These draw over an already-complete image.
            PassKind::Transparent | PassKind::Tonemap | PassKind::Antialias => (None, None),
        };
        Self {
            kind,
            enabled: true,
            priority,
            clear_color,
            clear_depth,
            target: None,
        }
    }
}

/// One renderable collected from the scene for this frame.
#[derive(Clone, Debug)]
pub struct DrawItem {
    pub mesh: Mesh,
    pub material: Material,
    pub world: Mat4,
    /// Distance from the camera, for the transparency sort.
    pub distance: f32,
    pub render_order: i32,
}

/// A light resolved into world space.
#[derive(Clone, Debug)]
pub struct FrameLight {
    pub kind: LightKind,
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub cast_shadows: bool,
}

/// Everything collected from the scene in `render_scene`, immutable while the
/// passes run.
#[derive(Clone, Debug, Default)]
pub struct FrameData {
    pub camera: Camera,
    pub opaque: Vec<DrawItem>,
    /// Sorted back to front (ties broken by `render_order`).
    pub transparent: Vec<DrawItem>,
    pub shadow_casters: Vec<DrawItem>,
    pub lights: Vec<FrameLight>,
}

/// Cross-pass state that changes while the frame renders.
#[derive(Clone, Debug)]
pub struct FrameState {
    /// Set by the shadow pass, read by lighting.
    pub light_view_proj: Option<Mat4>,
    /// Sub-pixel offset applied to the projection this frame.
    pub jitter: Vec2,
    /// View-projection of the previous frame, for motion vectors.
    pub prev_view_proj: Mat4,
    /// The target holding the most recent color output. Later passes read
    /// from it and replace it, so disabling any pass degrades gracefully.
    pub output: TargetHandle,
    pub frame_index: u64,
    /// History contains a valid previous frame (temporal AA).
    pub history_valid: bool,
    /// The occlusion pass wrote its target this frame. Lighting must not
    /// sample the SSAO map otherwise.
    pub ssao_valid: bool,
}

/// Borrowed view over the pipeline handed to each pass.
pub struct PassContext<'a, D: Device> {
    pub device: &'a mut D,
    pub shaders: &'a mut ShaderManager,
    pub targets: &'a RenderTargets,
    pub frame: &'a FrameData,
    pub config: &'a PipelineConfig,
    /// This pass's table row (clear values, target override).
    pub pass: PassConfig,
    pub state: &'a mut FrameState,
    pub stats: &'a mut RenderStats,
}

impl<'a, D: Device> PassContext<'a, D> {
    /// Bind the pass's render target (honoring a configured override), size
    /// the viewport to it and apply the pass's clear values. Returns the
    /// target actually bound.
    pub fn bind_pass_target(&mut self, default: TargetHandle) -> TargetHandle {
        let target = self.pass.target.unwrap_or(default);
        self.device.bind_target(Some(target));
        let (width, height) = self.device.target_size(target);
        self.device.set_viewport(0, 0, width, height);
        if self.pass.clear_color.is_some() || self.pass.clear_depth.is_some() {
            self.device.clear(self.pass.clear_color, self.pass.clear_depth);
        }
        target
    }

    /// Bind the named program, or skip the pass with a warning when it is
    /// missing (a failed hot reload must not bring the frame down).
    pub fn bind_program(&mut self, name: &str) -> bool {
        match self.shaders.get_mut(name) {
            Some(program) => {
                program.bind(self.device);
                true
            }
            None => {
                warn!("shader '{}' not loaded, skipping pass", name);
                false
            }
        }
    }

    pub fn set_uniform(&mut self, program: &str, name: &str, value: UniformValue) {
        if let Some(p) = self.shaders.get_mut(program) {
            p.set_uniform(self.device, name, value);
        }
    }

    /// Draw a fullscreen triangle and count it.
    pub fn fullscreen(&mut self) {
        self.device.draw_fullscreen();
        self.stats.postprocess_draw_calls += 1;
    }
}

const MAX_LIGHTS: usize = 16;

/// Upload the frame's light list as uniform arrays. Shared by the lighting
/// resolve and the forward pass.
pub fn set_light_uniforms<D: Device>(ctx: &mut PassContext<'_, D>, program: &str) {
    let lights = &ctx.frame.lights;
    let count = lights.len().min(MAX_LIGHTS);
    let mut positions = Vec::with_capacity(count);
    let mut directions = Vec::with_capacity(count);
    let mut colors = Vec::with_capacity(count);
    let mut params = Vec::with_capacity(count);
    for light in lights.iter().take(count) {
        positions.push(light.position.to_array());
        let (direction, kind, range, angle) = match light.kind {
            LightKind::Directional { direction } => (direction, 0.0, 0.0, 0.0),
            LightKind::Point { range } => (Vec3::ZERO, 1.0, range, 0.0),
            LightKind::Spot { direction, angle } => (direction, 2.0, 0.0, angle),
        };
        directions.push(direction.to_array());
        colors.push((light.color * light.intensity).to_array());
        params.push([kind, range, angle, 0.0]);
    }
    ctx.set_uniform(program, "u_light_count", UniformValue::Int(count as i32));
    ctx.set_uniform(program, "u_light_positions", UniformValue::Vec3Array(positions));
    ctx.set_uniform(program, "u_light_directions", UniformValue::Vec3Array(directions));
    ctx.set_uniform(program, "u_light_colors", UniformValue::Vec3Array(colors));
    ctx.set_uniform(program, "u_light_params", UniformValue::Vec4Array(params));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pass_rows_carry_clear_values() {
        let shadow = PassConfig::defaults(PassKind::Shadows, 10);
        assert_eq!(shadow.clear_color, None);
        assert_eq!(shadow.clear_depth, Some(1.0));
        let ssao = PassConfig::defaults(PassKind::Ssao, 30);
        assert_eq!(ssao.clear_color, Some([1.0; 4]));
        assert_eq!(ssao.clear_depth, None);
        let tonemap = PassConfig::defaults(PassKind::Tonemap, 70);
        assert_eq!(tonemap.clear_color, None);
        assert!(tonemap.target.is_none() && tonemap.enabled);
    }
}
