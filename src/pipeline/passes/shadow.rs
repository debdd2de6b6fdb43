// src/pipeline/passes/shadow.rs
//! Depth-only shadow map for the primary directional light.

use glam::{Mat4, Vec3};
use log::trace;

use crate::gpu::{BlendMode, DepthState, Device, UniformValue};
use crate::scene::LightKind;

use super::PassContext;

/// Half-extent of the orthographic shadow volume around the camera.
const SHADOW_EXTENT: f32 = 40.0;
const SHADOW_DEPTH_RANGE: f32 = 100.0;

pub fn execute<D: Device>(ctx: &mut PassContext<'_, D>) {
    // First shadow-casting directional light wins; without one there is
    // nothing to render and lighting falls back to unshadowed.
    let Some(direction) = ctx.frame.lights.iter().find_map(|l| match l.kind {
        LightKind::Directional { direction } if l.cast_shadows => Some(direction),
        _ => None,
    }) else {
        trace!("no shadow-casting directional light, skipping shadow pass");
        ctx.state.light_view_proj = None;
        return;
    };
    if ctx.frame.shadow_casters.is_empty() {
        ctx.state.light_view_proj = None;
        return;
    }
    let focus = ctx.frame.camera.position;
    let eye = focus - direction * SHADOW_DEPTH_RANGE * 0.5;
    let up = if direction.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y };
    let view = Mat4::look_at_rh(eye, focus, up);
    let projection = Mat4::orthographic_rh(
        -SHADOW_EXTENT,
        SHADOW_EXTENT,
        -SHADOW_EXTENT,
        SHADOW_EXTENT,
        0.0,
        SHADOW_DEPTH_RANGE,
    );
    let light_view_proj = projection * view;
    ctx.state.light_view_proj = Some(light_view_proj);

    ctx.bind_pass_target(ctx.targets.shadow);
    ctx.device.set_blend(BlendMode::Opaque);
    ctx.device.set_depth(DepthState::READ_WRITE);

    if !ctx.bind_program("shadow") {
        return;
    }
    ctx.set_uniform("shadow", "u_light_view_proj", light_view_proj.into());
    for i in 0..ctx.frame.shadow_casters.len() {
        let (world, mesh) = {
            let item = &ctx.frame.shadow_casters[i];
            (item.world, item.mesh)
        };
        ctx.set_uniform("shadow", "u_model", UniformValue::from(world));
        ctx.device.draw_mesh(mesh.handle);
        ctx.stats.shadow_draw_calls += 1;
        ctx.stats.triangles += mesh.triangles as u64;
    }
}
