// src/pipeline/passes/lighting.rs
//! Full-screen deferred lighting resolve.

use glam::Mat4;

use crate::gpu::{BlendMode, DepthState, Device, UniformValue};

use super::{set_light_uniforms, PassContext};

pub fn execute<D: Device>(ctx: &mut PassContext<'_, D>) {
    let target = ctx.bind_pass_target(ctx.targets.lighting);
    // Bring the opaque depth along so the transparency pass can test
    // against it.
    ctx.device.copy_target(ctx.targets.gbuffer, target);
    ctx.device.set_blend(BlendMode::Opaque);
    ctx.device.set_depth(DepthState::DISABLED);

    if !ctx.bind_program("lighting") {
        return;
    }

    for index in 0..4 {
        if let Some(texture) = ctx.device.target_color(ctx.targets.gbuffer, index) {
            let unit = index as u32;
            ctx.device.bind_texture(unit, Some(texture));
            let name = ["u_gbuffer0", "u_gbuffer1", "u_gbuffer2", "u_gbuffer3"][index];
            ctx.set_uniform("lighting", name, UniformValue::Texture(texture, unit));
        }
    }
    if let Some(texture) = ctx.device.target_depth(ctx.targets.gbuffer) {
        ctx.device.bind_texture(4, Some(texture));
        ctx.set_uniform("lighting", "u_depth_map", UniformValue::Texture(texture, 4));
    }
    // The map is only safe to sample on frames where the occlusion pass
    // actually wrote it; a disabled or reordered pass leaves stale memory.
    if ctx.state.ssao_valid {
        if let Some(texture) = ctx.device.target_color(ctx.targets.ssao, 0) {
            ctx.device.bind_texture(5, Some(texture));
            ctx.set_uniform("lighting", "u_ssao_map", UniformValue::Texture(texture, 5));
        }
    }

    let shadowed = if let (Some(light_vp), Some(texture)) = (
        ctx.state.light_view_proj,
        ctx.device.target_depth(ctx.targets.shadow),
    ) {
        ctx.device.bind_texture(6, Some(texture));
        ctx.set_uniform("lighting", "u_shadow_map", UniformValue::Texture(texture, 6));
        ctx.set_uniform("lighting", "u_light_view_proj", light_vp.into());
        true
    } else {
        ctx.set_uniform("lighting", "u_light_view_proj", Mat4::IDENTITY.into());
        false
    };
    ctx.set_uniform("lighting", "u_shadows_enabled", UniformValue::Int(shadowed as i32));
    ctx.set_uniform(
        "lighting",
        "u_ssao_enabled",
        UniformValue::Int(ctx.state.ssao_valid as i32),
    );
    ctx.set_uniform("lighting", "u_camera_position", ctx.frame.camera.position.into());
    ctx.set_uniform(
        "lighting",
        "u_inv_view_proj",
        ctx.frame.camera.view_projection().inverse().into(),
    );
    ctx.set_uniform("lighting", "u_ambient", ctx.config.ambient.into());
    set_light_uniforms(ctx, "lighting");

    ctx.fullscreen();
    ctx.stats.postprocess_passes += 1;
    ctx.state.output = target;
}
