// src/pipeline/passes/ssao.rs
//! Screen-space ambient occlusion from G-buffer normals and depth.

use crate::gpu::{BlendMode, DepthState, Device, UniformValue};

use super::PassContext;

const SSAO_RADIUS: f32 = 0.5;
const SSAO_BIAS: f32 = 0.025;

pub fn execute<D: Device>(ctx: &mut PassContext<'_, D>) {
    let (width, height) = (ctx.targets.width, ctx.targets.height);
    let target = ctx.bind_pass_target(ctx.targets.ssao);
    ctx.device.set_blend(BlendMode::Opaque);
    ctx.device.set_depth(DepthState::DISABLED);

    if !ctx.bind_program("ssao") {
        return;
    }

    let normals = ctx.device.target_color(ctx.targets.gbuffer, 1);
    let depth = ctx.device.target_depth(ctx.targets.gbuffer);
    if let Some(texture) = normals {
        ctx.device.bind_texture(0, Some(texture));
        ctx.set_uniform("ssao", "u_normal_map", UniformValue::Texture(texture, 0));
    }
    if let Some(texture) = depth {
        ctx.device.bind_texture(1, Some(texture));
        ctx.set_uniform("ssao", "u_depth_map", UniformValue::Texture(texture, 1));
    }
    ctx.set_uniform("ssao", "u_projection", ctx.frame.camera.projection.into());
    ctx.set_uniform("ssao", "u_radius", SSAO_RADIUS.into());
    ctx.set_uniform("ssao", "u_bias", SSAO_BIAS.into());
    ctx.set_uniform(
        "ssao",
        "u_screen_size",
        UniformValue::Vec2([width as f32, height as f32]),
    );

    ctx.fullscreen();
    ctx.stats.postprocess_passes += 1;
    // Lighting only samples the shared map for frames where it was written;
    // a redirected pass leaves it stale.
    ctx.state.ssao_valid = target == ctx.targets.ssao;
}
