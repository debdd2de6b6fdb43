// src/pipeline/passes/tonemap.rs
//! HDR to display-range tone mapping, with bloom composite.

use crate::gpu::{BlendMode, DepthState, Device, UniformValue};

use super::super::config::TonemapOperator;
use super::PassContext;

pub fn execute<D: Device>(ctx: &mut PassContext<'_, D>) {
    let Some(scene) = ctx.device.target_color(ctx.state.output, 0) else {
        return;
    };
    let target = ctx.bind_pass_target(ctx.targets.post_a);
    ctx.device.set_blend(BlendMode::Opaque);
    ctx.device.set_depth(DepthState::DISABLED);

    if !ctx.bind_program("tonemap") {
        return;
    }

    ctx.device.bind_texture(0, Some(scene));
    ctx.set_uniform("tonemap", "u_scene", UniformValue::Texture(scene, 0));

    let bloom_strength = if ctx.config.bloom {
        ctx.config.bloom_strength
    } else {
        0.0
    };
    if let Some(bloom) = ctx.device.target_color(ctx.targets.bloom, 0) {
        ctx.device.bind_texture(1, Some(bloom));
        ctx.set_uniform("tonemap", "u_bloom", UniformValue::Texture(bloom, 1));
    }
    ctx.set_uniform("tonemap", "u_bloom_strength", bloom_strength.into());
    ctx.set_uniform("tonemap", "u_exposure", ctx.config.exposure.into());
    let operator = match ctx.config.tonemap_operator {
        TonemapOperator::Reinhard => 0,
        TonemapOperator::Aces => 1,
    };
    ctx.set_uniform("tonemap", "u_operator", UniformValue::Int(operator));

    ctx.fullscreen();
    ctx.stats.postprocess_passes += 1;
    ctx.state.output = target;
}
