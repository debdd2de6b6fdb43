// src/pipeline/passes/antialias.rs
//! Anti-aliasing resolve: FXAA-style edge smoothing or temporal accumulation
//! against the history buffer.

use crate::gpu::{BlendMode, DepthState, Device, UniformValue};

use super::super::config::AaMode;
use super::PassContext;

pub fn execute<D: Device>(ctx: &mut PassContext<'_, D>) {
    let Some(scene) = ctx.device.target_color(ctx.state.output, 0) else {
        return;
    };
    let target = ctx.pass.target.unwrap_or(ctx.targets.post_b);
    let (width, height) = (ctx.targets.width, ctx.targets.height);

    match ctx.config.aa_mode {
        AaMode::None => {}
        // Hardware multisampling happens during rasterization; at resolve
        // time there is nothing left to do but move the image along.
        AaMode::Multisample => {
            ctx.device.copy_target(ctx.state.output, target);
            ctx.state.output = target;
        }
        AaMode::EdgeDetect => {
            ctx.bind_pass_target(ctx.targets.post_b);
            ctx.device.set_blend(BlendMode::Opaque);
            ctx.device.set_depth(DepthState::DISABLED);
            if !ctx.bind_program("fxaa") {
                return;
            }
            ctx.device.bind_texture(0, Some(scene));
            ctx.set_uniform("fxaa", "u_scene", UniformValue::Texture(scene, 0));
            ctx.set_uniform(
                "fxaa",
                "u_texel_size",
                UniformValue::Vec2([1.0 / width as f32, 1.0 / height as f32]),
            );
            ctx.fullscreen();
            ctx.stats.postprocess_passes += 1;
            ctx.state.output = target;
        }
        AaMode::Temporal => {
            // First frame after a reset has no usable history; pass it
            // through so garbage never blends in.
            let blend = if ctx.state.history_valid { 0.9 } else { 0.0 };
            ctx.bind_pass_target(ctx.targets.post_b);
            ctx.device.set_blend(BlendMode::Opaque);
            ctx.device.set_depth(DepthState::DISABLED);
            if !ctx.bind_program("taa") {
                return;
            }
            ctx.device.bind_texture(0, Some(scene));
            ctx.set_uniform("taa", "u_scene", UniformValue::Texture(scene, 0));
            if let Some(history) = ctx.device.target_color(ctx.targets.history, 0) {
                ctx.device.bind_texture(1, Some(history));
                ctx.set_uniform("taa", "u_history", UniformValue::Texture(history, 1));
            }
            if let Some(motion) = ctx.device.target_color(ctx.targets.gbuffer, 2) {
                ctx.device.bind_texture(2, Some(motion));
                ctx.set_uniform("taa", "u_motion", UniformValue::Texture(motion, 2));
            }
            ctx.set_uniform("taa", "u_history_blend", UniformValue::Float(blend));
            ctx.set_uniform(
                "taa",
                "u_jitter",
                UniformValue::Vec2(ctx.state.jitter.to_array()),
            );
            ctx.fullscreen();
            ctx.stats.postprocess_passes += 1;
            ctx.state.output = target;
        }
    }
}
