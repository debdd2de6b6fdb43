// src/pipeline/passes/bloom.rs
//! Bloom: bright-pass extraction followed by a separable Gaussian blur, all
//! at quarter resolution. The tonemap pass composites the result.

use crate::gpu::{BlendMode, DepthState, Device, UniformValue};

use super::PassContext;

pub fn execute<D: Device>(ctx: &mut PassContext<'_, D>) {
    let Some(scene) = ctx.device.target_color(ctx.state.output, 0) else {
        return;
    };
    ctx.device.set_blend(BlendMode::Opaque);
    ctx.device.set_depth(DepthState::DISABLED);

    // Bright-pass extraction into the quarter-res chain.
    let bloom_target = ctx.bind_pass_target(ctx.targets.bloom);
    let (bw, bh) = ctx.device.target_size(bloom_target);
    if !ctx.bind_program("bloom_extract") {
        return;
    }
    ctx.device.bind_texture(0, Some(scene));
    ctx.set_uniform("bloom_extract", "u_scene", UniformValue::Texture(scene, 0));
    ctx.set_uniform(
        "bloom_extract",
        "u_threshold",
        ctx.config.bloom_threshold.into(),
    );
    ctx.fullscreen();

    // Horizontal blur into scratch, vertical back into the bloom target.
    let passes = [
        (bloom_target, ctx.targets.bloom_scratch, [1.0, 0.0]),
        (ctx.targets.bloom_scratch, bloom_target, [0.0, 1.0]),
    ];
    for (src, dst, direction) in passes {
        let Some(input) = ctx.device.target_color(src, 0) else {
            continue;
        };
        ctx.device.bind_target(Some(dst));
        ctx.device.set_viewport(0, 0, bw, bh);
        if !ctx.bind_program("blur") {
            return;
        }
        ctx.device.bind_texture(0, Some(input));
        ctx.set_uniform("blur", "u_input", UniformValue::Texture(input, 0));
        ctx.set_uniform("blur", "u_direction", UniformValue::Vec2(direction));
        ctx.set_uniform(
            "blur",
            "u_texel_size",
            UniformValue::Vec2([1.0 / bw as f32, 1.0 / bh as f32]),
        );
        ctx.fullscreen();
    }
    ctx.stats.postprocess_passes += 1;
}
