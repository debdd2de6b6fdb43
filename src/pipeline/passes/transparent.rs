// src/pipeline/passes/transparent.rs
//! Forward shading into the lighting buffer.
//!
//! Normally this pass draws only transparent surfaces, back to front, over the
//! deferred resolve. With deferred shading off it also owns the opaque set,
//! shading everything forward.

use crate::gpu::{BlendMode, DepthState, Device, UniformValue};

use super::{set_light_uniforms, DrawItem, PassContext};

pub fn execute<D: Device>(ctx: &mut PassContext<'_, D>) {
    let forward_opaques = !ctx.config.deferred;
    if ctx.frame.transparent.is_empty() && !forward_opaques {
        return;
    }
    let target = ctx.pass.target.unwrap_or(ctx.targets.lighting);
    ctx.device.bind_target(Some(target));
    let (width, height) = ctx.device.target_size(target);
    ctx.device.set_viewport(0, 0, width, height);
    if forward_opaques {
        // No resolve ran; this pass starts the image from scratch.
        ctx.device.clear(
            ctx.pass.clear_color.or(Some([0.0, 0.0, 0.0, 1.0])),
            ctx.pass.clear_depth.or(Some(1.0)),
        );
    } else if ctx.pass.clear_color.is_some() || ctx.pass.clear_depth.is_some() {
        ctx.device.clear(ctx.pass.clear_color, ctx.pass.clear_depth);
    }

    if !ctx.bind_program("forward") {
        return;
    }

    let camera = ctx.frame.camera;
    ctx.set_uniform("forward", "u_view_proj", camera.view_projection().into());
    ctx.set_uniform("forward", "u_camera_position", camera.position.into());
    ctx.set_uniform("forward", "u_ambient", ctx.config.ambient.into());
    set_light_uniforms(ctx, "forward");

    if forward_opaques {
        ctx.device.set_blend(BlendMode::Opaque);
        ctx.device.set_depth(DepthState::READ_WRITE);
        for i in 0..ctx.frame.opaque.len() {
            let item = ctx.frame.opaque[i].clone();
            draw_forward(ctx, &item);
            ctx.stats.opaque_draw_calls += 1;
        }
    }

    ctx.device.set_blend(BlendMode::Alpha);
    // Test against opaque depth but never write it: transparent surfaces
    // must not occlude each other in the depth buffer.
    ctx.device.set_depth(DepthState::READ_ONLY);

    // Collection already sorted back to front.
    for i in 0..ctx.frame.transparent.len() {
        let item = ctx.frame.transparent[i].clone();
        draw_forward(ctx, &item);
        ctx.stats.transparent_draw_calls += 1;
    }

    ctx.device.set_blend(BlendMode::Opaque);
    ctx.device.set_depth(DepthState::READ_WRITE);
    ctx.state.output = target;
}

fn draw_forward<D: Device>(ctx: &mut PassContext<'_, D>, item: &DrawItem) {
    ctx.set_uniform("forward", "u_model", UniformValue::from(item.world));
    ctx.set_uniform(
        "forward",
        "u_base_color",
        UniformValue::Vec4(item.material.base_color),
    );
    ctx.set_uniform("forward", "u_metallic", item.material.metallic.into());
    ctx.set_uniform("forward", "u_roughness", item.material.roughness.into());
    ctx.device.draw_mesh(item.mesh.handle);
    ctx.stats.triangles += item.mesh.triangles as u64;
}
