// src/pipeline/passes/geometry.rs
//! Deferred G-buffer fill for opaque geometry.

use glam::{Mat4, Vec3};

use crate::gpu::{BlendMode, DepthState, Device, UniformValue};

use super::PassContext;

/// Projection with the temporal jitter folded in as a translation in NDC.
pub fn jittered_projection(projection: Mat4, jitter: glam::Vec2, width: u32, height: u32) -> Mat4 {
    let offset = Mat4::from_translation(Vec3::new(
        2.0 * jitter.x / width as f32,
        2.0 * jitter.y / height as f32,
        0.0,
    ));
    offset * projection
}

pub fn execute<D: Device>(ctx: &mut PassContext<'_, D>) {
    let (width, height) = (ctx.targets.width, ctx.targets.height);
    ctx.bind_pass_target(ctx.targets.gbuffer);
    ctx.device.set_blend(BlendMode::Opaque);
    ctx.device.set_depth(DepthState::READ_WRITE);

    if !ctx.bind_program("gbuffer") {
        return;
    }

    let camera = ctx.frame.camera;
    let projection = jittered_projection(camera.projection, ctx.state.jitter, width, height);
    let view_proj = projection * camera.view;
    ctx.set_uniform("gbuffer", "u_view_proj", view_proj.into());
    ctx.set_uniform("gbuffer", "u_prev_view_proj", ctx.state.prev_view_proj.into());

    for i in 0..ctx.frame.opaque.len() {
        let (world, mesh, material) = {
            let item = &ctx.frame.opaque[i];
            (item.world, item.mesh, item.material.clone())
        };
        ctx.set_uniform("gbuffer", "u_model", UniformValue::from(world));
        ctx.set_uniform(
            "gbuffer",
            "u_base_color",
            UniformValue::Vec4(material.base_color),
        );
        ctx.set_uniform("gbuffer", "u_metallic", material.metallic.into());
        ctx.set_uniform("gbuffer", "u_roughness", material.roughness.into());
        ctx.set_uniform(
            "gbuffer",
            "u_emission",
            UniformValue::Vec4([
                material.emission[0],
                material.emission[1],
                material.emission[2],
                0.0,
            ]),
        );
        let has_albedo = material.albedo_texture.is_some();
        ctx.set_uniform(
            "gbuffer",
            "u_has_albedo_map",
            UniformValue::Int(has_albedo as i32),
        );
        if let Some(texture) = material.albedo_texture {
            ctx.set_uniform("gbuffer", "u_albedo_map", UniformValue::Texture(texture, 0));
            ctx.device.bind_texture(0, Some(texture));
        }
        ctx.device.draw_mesh(mesh.handle);
        ctx.stats.opaque_draw_calls += 1;
        ctx.stats.triangles += mesh.triangles as u64;
    }
}
