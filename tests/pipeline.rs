// tests/pipeline.rs
//! End-to-end frames against the headless device.

use glam::{Mat4, Vec3};
use prism_render::gpu::headless::HeadlessDevice;
use prism_render::gpu::{Device, UniformValue};
use prism_render::pipeline::RenderingPipeline;
use prism_render::scene::{Aabb, Component, Light, Material, Mesh, NodeFlags, Scene};
use prism_render::{AaMode, Camera, NodeId, PassKind, PipelineConfig};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn test_camera() -> Camera {
    Camera::look_at(
        Vec3::new(0.0, 2.0, 10.0),
        Vec3::ZERO,
        Vec3::Y,
        Mat4::perspective_rh(std::f32::consts::FRAC_PI_3, 16.0 / 9.0, 0.1, 500.0),
    )
}

fn spawn_mesh_entity(
    pipeline: &mut RenderingPipeline<HeadlessDevice>,
    scene: &mut Scene,
    name: &str,
    position: Vec3,
    transparent: bool,
) -> NodeId {
    let handle = pipeline.device_mut().register_mesh();
    let id = scene.spawn(name);
    scene.update_transform(id, |t| t.position = position);
    scene.set_mesh(
        id,
        Some(Mesh {
            handle,
            bounds: Aabb::UNIT,
            triangles: 12,
        }),
    );
    scene.set_material(
        id,
        Some(Material {
            transparent,
            base_color: [1.0, 1.0, 1.0, if transparent { 0.5 } else { 1.0 }],
            ..Default::default()
        }),
    );
    id
}

fn render_one_frame(pipeline: &mut RenderingPipeline<HeadlessDevice>, scene: &mut Scene) {
    init_logging();
    pipeline.begin_frame();
    pipeline.set_camera(test_camera());
    pipeline.render_scene(scene);
    pipeline.end_frame();
}

#[test]
fn test_full_frame_draws_every_category() {
    let mut pipeline = RenderingPipeline::new(HeadlessDevice::new(), 1920, 1080).unwrap();
    let mut scene = Scene::new();
    spawn_mesh_entity(&mut pipeline, &mut scene, "a", Vec3::ZERO, false);
    spawn_mesh_entity(&mut pipeline, &mut scene, "b", Vec3::new(2.0, 0.0, 0.0), false);
    spawn_mesh_entity(&mut pipeline, &mut scene, "glass", Vec3::new(0.0, 0.0, 2.0), true);
    let sun = scene.spawn("sun");
    scene.set_component(sun, Component::Light(Light::directional(Vec3::new(-0.3, -1.0, -0.2))));

    render_one_frame(&mut pipeline, &mut scene);

    let stats = pipeline.stats();
    assert_eq!(stats.opaque_draw_calls, 2);
    assert_eq!(stats.transparent_draw_calls, 1);
    // Both opaque entities cast into the shadow map.
    assert_eq!(stats.shadow_draw_calls, 2);
    assert!(stats.postprocess_draw_calls > 0);
    assert!(stats.triangles >= 12 * 3);
    assert!(pipeline.final_texture().is_some());
}

#[test]
fn test_no_directional_light_skips_shadows_but_still_lights() {
    let mut pipeline = RenderingPipeline::new(HeadlessDevice::new(), 1280, 720).unwrap();
    let mut scene = Scene::new();
    spawn_mesh_entity(&mut pipeline, &mut scene, "a", Vec3::ZERO, false);
    let lamp = scene.spawn("lamp");
    scene.update_transform(lamp, |t| t.position = Vec3::new(0.0, 3.0, 0.0));
    scene.set_component(lamp, Component::Light(Light::point(10.0)));

    render_one_frame(&mut pipeline, &mut scene);

    let stats = pipeline.stats();
    assert_eq!(stats.shadow_draw_calls, 0);
    // The lighting resolve still produced an image.
    assert!(pipeline.device().counters().fullscreen_draws > 0);
    assert!(pipeline.final_texture().is_some());
}

#[test]
fn test_pass_order_follows_priority_not_toggles() {
    let mut pipeline = RenderingPipeline::new(HeadlessDevice::new(), 640, 480).unwrap();
    let default_order = pipeline.pass_order();
    assert_eq!(default_order[0], PassKind::Shadows);
    assert_eq!(*default_order.last().unwrap(), PassKind::Antialias);

    // Moving a pass's priority reorders it.
    pipeline.set_pass_priority(PassKind::Tonemap, 5);
    assert_eq!(pipeline.pass_order()[0], PassKind::Tonemap);

    // Toggling a different pass never changes relative order of the rest.
    let before: Vec<PassKind> = pipeline
        .pass_order()
        .into_iter()
        .filter(|k| *k != PassKind::Ssao)
        .collect();
    pipeline.set_pass_enabled(PassKind::Ssao, false);
    assert_eq!(pipeline.pass_order(), before);
    pipeline.set_pass_enabled(PassKind::Ssao, true);

    // Equal priorities keep registration order (stable sort).
    pipeline.set_pass_priority(PassKind::Tonemap, 20);
    let order = pipeline.pass_order();
    let gbuffer = order.iter().position(|k| *k == PassKind::GBuffer).unwrap();
    let tonemap = order.iter().position(|k| *k == PassKind::Tonemap).unwrap();
    assert!(gbuffer < tonemap);
}

#[test]
fn test_resize_keeps_rendering_and_scales_bloom() {
    let mut pipeline = RenderingPipeline::new(HeadlessDevice::new(), 1920, 1080).unwrap();
    let mut scene = Scene::new();
    spawn_mesh_entity(&mut pipeline, &mut scene, "a", Vec3::ZERO, false);

    render_one_frame(&mut pipeline, &mut scene);
    pipeline.resize(960, 540);
    render_one_frame(&mut pipeline, &mut scene);

    let bloom = pipeline.targets().bloom;
    assert_eq!(pipeline.device().target_size(bloom), (240, 135));
    let gbuffer = pipeline.targets().gbuffer;
    assert_eq!(pipeline.device().target_size(gbuffer), (960, 540));
    assert!(pipeline.final_texture().is_some());
}

#[test]
fn test_disabling_post_stack_outputs_lighting_target() {
    let mut pipeline = RenderingPipeline::new(HeadlessDevice::new(), 800, 600).unwrap();
    let mut scene = Scene::new();
    spawn_mesh_entity(&mut pipeline, &mut scene, "a", Vec3::ZERO, false);

    let mut config = PipelineConfig::default();
    config.bloom = false;
    config.tonemapping = false;
    config.aa_mode = AaMode::None;
    pipeline.set_config(config);

    render_one_frame(&mut pipeline, &mut scene);

    let lighting = pipeline.targets().lighting;
    let expected = pipeline.device().target_color(lighting, 0);
    assert_eq!(pipeline.final_texture(), expected);
}

#[test]
fn test_forward_only_mode_draws_opaques_without_gbuffer() {
    let mut pipeline = RenderingPipeline::new(HeadlessDevice::new(), 800, 600).unwrap();
    let mut scene = Scene::new();
    spawn_mesh_entity(&mut pipeline, &mut scene, "a", Vec3::ZERO, false);
    spawn_mesh_entity(&mut pipeline, &mut scene, "glass", Vec3::new(0.0, 0.0, 2.0), true);

    let mut config = PipelineConfig::default();
    config.deferred = false;
    pipeline.set_config(config);

    render_one_frame(&mut pipeline, &mut scene);

    let stats = pipeline.stats();
    assert_eq!(stats.opaque_draw_calls, 1);
    assert_eq!(stats.transparent_draw_calls, 1);
    assert!(pipeline.final_texture().is_some());
}

#[test]
fn test_pass_clear_values_are_configurable() {
    let mut pipeline = RenderingPipeline::new(HeadlessDevice::new(), 640, 480).unwrap();
    let mut scene = Scene::new();
    spawn_mesh_entity(&mut pipeline, &mut scene, "a", Vec3::ZERO, false);

    render_one_frame(&mut pipeline, &mut scene);
    let first = pipeline.device().counters().clears;
    render_one_frame(&mut pipeline, &mut scene);
    let per_frame = pipeline.device().counters().clears - first;

    // A pass with both clear values nulled out stops clearing its target.
    let pass = pipeline.pass_config_mut(PassKind::GBuffer).unwrap();
    pass.clear_color = None;
    pass.clear_depth = None;
    let before = pipeline.device().counters().clears;
    render_one_frame(&mut pipeline, &mut scene);
    assert_eq!(pipeline.device().counters().clears - before, per_frame - 1);
}

#[test]
fn test_pass_target_override_redirects_output() {
    let mut pipeline = RenderingPipeline::new(HeadlessDevice::new(), 800, 600).unwrap();
    let mut scene = Scene::new();
    spawn_mesh_entity(&mut pipeline, &mut scene, "a", Vec3::ZERO, false);

    let mut config = PipelineConfig::default();
    config.aa_mode = AaMode::None;
    pipeline.set_config(config);
    let post_b = pipeline.targets().post_b;
    pipeline.pass_config_mut(PassKind::Tonemap).unwrap().target = Some(post_b);

    render_one_frame(&mut pipeline, &mut scene);

    let expected = pipeline.device().target_color(post_b, 0);
    assert!(expected.is_some());
    assert_eq!(pipeline.final_texture(), expected);
}

#[test]
fn test_lighting_ignores_ssao_when_pass_skipped() {
    let mut pipeline = RenderingPipeline::new(HeadlessDevice::new(), 800, 600).unwrap();
    let mut scene = Scene::new();
    spawn_mesh_entity(&mut pipeline, &mut scene, "a", Vec3::ZERO, false);

    render_one_frame(&mut pipeline, &mut scene);
    let lighting = pipeline.shaders().get("lighting").unwrap();
    assert_eq!(lighting.cached_value("u_ssao_enabled"), Some(&UniformValue::Int(1)));

    // Disabling the occlusion pass (without touching config.ssao) must stop
    // the resolve from sampling the never-written map.
    pipeline.set_pass_enabled(PassKind::Ssao, false);
    render_one_frame(&mut pipeline, &mut scene);
    let lighting = pipeline.shaders().get("lighting").unwrap();
    assert_eq!(lighting.cached_value("u_ssao_enabled"), Some(&UniformValue::Int(0)));

    // Reordering it after the resolve is just as stale for that frame.
    pipeline.set_pass_enabled(PassKind::Ssao, true);
    pipeline.set_pass_priority(PassKind::Ssao, 45);
    render_one_frame(&mut pipeline, &mut scene);
    let lighting = pipeline.shaders().get("lighting").unwrap();
    assert_eq!(lighting.cached_value("u_ssao_enabled"), Some(&UniformValue::Int(0)));
}

#[test]
fn test_temporal_aa_copies_history_each_frame() {
    let mut pipeline = RenderingPipeline::new(HeadlessDevice::new(), 800, 600).unwrap();
    let mut scene = Scene::new();
    spawn_mesh_entity(&mut pipeline, &mut scene, "a", Vec3::ZERO, false);

    let mut config = PipelineConfig::default();
    config.aa_mode = AaMode::Temporal;
    pipeline.set_config(config);

    render_one_frame(&mut pipeline, &mut scene);
    let copies_after_first = pipeline.device().counters().target_copies;
    render_one_frame(&mut pipeline, &mut scene);
    let copies_after_second = pipeline.device().counters().target_copies;
    assert!(copies_after_second > copies_after_first);
    assert!(pipeline.final_texture().is_some());
}

#[test]
fn test_frustum_culled_entity_is_not_drawn() {
    let mut pipeline = RenderingPipeline::new(HeadlessDevice::new(), 800, 600).unwrap();
    let mut scene = Scene::new();
    // Far behind the camera, and not a shadow caster.
    let id = spawn_mesh_entity(&mut pipeline, &mut scene, "behind", Vec3::new(0.0, 0.0, 100.0), false);
    scene.get_mut(id).unwrap().flags.remove(NodeFlags::CAST_SHADOWS);

    render_one_frame(&mut pipeline, &mut scene);

    let stats = pipeline.stats();
    assert_eq!(stats.opaque_draw_calls, 0);
    assert_eq!(stats.entities_culled, 1);
}

#[test]
fn test_hot_reload_survives_frames() {
    let mut pipeline = RenderingPipeline::new(HeadlessDevice::new(), 800, 600).unwrap();
    let mut scene = Scene::new();
    spawn_mesh_entity(&mut pipeline, &mut scene, "a", Vec3::ZERO, false);

    render_one_frame(&mut pipeline, &mut scene);
    pipeline.reload_shader("lighting").unwrap();
    render_one_frame(&mut pipeline, &mut scene);
    assert!(pipeline.stats().postprocess_draw_calls > 0);
}

#[test]
fn test_cleanup_returns_the_device() {
    let pipeline = RenderingPipeline::new(HeadlessDevice::new(), 320, 240).unwrap();
    let device = pipeline.cleanup();
    // Every target was destroyed; handles resolve to nothing.
    assert_eq!(device.counters().uniform_writes, 0);
}
