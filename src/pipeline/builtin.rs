// src/pipeline/builtin.rs
//! Embedded pass shaders, compiled into the binary.

use crate::shader::StaticLoader;

/// Program name plus (vertex, fragment) source paths for every pass shader.
pub const PASS_PROGRAMS: &[(&str, &str, &str)] = &[
    ("shadow", "shadow.vert", "shadow.frag"),
    ("gbuffer", "gbuffer.vert", "gbuffer.frag"),
    ("ssao", "fullscreen.vert", "ssao.frag"),
    ("lighting", "fullscreen.vert", "lighting.frag"),
    ("forward", "forward.vert", "forward.frag"),
    ("bloom_extract", "fullscreen.vert", "bloom_extract.frag"),
    ("blur", "fullscreen.vert", "blur.frag"),
    ("tonemap", "fullscreen.vert", "tonemap.frag"),
    ("fxaa", "fullscreen.vert", "fxaa.frag"),
    ("taa", "fullscreen.vert", "taa.frag"),
];

/// Source table backing the built-in pass shaders.
pub fn builtin_loader() -> StaticLoader {
    StaticLoader::new()
        .with("fullscreen.vert", include_str!("../shaders/fullscreen.vert"))
        .with("shadow.vert", include_str!("../shaders/shadow.vert"))
        .with("shadow.frag", include_str!("../shaders/shadow.frag"))
        .with("gbuffer.vert", include_str!("../shaders/gbuffer.vert"))
        .with("gbuffer.frag", include_str!("../shaders/gbuffer.frag"))
        .with("ssao.frag", include_str!("../shaders/ssao.frag"))
        .with("lighting.frag", include_str!("../shaders/lighting.frag"))
        .with("forward.vert", include_str!("../shaders/forward.vert"))
        .with("forward.frag", include_str!("../shaders/forward.frag"))
        .with(
            "bloom_extract.frag",
            include_str!("../shaders/bloom_extract.frag"),
        )
        .with("blur.frag", include_str!("../shaders/blur.frag"))
        .with("tonemap.frag", include_str!("../shaders/tonemap.frag"))
        .with("fxaa.frag", include_str!("../shaders/fxaa.frag"))
        .with("taa.frag", include_str!("../shaders/taa.frag"))
}
