// src/pipeline/targets.rs
//! Render-target set owned by the pipeline.

use log::debug;

use crate::error::Result;
use crate::gpu::{Device, TargetDesc, TargetHandle, TextureFormat};

pub const SHADOW_MAP_SIZE: u32 = 2048;

/// Quarter-resolution factor for the bloom chain.
const BLOOM_DIVISOR: u32 = 4;

/// Every offscreen target the passes draw into.
///
/// G-buffer layout (all Rgba16F):
///   0: albedo.rgb + metallic
///   1: world normal.xyz + roughness
///   2: motion.xy + linear depth + unused
///   3: emission.rgb + ambient occlusion
pub struct RenderTargets {
    pub width: u32,
    pub height: u32,
    pub gbuffer: TargetHandle,
    pub shadow: TargetHandle,
    pub ssao: TargetHandle,
    pub lighting: TargetHandle,
    pub bloom: TargetHandle,
    pub bloom_scratch: TargetHandle,
    pub post_a: TargetHandle,
    pub post_b: TargetHandle,
    pub history: TargetHandle,
}

impl RenderTargets {
    pub fn new<D: Device>(device: &mut D, width: u32, height: u32) -> Result<Self> {
        let (bw, bh) = bloom_size(width, height);
        let gbuffer = device.create_target(&TargetDesc {
            label: "gbuffer",
            width,
            height,
            color_formats: vec![
                TextureFormat::Rgba16F,
                TextureFormat::Rgba16F,
                TextureFormat::Rgba16F,
                TextureFormat::Rgba16F,
            ],
            depth: true,
        })?;
        let shadow = device.create_target(&TargetDesc {
            label: "shadow",
            width: SHADOW_MAP_SIZE,
            height: SHADOW_MAP_SIZE,
            color_formats: vec![],
            depth: true,
        })?;
        let ssao = device.create_target(&TargetDesc {
            label: "ssao",
            width,
            height,
            color_formats: vec![TextureFormat::R8],
            depth: false,
        })?;
        let lighting = device.create_target(&TargetDesc {
            label: "lighting",
            width,
            height,
            color_formats: vec![TextureFormat::Rgba16F],
            depth: true,
        })?;
        let bloom = device.create_target(&TargetDesc {
            label: "bloom",
            width: bw,
            height: bh,
            color_formats: vec![TextureFormat::Rgba16F],
            depth: false,
        })?;
        let bloom_scratch = device.create_target(&TargetDesc {
            label: "bloom_scratch",
            width: bw,
            height: bh,
            color_formats: vec![TextureFormat::Rgba16F],
            depth: false,
        })?;
        let post_a = device.create_target(&TargetDesc {
            label: "post_a",
            width,
            height,
            color_formats: vec![TextureFormat::Rgba8],
            depth: false,
        })?;
        let post_b = device.create_target(&TargetDesc {
            label: "post_b",
            width,
            height,
            color_formats: vec![TextureFormat::Rgba8],
            depth: false,
        })?;
        let history = device.create_target(&TargetDesc {
            label: "history",
            width,
            height,
            color_formats: vec![TextureFormat::Rgba8],
            depth: false,
        })?;
        debug!("created render targets at {}x{}", width, height);
        Ok(Self {
            width,
            height,
            gbuffer,
            shadow,
            ssao,
            lighting,
            bloom,
            bloom_scratch,
            post_a,
            post_b,
            history,
        })
    }

    /// Resize every screen-sized target. The shadow map keeps its fixed
    /// resolution; the bloom chain follows at quarter resolution.
    pub fn resize<D: Device>(&mut self, device: &mut D, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        let (bw, bh) = bloom_size(width, height);
        for target in [
            self.gbuffer,
            self.ssao,
            self.lighting,
            self.post_a,
            self.post_b,
            self.history,
        ] {
            device.resize_target(target, width, height);
        }
        device.resize_target(self.bloom, bw, bh);
        device.resize_target(self.bloom_scratch, bw, bh);
        debug!("resized render targets to {}x{}", width, height);
    }

    pub fn destroy<D: Device>(self, device: &mut D) {
        for target in [
            self.gbuffer,
            self.shadow,
            self.ssao,
            self.lighting,
            self.bloom,
            self.bloom_scratch,
            self.post_a,
            self.post_b,
            self.history,
        ] {
            device.destroy_target(target);
        }
    }
}

fn bloom_size(width: u32, height: u32) -> (u32, u32) {
    ((width / BLOOM_DIVISOR).max(1), (height / BLOOM_DIVISOR).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless::HeadlessDevice;

    #[test]
    fn test_bloom_targets_quarter_resolution() {
        let mut device = HeadlessDevice::new();
        let targets = RenderTargets::new(&mut device, 1920, 1080).unwrap();
        assert_eq!(device.target_size(targets.bloom), (480, 270));
        assert_eq!(device.target_size(targets.bloom_scratch), (480, 270));
    }

    #[test]
    fn test_resize_tracks_screen_but_not_shadow() {
        let mut device = HeadlessDevice::new();
        let mut targets = RenderTargets::new(&mut device, 1920, 1080).unwrap();
        targets.resize(&mut device, 960, 540);
        assert_eq!(device.target_size(targets.gbuffer), (960, 540));
        assert_eq!(device.target_size(targets.bloom), (240, 135));
        assert_eq!(
            device.target_size(targets.shadow),
            (SHADOW_MAP_SIZE, SHADOW_MAP_SIZE)
        );
    }

    #[test]
    fn test_resize_same_size_is_noop() {
        let mut device = HeadlessDevice::new();
        let mut targets = RenderTargets::new(&mut device, 800, 600).unwrap();
        targets.resize(&mut device, 800, 600);
        assert_eq!(device.target_size(targets.gbuffer), (800, 600));
    }
}
