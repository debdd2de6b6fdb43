// src/pipeline/config.rs
//! Pipeline feature toggles and tuning knobs.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Which anti-aliasing resolve runs at the end of the frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AaMode {
    None,
    #[default]
    EdgeDetect,
    Temporal,
    Multisample,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TonemapOperator {
    Reinhard,
    #[default]
    Aces,
}

/// Everything a host can toggle without rebuilding the pipeline. Feature
/// flags map one-to-one onto pass enablement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Deferred shading for opaque geometry. When off, opaques are
    /// forward-shaded directly into the lighting buffer and the G-buffer,
    /// occlusion and resolve passes do not run.
    pub deferred: bool,
    /// HDR intermediates. When off, bloom and tone mapping are bypassed and
    /// the lighting buffer is treated as display-range.
    pub hdr: bool,
    pub shadows: bool,
    pub ssao: bool,
    pub bloom: bool,
    pub tonemapping: bool,
    pub aa_mode: AaMode,
    pub exposure: f32,
    pub tonemap_operator: TonemapOperator,
    pub bloom_threshold: f32,
    pub bloom_strength: f32,
    pub ambient: Vec3,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deferred: true,
            hdr: true,
            shadows: true,
            ssao: true,
            bloom: true,
            tonemapping: true,
            aa_mode: AaMode::default(),
            exposure: 1.0,
            tonemap_operator: TonemapOperator::default(),
            bloom_threshold: 1.0,
            bloom_strength: 0.6,
            ambient: Vec3::splat(0.03),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enables_the_full_stack() {
        let config = PipelineConfig::default();
        assert!(config.deferred && config.hdr);
        assert!(config.shadows && config.ssao && config.bloom && config.tonemapping);
        assert_eq!(config.aa_mode, AaMode::EdgeDetect);
    }
}
