// src/shader/includes.rs
//! Built-in GLSL include library.
//!
//! These blocks are registered in the global include registry at pipeline
//! initialization and referenced from the embedded pass shaders via
//! `#include "name"`. None of them contain further includes.

use super::preprocess::register_include;

/// Shared utility functions: saturation, power helpers, luminance and
/// color-space conversion.
pub const COMMON: &str = r#"
float saturate(float x) { return clamp(x, 0.0, 1.0); }
vec2 saturate(vec2 x) { return clamp(x, vec2(0.0), vec2(1.0)); }
vec3 saturate(vec3 x) { return clamp(x, vec3(0.0), vec3(1.0)); }

float pow2(float x) { return x * x; }
float pow5(float x) { float x2 = x * x; return x2 * x2 * x; }

float luminance(vec3 c) { return dot(c, vec3(0.2126, 0.7152, 0.0722)); }

vec3 srgb_to_linear(vec3 c) { return pow(c, vec3(2.2)); }
vec3 linear_to_srgb(vec3 c) { return pow(c, vec3(1.0 / 2.2)); }
"#;

/// Physically based lighting math: Fresnel-Schlick, GGX normal distribution,
/// Schlick-GGX geometry term and Smith joint masking.
pub const LIGHTING: &str = r#"
vec3 fresnel_schlick(float cos_theta, vec3 f0) {
    return f0 + (vec3(1.0) - f0) * pow5(1.0 - cos_theta);
}

float distribution_ggx(vec3 n, vec3 h, float roughness) {
    float a = roughness * roughness;
    float a2 = a * a;
    float ndoth = max(dot(n, h), 0.0);
    float denom = ndoth * ndoth * (a2 - 1.0) + 1.0;
    return a2 / max(3.14159265359 * denom * denom, 1e-6);
}

float geometry_schlick_ggx(float ndotv, float roughness) {
    float r = roughness + 1.0;
    float k = (r * r) / 8.0;
    return ndotv / (ndotv * (1.0 - k) + k);
}

float geometry_smith(vec3 n, vec3 v, vec3 l, float roughness) {
    float ndotv = max(dot(n, v), 0.0);
    float ndotl = max(dot(n, l), 0.0);
    return geometry_schlick_ggx(ndotv, roughness) * geometry_schlick_ggx(ndotl, roughness);
}
"#;

/// Gradient noise used by the ambient-occlusion sampling kernel.
pub const NOISE: &str = r#"
vec2 noise_hash2(vec2 p) {
    p = vec2(dot(p, vec2(127.1, 311.7)), dot(p, vec2(269.5, 183.3)));
    return fract(sin(p) * 43758.5453123) * 2.0 - 1.0;
}

float gradient_noise(vec2 p) {
    vec2 i = floor(p);
    vec2 f = fract(p);
    vec2 u = f * f * (3.0 - 2.0 * f);
    return mix(
        mix(dot(noise_hash2(i + vec2(0.0, 0.0)), f - vec2(0.0, 0.0)),
            dot(noise_hash2(i + vec2(1.0, 0.0)), f - vec2(1.0, 0.0)), u.x),
        mix(dot(noise_hash2(i + vec2(0.0, 1.0)), f - vec2(0.0, 1.0)),
            dot(noise_hash2(i + vec2(1.0, 1.0)), f - vec2(1.0, 1.0)), u.x),
        u.y);
}
"#;

/// Post-processing toolbox: tone-mapping curves, vignette and chromatic
/// aberration sampling.
pub const POSTPROCESS: &str = r#"
vec3 tonemap_reinhard(vec3 c) {
    return c / (c + vec3(1.0));
}

// Narkowicz ACES approximation.
vec3 tonemap_aces(vec3 c) {
    float a = 2.51;
    float b = 0.03;
    float d = 2.43;
    float e = 0.59;
    float f = 0.14;
    return saturate((c * (a * c + b)) / (c * (d * c + e) + f));
}

float vignette(vec2 uv, float strength) {
    vec2 centered = uv * 2.0 - 1.0;
    return 1.0 - strength * dot(centered, centered) * 0.5;
}

vec3 chromatic_sample(sampler2D tex, vec2 uv, float amount) {
    vec2 dir = uv - 0.5;
    float r = texture(tex, uv + dir * amount).r;
    float g = texture(tex, uv).g;
    float b = texture(tex, uv - dir * amount).b;
    return vec3(r, g, b);
}
"#;

/// Register every built-in include. Idempotent; safe to call per pipeline.
pub fn register_builtin_includes() {
    register_include("common", COMMON);
    register_include("lighting", LIGHTING);
    register_include("noise", NOISE);
    register_include("postprocess", POSTPROCESS);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::preprocess::include_text;

    #[test]
    fn test_builtin_includes_are_flat() {
        register_builtin_includes();
        for name in ["common", "lighting", "noise", "postprocess"] {
            let text = include_text(name).expect("builtin include registered");
            assert!(
                !text.contains("#include"),
                "builtin include '{}' must not nest includes",
                name
            );
        }
    }
}
