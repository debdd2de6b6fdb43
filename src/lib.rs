// src/lib.rs
//! prism-render: a multi-pass deferred rendering pipeline.
//!
//! The crate is organized around three subsystems:
//!
//! - [`shader`]: GLSL source analysis, `#include`/`#define` preprocessing,
//!   linked programs with a uniform value cache, and a manager that owns
//!   every program and supports variants and hot reload.
//! - [`scene`]: an arena-backed entity hierarchy with lazy world-space
//!   bounding volumes, lights and LOD ranges as components.
//! - [`pipeline`]: the frame loop itself — shadow depth, G-buffer fill,
//!   ambient occlusion, lighting resolve, forward transparency, bloom,
//!   tone mapping and anti-aliasing, ordered by per-pass priorities.
//!
//! All GPU access goes through the [`gpu::Device`] trait. The built-in
//! [`gpu::headless::HeadlessDevice`] renders nothing but counts everything,
//! which is what the test suite runs against; the `gl` cargo feature adds an
//! OpenGL 3.3 backend.
//!
//! ```no_run
//! use prism_render::gpu::headless::HeadlessDevice;
//! use prism_render::pipeline::RenderingPipeline;
//! use prism_render::scene::Scene;
//!
//! # fn main() -> prism_render::Result<()> {
//! let mut pipeline = RenderingPipeline::new(HeadlessDevice::new(), 1920, 1080)?;
//! let mut scene = Scene::new();
//! pipeline.begin_frame();
//! pipeline.render_scene(&mut scene);
//! pipeline.end_frame();
//! # Ok(())
//! # }
//! ```

pub mod camera;
pub mod error;
pub mod gpu;
pub mod pipeline;
pub mod scene;
pub mod shader;
pub mod stats;

pub use camera::{Camera, Frustum};
pub use error::{RenderError, Result};
pub use pipeline::{AaMode, PassKind, PipelineConfig, RenderingPipeline, TonemapOperator};
pub use scene::{GameObject, NodeFlags, NodeId, Scene};
pub use shader::{DefineSet, ShaderManager, ShaderProgram};
pub use stats::RenderStats;
