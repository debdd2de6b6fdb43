// src/error.rs
//! Error handling for the rendering crate.
//!
//! - Compile/link failures carry the driver's info log so shader authors see the
//!   real diagnostic, not a summary of it.
//! - Missing uniforms/attributes/shaders are *warnings*, not errors: optimizing
//!   GLSL compilers legitimately drop unused symbols.

use thiserror::Error;

use crate::gpu::ShaderStage;

/// Main error type for shader compilation, linking and resource lookup.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum RenderError {
    /// A shader stage was rejected by the compiler. Carries the compiler log.
    #[error("{stage:?} stage failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },

    /// A set of compiled stages was rejected at link time.
    #[error("program failed to link:\n{log}")]
    Link { log: String },

    /// Shader source text could not be fetched.
    #[error("failed to load shader source '{path}': {reason}")]
    Load { path: String, reason: String },

    /// A uniform, attribute or shader was looked up by name and not found.
    /// Callers usually treat this as a logged no-op rather than a failure.
    #[error("missing {kind} '{name}'")]
    MissingResource { kind: &'static str, name: String },

    /// The graphics device refused a resource allocation.
    #[error("device error: {0}")]
    Device(String),
}

impl RenderError {
    #[inline]
    pub fn is_compile(&self) -> bool {
        matches!(self, RenderError::Compile { .. })
    }

    #[inline]
    pub fn is_link(&self) -> bool {
        matches!(self, RenderError::Link { .. })
    }

    #[inline]
    pub fn is_load(&self) -> bool {
        matches!(self, RenderError::Load { .. })
    }

    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, RenderError::MissingResource { .. })
    }
}

/// Convenient `Result` alias — use `crate::Result<T>` everywhere.
pub type Result<T> = std::result::Result<T, RenderError>;
