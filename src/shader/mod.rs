// src/shader/mod.rs
//! Shader subsystem: source analysis, preprocessing, programs and the manager.

pub mod includes;
pub mod manager;
pub mod preprocess;
pub mod program;
pub mod source;

pub use manager::{FsLoader, ShaderManager, SourceLoader, StaticLoader};
pub use preprocess::{preprocess, register_include, DefineSet, DefineValue};
pub use program::ShaderProgram;
pub use source::Shader;
