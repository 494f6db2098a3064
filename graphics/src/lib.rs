//! glbridge graphics seam
//!
//! This crate describes the host graphics context the bridge forwards
//! graphics imports to. The context is a black box with WebGL2 semantics;
//! the bridge never inspects its internals.
//!
//! # Architecture
//!
//! - `context`: the `GraphicsContext` trait
//! - `types`: opaque host object references and validated closed sets
//! - `consts`: GL enumeration values the bridge inspects
//! - `headless`: an in-memory recording context with no rendering backend

#![no_std]

extern crate alloc;

pub mod consts;
pub mod context;
pub mod headless;
pub mod types;

pub use context::GraphicsContext;
pub use headless::HeadlessContext;
pub use types::{
    AttribType, BufferObject, ClearMask, ProgramObject, ShaderObject, ShaderPrecisionFormat,
    UniformLocation, VertexArrayObject,
};
