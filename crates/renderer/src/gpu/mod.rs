//! wgpu plumbing for the window path.
//!
//! - `context` owns the instance, device and configured surface, and maps
//!   surface acquisition errors to reconfigure-and-skip or fatal.
//! - `pipeline` builds the full-screen triangle pipelines shared by both
//!   devices below.
//! - `state` is the [`GpuDevice`]: programs run directly as fragment shaders.
//! - `blit` presents CPU frames by uploading them to a texture.

mod blit;
mod context;
mod pipeline;
mod state;

pub(crate) use blit::SurfacePresenter;
pub(crate) use context::GpuContext;
pub use state::{GpuDevice, GpuProgram};
