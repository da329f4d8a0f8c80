//! wgpu backend for the fluid simulation.
//!
//! - `context` owns the instance, adapter, device and surface, and reconfigures
//!   the swapchain when the window resizes.
//! - `caps` negotiates which floating-point formats can be rendered into and
//!   whether they filter linearly.
//! - `shaders` holds the GLSL for the vertex stage and every pass program.
//! - `pipeline` compiles programs into pipelines keyed by target format and
//!   records single full-screen passes.
//! - `targets` allocates the ping-pong simulation textures.
//! - `uniforms` mirrors the per-pass parameter block.
//! - `state` sequences the passes and implements `FluidBackend`.

mod caps;
mod context;
mod pipeline;
mod shaders;
mod state;
mod targets;
mod uniforms;

pub use caps::{negotiate_formats, FormatProbe, FormatTier, TexelFormat};
pub use shaders::Program;
pub use state::GpuFluid;
