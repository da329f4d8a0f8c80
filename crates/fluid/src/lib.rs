//! GPU stable-fluids simulation with dye advection.
//!
//! The crate renders an incompressible 2D fluid into a window. Each frame runs a
//! fixed chain of full-screen passes over ping-pong textures:
//!
//! ```text
//!   pointer / ambient impulses
//!          │ splat (velocity, dye)
//!          ▼
//!   curl ─▶ vorticity ─▶ divergence ─▶ pressure (N × Jacobi) ─▶ gradient subtract
//!          │
//!          ▼
//!   advect velocity ─▶ advect dye ─▶ display (dye + back color) ─▶ surface
//! ```
//!
//! [`FrameDriver`] owns the per-tick sequencing (resize, color cycling,
//! impulses, step, display) and is generic over a [`FluidBackend`]. Two backends
//! exist: [`gpu::GpuFluid`] records the passes with `wgpu`, and
//! [`ReferenceFluid`] evaluates the same math on the CPU so it can be tested
//! and rendered headless.

mod driver;
pub mod error;
pub mod export;
pub mod field;
pub mod gpu;
pub mod input;
pub mod reference;
pub mod resolution;
pub mod runtime;
pub mod splat;
pub mod types;
mod window;

use anyhow::Result;

pub use driver::{
    hsv_to_rgb, random_color, ColorCycle, FluidBackend, FrameClock, FrameDriver, IntervalTimer,
    TickReport,
};
pub use error::FluidError;
pub use export::{render_snapshot, SnapshotRequest};
pub use fluidconfig::{GpuPower, SimulationConfig};
pub use reference::{FieldKind, ReferenceFluid};
pub use types::{FilterStrategy, GridSize, Impulse, PointerSample, StepStats, SurfaceSize};

/// Immutable configuration passed to the renderer at start-up.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Solver knobs, already validated.
    pub simulation: SimulationConfig,
    /// Initial window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Optional FPS cap; None = render on every redraw.
    pub target_fps: Option<f32>,
    /// Adapter preference.
    pub power: GpuPower,
    /// Seed for splat placement and colors; random when unset.
    pub seed: Option<u64>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            surface_size: (1280, 720),
            target_fps: None,
            power: GpuPower::default(),
            seed: None,
        }
    }
}

/// Entry point that owns the chosen configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Opens the simulation window and blocks until it closes.
    ///
    /// Fails when no adapter can render into half or full float textures.
    pub fn run(&mut self) -> Result<()> {
        window::run_window(&self.config)
    }
}
