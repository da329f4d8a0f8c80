use fluidconfig::{GpuPower, SimulationConfig};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info};

use crate::driver::FluidBackend;
use crate::error::FluidError;
use crate::splat::corrected_radius;
use crate::types::{Impulse, StepStats, SurfaceSize};

use super::caps::{negotiate_formats, DeviceProbe, FormatTier};
use super::context::GpuContext;
use super::pipeline::{PassDescriptor, PassLibrary, PassTarget};
use super::shaders::Program;
use super::targets::TargetPool;
use super::uniforms::PassUniforms;

/// Simulation backend rendering every pass on the GPU.
///
/// Passes for one tick are recorded into a single encoder and submitted by
/// [`FluidBackend::display`].
pub struct GpuFluid {
    pool: TargetPool,
    library: PassLibrary,
    pending: Option<wgpu::CommandEncoder>,
    tier: FormatTier,
    config: SimulationConfig,
    context: GpuContext,
}

impl GpuFluid {
    /// Negotiates formats, compiles every program and allocates the fields.
    ///
    /// `target` must outlive the returned backend.
    pub fn new<T>(
        target: &T,
        surface: SurfaceSize,
        config: SimulationConfig,
        power: GpuPower,
    ) -> Result<Self, FluidError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, surface, power, config.transparent)?;
        let tier = {
            let mut probe = DeviceProbe {
                adapter: &context.adapter,
                device: &context.device,
            };
            negotiate_formats(&mut probe)?
        };
        let library = PassLibrary::new(&context.device, &tier, context.surface_format)?;
        let pool = TargetPool::new(&context.device, &context.queue, &tier, &config, surface);
        info!(
            sim_width = pool.sim.width,
            sim_height = pool.sim.height,
            dye_width = pool.dye_size.width,
            dye_height = pool.dye_size.height,
            "GPU fluid initialised"
        );
        Ok(Self {
            pool,
            library,
            pending: None,
            tier,
            config,
            context,
        })
    }

    /// Reconfigures the surface after it was lost or became outdated.
    pub fn recover_surface(&mut self) {
        self.context.reconfigure();
    }

    fn encoder(&mut self) -> wgpu::CommandEncoder {
        self.pending.take().unwrap_or_else(|| {
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame encoder"),
                })
        })
    }

    fn flush(&mut self) {
        if let Some(encoder) = self.pending.take() {
            self.context.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn encode_step(&mut self, encoder: &mut wgpu::CommandEncoder, dt: f32) -> StepStats {
        let device = &self.context.device;
        let library = &mut self.library;
        let pool = &mut self.pool;
        let config = &self.config;
        let sim = pool.sim;
        let mut passes = 0;

        library.encode(
            device,
            encoder,
            PassDescriptor {
                program: Program::Curl,
                uniforms: PassUniforms::for_grid(sim),
                inputs: &[pool.velocity.read()],
                target: PassTarget::Field(&mut pool.curl),
            },
        );
        passes += 1;

        {
            let (velocity, out) = pool.velocity.split();
            library.encode(
                device,
                encoder,
                PassDescriptor {
                    program: Program::Vorticity,
                    uniforms: PassUniforms::for_grid(sim).with_curl(config.curl, dt),
                    inputs: &[velocity, &pool.curl],
                    target: PassTarget::Field(out),
                },
            );
            pool.velocity.swap();
            passes += 1;
        }

        library.encode(
            device,
            encoder,
            PassDescriptor {
                program: Program::Divergence,
                uniforms: PassUniforms::for_grid(sim),
                inputs: &[pool.velocity.read()],
                target: PassTarget::Field(&mut pool.divergence),
            },
        );
        passes += 1;

        {
            let (pressure, out) = pool.pressure.split();
            library.encode(
                device,
                encoder,
                PassDescriptor {
                    program: Program::Clear,
                    uniforms: PassUniforms::for_grid(sim).with_value(config.pressure),
                    inputs: &[pressure],
                    target: PassTarget::Field(out),
                },
            );
            pool.pressure.swap();
            passes += 1;
        }

        for _ in 0..config.pressure_iterations {
            let (pressure, out) = pool.pressure.split();
            library.encode(
                device,
                encoder,
                PassDescriptor {
                    program: Program::Pressure,
                    uniforms: PassUniforms::for_grid(sim),
                    inputs: &[pressure, &pool.divergence],
                    target: PassTarget::Field(out),
                },
            );
            pool.pressure.swap();
            passes += 1;
        }

        {
            let (velocity, out) = pool.velocity.split();
            library.encode(
                device,
                encoder,
                PassDescriptor {
                    program: Program::GradientSubtract,
                    uniforms: PassUniforms::for_grid(sim),
                    inputs: &[pool.pressure.read(), velocity],
                    target: PassTarget::Field(out),
                },
            );
            pool.velocity.swap();
            passes += 1;
        }

        {
            let (velocity, out) = pool.velocity.split();
            library.encode(
                device,
                encoder,
                PassDescriptor {
                    program: Program::Advection,
                    uniforms: PassUniforms::for_grid(sim)
                        .with_source(sim)
                        .with_advection(dt, config.velocity_dissipation),
                    inputs: &[velocity, velocity],
                    target: PassTarget::Field(out),
                },
            );
            pool.velocity.swap();
            passes += 1;
        }

        {
            let (dye, out) = pool.dye.split();
            library.encode(
                device,
                encoder,
                PassDescriptor {
                    program: Program::Advection,
                    uniforms: PassUniforms::for_grid(sim)
                        .with_source(pool.dye_size)
                        .with_advection(dt, config.density_dissipation),
                    inputs: &[pool.velocity.read(), dye],
                    target: PassTarget::Field(out),
                },
            );
            pool.dye.swap();
            passes += 1;
        }

        StepStats {
            passes,
            pressure_sweeps: config.pressure_iterations,
        }
    }
}

impl FluidBackend for GpuFluid {
    fn surface_size(&self) -> SurfaceSize {
        self.context.size
    }

    fn resize(&mut self, surface: SurfaceSize) -> Result<bool, FluidError> {
        if surface == self.context.size || surface.is_empty() {
            return Ok(false);
        }
        self.flush();
        self.context.resize(surface);
        self.pool = TargetPool::new(
            &self.context.device,
            &self.context.queue,
            &self.tier,
            &self.config,
            surface,
        );
        debug!(
            width = surface.width,
            height = surface.height,
            "rebuilt simulation targets"
        );
        Ok(true)
    }

    fn splat(&mut self, impulse: &Impulse) {
        let mut encoder = self.encoder();
        let aspect = self.context.size.aspect_ratio();
        let radius = corrected_radius(self.config.splat_radius, aspect);
        let point = impulse.texture_point();
        let force = impulse.texture_force();
        let device = &self.context.device;
        let pool = &mut self.pool;

        let (velocity, out) = pool.velocity.split();
        self.library.encode(
            device,
            &mut encoder,
            PassDescriptor {
                program: Program::Splat,
                uniforms: PassUniforms::for_grid(pool.sim)
                    .with_splat(point, aspect, radius)
                    .with_color([force[0], force[1], 0.0]),
                inputs: &[velocity],
                target: PassTarget::Field(out),
            },
        );
        pool.velocity.swap();

        let (dye, out) = pool.dye.split();
        self.library.encode(
            device,
            &mut encoder,
            PassDescriptor {
                program: Program::Splat,
                uniforms: PassUniforms::for_grid(pool.dye_size)
                    .with_splat(point, aspect, radius)
                    .with_color(impulse.color),
                inputs: &[dye],
                target: PassTarget::Field(out),
            },
        );
        pool.dye.swap();

        self.pending = Some(encoder);
    }

    fn step(&mut self, dt: f32) -> StepStats {
        let mut encoder = self.encoder();
        let stats = self.encode_step(&mut encoder, dt);
        self.pending = Some(encoder);
        stats
    }

    fn display(&mut self) -> Result<(), FluidError> {
        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err) => {
                // Keep the simulation moving even when nothing can be shown.
                self.flush();
                return Err(err.into());
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.encoder();
        self.library.encode(
            &self.context.device,
            &mut encoder,
            PassDescriptor {
                program: Program::Display,
                uniforms: PassUniforms::for_grid(self.pool.dye_size)
                    .with_display(
                        self.config.back_color,
                        self.config.transparent,
                        self.context.premultiply_output,
                    ),
                inputs: &[self.pool.dye.read()],
                target: PassTarget::Surface {
                    view: &view,
                    format: self.context.surface_format,
                },
            },
        );
        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}
