//! CPU implementation of the pass sequence.
//!
//! Each pass evaluates the same per-cell formula as the matching GPU program
//! at cell centres, reading through clamp-to-edge samplers. It backs headless
//! snapshots and the numerical tests.

use fluidconfig::SimulationConfig;
use tracing::debug;

use crate::driver::FluidBackend;
use crate::error::FluidError;
use crate::field::{GridField, PingPong};
use crate::resolution::{compute_dye_resolution, compute_sim_resolution};
use crate::splat::{corrected_radius, splat_weight};
use crate::types::{ChannelLayout, FilterStrategy, GridSize, Impulse, StepStats, SurfaceSize};

/// Magnitude bound applied to velocity after vorticity confinement.
pub const VELOCITY_LIMIT: f32 = 1000.0;

/// Identifies one of the simulation fields held by the reference pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Velocity,
    Dye,
    Pressure,
    Divergence,
    Curl,
}

/// All fields for one surface size.
#[derive(Debug)]
struct FieldPool {
    sim: GridSize,
    dye_size: GridSize,
    velocity: PingPong<GridField>,
    dye: PingPong<GridField>,
    pressure: PingPong<GridField>,
    divergence: GridField,
    curl: GridField,
}

impl FieldPool {
    fn new(config: &SimulationConfig, surface: SurfaceSize) -> Self {
        let sim = compute_sim_resolution(config, surface);
        let dye_size = compute_dye_resolution(config, surface);
        let double = |size, layout| {
            PingPong::new(
                GridField::zeroed(size, layout),
                GridField::zeroed(size, layout),
            )
        };
        Self {
            sim,
            dye_size,
            velocity: double(sim, ChannelLayout::Rg),
            dye: double(dye_size, ChannelLayout::Rgba),
            pressure: double(sim, ChannelLayout::R),
            divergence: GridField::zeroed(sim, ChannelLayout::R),
            curl: GridField::zeroed(sim, ChannelLayout::R),
        }
    }
}

/// Reference backend computing every pass on the CPU.
#[derive(Debug)]
pub struct ReferenceFluid {
    config: SimulationConfig,
    filter: FilterStrategy,
    surface: SurfaceSize,
    pool: FieldPool,
    frame: Vec<[f32; 4]>,
}

impl ReferenceFluid {
    pub fn new(config: SimulationConfig, surface: SurfaceSize, filter: FilterStrategy) -> Self {
        let pool = FieldPool::new(&config, surface);
        debug!(
            sim_width = pool.sim.width,
            sim_height = pool.sim.height,
            dye_width = pool.dye_size.width,
            dye_height = pool.dye_size.height,
            "reference fields allocated"
        );
        Self {
            config,
            filter,
            surface,
            pool,
            frame: Vec::new(),
        }
    }

    pub fn sim_size(&self) -> GridSize {
        self.pool.sim
    }

    pub fn dye_size(&self) -> GridSize {
        self.pool.dye_size
    }

    /// Current contents of a field (the read half for double-buffered ones).
    pub fn field(&self, kind: FieldKind) -> &GridField {
        match kind {
            FieldKind::Velocity => self.pool.velocity.read(),
            FieldKind::Dye => self.pool.dye.read(),
            FieldKind::Pressure => self.pool.pressure.read(),
            FieldKind::Divergence => &self.pool.divergence,
            FieldKind::Curl => &self.pool.curl,
        }
    }

    pub fn field_mut(&mut self, kind: FieldKind) -> &mut GridField {
        match kind {
            FieldKind::Velocity => self.pool.velocity.read_mut(),
            FieldKind::Dye => self.pool.dye.read_mut(),
            FieldKind::Pressure => self.pool.pressure.read_mut(),
            FieldKind::Divergence => &mut self.pool.divergence,
            FieldKind::Curl => &mut self.pool.curl,
        }
    }

    /// Last composited frame, row-major at surface resolution, top row first.
    pub fn frame(&self) -> &[[f32; 4]] {
        &self.frame
    }

    /// Recomputes the divergence field and returns its RMS value.
    pub fn divergence_rms(&mut self) -> f32 {
        self.divergence_pass();
        self.pool.divergence.rms()
    }

    /// Runs the pressure projection on the current velocity field.
    ///
    /// Returns the number of Jacobi sweeps performed.
    pub fn project(&mut self) -> u32 {
        self.divergence_pass();
        self.clear_pressure_pass();
        let sweeps = self.pressure_sweeps();
        self.gradient_subtract_pass();
        sweeps
    }

    fn curl_pass(&mut self) {
        let velocity = self.pool.velocity.read();
        let texel = velocity.texel_size();
        self.pool.curl.render(|uv| {
            let [l, r, t, b] = neighbours(uv, texel);
            let left = velocity.sample_nearest(l)[1];
            let right = velocity.sample_nearest(r)[1];
            let top = velocity.sample_nearest(t)[0];
            let bottom = velocity.sample_nearest(b)[0];
            [0.5 * (right - left - top + bottom), 0.0, 0.0, 1.0]
        });
    }

    fn vorticity_pass(&mut self, dt: f32) {
        let strength = self.config.curl;
        let curl = &self.pool.curl;
        let texel = curl.texel_size();
        let (velocity, out) = self.pool.velocity.split();
        out.render(|uv| {
            let [l, r, t, b] = neighbours(uv, texel);
            let left = curl.sample_nearest(l)[0];
            let right = curl.sample_nearest(r)[0];
            let top = curl.sample_nearest(t)[0];
            let bottom = curl.sample_nearest(b)[0];
            let centre = curl.sample_nearest(uv)[0];

            let mut force = [0.5 * (top.abs() - bottom.abs()), 0.5 * (right.abs() - left.abs())];
            let length = (force[0] * force[0] + force[1] * force[1]).sqrt() + 1e-4;
            force[0] = force[0] / length * strength * centre;
            force[1] = -(force[1] / length * strength * centre);

            let v = velocity.sample_nearest(uv);
            [
                (v[0] + force[0] * dt).clamp(-VELOCITY_LIMIT, VELOCITY_LIMIT),
                (v[1] + force[1] * dt).clamp(-VELOCITY_LIMIT, VELOCITY_LIMIT),
                0.0,
                1.0,
            ]
        });
        self.pool.velocity.swap();
    }

    fn divergence_pass(&mut self) {
        let velocity = self.pool.velocity.read();
        let texel = velocity.texel_size();
        self.pool.divergence.render(|uv| {
            let [l, r, t, b] = neighbours(uv, texel);
            let centre = velocity.sample_nearest(uv);
            let mut left = velocity.sample_nearest(l)[0];
            let mut right = velocity.sample_nearest(r)[0];
            let mut top = velocity.sample_nearest(t)[1];
            let mut bottom = velocity.sample_nearest(b)[1];
            if l[0] < 0.0 {
                left = -centre[0];
            }
            if r[0] > 1.0 {
                right = -centre[0];
            }
            if t[1] > 1.0 {
                top = -centre[1];
            }
            if b[1] < 0.0 {
                bottom = -centre[1];
            }
            [0.5 * (right - left + top - bottom), 0.0, 0.0, 1.0]
        });
    }

    fn clear_pressure_pass(&mut self) {
        let value = self.config.pressure;
        let (pressure, out) = self.pool.pressure.split();
        out.render(|uv| {
            let p = pressure.sample_nearest(uv);
            [value * p[0], value * p[1], value * p[2], value * p[3]]
        });
        self.pool.pressure.swap();
    }

    fn pressure_sweeps(&mut self) -> u32 {
        let iterations = self.config.pressure_iterations;
        let divergence = &self.pool.divergence;
        let texel = divergence.texel_size();
        for _ in 0..iterations {
            let (pressure, out) = self.pool.pressure.split();
            out.render(|uv| {
                let [l, r, t, b] = neighbours(uv, texel);
                let sum = pressure.sample_nearest(l)[0]
                    + pressure.sample_nearest(r)[0]
                    + pressure.sample_nearest(b)[0]
                    + pressure.sample_nearest(t)[0];
                let div = divergence.sample_nearest(uv)[0];
                [(sum - div) * 0.25, 0.0, 0.0, 1.0]
            });
            self.pool.pressure.swap();
        }
        iterations
    }

    fn gradient_subtract_pass(&mut self) {
        let pressure = self.pool.pressure.read();
        let texel = pressure.texel_size();
        let (velocity, out) = self.pool.velocity.split();
        out.render(|uv| {
            let [l, r, t, b] = neighbours(uv, texel);
            let left = pressure.sample_nearest(l)[0];
            let right = pressure.sample_nearest(r)[0];
            let top = pressure.sample_nearest(t)[0];
            let bottom = pressure.sample_nearest(b)[0];
            let v = velocity.sample_nearest(uv);
            [
                v[0] - 0.5 * (right - left),
                v[1] - 0.5 * (top - bottom),
                0.0,
                1.0,
            ]
        });
        self.pool.velocity.swap();
    }

    fn advect_velocity_pass(&mut self, dt: f32) {
        let filter = self.filter;
        let dissipation = self.config.velocity_dissipation;
        let (velocity, out) = self.pool.velocity.split();
        let texel = velocity.texel_size();
        out.render(|uv| advect(uv, velocity, velocity, texel, dt, dissipation, filter));
        self.pool.velocity.swap();
    }

    fn advect_dye_pass(&mut self, dt: f32) {
        let filter = self.filter;
        let dissipation = self.config.density_dissipation;
        let velocity = self.pool.velocity.read();
        let texel = velocity.texel_size();
        let (dye, out) = self.pool.dye.split();
        out.render(|uv| advect(uv, velocity, dye, texel, dt, dissipation, filter));
        self.pool.dye.swap();
    }
}

impl FluidBackend for ReferenceFluid {
    fn surface_size(&self) -> SurfaceSize {
        self.surface
    }

    fn resize(&mut self, surface: SurfaceSize) -> Result<bool, FluidError> {
        if surface == self.surface {
            return Ok(false);
        }
        self.surface = surface;
        self.pool = FieldPool::new(&self.config, surface);
        self.frame.clear();
        debug!(
            width = surface.width,
            height = surface.height,
            "reference fields rebuilt"
        );
        Ok(true)
    }

    fn splat(&mut self, impulse: &Impulse) {
        let aspect = self.surface.aspect_ratio();
        let radius = corrected_radius(self.config.splat_radius, aspect);
        let point = impulse.texture_point();
        let force = impulse.texture_force();

        let (velocity, out) = self.pool.velocity.split();
        out.render(|uv| {
            let w = splat_weight(uv, point, radius, aspect);
            let base = velocity.sample_nearest(uv);
            [base[0] + w * force[0], base[1] + w * force[1], base[2], 1.0]
        });
        self.pool.velocity.swap();

        let color = impulse.color;
        let (dye, out) = self.pool.dye.split();
        out.render(|uv| {
            let w = splat_weight(uv, point, radius, aspect);
            let base = dye.sample_nearest(uv);
            [
                base[0] + w * color[0],
                base[1] + w * color[1],
                base[2] + w * color[2],
                1.0,
            ]
        });
        self.pool.dye.swap();
    }

    fn step(&mut self, dt: f32) -> StepStats {
        self.curl_pass();
        self.vorticity_pass(dt);
        let sweeps = self.project();
        self.advect_velocity_pass(dt);
        self.advect_dye_pass(dt);
        StepStats {
            passes: 7 + sweeps,
            pressure_sweeps: sweeps,
        }
    }

    fn display(&mut self) -> Result<(), FluidError> {
        let SurfaceSize { width, height } = self.surface;
        let back = self.config.back_color;
        let transparent = self.config.transparent;
        let dye = self.pool.dye.read();

        self.frame.clear();
        self.frame.reserve(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let uv = [
                    (x as f32 + 0.5) / width as f32,
                    (y as f32 + 0.5) / height as f32,
                ];
                let c = match self.filter {
                    FilterStrategy::Hardware => dye.sample_linear(uv),
                    FilterStrategy::Manual => dye.sample_nearest(uv),
                };
                let alpha = if transparent {
                    c[0].max(c[1]).max(c[2])
                } else {
                    1.0
                };
                self.frame
                    .push([c[0] + back[0], c[1] + back[1], c[2] + back[2], alpha]);
            }
        }
        Ok(())
    }
}

/// Left, right, top and bottom neighbour coordinates of `uv`.
///
/// Rows run top to bottom, so "top" is one texel further along v.
fn neighbours(uv: [f32; 2], texel: [f32; 2]) -> [[f32; 2]; 4] {
    [
        [uv[0] - texel[0], uv[1]],
        [uv[0] + texel[0], uv[1]],
        [uv[0], uv[1] + texel[1]],
        [uv[0], uv[1] - texel[1]],
    ]
}

fn advect(
    uv: [f32; 2],
    velocity: &GridField,
    source: &GridField,
    texel: [f32; 2],
    dt: f32,
    dissipation: f32,
    filter: FilterStrategy,
) -> [f32; 4] {
    let v = velocity.sample(uv, filter);
    let coord = [uv[0] - dt * v[0] * texel[0], uv[1] - dt * v[1] * texel[1]];
    let result = source.sample(coord, filter);
    let decay = 1.0 + dissipation * dt;
    [
        result[0] / decay,
        result[1] / decay,
        result[2] / decay,
        result[3] / decay,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            sim_resolution: 16,
            dye_resolution: 32,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn allocation_starts_from_zero() {
        let fluid = ReferenceFluid::new(
            small_config(),
            SurfaceSize::new(64, 64),
            FilterStrategy::Hardware,
        );
        for kind in [
            FieldKind::Velocity,
            FieldKind::Dye,
            FieldKind::Pressure,
            FieldKind::Divergence,
            FieldKind::Curl,
        ] {
            assert!(fluid.field(kind).is_zero(), "{kind:?} not zeroed");
        }
        assert_eq!(fluid.sim_size(), GridSize::new(16, 16));
        assert_eq!(fluid.dye_size(), GridSize::new(32, 32));
    }

    #[test]
    fn uniform_velocity_has_no_curl_or_interior_divergence() {
        let mut fluid = ReferenceFluid::new(
            small_config(),
            SurfaceSize::new(64, 64),
            FilterStrategy::Hardware,
        );
        fluid.field_mut(FieldKind::Velocity).fill([3.0, -2.0, 0.0, 0.0]);
        fluid.curl_pass();
        fluid.divergence_pass();

        let curl = fluid.field(FieldKind::Curl);
        assert!(curl.cells().iter().all(|c| c[0].abs() < 1e-6));

        let divergence = fluid.field(FieldKind::Divergence);
        for y in 1..15 {
            for x in 1..15 {
                assert!(divergence.get(x, y)[0].abs() < 1e-6);
            }
        }
    }

    #[test]
    fn divergence_reflects_velocity_at_walls() {
        let mut fluid = ReferenceFluid::new(
            small_config(),
            SurfaceSize::new(64, 64),
            FilterStrategy::Hardware,
        );
        fluid.field_mut(FieldKind::Velocity).fill([2.0, 0.0, 0.0, 0.0]);
        fluid.divergence_pass();
        let divergence = fluid.field(FieldKind::Divergence);
        // Left wall: 0.5 * (R - (-C)) = 0.5 * (2 + 2).
        assert!((divergence.get(0, 8)[0] - 2.0).abs() < 1e-6);
        assert!((divergence.get(15, 8)[0] + 2.0).abs() < 1e-6);
    }

    #[test]
    fn dissipation_decays_static_dye() {
        let mut config = small_config();
        config.density_dissipation = 1.0;
        let mut fluid =
            ReferenceFluid::new(config, SurfaceSize::new(32, 32), FilterStrategy::Hardware);
        fluid.field_mut(FieldKind::Dye).fill([1.0, 0.5, 0.0, 1.0]);
        fluid.advect_dye_pass(0.5);
        let value = fluid.field(FieldKind::Dye).get(4, 4);
        assert!((value[0] - 1.0 / 1.5).abs() < 1e-5);
        assert!((value[1] - 0.5 / 1.5).abs() < 1e-5);
    }

    #[test]
    fn vorticity_output_is_bounded() {
        let mut config = small_config();
        config.curl = 1.0e9;
        let mut fluid =
            ReferenceFluid::new(config, SurfaceSize::new(64, 64), FilterStrategy::Hardware);
        fluid.field_mut(FieldKind::Velocity).render(|uv| {
            [(uv[1] * 20.0).sin() * 50.0, (uv[0] * 13.0).cos() * 50.0, 0.0, 0.0]
        });
        fluid.curl_pass();
        fluid.vorticity_pass(1.0);
        let velocity = fluid.field(FieldKind::Velocity);
        assert!(velocity
            .cells()
            .iter()
            .all(|c| c[0].abs() <= VELOCITY_LIMIT && c[1].abs() <= VELOCITY_LIMIT));
    }

    /// Curl RMS of a Gaussian vortex before and after one confinement pass.
    fn confined_vortex_curl(strength: f32) -> (f32, f32) {
        let config = SimulationConfig {
            sim_resolution: 32,
            dye_resolution: 32,
            curl: strength,
            ..SimulationConfig::default()
        };
        let mut fluid =
            ReferenceFluid::new(config, SurfaceSize::new(64, 64), FilterStrategy::Hardware);
        fluid.field_mut(FieldKind::Velocity).render(|uv| {
            let dx = uv[0] * 32.0 - 16.0;
            let dy = uv[1] * 32.0 - 16.0;
            let g = 0.5 * (-(dx * dx + dy * dy) / 50.0).exp();
            [-dy * g, dx * g, 0.0, 0.0]
        });
        fluid.curl_pass();
        let before = fluid.field(FieldKind::Curl).rms();
        fluid.vorticity_pass(1.0 / 60.0);
        fluid.curl_pass();
        (before, fluid.field(FieldKind::Curl).rms())
    }

    #[test]
    fn confinement_amplifies_rotation() {
        let (before, after) = confined_vortex_curl(30.0);
        assert!(before > 0.1);
        // A mirrored force direction leaves the RMS within a few percent.
        assert!(after > before * 1.1, "curl rms {before} -> {after}");
    }

    #[test]
    fn reversed_confinement_damps_rotation() {
        let (before, after) = confined_vortex_curl(-30.0);
        assert!(after < before * 0.95, "curl rms {before} -> {after}");
    }

    #[test]
    fn manual_filtering_tracks_hardware_path() {
        let impulse = Impulse {
            position: [0.4, 0.6],
            force: [80.0, -30.0],
            color: [0.2, 0.8, 0.4],
        };
        let mut results = Vec::new();
        for filter in [FilterStrategy::Hardware, FilterStrategy::Manual] {
            let mut fluid = ReferenceFluid::new(small_config(), SurfaceSize::new(64, 64), filter);
            fluid.splat(&impulse);
            fluid.step(1.0 / 60.0);
            results.push(fluid.field(FieldKind::Dye).clone());
        }
        for (a, b) in results[0].cells().iter().zip(results[1].cells()) {
            for i in 0..4 {
                assert!((a[i] - b[i]).abs() < 1e-4);
            }
        }
    }
}
