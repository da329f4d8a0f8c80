use std::time::Instant;

use fluidconfig::SimulationConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::error::FluidError;
use crate::types::{Impulse, PointerSample, Rgb, StepStats, SurfaceSize};

/// Operations a simulation backend exposes to the frame driver.
pub trait FluidBackend {
    /// Surface dimensions the current fields were allocated for.
    fn surface_size(&self) -> SurfaceSize;

    /// Reallocates every field for `surface`, discarding their contents.
    ///
    /// Returns `Ok(false)` without touching anything when the size is unchanged.
    fn resize(&mut self, surface: SurfaceSize) -> Result<bool, FluidError>;

    /// Adds a Gaussian blob of velocity and dye.
    fn splat(&mut self, impulse: &Impulse);

    /// Advances the simulation by `dt` seconds.
    fn step(&mut self, dt: f32) -> StepStats;

    /// Composites the dye field onto the output.
    fn display(&mut self) -> Result<(), FluidError>;
}

/// Converts wall-clock time into clamped simulation steps.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    last: Instant,
    max_step: f32,
}

impl FrameClock {
    pub fn new(start: Instant, max_step: f32) -> Self {
        Self {
            last: start,
            max_step,
        }
    }

    /// Seconds since the previous call, never more than `max_step`.
    pub fn advance(&mut self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f32();
        self.last = now;
        elapsed.min(self.max_step)
    }
}

/// Fires once every `interval` seconds of accumulated simulation time.
#[derive(Debug, Clone, Copy)]
pub struct IntervalTimer {
    accumulated: f32,
    interval: f32,
}

impl IntervalTimer {
    /// A non-positive interval yields a timer that never fires.
    pub fn new(interval: f32) -> Self {
        Self {
            accumulated: 0.0,
            interval,
        }
    }

    pub fn advance(&mut self, dt: f32) -> bool {
        if self.interval <= 0.0 {
            return false;
        }
        self.accumulated += dt;
        if self.accumulated >= self.interval {
            self.accumulated = 0.0;
            return true;
        }
        false
    }
}

/// Timer in `[0, 1)` advanced at `speed` per second that reports wraps.
#[derive(Debug, Clone, Copy)]
pub struct ColorCycle {
    timer: f32,
    speed: f32,
}

impl ColorCycle {
    pub fn new(speed: f32) -> Self {
        Self { timer: 0.0, speed }
    }

    pub fn advance(&mut self, dt: f32) -> bool {
        self.timer += dt * self.speed;
        if self.timer >= 1.0 {
            self.timer = self.timer.fract();
            return true;
        }
        false
    }
}

/// Converts HSV in `[0, 1]` to RGB.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);
    match (i as i32).rem_euclid(6) {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

/// A saturated random hue dimmed for additive dye.
pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> Rgb {
    let [r, g, b] = hsv_to_rgb(rng.gen::<f32>(), 1.0, 1.0);
    [r * 0.15, g * 0.15, b * 0.15]
}

/// What happened during one call to [`FrameDriver::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub dt: f32,
    pub resized: bool,
    pub pointer_splat: bool,
    pub ambient_splat: bool,
    pub step: Option<StepStats>,
}

/// Runs the per-tick sequence against a backend.
///
/// Order: clamp the elapsed time, rebuild fields on resize, cycle the pointer
/// colour, apply pointer and ambient impulses, step unless paused, display.
pub struct FrameDriver<B> {
    backend: B,
    config: SimulationConfig,
    clock: FrameClock,
    ambient: IntervalTimer,
    colors: ColorCycle,
    pointer: PointerSample,
    rng: StdRng,
    paused: bool,
    frame: u64,
}

impl<B: FluidBackend> FrameDriver<B> {
    pub fn new(backend: B, config: SimulationConfig, start: Instant, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let pointer = PointerSample {
            color: random_color(&mut rng),
            ..PointerSample::default()
        };
        Self {
            clock: FrameClock::new(start, config.max_step_seconds()),
            ambient: IntervalTimer::new(config.ambient_interval.as_secs_f32()),
            colors: ColorCycle::new(config.color_update_speed),
            backend,
            config,
            pointer,
            rng,
            paused: false,
            frame: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Input handlers write here; the driver consumes it once per tick.
    pub fn pointer_mut(&mut self) -> &mut PointerSample {
        &mut self.pointer
    }

    pub fn pointer(&self) -> &PointerSample {
        &self.pointer
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        debug!(paused = self.paused, "simulation pause toggled");
        self.paused
    }

    /// Injects `count` random impulses, as done once at startup.
    pub fn burst(&mut self, count: u32) {
        for _ in 0..count {
            let impulse = self.random_impulse();
            self.backend.splat(&impulse);
        }
        debug!(count, "random splat burst applied");
    }

    /// Injects a random number of impulses in `5..25`.
    pub fn startup_burst(&mut self) {
        let count = self.rng.gen_range(5..25);
        self.burst(count);
    }

    /// Runs one frame.
    pub fn tick(&mut self, now: Instant, surface: SurfaceSize) -> Result<TickReport, FluidError> {
        let dt = self.clock.advance(now);
        let mut report = TickReport {
            dt,
            ..TickReport::default()
        };

        if !surface.is_empty() && surface != self.backend.surface_size() {
            report.resized = self.backend.resize(surface)?;
        }

        if self.colors.advance(dt) {
            self.pointer.color = random_color(&mut self.rng);
        }

        if self.pointer.moved {
            let impulse = self.pointer.impulse(self.config.splat_force);
            self.backend.splat(&impulse);
            self.pointer.moved = false;
            report.pointer_splat = true;
        }

        if self.ambient.advance(dt) {
            let impulse = self.random_impulse();
            self.backend.splat(&impulse);
            report.ambient_splat = true;
        }

        if !self.paused {
            report.step = Some(self.backend.step(dt));
        }

        self.backend.display()?;
        self.frame = self.frame.wrapping_add(1);
        trace!(frame = self.frame, dt, step = ?report.step, "frame complete");
        Ok(report)
    }

    fn random_impulse(&mut self) -> Impulse {
        let force = self.config.ambient_force;
        let position = [self.rng.gen::<f32>(), self.rng.gen::<f32>()];
        let direction = [
            force * (self.rng.gen::<f32>() * 2.0 - 1.0),
            force * (self.rng.gen::<f32>() * 2.0 - 1.0),
        ];
        Impulse {
            position,
            force: direction,
            color: random_color(&mut self.rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        surface: SurfaceSize,
        calls: Vec<String>,
        splats: Vec<Impulse>,
        steps: Vec<f32>,
    }

    impl FluidBackend for Recorder {
        fn surface_size(&self) -> SurfaceSize {
            self.surface
        }

        fn resize(&mut self, surface: SurfaceSize) -> Result<bool, FluidError> {
            self.calls.push("resize".into());
            self.surface = surface;
            Ok(true)
        }

        fn splat(&mut self, impulse: &Impulse) {
            self.calls.push("splat".into());
            self.splats.push(*impulse);
        }

        fn step(&mut self, dt: f32) -> StepStats {
            self.calls.push("step".into());
            self.steps.push(dt);
            StepStats::default()
        }

        fn display(&mut self) -> Result<(), FluidError> {
            self.calls.push("display".into());
            Ok(())
        }
    }

    fn driver(start: Instant) -> FrameDriver<Recorder> {
        let backend = Recorder {
            surface: SurfaceSize::new(100, 100),
            ..Recorder::default()
        };
        FrameDriver::new(backend, SimulationConfig::default(), start, 7)
    }

    #[test]
    fn frame_clock_clamps_long_gaps() {
        let start = Instant::now();
        let mut clock = FrameClock::new(start, 1.0 / 60.0);
        let dt = clock.advance(start + Duration::from_secs(2));
        assert!((dt - 1.0 / 60.0).abs() < 1e-6);
        let dt = clock.advance(start + Duration::from_secs(2) + Duration::from_millis(5));
        assert!((dt - 0.005).abs() < 1e-4);
    }

    #[test]
    fn interval_timer_fires_and_resets() {
        let mut timer = IntervalTimer::new(1.0);
        assert!(!timer.advance(0.6));
        assert!(timer.advance(0.6));
        assert!(!timer.advance(0.6));
        assert!(!IntervalTimer::new(0.0).advance(100.0));
    }

    #[test]
    fn color_cycle_reports_wraps() {
        let mut cycle = ColorCycle::new(10.0);
        assert!(!cycle.advance(0.05));
        assert!(cycle.advance(0.06));
    }

    #[test]
    fn hsv_primary_hues() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [1.0, 0.0, 0.0]);
        let green = hsv_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!(green[1] > 0.99 && green[0] < 1e-5 && green[2] < 1e-5);
    }

    #[test]
    fn random_colors_are_dim() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..32 {
            let c = random_color(&mut rng);
            assert!(c.iter().all(|v| (0.0..=0.15 + 1e-6).contains(v)));
        }
    }

    #[test]
    fn tick_runs_in_order() {
        let start = Instant::now();
        let mut driver = driver(start);
        driver.pointer_mut().moved = true;
        driver.pointer_mut().dx = 0.01;

        let report = driver
            .tick(start + Duration::from_millis(10), SurfaceSize::new(200, 100))
            .unwrap();

        assert!(report.resized && report.pointer_splat && !report.ambient_splat);
        assert_eq!(
            driver.backend().calls,
            vec!["resize", "splat", "step", "display"]
        );
        assert!(!driver.pointer().moved);
        let impulse = driver.backend().splats[0];
        assert!((impulse.force[0] - 60.0).abs() < 1e-3);
    }

    #[test]
    fn unchanged_surface_does_not_resize() {
        let start = Instant::now();
        let mut driver = driver(start);
        let report = driver
            .tick(start + Duration::from_millis(16), SurfaceSize::new(100, 100))
            .unwrap();
        assert!(!report.resized);
        assert_eq!(driver.backend().calls, vec!["step", "display"]);
    }

    #[test]
    fn paused_driver_still_displays() {
        let start = Instant::now();
        let mut driver = driver(start);
        assert!(driver.toggle_pause());
        let report = driver
            .tick(start + Duration::from_millis(16), SurfaceSize::new(100, 100))
            .unwrap();
        assert!(report.step.is_none());
        assert_eq!(driver.backend().calls, vec!["display"]);
    }

    #[test]
    fn ambient_splat_fires_after_interval() {
        let start = Instant::now();
        let mut driver = driver(start);
        let surface = SurfaceSize::new(100, 100);
        let mut fired = 0;
        // 3 s interval reached after 180 clamped steps of 1/60 s.
        for frame in 1..=200u64 {
            let report = driver
                .tick(start + Duration::from_millis(frame * 17), surface)
                .unwrap();
            if report.ambient_splat {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        let impulse = driver.backend().splats[0];
        assert!((0.0..=1.0).contains(&impulse.position[0]));
        assert!(impulse.force[0].abs() <= 600.0 && impulse.force[1].abs() <= 600.0);
    }

    #[test]
    fn color_cycle_replaces_pointer_color() {
        let start = Instant::now();
        let mut driver = driver(start);
        let initial = driver.pointer().color;
        let surface = SurfaceSize::new(100, 100);
        let mut changed = false;
        for frame in 1..=20u64 {
            driver
                .tick(start + Duration::from_millis(frame * 16), surface)
                .unwrap();
            changed |= driver.pointer().color != initial;
        }
        assert!(changed);
    }

    #[test]
    fn startup_burst_splats_between_five_and_twenty_five_times() {
        let mut driver = driver(Instant::now());
        driver.startup_burst();
        let count = driver.backend().splats.len();
        assert!((5..25).contains(&count));
    }
}
