use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, TouchPhase, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::driver::FrameDriver;
use crate::gpu::GpuFluid;
use crate::input::{PointerTracker, PrimaryTouch};
use crate::runtime::{FramePacer, SystemTimeSource, TimeSource};
use crate::types::SurfaceSize;
use crate::RendererConfig;

/// Simulation plus the window it presents into.
///
/// Field order matters: the driver owns the surface and must drop before the
/// window it was created from.
struct WindowState {
    driver: FrameDriver<GpuFluid>,
    tracker: PointerTracker,
    touch: PrimaryTouch,
    time: SystemTimeSource,
    window: Arc<Window>,
}

impl WindowState {
    fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self> {
        let size = surface_size(window.inner_size());
        let gpu = GpuFluid::new(
            window.as_ref(),
            size,
            config.simulation.clone(),
            config.power,
        )?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let time = SystemTimeSource::new();
        let mut driver = FrameDriver::new(gpu, config.simulation.clone(), time.origin(), seed);
        driver.startup_burst();
        Ok(Self {
            driver,
            tracker: PointerTracker::new(),
            touch: PrimaryTouch::new(),
            time,
            window,
        })
    }

    fn window(&self) -> &Window {
        self.window.as_ref()
    }

    fn handle_cursor_moved(&mut self, x: f64, y: f64) {
        let size = self.window.inner_size();
        self.tracker
            .moved_to(x, y, size.width, size.height, self.driver.pointer_mut());
    }
}

pub(crate) fn run_window(config: &RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let (width, height) = config.surface_size;
    let window = WindowBuilder::new()
        .with_title("inkflow")
        .with_inner_size(PhysicalSize::new(width, height))
        .with_transparent(config.simulation.transparent)
        .build(&event_loop)
        .context("failed to create simulation window")?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window, config)
        .context("failed to initialise GPU fluid simulation")?;
    let mut pacer = FramePacer::new(config.target_fps);
    info!(fps_cap = ?config.target_fps, "simulation window ready");
    state.window().request_redraw();

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
            match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    elwt.exit();
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.state == ElementState::Pressed && !event.repeat {
                        match event.logical_key.as_ref() {
                            Key::Named(NamedKey::Space) => {
                                state.driver.toggle_pause();
                            }
                            Key::Character(key) if key.eq_ignore_ascii_case("p") => {
                                state.driver.toggle_pause();
                            }
                            Key::Named(NamedKey::Escape) => elwt.exit(),
                            _ => {}
                        }
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    state.handle_cursor_moved(position.x, position.y);
                }
                WindowEvent::CursorLeft { .. } => {
                    state.tracker.left();
                }
                WindowEvent::Touch(touch) => match touch.phase {
                    TouchPhase::Started => {
                        if state.touch.begin(touch.id) {
                            state.tracker.left();
                            state.handle_cursor_moved(touch.location.x, touch.location.y);
                        }
                    }
                    TouchPhase::Moved => {
                        if state.touch.is_primary(touch.id) {
                            state.handle_cursor_moved(touch.location.x, touch.location.y);
                        }
                    }
                    TouchPhase::Ended | TouchPhase::Cancelled => {
                        if state.touch.end(touch.id) {
                            state.tracker.left();
                        }
                    }
                },
                WindowEvent::RedrawRequested => {
                    let now = state.time.now();
                    let size = surface_size(state.window().inner_size());
                    match state.driver.tick(now, size) {
                        Ok(_) => {
                            pacer.mark(now);
                        }
                        Err(err) => match err.as_surface_error() {
                            Some(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                                state.driver.backend_mut().recover_surface();
                            }
                            Some(wgpu::SurfaceError::OutOfMemory) => {
                                error!("surface out of memory; exiting");
                                elwt.exit();
                            }
                            Some(wgpu::SurfaceError::Timeout) => {
                                warn!("surface timeout; retrying next frame");
                            }
                            Some(other) => {
                                warn!(error = ?other, "surface error; retrying next frame");
                            }
                            None => {
                                error!(error = %err, "simulation tick failed");
                                elwt.exit();
                            }
                        },
                    }
                }
                _ => {}
            }
        }
        Event::AboutToWait => {
            let now = state.time.now();
            if pacer.ready(now) {
                state.window().request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = pacer.deadline() {
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            }
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}

fn surface_size(size: PhysicalSize<u32>) -> SurfaceSize {
    SurfaceSize::new(size.width, size.height)
}
