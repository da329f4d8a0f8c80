use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use fluidconfig::SimulationConfig;
use image::{Rgba, RgbaImage};
use tracing::info;

use crate::driver::FrameDriver;
use crate::reference::ReferenceFluid;
use crate::runtime::{SteppedTimeSource, TimeSource};
use crate::types::{FilterStrategy, SurfaceSize};

/// Parameters for a headless render written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRequest {
    pub simulation: SimulationConfig,
    pub surface: SurfaceSize,
    pub frames: u32,
    pub step: Duration,
    pub seed: u64,
    pub path: PathBuf,
}

impl SnapshotRequest {
    pub fn new(simulation: SimulationConfig, surface: SurfaceSize, path: PathBuf) -> Self {
        Self {
            simulation,
            surface,
            frames: 120,
            step: Duration::from_secs_f64(1.0 / 60.0),
            seed: 0,
            path,
        }
    }
}

/// Simulates `request.frames` ticks on the CPU and writes the final frame as PNG.
pub fn render_snapshot(request: &SnapshotRequest) -> Result<PathBuf> {
    let backend = ReferenceFluid::new(
        request.simulation.clone(),
        request.surface,
        FilterStrategy::Hardware,
    );
    let mut time = SteppedTimeSource::new(request.step);
    let mut driver = FrameDriver::new(
        backend,
        request.simulation.clone(),
        time.origin(),
        request.seed,
    );
    driver.startup_burst();

    for _ in 0..request.frames.max(1) {
        driver.tick(time.now(), request.surface)?;
    }

    let fluid = driver.into_backend();
    let image = frame_to_image(fluid.frame(), request.surface);
    write_png(&image, &request.path)?;
    info!(
        path = %request.path.display(),
        frames = request.frames,
        width = request.surface.width,
        height = request.surface.height,
        "snapshot written"
    );
    Ok(request.path.clone())
}

/// Quantises a composited frame into 8-bit RGBA.
pub fn frame_to_image(frame: &[[f32; 4]], surface: SurfaceSize) -> RgbaImage {
    let mut image = RgbaImage::new(surface.width, surface.height);
    for (pixel, value) in image.pixels_mut().zip(frame) {
        *pixel = Rgba(value.map(quantise));
    }
    image
}

fn quantise(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn write_png(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write snapshot to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantise_clamps_out_of_range_values() {
        assert_eq!(quantise(-1.0), 0);
        assert_eq!(quantise(0.5), 128);
        assert_eq!(quantise(4.0), 255);
    }

    #[test]
    fn frame_maps_rows_top_down() {
        let surface = SurfaceSize::new(2, 2);
        let frame = vec![
            [1.0, 0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0, 1.0],
            [0.0, 0.0, 1.0, 1.0],
            [0.0, 0.0, 0.0, 0.0],
        ];
        let image = frame_to_image(&frame, surface);
        assert_eq!(image.get_pixel(1, 0).0, [0, 255, 0, 255]);
        assert_eq!(image.get_pixel(0, 1).0, [0, 0, 255, 255]);
    }

    #[test]
    fn snapshot_writes_png_of_surface_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("frame.png");
        let simulation = SimulationConfig {
            sim_resolution: 16,
            dye_resolution: 32,
            pressure_iterations: 4,
            ..SimulationConfig::default()
        };
        let mut request = SnapshotRequest::new(simulation, SurfaceSize::new(48, 32), path.clone());
        request.frames = 3;
        request.seed = 11;

        let written = render_snapshot(&request).expect("snapshot");
        assert_eq!(written, path);
        let image = image::open(&path).expect("decode png").to_rgba8();
        assert_eq!(image.dimensions(), (48, 32));
        // The startup burst leaves dye somewhere on screen.
        assert!(image.pixels().any(|p| p.0[..3].iter().any(|c| *c > 0)));
    }

    #[test]
    fn snapshots_with_same_seed_match() {
        let dir = tempfile::tempdir().expect("tempdir");
        let simulation = SimulationConfig {
            sim_resolution: 8,
            dye_resolution: 16,
            pressure_iterations: 2,
            ..SimulationConfig::default()
        };
        let mut images = Vec::new();
        for name in ["a.png", "b.png"] {
            let mut request =
                SnapshotRequest::new(simulation, SurfaceSize::new(16, 16), dir.path().join(name));
            request.frames = 2;
            request.seed = 5;
            let path = render_snapshot(&request).expect("snapshot");
            images.push(image::open(path).expect("decode png").to_rgba8());
        }
        assert_eq!(images[0], images[1]);
    }
}
