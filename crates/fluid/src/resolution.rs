use fluidconfig::SimulationConfig;

use crate::types::{GridSize, SurfaceSize};

/// Derives grid dimensions from a base resolution and the surface shape.
///
/// The shorter surface axis receives `base` cells and the longer axis is
/// scaled by the surface aspect ratio, so grid cells stay square on screen.
pub fn compute_resolution(base: u32, surface: SurfaceSize) -> GridSize {
    let width = surface.width.max(1) as f32;
    let height = surface.height.max(1) as f32;
    let aspect = if width >= height {
        width / height
    } else {
        height / width
    };

    let min = (base as f32).round().max(1.0) as u32;
    let max = (base as f32 * aspect).round().max(1.0) as u32;

    if surface.width > surface.height {
        GridSize::new(max, min)
    } else {
        GridSize::new(min, max)
    }
}

pub fn compute_sim_resolution(config: &SimulationConfig, surface: SurfaceSize) -> GridSize {
    compute_resolution(config.sim_resolution, surface)
}

pub fn compute_dye_resolution(config: &SimulationConfig, surface: SurfaceSize) -> GridSize {
    compute_resolution(config.dye_resolution, surface)
}

/// Shrinks `grid` so neither side exceeds `limit`, keeping its aspect ratio.
pub fn fit_within(grid: GridSize, limit: u32) -> GridSize {
    let limit = limit.max(1);
    let longest = grid.width.max(grid.height);
    if longest <= limit {
        return grid;
    }
    let scale = f64::from(limit) / f64::from(longest);
    let shrink = |side: u32| ((f64::from(side) * scale).round() as u32).clamp(1, limit);
    GridSize::new(shrink(grid.width), shrink(grid.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_scales_width() {
        let grid = compute_resolution(128, SurfaceSize::new(1920, 1080));
        assert_eq!(grid, GridSize::new(228, 128));
    }

    #[test]
    fn portrait_scales_height() {
        let grid = compute_resolution(128, SurfaceSize::new(1080, 1920));
        assert_eq!(grid, GridSize::new(128, 228));
    }

    #[test]
    fn square_surface_is_square() {
        let grid = compute_resolution(256, SurfaceSize::new(700, 700));
        assert_eq!(grid, GridSize::new(256, 256));
    }

    #[test]
    fn degenerate_surface_still_yields_cells() {
        let grid = compute_resolution(32, SurfaceSize::new(0, 0));
        assert_eq!(grid, GridSize::new(32, 32));
    }

    #[test]
    fn oversized_grids_shrink_to_the_device_limit() {
        let grid = compute_resolution(9000, SurfaceSize::new(1920, 1080));
        assert_eq!(grid, GridSize::new(16000, 9000));
        assert_eq!(fit_within(grid, 8192), GridSize::new(8192, 4608));
        assert_eq!(
            fit_within(GridSize::new(100, 20000), 4096),
            GridSize::new(20, 4096)
        );
    }

    #[test]
    fn grids_within_the_limit_are_untouched() {
        let grid = GridSize::new(2048, 1024);
        assert_eq!(fit_within(grid, 8192), grid);
        assert_eq!(fit_within(grid, 2048), grid);
    }

    #[test]
    fn sim_and_dye_use_their_own_base() {
        let config = SimulationConfig::default();
        let surface = SurfaceSize::new(800, 400);
        assert_eq!(
            compute_sim_resolution(&config, surface),
            GridSize::new(256, 128)
        );
        assert_eq!(
            compute_dye_resolution(&config, surface),
            GridSize::new(2048, 1024)
        );
    }
}
