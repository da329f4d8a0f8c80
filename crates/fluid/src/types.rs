pub use fluidconfig::Rgb;

/// Number of colour channels a simulation field stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    /// Scalar fields: pressure, divergence and curl.
    R,
    /// Two-component velocity.
    Rg,
    /// Dye colour.
    Rgba,
}

impl ChannelLayout {
    pub fn channels(self) -> usize {
        match self {
            ChannelLayout::R => 1,
            ChannelLayout::Rg => 2,
            ChannelLayout::Rgba => 4,
        }
    }
}

/// How advection reads fields between texel centres.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FilterStrategy {
    /// The sampler interpolates in hardware.
    #[default]
    Hardware,
    /// Point sampling with bilinear interpolation done in the pass itself.
    Manual,
}

impl FilterStrategy {
    pub fn from_linear_support(supported: bool) -> Self {
        if supported {
            FilterStrategy::Hardware
        } else {
            FilterStrategy::Manual
        }
    }
}

/// Physical pixel dimensions of the output surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height, guarding against a zero-sized surface.
    pub fn aspect_ratio(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Cell dimensions of one simulation grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size of one cell in normalised texture coordinates.
    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Pointer state as seen by the frame driver.
///
/// Coordinates are normalised with the origin at the bottom-left of the
/// surface. `dx`/`dy` already carry the aspect correction applied by the
/// input tracker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerSample {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub moved: bool,
    pub color: Rgb,
}

impl Default for PointerSample {
    fn default() -> Self {
        Self {
            x: 0.5,
            y: 0.5,
            dx: 0.0,
            dy: 0.0,
            moved: false,
            color: [0.15, 0.0, 0.0],
        }
    }
}

impl PointerSample {
    /// Converts the pending movement into an impulse scaled by `force`.
    pub fn impulse(&self, force: f32) -> Impulse {
        Impulse {
            position: [self.x, self.y],
            force: [self.dx * force, self.dy * force],
            color: self.color,
        }
    }
}

/// A localised injection of velocity and dye.
///
/// `position` uses the pointer convention (origin bottom-left, y up) and
/// `force` is expressed in simulation cells per second along the same axes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Impulse {
    pub position: [f32; 2],
    pub force: [f32; 2],
    pub color: Rgb,
}

impl Impulse {
    /// Position in texture space, where rows run top to bottom.
    pub fn texture_point(&self) -> [f32; 2] {
        [self.position[0], 1.0 - self.position[1]]
    }

    /// Force expressed along texture-space axes.
    pub fn texture_force(&self) -> [f32; 2] {
        [self.force[0], -self.force[1]]
    }
}

/// Work recorded by one simulation step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Full-grid passes issued, pressure sweeps included.
    pub passes: u32,
    /// Jacobi relaxation sweeps performed on the pressure field.
    pub pressure_sweeps: u32,
}
