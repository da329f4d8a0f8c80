use bytemuck::{Pod, Zeroable};

use crate::types::{GridSize, Rgb};

/// Per-pass parameters shared by every program.
///
/// Matches the std140 `PassParams` block declared in the shader prelude.
/// Fields a program does not read are left at zero.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub(crate) struct PassUniforms {
    pub texel_size: [f32; 2],
    pub source_texel_size: [f32; 2],
    pub color: [f32; 4],
    pub point: [f32; 2],
    pub aspect_ratio: f32,
    pub radius: f32,
    pub dt: f32,
    pub dissipation: f32,
    pub curl: f32,
    pub value: f32,
    pub transparent: f32,
    pub premultiply: f32,
    pub _padding: [f32; 2],
}

impl PassUniforms {
    /// Uniforms for a pass whose neighbour offsets come from `grid`.
    pub fn for_grid(grid: GridSize) -> Self {
        Self {
            texel_size: grid.texel_size(),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, grid: GridSize) -> Self {
        self.source_texel_size = grid.texel_size();
        self
    }

    pub fn with_color(mut self, color: [f32; 3]) -> Self {
        self.color = [color[0], color[1], color[2], 1.0];
        self
    }

    pub fn with_splat(mut self, point: [f32; 2], aspect_ratio: f32, radius: f32) -> Self {
        self.point = point;
        self.aspect_ratio = aspect_ratio;
        self.radius = radius;
        self
    }

    pub fn with_advection(mut self, dt: f32, dissipation: f32) -> Self {
        self.dt = dt;
        self.dissipation = dissipation;
        self
    }

    pub fn with_curl(mut self, curl: f32, dt: f32) -> Self {
        self.curl = curl;
        self.dt = dt;
        self
    }

    pub fn with_value(mut self, value: f32) -> Self {
        self.value = value;
        self
    }

    pub fn with_display(mut self, back_color: Rgb, transparent: bool, premultiply: bool) -> Self {
        self.color = [back_color[0], back_color[1], back_color[2], 0.0];
        self.transparent = if transparent { 1.0 } else { 0.0 };
        self.premultiply = if premultiply { 1.0 } else { 0.0 };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_matches_std140_size() {
        assert_eq!(std::mem::size_of::<PassUniforms>(), 80);
        assert_eq!(std::mem::size_of::<PassUniforms>() % 16, 0);
    }

    #[test]
    fn color_lands_on_vec4_boundary() {
        let uniforms = PassUniforms::for_grid(GridSize::new(4, 2)).with_color([0.1, 0.2, 0.3]);
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&uniforms));
        assert_eq!(&floats[0..2], &[0.25, 0.5]);
        assert_eq!(&floats[4..8], &[0.1, 0.2, 0.3, 1.0]);
    }

    #[test]
    fn display_flags_transparency() {
        let uniforms = PassUniforms::default().with_display([0.0, 0.0, 0.0], true, false);
        assert_eq!(uniforms.transparent, 1.0);
        assert_eq!(uniforms.premultiply, 0.0);
    }

    #[test]
    fn premultiply_flag_follows_transparency_flag() {
        let uniforms = PassUniforms::default().with_display([0.1, 0.1, 0.1], true, true);
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&uniforms));
        assert_eq!(&floats[16..18], &[1.0, 1.0]);
    }
}
