use crate::types::{ChannelLayout, FilterStrategy, GridSize};

/// Two equally shaped buffers where one is read while the other is written.
///
/// Passes borrow the halves through [`PingPong::split`], so a pass can never
/// read and write the same buffer.
#[derive(Debug)]
pub struct PingPong<T> {
    read: T,
    write: T,
}

impl<T> PingPong<T> {
    pub fn new(read: T, write: T) -> Self {
        Self { read, write }
    }

    pub fn read(&self) -> &T {
        &self.read
    }

    pub fn read_mut(&mut self) -> &mut T {
        &mut self.read
    }

    pub fn write(&self) -> &T {
        &self.write
    }

    /// Borrows the read half immutably and the write half mutably.
    pub fn split(&mut self) -> (&T, &mut T) {
        (&self.read, &mut self.write)
    }

    /// Exchanges the halves after a pass has written its output.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.read, &mut self.write);
    }
}

/// CPU-resident simulation field laid out row-major, top row first.
///
/// Every cell stores four components; channels beyond the field's layout are
/// discarded on write so a two-channel field behaves like an RG texture.
#[derive(Clone, Debug, PartialEq)]
pub struct GridField {
    size: GridSize,
    layout: ChannelLayout,
    cells: Vec<[f32; 4]>,
}

impl GridField {
    pub fn zeroed(size: GridSize, layout: ChannelLayout) -> Self {
        Self {
            size,
            layout,
            cells: vec![[0.0; 4]; size.cell_count()],
        }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn texel_size(&self) -> [f32; 2] {
        self.size.texel_size()
    }

    pub fn cells(&self) -> &[[f32; 4]] {
        &self.cells
    }

    pub fn is_zero(&self) -> bool {
        self.cells.iter().all(|cell| cell.iter().all(|v| *v == 0.0))
    }

    pub fn get(&self, x: u32, y: u32) -> [f32; 4] {
        self.cells[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: [f32; 4]) {
        let index = self.index(x, y);
        self.cells[index] = self.mask(value);
    }

    pub fn fill(&mut self, value: [f32; 4]) {
        let value = self.mask(value);
        self.cells.iter_mut().for_each(|cell| *cell = value);
    }

    /// Centre of cell `(x, y)` in texture coordinates.
    pub fn cell_center(&self, x: u32, y: u32) -> [f32; 2] {
        [
            (x as f32 + 0.5) / self.size.width as f32,
            (y as f32 + 0.5) / self.size.height as f32,
        ]
    }

    /// Point sample with clamp-to-edge addressing.
    pub fn fetch(&self, x: i64, y: i64) -> [f32; 4] {
        let cx = x.clamp(0, self.size.width as i64 - 1) as u32;
        let cy = y.clamp(0, self.size.height as i64 - 1) as u32;
        self.get(cx, cy)
    }

    /// Nearest-texel lookup at a texture coordinate.
    pub fn sample_nearest(&self, uv: [f32; 2]) -> [f32; 4] {
        let x = (uv[0] * self.size.width as f32).floor() as i64;
        let y = (uv[1] * self.size.height as f32).floor() as i64;
        self.fetch(x, y)
    }

    /// Bilinear lookup matching a linear sampler with clamp-to-edge addressing.
    pub fn sample_linear(&self, uv: [f32; 2]) -> [f32; 4] {
        let st = [
            uv[0] * self.size.width as f32 - 0.5,
            uv[1] * self.size.height as f32 - 0.5,
        ];
        let base = [st[0].floor(), st[1].floor()];
        let frac = [st[0] - base[0], st[1] - base[1]];
        let (x, y) = (base[0] as i64, base[1] as i64);

        let a = self.fetch(x, y);
        let b = self.fetch(x + 1, y);
        let c = self.fetch(x, y + 1);
        let d = self.fetch(x + 1, y + 1);

        let mut out = [0.0; 4];
        for i in 0..4 {
            let top = a[i] + (b[i] - a[i]) * frac[0];
            let bottom = c[i] + (d[i] - c[i]) * frac[0];
            out[i] = top + (bottom - top) * frac[1];
        }
        out
    }

    /// Four point samples mixed by hand, as the manual filtering shader path does.
    pub fn sample_bilerp(&self, uv: [f32; 2]) -> [f32; 4] {
        let texel = self.texel_size();
        let st = [uv[0] / texel[0] - 0.5, uv[1] / texel[1] - 0.5];
        let iuv = [st[0].floor(), st[1].floor()];
        let fuv = [st[0] - iuv[0], st[1] - iuv[1]];
        let tap = |ox: f32, oy: f32| {
            self.sample_nearest([(iuv[0] + ox) * texel[0], (iuv[1] + oy) * texel[1]])
        };

        let a = tap(0.5, 0.5);
        let b = tap(1.5, 0.5);
        let c = tap(0.5, 1.5);
        let d = tap(1.5, 1.5);

        let mut out = [0.0; 4];
        for i in 0..4 {
            let top = a[i] + (b[i] - a[i]) * fuv[0];
            let bottom = c[i] + (d[i] - c[i]) * fuv[0];
            out[i] = top + (bottom - top) * fuv[1];
        }
        out
    }

    /// Interpolated lookup using the requested strategy.
    pub fn sample(&self, uv: [f32; 2], filter: FilterStrategy) -> [f32; 4] {
        match filter {
            FilterStrategy::Hardware => self.sample_linear(uv),
            FilterStrategy::Manual => self.sample_bilerp(uv),
        }
    }

    /// Root-mean-square magnitude of the first channel.
    pub fn rms(&self) -> f32 {
        if self.cells.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.cells.iter().map(|c| (c[0] as f64).powi(2)).sum();
        (sum / self.cells.len() as f64).sqrt() as f32
    }

    /// Evaluates `fragment` at every cell centre and stores the result.
    pub(crate) fn render(&mut self, mut fragment: impl FnMut([f32; 2]) -> [f32; 4]) {
        let GridSize { width, height } = self.size;
        for y in 0..height {
            for x in 0..width {
                let uv = self.cell_center(x, y);
                let value = fragment(uv);
                self.set(x, y, value);
            }
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.size.width as usize + x as usize
    }

    fn mask(&self, mut value: [f32; 4]) -> [f32; 4] {
        for slot in value.iter_mut().skip(self.layout.channels()) {
            *slot = 0.0;
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(size: GridSize) -> GridField {
        let mut field = GridField::zeroed(size, ChannelLayout::R);
        field.render(|uv| [uv[0] * 10.0, 0.0, 0.0, 0.0]);
        field
    }

    #[test]
    fn ping_pong_swaps_halves() {
        let mut pair = PingPong::new(1, 2);
        {
            let (read, write) = pair.split();
            *write = *read + 10;
        }
        pair.swap();
        assert_eq!(*pair.read(), 11);
        assert_eq!(*pair.write(), 1);
    }

    #[test]
    fn writes_mask_unused_channels() {
        let mut field = GridField::zeroed(GridSize::new(2, 2), ChannelLayout::Rg);
        field.set(1, 1, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(field.get(1, 1), [1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn fetch_clamps_to_edges() {
        let field = ramp(GridSize::new(4, 1));
        assert_eq!(field.fetch(-3, 0), field.get(0, 0));
        assert_eq!(field.fetch(9, 5), field.get(3, 0));
    }

    #[test]
    fn linear_sample_at_centre_matches_texel() {
        let field = ramp(GridSize::new(8, 4));
        let uv = field.cell_center(3, 2);
        assert_eq!(field.sample_linear(uv), field.get(3, 2));
    }

    #[test]
    fn manual_bilerp_agrees_with_linear() {
        let field = ramp(GridSize::new(16, 8));
        for uv in [[0.31, 0.42], [0.02, 0.9], [0.77, 0.5]] {
            let a = field.sample_linear(uv)[0];
            let b = field.sample_bilerp(uv)[0];
            assert!((a - b).abs() < 1e-4, "{uv:?}: {a} vs {b}");
        }
    }

    #[test]
    fn linear_sample_interpolates_between_centres() {
        let field = ramp(GridSize::new(4, 1));
        let left = field.get(1, 0)[0];
        let right = field.get(2, 0)[0];
        let mid = field.sample_linear([0.5, 0.5])[0];
        assert!((mid - 0.5 * (left + right)).abs() < 1e-5);
    }
}
