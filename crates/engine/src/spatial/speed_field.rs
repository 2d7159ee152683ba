use glam::Vec2;

/// Terrain movement multipliers on a regular grid over the map plane.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedField {
    origin: Vec2,
    cell_size: f32,
    width: usize,
    height: usize,
    values: Vec<f32>,
}

#[derive(Debug, Clone, Copy)]
pub struct HeightmapParams {
    pub origin: Vec2,
    pub cell_size: f32,
    /// Multiplier lost per unit of rise over one cell.
    pub slope_penalty: f32,
    /// Heights below this are water and get the floor multiplier.
    pub sea_level: f32,
}

impl Default for HeightmapParams {
    fn default() -> Self {
        Self {
            origin: Vec2::ZERO,
            cell_size: 1.0,
            slope_penalty: 0.5,
            sea_level: f32::NEG_INFINITY,
        }
    }
}

impl SpeedField {
    /// Lowest multiplier any cell can hold, so units never stall completely.
    pub const MIN_MULTIPLIER: f32 = 0.05;

    /// A single-cell field that never slows anyone down.
    pub fn uniform() -> Self {
        Self {
            origin: Vec2::ZERO,
            cell_size: 1.0,
            width: 1,
            height: 1,
            values: vec![1.0],
        }
    }

    /// Derives multipliers from a row-major heightmap using the steepest
    /// neighbouring slope of each cell.
    pub fn from_heightmap(
        heights: &[f32],
        width: usize,
        height: usize,
        params: HeightmapParams,
    ) -> Option<Self> {
        if width == 0 || height == 0 || heights.len() != width * height {
            return None;
        }
        let cell_size = if params.cell_size > 0.0 {
            params.cell_size
        } else {
            1.0
        };
        let at = |x: usize, y: usize| heights[y * width + x];

        let mut values = Vec::with_capacity(heights.len());
        for y in 0..height {
            for x in 0..width {
                let here = at(x, y);
                if here < params.sea_level {
                    values.push(Self::MIN_MULTIPLIER);
                    continue;
                }
                let mut steepest = 0.0f32;
                for (nx, ny) in neighbours(x, y, width, height) {
                    steepest = steepest.max((at(nx, ny) - here).abs() / cell_size);
                }
                values.push(clamp_multiplier(1.0 - steepest * params.slope_penalty));
            }
        }

        Some(Self {
            origin: params.origin,
            cell_size,
            width,
            height,
            values,
        })
    }

    /// Multiplier of the cell under `position`; positions off the grid use the
    /// nearest edge cell.
    pub fn sample(&self, position: Vec2) -> f32 {
        let local = (position - self.origin) / self.cell_size;
        let x = (local.x.floor().max(0.0) as usize).min(self.width - 1);
        let y = (local.y.floor().max(0.0) as usize).min(self.height - 1);
        self.values[y * self.width + x]
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

impl Default for SpeedField {
    fn default() -> Self {
        Self::uniform()
    }
}

fn clamp_multiplier(value: f32) -> f32 {
    if value.is_nan() {
        return SpeedField::MIN_MULTIPLIER;
    }
    value.clamp(SpeedField::MIN_MULTIPLIER, 1.0)
}

fn neighbours(
    x: usize,
    y: usize,
    width: usize,
    height: usize,
) -> impl Iterator<Item = (usize, usize)> {
    let left = x.checked_sub(1).map(|nx| (nx, y));
    let right = (x + 1 < width).then_some((x + 1, y));
    let down = y.checked_sub(1).map(|ny| (x, ny));
    let up = (y + 1 < height).then_some((x, y + 1));
    [left, right, down, up].into_iter().flatten()
}
