//! Integer point type shared by seeds and pixels.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// 2D integer position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Per-axis difference `self - other`, widened so it cannot overflow
    pub(crate) fn delta(&self, other: &Point) -> (f64, f64) {
        (
            self.x as f64 - other.x as f64,
            self.y as f64 - other.y as f64,
        )
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Generate `count` seeds uniformly inside `[0, width) × [0, height)`.
///
/// Uses ChaCha8 so the same `rng_seed` yields the same points on every
/// platform.
pub fn random_seeds(count: usize, width: u32, height: u32, rng_seed: u64) -> Vec<Point> {
    let mut rng = ChaCha8Rng::seed_from_u64(rng_seed);
    let max_x = width.clamp(1, i32::MAX as u32) as i32;
    let max_y = height.clamp(1, i32::MAX as u32) as i32;
    (0..count)
        .map(|_| Point::new(rng.gen_range(0..max_x), rng.gen_range(0..max_y)))
        .collect()
}
