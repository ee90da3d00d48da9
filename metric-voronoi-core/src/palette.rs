//! Seed colours.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::Rgb;

/// One random colour per seed, reproducible for a given `rng_seed`.
///
/// Channels stay in `64..=255` so black seed markers remain visible on
/// every cell.
pub fn random_palette(count: usize, rng_seed: u64) -> Vec<Rgb> {
    let mut rng = ChaCha8Rng::seed_from_u64(rng_seed);
    (0..count)
        .map(|_| {
            [
                rng.gen_range(64..=255),
                rng.gen_range(64..=255),
                rng.gen_range(64..=255),
            ]
        })
        .collect()
}
