//! CPU rasterization using Rayon for parallelism.
//!
//! The row range is cut into contiguous bands, one per worker, and each band
//! gets its own disjoint `&mut` slice of the raster buffer.

use std::ops::Range;
use std::sync::{Arc, OnceLock};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{Metric, Point, Raster, Result, VoronoiError};

/// Index of the seed nearest to `pixel` under `metric`.
///
/// Seeds are scanned in order and only a strictly smaller distance replaces
/// the current best, so among equally distant seeds the lowest index wins.
#[inline]
pub fn nearest_seed<M: Metric + ?Sized>(pixel: Point, seeds: &[Point], metric: &M) -> usize {
    let mut min_dist = f64::INFINITY;
    let mut nearest = 0usize;
    for (i, &seed) in seeds.iter().enumerate() {
        let dist = metric.distance(seed, pixel);
        if dist < min_dist {
            min_dist = dist;
            nearest = i;
        }
    }
    nearest
}

/// Rows per band for `height` rows split over `workers` workers
fn band_rows(height: u32, workers: usize) -> u32 {
    let workers = workers.clamp(1, u32::MAX as usize) as u32;
    (height / workers).max(1)
}

/// Row ranges of the bands used for `height` rows and `workers` workers.
///
/// Bands are `height / workers` rows tall (at least one), so there are
/// `ceil(height / band_rows)` of them and only the last may be shorter.
pub fn band_ranges(height: u32, workers: usize) -> Vec<Range<u32>> {
    let rows = band_rows(height, workers);
    (0..height)
        .step_by(rows as usize)
        .map(|start| start..start.saturating_add(rows).min(height))
        .collect()
}

/// CPU rasterizer using Rayon for parallel band classification
#[derive(Debug, Clone, Default)]
pub struct Rasterizer {
    /// Number of worker threads (0 = Rayon default)
    num_threads: usize,
    /// Dedicated pool for an explicit thread count, built on first use
    pool: OnceLock<Arc<ThreadPool>>,
}

impl Rasterizer {
    pub fn new() -> Self {
        Self::with_threads(0)
    }

    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads,
            pool: OnceLock::new(),
        }
    }

    /// Worker count the band layout is derived from
    pub fn workers(&self) -> usize {
        if self.num_threads == 0 {
            rayon::current_num_threads().max(1)
        } else {
            self.num_threads
        }
    }

    fn pool(&self) -> Result<&ThreadPool> {
        if let Some(pool) = self.pool.get() {
            return Ok(pool);
        }
        let built = ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .build()
            .map_err(|e| VoronoiError::ThreadPool(e.to_string()))?;
        Ok(self.pool.get_or_init(|| Arc::new(built)))
    }

    /// Assign every pixel of a `width`×`height` raster to its nearest seed.
    ///
    /// Returns only once every band has been written; no partially filled
    /// raster is ever visible.
    pub fn rasterize<M: Metric + ?Sized>(
        &self,
        width: u32,
        height: u32,
        seeds: &[Point],
        metric: &M,
    ) -> Result<Raster> {
        if seeds.is_empty() {
            return Err(VoronoiError::NoSeeds);
        }
        if width == 0 || height == 0 {
            return Ok(Raster::new(Vec::new(), width, height));
        }

        if self.num_threads == 0 {
            return Ok(self.rasterize_bands(width, height, seeds, metric));
        }
        let pool = self.pool()?;
        Ok(pool.install(|| self.rasterize_bands(width, height, seeds, metric)))
    }

    fn rasterize_bands<M: Metric + ?Sized>(
        &self,
        width: u32,
        height: u32,
        seeds: &[Point],
        metric: &M,
    ) -> Raster {
        let row_len = width as usize;
        let mut cells = vec![0u32; row_len * height as usize];
        let bands = band_ranges(height, self.workers());

        log::debug!(
            "rasterizing {}x{} with {} seeds under {}: {} bands of {} rows",
            width,
            height,
            seeds.len(),
            metric.name(),
            bands.len(),
            bands[0].len(),
        );

        // Cut the buffer along the band boundaries into disjoint slices
        let mut rest: &mut [u32] = &mut cells;
        let mut jobs = Vec::with_capacity(bands.len());
        for rows in bands {
            let (band, tail) = std::mem::take(&mut rest).split_at_mut(rows.len() * row_len);
            jobs.push((rows, band));
            rest = tail;
        }
        debug_assert!(rest.is_empty());

        // One task per band; for_each joins all of them before returning
        jobs.into_par_iter().for_each(|(rows, out)| {
            for (i, cell) in out.iter_mut().enumerate() {
                let x = (i % row_len) as i32;
                let y = (rows.start + (i / row_len) as u32) as i32;
                *cell = nearest_seed(Point::new(x, y), seeds, metric) as u32;
            }
        });

        Raster::new(cells, width, height)
    }
}

/// Rasterize with the default (Rayon pool sized) rasterizer
pub fn rasterize<M: Metric + ?Sized>(
    width: u32,
    height: u32,
    seeds: &[Point],
    metric: &M,
) -> Result<Raster> {
    Rasterizer::new().rasterize(width, height, seeds, metric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_metric, Euclidean, Manhattan, Maximum, MetricKind};

    fn line_seeds() -> Vec<Point> {
        vec![Point::new(0, 0), Point::new(3, 0)]
    }

    #[test]
    fn test_manhattan_scenario() {
        let raster = rasterize(4, 1, &line_seeds(), &Manhattan).unwrap();
        assert_eq!(raster.cells(), &[0, 0, 1, 1]);
    }

    #[test]
    fn test_maximum_matches_manhattan_on_a_line() {
        let manhattan = rasterize(4, 1, &line_seeds(), &Manhattan).unwrap();
        let maximum = rasterize(4, 1, &line_seeds(), &Maximum).unwrap();
        assert_eq!(maximum.cells(), &[0, 0, 1, 1]);
        assert_eq!(manhattan, maximum);
    }

    #[test]
    fn test_tie_break_prefers_lower_index() {
        // (1, 0) is equidistant from both seeds under every symmetric metric
        let seeds = [Point::new(0, 0), Point::new(2, 0)];
        assert_eq!(nearest_seed(Point::new(1, 0), &seeds, &Euclidean), 0);
        let swapped = [Point::new(2, 0), Point::new(0, 0)];
        assert_eq!(nearest_seed(Point::new(1, 0), &swapped, &Euclidean), 0);
    }

    #[test]
    fn test_duplicate_seed_always_first() {
        let seeds = [Point::new(0, 0), Point::new(0, 0)];
        for kind in MetricKind::all() {
            if kind == MetricKind::Mahalanobis {
                continue; // degenerate for a single location
            }
            let metric = build_metric(&kind, &seeds).unwrap();
            let raster = rasterize(7, 5, &seeds, &metric).unwrap();
            assert!(
                raster.cells().iter().all(|&c| c == 0),
                "{} assigned a pixel to the duplicate",
                kind
            );
        }
    }

    #[test]
    fn test_minimum_prefers_far_seed() {
        let seeds = [Point::new(0, 0), Point::new(10, 0)];
        let metric = build_metric(&"minimum:manhattan".parse().unwrap(), &seeds).unwrap();
        // Near seed 0 (but not on it) seed 1 looks closer
        assert_eq!(nearest_seed(Point::new(1, 0), &seeds, &metric), 1);
        // Exactly on a seed the inner distance is 0, which wins outright
        assert_eq!(nearest_seed(Point::new(10, 0), &seeds, &metric), 1);
        assert_eq!(nearest_seed(Point::new(0, 0), &seeds, &metric), 0);
    }

    #[test]
    fn test_nan_distances_fall_back_to_first_seed() {
        struct Nan;
        impl Metric for Nan {
            fn distance(&self, _: Point, _: Point) -> f64 {
                f64::NAN
            }
            fn name(&self) -> String {
                "NaN".into()
            }
        }
        let seeds = [Point::new(0, 0), Point::new(1, 1)];
        assert_eq!(nearest_seed(Point::new(1, 1), &seeds, &Nan), 0);
    }

    #[test]
    fn test_band_ranges_partition_rows() {
        for height in [1u32, 2, 7, 10, 97, 480] {
            for workers in [1usize, 2, 3, 4, 8, 16, 1000] {
                let bands = band_ranges(height, workers);
                let rows = (height / workers as u32).max(1);
                assert_eq!(bands.len() as u32, height.div_ceil(rows));
                assert_eq!(bands[0].start, 0);
                assert_eq!(bands.last().unwrap().end, height);
                for pair in bands.windows(2) {
                    assert_eq!(pair[0].end, pair[1].start, "gap or overlap");
                }
                // Only the last band may be shorter
                for band in &bands[..bands.len() - 1] {
                    assert_eq!(band.len() as u32, rows);
                }
            }
        }
    }

    #[test]
    fn test_band_ranges_uneven_split() {
        assert_eq!(band_ranges(10, 4), vec![0..2, 2..4, 4..6, 6..8, 8..10]);
        assert_eq!(band_ranges(10, 3), vec![0..3, 3..6, 6..9, 9..10]);
        assert_eq!(band_ranges(3, 8), vec![0..1, 1..2, 2..3]);
        assert!(band_ranges(0, 4).is_empty());
    }

    #[test]
    fn test_worker_count_does_not_change_output() {
        let seeds = crate::random_seeds(25, 61, 37, 9);
        let reference = Rasterizer::with_threads(1)
            .rasterize(61, 37, &seeds, &Euclidean)
            .unwrap();
        for threads in [2, 3, 5, 8, 64] {
            let raster = Rasterizer::with_threads(threads)
                .rasterize(61, 37, &seeds, &Euclidean)
                .unwrap();
            assert_eq!(raster, reference, "{} threads differ", threads);
        }
    }

    #[test]
    fn test_every_pixel_matches_sequential_classification() {
        let seeds = crate::random_seeds(12, 33, 21, 3);
        let raster = rasterize(33, 21, &seeds, &Manhattan).unwrap();
        assert_eq!(raster.cells().len(), 33 * 21);
        for y in 0..21 {
            for x in 0..33 {
                let expected = nearest_seed(Point::new(x, y), &seeds, &Manhattan) as u32;
                assert_eq!(raster.get(x as u32, y as u32), Some(expected));
            }
        }
    }

    #[test]
    fn test_thread_pool_is_reused() {
        let rasterizer = Rasterizer::with_threads(3);
        let seeds = line_seeds();
        let first = rasterizer.rasterize(8, 6, &seeds, &Euclidean).unwrap();
        let pool = Arc::clone(rasterizer.pool.get().expect("pool built on first call"));
        assert_eq!(pool.current_num_threads(), 3);

        let second = rasterizer.rasterize(8, 6, &seeds, &Manhattan).unwrap();
        assert!(Arc::ptr_eq(&pool, rasterizer.pool.get().unwrap()));
        assert_eq!(first.cells().len(), second.cells().len());

        // The default rasterizer never builds a dedicated pool
        let shared = Rasterizer::new();
        shared.rasterize(8, 6, &seeds, &Euclidean).unwrap();
        assert!(shared.pool.get().is_none());
    }

    #[test]
    fn test_more_bands_than_workers() {
        // 10 rows over 4 workers: 5 bands of 2 rows, each written once
        let seeds = crate::random_seeds(6, 9, 10, 11);
        assert_eq!(band_ranges(10, 4).len(), 5);
        let raster = Rasterizer::with_threads(4)
            .rasterize(9, 10, &seeds, &Manhattan)
            .unwrap();
        for y in 0..10 {
            for x in 0..9 {
                let expected = nearest_seed(Point::new(x, y), &seeds, &Manhattan) as u32;
                assert_eq!(raster.get(x as u32, y as u32), Some(expected), "({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_last_band_shorter() {
        // 7 rows over 3 workers: bands 0..2, 2..4, 4..6, 6..7
        let seeds = [Point::new(0, 0), Point::new(4, 6)];
        let raster = Rasterizer::with_threads(3)
            .rasterize(5, 7, &seeds, &Euclidean)
            .unwrap();
        assert_eq!(raster.get(4, 6), Some(1));
        assert_eq!(raster.get(0, 6), Some(1));
        assert_eq!(raster.get(0, 0), Some(0));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(matches!(
            rasterize(4, 4, &[], &Euclidean),
            Err(VoronoiError::NoSeeds)
        ));
        let raster = rasterize(0, 5, &line_seeds(), &Euclidean).unwrap();
        assert!(raster.cells().is_empty());
        assert_eq!((raster.width(), raster.height()), (0, 5));
    }
}
