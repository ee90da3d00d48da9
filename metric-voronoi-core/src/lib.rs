//! Core Voronoi rasterization library.
//!
//! Colours every pixel of a `width`×`height` plane by the seed that minimizes
//! a pluggable distance [`Metric`]. Classification is brute force over all
//! seeds; the row range is split into bands that are classified in parallel
//! with Rayon.

mod cpu;
mod metric;
mod palette;
mod point;
mod raster;

pub use cpu::{band_ranges, nearest_seed, rasterize, Rasterizer};
pub use metric::{
    build_metric, Canberra, Euclidean, Hamming, Mahalanobis, Manhattan, Maximum, Metric,
    MetricKind, Minimum, Minkowski,
};
pub use palette::random_palette;
pub use point::{random_seeds, Point};
pub use raster::Raster;

/// RGB color tuple
pub type Rgb = [u8; 3];

/// Error type for Voronoi operations
#[derive(Debug, thiserror::Error)]
pub enum VoronoiError {
    #[error("No seeds provided")]
    NoSeeds,

    #[error("Degenerate seed distribution: covariance determinant is {determinant}")]
    DegenerateDistribution { determinant: f64 },

    #[error("Undefined metric parameter: {name} = {value}")]
    UndefinedParameter { name: &'static str, value: f64 },

    #[error("Palette has {colors} colors but the raster needs {required}")]
    PaletteTooSmall { colors: usize, required: usize },

    #[error("Invalid metric: {0}")]
    InvalidMetric(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, VoronoiError>;
