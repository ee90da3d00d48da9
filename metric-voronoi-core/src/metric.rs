//! Distance metrics used for nearest-seed classification.
//!
//! A metric here only has to rank seeds: it returns a non-negative real for
//! each pair of points, but it is not required to satisfy the metric axioms
//! ([`Minimum`] deliberately inverts proximity).

use std::fmt;
use std::str::FromStr;

use crate::{Point, Result, VoronoiError};

/// Distance function between two points
pub trait Metric: Send + Sync {
    /// Distance from `a` to `b`
    fn distance(&self, a: Point, b: Point) -> f64;

    /// Stable display name, used to label output
    fn name(&self) -> String;
}

impl<M: Metric + ?Sized> Metric for Box<M> {
    fn distance(&self, a: Point, b: Point) -> f64 {
        (**self).distance(a, b)
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

/// Squared Euclidean distance. Preserves the ordering of the true distance
/// without the square root.
#[derive(Debug, Clone, Copy, Default)]
pub struct Euclidean;

impl Metric for Euclidean {
    fn distance(&self, a: Point, b: Point) -> f64 {
        let (dx, dy) = a.delta(&b);
        dx * dx + dy * dy
    }

    fn name(&self) -> String {
        "Euclidean".into()
    }
}

/// L1 / taxicab distance
#[derive(Debug, Clone, Copy, Default)]
pub struct Manhattan;

impl Metric for Manhattan {
    fn distance(&self, a: Point, b: Point) -> f64 {
        let (dx, dy) = a.delta(&b);
        dx.abs() + dy.abs()
    }

    fn name(&self) -> String {
        "Manhattan".into()
    }
}

/// Chebyshev distance
#[derive(Debug, Clone, Copy, Default)]
pub struct Maximum;

impl Metric for Maximum {
    fn distance(&self, a: Point, b: Point) -> f64 {
        let (dx, dy) = a.delta(&b);
        dx.abs().max(dy.abs())
    }

    fn name(&self) -> String {
        "Maximum".into()
    }
}

/// Lp distance `(|dx|^p + |dy|^p)^(1/p)`
#[derive(Debug, Clone, Copy)]
pub struct Minkowski {
    p: f64,
}

impl Minkowski {
    /// Fails with [`VoronoiError::UndefinedParameter`] unless `p` is finite
    /// and strictly positive.
    pub fn new(p: f64) -> Result<Self> {
        if !p.is_finite() || p <= 0.0 {
            return Err(VoronoiError::UndefinedParameter { name: "p", value: p });
        }
        Ok(Self { p })
    }

    pub fn p(&self) -> f64 {
        self.p
    }
}

impl Metric for Minkowski {
    fn distance(&self, a: Point, b: Point) -> f64 {
        let (dx, dy) = a.delta(&b);
        let (dx, dy) = (dx.abs(), dy.abs());
        // Scale by the larger axis so |d|^p cannot overflow for large p
        let m = dx.max(dy);
        if m == 0.0 {
            return 0.0;
        }
        m * ((dx / m).powf(self.p) + (dy / m).powf(self.p)).powf(1.0 / self.p)
    }

    fn name(&self) -> String {
        format!("Minkowski(p={})", self.p)
    }
}

/// Reciprocal of an inner metric: far seeds look close and close seeds look
/// far. A zero inner distance stays zero.
pub struct Minimum {
    inner: Box<dyn Metric>,
}

impl Minimum {
    pub fn new(inner: Box<dyn Metric>) -> Self {
        Self { inner }
    }
}

impl fmt::Debug for Minimum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Minimum")
            .field("inner", &self.inner.name())
            .finish()
    }
}

impl Metric for Minimum {
    fn distance(&self, a: Point, b: Point) -> f64 {
        let d = self.inner.distance(a, b);
        if d == 0.0 {
            0.0
        } else {
            1.0 / d
        }
    }

    fn name(&self) -> String {
        format!("Minimum({})", self.inner.name())
    }
}

/// Mahalanobis distance against the covariance of a fixed seed set.
#[derive(Debug, Clone, Copy)]
pub struct Mahalanobis {
    covariance: [[f64; 2]; 2],
    inverse: [[f64; 2]; 2],
}

impl Mahalanobis {
    /// Derive the inverse covariance matrix from `seeds` (population
    /// statistics).
    ///
    /// Fails with [`VoronoiError::DegenerateDistribution`] when the
    /// covariance is singular, i.e. when every seed lies on one line.
    pub fn new(seeds: &[Point]) -> Result<Self> {
        if seeds.is_empty() {
            return Err(VoronoiError::NoSeeds);
        }

        let n = seeds.len() as f64;
        let mean_x = seeds.iter().map(|p| p.x as f64).sum::<f64>() / n;
        let mean_y = seeds.iter().map(|p| p.y as f64).sum::<f64>() / n;

        let (mut var_x, mut var_y, mut cov) = (0.0, 0.0, 0.0);
        for p in seeds {
            let dx = p.x as f64 - mean_x;
            let dy = p.y as f64 - mean_y;
            var_x += dx * dx;
            var_y += dy * dy;
            cov += dx * dy;
        }
        var_x /= n;
        var_y /= n;
        cov /= n;

        let det = var_x * var_y - cov * cov;
        if collinear(seeds) || det == 0.0 {
            return Err(VoronoiError::DegenerateDistribution { determinant: 0.0 });
        }

        Ok(Self {
            covariance: [[var_x, cov], [cov, var_y]],
            inverse: [[var_y / det, -cov / det], [-cov / det, var_x / det]],
        })
    }

    pub fn covariance(&self) -> [[f64; 2]; 2] {
        self.covariance
    }

    pub fn inverse_covariance(&self) -> [[f64; 2]; 2] {
        self.inverse
    }
}

/// Exact test whether all points lie on a single line (or coincide).
/// Cross products of i32 differences fit comfortably in i128.
fn collinear(points: &[Point]) -> bool {
    let origin = points[0];
    let Some(dir) = points.iter().find(|p| **p != origin) else {
        return true;
    };
    let (ux, uy) = (dir.x as i128 - origin.x as i128, dir.y as i128 - origin.y as i128);
    points.iter().all(|p| {
        let (vx, vy) = (p.x as i128 - origin.x as i128, p.y as i128 - origin.y as i128);
        ux * vy - uy * vx == 0
    })
}

impl Metric for Mahalanobis {
    fn distance(&self, a: Point, b: Point) -> f64 {
        let (dx, dy) = a.delta(&b);
        let m = &self.inverse;
        let q = m[0][0] * dx * dx + (m[0][1] + m[1][0]) * dx * dy + m[1][1] * dy * dy;
        // Rounding can push q a hair below zero for near-null d
        q.max(0.0).sqrt()
    }

    fn name(&self) -> String {
        "Mahalanobis".into()
    }
}

/// Number of axes on which two points differ (0, 1 or 2)
#[derive(Debug, Clone, Copy, Default)]
pub struct Hamming;

impl Metric for Hamming {
    fn distance(&self, a: Point, b: Point) -> f64 {
        ((a.x != b.x) as u8 + (a.y != b.y) as u8) as f64
    }

    fn name(&self) -> String {
        "Hamming".into()
    }
}

/// Canberra distance, a per-axis relative difference
#[derive(Debug, Clone, Copy, Default)]
pub struct Canberra;

impl Canberra {
    fn term(u: i32, v: i32) -> f64 {
        let denom = (u as f64).abs() + (v as f64).abs();
        if denom == 0.0 {
            0.0
        } else {
            (u as f64 - v as f64).abs() / denom
        }
    }
}

impl Metric for Canberra {
    fn distance(&self, a: Point, b: Point) -> f64 {
        Self::term(a.x, b.x) + Self::term(a.y, b.y)
    }

    fn name(&self) -> String {
        "Canberra".into()
    }
}

/// Description of a metric, independent of any seed set.
///
/// Parsed from `euclidean`, `manhattan`, `maximum`, `minkowski:<p>`,
/// `minimum:<inner>`, `mahalanobis`, `hamming` or `canberra`.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricKind {
    Euclidean,
    Manhattan,
    Maximum,
    Minkowski(f64),
    Minimum(Box<MetricKind>),
    Mahalanobis,
    Hamming,
    Canberra,
}

impl MetricKind {
    /// The default comparison set, one of each variant
    pub fn all() -> Vec<MetricKind> {
        vec![
            MetricKind::Euclidean,
            MetricKind::Manhattan,
            MetricKind::Maximum,
            MetricKind::Minkowski(3.0),
            MetricKind::Minimum(Box::new(MetricKind::Euclidean)),
            MetricKind::Mahalanobis,
            MetricKind::Hamming,
            MetricKind::Canberra,
        ]
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Euclidean => write!(f, "euclidean"),
            MetricKind::Manhattan => write!(f, "manhattan"),
            MetricKind::Maximum => write!(f, "maximum"),
            MetricKind::Minkowski(p) => write!(f, "minkowski:{}", p),
            MetricKind::Minimum(inner) => write!(f, "minimum:{}", inner),
            MetricKind::Mahalanobis => write!(f, "mahalanobis"),
            MetricKind::Hamming => write!(f, "hamming"),
            MetricKind::Canberra => write!(f, "canberra"),
        }
    }
}

impl FromStr for MetricKind {
    type Err = VoronoiError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        let (head, arg) = match s.split_once(':') {
            Some((head, arg)) => (head, Some(arg)),
            None => (s.as_str(), None),
        };

        let kind = match (head, arg) {
            ("euclidean" | "l2", None) => MetricKind::Euclidean,
            ("manhattan" | "taxicab" | "l1", None) => MetricKind::Manhattan,
            ("maximum" | "chebyshev", None) => MetricKind::Maximum,
            ("mahalanobis", None) => MetricKind::Mahalanobis,
            ("hamming", None) => MetricKind::Hamming,
            ("canberra", None) => MetricKind::Canberra,
            ("minkowski", Some(p)) => {
                let p = p.trim().parse::<f64>().map_err(|_| {
                    VoronoiError::InvalidMetric(format!("bad minkowski exponent '{}'", p))
                })?;
                MetricKind::Minkowski(p)
            }
            ("minimum", Some(inner)) => MetricKind::Minimum(Box::new(inner.parse()?)),
            ("minkowski", None) => {
                return Err(VoronoiError::InvalidMetric(
                    "minkowski needs an exponent, e.g. minkowski:3".into(),
                ))
            }
            ("minimum", None) => {
                return Err(VoronoiError::InvalidMetric(
                    "minimum needs an inner metric, e.g. minimum:euclidean".into(),
                ))
            }
            _ => {
                return Err(VoronoiError::InvalidMetric(format!(
                    "unknown metric '{}' (expected euclidean | manhattan | maximum | \
                     minkowski:<p> | minimum:<metric> | mahalanobis | hamming | canberra)",
                    s
                )))
            }
        };
        Ok(kind)
    }
}

/// Build a ready-to-use metric for `seeds`.
///
/// Stateful variants derive their state here, so every construction error
/// surfaces before rasterization starts.
pub fn build_metric(kind: &MetricKind, seeds: &[Point]) -> Result<Box<dyn Metric>> {
    let metric: Box<dyn Metric> = match kind {
        MetricKind::Euclidean => Box::new(Euclidean),
        MetricKind::Manhattan => Box::new(Manhattan),
        MetricKind::Maximum => Box::new(Maximum),
        MetricKind::Minkowski(p) => Box::new(Minkowski::new(*p)?),
        MetricKind::Minimum(inner) => Box::new(Minimum::new(build_metric(inner, seeds)?)),
        MetricKind::Mahalanobis => Box::new(Mahalanobis::new(seeds)?),
        MetricKind::Hamming => Box::new(Hamming),
        MetricKind::Canberra => Box::new(Canberra),
    };
    log::debug!("built metric {} from {} seeds", metric.name(), seeds.len());
    Ok(metric)
}
