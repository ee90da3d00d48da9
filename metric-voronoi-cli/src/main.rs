//! Voronoi metric comparison CLI
//!
//! Rasterizes one seed set under several distance metrics, writing one PNG
//! per metric and timing each run.
//!
//! ## YAML run file
//!
//! ```yaml
//! width: 800
//! height: 600
//! seeds: 24          # random seed count (ignored when `points` is given)
//! seed: 0            # RNG seed for seed positions and palette
//! show_seeds: true
//! threads: 0         # 0 = one worker per core
//! metrics:
//!   - euclidean
//!   - minkowski:3
//!   - minimum:euclidean
//! points:            # optional fixed seed positions
//!   - [100, 100]
//!   - [400, 250]
//!   - [700, 500]
//! ```
//!
//! Run with: `metric-voronoi -o out --config run.yaml`
//!
//! CLI flags take precedence over run file values. Set `RUST_LOG=debug` to
//! see band layout and metric construction details.
//!
//! ## Graceful interruption
//!
//! Press Ctrl+C to stop after the metric currently being rendered.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

use metric_voronoi_core::{
    build_metric, random_palette, random_seeds, MetricKind, Point, Rasterizer,
};

const DEFAULT_WIDTH: u32 = 800;
const DEFAULT_HEIGHT: u32 = 600;
const DEFAULT_SEEDS: usize = 24;

/// YAML run file format
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RunFile {
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    seeds: Option<usize>,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    points: Option<Vec<[i32; 2]>>,
    #[serde(default)]
    metrics: Option<Vec<String>>,
    #[serde(default)]
    show_seeds: Option<bool>,
    #[serde(default)]
    threads: Option<usize>,
    #[serde(default)]
    output: Option<PathBuf>,
}

fn load_run_file(path: &PathBuf) -> anyhow::Result<RunFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read run file: {:?}", path))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse run file: {:?}", path))
}

#[derive(Parser, Debug, Default)]
#[command(name = "metric-voronoi")]
#[command(about = "Compare Voronoi diagrams under different distance metrics", long_about = None)]
struct Args {
    /// Output directory (created if missing)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Raster width in pixels [default: 800]
    #[arg(long)]
    width: Option<u32>,

    /// Raster height in pixels [default: 600]
    #[arg(long)]
    height: Option<u32>,

    /// Number of random seeds [default: 24]
    #[arg(short = 'n', long)]
    seeds: Option<usize>,

    /// RNG seed for seed positions and palette [default: 0]
    #[arg(long)]
    seed: Option<u64>,

    /// Metric to render, repeatable: euclidean | manhattan | maximum |
    /// minkowski:<p> | minimum:<metric> | mahalanobis | hamming | canberra
    /// [default: all]
    #[arg(short = 'm', long = "metric")]
    metric: Vec<String>,

    /// Draw seed positions as dots
    #[arg(long)]
    show_seeds: bool,

    /// Worker threads (0 = one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// YAML run file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the default metric list and exit
    #[arg(long)]
    list_metrics: bool,
}

/// Fully resolved run settings
#[derive(Debug)]
struct RunConfig {
    output: PathBuf,
    width: u32,
    height: u32,
    seeds: Vec<Point>,
    rng_seed: u64,
    metrics: Vec<MetricKind>,
    show_seeds: bool,
    threads: usize,
}

/// Merge CLI arguments over run file values over defaults.
fn resolve_config(args: &Args, run_file: RunFile) -> anyhow::Result<RunConfig> {
    let width = args.width.or(run_file.width).unwrap_or(DEFAULT_WIDTH);
    let height = args.height.or(run_file.height).unwrap_or(DEFAULT_HEIGHT);
    let rng_seed = args.seed.or(run_file.seed).unwrap_or(0);

    let seeds = match (args.seeds, run_file.points) {
        // An explicit count on the command line beats fixed points
        (None, Some(points)) => points.into_iter().map(|[x, y]| Point::new(x, y)).collect(),
        (count, _) => {
            let count = count.or(run_file.seeds).unwrap_or(DEFAULT_SEEDS);
            random_seeds(count, width, height, rng_seed)
        }
    };
    if seeds.is_empty() {
        anyhow::bail!("at least one seed is required");
    }

    let names = if !args.metric.is_empty() {
        args.metric.clone()
    } else {
        run_file.metrics.unwrap_or_default()
    };
    let metrics = if names.is_empty() {
        MetricKind::all()
    } else {
        names
            .iter()
            .map(|s| {
                s.parse::<MetricKind>()
                    .with_context(|| format!("invalid metric '{}'", s))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    Ok(RunConfig {
        output: args
            .output
            .clone()
            .or(run_file.output)
            .unwrap_or_else(|| PathBuf::from("voronoi-out")),
        width,
        height,
        seeds,
        rng_seed,
        metrics,
        show_seeds: args.show_seeds || run_file.show_seeds.unwrap_or(false),
        threads: args.threads.or(run_file.threads).unwrap_or(0),
    })
}

/// Filesystem-safe lowercase form of a metric name,
/// e.g. `Minkowski(p=3)` -> `minkowski-p-3`
fn slug(name: &str) -> String {
    name.to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Outcome of one metric run
struct RunTiming {
    name: String,
    result: Result<(Duration, usize, PathBuf), String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    if args.list_metrics {
        for kind in MetricKind::all() {
            println!("{}", kind);
        }
        return Ok(());
    }

    // Set up SIGINT handler
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
        })
        .context("failed to set Ctrl-C handler")?;
    }

    let run_file = args.config.as_ref().map(load_run_file).transpose()?.unwrap_or_default();
    let config = resolve_config(&args, run_file)?;
    log::info!("resolved config: {:?}", config);

    let out_of_bounds = config
        .seeds
        .iter()
        .filter(|p| {
            p.x < 0 || p.y < 0 || p.x as i64 >= config.width as i64 || p.y as i64 >= config.height as i64
        })
        .count();
    if out_of_bounds > 0 {
        log::warn!("{} seed(s) lie outside the {}x{} raster", out_of_bounds, config.width, config.height);
    }

    std::fs::create_dir_all(&config.output)
        .with_context(|| format!("failed to create output directory: {:?}", config.output))?;

    let rasterizer = Rasterizer::with_threads(config.threads);
    let palette = random_palette(config.seeds.len(), config.rng_seed);

    println!(
        "Rendering {}x{} with {} seeds (seed: {}) under {} metric{} on {} worker{}",
        config.width,
        config.height,
        config.seeds.len(),
        config.rng_seed,
        config.metrics.len(),
        if config.metrics.len() == 1 { "" } else { "s" },
        rasterizer.workers(),
        if rasterizer.workers() == 1 { "" } else { "s" },
    );

    let progress = ProgressBar::new(config.metrics.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut timings: Vec<RunTiming> = Vec::with_capacity(config.metrics.len());
    let run_start = Instant::now();

    for (i, kind) in config.metrics.iter().enumerate() {
        if interrupted.load(Ordering::Relaxed) {
            progress.abandon_with_message("Interrupted");
            eprintln!(
                "Interrupted after {} of {} metrics",
                timings.len(),
                config.metrics.len()
            );
            break;
        }
        progress.set_message(kind.to_string());

        // Construction errors are fatal for this metric only
        let metric = match build_metric(kind, &config.seeds) {
            Ok(metric) => metric,
            Err(e) => {
                log::warn!("skipping {}: {}", kind, e);
                timings.push(RunTiming { name: kind.to_string(), result: Err(e.to_string()) });
                progress.inc(1);
                continue;
            }
        };

        let start = Instant::now();
        let raster = rasterizer.rasterize(config.width, config.height, &config.seeds, &metric)?;
        let elapsed = start.elapsed();

        let mut image = raster.to_image(&palette)?;
        if config.show_seeds {
            draw_seeds(&mut image, &config.seeds);
        }

        let name = metric.name();
        let path = output_path(&config.output, i, &name);
        image
            .save(&path)
            .with_context(|| format!("failed to write {:?}", path))?;

        let occupied = raster
            .cell_areas(config.seeds.len())
            .iter()
            .filter(|&&a| a > 0)
            .count();
        timings.push(RunTiming { name, result: Ok((elapsed, occupied, path)) });
        progress.inc(1);
    }

    if !interrupted.load(Ordering::Relaxed) {
        progress.finish_with_message("done");
    }

    print_summary(&timings);
    println!(
        "Total time: {:.1}s, output in {:?}",
        run_start.elapsed().as_secs_f64(),
        config.output
    );
    Ok(())
}

fn print_summary(timings: &[RunTiming]) {
    println!("\n{:<24} {:>10} {:>8}  {}", "metric", "ms", "cells", "file");
    for timing in timings {
        match &timing.result {
            Ok((elapsed, occupied, path)) => println!(
                "{:<24} {:>10.1} {:>8}  {}",
                timing.name,
                elapsed.as_secs_f64() * 1000.0,
                occupied,
                path.display()
            ),
            Err(e) => println!("{:<24} {:>10} {:>8}  skipped: {}", timing.name, "-", "-", e),
        }
    }
}

/// Draw 3x3 black dots at each seed position
fn draw_seeds(image: &mut image::RgbImage, seeds: &[Point]) {
    let (w, h) = (image.width() as i64, image.height() as i64);
    for seed in seeds {
        for dy in -1..=1 {
            for dx in -1..=1 {
                let px = seed.x as i64 + dx;
                let py = seed.y as i64 + dy;
                if px >= 0 && px < w && py >= 0 && py < h {
                    image.put_pixel(px as u32, py as u32, image::Rgb([0, 0, 0]));
                }
            }
        }
    }
}

/// `<dir>/<index>-<slug>.png`
fn output_path(dir: &Path, index: usize, name: &str) -> PathBuf {
    dir.join(format!("{:02}-{}.png", index, slug(name)))
}
