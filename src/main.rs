// src/main.rs

//! `wave-fill` command line driver: load an image, run wave fills from one or
//! more seeds, optionally undo some of them, and save the result.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use wave_fill::{Completion, FillConfig, HeadlessSurface, Pixel, RasterBuffer, Surface, WaveSession};

/// Animated radius-bounded flood fill over a PNG image
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image to fill
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the filled image
    #[arg(short, long)]
    output: PathBuf,

    /// JSON configuration file; missing fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed pixel as `x,y`; repeat for several fills in order
    #[arg(short, long = "seed", value_parser = parse_seed, required = true)]
    seeds: Vec<Pixel>,

    /// Undo this many fills after running them all
    #[arg(long, default_value_t = 0)]
    undo: usize,

    /// Override the configured worker count
    #[arg(short, long)]
    workers: Option<usize>,

    /// Write every animation frame as a numbered PNG into this directory
    #[arg(long)]
    frames: Option<PathBuf>,
}

fn parse_seed(s: &str) -> Result<Pixel, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got '{s}'"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x in '{s}': {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("bad y in '{s}': {e}"))?;
    Ok(Pixel::new(x, y))
}

/// Surface that saves each presented frame as `frame_NNNNN.png`.
struct PngSequence {
    dir: PathBuf,
    written: usize,
}

impl PngSequence {
    fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create frame directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }
}

impl Surface for PngSequence {
    fn present(&mut self, raster: &RasterBuffer, _damage: &[Pixel]) -> Result<()> {
        let path = self.dir.join(format!("frame_{:05}.png", self.written));
        save_png(raster, &path)?;
        self.written += 1;
        Ok(())
    }
}

fn load_png(path: &Path) -> Result<RasterBuffer> {
    let img = image::open(path).with_context(|| format!("Failed to load image: {}", path.display()))?;
    let rgba_img = img.to_rgba8();
    let (width, height) = rgba_img.dimensions();
    let raster = RasterBuffer::from_rgba(width, height, rgba_img.into_raw())?;
    Ok(raster)
}

fn save_png(raster: &RasterBuffer, path: &Path) -> Result<()> {
    let img = image::RgbaImage::from_raw(raster.width(), raster.height(), raster.as_bytes().to_vec())
        .context("Raster size does not match its dimensions")?;
    img.save(path)
        .with_context(|| format!("Failed to write image: {}", path.display()))
}

fn main() -> Result<()> {
    // Default filter is "info" if RUST_LOG is not set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => FillConfig::load(path)?,
        None => {
            info!("Configuration loaded (using default).");
            FillConfig::default()
        }
    };
    if let Some(workers) = args.workers {
        config.workers.count = workers;
    }

    let raster = load_png(&args.input)?;
    info!("Loaded {} ({}x{})", args.input.display(), raster.width(), raster.height());

    let surface: Box<dyn Surface> = match &args.frames {
        Some(dir) => Box::new(PngSequence::new(dir)?),
        None => Box::new(HeadlessSurface::new()),
    };
    let mut session = WaveSession::new(raster, config, surface).context("Failed to start session")?;

    for seed in &args.seeds {
        match session
            .fill(seed.x, seed.y)
            .with_context(|| format!("Fill from {},{} failed", seed.x, seed.y))?
        {
            Completion::Fill { summary, entry } => info!(
                "Fill from {},{}: {} frames, {} pixels, entry {:?}",
                seed.x, seed.y, summary.frames_painted, summary.pixels_painted, entry
            ),
            other => warn!("Fill from {},{} ended unexpectedly: {:?}", seed.x, seed.y, other),
        }
    }

    for step in 0..args.undo {
        if session.undo().context("Undo failed")?.is_none() {
            warn!("Nothing left to undo after {} of {} undos", step, args.undo);
            break;
        }
    }

    save_png(session.raster(), &args.output)?;
    info!("Wrote {}", args.output.display());
    Ok(())
}
