//! quadwarp - interactive four-corner perspective warp
//!
//! Loads an image, shows it in a window with a handle on each corner, and
//! re-warps the image onto the dragged quadrilateral on every pointer move.

mod config;
mod error;
mod geometry;
mod input;
mod render;
mod session;
mod source;
mod transform;
mod window;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::session::Session;
use crate::transform::Interpolation;
use crate::window::WindowSurface;

/// quadwarp - drag the corners of an image to preview a perspective warp
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image to load (PNG or JPEG)
    #[arg(short, long, env = "QUADWARP_IMAGE")]
    image: Option<PathBuf>,

    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Half-size of the square pick zone around each corner, in pixels
    #[arg(long)]
    hit_radius: Option<i32>,

    /// Radius of the corner markers, in pixels
    #[arg(long)]
    marker_radius: Option<i32>,

    /// Resampling used for the warp
    #[arg(long, value_enum)]
    interpolation: Option<Interpolation>,

    /// Draw a dashed outline around the quadrilateral
    #[arg(long)]
    outline: bool,

    /// Mirror the image left-to-right after loading
    #[arg(long)]
    flip_horizontal: bool,

    /// Mirror the image top-to-bottom after loading
    #[arg(long)]
    flip_vertical: bool,

    /// Milliseconds between event polls
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// CLI values take precedence over the config file
    fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.image {
            config.image.path = path.clone();
        }
        if let Some(radius) = self.hit_radius {
            config.handles.hit_radius = radius;
        }
        if let Some(radius) = self.marker_radius {
            config.handles.marker_radius = radius;
        }
        if let Some(interpolation) = self.interpolation {
            config.warp.interpolation = interpolation;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.display.poll_interval_ms = ms;
        }
        config.handles.show_outline |= self.outline;
        config.image.flip_horizontal |= self.flip_horizontal;
        config.image.flip_vertical |= self.flip_vertical;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("quadwarp v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    let source = source::load_source_image(&config.image).context("Could not load image")?;

    let mut surface = WindowSurface::open(&config.display.title, source.width(), source.height())
        .context("Could not create window")?;

    let mut session = Session::new(source, &config);
    session.run(&mut surface)?;

    let geometry = session.geometry();
    if !geometry.is_identity() {
        debug!("Final corners: {:?}", geometry.corners());
    }
    debug!("Session {:?}", session.state());

    drop(surface);
    info!("Exiting");

    Ok(())
}
