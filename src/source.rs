//! Source image loading
//!
//! Decodes the image once at startup into an 8-bit RGB buffer. Alpha and
//! higher bit depths are dropped; the session never writes to the result.

use image::imageops;
use image::RgbImage;
use tracing::info;

use crate::config::ImageConfig;
use crate::error::Error;

pub fn load_source_image(config: &ImageConfig) -> Result<RgbImage, Error> {
    let decoded = image::open(&config.path).map_err(|source| Error::Load {
        path: config.path.clone(),
        source,
    })?;

    let mut rgb = decoded.to_rgb8();
    if config.flip_horizontal {
        rgb = imageops::flip_horizontal(&rgb);
    }
    if config.flip_vertical {
        rgb = imageops::flip_vertical(&rgb);
    }

    info!(
        "Loaded {:?}: {}x{}{}{}",
        config.path,
        rgb.width(),
        rgb.height(),
        if config.flip_horizontal { " (flipped horizontally)" } else { "" },
        if config.flip_vertical { " (flipped vertically)" } else { "" },
    );

    Ok(rgb)
}
