//! Error types for quadwarp
//!
//! Only failures that end the session live here. Degenerate geometry and
//! out-of-bounds sampling are absorbed by the transform engine.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source image could not be read or decoded
    #[error("failed to load image {path:?}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Window creation or frame presentation failed
    #[error("display surface error: {0}")]
    Display(String),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<minifb::Error> for Error {
    fn from(e: minifb::Error) -> Self {
        Error::Display(e.to_string())
    }
}
