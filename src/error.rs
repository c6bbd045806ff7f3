use thiserror::Error;

/// Everything that can go wrong while extracting or applying a palette.
///
/// None of these are fatal to the process. Batch extraction records them per
/// image; the recolor path returns them before any pixel is written.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to encode PNG: {0}")]
    Encode(#[source] image::ImageError),
    #[error("no valid pixels found")]
    NoSamples,
    #[error("kmeans failed: {0}")]
    Clustering(String),
    #[error("invalid hex color {0:?}")]
    InvalidColor(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("palette contained no valid colors")]
    EmptyPalette,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
