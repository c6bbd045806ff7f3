use std::io::Cursor;

use image::{ImageFormat, ImageReader, Limits, RgbaImage};

use crate::error::{Error, Result};

/// Bounds applied while decoding untrusted uploads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Largest accepted width or height.
    pub max_dimension: Option<u32>,
    /// Largest allocation the decoder may make, in bytes.
    pub max_alloc: Option<u64>,
}

impl DecodeLimits {
    pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

    pub const fn unlimited() -> Self {
        Self { max_dimension: None, max_alloc: None }
    }

    fn to_limits(self) -> Limits {
        let mut limits = Limits::no_limits();
        limits.max_image_width = self.max_dimension;
        limits.max_image_height = self.max_dimension;
        limits.max_alloc = self.max_alloc;
        limits
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_dimension: Some(Self::DEFAULT_MAX_DIMENSION),
            max_alloc: Some(512 * 1024 * 1024),
        }
    }
}

/// Decodes PNG, JPEG, GIF or WebP bytes into an RGBA buffer, sniffing the
/// format from the content.
pub fn decode_image(bytes: &[u8], limits: DecodeLimits) -> Result<RgbaImage> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    reader.limits(limits.to_limits());
    Ok(reader.decode()?.into_rgba8())
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(Error::Encode)?;
    Ok(buf)
}
