use std::collections::HashSet;

use image::RgbaImage;
use palette::Srgb;

use crate::color::Color;
use crate::error::{Error, Result};

/// Stride used when the caller does not ask for one.
pub const DEFAULT_STRIDE: u32 = 4;

/// A normalized RGB sample handed to clustering.
pub type Observation = Srgb<f32>;

/// How densely an image is sampled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SamplingStride {
    /// [`DEFAULT_STRIDE`], coarsened for large images.
    #[default]
    Adaptive,
    /// Exactly this stride regardless of image size.
    Fixed(u32),
}

impl SamplingStride {
    /// Builds the policy from an optional caller override.
    pub fn from_request(sample_rate: Option<u32>) -> Self {
        sample_rate.map_or(Self::Adaptive, Self::Fixed)
    }

    /// Stride to use for an image with `pixels` pixels.
    pub fn resolve(self, pixels: u64) -> u32 {
        match self {
            Self::Fixed(stride) => stride,
            Self::Adaptive if pixels > 4_000_000 => 8,
            Self::Adaptive if pixels > 1_000_000 => 6,
            Self::Adaptive => DEFAULT_STRIDE,
        }
    }
}

/// Colors that must never reach clustering.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    colors: HashSet<[u8; 3]>,
}

impl ExclusionSet {
    /// Parses hex strings, dropping the ones that do not decode.
    pub fn from_hex<I, S>(hexes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut colors = HashSet::new();
        for hex in hexes {
            match hex.as_ref().parse::<Color>() {
                Ok(c) => {
                    colors.insert(c.channels());
                }
                Err(e) => log::warn!("ignoring excluded color: {e}"),
            }
        }
        Self { colors }
    }

    pub fn contains(&self, rgb: [u8; 3]) -> bool {
        self.colors.contains(&rgb)
    }
}

/// Walks the pixel grid every `stride` pixels in both directions and returns
/// the normalized RGB of every visited pixel that is not excluded.
///
/// Alpha is not consulted. Fails with [`Error::NoSamples`] when nothing is
/// left after filtering.
pub fn sample_pixels(img: &RgbaImage, stride: u32, excluded: &ExclusionSet) -> Result<Vec<Observation>> {
    if stride == 0 {
        return Err(Error::InvalidParameter("sample stride must be at least 1".into()));
    }

    let (w, h) = img.dimensions();
    let per_row = w.div_ceil(stride) as usize;
    let rows = h.div_ceil(stride) as usize;
    let mut observations = Vec::with_capacity(per_row * rows);

    for y in (0..h).step_by(stride as usize) {
        for x in (0..w).step_by(stride as usize) {
            let px = img.get_pixel(x, y);
            let rgb = [px[0], px[1], px[2]];
            if excluded.contains(rgb) {
                continue;
            }
            observations.push(Srgb::new(rgb[0], rgb[1], rgb[2]).into_format::<f32>());
        }
    }

    if observations.is_empty() {
        return Err(Error::NoSamples);
    }
    Ok(observations)
}
