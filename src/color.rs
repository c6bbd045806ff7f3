use std::fmt;
use std::str::FromStr;

use image::Rgba;
use palette::Srgb;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fully transparent output pixel.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// An opaque RGB palette color.
///
/// Always rendered as an uppercase, zero padded `#RRGGBB` string. On the wire
/// it travels as `{"hex": "#RRGGBB"}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "HexObject", try_from = "HexObject")]
pub struct Color([u8; 3]);

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    /// Drops the alpha channel.
    pub fn from_rgba(px: &Rgba<u8>) -> Self {
        Self([px[0], px[1], px[2]])
    }

    pub fn channels(self) -> [u8; 3] {
        self.0
    }

    pub fn to_hex(self) -> String {
        let [r, g, b] = self.0;
        format!("#{r:02X}{g:02X}{b:02X}")
    }

    /// Full opacity.
    pub fn to_rgba(self) -> Rgba<u8> {
        let [r, g, b] = self.0;
        Rgba([r, g, b, 255])
    }
}

impl From<Srgb<u8>> for Color {
    fn from(c: Srgb<u8>) -> Self {
        Self([c.red, c.green, c.blue])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = Error;

    /// Accepts `RRGGBB` with an optional leading `#`, in either case.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidColor(s.to_owned()));
        }
        let v = u32::from_str_radix(digits, 16).map_err(|_| Error::InvalidColor(s.to_owned()))?;
        Ok(Self::new((v >> 16) as u8, (v >> 8) as u8, v as u8))
    }
}

#[derive(Serialize, Deserialize)]
struct HexObject {
    hex: String,
}

impl From<Color> for HexObject {
    fn from(c: Color) -> Self {
        Self { hex: c.to_hex() }
    }
}

impl TryFrom<HexObject> for Color {
    type Error = Error;

    fn try_from(obj: HexObject) -> Result<Self> {
        obj.hex.parse()
    }
}

/// A palette entry as callers send it: either a bare hex string or a
/// `{"hex": ...}` object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaletteEntry {
    Hex(String),
    Object { hex: String },
}

impl AsRef<str> for PaletteEntry {
    fn as_ref(&self) -> &str {
        match self {
            PaletteEntry::Hex(hex) | PaletteEntry::Object { hex } => hex,
        }
    }
}

/// Decodes a caller supplied palette into opaque RGBA colors.
///
/// Malformed entries are dropped with a warning. A palette with nothing left
/// after that is an error, since there is nothing to recolor toward.
pub fn parse_palette<I, S>(entries: I) -> Result<Vec<Rgba<u8>>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut colors = Vec::new();
    for entry in entries {
        match entry.as_ref().parse::<Color>() {
            Ok(c) => colors.push(c.to_rgba()),
            Err(e) => log::warn!("dropping palette entry: {e}"),
        }
    }
    if colors.is_empty() {
        return Err(Error::EmptyPalette);
    }
    Ok(colors)
}

// ------------------------------------------------------------
// Distance, luminosity and blending
// ------------------------------------------------------------

/// Squared euclidean distance over R, G and B. Alpha is ignored.
#[inline(always)]
pub fn squared_distance(a: &Rgba<u8>, b: &Rgba<u8>) -> f64 {
    let dr = a[0] as f64 - b[0] as f64;
    let dg = a[1] as f64 - b[1] as f64;
    let db = a[2] as f64 - b[2] as f64;
    dr * dr + dg * dg + db * db
}

/// Smallest squared distance from `c` to any palette color, `f64::MAX` for an
/// empty palette.
pub fn nearest_squared_distance(c: &Rgba<u8>, palette: &[Rgba<u8>]) -> f64 {
    palette
        .iter()
        .map(|p| squared_distance(c, p))
        .fold(f64::MAX, f64::min)
}

/// Scales R, G and B by `factor`, clamped to the channel range. Alpha is kept.
pub fn apply_luminosity(c: Rgba<u8>, factor: f64) -> Rgba<u8> {
    let scale = |v: u8| (v as f64 * factor).clamp(0.0, 255.0) as u8;
    Rgba([scale(c[0]), scale(c[1]), scale(c[2]), c[3]])
}

/// Weighted per-channel average, fully opaque.
///
/// When the weights sum to zero the first color is returned as is. Callers
/// must pass equally sized, non-empty slices.
pub fn blend(colors: &[Rgba<u8>], weights: &[f64]) -> Rgba<u8> {
    debug_assert_eq!(colors.len(), weights.len());
    let Some(first) = colors.first() else {
        return TRANSPARENT;
    };

    let mut sum = [0.0f64; 3];
    let mut total = 0.0;
    for (c, &w) in colors.iter().zip(weights) {
        sum[0] += c[0] as f64 * w;
        sum[1] += c[1] as f64 * w;
        sum[2] += c[2] as f64 * w;
        total += w;
    }

    if total == 0.0 {
        return *first;
    }

    let channel = |s: f64| (s / total).round().clamp(0.0, 255.0) as u8;
    Rgba([channel(sum[0]), channel(sum[1]), channel(sum[2]), 255])
}
