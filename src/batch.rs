use std::thread;

use serde::{Deserialize, Serialize};

use crate::assembler::assemble_palette;
use crate::clustering::ClusteringProvider;
use crate::codec::{DecodeLimits, decode_image};
use crate::color::Color;
use crate::error::Result;
use crate::gate::AdmissionGate;
use crate::sampler::{ExclusionSet, SamplingStride, sample_pixels};

/// Settings shared by every image of an extraction request.
#[derive(Clone, Debug)]
pub struct ExtractOptions {
    pub stride: SamplingStride,
    /// Number of palette colors to ask the clustering provider for.
    pub colors: usize,
    pub excluded: ExclusionSet,
    pub limits: DecodeLimits,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            stride: SamplingStride::Adaptive,
            colors: 8,
            excluded: ExclusionSet::default(),
            limits: DecodeLimits::default(),
        }
    }
}

/// Outcome for one image: a palette or the reason there is none.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractResult {
    Palette(Vec<Color>),
    Error(String),
}

impl ExtractResult {
    /// Empty for failed images.
    pub fn palette(&self) -> &[Color] {
        match self {
            ExtractResult::Palette(p) => p,
            ExtractResult::Error(_) => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ExtractResult::Palette(_) => None,
            ExtractResult::Error(e) => Some(e),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ExtractResult::Palette(_))
    }
}

impl From<Result<Vec<Color>>> for ExtractResult {
    fn from(res: Result<Vec<Color>>) -> Self {
        match res {
            Ok(palette) => ExtractResult::Palette(palette),
            Err(e) => ExtractResult::Error(e.to_string()),
        }
    }
}

/// Decodes one image, samples it and clusters the samples into a palette.
pub fn extract_palette<P>(bytes: &[u8], options: &ExtractOptions, provider: &P) -> Result<Vec<Color>>
where
    P: ClusteringProvider + ?Sized,
{
    let img = decode_image(bytes, options.limits)?;
    let (w, h) = img.dimensions();
    let stride = options.stride.resolve(w as u64 * h as u64);
    log::debug!("sampling {w}x{h} image every {stride} pixels");

    let observations = sample_pixels(&img, stride, &options.excluded)?;
    assemble_palette(&observations, options.colors, provider)
}

/// Extracts a palette from every source concurrently.
///
/// One worker is spawned per source but at most
/// `min(available parallelism, sources.len())` of them decode and cluster at
/// the same time. `result[i]` always belongs to `sources[i]`, and a failure in
/// one image never affects the others.
pub fn extract_palettes<B, P>(sources: &[B], options: &ExtractOptions, provider: &P) -> Vec<ExtractResult>
where
    B: AsRef<[u8]> + Sync,
    P: ClusteringProvider + ?Sized,
{
    if sources.is_empty() {
        return Vec::new();
    }

    let parallelism = thread::available_parallelism().map_or(1, |n| n.get());
    let gate = AdmissionGate::new(parallelism.min(sources.len()));
    log::debug!("extracting {} palettes, {} at a time", sources.len(), gate.capacity());

    thread::scope(|s| {
        let handles: Vec<_> = sources
            .iter()
            .map(|source| {
                let gate = &gate;
                s.spawn(move || {
                    let _permit = gate.acquire();
                    ExtractResult::from(extract_palette(source.as_ref(), options, provider))
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(index, handle)| {
                let result = handle
                    .join()
                    .unwrap_or_else(|_| ExtractResult::Error("palette extraction panicked".into()));
                if let Some(e) = result.error() {
                    log::warn!("image {index}: {e}");
                }
                result
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::KmeansProvider;
    use crate::codec::encode_png;
    use image::{Rgba, RgbaImage};

    fn png(img: &RgbaImage) -> Vec<u8> {
        encode_png(img).unwrap()
    }

    fn two_tone(a: [u8; 3], b: [u8; 3]) -> Vec<u8> {
        png(&RgbaImage::from_fn(8, 8, |x, _| {
            let [r, g, bl] = if x < 4 { a } else { b };
            Rgba([r, g, bl, 255])
        }))
    }

    fn options(colors: usize) -> ExtractOptions {
        ExtractOptions { stride: SamplingStride::Fixed(1), colors, ..Default::default() }
    }

    #[test]
    fn result_serializes_like_the_api() {
        let ok = ExtractResult::Palette(vec![Color::new(1, 2, 3)]);
        let err = ExtractResult::Error("no valid pixels found".into());
        assert_eq!(serde_json::to_string(&ok).unwrap(), r##"{"palette":[{"hex":"#010203"}]}"##);
        assert_eq!(serde_json::to_string(&err).unwrap(), r#"{"error":"no valid pixels found"}"#);
    }

    #[test]
    fn single_image_palette() {
        let palette = extract_palette(&two_tone([255, 0, 0], [0, 0, 255]), &options(2), &KmeansProvider::default())
            .unwrap();
        let mut hexes: Vec<String> = palette.iter().map(|c| c.to_hex()).collect();
        hexes.sort();
        assert_eq!(hexes, ["#0000FF", "#FF0000"]);
    }

    #[test]
    fn excluded_everything_reports_no_samples() {
        let mut opts = options(1);
        opts.excluded = ExclusionSet::from_hex(["#FF0000", "#0000FF"]);
        let res: ExtractResult = extract_palette(&two_tone([255, 0, 0], [0, 0, 255]), &opts, &KmeansProvider::default()).into();
        assert_eq!(res.error(), Some("no valid pixels found"));
        assert!(res.palette().is_empty());
    }

    #[test]
    fn results_keep_input_order() {
        let sources = vec![
            two_tone([255, 0, 0], [255, 0, 0]),
            two_tone([0, 255, 0], [0, 255, 0]),
            two_tone([0, 0, 255], [0, 0, 255]),
            b"garbage".to_vec(),
            two_tone([255, 255, 255], [255, 255, 255]),
        ];
        let results = extract_palettes(&sources, &options(1), &KmeansProvider::default());
        assert_eq!(results.len(), sources.len());

        let firsts: Vec<Option<String>> = results.iter().map(|r| r.palette().first().map(|c| c.to_hex())).collect();
        assert_eq!(
            firsts,
            [
                Some("#FF0000".to_owned()),
                Some("#00FF00".to_owned()),
                Some("#0000FF".to_owned()),
                None,
                Some("#FFFFFF".to_owned()),
            ]
        );
        assert!(results[3].error().unwrap().starts_with("failed to decode image"));
    }

    #[test]
    fn empty_batch() {
        let sources: Vec<Vec<u8>> = Vec::new();
        assert!(extract_palettes(&sources, &ExtractOptions::default(), &KmeansProvider::default()).is_empty());
    }
}
