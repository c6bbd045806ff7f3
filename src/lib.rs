use js_sys::{Array, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;

pub mod assembler;
pub mod batch;
pub mod clustering;
pub mod codec;
pub mod color;
pub mod error;
pub mod gate;
pub mod recolor;
pub mod sampler;

pub use assembler::assemble_palette;
pub use batch::{ExtractOptions, ExtractResult, extract_palette, extract_palettes};
pub use clustering::{Cluster, ClusteringError, ClusteringProvider, KmeansProvider};
pub use codec::{DecodeLimits, decode_image, encode_png};
pub use color::{Color, PaletteEntry, parse_palette};
pub use error::{Error, Result};
pub use gate::{AdmissionGate, Permit};
pub use recolor::{RecolorParameters, recolor};
pub use sampler::{ExclusionSet, Observation, SamplingStride, sample_pixels};

/// Decodes `input`, pulls it toward `palette` and returns the result as PNG.
///
/// Palette entries that are not valid hex colors are skipped.
pub fn recolor_bytes<S: AsRef<str>>(input: &[u8], palette: &[S], params: &RecolorParameters) -> Result<Vec<u8>> {
    params.validate()?;
    let palette = parse_palette(palette)?;
    let img = decode_image(input, DecodeLimits::default())?;
    let out = recolor(&img, &palette, params)?;
    encode_png(&out)
}

// ------------------------------------------------------------
// JS bindings
// ------------------------------------------------------------

fn js_err(e: Error) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Accepts `"#RRGGBB"` strings and `{ hex: "#RRGGBB" }` objects. Anything
/// else is passed through as an empty entry and dropped by validation.
fn js_hex_list(values: &Array) -> Vec<String> {
    values
        .iter()
        .map(|val| {
            val.as_string()
                .or_else(|| Reflect::get(&val, &JsValue::from_str("hex")).ok()?.as_string())
                .unwrap_or_default()
        })
        .collect()
}

/// Extract a palette from one encoded image.
///
/// Returns an array of `#RRGGBB` strings, most common color first. When
/// `sample_rate` is omitted the stride adapts to the image size.
#[wasm_bindgen(js_name = extractPalette)]
pub fn extract_palette_js(
    input: Vec<u8>,
    n_colors: Option<usize>,
    sample_rate: Option<u32>,
    excluded: Option<Array>,
) -> Result<Array, JsValue> {
    let mut options = ExtractOptions {
        stride: SamplingStride::from_request(sample_rate),
        ..Default::default()
    };
    if let Some(n) = n_colors {
        options.colors = n;
    }
    if let Some(excluded) = excluded {
        options.excluded = ExclusionSet::from_hex(js_hex_list(&excluded));
    }

    let palette = extract_palette(&input, &options, &KmeansProvider::default()).map_err(js_err)?;

    let out = Array::new();
    for c in palette {
        out.push(&JsValue::from_str(&c.to_hex()));
    }
    Ok(out)
}

/// Recolor an encoded image toward `palette` and return PNG bytes.
///
/// Omitted tuning values fall back to the [`RecolorParameters`] defaults.
#[wasm_bindgen(js_name = applyPalette)]
pub fn apply_palette_js(
    input: Vec<u8>,
    palette: Array,
    luminosity: Option<f64>,
    nearest: Option<usize>,
    power: Option<f64>,
    max_distance: Option<f64>,
) -> Result<Uint8Array, JsValue> {
    let defaults = RecolorParameters::default();
    let params = RecolorParameters {
        luminosity: luminosity.unwrap_or(defaults.luminosity),
        nearest: nearest.unwrap_or(defaults.nearest),
        power: power.unwrap_or(defaults.power),
        max_distance: max_distance.unwrap_or(defaults.max_distance),
    };

    let png = recolor_bytes(&input, &js_hex_list(&palette), &params).map_err(js_err)?;
    Ok(Uint8Array::from(png.as_slice()))
}
