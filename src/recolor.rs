use std::thread;

use image::{Rgba, RgbaImage};

use crate::color::{TRANSPARENT, apply_luminosity, blend, nearest_squared_distance, squared_distance};
use crate::error::{Error, Result};

/// Tuning knobs for [`recolor`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecolorParameters {
    /// Brightness multiplier applied before matching. Must be positive.
    pub luminosity: f64,
    /// How many of the closest palette colors take part in the blend.
    pub nearest: usize,
    /// Shepard's exponent. Higher values pull harder toward the single
    /// nearest color.
    pub power: f64,
    /// Pixels farther than this from every palette color are left alone.
    /// Zero disables the gate.
    pub max_distance: f64,
}

impl Default for RecolorParameters {
    fn default() -> Self {
        Self { luminosity: 1.0, nearest: 30, power: 4.0, max_distance: 0.0 }
    }
}

impl RecolorParameters {
    pub fn validate(&self) -> Result<()> {
        if !(self.luminosity.is_finite() && self.luminosity > 0.0) {
            return Err(Error::InvalidParameter(format!("luminosity must be positive, got {}", self.luminosity)));
        }
        if self.nearest == 0 {
            return Err(Error::InvalidParameter("nearest must be at least 1".into()));
        }
        if !(self.power.is_finite() && self.power > 0.0) {
            return Err(Error::InvalidParameter(format!("power must be positive, got {}", self.power)));
        }
        if !(self.max_distance.is_finite() && self.max_distance >= 0.0) {
            return Err(Error::InvalidParameter(format!(
                "maxDistance must not be negative, got {}",
                self.max_distance
            )));
        }
        Ok(())
    }

    fn max_distance_sq(&self) -> Option<f64> {
        (self.max_distance > 0.0).then(|| self.max_distance * self.max_distance)
    }
}

/// Pulls every pixel of `source` toward `palette` using Shepard's inverse
/// distance weighting over the `nearest` closest palette colors.
///
/// Rows are split into one contiguous band per worker. Each worker reads only
/// its band of the source and writes only its band of a freshly allocated
/// output, so the bands need no locking; the call returns once every worker
/// has finished.
pub fn recolor(source: &RgbaImage, palette: &[Rgba<u8>], params: &RecolorParameters) -> Result<RgbaImage> {
    params.validate()?;
    if palette.is_empty() {
        return Err(Error::EmptyPalette);
    }

    let (w, h) = source.dimensions();
    if w == 0 || h == 0 {
        return Ok(RgbaImage::new(w, h));
    }

    let workers = thread::available_parallelism().map_or(1, |n| n.get());
    Ok(recolor_on(source, palette, params, workers))
}

/// Runs the kernel over `min(workers, height)` row bands. A single band runs
/// on the calling thread, which is all wasm32 gets. Nothing here reads the
/// clock.
fn recolor_on(source: &RgbaImage, palette: &[Rgba<u8>], params: &RecolorParameters, workers: usize) -> RgbaImage {
    let (w, h) = source.dimensions();
    let workers = workers.min(h as usize).max(1);
    let rows_per_worker = (h as usize).div_ceil(workers);
    let band_len = rows_per_worker * w as usize * 4;

    let src: &[u8] = source.as_raw();
    let mut img = RgbaImage::new(w, h);
    let out: &mut [u8] = &mut img;
    let kernel = Kernel::new(palette, params);

    if workers == 1 {
        kernel.run_band(src, out);
    } else {
        thread::scope(|s| {
            for (src_band, out_band) in src.chunks(band_len).zip(out.chunks_mut(band_len)) {
                let kernel = &kernel;
                s.spawn(move || kernel.run_band(src_band, out_band));
            }
        });
    }

    log::debug!("recolored {w}x{h} with {} palette colors on {workers} workers", palette.len());
    img
}

/// Per-pixel recoloring state shared read-only by every worker.
struct Kernel<'a> {
    palette: &'a [Rgba<u8>],
    luminosity: f64,
    nearest: usize,
    power: f64,
    max_distance_sq: Option<f64>,
}

impl<'a> Kernel<'a> {
    fn new(palette: &'a [Rgba<u8>], params: &RecolorParameters) -> Self {
        Self {
            palette,
            luminosity: params.luminosity,
            nearest: params.nearest.min(palette.len()),
            power: params.power,
            max_distance_sq: params.max_distance_sq(),
        }
    }

    fn run_band(&self, src: &[u8], out: &mut [u8]) {
        let mut scratch = Scratch::with_capacity(self.palette.len());
        for (s, o) in src.chunks_exact(4).zip(out.chunks_exact_mut(4)) {
            let px = Rgba([s[0], s[1], s[2], s[3]]);
            o.copy_from_slice(&self.pixel(px, &mut scratch).0);
        }
    }

    fn pixel(&self, px: Rgba<u8>, scratch: &mut Scratch) -> Rgba<u8> {
        if px[3] == 0 {
            return TRANSPARENT;
        }

        if let Some(limit) = self.max_distance_sq {
            if nearest_squared_distance(&px, self.palette) > limit {
                return px;
            }
        }

        let adjusted = apply_luminosity(px, self.luminosity);

        scratch.neighbours.clear();
        scratch
            .neighbours
            .extend(self.palette.iter().map(|p| (squared_distance(&adjusted, p), *p)));
        // Stable, so equidistant palette colors keep palette order.
        scratch.neighbours.sort_by(|a, b| a.0.total_cmp(&b.0));
        scratch.neighbours.truncate(self.nearest);

        let (closest_dist, closest) = scratch.neighbours[0];
        if closest_dist == 0.0 {
            return closest;
        }

        scratch.colors.clear();
        scratch.weights.clear();
        for &(dist, color) in &scratch.neighbours {
            scratch.colors.push(color);
            scratch.weights.push(1.0 / dist.sqrt().powf(self.power));
        }

        let total: f64 = scratch.weights.iter().sum();
        if total == 0.0 || !total.is_finite() {
            return closest;
        }
        blend(&scratch.colors, &scratch.weights)
    }
}

/// Buffers reused across the pixels of one band.
struct Scratch {
    neighbours: Vec<(f64, Rgba<u8>)>,
    colors: Vec<Rgba<u8>>,
    weights: Vec<f64>,
}

impl Scratch {
    fn with_capacity(n: usize) -> Self {
        Self {
            neighbours: Vec::with_capacity(n),
            colors: Vec::with_capacity(n),
            weights: Vec::with_capacity(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn single(px: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_pixel(1, 1, px)
    }

    #[test]
    fn transparent_pixels_stay_transparent() {
        let img = single(Rgba([12, 200, 40, 0]));
        for params in [
            RecolorParameters::default(),
            RecolorParameters { luminosity: 3.0, nearest: 1, power: 0.5, max_distance: 10.0 },
        ] {
            let out = recolor(&img, &[RED, GREEN], &params).unwrap();
            assert_eq!(*out.get_pixel(0, 0), TRANSPARENT);
        }
    }

    #[test]
    fn exact_match_short_circuits() {
        let img = single(GREEN);
        for nearest in [1, 2, 3, 50] {
            for power in [0.1, 1.0, 4.0, 12.0] {
                let params = RecolorParameters { nearest, power, ..Default::default() };
                let out = recolor(&img, &[RED, GREEN, BLUE], &params).unwrap();
                assert_eq!(*out.get_pixel(0, 0), GREEN);
            }
        }
    }

    #[test]
    fn exact_match_after_luminosity() {
        let img = single(Rgba([100, 0, 0, 255]));
        let params = RecolorParameters { luminosity: 2.0, ..Default::default() };
        let target = Rgba([200, 0, 0, 255]);
        let out = recolor(&img, &[target, BLUE], &params).unwrap();
        assert_eq!(*out.get_pixel(0, 0), target);
    }

    #[test]
    fn far_pixels_are_left_alone() {
        let original = Rgba([128, 128, 128, 180]);
        let img = single(original);
        let params = RecolorParameters { max_distance: 50.0, ..Default::default() };
        let out = recolor(&img, &[RED, BLUE], &params).unwrap();
        assert_eq!(*out.get_pixel(0, 0), original);
    }

    #[test]
    fn close_pixels_pass_the_gate() {
        let img = single(Rgba([250, 0, 0, 255]));
        let params = RecolorParameters { max_distance: 10.0, nearest: 1, ..Default::default() };
        let out = recolor(&img, &[RED, BLUE], &params).unwrap();
        assert_eq!(*out.get_pixel(0, 0), RED);
    }

    #[test]
    fn equidistant_neighbours_average() {
        // (0, 0, 0) sits exactly between the two palette colors.
        let img = single(Rgba([0, 0, 0, 255]));
        let palette = [Rgba([10, 0, 0, 255]), Rgba([0, 10, 0, 255])];
        let params = RecolorParameters { nearest: 2, ..Default::default() };
        let out = recolor(&img, &palette, &params).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgba([5, 5, 0, 255]));
    }

    #[test]
    fn higher_power_pulls_toward_nearest() {
        let img = single(Rgba([60, 0, 0, 255]));
        let palette = [Rgba([0, 0, 0, 255]), Rgba([255, 0, 0, 255])];
        let soft = RecolorParameters { nearest: 2, power: 0.5, ..Default::default() };
        let hard = RecolorParameters { nearest: 2, power: 8.0, ..Default::default() };
        let soft_red = recolor(&img, &palette, &soft).unwrap().get_pixel(0, 0)[0];
        let hard_red = recolor(&img, &palette, &hard).unwrap().get_pixel(0, 0)[0];
        assert!(hard_red < soft_red, "{hard_red} should be darker than {soft_red}");
        assert!(hard_red < 5);
    }

    #[test]
    fn nearest_one_snaps_to_closest() {
        let img = RgbaImage::from_fn(4, 3, |x, _| Rgba([x as u8 * 60, 0, 0, 255]));
        let palette = [Rgba([0, 0, 0, 255]), RED];
        let params = RecolorParameters { nearest: 1, ..Default::default() };
        let out = recolor(&img, &palette, &params).unwrap();
        for (x, _, px) in out.enumerate_pixels() {
            let expected = if x * 60 < 128 { palette[0] } else { RED };
            assert_eq!(*px, expected);
        }
    }

    #[test]
    fn source_is_untouched_and_dimensions_match() {
        let img = RgbaImage::from_fn(7, 33, |x, y| Rgba([x as u8 * 30, y as u8 * 7, 99, 255]));
        let before = img.clone();
        let out = recolor(&img, &[RED, GREEN, BLUE], &RecolorParameters::default()).unwrap();
        assert_eq!(img, before);
        assert_eq!(out.dimensions(), (7, 33));
    }

    #[test]
    fn banding_matches_per_pixel_result() {
        let img = RgbaImage::from_fn(9, 41, |x, y| {
            Rgba([(x * 28) as u8, (y * 6) as u8, ((x + y) * 5) as u8, if x == 3 { 0 } else { 255 }])
        });
        let palette = [RED, GREEN, BLUE, Rgba([40, 40, 40, 255])];
        let params = RecolorParameters { nearest: 3, power: 2.0, ..Default::default() };
        let out = recolor(&img, &palette, &params).unwrap();

        let kernel = Kernel::new(&palette, &params);
        let mut scratch = Scratch::with_capacity(palette.len());
        for (x, y, px) in img.enumerate_pixels() {
            assert_eq!(*out.get_pixel(x, y), kernel.pixel(*px, &mut scratch), "pixel ({x}, {y})");
        }
    }

    #[test]
    fn single_band_matches_many_bands() {
        let img = RgbaImage::from_fn(6, 17, |x, y| {
            Rgba([(x * 40) as u8, (y * 15) as u8, 60, if y == 4 { 0 } else { 255 }])
        });
        let palette = [RED, GREEN, BLUE];
        let params = RecolorParameters { nearest: 2, max_distance: 200.0, ..Default::default() };
        let inline = recolor_on(&img, &palette, &params, 1);
        for workers in [2, 5, 17, 64] {
            assert_eq!(recolor_on(&img, &palette, &params, workers), inline, "{workers} workers");
        }
        assert_eq!(recolor(&img, &palette, &params).unwrap(), inline);
    }

    #[test]
    fn empty_image_passes_through() {
        let out = recolor(&RgbaImage::new(0, 5), &[RED], &RecolorParameters::default()).unwrap();
        assert_eq!(out.dimensions(), (0, 5));
    }

    #[test]
    fn rejects_bad_input_before_work() {
        let img = single(RED);
        assert!(matches!(
            recolor(&img, &[], &RecolorParameters::default()),
            Err(Error::EmptyPalette)
        ));
        for params in [
            RecolorParameters { luminosity: 0.0, ..Default::default() },
            RecolorParameters { nearest: 0, ..Default::default() },
            RecolorParameters { power: -1.0, ..Default::default() },
            RecolorParameters { max_distance: -2.0, ..Default::default() },
            RecolorParameters { luminosity: f64::NAN, ..Default::default() },
        ] {
            assert!(matches!(recolor(&img, &[RED], &params), Err(Error::InvalidParameter(_))));
        }
    }
}
