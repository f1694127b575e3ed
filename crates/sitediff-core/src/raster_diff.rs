//! Pixel-level raster divergence
//!
//! Screenshots are decoded to RGBA and compared pixel by pixel over their
//! overlapping rectangle using a YIQ perceptual colour distance. Mismatched
//! pixels are painted red in a difference image; matching pixels are kept as
//! a faded greyscale copy of the reference so the diff stays readable.

use crate::error::{CompareError, ScoreError, Side};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest possible YIQ delta between two colours
const MAX_YIQ_DELTA: f64 = 35215.0;

const DIFF_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const AA_COLOR: Rgba<u8> = Rgba([255, 255, 0, 255]);

/// Pixel comparison tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RasterOptions {
    /// Colour distance sensitivity in `[0, 1]`; lower is more sensitive
    pub sensitivity: f64,
    /// Skip pixels that look like anti-aliased edges
    pub detect_antialiasing: bool,
    /// Opacity of the reference image behind the diff highlights
    pub diff_alpha: f64,
}

impl RasterOptions {
    /// Check ranges
    ///
    /// # Errors
    /// Returns `CompareError::InvalidConfig` when a fraction is outside `[0, 1]`
    pub fn validate(&self) -> Result<(), CompareError> {
        if !(0.0..=1.0).contains(&self.sensitivity) {
            return Err(CompareError::InvalidConfig(format!(
                "raster sensitivity {} outside [0, 1]",
                self.sensitivity
            )));
        }
        if !(0.0..=1.0).contains(&self.diff_alpha) {
            return Err(CompareError::InvalidConfig(format!(
                "raster diff_alpha {} outside [0, 1]",
                self.diff_alpha
            )));
        }
        Ok(())
    }

    /// Squared-distance cut-off derived from the sensitivity
    #[inline]
    #[must_use]
    pub fn max_delta(&self) -> f64 {
        MAX_YIQ_DELTA * self.sensitivity * self.sensitivity
    }
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            sensitivity: 0.1,
            detect_antialiasing: true,
            diff_alpha: 0.1,
        }
    }
}

/// Width and height of a decoded screenshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Dimensions {
    /// Create dimensions
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Overlapping rectangle of two sizes
    #[inline]
    #[must_use]
    pub fn overlap(self, other: Self) -> Self {
        Self::new(self.width.min(other.width), self.height.min(other.height))
    }

    /// Pixel count
    #[inline]
    #[must_use]
    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Result of a raster comparison
#[derive(Debug, Clone)]
pub struct RasterDiff {
    /// Mismatched share of the compared area, in percent
    pub percent: f64,
    /// Compared area
    pub compared: Dimensions,
    /// Mismatched pixel count
    pub mismatched: u64,
    /// Original sizes when they differ: (reference, candidate)
    pub size_mismatch: Option<(Dimensions, Dimensions)>,
    /// Difference image; `None` when the encoded inputs were identical
    pub image: Option<RgbaImage>,
}

impl RasterDiff {
    fn identical() -> Self {
        Self {
            percent: 0.0,
            compared: Dimensions::new(0, 0),
            mismatched: 0,
            size_mismatch: None,
            image: None,
        }
    }
}

/// Compare two encoded screenshots
///
/// Identical byte blobs short-circuit to 0% without decoding.
///
/// # Errors
/// Returns `ScoreError::Decode` when either blob is not a decodable image
pub fn score_raster(
    reference: &[u8],
    candidate: &[u8],
    options: &RasterOptions,
) -> Result<RasterDiff, ScoreError> {
    if reference == candidate {
        return Ok(RasterDiff::identical());
    }

    let reference = decode(reference, Side::Reference)?;
    let candidate = decode(candidate, Side::Candidate)?;
    Ok(compare_images(&reference, &candidate, options))
}

fn decode(bytes: &[u8], side: Side) -> Result<RgbaImage, ScoreError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|source| ScoreError::decode(side, source))
}

/// Compare two decoded images over their overlapping rectangle
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compare_images(
    reference: &RgbaImage,
    candidate: &RgbaImage,
    options: &RasterOptions,
) -> RasterDiff {
    let ref_dims = Dimensions::new(reference.width(), reference.height());
    let cand_dims = Dimensions::new(candidate.width(), candidate.height());
    let size_mismatch = (ref_dims != cand_dims).then_some((ref_dims, cand_dims));

    let area = ref_dims.overlap(cand_dims);
    let (width, height) = (area.width, area.height);
    let mut output = RgbaImage::new(width, height);
    let max_delta = options.max_delta();
    let mut mismatched = 0u64;

    for y in 0..height {
        for x in 0..width {
            let a = *reference.get_pixel(x, y);
            let b = *candidate.get_pixel(x, y);
            let delta = color_delta(a, b, false);

            if delta.abs() > max_delta {
                let antialiased = options.detect_antialiasing
                    && (is_antialiased(reference, candidate, x, y, area)
                        || is_antialiased(candidate, reference, x, y, area));
                if antialiased {
                    output.put_pixel(x, y, AA_COLOR);
                } else {
                    output.put_pixel(x, y, DIFF_COLOR);
                    mismatched += 1;
                }
            } else {
                output.put_pixel(x, y, faded_gray(a, options.diff_alpha));
            }
        }
    }

    let percent = if area.area() == 0 {
        0.0
    } else {
        mismatched as f64 * 100.0 / area.area() as f64
    };

    RasterDiff {
        percent,
        compared: area,
        mismatched,
        size_mismatch,
        image: Some(output),
    }
}

/// Encode a difference image as PNG
///
/// # Errors
/// Returns the encoder error
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    image.write_to(&mut bytes, image::ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

#[inline]
fn blend(channel: f64, alpha: f64) -> f64 {
    255.0 + (channel - 255.0) * alpha
}

#[inline]
fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.298_895_31 + g * 0.586_622_47 + b * 0.114_482_23
}

#[inline]
fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.595_977_99 - g * 0.274_176_10 - b * 0.321_801_89
}

#[inline]
fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.211_470_17 - g * 0.522_617_11 + b * 0.311_146_94
}

/// Composite a pixel over white
fn over_white(px: Rgba<u8>) -> (f64, f64, f64) {
    let [r, g, b, a] = px.0;
    let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
    if a == 255 {
        return (r, g, b);
    }
    let alpha = f64::from(a) / 255.0;
    (blend(r, alpha), blend(g, alpha), blend(b, alpha))
}

/// Signed YIQ distance between two pixels
///
/// Negative when the first pixel is brighter. With `y_only` the signed
/// brightness difference is returned instead.
fn color_delta(a: Rgba<u8>, b: Rgba<u8>, y_only: bool) -> f64 {
    if a == b {
        return 0.0;
    }
    let (r1, g1, b1) = over_white(a);
    let (r2, g2, b2) = over_white(b);

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let y = y1 - y2;
    if y_only {
        return y;
    }

    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;
    if y1 > y2 {
        -delta
    } else {
        delta
    }
}

fn faded_gray(px: Rgba<u8>, alpha: f64) -> Rgba<u8> {
    let [r, g, b, a] = px.0;
    let luma = rgb2y(f64::from(r), f64::from(g), f64::from(b));
    let value = blend(luma, alpha * f64::from(a) / 255.0);
    // Blend of values in [0, 255] stays in [0, 255].
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let value = value.round().clamp(0.0, 255.0) as u8;
    Rgba([value, value, value, 255])
}

/// Inclusive 3x3 neighbourhood bounds, clipped to the area
fn neighbourhood(x: u32, y: u32, area: Dimensions) -> (u32, u32, u32, u32) {
    (
        x.saturating_sub(1),
        y.saturating_sub(1),
        (x + 1).min(area.width - 1),
        (y + 1).min(area.height - 1),
    )
}

/// Anti-aliased edge test
///
/// A pixel is treated as anti-aliasing when its neighbours include both a
/// darker and a brighter pixel, and one of those extremes sits in a flat
/// region of both images.
fn is_antialiased(img: &RgbaImage, other: &RgbaImage, x1: u32, y1: u32, area: Dimensions) -> bool {
    let (x0, y0, x2, y2) = neighbourhood(x1, y1, area);
    let center = *img.get_pixel(x1, y1);
    let mut zeroes = u32::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);
    let mut min = 0.0;
    let mut max = 0.0;
    let mut darkest = None;
    let mut brightest = None;

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let delta = color_delta(center, *img.get_pixel(x, y), true);
            if delta == 0.0 {
                zeroes += 1;
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                darkest = Some((x, y));
            } else if delta > max {
                max = delta;
                brightest = Some((x, y));
            }
        }
    }

    let (Some(darkest), Some(brightest)) = (darkest, brightest) else {
        return false;
    };

    let flat_in_both =
        |(x, y): (u32, u32)| has_many_siblings(img, x, y, area) && has_many_siblings(other, x, y, area);
    flat_in_both(darkest) || flat_in_both(brightest)
}

/// Check for three or more identical neighbours
fn has_many_siblings(img: &RgbaImage, x1: u32, y1: u32, area: Dimensions) -> bool {
    let (x0, y0, x2, y2) = neighbourhood(x1, y1, area);
    let center = img.get_pixel(x1, y1);
    let mut zeroes = u32::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            if img.get_pixel(x, y) == center {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }
    false
}
