use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

use crate::config::{CompressionConfig, MAX_ENCODABLE_DIMENSION};
use crate::error::{Result, StripError};
use crate::models::{ImagePart, Strip};

use super::partition::crop_strip;

pub const PAYLOAD_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionParams {
    pub ceiling_bytes: usize,
    pub start_quality: u8,
    pub floor_quality: u8,
    pub step: u8,
}

impl From<&CompressionConfig> for CompressionParams {
    fn from(config: &CompressionConfig) -> Self {
        Self {
            ceiling_bytes: config.max_part_bytes,
            start_quality: config.start_quality,
            floor_quality: config.floor_quality,
            step: config.step,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompressedPayload {
    pub bytes: Vec<u8>,
    pub quality: u8,
    pub size: usize,
    pub attempts: u32,
    pub ceiling_exceeded: bool,
}

enum Encodable {
    Gray(GrayImage),
    Rgb(RgbImage),
}

/// Re-encode `region` as JPEG, lowering quality until it fits under the ceiling.
///
/// Starts at `start_quality` and steps down by `step`; the last attempt is made at
/// exactly `floor_quality`. If the payload is still over the ceiling there, it is
/// returned anyway with `ceiling_exceeded` set. Alpha is composited onto white first.
/// Regions wider or taller than the encoder accepts are rejected up front.
pub fn compress(region: &DynamicImage, params: &CompressionParams) -> Result<CompressedPayload> {
    let (width, height) = (region.width(), region.height());
    if width > MAX_ENCODABLE_DIMENSION || height > MAX_ENCODABLE_DIMENSION {
        return Err(StripError::DimensionsTooLarge {
            width,
            height,
            max: MAX_ENCODABLE_DIMENSION,
        });
    }

    let encodable = flatten(region);

    let mut quality = params.start_quality.clamp(1, 100);
    let floor = params.floor_quality.clamp(1, quality);
    let step = params.step.max(1);
    let mut attempts = 0;

    loop {
        let bytes = encode_jpeg(&encodable, quality)?;
        attempts += 1;
        let size = bytes.len();

        if size <= params.ceiling_bytes || quality <= floor {
            return Ok(CompressedPayload {
                bytes,
                quality,
                size,
                attempts,
                ceiling_exceeded: size > params.ceiling_bytes,
            });
        }

        tracing::trace!(
            quality,
            size,
            ceiling = params.ceiling_bytes,
            "Payload over ceiling, lowering quality"
        );
        quality = quality.saturating_sub(step).max(floor);
    }
}

/// Crop one strip out of the source image and compress it into an [`ImagePart`].
pub fn compress_strip(
    image: &DynamicImage,
    strip: &Strip,
    params: &CompressionParams,
) -> Result<ImagePart> {
    let region = crop_strip(image, strip);
    let payload = compress(&region, params)?;

    if payload.ceiling_exceeded {
        tracing::warn!(
            part = strip.index,
            size = payload.size,
            ceiling = params.ceiling_bytes,
            quality = payload.quality,
            "Compression ceiling exceeded at floor quality, submitting best effort"
        );
    } else {
        tracing::debug!(
            part = strip.index,
            size = payload.size,
            quality = payload.quality,
            attempts = payload.attempts,
            "Compressed part"
        );
    }

    Ok(ImagePart {
        index: strip.index,
        y_range: strip.y_range.clone(),
        payload_size: payload.size,
        achieved_quality: payload.quality,
        ceiling_exceeded: payload.ceiling_exceeded,
        payload: payload.bytes,
    })
}

fn encode_jpeg(image: &Encodable, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        let encoded = match image {
            Encodable::Gray(gray) => encoder.encode_image(gray),
            Encodable::Rgb(rgb) => encoder.encode_image(rgb),
        };
        encoded.map_err(|e| {
            StripError::Processing(format!("Failed to encode JPEG at quality {quality}: {e}"))
        })?;
    }
    Ok(buffer)
}

/// Drop alpha by compositing onto an opaque white background.
///
/// Grayscale sources stay single-channel; everything else becomes 8-bit RGB.
fn flatten(region: &DynamicImage) -> Encodable {
    let color = region.color();
    let grayscale = !color.has_color();

    match (grayscale, color.has_alpha()) {
        (true, false) => Encodable::Gray(region.to_luma8()),
        (false, false) => Encodable::Rgb(region.to_rgb8()),
        (true, true) => {
            let luma_a = region.to_luma_alpha8();
            Encodable::Gray(GrayImage::from_fn(luma_a.width(), luma_a.height(), |x, y| {
                let p = luma_a.get_pixel(x, y);
                Luma([over_white(p[0], p[1])])
            }))
        }
        (false, true) => {
            let rgba = region.to_rgba8();
            Encodable::Rgb(RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
                let p = rgba.get_pixel(x, y);
                Rgb([
                    over_white(p[0], p[3]),
                    over_white(p[1], p[3]),
                    over_white(p[2], p[3]),
                ])
            }))
        }
    }
}

/// Composite one channel value over an opaque white background.
pub(crate) fn over_white(channel: u8, alpha: u8) -> u8 {
    let c = channel as u32;
    let a = alpha as u32;
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbaImage};

    /// Deterministic noise so JPEG sizes actually respond to quality.
    fn noise_image(width: u32, height: u32) -> DynamicImage {
        let mut state: u32 = 0x1234_5678;
        let img = RgbImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let [a, b, c, _] = state.to_le_bytes();
            Rgb([a, b, c])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn params(ceiling: usize, start: u8, floor: u8, step: u8) -> CompressionParams {
        CompressionParams {
            ceiling_bytes: ceiling,
            start_quality: start,
            floor_quality: floor,
            step,
        }
    }

    #[test]
    fn test_fits_at_start_quality() {
        let region = noise_image(64, 64);
        let result = compress(&region, &params(usize::MAX, 90, 20, 10)).unwrap();

        assert_eq!(result.quality, 90);
        assert_eq!(result.attempts, 1);
        assert!(!result.ceiling_exceeded);
        assert_eq!(result.size, result.bytes.len());
    }

    #[test]
    fn test_unreachable_ceiling_stops_at_floor() {
        let region = noise_image(64, 64);
        let result = compress(&region, &params(1, 90, 20, 10)).unwrap();

        assert_eq!(result.quality, 20);
        assert_eq!(result.attempts, 8);
        assert!(result.ceiling_exceeded);
    }

    #[test]
    fn test_last_attempt_is_exactly_floor_when_step_overshoots() {
        let region = noise_image(32, 32);
        let result = compress(&region, &params(1, 90, 20, 30)).unwrap();

        // 90, 60, 30, then clamped to 20
        assert_eq!(result.quality, 20);
        assert_eq!(result.attempts, 4);
    }

    #[test]
    fn test_intermediate_ceiling_lowers_quality_within_bounds() {
        let region = noise_image(128, 128);
        let at_start = compress(&region, &params(usize::MAX, 95, 95, 1)).unwrap();
        let at_floor = compress(&region, &params(usize::MAX, 10, 10, 1)).unwrap();
        assert!(at_floor.size < at_start.size);

        let ceiling = (at_start.size + at_floor.size) / 2;
        let result = compress(&region, &params(ceiling, 95, 10, 5)).unwrap();

        assert!(result.quality < 95);
        assert!(result.quality >= 10);
        assert!(result.size <= ceiling || result.quality == 10);
        assert!(result.attempts <= (95 - 10) / 5 + 1);
    }

    #[test]
    fn test_compress_is_deterministic() {
        let region = noise_image(96, 48);
        let p = params(4_000, 90, 20, 10);

        let first = compress(&region, &p).unwrap();
        let second = compress(&region, &p).unwrap();

        assert_eq!(first.quality, second.quality);
        assert_eq!(first.size, second.size);
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn test_transparent_region_is_composited_onto_white() {
        let region = DynamicImage::ImageRgba8(RgbaImage::new(16, 16));
        let result = compress(&region, &params(usize::MAX, 90, 20, 10)).unwrap();

        let decoded = image::load_from_memory(&result.bytes).unwrap();
        let pixel = decoded.get_pixel(8, 8);
        assert!(pixel[0] > 245 && pixel[1] > 245 && pixel[2] > 245);
    }

    #[test]
    fn test_grayscale_region_stays_single_channel() {
        let region = DynamicImage::new_luma_a8(16, 16);
        let result = compress(&region, &params(usize::MAX, 90, 20, 10)).unwrap();

        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert!(matches!(decoded, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn test_region_wider_than_encoder_limit_is_rejected() {
        let region = DynamicImage::new_luma8(MAX_ENCODABLE_DIMENSION + 1, 2);
        let err = compress(&region, &params(usize::MAX, 90, 20, 10)).unwrap_err();

        assert!(matches!(
            err,
            StripError::DimensionsTooLarge {
                width: 65_536,
                height: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_over_white() {
        assert_eq!(over_white(0, 255), 0);
        assert_eq!(over_white(0, 0), 255);
        assert_eq!(over_white(100, 255), 100);
    }

    #[test]
    fn test_compress_strip_keeps_range_and_index() {
        let image = noise_image(20, 300);
        let strip = Strip::new(1, 100..200);
        let part = compress_strip(&image, &strip, &params(usize::MAX, 80, 20, 10)).unwrap();

        assert_eq!(part.index, 1);
        assert_eq!(part.y_range, 100..200);
        assert_eq!(part.achieved_quality, 80);
        assert_eq!(part.payload_size, part.payload.len());

        let decoded = image::load_from_memory(&part.payload).unwrap();
        assert_eq!(decoded.dimensions(), (20, 100));
    }
}
