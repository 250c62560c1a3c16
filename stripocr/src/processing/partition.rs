use image::{DynamicImage, GenericImageView, ImageReader};

use crate::config::SplitConfig;
use crate::error::{Result, StripError};
use crate::models::Strip;

/// Decode raw image bytes, guessing the format from the content.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let reader = ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| StripError::Decode(format!("Failed to read image: {e}")))?;

    reader.decode().map_err(|e| StripError::Decode(e.to_string()))
}

/// Compute the strips for an image of `height` pixels.
///
/// An image within both single-part thresholds yields one strip spanning the whole
/// height. Otherwise the height is cut into `strip_height_px` bands; the last band
/// takes whatever remains. The strips are contiguous, ascending and cover `0..height`.
pub fn plan_strips(height: u32, estimated_bytes: usize, config: &SplitConfig) -> Vec<Strip> {
    if height <= config.max_single_height_px && estimated_bytes <= config.max_single_bytes {
        return vec![Strip::new(0, 0..height)];
    }

    let strip_height = config.strip_height_px.max(1);
    let num_parts = height.div_ceil(strip_height);

    (0..num_parts)
        .map(|i| {
            let start = i * strip_height;
            let end = start.saturating_add(strip_height).min(height);
            Strip::new(i as usize, start..end)
        })
        .collect()
}

/// Partition a decoded image. `estimated_bytes` is the size of the source payload.
pub fn partition(image: &DynamicImage, estimated_bytes: usize, config: &SplitConfig) -> Vec<Strip> {
    let (width, height) = image.dimensions();
    let strips = plan_strips(height, estimated_bytes, config);

    tracing::debug!(
        width,
        height,
        estimated_bytes,
        parts = strips.len(),
        "Partitioned image"
    );

    strips
}

/// Copy one strip out of the source image.
pub fn crop_strip(image: &DynamicImage, strip: &Strip) -> DynamicImage {
    image.crop_imm(0, strip.y_range.start, image.width(), strip.height())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    fn split_config(strip: u32, max_height: u32, max_bytes: usize) -> SplitConfig {
        SplitConfig {
            strip_height_px: strip,
            max_single_height_px: max_height,
            max_single_bytes: max_bytes,
        }
    }

    fn assert_covers(strips: &[Strip], height: u32) {
        let mut cursor = 0;
        for (i, strip) in strips.iter().enumerate() {
            assert_eq!(strip.index, i, "indices must be ascending from zero");
            assert_eq!(strip.y_range.start, cursor, "gap or overlap at strip {i}");
            assert!(strip.y_range.end > strip.y_range.start, "empty strip {i}");
            cursor = strip.y_range.end;
        }
        assert_eq!(cursor, height, "strips must end at the image height");
    }

    #[test]
    fn test_small_image_is_single_part() {
        let strips = plan_strips(500, 10_000, &split_config(2000, 2000, 1_000_000));
        assert_eq!(strips, vec![Strip::new(0, 0..500)]);
    }

    #[test]
    fn test_height_exactly_at_threshold_is_single_part() {
        let strips = plan_strips(2000, 1_000_000, &split_config(2000, 2000, 1_000_000));
        assert_eq!(strips.len(), 1);
    }

    #[test]
    fn test_tall_image_splits_with_short_last_strip() {
        let strips = plan_strips(5000, 10_000, &split_config(2000, 2000, 1_000_000));
        assert_eq!(
            strips,
            vec![
                Strip::new(0, 0..2000),
                Strip::new(1, 2000..4000),
                Strip::new(2, 4000..5000),
            ]
        );
    }

    #[test]
    fn test_oversized_bytes_force_split_of_short_image() {
        let strips = plan_strips(1500, 2_000_000, &split_config(600, 2000, 1_000_000));
        assert_eq!(strips.len(), 3);
        assert_covers(&strips, 1500);
    }

    #[test]
    fn test_oversized_bytes_with_height_below_strip_yields_one_strip() {
        let strips = plan_strips(300, 2_000_000, &split_config(2000, 2000, 1_000_000));
        assert_eq!(strips, vec![Strip::new(0, 0..300)]);
    }

    #[test]
    fn test_coverage_for_many_heights_and_strip_sizes() {
        for strip_height in [1, 7, 100, 999, 2000] {
            for height in [1, 2, 99, 100, 101, 1999, 2000, 2001, 4000, 5003] {
                let config = split_config(strip_height, 0, 0);
                let strips = plan_strips(height, 1, &config);
                assert_covers(&strips, height);
                assert_eq!(strips.len() as u32, height.div_ceil(strip_height));
            }
        }
    }

    #[test]
    fn test_zero_strip_height_does_not_panic() {
        let strips = plan_strips(5, 1, &split_config(0, 0, 0));
        assert_covers(&strips, 5);
    }

    #[test]
    fn test_decode_rejects_corrupt_bytes() {
        let result = decode_image(&[0u8, 1, 2, 3, 4, 5]);
        assert!(matches!(result, Err(StripError::Decode(_))));
    }

    #[test]
    fn test_decode_and_partition_png() {
        let img = DynamicImage::new_rgb8(40, 250);
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let decoded = decode_image(&bytes).unwrap();
        let strips = partition(&decoded, bytes.len(), &split_config(100, 100, usize::MAX));
        assert_eq!(strips.len(), 3);

        let last = crop_strip(&decoded, &strips[2]);
        assert_eq!(last.dimensions(), (40, 50));
    }
}
