use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use imageproc::contrast::{equalize_histogram, otsu_level, threshold, ThresholdType};
use imageproc::filter::median_filter;

use crate::config::PreprocessConfig;
use crate::processing::over_white;

/// Enhance a decoded image for OCR.
///
/// Applies the following transformations when enabled:
/// 1. Converts to grayscale (alpha is composited onto white)
/// 2. Equalizes the histogram (`equalize`)
/// 3. Median-filters noise away (`denoise_radius`, 0 skips it)
/// 4. Binarizes at the Otsu level (`binarize`)
/// 5. Upscales images shorter than `upscale_below_height` by `upscale_factor`
///
/// Runs before partitioning, so strip boundaries are computed on the enhanced height.
pub fn preprocess_image(img: DynamicImage, config: &PreprocessConfig) -> DynamicImage {
    if !config.enabled {
        return img;
    }

    let mut gray = to_opaque_gray(&img);
    drop(img);

    if config.equalize {
        gray = equalize_histogram(&gray);
    }
    if config.denoise_radius > 0 {
        gray = median_filter(&gray, config.denoise_radius, config.denoise_radius);
    }
    if config.binarize {
        gray = binarize(&gray);
    }

    upscale_if_small(
        DynamicImage::ImageLuma8(gray),
        config.upscale_below_height,
        config.upscale_factor,
    )
}

fn to_opaque_gray(img: &DynamicImage) -> GrayImage {
    if !img.color().has_alpha() {
        return img.to_luma8();
    }

    let luma_a = img.to_luma_alpha8();
    GrayImage::from_fn(luma_a.width(), luma_a.height(), |x, y| {
        let p = luma_a.get_pixel(x, y);
        Luma([over_white(p[0], p[1])])
    })
}

/// Black text on white: pixels above the Otsu level become 255, the rest 0.
fn binarize(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    threshold(gray, level, ThresholdType::Binary)
}

/// Small text is easier to read after upscaling; the filter is cubic.
fn upscale_if_small(img: DynamicImage, below_height: u32, factor: f32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if height >= below_height || factor <= 1.0 {
        return img;
    }

    let new_width = ((width as f32 * factor).round() as u32).max(1);
    let new_height = ((height as f32 * factor).round() as u32).max(1);
    img.resize_exact(new_width, new_height, FilterType::CatmullRom)
}
