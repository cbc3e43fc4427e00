use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::contrast::otsu_level;
use imageproc::edges::canny;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::hough::{detect_lines, LineDetectionOptions};
use loandoc_core::{ProcessingSettings, ThresholdMethod};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Sigma of the Gaussian window; matches an 11x11 block.
const ADAPTIVE_SIGMA: f32 = 2.0;
/// Subtracted from the local mean before comparing.
const ADAPTIVE_C: i32 = 2;
const BINARY_LEVEL: u8 = 127;

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
const HOUGH_VOTES: u32 = 100;
const HOUGH_SUPPRESSION: u32 = 8;
/// Lines steeper than this are treated as vertical and ignored.
const MAX_SKEW_DEGREES: f32 = 45.0;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Could not read image at {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
    #[error("Image has no pixels")]
    Empty,
}

/// Load an image file and run the full enhancement chain on it.
pub fn prepare_for_ocr(path: &Path, settings: &ProcessingSettings) -> Result<GrayImage, PreprocessError> {
    let img = image::open(path).map_err(|source| PreprocessError::Load {
        path: path.display().to_string(),
        source,
    })?;
    prepare_for_ocr_from_image(&img, settings)
}

pub fn prepare_for_ocr_from_image(
    img: &DynamicImage,
    settings: &ProcessingSettings,
) -> Result<GrayImage, PreprocessError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(PreprocessError::Empty);
    }
    Ok(enhance(img, settings))
}

/// resize -> grayscale -> denoise -> deskew -> threshold.
pub fn enhance(img: &DynamicImage, settings: &ProcessingSettings) -> GrayImage {
    let resized = resize_to_width(img, settings.resize_width);
    let gray = to_grayscale(&resized);
    let denoised = denoise(&gray, settings.denoise_strength);
    let deskewed = deskew(&denoised);
    apply_threshold(&deskewed, settings.threshold_method)
}

/// Scale to `width` pixels wide, keeping the aspect ratio.
pub fn resize_to_width(img: &DynamicImage, width: u32) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 || w == width {
        return img.clone();
    }
    let height = ((h as u64 * width as u64) / w as u64).max(1) as u32;
    img.resize_exact(width, height, FilterType::Triangle)
}

pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

pub fn apply_threshold(gray: &GrayImage, method: ThresholdMethod) -> GrayImage {
    if gray.width() == 0 || gray.height() == 0 {
        return gray.clone();
    }
    match method {
        ThresholdMethod::Adaptive => {
            let mean = gaussian_blur_f32(gray, ADAPTIVE_SIGMA);
            ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
                let v = gray.get_pixel(x, y)[0] as i32;
                let m = mean.get_pixel(x, y)[0] as i32;
                Luma([if v > m - ADAPTIVE_C { 255 } else { 0 }])
            })
        }
        ThresholdMethod::Otsu => binarize(gray, otsu_level(gray)),
        ThresholdMethod::Binary => binarize(gray, BINARY_LEVEL),
    }
}

fn binarize(gray: &GrayImage, level: u8) -> GrayImage {
    let mut out = gray.clone();
    for p in out.pixels_mut() {
        p[0] = if p[0] > level { 255 } else { 0 };
    }
    out
}

/// Median filter; `strength` (1..=20) maps to a window radius of 1..=4.
pub fn denoise(gray: &GrayImage, strength: u8) -> GrayImage {
    let radius = (strength as u32 + 4) / 5;
    if radius == 0 {
        return gray.clone();
    }
    median_filter(gray, radius, radius)
}

/// Median tilt of the near-horizontal lines on the page, in degrees.
/// Positive means the text descends to the right.
pub fn detect_skew_angle(gray: &GrayImage) -> Option<f32> {
    if gray.width() == 0 || gray.height() == 0 {
        return None;
    }
    let edges = canny(gray, CANNY_LOW, CANNY_HIGH);
    let options = LineDetectionOptions {
        vote_threshold: HOUGH_VOTES,
        suppression_radius: HOUGH_SUPPRESSION,
    };

    // The Hough angle is that of the line's normal, so horizontal lines sit at 90.
    let mut angles: Vec<f32> = detect_lines(&edges, options)
        .into_iter()
        .map(|line| line.angle_in_degrees as f32 - 90.0)
        .filter(|a| a.abs() < MAX_SKEW_DEGREES)
        .collect();

    if angles.is_empty() {
        return None;
    }
    angles.sort_by(|a, b| a.total_cmp(b));
    Some(median(&angles))
}

fn median(sorted: &[f32]) -> f32 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Rotate the page so the detected text lines are horizontal.
pub fn deskew(gray: &GrayImage) -> GrayImage {
    match detect_skew_angle(gray) {
        Some(angle) if angle != 0.0 => {
            debug!(angle, "correcting page skew");
            // rotate_about_center turns clockwise; undo a downward tilt by turning the other way.
            rotate_about_center(gray, -angle.to_radians(), Interpolation::Bicubic, Luma([255u8]))
        }
        _ => gray.clone(),
    }
}

pub fn encode_png(gray: &GrayImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    gray.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_gray(width: u32, height: u32, value: u8) -> GrayImage {
        ImageBuffer::from_fn(width, height, |_, _| Luma([value]))
    }

    /// White page with a dark bar tilted `degrees` (positive = descending to the right).
    fn tilted_bar(degrees: f32) -> GrayImage {
        let mut img = solid_gray(400, 200, 255);
        let slope = degrees.to_radians().tan();
        for x in 20..380u32 {
            let y0 = 80.0 + (x - 20) as f32 * slope;
            for dy in 0..5 {
                img.put_pixel(x, y0.round() as u32 + dy, Luma([0]));
            }
        }
        img
    }

    fn is_binary(img: &GrayImage) -> bool {
        img.pixels().all(|p| p[0] == 0 || p[0] == 255)
    }

    #[test]
    fn resize_keeps_aspect_ratio() {
        let img = DynamicImage::ImageLuma8(solid_gray(850, 1100, 200));
        let out = resize_to_width(&img, 1700);
        assert_eq!((out.width(), out.height()), (1700, 2200));
    }

    #[test]
    fn resize_downscales_wide_pages() {
        let img = DynamicImage::ImageLuma8(solid_gray(3400, 100, 200));
        let out = resize_to_width(&img, 1700);
        assert_eq!((out.width(), out.height()), (1700, 50));
    }

    #[test]
    fn grayscale_drops_color_channels() {
        let rgb = DynamicImage::ImageRgb8(ImageBuffer::from_fn(3, 3, |_, _| image::Rgb([255, 255, 255])));
        let gray = to_grayscale(&rgb);
        assert!(gray.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn adaptive_threshold_on_uniform_page_is_white() {
        let out = apply_threshold(&solid_gray(32, 32, 180), ThresholdMethod::Adaptive);
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn adaptive_threshold_keeps_dark_text() {
        let mut img = solid_gray(40, 40, 230);
        for x in 15..25 {
            img.put_pixel(x, 20, Luma([20]));
        }
        let out = apply_threshold(&img, ThresholdMethod::Adaptive);
        assert!(is_binary(&out));
        assert_eq!(out.get_pixel(20, 20)[0], 0);
        assert_eq!(out.get_pixel(2, 2)[0], 255);
    }

    #[test]
    fn otsu_splits_bimodal_image() {
        let img: GrayImage = ImageBuffer::from_fn(20, 10, |x, _| Luma([if x < 10 { 30 } else { 220 }]));
        let out = apply_threshold(&img, ThresholdMethod::Otsu);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(19, 0)[0], 255);
        assert!(is_binary(&out));
    }

    #[test]
    fn binary_threshold_uses_fixed_level() {
        let img: GrayImage = ImageBuffer::from_fn(2, 1, |x, _| Luma([if x == 0 { 127 } else { 128 }]));
        let out = apply_threshold(&img, ThresholdMethod::Binary);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn denoise_removes_isolated_speck() {
        let mut img = solid_gray(9, 9, 0);
        img.put_pixel(4, 4, Luma([255]));
        let out = denoise(&img, 10);
        assert_eq!(out.get_pixel(4, 4)[0], 0);
    }

    #[test]
    fn blank_page_has_no_skew() {
        let img = solid_gray(200, 200, 255);
        assert_eq!(detect_skew_angle(&img), None);
        assert_eq!(deskew(&img), img);
    }

    #[test]
    fn detects_tilt_of_synthetic_line() {
        let angle = detect_skew_angle(&tilted_bar(5.0)).expect("line should be found");
        assert!((angle - 5.0).abs() <= 1.5, "angle was {angle}");
    }

    #[test]
    fn deskew_levels_tilted_line() {
        let straightened = deskew(&tilted_bar(5.0));
        assert_eq!(straightened.dimensions(), (400, 200));
        let residual = detect_skew_angle(&straightened).unwrap_or(0.0);
        assert!(residual.abs() <= 1.5, "residual was {residual}");
    }

    #[test]
    fn enhance_outputs_binary_page_at_target_width() {
        let img = DynamicImage::ImageLuma8(solid_gray(900, 300, 240));
        let out = enhance(&img, &ProcessingSettings::default());
        assert_eq!(out.width(), 1700);
        assert!(is_binary(&out));
    }

    #[test]
    fn prepare_reports_unreadable_path() {
        let err = prepare_for_ocr(Path::new("/definitely/missing.png"), &ProcessingSettings::default())
            .unwrap_err();
        assert!(err.to_string().starts_with("Could not read image at /definitely/missing.png"));
    }

    #[test]
    fn encoded_output_is_png() {
        let bytes = encode_png(&solid_gray(4, 4, 100)).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }
}
