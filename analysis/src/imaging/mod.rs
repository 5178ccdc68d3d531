//! Image decoding, preprocessing and enhancement

pub mod clahe;
pub mod filters;

use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageFormat, RgbImage};
use ndarray::Array3;
use std::io::Cursor;
use std::path::Path;

use crate::error::{AnalysisError, Result};
use shared::ImageInfo;

pub use clahe::{ClaheParams, enhance};
pub use filters::{FilterKind, FilterSet, apply_filters};

/// Channel-last `(height, width, 3)` tensor with values in `[0, 1]`
pub type ImageTensor = Array3<f32>;

/// Default classifier input edge length
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Upload decoded to RGB together with what we learned about the source
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub rgb: RgbImage,
    pub info: ImageInfo,
}

fn format_name(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("PNG"),
        ImageFormat::Jpeg => Some("JPEG"),
        ImageFormat::Bmp => Some("BMP"),
        ImageFormat::Tiff => Some("TIFF"),
        _ => None,
    }
}

fn color_mode_name(color: ColorType) -> String {
    match color {
        ColorType::L8 | ColorType::L16 => "L".to_string(),
        ColorType::La8 | ColorType::La16 => "LA".to_string(),
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB".to_string(),
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA".to_string(),
        other => format!("{other:?}"),
    }
}

/// Work out the container format, trusting content over the file extension
fn detect_format(bytes: &[u8], file_name: &str) -> Option<ImageFormat> {
    let sniffed = image::guess_format(bytes).ok().filter(|f| format_name(*f).is_some());
    sniffed.or_else(|| {
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension)
            .filter(|f| format_name(*f).is_some())
    })
}

/// Decode an uploaded file. Only PNG, JPEG, BMP and TIFF are accepted.
pub fn decode(bytes: &[u8], file_name: &str) -> Result<DecodedImage> {
    if bytes.is_empty() {
        return Err(AnalysisError::EmptyImage {
            file_name: file_name.to_string(),
        });
    }

    let format = detect_format(bytes, file_name).ok_or_else(|| AnalysisError::UnsupportedFormat {
        file_name: file_name.to_string(),
    })?;

    let dynamic = image::load_from_memory_with_format(bytes, format).map_err(|e| AnalysisError::DecodeFailed {
        file_name: file_name.to_string(),
        message: e.to_string(),
    })?;

    let color_mode = color_mode_name(dynamic.color());
    let rgb = dynamic.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(AnalysisError::EmptyImage {
            file_name: file_name.to_string(),
        });
    }

    let info = ImageInfo {
        width: rgb.width(),
        height: rgb.height(),
        format: format_name(format).unwrap_or("UNKNOWN").to_string(),
        color_mode,
    };

    Ok(DecodedImage { rgb, info })
}

/// Resize to `size × size` and scale channels to `[0, 1]`
pub fn preprocess(image: &RgbImage, size: u32) -> ImageTensor {
    let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
    let side = size as usize;
    Array3::from_shape_fn((side, side, 3), |(y, x, c)| {
        f32::from(resized.get_pixel(x as u32, y as u32)[c]) / 255.0
    })
}

/// Encode as PNG for display in the browser
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| AnalysisError::EncodeFailed(e.to_string()))?;
    Ok(bytes)
}
