// ============================================================================
// PulmoScan - Image Normalization & Encoding
// ============================================================================
// Converts arbitrary uploads into the fixed tensors the networks expect and
// renders binary masks back into embeddable PNG data URLs.
// ============================================================================

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageOutputFormat};
use ndarray::{Array2, Array4};

use crate::error::ApiError;

/// Decodes raw upload bytes into an image.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ApiError> {
    image::load_from_memory(bytes).map_err(|e| ApiError::InvalidImage(e.to_string()))
}

/// Grayscale tensor of shape `[1, size, size, 1]`, values in [0, 1].
///
/// Batch and channel dimensions are explicit so the tensor matches the
/// segmentation network's expected layout exactly.
pub fn grayscale_tensor(image: &DynamicImage, size: u32) -> Array4<f32> {
    let gray = image
        .resize_exact(size, size, FilterType::Triangle)
        .to_luma8();
    let (w, h) = (size as usize, size as usize);
    let mut tensor = Array4::<f32>::zeros((1, h, w, 1));
    for (x, y, pixel) in gray.enumerate_pixels() {
        tensor[[0, y as usize, x as usize, 0]] = pixel.0[0] as f32 / 255.0;
    }
    tensor
}

/// RGB tensor of shape `[1, size, size, 3]`, values in [0, 1].
pub fn rgb_tensor(image: &DynamicImage, size: u32) -> Array4<f32> {
    let rgb = image
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8();
    let (w, h) = (size as usize, size as usize);
    let mut tensor = Array4::<f32>::zeros((1, h, w, 3));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, y as usize, x as usize, c]] = pixel.0[c] as f32 / 255.0;
        }
    }
    tensor
}

/// Renders a binary mask (0/1 per pixel) as a single-channel PNG data URL.
pub fn mask_to_data_url(mask: &Array2<u8>) -> Result<String, ApiError> {
    let (h, w) = mask.dim();
    let pixels: Vec<u8> = mask.iter().map(|&v| v * 255).collect();
    let img = GrayImage::from_raw(w as u32, h as u32, pixels)
        .ok_or_else(|| ApiError::Internal("mask buffer does not match dimensions".into()))?;

    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageOutputFormat::Png)
        .map_err(|e| ApiError::Internal(format!("mask PNG encoding failed: {}", e)))?;

    Ok(format!(
        "data:image/png;base64,{}",
        BASE64.encode(buffer.into_inner())
    ))
}

/// Extracts the raw bytes from a `data:image/...;base64,` URL (or a bare
/// base64 string).
pub fn data_url_to_bytes(data_url: &str) -> Result<Vec<u8>, ApiError> {
    let payload = if data_url.starts_with("data:image") {
        data_url
            .split_once(',')
            .map(|(_, rest)| rest)
            .ok_or_else(|| ApiError::InvalidImage("malformed data URL".into()))?
    } else {
        data_url
    };
    BASE64
        .decode(payload.trim())
        .map_err(|e| ApiError::InvalidImage(format!("base64 decode failed: {}", e)))
}
