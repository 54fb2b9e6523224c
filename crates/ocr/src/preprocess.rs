use carbon_core::CropRegion;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

/// 3×3 sharpening kernel applied to the meter digits row.
pub const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

const UPSCALE: u32 = 4;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Cannot read image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Empty crop: region {region:?} lies outside a {width}x{height} image")]
    EmptyCrop {
        region: CropRegion,
        width: u32,
        height: u32,
    },
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Receipt photo → single-channel grayscale.
pub fn prepare_receipt(path: &Path) -> Result<GrayImage, PreprocessError> {
    tracing::debug!(path = %path.display(), "Preprocessing receipt");
    Ok(image::open(path)?.to_luma8())
}

pub fn prepare_receipt_from_bytes(data: &[u8]) -> Result<GrayImage, PreprocessError> {
    Ok(image::load_from_memory(data)?.to_luma8())
}

/// Bill photo → sharpened, upscaled strip holding the meter reading.
pub fn prepare_bill(path: &Path, region: &CropRegion) -> Result<GrayImage, PreprocessError> {
    tracing::debug!(path = %path.display(), ?region, "Preprocessing bill");
    isolate_digits(image::open(path)?, region)
}

pub fn prepare_bill_from_bytes(
    data: &[u8],
    region: &CropRegion,
) -> Result<GrayImage, PreprocessError> {
    isolate_digits(image::load_from_memory(data)?, region)
}

fn isolate_digits(img: DynamicImage, region: &CropRegion) -> Result<GrayImage, PreprocessError> {
    let gray = img.to_luma8();
    let (x, y, w, h) = clamp_region(region, gray.width(), gray.height()).ok_or(
        PreprocessError::EmptyCrop {
            region: *region,
            width: gray.width(),
            height: gray.height(),
        },
    )?;

    // Digits sit in the bottom 40% of the box; the top holds the field label.
    let skip = h * 3 / 5;
    let row = imageops::crop_imm(&gray, x, y + skip, w, h - skip).to_image();

    let sharpened: GrayImage = imageops::filter3x3(&row, &SHARPEN_KERNEL);
    Ok(imageops::resize(
        &sharpened,
        sharpened.width() * UPSCALE,
        sharpened.height() * UPSCALE,
        FilterType::Triangle,
    ))
}

/// Intersection of `region` with a `width`×`height` image, or `None` when empty.
fn clamp_region(region: &CropRegion, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    if region.x >= width || region.y >= height {
        return None;
    }
    let w = region.width.min(width - region.x);
    let h = region.height.min(height - region.y);
    (w > 0 && h > 0).then_some((region.x, region.y, w, h))
}

pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img.clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
