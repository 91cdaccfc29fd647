use image::{ImageReader, RgbImage};
use std::io::Cursor;

use super::error::InferenceError;

/// One uploaded file, owned by the request that received it.
#[derive(Debug, Clone)]
pub struct UploadedAsset {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: Option<String>,
}

impl UploadedAsset {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// Decoded 8-bit, 3-channel pixel grid.
///
/// The buffer is interleaved in the order reported by [`RasterImage::channel_order`];
/// the `image` crate's `Rgb` pixel type is only used as a 3-byte container.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pixels: RgbImage,
    order: ChannelOrder,
}

impl RasterImage {
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self {
            pixels,
            order: ChannelOrder::Rgb,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn channel_order(&self) -> ChannelOrder {
        self.order
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Reorders the channels in place so the buffer reads B, G, R.
    pub fn into_bgr(mut self) -> Self {
        if self.order == ChannelOrder::Rgb {
            for pixel in self.pixels.pixels_mut() {
                pixel.0.swap(0, 2);
            }
            self.order = ChannelOrder::Bgr;
        }
        self
    }
}

/// Validates the declared content type, then decodes the bytes into a BGR raster.
///
/// Both checks are independent: a mislabeled but decodable upload is accepted,
/// a correctly labeled but corrupt one is rejected.
pub fn decode(asset: &UploadedAsset) -> Result<RasterImage, InferenceError> {
    if !asset.content_type.starts_with("image/") {
        return Err(InferenceError::InvalidContentType(asset.content_type.clone()));
    }
    if asset.bytes.is_empty() {
        return Err(InferenceError::InvalidImageData("empty upload".into()));
    }

    let image = ImageReader::new(Cursor::new(asset.bytes.as_slice()))
        .with_guessed_format()
        .map_err(|e| InferenceError::InvalidImageData(e.to_string()))?
        .decode()
        .map_err(|e| InferenceError::InvalidImageData(e.to_string()))?;

    if image.width() == 0 || image.height() == 0 {
        return Err(InferenceError::InvalidImageData(format!(
            "image has no pixels ({}x{})",
            image.width(),
            image.height()
        )));
    }

    Ok(RasterImage::from_rgb(image.to_rgb8()).into_bgr())
}
